//! nova - the Nova build and release pipeline CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use nova_cli::context::Context;
use nova_cli::{cmd, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let ctx = Context::from_env().await?;
    let tenant_id = cli.tenant_id;

    match cli.command {
        Commands::Compile { function_id, source } => {
            cmd::compile::compile(&ctx, &function_id, &source).await
        }
        Commands::Package { namespace, app, version, functions, workflow } => {
            cmd::package::package(&ctx, &tenant_id, &namespace, &app, &version, &functions, workflow.as_deref()).await
        }
        Commands::Extract { archive } => cmd::extract::extract(&archive).await,
        Commands::Plan { target } => cmd::plan::plan(&ctx, &tenant_id, target).await,
        Commands::Install { target } => cmd::install::install(&ctx, &tenant_id, target).await,
        Commands::Uninstall { installation_id, force } => {
            cmd::uninstall::uninstall(&ctx, &tenant_id, &installation_id, force).await
        }
        Commands::Status { installation_id } => cmd::status::status(&ctx, &installation_id).await,
    }
}
