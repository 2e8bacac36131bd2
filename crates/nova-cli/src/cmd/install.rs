//! `nova install` - install a published release into a namespace.

use anyhow::Result;
use nova_core::planner::InstallRequest;

use crate::context::Context;
use crate::InstallTarget;

/// Install `target`, persisting the installation and applying it in the background.
pub async fn install(ctx: &Context, tenant_id: &str, target: InstallTarget) -> Result<()> {
    let req = InstallRequest {
        tenant_id: tenant_id.to_string(),
        namespace: target.namespace,
        app_id: target.app_id,
        version: target.version,
        install_name: target.install_name,
        name_prefix: target.name_prefix,
        dry_run: false,
        created_by: "cli".to_string(),
        values_json: target.values_json,
    };

    let (installation, job) = ctx.executor.install(req).await?;
    println!(
        "installation '{}' ({}) accepted, job status: {:?}",
        installation.install_name, installation.id, job.status
    );
    Ok(())
}
