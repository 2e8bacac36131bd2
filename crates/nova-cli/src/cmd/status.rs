//! `nova status` - show the current state of an installation.

use anyhow::{Context as _, Result};

use crate::context::Context;

/// Print the current status of `installation_id` and its resources.
pub async fn status(ctx: &Context, installation_id: &str) -> Result<()> {
    let installation = ctx
        .store
        .get_installation(installation_id)
        .await?
        .with_context(|| format!("installation '{installation_id}' not found"))?;

    println!("id:        {}", installation.id);
    println!("name:      {}", installation.install_name);
    println!("namespace: {}/{}", installation.tenant_id, installation.namespace);
    println!("release:   {}", installation.release_id);
    println!("status:    {:?}", installation.status);

    let resources = ctx.store.list_installation_resources(installation_id).await?;
    if !resources.is_empty() {
        println!("resources:");
        for r in &resources {
            println!("  {:?} {} ({})", r.resource_type, r.resource_name, r.resource_id);
        }
    }
    Ok(())
}
