//! `nova uninstall` - reverse a previously applied installation.

use anyhow::{Context as _, Result};

use crate::context::Context;

/// Look up `installation_id` and reverse its resources, optionally ignoring
/// per-resource delete failures when `force` is set.
pub async fn uninstall(ctx: &Context, _tenant_id: &str, installation_id: &str, force: bool) -> Result<()> {
    let installation = ctx
        .store
        .get_installation(installation_id)
        .await?
        .with_context(|| format!("installation '{installation_id}' not found"))?;

    ctx.executor
        .uninstall(&installation.tenant_id, &installation.namespace, installation_id, force)
        .await?;

    println!("uninstalled '{}'", installation.install_name);
    Ok(())
}
