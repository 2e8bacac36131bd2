//! `nova plan` - dry-run an installation and report conflicts.

use anyhow::Result;
use nova_core::planner::{self, InstallRequest};

use crate::context::Context;
use crate::InstallTarget;

/// Dry-run `target` against the store and print conflicts without applying anything.
pub async fn plan(ctx: &Context, tenant_id: &str, target: InstallTarget) -> Result<()> {
    let req = InstallRequest {
        tenant_id: tenant_id.to_string(),
        namespace: target.namespace,
        app_id: target.app_id,
        version: target.version,
        install_name: target.install_name,
        name_prefix: target.name_prefix,
        dry_run: true,
        created_by: "cli".to_string(),
        values_json: target.values_json,
    };

    let result = planner::plan(&ctx.store, &req).await?;

    println!("valid: {}", result.valid);
    if !result.to_create.is_empty() {
        println!("to create: {}", result.to_create.join(", "));
    }
    if !result.conflicts.is_empty() {
        for c in &result.conflicts {
            println!("conflict: {:?} '{}' already exists", c.resource_type, c.name);
        }
    }
    if !result.missing_runtimes.is_empty() {
        println!("missing runtimes: {}", result.missing_runtimes.join(", "));
    }
    for e in &result.errors {
        println!("error: {e}");
    }
    Ok(())
}
