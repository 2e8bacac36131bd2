//! `nova package` - bundle existing functions (and optionally one workflow)
//! into a release archive and publish it.

use anyhow::Result;

use crate::context::Context;

/// Bundle `functions` and at most one `workflow` into a release archive for
/// `app`@`version` and publish it under `namespace`.
pub async fn package(
    ctx: &Context,
    tenant_id: &str,
    namespace: &str,
    app: &str,
    version: &str,
    functions: &[String],
    workflow: Option<&str>,
) -> Result<()> {
    let workflow_names = workflow.map(|w| vec![w.to_string()]).unwrap_or_default();

    let release = ctx
        .packager
        .publish_from_resources(
            tenant_id,
            namespace,
            app,
            version,
            functions.to_vec(),
            workflow_names,
        )
        .await?;

    println!(
        "published {app}@{version} -> {} (digest {})",
        release.artifact_uri, release.artifact_digest
    );
    Ok(())
}
