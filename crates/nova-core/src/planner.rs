//! Installation Planner (C9): dry-run conflict, missing-runtime, and quota
//! probing against a snapshot of the metadata store. Purely observational:
//! nothing here reserves a name.

use std::sync::Arc;

use nova_schema::{BundleManifest, ReleaseStatus, ResourceType};

use crate::error::NovaError;
use crate::store::MetadataStore;

/// One function or workflow name already present under the target
/// namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub resource_type: ResourceType,
    pub name: String,
}

/// The result of planning an installation.
#[derive(Debug, Clone, Default)]
pub struct InstallationPlan {
    pub valid: bool,
    pub to_create: Vec<String>,
    pub conflicts: Vec<Conflict>,
    pub missing_runtimes: Vec<String>,
    pub errors: Vec<String>,
}

/// The parameters of a prospective installation.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub tenant_id: String,
    pub namespace: String,
    pub app_id: String,
    pub version: String,
    pub install_name: String,
    pub name_prefix: Option<String>,
    pub dry_run: bool,
    pub created_by: String,
    pub values_json: String,
}

/// Built-in runtimes the runtime registry always recognizes without a store
/// probe.
const BUILT_IN_RUNTIMES: &[&str] = &[
    "python3.12", "node20", "ruby3.3", "php8", "go1.23", "rust1.80",
];

/// Resolve the effective name a bundled resource will be created under: an
/// absolute name if the manifest set one, otherwise `prefix + key` with the
/// prefix normalized to end in `-` when non-empty.
pub fn effective_name(prefix: Option<&str>, key: &str, absolute_name: Option<&str>) -> String {
    if let Some(name) = absolute_name {
        return name.to_string();
    }
    match prefix {
        Some(p) if !p.is_empty() => {
            let p = if p.ends_with('-') { p.to_string() } else { format!("{p}-") };
            format!("{p}{key}")
        }
        _ => key.to_string(),
    }
}

/// Dry-run a prospective installation against `req`, probing the store for
/// name collisions and missing runtimes.
pub async fn plan(
    store: &Arc<dyn MetadataStore>,
    req: &InstallRequest,
) -> Result<InstallationPlan, NovaError> {
    let mut result = InstallationPlan::default();

    let Some(release) = store.get_release(&req.app_id, &req.version).await? else {
        result.errors.push(format!("release {}@{} not found", req.app_id, req.version));
        return Ok(result);
    };

    if release.status != ReleaseStatus::Published {
        result.errors.push(format!(
            "release {}@{} is not published (status: {:?})",
            req.app_id, req.version, release.status
        ));
        return Ok(result);
    }

    let manifest: BundleManifest = serde_json::from_str(&release.manifest_json)
        .map_err(|e| NovaError::Internal(format!("parse release manifest: {e}")))?;

    let prefix = req.name_prefix.as_deref();

    for function in &manifest.functions {
        let name = effective_name(prefix, function.key.as_str(), function.name.as_deref());
        match store.get_function_by_name(&req.tenant_id, &req.namespace, &name).await? {
            Some(_) => result.conflicts.push(Conflict { resource_type: ResourceType::Function, name }),
            None => result.to_create.push(name),
        }

        if !BUILT_IN_RUNTIMES.contains(&function.runtime.as_str())
            && !store.known_runtime(&nova_schema::RuntimeId::new(function.runtime.clone())).await?
        {
            if !result.missing_runtimes.contains(&function.runtime) {
                result.missing_runtimes.push(function.runtime.clone());
            }
        }
    }

    if let Some(workflow) = &manifest.workflow {
        let key = workflow.name.as_deref().unwrap_or("workflow");
        let name = effective_name(prefix, key, None);
        match store.get_workflow_by_name(&req.tenant_id, &req.namespace, &name).await? {
            Some(_) => result.conflicts.push(Conflict { resource_type: ResourceType::Workflow, name }),
            None => result.to_create.push(name),
        }
    }

    result.valid =
        result.conflicts.is_empty() && result.missing_runtimes.is_empty() && result.errors.is_empty();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_name_normalizes_prefix_to_end_in_dash() {
        assert_eq!(effective_name(Some("demo"), "greet", None), "demo-greet");
        assert_eq!(effective_name(Some("demo-"), "greet", None), "demo-greet");
        assert_eq!(effective_name(None, "greet", None), "greet");
    }

    #[test]
    fn effective_name_prefers_absolute_name() {
        assert_eq!(effective_name(Some("demo"), "greet", Some("custom")), "custom");
    }
}
