//! Bundle Packager (C7): serializes selected functions and an optional
//! workflow into a gzip-compressed tar release archive.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;
use nova_schema::{
    BundleKey, BundleManifest, BundleNode, BundleType, FunctionSpec, ReleaseStatus, RetryPolicy,
    WorkflowDefinition, WorkflowEdge, WorkflowSpec,
};
use serde::Deserialize;
use tar::Builder;

use crate::artifacts::ArtifactStore;
use crate::error::NovaError;
use crate::extractor;
use crate::runtime;
use crate::store::{AppRelease, MetadataStore};

/// The shape a draft workflow's `definition_json` is stored in before
/// publication: nodes reference functions by name, not by sanitized bundle
/// key, since the workflow may be edited before any of its functions have
/// been bundled.
#[derive(Debug, Deserialize)]
struct DraftDefinition {
    #[serde(default)]
    nodes: Vec<DraftNode>,
    #[serde(default)]
    edges: Vec<DraftEdge>,
}

#[derive(Debug, Deserialize)]
struct DraftNode {
    node_key: String,
    function_name: String,
    #[serde(default)]
    input_mapping: HashMap<String, String>,
    #[serde(default)]
    retry_policy: Option<RetryPolicy>,
    #[serde(default)]
    timeout_s: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct DraftEdge {
    from: String,
    to: String,
}

/// Assembles release archives from existing functions and an optional
/// workflow, and publishes them through the artifact store.
pub struct Packager {
    store: Arc<dyn MetadataStore>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl Packager {
    pub fn new(store: Arc<dyn MetadataStore>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self { store, artifacts }
    }

    /// Build and publish a release archive from a set of existing functions
    /// and, optionally, one existing workflow.
    pub async fn publish_from_resources(
        &self,
        tenant_id: &str,
        namespace: &str,
        app_slug: &str,
        version: &str,
        function_names: Vec<String>,
        workflow_names: Vec<String>,
    ) -> Result<AppRelease, NovaError> {
        let function_names = dedup_trim(function_names);
        let workflow_names = dedup_trim(workflow_names);

        if function_names.is_empty() {
            return Err(NovaError::Validation(
                "at least one function must be selected".to_string(),
            ));
        }
        if workflow_names.len() > 1 {
            return Err(NovaError::Validation(
                "at most one workflow may be selected".to_string(),
            ));
        }

        let mut specs = Vec::new();
        let mut files: HashMap<String, Vec<u8>> = HashMap::new();
        let mut used_keys: HashSet<String> = HashSet::new();
        let mut included_functions: HashMap<String, String> = HashMap::new();

        for name in &function_names {
            self.add_function(
                tenant_id,
                namespace,
                name,
                &mut specs,
                &mut files,
                &mut used_keys,
                &mut included_functions,
            )
            .await?;
        }

        let workflow = if let Some(workflow_name) = workflow_names.into_iter().next() {
            Some(
                self.build_workflow_spec(
                    tenant_id,
                    namespace,
                    &workflow_name,
                    &mut specs,
                    &mut files,
                    &mut used_keys,
                    &mut included_functions,
                )
                .await?,
            )
        } else {
            None
        };

        specs.sort_by(|a, b| a.key.as_str().cmp(b.key.as_str()));

        let manifest = BundleManifest {
            name: app_slug.to_string(),
            version: version.to_string(),
            kind: if workflow.is_some() { BundleType::Workflow } else { BundleType::Function },
            description: String::new(),
            functions: specs,
            workflow,
        };

        let archive_bytes = build_archive(&manifest, &files)?;
        self.publish(tenant_id, app_slug, version, &archive_bytes).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn add_function(
        &self,
        tenant_id: &str,
        namespace: &str,
        name: &str,
        specs: &mut Vec<FunctionSpec>,
        files: &mut HashMap<String, Vec<u8>>,
        used_keys: &mut HashSet<String>,
        included: &mut HashMap<String, String>,
    ) -> Result<String, NovaError> {
        let function = self
            .store
            .get_function_by_name(tenant_id, namespace, name)
            .await?
            .ok_or_else(|| NovaError::NotFound(format!("function '{name}' not found")))?;

        if let Some(key) = included.get(&function.id) {
            return Ok(key.clone());
        }

        let compile_result = self
            .store
            .get_compile_result(&function.id)
            .await?
            .ok_or_else(|| NovaError::NotFound(format!("no compile result for function '{name}'")))?;
        let source = compile_result
            .binary_bytes
            .filter(|b| !b.is_empty())
            .ok_or_else(|| NovaError::Validation(format!("function '{name}' has empty source")))?;

        let key = unique_key(name, used_keys);
        let source_filename = runtime::source_filename(&function.runtime);
        let path = format!("functions/{key}/{source_filename}");
        files.insert(path.clone(), source);

        specs.push(FunctionSpec {
            key: BundleKey::new(&key).map_err(|e| NovaError::Internal(e.to_string()))?,
            name: None,
            runtime: function.runtime.to_string(),
            handler: function.handler.clone(),
            files: vec![path],
            memory_mb: nova_schema::MemoryMb::new(function.memory_mb)
                .map_err(|e| NovaError::Internal(e.to_string()))?,
            timeout_s: nova_schema::TimeoutSeconds::new(function.timeout_s)
                .map_err(|e| NovaError::Internal(e.to_string()))?,
            env_vars: function.env_vars.clone(),
            description: String::new(),
        });

        included.insert(function.id.clone(), key.clone());
        Ok(key)
    }

    #[allow(clippy::too_many_arguments)]
    async fn build_workflow_spec(
        &self,
        tenant_id: &str,
        namespace: &str,
        workflow_name: &str,
        specs: &mut Vec<FunctionSpec>,
        files: &mut HashMap<String, Vec<u8>>,
        used_keys: &mut HashSet<String>,
        included: &mut HashMap<String, String>,
    ) -> Result<WorkflowSpec, NovaError> {
        let workflow = self
            .store
            .get_workflow_by_name(tenant_id, namespace, workflow_name)
            .await?
            .ok_or_else(|| NovaError::NotFound(format!("workflow '{workflow_name}' not found")))?;

        let draft: DraftDefinition = serde_json::from_str(&workflow.definition_json)
            .map_err(|e| NovaError::Internal(format!("parse stored workflow definition: {e}")))?;

        let mut nodes = Vec::with_capacity(draft.nodes.len());
        for node in draft.nodes {
            let key = self
                .add_function(
                    tenant_id,
                    namespace,
                    &node.function_name,
                    specs,
                    files,
                    used_keys,
                    included,
                )
                .await?;
            nodes.push(BundleNode {
                node_key: node.node_key,
                function_ref: BundleKey::new(&key).map_err(|e| NovaError::Internal(e.to_string()))?,
                input_mapping: node.input_mapping,
                retry_policy: node.retry_policy,
                timeout_s: node.timeout_s,
            });
        }

        let edges = draft
            .edges
            .into_iter()
            .map(|e| WorkflowEdge { from: e.from, to: e.to })
            .collect();

        Ok(WorkflowSpec {
            name: Some(workflow_name.to_string()),
            description: String::new(),
            definition: WorkflowDefinition { nodes, edges },
        })
    }

    async fn publish(
        &self,
        tenant_id: &str,
        app_slug: &str,
        version: &str,
        archive_bytes: &[u8],
    ) -> Result<AppRelease, NovaError> {
        let manifest = extractor::extract_manifest(archive_bytes)?;
        extractor::validate_bundle(&manifest)?;

        let app = self.store.get_or_create_app(tenant_id, app_slug).await?;

        if self.store.get_release(&app.id, version).await?.is_some() {
            return Err(NovaError::Conflict(format!(
                "release {app_slug}@{version} already exists"
            )));
        }

        let (uri, digest) = self.artifacts.save(archive_bytes).await?;
        let manifest_json = serde_json::to_string(&manifest)
            .map_err(|e| NovaError::Internal(format!("serialize manifest: {e}")))?;

        let release = AppRelease {
            app_id: app.id,
            version: version.to_string(),
            manifest_json,
            artifact_uri: uri,
            artifact_digest: digest,
            status: ReleaseStatus::Published,
        };
        self.store.put_release(&release).await?;
        Ok(release)
    }
}

fn dedup_trim(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty() && seen.insert(n.clone()))
        .collect()
}

fn unique_key(name: &str, used: &mut HashSet<String>) -> String {
    let base = BundleKey::sanitize(name).as_str().to_string();
    if used.insert(base.clone()) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}-{n}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn build_archive(
    manifest: &BundleManifest,
    files: &HashMap<String, Vec<u8>>,
) -> Result<Vec<u8>, NovaError> {
    let manifest_bytes = manifest
        .to_yaml()
        .map_err(|e| NovaError::Internal(format!("serialize manifest.yaml: {e}")))?;

    let mut sorted_paths: Vec<&String> = files.keys().collect();
    sorted_paths.sort();

    let mut tar_bytes = Vec::new();
    {
        let mut builder = Builder::new(&mut tar_bytes);
        append(&mut builder, "manifest.yaml", &manifest_bytes)?;
        for path in sorted_paths {
            append(&mut builder, path, &files[path])?;
        }
        builder
            .finish()
            .map_err(|e| NovaError::Internal(format!("finish tar archive: {e}")))?;
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&tar_bytes)
        .map_err(|e| NovaError::Internal(format!("gzip archive: {e}")))?;
    encoder
        .finish()
        .map_err(|e| NovaError::Internal(format!("finish gzip stream: {e}")))
}

fn append(
    builder: &mut Builder<&mut Vec<u8>>,
    path: &str,
    contents: &[u8],
) -> Result<(), NovaError> {
    let mut header = tar::Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, path, contents)
        .map_err(|e| NovaError::Internal(format!("append tar entry '{path}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_trim_drops_blanks_and_duplicates() {
        let result = dedup_trim(vec![
            " greet ".to_string(),
            "greet".to_string(),
            "".to_string(),
            "other".to_string(),
        ]);
        assert_eq!(result, vec!["greet".to_string(), "other".to_string()]);
    }

    #[test]
    fn unique_key_appends_suffix_on_collision() {
        let mut used = HashSet::new();
        assert_eq!(unique_key("Greet", &mut used), "greet");
        assert_eq!(unique_key("GREET", &mut used), "greet-2");
        assert_eq!(unique_key("greet!", &mut used), "greet-3");
    }
}
