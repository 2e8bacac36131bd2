//! Installation Executor (C10): applies an approved plan asynchronously,
//! tracking every created resource so a later `uninstall` can reverse it.

use std::collections::HashMap;
use std::sync::Arc;

use nova_schema::{
    FunctionName, InstallStatus, JobOperation, JobStatus, ManagedMode, ResourceType, RuntimeId,
    Sha256Digest,
};

use crate::artifacts::ArtifactStore;
use crate::error::NovaError;
use crate::extractor;
use crate::lock::LockManager;
use crate::planner::{self, InstallRequest};
use crate::reporter::Reporter;
use crate::store::{Function, Installation, InstallJob, InstallationResource, MetadataStore};

/// Executes installs and uninstalls against a `MetadataStore`, serialized
/// per namespace by a `LockManager`.
#[derive(Clone)]
pub struct Executor {
    store: Arc<dyn MetadataStore>,
    artifacts: Arc<dyn ArtifactStore>,
    locks: LockManager,
    reporter: Arc<dyn Reporter>,
}

impl Executor {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        artifacts: Arc<dyn ArtifactStore>,
        locks: LockManager,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self { store, artifacts, locks, reporter }
    }

    /// Validate, lock, and kick off an install. Returns once the
    /// `Installation`/`InstallJob` rows are persisted; the apply itself runs
    /// in a detached background task.
    pub async fn install(&self, req: InstallRequest) -> Result<(Installation, InstallJob), NovaError> {
        if !req.dry_run {
            let plan = planner::plan(&self.store, &req).await?;
            if !plan.valid {
                return Err(NovaError::Validation(format!(
                    "plan invalid: conflicts={:?} missing_runtimes={:?} errors={:?}",
                    plan.conflicts, plan.missing_runtimes, plan.errors
                )));
            }
        }

        if !self.locks.acquire(&req.tenant_id, &req.namespace).await {
            return Err(NovaError::LockBusy(format!(
                "namespace {}/{} is locked by another install",
                req.tenant_id, req.namespace
            )));
        }

        let result = self.install_locked(&req).await;
        if result.is_err() {
            self.locks.release(&req.tenant_id, &req.namespace).await;
        }
        result
    }

    async fn install_locked(
        &self,
        req: &InstallRequest,
    ) -> Result<(Installation, InstallJob), NovaError> {
        if self
            .store
            .find_installation_by_name(&req.tenant_id, &req.namespace, &req.install_name)
            .await?
            .is_some()
        {
            return Err(NovaError::Conflict(format!(
                "installation '{}' already exists in {}/{}",
                req.install_name, req.tenant_id, req.namespace
            )));
        }

        let installation = Installation {
            id: new_id("install"),
            tenant_id: req.tenant_id.clone(),
            namespace: req.namespace.clone(),
            app_id: req.app_id.clone(),
            release_id: format!("{}@{}", req.app_id, req.version),
            install_name: req.install_name.clone(),
            status: InstallStatus::Pending,
            values_json: req.values_json.clone(),
            created_by: req.created_by.clone(),
        };
        self.store.put_installation(&installation).await?;

        let job = InstallJob {
            installation_id: installation.id.clone(),
            operation: JobOperation::Install,
            status: JobStatus::Planning,
            step: "planning".to_string(),
            error: None,
            finished_at: None,
        };
        self.store.put_job(&job).await?;

        let task = self.clone();
        let apply_req = req.clone();
        let apply_installation = installation.clone();
        tokio::spawn(async move {
            task.apply(apply_installation, apply_req).await;
        });

        Ok((installation, job))
    }

    async fn apply(&self, installation: Installation, req: InstallRequest) {
        let outcome = self.apply_inner(&installation, &req).await;
        self.locks.release(&req.tenant_id, &req.namespace).await;

        let mut job = InstallJob {
            installation_id: installation.id.clone(),
            operation: JobOperation::Install,
            status: JobStatus::Succeeded,
            step: "done".to_string(),
            error: None,
            finished_at: Some(chrono::Utc::now().to_rfc3339()),
        };
        let mut installation = installation;

        if let Err(e) = outcome {
            job.status = JobStatus::Failed;
            job.step = "applying".to_string();
            job.error = Some(e.to_string());
            installation.status = InstallStatus::Failed;
            self.reporter.error(&format!("install '{}' failed: {e}", installation.install_name));
        } else {
            installation.status = InstallStatus::Succeeded;
            self.reporter.success(&format!("install '{}' succeeded", installation.install_name));
        }

        let _ = self.store.put_installation(&installation).await;
        let _ = self.store.put_job(&job).await;
    }

    async fn apply_inner(&self, installation: &Installation, req: &InstallRequest) -> Result<(), NovaError> {
        let release = self
            .store
            .get_release(&req.app_id, &req.version)
            .await?
            .ok_or_else(|| NovaError::NotFound(format!("release {}@{} not found", req.app_id, req.version)))?;

        let archive_bytes = self.artifacts.get(&release.artifact_uri).await?;
        let dest_dir = crate::paths::new_work_dir(&format!("install-{}", installation.id))
            .map_err(|e| NovaError::Internal(format!("create install work dir: {e}")))?;
        let manifest = extractor::download_bundle(&archive_bytes, &dest_dir).await?;

        let prefix = req.name_prefix.as_deref();
        let mut installed_names: HashMap<String, String> = HashMap::new();

        for spec in &manifest.functions {
            let source = read_concatenated(&dest_dir, &spec.files).await?;
            let effective = planner::effective_name(prefix, spec.key.as_str(), spec.name.as_deref());

            let function = Function {
                id: new_id("fn"),
                tenant_id: req.tenant_id.clone(),
                namespace: req.namespace.clone(),
                name: FunctionName::new(&effective)
                    .map_err(|e| NovaError::Validation(e.to_string()))?,
                runtime: RuntimeId::new(spec.runtime.clone()),
                handler: spec.handler.clone(),
                code_hash: Sha256Digest::compute(&source),
                memory_mb: spec.memory_mb.get(),
                timeout_s: spec.timeout_s.get(),
                network_policy: "default".to_string(),
                env_vars: spec.env_vars.clone(),
            };
            self.store.put_function(&function).await?;
            self.reporter.resource_created("function", &effective);

            self.store
                .add_installation_resource(&InstallationResource {
                    installation_id: installation.id.clone(),
                    resource_type: ResourceType::Function,
                    resource_name: effective.clone(),
                    resource_id: function.id.clone(),
                    content_digest: Sha256Digest::compute(&source),
                    managed_mode: ManagedMode::Exclusive,
                })
                .await?;

            installed_names.insert(spec.key.as_str().to_string(), effective);
        }

        if let Some(workflow) = &manifest.workflow {
            let mut resolved_nodes = Vec::with_capacity(workflow.definition.nodes.len());
            for node in &workflow.definition.nodes {
                let installed = installed_names.get(node.function_ref.as_str()).ok_or_else(|| {
                    NovaError::UnresolvedReference(format!(
                        "workflow node '{}' references unresolved function '{}'",
                        node.node_key, node.function_ref
                    ))
                })?;
                resolved_nodes.push((node.node_key.clone(), installed.clone()));
            }

            let workflow_key = workflow.name.clone().unwrap_or_else(|| "workflow".to_string());
            let effective = planner::effective_name(prefix, &workflow_key, None);

            let definition_json = serde_json::to_string(&resolved_nodes)
                .map_err(|e| NovaError::Internal(format!("serialize resolved workflow: {e}")))?;

            let workflow_id = new_id("wf");
            self.store
                .put_workflow(&crate::store::Workflow {
                    id: workflow_id.clone(),
                    tenant_id: req.tenant_id.clone(),
                    namespace: req.namespace.clone(),
                    name: effective.clone(),
                    definition_json,
                })
                .await?;
            self.reporter.resource_created("workflow", &effective);

            self.store
                .add_installation_resource(&InstallationResource {
                    installation_id: installation.id.clone(),
                    resource_type: ResourceType::Workflow,
                    resource_name: effective.clone(),
                    resource_id: workflow_id,
                    content_digest: Sha256Digest::compute(workflow_key.as_bytes()),
                    managed_mode: ManagedMode::Exclusive,
                })
                .await?;
        }

        let _ = tokio::fs::remove_dir_all(&dest_dir).await;
        Ok(())
    }

    /// Delete every tracked resource for `installation_id` in reverse
    /// creation order, then the `Installation` row itself. A failure stops
    /// the loop unless `force` is set, in which case it continues regardless.
    pub async fn uninstall(&self, tenant_id: &str, namespace: &str, installation_id: &str, force: bool) -> Result<(), NovaError> {
        if !self.locks.acquire(tenant_id, namespace).await {
            return Err(NovaError::LockBusy(format!("namespace {tenant_id}/{namespace} is locked")));
        }
        let result = self.uninstall_locked(tenant_id, namespace, installation_id, force).await;
        self.locks.release(tenant_id, namespace).await;
        result
    }

    async fn uninstall_locked(
        &self,
        _tenant_id: &str,
        _namespace: &str,
        installation_id: &str,
        force: bool,
    ) -> Result<(), NovaError> {
        let mut installation = self
            .store
            .get_installation(installation_id)
            .await?
            .ok_or_else(|| NovaError::NotFound(format!("installation '{installation_id}' not found")))?;
        installation.status = InstallStatus::Deleting;
        self.store.put_installation(&installation).await?;

        let mut resources = self.store.list_installation_resources(installation_id).await?;
        resources.reverse();

        for resource in &resources {
            let deletion = match resource.resource_type {
                ResourceType::Function => self.store.delete_function(&resource.resource_id).await,
                ResourceType::Workflow => self.store.delete_workflow(&resource.resource_id).await,
            };
            if let Err(e) = deletion {
                if !force {
                    return Err(e);
                }
                self.reporter.warning(&format!(
                    "force-continuing past delete failure for '{}': {e}",
                    resource.resource_name
                ));
            }
            self.store
                .remove_installation_resource(installation_id, &resource.resource_name)
                .await?;
            self.reporter.resource_deleted(
                match resource.resource_type {
                    ResourceType::Function => "function",
                    ResourceType::Workflow => "workflow",
                },
                &resource.resource_name,
            );
        }

        self.store.delete_installation(installation_id).await?;
        Ok(())
    }
}

async fn read_concatenated(dest_dir: &std::path::Path, relpaths: &[String]) -> Result<Vec<u8>, NovaError> {
    let mut parts = Vec::with_capacity(relpaths.len());
    for relpath in relpaths {
        let bytes = tokio::fs::read(dest_dir.join(relpath))
            .await
            .map_err(|e| NovaError::Internal(format!("read bundled source '{relpath}': {e}")))?;
        parts.push(bytes);
    }
    Ok(parts.join(&b'\n'))
}

fn new_id(prefix: &str) -> String {
    format!("{prefix}-{:016x}", rand::random::<u64>())
}
