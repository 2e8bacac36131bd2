//! Domain entities and the opaque metadata store interface.
//!
//! `MetadataStore` is modeled the way the design calls for: an external
//! collaborator, not respecified here. `nova-cli` supplies a SQLite-backed
//! implementation (`SqliteMetadataStore`) purely so the engine can be
//! exercised end to end; a production deployment would point this trait at
//! whatever durable store backs the control plane.

use async_trait::async_trait;
use nova_schema::{
    CompileStatus, FunctionName, InstallStatus, JobOperation, JobStatus, ManagedMode,
    ReleaseDigest, ReleaseStatus, ResourceType, RuntimeId, Sha256Digest,
};
use std::collections::HashMap;

use crate::error::NovaError;

/// A user-defined function, its metadata, and its compiled or raw artifact.
#[derive(Debug, Clone)]
pub struct Function {
    pub id: String,
    pub tenant_id: String,
    pub namespace: String,
    pub name: FunctionName,
    pub runtime: RuntimeId,
    pub handler: String,
    /// Overloaded per the design notes: the source digest until the first
    /// successful compile, then the compiled-artifact digest thereafter.
    pub code_hash: Sha256Digest,
    pub memory_mb: u32,
    pub timeout_s: u32,
    pub network_policy: String,
    pub env_vars: HashMap<String, String>,
}

/// The outcome of a single compile attempt for a function.
#[derive(Debug, Clone)]
pub struct CompileResult {
    pub function_id: String,
    pub binary_bytes: Option<Vec<u8>>,
    pub binary_hash: Option<Sha256Digest>,
    pub status: CompileStatus,
    pub error_message: Option<String>,
}

/// An immutable published version of an app.
#[derive(Debug, Clone)]
pub struct AppRelease {
    pub app_id: String,
    pub version: String,
    pub manifest_json: String,
    pub artifact_uri: String,
    pub artifact_digest: ReleaseDigest,
    pub status: ReleaseStatus,
}

/// The materialization of a specific release version inside a tenant
/// namespace.
#[derive(Debug, Clone)]
pub struct Installation {
    pub id: String,
    pub tenant_id: String,
    pub namespace: String,
    pub app_id: String,
    pub release_id: String,
    pub install_name: String,
    pub status: InstallStatus,
    pub values_json: String,
    pub created_by: String,
}

/// An asynchronous install/uninstall/upgrade job against an `Installation`.
#[derive(Debug, Clone)]
pub struct InstallJob {
    pub installation_id: String,
    pub operation: JobOperation,
    pub status: JobStatus,
    pub step: String,
    pub error: Option<String>,
    pub finished_at: Option<String>,
}

/// A persistent record binding an installation to one resource it created.
#[derive(Debug, Clone)]
pub struct InstallationResource {
    pub installation_id: String,
    pub resource_type: ResourceType,
    pub resource_name: String,
    pub resource_id: String,
    pub content_digest: Sha256Digest,
    pub managed_mode: ManagedMode,
}

/// An app, the parent entity a sequence of `AppRelease`s is published under.
#[derive(Debug, Clone)]
pub struct App {
    pub id: String,
    pub tenant_id: String,
    pub slug: String,
}

/// A workflow's metadata and most recently published DAG.
#[derive(Debug, Clone)]
pub struct Workflow {
    pub id: String,
    pub tenant_id: String,
    pub namespace: String,
    pub name: String,
    pub definition_json: String,
}

/// Opaque interface over function/release/installation/workflow CRUD,
/// advisory locks, and tenant scoping. Out of scope for respecification; this
/// trait is the seam an HTTP surface's real metadata store would plug into.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get_function_by_name(
        &self,
        tenant_id: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Function>, NovaError>;

    async fn get_function(&self, function_id: &str) -> Result<Option<Function>, NovaError>;

    async fn put_function(&self, function: &Function) -> Result<(), NovaError>;

    async fn delete_function(&self, function_id: &str) -> Result<(), NovaError>;

    async fn put_compile_result(&self, result: &CompileResult) -> Result<(), NovaError>;

    async fn get_compile_result(&self, function_id: &str) -> Result<Option<CompileResult>, NovaError>;

    async fn get_or_create_app(&self, tenant_id: &str, slug: &str) -> Result<App, NovaError>;

    async fn get_release(&self, app_id: &str, version: &str) -> Result<Option<AppRelease>, NovaError>;

    async fn put_release(&self, release: &AppRelease) -> Result<(), NovaError>;

    async fn get_workflow_by_name(
        &self,
        tenant_id: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Workflow>, NovaError>;

    async fn put_workflow(&self, workflow: &Workflow) -> Result<(), NovaError>;

    async fn delete_workflow(&self, workflow_id: &str) -> Result<(), NovaError>;

    async fn put_installation(&self, installation: &Installation) -> Result<(), NovaError>;

    async fn get_installation(&self, id: &str) -> Result<Option<Installation>, NovaError>;

    async fn find_installation_by_name(
        &self,
        tenant_id: &str,
        namespace: &str,
        install_name: &str,
    ) -> Result<Option<Installation>, NovaError>;

    async fn delete_installation(&self, id: &str) -> Result<(), NovaError>;

    async fn put_job(&self, job: &InstallJob) -> Result<(), NovaError>;

    async fn add_installation_resource(
        &self,
        resource: &InstallationResource,
    ) -> Result<(), NovaError>;

    async fn list_installation_resources(
        &self,
        installation_id: &str,
    ) -> Result<Vec<InstallationResource>, NovaError>;

    async fn remove_installation_resource(
        &self,
        installation_id: &str,
        resource_name: &str,
    ) -> Result<(), NovaError>;

    async fn known_runtime(&self, runtime: &RuntimeId) -> Result<bool, NovaError>;
}
