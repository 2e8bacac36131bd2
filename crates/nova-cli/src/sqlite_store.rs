//! `SqliteMetadataStore`: a `rusqlite`-backed `MetadataStore`.
//!
//! `rusqlite::Connection` is `Send` but not `Sync`, so every call hands the
//! shared connection to a blocking-pool thread rather than holding it across
//! an `.await` point — the same non-`Sync`-driver constraint that pushes the
//! teacher's state database behind a dedicated actor thread, solved here
//! with `spawn_blocking` instead since the call surface is a flat CRUD trait
//! rather than a multi-step transactional flow.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nova_core::error::NovaError;
use nova_core::store::{
    App, CompileResult, Function, InstallJob, Installation, InstallationResource, MetadataStore,
    Workflow,
};
use nova_schema::{
    CompileStatus, FunctionName, InstallStatus, ManagedMode, ReleaseDigest, ReleaseStatus,
    ResourceType, RuntimeId, Sha256Digest,
};
use rusqlite::{params, Connection, OptionalExtension};

/// A `MetadataStore` backed by a single SQLite file.
pub struct SqliteMetadataStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMetadataStore {
    /// Open (creating if absent) the database at `path` and ensure its schema exists.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, NovaError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("sqlite connection mutex poisoned");
            f(&conn)
        })
        .await
        .map_err(|e| NovaError::StoreError(format!("sqlite task panicked: {e}")))?
        .map_err(|e| NovaError::StoreError(e.to_string()))
    }
}

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS functions (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    namespace TEXT NOT NULL,
    name TEXT NOT NULL,
    runtime TEXT NOT NULL,
    handler TEXT NOT NULL,
    code_hash TEXT NOT NULL,
    memory_mb INTEGER NOT NULL,
    timeout_s INTEGER NOT NULL,
    network_policy TEXT NOT NULL,
    env_vars_json TEXT NOT NULL,
    UNIQUE(tenant_id, namespace, name)
);
CREATE TABLE IF NOT EXISTS compile_results (
    function_id TEXT PRIMARY KEY,
    binary_bytes BLOB,
    binary_hash TEXT,
    status TEXT NOT NULL,
    error_message TEXT
);
CREATE TABLE IF NOT EXISTS apps (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    slug TEXT NOT NULL,
    UNIQUE(tenant_id, slug)
);
CREATE TABLE IF NOT EXISTS releases (
    app_id TEXT NOT NULL,
    version TEXT NOT NULL,
    manifest_json TEXT NOT NULL,
    artifact_uri TEXT NOT NULL,
    artifact_digest TEXT NOT NULL,
    status TEXT NOT NULL,
    PRIMARY KEY (app_id, version)
);
CREATE TABLE IF NOT EXISTS workflows (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    namespace TEXT NOT NULL,
    name TEXT NOT NULL,
    definition_json TEXT NOT NULL,
    UNIQUE(tenant_id, namespace, name)
);
CREATE TABLE IF NOT EXISTS installations (
    id TEXT PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    namespace TEXT NOT NULL,
    app_id TEXT NOT NULL,
    release_id TEXT NOT NULL,
    install_name TEXT NOT NULL,
    status TEXT NOT NULL,
    values_json TEXT NOT NULL,
    created_by TEXT NOT NULL,
    UNIQUE(tenant_id, namespace, install_name)
);
CREATE TABLE IF NOT EXISTS install_jobs (
    installation_id TEXT PRIMARY KEY,
    operation TEXT NOT NULL,
    status TEXT NOT NULL,
    step TEXT NOT NULL,
    error TEXT,
    finished_at TEXT
);
CREATE TABLE IF NOT EXISTS installation_resources (
    installation_id TEXT NOT NULL,
    resource_type TEXT NOT NULL,
    resource_name TEXT NOT NULL,
    resource_id TEXT NOT NULL,
    content_digest TEXT NOT NULL,
    managed_mode TEXT NOT NULL,
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    UNIQUE(installation_id, resource_name)
);
CREATE TABLE IF NOT EXISTS known_runtimes (
    runtime TEXT PRIMARY KEY
);
";

fn json_map(s: &str) -> HashMap<String, String> {
    serde_json::from_str(s).unwrap_or_default()
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn get_function_by_name(
        &self,
        tenant_id: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Function>, NovaError> {
        let tenant_id = tenant_id.to_string();
        let namespace = namespace.to_string();
        let name = name.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, tenant_id, namespace, name, runtime, handler, code_hash, memory_mb, timeout_s, network_policy, env_vars_json
                 FROM functions WHERE tenant_id = ?1 AND namespace = ?2 AND name = ?3",
                params![tenant_id, namespace, name],
                row_to_function,
            )
            .optional()
        })
        .await
    }

    async fn get_function(&self, function_id: &str) -> Result<Option<Function>, NovaError> {
        let function_id = function_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, tenant_id, namespace, name, runtime, handler, code_hash, memory_mb, timeout_s, network_policy, env_vars_json
                 FROM functions WHERE id = ?1",
                params![function_id],
                row_to_function,
            )
            .optional()
        })
        .await
    }

    async fn put_function(&self, function: &Function) -> Result<(), NovaError> {
        let function = function.clone();
        self.with_conn(move |conn| {
            let env_vars_json = serde_json::to_string(&function.env_vars).unwrap_or_default();
            conn.execute(
                "INSERT INTO functions (id, tenant_id, namespace, name, runtime, handler, code_hash, memory_mb, timeout_s, network_policy, env_vars_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(id) DO UPDATE SET
                    runtime = excluded.runtime, handler = excluded.handler, code_hash = excluded.code_hash,
                    memory_mb = excluded.memory_mb, timeout_s = excluded.timeout_s,
                    network_policy = excluded.network_policy, env_vars_json = excluded.env_vars_json",
                params![
                    function.id, function.tenant_id, function.namespace, function.name.as_str(),
                    function.runtime.as_str(), function.handler, function.code_hash.as_str(),
                    function.memory_mb, function.timeout_s, function.network_policy, env_vars_json,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete_function(&self, function_id: &str) -> Result<(), NovaError> {
        let function_id = function_id.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM functions WHERE id = ?1", params![function_id])?;
            conn.execute("DELETE FROM compile_results WHERE function_id = ?1", params![function_id])?;
            Ok(())
        })
        .await
    }

    async fn put_compile_result(&self, result: &CompileResult) -> Result<(), NovaError> {
        let result = result.clone();
        self.with_conn(move |conn| {
            let status = serde_json::to_string(&result.status).unwrap_or_default();
            conn.execute(
                "INSERT INTO compile_results (function_id, binary_bytes, binary_hash, status, error_message)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(function_id) DO UPDATE SET
                    binary_bytes = excluded.binary_bytes, binary_hash = excluded.binary_hash,
                    status = excluded.status, error_message = excluded.error_message",
                params![
                    result.function_id,
                    result.binary_bytes,
                    result.binary_hash.as_ref().map(Sha256Digest::as_str),
                    status,
                    result.error_message,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_compile_result(&self, function_id: &str) -> Result<Option<CompileResult>, NovaError> {
        let function_id = function_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT function_id, binary_bytes, binary_hash, status, error_message FROM compile_results WHERE function_id = ?1",
                params![function_id],
                |row| {
                    let binary_hash: Option<String> = row.get(2)?;
                    let status: String = row.get(3)?;
                    Ok(CompileResult {
                        function_id: row.get(0)?,
                        binary_bytes: row.get(1)?,
                        binary_hash: binary_hash.and_then(|h| Sha256Digest::new(h).ok()),
                        status: serde_json::from_str(&status).unwrap_or(CompileStatus::Failed),
                        error_message: row.get(4)?,
                    })
                },
            )
            .optional()
        })
        .await
    }

    async fn get_or_create_app(&self, tenant_id: &str, slug: &str) -> Result<App, NovaError> {
        let tenant_id = tenant_id.to_string();
        let slug = slug.to_string();
        self.with_conn(move |conn| {
            if let Some(app) = conn
                .query_row(
                    "SELECT id, tenant_id, slug FROM apps WHERE tenant_id = ?1 AND slug = ?2",
                    params![tenant_id, slug],
                    |row| Ok(App { id: row.get(0)?, tenant_id: row.get(1)?, slug: row.get(2)? }),
                )
                .optional()?
            {
                return Ok(app);
            }
            let id = format!("app-{tenant_id}-{slug}");
            conn.execute(
                "INSERT INTO apps (id, tenant_id, slug) VALUES (?1, ?2, ?3)",
                params![id, tenant_id, slug],
            )?;
            Ok(App { id, tenant_id, slug })
        })
        .await
    }

    async fn get_release(&self, app_id: &str, version: &str) -> Result<Option<nova_core::store::AppRelease>, NovaError> {
        let app_id = app_id.to_string();
        let version = version.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT app_id, version, manifest_json, artifact_uri, artifact_digest, status
                 FROM releases WHERE app_id = ?1 AND version = ?2",
                params![app_id, version],
                row_to_release,
            )
            .optional()
        })
        .await
    }

    async fn put_release(&self, release: &nova_core::store::AppRelease) -> Result<(), NovaError> {
        let release = release.clone();
        self.with_conn(move |conn| {
            let status = serde_json::to_string(&release.status).unwrap_or_default();
            conn.execute(
                "INSERT INTO releases (app_id, version, manifest_json, artifact_uri, artifact_digest, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(app_id, version) DO UPDATE SET
                    manifest_json = excluded.manifest_json, artifact_uri = excluded.artifact_uri,
                    artifact_digest = excluded.artifact_digest, status = excluded.status",
                params![
                    release.app_id, release.version, release.manifest_json,
                    release.artifact_uri, release.artifact_digest.as_str(), status,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_workflow_by_name(
        &self,
        tenant_id: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Workflow>, NovaError> {
        let tenant_id = tenant_id.to_string();
        let namespace = namespace.to_string();
        let name = name.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, tenant_id, namespace, name, definition_json FROM workflows
                 WHERE tenant_id = ?1 AND namespace = ?2 AND name = ?3",
                params![tenant_id, namespace, name],
                row_to_workflow,
            )
            .optional()
        })
        .await
    }

    async fn put_workflow(&self, workflow: &Workflow) -> Result<(), NovaError> {
        let workflow = workflow.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO workflows (id, tenant_id, namespace, name, definition_json)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET definition_json = excluded.definition_json",
                params![workflow.id, workflow.tenant_id, workflow.namespace, workflow.name, workflow.definition_json],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete_workflow(&self, workflow_id: &str) -> Result<(), NovaError> {
        let workflow_id = workflow_id.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM workflows WHERE id = ?1", params![workflow_id])?;
            Ok(())
        })
        .await
    }

    async fn put_installation(&self, installation: &Installation) -> Result<(), NovaError> {
        let installation = installation.clone();
        self.with_conn(move |conn| {
            let status = serde_json::to_string(&installation.status).unwrap_or_default();
            conn.execute(
                "INSERT INTO installations (id, tenant_id, namespace, app_id, release_id, install_name, status, values_json, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET status = excluded.status",
                params![
                    installation.id, installation.tenant_id, installation.namespace, installation.app_id,
                    installation.release_id, installation.install_name, status,
                    installation.values_json, installation.created_by,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_installation(&self, id: &str) -> Result<Option<Installation>, NovaError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, tenant_id, namespace, app_id, release_id, install_name, status, values_json, created_by
                 FROM installations WHERE id = ?1",
                params![id],
                row_to_installation,
            )
            .optional()
        })
        .await
    }

    async fn find_installation_by_name(
        &self,
        tenant_id: &str,
        namespace: &str,
        install_name: &str,
    ) -> Result<Option<Installation>, NovaError> {
        let tenant_id = tenant_id.to_string();
        let namespace = namespace.to_string();
        let install_name = install_name.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, tenant_id, namespace, app_id, release_id, install_name, status, values_json, created_by
                 FROM installations WHERE tenant_id = ?1 AND namespace = ?2 AND install_name = ?3",
                params![tenant_id, namespace, install_name],
                row_to_installation,
            )
            .optional()
        })
        .await
    }

    async fn delete_installation(&self, id: &str) -> Result<(), NovaError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM installations WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
    }

    async fn put_job(&self, job: &InstallJob) -> Result<(), NovaError> {
        let job = job.clone();
        self.with_conn(move |conn| {
            let operation = serde_json::to_string(&job.operation).unwrap_or_default();
            let status = serde_json::to_string(&job.status).unwrap_or_default();
            conn.execute(
                "INSERT INTO install_jobs (installation_id, operation, status, step, error, finished_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(installation_id) DO UPDATE SET
                    operation = excluded.operation, status = excluded.status, step = excluded.step,
                    error = excluded.error, finished_at = excluded.finished_at",
                params![job.installation_id, operation, status, job.step, job.error, job.finished_at],
            )?;
            Ok(())
        })
        .await
    }

    async fn add_installation_resource(&self, resource: &InstallationResource) -> Result<(), NovaError> {
        let resource = resource.clone();
        self.with_conn(move |conn| {
            let resource_type = serde_json::to_string(&resource.resource_type).unwrap_or_default();
            let managed_mode = serde_json::to_string(&resource.managed_mode).unwrap_or_default();
            conn.execute(
                "INSERT INTO installation_resources (installation_id, resource_type, resource_name, resource_id, content_digest, managed_mode)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    resource.installation_id, resource_type, resource.resource_name,
                    resource.resource_id, resource.content_digest.as_str(), managed_mode,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_installation_resources(&self, installation_id: &str) -> Result<Vec<InstallationResource>, NovaError> {
        let installation_id = installation_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT installation_id, resource_type, resource_name, resource_id, content_digest, managed_mode
                 FROM installation_resources WHERE installation_id = ?1 ORDER BY seq ASC",
            )?;
            let rows = stmt
                .query_map(params![installation_id], row_to_resource)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    async fn remove_installation_resource(&self, installation_id: &str, resource_name: &str) -> Result<(), NovaError> {
        let installation_id = installation_id.to_string();
        let resource_name = resource_name.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM installation_resources WHERE installation_id = ?1 AND resource_name = ?2",
                params![installation_id, resource_name],
            )?;
            Ok(())
        })
        .await
    }

    async fn known_runtime(&self, runtime: &RuntimeId) -> Result<bool, NovaError> {
        let runtime = runtime.as_str().to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT 1 FROM known_runtimes WHERE runtime = ?1",
                params![runtime],
                |_| Ok(()),
            )
            .optional()
            .map(|r| r.is_some())
        })
        .await
    }
}

fn row_to_function(row: &rusqlite::Row<'_>) -> rusqlite::Result<Function> {
    let name: String = row.get(3)?;
    let code_hash: String = row.get(6)?;
    let env_vars_json: String = row.get(10)?;
    Ok(Function {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        namespace: row.get(2)?,
        name: FunctionName::new(name).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
        })?,
        runtime: RuntimeId::new(row.get::<_, String>(4)?),
        handler: row.get(5)?,
        code_hash: Sha256Digest::new(code_hash).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, e.into())
        })?,
        memory_mb: row.get(7)?,
        timeout_s: row.get(8)?,
        network_policy: row.get(9)?,
        env_vars: json_map(&env_vars_json),
    })
}

fn row_to_release(row: &rusqlite::Row<'_>) -> rusqlite::Result<nova_core::store::AppRelease> {
    let artifact_digest: String = row.get(4)?;
    let status: String = row.get(5)?;
    Ok(nova_core::store::AppRelease {
        app_id: row.get(0)?,
        version: row.get(1)?,
        manifest_json: row.get(2)?,
        artifact_uri: row.get(3)?,
        artifact_digest: ReleaseDigest::new(artifact_digest).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, e.into())
        })?,
        status: serde_json::from_str(&status).unwrap_or(ReleaseStatus::Draft),
    })
}

fn row_to_workflow(row: &rusqlite::Row<'_>) -> rusqlite::Result<Workflow> {
    Ok(Workflow {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        namespace: row.get(2)?,
        name: row.get(3)?,
        definition_json: row.get(4)?,
    })
}

fn row_to_installation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Installation> {
    let status: String = row.get(6)?;
    Ok(Installation {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        namespace: row.get(2)?,
        app_id: row.get(3)?,
        release_id: row.get(4)?,
        install_name: row.get(5)?,
        status: serde_json::from_str(&status).unwrap_or(InstallStatus::Failed),
        values_json: row.get(7)?,
        created_by: row.get(8)?,
    })
}

fn row_to_resource(row: &rusqlite::Row<'_>) -> rusqlite::Result<InstallationResource> {
    let resource_type: String = row.get(1)?;
    let content_digest: String = row.get(4)?;
    let managed_mode: String = row.get(5)?;
    Ok(InstallationResource {
        installation_id: row.get(0)?,
        resource_type: serde_json::from_str(&resource_type).unwrap_or(ResourceType::Function),
        resource_name: row.get(2)?,
        resource_id: row.get(3)?,
        content_digest: Sha256Digest::new(content_digest).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, e.into())
        })?,
        managed_mode: serde_json::from_str(&managed_mode).unwrap_or(ManagedMode::Exclusive),
    })
}

