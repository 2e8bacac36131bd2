//! Wires the engine's components together for the CLI frontend: the
//! metadata store, artifact store, compiler, packager, executor, and lock
//! manager share one `Context` per process invocation.

use std::sync::Arc;

use nova_core::artifacts::{ArtifactStore, LocalArtifactStore};
use nova_core::compiler::Compiler;
use nova_core::config::EngineConfig;
use nova_core::executor::Executor;
use nova_core::lock::LockManager;
use nova_core::packager::Packager;
use nova_core::store::MetadataStore;
use nova_core::{NullReporter, Reporter};

use crate::sqlite_store::SqliteMetadataStore;

/// Everything a CLI command needs to drive the engine.
pub struct Context {
    /// Metadata store backing functions, releases, workflows, and installations.
    pub store: Arc<dyn MetadataStore>,
    /// Content-addressed store for compiled binaries and release archives.
    pub artifacts: Arc<dyn ArtifactStore>,
    /// Drives function compilation.
    pub compiler: Compiler,
    /// Bundles resources into release archives and publishes them.
    pub packager: Packager,
    /// Applies and reverses installations.
    pub executor: Executor,
    /// Sink for progress/lifecycle events emitted by the above.
    pub reporter: Arc<dyn Reporter>,
}

impl Context {
    /// Build a context from the process environment: opens (or creates) the
    /// SQLite state database under the Nova home directory, resolves the
    /// artifact store per `NOVA_ARTIFACT_STORE_*`, and wires up the engine.
    pub async fn from_env() -> anyhow::Result<Self> {
        std::fs::create_dir_all(nova_core::nova_home())?;
        let config = EngineConfig::from_env()?;
        let reporter: Arc<dyn Reporter> = Arc::new(NullReporter);

        let store: Arc<dyn MetadataStore> = Arc::new(SqliteMetadataStore::open(nova_core::db_path())?);

        let artifacts: Arc<dyn ArtifactStore> = resolve_artifact_store(&config).await?;

        let compiler = Compiler::new(store.clone(), config.clone(), reporter.clone());
        let packager = Packager::new(store.clone(), artifacts.clone());
        let locks = LockManager::spawn();
        let executor = Executor::new(store.clone(), artifacts.clone(), locks, reporter.clone());

        Ok(Self { store, artifacts, compiler, packager, executor, reporter })
    }
}

#[cfg(not(feature = "upload"))]
async fn resolve_artifact_store(config: &EngineConfig) -> anyhow::Result<Arc<dyn ArtifactStore>> {
    if config.artifact_store.is_some() {
        anyhow::bail!(
            "NOVA_ARTIFACT_STORE_* is set but this build was compiled without the `upload` feature"
        );
    }
    Ok(Arc::new(LocalArtifactStore::new(nova_core::artifacts_path())))
}

#[cfg(feature = "upload")]
async fn resolve_artifact_store(config: &EngineConfig) -> anyhow::Result<Arc<dyn ArtifactStore>> {
    use nova_core::artifacts::S3ArtifactStore;

    match &config.artifact_store {
        Some(s3_config) => Ok(Arc::new(S3ArtifactStore::connect(s3_config).await?)),
        None => Ok(Arc::new(LocalArtifactStore::new(nova_core::artifacts_path()))),
    }
}
