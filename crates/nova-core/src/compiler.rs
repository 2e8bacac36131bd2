//! Compiler Orchestrator (C6): the public entry point for turning function
//! source into a deployable artifact. Fans out to the source layout writer
//! (C4), the container build driver (C5), and the dependency resolver (C3).

use std::collections::HashMap;
use std::sync::Arc;

use nova_schema::{CompileStatus, Sha256Digest};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::container::{compile_container_name, BuildSpec, ContainerBuildDriver};
use crate::deps::{self, DepsCache};
use crate::error::NovaError;
use crate::reporter::Reporter;
use crate::runtime;
use crate::store::{CompileResult, Function, MetadataStore};

/// Orchestrates compile attempts for functions, delegating to C3/C4/C5 and
/// persisting status transitions through a `MetadataStore`.
#[derive(Clone)]
pub struct Compiler {
    store: Arc<dyn MetadataStore>,
    driver: Arc<ContainerBuildDriver>,
    deps_cache: Arc<DepsCache>,
    config: EngineConfig,
    reporter: Arc<dyn Reporter>,
}

impl Compiler {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        config: EngineConfig,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        let driver = Arc::new(ContainerBuildDriver::new(config.container_runtime.clone()));
        Self {
            store,
            driver,
            deps_cache: Arc::new(DepsCache::new()),
            config,
            reporter,
        }
    }

    /// Single-source compile. Interpreted runtimes resolve synchronously;
    /// compiled runtimes spawn a detached background task and return once the
    /// `compiling` status has been persisted.
    pub async fn compile_async(
        &self,
        function: Function,
        source_code: Vec<u8>,
    ) -> Result<(), NovaError> {
        let mut files = HashMap::new();
        let filename = runtime::source_filename(&function.runtime);
        files.insert(filename, source_code);
        self.compile_async_with_files(function, files).await
    }

    /// Given a multi-file function source map, resolve any recognized
    /// dependency manifest (`requirements.txt`, `package.json`, `Gemfile`,
    /// `composer.json`) via C3 and merge the result under the family's
    /// conventional subpath. Files that are not manifests pass through
    /// unchanged.
    pub async fn compile_with_deps(
        &self,
        files: HashMap<String, Vec<u8>>,
    ) -> Result<HashMap<String, Vec<u8>>, NovaError> {
        let mut enriched = files.clone();
        for (name, bytes) in &files {
            let Some(family) = deps::family_for_filename(name) else {
                continue;
            };
            let resolved = deps::resolve(&self.driver, &self.deps_cache, family, bytes).await?;
            for (relpath, contents) in resolved {
                enriched.insert(format!("{}{relpath}", family.merge_subpath()), contents);
            }
        }
        Ok(enriched)
    }

    /// Same lifecycle as [`Self::compile_async`], but `files` is projected in
    /// full via the source layout writer (C4), synthesizing any missing
    /// wrapper scaffolding the runtime family requires.
    pub async fn compile_async_with_files(
        &self,
        function: Function,
        files: HashMap<String, Vec<u8>>,
    ) -> Result<(), NovaError> {
        if !runtime::needs_compilation(&function.runtime) {
            let source = files.values().next().cloned().unwrap_or_default();
            let digest = Sha256Digest::compute(&source);
            self.store
                .put_compile_result(&CompileResult {
                    function_id: function.id.clone(),
                    binary_bytes: Some(source),
                    binary_hash: None,
                    status: CompileStatus::NotRequired,
                    error_message: None,
                })
                .await?;
            let mut updated = function;
            updated.code_hash = digest;
            self.store.put_function(&updated).await?;
            return Ok(());
        }

        self.store
            .put_compile_result(&CompileResult {
                function_id: function.id.clone(),
                binary_bytes: None,
                binary_hash: None,
                status: CompileStatus::Compiling,
                error_message: None,
            })
            .await?;

        self.reporter.compiling(function.name.as_str(), function.runtime.as_str());

        let task = self.clone();
        tokio::spawn(async move {
            task.run_compile(function, files).await;
        });

        Ok(())
    }

    /// The detached background task. Runs under a fresh context: the caller
    /// that triggered this compile may have already returned or been
    /// cancelled, and that must not abort a build already in flight.
    async fn run_compile(&self, function: Function, files: HashMap<String, Vec<u8>>) {
        let outcome = self.run_compile_inner(&function, files).await;

        let result = match outcome {
            Ok(binary) => {
                let hash = Sha256Digest::compute(&binary);
                self.reporter.compiled(function.name.as_str(), true, "");
                CompileResult {
                    function_id: function.id.clone(),
                    binary_bytes: Some(binary),
                    binary_hash: Some(hash),
                    status: CompileStatus::Success,
                    error_message: None,
                }
            }
            Err(err) => {
                self.reporter.compiled(function.name.as_str(), false, &err.to_string());
                CompileResult {
                    function_id: function.id.clone(),
                    binary_bytes: None,
                    binary_hash: None,
                    status: CompileStatus::Failed,
                    error_message: Some(err.to_string()),
                }
            }
        };

        if result.status == CompileStatus::Success {
            if let Some(hash) = result.binary_hash.clone() {
                let mut updated = function.clone();
                updated.code_hash = hash;
                let _ = self.store.put_function(&updated).await;
            }
        }

        let _ = self.store.put_compile_result(&result).await;
    }

    async fn run_compile_inner(
        &self,
        function: &Function,
        files: HashMap<String, Vec<u8>>,
    ) -> Result<Vec<u8>, NovaError> {
        let files = self.compile_with_deps(files).await?;

        let work_dir = crate::paths::new_work_dir(&format!("compile-{}", function.name.as_str()))
            .map_err(|e| NovaError::Internal(format!("create work dir: {e}")))?;

        let result = async {
            crate::layout::write_layout(&work_dir, &function.runtime, &files).await?;

            let builder = runtime::builder(&function.runtime).ok_or_else(|| {
                NovaError::Internal(format!(
                    "runtime '{}' needs compilation but has no builder image",
                    function.runtime
                ))
            })?;

            let spec = BuildSpec {
                image: builder.image,
                shell_command: builder.shell_command,
                container_name: compile_container_name(function.name.as_str()),
                output_path: "/work/handler".to_string(),
            };

            self.driver
                .build_file(&spec, &work_dir, CancellationToken::new())
                .await
        }
        .await;

        let _ = tokio::fs::remove_dir_all(&work_dir).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::NullReporter;
    use crate::store::MetadataStore;
    use async_trait::async_trait;
    use nova_schema::{FunctionName, RuntimeId};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStore {
        results: Mutex<Vec<CompileResult>>,
        functions: Mutex<Vec<Function>>,
    }

    #[async_trait]
    impl MetadataStore for FakeStore {
        async fn get_function_by_name(
            &self,
            _tenant_id: &str,
            _namespace: &str,
            _name: &str,
        ) -> Result<Option<Function>, NovaError> {
            Ok(None)
        }
        async fn put_function(&self, function: &Function) -> Result<(), NovaError> {
            self.functions.lock().unwrap().push(function.clone());
            Ok(())
        }
        async fn put_compile_result(&self, result: &CompileResult) -> Result<(), NovaError> {
            self.results.lock().unwrap().push(result.clone());
            Ok(())
        }
        async fn get_compile_result(
            &self,
            _function_id: &str,
        ) -> Result<Option<CompileResult>, NovaError> {
            Ok(None)
        }
        async fn get_release(
            &self,
            _app_id: &str,
            _version: &str,
        ) -> Result<Option<crate::store::AppRelease>, NovaError> {
            Ok(None)
        }
        async fn put_release(&self, _release: &crate::store::AppRelease) -> Result<(), NovaError> {
            Ok(())
        }
        async fn put_installation(
            &self,
            _installation: &crate::store::Installation,
        ) -> Result<(), NovaError> {
            Ok(())
        }
        async fn get_installation(
            &self,
            _id: &str,
        ) -> Result<Option<crate::store::Installation>, NovaError> {
            Ok(None)
        }
        async fn find_installation_by_name(
            &self,
            _tenant_id: &str,
            _namespace: &str,
            _install_name: &str,
        ) -> Result<Option<crate::store::Installation>, NovaError> {
            Ok(None)
        }
        async fn put_job(&self, _job: &crate::store::InstallJob) -> Result<(), NovaError> {
            Ok(())
        }
        async fn add_installation_resource(
            &self,
            _resource: &crate::store::InstallationResource,
        ) -> Result<(), NovaError> {
            Ok(())
        }
        async fn list_installation_resources(
            &self,
            _installation_id: &str,
        ) -> Result<Vec<crate::store::InstallationResource>, NovaError> {
            Ok(Vec::new())
        }
        async fn remove_installation_resource(
            &self,
            _installation_id: &str,
            _resource_name: &str,
        ) -> Result<(), NovaError> {
            Ok(())
        }
        async fn known_runtime(&self, _runtime: &RuntimeId) -> Result<bool, NovaError> {
            Ok(true)
        }
    }

    fn test_function(runtime: &str) -> Function {
        Function {
            id: "fn-1".to_string(),
            tenant_id: "t".to_string(),
            namespace: "ns".to_string(),
            name: FunctionName::new("echo").unwrap(),
            runtime: RuntimeId::new(runtime),
            handler: "main.handler".to_string(),
            code_hash: Sha256Digest::compute(b""),
            memory_mb: 128,
            timeout_s: 30,
            network_policy: "default".to_string(),
            env_vars: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn interpreted_runtime_compiles_synchronously_to_not_required() {
        let fake_store = Arc::new(FakeStore::default());
        let store: Arc<dyn MetadataStore> = fake_store.clone();
        let compiler = Compiler::new(store, EngineConfig::default(), Arc::new(NullReporter));
        let source = b"def handler(event, ctx): return event\n".to_vec();

        compiler
            .compile_async(test_function("python3.12"), source.clone())
            .await
            .unwrap();

        let results = fake_store.results.lock().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, CompileStatus::NotRequired);
        assert_eq!(results[0].binary_bytes.as_deref(), Some(source.as_slice()));
    }
}
