//! Publish-then-install-then-uninstall round trip against an in-memory
//! `MetadataStore`: two functions, a workflow connecting them, a name
//! prefix, and a full reverse-order teardown.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use nova_core::artifacts::{ArtifactStore, LocalArtifactStore};
use nova_core::error::NovaError;
use nova_core::executor::Executor;
use nova_core::lock::LockManager;
use nova_core::packager::Packager;
use nova_core::planner::InstallRequest;
use nova_core::store::{
    App, CompileResult, Function, InstallJob, Installation, InstallationResource, MetadataStore,
    Workflow,
};
use nova_core::{NullReporter, Reporter};
use nova_schema::{CompileStatus, FunctionName, InstallStatus, RuntimeId, Sha256Digest};

/// A flat, `Mutex`-guarded `MetadataStore` good enough to drive the planner,
/// packager, and executor through a full round trip in-process.
#[derive(Default)]
struct InMemoryStore {
    functions: Mutex<HashMap<String, Function>>,
    compile_results: Mutex<HashMap<String, CompileResult>>,
    apps: Mutex<HashMap<(String, String), App>>,
    releases: Mutex<HashMap<(String, String), nova_core::store::AppRelease>>,
    workflows: Mutex<HashMap<String, Workflow>>,
    installations: Mutex<HashMap<String, Installation>>,
    jobs: Mutex<HashMap<String, InstallJob>>,
    resources: Mutex<HashMap<String, Vec<InstallationResource>>>,
}

#[async_trait]
impl MetadataStore for InMemoryStore {
    async fn get_function_by_name(
        &self,
        tenant_id: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Function>, NovaError> {
        Ok(self
            .functions
            .lock()
            .unwrap()
            .values()
            .find(|f| f.tenant_id == tenant_id && f.namespace == namespace && f.name.as_ref() == name)
            .cloned())
    }

    async fn get_function(&self, function_id: &str) -> Result<Option<Function>, NovaError> {
        Ok(self.functions.lock().unwrap().get(function_id).cloned())
    }

    async fn put_function(&self, function: &Function) -> Result<(), NovaError> {
        self.functions.lock().unwrap().insert(function.id.clone(), function.clone());
        Ok(())
    }

    async fn delete_function(&self, function_id: &str) -> Result<(), NovaError> {
        self.functions.lock().unwrap().remove(function_id);
        self.compile_results.lock().unwrap().remove(function_id);
        Ok(())
    }

    async fn put_compile_result(&self, result: &CompileResult) -> Result<(), NovaError> {
        self.compile_results.lock().unwrap().insert(result.function_id.clone(), result.clone());
        Ok(())
    }

    async fn get_compile_result(&self, function_id: &str) -> Result<Option<CompileResult>, NovaError> {
        Ok(self.compile_results.lock().unwrap().get(function_id).cloned())
    }

    async fn get_or_create_app(&self, tenant_id: &str, slug: &str) -> Result<App, NovaError> {
        let key = (tenant_id.to_string(), slug.to_string());
        let mut apps = self.apps.lock().unwrap();
        if let Some(app) = apps.get(&key) {
            return Ok(app.clone());
        }
        let app = App { id: format!("app-{tenant_id}-{slug}"), tenant_id: tenant_id.to_string(), slug: slug.to_string() };
        apps.insert(key, app.clone());
        Ok(app)
    }

    async fn get_release(
        &self,
        app_id: &str,
        version: &str,
    ) -> Result<Option<nova_core::store::AppRelease>, NovaError> {
        Ok(self.releases.lock().unwrap().get(&(app_id.to_string(), version.to_string())).cloned())
    }

    async fn put_release(&self, release: &nova_core::store::AppRelease) -> Result<(), NovaError> {
        self.releases
            .lock()
            .unwrap()
            .insert((release.app_id.clone(), release.version.clone()), release.clone());
        Ok(())
    }

    async fn get_workflow_by_name(
        &self,
        tenant_id: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Workflow>, NovaError> {
        Ok(self
            .workflows
            .lock()
            .unwrap()
            .values()
            .find(|w| w.tenant_id == tenant_id && w.namespace == namespace && w.name == name)
            .cloned())
    }

    async fn put_workflow(&self, workflow: &Workflow) -> Result<(), NovaError> {
        self.workflows.lock().unwrap().insert(workflow.id.clone(), workflow.clone());
        Ok(())
    }

    async fn delete_workflow(&self, workflow_id: &str) -> Result<(), NovaError> {
        self.workflows.lock().unwrap().remove(workflow_id);
        Ok(())
    }

    async fn put_installation(&self, installation: &Installation) -> Result<(), NovaError> {
        self.installations.lock().unwrap().insert(installation.id.clone(), installation.clone());
        Ok(())
    }

    async fn get_installation(&self, id: &str) -> Result<Option<Installation>, NovaError> {
        Ok(self.installations.lock().unwrap().get(id).cloned())
    }

    async fn find_installation_by_name(
        &self,
        tenant_id: &str,
        namespace: &str,
        install_name: &str,
    ) -> Result<Option<Installation>, NovaError> {
        Ok(self
            .installations
            .lock()
            .unwrap()
            .values()
            .find(|i| i.tenant_id == tenant_id && i.namespace == namespace && i.install_name == install_name)
            .cloned())
    }

    async fn delete_installation(&self, id: &str) -> Result<(), NovaError> {
        self.installations.lock().unwrap().remove(id);
        Ok(())
    }

    async fn put_job(&self, job: &InstallJob) -> Result<(), NovaError> {
        self.jobs.lock().unwrap().insert(job.installation_id.clone(), job.clone());
        Ok(())
    }

    async fn add_installation_resource(&self, resource: &InstallationResource) -> Result<(), NovaError> {
        self.resources
            .lock()
            .unwrap()
            .entry(resource.installation_id.clone())
            .or_default()
            .push(resource.clone());
        Ok(())
    }

    async fn list_installation_resources(
        &self,
        installation_id: &str,
    ) -> Result<Vec<InstallationResource>, NovaError> {
        Ok(self.resources.lock().unwrap().get(installation_id).cloned().unwrap_or_default())
    }

    async fn remove_installation_resource(
        &self,
        installation_id: &str,
        resource_name: &str,
    ) -> Result<(), NovaError> {
        if let Some(list) = self.resources.lock().unwrap().get_mut(installation_id) {
            list.retain(|r| r.resource_name != resource_name);
        }
        Ok(())
    }

    async fn known_runtime(&self, _runtime: &RuntimeId) -> Result<bool, NovaError> {
        Ok(false)
    }
}

fn function(tenant_id: &str, namespace: &str, name: &str) -> Function {
    Function {
        id: format!("fn-{name}"),
        tenant_id: tenant_id.to_string(),
        namespace: namespace.to_string(),
        name: FunctionName::new(name).unwrap(),
        runtime: RuntimeId::new("python3.12"),
        handler: "main.handler".to_string(),
        code_hash: Sha256Digest::compute(name.as_bytes()),
        memory_mb: 128,
        timeout_s: 10,
        network_policy: "default".to_string(),
        env_vars: HashMap::new(),
    }
}

async fn wait_for_terminal_status(
    store: &Arc<dyn MetadataStore>,
    installation_id: &str,
) -> Installation {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let installation = store.get_installation(installation_id).await.unwrap().unwrap();
        if !matches!(installation.status, InstallStatus::Pending | InstallStatus::Applying) {
            return installation;
        }
        if Instant::now() >= deadline {
            panic!("installation did not reach a terminal status in time");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn publish_install_uninstall_round_trip() {
    let store: Arc<dyn MetadataStore> = Arc::new(InMemoryStore::default());
    let artifact_dir = tempfile::tempdir().unwrap();
    let artifacts: Arc<dyn ArtifactStore> = Arc::new(LocalArtifactStore::new(artifact_dir.path()));
    let reporter: Arc<dyn Reporter> = Arc::new(NullReporter);

    let tenant_id = "acme";
    let namespace = "demo";

    store.put_function(&function(tenant_id, namespace, "f1")).await.unwrap();
    store
        .put_compile_result(&CompileResult {
            function_id: "fn-f1".to_string(),
            binary_bytes: Some(b"def handler(event): pass".to_vec()),
            binary_hash: None,
            status: CompileStatus::NotRequired,
            error_message: None,
        })
        .await
        .unwrap();

    store.put_function(&function(tenant_id, namespace, "f2")).await.unwrap();
    store
        .put_compile_result(&CompileResult {
            function_id: "fn-f2".to_string(),
            binary_bytes: Some(b"def handler(event): pass".to_vec()),
            binary_hash: None,
            status: CompileStatus::NotRequired,
            error_message: None,
        })
        .await
        .unwrap();

    store
        .put_workflow(&Workflow {
            id: "wf-draft".to_string(),
            tenant_id: tenant_id.to_string(),
            namespace: namespace.to_string(),
            name: "wf".to_string(),
            definition_json: r#"{
                "nodes": [
                    {"node_key": "n1", "function_name": "f1"},
                    {"node_key": "n2", "function_name": "f2"}
                ],
                "edges": [{"from": "n1", "to": "n2"}]
            }"#
            .to_string(),
        })
        .await
        .unwrap();

    let packager = Packager::new(store.clone(), artifacts.clone());
    let release = packager
        .publish_from_resources(
            tenant_id,
            namespace,
            "hello",
            "0.1.0",
            vec!["f1".to_string(), "f2".to_string()],
            vec!["wf".to_string()],
        )
        .await
        .unwrap();

    let locks = LockManager::spawn();
    let executor = Executor::new(store.clone(), artifacts.clone(), locks, reporter.clone());

    let req = InstallRequest {
        tenant_id: tenant_id.to_string(),
        namespace: namespace.to_string(),
        app_id: release.app_id.clone(),
        version: release.version.clone(),
        install_name: "hello-install".to_string(),
        name_prefix: Some("demo-".to_string()),
        dry_run: false,
        created_by: "test".to_string(),
        values_json: "{}".to_string(),
    };

    let (installation, _job) = executor.install(req).await.unwrap();
    let installation = wait_for_terminal_status(&store, &installation.id).await;
    assert_eq!(installation.status, InstallStatus::Succeeded);

    let resources = store.list_installation_resources(&installation.id).await.unwrap();
    let names: Vec<&str> = resources.iter().map(|r| r.resource_name.as_str()).collect();
    assert_eq!(names, vec!["demo-f1", "demo-f2", "demo-wf"]);

    for name in ["demo-f1", "demo-f2"] {
        assert!(store.get_function_by_name(tenant_id, namespace, name).await.unwrap().is_some());
    }
    assert!(store.get_workflow_by_name(tenant_id, namespace, "demo-wf").await.unwrap().is_some());

    executor.uninstall(tenant_id, namespace, &installation.id, false).await.unwrap();

    let remaining = store.list_installation_resources(&installation.id).await.unwrap();
    assert!(remaining.is_empty(), "expected all installation resources to be removed");

    for name in ["demo-f1", "demo-f2"] {
        assert!(store.get_function_by_name(tenant_id, namespace, name).await.unwrap().is_none());
    }
    assert!(store.get_workflow_by_name(tenant_id, namespace, "demo-wf").await.unwrap().is_none());

    assert!(
        store.get_installation(&installation.id).await.unwrap().is_none(),
        "expected the Installation row itself to be deleted, not just left in Deleting"
    );
    assert!(
        store
            .find_installation_by_name(tenant_id, namespace, "hello-install")
            .await
            .unwrap()
            .is_none()
    );

    let req = InstallRequest {
        tenant_id: tenant_id.to_string(),
        namespace: namespace.to_string(),
        app_id: release.app_id.clone(),
        version: release.version.clone(),
        install_name: "hello-install".to_string(),
        name_prefix: Some("demo-".to_string()),
        dry_run: false,
        created_by: "test".to_string(),
        values_json: "{}".to_string(),
    };
    let (reinstalled, _job) = executor.install(req).await.unwrap();
    let reinstalled = wait_for_terminal_status(&store, &reinstalled.id).await;
    assert_eq!(
        reinstalled.status,
        InstallStatus::Succeeded,
        "re-installing under the same name should succeed once the old Installation row is gone"
    );
}
