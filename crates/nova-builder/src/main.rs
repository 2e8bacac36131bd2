//! `nova-builder` - batch/CI entry point for the build pipeline.
//!
//! Discovers every bundle manifest under a source directory, and compiles
//! every function they declare in parallel, honoring the dependency order a
//! bundle's workflow graph (if any) describes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use futures::future::join_all;
use glob::glob;
use tokio::fs;

use nova_cli::sqlite_store::SqliteMetadataStore;
use nova_core::compiler::Compiler;
use nova_core::config::EngineConfig;
use nova_core::dag;
use nova_core::store::{Function, MetadataStore};
use nova_core::{NullReporter, Reporter};
use nova_schema::{BundleManifest, FunctionName, RuntimeId, Sha256Digest};

#[derive(Parser, Debug)]
#[command(author, version, about = "Batch compiler for Nova function bundles", long_about = None)]
struct Args {
    /// Directory containing one subdirectory per bundle, each with a
    /// `manifest.yaml` and the source files it references.
    #[arg(short, long, default_value = "bundles")]
    source_dir: PathBuf,

    /// Tenant/namespace every compiled function is recorded under.
    #[arg(long, default_value = "default")]
    tenant_id: String,

    #[arg(long, default_value = "builder")]
    namespace: String,

    /// Filter to run a single bundle by directory name.
    #[arg(short, long)]
    filter: Option<String>,

    /// Maximum parallel function compiles per layer (default: 4).
    #[arg(long, default_value_t = 4)]
    parallel: usize,

    /// Path to the state database used to record compile results.
    #[arg(long, default_value = "build-state.db")]
    state_db: PathBuf,
}

struct FunctionResult {
    name: String,
    status: nova_schema::CompileStatus,
    duration: Duration,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let start_time = Instant::now();

    let store: Arc<dyn MetadataStore> = Arc::new(SqliteMetadataStore::open(&args.state_db)?);
    let config = EngineConfig::from_env()?;
    let reporter: Arc<dyn Reporter> = Arc::new(NullReporter);
    let compiler = Compiler::new(store.clone(), config, reporter);

    println!("  discovering bundles in {}", args.source_dir.display());
    let pattern = args.source_dir.join("*").join("manifest.yaml");
    let pattern_str = pattern.to_str().context("invalid source_dir path")?;

    let mut bundles = Vec::new();
    for entry in glob(pattern_str)? {
        let manifest_path = entry?;
        let bundle_dir = manifest_path.parent().unwrap().to_path_buf();
        let bundle_name = bundle_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        if let Some(filter) = &args.filter {
            if &bundle_name != filter {
                continue;
            }
        }

        let content = fs::read(&manifest_path).await?;
        let manifest = BundleManifest::from_yaml(&content)
            .with_context(|| format!("parsing {}", manifest_path.display()))?;
        bundles.push((bundle_name, bundle_dir, manifest));
    }

    println!("  found {} bundles", bundles.len());

    let mut all_results: Vec<FunctionResult> = Vec::new();

    for (bundle_name, bundle_dir, manifest) in &bundles {
        println!();
        println!("  bundle {bundle_name}");

        let layers = build_order(manifest)?;
        println!("    build plan: {} layer(s)", layers.len());

        for layer in &layers {
            for chunk in layer.chunks(args.parallel) {
                let futures: Vec<_> = chunk
                    .iter()
                    .map(|key| {
                        let compiler = compiler.clone();
                        let store = store.clone();
                        let bundle_dir = bundle_dir.clone();
                        let tenant_id = args.tenant_id.clone();
                        let namespace = args.namespace.clone();
                        let spec = manifest
                            .functions
                            .iter()
                            .find(|f| f.key.as_str() == key)
                            .cloned()
                            .expect("layer key must name a manifest function");

                        async move {
                            let start = Instant::now();
                            let result =
                                compile_one(&compiler, &store, &bundle_dir, &tenant_id, &namespace, &spec)
                                    .await;
                            let duration = start.elapsed();
                            match result {
                                Ok(status) => FunctionResult { name: spec.key.as_str().to_string(), status, duration },
                                Err(e) => {
                                    eprintln!("    error: {}: {e:#}", spec.key.as_str());
                                    FunctionResult {
                                        name: spec.key.as_str().to_string(),
                                        status: nova_schema::CompileStatus::Failed,
                                        duration,
                                    }
                                }
                            }
                        }
                    })
                    .collect();

                all_results.extend(join_all(futures).await);
            }
        }
    }

    let total_duration = start_time.elapsed();
    let succeeded = all_results
        .iter()
        .filter(|r| matches!(r.status, nova_schema::CompileStatus::Success | nova_schema::CompileStatus::NotRequired))
        .count();
    let failed = all_results
        .iter()
        .filter(|r| r.status == nova_schema::CompileStatus::Failed)
        .count();

    println!();
    println!("  summary");
    for r in &all_results {
        println!("    {} {:?} ({:.1}s)", r.name, r.status, r.duration.as_secs_f64());
    }
    println!();
    println!(
        "  {succeeded} succeeded, {failed} failed in {:.1}s",
        total_duration.as_secs_f64()
    );

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Layer a bundle's functions by its workflow dependency graph, if it has
/// one. A function-only bundle has no declared ordering and builds as one
/// layer.
fn build_order(manifest: &BundleManifest) -> Result<Vec<Vec<String>>> {
    let Some(workflow) = &manifest.workflow else {
        return Ok(vec![manifest.functions.iter().map(|f| f.key.as_str().to_string()).collect()]);
    };

    let node_to_fn: HashMap<&str, &str> = workflow
        .definition
        .nodes
        .iter()
        .map(|n| (n.node_key.as_str(), n.function_ref.as_str()))
        .collect();

    let nodes: Vec<String> = workflow.definition.nodes.iter().map(|n| n.node_key.clone()).collect();
    let edges: Vec<(String, String)> = workflow
        .definition
        .edges
        .iter()
        .map(|e| (e.from.clone(), e.to.clone()))
        .collect();

    dag::assert_acyclic(&nodes, &edges)?;
    let node_layers = dag::topological_layers(&nodes, &edges)?;

    Ok(node_layers
        .into_iter()
        .map(|layer| {
            layer
                .into_iter()
                .filter_map(|node_key| node_to_fn.get(node_key.as_str()).map(|f| (*f).to_string()))
                .collect()
        })
        .collect())
}

async fn compile_one(
    compiler: &Compiler,
    store: &Arc<dyn MetadataStore>,
    bundle_dir: &Path,
    tenant_id: &str,
    namespace: &str,
    spec: &nova_schema::FunctionSpec,
) -> Result<nova_schema::CompileStatus> {
    let mut files = HashMap::new();
    for relpath in &spec.files {
        let bytes = fs::read(bundle_dir.join(relpath))
            .await
            .with_context(|| format!("reading {relpath}"))?;
        files.insert(relpath.clone(), bytes);
    }
    let source = files.values().next().cloned().unwrap_or_default();

    let function_name = spec.name.clone().unwrap_or_else(|| spec.key.as_str().to_string());
    let function = Function {
        id: format!("build-{}-{}", namespace, spec.key.as_str()),
        tenant_id: tenant_id.to_string(),
        namespace: namespace.to_string(),
        name: FunctionName::new(&function_name).map_err(|e| anyhow::anyhow!(e))?,
        runtime: RuntimeId::new(spec.runtime.clone()),
        handler: spec.handler.clone(),
        code_hash: Sha256Digest::compute(&source),
        memory_mb: spec.memory_mb.get(),
        timeout_s: spec.timeout_s.get(),
        network_policy: "default".to_string(),
        env_vars: spec.env_vars.clone(),
    };

    println!("    compiling {} ({})", function.name, function.runtime);
    compiler.compile_async_with_files(function.clone(), files).await?;

    let deadline = Instant::now() + Duration::from_secs(300);
    loop {
        if let Some(result) = store.get_compile_result(&function.id).await? {
            if result.status != nova_schema::CompileStatus::Compiling {
                return Ok(result.status);
            }
        }
        if Instant::now() >= deadline {
            anyhow::bail!("timed out waiting for compile result");
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}
