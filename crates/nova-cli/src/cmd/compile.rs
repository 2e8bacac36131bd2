//! `nova compile` - recompile a single function from its source file.

use std::path::Path;

use anyhow::{Context as _, Result};

use crate::context::Context;

/// Recompile `function_id` from the source file at `source`, dispatching the
/// build and reporting whatever status is visible once it's dispatched.
pub async fn compile(ctx: &Context, function_id: &str, source: &Path) -> Result<()> {
    let function = ctx
        .store
        .get_function(function_id)
        .await?
        .with_context(|| format!("function '{function_id}' not found"))?;

    let source_code = tokio::fs::read(source)
        .await
        .with_context(|| format!("reading {}", source.display()))?;

    println!("compiling '{}' ({})...", function.name, function.runtime);
    ctx.compiler.compile_async(function.clone(), source_code).await?;

    match ctx.store.get_compile_result(&function.id).await? {
        Some(result) => println!("compile status: {:?}", result.status),
        None => println!("compile dispatched"),
    }
    Ok(())
}
