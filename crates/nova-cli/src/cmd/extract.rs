//! `nova extract` - inspect a bundle archive's manifest without installing it.

use std::path::Path;

use anyhow::{Context as _, Result};
use nova_core::extractor;

/// Parse and validate the manifest embedded in `archive`, printing it as YAML.
pub async fn extract(archive: &Path) -> Result<()> {
    let bytes = tokio::fs::read(archive)
        .await
        .with_context(|| format!("reading {}", archive.display()))?;

    let manifest = extractor::extract_manifest(&bytes)?;
    extractor::validate_bundle(&manifest)?;

    println!("{}", String::from_utf8_lossy(&manifest.to_yaml()?));
    Ok(())
}
