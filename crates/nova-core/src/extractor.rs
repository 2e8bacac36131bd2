//! Bundle Extractor (C8): reads and validates a bundle archive defensively.

use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use nova_schema::BundleManifest;
use tar::Archive;

use crate::dag;
use crate::error::NovaError;

/// Default cap on total archive payload size: large enough for any
/// reasonable bundle, small enough to reject pathological inputs.
const MAX_ARCHIVE_BYTES: u64 = 512 * 1024 * 1024;

/// Parse the manifest at the root of a gzip+tar bundle archive, without
/// extracting any other entry to disk. Accepts `manifest.yaml` or
/// `./manifest.yaml` at the archive root.
pub fn extract_manifest(bytes: &[u8]) -> Result<BundleManifest, NovaError> {
    let mut archive = Archive::new(GzDecoder::new(bytes));
    for entry in archive
        .entries()
        .map_err(|e| NovaError::ArchiveInvalid(format!("read archive entries: {e}")))?
    {
        let mut entry =
            entry.map_err(|e| NovaError::ArchiveInvalid(format!("read archive entry: {e}")))?;
        let path = entry
            .path()
            .map_err(|e| NovaError::ArchiveInvalid(format!("read entry path: {e}")))?
            .to_path_buf();
        if is_manifest_path(&path) {
            let mut contents = Vec::new();
            entry
                .read_to_end(&mut contents)
                .map_err(|e| NovaError::ArchiveInvalid(format!("read manifest bytes: {e}")))?;
            return BundleManifest::from_yaml(&contents)
                .map_err(|e| NovaError::ArchiveInvalid(format!("parse manifest.yaml: {e}")));
        }
    }
    Err(NovaError::ArchiveInvalid(
        "archive does not contain manifest.yaml".to_string(),
    ))
}

fn is_manifest_path(path: &Path) -> bool {
    matches!(
        path.to_string_lossy().as_ref(),
        "manifest.yaml" | "./manifest.yaml"
    )
}

/// Extract a bundle archive into a fresh directory under `dest_dir`, applying
/// path-traversal and entry-type defenses, and return the parsed manifest.
///
/// Rejects any entry whose cleaned path contains a `..` component, or whose
/// resolved target escapes `dest_dir`. Only regular files and directories are
/// materialized; symlinks and other entry types are ignored, which in
/// particular defeats a symlink-escape attempt (its target is never
/// followed).
pub async fn download_bundle(bytes: &[u8], dest_dir: &Path) -> Result<BundleManifest, NovaError> {
    if bytes.len() as u64 > MAX_ARCHIVE_BYTES {
        return Err(NovaError::ArchiveInvalid(format!(
            "archive exceeds maximum size of {MAX_ARCHIVE_BYTES} bytes"
        )));
    }

    tokio::fs::create_dir_all(dest_dir)
        .await
        .map_err(|e| NovaError::Internal(format!("create extraction dir: {e}")))?;

    let dest_dir = dest_dir.to_path_buf();
    let bytes = bytes.to_vec();
    let manifest_bytes = tokio::task::spawn_blocking(move || extract_to_disk(&bytes, &dest_dir))
        .await
        .map_err(|e| NovaError::Internal(format!("extraction task panicked: {e}")))??;

    BundleManifest::from_yaml(&manifest_bytes)
        .map_err(|e| NovaError::ArchiveInvalid(format!("parse manifest.yaml: {e}")))
}

fn extract_to_disk(bytes: &[u8], dest_dir: &Path) -> Result<Vec<u8>, NovaError> {
    let mut archive = Archive::new(GzDecoder::new(bytes));
    let mut manifest_bytes = None;

    for entry in archive
        .entries()
        .map_err(|e| NovaError::ArchiveInvalid(format!("read archive entries: {e}")))?
    {
        let mut entry =
            entry.map_err(|e| NovaError::ArchiveInvalid(format!("read archive entry: {e}")))?;
        let entry_type = entry.header().entry_type();
        if !entry_type.is_file() && !entry_type.is_dir() {
            continue;
        }

        let raw_path = entry
            .path()
            .map_err(|e| NovaError::ArchiveInvalid(format!("read entry path: {e}")))?
            .to_path_buf();

        if raw_path
            .components()
            .any(|c| c == std::path::Component::ParentDir)
        {
            return Err(NovaError::ArchiveInvalid(format!(
                "entry '{}' contains a '..' path component",
                raw_path.display()
            )));
        }

        let target = dest_dir.join(&raw_path);
        if !target.starts_with(&dest_dir) {
            return Err(NovaError::ArchiveInvalid(format!(
                "entry '{}' escapes the extraction directory",
                raw_path.display()
            )));
        }

        if entry_type.is_dir() {
            std::fs::create_dir_all(&target)
                .map_err(|e| NovaError::ArchiveInvalid(format!("create dir: {e}")))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| NovaError::ArchiveInvalid(format!("create parent dir: {e}")))?;
        }
        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .map_err(|e| NovaError::ArchiveInvalid(format!("read entry: {e}")))?;
        std::fs::write(&target, &contents)
            .map_err(|e| NovaError::ArchiveInvalid(format!("write entry: {e}")))?;

        if is_manifest_path(&raw_path) {
            manifest_bytes = Some(contents);
        }
    }

    manifest_bytes.ok_or_else(|| {
        NovaError::ArchiveInvalid("archive does not contain manifest.yaml".to_string())
    })
}

/// Validate a parsed manifest: required top-level fields, per-function
/// required fields, and (if a workflow is present) reference closure and DAG
/// acyclicity.
pub fn validate_bundle(manifest: &BundleManifest) -> Result<(), NovaError> {
    if manifest.name.is_empty() {
        return Err(NovaError::Validation("manifest name must not be empty".to_string()));
    }
    if manifest.version.is_empty() {
        return Err(NovaError::Validation("manifest version must not be empty".to_string()));
    }
    if manifest.functions.is_empty() {
        return Err(NovaError::Validation(
            "manifest must declare at least one function".to_string(),
        ));
    }

    for function in &manifest.functions {
        if function.key.as_str().is_empty() {
            return Err(NovaError::Validation("function key must not be empty".to_string()));
        }
        if function.runtime.is_empty() {
            return Err(NovaError::Validation(format!(
                "function '{}' has an empty runtime",
                function.key
            )));
        }
        if function.handler.is_empty() {
            return Err(NovaError::Validation(format!(
                "function '{}' has an empty handler",
                function.key
            )));
        }
        if function.files.is_empty() {
            return Err(NovaError::Validation(format!(
                "function '{}' declares no files",
                function.key
            )));
        }
    }

    if let Some(workflow) = &manifest.workflow {
        let known_keys: std::collections::HashSet<&str> =
            manifest.functions.iter().map(|f| f.key.as_str()).collect();

        for node in &workflow.definition.nodes {
            if !known_keys.contains(node.function_ref.as_str()) {
                return Err(NovaError::UnresolvedReference(format!(
                    "workflow node '{}' references unknown function '{}'",
                    node.node_key, node.function_ref
                )));
            }
        }

        let nodes: Vec<String> = workflow
            .definition
            .nodes
            .iter()
            .map(|n| n.node_key.clone())
            .collect();
        let edges: Vec<(String, String)> = workflow
            .definition
            .edges
            .iter()
            .map(|e| (e.from.clone(), e.to.clone()))
            .collect();
        dag::assert_acyclic(&nodes, &edges)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tar::Builder;

    fn build_archive(manifest_yaml: &str, extra: &[(&str, &[u8])]) -> Vec<u8> {
        let mut tar_bytes = Vec::new();
        {
            let mut builder = Builder::new(&mut tar_bytes);
            let mut header = tar::Header::new_gnu();
            header.set_size(manifest_yaml.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, "manifest.yaml", manifest_yaml.as_bytes())
                .unwrap();
            for (name, bytes) in extra {
                let mut header = tar::Header::new_gnu();
                header.set_size(bytes.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();
                builder.append_data(&mut header, name, *bytes).unwrap();
            }
            builder.finish().unwrap();
        }
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&tar_bytes).unwrap();
        encoder.finish().unwrap()
    }

    const MANIFEST: &str = "name: hello\nversion: 0.1.0\ntype: function\nfunctions:\n  - key: greet\n    runtime: python3.12\n    handler: main.handler\n    files: [functions/greet/handler.py]\n";

    #[test]
    fn extracts_manifest_from_well_formed_archive() {
        let bytes = build_archive(MANIFEST, &[("functions/greet/handler.py", b"def handler(e,c): return e")]);
        let manifest = extract_manifest(&bytes).unwrap();
        assert_eq!(manifest.name, "hello");
    }

    #[tokio::test]
    async fn download_bundle_rejects_path_traversal() {
        let bytes = build_archive(MANIFEST, &[("../evil.txt", b"pwned")]);
        let dir = tempfile::tempdir().unwrap();
        let result = download_bundle(&bytes, dir.path()).await;
        assert!(matches!(result, Err(NovaError::ArchiveInvalid(_))));
    }

    #[tokio::test]
    async fn download_bundle_extracts_well_formed_archive() {
        let bytes = build_archive(MANIFEST, &[("functions/greet/handler.py", b"def handler(e,c): return e")]);
        let dir = tempfile::tempdir().unwrap();
        let manifest = download_bundle(&bytes, dir.path()).await.unwrap();
        assert_eq!(manifest.name, "hello");
        assert!(dir.path().join("functions/greet/handler.py").exists());
    }

    #[test]
    fn validate_bundle_rejects_workflow_cycle() {
        let yaml = "name: hello\nversion: 0.1.0\ntype: workflow\nfunctions:\n  - key: a\n    runtime: python3.12\n    handler: main.handler\n    files: [a.py]\n  - key: b\n    runtime: python3.12\n    handler: main.handler\n    files: [b.py]\nworkflow:\n  definition:\n    nodes:\n      - node_key: na\n        function_ref: a\n      - node_key: nb\n        function_ref: b\n    edges:\n      - from: na\n        to: nb\n      - from: nb\n        to: na\n";
        let manifest = BundleManifest::from_yaml(yaml.as_bytes()).unwrap();
        let result = validate_bundle(&manifest);
        assert!(matches!(result, Err(NovaError::CycleDetected(_))));
    }

    #[test]
    fn validate_bundle_rejects_unresolved_function_ref() {
        let yaml = "name: hello\nversion: 0.1.0\ntype: workflow\nfunctions:\n  - key: a\n    runtime: python3.12\n    handler: main.handler\n    files: [a.py]\nworkflow:\n  definition:\n    nodes:\n      - node_key: na\n        function_ref: missing\n    edges: []\n";
        let manifest = BundleManifest::from_yaml(yaml.as_bytes()).unwrap();
        let result = validate_bundle(&manifest);
        assert!(matches!(result, Err(NovaError::UnresolvedReference(_))));
    }

    #[test]
    fn validate_bundle_rejects_empty_function_list() {
        let yaml = "name: hello\nversion: 0.1.0\ntype: function\nfunctions: []\n";
        let manifest = BundleManifest::from_yaml(yaml.as_bytes()).unwrap();
        assert!(validate_bundle(&manifest).is_err());
    }
}
