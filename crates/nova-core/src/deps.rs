//! Dependency Resolver (C3): installs a family's declared dependencies
//! inside a builder container and collects the result into an in-memory
//! `relpath -> bytes` map, memoized by manifest digest.

use std::collections::HashMap;
use std::sync::RwLock;

use nova_schema::Sha256Digest;
use tokio_util::sync::CancellationToken;

use crate::container::{deps_container_name, BuildSpec, ContainerBuildDriver};
use crate::error::NovaError;

type DepsMap = HashMap<String, Vec<u8>>;

/// A recognized dependency manifest family and the collected dependency
/// subpath the compiler merges it under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepsFamily {
    Python,
    Node,
    Ruby,
    Php,
}

impl DepsFamily {
    /// The manifest filename this family is keyed off, e.g. `requirements.txt`.
    pub fn manifest_filename(self) -> &'static str {
        match self {
            Self::Python => "requirements.txt",
            Self::Node => "package.json",
            Self::Ruby => "Gemfile",
            Self::Php => "composer.json",
        }
    }

    /// The subpath the compiler merges this family's resolved dependencies
    /// under within a function's build context.
    pub fn merge_subpath(self) -> &'static str {
        match self {
            Self::Python => "deps/",
            Self::Node => "node_modules/",
            Self::Ruby => "vendor/bundle/",
            Self::Php => "vendor/",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Node => "node",
            Self::Ruby => "ruby",
            Self::Php => "php",
        }
    }

    fn image(self) -> &'static str {
        match self {
            Self::Python => "python:3.12-slim",
            Self::Node => "node:20-slim",
            Self::Ruby => "ruby:3.3-slim",
            Self::Php => "composer:2",
        }
    }

    fn install_command(self) -> &'static str {
        match self {
            Self::Python => "pip install --no-cache-dir -r requirements.txt -t deps",
            Self::Node => "npm install --production --no-audit --no-fund",
            Self::Ruby => "bundle config set --local path vendor/bundle && bundle install",
            Self::Php => "composer install --no-dev --optimize-autoloader",
        }
    }

    fn output_path(self) -> &'static str {
        match self {
            Self::Python => "/work/deps",
            Self::Node => "/work/node_modules",
            Self::Ruby => "/work/vendor",
            Self::Php => "/work/vendor",
        }
    }

    fn exclude(self, relpath: &str) -> bool {
        matches!(self, Self::Node) && (relpath.starts_with(".bin/") || relpath.ends_with(".md"))
    }
}

/// Process-local memoization cache for resolved dependency sets, keyed by
/// the content digest of the manifest bytes. Readers and writers may
/// overlap; duplicate parallel resolutions for the same key are tolerated
/// and produce equal results.
#[derive(Default)]
pub struct DepsCache {
    entries: RwLock<HashMap<Sha256Digest, DepsMap>>,
}

impl DepsCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &Sha256Digest) -> Option<DepsMap> {
        self.entries.read().expect("deps cache lock poisoned").get(key).cloned()
    }

    fn insert(&self, key: Sha256Digest, value: DepsMap) {
        self.entries
            .write()
            .expect("deps cache lock poisoned")
            .insert(key, value);
    }
}

/// Resolve `manifest_bytes` for `family` into a `relpath -> bytes` map,
/// running a dedicated builder container per the family's install command
/// and serving repeated calls for the same manifest bytes from `cache`.
pub async fn resolve(
    driver: &ContainerBuildDriver,
    cache: &DepsCache,
    family: DepsFamily,
    manifest_bytes: &[u8],
) -> Result<DepsMap, NovaError> {
    let digest = Sha256Digest::compute(manifest_bytes);
    if let Some(cached) = cache.get(&digest) {
        return Ok(cached);
    }

    let work_dir = crate::paths::new_work_dir(&format!("deps-{}", family.label()))
        .map_err(|e| NovaError::Internal(format!("create deps work dir: {e}")))?;
    tokio::fs::write(work_dir.join(family.manifest_filename()), manifest_bytes)
        .await
        .map_err(|e| NovaError::Internal(format!("write manifest: {e}")))?;

    let spec = BuildSpec {
        image: family.image().to_string(),
        shell_command: format!("cd /work && {}", family.install_command()),
        container_name: deps_container_name(family.label(), &digest.as_str()[..12.min(digest.as_str().len())]),
        output_path: family.output_path().to_string(),
    };

    let result = driver
        .build_dir(&spec, &work_dir, CancellationToken::new(), |p| family.exclude(p))
        .await
        .map_err(|e| match e {
            NovaError::BuildFailed { stderr, .. } => NovaError::DependencyInstallFailed {
                family: family.label().to_string(),
                stderr,
            },
            other => other,
        });

    let _ = tokio::fs::remove_dir_all(&work_dir).await;

    let deps = result?;
    cache.insert(digest, deps.clone());
    Ok(deps)
}

/// Identify the dependency family for a manifest filename appearing in a
/// function's file map, if recognized.
pub fn family_for_filename(filename: &str) -> Option<DepsFamily> {
    match filename {
        "requirements.txt" => Some(DepsFamily::Python),
        "package.json" => Some(DepsFamily::Node),
        "Gemfile" => Some(DepsFamily::Ruby),
        "composer.json" => Some(DepsFamily::Php),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_for_filename_recognizes_all_four() {
        assert_eq!(family_for_filename("requirements.txt"), Some(DepsFamily::Python));
        assert_eq!(family_for_filename("package.json"), Some(DepsFamily::Node));
        assert_eq!(family_for_filename("Gemfile"), Some(DepsFamily::Ruby));
        assert_eq!(family_for_filename("composer.json"), Some(DepsFamily::Php));
        assert_eq!(family_for_filename("nonsense.xyz"), None);
    }

    #[test]
    fn node_excludes_bin_and_markdown() {
        assert!(DepsFamily::Node.exclude(".bin/eslint"));
        assert!(DepsFamily::Node.exclude("left-pad/README.md"));
        assert!(!DepsFamily::Node.exclude("left-pad/index.js"));
    }

    #[test]
    fn cache_serves_repeated_lookups_for_same_digest() {
        let cache = DepsCache::new();
        let digest = Sha256Digest::compute(b"requirements");
        let mut deps = HashMap::new();
        deps.insert("deps/foo.py".to_string(), b"x".to_vec());
        cache.insert(digest.clone(), deps.clone());
        assert_eq!(cache.get(&digest), Some(deps));
    }
}
