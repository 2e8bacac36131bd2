//! Engine-wide configuration, populated from the environment.

use std::time::Duration;

/// Container runtime, artifact store, and filesystem layout configuration for
/// a single engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// The container runtime binary to invoke for C5 (e.g. `docker`,
    /// `podman`). Defaults to `docker`.
    pub container_runtime: String,
    /// Maximum wall-clock time allowed for a single container build/resolve
    /// run before it is treated as `BuildFailed`.
    pub build_timeout: Duration,
    /// Artifact store backend configuration; `None` selects the local
    /// `file://` implementation under the Nova home directory.
    pub artifact_store: Option<S3Config>,
}

/// Connection details for an S3-compatible artifact store backend.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            container_runtime: "docker".to_string(),
            build_timeout: Duration::from_secs(300),
            artifact_store: None,
        }
    }
}

impl EngineConfig {
    /// Build configuration from the process environment:
    /// `NOVA_CONTAINER_RUNTIME`, `NOVA_BUILD_TIMEOUT_S`, and the
    /// `NOVA_ARTIFACT_STORE_*` family (endpoint/bucket/access key/secret
    /// key). The artifact store fields must be either all present or all
    /// absent; a partial set is a validation error.
    ///
    /// # Errors
    ///
    /// Returns an error if `NOVA_BUILD_TIMEOUT_S` is set but not a valid
    /// integer, or if only some of the `NOVA_ARTIFACT_STORE_*` variables are
    /// set.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(runtime) = std::env::var("NOVA_CONTAINER_RUNTIME") {
            config.container_runtime = runtime;
        }

        if let Ok(secs) = std::env::var("NOVA_BUILD_TIMEOUT_S") {
            let secs: u64 = secs
                .parse()
                .map_err(|_| anyhow::anyhow!("NOVA_BUILD_TIMEOUT_S must be an integer"))?;
            config.build_timeout = Duration::from_secs(secs);
        }

        let endpoint = std::env::var("NOVA_ARTIFACT_STORE_ENDPOINT").ok();
        let bucket = std::env::var("NOVA_ARTIFACT_STORE_BUCKET").ok();
        let access_key = std::env::var("NOVA_ARTIFACT_STORE_ACCESS_KEY").ok();
        let secret_key = std::env::var("NOVA_ARTIFACT_STORE_SECRET_KEY").ok();

        let present = [&endpoint, &bucket, &access_key, &secret_key]
            .iter()
            .filter(|v| v.is_some())
            .count();

        if present == 4 {
            config.artifact_store = Some(S3Config {
                endpoint: endpoint.unwrap(),
                bucket: bucket.unwrap(),
                access_key: access_key.unwrap(),
                secret_key: secret_key.unwrap(),
            });
        } else if present > 0 {
            anyhow::bail!(
                "NOVA_ARTIFACT_STORE_* must be set as a complete group (endpoint, bucket, access key, secret key) or not at all"
            );
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_docker_and_local_store() {
        let config = EngineConfig::default();
        assert_eq!(config.container_runtime, "docker");
        assert!(config.artifact_store.is_none());
    }
}
