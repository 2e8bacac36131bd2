//! Artifact Store: content-addressed storage for release bundle bytes.
//!
//! The default implementation writes into the local filesystem under the
//! Nova home directory, addressed by the release digest of the bytes it
//! stores. A production deployment swaps in the `upload`-feature-gated
//! S3-backed implementation by pointing `EngineConfig::artifact_store` at a
//! bucket; the engine itself only ever talks to the `ArtifactStore` trait.

use std::path::PathBuf;

use async_trait::async_trait;
use nova_schema::ReleaseDigest;

use crate::error::NovaError;

/// Save, fetch, and delete release artifact bytes by content address.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes`, returning the URI it can be fetched from and its
    /// release digest.
    async fn save(&self, bytes: &[u8]) -> Result<(String, ReleaseDigest), NovaError>;

    /// Fetch the bytes previously stored at `uri`.
    async fn get(&self, uri: &str) -> Result<Vec<u8>, NovaError>;

    /// Remove the bytes previously stored at `uri`. Idempotent: deleting a
    /// URI that does not exist is not an error.
    async fn delete(&self, uri: &str) -> Result<(), NovaError>;
}

/// A `file://`-addressed store rooted at a directory on the local
/// filesystem, laid out as a flat content-addressed directory keyed by
/// release digest.
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    /// Root the store at `root`, creating it lazily on first `save`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, digest: &ReleaseDigest) -> PathBuf {
        self.root.join(digest.as_str())
    }

    fn uri_for(&self, digest: &ReleaseDigest) -> String {
        format!("file://{}", self.path_for(digest).display())
    }

    fn path_from_uri(&self, uri: &str) -> Result<PathBuf, NovaError> {
        uri.strip_prefix("file://")
            .map(PathBuf::from)
            .ok_or_else(|| NovaError::Validation(format!("not a file:// uri: {uri}")))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn save(&self, bytes: &[u8]) -> Result<(String, ReleaseDigest), NovaError> {
        let digest = ReleaseDigest::compute(bytes);
        let path = self.path_for(&digest);
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| NovaError::StoreError(format!("create artifact root: {e}")))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| NovaError::StoreError(format!("write artifact: {e}")))?;
        Ok((self.uri_for(&digest), digest))
    }

    async fn get(&self, uri: &str) -> Result<Vec<u8>, NovaError> {
        let path = self.path_from_uri(uri)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| NovaError::NotFound(format!("artifact at {uri}: {e}")))
    }

    async fn delete(&self, uri: &str) -> Result<(), NovaError> {
        let path = self.path_from_uri(uri)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(NovaError::StoreError(format!("delete artifact: {e}"))),
        }
    }
}

#[cfg(feature = "upload")]
pub use s3::S3ArtifactStore;

#[cfg(feature = "upload")]
mod s3 {
    use super::*;
    use crate::config::S3Config;
    use aws_sdk_s3::primitives::ByteStream;
    use aws_sdk_s3::Client;

    /// An S3-compatible artifact store, addressed by release digest under a
    /// fixed key prefix in a single bucket.
    pub struct S3ArtifactStore {
        client: Client,
        bucket: String,
    }

    impl S3ArtifactStore {
        /// Build a client against `config` and validate nothing beyond that
        /// the credentials parse; the first `save`/`get` surfaces any
        /// connectivity failure.
        pub async fn connect(config: &S3Config) -> Result<Self, NovaError> {
            let sdk_config = aws_config::from_env()
                .endpoint_url(&config.endpoint)
                .load()
                .await;
            let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
                .credentials_provider(aws_sdk_s3::config::Credentials::new(
                    &config.access_key,
                    &config.secret_key,
                    None,
                    None,
                    "nova-engine",
                ))
                .force_path_style(true)
                .build();
            Ok(Self {
                client: Client::from_conf(s3_config),
                bucket: config.bucket.clone(),
            })
        }

        fn key_for(&self, digest: &ReleaseDigest) -> String {
            format!("releases/{}", digest.as_str())
        }

        fn uri_for(&self, digest: &ReleaseDigest) -> String {
            format!("s3://{}/{}", self.bucket, self.key_for(digest))
        }

        fn key_from_uri(&self, uri: &str) -> Result<String, NovaError> {
            let prefix = format!("s3://{}/", self.bucket);
            uri.strip_prefix(&prefix)
                .map(str::to_string)
                .ok_or_else(|| NovaError::Validation(format!("not an s3 uri for this bucket: {uri}")))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn store() -> S3ArtifactStore {
            // `Client` has no offline constructor worth reaching for here;
            // the URI helpers below don't touch it.
            S3ArtifactStore {
                client: Client::from_conf(
                    aws_sdk_s3::config::Builder::new()
                        .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
                        .region(aws_sdk_s3::config::Region::new("us-east-1"))
                        .credentials_provider(aws_sdk_s3::config::Credentials::new(
                            "test", "test", None, None, "test",
                        ))
                        .build(),
                ),
                bucket: "releases-bucket".to_string(),
            }
        }

        #[test]
        fn uri_for_round_trips_through_key_from_uri() {
            let store = store();
            let digest = ReleaseDigest::compute(b"payload");
            let uri = store.uri_for(&digest);
            assert_eq!(uri, format!("s3://releases-bucket/releases/{}", digest.as_str()));
            assert_eq!(store.key_from_uri(&uri).unwrap(), format!("releases/{}", digest.as_str()));
        }

        #[test]
        fn key_from_uri_rejects_other_buckets() {
            let store = store();
            assert!(store.key_from_uri("s3://someone-elses-bucket/releases/abc").is_err());
        }

        #[test]
        fn key_from_uri_rejects_non_s3_scheme() {
            let store = store();
            assert!(store.key_from_uri("file:///tmp/abc").is_err());
        }
    }

    #[async_trait]
    impl ArtifactStore for S3ArtifactStore {
        async fn save(&self, bytes: &[u8]) -> Result<(String, ReleaseDigest), NovaError> {
            let digest = ReleaseDigest::compute(bytes);
            let key = self.key_for(&digest);
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .body(ByteStream::from(bytes.to_vec()))
                .send()
                .await
                .map_err(|e| NovaError::StoreError(format!("s3 put_object: {e}")))?;
            Ok((self.uri_for(&digest), digest))
        }

        async fn get(&self, uri: &str) -> Result<Vec<u8>, NovaError> {
            let key = self.key_from_uri(uri)?;
            let output = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| NovaError::NotFound(format!("artifact at {uri}: {e}")))?;
            let bytes = output
                .body
                .collect()
                .await
                .map_err(|e| NovaError::StoreError(format!("s3 body read: {e}")))?;
            Ok(bytes.into_bytes().to_vec())
        }

        async fn delete(&self, uri: &str) -> Result<(), NovaError> {
            let key = self.key_from_uri(uri)?;
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| NovaError::StoreError(format!("s3 delete_object: {e}")))?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_bytes_through_local_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());
        let (uri, digest) = store.save(b"hello bundle").await.unwrap();
        assert!(uri.starts_with("file://"));
        assert_eq!(digest, ReleaseDigest::compute(b"hello bundle"));
        let fetched = store.get(&uri).await.unwrap();
        assert_eq!(fetched, b"hello bundle");
    }

    #[tokio::test]
    async fn delete_then_get_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());
        let (uri, _) = store.save(b"transient").await.unwrap();
        store.delete(&uri).await.unwrap();
        assert!(store.get(&uri).await.is_err());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(dir.path());
        let (uri, _) = store.save(b"once").await.unwrap();
        store.delete(&uri).await.unwrap();
        assert!(store.delete(&uri).await.is_ok());
    }
}
