use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

/// A 16-hex-character truncated SHA-256 content digest.
///
/// Used as the cache key for resolved dependencies, as the content digest of
/// a compiled artifact or interpreted source, and as the `content_digest` of
/// an `InstallationResource`. Truncation trades a non-zero collision
/// probability for a short, displayable digest; this is a known weakening of
/// the integrity claim and is preserved deliberately rather than widened.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Compute `lowercase_hex(sha256(bytes))[:16]`.
    pub fn compute(bytes: &[u8]) -> Self {
        let full = Sha256::digest(bytes);
        Self(hex::encode(full)[..16].to_string())
    }

    /// Wrap an already-computed digest string, validating its shape.
    ///
    /// # Errors
    ///
    /// Returns an error unless `s` is exactly 16 ASCII hex characters.
    pub fn new(s: impl Into<String>) -> anyhow::Result<Self> {
        let s = s.into();
        if s.len() != 16 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            anyhow::bail!(
                "invalid content digest: expected 16 hex characters, got '{s}'"
            );
        }
        Ok(Self(s.to_lowercase()))
    }

    /// Return the digest as a hex string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Sha256Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Sha256Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A full 64-hex-character SHA-256 digest, used only for release artifact
/// bytes (`AppRelease.artifact_digest`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ReleaseDigest(String);

impl ReleaseDigest {
    /// Compute the full SHA-256 hex digest of `bytes`.
    pub fn compute(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    /// Wrap an already-computed digest string, validating its shape.
    ///
    /// Accepts strings with or without a `sha256:` prefix.
    ///
    /// # Errors
    ///
    /// Returns an error unless the hex portion is exactly 64 ASCII hex
    /// characters.
    pub fn new(s: impl Into<String>) -> anyhow::Result<Self> {
        let s = s.into();
        let hex = s.strip_prefix("sha256:").unwrap_or(&s);
        if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            anyhow::bail!(
                "invalid release digest: expected 64 hex characters, got '{s}'"
            );
        }
        Ok(Self(hex.to_lowercase()))
    }

    /// Return the digest as a hex string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ReleaseDigest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for ReleaseDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ReleaseDigest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_digest_is_sixteen_hex_chars() {
        let d = Sha256Digest::compute(b"hello world");
        assert_eq!(d.as_str().len(), 16);
        assert!(d.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn truncated_digest_is_deterministic() {
        assert_eq!(Sha256Digest::compute(b"x"), Sha256Digest::compute(b"x"));
    }

    #[test]
    fn truncated_digest_differs_across_inputs() {
        assert_ne!(Sha256Digest::compute(b"x"), Sha256Digest::compute(b"y"));
    }

    #[test]
    fn truncated_digest_rejects_wrong_length() {
        assert!(Sha256Digest::new("abcd").is_err());
    }

    #[test]
    fn full_digest_is_sha256_hex() {
        let d = ReleaseDigest::compute(b"hello world");
        assert_eq!(d.as_str().len(), 64);
    }

    #[test]
    fn full_digest_accepts_sha256_prefix() {
        let d = ReleaseDigest::compute(b"hello world");
        let prefixed = format!("sha256:{d}");
        assert_eq!(ReleaseDigest::new(prefixed).unwrap(), d);
    }

    #[test]
    fn full_digest_rejects_short_input() {
        assert!(ReleaseDigest::new("abcd").is_err());
    }
}
