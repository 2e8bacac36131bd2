use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

/// A runtime identifier as declared by the user, e.g. `python3.12`, `go1.23`.
///
/// Unlike `FunctionName` this is intentionally unvalidated beyond being
/// non-empty: the runtime registry is the authority on which identifiers it
/// recognizes, and unknown runtimes pass through rather than being rejected
/// at the type boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuntimeId(String);

impl RuntimeId {
    /// Wrap a runtime identifier string.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Return the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RuntimeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RuntimeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RuntimeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for RuntimeId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// A validated function name: `^[A-Za-z0-9_-]{1,64}$`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FunctionName(String);

impl FunctionName {
    /// # Errors
    ///
    /// Returns an error if `s` is empty, longer than 64 bytes, or contains a
    /// character outside `[A-Za-z0-9_-]`.
    pub fn new(s: impl Into<String>) -> anyhow::Result<Self> {
        let s = s.into();
        if s.is_empty() || s.len() > 64 {
            anyhow::bail!(
                "function name must be 1-64 characters, got {} in '{s}'",
                s.len()
            );
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            anyhow::bail!("function name '{s}' contains characters outside [A-Za-z0-9_-]");
        }
        Ok(Self(s))
    }

    /// Return the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for FunctionName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for FunctionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for FunctionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for FunctionName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A sanitized bundle key identifying a function within a manifest: lowercase
/// `[a-z0-9_-]`, non-empty. Uniqueness within a manifest is enforced by the
/// bundle packager, not by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BundleKey(String);

impl BundleKey {
    /// # Errors
    ///
    /// Returns an error if `s` is empty or contains characters outside
    /// lowercase `[a-z0-9_-]`.
    pub fn new(s: impl Into<String>) -> anyhow::Result<Self> {
        let s = s.into();
        if s.is_empty() {
            anyhow::bail!("bundle key must not be empty");
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            anyhow::bail!("bundle key '{s}' must be lowercase [a-z0-9_-]");
        }
        Ok(Self(s))
    }

    /// Sanitize an arbitrary name into a bundle key: lowercase, runs of
    /// characters outside `[a-z0-9_-]` collapsed to a single `-`, leading and
    /// trailing `-` stripped, falling back to `fn` if nothing survives.
    pub fn sanitize(name: &str) -> Self {
        let lower = name.to_lowercase();
        let mut out = String::with_capacity(lower.len());
        let mut last_was_dash = false;
        for c in lower.chars() {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
                out.push(c);
                last_was_dash = false;
            } else if !last_was_dash {
                out.push('-');
                last_was_dash = true;
            }
        }
        let trimmed = out.trim_matches('-');
        let result = if trimmed.is_empty() { "fn" } else { trimmed };
        Self(result.to_string())
    }

    /// Return the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for BundleKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for BundleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for BundleKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for BundleKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A validated function memory allocation, in MiB: `128..=10240`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MemoryMb(u32);

impl MemoryMb {
    /// The smallest memory allocation a function may request.
    pub const MIN: u32 = 128;
    /// The largest memory allocation a function may request.
    pub const MAX: u32 = 10240;

    /// # Errors
    ///
    /// Returns an error if `mb` falls outside `128..=10240`.
    pub fn new(mb: u32) -> anyhow::Result<Self> {
        if !(Self::MIN..=Self::MAX).contains(&mb) {
            anyhow::bail!(
                "memory_mb must be between {} and {} MiB, got {mb}",
                Self::MIN,
                Self::MAX
            );
        }
        Ok(Self(mb))
    }

    /// Return the allocation in MiB.
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl Default for MemoryMb {
    fn default() -> Self {
        Self(128)
    }
}

impl<'de> Deserialize<'de> for MemoryMb {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let mb = u32::deserialize(deserializer)?;
        Self::new(mb).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for MemoryMb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated function timeout, in seconds: `1..=900`, with `0` meaning
/// "use the default" rather than being rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TimeoutSeconds(u32);

impl TimeoutSeconds {
    /// The smallest timeout a function may request (besides the `0` sentinel).
    pub const MIN: u32 = 1;
    /// The largest timeout a function may request.
    pub const MAX: u32 = 900;
    /// The timeout applied when a manifest omits one, or sets `0`.
    pub const DEFAULT: u32 = 30;

    /// # Errors
    ///
    /// Returns an error if `s` is nonzero and falls outside `1..=900`. A
    /// value of `0` maps to [`TimeoutSeconds::DEFAULT`] rather than erroring.
    pub fn new(s: u32) -> anyhow::Result<Self> {
        if s == 0 {
            return Ok(Self(Self::DEFAULT));
        }
        if !(Self::MIN..=Self::MAX).contains(&s) {
            anyhow::bail!(
                "timeout_s must be 0 (default) or between {} and {} seconds, got {s}",
                Self::MIN,
                Self::MAX
            );
        }
        Ok(Self(s))
    }

    /// Return the timeout in seconds.
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl Default for TimeoutSeconds {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl<'de> Deserialize<'de> for TimeoutSeconds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = u32::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for TimeoutSeconds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_name_boundary_64_accepted() {
        assert!(FunctionName::new("a".repeat(64)).is_ok());
    }

    #[test]
    fn function_name_boundary_65_rejected() {
        assert!(FunctionName::new("a".repeat(65)).is_err());
    }

    #[test]
    fn function_name_rejects_empty() {
        assert!(FunctionName::new("").is_err());
    }

    #[test]
    fn function_name_rejects_bad_chars() {
        assert!(FunctionName::new("no spaces!").is_err());
    }

    #[test]
    fn bundle_key_sanitize_collapses_runs() {
        assert_eq!(BundleKey::sanitize("My Greeter!!").as_str(), "my-greeter");
    }

    #[test]
    fn bundle_key_sanitize_strips_edges() {
        assert_eq!(BundleKey::sanitize("--hello--").as_str(), "hello");
    }

    #[test]
    fn bundle_key_sanitize_empty_falls_back_to_fn() {
        assert_eq!(BundleKey::sanitize("!!!").as_str(), "fn");
    }

    #[test]
    fn bundle_key_new_rejects_uppercase() {
        assert!(BundleKey::new("Greet").is_err());
    }

    #[test]
    fn memory_mb_boundary_accepted() {
        assert!(MemoryMb::new(128).is_ok());
        assert!(MemoryMb::new(10240).is_ok());
    }

    #[test]
    fn memory_mb_out_of_range_rejected() {
        assert!(MemoryMb::new(127).is_err());
        assert!(MemoryMb::new(10241).is_err());
    }

    #[test]
    fn timeout_seconds_boundary_accepted() {
        assert!(TimeoutSeconds::new(1).is_ok());
        assert!(TimeoutSeconds::new(900).is_ok());
    }

    #[test]
    fn timeout_seconds_zero_maps_to_default() {
        assert_eq!(TimeoutSeconds::new(0).unwrap().get(), TimeoutSeconds::DEFAULT);
    }

    #[test]
    fn timeout_seconds_above_max_rejected() {
        assert!(TimeoutSeconds::new(901).is_err());
    }
}
