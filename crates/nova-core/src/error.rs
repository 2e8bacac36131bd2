//! The public error taxonomy for the Nova build and release pipeline.
//!
//! Every component surfaces one of these kinds at its public boundary.
//! Internally, `anyhow::Result` carries context through multi-step
//! operations and is converted to a `NovaError` variant once a caller needs a
//! typed answer (an HTTP status code, a stored `error` column, a test
//! assertion).

use thiserror::Error;

/// The error kinds from the design's error handling section: bad input,
/// name collisions, missing entities, the two build-time failure shapes,
/// malformed/unsafe archives, lock contention, DAG cycles, dangling
/// references, store failures, and a catch-all internal kind.
#[derive(Error, Debug)]
pub enum NovaError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("dependency install failed for {family}: {stderr}")]
    DependencyInstallFailed { family: String, stderr: String },

    #[error("build failed: {message}\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}")]
    BuildFailed {
        message: String,
        stdout: String,
        stderr: String,
    },

    #[error("archive invalid: {0}")]
    ArchiveInvalid(String),

    #[error("lock busy: {0}")]
    LockBusy(String),

    #[error("cycle detected: {0}")]
    CycleDetected(String),

    #[error("unresolved reference: {0}")]
    UnresolvedReference(String),

    #[error("store error: {0}")]
    StoreError(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl NovaError {
    /// The HTTP status code this error kind maps to, for the benefit of an
    /// HTTP surface layered on top of this engine (documentation purposes
    /// only — no such surface is implemented here).
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Conflict(_) => 409,
            Self::NotFound(_) => 404,
            Self::LockBusy(_) => 409,
            Self::DependencyInstallFailed { .. }
            | Self::BuildFailed { .. }
            | Self::ArchiveInvalid(_)
            | Self::CycleDetected(_)
            | Self::UnresolvedReference(_)
            | Self::StoreError(_)
            | Self::Internal(_) => 500,
        }
    }
}

impl From<anyhow::Error> for NovaError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400() {
        assert_eq!(NovaError::Validation("bad".into()).http_status(), 400);
    }

    #[test]
    fn conflict_maps_to_409() {
        assert_eq!(NovaError::Conflict("dup".into()).http_status(), 409);
    }

    #[test]
    fn lock_busy_maps_to_409() {
        assert_eq!(NovaError::LockBusy("ns".into()).http_status(), 409);
    }

    #[test]
    fn internal_maps_to_500() {
        assert_eq!(NovaError::Internal("oops".into()).http_status(), 500);
    }
}
