//! Shared types and wire format for the Nova build and release pipeline.
//!
//! This crate defines the canonical data structures used across the compiler,
//! the bundle packager/extractor, and the installation engine: content digest
//! newtypes, validated identifiers, the bundle manifest wire format, and the
//! status enums that drive the compile/install state machines.

/// Typed wrappers for content-addressed digests (truncated and full SHA-256).
pub mod digest;
/// Validated identifier newtypes (runtime id, function name, bundle key).
pub mod ids;
/// Bundle manifest wire format: functions, workflow DAG, nodes.
pub mod manifest;
/// Status enums driving the compile and installation state machines.
pub mod status;

pub use digest::{ReleaseDigest, Sha256Digest};
pub use ids::{BundleKey, FunctionName, MemoryMb, RuntimeId, TimeoutSeconds};
pub use manifest::{
    BundleManifest, BundleNode, BundleType, FunctionSpec, RetryPolicy, WorkflowDefinition,
    WorkflowEdge, WorkflowSpec,
};
pub use status::{
    CompileStatus, InstallStatus, JobOperation, JobStatus, ManagedMode, ReleaseStatus,
    ResourceType,
};
