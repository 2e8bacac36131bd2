use serde::{Deserialize, Serialize};

/// Status of a single compile attempt for a function.
///
/// State machine: `Pending -> Compiling -> (Success | Failed)` for compiled
/// runtimes, or `Pending -> NotRequired` for interpreted ones. Monotone
/// within one attempt; a new `compile_async` call starts a fresh attempt and
/// may reset to `Compiling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompileStatus {
    Pending,
    Compiling,
    Success,
    Failed,
    NotRequired,
}

/// Status of an `AppRelease`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseStatus {
    Draft,
    Published,
    Yanked,
}

/// Status of an `Installation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallStatus {
    Pending,
    Planning,
    Applying,
    Succeeded,
    Failed,
    Deleting,
}

/// The operation an `InstallJob` is carrying out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobOperation {
    Install,
    Uninstall,
    Upgrade,
}

/// Status of an `InstallJob`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Planning,
    Applying,
    Succeeded,
    Failed,
}

/// Kind of resource an `InstallationResource` row tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Function,
    Workflow,
}

/// Whether a tracked resource is exclusively owned by its installation or
/// shared with another. The executor records `Exclusive` for everything it
/// creates today; `Shared` is reserved for future cross-installation reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagedMode {
    Exclusive,
    Shared,
}
