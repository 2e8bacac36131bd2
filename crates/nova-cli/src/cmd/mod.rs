//! Command handlers, one module per `Commands` variant.

/// `nova compile`.
pub mod compile;
/// `nova extract`.
pub mod extract;
/// `nova install`.
pub mod install;
/// `nova package`.
pub mod package;
/// `nova plan`.
pub mod plan;
/// `nova status`.
pub mod status;
/// `nova uninstall`.
pub mod uninstall;
