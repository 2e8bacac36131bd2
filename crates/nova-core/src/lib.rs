//! Core engine for the Nova build and release pipeline.
//!
//! This crate provides the foundational logic for compiling functions,
//! resolving per-runtime dependencies in a container sandbox, packaging and
//! extracting release bundles, and planning and executing installations. It
//! is designed to be consumed by higher-level CLI or batch-builder frontends
//! without coupling to any specific UI or metadata store.

/// Release artifact storage: local content-addressed and S3-backed.
pub mod artifacts;
/// Compiler orchestrator: synchronous path for interpreted runtimes,
/// detached background compiles for compiled ones.
pub mod compiler;
/// Engine configuration read from the process environment.
pub mod config;
/// Sandboxed build driver: containerized compiles and dependency installs.
pub mod container;
/// Generic DAG helpers: cycle detection and topological layering.
pub mod dag;
/// Per-family dependency resolution, with digest-keyed memoization.
pub mod deps;
/// The public error taxonomy surfaced at every component boundary.
pub mod error;
/// Installation executor: applies an approved plan, tracks created
/// resources, and reverses them on uninstall.
pub mod executor;
/// Bundle extractor: manifest parsing and defensive archive extraction.
pub mod extractor;
/// Source layout writer: user files plus synthesized runtime wrappers.
pub mod layout;
/// Per-(tenant, namespace) advisory lock serializing installs.
pub mod lock;
/// Bundle packager: assembles release archives from existing resources.
pub mod packager;
/// Filesystem path helpers for the Nova home directory layout.
pub mod paths;
/// Installation planner: dry-run conflict and missing-runtime probing.
pub mod planner;
/// Progress reporting trait and implementations for UI decoupling.
pub mod reporter;
/// Runtime registry: per-family build images, extensions, and handlers.
pub mod runtime;
/// Domain entities and the opaque metadata store interface.
pub mod store;

pub use error::NovaError;
pub use paths::*;
pub use reporter::{NullReporter, Reporter};

/// User agent string for outbound HTTP calls (artifact upload, registries).
pub const USER_AGENT: &str = concat!("nova-core/", env!("CARGO_PKG_VERSION"));
