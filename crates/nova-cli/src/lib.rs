//! nova - the Nova build and release pipeline CLI.
//!
//! Drives the engine in `nova-core` end to end against a local, SQLite-backed
//! `MetadataStore`: compiling function source, packaging release bundles,
//! validating and planning installations, and applying or reversing them.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.nova/
//! ├── state.db    # SQLite metadata store
//! ├── artifacts/  # Local content-addressed release archive store
//! ├── work/       # Per-compile / per-resolve scratch directories
//! └── logs/
//! ```

pub mod cmd;
pub mod context;
pub mod sqlite_store;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Top-level CLI arguments.
#[derive(Debug, Parser)]
#[command(name = "nova")]
#[command(author, version, about = "Nova build and release pipeline CLI")]
pub struct Cli {
    /// Tenant to operate as.
    #[arg(long, global = true, env = "NOVA_TENANT_ID", default_value = "default")]
    pub tenant_id: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// The operation `nova` performs.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Compile a single function from source.
    Compile {
        /// Existing function id to recompile.
        function_id: String,
        /// Path to the function's source file.
        source: PathBuf,
    },
    /// Package selected functions (and optionally one workflow) into a
    /// release archive and publish it.
    Package {
        /// Target namespace the functions/workflow live in.
        #[arg(long)]
        namespace: String,
        /// App slug the release is published under.
        #[arg(long)]
        app: String,
        /// Release version string.
        #[arg(long)]
        version: String,
        /// Function names to include.
        #[arg(long = "function", required = true)]
        functions: Vec<String>,
        /// At most one workflow name to include.
        #[arg(long = "workflow")]
        workflow: Option<String>,
    },
    /// Extract and print the manifest of a bundle archive.
    Extract {
        /// Path to the bundle archive on disk.
        archive: PathBuf,
    },
    /// Dry-run an installation and report conflicts without applying it.
    Plan {
        #[command(flatten)]
        target: InstallTarget,
    },
    /// Install a published release into a namespace.
    Install {
        #[command(flatten)]
        target: InstallTarget,
    },
    /// Reverse a previously applied installation.
    Uninstall {
        /// Installation id to remove.
        installation_id: String,
        /// Continue past per-resource delete failures instead of aborting.
        #[arg(long)]
        force: bool,
    },
    /// Show the status of an installation and its most recent job.
    Status {
        /// Installation id to inspect.
        installation_id: String,
    },
}

/// The release and destination of a prospective or actual installation,
/// shared by `plan` and `install`.
#[derive(Debug, clap::Args)]
pub struct InstallTarget {
    /// Namespace to install into.
    #[arg(long)]
    pub namespace: String,
    /// App id the release belongs to.
    #[arg(long)]
    pub app_id: String,
    /// Release version to install.
    #[arg(long)]
    pub version: String,
    /// Name this installation will be known by.
    #[arg(long)]
    pub install_name: String,
    /// Prefix applied to every bundled resource's effective name.
    #[arg(long)]
    pub name_prefix: Option<String>,
    /// Opaque installer-supplied values, stored alongside the installation.
    #[arg(long, default_value = "{}")]
    pub values_json: String,
}
