//! Reporter trait for dependency injection.
//!
//! This trait lets the engine report phase and per-function progress without
//! being coupled to a specific CLI rendering implementation.

/// Progress/status sink implemented by CLI frontends, decoupling engine logic
/// from any specific terminal UI.
pub trait Reporter: Send + Sync {
    /// A new top-level phase has started (e.g. "Resolving dependencies").
    fn section(&self, title: &str);

    /// A function has entered the `compiling` state.
    fn compiling(&self, function_name: &str, runtime: &str);

    /// A function's compile attempt finished.
    fn compiled(&self, function_name: &str, success: bool, detail: &str);

    /// A resource has been created during installation.
    fn resource_created(&self, resource_type: &str, resource_name: &str);

    /// A resource has been deleted during uninstallation.
    fn resource_deleted(&self, resource_type: &str, resource_name: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a success message.
    fn success(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Log an error message.
    fn error(&self, msg: &str);

    /// Display a final summary of a multi-step operation.
    fn summary(&self, count: usize, action: &str, elapsed_secs: f64);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn section(&self, title: &str) {
        (**self).section(title);
    }
    fn compiling(&self, function_name: &str, runtime: &str) {
        (**self).compiling(function_name, runtime);
    }
    fn compiled(&self, function_name: &str, success: bool, detail: &str) {
        (**self).compiled(function_name, success, detail);
    }
    fn resource_created(&self, resource_type: &str, resource_name: &str) {
        (**self).resource_created(resource_type, resource_name);
    }
    fn resource_deleted(&self, resource_type: &str, resource_name: &str) {
        (**self).resource_deleted(resource_type, resource_name);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn success(&self, msg: &str) {
        (**self).success(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
    fn error(&self, msg: &str) {
        (**self).error(msg);
    }
    fn summary(&self, count: usize, action: &str, elapsed_secs: f64) {
        (**self).summary(count, action, elapsed_secs);
    }
}

/// A no-op reporter for silent operations (batch builds, tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn compiling(&self, _: &str, _: &str) {}
    fn compiled(&self, _: &str, _: bool, _: &str) {}
    fn resource_created(&self, _: &str, _: &str) {}
    fn resource_deleted(&self, _: &str, _: &str) {}
    fn info(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn error(&self, _: &str) {}
    fn summary(&self, _: usize, _: &str, _: f64) {}
}

/// A reporter that forwards every event to `tracing`, used by the batch
/// builder binary where there is no interactive terminal to render into.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn section(&self, title: &str) {
        tracing::info!(title, "section");
    }
    fn compiling(&self, function_name: &str, runtime: &str) {
        tracing::info!(function_name, runtime, "compiling");
    }
    fn compiled(&self, function_name: &str, success: bool, detail: &str) {
        if success {
            tracing::info!(function_name, detail, "compiled");
        } else {
            tracing::error!(function_name, detail, "compile failed");
        }
    }
    fn resource_created(&self, resource_type: &str, resource_name: &str) {
        tracing::info!(resource_type, resource_name, "resource created");
    }
    fn resource_deleted(&self, resource_type: &str, resource_name: &str) {
        tracing::info!(resource_type, resource_name, "resource deleted");
    }
    fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }
    fn success(&self, msg: &str) {
        tracing::info!("{msg}");
    }
    fn warning(&self, msg: &str) {
        tracing::warn!("{msg}");
    }
    fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }
    fn summary(&self, count: usize, action: &str, elapsed_secs: f64) {
        tracing::info!(count, action, elapsed_secs, "summary");
    }
}
