//! Container Build Driver (C5): drives an external OCi runtime through the
//! create/copy-in/start/copy-out/remove protocol. Used both by the compiler
//! (C6, via C5 directly) and the dependency resolver (C3).
//!
//! Bind mounts are deliberately not used: the process driving this code may
//! itself be running inside a container that shares only the runtime socket
//! with the host, so paths on "this" filesystem are not visible to the
//! daemon that would service a bind mount.

use std::path::Path;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::NovaError;

/// Everything the driver needs to run one builder container to completion.
#[derive(Debug, Clone)]
pub struct BuildSpec {
    pub image: String,
    pub shell_command: String,
    pub container_name: String,
    /// Path inside the container to copy out after the build exits
    /// successfully, e.g. `/work/handler` or `/work/deps`.
    pub output_path: String,
}

/// Drives builder containers via a configured container runtime binary
/// (`docker`, `podman`, ...).
pub struct ContainerBuildDriver {
    runtime_bin: String,
}

impl ContainerBuildDriver {
    pub fn new(runtime_bin: impl Into<String>) -> Self {
        Self {
            runtime_bin: runtime_bin.into(),
        }
    }

    /// Run `spec` against the prepared `work_dir`, copying its contents into
    /// the container's `/work`, executing the build command, and copying
    /// `spec.output_path` back out to `work_dir` as a single file's bytes on
    /// success. The container is removed on every exit path, including
    /// cancellation via `cancel`. Used by the compiler (C6), whose output is
    /// always a single `/work/handler` binary.
    pub async fn build_file(
        &self,
        spec: &BuildSpec,
        work_dir: &Path,
        cancel: CancellationToken,
    ) -> Result<Vec<u8>, NovaError> {
        let result = self.run_to_start(spec, work_dir, cancel).await;
        let result = match result {
            Ok(()) => self.copy_out_file(&spec.container_name, &spec.output_path, work_dir).await,
            Err(e) => Err(e),
        };
        self.remove(&spec.container_name).await;
        result
    }

    /// Same protocol as [`Self::build_file`], but `spec.output_path` names a
    /// directory inside the container whose tree is copied back and flattened
    /// into a `relpath -> bytes` map, skipping any path for which `exclude`
    /// returns `true`. Used by the dependency resolver (C3), whose output is
    /// a directory of installed packages.
    pub async fn build_dir(
        &self,
        spec: &BuildSpec,
        work_dir: &Path,
        cancel: CancellationToken,
        exclude: impl Fn(&str) -> bool,
    ) -> Result<std::collections::HashMap<String, Vec<u8>>, NovaError> {
        let result = self.run_to_start(spec, work_dir, cancel).await;
        let result = match result {
            Ok(()) => {
                self.copy_out_dir(&spec.container_name, &spec.output_path, work_dir, exclude)
                    .await
            }
            Err(e) => Err(e),
        };
        self.remove(&spec.container_name).await;
        result
    }

    async fn run_to_start(
        &self,
        spec: &BuildSpec,
        work_dir: &Path,
        cancel: CancellationToken,
    ) -> Result<(), NovaError> {
        self.create(spec).await?;
        self.copy_in(work_dir, &spec.container_name).await?;
        let (stdout, _stderr) = self.start(spec, cancel).await?;
        if !stdout.is_empty() {
            tracing::debug!(container = %spec.container_name, %stdout, "build stdout");
        }
        Ok(())
    }

    async fn create(&self, spec: &BuildSpec) -> Result<(), NovaError> {
        let output = Command::new(&self.runtime_bin)
            .args([
                "create",
                "--name",
                &spec.container_name,
                "--platform",
                "linux/amd64",
                "--network",
                "host",
                &spec.image,
                "sh",
                "-c",
                &spec.shell_command,
            ])
            .output()
            .await
            .map_err(|e| NovaError::BuildFailed {
                message: format!("CreateFailed: {e}"),
                stdout: String::new(),
                stderr: String::new(),
            })?;

        if !output.status.success() {
            return Err(NovaError::BuildFailed {
                message: "CreateFailed".to_string(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(())
    }

    async fn copy_in(&self, work_dir: &Path, container_name: &str) -> Result<(), NovaError> {
        let src = format!("{}/.", work_dir.display());
        let dst = format!("{container_name}:/work/");
        let output = Command::new(&self.runtime_bin)
            .args(["cp", &src, &dst])
            .output()
            .await
            .map_err(|e| NovaError::BuildFailed {
                message: format!("CopyInFailed: {e}"),
                stdout: String::new(),
                stderr: String::new(),
            })?;

        if !output.status.success() {
            return Err(NovaError::BuildFailed {
                message: "CopyInFailed".to_string(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(())
    }

    async fn start(
        &self,
        spec: &BuildSpec,
        cancel: CancellationToken,
    ) -> Result<(String, String), NovaError> {
        let mut child = Command::new(&self.runtime_bin)
            .args(["start", "-a", &spec.container_name])
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| NovaError::BuildFailed {
                message: format!("BuildFailed: failed to start container: {e}"),
                stdout: String::new(),
                stderr: String::new(),
            })?;

        tokio::select! {
            output = child.wait_with_output() => {
                let output = output.map_err(|e| NovaError::BuildFailed {
                    message: format!("BuildFailed: {e}"),
                    stdout: String::new(),
                    stderr: String::new(),
                })?;
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                if !output.status.success() {
                    return Err(NovaError::BuildFailed {
                        message: "build command exited non-zero".to_string(),
                        stdout,
                        stderr,
                    });
                }
                Ok((stdout, stderr))
            }
            () = cancel.cancelled() => {
                Err(NovaError::BuildFailed {
                    message: "BuildFailed: cancelled".to_string(),
                    stdout: String::new(),
                    stderr: String::new(),
                })
            }
        }
    }

    async fn copy_out_path(
        &self,
        container_name: &str,
        output_path: &str,
        dest: &Path,
    ) -> Result<(), NovaError> {
        let src = format!("{container_name}:{output_path}");
        let output = Command::new(&self.runtime_bin)
            .args(["cp", &src, &dest.to_string_lossy()])
            .output()
            .await
            .map_err(|e| NovaError::BuildFailed {
                message: format!("CopyOutFailed: {e}"),
                stdout: String::new(),
                stderr: String::new(),
            })?;

        if !output.status.success() {
            return Err(NovaError::BuildFailed {
                message: "CopyOutFailed".to_string(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(())
    }

    async fn copy_out_file(
        &self,
        container_name: &str,
        output_path: &str,
        work_dir: &Path,
    ) -> Result<Vec<u8>, NovaError> {
        let dest_name = Path::new(output_path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "artifact".to_string());
        let dest = work_dir.join(format!("_copied_out_{dest_name}"));
        self.copy_out_path(container_name, output_path, &dest).await?;

        tokio::fs::read(&dest).await.map_err(|e| NovaError::BuildFailed {
            message: format!("ReadArtifactFailed: {e}"),
            stdout: String::new(),
            stderr: String::new(),
        })
    }

    async fn copy_out_dir(
        &self,
        container_name: &str,
        output_path: &str,
        work_dir: &Path,
        exclude: impl Fn(&str) -> bool,
    ) -> Result<std::collections::HashMap<String, Vec<u8>>, NovaError> {
        let dest = work_dir.join("_copied_out_dir");
        self.copy_out_path(container_name, output_path, &dest).await?;

        let mut collected = std::collections::HashMap::new();
        for entry in walkdir::WalkDir::new(&dest)
            .into_iter()
            .filter_map(std::result::Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let relpath = entry
                .path()
                .strip_prefix(&dest)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace(std::path::MAIN_SEPARATOR, "/");
            if exclude(&relpath) {
                continue;
            }
            let bytes = tokio::fs::read(entry.path())
                .await
                .map_err(|e| NovaError::BuildFailed {
                    message: format!("ReadArtifactFailed: {e}"),
                    stdout: String::new(),
                    stderr: String::new(),
                })?;
            collected.insert(relpath, bytes);
        }
        Ok(collected)
    }

    async fn remove(&self, container_name: &str) {
        let result = Command::new(&self.runtime_bin)
            .args(["rm", "-f", container_name])
            .output()
            .await;
        if let Err(e) = result {
            tracing::warn!(container = %container_name, error = %e, "failed to remove builder container");
        }
    }
}

/// Deterministic container name for a compile run, disambiguated by the
/// owning process id so concurrent calls in the same process never collide.
pub fn compile_container_name(function_name: &str) -> String {
    format!("nova-compile-{function_name}-{}", std::process::id())
}

/// Deterministic container name for a dependency resolution run,
/// disambiguated by the first 12 hex characters of the manifest digest.
pub fn deps_container_name(family: &str, manifest_digest_hex12: &str) -> String {
    format!("nova-{family}deps-{manifest_digest_hex12}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_names_are_namespaced_by_function_and_pid() {
        let name = compile_container_name("adder");
        assert!(name.starts_with("nova-compile-adder-"));
    }

    #[test]
    fn deps_names_are_namespaced_by_family_and_digest() {
        let name = deps_container_name("python", "abcdef012345");
        assert_eq!(name, "nova-pythondeps-abcdef012345");
    }
}
