//! Builder for running external tools with a time limit.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use pipeline::CollaboratorError;
use tokio::process::Command;

/// Default tool timeout: 2 minutes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for one external tool invocation.
///
/// ```no_run
/// use media::command::ToolCommand;
///
/// # async fn example() -> Result<(), pipeline::CollaboratorError> {
/// let output = ToolCommand::new("ffprobe")
///     .args(["-v", "error", "-of", "json", "-show_format"])
///     .arg("clip.mp4")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Appends a path argument.
    pub fn path_arg(&mut self, path: &Path) -> &mut Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// The tool's display name: the program's file name.
    pub fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.to_string_lossy().into_owned())
    }

    /// Runs the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - [`CollaboratorError::Timeout`] if the time limit expires; the child
    ///   is killed.
    /// - [`CollaboratorError::Tool`] if spawning fails or the process exits
    ///   with a non-zero status (message includes stderr).
    pub async fn execute(&self) -> Result<ToolOutput, CollaboratorError> {
        let tool = self.tool_name();

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CollaboratorError::Tool {
                tool: tool.clone(),
                message: format!("failed to spawn: {e}"),
            })?;

        tracing::debug!(tool = %tool, args = ?self.args, "running tool");
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(CollaboratorError::Tool {
                    tool,
                    message: format!("I/O error waiting for process: {e}"),
                })
            }
            Err(_elapsed) => {
                return Err(CollaboratorError::Timeout {
                    collaborator: tool,
                    after: self.timeout,
                })
            }
        };

        let out = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if !out.status.success() {
            return Err(CollaboratorError::Tool {
                tool,
                message: format!("exited with status {}: {}", out.status, out.stderr.trim()),
            });
        }
        Ok(out)
    }
}

/// Resolves a tool: an explicit path wins, otherwise `name` is looked up on
/// `PATH`.
pub fn resolve_tool(explicit: Option<&Path>, name: &str) -> Option<PathBuf> {
    match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => which::which(name).ok(),
    }
}
