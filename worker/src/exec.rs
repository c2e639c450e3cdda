//! External command execution.
//!
//! Runs a child process, captures its output and maps a non-zero exit
//! into a structured failure. Stderr of the index-building tool is
//! scraped for its own `Error: ...` line so the user-facing message
//! carries the tool's detail instead of a generic one.

use std::path::PathBuf;
use std::process::Command;

use forge_core::error::{ForgeError, Result};

/// Failure context used when the caller supplies none.
pub const DEFAULT_FAILURE_CONTEXT: &str = "An unexpected error occurred";

/// Name of the index-building tool whose stderr carries `Error:` lines.
const INDEX_TOOL: &str = "opm";

/// Options for a single command invocation.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Working directory for the child process
    pub cwd: Option<PathBuf>,
    /// Context string used in the failure message on non-zero exit
    pub failure_context: Option<String>,
}

impl RunOptions {
    /// Options with only a failure context set.
    pub fn with_context(context: impl Into<String>) -> Self {
        Self {
            cwd: None,
            failure_context: Some(context.into()),
        }
    }
}

/// Executes an external command and returns its captured stdout.
pub trait CommandRunner: Send + Sync {
    fn run(&self, cmd: &[String], opts: &RunOptions) -> Result<String>;
}

/// [`CommandRunner`] backed by a real child process.
#[derive(Debug, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, cmd: &[String], opts: &RunOptions) -> Result<String> {
        let program = cmd.first().ok_or_else(|| {
            ForgeError::Command("Cannot run an empty command".to_string())
        })?;

        tracing::debug!(command = %cmd.join(" "), "Running the command");
        let mut command = Command::new(program);
        command.args(&cmd[1..]);
        if let Some(cwd) = &opts.cwd {
            command.current_dir(cwd);
        }

        let output = command.output().map_err(|e| {
            ForgeError::Command(format!("Failed to execute {}: {}", program, e))
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::error!(
            command = %cmd.join(" "),
            stderr = %stderr,
            "The command failed"
        );

        let context = opts
            .failure_context
            .as_deref()
            .unwrap_or(DEFAULT_FAILURE_CONTEXT);
        if program == INDEX_TOOL {
            if let Some(detail) = parse_tool_error(&stderr) {
                return Err(ForgeError::Command(format!(
                    "{}: {}",
                    context.trim_end_matches('.'),
                    detail
                )));
            }
        }
        Err(ForgeError::Command(context.to_string()))
    }
}

/// Extract the index-building tool's own error detail from its stderr.
///
/// The failure occurs near the bottom of the output, right before the
/// help display, so the lines are scanned in reverse for the first one
/// of the form `Error: <message>`.
pub fn parse_tool_error(stderr: &str) -> Option<String> {
    for line in stderr.lines().rev() {
        if let Some(detail) = line.strip_prefix("Error: ") {
            if !detail.is_empty() {
                return Some(detail.to_string());
            }
        }
    }
    None
}
