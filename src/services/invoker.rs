use crate::api::error::AppError;
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Captured result of one external tool run.
#[derive(Debug)]
pub struct ToolOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Diagnostic text for a failed run: stderr, falling back to stdout when
    /// the tool wrote its complaint there instead.
    pub fn diagnostic(&self) -> &str {
        if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// Runs external converters as bounded, failure-isolated subprocesses.
///
/// Arguments are always passed as a discrete vector, never a shell string,
/// so filename-derived text can never be interpreted as shell metacharacters.
/// Every invocation carries a hard timeout; expiry is a conversion failure,
/// and `kill_on_drop` reaps the child if the request future is cancelled.
pub struct ToolInvoker {
    timeout: Duration,
}

impl ToolInvoker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn run<I, S>(&self, program: &str, args: I) -> Result<ToolOutput, AppError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(program);
        command.args(args).kill_on_drop(true);

        debug!("🔧 Running {}", program);
        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                warn!("{} timed out after {:?}", program, self.timeout);
                AppError::Conversion(format!(
                    "{} timed out after {}s",
                    program,
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| AppError::Conversion(format!("failed to launch {}: {}", program, e)))?;

        Ok(ToolOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Run a tool and apply the two-part success check: the exit code must be
    /// zero AND the expected output must exist on disk. Some tools exit 0 but
    /// silently produce nothing; others exit nonzero after partially writing
    /// a file. Both count as failure, and the partial output (if any) stays
    /// tracked by the caller's cleanup guard.
    pub async fn run_expecting<I, S>(
        &self,
        program: &str,
        args: I,
        expected_output: &Path,
    ) -> Result<(), AppError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = self.run(program, args).await?;
        if !output.success || !expected_output.exists() {
            return Err(AppError::Conversion(output.diagnostic().trim().to_string()));
        }
        Ok(())
    }
}
