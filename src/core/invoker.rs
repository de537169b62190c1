//! Runs the file chooser helper as a child process and collects what it prints.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::error::ChooserError;

/// How to start the helper: the program itself and, for scripts, the
/// interpreter that runs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperCommand {
    pub program: PathBuf,
    #[serde(default)]
    pub interpreter: Option<PathBuf>,
}

impl HelperCommand {
    /// Resolves the program and the interpreter to files that can be run.
    ///
    /// Whatever is executed directly must be executable and is looked up on
    /// `PATH` when given as a bare name. A script handed to an interpreter
    /// only has to exist.
    pub fn locate(&self) -> Result<HelperCommand, ChooserError> {
        let not_found = |program: &Path| ChooserError::HelperNotFound {
            program: program.to_path_buf(),
        };
        match &self.interpreter {
            Some(interpreter) => {
                let program =
                    find_script(&self.program).ok_or_else(|| not_found(&self.program))?;
                let interpreter =
                    find_executable(interpreter).ok_or_else(|| not_found(interpreter))?;
                Ok(HelperCommand {
                    program,
                    interpreter: Some(interpreter),
                })
            }
            None => {
                let program =
                    find_executable(&self.program).ok_or_else(|| not_found(&self.program))?;
                Ok(HelperCommand {
                    program,
                    interpreter: None,
                })
            }
        }
    }
}

fn is_bare_name(name: &Path) -> bool {
    name.components().count() == 1 && !name.is_absolute()
}

fn find_script(name: &Path) -> Option<PathBuf> {
    if name.as_os_str().is_empty() {
        return None;
    }
    if is_bare_name(name) {
        return find_executable(name);
    }
    name.is_file().then(|| name.to_path_buf())
}

fn find_executable(name: &Path) -> Option<PathBuf> {
    if name.as_os_str().is_empty() {
        return None;
    }
    match which::which(name) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::debug!("No executable {:?}: {}", name, e);
            None
        }
    }
}

/// What came back from one helper run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelperOutput {
    /// Everything the helper wrote to stdout, trimmed.
    Text(String),
    /// Spawn failure, empty stdout, or a failed exit without output.
    NoOutput,
    /// The helper did not finish within the configured bound and was killed.
    TimedOut,
    /// The caller cancelled while the dialog was open; the helper was killed.
    Cancelled,
}

pub struct HelperInvoker {
    command: HelperCommand,
    timeout: Option<Duration>,
}

async fn deadline(timeout: Option<Duration>) {
    match timeout {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending::<()>().await,
    }
}

impl HelperInvoker {
    pub fn new(command: HelperCommand, timeout: Option<Duration>) -> Self {
        Self { command, timeout }
    }

    /// Spawns the helper once and waits for it to exit.
    ///
    /// The child is spawned with `kill_on_drop`, so every early return
    /// (timeout, cancellation) kills it and releases its pipes.
    pub async fn invoke(&self, args: &[OsString], cancel: &CancellationToken) -> HelperOutput {
        let mut command = match &self.command.interpreter {
            Some(interpreter) => {
                let mut command = Command::new(interpreter);
                command.arg(&self.command.program);
                command
            }
            None => Command::new(&self.command.program),
        };
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!("Failed to spawn helper {:?}: {}", self.command.program, e);
                return HelperOutput::NoOutput;
            }
        };
        tracing::info!("Helper started (pid {:?})", child.id());

        let wait = child.wait_with_output();
        tokio::pin!(wait);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Helper run cancelled by caller.");
                return HelperOutput::Cancelled;
            }
            _ = deadline(self.timeout) => {
                tracing::warn!("Helper did not finish within {:?}; killing it.", self.timeout);
                return HelperOutput::TimedOut;
            }
            result = &mut wait => result,
        };

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("Failed to collect helper output: {}", e);
                return HelperOutput::NoOutput;
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            tracing::debug!("Helper stderr: {}", stderr.trim());
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            if !output.status.success() {
                tracing::warn!("Helper exited with {} and no output.", output.status);
            }
            return HelperOutput::NoOutput;
        }
        if !output.status.success() {
            tracing::debug!("Helper exited with {} but produced output.", output.status);
        }
        HelperOutput::Text(text)
    }
}
