//! Defines the custom error type for the `core` module.

use std::path::PathBuf;
use thiserror::Error;

use crate::app::host::HostError;

/// The primary error type for a chooser action.
///
/// Only conditions the user can act on live here. Failures inside the helper
/// boundary (spawn, empty output, malformed result) are absorbed by the
/// action and never become a `ChooserError`.
#[derive(Debug, Error)]
pub enum ChooserError {
    /// The helper program could not be located on disk or on `PATH`.
    #[error("File chooser helper not found: {}", program.display())]
    HelperNotFound { program: PathBuf },

    /// The project subdirectory could not be created.
    #[error("Could not create directory {1}: {0}")]
    DirectoryCreate(#[source] std::io::Error, PathBuf),

    /// The per-action state file could not be written.
    #[error("Could not write state file {1}: {0}")]
    StateWrite(#[source] std::io::Error, PathBuf),

    /// The configured broker path pattern is not a valid regular expression.
    #[error("Invalid sandbox path pattern: {0}")]
    InvalidSandboxPattern(#[from] regex::Error),

    /// A host document operation failed. The host reports its own diagnostics.
    #[error(transparent)]
    Host(#[from] HostError),
}
