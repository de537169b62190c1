//! Defines the messages the chooser sends to whoever presents them to the user.

use serde::Serialize;
use std::path::PathBuf;

/// Events sent from the chooser core to the host's UI.
///
/// Only conditions the user can act on are sent unconditionally; `Cancelled`
/// and `HelperFailed` are sent only when the cancel policy asks for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UserEvent {
    /// The helper program (or its interpreter) is missing.
    HelperMissing { program: PathBuf },
    /// The picked path lives inside the sandbox document broker.
    SandboxRejected { path: PathBuf },
    /// The project subdirectory could not be created.
    DirectoryCreateFailed { directory: PathBuf, reason: String },
    /// The dialog was dismissed without a selection.
    Cancelled,
    /// The helper ran but its answer was unusable.
    HelperFailed { reason: String },
}

impl UserEvent {
    /// Text suitable for a message box.
    pub fn message(&self) -> String {
        match self {
            UserEvent::HelperMissing { program } => format!(
                "The file chooser helper could not be found: {}\n\n\
                 Install it (it needs Python 3 with PyGObject and a running \
                 xdg-desktop-portal) or set \"helper\" in the chooser config file.",
                program.display()
            ),
            UserEvent::SandboxRejected { path } => format!(
                "The selected location is provided by the document portal \
                 sandbox and cannot be used directly:\n{}\n\n\
                 Please choose a regular folder (e.g. inside your home directory).",
                path.display()
            ),
            UserEvent::DirectoryCreateFailed { directory, reason } => format!(
                "Could not create the project folder {}:\n{}",
                directory.display(),
                reason
            ),
            UserEvent::Cancelled => "No file was selected.".to_string(),
            UserEvent::HelperFailed { reason } => {
                format!("The file chooser did not return a usable answer: {}", reason)
            }
        }
    }
}
