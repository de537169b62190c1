pub mod arguments;
pub mod error;
pub mod invoker;
pub mod parser;
pub mod policy;
pub mod profile;
pub mod state_store;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Whether the dialog picks an existing file or a save destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Open,
    Save,
}

/// A labelled group of glob patterns offered in the dialog's filter dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub label: String,
    pub patterns: Vec<String>,
}

impl Filter {
    pub fn new(label: impl Into<String>, patterns: &[&str]) -> Self {
        Self {
            label: label.into(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// `true` if the filter lets every file through.
    pub fn is_catch_all(&self) -> bool {
        self.patterns.iter().any(|p| p == "*" || p == "*.*")
    }
}

/// A checkbox rendered below the file list of the native dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogOption {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub default_value: bool,
}

impl DialogOption {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            default_value: false,
        }
    }
}

/// Where the dialog should start browsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartingLocation {
    CurrentFile(PathBuf),
    CurrentFolder(PathBuf),
    None,
}

/// Everything the helper needs to render one dialog. Built fresh per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub mode: Mode,
    pub title: String,
    pub accept_label: Option<String>,
    pub filters: Vec<Filter>,
    pub initial_filter_label: Option<String>,
    pub starting_location: StartingLocation,
    pub options: Vec<DialogOption>,
}

/// The user's answer as reported by the helper.
///
/// A missing `selected_path` means the dialog was cancelled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    pub selected_path: Option<PathBuf>,
    pub selected_filter: Option<Filter>,
    pub options: BTreeMap<String, bool>,
}

impl Outcome {
    pub fn cancelled() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.selected_path.is_none()
    }

    /// Value of a checkbox, `false` when the helper did not report it.
    pub fn option(&self, key: &str) -> bool {
        self.options.get(key).copied().unwrap_or(false)
    }
}

/// Per-action defaults remembered between invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedState {
    pub last_directory: Option<PathBuf>,
    pub options: BTreeMap<String, bool>,
}

impl PersistedState {
    /// Keeps only the option keys in `declared`.
    pub fn retain_declared(&mut self, declared: &[DialogOption]) {
        self.options
            .retain(|key, _| declared.iter().any(|option| &option.key == key));
    }
}

pub use arguments::{build_request, DocumentContext};
pub use error::ChooserError;
pub use invoker::{HelperCommand, HelperInvoker, HelperOutput};
pub use parser::{parse_outcome, ParseFailure};
pub use policy::{Halt, PolicyPipeline, Verdict};
pub use profile::ActionProfile;
pub use state_store::StateStore;
