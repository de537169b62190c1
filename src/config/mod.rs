pub mod settings;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::core::invoker::HelperCommand;
use crate::core::policy::SandboxPathRejection;
use crate::core::profile::ActionProfile;

/// Whether a cancelled dialog or an unusable helper reply is reported to the
/// user or ends the action silently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelPolicy {
    #[default]
    Silent,
    Notify,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChooserConfig {
    pub helper: HelperCommand,
    /// Upper bound on how long the dialog may stay open; `0` waits forever.
    pub timeout_secs: u64,
    pub on_cancel: CancelPolicy,
    pub state_directory: Option<PathBuf>,
    pub sandbox_pattern: String,
    pub profiles: Vec<ActionProfile>,
}

impl ChooserConfig {
    pub fn load() -> Result<Self> {
        settings::load_config(None)
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// The configured state directory, or the platform default.
    pub fn state_directory(&self) -> PathBuf {
        self.state_directory
            .clone()
            .or_else(settings::get_state_directory)
            .unwrap_or_else(|| PathBuf::from("state"))
    }

    /// Built-in profiles plus the ones defined in the config file.
    pub fn profile(&self, id: &str) -> Option<ActionProfile> {
        ActionProfile::find(id, &self.profiles)
    }
}

impl Default for ChooserConfig {
    fn default() -> Self {
        Self {
            helper: HelperCommand {
                program: PathBuf::from("reaper_portal_fc.py"),
                interpreter: Some(PathBuf::from("python3")),
            },
            timeout_secs: 600,
            on_cancel: CancelPolicy::Silent,
            state_directory: None,
            sandbox_pattern: SandboxPathRejection::DEFAULT_PATTERN.to_string(),
            profiles: Vec::new(),
        }
    }
}
