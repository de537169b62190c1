//! Data that parameterizes one configured chooser action.
//!
//! Every open/save variant is the same core driven by a different profile:
//! its filters, its checkboxes, and which checkboxes gate extra host calls.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{DialogOption, Filter, Mode};

pub const SAVE_PROJECT: &str = "save-project";
pub const OPEN_PROJECT: &str = "open-project";

/// Checkbox key that materializes a per-project subdirectory on save.
pub const CREATE_SUBDIR: &str = "create_subdir";
/// Checkbox key that opens the project in a new host tab.
pub const OPEN_IN_NEW_TAB: &str = "open_in_new_tab";
/// Checkbox key that opens the project with all effects offline.
pub const FX_OFFLINE: &str = "fx_offline";

/// A label keyword and the extension it implies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionKeyword {
    pub keyword: String,
    pub extension: String,
}

impl ExtensionKeyword {
    fn new(keyword: &str, extension: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            extension: extension.to_string(),
        }
    }
}

/// Option keys whose `true` value triggers extra behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionHooks {
    #[serde(default)]
    pub subdirectory: Option<String>,
    #[serde(default)]
    pub new_container: Option<String>,
    #[serde(default)]
    pub effects_offline: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionProfile {
    /// Stable identity; also names the persisted state file.
    pub id: String,
    pub mode: Mode,
    pub title: String,
    #[serde(default)]
    pub accept_label: Option<String>,
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub initial_filter: Option<String>,
    #[serde(default)]
    pub options: Vec<DialogOption>,
    #[serde(default = "default_extension")]
    pub default_extension: String,
    #[serde(default = "default_extension_keywords")]
    pub extension_keywords: Vec<ExtensionKeyword>,
    #[serde(default = "default_placeholder_directory")]
    pub placeholder_directory: String,
    #[serde(default)]
    pub hooks: OptionHooks,
}

fn default_extension() -> String {
    "rpp".to_string()
}

fn default_placeholder_directory() -> String {
    "Untitled".to_string()
}

/// Ordered so that more specific keywords win ("rpp-bak" before "rpp",
/// "vegas" before "edl").
fn default_extension_keywords() -> Vec<ExtensionKeyword> {
    [
        ("rpp-bak", "rpp-bak"),
        ("backup", "rpp-bak"),
        ("vegas", "txt"),
        ("radar", "txt"),
        ("samplitude", "edl"),
        ("aes-31", "adl"),
        ("ninjam", "log"),
        ("rpp", "rpp"),
        ("reaper", "rpp"),
        ("edl", "edl"),
        ("adl", "adl"),
        ("txt", "txt"),
    ]
    .into_iter()
    .map(|(keyword, extension)| ExtensionKeyword::new(keyword, extension))
    .collect()
}

impl ActionProfile {
    pub fn save_project() -> Self {
        Self {
            id: SAVE_PROJECT.to_string(),
            mode: Mode::Save,
            title: "Save project".to_string(),
            accept_label: Some("_Save".to_string()),
            filters: vec![
                Filter::new("REAPER Project files (*.RPP)", &["*.RPP"]),
                Filter::new("All files (*.*)", &["*.*"]),
            ],
            initial_filter: None,
            options: vec![DialogOption::new(
                CREATE_SUBDIR,
                "Create subdirectory for project",
            )],
            default_extension: default_extension(),
            extension_keywords: default_extension_keywords(),
            placeholder_directory: default_placeholder_directory(),
            hooks: OptionHooks {
                subdirectory: Some(CREATE_SUBDIR.to_string()),
                ..Default::default()
            },
        }
    }

    pub fn open_project() -> Self {
        let all_supported = [
            "*.RPP",
            "*.TXT",
            "*.EDL",
            "PROJ*.TXT",
            "*.ADL",
            "clipsort.log",
            "*.RPP-BAK",
        ];
        Self {
            id: OPEN_PROJECT.to_string(),
            mode: Mode::Open,
            title: "Open project".to_string(),
            accept_label: Some("_Open".to_string()),
            filters: vec![
                // No catch-all in here; that is what the last entry is for.
                Filter::new("All Supported Projects", &all_supported),
                Filter::new("REAPER Project files (*.RPP)", &["*.RPP"]),
                Filter::new("EDL TXT (Vegas) files (*.TXT)", &["*.TXT"]),
                Filter::new("EDL (Samplitude) files (*.EDL)", &["*.EDL"]),
                Filter::new("RADAR Session TXT files (PROJ*.TXT)", &["PROJ*.TXT"]),
                Filter::new("AES-31 files (*.ADL)", &["*.ADL"]),
                Filter::new("NINJAM log files (clipsort.log)", &["clipsort.log"]),
                Filter::new("REAPER Project Backup files (*.RPP-BAK)", &["*.RPP-BAK"]),
                Filter::new("All files (*.*)", &["*.*"]),
            ],
            initial_filter: Some("All Supported Projects".to_string()),
            options: vec![
                DialogOption::new(OPEN_IN_NEW_TAB, "Open in new project tab"),
                DialogOption::new(FX_OFFLINE, "Open with FX offline (recovery mode)"),
            ],
            default_extension: default_extension(),
            extension_keywords: default_extension_keywords(),
            placeholder_directory: default_placeholder_directory(),
            hooks: OptionHooks {
                subdirectory: None,
                new_container: Some(OPEN_IN_NEW_TAB.to_string()),
                effects_offline: Some(FX_OFFLINE.to_string()),
            },
        }
    }

    pub fn builtin() -> Vec<Self> {
        vec![Self::save_project(), Self::open_project()]
    }

    /// Looks `id` up in `extra` first, then among the built-in profiles.
    pub fn find(id: &str, extra: &[ActionProfile]) -> Option<Self> {
        extra
            .iter()
            .find(|profile| profile.id == id)
            .cloned()
            .or_else(|| Self::builtin().into_iter().find(|profile| profile.id == id))
    }

    /// `true` if the hook is configured and its checkbox came back ticked.
    pub fn hook_enabled(hook: Option<&String>, options: &BTreeMap<String, bool>) -> bool {
        hook.and_then(|key| options.get(key))
            .copied()
            .unwrap_or(false)
    }
}
