//! Per-action persisted defaults: the last directory and the checkbox values.
//!
//! Each action identity owns one small text file of `key=value` lines.
//! Reads never fail; writes go through a temporary sibling file that is
//! renamed over the target, so a reader sees either the old or the new record.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use super::error::ChooserError;
use super::PersistedState;

const DIR_KEY: &str = "dir";
const STATE_FILE_EXTENSION: &str = "state";

pub struct StateStore {
    directory: PathBuf,
}

impl StateStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Returns the file that backs `action_id`.
    pub fn state_file_path(&self, action_id: &str) -> PathBuf {
        self.directory
            .join(format!("{}.{}", file_stem_for(action_id), STATE_FILE_EXTENSION))
    }

    /// Loads the state for `action_id`. A missing or unreadable file yields
    /// the empty default.
    pub fn load(&self, action_id: &str) -> PersistedState {
        let path = self.state_file_path(action_id);
        match fs::read_to_string(&path) {
            Ok(content) => {
                tracing::debug!("Loaded state for '{}' from {:?}", action_id, path);
                decode(&content)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => PersistedState::default(),
            Err(e) => {
                tracing::warn!(
                    "Failed to read state file {:?}: {}. Using defaults.",
                    path,
                    e
                );
                PersistedState::default()
            }
        }
    }

    /// Atomically replaces the state file for `action_id`.
    pub fn save(&self, action_id: &str, state: &PersistedState) -> Result<(), ChooserError> {
        let target = self.state_file_path(action_id);
        let write_error = |e: std::io::Error| ChooserError::StateWrite(e, target.clone());

        if !self.directory.exists() {
            fs::create_dir_all(&self.directory).map_err(write_error)?;
            tracing::info!("Created state directory: {:?}", self.directory);
        }

        let mut temp = tempfile::NamedTempFile::new_in(&self.directory).map_err(write_error)?;
        temp.write_all(encode(state).as_bytes())
            .map_err(write_error)?;
        temp.as_file().sync_all().map_err(write_error)?;
        temp.persist(&target)
            .map_err(|e| ChooserError::StateWrite(e.error, target.clone()))?;

        tracing::info!("Saved state for '{}' to {:?}", action_id, target);
        Ok(())
    }
}

/// Maps an action identity onto a safe file name.
fn file_stem_for(action_id: &str) -> String {
    let stem: String = action_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "default".to_string()
    } else {
        stem
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Decodes the on-disk record. Lines that are not `key=value` are skipped.
pub fn decode(content: &str) -> PersistedState {
    let mut state = PersistedState::default();

    // Older releases stored nothing but the directory itself. Keys never
    // start with `/`, so an absolute first line is such a path even when it
    // contains `=`.
    let first_line = content.lines().map(str::trim).find(|line| !line.is_empty());
    if !content.contains('=') || first_line.is_some_and(|line| line.starts_with('/')) {
        state.last_directory = first_line.map(PathBuf::from);
        return state;
    }

    for line in content.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            tracing::debug!("Skipping malformed state line: {:?}", line);
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        if key == DIR_KEY {
            state.last_directory = if value.is_empty() {
                None
            } else {
                Some(PathBuf::from(value))
            };
            continue;
        }
        match parse_flag(value) {
            Some(flag) => {
                state.options.insert(key.to_string(), flag);
            }
            None => tracing::debug!("Skipping non-boolean state value for '{}'", key),
        }
    }
    state
}

/// Encodes a record as `key=value` lines, booleans as `1`/`0`.
pub fn encode(state: &PersistedState) -> String {
    let mut out = String::new();
    if let Some(dir) = &state.last_directory {
        match dir.to_str() {
            Some(dir) if !dir.contains('\n') && !dir.contains('\r') => {
                out.push_str(&format!("{}={}\n", DIR_KEY, dir));
            }
            _ => tracing::warn!("Directory {:?} cannot be stored; dropping it.", dir),
        }
    }
    for (key, value) in &state.options {
        if key.is_empty()
            || key == DIR_KEY
            || key.starts_with('/')
            || key.contains('=')
            || key.contains('\n')
        {
            continue;
        }
        out.push_str(&format!("{}={}\n", key, if *value { "1" } else { "0" }));
    }
    out
}
