use anyhow::Result;
use directories::ProjectDirs;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use super::ChooserConfig;

const APP_NAME: &str = "PortalChooser";
const CONFIG_FILE: &str = "config.json";
const STATE_DIR: &str = "state";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "portalchooser", APP_NAME)
}

/// Returns the platform-specific configuration directory for the application.
pub fn get_config_directory() -> Option<PathBuf> {
    project_dirs().map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
}

/// Returns the full path to the configuration file.
pub fn get_config_file_path() -> Option<PathBuf> {
    get_config_directory().map(|dir| dir.join(CONFIG_FILE))
}

/// Returns the directory holding the per-action state files.
pub fn get_state_directory() -> Option<PathBuf> {
    project_dirs().map(|proj_dirs| proj_dirs.data_dir().join(STATE_DIR))
}

fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => get_config_file_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory")),
    }
}

/// Loads the configuration from `path`, or from the platform config file.
/// If the file doesn't exist, it creates a default one.
/// If the file is corrupted or cannot be parsed, it logs a warning
/// and falls back to the default configuration.
pub fn load_config(path: Option<&Path>) -> Result<ChooserConfig> {
    let config_path = resolve_path(path)?;

    if !config_path.exists() {
        tracing::info!(
            "Config file not found, creating default config at {:?}",
            config_path
        );
        let default_config = ChooserConfig::default();
        save_config(&default_config, Some(&config_path))?;
        return Ok(default_config);
    }

    let config_content = fs::read_to_string(&config_path)?;

    match serde_json::from_str::<ChooserConfig>(&config_content) {
        Ok(config) => {
            tracing::info!("Loaded config from {:?}", config_path);
            Ok(config)
        }
        Err(e) => {
            tracing::warn!(
                "Failed to parse config file at {:?}: {}. Falling back to default config.",
                config_path,
                e
            );
            migrate_legacy_config(&config_content).or_else(|_| Ok(ChooserConfig::default()))
        }
    }
}

/// Fills fields that older config files lack (or store as `null`) with
/// their defaults, then parses the result.
fn migrate_legacy_config(config_content: &str) -> Result<ChooserConfig> {
    let mut value: Value = serde_json::from_str(config_content)?;
    let obj = value
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("Config is not a JSON object"))?;

    let defaults = ChooserConfig::default();

    let ensure_field = |obj: &mut serde_json::Map<String, Value>, key: &str, default_val: Value| {
        if !obj.contains_key(key) || obj.get(key) == Some(&Value::Null) {
            obj.insert(key.to_string(), default_val);
        }
    };

    ensure_field(obj, "helper", serde_json::to_value(&defaults.helper)?);
    ensure_field(obj, "timeout_secs", serde_json::to_value(defaults.timeout_secs)?);
    ensure_field(obj, "on_cancel", serde_json::to_value(defaults.on_cancel)?);
    ensure_field(
        obj,
        "sandbox_pattern",
        Value::String(defaults.sandbox_pattern.clone()),
    );
    ensure_field(obj, "profiles", serde_json::to_value(&defaults.profiles)?);
    if !obj.contains_key("state_directory") {
        obj.insert("state_directory".to_string(), Value::Null);
    }

    let migrated_config: ChooserConfig = serde_json::from_value(Value::Object(obj.clone()))?;
    tracing::info!("Successfully migrated legacy config");
    Ok(migrated_config)
}

/// Saves the provided configuration to `path`, or to the platform config file.
pub fn save_config(config: &ChooserConfig, path: Option<&Path>) -> Result<()> {
    let config_path = resolve_path(path)?;

    if let Some(config_dir) = config_path.parent() {
        if !config_dir.as_os_str().is_empty() && !config_dir.exists() {
            fs::create_dir_all(config_dir)?;
            tracing::info!("Created config directory: {:?}", config_dir);
        }
    }

    let config_json = serde_json::to_string_pretty(config)?;
    fs::write(&config_path, config_json)?;
    tracing::info!("Saved config to {:?}", config_path);

    Ok(())
}

// Platform-specific configuration paths for reference:
// Linux:   ~/.config/portalchooser/config.json
//          ~/.local/share/portalchooser/state/<action>.state

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CancelPolicy;
    use crate::utils::test_helpers::setup_test_logging;

    #[test]
    fn test_missing_config_is_created_with_defaults() {
        setup_test_logging();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config, ChooserConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let config = ChooserConfig {
            timeout_secs: 30,
            on_cancel: CancelPolicy::Notify,
            state_directory: Some(dir.path().join("state")),
            ..Default::default()
        };

        save_config(&config, Some(&path)).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), config);
    }

    #[test]
    fn test_partial_config_is_migrated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, r#"{"timeout_secs": 5, "on_cancel": null}"#).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.on_cancel, CancelPolicy::Silent);
        assert_eq!(config.helper, ChooserConfig::default().helper);
    }

    #[test]
    fn test_corrupt_config_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "{ this is not json").unwrap();

        assert_eq!(load_config(Some(&path)).unwrap(), ChooserConfig::default());
    }
}
