//! Turns a profile, its persisted defaults and the host's document context
//! into a request, and a request into the helper's command line.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::profile::ActionProfile;
use super::{DialogOption, Filter, Mode, PersistedState, RequestDescriptor, StartingLocation};

/// What the host knows about the document the action applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentContext {
    /// Path of the currently open document, if it has ever been saved.
    pub path: Option<PathBuf>,
}

impl DocumentContext {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }
}

fn non_empty(path: Option<&PathBuf>) -> Option<&PathBuf> {
    path.filter(|p| !p.as_os_str().is_empty())
}

/// Builds the request for one invocation. Pure.
pub fn build_request(
    profile: &ActionProfile,
    state: &PersistedState,
    document: &DocumentContext,
) -> RequestDescriptor {
    let mut filters = profile.filters.clone();
    if profile.mode == Mode::Save && !filters.iter().any(Filter::is_catch_all) {
        filters.push(Filter::new("All files (*.*)", &["*.*"]));
    }

    let initial_filter_label = profile
        .initial_filter
        .as_ref()
        .filter(|label| filters.iter().any(|f| &f.label == *label))
        .or_else(|| filters.first().map(|f| &f.label))
        .cloned();

    let starting_location = if let Some(path) = non_empty(document.path.as_ref()) {
        StartingLocation::CurrentFile(path.clone())
    } else if let Some(dir) = non_empty(state.last_directory.as_ref()) {
        StartingLocation::CurrentFolder(dir.clone())
    } else {
        StartingLocation::None
    };

    let options = profile
        .options
        .iter()
        .map(|option| DialogOption {
            key: option.key.clone(),
            label: option.label.clone(),
            default_value: state.options.get(&option.key).copied().unwrap_or(false),
        })
        .collect();

    RequestDescriptor {
        mode: profile.mode,
        title: profile.title.clone(),
        accept_label: profile.accept_label.clone(),
        filters,
        initial_filter_label,
        starting_location,
        options,
    }
}

/// The helper splits its compound arguments on `|`.
fn field(text: &str) -> String {
    text.replace('|', "/")
}

fn push_flag(args: &mut Vec<OsString>, flag: &str, value: impl Into<OsString>) {
    args.push(OsString::from(flag));
    args.push(value.into());
}

/// Renders the request as the helper's flat argument list.
///
/// `timeout` is forwarded so the helper gives up on its own dialog at the
/// same time the invoker would stop waiting for it.
pub fn render_args(request: &RequestDescriptor, timeout: Option<Duration>) -> Vec<OsString> {
    let mut args = Vec::new();
    push_flag(&mut args, "--out", "-");
    push_flag(&mut args, "--title", request.title.as_str());
    if request.mode == Mode::Save {
        args.push(OsString::from("--save"));
    }
    if let Some(label) = &request.accept_label {
        push_flag(&mut args, "--accept-label", label.as_str());
    }

    for filter in &request.filters {
        let patterns: Vec<String> = filter
            .patterns
            .iter()
            .map(|p| field(p).replace(';', ","))
            .collect();
        push_flag(
            &mut args,
            "--filter",
            format!("{}|{}", field(&filter.label), patterns.join(";")),
        );
    }
    if let Some(label) = &request.initial_filter_label {
        push_flag(&mut args, "--initial-filter", label.as_str());
    }

    match (&request.starting_location, request.mode) {
        (StartingLocation::CurrentFile(path), Mode::Save) => {
            push_flag(&mut args, "--current-file", path.as_os_str());
        }
        // The helper only honours a current file when saving.
        (StartingLocation::CurrentFile(path), Mode::Open) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                push_flag(&mut args, "--current-folder", parent.as_os_str());
            }
        }
        (StartingLocation::CurrentFolder(dir), _) => {
            push_flag(&mut args, "--current-folder", dir.as_os_str());
        }
        (StartingLocation::None, _) => {}
    }

    for option in &request.options {
        push_flag(
            &mut args,
            "--choice",
            format!(
                "{}|{}|{}",
                field(&option.key),
                field(&option.label),
                option.default_value
            ),
        );
    }

    if let Some(timeout) = timeout {
        push_flag(&mut args, "--timeout", timeout.as_secs().max(1).to_string());
    }

    tracing::debug!("Helper arguments: {:?}", args);
    args
}

/// Convenience for logging: the starting directory a request points at.
pub fn starting_directory(request: &RequestDescriptor) -> Option<&Path> {
    match &request.starting_location {
        StartingLocation::CurrentFile(path) => path.parent(),
        StartingLocation::CurrentFolder(dir) => Some(dir.as_path()),
        StartingLocation::None => None,
    }
}
