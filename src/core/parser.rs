//! Decodes the helper's JSON reply into an [`Outcome`].
//!
//! Reply schema (version 1):
//!
//! ```json
//! {
//!   "version": 1,
//!   "path": "/home/u/song.RPP",
//!   "paths": ["/home/u/song.RPP"],
//!   "choices": {"create_subdir": true},
//!   "selected_filter_label": "REAPER Project files (*.RPP)",
//!   "selected_filter_globs": ["*.RPP"]
//! }
//! ```
//!
//! Every key is optional. `"path": null` with no `paths` is a cancelled dialog.
//! A reply carrying an `"error"` key is a helper-side failure.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

use super::{Filter, Outcome};

/// Newest reply schema this parser understands.
pub const SUPPORTED_VERSION: u64 = 1;

/// Why a reply could not be turned into an [`Outcome`]. Never shown to the user.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("Helper reply is not valid JSON: {0}")]
    Malformed(String),

    #[error("Helper reply is not a JSON object")]
    NotAnObject,

    #[error("Helper reply uses unsupported schema version {0}")]
    UnsupportedVersion(u64),

    #[error("Helper reported an error: {0}")]
    HelperError(String),
}

#[derive(Debug, Deserialize)]
struct HelperReply {
    #[serde(default)]
    version: Option<u64>,
    #[serde(default)]
    path: Option<Value>,
    #[serde(default)]
    paths: Option<Value>,
    #[serde(default, alias = "options")]
    choices: Option<Value>,
    #[serde(default)]
    selected_filter_label: Option<Value>,
    #[serde(default)]
    selected_filter_globs: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Parses one helper reply. Never panics.
pub fn parse_outcome(raw: &str) -> Result<Outcome, ParseFailure> {
    let value: Value =
        serde_json::from_str(raw.trim()).map_err(|e| ParseFailure::Malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(ParseFailure::NotAnObject);
    }
    let reply: HelperReply =
        serde_json::from_value(value).map_err(|e| ParseFailure::Malformed(e.to_string()))?;

    if let Some(version) = reply.version {
        if version > SUPPORTED_VERSION {
            return Err(ParseFailure::UnsupportedVersion(version));
        }
    }
    if let Some(error) = reply.error.filter(|e| !e.is_null()) {
        let message = match error {
            Value::String(message) => message,
            other => other.to_string(),
        };
        return Err(ParseFailure::HelperError(message));
    }

    let selected_path = reply
        .path
        .as_ref()
        .and_then(path_from_value)
        .or_else(|| match &reply.paths {
            Some(Value::Array(paths)) => paths.iter().find_map(path_from_value),
            _ => None,
        });

    let selected_filter = match reply.selected_filter_label {
        Some(Value::String(label)) if !label.is_empty() => Some(Filter {
            label,
            patterns: string_list(reply.selected_filter_globs.as_ref()),
        }),
        _ => None,
    };

    Ok(Outcome {
        selected_path,
        selected_filter,
        options: choices_from_value(reply.choices.as_ref()),
    })
}

fn path_from_value(value: &Value) -> Option<PathBuf> {
    let text = value.as_str()?;
    let text = match text.strip_prefix("file://") {
        Some(rest) => decode_uri_path(rest),
        None => text.to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(PathBuf::from(text))
    }
}

/// Decodes the path of a `file://` URI. Stray `%` signs are kept as typed
/// and invalid UTF-8 is replaced, so a real pick is never dropped.
fn decode_uri_path(rest: &str) -> String {
    let bytes = urlencoding::decode_binary(rest.as_bytes());
    String::from_utf8_lossy(&bytes).into_owned()
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(single)) => vec![single.clone()],
        _ => Vec::new(),
    }
}

fn flag_from_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.as_str() {
            "true" | "1" => Some(true),
            "false" | "0" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Accepts `{"key": bool}` as well as the `[["key", "true"], ...]` list form
/// some portal backends produce.
fn choices_from_value(value: Option<&Value>) -> BTreeMap<String, bool> {
    let mut choices = BTreeMap::new();
    match value {
        Some(Value::Object(map)) => {
            for (key, value) in map {
                if let Some(flag) = flag_from_value(value) {
                    choices.insert(key.clone(), flag);
                }
            }
        }
        Some(Value::Array(pairs)) => {
            for pair in pairs {
                if let Some([Value::String(key), value, ..]) = pair.as_array().map(Vec::as_slice) {
                    if let Some(flag) = flag_from_value(value) {
                        choices.insert(key.clone(), flag);
                    }
                }
            }
        }
        _ => {}
    }
    choices
}
