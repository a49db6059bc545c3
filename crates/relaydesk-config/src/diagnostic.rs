// SPDX-FileCopyrightText: 2026 Relaydesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Startup configuration errors as miette diagnostics.
//!
//! Figment reports problems with `relaydesk.toml` and `RELAYDESK_*`
//! variables as a chain of errors. Each one becomes a [`ConfigError`]; a
//! misspelt key gets a "did you mean" hint and, when the offending file is
//! known, a label pointing at the key inside its `[section]`.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use figment::error::Kind;
use miette::{Diagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a known key needs before it is offered as a fix.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A static configuration problem found at startup.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key that no section of `relaydesk.toml` declares.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(relaydesk::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Closest known key in the same section.
        suggestion: Option<String>,
        /// Every key the section accepts, comma-separated.
        valid_keys: String,
        #[label("not a relaydesk setting")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that does not deserialize into the field's type, such as a
    /// quoted `port` or a numeric `bot_token`.
    #[error("invalid type for `{key}`: {detail}")]
    #[diagnostic(code(relaydesk::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        /// Dotted path, e.g. `gateway.port`.
        key: String,
        detail: String,
        expected: String,
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(relaydesk::config::missing_key),
        help("add `{key} = <value>` to relaydesk.toml or set the matching RELAYDESK_* variable")
    )]
    MissingKey { key: String },

    /// A semantic check failed after the file parsed, see `validation`.
    #[error("validation error: {message}")]
    #[diagnostic(code(relaydesk::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(relaydesk::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Split a figment error chain into one diagnostic per underlying error.
///
/// `toml_sources` holds `(path, content)` for every file that was merged,
/// used to attach source spans to unknown keys.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| match &error.kind {
            Kind::UnknownField(field, expected) => unknown_key(&error, field, expected, toml_sources),
            Kind::MissingField(field) => ConfigError::MissingKey {
                key: field.to_string(),
            },
            Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                key: dotted_path(&error),
                detail: format!("found {actual}, expected {expected}"),
                expected: expected.to_string(),
                span: None,
                src: None,
            },
            _ => ConfigError::Other(error.to_string()),
        })
        .collect()
}

fn dotted_path(error: &figment::Error) -> String {
    error.path.join(".")
}

fn unknown_key(
    error: &figment::Error,
    field: &str,
    expected: &[&str],
    toml_sources: &[(String, String)],
) -> ConfigError {
    let (span, src) = match offending_source(error, toml_sources) {
        Some((path, content)) => match find_key_offset(content, &error.path, field) {
            Some(offset) => (
                Some(SourceSpan::new(offset.into(), field.len())),
                Some(NamedSource::new(path, content.to_string())),
            ),
            None => (None, None),
        },
        None => (None, None),
    };

    ConfigError::UnknownKey {
        key: field.to_string(),
        suggestion: suggest_key(field, expected),
        valid_keys: expected.join(", "),
        span,
        src,
    }
}

/// The merged file the error came from. Inline strings carry no file
/// metadata, so a single known source is assumed to be the culprit.
fn offending_source<'a>(
    error: &figment::Error,
    toml_sources: &'a [(String, String)],
) -> Option<(&'a str, &'a str)> {
    let file = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|source| match source {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });

    let found = match file {
        Some(file) => toml_sources.iter().find(|(path, _)| *path == file),
        None if toml_sources.len() == 1 => toml_sources.first(),
        None => None,
    };
    found.map(|(path, content)| (path.as_str(), content.as_str()))
}

/// Byte offset of `field` inside the `[section]` named by `path[0]`.
///
/// Only lines between that section header and the next header are
/// searched; an empty `path` searches the top-level keys before any header.
/// Keys that merely start with `field` are skipped.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let wanted = path.first().map(String::as_str);
    let mut current: Option<&str> = None;
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        let trimmed = line.trim_start();

        if let Some(header) = trimmed.strip_prefix('[') {
            current = header.split(']').next().map(str::trim);
            continue;
        }
        if current != wanted {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix(field)
            && rest.starts_with([' ', '\t', '='])
        {
            return Some(start + (line.len() - trimmed.len()));
        }
    }

    None
}

/// The known key closest to `unknown`, if it is close enough to be a typo.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Print every error to stderr with miette's graphical report handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut report = String::new();
        match handler.render_report(&mut report, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{report}"),
            Err(_) => eprintln!("error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggest_bot_tken_for_bot_token() {
        let valid = &["bot_token", "operator_chat_id", "operator_ids", "api_base_url"];
        assert_eq!(
            suggest_key("bot_tken", valid),
            Some("bot_token".to_string())
        );
    }

    #[test]
    fn suggest_shared_lock_for_shared_locks() {
        let valid = &["log_level", "shared_locks", "alert_window_secs"];
        assert_eq!(
            suggest_key("shared_lock", valid),
            Some("shared_locks".to_string())
        );
    }

    #[test]
    fn no_suggestion_for_distant_typo() {
        let valid = &["host", "port", "enabled"];
        assert_eq!(suggest_key("zzzzzz", valid), None);
    }

    #[test]
    fn find_key_offset_in_section() {
        let content = "[storage]\nwal_mode = true\n\n[gateway]\nprot = 80\n";
        let path = vec!["gateway".to_string()];
        let o = find_key_offset(content, &path, "prot").unwrap();
        assert_eq!(&content[o..o + 4], "prot");
    }

    #[test]
    fn find_key_offset_ignores_prefix_matches() {
        let content = "[runtime]\nlog_level_x = 1\nlog_level = \"info\"\n";
        let path = vec!["runtime".to_string()];
        let o = find_key_offset(content, &path, "log_level").unwrap();
        assert_eq!(&content[o..o + 11], "log_level =");
    }

    #[test]
    fn find_key_offset_stays_inside_its_section() {
        let content = "[gateway]\nhost = \"0.0.0.0\"\n\n[storage]\nhost = \"x\"\n";
        let path = vec!["storage".to_string()];
        let o = find_key_offset(content, &path, "host").unwrap();
        assert!(o > content.find("[storage]").unwrap());
        assert_eq!(find_key_offset(content, &["runtime".to_string()], "host"), None);
    }
}
