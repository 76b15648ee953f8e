//! Path mapping rule documents.
//!
//! Rules are handed to the backend untouched; this module only reads
//! and validates the `pathmapping-1.0` document that carries them.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::document::{read_document, FILE_PREFIX};
use crate::error::{Result, SessionError};

/// Document version accepted by [`parse_path_mapping_rules`].
pub const PATH_MAPPING_VERSION: &str = "pathmapping-1.0";

/// Path syntax of a rule's source path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PathFormat {
    Posix,
    Windows,
}

/// Rewrites paths under `source_path` to live under `destination_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMappingRule {
    pub source_path_format: PathFormat,
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
}

fn invalid(message: impl Into<String>) -> SessionError {
    SessionError::InvalidPathMapping {
        message: message.into(),
    }
}

/// Parse path mapping rules given inline as JSON or as `file://PATH`.
pub fn parse_path_mapping_rules(argument: &str) -> Result<Vec<PathMappingRule>> {
    let document: Value = if argument.starts_with(FILE_PREFIX) {
        read_document(argument).map_err(invalid)?
    } else {
        serde_json::from_str(argument).map_err(|e| invalid(e.to_string()))?
    };

    if document.get("version").and_then(Value::as_str) != Some(PATH_MAPPING_VERSION) {
        return Err(invalid(format!(
            "Path mapping rules must have a 'version' value of '{}'",
            PATH_MAPPING_VERSION
        )));
    }

    let rules = match document.get("path_mapping_rules") {
        Some(rules @ Value::Array(_)) => rules.clone(),
        _ => {
            return Err(invalid(
                "Path mapping rules must contain a list named 'path_mapping_rules'",
            ))
        }
    };

    serde_json::from_value(rules).map_err(|e| invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const INLINE: &str = r#"{
        "version": "pathmapping-1.0",
        "path_mapping_rules": [
            {
                "source_path_format": "WINDOWS",
                "source_path": "C:\\assets",
                "destination_path": "/mnt/assets"
            }
        ]
    }"#;

    #[test]
    fn parses_inline_rules() {
        let rules = parse_path_mapping_rules(INLINE).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].source_path_format, PathFormat::Windows);
        assert_eq!(rules[0].destination_path, PathBuf::from("/mnt/assets"));
    }

    #[test]
    fn parses_rules_from_yaml_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("rules.yaml");
        fs::write(
            &path,
            "version: pathmapping-1.0\npath_mapping_rules:\n  - source_path_format: POSIX\n    source_path: /old\n    destination_path: /new\n",
        )
        .unwrap();

        let rules = parse_path_mapping_rules(&format!("file://{}", path.display())).unwrap();
        assert_eq!(rules[0].source_path, PathBuf::from("/old"));
    }

    #[test]
    fn rejects_wrong_version() {
        let err = parse_path_mapping_rules(r#"{"version": "pathmapping-2.0", "path_mapping_rules": []}"#)
            .unwrap_err();
        assert!(err.to_string().contains("'version' value of 'pathmapping-1.0'"));
    }

    #[test]
    fn rejects_missing_rule_list() {
        let err = parse_path_mapping_rules(r#"{"version": "pathmapping-1.0", "path_mapping_rules": {}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("a list named 'path_mapping_rules'"));
    }

    #[test]
    fn rejects_malformed_rule() {
        let err = parse_path_mapping_rules(
            r#"{"version": "pathmapping-1.0", "path_mapping_rules": [{"source_path": "/a"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::InvalidPathMapping { .. }));
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(parse_path_mapping_rules("not json").is_err());
    }
}
