//! Loading of `file://` JSON and YAML documents.

use std::path::{Path, PathBuf};

use serde_json::Value;

/// Prefix marking an argument as a path to a document.
pub(crate) const FILE_PREFIX: &str = "file://";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentType {
    Json,
    Yaml,
}

impl DocumentType {
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(DocumentType::Json),
            "yaml" | "yml" => Some(DocumentType::Yaml),
            _ => None,
        }
    }
}

fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => PathBuf::from(raw),
        },
        None => PathBuf::from(raw),
    }
}

/// Read the document an argument of the form `file://PATH` points at.
///
/// Errors are returned as user-facing messages; callers wrap them in the
/// error variant for their concern.
pub(crate) fn read_document(argument: &str) -> std::result::Result<Value, String> {
    let path = expand_home(argument.strip_prefix(FILE_PREFIX).unwrap_or(argument));

    if !path.exists() {
        return Err(format!("Provided file '{}' does not exist.", path.display()));
    }
    if !path.is_file() {
        return Err(format!("Provided file '{}' is not a file.", path.display()));
    }

    let doc_type = DocumentType::from_path(&path).ok_or_else(|| {
        format!(
            "'{}' is not a JSON or YAML document (expected a .json, .yaml or .yml extension).",
            path.display()
        )
    })?;

    let contents = std::fs::read_to_string(&path)
        .map_err(|e| format!("Could not open file '{}': {}", path.display(), e))?;

    let parsed: std::result::Result<Value, String> = match doc_type {
        DocumentType::Json => serde_json::from_str(&contents).map_err(|e| e.to_string()),
        DocumentType::Yaml => serde_yaml::from_str(&contents).map_err(|e| e.to_string()),
    };

    parsed.map_err(|e| format!("File '{}' is formatted incorrectly: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn reads_json_document() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.json");
        fs::write(&path, r#"{"a": 1}"#).unwrap();

        let value = read_document(&format!("file://{}", path.display())).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn reads_yaml_document() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.yml");
        fs::write(&path, "a: hello\n").unwrap();

        let value = read_document(&format!("file://{}", path.display())).unwrap();
        assert_eq!(value["a"], "hello");
    }

    #[test]
    fn missing_file_is_reported() {
        let err = read_document("file:///definitely/not/here.json").unwrap_err();
        assert!(err.contains("does not exist"));
    }

    #[test]
    fn directory_is_not_a_file() {
        let temp = TempDir::new().unwrap();
        let err = read_document(&format!("file://{}", temp.path().display())).unwrap_err();
        assert!(err.contains("is not a file"));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.txt");
        fs::write(&path, "{}").unwrap();

        let err = read_document(&format!("file://{}", path.display())).unwrap_err();
        assert!(err.contains("not a JSON or YAML document"));
    }

    #[test]
    fn malformed_json_is_reported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.json");
        fs::write(&path, "{not json").unwrap();

        let err = read_document(&format!("file://{}", path.display())).unwrap_err();
        assert!(err.contains("formatted incorrectly"));
    }
}
