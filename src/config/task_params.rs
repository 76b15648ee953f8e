//! Task parameter override arguments.
//!
//! Each argument is either a list of `Key=Value` strings forming one
//! parameter set, or a single `file://PATH` pointing at a JSON/YAML
//! document holding one set (a mapping) or several (a list of mappings).
//! Values are kept as strings; the backend resolves their types.

use serde_json::{Map, Value};

use super::document::{read_document, FILE_PREFIX};
use crate::error::{Result, SessionError};
use crate::model::TaskParameterOverrides;

/// Parse task parameter arguments into override sets, in argument order.
///
/// All problems are collected and reported together so they can be fixed
/// in one pass.
pub fn parse_task_parameter_args(arguments: &[Vec<String>]) -> Result<Vec<TaskParameterOverrides>> {
    let mut sets = Vec::new();
    let mut errors: Vec<String> = Vec::new();

    for argument in arguments {
        match argument.as_slice() {
            [single] if single.starts_with(FILE_PREFIX) => match read_document(single) {
                Ok(document) => collect_document(single, document, &mut sets, &mut errors),
                Err(e) => errors.push(e),
            },
            pairs => {
                let mut set = TaskParameterOverrides::new();
                for pair in pairs {
                    match split_key_value(pair) {
                        Some((key, value)) => {
                            set.insert(key.to_string(), value.to_string());
                        }
                        None => errors.push(format!("'{}' should be in the format 'Key=Value'", pair)),
                    }
                }
                if !set.is_empty() {
                    sets.push(set);
                }
            }
        }
    }

    if !errors.is_empty() {
        let mut message = String::from("Found the following errors collecting Task parameters:");
        for error in &errors {
            message.push_str("\n- ");
            message.push_str(error);
        }
        return Err(SessionError::InvalidTaskParameters { message });
    }

    Ok(sets)
}

fn split_key_value(pair: &str) -> Option<(&str, &str)> {
    let (key, value) = pair.trim().split_once('=')?;
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, value))
}

fn collect_document(
    argument: &str,
    document: Value,
    sets: &mut Vec<TaskParameterOverrides>,
    errors: &mut Vec<String>,
) {
    let path = argument.trim_start_matches(FILE_PREFIX);
    match document {
        Value::Object(map) => match overrides_from_map(map) {
            Ok(set) => sets.push(set),
            Err(e) => errors.push(format!("'{}': {}", path, e)),
        },
        Value::Array(entries) => {
            let rejected: Vec<String> = entries
                .iter()
                .filter(|entry| !entry.is_object())
                .map(Value::to_string)
                .collect();
            if !rejected.is_empty() {
                errors.push(format!(
                    "'{}' contains non-dictionary entries: [{}]",
                    path,
                    rejected.join(", ")
                ));
                return;
            }
            for entry in entries {
                if let Value::Object(map) = entry {
                    match overrides_from_map(map) {
                        Ok(set) => sets.push(set),
                        Err(e) => errors.push(format!("'{}': {}", path, e)),
                    }
                }
            }
        }
        other => errors.push(format!(
            "'{}' should contain a dictionary or a list of dictionaries, found {}",
            path, other
        )),
    }
}

fn overrides_from_map(map: Map<String, Value>) -> std::result::Result<TaskParameterOverrides, String> {
    map.into_iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(format!(
                        "parameter '{}' must have a scalar value, found {}",
                        name, other
                    ))
                }
            };
            Ok((name, value))
        })
        .collect()
}
