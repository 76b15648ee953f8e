//! Task parameter sets built from user overrides.

use crate::error::{Result, SessionError};
use crate::model::{ParameterSpace, ParameterValue, TaskParameterOverrides, TaskParameterSet};
use crate::session::LogSink;

/// Build the parameter set for one task from user-supplied `overrides`.
///
/// - Names the space does not define are dropped with a warning.
/// - Names the space defines but `overrides` lacks take their value from the
///   space's first combination.
/// - Values are not type-checked; the backend rejects bad ones when the
///   task runs.
///
/// The only failure is a missing value that cannot be defaulted because the
/// space enumerates no combinations at all.
pub fn build_task_parameter_set(
    space: &ParameterSpace,
    overrides: &TaskParameterOverrides,
    log: &LogSink,
) -> Result<TaskParameterSet> {
    for name in overrides.keys() {
        if space.definition(name).is_none() {
            log.warn(format!("Skipping unused parameter '{}'", name));
        }
    }

    let needs_defaults = space
        .definitions()
        .iter()
        .any(|d| !overrides.contains_key(&d.name));
    let defaults = if needs_defaults { space.first() } else { None };

    let mut set = TaskParameterSet::new();
    for definition in space.definitions() {
        let value = match overrides.get(&definition.name) {
            Some(value) => value.clone(),
            None => defaults
                .as_ref()
                .and_then(|d| d.get(&definition.name))
                .map(|v| v.value.clone())
                .ok_or_else(|| SessionError::InvalidParameterSet {
                    message: format!(
                        "no value given for parameter '{}' and the parameter space has no default",
                        definition.name
                    ),
                })?,
        };
        set.insert(
            definition.name.clone(),
            ParameterValue::new(definition.kind, value),
        );
    }

    Ok(set)
}
