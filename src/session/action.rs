//! Queued units of backend work.

use std::fmt;

use super::backend::SessionBackend;
use crate::model::{Environment, Step, TaskParameterSet};

/// One unit of work for the backend.
#[derive(Debug, Clone)]
pub enum Action<'a> {
    /// Run the step's script with one parameter combination.
    RunTask {
        step: &'a Step,
        parameters: TaskParameterSet,
    },
    /// Enter an environment under a session-scoped identifier.
    EnterEnvironment {
        environment: &'a Environment,
        identifier: String,
    },
    /// Exit a previously entered environment.
    ExitEnvironment { identifier: String },
}

impl<'a> Action<'a> {
    pub fn run_task(step: &'a Step, parameters: TaskParameterSet) -> Self {
        Action::RunTask { step, parameters }
    }

    /// Enter `environment`, identified by its name.
    pub fn enter(environment: &'a Environment) -> Self {
        Action::EnterEnvironment {
            environment,
            identifier: environment.name.clone(),
        }
    }

    pub fn exit(identifier: impl Into<String>) -> Self {
        Action::ExitEnvironment {
            identifier: identifier.into(),
        }
    }

    /// Only task actions count toward the tasks-run total.
    pub fn is_task(&self) -> bool {
        matches!(self, Action::RunTask { .. })
    }

    /// Start this action on the backend.
    pub(crate) fn dispatch(&self, backend: &dyn SessionBackend) {
        match self {
            Action::RunTask { step, parameters } => backend.run_task(&step.script, parameters),
            Action::EnterEnvironment {
                environment,
                identifier,
            } => backend.enter_environment(environment, identifier),
            Action::ExitEnvironment { identifier } => backend.exit_environment(identifier),
        }
    }
}

impl fmt::Display for Action<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::RunTask { step, parameters } => {
                let values: Vec<String> = ordered_values(step, parameters)
                    .into_iter()
                    .map(quoted)
                    .collect();
                write!(
                    f,
                    "Run Step '{}' with Task parameters '[{}]'",
                    step.name,
                    values.join(", ")
                )
            }
            Action::EnterEnvironment { environment, .. } => {
                write!(f, "Enter Environment '{}'", environment.name)
            }
            Action::ExitEnvironment { identifier } => write!(f, "Exit Environment '{}'", identifier),
        }
    }
}

/// Values in the order the step's parameter space declares them; names the
/// space does not declare follow in name order.
fn ordered_values<'p>(step: &Step, parameters: &'p TaskParameterSet) -> Vec<&'p str> {
    let Some(space) = &step.parameter_space else {
        return parameters.values();
    };
    let declared = space
        .definitions()
        .iter()
        .filter_map(|d| parameters.get(&d.name))
        .map(|v| v.value.as_str());
    let undeclared = parameters
        .iter()
        .filter(|(name, _)| space.definition(name).is_none())
        .map(|(_, v)| v.value.as_str());
    declared.chain(undeclared).collect()
}

/// Single-quoted, or double-quoted when the value holds only single quotes.
fn quoted(value: &str) -> String {
    let quote = if value.contains('\'') && !value.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}
