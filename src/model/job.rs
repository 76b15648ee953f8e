//! Jobs, steps and environments.

use super::parameters::{ParameterSpace, ParameterValue};

/// A command with its arguments, run by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    /// Program or inline command to run.
    pub command: String,
    /// Arguments, still containing unresolved parameter references.
    pub args: Vec<String>,
}

impl Script {
    /// Create a script with no arguments.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
        }
    }

    /// Append arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// Scripts run when an environment is entered and exited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentScript {
    pub on_enter: Option<Script>,
    pub on_exit: Option<Script>,
}

/// A named enter/exit script pair.
///
/// Within a session an environment is identified by its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub name: String,
    pub script: Option<EnvironmentScript>,
}

impl Environment {
    /// Create an environment without scripts.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: None,
        }
    }

    /// Attach enter/exit scripts.
    pub fn with_script(mut self, script: EnvironmentScript) -> Self {
        self.script = Some(script);
        self
    }
}

/// A reference from one step to another step of the same job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDependency {
    /// Name of the step that must run first.
    pub depends_on: String,
}

/// A named unit of a job.
///
/// Steps with step-level environments must not take part in any dependency
/// relationship; this is checked when dependencies are collected.
#[derive(Debug, Clone)]
pub struct Step {
    pub name: String,
    pub script: Script,
    pub parameter_space: Option<ParameterSpace>,
    pub dependencies: Vec<StepDependency>,
    pub environments: Vec<Environment>,
}

impl Step {
    /// Create a step with no parameters, dependencies or environments.
    pub fn new(name: impl Into<String>, script: Script) -> Self {
        Self {
            name: name.into(),
            script,
            parameter_space: None,
            dependencies: Vec::new(),
            environments: Vec::new(),
        }
    }

    /// Set the parameter space the step's tasks vary over.
    pub fn with_parameter_space(mut self, space: ParameterSpace) -> Self {
        self.parameter_space = Some(space);
        self
    }

    /// Add a dependency on another step.
    pub fn depends_on(mut self, step: impl Into<String>) -> Self {
        self.dependencies.push(StepDependency {
            depends_on: step.into(),
        });
        self
    }

    /// Add a step-level environment.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environments.push(environment);
        self
    }

    /// Whether the step declares any dependencies.
    pub fn has_dependencies(&self) -> bool {
        !self.dependencies.is_empty()
    }
}

/// A resolved job parameter handed to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobParameter {
    pub name: String,
    pub value: ParameterValue,
}

/// The top-level unit of work.
#[derive(Debug, Clone)]
pub struct Job {
    pub name: String,
    pub parameters: Vec<JobParameter>,
    pub steps: Vec<Step>,
    pub environments: Vec<Environment>,
}

impl Job {
    /// Create an empty job.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            steps: Vec::new(),
            environments: Vec::new(),
        }
    }

    /// Add a step.
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Add a job-level environment.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environments.push(environment);
        self
    }

    /// Add a resolved job parameter.
    pub fn with_parameter(mut self, name: impl Into<String>, value: ParameterValue) -> Self {
        self.parameters.push(JobParameter {
            name: name.into(),
            value,
        });
        self
    }

    /// Look up a step by name.
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }
}
