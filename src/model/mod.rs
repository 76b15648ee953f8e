//! Read-only job model consumed by the session runner.
//!
//! Templates are decoded and parameter values resolved elsewhere; the
//! runner only reads these types.

mod job;
mod parameters;

pub use job::{Environment, EnvironmentScript, Job, JobParameter, Script, Step, StepDependency};
pub use parameters::{
    Combinations, ParameterEnumerator, ParameterSpace, ParameterType, ParameterValue,
    TaskParameterDefinition, TaskParameterOverrides, TaskParameterSet,
};
