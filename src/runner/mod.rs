//! Step selection, task parameters and the top-level run.

pub mod dependency;
pub mod parameters;
pub mod workflow;

pub use dependency::{collect_dependencies, collect_required_steps, StepIndex};
pub use parameters::build_task_parameter_set;
pub use workflow::{run_local_session, RunOptions, RunResult, RunStatus};
