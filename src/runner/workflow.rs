//! Running one step of a job end to end.

use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};

use super::dependency::{collect_dependencies, StepIndex};
use crate::error::{Result, SessionError};
use crate::model::{Environment, Job, TaskParameterOverrides};
use crate::session::{BackendConfig, LocalSession, LogEntry, SessionBackend, SessionOptions};

/// Options for running a step.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Name of the step to run.
    pub step: String,
    /// Cap on the number of tasks for the target step; `<= 0` means no cap.
    pub maximum_tasks: i64,
    /// One entry per task; empty runs the step's full parameter space.
    pub task_parameter_values: Vec<TaskParameterOverrides>,
    /// Also run the steps the target depends on.
    pub run_dependencies: bool,
    /// Environments entered around everything else.
    pub environments: Vec<Environment>,
    pub session: SessionOptions,
}

impl RunOptions {
    pub fn new(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            ..Default::default()
        }
    }
}

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
}

/// Result of running a step.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub status: RunStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_name: Option<String>,
    #[serde(serialize_with = "as_seconds")]
    pub duration: Duration,
    pub tasks_run: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<LogEntry>,
}

fn as_seconds<S: Serializer>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

impl RunResult {
    /// An error result that never reached the backend.
    pub fn from_error(error: &SessionError) -> Self {
        Self {
            status: RunStatus::Error,
            message: error.to_string(),
            job_name: None,
            step_name: None,
            duration: Duration::ZERO,
            tasks_run: 0,
            logs: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Results of local session ---")?;
        writeln!(f)?;
        writeln!(f, "{}", self.message)?;
        if self.job_name.is_none() {
            return Ok(());
        }
        writeln!(f)?;
        writeln!(f, "Job: {}", self.job_name.as_deref().unwrap_or_default())?;
        writeln!(f, "Step: {}", self.step_name.as_deref().unwrap_or_default())?;
        writeln!(f, "Duration: {} seconds", self.duration.as_secs_f64())?;
        write!(f, "Tasks run: {}", self.tasks_run)
    }
}

/// Run `options.step` of `job` against a backend created by `connect`.
///
/// Problems found before the session starts (an unknown step, a broken
/// dependency graph, a busy interrupt handler) and failures during the run
/// are both reported through the returned result.
pub fn run_local_session<F, B>(job: &Job, options: &RunOptions, connect: F) -> RunResult
where
    F: FnOnce(BackendConfig) -> B,
    B: SessionBackend + 'static,
{
    match try_run(job, options, connect) {
        Ok(result) => result,
        Err(e) => {
            tracing::debug!(error = %e, "local session did not complete");
            RunResult::from_error(&e)
        }
    }
}

fn try_run<F, B>(job: &Job, options: &RunOptions, connect: F) -> Result<RunResult>
where
    F: FnOnce(BackendConfig) -> B,
    B: SessionBackend + 'static,
{
    let step = job.step(&options.step).ok_or_else(|| SessionError::UnknownStep {
        step: options.step.clone(),
        job: job.name.clone(),
    })?;

    let dependencies = if options.run_dependencies && step.has_dependencies() {
        collect_dependencies(&StepIndex::new(job), step)?
    } else {
        Vec::new()
    };

    let mut session = LocalSession::new(job, options.session.clone(), connect)
        .with_session_environments(&options.environments);

    let (failed, tasks_run, duration) = {
        let mut scope = session.enter()?;
        scope.initialize(
            &dependencies,
            step,
            options.maximum_tasks,
            &options.task_parameter_values,
        );
        scope.run()?;
        (scope.is_failed(), scope.tasks_run(), scope.duration())
    };

    let (status, message) = if failed {
        (
            RunStatus::Error,
            "Session ended with errors; see Task logs for details",
        )
    } else {
        (RunStatus::Success, "Session ended successfully")
    };

    Ok(RunResult {
        status,
        message: message.to_string(),
        job_name: Some(job.name.clone()),
        step_name: Some(step.name.clone()),
        duration,
        tasks_run,
        logs: session.log_messages(),
    })
}
