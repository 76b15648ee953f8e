//! Contract between the session runner and the execution backend.
//!
//! The backend runs one action at a time out of band and reports the
//! outcome through an [`ActionCallback`] it receives at construction.

use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use super::logs::LogSink;
use crate::config::PathMappingRule;
use crate::model::{Environment, JobParameter, Script, TaskParameterSet};

/// Lifecycle of the backend connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionState {
    /// Idle; an action may be dispatched.
    Ready,
    /// An action is in flight.
    Running,
    /// Torn down.
    Ended,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Ready => "READY",
            SessionState::Running => "RUNNING",
            SessionState::Ended => "ENDED",
        };
        write!(f, "{}", s)
    }
}

/// State reported for a dispatched action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionState {
    Running,
    Success,
    Failed,
    Canceled,
}

impl ActionState {
    /// Check if this is a terminal state (no more changes expected).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ActionState::Running)
    }

    /// Failed and canceled actions both stop the session.
    pub fn is_failure(&self) -> bool {
        matches!(self, ActionState::Failed | ActionState::Canceled)
    }
}

/// Status update for the action in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionStatus {
    pub state: ActionState,
    pub exit_code: Option<i32>,
    pub fail_message: Option<String>,
}

impl ActionStatus {
    pub fn running() -> Self {
        Self::with_state(ActionState::Running)
    }

    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            ..Self::with_state(ActionState::Success)
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            fail_message: Some(message.into()),
            ..Self::with_state(ActionState::Failed)
        }
    }

    pub fn canceled() -> Self {
        Self::with_state(ActionState::Canceled)
    }

    fn with_state(state: ActionState) -> Self {
        Self {
            state,
            exit_code: None,
            fail_message: None,
        }
    }
}

type CompletionSlot = Arc<Mutex<Option<Sender<ActionStatus>>>>;

/// Completion callback handed to the backend.
///
/// Before each dispatch the runner arms a fresh one-shot channel; the first
/// terminal status for this session consumes it. Anything else (running
/// updates, other sessions, late duplicates) is dropped.
#[derive(Clone)]
pub struct ActionCallback {
    session_id: Arc<str>,
    slot: CompletionSlot,
}

impl ActionCallback {
    pub(crate) fn new(session_id: &str) -> Self {
        Self {
            session_id: Arc::from(session_id),
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Replace the pending completion channel and return its receiver.
    pub(crate) fn arm(&self) -> Receiver<ActionStatus> {
        let (tx, rx) = mpsc::channel();
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        rx
    }

    /// Report a status change. Returns `true` if it completed the pending action.
    pub fn notify(&self, session_id: &str, status: ActionStatus) -> bool {
        if session_id != &*self.session_id || !status.state.is_terminal() {
            return false;
        }
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(tx) => tx.send(status).is_ok(),
            None => false,
        }
    }
}

impl fmt::Debug for ActionCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionCallback")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

/// Everything a backend needs to connect to a session.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub session_id: String,
    pub job_parameters: Vec<JobParameter>,
    pub path_mapping_rules: Option<Vec<PathMappingRule>>,
    pub callback: ActionCallback,
    /// Keep the session working directory after cleanup.
    pub retain_working_dirs: bool,
    /// Shared log collection; backend messages appear next to the runner's.
    pub log: LogSink,
}

/// Execution engine driven by a [`LocalSession`](super::LocalSession).
///
/// `run_task`, `enter_environment` and `exit_environment` return as soon as
/// the action is started; its outcome arrives later through the callback.
pub trait SessionBackend: Send + Sync {
    /// Current connection state.
    fn state(&self) -> SessionState;

    fn run_task(&self, script: &Script, parameters: &TaskParameterSet);

    fn enter_environment(&self, environment: &Environment, identifier: &str);

    fn exit_environment(&self, identifier: &str);

    /// Ask the backend to stop the action in flight.
    fn cancel_action(&self);

    /// Release backend resources.
    fn cleanup(&self);
}
