//! Mock backend for testing.
//!
//! `MockBackend` implements [`SessionBackend`] and records every call for
//! later assertion. Actions complete on a background thread, like a real
//! backend, with outcomes that can be scripted per dispatch.
//!
//! # Example
//!
//! ```
//! use localsession::model::{Job, Script, Step};
//! use localsession::session::{LocalSession, MockBackend, SessionOptions};
//!
//! let job = Job::new("demo").with_step(Step::new("hello", Script::new("echo hello")));
//! let mock = MockBackend::new();
//! let mut session = LocalSession::new(&job, SessionOptions::default(), mock.connector());
//!
//! session.initialize(&[], &job.steps[0], -1, &[]);
//! session.run().unwrap();
//!
//! assert_eq!(session.tasks_run(), 1);
//! assert_eq!(mock.task_calls().len(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use super::backend::{ActionState, ActionStatus, BackendConfig, SessionBackend, SessionState};
use crate::model::{Environment, Script, TaskParameterSet};

/// A call made on the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    RunTask {
        command: String,
        parameters: TaskParameterSet,
    },
    EnterEnvironment {
        name: String,
        identifier: String,
    },
    ExitEnvironment {
        identifier: String,
    },
    CancelAction,
    Cleanup,
}

#[derive(Debug)]
struct MockState {
    state: SessionState,
    calls: Vec<BackendCall>,
    outcomes: VecDeque<ActionState>,
    hold_tasks: bool,
    holding: bool,
    cleanup_count: usize,
    config: Option<BackendConfig>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            state: SessionState::Ready,
            calls: Vec::new(),
            outcomes: VecDeque::new(),
            hold_tasks: false,
            holding: false,
            cleanup_count: 0,
            config: None,
        }
    }
}

/// Mock backend implementation for testing.
///
/// Clones share state, so a test keeps one handle for assertions while the
/// session owns another.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    inner: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Create a ready mock where every action succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start in a given state.
    pub fn with_state(self, state: SessionState) -> Self {
        self.lock().state = state;
        self
    }

    /// Keep task actions running until [`cancel_action`](SessionBackend::cancel_action).
    pub fn holding_tasks(self) -> Self {
        self.lock().hold_tasks = true;
        self
    }

    /// Outcomes for the next dispatches, in order. Once exhausted, actions
    /// succeed.
    pub fn queue_outcomes(&self, outcomes: impl IntoIterator<Item = ActionState>) {
        self.lock().outcomes.extend(outcomes);
    }

    /// Connection function for [`LocalSession::new`](super::LocalSession::new).
    pub fn connector(&self) -> impl FnOnce(BackendConfig) -> MockBackend {
        let mock = self.clone();
        move |config| {
            mock.lock().config = Some(config);
            mock
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    /// Recorded `run_task` calls only.
    pub fn task_calls(&self) -> Vec<BackendCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, BackendCall::RunTask { .. }))
            .collect()
    }

    pub fn cleanup_count(&self) -> usize {
        self.lock().cleanup_count
    }

    /// Configuration the session connected with.
    pub fn config(&self) -> Option<BackendConfig> {
        self.lock().config.clone()
    }

    /// Wait until a held task is in flight.
    pub fn wait_for_held_task(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.lock().holding {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    fn dispatch(&self, call: BackendCall) {
        let is_task = matches!(call, BackendCall::RunTask { .. });
        let mut state = self.lock();
        if let (BackendCall::RunTask { command, .. }, Some(config)) = (&call, &state.config) {
            config.log.info(format!("Running task '{}'", command));
        }
        state.calls.push(call);
        state.state = SessionState::Running;

        if is_task && state.hold_tasks {
            state.holding = true;
            return;
        }
        let outcome = state.outcomes.pop_front().unwrap_or(ActionState::Success);
        drop(state);
        self.complete_later(outcome);
    }

    fn complete_later(&self, outcome: ActionState) {
        let mock = self.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(1));
            let config = {
                let mut state = mock.lock();
                state.state = SessionState::Ready;
                state.holding = false;
                state.config.clone()
            };
            if let Some(config) = config {
                let status = match outcome {
                    ActionState::Failed => ActionStatus::failed("scripted failure"),
                    ActionState::Canceled => ActionStatus::canceled(),
                    _ => ActionStatus::success(),
                };
                config.callback.notify(&config.session_id, status);
            }
        });
    }
}

impl SessionBackend for MockBackend {
    fn state(&self) -> SessionState {
        self.lock().state
    }

    fn run_task(&self, script: &Script, parameters: &TaskParameterSet) {
        self.dispatch(BackendCall::RunTask {
            command: script.command.clone(),
            parameters: parameters.clone(),
        });
    }

    fn enter_environment(&self, environment: &Environment, identifier: &str) {
        self.dispatch(BackendCall::EnterEnvironment {
            name: environment.name.clone(),
            identifier: identifier.to_string(),
        });
    }

    fn exit_environment(&self, identifier: &str) {
        self.dispatch(BackendCall::ExitEnvironment {
            identifier: identifier.to_string(),
        });
    }

    fn cancel_action(&self) {
        let mut state = self.lock();
        state.calls.push(BackendCall::CancelAction);
        if state.holding {
            drop(state);
            self.complete_later(ActionState::Canceled);
        }
    }

    fn cleanup(&self) {
        let mut state = self.lock();
        state.calls.push(BackendCall::Cleanup);
        state.cleanup_count += 1;
        state.state = SessionState::Ended;
    }
}
