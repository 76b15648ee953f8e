//! The local session runner.
//!
//! A [`LocalSession`] turns one step of a job (plus, optionally, the steps
//! it depends on) into a queue of [`Action`]s and drives that queue against
//! a [`SessionBackend`], one action at a time.
//!
//! ```text
//! new() ─▶ enter() ─▶ initialize() ─▶ run() ─▶ (scope dropped) cleanup
//! ```
//!
//! Entering the session attaches log capture and, if enabled, interrupt
//! handling. Dropping the returned [`SessionScope`] detaches both and tears
//! the backend down exactly once.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::action::Action;
use super::backend::{
    ActionCallback, ActionState, ActionStatus, BackendConfig, SessionBackend, SessionState,
};
use super::interrupt::InterruptGuard;
use super::logs::{LogEntry, LogSink};
use crate::config::PathMappingRule;
use crate::error::{Result, SessionError};
use crate::model::{Environment, Job, Step, TaskParameterOverrides, TaskParameterSet};
use crate::runner::build_task_parameter_set;

/// Session identifier used when none is configured.
pub const DEFAULT_SESSION_ID: &str = "sample_session";

/// Options for creating a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Identifier passed to the backend and checked on callbacks.
    pub session_id: String,
    /// Path mapping rules forwarded to the backend.
    pub path_mapping_rules: Option<Vec<PathMappingRule>>,
    /// Print captured log lines as they arrive.
    pub should_print_logs: bool,
    /// Ask the backend to keep its working directory.
    pub retain_working_dirs: bool,
    /// Install SIGINT/SIGTERM handlers while the session is entered.
    ///
    /// On by default. Only one session per process can hold the handlers;
    /// entering a second one fails with `InterruptHandlerBusy`.
    pub handle_interrupts: bool,
    /// How often to check for interrupts while waiting on the backend.
    pub poll_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            session_id: DEFAULT_SESSION_ID.to_string(),
            path_mapping_rules: None,
            should_print_logs: false,
            retain_working_dirs: false,
            handle_interrupts: true,
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Where a session is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed; nothing attached yet.
    Created,
    /// Entered; ready to initialize and run.
    Ready,
    /// Driving the action queue.
    Running,
    /// Cleaned up.
    Ended,
}

/// State shared with [`CancelHandle`]s.
struct Shared {
    backend: Arc<dyn SessionBackend>,
    failed: AtomicBool,
    /// Whether `cancel_action` has been sent for the action in flight.
    cancel_forwarded: AtomicBool,
    current_action: Mutex<Option<String>>,
    log: LogSink,
}

impl Shared {
    fn set_current(&self, description: Option<String>) {
        *self
            .current_action
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = description;
    }

    fn current(&self) -> Option<String> {
        self.current_action
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn current_or_none(&self) -> String {
        self.current().unwrap_or_else(|| "None".to_string())
    }

    fn cancel(&self) {
        self.log.info("Cancelling the session...");

        // The backend reports the canceled action through the callback,
        // which is what ends the run loop.
        self.forward_cancel();

        self.log.info(format!(
            "Session terminated by user while running action: '{}'.",
            self.current_or_none()
        ));
        self.failed.store(true, Ordering::SeqCst);
    }

    /// Send `cancel_action` to a running backend, at most once per action.
    fn forward_cancel(&self) {
        if self.backend.state() == SessionState::Running
            && !self.cancel_forwarded.swap(true, Ordering::SeqCst)
        {
            self.backend.cancel_action();
        }
    }
}

/// Cancels a session from another thread.
#[derive(Clone)]
pub struct CancelHandle {
    shared: Arc<Shared>,
}

impl CancelHandle {
    /// Request cancellation of the action in flight and mark the session
    /// failed. Safe to call repeatedly, and when nothing is running.
    pub fn cancel(&self) {
        self.shared.cancel();
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle").finish_non_exhaustive()
    }
}

/// Runs one step of a job through a backend.
pub struct LocalSession<'a> {
    session_id: String,
    job: &'a Job,
    session_environments: &'a [Environment],
    shared: Arc<Shared>,
    callback: ActionCallback,
    queue: VecDeque<Action<'a>>,
    tasks_run: usize,
    lifecycle: Lifecycle,
    started: Option<Instant>,
    finished: Option<Instant>,
    ended: bool,
    cleanup_called: bool,
    handle_interrupts: bool,
    interrupts: Option<InterruptGuard>,
    poll_interval: Duration,
}

impl<'a> LocalSession<'a> {
    /// Create a session for `job`, connecting a backend with `connect`.
    pub fn new<F, B>(job: &'a Job, options: SessionOptions, connect: F) -> Self
    where
        F: FnOnce(BackendConfig) -> B,
        B: SessionBackend + 'static,
    {
        let log = LogSink::new(options.session_id.clone(), options.should_print_logs);
        let callback = ActionCallback::new(&options.session_id);

        let backend = connect(BackendConfig {
            session_id: options.session_id.clone(),
            job_parameters: job.parameters.clone(),
            path_mapping_rules: options.path_mapping_rules,
            callback: callback.clone(),
            retain_working_dirs: options.retain_working_dirs,
            log: log.clone(),
        });

        Self {
            session_id: options.session_id,
            job,
            session_environments: &[],
            shared: Arc::new(Shared {
                backend: Arc::new(backend),
                failed: AtomicBool::new(false),
                cancel_forwarded: AtomicBool::new(false),
                current_action: Mutex::new(None),
                log,
            }),
            callback,
            queue: VecDeque::new(),
            tasks_run: 0,
            lifecycle: Lifecycle::Created,
            started: None,
            finished: None,
            ended: false,
            cleanup_called: false,
            handle_interrupts: options.handle_interrupts,
            interrupts: None,
            poll_interval: options.poll_interval,
        }
    }

    /// Environments from outside the job, entered before the job's own.
    pub fn with_session_environments(mut self, environments: &'a [Environment]) -> Self {
        self.session_environments = environments;
        self
    }

    /// Attach log capture and interrupt handling for the life of the
    /// returned scope.
    pub fn enter(&mut self) -> Result<SessionScope<'_, 'a>> {
        if self.handle_interrupts {
            self.interrupts = Some(InterruptGuard::install()?);
        }
        self.shared.log.attach();
        self.lifecycle = Lifecycle::Ready;
        Ok(SessionScope { session: self })
    }

    /// Queue the actions needed to run `step`.
    ///
    /// `dependencies` come from
    /// [`collect_dependencies`](crate::runner::collect_dependencies) and run
    /// first, over their full parameter space. `step` runs over its full
    /// space, or once per entry of `task_parameter_values` when given. A
    /// positive `maximum_tasks` caps the number of tasks for `step` only.
    ///
    /// An override entry that cannot be turned into a parameter set is
    /// skipped and the session is marked failed; the remaining entries are
    /// still queued.
    pub fn initialize(
        &mut self,
        dependencies: &[&'a Step],
        step: &'a Step,
        maximum_tasks: i64,
        task_parameter_values: &[TaskParameterOverrides],
    ) {
        self.ended = false;

        let job = self.job;
        let mut environment_ids = self.enqueue_environments(self.session_environments);
        environment_ids.extend(self.enqueue_environments(&job.environments));

        // A step with its own environments can only run alone.
        if dependencies.is_empty() {
            environment_ids.extend(self.enqueue_environments(&step.environments));
        }

        for dependency in dependencies {
            match &dependency.parameter_space {
                None => self.enqueue_task(dependency, TaskParameterSet::new()),
                Some(space) => {
                    for parameters in space {
                        self.enqueue_task(dependency, parameters);
                    }
                }
            }
        }

        match &step.parameter_space {
            None => self.enqueue_task(step, TaskParameterSet::new()),
            Some(space) => {
                let mut parameter_sets: Vec<TaskParameterSet> = if task_parameter_values.is_empty()
                {
                    space.iter().collect()
                } else {
                    task_parameter_values
                        .iter()
                        .filter_map(|values| {
                            match build_task_parameter_set(space, values, &self.shared.log) {
                                Ok(set) => Some(set),
                                Err(e) => {
                                    self.shared.log.info(format!(
                                        "Skipping Task parameter set with errors:\n{}",
                                        e
                                    ));
                                    self.shared.failed.store(true, Ordering::SeqCst);
                                    None
                                }
                            }
                        })
                        .collect()
                };

                if maximum_tasks > 0 {
                    parameter_sets.truncate(usize::try_from(maximum_tasks).unwrap_or(usize::MAX));
                }

                for parameters in parameter_sets {
                    self.enqueue_task(step, parameters);
                }
            }
        }

        for identifier in environment_ids.into_iter().rev() {
            self.queue.push_back(Action::exit(identifier));
        }
    }

    fn enqueue_environments(&mut self, environments: &'a [Environment]) -> Vec<String> {
        environments
            .iter()
            .map(|environment| {
                self.queue.push_back(Action::enter(environment));
                environment.name.clone()
            })
            .collect()
    }

    fn enqueue_task(&mut self, step: &'a Step, parameters: TaskParameterSet) {
        self.queue.push_back(Action::run_task(step, parameters));
    }

    /// Drive the queue until it is empty or an action fails.
    ///
    /// Blocks on each action until the backend reports it finished. On
    /// failure the remaining actions, including environment exits, are left
    /// unexecuted.
    pub fn run(&mut self) -> Result<()> {
        let state = self.shared.backend.state();
        if state != SessionState::Ready {
            return Err(SessionError::NotReady { state });
        }

        self.lifecycle = Lifecycle::Running;
        self.started = Some(Instant::now());
        self.finished = None;

        while !self.is_failed() {
            self.check_interrupt();
            if self.is_failed() {
                break;
            }
            let Some(action) = self.queue.pop_front() else {
                break;
            };

            self.shared.set_current(Some(action.to_string()));
            let completion = self.callback.arm();
            self.shared.cancel_forwarded.store(false, Ordering::SeqCst);
            action.dispatch(self.shared.backend.as_ref());
            let status = self.wait_for(&completion);

            if status.state.is_failure() {
                self.shared.failed.store(true, Ordering::SeqCst);
            } else if status.state == ActionState::Success && action.is_task() {
                self.tasks_run += 1;
            }
        }

        if self.is_failed() {
            self.shared.log.info(format!(
                "ERROR executing action: '{}' (see Task logs for details)",
                self.shared.current_or_none()
            ));
        } else {
            self.shared.log.info("All actions completed successfully!");
            self.shared.set_current(None);
        }

        self.finished = Some(Instant::now());
        self.ended = true;
        self.lifecycle = Lifecycle::Ready;
        Ok(())
    }

    fn wait_for(&self, completion: &Receiver<ActionStatus>) -> ActionStatus {
        loop {
            match completion.recv_timeout(self.poll_interval) {
                Ok(status) => return status,
                Err(RecvTimeoutError::Timeout) => {
                    self.check_interrupt();
                    // A cancel that landed before the backend went RUNNING
                    // was not forwarded; send it now.
                    if self.is_failed() {
                        self.shared.forward_cancel();
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return ActionStatus::failed("completion channel closed")
                }
            }
        }
    }

    fn check_interrupt(&self) {
        if self.interrupts.as_ref().is_some_and(|g| g.take_pending()) {
            self.shared.log.info("Interruption signal received.");
            self.shared.cancel();
        }
    }

    /// Cancel the action in flight and mark the session failed.
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    /// A handle that can cancel this session from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Release the backend and stop log capture. Only the first call has
    /// any effect.
    pub fn cleanup(&mut self) {
        if self.cleanup_called {
            return;
        }
        self.shared
            .log
            .info("Local Session ended! Now cleaning up Session resources.");
        self.shared.log.detach();
        self.shared.backend.cleanup();
        self.cleanup_called = true;
        self.lifecycle = Lifecycle::Ended;
    }

    fn exit(&mut self) {
        self.interrupts = None;
        self.cleanup();
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn is_failed(&self) -> bool {
        self.shared.failed.load(Ordering::SeqCst)
    }

    /// Number of tasks that completed successfully.
    pub fn tasks_run(&self) -> usize {
        self.tasks_run
    }

    /// Whether the last `run` has finished.
    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// Actions still waiting to run.
    pub fn queued_actions(&self) -> impl Iterator<Item = &Action<'a>> {
        self.queue.iter()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Description of the action that was in flight when the run stopped.
    pub fn current_action(&self) -> Option<String> {
        self.shared.current()
    }

    /// Time spent in `run`; still growing while it is in progress.
    pub fn duration(&self) -> Duration {
        match (self.started, self.finished) {
            (None, _) => Duration::ZERO,
            (Some(start), None) => start.elapsed(),
            (Some(start), Some(end)) => end.duration_since(start),
        }
    }

    /// Log entries captured so far.
    pub fn log_messages(&self) -> Vec<LogEntry> {
        self.shared.log.entries()
    }
}

impl Drop for LocalSession<'_> {
    fn drop(&mut self) {
        self.exit();
    }
}

/// An entered [`LocalSession`]; cleans it up when dropped.
pub struct SessionScope<'s, 'a> {
    session: &'s mut LocalSession<'a>,
}

impl<'a> Deref for SessionScope<'_, 'a> {
    type Target = LocalSession<'a>;

    fn deref(&self) -> &Self::Target {
        self.session
    }
}

impl DerefMut for SessionScope<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session
    }
}

impl Drop for SessionScope<'_, '_> {
    fn drop(&mut self) {
        self.session.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ParameterSpace, ParameterType, ParameterValue, Script, TaskParameterDefinition,
    };
    use crate::session::mock::{BackendCall, MockBackend};

    fn frame_space(frames: &[&str]) -> ParameterSpace {
        ParameterSpace::from_combinations(
            vec![TaskParameterDefinition::new("Frame", ParameterType::Int)],
            frames
                .iter()
                .map(|f| {
                    TaskParameterSet::new().with("Frame", ParameterValue::new(ParameterType::Int, *f))
                })
                .collect(),
        )
    }

    fn options() -> SessionOptions {
        SessionOptions {
            poll_interval: Duration::from_millis(5),
            handle_interrupts: false,
            ..Default::default()
        }
    }

    /// Cancels its own session from inside `run_task`, before it reports
    /// RUNNING, then holds the task until `cancel_action`.
    #[derive(Default)]
    struct SelfCancellingBackend {
        state: Mutex<Option<SessionState>>,
        handle: Mutex<Option<CancelHandle>>,
        callback: Mutex<Option<(String, ActionCallback)>>,
        cancels: std::sync::atomic::AtomicUsize,
    }

    impl SessionBackend for Arc<SelfCancellingBackend> {
        fn state(&self) -> SessionState {
            self.state.lock().unwrap().unwrap_or(SessionState::Ready)
        }

        fn run_task(&self, _script: &Script, _parameters: &TaskParameterSet) {
            let handle = self.handle.lock().unwrap().take();
            if let Some(handle) = handle {
                handle.cancel();
            }
            *self.state.lock().unwrap() = Some(SessionState::Running);
        }

        fn enter_environment(&self, _environment: &Environment, _identifier: &str) {}

        fn exit_environment(&self, _identifier: &str) {}

        fn cancel_action(&self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
            *self.state.lock().unwrap() = Some(SessionState::Ready);
            let (session_id, callback) = self.callback.lock().unwrap().clone().unwrap();
            std::thread::spawn(move || callback.notify(&session_id, ActionStatus::canceled()));
        }

        fn cleanup(&self) {}
    }

    fn frames(session: &LocalSession<'_>) -> Vec<String> {
        session
            .queued_actions()
            .filter_map(|a| match a {
                Action::RunTask { parameters, .. } => {
                    parameters.get("Frame").map(|v| v.value.clone())
                }
                _ => None,
            })
            .collect()
    }

    fn descriptions(session: &LocalSession<'_>) -> Vec<String> {
        session.queued_actions().map(|a| a.to_string()).collect()
    }

    #[test]
    fn environments_wrap_tasks_in_mirrored_order() {
        let job = Job::new("job")
            .with_environment(Environment::new("outer"))
            .with_step(
                Step::new("render", Script::new("render"))
                    .with_environment(Environment::new("inner")),
            );
        let session_envs = vec![Environment::new("session")];
        let mock = MockBackend::new();
        let mut session = LocalSession::new(&job, options(), mock.connector())
            .with_session_environments(&session_envs);

        session.initialize(&[], &job.steps[0], -1, &[]);

        assert_eq!(
            descriptions(&session),
            vec![
                "Enter Environment 'session'",
                "Enter Environment 'outer'",
                "Enter Environment 'inner'",
                "Run Step 'render' with Task parameters '[]'",
                "Exit Environment 'inner'",
                "Exit Environment 'outer'",
                "Exit Environment 'session'",
            ]
        );
    }

    #[test]
    fn step_environments_are_skipped_with_dependencies() {
        let job = Job::new("job")
            .with_step(Step::new("dep", Script::new("dep")))
            .with_step(
                Step::new("main", Script::new("main"))
                    .depends_on("dep")
                    .with_environment(Environment::new("inner")),
            );
        let mock = MockBackend::new();
        let mut session = LocalSession::new(&job, options(), mock.connector());

        session.initialize(&[&job.steps[0]], &job.steps[1], -1, &[]);

        assert_eq!(session.queue_len(), 2);
        assert!(session.queued_actions().all(Action::is_task));
    }

    #[test]
    fn dependencies_use_full_space_and_ignore_limits() {
        let job = Job::new("job")
            .with_step(Step::new("dep", Script::new("dep")).with_parameter_space(frame_space(&["1", "2", "3"])))
            .with_step(
                Step::new("main", Script::new("main"))
                    .depends_on("dep")
                    .with_parameter_space(frame_space(&["10", "20", "30"])),
            );
        let mock = MockBackend::new();
        let mut session = LocalSession::new(&job, options(), mock.connector());

        session.initialize(&[&job.steps[0]], &job.steps[1], 1, &[]);

        assert_eq!(frames(&session), vec!["1", "2", "3", "10"]);
    }

    #[test]
    fn overrides_replace_enumeration() {
        let job = Job::new("job").with_step(
            Step::new("main", Script::new("main")).with_parameter_space(frame_space(&["1", "2"])),
        );
        let overrides: Vec<TaskParameterOverrides> = ["7", "8", "9"]
            .iter()
            .map(|f| [("Frame".to_string(), f.to_string())].into_iter().collect())
            .collect();
        let mock = MockBackend::new();
        let mut session = LocalSession::new(&job, options(), mock.connector());

        session.initialize(&[], &job.steps[0], 2, &overrides);

        assert_eq!(frames(&session), vec!["7", "8"]);
        assert!(!session.is_failed());
    }

    #[test]
    fn unusable_override_is_skipped_and_marks_failure() {
        let empty = ParameterSpace::from_combinations(
            vec![
                TaskParameterDefinition::new("Frame", ParameterType::Int),
                TaskParameterDefinition::new("Layer", ParameterType::String),
            ],
            vec![],
        );
        let job = Job::new("job")
            .with_step(Step::new("main", Script::new("main")).with_parameter_space(empty));
        let good: TaskParameterOverrides = [
            ("Frame".to_string(), "1".to_string()),
            ("Layer".to_string(), "bg".to_string()),
        ]
        .into_iter()
        .collect();
        let bad: TaskParameterOverrides = [("Frame".to_string(), "2".to_string())].into_iter().collect();
        let mock = MockBackend::new();
        let mut session = LocalSession::new(&job, options(), mock.connector());
        let mut scope = session.enter().unwrap();

        scope.initialize(&[], &job.steps[0], -1, &[bad, good]);

        assert_eq!(frames(&scope), vec!["1"]);
        assert!(scope.is_failed());
        assert!(scope
            .log_messages()
            .iter()
            .any(|e| e.message.starts_with("Skipping Task parameter set with errors:")));
    }

    #[test]
    fn run_drains_queue_and_counts_tasks() {
        let job = Job::new("job")
            .with_environment(Environment::new("env"))
            .with_step(
                Step::new("main", Script::new("main")).with_parameter_space(frame_space(&["1", "2"])),
            );
        let mock = MockBackend::new();
        let mut session = LocalSession::new(&job, options(), mock.connector());
        {
            let mut scope = session.enter().unwrap();
            scope.initialize(&[], &job.steps[0], -1, &[]);
            scope.run().unwrap();

            assert!(!scope.is_failed());
            assert!(scope.has_ended());
            assert_eq!(scope.tasks_run(), 2);
            assert_eq!(scope.queue_len(), 0);
            assert!(scope.current_action().is_none());
        }

        assert_eq!(session.lifecycle(), Lifecycle::Ended);
        assert_eq!(mock.cleanup_count(), 1);
        assert_eq!(
            mock.calls().first(),
            Some(&BackendCall::EnterEnvironment {
                name: "env".into(),
                identifier: "env".into()
            })
        );
    }

    #[test]
    fn run_requires_ready_backend() {
        let job = Job::new("job").with_step(Step::new("main", Script::new("main")));
        let mock = MockBackend::new().with_state(SessionState::Running);
        let mut session = LocalSession::new(&job, options(), mock.connector());
        session.initialize(&[], &job.steps[0], -1, &[]);

        let err = session.run().unwrap_err();
        assert!(matches!(err, SessionError::NotReady { state: SessionState::Running }));
        assert!(mock.task_calls().is_empty());
        assert_eq!(session.queue_len(), 1);
    }

    #[test]
    fn failure_stops_before_environment_exit() {
        let job = Job::new("job")
            .with_environment(Environment::new("env"))
            .with_step(
                Step::new("main", Script::new("main")).with_parameter_space(frame_space(&["1", "2"])),
            );
        let mock = MockBackend::new();
        mock.queue_outcomes([ActionState::Success, ActionState::Failed]);
        let mut session = LocalSession::new(&job, options(), mock.connector());
        {
            let mut scope = session.enter().unwrap();
            scope.initialize(&[], &job.steps[0], -1, &[]);
            scope.run().unwrap();

            assert!(scope.is_failed());
            assert_eq!(scope.tasks_run(), 0);
            assert_eq!(scope.queue_len(), 2);
            assert_eq!(
                scope.current_action().as_deref(),
                Some("Run Step 'main' with Task parameters '['1']'")
            );
        }

        assert!(!mock
            .calls()
            .iter()
            .any(|c| matches!(c, BackendCall::ExitEnvironment { .. })));
        assert!(session.log_messages().iter().any(|e| e.message
            == "ERROR executing action: 'Run Step 'main' with Task parameters '['1']'' (see Task logs for details)"));
    }

    #[test]
    fn cancel_without_action_still_fails_session() {
        let job = Job::new("job").with_step(Step::new("main", Script::new("main")));
        let mock = MockBackend::new();
        let mut session = LocalSession::new(&job, options(), mock.connector());
        session.initialize(&[], &job.steps[0], -1, &[]);

        session.cancel();
        session.cancel();
        session.run().unwrap();

        assert!(session.is_failed());
        assert!(mock.task_calls().is_empty());
        assert!(!mock.calls().contains(&BackendCall::CancelAction));
    }

    #[test]
    fn cleanup_runs_once() {
        let job = Job::new("job").with_step(Step::new("main", Script::new("main")));
        let mock = MockBackend::new();
        {
            let mut session = LocalSession::new(&job, options(), mock.connector());
            session.cleanup();
            session.cleanup();
            assert_eq!(session.lifecycle(), Lifecycle::Ended);
        }
        assert_eq!(mock.cleanup_count(), 1);
    }

    #[test]
    fn backend_receives_session_configuration() {
        let job = Job::new("job")
            .with_parameter("Scene", ParameterValue::new(ParameterType::Path, "/scene.blend"))
            .with_step(Step::new("main", Script::new("main")));
        let mock = MockBackend::new();
        let session = LocalSession::new(
            &job,
            SessionOptions {
                session_id: "custom".into(),
                retain_working_dirs: true,
                ..options()
            },
            mock.connector(),
        );

        assert_eq!(session.session_id(), "custom");
        let config = mock.config().unwrap();
        assert_eq!(config.session_id, "custom");
        assert!(config.retain_working_dirs);
        assert_eq!(config.job_parameters[0].name, "Scene");
    }

    #[test]
    fn cancel_before_backend_runs_is_forwarded() {
        let job = Job::new("job").with_step(Step::new("long", Script::new("sleep 100")));
        let backend = Arc::new(SelfCancellingBackend::default());
        let connected = Arc::clone(&backend);
        let mut session = LocalSession::new(&job, options(), move |config: BackendConfig| {
            *connected.callback.lock().unwrap() = Some((config.session_id, config.callback));
            connected
        });
        *backend.handle.lock().unwrap() = Some(session.cancel_handle());
        session.initialize(&[], &job.steps[0], -1, &[]);

        let started = Instant::now();
        session.run().unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(session.is_failed());
        assert_eq!(session.tasks_run(), 0);
        assert_eq!(backend.cancels.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_is_forwarded_once_per_action() {
        let job = Job::new("job").with_step(Step::new("long", Script::new("sleep 100")));
        let mock = MockBackend::new().holding_tasks();
        let mut session = LocalSession::new(&job, options(), mock.connector());
        session.initialize(&[], &job.steps[0], -1, &[]);
        let handle = session.cancel_handle();
        let watcher = mock.clone();
        let canceller = std::thread::spawn(move || {
            assert!(watcher.wait_for_held_task(Duration::from_secs(5)));
            handle.cancel();
            handle.cancel();
        });

        session.run().unwrap();
        canceller.join().unwrap();

        let cancels = mock
            .calls()
            .iter()
            .filter(|c| **c == BackendCall::CancelAction)
            .count();
        assert_eq!(cancels, 1);
    }

    #[test]
    fn zero_maximum_tasks_means_no_limit() {
        let job = Job::new("job").with_step(
            Step::new("main", Script::new("main")).with_parameter_space(frame_space(&["1", "2", "3"])),
        );
        let mock = MockBackend::new();
        let mut session = LocalSession::new(&job, options(), mock.connector());

        session.initialize(&[], &job.steps[0], 0, &[]);

        assert_eq!(frames(&session), vec!["1", "2", "3"]);
    }

    #[test]
    fn queue_holds_two_actions_per_environment_plus_tasks() {
        let job = Job::new("job")
            .with_environment(Environment::new("job-a"))
            .with_environment(Environment::new("job-b"))
            .with_step(Step::new("dep", Script::new("dep")).with_parameter_space(frame_space(&["1", "2"])))
            .with_step(
                Step::new("main", Script::new("main"))
                    .depends_on("dep")
                    .with_parameter_space(frame_space(&["10", "20", "30"])),
            );
        let session_envs = vec![Environment::new("session")];
        let mock = MockBackend::new();
        let mut session = LocalSession::new(&job, options(), mock.connector())
            .with_session_environments(&session_envs);

        session.initialize(&[&job.steps[0]], &job.steps[1], 2, &[]);

        let environments = 3;
        let tasks = 2 + 2;
        assert_eq!(session.queue_len(), 2 * environments + tasks);
        let tasks_queued = session.queued_actions().filter(|a| a.is_task()).count();
        assert_eq!(tasks_queued, tasks);
    }

    #[test]
    fn interrupts_are_handled_by_default() {
        assert!(SessionOptions::default().handle_interrupts);
    }

    #[test]
    fn duration_is_zero_before_run() {
        let job = Job::new("job").with_step(Step::new("main", Script::new("main")));
        let mock = MockBackend::new();
        let session = LocalSession::new(&job, options(), mock.connector());
        assert_eq!(session.duration(), Duration::ZERO);
        assert_eq!(session.lifecycle(), Lifecycle::Created);
    }
}
