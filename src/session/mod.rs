//! Session orchestration.
//!
//! This module provides the pieces that drive a job step through an
//! execution backend:
//! - [`Action`] - queued units of backend work
//! - [`SessionBackend`] - the execution backend contract
//! - [`LocalSession`] - builds the action queue and runs it
//! - [`LogSink`] - per-session log capture
//! - [`InterruptGuard`] - scoped SIGINT/SIGTERM handling
//! - [`MockBackend`] - recording backend for tests

mod action;
mod backend;
mod interrupt;
mod local;
mod logs;
pub mod mock;

pub use action::Action;
pub use backend::{
    ActionCallback, ActionState, ActionStatus, BackendConfig, SessionBackend, SessionState,
};
pub use interrupt::InterruptGuard;
pub use local::{
    CancelHandle, Lifecycle, LocalSession, SessionOptions, SessionScope, DEFAULT_SESSION_ID,
};
pub use logs::{LogEntry, LogSink};
pub use mock::{BackendCall, MockBackend};
