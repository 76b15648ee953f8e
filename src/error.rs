//! Error types for local session operations.
//!
//! This module defines [`SessionError`], the error type used throughout
//! the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Configuration and state problems are returned as `SessionError`
//!   before any action reaches the backend
//! - Failures reported by the backend are not errors; they end up in the
//!   [`RunResult`](crate::runner::RunResult) alongside the captured logs
//! - Use `anyhow::Error` (via `SessionError::Other`) for unexpected errors

use thiserror::Error;

use crate::session::SessionState;

/// Core error type for local session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The requested step is not part of the job.
    #[error("Step '{step}' does not exist in Job '{job}'.")]
    UnknownStep { step: String, job: String },

    /// A dependency names a step that the job does not define.
    #[error("Dependency '{dependency}' in Step '{step}' is not an existing Step.")]
    UnknownDependency { step: String, dependency: String },

    /// A step with step-level environments takes part in a dependency chain.
    #[error(
        "Step '{step}' has Step-level environments and cannot be run in the same local Session as the other dependencies."
    )]
    StepEnvironmentConflict { step: String },

    /// Step dependency cycle detected.
    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    /// A task parameter set could not be built from the supplied values.
    #[error("Invalid Task parameter set: {message}")]
    InvalidParameterSet { message: String },

    /// Task parameter arguments could not be parsed.
    #[error("{message}")]
    InvalidTaskParameters { message: String },

    /// Path mapping rules could not be parsed.
    #[error("Invalid path mapping rules: {message}")]
    InvalidPathMapping { message: String },

    /// `run` was called while the backend was not ready.
    #[error("Session is not in a READY state (current state: {state})")]
    NotReady { state: SessionState },

    /// Another session already owns the process interrupt handlers.
    #[error("Interrupt handlers are already installed by another session")]
    InterruptHandlerBusy,

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SessionError {
    /// Whether this error was caused by the job's own structure.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            SessionError::UnknownStep { .. }
                | SessionError::UnknownDependency { .. }
                | SessionError::StepEnvironmentConflict { .. }
                | SessionError::CircularDependency { .. }
        )
    }
}

/// Result type alias for local session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
