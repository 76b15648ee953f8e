//! localsession - Run job steps in a local session.
//!
//! A job is a set of steps, each a script run once per combination of its
//! task parameters, optionally wrapped in environments. This crate turns
//! one step (and, on request, the steps it depends on) into an ordered
//! queue of actions and drives that queue against an execution backend,
//! one action at a time, with cancellation and exactly-once cleanup.
//!
//! # Modules
//!
//! - [`config`] - Path mapping rules and task parameter arguments
//! - [`error`] - Error types and result aliases
//! - [`logging`] - Tracing subscriber setup
//! - [`model`] - Job, step, environment and parameter types
//! - [`runner`] - Dependency collection, parameter sets and the top-level run
//! - [`session`] - The session runner and the backend contract
//!
//! # Example
//!
//! ```
//! use localsession::model::{Environment, Job, Script, Step};
//! use localsession::runner::{run_local_session, RunOptions};
//! use localsession::session::MockBackend;
//!
//! let job = Job::new("demo")
//!     .with_environment(Environment::new("env"))
//!     .with_step(Step::new("hello", Script::new("echo hello")));
//!
//! let result = run_local_session(&job, &RunOptions::new("hello"), MockBackend::new().connector());
//! assert!(result.is_success());
//! assert_eq!(result.tasks_run, 1);
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod runner;
pub mod session;

pub use error::{Result, SessionError};
