//! Per-session log capture.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Local;
use serde::Serialize;
use tracing::{info, warn};

/// One captured log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.timestamp, self.message)
    }
}

#[derive(Debug)]
struct SinkInner {
    session_id: String,
    echo: bool,
    attached: AtomicBool,
    entries: Mutex<Vec<LogEntry>>,
}

/// Log collection owned by one session.
///
/// Clones share the same entries, so the backend can append from its own
/// thread. Messages are always forwarded to `tracing`; they are only
/// captured while the sink is attached.
#[derive(Debug, Clone)]
pub struct LogSink {
    inner: Arc<SinkInner>,
}

impl LogSink {
    /// Create a detached sink. With `echo`, captured lines are also printed.
    pub fn new(session_id: impl Into<String>, echo: bool) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                session_id: session_id.into(),
                echo,
                attached: AtomicBool::new(false),
                entries: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn attach(&self) {
        self.inner.attached.store(true, Ordering::SeqCst);
    }

    pub fn detach(&self) {
        self.inner.attached.store(false, Ordering::SeqCst);
    }

    pub fn is_attached(&self) -> bool {
        self.inner.attached.load(Ordering::SeqCst)
    }

    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        info!(session_id = %self.inner.session_id, "{}", message);
        self.capture(message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(session_id = %self.inner.session_id, "{}", message);
        self.capture(message);
    }

    fn capture(&self, message: String) {
        if !self.is_attached() {
            return;
        }
        let entry = LogEntry {
            timestamp: Local::now().format("%a %b %e %H:%M:%S %Y").to_string(),
            message,
        };
        if self.inner.echo {
            println!("{}", entry);
        }
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    /// Snapshot of the captured entries in emission order.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Captured messages without timestamps.
    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.message).collect()
    }
}
