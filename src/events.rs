//! Event channels between the batch worker and whoever is watching it.
//!
//! Producers never block: both channels are unbounded `mpsc` queues and a
//! send to a departed observer is dropped on the floor. Observers drain with
//! [`EventStream::drain_logs`] / [`EventStream::drain_statuses`] on their own
//! schedule.

use std::fmt::Display;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::batch_worker::RunSummary;
use crate::job::ItemStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LogEvent {
    pub text: String,
    pub severity: Severity,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StatusEvent {
    Item {
        path: PathBuf,
        status: ItemStatus,
        message: Option<String>,
    },
    Progress(f64),
    Finished(RunSummary),
}

#[derive(Clone, Debug)]
pub struct LogSink {
    tx: Sender<LogEvent>,
}

impl LogSink {
    /// A sink nobody listens to.
    pub fn discard() -> Self {
        let (tx, _) = mpsc::channel();
        LogSink { tx }
    }

    pub fn log(&self, severity: Severity, text: impl Into<String>) {
        let _ = self.tx.send(LogEvent {
            text: text.into(),
            severity,
        });
    }

    pub fn debug(&self, text: impl Into<String>) {
        self.log(Severity::Debug, text);
    }

    pub fn info(&self, text: impl Into<String>) {
        self.log(Severity::Info, text);
    }

    pub fn warn(&self, text: impl Into<String>) {
        self.log(Severity::Warning, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.log(Severity::Error, text);
    }
}

/// Producer half, owned by the worker thread.
#[derive(Clone, Debug)]
pub struct EventSink {
    pub log: LogSink,
    status_tx: Sender<StatusEvent>,
}

impl EventSink {
    pub fn publish(&self, event: StatusEvent) {
        let _ = self.status_tx.send(event);
    }

    pub fn item(&self, path: &PathBuf, status: ItemStatus, message: Option<String>) {
        self.publish(StatusEvent::Item {
            path: path.clone(),
            status,
            message,
        });
    }
}

/// Consumer half, owned by the observer.
pub struct EventStream {
    log_rx: Receiver<LogEvent>,
    status_rx: Receiver<StatusEvent>,
}

impl EventStream {
    pub fn drain_logs(&self) -> Vec<LogEvent> {
        self.log_rx.try_iter().collect()
    }

    pub fn drain_statuses(&self) -> Vec<StatusEvent> {
        self.status_rx.try_iter().collect()
    }
}

pub fn channels() -> (EventSink, EventStream) {
    let (log_tx, log_rx) = mpsc::channel();
    let (status_tx, status_rx) = mpsc::channel();
    (
        EventSink {
            log: LogSink { tx: log_tx },
            status_tx,
        },
        EventStream { log_rx, status_rx },
    )
}
