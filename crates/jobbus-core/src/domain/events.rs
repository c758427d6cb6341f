//! Events - poll loop が発行するイベント
//!
//! イベント名（`EventKind::as_str`）は互換性のある表面として固定です。

use std::fmt;
use std::sync::Arc;

use super::ids::{JobId, MessageId};
use crate::delegate::DelegateError;
use crate::ports::QueueError;

/// Fixed set of notification kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Debug,
    Info,
    Warn,
    QueueError,
    DelegateError,
    JobSuccess,
    JobError,
    ProcessedMessage,
}

impl EventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::QueueError => "queue-error",
            Self::DelegateError => "delegate-error",
            Self::JobSuccess => "job-success",
            Self::JobError => "job-error",
            Self::ProcessedMessage => "processed-message",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification emitted by a consumer or producer.
///
/// Errors are shared (`Arc`) so that every subscriber sees the same value.
#[derive(Debug, Clone)]
pub enum ConsumerEvent {
    Debug(String),
    Info(String),
    Warn(String),

    /// receive / send / delete failed at the transport boundary.
    QueueError(QueueError),

    /// The message was left on the queue for redelivery.
    DelegateError {
        job_id: Option<JobId>,
        error: Arc<DelegateError>,
    },

    /// A success response was published.
    JobSuccess { job_id: JobId, revision: i64 },

    /// An error response was published for an expected job failure.
    JobError {
        job_id: JobId,
        revision: i64,
        reason: String,
    },

    /// One message went through a full cycle, whatever its outcome.
    ProcessedMessage {
        message_id: MessageId,
        job_id: Option<JobId>,
    },
}

impl ConsumerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Debug(_) => EventKind::Debug,
            Self::Info(_) => EventKind::Info,
            Self::Warn(_) => EventKind::Warn,
            Self::QueueError(_) => EventKind::QueueError,
            Self::DelegateError { .. } => EventKind::DelegateError,
            Self::JobSuccess { .. } => EventKind::JobSuccess,
            Self::JobError { .. } => EventKind::JobError,
            Self::ProcessedMessage { .. } => EventKind::ProcessedMessage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_are_stable() {
        let names: Vec<_> = [
            EventKind::Debug,
            EventKind::Info,
            EventKind::Warn,
            EventKind::QueueError,
            EventKind::DelegateError,
            EventKind::JobSuccess,
            EventKind::JobError,
            EventKind::ProcessedMessage,
        ]
        .iter()
        .map(|k| k.as_str())
        .collect();

        assert_eq!(
            names,
            vec![
                "debug",
                "info",
                "warn",
                "queue-error",
                "delegate-error",
                "job-success",
                "job-error",
                "processed-message"
            ]
        );
    }

    #[test]
    fn kind_matches_variant() {
        let event = ConsumerEvent::QueueError(QueueError::Transport("boom".into()));
        assert_eq!(event.kind(), EventKind::QueueError);
        assert_eq!(ConsumerEvent::Warn("w".into()).kind().to_string(), "warn");
    }
}
