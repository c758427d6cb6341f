//! Errors - エラー型と分類
//!
//! - `JobBusError`: 呼び出し側に同期的に返すエラー（構築時の引数エラー、dispatcher の送信失敗）
//! - `JobFailure`: delegate が「ジョブ自体が失敗した」と明示するための値（終端扱い）

use std::backtrace::{Backtrace, BacktraceStatus};

use thiserror::Error;

use crate::codec::CodecError;
use crate::ports::QueueError;

/// JobBusError はライブラリ境界のエラー
#[derive(Debug, Error)]
pub enum JobBusError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// An operational failure of the job itself.
///
/// Returning this from a delegate means "the job was attempted and cannot
/// succeed"; the message is acknowledged and a producer publishes an error
/// response instead of leaving the message for redelivery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct JobFailure {
    reason: String,
    stack: String,
}

impl JobFailure {
    /// Create a failure; captures a backtrace when `RUST_BACKTRACE` enables it.
    pub fn new(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let backtrace = Backtrace::capture();
        let stack = match backtrace.status() {
            BacktraceStatus::Captured => format!("JobFailure: {reason}\n{backtrace}"),
            _ => format!("JobFailure: {reason}"),
        };
        Self { reason, stack }
    }

    /// Replace the diagnostic stack (e.g. with a chain of error sources).
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = stack.into();
        self
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_failure_displays_its_reason() {
        let failure = JobFailure::new("oh noes");
        assert_eq!(failure.to_string(), "oh noes");
        assert_eq!(failure.reason(), "oh noes");
        assert!(failure.stack().starts_with("JobFailure: oh noes"));
    }

    #[test]
    fn with_stack_overrides_the_captured_stack() {
        let failure = JobFailure::new("boom").with_stack("custom");
        assert_eq!(failure.stack(), "custom");
    }

    #[test]
    fn queue_errors_convert_into_job_bus_errors() {
        let err: JobBusError = QueueError::Transport("connection reset".into()).into();
        assert_eq!(err.to_string(), "queue error: connection reset");
    }
}
