//! AckPolicy - delegate の結果から「メッセージをどう片付けるか」を決める
//!
//! Decider と同じく純粋関数です。実行（delete / send）は poll loop が行います。

use chrono::{DateTime, Utc};

use crate::delegate::DelegateError;
use crate::domain::{JobId, JobResponse, JsonObject};

/// What the poll loop does with a processed message.
#[derive(Debug)]
pub enum Decision {
    /// Acknowledge (delete) the message.
    Delete,

    /// Send `response` to `queue_url`, then delete the message.
    Publish {
        queue_url: String,
        response: JobResponse,
    },

    /// Leave the message on the queue; it reappears after its visibility timeout.
    Retain(DelegateError),
}

/// Maps the outcome of one delegate call to a `Decision`.
///
/// `outcome` は object チェック済みの結果（`Ok`）か delegate の失敗（`Err`）。
pub trait AckPolicy: Send + Sync + 'static {
    fn decide(
        &self,
        job_id: &JobId,
        outcome: Result<JsonObject, DelegateError>,
        now: DateTime<Utc>,
    ) -> Decision;
}

/// Plain consumer: delete on success, retain on any failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteOnly;

impl AckPolicy for DeleteOnly {
    fn decide(
        &self,
        _job_id: &JobId,
        outcome: Result<JsonObject, DelegateError>,
        _now: DateTime<Utc>,
    ) -> Decision {
        match outcome {
            Ok(_) => Decision::Delete,
            Err(err) => Decision::Retain(err),
        }
    }
}

/// Producer: answer every job that completed, successfully or with an
/// expected failure. Unexpected failures are retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResponse {
    queue_url: String,
}

impl PublishResponse {
    pub fn new(queue_url: impl Into<String>) -> Self {
        Self {
            queue_url: queue_url.into(),
        }
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

impl AckPolicy for PublishResponse {
    fn decide(
        &self,
        job_id: &JobId,
        outcome: Result<JsonObject, DelegateError>,
        now: DateTime<Utc>,
    ) -> Decision {
        let response = match outcome {
            Ok(result) => JobResponse::success(job_id.clone(), now, result),
            Err(DelegateError::JobFailed(failure)) => {
                JobResponse::failure(job_id.clone(), now, &failure)
            }
            Err(other) => return Decision::Retain(other),
        };

        Decision::Publish {
            queue_url: self.queue_url.clone(),
            response,
        }
    }
}
