//! Envelope - wire 上の JSON ラッパー
//!
//! ```text
//! request:  {"job":{"id":"<string>","data":{...}}}
//! response: {"job":{"id":"<string>","revision":<int>,"success":{...}}}
//!         | {"job":{"id":"<string>","revision":<int>,"error":{"message":"Job failed","reason":"<string>","stack":"<string>"}}}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::JobFailure;
use super::ids::JobId;
use super::job::{Job, JsonObject};

/// `message` of every error response.
pub const JOB_FAILED_MESSAGE: &str = "Job failed";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequestEnvelope {
    pub job: Job,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResponseEnvelope {
    pub job: JobResponse,
}

/// The result of processing a job, published on the response queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResponse {
    pub id: JobId,

    /// Epoch millis sampled when the response was built.
    pub revision: i64,

    #[serde(flatten)]
    pub outcome: JobOutcome,
}

/// Exactly one of `success` / `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobOutcome {
    Success(JsonObject),
    Error(JobErrorBody),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobErrorBody {
    pub message: String,
    pub reason: String,
    pub stack: String,
}

impl JobResponse {
    pub fn success(id: JobId, completed_at: DateTime<Utc>, result: JsonObject) -> Self {
        Self {
            id,
            revision: completed_at.timestamp_millis(),
            outcome: JobOutcome::Success(result),
        }
    }

    pub fn failure(id: JobId, completed_at: DateTime<Utc>, failure: &JobFailure) -> Self {
        Self {
            id,
            revision: completed_at.timestamp_millis(),
            outcome: JobOutcome::Error(JobErrorBody {
                message: JOB_FAILED_MESSAGE.to_string(),
                reason: failure.reason().to_string(),
                stack: failure.stack().to_string(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Success(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn success_response_has_the_wire_shape() {
        let result = json!({"processed": true}).as_object().cloned().unwrap();
        let response = JobResponse::success(JobId::parse("j1").unwrap(), at(), result);
        let wire = serde_json::to_value(JobResponseEnvelope { job: response }).unwrap();

        assert_eq!(
            wire,
            json!({"job": {"id": "j1", "revision": 1_704_110_400_000_i64, "success": {"processed": true}}})
        );
        assert!(JobResponse::success(JobId::parse("j1").unwrap(), at(), JsonObject::new()).is_success());
    }

    #[test]
    fn failure_response_carries_reason_and_fixed_message() {
        let failure = JobFailure::new("disk full").with_stack("trace");
        let response = JobResponse::failure(JobId::parse("j1").unwrap(), at(), &failure);
        assert!(!response.is_success());
        let wire = serde_json::to_value(JobResponseEnvelope { job: response }).unwrap();

        assert_eq!(wire["job"]["error"]["message"], "Job failed");
        assert_eq!(wire["job"]["error"]["reason"], "disk full");
        assert_eq!(wire["job"]["error"]["stack"], "trace");
        assert!(wire["job"].get("success").is_none());
    }
}
