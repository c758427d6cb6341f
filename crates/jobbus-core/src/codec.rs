//! JobCodec - queue message body と envelope の相互変換
//!
//! decode は serde の型チェックの前に envelope の形を検証し、
//! どこが壊れているかを `CodecError::InvalidEnvelope` で返します。

use serde_json::Value;
use thiserror::Error;

use crate::domain::{
    Job, JobId, JobRequestEnvelope, JobResponse, JobResponseEnvelope, JsonObject,
};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid job envelope: {0}")]
    InvalidEnvelope(&'static str),
}

/// A message type the poll loop can consume.
pub trait Inbound: Sized + Send + 'static {
    fn decode(body: &str) -> Result<Self, CodecError>;

    fn job_id(&self) -> &JobId;
}

impl Inbound for Job {
    fn decode(body: &str) -> Result<Self, CodecError> {
        JobCodec::decode_request(body)
    }

    fn job_id(&self) -> &JobId {
        self.id()
    }
}

impl Inbound for JobResponse {
    fn decode(body: &str) -> Result<Self, CodecError> {
        JobCodec::decode_response(body)
    }

    fn job_id(&self) -> &JobId {
        &self.id
    }
}

pub struct JobCodec;

impl JobCodec {
    pub fn encode_request(job: &Job) -> Result<String, CodecError> {
        Ok(serde_json::to_string(&JobRequestEnvelope { job: job.clone() })?)
    }

    pub fn encode_response(response: &JobResponse) -> Result<String, CodecError> {
        Ok(serde_json::to_string(&JobResponseEnvelope {
            job: response.clone(),
        })?)
    }

    /// `{"job":{"id":<non-empty string>,"data":<object>}}`
    pub fn decode_request(body: &str) -> Result<Job, CodecError> {
        let mut job = Self::job_object(body)?;

        let id = Self::job_id(&job)?;
        let Some(Value::Object(data)) = job.remove("data") else {
            return Err(CodecError::InvalidEnvelope("job.data must be an object"));
        };

        Ok(Job::from_parts(id, data))
    }

    /// `{"job":{"id","revision":<int>,"success":<object>}}` or the `error` form.
    pub fn decode_response(body: &str) -> Result<JobResponse, CodecError> {
        let job = Self::job_object(body)?;

        Self::job_id(&job)?;
        if !job.get("revision").is_some_and(|r| r.is_i64() || r.is_u64()) {
            return Err(CodecError::InvalidEnvelope("job.revision must be an integer"));
        }

        match (job.get("success"), job.get("error")) {
            (Some(_), Some(_)) => {
                return Err(CodecError::InvalidEnvelope(
                    "job must not carry both success and error",
                ));
            }
            (None, None) => {
                return Err(CodecError::InvalidEnvelope(
                    "job must carry either success or error",
                ));
            }
            (Some(success), None) if !success.is_object() => {
                return Err(CodecError::InvalidEnvelope("job.success must be an object"));
            }
            (None, Some(error)) if !error.is_object() => {
                return Err(CodecError::InvalidEnvelope("job.error must be an object"));
            }
            _ => {}
        }

        // 形は検証済み。残り（error の各フィールドなど）は serde に任せる
        Ok(serde_json::from_value(Value::Object(job))?)
    }

    fn job_object(body: &str) -> Result<JsonObject, CodecError> {
        let Value::Object(mut envelope) = serde_json::from_str::<Value>(body)? else {
            return Err(CodecError::InvalidEnvelope("envelope must be an object"));
        };
        let Some(Value::Object(job)) = envelope.remove("job") else {
            return Err(CodecError::InvalidEnvelope("job must be an object"));
        };
        Ok(job)
    }

    fn job_id(job: &JsonObject) -> Result<JobId, CodecError> {
        match job.get("id") {
            Some(Value::String(id)) if !id.is_empty() => Ok(JobId::new_unchecked(id.clone())),
            _ => Err(CodecError::InvalidEnvelope("job.id must be a non-empty string")),
        }
    }
}
