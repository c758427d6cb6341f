//! Dispatcher - request queue への publish 専用ラッパー

use std::sync::Arc;

use serde_json::Value;

use crate::codec::JobCodec;
use crate::domain::{Job, JobBusError};
use crate::ports::QueueClient;

/// Publishes jobs to one request queue.
pub struct Dispatcher {
    queue: Arc<dyn QueueClient>,
    queue_url: String,
}

impl Dispatcher {
    pub fn new(
        queue: Arc<dyn QueueClient>,
        queue_url: impl Into<String>,
    ) -> Result<Self, JobBusError> {
        let queue_url = queue_url.into();
        if queue_url.is_empty() {
            return Err(JobBusError::InvalidArgument(
                "Missing request queue URL".to_string(),
            ));
        }
        Ok(Self { queue, queue_url })
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    /// Build a job without publishing it.
    ///
    /// `id` が無ければ `data` の structural hash を使う。
    pub fn create_job(&self, data: Value, id: Option<&str>) -> Result<Job, JobBusError> {
        Job::from_value(data, id)
    }

    /// Publish an already-built job.
    pub async fn publish(&self, job: &Job) -> Result<(), JobBusError> {
        let body = JobCodec::encode_request(job)?;
        let message_id = self.queue.send(&self.queue_url, body).await?;
        tracing::debug!(
            job_id = %job.id(),
            message_id = %message_id,
            queue_url = %self.queue_url,
            "job published"
        );
        Ok(())
    }

    /// Build and publish; returns the published job.
    pub async fn publish_job(&self, data: Value, id: Option<&str>) -> Result<Job, JobBusError> {
        let job = self.create_job(data, id)?;
        self.publish(&job).await?;
        Ok(job)
    }
}
