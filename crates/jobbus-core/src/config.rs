//! Consumer / producer configuration.
//!
//! Values are validated once, at construction. Out-of-range values are an
//! `InvalidArgument` error; nothing is clamped. Deserialization goes through
//! the same validation (`#[serde(try_from)]`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::JobBusError;

pub const MAX_WAIT_TIME_SECONDS: u32 = 20;
pub const MAX_VISIBILITY_TIMEOUT: u32 = 43_200;
pub const MIN_CONCURRENCY: u32 = 1;
pub const MAX_CONCURRENCY: u32 = 10;

pub const DEFAULT_WAIT_TIME_SECONDS: u32 = 20;
pub const DEFAULT_VISIBILITY_TIMEOUT: u32 = 600;
pub const DEFAULT_CONCURRENCY: u32 = 1;
pub const DEFAULT_ERROR_BACKOFF_MS: u64 = 1_000;

/// Settings of one poll loop. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ConsumerConfigBuilder", rename_all = "camelCase")]
pub struct ConsumerConfig {
    queue_url: String,
    wait_time_seconds: u32,
    visibility_timeout: u32,
    /// Accepted for forward compatibility; the loop keeps one message in flight.
    concurrency: u32,
    error_backoff_ms: u64,
}

impl ConsumerConfig {
    /// Defaults for everything but the queue.
    pub fn new(queue_url: impl Into<String>) -> Result<Self, JobBusError> {
        Self::builder(queue_url).build()
    }

    pub fn builder(queue_url: impl Into<String>) -> ConsumerConfigBuilder {
        ConsumerConfigBuilder::new(queue_url)
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    pub fn wait_time_seconds(&self) -> u32 {
        self.wait_time_seconds
    }

    pub fn visibility_timeout(&self) -> u32 {
        self.visibility_timeout
    }

    pub fn concurrency(&self) -> u32 {
        self.concurrency
    }

    /// Pause after a failed receive before the run loop polls again.
    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerConfigBuilder {
    queue_url: String,
    #[serde(default = "default_wait_time_seconds")]
    wait_time_seconds: u32,
    #[serde(default = "default_visibility_timeout")]
    visibility_timeout: u32,
    #[serde(default = "default_concurrency")]
    concurrency: u32,
    #[serde(default = "default_error_backoff_ms")]
    error_backoff_ms: u64,
}

fn default_wait_time_seconds() -> u32 {
    DEFAULT_WAIT_TIME_SECONDS
}

fn default_visibility_timeout() -> u32 {
    DEFAULT_VISIBILITY_TIMEOUT
}

fn default_concurrency() -> u32 {
    DEFAULT_CONCURRENCY
}

fn default_error_backoff_ms() -> u64 {
    DEFAULT_ERROR_BACKOFF_MS
}

impl ConsumerConfigBuilder {
    pub fn new(queue_url: impl Into<String>) -> Self {
        Self {
            queue_url: queue_url.into(),
            wait_time_seconds: DEFAULT_WAIT_TIME_SECONDS,
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
            error_backoff_ms: DEFAULT_ERROR_BACKOFF_MS,
        }
    }

    /// Long-poll wait per receive.
    ///
    /// 0 は即時 return。空の queue だと run loop は待たずに receive を繰り返し、
    /// CPU を 1 コア使い続けるので常駐 consumer では避けること。
    pub fn wait_time_seconds(mut self, seconds: u32) -> Self {
        self.wait_time_seconds = seconds;
        self
    }

    pub fn visibility_timeout(mut self, seconds: u32) -> Self {
        self.visibility_timeout = seconds;
        self
    }

    pub fn concurrency(mut self, concurrency: u32) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn build(self) -> Result<ConsumerConfig, JobBusError> {
        if self.queue_url.is_empty() {
            return Err(JobBusError::InvalidArgument(
                "Missing queue URL".to_string(),
            ));
        }
        if self.wait_time_seconds > MAX_WAIT_TIME_SECONDS {
            return Err(JobBusError::InvalidArgument(format!(
                "waitTimeSeconds must be between 0 and {MAX_WAIT_TIME_SECONDS}, got {}",
                self.wait_time_seconds
            )));
        }
        if self.visibility_timeout > MAX_VISIBILITY_TIMEOUT {
            return Err(JobBusError::InvalidArgument(format!(
                "visibilityTimeout must be between 0 and {MAX_VISIBILITY_TIMEOUT}, got {}",
                self.visibility_timeout
            )));
        }
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(JobBusError::InvalidArgument(format!(
                "concurrency must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}, got {}",
                self.concurrency
            )));
        }

        Ok(ConsumerConfig {
            queue_url: self.queue_url,
            wait_time_seconds: self.wait_time_seconds,
            visibility_timeout: self.visibility_timeout,
            concurrency: self.concurrency,
            error_backoff_ms: self.error_backoff_ms,
        })
    }
}

impl TryFrom<ConsumerConfigBuilder> for ConsumerConfig {
    type Error = JobBusError;

    fn try_from(builder: ConsumerConfigBuilder) -> Result<Self, Self::Error> {
        builder.build()
    }
}

/// A consumer of the request queue that publishes to a response queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerConfig {
    requests: ConsumerConfig,
    response_queue_url: String,
}

impl ProducerConfig {
    pub fn new(
        requests: ConsumerConfig,
        response_queue_url: impl Into<String>,
    ) -> Result<Self, JobBusError> {
        let response_queue_url = response_queue_url.into();
        if response_queue_url.is_empty() {
            return Err(JobBusError::InvalidArgument(
                "Missing response queue URL".to_string(),
            ));
        }
        Ok(Self {
            requests,
            response_queue_url,
        })
    }

    pub fn requests(&self) -> &ConsumerConfig {
        &self.requests
    }

    pub fn response_queue_url(&self) -> &str {
        &self.response_queue_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults() {
        let config = ConsumerConfig::new("q").unwrap();
        assert_eq!(config.queue_url(), "q");
        assert_eq!(config.wait_time_seconds(), 20);
        assert_eq!(config.visibility_timeout(), 600);
        assert_eq!(config.concurrency(), 1);
        assert_eq!(config.error_backoff(), Duration::from_secs(1));
    }

    #[rstest]
    #[case::wait_time(ConsumerConfig::builder("q").wait_time_seconds(21))]
    #[case::visibility(ConsumerConfig::builder("q").visibility_timeout(43_201))]
    #[case::concurrency_high(ConsumerConfig::builder("q").concurrency(11))]
    #[case::concurrency_zero(ConsumerConfig::builder("q").concurrency(0))]
    #[case::empty_queue(ConsumerConfig::builder(""))]
    fn out_of_range_values_are_rejected(#[case] builder: ConsumerConfigBuilder) {
        let err = builder.build().unwrap_err();
        assert!(matches!(err, JobBusError::InvalidArgument(_)));
    }

    #[rstest]
    #[case::edges_low(0, 0, 1)]
    #[case::edges_high(20, 43_200, 10)]
    fn boundary_values_are_accepted(
        #[case] wait: u32,
        #[case] visibility: u32,
        #[case] concurrency: u32,
    ) {
        let config = ConsumerConfig::builder("q")
            .wait_time_seconds(wait)
            .visibility_timeout(visibility)
            .concurrency(concurrency)
            .build()
            .unwrap();
        assert_eq!(config.wait_time_seconds(), wait);
        assert_eq!(config.visibility_timeout(), visibility);
        assert_eq!(config.concurrency(), concurrency);
    }

    #[test]
    fn oversized_error_backoff_saturates() {
        let config = ConsumerConfig::builder("q")
            .error_backoff(Duration::MAX)
            .build()
            .unwrap();
        assert_eq!(config.error_backoff(), Duration::from_millis(u64::MAX));

        let config = ConsumerConfig::builder("q")
            .error_backoff(Duration::from_millis(1_500))
            .build()
            .unwrap();
        assert_eq!(config.error_backoff(), Duration::from_millis(1_500));
    }

    #[test]
    fn deserialization_validates() {
        let ok: ConsumerConfig =
            serde_json::from_str(r#"{"queueUrl":"q","visibilityTimeout":30}"#).unwrap();
        assert_eq!(ok.visibility_timeout(), 30);
        assert_eq!(ok.wait_time_seconds(), 20);

        let bad: Result<ConsumerConfig, _> =
            serde_json::from_str(r#"{"queueUrl":"q","waitTimeSeconds":21}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn producer_requires_a_response_queue() {
        let requests = ConsumerConfig::new("requests").unwrap();
        assert!(ProducerConfig::new(requests.clone(), "").is_err());

        let config = ProducerConfig::new(requests, "responses").unwrap();
        assert_eq!(config.requests().queue_url(), "requests");
        assert_eq!(config.response_queue_url(), "responses");
    }
}
