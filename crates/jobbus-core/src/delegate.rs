//! Delegate - 呼び出し側が注入するジョブ処理関数
//!
//! # 学習ポイント
//! - ジェネリック trait (`Delegate<T>`)
//! - クロージャを trait object にする adapter (`FnDelegate`)
//! - 失敗の種類を enum variant で区別する（文字列比較しない）

use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::codec::CodecError;
use crate::domain::JobFailure;

/// Why a message did not complete successfully.
///
/// Only `JobFailed` is a terminal outcome of the job. Every other variant
/// leaves the message on the queue so that it is redelivered after its
/// visibility timeout.
#[derive(Debug, Error)]
pub enum DelegateError {
    /// The delegate tried and the job cannot succeed.
    #[error("job failed: {0}")]
    JobFailed(#[from] JobFailure),

    /// The message body is not a valid envelope; the delegate never ran.
    #[error(transparent)]
    InvalidMessage(#[from] CodecError),

    /// The delegate succeeded with something other than a JSON object.
    #[error("Delegate did not return valid result (got {0}, expected object)")]
    InvalidResult(&'static str),

    /// Anything else: bugs, transient faults.
    #[error(transparent)]
    Unexpected(Box<dyn std::error::Error + Send + Sync>),
}

impl DelegateError {
    /// Wrap an arbitrary error as an unexpected failure.
    pub fn unexpected(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Unexpected(error.into())
    }

    pub fn is_job_failure(&self) -> bool {
        matches!(self, Self::JobFailed(_))
    }
}

/// Delegate はメッセージを 1 件処理して結果を返す
///
/// # 契約
/// - 1 メッセージにつき 1 回だけ呼ばれる（内部リトライはしない）
/// - 成功時の値は JSON object でなければならない
/// - 戻らない delegate は consumer を止める（タイムアウトは queue の visibility timeout のみ）
///
/// # 使用例
/// ```ignore
/// struct Echo;
///
/// #[async_trait]
/// impl Delegate<Job> for Echo {
///     async fn handle(&self, job: Job) -> Result<Value, DelegateError> {
///         Ok(Value::Object(job.into_data()))
///     }
/// }
/// ```
#[async_trait]
pub trait Delegate<T>: Send + Sync {
    async fn handle(&self, message: T) -> Result<Value, DelegateError>;
}

/// Adapter that turns an async closure into a `Delegate`.
pub struct FnDelegate<F> {
    f: F,
}

/// Build a delegate from `|message| async move { ... }`.
pub fn delegate_fn<T, F, Fut>(f: F) -> FnDelegate<F>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<Value, DelegateError>>,
{
    FnDelegate { f }
}

#[async_trait]
impl<T, F, Fut> Delegate<T> for FnDelegate<F>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, DelegateError>> + Send + 'static,
{
    async fn handle(&self, message: T) -> Result<Value, DelegateError> {
        (self.f)(message).await
    }
}

/// JSON type name used in `InvalidResult`.
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Job;
    use serde_json::json;

    #[tokio::test]
    async fn closure_delegate_receives_the_job() {
        let delegate = delegate_fn(|job: Job| async move { Ok(json!({"seen": job.id().as_str()})) });
        let job = Job::from_value(json!({"a": 1}), Some("abc")).unwrap();

        let out = delegate.handle(job).await.unwrap();
        assert_eq!(out, json!({"seen": "abc"}));
    }

    #[test]
    fn only_job_failures_are_terminal() {
        assert!(DelegateError::from(JobFailure::new("x")).is_job_failure());
        assert!(!DelegateError::unexpected("boom").is_job_failure());
        assert!(!DelegateError::InvalidResult("array").is_job_failure());
    }

    #[test]
    fn unexpected_errors_display_transparently() {
        let err = DelegateError::unexpected("Super error");
        assert_eq!(err.to_string(), "Super error");
    }
}
