//! QueueClient port - マネージドなメッセージキュー（SQS 互換）
//!
//! Poll loop / dispatcher が使う 3 操作だけを抽象化します。
//! ネットワークのリトライや認証は実装側の責務です。

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{MessageId, ReceiptHandle};

/// Transport-level failure of a queue operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("queue does not exist: {0}")]
    QueueNotFound(String),

    #[error("receipt handle is not valid: {0}")]
    InvalidReceiptHandle(String),

    #[error("{0}")]
    Transport(String),
}

/// Parameters of one long-poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveRequest {
    pub queue_url: String,
    pub max_messages: u32,
    pub wait_time_seconds: u32,
    pub visibility_timeout: u32,
}

/// A received message. Between receive and delete (or visibility expiry) the
/// queue keeps it hidden from other receivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: MessageId,
    pub receipt_handle: ReceiptHandle,
    pub body: String,
}

/// QueueClient は managed queue への接続
///
/// # 設計原則
/// - receive は最大 `wait_time_seconds` までブロックしてよい（long polling）
/// - 空の結果は正常系（`Ok(vec![])`）
/// - `Send + Sync`（複数の consumer で共有できる）
#[async_trait]
pub trait QueueClient: Send + Sync {
    async fn receive(&self, request: ReceiveRequest) -> Result<Vec<QueueMessage>, QueueError>;

    async fn delete(&self, queue_url: &str, receipt_handle: &ReceiptHandle)
    -> Result<(), QueueError>;

    async fn send(&self, queue_url: &str, body: String) -> Result<MessageId, QueueError>;
}
