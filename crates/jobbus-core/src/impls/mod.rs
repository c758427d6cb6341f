//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryQueueClient**: visibility timeout 付きの in-process queue
//!
//! 本番の queue（SQS など）への adapter はこのクレートの外に置きます。

pub mod inmem_queue;

pub use self::inmem_queue::InMemoryQueueClient;
