//! jobbus-core
//!
//! Job queue on top of a managed message queue: a dispatcher publishes jobs,
//! consumers / producers poll, process and acknowledge them, and a response
//! consumer observes the results.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, job, envelope, events, errors, hash）
//! - **ports**: 抽象化レイヤー（QueueClient, Clock, IdGenerator）
//! - **codec**: envelope の encode / decode と検証
//! - **delegate**: 呼び出し側のジョブ処理関数
//! - **config**: consumer / producer の設定
//! - **app**: PollLoop, AckPolicy, EventHub, Dispatcher
//! - **impls**: InMemoryQueueClient

pub mod app;
pub mod codec;
pub mod config;
pub mod delegate;
pub mod domain;
pub mod impls;
pub mod ports;

#[cfg(test)]
pub(crate) mod testing;

pub use app::{Consumer, Dispatcher, Producer, ResponseConsumer};
pub use config::{ConsumerConfig, ProducerConfig};
pub use delegate::{Delegate, DelegateError, delegate_fn};
pub use domain::{ConsumerEvent, EventKind, Job, JobBusError, JobFailure, JobId, JobResponse};
