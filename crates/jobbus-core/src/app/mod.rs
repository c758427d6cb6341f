//! App - アプリケーション層
//!
//! ports を組み合わせて consumer / producer / dispatcher を組み立てます。
//!
//! # 主要コンポーネント
//! - **PollLoop**: receive → validate → invoke → acknowledge のループ本体
//! - **AckPolicy**: delegate の結果からの Decision（delete / publish / retain）
//! - **EventHub**: イベントの購読と tracing への出力
//! - **Dispatcher**: request queue への publish

pub mod dispatcher;
pub mod event_hub;
pub mod poll_loop;
pub mod policy;

pub use self::dispatcher::Dispatcher;
pub use self::event_hub::{EventHub, EventStream};
pub use self::poll_loop::{LoopState, PollLoop, PollOutcome};
pub use self::policy::{AckPolicy, Decision, DeleteOnly, PublishResponse};

use crate::domain::{Job, JobResponse};

/// Consumes jobs and deletes them on success.
pub type Consumer = PollLoop<Job, DeleteOnly>;

/// Consumes jobs and publishes a response for each completed one.
pub type Producer = PollLoop<Job, PublishResponse>;

/// Consumes the responses a `Producer` publishes.
pub type ResponseConsumer = PollLoop<JobResponse, DeleteOnly>;
