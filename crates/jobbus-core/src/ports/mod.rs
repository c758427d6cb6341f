//! Ports - 抽象化レイヤー
//!
//! 外部システム（managed queue、時刻、ID 生成）へのインターフェース。

pub mod clock;
pub mod id_generator;
pub mod queue_client;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::queue_client::{QueueClient, QueueError, QueueMessage, ReceiveRequest};
