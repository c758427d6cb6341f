//! IdGenerator port - queue 側の ID 生成
//!
//! In-memory queue が message id / receipt handle を払い出すときに使います。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース

use crate::domain::{MessageId, ReceiptHandle};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は queue の識別子を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数スレッドから使える）
pub trait IdGenerator: Send + Sync {
    /// Message ID を生成（send ごとに 1 つ）
    fn generate_message_id(&self) -> MessageId;

    /// Receipt handle を生成（receive ごとに 1 つ、再配送のたびに変わる）
    fn generate_receipt_handle(&self) -> ReceiptHandle;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使うので、テストで FixedClock を渡すと timestamp 部分が固定されます。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_message_id(&self) -> MessageId {
        MessageId::from_ulid(self.next_ulid())
    }

    fn generate_receipt_handle(&self) -> ReceiptHandle {
        ReceiptHandle::from_ulid(self.next_ulid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;

    #[test]
    fn message_ids_and_receipt_handles_are_distinct_ulids() {
        let ids = UlidGenerator::new(SystemClock);

        let messages: HashSet<_> = (0..100).map(|_| ids.generate_message_id()).collect();
        assert_eq!(messages.len(), 100);

        let handle = ids.generate_receipt_handle();
        assert!(Ulid::from_string(handle.as_str()).is_ok());
        assert!(!messages.iter().any(|m| m.as_str() == handle.as_str()));
    }

    #[test]
    fn ulid_generator_with_fixed_clock_shares_timestamp() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let h1 = id_gen.generate_receipt_handle();
        let h2 = id_gen.generate_receipt_handle();

        // ランダム部分があるので handle は異なる
        assert_ne!(h1, h2);

        // timestamp 部分は同じ
        let t1 = Ulid::from_string(h1.as_str()).unwrap().timestamp_ms();
        let t2 = Ulid::from_string(h2.as_str()).unwrap().timestamp_ms();
        assert_eq!(t1, t2);
        assert_eq!(t1, fixed_time.timestamp_millis() as u64);
    }
}
