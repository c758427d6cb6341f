//! Domain identifiers (strongly-typed IDs).
//!
//! Job id、message id、receipt handle はどれも「空でない文字列」ですが、
//! 混同すると delete に job id を渡すようなバグになるので型で分けます。
//!
//! ## Phantom Type パターン
//! `Id<T>` で共通実装を提供し、`T` はコンパイル時だけ使うマーカー型です。

use std::fmt;
use std::marker::PhantomData;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use ulid::Ulid;

use super::errors::JobBusError;

/// IdMarker は各 ID 型のマーカー trait
pub trait IdMarker: Send + Sync + 'static {
    /// エラーメッセージで使う名前（例: "job id"）
    fn name() -> &'static str;
}

/// ジェネリック ID 型
///
/// The wrapped value is never empty: every constructor either validates its
/// input or produces a non-empty value itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id<T: IdMarker> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// Validate and wrap a caller-supplied value.
    pub fn parse(value: impl Into<String>) -> Result<Self, JobBusError> {
        let value = value.into();
        if value.is_empty() {
            return Err(JobBusError::InvalidArgument(format!(
                "{} must be a non-empty string",
                T::name()
            )));
        }
        Ok(Self::new_unchecked(value))
    }

    /// ULID から Id を作成
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self::new_unchecked(ulid.to_string())
    }

    pub(crate) fn new_unchecked(value: String) -> Self {
        debug_assert!(!value.is_empty());
        Self {
            value,
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_string(self) -> String {
        self.value
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl<T: IdMarker> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

impl<'de, T: IdMarker> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::parse(value).map_err(de::Error::custom)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Job のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Job {}

impl IdMarker for Job {
    fn name() -> &'static str {
        "job id"
    }
}

/// Queue message のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Message {}

impl IdMarker for Message {
    fn name() -> &'static str {
        "message id"
    }
}

/// Receipt handle のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Receipt {}

impl IdMarker for Receipt {
    fn name() -> &'static str {
        "receipt handle"
    }
}

/// Identifier of a Job (caller-supplied or content hash).
pub type JobId = Id<Job>;

/// Identifier the queue assigns to a message when it is sent.
pub type MessageId = Id<Message>;

/// Opaque token proving one particular receive of a message; required to delete it.
pub type ReceiptHandle = Id<Receipt>;
