//! InMemoryQueueClient - 開発・テスト用の managed queue
//!
//! # 学習ポイント
//! - tokio の Mutex + Notify による long-poll（ロックを跨いで await しない）
//! - visibility timeout: receive したメッセージは期限まで見えなくなり、
//!   delete されなければ再配送される
//! - 再配送のたびに receipt handle が変わる（古い handle での delete は失敗する）

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::domain::{MessageId, ReceiptHandle};
use crate::ports::{
    IdGenerator, QueueClient, QueueError, QueueMessage, ReceiveRequest, SystemClock,
    UlidGenerator,
};

/// Upper bound of messages returned by one receive.
const MAX_BATCH: usize = 10;

struct Stored {
    message_id: MessageId,
    body: String,
}

struct InFlight {
    message: Stored,
    visible_at: Instant,
}

#[derive(Default)]
struct QueueState {
    visible: VecDeque<Stored>,
    in_flight: HashMap<ReceiptHandle, InFlight>,
}

impl QueueState {
    /// visibility timeout が切れたメッセージを先頭に戻す
    fn reclaim_expired(&mut self, now: Instant) {
        let expired: Vec<ReceiptHandle> = self
            .in_flight
            .iter()
            .filter(|(_, entry)| entry.visible_at <= now)
            .map(|(handle, _)| handle.clone())
            .collect();

        let mut returned: Vec<InFlight> = expired
            .iter()
            .filter_map(|handle| self.in_flight.remove(handle))
            .collect();
        // 先に受け取られたものほど前へ
        returned.sort_by_key(|entry| std::cmp::Reverse(entry.visible_at));
        for entry in returned {
            self.visible.push_front(entry.message);
        }
    }

    fn next_visible_at(&self) -> Option<Instant> {
        self.in_flight.values().map(|entry| entry.visible_at).min()
    }
}

/// In-process queue with SQS-like receive/delete/send semantics.
///
/// # 使用例
/// ```ignore
/// let queue = InMemoryQueueClient::with_queues(["requests", "responses"]);
/// queue.send("requests", body).await?;
/// ```
pub struct InMemoryQueueClient<G = UlidGenerator<SystemClock>> {
    queues: Mutex<HashMap<String, QueueState>>,
    notify: Notify,
    ids: G,
}

impl InMemoryQueueClient {
    /// A client with no queues; create them with `create_queue`.
    pub fn new() -> Self {
        Self::with_id_generator(UlidGenerator::new(SystemClock))
    }

    pub fn with_queues<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let queues = urls
            .into_iter()
            .map(|url| (url.into(), QueueState::default()))
            .collect();
        Self {
            queues: Mutex::new(queues),
            notify: Notify::new(),
            ids: UlidGenerator::new(SystemClock),
        }
    }
}

impl Default for InMemoryQueueClient {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: IdGenerator> InMemoryQueueClient<G> {
    pub fn with_id_generator(ids: G) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            notify: Notify::new(),
            ids,
        }
    }

    /// Idempotent.
    pub async fn create_queue(&self, url: impl Into<String>) {
        self.queues.lock().await.entry(url.into()).or_default();
    }

    /// Messages that a receive could return right now.
    pub async fn visible_len(&self, url: &str) -> Result<usize, QueueError> {
        let mut queues = self.queues.lock().await;
        let state = Self::state_mut(&mut queues, url)?;
        state.reclaim_expired(Instant::now());
        Ok(state.visible.len())
    }

    /// Messages received but neither deleted nor expired.
    pub async fn in_flight_len(&self, url: &str) -> Result<usize, QueueError> {
        let mut queues = self.queues.lock().await;
        let state = Self::state_mut(&mut queues, url)?;
        state.reclaim_expired(Instant::now());
        Ok(state.in_flight.len())
    }

    fn state_mut<'a>(
        queues: &'a mut HashMap<String, QueueState>,
        url: &str,
    ) -> Result<&'a mut QueueState, QueueError> {
        queues
            .get_mut(url)
            .ok_or_else(|| QueueError::QueueNotFound(url.to_string()))
    }

    /// Take up to `max` visible messages and hide them for `visibility`.
    fn take(
        &self,
        state: &mut QueueState,
        max: usize,
        visibility: Duration,
        now: Instant,
    ) -> Vec<QueueMessage> {
        let mut taken = Vec::new();
        while taken.len() < max {
            let Some(stored) = state.visible.pop_front() else {
                break;
            };
            let receipt_handle = self.ids.generate_receipt_handle();
            taken.push(QueueMessage {
                message_id: stored.message_id.clone(),
                receipt_handle: receipt_handle.clone(),
                body: stored.body.clone(),
            });
            state.in_flight.insert(
                receipt_handle,
                InFlight {
                    message: stored,
                    visible_at: now + visibility,
                },
            );
        }
        taken
    }
}

#[async_trait]
impl<G: IdGenerator> QueueClient for InMemoryQueueClient<G> {
    async fn receive(&self, request: ReceiveRequest) -> Result<Vec<QueueMessage>, QueueError> {
        let max = (request.max_messages as usize).clamp(1, MAX_BATCH);
        let visibility = Duration::from_secs(u64::from(request.visibility_timeout));
        let deadline = Instant::now() + Duration::from_secs(u64::from(request.wait_time_seconds));

        loop {
            // 取り逃しを防ぐため、状態を見る前に通知を登録しておく
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next_visible_at = {
                let mut queues = self.queues.lock().await;
                let state = Self::state_mut(&mut queues, &request.queue_url)?;
                let now = Instant::now();
                state.reclaim_expired(now);

                let taken = self.take(state, max, visibility, now);
                if !taken.is_empty() {
                    return Ok(taken);
                }
                state.next_visible_at()
            };

            if Instant::now() >= deadline {
                return Ok(Vec::new());
            }
            let wake_at = next_visible_at.map_or(deadline, |at| at.min(deadline));

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn delete(
        &self,
        queue_url: &str,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), QueueError> {
        let mut queues = self.queues.lock().await;
        let state = Self::state_mut(&mut queues, queue_url)?;
        state.reclaim_expired(Instant::now());

        match state.in_flight.remove(receipt_handle) {
            Some(_) => Ok(()),
            None => Err(QueueError::InvalidReceiptHandle(
                receipt_handle.as_str().to_string(),
            )),
        }
    }

    async fn send(&self, queue_url: &str, body: String) -> Result<MessageId, QueueError> {
        let message_id = self.ids.generate_message_id();
        {
            let mut queues = self.queues.lock().await;
            let state = Self::state_mut(&mut queues, queue_url)?;
            state.visible.push_back(Stored {
                message_id: message_id.clone(),
                body,
            });
        }
        self.notify.notify_waiters();
        Ok(message_id)
    }
}
