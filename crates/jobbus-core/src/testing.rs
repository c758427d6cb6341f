//! Test doubles.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::domain::{MessageId, ReceiptHandle};
use crate::ports::{QueueClient, QueueError, QueueMessage, ReceiveRequest};

/// One recorded queue operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Receive(ReceiveRequest),
    Delete {
        queue_url: String,
        receipt_handle: ReceiptHandle,
    },
    Send {
        queue_url: String,
        body: String,
    },
}

/// Queue client that replays scripted receive results and records every call.
///
/// Once the script is exhausted `receive` never returns, like a long-poll on
/// an empty queue; the poll loop abandons it on stop.
#[derive(Default)]
pub(crate) struct ScriptedQueue {
    inner: Mutex<Script>,
    called: Notify,
}

#[derive(Default)]
struct Script {
    receives: VecDeque<Result<Vec<QueueMessage>, QueueError>>,
    send_error: Option<QueueError>,
    delete_error: Option<QueueError>,
    calls: Vec<Call>,
    next_id: u64,
}

impl ScriptedQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A message with fresh ids, not yet scripted.
    pub(crate) fn message(&self, body: impl Into<String>) -> QueueMessage {
        let mut script = self.lock();
        script.next_id += 1;
        let n = script.next_id;
        QueueMessage {
            message_id: MessageId::new_unchecked(format!("m-{n}")),
            receipt_handle: ReceiptHandle::new_unchecked(format!("r-{n}")),
            body: body.into(),
        }
    }

    /// Script a receive that returns one message with `body`.
    pub(crate) fn push_message(&self, body: impl Into<String>) -> QueueMessage {
        let message = self.message(body);
        self.push_receive(Ok(vec![message.clone()]));
        message
    }

    pub(crate) fn push_receive(&self, result: Result<Vec<QueueMessage>, QueueError>) {
        self.lock().receives.push_back(result);
    }

    pub(crate) fn fail_sends(&self, error: QueueError) {
        self.lock().send_error = Some(error);
    }

    pub(crate) fn fail_deletes(&self, error: QueueError) {
        self.lock().delete_error = Some(error);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub(crate) fn receive_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Receive(_)))
    }

    pub(crate) fn delete_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Delete { .. }))
    }

    pub(crate) fn send_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Send { .. }))
    }

    pub(crate) fn sent_bodies(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Send { body, .. } => Some(body.clone()),
                _ => None,
            })
            .collect()
    }

    /// Wait until at least `n` receives have been issued.
    pub(crate) async fn wait_for_receives(&self, n: usize) {
        let wait = async {
            loop {
                let notified = self.called.notified();
                if self.receive_count() >= n {
                    return;
                }
                notified.await;
            }
        };
        if tokio::time::timeout(std::time::Duration::from_secs(5), wait)
            .await
            .is_err()
        {
            panic!("timed out waiting for {n} receive(s)");
        }
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: Call) {
        self.lock().calls.push(call);
        self.called.notify_waiters();
    }
}

#[async_trait]
impl QueueClient for ScriptedQueue {
    async fn receive(&self, request: ReceiveRequest) -> Result<Vec<QueueMessage>, QueueError> {
        self.record(Call::Receive(request));
        let next = self.lock().receives.pop_front();
        match next {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }

    async fn delete(
        &self,
        queue_url: &str,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), QueueError> {
        self.record(Call::Delete {
            queue_url: queue_url.to_string(),
            receipt_handle: receipt_handle.clone(),
        });
        match self.lock().delete_error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn send(&self, queue_url: &str, body: String) -> Result<MessageId, QueueError> {
        self.record(Call::Send {
            queue_url: queue_url.to_string(),
            body,
        });
        let mut script = self.lock();
        if let Some(err) = script.send_error.clone() {
            return Err(err);
        }
        script.next_id += 1;
        Ok(MessageId::new_unchecked(format!("sent-{}", script.next_id)))
    }
}
