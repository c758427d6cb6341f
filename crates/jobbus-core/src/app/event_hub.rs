//! EventHub - poll loop のイベント配信
//!
//! 購読者ごとに unbounded channel を持ち、送信に失敗した（drop 済みの）購読者は
//! emit のついでに取り除きます。購読者がいなくても tracing には必ず出ます。

use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::domain::ConsumerEvent;

/// Fan-out of `ConsumerEvent`s to any number of subscribers.
#[derive(Default)]
pub struct EventHub {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ConsumerEvent>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events emitted after this call are delivered to the returned stream.
    pub fn subscribe(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(tx);
        EventStream { rx }
    }

    pub fn emit(&self, event: ConsumerEvent) {
        trace_event(&event);

        let mut subs = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subs.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// Receiving side of a subscription. Dropping it unsubscribes.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<ConsumerEvent>,
}

impl EventStream {
    /// Next event; `None` once the emitting loop is gone.
    pub async fn recv(&mut self) -> Option<ConsumerEvent> {
        self.rx.recv().await
    }

    /// Next event if one is already buffered.
    pub fn try_recv(&mut self) -> Option<ConsumerEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Everything buffered so far.
    pub fn drain(&mut self) -> Vec<ConsumerEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

fn trace_event(event: &ConsumerEvent) {
    let kind = event.kind().as_str();
    match event {
        ConsumerEvent::Debug(msg) => tracing::debug!(event = kind, "{msg}"),
        ConsumerEvent::Info(msg) => tracing::info!(event = kind, "{msg}"),
        ConsumerEvent::Warn(msg) => tracing::warn!(event = kind, "{msg}"),
        ConsumerEvent::QueueError(err) => tracing::error!(event = kind, error = %err, "queue operation failed"),
        ConsumerEvent::DelegateError { job_id, error } => tracing::error!(
            event = kind,
            job_id = job_id.as_ref().map(|id| id.as_str()),
            error = %error,
            "message left on the queue"
        ),
        ConsumerEvent::JobSuccess { job_id, revision } => {
            tracing::info!(event = kind, job_id = %job_id, revision, "job succeeded")
        }
        ConsumerEvent::JobError {
            job_id,
            revision,
            reason,
        } => tracing::warn!(event = kind, job_id = %job_id, revision, reason = %reason, "job failed"),
        ConsumerEvent::ProcessedMessage { message_id, job_id } => tracing::debug!(
            event = kind,
            message_id = %message_id,
            job_id = job_id.as_ref().map(|id| id.as_str()),
            "message processed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EventKind;
    use crate::ports::QueueError;

    #[test]
    fn every_subscriber_sees_every_event() {
        let hub = EventHub::new();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        hub.emit(ConsumerEvent::Info("one".into()));
        hub.emit(ConsumerEvent::QueueError(QueueError::Transport("x".into())));

        let kinds = |s: &mut EventStream| s.drain().iter().map(|e| e.kind()).collect::<Vec<_>>();
        assert_eq!(kinds(&mut a), vec![EventKind::Info, EventKind::QueueError]);
        assert_eq!(kinds(&mut b), vec![EventKind::Info, EventKind::QueueError]);
    }

    #[test]
    fn dropped_subscribers_are_removed_on_emit() {
        let hub = EventHub::new();
        let keep = hub.subscribe();
        drop(hub.subscribe());
        assert_eq!(hub.subscriber_count(), 2);

        hub.emit(ConsumerEvent::Debug("x".into()));
        assert_eq!(hub.subscriber_count(), 1);
        drop(keep);
    }

    #[test]
    fn emit_without_subscribers_is_fine() {
        let hub = EventHub::new();
        hub.emit(ConsumerEvent::Warn("nobody listens".into()));
        assert_eq!(hub.subscriber_count(), 0);
    }
}
