//! PollLoop - receive → validate → invoke → acknowledge を繰り返すループ
//!
//! # フロー
//! 1. `QueueClient::receive` で最大 1 件を long-poll（stop と select で競合させる）
//! 2. `Inbound::decode` で envelope を検証
//! 3. `Delegate::handle` を 1 回だけ呼ぶ
//! 4. `AckPolicy::decide` で Decision を作り、ここで実行する（delete / send / retain）
//! 5. `processed-message` を発行して次の poll へ
//!
//! 1 インスタンスにつき in-flight のメッセージは常に 1 件まで。

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::event_hub::{EventHub, EventStream};
use super::policy::{AckPolicy, Decision, DeleteOnly, PublishResponse};
use crate::codec::{Inbound, JobCodec};
use crate::config::{ConsumerConfig, ProducerConfig};
use crate::delegate::{Delegate, DelegateError, json_type_name};
use crate::domain::{ConsumerEvent, Job, JobId, JobOutcome, JsonObject};
use crate::ports::{Clock, QueueClient, QueueMessage, ReceiveRequest, SystemClock};

/// Lifecycle state of a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Polling,
    Processing,
}

/// What one cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The loop is stopped (or was stopped during receive); no message was taken.
    Disabled,
    /// The receive returned no messages.
    Empty,
    /// The receive failed; a `queue-error` was emitted.
    ReceiveFailed,
    /// One message went through a full cycle.
    Processed,
}

/// Long-running consumer of one queue.
///
/// `P` decides what happens to a message once the delegate has run:
/// `DeleteOnly` for plain consumers, `PublishResponse` for producers.
///
/// # 使用例
/// ```ignore
/// let consumer = Consumer::new(config, queue, delegate_fn(|job: Job| async move {
///     Ok(json!({"done": job.id().as_str()}))
/// }));
/// let mut events = consumer.subscribe();
/// consumer.start();
/// ```
pub struct PollLoop<T, P = DeleteOnly> {
    engine: Arc<Engine<T, P>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct Engine<T, P> {
    config: ConsumerConfig,
    queue: Arc<dyn QueueClient>,
    delegate: Arc<dyn Delegate<T>>,
    policy: P,
    clock: Arc<dyn Clock>,
    events: EventHub,
    enabled: watch::Sender<bool>,
    state: watch::Sender<LoopState>,
    /// Held for a whole cycle: no second receive while a message is in flight.
    in_flight: tokio::sync::Mutex<()>,
}

impl<T: Inbound> PollLoop<T, DeleteOnly> {
    /// Consumer that deletes a message once its delegate succeeds.
    pub fn new<D>(config: ConsumerConfig, queue: Arc<dyn QueueClient>, delegate: D) -> Self
    where
        D: Delegate<T> + 'static,
    {
        Self::with_policy(config, queue, delegate, DeleteOnly, Arc::new(SystemClock))
    }
}

impl PollLoop<Job, PublishResponse> {
    /// Consumer of the request queue that answers on the response queue.
    pub fn producer<D>(config: ProducerConfig, queue: Arc<dyn QueueClient>, delegate: D) -> Self
    where
        D: Delegate<Job> + 'static,
    {
        let policy = PublishResponse::new(config.response_queue_url());
        Self::with_policy(
            config.requests().clone(),
            queue,
            delegate,
            policy,
            Arc::new(SystemClock),
        )
    }
}

impl<T: Inbound, P: AckPolicy> PollLoop<T, P> {
    pub fn with_policy<D>(
        config: ConsumerConfig,
        queue: Arc<dyn QueueClient>,
        delegate: D,
        policy: P,
        clock: Arc<dyn Clock>,
    ) -> Self
    where
        D: Delegate<T> + 'static,
    {
        let (enabled, _) = watch::channel(false);
        let (state, _) = watch::channel(LoopState::Stopped);

        Self {
            engine: Arc::new(Engine {
                config,
                queue,
                delegate: Arc::new(delegate),
                policy,
                clock,
                events: EventHub::new(),
                enabled,
                state,
                in_flight: tokio::sync::Mutex::new(()),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Start polling on a background task. Must be called inside a tokio runtime.
    ///
    /// Calling it while running only emits a `debug` event.
    pub fn start(&self) {
        let started = self.engine.enabled.send_if_modified(|on| {
            if *on {
                false
            } else {
                *on = true;
                true
            }
        });
        if !started {
            self.engine
                .events
                .emit(ConsumerEvent::Debug("already started".to_string()));
            return;
        }
        self.engine.state.send_replace(LoopState::Polling);

        let mut worker = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // 直前の run がまだ cycle の途中なら、それが終わってから走る
        let previous = worker.take();
        let engine = Arc::clone(&self.engine);
        *worker = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            engine.run().await;
        }));
    }

    /// Request a cooperative stop. The in-flight cycle completes; a pending
    /// long-poll is abandoned.
    pub fn stop(&self) {
        self.engine.enabled.send_replace(false);
    }

    /// Stop and wait until the background task has exited.
    pub async fn stop_and_join(&self) {
        self.stop();
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Run a single cycle on the caller's task.
    ///
    /// While stopped this emits `warn` and touches nothing.
    pub async fn poll_once(&self) -> PollOutcome {
        let mut enabled = self.engine.enabled.subscribe();
        let on = *enabled.borrow_and_update();
        if !on {
            self.engine.events.emit(ConsumerEvent::Warn(
                "poll called while stopped".to_string(),
            ));
            return PollOutcome::Disabled;
        }
        self.engine.cycle(&mut enabled).await
    }

    pub fn is_enabled(&self) -> bool {
        *self.engine.enabled.borrow()
    }

    pub fn state(&self) -> LoopState {
        *self.engine.state.borrow()
    }

    pub fn subscribe(&self) -> EventStream {
        self.engine.events.subscribe()
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.engine.config
    }
}

impl<T, P> Drop for PollLoop<T, P> {
    fn drop(&mut self) {
        self.engine.enabled.send_replace(false);
    }
}

impl<T: Inbound, P: AckPolicy> Engine<T, P> {
    async fn run(self: Arc<Self>) {
        let mut enabled = self.enabled.subscribe();
        if !*enabled.borrow_and_update() {
            // start() の直後に stop() された
            self.state.send_replace(LoopState::Stopped);
            return;
        }
        self.events.emit(ConsumerEvent::Info(format!(
            "polling {}",
            self.config.queue_url()
        )));

        loop {
            match self.cycle(&mut enabled).await {
                PollOutcome::Disabled => break,
                PollOutcome::Empty => tokio::task::yield_now().await,
                PollOutcome::ReceiveFailed => {
                    let backoff = self.config.error_backoff();
                    if !backoff.is_zero() {
                        tokio::select! {
                            _ = until_disabled(&mut enabled) => {}
                            _ = tokio::time::sleep(backoff) => {}
                        }
                    }
                }
                PollOutcome::Processed => {}
            }
        }

        self.state.send_replace(LoopState::Stopped);
        self.events.emit(ConsumerEvent::Info(format!(
            "stopped polling {}",
            self.config.queue_url()
        )));
    }

    async fn cycle(&self, enabled: &mut watch::Receiver<bool>) -> PollOutcome {
        let _in_flight = self.in_flight.lock().await;

        let on = *enabled.borrow_and_update();
        if !on {
            return PollOutcome::Disabled;
        }
        self.state.send_replace(LoopState::Polling);

        let request = ReceiveRequest {
            queue_url: self.config.queue_url().to_string(),
            max_messages: 1,
            wait_time_seconds: self.config.wait_time_seconds(),
            visibility_timeout: self.config.visibility_timeout(),
        };

        let received = tokio::select! {
            biased;
            _ = until_disabled(enabled) => return PollOutcome::Disabled,
            received = self.queue.receive(request) => received,
        };

        let mut messages = match received {
            Ok(messages) => messages.into_iter(),
            Err(err) => {
                self.events.emit(ConsumerEvent::QueueError(err));
                return PollOutcome::ReceiveFailed;
            }
        };

        let Some(message) = messages.next() else {
            return PollOutcome::Empty;
        };
        let extra = messages.len();
        if extra > 0 {
            self.events.emit(ConsumerEvent::Debug(format!(
                "received {extra} extra message(s); they stay hidden until their visibility timeout"
            )));
        }

        self.state.send_replace(LoopState::Processing);
        self.process(message).await;
        self.state.send_replace(LoopState::Polling);

        PollOutcome::Processed
    }

    async fn process(&self, message: QueueMessage) {
        let job_id = match T::decode(&message.body) {
            Ok(inbound) => {
                let job_id = inbound.job_id().clone();
                let outcome = self.invoke(inbound).await;
                self.acknowledge(&message, &job_id, outcome).await;
                Some(job_id)
            }
            Err(err) => {
                self.events.emit(ConsumerEvent::DelegateError {
                    job_id: None,
                    error: Arc::new(DelegateError::InvalidMessage(err)),
                });
                None
            }
        };

        self.events.emit(ConsumerEvent::ProcessedMessage {
            message_id: message.message_id,
            job_id,
        });
    }

    async fn invoke(&self, inbound: T) -> Result<JsonObject, DelegateError> {
        match self.delegate.handle(inbound).await? {
            Value::Object(result) => Ok(result),
            other => Err(DelegateError::InvalidResult(json_type_name(&other))),
        }
    }

    async fn acknowledge(
        &self,
        message: &QueueMessage,
        job_id: &JobId,
        outcome: Result<JsonObject, DelegateError>,
    ) {
        match self.policy.decide(job_id, outcome, self.clock.now()) {
            Decision::Delete => {
                self.delete(message).await;
            }
            Decision::Retain(error) => {
                self.events.emit(ConsumerEvent::DelegateError {
                    job_id: Some(job_id.clone()),
                    error: Arc::new(error),
                });
            }
            Decision::Publish {
                queue_url,
                response,
            } => {
                let body = match JobCodec::encode_response(&response) {
                    Ok(body) => body,
                    Err(err) => {
                        self.events.emit(ConsumerEvent::DelegateError {
                            job_id: Some(job_id.clone()),
                            error: Arc::new(DelegateError::unexpected(err)),
                        });
                        return;
                    }
                };
                if let Err(err) = self.queue.send(&queue_url, body).await {
                    // 応答を送れていないので request は残して再配送させる
                    self.events.emit(ConsumerEvent::QueueError(err));
                    return;
                }
                self.delete(message).await;

                let revision = response.revision;
                let event = match response.outcome {
                    JobOutcome::Success(_) => ConsumerEvent::JobSuccess {
                        job_id: response.id,
                        revision,
                    },
                    JobOutcome::Error(body) => ConsumerEvent::JobError {
                        job_id: response.id,
                        revision,
                        reason: body.reason,
                    },
                };
                self.events.emit(event);
            }
        }
    }

    async fn delete(&self, message: &QueueMessage) {
        if let Err(err) = self
            .queue
            .delete(self.config.queue_url(), &message.receipt_handle)
            .await
        {
            self.events.emit(ConsumerEvent::QueueError(err));
        }
    }
}

/// Resolves once `enabled` turns false.
async fn until_disabled(enabled: &mut watch::Receiver<bool>) {
    // Err は sender（Engine）が消えたときだけ
    let _ = enabled.wait_for(|on| !*on).await;
}
