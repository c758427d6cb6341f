//! jobbus - demo CLI
//!
//! `demo`: in-memory queue の上で dispatcher → producer → response consumer を一周させる
//! `hash`: JSON object の job id（structural hash）を表示する

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use jobbus_core::app::{Dispatcher, Producer, ResponseConsumer};
use jobbus_core::config::{ConsumerConfig, ProducerConfig};
use jobbus_core::delegate::{Delegate, DelegateError};
use jobbus_core::domain::{Job, JobFailure, JobOutcome, JobResponse};
use jobbus_core::impls::InMemoryQueueClient;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// jobbus - job queue over a managed message queue
#[derive(Parser, Debug)]
#[command(name = "jobbus")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log filter (trace, debug, info, warn, error or an EnvFilter directive)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Publish jobs to an in-memory queue, process them and wait for every response
    Demo(DemoArgs),

    /// Print the job id derived from a JSON object
    Hash {
        /// JSON object, e.g. '{"cow":"mooo"}'
        json: String,
    },
}

#[derive(Args, Debug)]
struct DemoArgs {
    #[arg(long, env = "JOB_BUS_REQUESTS_QUEUE_URL", default_value = "jobbus-requests")]
    requests_queue_url: String,

    #[arg(long, env = "JOB_BUS_RESPONSES_QUEUE_URL", default_value = "jobbus-responses")]
    responses_queue_url: String,

    #[arg(long, env = "JOB_BUS_WAIT_TIME_SECONDS", default_value_t = 1)]
    wait_time_seconds: u32,

    #[arg(long, env = "JOB_BUS_VISIBILITY_TIMEOUT", default_value_t = 30)]
    visibility_timeout: u32,

    #[arg(long, env = "JOB_BUS_CONCURRENCY", default_value_t = 1)]
    concurrency: u32,

    /// Number of jobs to publish
    #[arg(long, default_value_t = 5)]
    jobs: u32,

    /// Fail every Nth job with an expected failure (0 = never)
    #[arg(long, default_value_t = 0)]
    fail_every: u32,

    /// Give up if not every response has arrived by then
    #[arg(long, default_value_t = 30)]
    timeout_seconds: u64,
}

#[derive(Debug, Deserialize)]
struct GreetPayload {
    name: String,
}

/// Producer 側の delegate: 挨拶を返す。`fail_every` 件ごとに失敗する
struct Greeter {
    fail_every: u32,
    seen: AtomicU32,
}

impl Greeter {
    fn new(fail_every: u32) -> Self {
        Self {
            fail_every,
            seen: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Delegate<Job> for Greeter {
    async fn handle(&self, job: Job) -> Result<Value, DelegateError> {
        let payload: GreetPayload = serde_json::from_value(Value::Object(job.into_data()))
            .map_err(|e| JobFailure::new(format!("invalid payload: {e}")))?;

        let n = self.seen.fetch_add(1, Ordering::Relaxed) + 1;
        if self.fail_every > 0 && n % self.fail_every == 0 {
            let reason = format!("intentional failure for {}", payload.name);
            return Err(JobFailure::new(reason).into());
        }

        Ok(json!({ "greeting": format!("Hello, {}!", payload.name) }))
    }
}

/// Response consumer 側の delegate: 受け取った応答を main に渡す
struct Collector {
    tx: mpsc::UnboundedSender<JobResponse>,
}

#[async_trait]
impl Delegate<JobResponse> for Collector {
    async fn handle(&self, response: JobResponse) -> Result<Value, DelegateError> {
        self.tx
            .send(response)
            .map_err(|e| DelegateError::unexpected(e.to_string()))?;
        Ok(json!({}))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Demo(args) => demo(args).await,
        Commands::Hash { json } => hash(&json),
    }
}

fn hash(json: &str) -> Result<(), Box<dyn Error>> {
    let value: Value = serde_json::from_str(json)?;
    let job = Job::from_value(value, None)?;
    println!("{}", job.id());
    Ok(())
}

async fn demo(args: DemoArgs) -> Result<(), Box<dyn Error>> {
    let requests = ConsumerConfig::builder(args.requests_queue_url.clone())
        .wait_time_seconds(args.wait_time_seconds)
        .visibility_timeout(args.visibility_timeout)
        .concurrency(args.concurrency)
        .build()?;
    let producer_config = ProducerConfig::new(requests, args.responses_queue_url.clone())?;
    let responses = ConsumerConfig::builder(args.responses_queue_url.clone())
        .wait_time_seconds(args.wait_time_seconds)
        .visibility_timeout(args.visibility_timeout)
        .build()?;

    let queue = Arc::new(InMemoryQueueClient::with_queues([
        args.requests_queue_url.clone(),
        args.responses_queue_url.clone(),
    ]));
    let dispatcher = Dispatcher::new(queue.clone(), args.requests_queue_url.clone())?;

    let producer = Producer::producer(
        producer_config,
        queue.clone(),
        Greeter::new(args.fail_every),
    );
    let (tx, mut rx) = mpsc::unbounded_channel();
    let finalizer = ResponseConsumer::new(responses, queue.clone(), Collector { tx });

    producer.start();
    finalizer.start();

    for i in 0..args.jobs {
        let job = dispatcher
            .publish_job(json!({ "name": format!("worker-{i}") }), None)
            .await?;
        tracing::info!(job_id = %job.id(), "published");
    }

    let expected = args.jobs as usize;
    let mut succeeded = 0usize;
    let mut failed = 0usize;
    let collect = async {
        while succeeded + failed < expected {
            let Some(response) = rx.recv().await else {
                break;
            };
            if response.is_success() {
                succeeded += 1;
            } else {
                failed += 1;
            }
            match &response.outcome {
                JobOutcome::Success(result) => tracing::info!(
                    job_id = %response.id,
                    result = %serde_json::Value::Object(result.clone()),
                    "job succeeded"
                ),
                JobOutcome::Error(error) => {
                    tracing::warn!(job_id = %response.id, reason = %error.reason, "job failed")
                }
            }
        }
    };

    let outcome = tokio::select! {
        done = tokio::time::timeout(Duration::from_secs(args.timeout_seconds), collect) => done.is_ok(),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
            false
        }
    };

    producer.stop_and_join().await;
    finalizer.stop_and_join().await;

    tracing::info!(succeeded, failed, expected, "demo finished");
    if !outcome {
        return Err(format!("only {} of {expected} responses arrived", succeeded + failed).into());
    }
    Ok(())
}
