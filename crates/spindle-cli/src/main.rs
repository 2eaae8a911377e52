use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use spindle_core::impls::{InMemoryBroker, InMemoryResultBackend};
use spindle_core::{
    Configuration, Dependencies, Handler, Injectable, LogExtension, Task, TaskError,
    TaskRegistry, WorkerBuilder,
};

#[derive(Parser)]
/// demo worker running against the in-memory broker
struct Args {
    #[clap(subcommand)]
    /// command to run
    command: Mode,

    #[arg(long, default_value_t = false)]
    /// run with debug level tracing
    debug: bool,
}

#[derive(Clone, Subcommand)]
enum Mode {
    /// print the default configuration as json
    Config,

    /// enqueue sample tasks and run a worker until interrupted
    Run {
        #[arg(short, long, default_value_t = 4)]
        /// how many tasks to execute concurrently
        concurrency: usize,

        #[arg(short, long, default_value_t = 10)]
        /// how many sample tasks to enqueue before starting
        tasks: u32,

        #[arg(long, default_value_t = 10)]
        /// seconds to wait for in-flight tasks when stopping
        shutdown_deadline: u64,

        #[arg(long)]
        /// stop by itself after this many seconds instead of waiting for a signal
        run_for: Option<u64>,
    },
}

// ---- sample tasks ----

#[derive(Debug, Serialize, Deserialize)]
struct Greet {
    name: String,
}

impl Task for Greet {
    const NAME: &'static str = "demo.greet";
    const PARAMS: &'static [&'static str] = &["name"];
    type Output = String;
}

/// Greets, then schedules a follow-up sum through the shared publisher.
struct Greeter;

#[async_trait]
impl Handler<Greet> for Greeter {
    const INJECT: &'static [Injectable] = &[Injectable::ExecutionContext];

    async fn handle(&self, task: Greet, deps: Dependencies) -> Result<String, TaskError> {
        let ctx = deps.context()?;
        let len = task.name.len() as i64;
        ctx.publisher
            .enqueue(&Sum { a: len, b: 1 })
            .await
            .map_err(|e| TaskError::with_source("follow-up enqueue failed", e))?;
        Ok(format!("Hello, {}!", task.name))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Sum {
    a: i64,
    b: i64,
}

impl Task for Sum {
    const NAME: &'static str = "demo.sum";
    const PARAMS: &'static [&'static str] = &["a", "b"];
    type Output = i64;
}

struct Summer;

#[async_trait]
impl Handler<Sum> for Summer {
    async fn handle(&self, task: Sum, _deps: Dependencies) -> Result<i64, TaskError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(task.a + task.b)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Unreliable {
    id: u32,
}

impl Task for Unreliable {
    const NAME: &'static str = "demo.unreliable";
    type Output = ();
}

/// Fails for every third id; those messages stay unacknowledged.
struct Coin;

#[async_trait]
impl Handler<Unreliable> for Coin {
    async fn handle(&self, task: Unreliable, _deps: Dependencies) -> Result<(), TaskError> {
        if task.id % 3 == 0 {
            return Err(TaskError::new(format!("unlucky id {}", task.id)));
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .compact()
        .with_max_level(if args.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    match args.command {
        Mode::Config => {
            println!("{}", serde_json::to_string_pretty(&Configuration::default())?);
        }
        Mode::Run {
            concurrency,
            tasks,
            shutdown_deadline,
            run_for,
        } => {
            let mut config = Configuration::default();
            config.worker.concurrency = concurrency;
            config.task.shutdown_deadline = Duration::from_secs(shutdown_deadline);

            let mut registry = TaskRegistry::new();
            registry.register::<Greet, _>(Greeter)?;
            registry.register::<Sum, _>(Summer)?;
            registry.register::<Unreliable, _>(Coin)?;

            let broker = Arc::new(InMemoryBroker::new());
            let worker = Arc::new(
                WorkerBuilder::new(broker.clone(), registry)
                    .configuration(config)
                    .result_backend(Arc::new(InMemoryResultBackend::new()))
                    .extension(Arc::new(LogExtension::new()))
                    .expect_tasks(&[Greet::NAME, Sum::NAME, Unreliable::NAME])
                    .build()?,
            );

            let publisher = worker.publisher();
            for i in 0..tasks {
                publisher
                    .enqueue(&Greet {
                        name: format!("guest-{i}"),
                    })
                    .await?;
                publisher.enqueue(&Unreliable { id: i }).await?;
            }
            tracing::info!(tasks = tasks * 2, "sample tasks enqueued");

            if let Some(secs) = run_for {
                let stop = worker.stop_token();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(secs)).await;
                    stop.cancel();
                });
            }

            worker.run().await?;
            println!(
                "acked {} messages, {} left unacknowledged",
                broker.acked_count(),
                broker.pending_len().await
            );
        }
    }

    Ok(())
}
