//! Worker - intake / executor / lease / maintenance を束ねて動かす
//!
//! # 構成
//! ```text
//!  broker.read ─► intake ─► [dispatch channel (bounded)] ─► executor × N
//!                                                              │
//!                         lease renewal ◄── in-flight registry ◄┘
//! ```
//!
//! # 停止
//! 1. stop token を cancel（何度呼んでもよい）
//! 2. intake が抜けて channel が閉じる、executor は残りを捌いて抜ける
//! 3. `shutdown_deadline` まで待つ、過ぎたら残りを abort
//! 4. `broker.close()`

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::{self, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use super::context::ExecutionContext;
use super::executor::Executor;
use super::inflight::InFlightRegistry;
use super::publisher::Publisher;
use super::{intake, lease, signals};
use crate::error::WorkerError;

type Tracked = (&'static str, Result<(), WorkerError>);

/// Names of the tracked tasks, for reporting panics.
type Names = HashMap<task::Id, String>;

pub struct Worker {
    executor: Executor,
    stop: CancellationToken,
}

impl Worker {
    pub(crate) fn new(executor: Executor) -> Self {
        Self {
            executor,
            stop: CancellationToken::new(),
        }
    }

    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.executor.context
    }

    pub fn publisher(&self) -> &Publisher {
        &self.executor.context.publisher
    }

    pub fn inflight(&self) -> &InFlightRegistry {
        &self.executor.inflight
    }

    /// Request shutdown. Idempotent; `run()` returns once draining is done.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Run until stopped or until a fatal error.
    ///
    /// A task failure is never fatal. Broker errors, result-backend errors,
    /// hook errors and panics are: the first one is returned after shutdown.
    pub async fn run(&self) -> Result<(), WorkerError> {
        let ctx = &self.executor.context;
        let cfg = Arc::clone(&ctx.configuration);
        let broker = Arc::clone(&ctx.broker);

        if let Err(e) = broker.start().await {
            broker.close().await;
            return Err(e.into());
        }

        tracing::info!(
            concurrency = cfg.worker.concurrency,
            dispatch_capacity = cfg.dispatch_capacity(),
            tasks = ?ctx.tasks.names(),
            "worker started"
        );

        let (tx, rx) = mpsc::channel(cfg.dispatch_capacity());
        let rx = Arc::new(Mutex::new(rx));
        let mut set: JoinSet<Tracked> = JoinSet::new();
        let mut names = Names::new();

        {
            let broker = Arc::clone(&broker);
            let stop = self.stop.clone();
            let cfg = Arc::clone(&cfg);
            let handle = set.spawn(async move {
                let res = broker.run_worker_maintenance_tasks(stop, &cfg).await;
                ("maintenance", res.map_err(WorkerError::from))
            });
            names.insert(handle.id(), "maintenance".to_string());
        }
        {
            let res = lease::run(
                Arc::clone(&broker),
                self.executor.inflight.clone(),
                cfg.task.healthcheck_interval,
                self.stop.clone(),
            );
            let handle = set.spawn(async move { ("lease", res.await.map_err(WorkerError::from)) });
            names.insert(handle.id(), "lease".to_string());
        }
        for id in 0..cfg.worker.concurrency {
            let res = self.executor.clone().run(id, Arc::clone(&rx));
            let handle = set.spawn(async move { ("executor", res.await) });
            names.insert(handle.id(), format!("executor-{id}"));
        }
        drop(rx);
        {
            let res = intake::run(
                Arc::clone(&broker),
                tx,
                self.stop.clone(),
                cfg.task.max_delivery_attempts,
            );
            let handle = set.spawn(async move { ("intake", res.await.map_err(WorkerError::from)) });
            names.insert(handle.id(), "intake".to_string());
        }

        let watcher = cfg
            .worker
            .handle_signals
            .then(|| tokio::spawn(signals::watch(self.stop.clone())));

        let mut failure: Option<WorkerError> = None;

        // supervise until stop fires or something fails
        loop {
            tokio::select! {
                _ = self.stop.cancelled() => break,
                joined = set.join_next() => match joined {
                    None => break,
                    Some(joined) => {
                        if settle(&mut failure, &names, joined) {
                            self.stop.cancel();
                            break;
                        }
                    }
                }
            }
        }

        self.stop.cancel();
        tracing::info!(in_flight = self.executor.inflight.len(), "worker stopping");

        let drained = tokio::time::timeout(cfg.task.shutdown_deadline, async {
            while let Some(joined) = set.join_next().await {
                settle(&mut failure, &names, joined);
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                remaining = set.len(),
                deadline = ?cfg.task.shutdown_deadline,
                "shutdown deadline exceeded, cancelling remaining work"
            );
            set.abort_all();
            while let Some(joined) = set.join_next().await {
                settle(&mut failure, &names, joined);
            }
        }

        if let Some(watcher) = watcher {
            watcher.abort();
        }
        broker.close().await;

        match failure {
            Some(e) => {
                tracing::error!(kind = e.as_label(), "worker stopped: {e}");
                Err(e)
            }
            None => {
                tracing::info!("worker stopped");
                Ok(())
            }
        }
    }
}

/// Record the outcome of a tracked task. Returns `true` if it was fatal.
fn settle(
    failure: &mut Option<WorkerError>,
    names: &Names,
    joined: Result<Tracked, JoinError>,
) -> bool {
    let err = match joined {
        Ok((_, Ok(()))) => return false,
        Ok((name, Err(e))) => {
            tracing::error!(task = name, kind = e.as_label(), "background task failed: {e}");
            e
        }
        Err(e) if e.is_cancelled() => return false,
        Err(e) => {
            let name = names
                .get(&e.id())
                .cloned()
                .unwrap_or_else(|| "unnamed task".to_string());
            let err = WorkerError::Panicked {
                name,
                message: panic_message(e.into_panic()),
            };
            tracing::error!(kind = err.as_label(), "{err}");
            err
        }
    };
    if failure.is_none() {
        *failure = Some(err);
    }
    true
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::WorkerBuilder;
    use crate::config::Configuration;
    use crate::impls::InMemoryBroker;
    use crate::ports::Broker;
    use crate::testing::{self, AddTask, SleepTask};
    use std::time::{Duration, Instant};

    fn quick_config() -> Configuration {
        let mut cfg = Configuration::default();
        cfg.worker.handle_signals = false;
        cfg.worker.concurrency = 2;
        cfg.task.healthcheck_interval = Duration::from_millis(20);
        cfg.task.shutdown_deadline = Duration::from_millis(300);
        cfg
    }

    async fn wait_until<F: Fn() -> bool>(cond: F) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn start_and_close_wrap_the_run() {
        let broker = Arc::new(InMemoryBroker::new());
        let worker = WorkerBuilder::new(broker.clone(), testing::registry())
            .configuration(quick_config())
            .build()
            .unwrap();

        worker.stop();
        worker.run().await.unwrap();
        assert!(broker.is_started());
        assert!(broker.is_closed());
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let broker = Arc::new(InMemoryBroker::new());
        let worker = Arc::new(
            WorkerBuilder::new(broker, testing::registry())
                .configuration(quick_config())
                .build()
                .unwrap(),
        );
        let w = worker.clone();
        let handle = tokio::spawn(async move { w.run().await });

        worker.stop();
        worker.stop();
        handle.await.unwrap().unwrap();
        worker.stop();
    }

    #[tokio::test]
    async fn published_tasks_are_executed_and_acked() {
        let broker = Arc::new(InMemoryBroker::new());
        let worker = Arc::new(
            WorkerBuilder::new(broker.clone(), testing::registry())
                .configuration(quick_config())
                .build()
                .unwrap(),
        );
        for i in 0..5 {
            worker.publisher().enqueue(&AddTask { a: i, b: i }).await.unwrap();
        }

        let w = worker.clone();
        let handle = tokio::spawn(async move { w.run().await });

        let watched = broker.clone();
        wait_until(move || watched.acked_count() == 5).await;
        assert!(worker.inflight().is_empty());

        worker.stop();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn slow_tasks_are_cancelled_at_the_deadline() {
        let broker = Arc::new(InMemoryBroker::new());
        let worker = Arc::new(
            WorkerBuilder::new(broker.clone(), testing::registry())
                .configuration(quick_config())
                .build()
                .unwrap(),
        );
        worker
            .publisher()
            .enqueue(&SleepTask { millis: 60_000 })
            .await
            .unwrap();

        let w = worker.clone();
        let handle = tokio::spawn(async move { w.run().await });
        let inflight = worker.inflight().clone();
        wait_until(move || inflight.len() == 1).await;

        let started = Instant::now();
        worker.stop();
        handle.await.unwrap().unwrap();

        assert!(started.elapsed() < Duration::from_millis(300 + 500));
        assert!(worker.inflight().is_empty());
        assert!(broker.acked().await.is_empty());
        assert!(broker.is_closed());
    }

    #[tokio::test]
    async fn broker_failure_stops_the_worker() {
        let broker = Arc::new(InMemoryBroker::new());
        let worker = WorkerBuilder::new(broker.clone(), testing::registry())
            .configuration(quick_config())
            .build()
            .unwrap();

        broker.close().await;
        let err = tokio::time::timeout(Duration::from_secs(2), worker.run())
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, WorkerError::Broker(_)));
    }

    #[tokio::test]
    async fn panic_is_reported_under_the_task_name() {
        let mut set: JoinSet<Tracked> = JoinSet::new();
        let mut names = Names::new();
        let handle = set.spawn(async { panic!("lease exploded") });
        names.insert(handle.id(), "lease".to_string());

        let mut failure = None;
        let joined = set.join_next().await.unwrap();
        assert!(settle(&mut failure, &names, joined));

        match failure {
            Some(WorkerError::Panicked { name, message }) => {
                assert_eq!(name, "lease");
                assert_eq!(message, "lease exploded");
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[tokio::test]
    async fn first_failure_is_kept() {
        let mut set: JoinSet<Tracked> = JoinSet::new();
        let names = Names::new();
        set.spawn(async { panic!("first") });

        let mut failure = Some(WorkerError::Panicked {
            name: "executor-0".to_string(),
            message: "earlier".to_string(),
        });
        let joined = set.join_next().await.unwrap();
        assert!(settle(&mut failure, &names, joined));
        assert!(matches!(failure, Some(WorkerError::Panicked { name, .. }) if name == "executor-0"));
    }

    #[test]
    fn panic_payloads_are_rendered() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(7_u8)), "unknown panic payload");
    }
}
