use crate::error::{Error, Result};
use crate::lease::Reservation;
use crate::model::CrawlOutcome;
use crate::shutdown::Shutdown;
use crate::worker::{CrawlContext, ItemCrawlWorker};
use rand::seq::SliceRandom;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Identifiers awaiting dispatch. Failed identifiers are never re-queued.
#[derive(Debug, Default)]
pub struct WorkQueue {
    ids: VecDeque<String>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the contents with a uniformly shuffled batch.
    pub fn refill(&mut self, mut ids: Vec<String>) {
        ids.shuffle(&mut rand::thread_rng());
        self.ids = ids.into();
    }

    pub fn front(&self) -> Option<&str> {
        self.ids.front().map(String::as_str)
    }

    pub fn pop(&mut self) -> Option<String> {
        self.ids.pop_front()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl From<Vec<String>> for WorkQueue {
    /// Keeps the given order.
    fn from(ids: Vec<String>) -> Self {
        Self { ids: ids.into() }
    }
}

/// Leases an account per identifier and spawns a worker for it without
/// waiting on earlier workers. Admission is bounded by the pool's own
/// availability and by `max_in_flight` permits.
pub struct BatchDispatcher {
    ctx: Arc<CrawlContext>,
    poll_delay: Duration,
    permits: Arc<Semaphore>,
    workers: JoinSet<CrawlOutcome>,
    log_every: usize,
    dispatched: usize,
}

impl BatchDispatcher {
    pub fn new(ctx: Arc<CrawlContext>, poll_delay: Duration, max_in_flight: usize) -> Self {
        Self {
            ctx,
            poll_delay,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            workers: JoinSet::new(),
            log_every: 10,
            dispatched: 0,
        }
    }

    pub fn with_log_every(mut self, log_every: usize) -> Self {
        self.log_every = log_every.max(1);
        self
    }

    /// Dispatches until the queue is empty or `shutdown` fires. A wait hint
    /// retries the same head-of-queue identifier; a reservation failure
    /// aborts the cycle. A reservation already sent is always completed and
    /// its account handed to a worker.
    pub async fn drain(&mut self, queue: &mut WorkQueue, shutdown: &mut Shutdown) -> Result<()> {
        while let Some(goods_id) = queue.front().map(str::to_owned) {
            self.reap();
            if !shutdown.sleep(self.poll_delay).await {
                break;
            }

            let permit = tokio::select! {
                permit = self.permits.clone().acquire_owned() => permit
                    .map_err(|e| Error::Config(format!("worker permits closed: {}", e)))?,
                _ = shutdown.triggered() => break,
            };

            match self.ctx.pool.reserve().await? {
                Reservation::Leased(account) => {
                    queue.pop();
                    self.ctx.metrics.increment_leases_acquired();
                    self.ctx.metrics.increment_items_dispatched();
                    self.ctx.metrics.increment_active_workers();

                    let worker = ItemCrawlWorker::new(self.ctx.clone(), account, goods_id);
                    let metrics = self.ctx.metrics.clone();
                    self.workers.spawn(async move {
                        let outcome = worker.run().await;
                        metrics.decrement_active_workers();
                        drop(permit);
                        outcome
                    });

                    self.dispatched += 1;
                    if self.dispatched % self.log_every == 0 {
                        log::info!(
                            "{} items have been processed, {} left",
                            self.dispatched,
                            queue.len()
                        );
                    }
                }
                Reservation::Wait {
                    message,
                    retry_after,
                } => {
                    drop(permit);
                    self.ctx.metrics.increment_wait_hints();
                    log::info!("{}", message);
                    log::info!(
                        "Waiting for {} seconds for new accounts...",
                        retry_after.as_secs()
                    );
                    shutdown.sleep(retry_after).await;
                }
            }
        }
        Ok(())
    }

    /// Collects finished workers without blocking.
    fn reap(&mut self) {
        while let Some(joined) = self.workers.try_join_next() {
            if let Err(e) = joined {
                log::error!("Worker task failed: {}", e);
            }
        }
    }

    /// Waits for every in-flight worker.
    pub async fn wait_idle(&mut self) -> Vec<CrawlOutcome> {
        let mut outcomes = Vec::new();
        while let Some(joined) = self.workers.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => log::error!("Worker task failed: {}", e),
            }
        }
        outcomes
    }

    pub fn in_flight(&self) -> usize {
        self.workers.len()
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched
    }
}
