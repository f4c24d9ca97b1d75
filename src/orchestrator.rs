use crate::backend::{Backend, Pipeline};
use crate::dispatcher::{BatchDispatcher, WorkQueue};
use crate::error::Result;
use crate::lite::LitePipeline;
use crate::shutdown::Shutdown;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlerState {
    Idle,
    Running,
    Waiting,
    Stopped,
}

/// What one orchestrator step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The backend had nothing to crawl; slept the idle interval.
    Idle,
    /// The queue was dispatched to the last identifier, or shutdown
    /// stopped the dispatch.
    Drained,
    /// A reservation failure cut the cycle short.
    Aborted,
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub idle_wait: Duration,
    pub error_backoff: Duration,
    pub reset_accounts_on_start: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            idle_wait: Duration::from_secs(600),
            error_backoff: Duration::from_secs(5),
            reset_accounts_on_start: true,
        }
    }
}

/// Keeps the work queue filled and the dispatcher busy, indefinitely.
pub struct CrawlOrchestrator {
    backend: Arc<dyn Backend>,
    dispatcher: BatchDispatcher,
    queue: WorkQueue,
    settings: OrchestratorSettings,
    shutdown: Shutdown,
    state_watcher: watch::Sender<CrawlerState>,
}

impl CrawlOrchestrator {
    pub fn new(
        backend: Arc<dyn Backend>,
        dispatcher: BatchDispatcher,
        settings: OrchestratorSettings,
    ) -> Self {
        let (state_tx, _) = watch::channel(CrawlerState::Idle);
        Self {
            backend,
            dispatcher,
            queue: WorkQueue::new(),
            settings,
            shutdown: Shutdown::never(),
            state_watcher: state_tx,
        }
    }

    /// Runs until `shutdown` fires, then waits for in-flight workers.
    /// Fails when the queue or reset endpoints cannot be reached.
    pub async fn run_until(&mut self, shutdown: Shutdown) -> Result<()> {
        self.shutdown = shutdown;
        self.set_state(CrawlerState::Running);

        if self.settings.reset_accounts_on_start {
            if let Err(e) = self.backend.reset_accounts().await {
                log::error!("Error resetting accounts: {}", e);
                self.set_state(CrawlerState::Stopped);
                return Err(e);
            }
            log::info!("Accounts reset successfully");
        }

        let result = loop {
            if self.shutdown.is_triggered() {
                log::info!("Stopping account leasing");
                break Ok(());
            }
            if let Err(e) = self.step().await {
                break Err(e);
            }
        };

        let outcomes = self.dispatcher.wait_idle().await;
        log::info!("{} in-flight workers finished", outcomes.len());
        self.set_state(CrawlerState::Stopped);
        result
    }

    /// Runs next to the lite pipeline. A lite failure is logged and leaves
    /// this pipeline running until `shutdown`, so every lease is released.
    pub async fn run_alongside(&mut self, lite: &LitePipeline, shutdown: Shutdown) -> Result<()> {
        let lite_run = async {
            let result = lite.run_until(shutdown.clone()).await;
            if let Err(e) = &result {
                log::error!("Lite pipeline stopped: {}", e);
            }
            result
        };
        let (full, lite) = tokio::join!(self.run_until(shutdown.clone()), lite_run);
        full.and(lite)
    }

    /// Refills when empty, sleeps when there is nothing to do, otherwise
    /// drains the queue.
    pub async fn step(&mut self) -> Result<Step> {
        if self.queue.is_empty() {
            let ids = self.backend.missing_ids(Pipeline::Full).await?;
            if ids.is_empty() {
                log::info!(
                    "No more goods ids to process. Waiting for {} seconds...",
                    self.settings.idle_wait.as_secs()
                );
                self.set_state(CrawlerState::Waiting);
                self.shutdown.sleep(self.settings.idle_wait).await;
                self.set_state(CrawlerState::Running);
                return Ok(Step::Idle);
            }
            log::info!("Total missing goods ids fetched: {}", ids.len());
            self.queue.refill(ids);
        }

        match self.dispatcher.drain(&mut self.queue, &mut self.shutdown).await {
            Ok(()) => Ok(Step::Drained),
            Err(e) => {
                log::error!(
                    "Dispatch cycle aborted with {} ids left: {}",
                    self.queue.len(),
                    e
                );
                self.shutdown.sleep(self.settings.error_backoff).await;
                Ok(Step::Aborted)
            }
        }
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    pub fn dispatcher_mut(&mut self) -> &mut BatchDispatcher {
        &mut self.dispatcher
    }

    pub fn watch_state(&self) -> watch::Receiver<CrawlerState> {
        self.state_watcher.subscribe()
    }

    fn set_state(&self, state: CrawlerState) {
        self.state_watcher.send_replace(state);
    }
}
