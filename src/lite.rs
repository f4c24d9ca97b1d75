//! Account-less listing crawl: goods info through rotated proxies, processed
//! in proxy-sized batches that are joined before the next one starts.

use crate::backend::{Backend, Pipeline};
use crate::category::parse_goods_info;
use crate::error::{Error, Result};
use crate::executor::Fetch;
use crate::marketplace::Marketplace;
use crate::metrics::collector::MetricsCollector;
use crate::model::CrawlOutcome;
use crate::proxy::ProxyRotator;
use crate::shutdown::Shutdown;
use crate::worker::{Pacing, Session, Stage};
use futures::stream::{self, StreamExt};
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LiteSettings {
    pub max_categories: usize,
    pub request_delay: Duration,
    pub jitter: f64,
    pub batch_delay: Duration,
    pub idle_wait: Duration,
    pub user_agent: String,
    pub log_every: usize,
    /// Static proxy list; the backend list is fetched every cycle when empty.
    pub proxies: Vec<String>,
}

impl Default for LiteSettings {
    fn default() -> Self {
        Self {
            max_categories: 2,
            request_delay: Duration::from_secs(1),
            jitter: 0.5,
            batch_delay: Duration::from_secs(3),
            idle_wait: Duration::from_secs(600),
            user_agent: String::new(),
            log_every: 100,
            proxies: Vec::new(),
        }
    }
}

pub struct LitePipeline {
    backend: Arc<dyn Backend>,
    fetcher: Arc<dyn Fetch>,
    marketplace: Marketplace,
    settings: LiteSettings,
    metrics: Arc<MetricsCollector>,
}

impl LitePipeline {
    pub fn new(
        backend: Arc<dyn Backend>,
        fetcher: Arc<dyn Fetch>,
        marketplace: Marketplace,
        settings: LiteSettings,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            backend,
            fetcher,
            marketplace,
            settings,
            metrics,
        }
    }

    /// Runs cycles until `shutdown` fires; a started batch is always
    /// finished.
    pub async fn run_until(&self, mut shutdown: Shutdown) -> Result<()> {
        log::info!("Lite parsing started!");
        while !shutdown.is_triggered() {
            self.cycle_until(&mut shutdown).await?;
        }
        Ok(())
    }

    /// One refill and full drain. Returns the number of identifiers
    /// processed.
    pub async fn cycle(&self) -> Result<usize> {
        self.cycle_until(&mut Shutdown::never()).await
    }

    async fn cycle_until(&self, shutdown: &mut Shutdown) -> Result<usize> {
        let mut ids = self.backend.missing_ids(Pipeline::Lite).await?;
        if ids.is_empty() {
            log::info!(
                "No missing goods ids found. Sleeping for {} seconds.",
                self.settings.idle_wait.as_secs()
            );
            shutdown.sleep(self.settings.idle_wait).await;
            return Ok(0);
        }
        ids.shuffle(&mut rand::thread_rng());
        log::info!("Total missing goods ids fetched {}", ids.len());

        let rotator = self.rotator().await?;
        log::info!("Total proxies available {}", rotator.len());

        let mut processed = 0;
        let mut since_log = 0;
        for batch in ids.chunks(rotator.len()) {
            stream::iter(batch)
                .for_each_concurrent(None, |goods_id| self.process(&rotator, goods_id))
                .await;

            processed += batch.len();
            since_log += batch.len();
            if since_log >= self.settings.log_every {
                log::info!(
                    "{} goods ids have been processed, {} left",
                    processed,
                    ids.len() - processed
                );
                since_log = 0;
            }
            if !shutdown.sleep(self.settings.batch_delay).await {
                break;
            }
        }
        Ok(processed)
    }

    async fn rotator(&self) -> Result<ProxyRotator> {
        let urls = if self.settings.proxies.is_empty() {
            self.backend.fetch_proxies().await?
        } else {
            self.settings.proxies.clone()
        };
        let rotator = ProxyRotator::from_urls(&urls)?;
        if rotator.is_empty() {
            return Err(Error::PoolEmpty);
        }
        Ok(rotator)
    }

    async fn process(&self, rotator: &ProxyRotator, goods_id: &str) {
        self.metrics.increment_items_dispatched();
        if let Err(e) = self.process_item(rotator, goods_id).await {
            self.metrics.increment_items_failed();
            log::error!("[goods {}] {}", goods_id, e);
        }
    }

    async fn process_item(&self, rotator: &ProxyRotator, goods_id: &str) -> Result<()> {
        let tag = format!("[goods {}]", goods_id);
        let proxy = rotator.next()?;
        let mut tally = CrawlOutcome::default();
        let mut session = Session::new(
            self.fetcher.as_ref(),
            proxy,
            "",
            &self.settings.user_agent,
            Pacing::new(self.settings.request_delay, self.settings.jitter),
            &self.metrics,
            &mut tally,
        );

        let response = match session
            .request(Stage::GoodsInfo, &self.marketplace.goods_info(goods_id))
            .await
        {
            Ok(response) => response,
            Err(halt) => {
                halt.log(&tag);
                self.metrics.increment_items_failed();
                return Ok(());
            }
        };

        let mut item = parse_goods_info(
            goods_id,
            &response.body,
            &self.marketplace.sell_orders(goods_id),
        )?;

        if self.settings.max_categories > 0 && !item.float_category.is_empty() {
            session.pause().await;
            if let Err(halt) = session
                .enrich_categories(&mut item.float_category, self.settings.max_categories)
                .await
            {
                halt.log(&tag);
            }
        }

        self.backend.submit_item(&item).await?;
        self.metrics.increment_items_submitted();
        Ok(())
    }
}
