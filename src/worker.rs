//! Drives one leased account through the request sequence for one item.
//!
//! `FetchDetail → InitialProbe → CategoryLoop → PriceHistory → SaleRecords →
//! Submit → Release`. Every stage may end the crawl early; the release
//! always runs.

use crate::backend::Backend;
use crate::classifier::{Verdict, classify_body};
use crate::error::{Error, Result};
use crate::executor::{Fetch, RawResponse};
use crate::lease::AccountPool;
use crate::marketplace::Marketplace;
use crate::metrics::collector::MetricsCollector;
use crate::model::{
    Account, Category, CrawlOutcome, Item, PriceHistoryRecord, PriceHistoryResponse,
    SaleRecordsResponse, SellOrdersResponse,
};
use crate::proxy::{ProxyEndpoint, ProxyRotator};
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Shared, read-only collaborators of every worker.
pub struct CrawlContext {
    pub fetcher: Arc<dyn Fetch>,
    pub backend: Arc<dyn Backend>,
    pub pool: Arc<dyn AccountPool>,
    /// Used for accounts that come without an assigned proxy.
    pub fallback_proxies: Option<Arc<ProxyRotator>>,
    pub marketplace: Marketplace,
    pub max_categories: usize,
    pub jitter: f64,
    pub metrics: Arc<MetricsCollector>,
}

/// Inter-request delay: `base × (1 + U[0, jitter))`.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    pub base: Duration,
    pub jitter: f64,
}

impl Pacing {
    pub fn new(base: Duration, jitter: f64) -> Self {
        Self { base, jitter }
    }

    pub fn delay(&self) -> Duration {
        if self.base.is_zero() || self.jitter <= 0.0 {
            return self.base;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(0.0..self.jitter);
        self.base.mul_f64(factor)
    }

    pub async fn pause(&self) {
        let delay = self.delay();
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchDetail,
    GoodsInfo,
    InitialProbe,
    Category(usize),
    PriceHistory,
    SaleRecords,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::FetchDetail => f.write_str("detail fetch"),
            Stage::GoodsInfo => f.write_str("goods info"),
            Stage::InitialProbe => f.write_str("initial request"),
            Stage::Category(index) => write!(f, "category #{}", index),
            Stage::PriceHistory => f.write_str("price history"),
            Stage::SaleRecords => f.write_str("sale records"),
        }
    }
}

/// Why a crawl stopped before finishing.
#[derive(Debug)]
pub(crate) enum Halt {
    Refused { stage: Stage, verdict: Verdict },
    Failed { stage: Stage, error: Error },
}

impl Halt {
    fn decode(stage: Stage, context: &str, source: serde_json::Error) -> Self {
        Halt::Failed {
            stage,
            error: Error::decode(context, source),
        }
    }

    pub(crate) fn log(&self, tag: &str) {
        match self {
            Halt::Refused {
                stage,
                verdict: Verdict::Banned,
            } => log::error!("{} account banned at {}", tag, stage),
            Halt::Refused { stage, verdict } => {
                log::warn!("{} stopped at {}: {}", tag, stage, verdict)
            }
            Halt::Failed { stage, error } => log::error!("{} {} failed: {}", tag, stage, error),
        }
    }
}

/// One identity making marketplace requests; accumulates the lease tallies.
pub(crate) struct Session<'a> {
    fetcher: &'a dyn Fetch,
    proxy: ProxyEndpoint,
    cookie: &'a str,
    user_agent: &'a str,
    pacing: Pacing,
    metrics: &'a MetricsCollector,
    outcome: &'a mut CrawlOutcome,
}

impl<'a> Session<'a> {
    pub(crate) fn new(
        fetcher: &'a dyn Fetch,
        proxy: ProxyEndpoint,
        cookie: &'a str,
        user_agent: &'a str,
        pacing: Pacing,
        metrics: &'a MetricsCollector,
        outcome: &'a mut CrawlOutcome,
    ) -> Self {
        Self {
            fetcher,
            proxy,
            cookie,
            user_agent,
            pacing,
            metrics,
            outcome,
        }
    }

    async fn send(&mut self, stage: Stage, url: &str) -> std::result::Result<(Verdict, RawResponse), Halt> {
        let response = match self
            .fetcher
            .fetch(&self.proxy, self.cookie, self.user_agent, url)
            .await
        {
            Ok(response) => response,
            Err(error) => {
                self.metrics.record_transport_failure();
                return Err(Halt::Failed { stage, error });
            }
        };
        let verdict = classify_body(response.status, &response.body);
        self.metrics.record_verdict(verdict);
        Ok((verdict, response))
    }

    /// Only a 429 counts against the account here; other refusals end the
    /// crawl without flagging it.
    pub(crate) async fn probe(&mut self, url: &str) -> std::result::Result<(), Halt> {
        let stage = Stage::InitialProbe;
        let (verdict, _) = self.send(stage, url).await?;
        match verdict {
            Verdict::Success => {
                self.outcome.successful_requests += 1;
                Ok(())
            }
            Verdict::RateLimited => {
                self.outcome.rate_limited_requests += 1;
                Err(Halt::Refused { stage, verdict })
            }
            other => Err(Halt::Refused {
                stage,
                verdict: other,
            }),
        }
    }

    pub(crate) async fn request(
        &mut self,
        stage: Stage,
        url: &str,
    ) -> std::result::Result<RawResponse, Halt> {
        let (verdict, response) = self.send(stage, url).await?;
        match verdict {
            Verdict::Success => {
                self.outcome.successful_requests += 1;
                return Ok(response);
            }
            Verdict::RateLimited => self.outcome.rate_limited_requests += 1,
            Verdict::Banned => self.outcome.banned = true,
            Verdict::ProtocolError => {
                log::debug!(
                    "{} answered {}: {}",
                    url,
                    response.status,
                    String::from_utf8_lossy(&response.body)
                );
            }
        }
        Err(Halt::Refused { stage, verdict })
    }

    pub(crate) async fn pause(&self) {
        self.pacing.pause().await;
    }

    /// Fills in refined prices for the first `max` categories, pausing
    /// between requests. Categories before a stop keep their prices.
    pub(crate) async fn enrich_categories(
        &mut self,
        categories: &mut [Category],
        max: usize,
    ) -> std::result::Result<(), Halt> {
        let limit = categories.len().min(max);
        for (index, category) in categories.iter_mut().take(limit).enumerate() {
            let stage = Stage::Category(index);
            let response = self.request(stage, &category.api_link).await?;
            let orders: SellOrdersResponse = serde_json::from_slice(&response.body)
                .map_err(|e| Halt::decode(stage, "sell orders", e))?;
            category.apply_listing_prices(orders.prices());

            if index + 1 < limit {
                self.pause().await;
            }
        }
        Ok(())
    }
}

pub struct ItemCrawlWorker {
    ctx: Arc<CrawlContext>,
    account: Account,
    goods_id: String,
    tag: String,
}

impl ItemCrawlWorker {
    pub fn new(ctx: Arc<CrawlContext>, account: Account, goods_id: impl Into<String>) -> Self {
        let goods_id = goods_id.into();
        let tag = format!("[account {} | goods {}]", account.id, goods_id);
        Self {
            ctx,
            account,
            goods_id,
            tag,
        }
    }

    /// Crawls the item and releases the account on every exit path.
    pub async fn run(self) -> CrawlOutcome {
        let mut outcome = CrawlOutcome::default();
        match self.crawl(&mut outcome).await {
            Ok(()) => log::debug!("{} finished processing", self.tag),
            Err(halt) => halt.log(&self.tag),
        }

        if outcome.banned {
            self.ctx.metrics.increment_accounts_banned();
        }
        self.release(&outcome).await;
        outcome
    }

    async fn crawl(&self, outcome: &mut CrawlOutcome) -> std::result::Result<(), Halt> {
        let ctx = &*self.ctx;
        let goods_id = self.goods_id.as_str();

        let mut item = ctx
            .backend
            .fetch_item(goods_id)
            .await
            .map_err(|error| Halt::Failed {
                stage: Stage::FetchDetail,
                error,
            })?;

        let proxy = self.resolve_proxy().map_err(|error| Halt::Failed {
            stage: Stage::InitialProbe,
            error,
        })?;

        let pacing = Pacing::new(Duration::from_secs(self.account.inter_item_delay), ctx.jitter);
        let mut session = Session::new(
            ctx.fetcher.as_ref(),
            proxy,
            &self.account.cookie,
            &self.account.user_agent,
            pacing,
            &ctx.metrics,
            outcome,
        );

        session.probe(&ctx.marketplace.item_page(goods_id)).await?;
        session.pause().await;

        if let Err(halt) = session
            .enrich_categories(&mut item.float_category, ctx.max_categories)
            .await
        {
            self.submit(&item).await;
            return Err(halt);
        }

        if self.account.steam_linked {
            self.price_history(&mut session).await?;
            session.pause().await;
            self.sale_records(&mut session).await?;
        }

        self.submit(&item).await;
        Ok(())
    }

    fn resolve_proxy(&self) -> Result<ProxyEndpoint> {
        if !self.account.proxy.trim().is_empty() {
            return ProxyEndpoint::parse(&self.account.proxy);
        }
        match &self.ctx.fallback_proxies {
            Some(rotator) => rotator.next(),
            None => Err(Error::PoolEmpty),
        }
    }

    async fn price_history(&self, session: &mut Session<'_>) -> std::result::Result<(), Halt> {
        let stage = Stage::PriceHistory;
        let url = self.ctx.marketplace.price_history(&self.goods_id);
        let response = session.request(stage, &url).await?;
        let history: PriceHistoryResponse = serde_json::from_slice(&response.body)
            .map_err(|e| Halt::decode(stage, "price history", e))?;

        let record = PriceHistoryRecord {
            goods_id: self.goods_id.clone(),
            price_history: history.data.price_history,
        };
        self.ctx
            .backend
            .submit_price_history(&record)
            .await
            .map_err(|error| Halt::Failed { stage, error })
    }

    async fn sale_records(&self, session: &mut Session<'_>) -> std::result::Result<(), Halt> {
        let stage = Stage::SaleRecords;
        let url = self.ctx.marketplace.sale_records(&self.goods_id);
        let response = session.request(stage, &url).await?;
        let sales: SaleRecordsResponse = serde_json::from_slice(&response.body)
            .map_err(|e| Halt::decode(stage, "sale records", e))?;

        let records = sales.into_records();
        log::debug!("{} {} sale records processed", self.tag, records.len());
        self.ctx
            .backend
            .submit_sales(&records)
            .await
            .map_err(|error| Halt::Failed { stage, error })
    }

    /// Not retried; a failed submission loses the item for this cycle.
    async fn submit(&self, item: &Item) {
        match self.ctx.backend.submit_item(item).await {
            Ok(()) => self.ctx.metrics.increment_items_submitted(),
            Err(e) => {
                self.ctx.metrics.increment_items_failed();
                log::error!("{} error sending updated item: {}", self.tag, e);
            }
        }
    }

    async fn release(&self, outcome: &CrawlOutcome) {
        log::debug!("{} releasing account with {:?}", self.tag, outcome);
        if let Err(e) = self.ctx.pool.release(&self.account, outcome).await {
            log::error!("{} error releasing account: {}", self.tag, e);
        }
        self.ctx.metrics.increment_leases_released();
    }
}
