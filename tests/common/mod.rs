#![allow(dead_code)]

use async_trait::async_trait;
use market_crawler::backend::{Backend, Pipeline};
use market_crawler::executor::{Fetch, RawResponse};
use market_crawler::lease::{AccountPool, Reservation};
use market_crawler::marketplace::Marketplace;
use market_crawler::model::{
    Account, Category, CrawlOutcome, Item, PriceHistoryRecord, SaleRecord,
};
use market_crawler::proxy::{ProxyEndpoint, ProxyRotator};
use market_crawler::{CrawlContext, Error, MetricsCollector, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const MARKET: &str = "http://market.test";
pub const SELL_ORDERS_OK: &str = r#"{"code":"OK","data":{"items":[{"price":"12.50"},{"price":"13.00"}]}}"#;

#[derive(Debug, Clone)]
pub enum Scripted {
    Respond(u16, String),
    Unreachable,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub proxy: String,
    pub cookie: String,
    pub url: String,
}

/// Answers by the first rule whose pattern is a substring of the URL.
#[derive(Default)]
pub struct FakeFetcher {
    rules: Mutex<Vec<(String, Scripted)>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, pattern: &str, scripted: Scripted) -> Self {
        self.rules
            .lock()
            .expect("rules lock")
            .push((pattern.to_string(), scripted));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.url).collect()
    }
}

#[async_trait]
impl Fetch for FakeFetcher {
    async fn fetch(
        &self,
        proxy: &ProxyEndpoint,
        cookie: &str,
        _user_agent: &str,
        url: &str,
    ) -> Result<RawResponse> {
        self.calls.lock().expect("calls lock").push(Call {
            proxy: proxy.as_str().to_string(),
            cookie: cookie.to_string(),
            url: url.to_string(),
        });

        let scripted = self
            .rules
            .lock()
            .expect("rules lock")
            .iter()
            .find(|(pattern, _)| url.contains(pattern.as_str()))
            .map(|(_, scripted)| scripted.clone())
            .unwrap_or_else(|| Scripted::Respond(200, SELL_ORDERS_OK.to_string()));

        match scripted {
            Scripted::Respond(status, body) => Ok(RawResponse::new(status, body.into_bytes())),
            Scripted::Unreachable => Err(Error::Config("connection refused".to_string())),
        }
    }
}

#[derive(Default)]
pub struct FakeBackend {
    pub items: Mutex<HashMap<String, Item>>,
    missing: Mutex<VecDeque<Vec<String>>>,
    lite_missing: Mutex<VecDeque<Vec<String>>>,
    pub missing_calls: AtomicUsize,
    pub fetched: Mutex<Vec<String>>,
    pub submitted: Mutex<Vec<Item>>,
    pub histories: Mutex<Vec<PriceHistoryRecord>>,
    pub sales: Mutex<Vec<Vec<SaleRecord>>>,
    pub proxies: Mutex<Vec<String>>,
    pub fail_reset: bool,
    pub resets: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_reset() -> Self {
        Self {
            fail_reset: true,
            ..Default::default()
        }
    }

    pub fn with_item(self, item: Item) -> Self {
        self.items
            .lock()
            .expect("items lock")
            .insert(item.goods_id.clone(), item);
        self
    }

    /// Full-pipeline refills handed out in order; empty afterwards.
    pub fn with_missing(self, batches: Vec<Vec<&str>>) -> Self {
        push_batches(&self.missing, batches);
        self
    }

    /// Lite-pipeline refills handed out in order; empty afterwards.
    pub fn with_lite_missing(self, batches: Vec<Vec<&str>>) -> Self {
        push_batches(&self.lite_missing, batches);
        self
    }

    pub fn submitted(&self) -> Vec<Item> {
        self.submitted.lock().expect("submitted lock").clone()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().expect("fetched lock").clone()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn missing_ids(&self, pipeline: Pipeline) -> Result<Vec<String>> {
        let queue = match pipeline {
            Pipeline::Full => {
                self.missing_calls.fetch_add(1, Ordering::SeqCst);
                &self.missing
            }
            Pipeline::Lite => &self.lite_missing,
        };
        Ok(queue
            .lock()
            .expect("missing lock")
            .pop_front()
            .unwrap_or_default())
    }

    async fn fetch_item(&self, goods_id: &str) -> Result<Item> {
        self.fetched
            .lock()
            .expect("fetched lock")
            .push(goods_id.to_string());
        let known = self.items.lock().expect("items lock").get(goods_id).cloned();
        match known {
            Some(item) => Ok(item),
            None if goods_id.starts_with("missing") => Err(Error::Backend {
                endpoint: format!("/items/{}", goods_id),
                status: 404,
            }),
            None => Ok(item_with_categories(goods_id, 1)),
        }
    }

    async fn submit_item(&self, item: &Item) -> Result<()> {
        self.submitted
            .lock()
            .expect("submitted lock")
            .push(item.clone());
        Ok(())
    }

    async fn submit_price_history(&self, record: &PriceHistoryRecord) -> Result<()> {
        self.histories
            .lock()
            .expect("histories lock")
            .push(record.clone());
        Ok(())
    }

    async fn submit_sales(&self, records: &[SaleRecord]) -> Result<()> {
        self.sales.lock().expect("sales lock").push(records.to_vec());
        Ok(())
    }

    async fn reset_accounts(&self) -> Result<()> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        if self.fail_reset {
            return Err(Error::Backend {
                endpoint: "/resetaccounts".to_string(),
                status: 500,
            });
        }
        Ok(())
    }

    async fn fetch_proxies(&self) -> Result<Vec<String>> {
        Ok(self.proxies.lock().expect("proxies lock").clone())
    }
}

fn push_batches(queue: &Mutex<VecDeque<Vec<String>>>, batches: Vec<Vec<&str>>) {
    let mut queue = queue.lock().expect("missing lock");
    for batch in batches {
        queue.push_back(batch.into_iter().map(str::to_string).collect());
    }
}

#[derive(Debug, Clone)]
pub enum PoolStep {
    Lease(Account),
    Wait(u64),
    Fail,
}

/// Replays scripted reservations, then leases fresh accounts forever.
#[derive(Default)]
pub struct FakePool {
    script: Mutex<VecDeque<PoolStep>>,
    next_id: AtomicI64,
    reserve_delay: Duration,
    pub reserve_calls: AtomicUsize,
    pub releases: Mutex<Vec<(i64, CrawlOutcome)>>,
}

impl FakePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(steps: Vec<PoolStep>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            ..Default::default()
        }
    }

    /// Every reservation takes `delay` before the pool answers.
    pub fn with_reserve_delay(mut self, delay: Duration) -> Self {
        self.reserve_delay = delay;
        self
    }

    pub fn releases(&self) -> Vec<(i64, CrawlOutcome)> {
        self.releases.lock().expect("releases lock").clone()
    }

    pub fn reserve_count(&self) -> usize {
        self.reserve_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountPool for FakePool {
    async fn reserve(&self) -> Result<Reservation> {
        self.reserve_calls.fetch_add(1, Ordering::SeqCst);
        if !self.reserve_delay.is_zero() {
            tokio::time::sleep(self.reserve_delay).await;
        }
        let step = self.script.lock().expect("script lock").pop_front();
        match step {
            Some(PoolStep::Lease(account)) => Ok(Reservation::Leased(account)),
            Some(PoolStep::Wait(secs)) => Ok(Reservation::Wait {
                message: "No accounts available".to_string(),
                retry_after: Duration::from_secs(secs),
            }),
            Some(PoolStep::Fail) => Err(Error::Backend {
                endpoint: "/reserveAccount".to_string(),
                status: 500,
            }),
            None => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(Reservation::Leased(account(id)))
            }
        }
    }

    async fn release(&self, account: &Account, outcome: &CrawlOutcome) -> Result<()> {
        self.releases
            .lock()
            .expect("releases lock")
            .push((account.id, *outcome));
        Ok(())
    }
}

pub fn account(id: i64) -> Account {
    Account {
        id,
        cookie: format!("session={}", id),
        proxy: "http://10.0.0.1:3128".to_string(),
        user_agent: "test-agent".to_string(),
        ..Default::default()
    }
}

pub fn item_with_categories(goods_id: &str, count: usize) -> Item {
    Item {
        goods_id: goods_id.to_string(),
        market_hash_name: format!("Item {}", goods_id),
        listing_price: "10".to_string(),
        float_category: (0..count)
            .map(|index| Category {
                range: vec![format!("0.{}0", index), format!("0.{}9", index)],
                api_link: format!("{}/cat/{}", MARKET, index),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

pub fn context(
    fetcher: Arc<FakeFetcher>,
    backend: Arc<FakeBackend>,
    pool: Arc<FakePool>,
    max_categories: usize,
) -> Arc<CrawlContext> {
    Arc::new(CrawlContext {
        fetcher,
        backend,
        pool,
        fallback_proxies: Some(Arc::new(
            ProxyRotator::from_urls(&["http://127.0.0.1:8080"]).expect("valid proxy"),
        )),
        marketplace: Marketplace::new(MARKET),
        max_categories,
        jitter: 0.0,
        metrics: Arc::new(MetricsCollector::new()),
    })
}
