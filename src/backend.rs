//! Client for the backend item service: work queue, item records, proxy list.

use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::model::{Item, PriceHistoryRecord, SaleRecord};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

/// Which pipeline a queue refill is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    Full,
    Lite,
}

impl Pipeline {
    pub fn queue_path(&self) -> &'static str {
        match self {
            Pipeline::Full => "/cookieparsingitems",
            Pipeline::Lite => "/missingbuffids",
        }
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Identifiers still missing data for the given pipeline.
    async fn missing_ids(&self, pipeline: Pipeline) -> Result<Vec<String>>;
    async fn fetch_item(&self, goods_id: &str) -> Result<Item>;
    async fn submit_item(&self, item: &Item) -> Result<()>;
    async fn submit_price_history(&self, record: &PriceHistoryRecord) -> Result<()>;
    async fn submit_sales(&self, records: &[SaleRecord]) -> Result<()>;
    async fn reset_accounts(&self) -> Result<()>;
    async fn fetch_proxies(&self) -> Result<Vec<String>>;
}

pub struct BackendClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>, client: Client) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self::new(
            config.base_url.clone(),
            config.resolve_token(),
            client,
        ))
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn expect_ok(path: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            log::debug!("{} answered {}: {}", path, status, body);
            Err(Error::Backend {
                endpoint: path.to_string(),
                status: status.as_u16(),
            })
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, authorized: bool) -> Result<T> {
        let mut request = self.client.get(self.url(path));
        if authorized {
            request = self.bearer(request);
        }
        let response = Self::expect_ok(path, request.send().await?).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| Error::decode(path.to_string(), e))
    }

    async fn post_json<T: serde::Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<()> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::expect_ok(path, response).await?;
        Ok(())
    }
}

#[async_trait]
impl Backend for BackendClient {
    async fn missing_ids(&self, pipeline: Pipeline) -> Result<Vec<String>> {
        self.get_json(pipeline.queue_path(), true).await
    }

    async fn fetch_item(&self, goods_id: &str) -> Result<Item> {
        self.get_json(&format!("/items/{}", goods_id), false).await
    }

    async fn submit_item(&self, item: &Item) -> Result<()> {
        self.post_json("/items", item).await
    }

    async fn submit_price_history(&self, record: &PriceHistoryRecord) -> Result<()> {
        self.post_json("/historicalprices", record).await
    }

    async fn submit_sales(&self, records: &[SaleRecord]) -> Result<()> {
        self.post_json("/sales", records).await
    }

    async fn reset_accounts(&self) -> Result<()> {
        let path = "/resetaccounts";
        let request = self.bearer(self.client.get(self.url(path)));
        Self::expect_ok(path, request.send().await?).await?;
        Ok(())
    }

    async fn fetch_proxies(&self) -> Result<Vec<String>> {
        self.get_json("/fetchParsingProxies", true).await
    }
}
