use crate::config::MarketplaceConfig;
use crate::error::Result;
use crate::proxy::ProxyEndpoint;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT_LANGUAGE, COOKIE, USER_AGENT};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Status and body of a marketplace response. Non-2xx statuses are data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

#[async_trait]
pub trait Fetch: Send + Sync {
    /// One GET through `proxy` under the given identity. Errors only on
    /// transport failure (connect, DNS, timeout, body read).
    async fn fetch(
        &self,
        proxy: &ProxyEndpoint,
        cookie: &str,
        user_agent: &str,
        url: &str,
    ) -> Result<RawResponse>;
}

pub struct RequestExecutor {
    accept_language: String,
    timeout: Duration,
    clients: Mutex<HashMap<String, Client>>,
}

impl RequestExecutor {
    pub fn new(accept_language: impl Into<String>, timeout: Duration) -> Self {
        Self {
            accept_language: accept_language.into(),
            timeout,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &MarketplaceConfig) -> Self {
        Self::new(
            config.accept_language.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// One client per proxy so connections are pooled per exit address.
    fn client_for(&self, proxy: &ProxyEndpoint) -> Result<Client> {
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(client) = clients.get(proxy.as_str()) {
            return Ok(client.clone());
        }

        let client = Client::builder()
            .proxy(reqwest::Proxy::all(proxy.as_str())?)
            .timeout(self.timeout)
            .build()?;
        clients.insert(proxy.as_str().to_string(), client.clone());
        Ok(client)
    }
}

#[async_trait]
impl Fetch for RequestExecutor {
    async fn fetch(
        &self,
        proxy: &ProxyEndpoint,
        cookie: &str,
        user_agent: &str,
        url: &str,
    ) -> Result<RawResponse> {
        let client = self.client_for(proxy)?;
        let mut request = client
            .get(url)
            .header(ACCEPT_LANGUAGE, &self.accept_language)
            .header(USER_AGENT, user_agent);
        if !cookie.is_empty() {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        log::debug!("GET {} via {} -> {} ({} bytes)", url, proxy, status, body.len());

        Ok(RawResponse::new(status, body.to_vec()))
    }
}
