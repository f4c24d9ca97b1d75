//! Account lease protocol against the backend pool.

use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::model::{Account, CrawlOutcome, ReleaseRequest, WaitingTimeResponse};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Reservation {
    /// Exclusive until released.
    Leased(Account),
    /// The pool is exhausted; retry after the hinted duration.
    Wait { message: String, retry_after: Duration },
}

#[async_trait]
pub trait AccountPool: Send + Sync {
    async fn reserve(&self) -> Result<Reservation>;

    /// Reports the lease tallies and hands the account back.
    async fn release(&self, account: &Account, outcome: &CrawlOutcome) -> Result<()>;
}

pub struct AccountLeaseClient {
    client: Client,
    base_url: String,
}

impl AccountLeaseClient {
    const RESERVE_PATH: &'static str = "/reserveAccount";
    const RELEASE_PATH: &'static str = "/releaseaccount";

    pub fn new(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self::new(config.base_url.clone(), client))
    }
}

#[async_trait]
impl AccountPool for AccountLeaseClient {
    async fn reserve(&self) -> Result<Reservation> {
        let url = format!("{}{}", self.base_url, Self::RESERVE_PATH);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        match status {
            StatusCode::OK => {
                let account: Account = serde_json::from_slice(&body)
                    .map_err(|e| Error::decode("reserved account", e))?;
                Ok(Reservation::Leased(account))
            }
            StatusCode::NOT_FOUND => {
                let hint: WaitingTimeResponse = serde_json::from_slice(&body)
                    .map_err(|e| Error::decode("waiting time response", e))?;
                Ok(Reservation::Wait {
                    message: hint.message,
                    retry_after: Duration::from_secs(hint.waiting_time),
                })
            }
            other => Err(Error::Backend {
                endpoint: Self::RESERVE_PATH.to_string(),
                status: other.as_u16(),
            }),
        }
    }

    async fn release(&self, account: &Account, outcome: &CrawlOutcome) -> Result<()> {
        let url = format!("{}{}", self.base_url, Self::RELEASE_PATH);
        let body = ReleaseRequest {
            account,
            outcome: *outcome,
        };
        let response = self.client.post(url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(Error::Backend {
                endpoint: Self::RELEASE_PATH.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}
