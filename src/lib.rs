pub mod backend;
pub mod category;
pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod lease;
pub mod lite;
pub mod marketplace;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod proxy;
pub mod shutdown;
pub mod worker;

pub use backend::{Backend, BackendClient, Pipeline};
pub use classifier::Verdict;
pub use dispatcher::{BatchDispatcher, WorkQueue};
pub use error::{Error, Result};
pub use executor::{Fetch, RawResponse, RequestExecutor};
pub use lease::{AccountLeaseClient, AccountPool, Reservation};
pub use lite::{LitePipeline, LiteSettings};
pub use metrics::collector::MetricsCollector;
pub use metrics::snapshot::MetricsSnapshot;
pub use orchestrator::{CrawlOrchestrator, CrawlerState, OrchestratorSettings, Step};
pub use proxy::{ProxyEndpoint, ProxyRotator};
pub use shutdown::Shutdown;
pub use worker::{CrawlContext, ItemCrawlWorker};
