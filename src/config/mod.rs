pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{
    BackendConfig, CrawlerConfig, FullPipelineConfig, LitePipelineConfig, MarketplaceConfig, Mode,
};
