use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use market_crawler::config::{ConfigLoader, CrawlerConfig, Mode};
use market_crawler::marketplace::Marketplace;
use market_crawler::{
    AccountLeaseClient, Backend, BackendClient, BatchDispatcher, CrawlContext, CrawlOrchestrator,
    Fetch, LitePipeline, LiteSettings, MetricsCollector, MetricsSnapshot, OrchestratorSettings,
    ProxyRotator, RequestExecutor, Shutdown,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;

#[derive(Parser)]
#[command(name = "market-crawler")]
#[command(version = "0.1.0")]
#[command(about = "Marketplace listing crawler with leased accounts and rotated proxies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the crawl pipelines from a config file
    Run {
        /// Path to the configuration file (JSON/YAML/TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Overrides the mode from the config file
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,

        /// Disable the progress spinner (stderr)
        #[arg(long)]
        no_progress: bool,
    },
    /// Validate a configuration file
    Check {
        /// Path to the configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Full,
    Lite,
    Both,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Full => Mode::Full,
            ModeArg::Lite => Mode::Lite,
            ModeArg::Both => Mode::Both,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).build();
    let multi = MultiProgress::new();

    match cli.command {
        Commands::Run {
            config,
            mode,
            no_progress,
        } => {
            let progress = !no_progress;
            let level = logger.filter();
            if progress {
                indicatif_log_bridge::LogWrapper::new(multi.clone(), logger).try_init()?;
            } else {
                log::set_boxed_logger(Box::new(logger))?;
            }
            log::set_max_level(level);

            log::info!("Loading config from {:?}", config);
            let mut cfg = ConfigLoader::load(&config)?;
            if let Some(mode) = mode {
                cfg.mode = mode.into();
            }
            log::info!("Running in {:?} mode", cfg.mode);

            let metrics = Arc::new(MetricsCollector::new());
            let backend: Arc<dyn Backend> = Arc::new(BackendClient::from_config(&cfg.backend)?);
            let fetcher: Arc<dyn Fetch> = Arc::new(RequestExecutor::from_config(&cfg.marketplace));

            let (shutdown_tx, shutdown) = Shutdown::channel();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::info!("Shutting down...");
                }
                let _ = shutdown_tx.send(true);
            });

            let mut progress_task = None;
            let mut progress_bar = None;
            if progress {
                let pb = multi.add(ProgressBar::new_spinner());
                pb.set_style(
                    ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
                );
                pb.enable_steady_tick(Duration::from_millis(100));

                let mut snapshots = WatchStream::new(metrics.watch(Duration::from_millis(500)));
                let pb_clone = pb.clone();
                progress_bar = Some(pb);
                progress_task = Some(tokio::spawn(async move {
                    while let Some(snapshot) = snapshots.next().await {
                        pb_clone.set_message(status_line(&snapshot));
                    }
                }));
            }

            match cfg.mode {
                Mode::Full => {
                    let mut orchestrator = build_orchestrator(&cfg, &backend, &fetcher, &metrics)?;
                    orchestrator.run_until(shutdown.clone()).await?;
                }
                Mode::Lite => {
                    let lite = build_lite(&cfg, &backend, &fetcher, &metrics);
                    lite.run_until(shutdown.clone()).await?;
                }
                Mode::Both => {
                    let mut orchestrator = build_orchestrator(&cfg, &backend, &fetcher, &metrics)?;
                    let lite = build_lite(&cfg, &backend, &fetcher, &metrics);
                    orchestrator.run_alongside(&lite, shutdown.clone()).await?;
                }
            }

            if let Some(task) = progress_task {
                task.abort();
            }
            let final_metrics = metrics.snapshot();
            if let Some(pb) = progress_bar {
                pb.finish_with_message(format!("{} - Stopped", status_line(&final_metrics)));
            }

            println!("\n✅ Crawl Stopped:");
            println!("   Items Dispatched: {}", final_metrics.items_dispatched);
            println!("   Items Submitted: {}", final_metrics.items_submitted);
            println!("   Items Failed: {}", final_metrics.items_failed);
            println!("   Requests: {}", final_metrics.requests_total);
            println!("   Rate Limited: {}", final_metrics.requests_rate_limited);
            println!("   Accounts Banned: {}", final_metrics.accounts_banned);
            println!("   Success Rate: {:.1}%", final_metrics.success_rate);
            println!("   Total Time: {:.1}s", final_metrics.elapsed_seconds);
        }
        Commands::Check { config } => match ConfigLoader::load(&config) {
            Ok(cfg) => {
                println!("✅ Config is valid:");
                println!("   Mode: {:?}", cfg.mode);
                println!("   Backend: {}", cfg.backend.base_url);
                println!("   Marketplace: {}", cfg.marketplace.base_url);
                println!("   Fallback proxies: {}", cfg.proxies.len());
                println!("   Full max in flight: {}", cfg.full.max_in_flight);
            }
            Err(e) => {
                eprintln!("❌ Config error: {}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

fn status_line(snapshot: &MetricsSnapshot) -> String {
    format!(
        "Submitted: {} | Active: {} | 429: {} | Banned: {} | Success: {:.1}% | RPS: {:.2}",
        snapshot.items_submitted,
        snapshot.active_workers,
        snapshot.requests_rate_limited,
        snapshot.accounts_banned,
        snapshot.success_rate,
        snapshot.requests_per_second
    )
}

fn build_orchestrator(
    cfg: &CrawlerConfig,
    backend: &Arc<dyn Backend>,
    fetcher: &Arc<dyn Fetch>,
    metrics: &Arc<MetricsCollector>,
) -> anyhow::Result<CrawlOrchestrator> {
    let full = &cfg.full;
    let fallback_proxies = if cfg.proxies.is_empty() {
        None
    } else {
        Some(Arc::new(ProxyRotator::from_urls(&cfg.proxies)?))
    };

    let ctx = CrawlContext {
        fetcher: fetcher.clone(),
        backend: backend.clone(),
        pool: Arc::new(AccountLeaseClient::from_config(&cfg.backend)?),
        fallback_proxies,
        marketplace: Marketplace::from_config(&cfg.marketplace),
        max_categories: full.max_categories,
        jitter: full.jitter,
        metrics: metrics.clone(),
    };
    let dispatcher = BatchDispatcher::new(
        Arc::new(ctx),
        Duration::from_millis(full.poll_delay_ms),
        full.max_in_flight,
    )
    .with_log_every(full.log_every);

    Ok(CrawlOrchestrator::new(
        backend.clone(),
        dispatcher,
        OrchestratorSettings {
            idle_wait: Duration::from_secs(full.idle_wait_secs),
            error_backoff: Duration::from_secs(full.error_backoff_secs),
            reset_accounts_on_start: full.reset_accounts_on_start,
        },
    ))
}

fn build_lite(
    cfg: &CrawlerConfig,
    backend: &Arc<dyn Backend>,
    fetcher: &Arc<dyn Fetch>,
    metrics: &Arc<MetricsCollector>,
) -> LitePipeline {
    let lite = &cfg.lite;
    LitePipeline::new(
        backend.clone(),
        fetcher.clone(),
        Marketplace::from_config(&cfg.marketplace),
        LiteSettings {
            max_categories: lite.max_categories,
            request_delay: Duration::from_millis(lite.request_delay_ms),
            jitter: lite.jitter,
            batch_delay: Duration::from_secs(lite.batch_delay_secs),
            idle_wait: Duration::from_secs(lite.idle_wait_secs),
            user_agent: lite.user_agent.clone(),
            log_every: lite.log_every,
            proxies: lite.proxies.clone(),
        },
        metrics.clone(),
    )
}
