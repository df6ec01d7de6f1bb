use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use supply_oracle::cache::TtlCache;
use supply_oracle::config::{Config, ProviderConfig};
use supply_oracle::ledger::{HttpLedgerClient, LedgerClient};
use supply_oracle::providers::{CoinGeckoProvider, CoinMarketCapProvider, QuoteProvider};
use supply_oracle::publisher::SupplyPublisher;
use supply_oracle::server::{self, AppState};
use supply_oracle::snapshot::SnapshotService;

fn parse_duration_arg(s: &str) -> Result<Duration, String> {
    supply_oracle::duration::parse_duration(s).map_err(|e| e.to_string())
}

#[derive(Parser, Debug)]
#[command(name = "supply-oracle")]
#[command(about = "Reconciled circulating-supply API with periodic on-chain publishing")]
struct Cli {
    /// Path to config file.
    #[arg(short, long, default_value = "supply-oracle.toml")]
    config: PathBuf,

    /// Override the publish interval (e.g. "30m", "1h").
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_arg)]
    interval: Option<Duration>,

    /// Override the snapshot cache TTL (e.g. "300s", "10m").
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_arg)]
    ttl: Option<Duration>,

    /// Skip the immediate publish cycle at startup.
    #[arg(long)]
    no_publish_on_start: bool,

    /// Serve the snapshot API without the publish loop.
    #[arg(long)]
    no_publisher: bool,
}

fn build_coinmarketcap(config: &ProviderConfig) -> CoinMarketCapProvider {
    let mut provider = CoinMarketCapProvider::new();
    if let Some(base_url) = &config.base_url {
        provider = provider.with_base_url(base_url);
    }
    if let Some(api_key) = &config.api_key {
        provider = provider.with_api_key(api_key);
    }
    provider
}

fn build_coingecko(config: &ProviderConfig) -> CoinGeckoProvider {
    let mut provider = CoinGeckoProvider::new();
    if let Some(base_url) = &config.base_url {
        provider = provider.with_base_url(base_url);
    }
    if let Some(api_key) = &config.api_key {
        provider = provider.with_api_key(api_key);
    }
    provider
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config: {}", cli.config.display()))?;

    if let Some(interval) = cli.interval {
        config.publisher.interval = interval;
    }
    if let Some(ttl) = cli.ttl {
        config.cache.ttl = ttl;
    }
    if cli.no_publish_on_start {
        config.publisher.publish_on_start = false;
    }
    if cli.no_publisher {
        config.publisher.enabled = false;
    }

    let cache = Arc::new(TtlCache::new(config.cache.ttl));
    let sweeper = cache.spawn_sweeper(config.cache.sweep_interval);

    let primary: Arc<dyn QuoteProvider> =
        Arc::new(build_coinmarketcap(&config.providers.coinmarketcap));
    let secondary: Arc<dyn QuoteProvider> = Arc::new(build_coingecko(&config.providers.coingecko));

    let snapshots = Arc::new(
        SnapshotService::new(cache, primary, secondary).with_ttl(config.cache.ttl),
    );

    let (publisher, publisher_handle) = if config.publisher.enabled {
        let ledger: Arc<dyn LedgerClient> = Arc::new(
            HttpLedgerClient::new(&config.ledger.endpoint)
                .with_poll_interval(config.ledger.poll_interval),
        );
        let publisher = Arc::new(
            SupplyPublisher::new(snapshots.clone(), ledger)
                .with_interval(config.publisher.interval)
                .with_confirmation_timeout(config.publisher.confirmation_timeout),
        );
        let handle = publisher.clone().spawn(config.publisher.publish_on_start);
        info!(
            interval_secs = config.publisher.interval.as_secs(),
            ledger = %config.ledger.endpoint,
            "publish loop started"
        );
        (Some(publisher), Some(handle))
    } else {
        warn!("publish loop disabled; serving snapshot API only");
        (None, None)
    };

    let app = server::router(AppState {
        snapshots,
        publisher,
    });

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "listening");

    tokio::select! {
        result = axum::serve(listener, app) => {
            result.context("HTTP server exited")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    if let Some(handle) = publisher_handle {
        handle.shutdown().await;
    }
    sweeper.abort();

    Ok(())
}
