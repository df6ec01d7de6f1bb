use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::duration::deserialize_duration;

fn default_listen_addr() -> SocketAddr {
    "127.0.0.1:3000".parse().expect("valid default listen addr")
}

fn default_cache_ttl() -> Duration {
    crate::cache::DEFAULT_TTL
}

fn default_sweep_interval() -> Duration {
    crate::cache::DEFAULT_SWEEP_INTERVAL
}

fn default_publish_interval() -> Duration {
    crate::publisher::DEFAULT_PUBLISH_INTERVAL
}

fn default_confirmation_timeout() -> Duration {
    crate::publisher::DEFAULT_CONFIRMATION_TIMEOUT
}

fn default_ledger_poll_interval() -> Duration {
    crate::ledger::DEFAULT_POLL_INTERVAL
}

fn default_ledger_endpoint() -> String {
    "http://localhost:8547/relay".to_string()
}

fn default_true() -> bool {
    true
}

/// Snapshot cache settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a reconciled snapshot stays fresh.
    #[serde(deserialize_with = "deserialize_duration")]
    pub ttl: Duration,

    /// Background eviction period for expired entries.
    #[serde(deserialize_with = "deserialize_duration")]
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_cache_ttl(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

/// Settings for one upstream quote provider.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Override the provider's API base URL (useful against mock servers).
    pub base_url: Option<String>,

    /// API key passed through to the provider, when it wants one.
    pub api_key: Option<String>,
}

/// Both providers, keyed the way the TOML sections are named.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub coinmarketcap: ProviderConfig,
    pub coingecko: ProviderConfig,
}

/// Publish-cycle scheduling settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Disable the publish loop entirely (snapshot API keeps working).
    pub enabled: bool,

    /// Wall-clock interval between publish cycles.
    #[serde(deserialize_with = "deserialize_duration")]
    pub interval: Duration,

    /// Run one cycle immediately at startup.
    pub publish_on_start: bool,

    /// Upper bound on waiting for ledger confirmation.
    #[serde(deserialize_with = "deserialize_duration")]
    pub confirmation_timeout: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval: default_publish_interval(),
            publish_on_start: default_true(),
            confirmation_timeout: default_confirmation_timeout(),
        }
    }
}

/// Ledger relay settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Base URL of the transaction relay.
    pub endpoint: String,

    /// Pause between confirmation polls.
    #[serde(deserialize_with = "deserialize_duration")]
    pub poll_interval: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_ledger_endpoint(),
            poll_interval: default_ledger_poll_interval(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP API binds to.
    pub listen_addr: SocketAddr,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub publisher: PublisherConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            cache: CacheConfig::default(),
            providers: ProvidersConfig::default(),
            publisher: PublisherConfig::default(),
            ledger: LedgerConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from a file, or return default config if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.cache.ttl, Duration::from_secs(300));
        assert_eq!(config.cache.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.publisher.interval, Duration::from_secs(30 * 60));
        assert_eq!(
            config.publisher.confirmation_timeout,
            Duration::from_secs(120)
        );
        assert!(config.publisher.enabled);
        assert!(config.publisher.publish_on_start);
    }

    #[test]
    fn parses_full_config() {
        let toml = r#"
            listen_addr = "0.0.0.0:8080"

            [cache]
            ttl = "10m"
            sweep_interval = "2m"

            [providers.coinmarketcap]
            api_key = "cmc-key"

            [providers.coingecko]
            base_url = "http://localhost:9999"

            [publisher]
            enabled = false
            interval = "1h"
            publish_on_start = false
            confirmation_timeout = "90s"

            [ledger]
            endpoint = "http://relay.internal/api"
            poll_interval = "5s"
        "#;

        let config: Config = toml::from_str(toml).expect("parse config");
        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.cache.ttl, Duration::from_secs(600));
        assert_eq!(
            config.providers.coinmarketcap.api_key.as_deref(),
            Some("cmc-key")
        );
        assert_eq!(
            config.providers.coingecko.base_url.as_deref(),
            Some("http://localhost:9999")
        );
        assert!(!config.publisher.enabled);
        assert_eq!(config.publisher.interval, Duration::from_secs(3600));
        assert!(!config.publisher.publish_on_start);
        assert_eq!(config.ledger.endpoint, "http://relay.internal/api");
        assert_eq!(config.ledger.poll_interval, Duration::from_secs(5));
    }

    #[test]
    fn partial_sections_fall_back_to_defaults() {
        let toml = r#"
            [publisher]
            interval = "15m"
        "#;

        let config: Config = toml::from_str(toml).expect("parse config");
        assert_eq!(config.publisher.interval, Duration::from_secs(15 * 60));
        assert!(config.publisher.enabled);
        assert_eq!(config.cache.ttl, Duration::from_secs(300));
    }
}
