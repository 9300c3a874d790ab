//! Configuration management for the trade mirror.

use crate::types::{SideFilter, SizingStrategy};
use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Application configuration. Immutable for the process lifetime.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data_api: DataApiConfig,
    pub mirror: MirrorConfig,
    pub risk: RiskLimits,
    #[serde(default)]
    pub redeem: RedeemConfig,
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataApiConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// Maximum rows requested per call.
    pub page_limit: u32,
    /// Pages fetched per trader poll before the window is cut short.
    pub max_pages: u32,
}

impl Default for DataApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://data-api.polymarket.com".to_string(),
            request_timeout_secs: 15,
            page_limit: 500,
            max_pages: 20,
        }
    }
}

/// What to mirror and how often.
#[derive(Debug, Clone, Deserialize)]
pub struct MirrorConfig {
    /// The operator's own account (positions are read from here).
    pub account: String,
    /// Trader addresses to mirror.
    pub traders: Vec<String>,
    pub strategy: SizingStrategy,
    /// Per-trader ratio overrides, keyed by lowercased address.
    #[serde(default)]
    pub trader_ratios: HashMap<String, Decimal>,
    #[serde(default)]
    pub side_filter: SideFilter,
    #[serde(default = "default_lookback_secs")]
    pub lookback_secs: i64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_seen_retention_secs")]
    pub seen_retention_secs: i64,
    #[serde(default = "default_position_cache_ttl_secs")]
    pub position_cache_ttl_secs: i64,
}

impl MirrorConfig {
    /// Ratio for a trader: the override if configured, else the global ratio.
    pub fn ratio_for(&self, trader: &str) -> Option<Decimal> {
        if !self.strategy.is_ratio_based() {
            return None;
        }
        self.trader_ratios
            .get(&trader.to_lowercase())
            .copied()
            .or(Some(self.strategy.amount()))
    }

    /// Seen-trade retention, never shorter than the lookback window.
    pub fn effective_retention_secs(&self) -> i64 {
        self.seen_retention_secs.max(self.lookback_secs)
    }
}

/// Risk limits applied by the clamp pipeline (all in USD).
#[derive(Debug, Clone, Deserialize)]
pub struct RiskLimits {
    #[serde(default = "default_min_trade_usd")]
    pub min_trade_usd: Decimal,
    pub max_trade_usd: Decimal,
    pub daily_cap_usd: Decimal,
    pub position_cap_usd: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedeemConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    /// Seconds after an attempt before the same market is tried again.
    pub cooldown_secs: i64,
}

impl Default for RedeemConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 300,
            cooldown_secs: 3600,
        }
    }
}

fn default_state_path() -> PathBuf {
    PathBuf::from("state/mirror_state.json")
}

fn default_lookback_secs() -> i64 {
    3600
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_seen_retention_secs() -> i64 {
    7 * 24 * 3600
}

fn default_position_cache_ttl_secs() -> i64 {
    30
}

fn default_min_trade_usd() -> Decimal {
    Decimal::ONE
}

/// Read and parse an optional variable; a present but malformed value is an error.
fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::config(format!("{key} has an invalid value: {raw}"))),
        Err(_) => Ok(None),
    }
}

fn env_required<T: FromStr>(key: &str) -> Result<T> {
    env_parse(key)?.ok_or_else(|| Error::config(format!("{key} environment variable not set")))
}

/// Parse `addr=ratio,addr=ratio` into lowercased overrides.
pub fn parse_trader_ratios(raw: &str) -> Result<HashMap<String, Decimal>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (addr, ratio) = pair
                .split_once('=')
                .ok_or_else(|| Error::config(format!("malformed trader ratio: {pair}")))?;
            let ratio = Decimal::from_str(ratio.trim())
                .map_err(|_| Error::config(format!("malformed trader ratio: {pair}")))?;
            Ok((addr.trim().to_lowercase(), ratio))
        })
        .collect()
}

fn parse_traders(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

impl Config {
    /// Load configuration from environment variables.
    #[allow(clippy::result_large_err)]
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let strategy_name = env::var("COPY_STRATEGY").unwrap_or_else(|_| "percent_usd".to_string());
        let strategy = SizingStrategy::from_parts(
            &strategy_name,
            env_parse("COPY_RATIO")?,
            env_parse("COPY_FIXED_USD")?,
            env_parse("COPY_FIXED_SHARES")?,
        )
        .map_err(Error::config)?;

        let side_filter = env::var("COPY_SIDE")
            .ok()
            .map(|s| s.parse::<SideFilter>())
            .transpose()
            .map_err(Error::config)?
            .unwrap_or_default();

        let traders = parse_traders(&env_required::<String>("COPY_TRADERS")?);
        let trader_ratios = match env::var("COPY_TRADER_RATIOS") {
            Ok(raw) => parse_trader_ratios(&raw)?,
            Err(_) => HashMap::new(),
        };

        let defaults = DataApiConfig::default();
        let redeem_defaults = RedeemConfig::default();

        let config = Self {
            data_api: DataApiConfig {
                base_url: env::var("DATA_API_URL").unwrap_or(defaults.base_url),
                request_timeout_secs: env_parse("DATA_API_TIMEOUT_SECS")?
                    .unwrap_or(defaults.request_timeout_secs),
                page_limit: env_parse("DATA_API_PAGE_LIMIT")?.unwrap_or(defaults.page_limit),
                max_pages: env_parse("DATA_API_MAX_PAGES")?.unwrap_or(defaults.max_pages),
            },
            mirror: MirrorConfig {
                account: env_required::<String>("COPY_ACCOUNT")?.to_lowercase(),
                traders,
                strategy,
                trader_ratios,
                side_filter,
                lookback_secs: env_parse("COPY_LOOKBACK_SECS")?
                    .unwrap_or_else(default_lookback_secs),
                poll_interval_secs: env_parse("COPY_POLL_SECS")?
                    .unwrap_or_else(default_poll_interval_secs),
                seen_retention_secs: env_parse("COPY_SEEN_RETENTION_SECS")?
                    .unwrap_or_else(default_seen_retention_secs),
                position_cache_ttl_secs: env_parse("POSITION_CACHE_TTL_SECS")?
                    .unwrap_or_else(default_position_cache_ttl_secs),
            },
            risk: RiskLimits {
                min_trade_usd: env_parse("COPY_MIN_TRADE_USD")?
                    .unwrap_or_else(default_min_trade_usd),
                max_trade_usd: env_required("COPY_MAX_TRADE_USD")?,
                daily_cap_usd: env_required("COPY_DAILY_CAP_USD")?,
                position_cap_usd: env_required("COPY_POSITION_CAP_USD")?,
            },
            redeem: RedeemConfig {
                enabled: env::var("REDEEM_ENABLED")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(redeem_defaults.enabled),
                interval_secs: env_parse("REDEEM_POLL_SECS")?
                    .unwrap_or(redeem_defaults.interval_secs),
                cooldown_secs: env_parse("REDEEM_COOLDOWN_SECS")?
                    .unwrap_or(redeem_defaults.cooldown_secs),
            },
            state_path: env::var("STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_state_path()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    #[allow(clippy::result_large_err)]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut config: Self = ::config::Config::builder()
            .add_source(::config::File::from(path.as_ref()))
            .build()?
            .try_deserialize()?;

        config.mirror.account = config.mirror.account.to_lowercase();
        config.mirror.traders = config
            .mirror
            .traders
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        config.mirror.trader_ratios = std::mem::take(&mut config.mirror.trader_ratios)
            .into_iter()
            .map(|(addr, ratio)| (addr.to_lowercase(), ratio))
            .collect();

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot be run safely.
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        let mirror = &self.mirror;
        let risk = &self.risk;

        if self.data_api.page_limit == 0 || self.data_api.max_pages == 0 {
            return Err(Error::config("Data API page limit and page count must be non-zero"));
        }
        if mirror.account.is_empty() {
            return Err(Error::config("account address is empty"));
        }
        if mirror.traders.is_empty() {
            return Err(Error::config("no traders configured"));
        }
        if mirror.strategy.amount() <= Decimal::ZERO {
            return Err(Error::config(format!(
                "sizing amount must be positive: {}",
                mirror.strategy
            )));
        }
        if let Some((addr, ratio)) = mirror
            .trader_ratios
            .iter()
            .find(|(_, ratio)| **ratio <= Decimal::ZERO)
        {
            return Err(Error::config(format!(
                "ratio override for {addr} must be positive, got {ratio}"
            )));
        }
        if mirror.lookback_secs <= 0 {
            return Err(Error::config("lookback window must be positive"));
        }
        if mirror.poll_interval_secs == 0 {
            return Err(Error::config("mirror poll interval must be non-zero"));
        }
        if mirror.position_cache_ttl_secs < 0 {
            return Err(Error::config("position cache TTL must not be negative"));
        }
        if risk.min_trade_usd < Decimal::ZERO {
            return Err(Error::config("minimum trade size must not be negative"));
        }
        if risk.min_trade_usd > risk.max_trade_usd {
            return Err(Error::config(format!(
                "minimum trade size {} exceeds maximum {}",
                risk.min_trade_usd, risk.max_trade_usd
            )));
        }
        if risk.daily_cap_usd <= Decimal::ZERO || risk.position_cap_usd <= Decimal::ZERO {
            return Err(Error::config("daily and position caps must be positive"));
        }
        if self.redeem.enabled && self.redeem.interval_secs == 0 {
            return Err(Error::config("redeem poll interval must be non-zero"));
        }
        if self.redeem.cooldown_secs < 0 {
            return Err(Error::config("redeem cooldown must not be negative"));
        }
        Ok(())
    }

    /// Configuration for testing (with defaults).
    pub fn test_config() -> Self {
        Self {
            data_api: DataApiConfig::default(),
            mirror: MirrorConfig {
                account: "0xoperator".to_string(),
                traders: vec!["0xtrader".to_string()],
                strategy: SizingStrategy::PercentUsd {
                    ratio: Decimal::new(25, 2),
                },
                trader_ratios: HashMap::new(),
                side_filter: SideFilter::Both,
                lookback_secs: default_lookback_secs(),
                poll_interval_secs: default_poll_interval_secs(),
                seen_retention_secs: default_seen_retention_secs(),
                position_cache_ttl_secs: default_position_cache_ttl_secs(),
            },
            risk: RiskLimits {
                min_trade_usd: Decimal::ONE,
                max_trade_usd: Decimal::new(100, 0),
                daily_cap_usd: Decimal::new(1000, 0),
                position_cap_usd: Decimal::new(500, 0),
            },
            redeem: RedeemConfig::default(),
            state_path: default_state_path(),
        }
    }
}
