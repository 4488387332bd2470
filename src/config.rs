//! Configuration loading and validation
//!
//! Layered: `config.toml` (optional) overridden by `POLYAGENT_*`
//! environment variables, with `.env` support for local runs.

use crate::error::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub polymarket: PolymarketConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub risk: RiskConfig,
}

impl Config {
    /// Load configuration from a TOML file plus environment overrides
    /// (`POLYAGENT_POLYMARKET__PRIVATE_KEY=...` style)
    pub fn load(path: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("POLYAGENT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

/// Polymarket endpoints and wallet settings
#[derive(Debug, Clone, Deserialize)]
pub struct PolymarketConfig {
    #[serde(default = "default_clob_url")]
    pub clob_url: String,
    #[serde(default = "default_gamma_url")]
    pub gamma_url: String,
    #[serde(default = "default_data_url")]
    pub data_url: String,
    /// Trading wallet private key (hex, 0x prefix optional)
    pub private_key: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Proxy wallet holding funds, when different from the signer
    pub funder_address: Option<String>,
    #[serde(default)]
    pub signature_type: u8,
    /// Preconfigured API credentials; when absent (or exhausted) the
    /// credential manager derives a fresh set via the wallet handshake
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub api_passphrase: Option<String>,
}

fn default_clob_url() -> String {
    "https://clob.polymarket.com".to_string()
}

fn default_gamma_url() -> String {
    "https://gamma-api.polymarket.com".to_string()
}

fn default_data_url() -> String {
    "https://data-api.polymarket.com".to_string()
}

fn default_chain_id() -> u64 {
    137
}

impl PolymarketConfig {
    /// Preconfigured credential triple, if fully present
    pub fn preconfigured_credentials(&self) -> Option<(String, String, String)> {
        match (&self.api_key, &self.api_secret, &self.api_passphrase) {
            (Some(k), Some(s), Some(p)) => Some((k.clone(), s.clone(), p.clone())),
            _ => None,
        }
    }
}

/// Scanner and sizing parameters
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    #[serde(default = "default_min_edge")]
    pub min_edge: Decimal,
    #[serde(default = "default_kelly_fraction")]
    pub kelly_fraction: Decimal,
    /// Opportunities with a recommended stake below this are dropped
    #[serde(default = "default_min_stake_usd")]
    pub min_stake_usd: Decimal,
    #[serde(default = "default_min_liquidity_usd")]
    pub min_liquidity_usd: Decimal,
    #[serde(default = "default_max_days_to_resolution")]
    pub max_days_to_resolution: i64,
    /// Page size for bulk market listings (also bounds the
    /// single-market fallback scan)
    #[serde(default = "default_market_page_limit")]
    pub market_page_limit: u32,
}

fn default_min_edge() -> Decimal {
    dec!(0.05)
}

fn default_kelly_fraction() -> Decimal {
    dec!(0.25)
}

fn default_min_stake_usd() -> Decimal {
    dec!(1)
}

fn default_min_liquidity_usd() -> Decimal {
    dec!(1000)
}

fn default_max_days_to_resolution() -> i64 {
    30
}

fn default_market_page_limit() -> u32 {
    500
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            min_edge: default_min_edge(),
            kelly_fraction: default_kelly_fraction(),
            min_stake_usd: default_min_stake_usd(),
            min_liquidity_usd: default_min_liquidity_usd(),
            max_days_to_resolution: default_max_days_to_resolution(),
            market_page_limit: default_market_page_limit(),
        }
    }
}

/// Portfolio-level risk settings. Per-strategy exposure caps and stop
/// thresholds are fixed policy in `types::StrategyKind::limits` and
/// `position`, not configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: usize,
    #[serde(default = "default_min_balance_reserve")]
    pub min_balance_reserve: Decimal,
}

fn default_max_open_positions() -> usize {
    10
}

fn default_min_balance_reserve() -> Decimal {
    dec!(100)
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_open_positions: default_max_open_positions(),
            min_balance_reserve: default_min_balance_reserve(),
        }
    }
}
