//! Discovery API client
//!
//! Fetches market listings from the unauthenticated discovery endpoint
//! and normalizes them into [`Market`]. The upstream serves two shapes
//! for the same data: newer entries carry a nested token array, older
//! ones carry three parallel JSON-encoded arrays that must be zipped
//! back together by index. The union never leaves this module.
//!
//! Discovery is advisory: network and parse failures degrade to empty
//! results with a warning instead of propagating.

use crate::error::Result;
use crate::types::{Market, OutcomeToken};
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use tracing::{debug, warn};

/// Fixed vocabulary for the relevance filter; questions must mention at
/// least one of these (case-insensitive) to be considered
pub const RELEVANT_KEYWORDS: &[&str] = &[
    "bitcoin",
    "btc",
    "ethereum",
    "eth",
    "solana",
    "sol",
    "crypto",
    "defi",
    "stablecoin",
    "token",
    "coin",
    "blockchain",
    "etf",
    "sec",
    "fed",
    "rate",
    "inflation",
    "recession",
    "halving",
    "airdrop",
];

const DEFAULT_TICK_SIZE: Decimal = dec!(0.01);

/// Listing filters, applied in a fixed order: liquidity, deadline,
/// active/closed, keyword relevance
#[derive(Debug, Clone)]
pub struct MarketFilters {
    pub min_liquidity: Decimal,
    pub max_days_to_resolution: i64,
    pub active_only: bool,
    pub limit: u32,
}

impl Default for MarketFilters {
    fn default() -> Self {
        Self {
            min_liquidity: dec!(1000),
            max_days_to_resolution: 30,
            active_only: true,
            limit: 500,
        }
    }
}

/// Market entry with a nested token array
#[derive(Debug, Clone, Deserialize)]
struct NestedMarket {
    #[serde(rename = "conditionId")]
    condition_id: String,
    question: String,
    #[serde(rename = "endDate")]
    end_date: Option<String>,
    active: Option<bool>,
    closed: Option<bool>,
    liquidity: Option<String>,
    volume: Option<String>,
    #[serde(rename = "orderPriceMinTickSize")]
    tick_size: Option<Decimal>,
    tokens: Vec<NestedToken>,
}

#[derive(Debug, Clone, Deserialize)]
struct NestedToken {
    #[serde(rename = "token_id")]
    token_id: String,
    outcome: String,
    price: Decimal,
}

/// Market entry with parallel JSON-encoded arrays of ids, outcome
/// labels, and prices
#[derive(Debug, Clone, Deserialize)]
struct FlatMarket {
    #[serde(rename = "conditionId")]
    condition_id: String,
    question: String,
    #[serde(rename = "endDate")]
    end_date: Option<String>,
    active: Option<bool>,
    closed: Option<bool>,
    liquidity: Option<String>,
    volume: Option<String>,
    #[serde(rename = "orderPriceMinTickSize")]
    tick_size: Option<Decimal>,
    #[serde(rename = "clobTokenIds")]
    clob_token_ids: String,
    outcomes: String,
    #[serde(rename = "outcomePrices")]
    outcome_prices: String,
}

/// The two upstream response shapes, distinguished structurally
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawMarket {
    Nested(NestedMarket),
    Flat(FlatMarket),
}

impl RawMarket {
    fn condition_id(&self) -> &str {
        match self {
            RawMarket::Nested(m) => &m.condition_id,
            RawMarket::Flat(m) => &m.condition_id,
        }
    }

    /// Normalize into the canonical shape. Markets that are not strictly
    /// binary, or whose prices sit at 0 or 1 (stale venue data), are
    /// rejected rather than patched up.
    fn normalize(self) -> Option<Market> {
        let market = match self {
            RawMarket::Nested(m) => Market {
                condition_id: m.condition_id,
                question: m.question,
                end_date: parse_date(m.end_date.as_deref()),
                active: m.active.unwrap_or(true),
                closed: m.closed.unwrap_or(false),
                liquidity: parse_amount(m.liquidity.as_deref()),
                volume: parse_amount(m.volume.as_deref()),
                tick_size: m.tick_size.unwrap_or(DEFAULT_TICK_SIZE),
                tokens: m
                    .tokens
                    .into_iter()
                    .map(|t| OutcomeToken {
                        token_id: t.token_id,
                        outcome: t.outcome,
                        price: t.price,
                    })
                    .collect(),
            },
            RawMarket::Flat(m) => {
                let ids: Vec<String> = serde_json::from_str(&m.clob_token_ids).ok()?;
                let outcomes: Vec<String> = serde_json::from_str(&m.outcomes).ok()?;
                // Prices arrive as a JSON array of decimal strings
                let prices: Vec<String> = serde_json::from_str(&m.outcome_prices).ok()?;
                if ids.len() != outcomes.len() || ids.len() != prices.len() {
                    return None;
                }

                let tokens = ids
                    .into_iter()
                    .zip(outcomes)
                    .zip(prices)
                    .map(|((token_id, outcome), price)| {
                        Some(OutcomeToken {
                            token_id,
                            outcome,
                            price: price.parse().ok()?,
                        })
                    })
                    .collect::<Option<Vec<_>>>()?;

                Market {
                    condition_id: m.condition_id,
                    question: m.question,
                    end_date: parse_date(m.end_date.as_deref()),
                    active: m.active.unwrap_or(true),
                    closed: m.closed.unwrap_or(false),
                    liquidity: parse_amount(m.liquidity.as_deref()),
                    volume: parse_amount(m.volume.as_deref()),
                    tick_size: m.tick_size.unwrap_or(DEFAULT_TICK_SIZE),
                    tokens,
                }
            }
        };

        market.is_well_formed().then_some(market)
    }
}

fn parse_date(s: Option<&str>) -> Option<DateTime<Utc>> {
    s.and_then(|s| s.parse().ok())
}

fn parse_amount(s: Option<&str>) -> Decimal {
    s.and_then(|s| s.parse().ok()).unwrap_or(Decimal::ZERO)
}

/// Client for the discovery API
#[derive(Clone)]
pub struct DiscoveryClient {
    http: Client,
    base_url: String,
}

impl DiscoveryClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// List active markets matching the filters. Never fails: transport
    /// or parse problems log a warning and return an empty list.
    pub async fn list_markets(&self, filters: &MarketFilters) -> Vec<Market> {
        let raw = match self.fetch_listing(filters.limit).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Market listing failed: {}", e);
                return Vec::new();
            }
        };

        let now = Utc::now();
        let markets: Vec<Market> = raw
            .into_iter()
            .filter_map(|m| {
                let id = m.condition_id().to_string();
                let market = m.normalize();
                if market.is_none() {
                    debug!(condition_id = %id, "Dropping malformed market entry");
                }
                market
            })
            .filter(|m| m.liquidity >= filters.min_liquidity)
            .filter(|m| match m.days_to_resolution(now) {
                Some(days) => days > 0.0 && days <= filters.max_days_to_resolution as f64,
                None => false,
            })
            .filter(|m| !filters.active_only || (m.active && !m.closed))
            .filter(|m| is_relevant(&m.question))
            .collect();

        debug!("Listed {} relevant markets", markets.len());
        markets
    }

    /// Fetch one market by condition id. The direct endpoint sometimes
    /// answers with a different record than the id requested (upstream
    /// inconsistency), in which case one listing page is scanned for the
    /// real match. The original behavior scanned an unbounded listing;
    /// here the scan is capped at `page_limit` rows.
    pub async fn fetch_market(&self, condition_id: &str, page_limit: u32) -> Option<Market> {
        match self.fetch_direct(condition_id).await {
            Ok(Some(market)) if market.condition_id == condition_id => return Some(market),
            Ok(_) => {
                debug!(condition_id, "Direct lookup mismatch, scanning listing");
            }
            Err(e) => {
                warn!(condition_id, "Direct market lookup failed: {}", e);
            }
        }

        match self.fetch_listing(page_limit).await {
            Ok(raw) => raw
                .into_iter()
                .find(|m| m.condition_id() == condition_id)
                .and_then(RawMarket::normalize),
            Err(e) => {
                warn!(condition_id, "Fallback listing scan failed: {}", e);
                None
            }
        }
    }

    async fn fetch_listing(&self, limit: u32) -> Result<Vec<RawMarket>> {
        let url = format!("{}/markets", self.base_url);
        let raw: Vec<RawMarket> = self
            .http
            .get(&url)
            .query(&[
                ("active", "true"),
                ("closed", "false"),
                ("limit", &limit.to_string()),
                ("order", "liquidity"),
            ])
            .send()
            .await?
            .json()
            .await?;
        Ok(raw)
    }

    async fn fetch_direct(&self, condition_id: &str) -> Result<Option<Market>> {
        let url = format!("{}/markets/{}", self.base_url, condition_id);
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Ok(None);
        }
        let raw: RawMarket = resp.json().await?;
        Ok(raw.normalize())
    }
}

/// Case-insensitive substring match against the fixed vocabulary
pub fn is_relevant(question: &str) -> bool {
    let q = question.to_lowercase();
    RELEVANT_KEYWORDS.iter().any(|kw| q.contains(kw))
}
