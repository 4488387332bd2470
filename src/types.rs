//! Core domain types shared across the trading core

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

impl Side {
    /// Numeric code used inside the EIP-712 order struct (the wire
    /// envelope uses the string form instead)
    pub fn signing_code(&self) -> u8 {
        match self {
            Side::Buy => 0,
            Side::Sell => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

/// Order time-in-force
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    GTC,
    FOK,
    GTD,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::GTC => "GTC",
            OrderType::FOK => "FOK",
            OrderType::GTD => "GTD",
        }
    }
}

/// One tradable outcome token of a binary market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeToken {
    pub token_id: String,
    pub outcome: String,
    /// Market-implied probability, strictly inside (0, 1)
    pub price: Decimal,
}

/// Normalized binary-outcome market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub condition_id: String,
    pub question: String,
    pub end_date: Option<DateTime<Utc>>,
    pub active: bool,
    pub closed: bool,
    pub liquidity: Decimal,
    pub volume: Decimal,
    /// Minimum price increment orders must align to
    pub tick_size: Decimal,
    /// Exactly two tokens (Yes / No)
    pub tokens: Vec<OutcomeToken>,
}

impl Market {
    /// The Yes-side token, if present
    pub fn yes_token(&self) -> Option<&OutcomeToken> {
        self.tokens
            .iter()
            .find(|t| t.outcome.eq_ignore_ascii_case("yes"))
    }

    /// The No-side token, if present
    pub fn no_token(&self) -> Option<&OutcomeToken> {
        self.tokens
            .iter()
            .find(|t| t.outcome.eq_ignore_ascii_case("no"))
    }

    pub fn yes_price(&self) -> Option<Decimal> {
        self.yes_token().map(|t| t.price)
    }

    /// Days until resolution, or None when no deadline is known
    pub fn days_to_resolution(&self, now: DateTime<Utc>) -> Option<f64> {
        self.end_date
            .map(|end| (end - now).num_seconds() as f64 / 86_400.0)
    }

    /// Structural validity: exactly two tokens, every price strictly
    /// inside (0, 1). A price of 0 or 1 means stale venue data and the
    /// market must be discarded, not clamped.
    pub fn is_well_formed(&self) -> bool {
        self.tokens.len() == 2
            && self
                .tokens
                .iter()
                .all(|t| t.price > Decimal::ZERO && t.price < Decimal::ONE)
    }
}

/// A candidate trade produced by the scanner. Read-only projection of a
/// market snapshot; recomputed on every scan and never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Opportunity {
    pub condition_id: String,
    pub question: String,
    pub end_date: Option<DateTime<Utc>>,
    pub token_id: String,
    pub outcome: String,
    pub estimated_probability: Decimal,
    pub market_price: Decimal,
    pub edge: Decimal,
    pub recommended_stake: Decimal,
    pub rationale: String,
}

impl Opportunity {
    /// Expected-value proxy used for ranking (not true EV)
    pub fn score(&self) -> Decimal {
        self.edge * self.recommended_stake
    }
}

/// Trading strategies the agent runs, each with fixed portfolio limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    #[serde(rename = "prediction_markets")]
    PredictionMarkets,
    #[serde(rename = "leveraged_perps")]
    LeveragedPerps,
    #[serde(rename = "spot_momentum")]
    SpotMomentum,
}

/// Per-strategy portfolio limits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyLimits {
    /// Maximum fraction of total portfolio value in open exposure
    pub cap_fraction: Decimal,
    /// Maximum leverage (1 = unleveraged)
    pub max_leverage: Decimal,
}

impl StrategyKind {
    /// Fixed limits table. The fractions are policy, not derived values.
    pub fn limits(&self) -> StrategyLimits {
        use rust_decimal_macros::dec;
        match self {
            StrategyKind::PredictionMarkets => StrategyLimits {
                cap_fraction: dec!(0.15),
                max_leverage: dec!(1),
            },
            StrategyKind::LeveragedPerps => StrategyLimits {
                cap_fraction: dec!(0.10),
                max_leverage: dec!(3),
            },
            StrategyKind::SpotMomentum => StrategyLimits {
                cap_fraction: dec!(0.25),
                max_leverage: dec!(1),
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::PredictionMarkets => "prediction_markets",
            StrategyKind::LeveragedPerps => "leveraged_perps",
            StrategyKind::SpotMomentum => "spot_momentum",
        }
    }
}

/// Position lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    Open,
    PartialExit,
    StopHit,
    Expired,
    Closed,
}

impl PositionStatus {
    /// Legal lifecycle transitions. PartialExit and StopHit mean "action
    /// required" and may still be driven to Closed by the caller;
    /// Closed and Expired are terminal.
    pub fn can_transition_to(&self, next: PositionStatus) -> bool {
        use PositionStatus::*;
        matches!(
            (self, next),
            (Open, PartialExit)
                | (Open, StopHit)
                | (Open, Expired)
                | (Open, Closed)
                | (PartialExit, Closed)
                | (PartialExit, StopHit)
                | (StopHit, Closed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PositionStatus::Closed | PositionStatus::Expired)
    }

    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }
}

/// An owned position record, persisted through the repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub strategy: StrategyKind,
    pub asset_id: String,
    pub status: PositionStatus,
    pub entry_price: Decimal,
    pub current_price: Decimal,
    pub size: Decimal,
    pub cost_basis: Decimal,
    pub current_value: Decimal,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub tx_hash: Option<String>,
    /// Protocol-specific identifiers (token_id, condition_id, outcome, ...)
    pub metadata: HashMap<String, String>,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// Fraction of cost basis lost so far (0 when flat or in profit)
    pub fn drawdown_fraction(&self) -> Decimal {
        if self.cost_basis <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let loss = self.cost_basis - self.current_value;
        if loss <= Decimal::ZERO {
            Decimal::ZERO
        } else {
            loss / self.cost_basis
        }
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// Result of an exposure-cap check. Computed, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureCheck {
    pub allowed: bool,
    pub strategy: StrategyKind,
    pub current_exposure: Decimal,
    pub proposed: Decimal,
    pub cap: Decimal,
    /// Remaining room under the cap before this proposal
    pub headroom: Decimal,
}

/// Urgency of a risk action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Info,
    Warning,
    Critical,
}

/// Kind of action the position manager asks the caller to take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    StopLoss,
    LiquidationWarning,
    Expire,
}

/// Risk action emitted by the price-refresh pass. The position manager
/// reports these; it never executes them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionAction {
    pub position_id: String,
    pub kind: ActionKind,
    pub urgency: Urgency,
    pub reason: String,
}

/// Venue-side live position row from the public positions API
#[derive(Debug, Clone, PartialEq)]
pub struct LivePosition {
    pub asset: String,
    pub condition_id: String,
    pub size: Decimal,
    pub avg_price: Decimal,
    pub cur_price: Decimal,
    pub current_value: Decimal,
    pub cash_pnl: Decimal,
    pub redeemable: bool,
    pub outcome: String,
}

/// Terminal state of an order submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlacedOrderStatus {
    Live,
    Matched,
    Delayed,
    Error,
}

/// Audit record for every order submission attempt. Returned on success
/// and on failure; rejection is carried in `status`/`error`, not raised.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub condition_id: String,
    pub token_id: String,
    pub side: Side,
    pub price: Decimal,
    pub size_usd: Decimal,
    pub status: PlacedOrderStatus,
    pub order_id: Option<String>,
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl PlacedOrder {
    pub fn is_error(&self) -> bool {
        self.status == PlacedOrderStatus::Error
    }
}
