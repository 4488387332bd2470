//! Opportunity scanner
//!
//! Lists candidate markets, runs the probability rule engine, and turns
//! sufficient edges into Kelly-sized opportunities. Opportunities are
//! projections of a single scan; nothing here is persisted.

pub mod kelly;
pub mod rules;

pub use kelly::{kelly_size, KellySize, MAX_BANKROLL_FRACTION};
pub use rules::{estimate_probability, Estimate, ScanContext, MIN_CONFIDENCE};

use crate::client::{DiscoveryClient, MarketFilters};
use crate::config::{RiskConfig, StrategyConfig};
use crate::types::{Market, Opportunity};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

/// Scans the discovery feed for mispriced binary markets
pub struct OpportunityScanner {
    discovery: DiscoveryClient,
    config: StrategyConfig,
    risk: RiskConfig,
}

impl OpportunityScanner {
    pub fn new(discovery: DiscoveryClient, config: StrategyConfig, risk: RiskConfig) -> Self {
        Self {
            discovery,
            config,
            risk,
        }
    }

    /// One full scan pass. Results are sorted by `edge * stake`, an
    /// expected-value proxy.
    pub async fn scan(&self, bankroll: Decimal, ctx: &ScanContext) -> Vec<Opportunity> {
        let filters = MarketFilters {
            min_liquidity: self.config.min_liquidity_usd,
            max_days_to_resolution: self.config.max_days_to_resolution,
            active_only: true,
            limit: self.config.market_page_limit,
        };
        let markets = self.discovery.list_markets(&filters).await;
        let now = Utc::now();

        // Sizing never touches the reserved balance
        let effective_bankroll = (bankroll - self.risk.min_balance_reserve).max(Decimal::ZERO);

        let mut opportunities: Vec<Opportunity> = markets
            .iter()
            .flat_map(|m| self.evaluate_market(m, ctx, effective_bankroll, now))
            .collect();

        opportunities.sort_by(|a, b| b.score().cmp(&a.score()));
        info!(
            markets = markets.len(),
            opportunities = opportunities.len(),
            "Scan complete"
        );
        opportunities
    }

    /// Evaluate both outcome sides of one market against the estimator
    pub fn evaluate_market(
        &self,
        market: &Market,
        ctx: &ScanContext,
        bankroll: Decimal,
        now: DateTime<Utc>,
    ) -> Vec<Opportunity> {
        let estimate = estimate_probability(market, ctx, now);
        if estimate.confidence < MIN_CONFIDENCE {
            return Vec::new();
        }

        let mut found = Vec::new();
        for token in &market.tokens {
            // The estimator prices the Yes outcome; the No side is its
            // complement
            let q = if token.outcome.eq_ignore_ascii_case("yes") {
                estimate.probability
            } else {
                Decimal::ONE - estimate.probability
            };
            let p = token.price;
            let edge = q - p;
            if edge < self.config.min_edge {
                continue;
            }

            let size = kelly_size(p, q, bankroll, self.config.kelly_fraction, self.config.min_edge);
            if size.usd < self.config.min_stake_usd {
                debug!(
                    condition_id = %market.condition_id,
                    outcome = %token.outcome,
                    "Edge found but stake below floor"
                );
                continue;
            }

            found.push(Opportunity {
                condition_id: market.condition_id.clone(),
                question: market.question.clone(),
                end_date: market.end_date,
                token_id: token.token_id.clone(),
                outcome: token.outcome.clone(),
                estimated_probability: q,
                market_price: p,
                edge,
                recommended_stake: size.usd,
                rationale: estimate.rationale.clone(),
            });
        }
        found
    }
}
