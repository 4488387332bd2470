//! Fixtures for unit tests and paper-trading harnesses

pub use crate::position::InMemoryPositionRepository;

use crate::position::ExecutionFill;
use crate::types::{LivePosition, Market, OutcomeToken, StrategyKind};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// A well-formed binary market resolving in one week, with the Yes
/// token at `yes_price`
pub fn market_with_prices(question: &str, yes_price: Decimal) -> Market {
    Market {
        condition_id: "0xfixture".to_string(),
        question: question.to_string(),
        end_date: Some(Utc::now() + Duration::days(7)),
        active: true,
        closed: false,
        liquidity: dec!(50000),
        volume: dec!(120000),
        tick_size: dec!(0.01),
        tokens: vec![
            OutcomeToken {
                token_id: "yes-token".to_string(),
                outcome: "Yes".to_string(),
                price: yes_price,
            },
            OutcomeToken {
                token_id: "no-token".to_string(),
                outcome: "No".to_string(),
                price: Decimal::ONE - yes_price,
            },
        ],
    }
}

/// An execution fill entering at $0.50 with the given cost basis
pub fn fill(strategy: StrategyKind, asset_id: &str, cost_basis: Decimal) -> ExecutionFill {
    ExecutionFill {
        strategy,
        asset_id: asset_id.to_string(),
        entry_price: dec!(0.50),
        size: cost_basis / dec!(0.50),
        cost_basis,
        tx_hash: None,
        metadata: HashMap::new(),
    }
}

/// A venue snapshot row for the given asset
pub fn live_row(asset: &str, cur_price: Decimal, current_value: Decimal) -> LivePosition {
    LivePosition {
        asset: asset.to_string(),
        condition_id: "0xfixture".to_string(),
        size: dec!(100),
        avg_price: dec!(0.50),
        cur_price,
        current_value,
        cash_pnl: current_value - dec!(50),
        redeemable: false,
        outcome: "Yes".to_string(),
    }
}
