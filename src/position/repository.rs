//! Position persistence boundary
//!
//! The core treats durable storage as an opaque collaborator behind
//! this trait. The in-memory implementation backs tests and paper
//! trading; production wires a real store.

use crate::error::{AgentError, Result};
use crate::types::{Position, PositionStatus, StrategyKind};
use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Durable store for position records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PositionRepository: Send + Sync {
    /// Open (non-terminal) positions, optionally scoped to a strategy
    async fn get_open_positions(&self, strategy: Option<StrategyKind>) -> Result<Vec<Position>>;

    async fn upsert_position(&self, position: &Position) -> Result<()>;

    async fn get_position(&self, id: &str) -> Result<Option<Position>>;

    /// Update the cached price/value of a position after a refresh
    async fn update_position_price(&self, id: &str, price: Decimal, value: Decimal) -> Result<()>;

    /// Transition a position to Closed with its realized result
    async fn close_position(&self, id: &str, tx_ref: &str, realized_pnl: Decimal) -> Result<()>;

    async fn get_total_realized_pnl(&self) -> Result<Decimal>;
}

/// HashMap-backed repository
#[derive(Default)]
pub struct InMemoryPositionRepository {
    positions: RwLock<HashMap<String, Position>>,
}

impl InMemoryPositionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PositionRepository for InMemoryPositionRepository {
    async fn get_open_positions(&self, strategy: Option<StrategyKind>) -> Result<Vec<Position>> {
        Ok(self
            .positions
            .read()
            .values()
            .filter(|p| p.status.is_open())
            .filter(|p| strategy.map(|s| p.strategy == s).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn upsert_position(&self, position: &Position) -> Result<()> {
        self.positions
            .write()
            .insert(position.id.clone(), position.clone());
        Ok(())
    }

    async fn get_position(&self, id: &str) -> Result<Option<Position>> {
        Ok(self.positions.read().get(id).cloned())
    }

    async fn update_position_price(&self, id: &str, price: Decimal, value: Decimal) -> Result<()> {
        let mut positions = self.positions.write();
        let position = positions
            .get_mut(id)
            .ok_or_else(|| AgentError::Repository(format!("Unknown position {}", id)))?;
        position.current_price = price;
        position.current_value = value;
        position.unrealized_pnl = value - position.cost_basis;
        position.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn close_position(&self, id: &str, tx_ref: &str, realized_pnl: Decimal) -> Result<()> {
        let mut positions = self.positions.write();
        let position = positions
            .get_mut(id)
            .ok_or_else(|| AgentError::Repository(format!("Unknown position {}", id)))?;
        position.status = PositionStatus::Closed;
        position.tx_hash = Some(tx_ref.to_string());
        position.realized_pnl = realized_pnl;
        position.unrealized_pnl = Decimal::ZERO;
        position.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn get_total_realized_pnl(&self) -> Result<Decimal> {
        Ok(self
            .positions
            .read()
            .values()
            .map(|p| p.realized_pnl)
            .sum())
    }
}
