//! Position lifecycle management
//!
//! Owns the position state machine, per-strategy exposure gating, and
//! the periodic price-refresh pass. Risk findings are returned as
//! actions for the caller to execute; the manager reports, it does not
//! act.

pub mod repository;

pub use repository::{InMemoryPositionRepository, PositionRepository};

use crate::config::RiskConfig;
use crate::error::{AgentError, Result};
use crate::types::{
    ActionKind, ExposureCheck, LivePosition, Position, PositionAction, PositionStatus,
    StrategyKind, Urgency,
};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Drawdown of cost basis at which a prediction-market position is
/// flagged for stop-loss
pub const PREDICTION_STOP_DRAWDOWN: Decimal = dec!(0.60);

/// Distance-to-liquidation fraction below which a leveraged position is
/// flagged
pub const LIQUIDATION_PROXIMITY: Decimal = dec!(0.20);

/// Metadata key carrying a leveraged position's liquidation price
pub const META_LIQUIDATION_PRICE: &str = "liquidation_price";

/// Fill details used to open a position after an order executes
#[derive(Debug, Clone)]
pub struct ExecutionFill {
    pub strategy: StrategyKind,
    /// Venue asset identifier (the outcome token id for prediction
    /// markets)
    pub asset_id: String,
    pub entry_price: Decimal,
    pub size: Decimal,
    /// Quote currency spent to enter
    pub cost_basis: Decimal,
    pub tx_hash: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Outcome of an exposure-gated open
#[derive(Debug, Clone)]
pub enum OpenResult {
    Opened(Position),
    /// Cap exceeded; the check carries the headroom for diagnostics
    Denied(ExposureCheck),
}

/// Manages position records over an injected repository
pub struct PositionManager {
    repository: Arc<dyn PositionRepository>,
    risk: RiskConfig,
    /// Serializes check-then-open so concurrent opens cannot both pass
    /// the same headroom
    gate: tokio::sync::Mutex<()>,
}

impl PositionManager {
    pub fn new(repository: Arc<dyn PositionRepository>, risk: RiskConfig) -> Self {
        Self {
            repository,
            risk,
            gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Would a new `proposed_usd` position fit the strategy's share of
    /// the portfolio?
    pub async fn check_exposure(
        &self,
        strategy: StrategyKind,
        proposed_usd: Decimal,
        total_portfolio_usd: Decimal,
    ) -> Result<ExposureCheck> {
        let open = self.repository.get_open_positions(Some(strategy)).await?;
        let current_exposure: Decimal = open.iter().map(|p| p.current_value).sum();
        let cap = strategy.limits().cap_fraction * total_portfolio_usd;
        let headroom = cap - current_exposure;

        Ok(ExposureCheck {
            allowed: current_exposure + proposed_usd <= cap,
            strategy,
            current_exposure,
            proposed: proposed_usd,
            cap,
            headroom,
        })
    }

    /// Check exposure and open in one critical section. A denied check
    /// is a first-class result, not an error.
    pub async fn check_and_open(
        &self,
        fill: ExecutionFill,
        total_portfolio_usd: Decimal,
    ) -> Result<OpenResult> {
        let _guard = self.gate.lock().await;

        let open_count = self.repository.get_open_positions(None).await?.len();
        if open_count >= self.risk.max_open_positions {
            return Err(AgentError::RiskLimit(format!(
                "Max open positions ({}) reached",
                self.risk.max_open_positions
            )));
        }

        let check = self
            .check_exposure(fill.strategy, fill.cost_basis, total_portfolio_usd)
            .await?;
        if !check.allowed {
            warn!(
                strategy = fill.strategy.as_str(),
                proposed = %fill.cost_basis,
                headroom = %check.headroom,
                "Exposure cap would be exceeded"
            );
            return Ok(OpenResult::Denied(check));
        }
        let position = self.open_position(fill).await?;
        Ok(OpenResult::Opened(position))
    }

    /// Create and persist a position from an execution fill
    pub async fn open_position(&self, fill: ExecutionFill) -> Result<Position> {
        let now = Utc::now();
        let position = Position {
            id: uuid::Uuid::new_v4().to_string(),
            strategy: fill.strategy,
            asset_id: fill.asset_id,
            status: PositionStatus::Open,
            entry_price: fill.entry_price,
            current_price: fill.entry_price,
            size: fill.size,
            cost_basis: fill.cost_basis,
            current_value: fill.cost_basis,
            realized_pnl: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            tx_hash: fill.tx_hash,
            metadata: fill.metadata,
            opened_at: now,
            updated_at: now,
        };
        self.repository.upsert_position(&position).await?;
        info!(
            id = %position.id,
            strategy = position.strategy.as_str(),
            asset = %position.asset_id,
            cost = %position.cost_basis,
            "Opened position"
        );
        Ok(position)
    }

    /// Re-price every open position against a fresh venue snapshot and
    /// collect the risk actions the caller should take. Positions gone
    /// from the snapshot have resolved or been liquidated venue-side.
    pub async fn refresh_positions(&self, live: &[LivePosition]) -> Result<Vec<PositionAction>> {
        let open = self.repository.get_open_positions(None).await?;
        let mut actions = Vec::new();

        for mut position in open {
            let token_id = position.meta("token_id").map(str::to_string);
            let snapshot = live
                .iter()
                .find(|l| l.asset == position.asset_id || token_id.as_deref() == Some(&l.asset));

            let Some(snapshot) = snapshot else {
                actions.push(PositionAction {
                    position_id: position.id.clone(),
                    kind: ActionKind::Expire,
                    urgency: Urgency::Warning,
                    reason: format!(
                        "Position {} no longer in venue data; market likely resolved",
                        position.asset_id
                    ),
                });
                continue;
            };

            self.repository
                .update_position_price(&position.id, snapshot.cur_price, snapshot.current_value)
                .await?;
            position.current_price = snapshot.cur_price;
            position.current_value = snapshot.current_value;

            if let Some(action) = evaluate_stop_rules(&position) {
                actions.push(action);
            }
        }

        Ok(actions)
    }

    /// Close with the caller-supplied exit accounting
    pub async fn close_position(
        &self,
        id: &str,
        exit_price: Decimal,
        tx_ref: &str,
        proceeds: Decimal,
    ) -> Result<Position> {
        let position = self
            .repository
            .get_position(id)
            .await?
            .ok_or_else(|| AgentError::Repository(format!("Unknown position {}", id)))?;
        if !position.status.can_transition_to(PositionStatus::Closed) {
            return Err(AgentError::Repository(format!(
                "Position {} cannot close from {:?}",
                id, position.status
            )));
        }

        let realized_pnl = proceeds - position.cost_basis;
        self.repository
            .close_position(id, tx_ref, realized_pnl)
            .await?;
        info!(
            id,
            exit_price = %exit_price,
            realized = %realized_pnl,
            "Closed position"
        );

        self.repository
            .get_position(id)
            .await?
            .ok_or_else(|| AgentError::Repository(format!("Position {} vanished on close", id)))
    }

    /// Validated lifecycle transition (PartialExit, StopHit, Expired)
    pub async fn transition(&self, id: &str, next: PositionStatus) -> Result<Position> {
        let mut position = self
            .repository
            .get_position(id)
            .await?
            .ok_or_else(|| AgentError::Repository(format!("Unknown position {}", id)))?;
        if !position.status.can_transition_to(next) {
            return Err(AgentError::Repository(format!(
                "Illegal transition {:?} -> {:?} for {}",
                position.status, next, id
            )));
        }
        position.status = next;
        position.updated_at = Utc::now();
        self.repository.upsert_position(&position).await?;
        Ok(position)
    }

    pub async fn total_realized_pnl(&self) -> Result<Decimal> {
        self.repository.get_total_realized_pnl().await
    }
}

/// Per-strategy stop rules, evaluated on the freshly re-priced position
fn evaluate_stop_rules(position: &Position) -> Option<PositionAction> {
    match position.strategy {
        StrategyKind::PredictionMarkets => {
            let drawdown = position.drawdown_fraction();
            if drawdown > PREDICTION_STOP_DRAWDOWN {
                return Some(PositionAction {
                    position_id: position.id.clone(),
                    kind: ActionKind::StopLoss,
                    urgency: Urgency::Critical,
                    reason: format!(
                        "Down {}% of cost basis (threshold {}%)",
                        (drawdown * dec!(100)).round_dp(1),
                        PREDICTION_STOP_DRAWDOWN * dec!(100)
                    ),
                });
            }
            None
        }
        StrategyKind::LeveragedPerps => {
            let liquidation: Decimal = position.meta(META_LIQUIDATION_PRICE)?.parse().ok()?;
            if position.current_price <= Decimal::ZERO {
                return None;
            }
            let proximity = (position.current_price - liquidation).abs() / position.current_price;
            if proximity < LIQUIDATION_PROXIMITY {
                return Some(PositionAction {
                    position_id: position.id.clone(),
                    kind: ActionKind::LiquidationWarning,
                    urgency: Urgency::Critical,
                    reason: format!(
                        "Price {} within {}% of liquidation at {}",
                        position.current_price,
                        (proximity * dec!(100)).round_dp(1),
                        liquidation
                    ),
                });
            }
            None
        }
        StrategyKind::SpotMomentum => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fill, live_row};

    fn manager() -> PositionManager {
        PositionManager::new(
            Arc::new(InMemoryPositionRepository::new()),
            RiskConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_exposure_headroom_arithmetic() {
        let mgr = manager();
        // Seed $100 of open prediction-market exposure
        let fill = fill(StrategyKind::PredictionMarkets, "tok-1", dec!(100));
        mgr.open_position(fill).await.unwrap();

        // Cap is 15% of $1000 = $150, so headroom is $50
        let ok = mgr
            .check_exposure(StrategyKind::PredictionMarkets, dec!(40), dec!(1000))
            .await
            .unwrap();
        assert!(ok.allowed);
        assert_eq!(ok.headroom, dec!(50));

        let denied = mgr
            .check_exposure(StrategyKind::PredictionMarkets, dec!(60), dec!(1000))
            .await
            .unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.headroom, dec!(50));
    }

    #[tokio::test]
    async fn test_exposure_is_per_strategy() {
        let mgr = manager();
        mgr.open_position(fill(StrategyKind::PredictionMarkets, "tok-1", dec!(140)))
            .await
            .unwrap();

        // Other strategies are unaffected by prediction-market exposure
        let check = mgr
            .check_exposure(StrategyKind::SpotMomentum, dec!(200), dec!(1000))
            .await
            .unwrap();
        assert!(check.allowed);
    }

    #[tokio::test]
    async fn test_check_and_open_denies_over_cap() {
        let mgr = manager();
        mgr.open_position(fill(StrategyKind::PredictionMarkets, "tok-1", dec!(100)))
            .await
            .unwrap();

        let result = mgr
            .check_and_open(
                fill(StrategyKind::PredictionMarkets, "tok-2", dec!(60)),
                dec!(1000),
            )
            .await
            .unwrap();
        assert!(matches!(result, OpenResult::Denied(_)));

        let result = mgr
            .check_and_open(
                fill(StrategyKind::PredictionMarkets, "tok-3", dec!(50)),
                dec!(1000),
            )
            .await
            .unwrap();
        assert!(matches!(result, OpenResult::Opened(_)));
    }

    #[tokio::test]
    async fn test_check_and_open_enforces_position_count() {
        let mgr = PositionManager::new(
            Arc::new(InMemoryPositionRepository::new()),
            RiskConfig {
                max_open_positions: 1,
                ..RiskConfig::default()
            },
        );
        mgr.open_position(fill(StrategyKind::PredictionMarkets, "tok-1", dec!(10)))
            .await
            .unwrap();

        let err = mgr
            .check_and_open(
                fill(StrategyKind::PredictionMarkets, "tok-2", dec!(10)),
                dec!(1000),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::RiskLimit(_)));
    }

    #[tokio::test]
    async fn test_repository_errors_propagate() {
        let mut repo = repository::MockPositionRepository::new();
        repo.expect_get_open_positions()
            .returning(|_| Err(AgentError::Repository("store offline".into())));
        let mgr = PositionManager::new(Arc::new(repo), RiskConfig::default());

        let err = mgr
            .check_exposure(StrategyKind::PredictionMarkets, dec!(1), dec!(100))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Repository(_)));
    }

    #[tokio::test]
    async fn test_refresh_emits_critical_stop_loss() {
        let mgr = manager();
        let position = mgr
            .open_position(fill(StrategyKind::PredictionMarkets, "tok-1", dec!(100)))
            .await
            .unwrap();

        // Value collapsed to $35: a 65% drawdown, past the 60% stop
        let live = vec![live_row("tok-1", dec!(0.35), dec!(35))];
        let actions = mgr.refresh_positions(&live).await.unwrap();

        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].position_id, position.id);
        assert_eq!(actions[0].kind, ActionKind::StopLoss);
        assert_eq!(actions[0].urgency, Urgency::Critical);
    }

    #[tokio::test]
    async fn test_refresh_updates_price_without_action() {
        let mgr = manager();
        let position = mgr
            .open_position(fill(StrategyKind::PredictionMarkets, "tok-1", dec!(100)))
            .await
            .unwrap();

        let live = vec![live_row("tok-1", dec!(0.55), dec!(110))];
        let actions = mgr.refresh_positions(&live).await.unwrap();
        assert!(actions.is_empty());

        let updated = mgr
            .repository
            .get_position(&position.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.current_value, dec!(110));
        assert_eq!(updated.unrealized_pnl, dec!(10));
    }

    #[tokio::test]
    async fn test_refresh_expires_vanished_position() {
        let mgr = manager();
        let position = mgr
            .open_position(fill(StrategyKind::PredictionMarkets, "tok-1", dec!(100)))
            .await
            .unwrap();

        let actions = mgr.refresh_positions(&[]).await.unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, ActionKind::Expire);
        assert_eq!(actions[0].position_id, position.id);
    }

    #[tokio::test]
    async fn test_refresh_flags_liquidation_proximity() {
        let mgr = manager();
        let mut f = fill(StrategyKind::LeveragedPerps, "perp-eth", dec!(500));
        f.metadata
            .insert(META_LIQUIDATION_PRICE.to_string(), "100".to_string());
        mgr.open_position(f).await.unwrap();

        // Price 115 is ~13% above the liquidation price: inside the 20%
        // proximity band
        let live = vec![live_row("perp-eth", dec!(115), dec!(460))];
        let actions = mgr.refresh_positions(&live).await.unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].kind, ActionKind::LiquidationWarning);
        assert_eq!(actions[0].urgency, Urgency::Critical);
    }

    #[tokio::test]
    async fn test_close_computes_realized_pnl() {
        let mgr = manager();
        let position = mgr
            .open_position(fill(StrategyKind::PredictionMarkets, "tok-1", dec!(100)))
            .await
            .unwrap();

        let closed = mgr
            .close_position(&position.id, dec!(0.80), "0xtx", dec!(160))
            .await
            .unwrap();
        assert_eq!(closed.status, PositionStatus::Closed);
        assert_eq!(closed.realized_pnl, dec!(60));
        assert_eq!(mgr.total_realized_pnl().await.unwrap(), dec!(60));
    }

    #[tokio::test]
    async fn test_terminal_positions_cannot_close_again() {
        let mgr = manager();
        let position = mgr
            .open_position(fill(StrategyKind::PredictionMarkets, "tok-1", dec!(100)))
            .await
            .unwrap();
        mgr.close_position(&position.id, dec!(0.80), "0xtx", dec!(160))
            .await
            .unwrap();

        let err = mgr
            .close_position(&position.id, dec!(0.80), "0xtx2", dec!(160))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Repository(_)));
    }

    #[tokio::test]
    async fn test_transition_validation() {
        let mgr = manager();
        let position = mgr
            .open_position(fill(StrategyKind::PredictionMarkets, "tok-1", dec!(100)))
            .await
            .unwrap();

        // Open -> StopHit -> Closed is legal
        let stopped = mgr
            .transition(&position.id, PositionStatus::StopHit)
            .await
            .unwrap();
        assert_eq!(stopped.status, PositionStatus::StopHit);

        // StopHit -> Expired is not
        let err = mgr
            .transition(&position.id, PositionStatus::Expired)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Repository(_)));
    }
}
