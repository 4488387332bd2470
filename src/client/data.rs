//! Public positions API client
//!
//! Unauthenticated read of the venue's live position rows for a wallet.
//! Advisory data: failures degrade to an empty snapshot with a warning.

use crate::error::Result;
use crate::types::LivePosition;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct RawPosition {
    asset: Option<String>,
    #[serde(rename = "conditionId")]
    condition_id: Option<String>,
    size: Option<Decimal>,
    #[serde(rename = "avgPrice")]
    avg_price: Option<Decimal>,
    #[serde(rename = "curPrice")]
    cur_price: Option<Decimal>,
    #[serde(rename = "currentValue")]
    current_value: Option<Decimal>,
    #[serde(rename = "cashPnl")]
    cash_pnl: Option<Decimal>,
    redeemable: Option<bool>,
    outcome: Option<String>,
}

impl RawPosition {
    fn normalize(self) -> Option<LivePosition> {
        let size = self.size?;
        // Dust and short rows are venue artifacts, not positions we track
        if size <= Decimal::ZERO {
            return None;
        }
        Some(LivePosition {
            asset: self.asset?,
            condition_id: self.condition_id.unwrap_or_default(),
            size,
            avg_price: self.avg_price.unwrap_or(Decimal::ZERO),
            cur_price: self.cur_price.unwrap_or(Decimal::ZERO),
            current_value: self.current_value.unwrap_or(Decimal::ZERO),
            cash_pnl: self.cash_pnl.unwrap_or(Decimal::ZERO),
            redeemable: self.redeemable.unwrap_or(false),
            outcome: self.outcome.unwrap_or_default(),
        })
    }
}

/// Client for the public positions endpoint
#[derive(Clone)]
pub struct PositionsClient {
    http: Client,
    base_url: String,
}

impl PositionsClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Live positions for a wallet address; empty on any failure
    pub async fn live_positions(&self, address: &str) -> Vec<LivePosition> {
        let url = format!("{}/positions", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("user", address)])
            .send()
            .await;

        let raw: Vec<RawPosition> = match resp {
            Ok(r) => match r.json().await {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("Failed to parse positions response: {}", e);
                    return Vec::new();
                }
            },
            Err(e) => {
                warn!("Positions request failed: {}", e);
                return Vec::new();
            }
        };

        raw.into_iter().filter_map(RawPosition::normalize).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_zero_and_negative_sizes_dropped() {
        let json = r#"[
            {"asset": "111", "conditionId": "0xabc", "size": 10, "avgPrice": 0.5,
             "curPrice": 0.6, "currentValue": 6, "cashPnl": 1, "redeemable": false,
             "outcome": "Yes"},
            {"asset": "222", "conditionId": "0xdef", "size": 0},
            {"asset": "333", "conditionId": "0xfed", "size": -4}
        ]"#;
        let raw: Vec<RawPosition> = serde_json::from_str(json).unwrap();
        let live: Vec<LivePosition> = raw.into_iter().filter_map(RawPosition::normalize).collect();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].asset, "111");
        assert_eq!(live[0].current_value, dec!(6));
    }
}
