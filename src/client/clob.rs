//! Execution API client
//!
//! Thin wrapper over the exchange's REST surface: unauthenticated
//! market-parameter lookups (tick size, risk routing, fee rate) and
//! authenticated order management through the credential manager.

use crate::client::credentials::{ApiCredentials, CredentialManager};
use crate::error::{AgentError, Result};
use reqwest::{Client, Method};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Client for the execution API
#[derive(Clone)]
pub struct ExecutionClient {
    http: Client,
    base_url: String,
    credentials: Arc<CredentialManager>,
}

impl ExecutionClient {
    pub fn new(base_url: &str, credentials: Arc<CredentialManager>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// Minimum price increment for a market
    pub async fn tick_size(&self, condition_id: &str) -> Result<Decimal> {
        let url = format!("{}/markets/{}", self.base_url, condition_id);
        let resp: serde_json::Value = self.http.get(&url).send().await?.json().await?;
        resp["minimum_tick_size"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .or_else(|| resp["minimum_tick_size"].as_f64().and_then(Decimal::from_f64_retain))
            .ok_or_else(|| AgentError::Api(format!("No tick size for market {}", condition_id)))
    }

    /// Whether the token routes through the risk-isolated venue
    pub async fn neg_risk(&self, token_id: &str) -> Result<bool> {
        let url = format!("{}/neg-risk", self.base_url);
        let resp: serde_json::Value = self
            .http
            .get(&url)
            .query(&[("token_id", token_id)])
            .send()
            .await?
            .json()
            .await?;
        Ok(resp["neg_risk"].as_bool().unwrap_or(false))
    }

    /// Maker/taker fee rate in basis points for a token
    pub async fn fee_rate_bps(&self, token_id: &str) -> Result<u32> {
        let url = format!("{}/fee-rate", self.base_url);
        let resp: serde_json::Value = self
            .http
            .get(&url)
            .query(&[("token_id", token_id)])
            .send()
            .await?
            .json()
            .await?;
        Ok(resp["fee_rate_bps"]
            .as_u64()
            .or_else(|| resp["fee_rate_bps"].as_str().and_then(|s| s.parse().ok()))
            .unwrap_or(0) as u32)
    }

    /// Submit a signed order envelope. The builder receives the active
    /// credentials so the envelope's owner field survives a mid-call
    /// credential re-derivation.
    pub async fn post_order<F>(&self, build_envelope: F) -> Result<serde_json::Value>
    where
        F: Fn(&ApiCredentials) -> serde_json::Value,
    {
        self.credentials
            .request_authed(Method::POST, "/order", |creds| Some(build_envelope(creds)))
            .await
    }

    /// Cancel a resting order
    pub async fn cancel_order(&self, order_id: &str) -> Result<()> {
        self.credentials
            .delete_authed(&format!("/order/{}", order_id))
            .await?;
        Ok(())
    }

    /// Status of one order
    pub async fn order_status(&self, order_id: &str) -> Result<serde_json::Value> {
        self.credentials
            .get_authed(&format!("/data/order/{}", order_id))
            .await
    }

    /// All resting orders for the account
    pub async fn open_orders(&self) -> Result<serde_json::Value> {
        self.credentials.get_authed("/data/orders").await
    }
}
