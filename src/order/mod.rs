//! Order construction, signing, and submission
//!
//! Builds exchange orders with currency-precision-safe rounding: the
//! token quantity is derived from the tick-rounded price (never the raw
//! price) so the maker/taker amount ratio reproduces the rounded price
//! exactly after scaling to the 6-decimal base unit. The exchange
//! rejects, or worse silently mis-prices, orders that violate this.
//!
//! Submission always returns a [`PlacedOrder`] audit record; ordinary
//! rejections are carried in its status, never raised.

use crate::client::auth::{OrderSigningData, Venue, WalletSigner};
use crate::client::credentials::ApiCredentials;
use crate::client::ExecutionClient;
use crate::error::{AgentError, Result};
use crate::types::{OrderType, PlacedOrder, PlacedOrderStatus, Side};
use async_trait::async_trait;
use chrono::Utc;
use ethers::types::{Address, U256};
use rust_decimal::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::json;
use std::collections::HashSet;
use tracing::{info, warn};

/// Base-unit precision of the quote currency (USDC)
const BASE_UNIT_DECIMALS: u32 = 6;
/// Share quantities are quoted to two decimal places
const SHARE_DECIMALS: u32 = 2;
/// Salts must survive a JSON round-trip through runtimes with 53-bit
/// integers
const MAX_SAFE_SALT: i64 = 9_007_199_254_740_991;

/// Per-market parameters the engine needs before building an order
#[derive(Debug, Clone)]
pub struct OrderParams {
    pub tick_size: Decimal,
    pub neg_risk: bool,
    pub fee_rate_bps: u32,
}

/// Submission request for one order
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub condition_id: String,
    pub token_id: String,
    pub side: Side,
    pub price: Decimal,
    pub size_usd: Decimal,
    pub order_type: OrderType,
}

/// An immutable signed order ready for submission
#[derive(Debug, Clone)]
pub struct SignedOrder {
    pub salt: i64,
    pub maker: Address,
    pub signer: Address,
    pub taker: Address,
    pub token_id: String,
    /// What the maker gives, in base units
    pub maker_amount: u64,
    /// What the maker receives, in base units
    pub taker_amount: u64,
    pub expiration: u64,
    pub nonce: u64,
    pub fee_rate_bps: u32,
    pub side: Side,
    pub signature_type: u8,
    pub signature: String,
    pub venue: Venue,
}

impl SignedOrder {
    /// Wire envelope for `POST /order`. Two protocol quirks are load
    /// bearing: `side` goes out as the string enum (the signing struct
    /// used the numeric code) and `salt` goes out as a plain integer
    /// (the signing struct used its string form).
    pub fn to_envelope(&self, owner_api_key: &str, order_type: OrderType) -> serde_json::Value {
        json!({
            "order": {
                "salt": self.salt,
                "maker": format!("{:?}", self.maker),
                "signer": format!("{:?}", self.signer),
                "taker": format!("{:?}", self.taker),
                "tokenId": self.token_id,
                "makerAmount": self.maker_amount.to_string(),
                "takerAmount": self.taker_amount.to_string(),
                "expiration": self.expiration.to_string(),
                "nonce": self.nonce.to_string(),
                "feeRateBps": self.fee_rate_bps.to_string(),
                "side": self.side.as_str(),
                "signatureType": self.signature_type,
                "signature": self.signature,
            },
            "owner": owner_api_key,
            "orderType": order_type.as_str(),
        })
    }
}

/// On-chain approval collaborator. Transaction submission and
/// confirmation polling live outside the core; the engine only asks
/// that a venue's token-spending approvals exist.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AllowanceManager: Send + Sync {
    async fn ensure_allowances(&self, venue: Venue) -> Result<()>;
}

/// Builds, signs, and submits orders
pub struct OrderEngine {
    signer: WalletSigner,
    execution: ExecutionClient,
    allowances: Box<dyn AllowanceManager>,
    /// Funder proxy holding the collateral, when distinct from the signer
    funder: Option<Address>,
    signature_type: u8,
    /// Venues whose approvals were already confirmed this process
    approved_venues: tokio::sync::Mutex<HashSet<Venue>>,
}

impl OrderEngine {
    pub fn new(
        signer: WalletSigner,
        execution: ExecutionClient,
        allowances: Box<dyn AllowanceManager>,
        funder: Option<Address>,
        signature_type: u8,
    ) -> Self {
        Self {
            signer,
            execution,
            allowances,
            funder,
            signature_type,
            approved_venues: tokio::sync::Mutex::new(HashSet::new()),
        }
    }

    /// Gather tick size, risk routing, and fee rate for a market
    pub async fn fetch_params(&self, condition_id: &str, token_id: &str) -> Result<OrderParams> {
        let tick_size = self.execution.tick_size(condition_id).await?;
        let neg_risk = self.execution.neg_risk(token_id).await?;
        let fee_rate_bps = self.execution.fee_rate_bps(token_id).await?;
        Ok(OrderParams {
            tick_size,
            neg_risk,
            fee_rate_bps,
        })
    }

    /// Confirm venue approvals, at most once per venue per process
    pub async fn ensure_venue_approved(&self, venue: Venue) -> Result<()> {
        let mut approved = self.approved_venues.lock().await;
        if approved.contains(&venue) {
            return Ok(());
        }
        self.allowances.ensure_allowances(venue).await?;
        approved.insert(venue);
        Ok(())
    }

    /// Build and sign an order. Rejects invalid prices, out-of-range
    /// tick rounding, and degenerate amounts before any signing occurs.
    pub fn build_signed_order(
        &self,
        token_id: &str,
        side: Side,
        price: Decimal,
        size_usd: Decimal,
        params: &OrderParams,
    ) -> Result<SignedOrder> {
        if price <= Decimal::ZERO || price >= Decimal::ONE {
            return Err(AgentError::InvalidOrder(format!(
                "Price {} outside (0, 1)",
                price
            )));
        }
        let tick = params.tick_size;
        if tick <= Decimal::ZERO {
            return Err(AgentError::InvalidOrder(format!("Tick size {}", tick)));
        }

        let rounded_price = round_to_tick(price, tick);
        if rounded_price < tick || rounded_price > Decimal::ONE - tick {
            return Err(AgentError::InvalidOrder(format!(
                "Price {} rounds to {} outside [{}, {}]",
                price,
                rounded_price,
                tick,
                Decimal::ONE - tick
            )));
        }

        let price_decimals = tick_decimals(tick)?;

        // Quantity comes from the ROUNDED price. Deriving it from the
        // raw price would break maker/taker == rounded price, which the
        // exchange checks in integer arithmetic.
        let quantity = (size_usd / rounded_price)
            .round_dp_with_strategy(SHARE_DECIMALS, RoundingStrategy::ToZero);
        let cost = (quantity * rounded_price).round_dp(price_decimals + 2);

        if quantity <= Decimal::ZERO || cost <= Decimal::ZERO {
            return Err(AgentError::InvalidOrder(format!(
                "Size {} at {} yields degenerate amounts",
                size_usd, rounded_price
            )));
        }

        let quantity_units = to_base_units(quantity)?;
        let cost_units = to_base_units(cost)?;

        // BUY gives quote currency for tokens; SELL is the mirror image
        let (maker_amount, taker_amount) = match side {
            Side::Buy => (cost_units, quantity_units),
            Side::Sell => (quantity_units, cost_units),
        };

        let salt = generate_salt()?;
        let maker = self.funder.unwrap_or_else(|| self.signer.address());
        let venue = Venue::from_neg_risk(params.neg_risk);

        let signing_data = OrderSigningData {
            salt: U256::from(salt as u64),
            maker,
            signer: self.signer.address(),
            taker: Address::zero(),
            token_id: U256::from_dec_str(token_id)
                .map_err(|e| AgentError::InvalidOrder(format!("Token id: {}", e)))?,
            maker_amount: U256::from(maker_amount),
            taker_amount: U256::from(taker_amount),
            expiration: U256::zero(),
            nonce: U256::zero(),
            fee_rate_bps: U256::from(params.fee_rate_bps),
            side: side.signing_code(),
            signature_type: self.signature_type,
        };
        let signature = self.signer.sign_order(&signing_data, venue)?;

        Ok(SignedOrder {
            salt,
            maker,
            signer: self.signer.address(),
            taker: Address::zero(),
            token_id: token_id.to_string(),
            maker_amount,
            taker_amount,
            expiration: 0,
            nonce: 0,
            fee_rate_bps: params.fee_rate_bps,
            side,
            signature_type: self.signature_type,
            signature,
            venue,
        })
    }

    /// Full pipeline: params, approvals, build, sign, submit. Always
    /// returns the audit record; failures are folded into its status.
    pub async fn place_order(&self, req: &OrderRequest) -> PlacedOrder {
        match self.try_place(req).await {
            Ok((order_id, status)) => {
                info!(
                    condition_id = %req.condition_id,
                    order_id = %order_id,
                    ?status,
                    "Order placed"
                );
                self.audit(req, status, Some(order_id), None)
            }
            Err(e) => {
                warn!(condition_id = %req.condition_id, "Order failed: {}", e);
                self.audit(req, PlacedOrderStatus::Error, None, Some(e.to_string()))
            }
        }
    }

    async fn try_place(&self, req: &OrderRequest) -> Result<(String, PlacedOrderStatus)> {
        let params = self.fetch_params(&req.condition_id, &req.token_id).await?;
        let venue = Venue::from_neg_risk(params.neg_risk);
        self.ensure_venue_approved(venue).await?;

        let signed =
            self.build_signed_order(&req.token_id, req.side, req.price, req.size_usd, &params)?;

        let order_type = req.order_type;
        let resp = self
            .execution
            .post_order(move |creds: &ApiCredentials| {
                signed.to_envelope(&creds.api_key, order_type)
            })
            .await?;

        let order_id = resp["orderID"]
            .as_str()
            .or_else(|| resp["orderId"].as_str())
            .unwrap_or_default()
            .to_string();
        let status = match resp["status"].as_str().unwrap_or("live") {
            "matched" => PlacedOrderStatus::Matched,
            "delayed" => PlacedOrderStatus::Delayed,
            _ => PlacedOrderStatus::Live,
        };
        Ok((order_id, status))
    }

    fn audit(
        &self,
        req: &OrderRequest,
        status: PlacedOrderStatus,
        order_id: Option<String>,
        error: Option<String>,
    ) -> PlacedOrder {
        PlacedOrder {
            condition_id: req.condition_id.clone(),
            token_id: req.token_id.clone(),
            side: req.side,
            price: req.price,
            size_usd: req.size_usd,
            status,
            order_id,
            error,
            submitted_at: Utc::now(),
        }
    }
}

/// Round a price to the nearest tick multiple, half away from zero
pub fn round_to_tick(price: Decimal, tick: Decimal) -> Decimal {
    (price / tick).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero) * tick
}

/// Decimal precision implied by a tick size (`0.001` -> 3)
fn tick_decimals(tick: Decimal) -> Result<u32> {
    let tick_f = tick
        .to_f64()
        .ok_or_else(|| AgentError::InvalidOrder(format!("Tick size {}", tick)))?;
    let decimals = (-tick_f.log10()).round();
    if !decimals.is_finite() || decimals < 0.0 || decimals > BASE_UNIT_DECIMALS as f64 {
        return Err(AgentError::InvalidOrder(format!("Tick size {}", tick)));
    }
    Ok(decimals as u32)
}

/// Scale a decimal amount to integer base units, requiring exactness
fn to_base_units(amount: Decimal) -> Result<u64> {
    let scaled = amount * Decimal::from(10u64.pow(BASE_UNIT_DECIMALS));
    if scaled != scaled.trunc() {
        return Err(AgentError::InvalidOrder(format!(
            "Amount {} does not fit the base unit",
            amount
        )));
    }
    scaled
        .to_u64()
        .filter(|&u| u > 0)
        .ok_or_else(|| AgentError::InvalidOrder(format!("Amount {} out of range", amount)))
}

/// Millisecond timestamp scaled by 1000 plus a random tail. Stays within
/// 53-bit integer range; larger salt schemes have broken downstream
/// JSON consumers before.
fn generate_salt() -> Result<i64> {
    use rand::Rng;
    let millis = Utc::now().timestamp_millis();
    let salt = millis * 1000 + rand::rng().random_range(0..1000i64);
    if !(0..=MAX_SAFE_SALT).contains(&salt) {
        return Err(AgentError::InvalidOrder(format!(
            "Salt {} exceeds safe integer range",
            salt
        )));
    }
    Ok(salt)
}
