//! Request and response types for the Pacifica REST API.
//!
//! Request types serialize exactly as the venue expects operation data to
//! look inside the signing envelope; the client flattens them into the
//! signed body, so none of them carry auth fields.

use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    /// Buy
    Bid,
    /// Sell
    Ask,
}

/// Time in force for limit orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    /// Good till cancel
    Gtc,
    /// Immediate or cancel
    Ioc,
    /// Add liquidity only (post-only)
    Alo,
}

/// Take-profit / stop-loss trigger attached to an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    /// Trigger price as decimal string
    pub stop_price: String,
    /// Optional limit price once triggered; market execution when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<String>,
    /// Optional client-assigned id for the triggered order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
}

/// Operation data for a limit order (`create_order`).
///
/// All prices and amounts are decimal strings; the venue rejects floats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLimitOrderRequest {
    pub symbol: String,
    /// Limit price as decimal string
    pub price: String,
    /// Order size as decimal string
    pub amount: String,
    pub side: OrderSide,
    pub tif: TimeInForce,
    pub reduce_only: bool,
    /// Client-assigned order id, may be empty
    pub client_order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<Target>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Target>,
}

impl CreateLimitOrderRequest {
    pub(crate) fn validate(&self) -> ApiResult<()> {
        require_non_empty(&self.symbol, "symbol")?;
        require_non_empty(&self.price, "price")?;
        require_non_empty(&self.amount, "amount")?;
        Ok(())
    }
}

/// Operation data for a market order (`create_market_order`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMarketOrderRequest {
    pub symbol: String,
    /// Order size as decimal string
    pub amount: String,
    pub side: OrderSide,
    /// Maximum acceptable slippage, percent, as decimal string
    pub slippage_percent: String,
    pub reduce_only: bool,
    /// Client-assigned order id, may be empty
    pub client_order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<Target>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Target>,
}

impl CreateMarketOrderRequest {
    pub(crate) fn validate(&self) -> ApiResult<()> {
        require_non_empty(&self.symbol, "symbol")?;
        require_non_empty(&self.amount, "amount")?;
        require_non_empty(&self.slippage_percent, "slippage_percent")?;
        Ok(())
    }
}

/// Operation data for cancelling an order (`cancel_order`).
///
/// The order is identified by either its venue id or its client id; at
/// least one must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
}

impl CancelOrderRequest {
    pub(crate) fn validate(&self) -> ApiResult<()> {
        require_non_empty(&self.symbol, "symbol")?;
        let has_client_id = self
            .client_order_id
            .as_deref()
            .is_some_and(|id| !id.is_empty());
        if self.order_id.is_none() && !has_client_id {
            return Err(ApiError::InvalidParameter(
                "either order_id or client_order_id is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Drop an empty `client_order_id` so it is omitted from the wire.
    pub(crate) fn normalized(mut self) -> Self {
        if self.client_order_id.as_deref() == Some("") {
            self.client_order_id = None;
        }
        self
    }
}

/// Per-call options common to all signed operations.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Submit via an authorized agent wallet instead of the signer's key
    pub agent_wallet: Option<String>,
    /// Signature validity window in ms; 0 selects the default
    pub expiry_window: i64,
}

/// Response from the order creation endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    /// Venue-assigned order id
    pub order_id: i64,
}

/// Response from the cancel endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOrderResponse {
    pub success: bool,
}

/// Per-symbol market metadata from `GET /info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    /// Price increment as decimal string
    pub tick_size: String,
    pub min_tick: String,
    pub max_tick: String,
    /// Size increment as decimal string
    pub lot_size: String,
    pub max_leverage: u32,
    pub isolated_only: bool,
    pub min_order_size: String,
    pub max_order_size: String,
    pub funding_rate: String,
    pub next_funding_rate: String,
}

/// Wrapper the venue puts around `GET /info` payloads.
#[derive(Debug, Deserialize)]
pub(crate) struct MarketInfoResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Vec<SymbolInfo>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

fn require_non_empty(value: &str, field: &str) -> ApiResult<()> {
    if value.is_empty() {
        return Err(ApiError::InvalidParameter(format!(
            "{} is required",
            field
        )));
    }
    Ok(())
}
