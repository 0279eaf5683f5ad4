//! # Pacifica Rust SDK
//!
//! A Rust SDK for trading on the Pacifica perpetuals exchange.
//!
//! ## Modules
//!
//! This SDK provides three main modules:
//! - [`sign`]: Deterministic Ed25519 request signing over canonical JSON
//! - [`api`]: REST API client for order placement and market metadata
//! - [`ws`]: Real-time market data streaming via WebSocket
//!
//! Plus [`network`] with the default endpoint URLs.
//!
//! ## Quick Start - REST API
//!
//! ```rust,ignore
//! use pacifica_sdk::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let signer = Signer::new("<base58 private key>", "<account>")?;
//!     let api = PacificaApiClient::new(signer, None)?;
//!
//!     let info = api.get_market_info().await?;
//!     println!("{} tradable symbols", info.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Quick Start - WebSocket
//!
//! ```rust,ignore
//! use pacifica_sdk::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ws = PacificaWebSocketClient::new(None);
//!     ws.connect().await?;
//!
//!     let _sub = ws.trades(
//!         TradesParams { symbol: "BTC".to_string() },
//!         |trades| println!("{} trades", trades.len()),
//!     )?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     ws.close().await;
//!     Ok(())
//! }
//! ```

// ============================================================================
// MODULES
// ============================================================================

/// Network URL constants (API and WebSocket endpoints).
pub mod network;

/// Request signing: canonical JSON and Ed25519 signatures.
pub mod sign;

/// REST API client module for orders and market metadata.
pub mod api;

/// WebSocket client module for real-time market data streaming.
pub mod ws;

// ============================================================================
// PRELUDE
// ============================================================================

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use pacifica_sdk::prelude::*;
/// ```
pub mod prelude {
    // Signing exports
    pub use crate::sign::{
        canonical_json, SignError, SignResult, SignatureHeader, Signer, DEFAULT_EXPIRY_WINDOW_MS,
    };

    // API module exports
    pub use crate::api::{
        ApiError, ApiResult, CancelOrderRequest, CancelOrderResponse, CreateLimitOrderRequest,
        CreateMarketOrderRequest, CreateOrderResponse, OrderSide, PacificaApiClient,
        PacificaApiClientBuilder, RequestOptions, RetryConfig, SymbolInfo, Target, TimeInForce,
    };

    // Network constants
    pub use crate::network::{DEFAULT_API_URL, DEFAULT_WS_URL};

    // WebSocket module exports
    pub use crate::ws::{
        Candle, CandleParams, ConnectionState, Level, MarketEvent, OrderBook, OrderBookParams,
        PacificaWebSocketClient, PriceUpdate, StreamKey, Subscription, Trade, TradesParams,
        WsConfig, WsError, WsResult,
    };
}
