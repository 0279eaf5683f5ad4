//! Streaming market data over WebSocket.
//!
//! [`PacificaWebSocketClient`] multiplexes any number of typed subscriptions
//! over a single connection. Equal subscriptions share one upstream stream,
//! reconnects replay every live subscription automatically, and dropping a
//! [`Subscription`] handle cleans up after itself.

pub mod client;
pub(crate) mod dispatch;
pub mod error;
pub(crate) mod registry;
pub mod types;

pub use client::{
    CandleParams, ConnectionState, OrderBookParams, PacificaWebSocketClient, TradesParams,
    WsConfig,
};
pub use error::{WsError, WsResult};
pub use registry::Subscription;
pub use types::{
    Candle, Level, MarketEvent, OrderBook, PriceUpdate, StreamKey, SubscribeParams, Trade,
    WsCommand, VALID_INTERVALS,
};
