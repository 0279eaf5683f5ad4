//! Message types for the Pacifica WebSocket protocol.
//!
//! Outbound command frames are `{"method": ..., "params": ...}`; inbound
//! frames are `{"channel": ..., "data": ...}`. Market-data payloads use the
//! venue's compact single-letter field names.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::ws::error::{WsError, WsResult};

/// Channel name for order-book updates.
pub const CHANNEL_BOOK: &str = "book";
/// Channel name for candle updates.
pub const CHANNEL_CANDLE: &str = "candle";
/// Channel name for venue-wide price updates.
pub const CHANNEL_PRICES: &str = "prices";
/// Channel name for trade executions.
pub const CHANNEL_TRADES: &str = "trades";

/// Candle intervals accepted by the venue.
pub const VALID_INTERVALS: [&str; 11] = [
    "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "8h", "12h", "1d",
];

// ============================================================================
// STREAM KEYS
// ============================================================================

/// Deduplication key identifying one logical subscription.
///
/// Two subscription requests that normalize to the same key share one
/// upstream subscription. Keys are derived the same way from outbound
/// [`SubscribeParams`] and from inbound decoded payloads, which is what lets
/// the dispatcher route a message back to its subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamKey(String);

impl StreamKey {
    pub fn book(symbol: &str) -> Self {
        Self(format!("{}:{}", CHANNEL_BOOK, symbol))
    }

    pub fn candle(symbol: &str, interval: &str) -> Self {
        Self(format!("{}:{}:{}", CHANNEL_CANDLE, symbol, interval))
    }

    pub fn prices() -> Self {
        // The prices channel is venue-wide; there is nothing to discriminate on.
        Self(CHANNEL_PRICES.to_string())
    }

    pub fn trades(symbol: &str) -> Self {
        Self(format!("{}:{}", CHANNEL_TRADES, symbol))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// REQUEST TYPES (Client → Server)
// ============================================================================

/// Outbound command frame.
#[derive(Debug, Clone, Serialize)]
pub struct WsCommand {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<SubscribeParams>,
}

impl WsCommand {
    /// Create a subscribe command
    pub fn subscribe(params: SubscribeParams) -> Self {
        Self {
            method: "subscribe".to_string(),
            params: Some(params),
        }
    }

    /// Create an unsubscribe command
    pub fn unsubscribe(params: SubscribeParams) -> Self {
        Self {
            method: "unsubscribe".to_string(),
            params: Some(params),
        }
    }

    /// Create a ping command
    pub fn ping() -> Self {
        Self {
            method: "ping".to_string(),
            params: None,
        }
    }
}

/// Subscription parameters (polymorphic)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SubscribeParams {
    /// Order-book updates for a symbol
    Book {
        source: &'static str,
        symbol: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        agg_level: Option<u32>,
    },
    /// Candles for a symbol at an interval
    Candle {
        source: &'static str,
        symbol: String,
        interval: String,
    },
    /// Venue-wide price updates
    Prices { source: &'static str },
    /// Trade executions for a symbol
    Trades {
        source: &'static str,
        symbol: String,
    },
}

impl SubscribeParams {
    /// Create order-book subscription params
    pub fn book(symbol: impl Into<String>, agg_level: Option<u32>) -> Self {
        Self::Book {
            source: CHANNEL_BOOK,
            symbol: symbol.into(),
            agg_level,
        }
    }

    /// Create candle subscription params.
    ///
    /// Fails before any network traffic if the interval is not one the venue
    /// supports.
    pub fn candle(symbol: impl Into<String>, interval: impl Into<String>) -> WsResult<Self> {
        let interval = interval.into();
        if !VALID_INTERVALS.contains(&interval.as_str()) {
            return Err(WsError::InvalidParameter(format!(
                "invalid interval: {}",
                interval
            )));
        }
        Ok(Self::Candle {
            source: CHANNEL_CANDLE,
            symbol: symbol.into(),
            interval,
        })
    }

    /// Create venue-wide prices subscription params
    pub fn prices() -> Self {
        Self::Prices {
            source: CHANNEL_PRICES,
        }
    }

    /// Create trades subscription params
    pub fn trades(symbol: impl Into<String>) -> Self {
        Self::Trades {
            source: CHANNEL_TRADES,
            symbol: symbol.into(),
        }
    }

    /// Derive the stream key this subscription is deduplicated under.
    ///
    /// Note the aggregation level is deliberately not part of the book key:
    /// the venue serves one book stream per symbol.
    pub fn stream_key(&self) -> StreamKey {
        match self {
            Self::Book { symbol, .. } => StreamKey::book(symbol),
            Self::Candle {
                symbol, interval, ..
            } => StreamKey::candle(symbol, interval),
            Self::Prices { .. } => StreamKey::prices(),
            Self::Trades { symbol, .. } => StreamKey::trades(symbol),
        }
    }
}

// ============================================================================
// RESPONSE TYPES (Server → Client)
// ============================================================================

/// Inbound frame wrapper; `data` stays raw until the per-channel decoder runs.
#[derive(Debug, Deserialize)]
pub struct WsMessage<'a> {
    pub channel: String,
    #[serde(borrow)]
    pub data: &'a RawValue,
}

/// Order-book snapshot for one symbol.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderBook {
    /// Symbol
    #[serde(rename = "s")]
    pub symbol: String,
    /// Price levels: `[bids, asks]`
    #[serde(rename = "l")]
    pub levels: Vec<Vec<Level>>,
    /// Venue timestamp (ms)
    #[serde(rename = "t")]
    pub timestamp: i64,
}

/// One aggregated price level.
#[derive(Debug, Clone, Deserialize)]
pub struct Level {
    /// Total amount in the aggregation level
    #[serde(rename = "a")]
    pub amount: String,
    /// Price of the level
    #[serde(rename = "p")]
    pub price: String,
    /// Number of orders in the aggregation level
    #[serde(rename = "n")]
    pub orders: u32,
}

/// One candle update.
#[derive(Debug, Clone, Deserialize)]
pub struct Candle {
    /// Symbol
    #[serde(rename = "s")]
    pub symbol: String,
    /// Interval, e.g. `1m`
    #[serde(rename = "i")]
    pub interval: String,
    /// Candle open time (ms)
    #[serde(rename = "t")]
    pub start_time: i64,
    /// Candle close time (ms)
    #[serde(rename = "T")]
    pub end_time: i64,
    /// Open price
    #[serde(rename = "o")]
    pub open: String,
    /// High price
    #[serde(rename = "h")]
    pub high: String,
    /// Low price
    #[serde(rename = "l")]
    pub low: String,
    /// Close price
    #[serde(rename = "c")]
    pub close: String,
    /// Base volume
    #[serde(rename = "v")]
    pub volume: String,
}

/// One trade execution. The trades channel delivers batches of these.
#[derive(Debug, Clone, Deserialize)]
pub struct Trade {
    /// Symbol
    #[serde(rename = "s")]
    pub symbol: String,
    /// Fill amount
    #[serde(rename = "a")]
    pub amount: String,
    /// Fill price
    #[serde(rename = "p")]
    pub price: String,
    /// Taker side, `bid` or `ask`
    #[serde(rename = "d")]
    pub side: String,
    /// Venue timestamp (ms)
    #[serde(rename = "t")]
    pub timestamp: i64,
}

/// Mark/oracle price update for one symbol; the prices channel delivers a
/// batch covering every listed market.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceUpdate {
    pub symbol: String,
    pub mark: String,
    #[serde(default)]
    pub mid: Option<String>,
    #[serde(default)]
    pub oracle: Option<String>,
    #[serde(default)]
    pub funding: Option<String>,
    pub timestamp: i64,
}

/// A decoded market-data message, tagged by channel.
#[derive(Debug, Clone)]
pub enum MarketEvent {
    Book(OrderBook),
    Candle(Candle),
    Prices(Vec<PriceUpdate>),
    Trades(Vec<Trade>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_command_serialization() {
        let cmd = WsCommand::subscribe(SubscribeParams::book("BTC", Some(2)));
        let json = serde_json::to_string(&cmd).unwrap();
        assert_eq!(
            json,
            r#"{"method":"subscribe","params":{"source":"book","symbol":"BTC","agg_level":2}}"#
        );
    }

    #[test]
    fn test_ping_command_omits_params() {
        let json = serde_json::to_string(&WsCommand::ping()).unwrap();
        assert_eq!(json, r#"{"method":"ping"}"#);
    }

    #[test]
    fn test_book_params_omit_agg_level_when_unset() {
        let json = serde_json::to_string(&SubscribeParams::book("ETH", None)).unwrap();
        assert_eq!(json, r#"{"source":"book","symbol":"ETH"}"#);
    }

    #[test]
    fn test_candle_interval_validation() {
        assert!(SubscribeParams::candle("BTC", "1m").is_ok());
        assert!(SubscribeParams::candle("BTC", "1d").is_ok());
        let err = SubscribeParams::candle("BTC", "7m").unwrap_err();
        assert!(matches!(err, WsError::InvalidParameter(_)));
    }

    #[test]
    fn test_stream_keys() {
        assert_eq!(SubscribeParams::book("BTC", None).stream_key().as_str(), "book:BTC");
        assert_eq!(
            SubscribeParams::book("BTC", Some(5)).stream_key(),
            SubscribeParams::book("BTC", None).stream_key()
        );
        assert_eq!(
            SubscribeParams::candle("BTC", "1m").unwrap().stream_key().as_str(),
            "candle:BTC:1m"
        );
        assert_eq!(SubscribeParams::prices().stream_key().as_str(), "prices");
        assert_eq!(SubscribeParams::trades("SOL").stream_key().as_str(), "trades:SOL");
    }

    #[test]
    fn test_inbound_frame_parsing() {
        let raw = r#"{"channel":"book","data":{"s":"BTC","l":[[{"a":"1.5","p":"50000","n":3}],[]],"t":1700000000000}}"#;
        let msg: WsMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.channel, "book");

        let book: OrderBook = serde_json::from_str(msg.data.get()).unwrap();
        assert_eq!(book.symbol, "BTC");
        assert_eq!(book.levels[0][0].price, "50000");
        assert_eq!(book.levels[0][0].orders, 3);
    }

    #[test]
    fn test_trade_batch_parsing() {
        let raw = r#"[{"s":"BTC","a":"0.2","p":"50100","d":"bid","t":1700000000001}]"#;
        let trades: Vec<Trade> = serde_json::from_str(raw).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].side, "bid");
    }
}
