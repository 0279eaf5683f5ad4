//! Inbound message dispatch: channel → typed decoder → stream key → fan-out.
//!
//! Each channel has a registered decoder that turns the raw payload into a
//! typed [`MarketEvent`] and derives the stream key from the payload's own
//! discriminating fields. Unknown channels and malformed payloads are logged
//! and skipped; a bad frame never takes the stream down.

use std::collections::HashMap;

use crate::ws::registry::SubscriptionRegistry;
use crate::ws::types::{
    Candle, MarketEvent, OrderBook, PriceUpdate, StreamKey, Trade, WsMessage, CHANNEL_BOOK,
    CHANNEL_CANDLE, CHANNEL_PRICES, CHANNEL_TRADES,
};

/// A decoded payload plus the key it routes under.
struct Decoded {
    key: StreamKey,
    event: MarketEvent,
}

type DecodeFn = fn(&str) -> Result<Option<Decoded>, serde_json::Error>;

/// Routes inbound frames to subscriber groups via per-channel decoders.
pub(crate) struct Dispatcher {
    decoders: HashMap<&'static str, DecodeFn>,
}

impl Dispatcher {
    pub(crate) fn new() -> Self {
        let mut decoders: HashMap<&'static str, DecodeFn> = HashMap::new();
        decoders.insert(CHANNEL_BOOK, decode_book);
        decoders.insert(CHANNEL_CANDLE, decode_candle);
        decoders.insert(CHANNEL_PRICES, decode_prices);
        decoders.insert(CHANNEL_TRADES, decode_trades);
        Self { decoders }
    }

    /// Parse a raw text frame and deliver it to every callback registered
    /// under the derived key. All failure modes are local: logged, skipped.
    pub(crate) fn dispatch_frame(&self, registry: &SubscriptionRegistry, frame: &str) {
        let message: WsMessage = match serde_json::from_str(frame) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Malformed frame, skipping: {}", e);
                return;
            }
        };

        let Some(decode) = self.decoders.get(message.channel.as_str()) else {
            tracing::debug!(channel = %message.channel, "No decoder for channel, skipping");
            return;
        };

        match decode(message.data.get()) {
            Ok(Some(decoded)) => {
                registry.dispatch(&decoded.key, &decoded.event);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(channel = %message.channel, "Failed to decode payload: {}", e);
            }
        }
    }
}

fn decode_book(data: &str) -> Result<Option<Decoded>, serde_json::Error> {
    let book: OrderBook = serde_json::from_str(data)?;
    Ok(Some(Decoded {
        key: StreamKey::book(&book.symbol),
        event: MarketEvent::Book(book),
    }))
}

fn decode_candle(data: &str) -> Result<Option<Decoded>, serde_json::Error> {
    let candle: Candle = serde_json::from_str(data)?;
    Ok(Some(Decoded {
        key: StreamKey::candle(&candle.symbol, &candle.interval),
        event: MarketEvent::Candle(candle),
    }))
}

fn decode_prices(data: &str) -> Result<Option<Decoded>, serde_json::Error> {
    let prices: Vec<PriceUpdate> = serde_json::from_str(data)?;
    Ok(Some(Decoded {
        key: StreamKey::prices(),
        event: MarketEvent::Prices(prices),
    }))
}

fn decode_trades(data: &str) -> Result<Option<Decoded>, serde_json::Error> {
    let trades: Vec<Trade> = serde_json::from_str(data)?;
    // The batch is keyed by its symbol; an empty batch routes nowhere.
    let Some(first) = trades.first() else {
        return Ok(None);
    };
    Ok(Some(Decoded {
        key: StreamKey::trades(&first.symbol),
        event: MarketEvent::Trades(trades),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use crate::ws::registry::{CommandBus, SubscriptionRegistry};
    use crate::ws::types::SubscribeParams;

    fn registry() -> Arc<SubscriptionRegistry> {
        let (tx, _rx) = mpsc::unbounded_channel();
        let bus = Arc::new(CommandBus::new(tx));
        bus.set_connected(true);
        Arc::new(SubscriptionRegistry::new(bus))
    }

    fn counting_subscription(
        registry: &Arc<SubscriptionRegistry>,
        params: SubscribeParams,
    ) -> (crate::ws::registry::Subscription, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_cb = hits.clone();
        let sub = registry.subscribe(
            params,
            Arc::new(move |_| {
                hits_cb.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (sub, hits)
    }

    #[test]
    fn test_routes_book_frame_to_symbol_subscribers() {
        let registry = registry();
        let dispatcher = Dispatcher::new();

        let (_btc, btc_hits) =
            counting_subscription(&registry, SubscribeParams::book("BTC", None));
        let (_eth, eth_hits) =
            counting_subscription(&registry, SubscribeParams::book("ETH", None));

        let frame = r#"{"channel":"book","data":{"s":"BTC","l":[[],[]],"t":1700000000000}}"#;
        dispatcher.dispatch_frame(&registry, frame);

        assert_eq!(btc_hits.load(Ordering::SeqCst), 1);
        assert_eq!(eth_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_candle_key_includes_interval() {
        let registry = registry();
        let dispatcher = Dispatcher::new();

        let (_m1, m1_hits) = counting_subscription(
            &registry,
            SubscribeParams::candle("BTC", "1m").unwrap(),
        );
        let (_h1, h1_hits) = counting_subscription(
            &registry,
            SubscribeParams::candle("BTC", "1h").unwrap(),
        );

        let frame = r#"{"channel":"candle","data":{"s":"BTC","i":"1m","t":0,"T":60000,"o":"1","h":"2","l":"0.5","c":"1.5","v":"100"}}"#;
        dispatcher.dispatch_frame(&registry, frame);

        assert_eq!(m1_hits.load(Ordering::SeqCst), 1);
        assert_eq!(h1_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_trades_batch_routes_by_symbol() {
        let registry = registry();
        let dispatcher = Dispatcher::new();

        let (_sub, hits) = counting_subscription(&registry, SubscribeParams::trades("SOL"));

        let frame = r#"{"channel":"trades","data":[{"s":"SOL","a":"1","p":"200","d":"ask","t":1}]}"#;
        dispatcher.dispatch_frame(&registry, frame);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Empty batch routes nowhere and is not an error.
        dispatcher.dispatch_frame(&registry, r#"{"channel":"trades","data":[]}"#);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_channel_tolerated() {
        let registry = registry();
        let dispatcher = Dispatcher::new();

        let (_sub, hits) = counting_subscription(&registry, SubscribeParams::prices());

        dispatcher.dispatch_frame(&registry, r#"{"channel":"funding_history","data":{}}"#);
        dispatcher.dispatch_frame(&registry, "not json at all");
        dispatcher.dispatch_frame(&registry, r#"{"channel":"prices","data":"wrong shape"}"#);

        assert_eq!(hits.load(Ordering::SeqCst), 0);

        // The stream keeps working afterwards.
        let frame = r#"{"channel":"prices","data":[{"symbol":"BTC","mark":"50000","timestamp":1}]}"#;
        dispatcher.dispatch_frame(&registry, frame);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
