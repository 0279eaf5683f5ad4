//! Pacifica WebSocket client.
//!
//! One client owns one transport connection. A single spawned connection
//! task drives the socket: it fans inbound frames out through the
//! [`Dispatcher`], writes every outbound command (so frames never
//! interleave), sends the keepalive ping, and reconnects with exponential
//! backoff when the transport drops. Subscriber state lives in the
//! [`SubscriptionRegistry`] and is replayed after every successful
//! (re)connect, so callers never observe the reconnect beyond a gap in
//! delivery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::network::DEFAULT_WS_URL;
use crate::ws::dispatch::Dispatcher;
use crate::ws::error::{WsError, WsResult};
use crate::ws::registry::{Command, CommandBus, Subscription, SubscriptionRegistry};
use crate::ws::types::{Candle, MarketEvent, OrderBook, PriceUpdate, SubscribeParams, Trade, WsCommand};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// WebSocket client configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Interval between keepalive pings (seconds)
    pub ping_interval_secs: u64,
    /// Base delay for reconnect backoff (ms)
    pub base_backoff_ms: u64,
    /// Maximum delay for reconnect backoff (ms)
    pub max_backoff_ms: u64,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: 50,
            base_backoff_ms: 1_000,
            max_backoff_ms: 60_000,
        }
    }
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

/// Parameters for an order-book subscription.
#[derive(Debug, Clone)]
pub struct OrderBookParams {
    pub symbol: String,
    /// Optional price aggregation level
    pub agg_level: Option<u32>,
}

/// Parameters for a candle subscription.
#[derive(Debug, Clone)]
pub struct CandleParams {
    pub symbol: String,
    /// One of the venue's supported intervals, e.g. `1m`, `1h`
    pub interval: String,
}

/// Parameters for a trades subscription.
#[derive(Debug, Clone)]
pub struct TradesParams {
    pub symbol: String,
}

/// Pacifica WebSocket client.
///
/// # Example
///
/// ```ignore
/// use pacifica_sdk::ws::{PacificaWebSocketClient, OrderBookParams};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = PacificaWebSocketClient::new(None);
///     client.connect().await?;
///
///     let sub = client.order_book(
///         OrderBookParams { symbol: "BTC".to_string(), agg_level: None },
///         |book| println!("{} levels at {}", book.symbol, book.timestamp),
///     )?;
///
///     // ... later
///     sub.close();
///     client.close().await;
///     Ok(())
/// }
/// ```
pub struct PacificaWebSocketClient {
    url: String,
    config: WsConfig,
    bus: Arc<CommandBus>,
    registry: Arc<SubscriptionRegistry>,
    state: Arc<Mutex<ConnectionState>>,
    cmd_rx: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    closed: AtomicBool,
}

impl PacificaWebSocketClient {
    /// Create a client for the given URL; `None` selects the mainnet
    /// endpoint. No network traffic happens until [`connect`](Self::connect).
    pub fn new(url: Option<&str>) -> Self {
        Self::with_config(url, WsConfig::default())
    }

    /// Create a client with custom configuration.
    pub fn with_config(url: Option<&str>, config: WsConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let bus = Arc::new(CommandBus::new(cmd_tx));
        let registry = Arc::new(SubscriptionRegistry::new(bus.clone()));

        Self {
            url: url.unwrap_or(DEFAULT_WS_URL).to_string(),
            config,
            bus,
            registry,
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            cmd_rx: Mutex::new(Some(cmd_rx)),
            task: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Establish the connection and start the background connection task.
    ///
    /// A no-op returning `Ok` if the client is already connecting,
    /// connected, or reconnecting. The first dial happens in the foreground
    /// so the caller sees dial errors; after that, connection loss is
    /// handled internally with backoff.
    pub async fn connect(&self) -> WsResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(WsError::Closed);
        }

        {
            let mut state = self.state.lock().expect("state lock poisoned");
            match *state {
                ConnectionState::Connecting
                | ConnectionState::Connected
                | ConnectionState::Reconnecting => return Ok(()),
                ConnectionState::Closed => return Err(WsError::Closed),
                ConnectionState::Disconnected => *state = ConnectionState::Connecting,
            }
        }

        let Some(cmd_rx) = self.cmd_rx.lock().expect("receiver lock poisoned").take() else {
            // A previous task still owns the receiver.
            return Ok(());
        };

        match connect_async(&self.url).await {
            Ok((stream, _)) => {
                *self.state.lock().expect("state lock poisoned") = ConnectionState::Connected;
                let replay = self.registry.begin_session();
                let ctx = ConnContext {
                    url: self.url.clone(),
                    config: self.config.clone(),
                    bus: self.bus.clone(),
                    registry: self.registry.clone(),
                    state: self.state.clone(),
                };
                let handle = tokio::spawn(connection_task(stream, cmd_rx, replay, ctx));
                *self.task.lock().expect("task lock poisoned") = Some(handle);
                Ok(())
            }
            Err(e) => {
                *self.state.lock().expect("state lock poisoned") = ConnectionState::Disconnected;
                *self.cmd_rx.lock().expect("receiver lock poisoned") = Some(cmd_rx);
                Err(WsError::from(e))
            }
        }
    }

    /// Close the client. Idempotent.
    ///
    /// Stops the connection task, clears all subscriber groups, and
    /// performs no further network I/O. Outstanding [`Subscription`]
    /// handles become inert.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.bus.shutdown();
        let handle = self.task.lock().expect("task lock poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        self.registry.clear();
        *self.state.lock().expect("state lock poisoned") = ConnectionState::Closed;
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        *self.state.lock().expect("state lock poisoned")
    }

    /// Whether the transport is currently up.
    pub fn is_connected(&self) -> bool {
        self.bus.is_connected()
    }

    /// The WebSocket URL this client dials.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The client configuration.
    pub fn config(&self) -> &WsConfig {
        &self.config
    }

    // ========================================================================
    // Typed subscriptions
    // ========================================================================

    /// Subscribe to order-book updates for a symbol.
    pub fn order_book(
        &self,
        params: OrderBookParams,
        callback: impl Fn(OrderBook) + Send + Sync + 'static,
    ) -> WsResult<Subscription> {
        self.ensure_open()?;
        let params = SubscribeParams::book(params.symbol, params.agg_level);
        Ok(self.registry.subscribe(
            params,
            Arc::new(move |event| {
                if let MarketEvent::Book(book) = event {
                    callback(book.clone());
                }
            }),
        ))
    }

    /// Subscribe to candles for a symbol at an interval.
    ///
    /// Fails with [`WsError::InvalidParameter`] for unsupported intervals
    /// before any network traffic.
    pub fn candles(
        &self,
        params: CandleParams,
        callback: impl Fn(Candle) + Send + Sync + 'static,
    ) -> WsResult<Subscription> {
        self.ensure_open()?;
        let params = SubscribeParams::candle(params.symbol, params.interval)?;
        Ok(self.registry.subscribe(
            params,
            Arc::new(move |event| {
                if let MarketEvent::Candle(candle) = event {
                    callback(candle.clone());
                }
            }),
        ))
    }

    /// Subscribe to venue-wide price updates.
    pub fn prices(
        &self,
        callback: impl Fn(Vec<PriceUpdate>) + Send + Sync + 'static,
    ) -> WsResult<Subscription> {
        self.ensure_open()?;
        Ok(self.registry.subscribe(
            SubscribeParams::prices(),
            Arc::new(move |event| {
                if let MarketEvent::Prices(prices) = event {
                    callback(prices.clone());
                }
            }),
        ))
    }

    /// Subscribe to trade executions for a symbol.
    pub fn trades(
        &self,
        params: TradesParams,
        callback: impl Fn(Vec<Trade>) + Send + Sync + 'static,
    ) -> WsResult<Subscription> {
        self.ensure_open()?;
        Ok(self.registry.subscribe(
            SubscribeParams::trades(params.symbol),
            Arc::new(move |event| {
                if let MarketEvent::Trades(trades) = event {
                    callback(trades.clone());
                }
            }),
        ))
    }

    fn ensure_open(&self) -> WsResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(WsError::Closed);
        }
        Ok(())
    }
}

/// Shared context for the connection task
struct ConnContext {
    url: String,
    config: WsConfig,
    bus: Arc<CommandBus>,
    registry: Arc<SubscriptionRegistry>,
    state: Arc<Mutex<ConnectionState>>,
}

impl ConnContext {
    fn set_state(&self, state: ConnectionState) {
        *self.state.lock().expect("state lock poisoned") = state;
    }
}

/// Why the per-connection drive loop exited.
enum Exit {
    Shutdown,
    ConnectionLost,
}

/// Owns the live transport for the whole client lifetime: drives the current
/// connection, and on loss reconnects with exponential backoff until either
/// success or shutdown.
///
/// `replay` holds the subscribe payloads to re-send on the current
/// connection; the caller snapshots them for the first one, and each
/// reconnect snapshots its own.
async fn connection_task(
    mut stream: WsStream,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    mut replay: Vec<SubscribeParams>,
    ctx: ConnContext,
) {
    let dispatcher = Dispatcher::new();
    let base_backoff = Duration::from_millis(ctx.config.base_backoff_ms);
    let max_backoff = Duration::from_millis(ctx.config.max_backoff_ms);

    loop {
        let (mut sink, mut source) = stream.split();

        let exit = match replay_subscriptions(&mut sink, replay).await {
            Ok(()) => drive(&mut sink, &mut source, &mut cmd_rx, &dispatcher, &ctx).await,
            Err(e) => {
                tracing::warn!("Failed to replay subscriptions: {}", e);
                Exit::ConnectionLost
            }
        };

        ctx.bus.set_connected(false);

        match exit {
            Exit::Shutdown => {
                let _ = sink.send(Message::Close(None)).await;
                ctx.set_state(ConnectionState::Closed);
                return;
            }
            Exit::ConnectionLost => {}
        }

        ctx.set_state(ConnectionState::Reconnecting);
        tracing::info!("Connection lost, reconnecting");

        let mut backoff = base_backoff;
        stream = loop {
            match connect_async(&ctx.url).await {
                Ok((stream, _)) => break stream,
                Err(e) => {
                    tracing::warn!(delay_ms = backoff.as_millis() as u64, "Reconnect failed: {}", e);
                }
            }

            tokio::select! {
                _ = sleep(backoff) => {}
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Shutdown) | None => {
                        ctx.set_state(ConnectionState::Closed);
                        return;
                    }
                    // Stale data command from the drop window; nothing to
                    // write it to.
                    Some(Command::Send(_)) => {}
                }
            }

            backoff = (backoff * 2).min(max_backoff);
        };

        // Commands queued against the dead connection are stale; the replay
        // snapshot is the source of truth for the new one.
        loop {
            match cmd_rx.try_recv() {
                Ok(Command::Send(_)) => continue,
                Ok(Command::Shutdown) => {
                    ctx.set_state(ConnectionState::Closed);
                    return;
                }
                Err(_) => break,
            }
        }

        ctx.set_state(ConnectionState::Connected);
        replay = ctx.registry.begin_session();
    }
}

/// Drive one live connection until it drops or the client shuts down.
async fn drive(
    sink: &mut WsSink,
    source: &mut WsSource,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    dispatcher: &Dispatcher,
    ctx: &ConnContext,
) -> Exit {
    let ping_period = Duration::from_secs(ctx.config.ping_interval_secs);
    let mut ping = interval_at(Instant::now() + ping_period, ping_period);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            msg = source.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        dispatcher.dispatch_frame(&ctx.registry, text.as_str());
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sink.send(Message::Pong(data)).await.is_err() {
                            return Exit::ConnectionLost;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        return Exit::ConnectionLost;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket read error: {}", e);
                        return Exit::ConnectionLost;
                    }
                    None => {
                        return Exit::ConnectionLost;
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::Send(frame)) => {
                        if let Err(e) = sink.send(Message::Text(frame.into())).await {
                            tracing::warn!("Failed to send command: {}", e);
                            return Exit::ConnectionLost;
                        }
                    }
                    Some(Command::Shutdown) | None => {
                        return Exit::Shutdown;
                    }
                }
            }

            _ = ping.tick() => {
                let frame = match serde_json::to_string(&WsCommand::ping()) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!("Failed to serialize ping: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(frame.into())).await {
                    tracing::warn!("Failed to send ping: {}", e);
                    return Exit::ConnectionLost;
                }
            }
        }
    }
}

/// Send one subscribe command per live stream key.
async fn replay_subscriptions(
    sink: &mut WsSink,
    replay: Vec<SubscribeParams>,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    for params in replay {
        let command = WsCommand::subscribe(params);
        match serde_json::to_string(&command) {
            Ok(frame) => sink.send(Message::Text(frame.into())).await?,
            Err(e) => tracing::warn!("Failed to serialize resubscribe: {}", e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = WsConfig::default();
        assert_eq!(config.ping_interval_secs, 50);
        assert_eq!(config.base_backoff_ms, 1_000);
        assert_eq!(config.max_backoff_ms, 60_000);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = WsConfig::default();
        let max = Duration::from_millis(config.max_backoff_ms);

        let mut backoff = Duration::from_millis(config.base_backoff_ms);
        let mut observed = Vec::new();
        for _ in 0..8 {
            observed.push(backoff);
            backoff = (backoff * 2).min(max);
        }

        assert_eq!(observed[0], Duration::from_secs(1));
        assert_eq!(observed[1], Duration::from_secs(2));
        assert_eq!(observed[5], Duration::from_secs(32));
        assert_eq!(observed[6], Duration::from_secs(60));
        assert_eq!(observed[7], Duration::from_secs(60));
    }

    #[test]
    fn test_new_client_starts_disconnected() {
        let client = PacificaWebSocketClient::new(None);
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert!(!client.is_connected());
        assert_eq!(client.url(), crate::network::DEFAULT_WS_URL);
    }

    #[tokio::test]
    async fn test_subscribe_after_close_fails() {
        let client = PacificaWebSocketClient::new(Some("ws://127.0.0.1:1/ws"));
        client.close().await;

        let result = client.order_book(
            OrderBookParams {
                symbol: "BTC".to_string(),
                agg_level: None,
            },
            |_| {},
        );
        assert!(matches!(result, Err(WsError::Closed)));

        let result = client.connect().await;
        assert!(matches!(result, Err(WsError::Closed)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let client = PacificaWebSocketClient::new(Some("ws://127.0.0.1:1/ws"));
        client.close().await;
        client.close().await;
        assert_eq!(client.connection_state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_connect_failure_resets_state() {
        // Port 1 refuses connections.
        let client = PacificaWebSocketClient::new(Some("ws://127.0.0.1:1/ws"));
        let result = client.connect().await;
        assert!(result.is_err());
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);

        // A second attempt is allowed after a failed dial.
        let result = client.connect().await;
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_candle_interval_rejected_locally() {
        let client = PacificaWebSocketClient::new(None);
        let result = client.candles(
            CandleParams {
                symbol: "BTC".to_string(),
                interval: "9m".to_string(),
            },
            |_| {},
        );
        assert!(matches!(result, Err(WsError::InvalidParameter(_))));
    }
}
