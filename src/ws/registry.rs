//! Subscription registry: reference-counted subscriber groups per stream key.
//!
//! Many callers may subscribe to the same logical stream; the venue sees one
//! upstream subscription per key. The registry issues the upstream subscribe
//! on the 0→1 interest transition and the unsubscribe on 1→0, and replays
//! every live subscription after a reconnect.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::ws::types::{MarketEvent, StreamKey, SubscribeParams, WsCommand};

/// Commands funneled to the connection task. Routing every outbound write
/// through that single task keeps frames from interleaving.
#[derive(Debug)]
pub(crate) enum Command {
    /// A serialized frame to write to the transport
    Send(String),
    /// Tear down the connection and stop all background work
    Shutdown,
}

/// Shared sender half of the command channel.
///
/// While the transport is down, data commands are dropped rather than queued:
/// resubscribe-all covers registration on reconnect, and an unsubscribe for a
/// dead connection is moot. `Shutdown` always goes through so the backoff
/// loop can be interrupted.
pub(crate) struct CommandBus {
    tx: mpsc::UnboundedSender<Command>,
    connected: AtomicBool,
}

impl CommandBus {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Command>) -> Self {
        Self {
            tx,
            connected: AtomicBool::new(false),
        }
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Serialize and send a command frame if the transport is up.
    pub(crate) fn send_command(&self, command: &WsCommand) {
        if !self.is_connected() {
            tracing::debug!(method = %command.method, "Transport down, dropping command");
            return;
        }
        match serde_json::to_string(command) {
            Ok(frame) => {
                if self.tx.send(Command::Send(frame)).is_err() {
                    tracing::debug!("Connection task gone, dropping command");
                }
            }
            Err(e) => tracing::warn!("Failed to serialize command: {}", e),
        }
    }

    pub(crate) fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
    }
}

/// Per-subscription callback, erased over the channel's payload type.
pub(crate) type EventCallback = Arc<dyn Fn(&MarketEvent) + Send + Sync>;

/// One upstream subscription and everyone interested in it.
struct SubscriberGroup {
    /// The payload originally sent upstream; replayed verbatim on reconnect
    params: SubscribeParams,
    callbacks: HashMap<u64, EventCallback>,
}

/// Maps stream keys to refcounted subscriber groups.
pub(crate) struct SubscriptionRegistry {
    groups: Mutex<HashMap<StreamKey, SubscriberGroup>>,
    next_id: AtomicU64,
    bus: Arc<CommandBus>,
}

impl SubscriptionRegistry {
    pub(crate) fn new(bus: Arc<CommandBus>) -> Self {
        Self {
            groups: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            bus,
        }
    }

    /// Register a callback under the key derived from `params`.
    ///
    /// First interest in a key sends the upstream subscribe. The command is
    /// pushed while the groups lock is held so refcount transitions on one
    /// key cannot reorder; the push is a channel send, never network I/O.
    pub(crate) fn subscribe(
        self: &Arc<Self>,
        params: SubscribeParams,
        callback: EventCallback,
    ) -> Subscription {
        let key = params.stream_key();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;

        let mut groups = self.groups.lock().expect("registry lock poisoned");
        match groups.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().callbacks.insert(id, callback);
            }
            Entry::Vacant(entry) => {
                let mut callbacks = HashMap::new();
                callbacks.insert(id, callback);
                entry.insert(SubscriberGroup {
                    params: params.clone(),
                    callbacks,
                });
                self.bus.send_command(&WsCommand::subscribe(params));
            }
        }
        drop(groups);

        Subscription {
            registry: Arc::clone(self),
            key,
            id,
            closed: AtomicBool::new(false),
        }
    }

    /// Remove one callback; last interest in a key sends the upstream
    /// unsubscribe and drops the group.
    pub(crate) fn unsubscribe(&self, key: &StreamKey, id: u64) {
        let mut groups = self.groups.lock().expect("registry lock poisoned");
        let Some(group) = groups.get_mut(key) else {
            return;
        };
        if group.callbacks.remove(&id).is_none() {
            return;
        }
        if group.callbacks.is_empty() {
            let group = groups.remove(key).expect("group present");
            self.bus.send_command(&WsCommand::unsubscribe(group.params));
        }
    }

    /// Fan an event out to every callback registered under `key`.
    ///
    /// Callbacks are snapshotted under the lock and invoked outside it, so a
    /// slow callback cannot block subscribe/unsubscribe and dispatch cannot
    /// deadlock against a concurrent unsubscribe of the same key. Returns the
    /// number of callbacks invoked.
    pub(crate) fn dispatch(&self, key: &StreamKey, event: &MarketEvent) -> usize {
        let callbacks: Vec<EventCallback> = {
            let groups = self.groups.lock().expect("registry lock poisoned");
            match groups.get(key) {
                Some(group) => group.callbacks.values().cloned().collect(),
                None => return 0,
            }
        };
        let count = callbacks.len();
        for callback in &callbacks {
            callback(event);
        }
        count
    }

    /// Mark the transport up and snapshot the replay set in one step.
    ///
    /// Both happen under the groups lock, so every subscription either lands
    /// in the snapshot (registered while down, command dropped) or on the
    /// command channel (registered after, command queued) — exactly one of
    /// the two.
    pub(crate) fn begin_session(&self) -> Vec<SubscribeParams> {
        let groups = self.groups.lock().expect("registry lock poisoned");
        self.bus.set_connected(true);
        groups.values().map(|g| g.params.clone()).collect()
    }

    /// Drop every group without sending upstream unsubscribes; used when the
    /// client closes and no further network I/O is allowed.
    pub(crate) fn clear(&self) {
        self.groups.lock().expect("registry lock poisoned").clear();
    }

    #[cfg(test)]
    pub(crate) fn group_count(&self) -> usize {
        self.groups.lock().unwrap().len()
    }
}

/// Handle to one registered callback.
///
/// `close` is idempotent; dropping the handle closes it too. After close the
/// callback is never invoked again.
pub struct Subscription {
    registry: Arc<SubscriptionRegistry>,
    key: StreamKey,
    id: u64,
    closed: AtomicBool,
}

impl Subscription {
    /// The stream key this subscription is registered under.
    pub fn stream_key(&self) -> &StreamKey {
        &self.key
    }

    /// Unregister the callback; if this was the last interest in the stream,
    /// the upstream subscription is dropped as well.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.registry.unsubscribe(&self.key, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::ws::types::{OrderBook, PriceUpdate};

    struct Harness {
        registry: Arc<SubscriptionRegistry>,
        rx: mpsc::UnboundedReceiver<Command>,
    }

    fn harness() -> Harness {
        let (tx, rx) = mpsc::unbounded_channel();
        let bus = Arc::new(CommandBus::new(tx));
        bus.set_connected(true);
        Harness {
            registry: Arc::new(SubscriptionRegistry::new(bus)),
            rx,
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Command>) -> Vec<serde_json::Value> {
        let mut frames = Vec::new();
        while let Ok(cmd) = rx.try_recv() {
            if let Command::Send(frame) = cmd {
                frames.push(serde_json::from_str(&frame).unwrap());
            }
        }
        frames
    }

    fn noop() -> EventCallback {
        Arc::new(|_| {})
    }

    fn book_event(symbol: &str) -> MarketEvent {
        MarketEvent::Book(OrderBook {
            symbol: symbol.to_string(),
            levels: vec![],
            timestamp: 0,
        })
    }

    #[test]
    fn test_dedup_one_upstream_subscribe() {
        let mut h = harness();

        let sub_a = h.registry.subscribe(SubscribeParams::book("BTC", None), noop());
        let sub_b = h.registry.subscribe(SubscribeParams::book("BTC", None), noop());

        let frames = drain(&mut h.rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["method"], "subscribe");
        assert_eq!(frames[0]["params"]["symbol"], "BTC");

        drop((sub_a, sub_b));
    }

    #[test]
    fn test_partial_unsubscribe_keeps_stream() {
        let mut h = harness();

        let sub_a = h.registry.subscribe(SubscribeParams::trades("SOL"), noop());
        let sub_b = h.registry.subscribe(SubscribeParams::trades("SOL"), noop());
        drain(&mut h.rx);

        sub_a.close();
        assert!(drain(&mut h.rx).is_empty());
        assert_eq!(h.registry.group_count(), 1);

        sub_b.close();
        let frames = drain(&mut h.rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["method"], "unsubscribe");
        assert_eq!(h.registry.group_count(), 0);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut h = harness();

        let sub = h.registry.subscribe(SubscribeParams::prices(), noop());
        drain(&mut h.rx);

        sub.close();
        sub.close();
        let frames = drain(&mut h.rx);
        assert_eq!(frames.len(), 1, "double close must not double-unsubscribe");
    }

    #[test]
    fn test_drop_closes_subscription() {
        let mut h = harness();

        {
            let _sub = h.registry.subscribe(SubscribeParams::book("ETH", None), noop());
            drain(&mut h.rx);
        }
        let frames = drain(&mut h.rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["method"], "unsubscribe");
    }

    #[test]
    fn test_dispatch_fans_out_to_key_only() {
        let mut h = harness();

        let btc_hits = Arc::new(AtomicUsize::new(0));
        let eth_hits = Arc::new(AtomicUsize::new(0));

        let btc_hits_a = btc_hits.clone();
        let _a = h.registry.subscribe(
            SubscribeParams::book("BTC", None),
            Arc::new(move |_| {
                btc_hits_a.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let btc_hits_b = btc_hits.clone();
        let _b = h.registry.subscribe(
            SubscribeParams::book("BTC", None),
            Arc::new(move |_| {
                btc_hits_b.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let eth_hits_c = eth_hits.clone();
        let _c = h.registry.subscribe(
            SubscribeParams::book("ETH", None),
            Arc::new(move |_| {
                eth_hits_c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        drain(&mut h.rx);

        let delivered = h.registry.dispatch(&StreamKey::book("BTC"), &book_event("BTC"));
        assert_eq!(delivered, 2);
        assert_eq!(btc_hits.load(Ordering::SeqCst), 2);
        assert_eq!(eth_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_no_delivery_after_close() {
        let mut h = harness();

        let hits = Arc::new(AtomicUsize::new(0));
        let hits_cb = hits.clone();
        let sub = h.registry.subscribe(
            SubscribeParams::prices(),
            Arc::new(move |_| {
                hits_cb.fetch_add(1, Ordering::SeqCst);
            }),
        );
        drain(&mut h.rx);

        let prices = MarketEvent::Prices(vec![PriceUpdate {
            symbol: "BTC".to_string(),
            mark: "50000".to_string(),
            mid: None,
            oracle: None,
            funding: None,
            timestamp: 0,
        }]);

        h.registry.dispatch(&StreamKey::prices(), &prices);
        sub.close();
        h.registry.dispatch(&StreamKey::prices(), &prices);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_resubscribe_snapshot_covers_live_keys_only() {
        let mut h = harness();

        let keep = h.registry.subscribe(SubscribeParams::book("BTC", None), noop());
        let gone = h.registry.subscribe(SubscribeParams::trades("ETH"), noop());
        gone.close();
        drain(&mut h.rx);

        let params = h.registry.begin_session();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].stream_key(), StreamKey::book("BTC"));

        drop(keep);
    }

    #[test]
    fn test_commands_dropped_while_disconnected() {
        // Bus starts disconnected, as between reconnect attempts.
        let (tx, mut rx) = mpsc::unbounded_channel();
        let bus = Arc::new(CommandBus::new(tx));
        let registry = Arc::new(SubscriptionRegistry::new(bus));

        let _sub = registry.subscribe(SubscribeParams::book("BTC", None), noop());
        assert!(drain(&mut rx).is_empty());
        // Interest is still tracked for replay on reconnect.
        assert_eq!(registry.begin_session().len(), 1);
    }

    #[test]
    fn test_begin_session_hands_over_from_drop_to_queue() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let bus = Arc::new(CommandBus::new(tx));
        let registry = Arc::new(SubscriptionRegistry::new(bus.clone()));

        // Registered while down: command dropped, covered by the snapshot.
        let _early = registry.subscribe(SubscribeParams::book("BTC", None), noop());
        assert!(drain(&mut rx).is_empty());

        let replay = registry.begin_session();
        assert_eq!(replay.len(), 1);

        // Registered after: command queued, not part of the snapshot.
        let _late = registry.subscribe(SubscribeParams::trades("ETH"), noop());
        let frames = drain(&mut rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["params"]["symbol"], "ETH");
    }

    #[test]
    fn test_clear_drops_groups_without_io() {
        let mut h = harness();

        let _a = h.registry.subscribe(SubscribeParams::book("BTC", None), noop());
        let _b = h.registry.subscribe(SubscribeParams::prices(), noop());
        drain(&mut h.rx);

        h.registry.clear();
        assert_eq!(h.registry.group_count(), 0);
        assert!(drain(&mut h.rx).is_empty());

        // Closing stale handles after clear is a no-op.
        _a.close();
        assert!(drain(&mut h.rx).is_empty());
    }
}
