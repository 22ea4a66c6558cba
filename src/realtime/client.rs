//! Realtime channel client
//!
//! [`RealtimeChannel`] keeps one connection to the hub alive. It is a small
//! state machine driven by three kinds of input:
//!
//! - calls from the host (`connect`, `disconnect`, `send_message`)
//! - socket events (`handle_open`, `handle_message`, `handle_error`, `handle_close`)
//! - its own timers (keep-alive, reconnect, activity window)
//!
//! Every transition takes the slot lock briefly and never across an await or
//! a collaborator call, so a notifier may call back into the client.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::dispatch::{dispatch, CacheInvalidator, DispatchOutcome, Notifier};
use super::timer::TimerSlot;
use super::transport::{Connection, SocketEvent, Transport, WebSocketTransport};
use crate::config::ChannelConfig;
use crate::types::{ClientMessage, ConnectionState, RealtimeMessage};

/// The live connection, if any
struct Link {
    generation: u64,
    outbound: mpsc::UnboundedSender<String>,
    open: bool,
    pump: JoinHandle<()>,
}

#[derive(Default)]
struct Slots {
    link: Option<Link>,
    generation: u64,
    keepalive: TimerSlot,
    reconnect: TimerSlot,
    activity: TimerSlot,
}

impl Slots {
    fn is_current(&self, generation: u64) -> bool {
        self.link
            .as_ref()
            .is_some_and(|link| link.generation == generation)
    }

    /// Drop the link and its keep-alive. Returns whether a link existed.
    fn teardown_link(&mut self) -> bool {
        self.keepalive.cancel();
        match self.link.take() {
            Some(link) => {
                link.pump.abort();
                true
            }
            None => false,
        }
    }
}

struct Inner {
    config: ChannelConfig,
    transport: Arc<dyn Transport>,
    invalidator: Arc<dyn CacheInvalidator>,
    notifier: Arc<dyn Notifier>,
    slots: Mutex<Slots>,
    state: watch::Sender<ConnectionState>,
    last_message: watch::Sender<Option<RealtimeMessage>>,
    receiving: watch::Sender<bool>,
}

/// Client side of the realtime channel.
///
/// Cloning is cheap and every clone drives the same connection. Must be used
/// from within a tokio runtime.
#[derive(Clone)]
pub struct RealtimeChannel {
    inner: Arc<Inner>,
}

impl RealtimeChannel {
    pub fn new(
        config: ChannelConfig,
        transport: Arc<dyn Transport>,
        invalidator: Arc<dyn CacheInvalidator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                invalidator,
                notifier,
                slots: Mutex::new(Slots::default()),
                state: watch::Sender::new(ConnectionState::Disconnected),
                last_message: watch::Sender::new(None),
                receiving: watch::Sender::new(false),
            }),
        }
    }

    /// Channel over a real WebSocket
    pub fn websocket(
        config: ChannelConfig,
        invalidator: Arc<dyn CacheInvalidator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::new(config, Arc::new(WebSocketTransport), invalidator, notifier)
    }

    /// Open a connection unless one is already connecting or open.
    pub fn connect(&self) {
        self.inner.connect();
    }

    /// Tear everything down: connection, keep-alive, reconnect and activity
    /// timers. Safe to call repeatedly and from inside a collaborator.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Best-effort send of one JSON frame. Returns whether the connection was
    /// open; nothing is queued or retried.
    pub fn send_message<T: Serialize + ?Sized>(&self, payload: &T) -> bool {
        match serde_json::to_string(payload) {
            Ok(text) => self.inner.send_text(text),
            Err(err) => {
                warn!(error = %err, "failed to serialize outbound realtime message");
                false
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn last_message(&self) -> Option<RealtimeMessage> {
        self.inner.last_message.borrow().clone()
    }

    /// Activity flag: true for a short window after a non-keepalive message
    pub fn is_receiving(&self) -> bool {
        *self.inner.receiving.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn subscribe_messages(&self) -> watch::Receiver<Option<RealtimeMessage>> {
        self.inner.last_message.subscribe()
    }

    pub fn subscribe_activity(&self) -> watch::Receiver<bool> {
        self.inner.receiving.subscribe()
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.inner.config
    }

    /// Whether a reconnect is waiting to fire
    pub fn reconnect_pending(&self) -> bool {
        self.inner.slots.lock().reconnect.is_armed()
    }
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            debug!(from = %current, to = %state, "realtime connection state changed");
            *current = state;
            true
        });
    }

    fn connect(self: &Arc<Self>) {
        let mut slots = self.slots.lock();
        self.connect_locked(&mut slots);
    }

    /// Body of `connect`, run under a guard the caller already holds
    fn connect_locked(self: &Arc<Self>, slots: &mut Slots) {
        if slots.link.is_some() {
            debug!("realtime connection already active");
            return;
        }
        slots.reconnect.cancel();

        self.set_state(ConnectionState::Connecting);
        info!(endpoint = %self.config.endpoint, "connecting to realtime hub");

        match self.transport.open(&self.config.endpoint) {
            Ok(Connection { outbound, events }) => {
                slots.generation += 1;
                let generation = slots.generation;
                let pump = tokio::spawn(pump_events(Arc::downgrade(self), generation, events));
                slots.link = Some(Link {
                    generation,
                    outbound,
                    open: false,
                    pump,
                });
            }
            Err(err) => {
                warn!(error = %err, "failed to open realtime connection");
                self.set_state(ConnectionState::Error);
                self.schedule_reconnect(slots, self.config.connect_failure_delay);
            }
        }
    }

    fn disconnect(&self) {
        let mut slots = self.slots.lock();
        let reconnect = slots.reconnect.cancel();
        slots.activity.cancel();
        let link = slots.teardown_link();
        self.receiving.send_if_modified(|flag| std::mem::replace(flag, false));
        self.set_state(ConnectionState::Disconnected);
        drop(slots);

        if link || reconnect {
            info!("realtime channel disconnected");
        }
    }

    fn send_text(&self, text: String) -> bool {
        let slots = self.slots.lock();
        match &slots.link {
            Some(link) if link.open => link.outbound.send(text).is_ok(),
            _ => {
                debug!("realtime connection not open, dropping outbound message");
                false
            }
        }
    }

    fn handle_open(self: &Arc<Self>, generation: u64) {
        let mut slots = self.slots.lock();
        let Some(link) = slots.link.as_mut().filter(|link| link.generation == generation) else {
            return;
        };
        link.open = true;

        self.set_state(ConnectionState::Connected);
        info!(endpoint = %self.config.endpoint, "realtime connection established");
        self.start_keepalive(&mut slots);
    }

    fn handle_message(self: &Arc<Self>, generation: u64, text: &str) {
        if !self.slots.lock().is_current(generation) {
            return;
        }

        let message = match RealtimeMessage::parse(text) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "discarding malformed realtime payload");
                return;
            }
        };

        let outcome = dispatch(&message, &*self.invalidator, &*self.notifier);
        if matches!(outcome, DispatchOutcome::Ignored(_)) {
            return;
        }

        let mut slots = self.slots.lock();
        // A collaborator may have disconnected us during dispatch
        if !slots.is_current(generation) {
            return;
        }
        if outcome.marks_activity() {
            self.mark_activity(&mut slots);
        }
        self.last_message.send_replace(Some(message));
    }

    fn handle_error(self: &Arc<Self>, generation: u64, reason: &str) {
        let mut slots = self.slots.lock();
        if !slots.is_current(generation) {
            return;
        }
        warn!(reason, "realtime connection error");

        slots.teardown_link();
        self.clear_activity(&mut slots);
        self.set_state(ConnectionState::Error);
        self.schedule_reconnect(&mut slots, self.config.reconnect_delay);
    }

    fn handle_close(self: &Arc<Self>, generation: u64) {
        let mut slots = self.slots.lock();
        if !slots.is_current(generation) {
            return;
        }
        info!("realtime connection closed");

        slots.teardown_link();
        self.clear_activity(&mut slots);
        self.set_state(ConnectionState::Disconnected);
        self.schedule_reconnect(&mut slots, self.config.reconnect_delay);
    }

    fn schedule_reconnect(self: &Arc<Self>, slots: &mut Slots, delay: Duration) {
        debug!(delay_ms = delay.as_millis() as u64, "scheduling realtime reconnect");
        let weak = Arc::downgrade(self);
        let deadline = Instant::now() + delay;

        slots.reconnect.arm(|id| {
            tokio::spawn(async move {
                sleep_until(deadline).await;
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let mut slots = inner.slots.lock();
                if slots.reconnect.fire(id) {
                    inner.connect_locked(&mut slots);
                }
            })
        });
    }

    fn start_keepalive(self: &Arc<Self>, slots: &mut Slots) {
        let weak = Arc::downgrade(self);
        let period = self.config.keepalive_interval;

        slots.keepalive.arm(|_| {
            tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    let Some(inner) = weak.upgrade() else {
                        return;
                    };
                    if !inner.send_keepalive() {
                        return;
                    }
                }
            })
        });
    }

    fn send_keepalive(&self) -> bool {
        match serde_json::to_string(&ClientMessage::Ping) {
            Ok(ping) => self.send_text(ping),
            Err(_) => false,
        }
    }

    fn mark_activity(self: &Arc<Self>, slots: &mut Slots) {
        self.receiving.send_if_modified(|flag| !std::mem::replace(flag, true));

        let weak = Arc::downgrade(self);
        let deadline = Instant::now() + self.config.activity_window;

        slots.activity.arm(|id| {
            tokio::spawn(async move {
                sleep_until(deadline).await;
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let mut slots = inner.slots.lock();
                if slots.activity.fire(id) {
                    inner.receiving.send_replace(false);
                }
            })
        });
    }

    fn clear_activity(&self, slots: &mut Slots) {
        slots.activity.cancel();
        self.receiving.send_if_modified(|flag| std::mem::replace(flag, false));
    }
}

/// Feeds socket events of one connection into the state machine
async fn pump_events(
    weak: Weak<Inner>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<SocketEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        match event {
            SocketEvent::Opened => inner.handle_open(generation),
            SocketEvent::Message(text) => inner.handle_message(generation, &text),
            SocketEvent::Error(reason) => inner.handle_error(generation, &reason),
            SocketEvent::Closed => {
                inner.handle_close(generation);
                return;
            }
        }
    }

    // Transport went away without a close event
    if let Some(inner) = weak.upgrade() {
        inner.handle_close(generation);
    }
}
