// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-tree fake bus for integration tests.
//!
//! The fake records every control call with a (virtual) timestamp and lets
//! tests script the event stream of each connection, so timing-sensitive
//! supervisor behavior can be asserted under a paused tokio clock.

use std::collections::VecDeque;
use std::sync::Arc;

use buskeeper::bus::{
    BusConnection, BusEvent, BusMessage, ConnectionId, ConnectionSource, SubscriptionChange,
};
use buskeeper::error::TransportError;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

/// A control call recorded by a fake connection.
#[derive(Debug, Clone)]
pub struct Call {
    pub kind: CallKind,
    pub at: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallKind {
    Subscribe(String),
    Unsubscribe,
    Ping(String),
    Close,
}

/// Scripted behavior for the next connection the source lends.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnBehavior {
    /// Fail the acquire itself.
    pub fail_acquire: bool,
    /// Lend the connection but reject its subscribe request.
    pub fail_subscribe: bool,
}

/// One fake bus connection.
///
/// Control calls are recorded; `unsubscribe` and `close` feed the matching
/// events back into the receive cycle the way a real transport would.
pub struct FakeConnection {
    id: ConnectionId,
    behavior: ConnBehavior,
    events_tx: mpsc::UnboundedSender<BusEvent>,
    events_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<BusEvent>>,
    calls: Mutex<Vec<Call>>,
    channel: Mutex<Option<String>>,
}

impl FakeConnection {
    fn new(behavior: ConnBehavior) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            id: ConnectionId::new(),
            behavior,
            events_tx,
            events_rx: tokio::sync::Mutex::new(events_rx),
            calls: Mutex::new(Vec::new()),
            channel: Mutex::new(None),
        }
    }

    fn record(&self, kind: CallKind) {
        self.calls.lock().push(Call {
            kind,
            at: Instant::now(),
        });
    }

    fn subscribed_channel(&self) -> String {
        self.channel.lock().clone().unwrap_or_default()
    }

    /// Feeds a published message into the receive cycle.
    pub fn push_message(&self, payload: &[u8]) {
        let channel = self.subscribed_channel();
        let _ = self
            .events_tx
            .send(BusEvent::Message(BusMessage::new(channel, payload.to_vec())));
    }

    /// Feeds a transport failure into the receive cycle.
    pub fn push_failure(&self, cause: TransportError) {
        let _ = self.events_tx.send(BusEvent::Failure(cause));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, matches: impl Fn(&CallKind) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| matches(&c.kind)).count()
    }

    pub fn subscribe_count(&self) -> usize {
        self.call_count(|k| matches!(k, CallKind::Subscribe(_)))
    }

    pub fn ping_count(&self) -> usize {
        self.call_count(|k| matches!(k, CallKind::Ping(_)))
    }

    pub fn close_count(&self) -> usize {
        self.call_count(|k| *k == CallKind::Close)
    }

    /// Timestamp of the first call matching the filter.
    pub fn call_at(&self, matches: impl Fn(&CallKind) -> bool) -> Option<Instant> {
        self.calls
            .lock()
            .iter()
            .find(|c| matches(&c.kind))
            .map(|c| c.at)
    }
}

impl BusConnection for FakeConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn subscribe(&self, channel: &str) -> Result<(), TransportError> {
        self.record(CallKind::Subscribe(channel.to_string()));
        if self.behavior.fail_subscribe {
            return Err(TransportError::SubscribeFailed(
                "scripted rejection".to_string(),
            ));
        }
        *self.channel.lock() = Some(channel.to_string());
        let _ = self
            .events_tx
            .send(BusEvent::StateChange(SubscriptionChange::subscribed(
                channel,
            )));
        Ok(())
    }

    async fn unsubscribe(&self) -> Result<(), TransportError> {
        self.record(CallKind::Unsubscribe);
        let channel = self.subscribed_channel();
        let _ = self
            .events_tx
            .send(BusEvent::StateChange(SubscriptionChange::unsubscribed(
                channel,
            )));
        Ok(())
    }

    async fn ping(&self, payload: &str) -> Result<(), TransportError> {
        self.record(CallKind::Ping(payload.to_string()));
        let _ = self.events_tx.send(BusEvent::Pong(payload.to_string()));
        Ok(())
    }

    async fn next_event(&self) -> BusEvent {
        let mut rx = self.events_rx.lock().await;
        match rx.recv().await {
            Some(event) => event,
            None => BusEvent::Failure(TransportError::ConnectionClosed),
        }
    }

    async fn close(&self) {
        self.record(CallKind::Close);
        let _ = self
            .events_tx
            .send(BusEvent::Failure(TransportError::ConnectionClosed));
    }
}

/// A fake connection source with scripted per-connection behavior.
pub struct FakeSource {
    behaviors: Mutex<VecDeque<ConnBehavior>>,
    connections: Mutex<Vec<Arc<FakeConnection>>>,
    released: Mutex<Vec<ConnectionId>>,
}

impl FakeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            behaviors: Mutex::new(VecDeque::new()),
            connections: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
        })
    }

    /// Scripts the behavior of the next acquired connection. Connections
    /// beyond the scripted ones get the default behavior.
    pub fn push_behavior(&self, behavior: ConnBehavior) {
        self.behaviors.lock().push_back(behavior);
    }

    pub fn acquired_count(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn released_ids(&self) -> Vec<ConnectionId> {
        self.released.lock().clone()
    }

    /// The n-th connection lent out (0-based).
    pub fn connection(&self, index: usize) -> Arc<FakeConnection> {
        Arc::clone(&self.connections.lock()[index])
    }

    /// Waits until at least `count` connections have been lent out.
    pub async fn wait_for_connections(&self, count: usize) {
        wait_until(|| self.acquired_count() >= count).await;
    }

    /// Waits until the n-th connection has an acknowledged subscribe.
    pub async fn wait_for_subscribed(&self, index: usize) {
        self.wait_for_connections(index + 1).await;
        let conn = self.connection(index);
        wait_until(|| conn.subscribe_count() > 0).await;
    }
}

impl ConnectionSource for FakeSource {
    type Connection = FakeConnection;

    async fn acquire(&self) -> Result<Arc<FakeConnection>, TransportError> {
        let behavior = self.behaviors.lock().pop_front().unwrap_or_default();
        if behavior.fail_acquire {
            return Err(TransportError::ConnectionFailed(
                "no connections available".to_string(),
            ));
        }
        let conn = Arc::new(FakeConnection::new(behavior));
        self.connections.lock().push(Arc::clone(&conn));
        Ok(conn)
    }

    async fn release(&self, connection: Arc<FakeConnection>) {
        self.released.lock().push(connection.id());
    }
}

/// Polls a condition, advancing the (paused) clock a millisecond at a time.
///
/// Panics if the condition does not hold within a generous budget
/// (ten virtual seconds).
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not met within budget");
}
