// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection traits and connection identity.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use uuid::Uuid;

use crate::bus::BusEvent;
use crate::error::TransportError;

/// Unique identifier for a bus connection.
///
/// Each connection handle lent by a [`ConnectionSource`] carries a distinct
/// identity, so that a replacement connection created by a scheduled refresh
/// can be told apart from the one it supersedes.
///
/// # Examples
///
/// ```
/// use buskeeper::bus::ConnectionId;
///
/// let id = ConnectionId::new();
/// println!("connection: {}", id);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Creates a new unique connection identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a connection identifier from an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Show only first 8 characters for readability
        let short = &self.0.to_string()[..8];
        write!(f, "ConnectionId({short}...)")
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ConnectionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// A single connection to the message bus.
///
/// A connection is exclusively owned by one receive loop at a time; the
/// supervisor additionally holds a reference for control calls (ping,
/// unsubscribe, close) issued concurrently with the blocked receive.
/// Implementations must therefore tolerate concurrent control operations
/// alongside a pending [`next_event`](BusConnection::next_event).
///
/// # Graceful-exit contract
///
/// Closing a connection locally — via [`close`](BusConnection::close) —
/// must cause a pending or subsequent `next_event` to return
/// [`BusEvent::Failure`] with [`TransportError::ConnectionClosed`]. That
/// typed variant is the only graceful-exit signal the receive loop
/// recognizes; implementations must not rely on error message text.
pub trait BusConnection: Send + Sync + 'static {
    /// Returns the unique identity of this connection.
    fn id(&self) -> ConnectionId;

    /// Subscribes this connection to the given channel.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the bus rejects the subscribe request.
    fn subscribe(
        &self,
        channel: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Unsubscribes this connection from all channels.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the request cannot be sent.
    fn unsubscribe(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Sends a keepalive probe.
    ///
    /// This is fire-and-forget: the reply, if any, arrives later as a
    /// [`BusEvent::Pong`] through the receive cycle.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the probe cannot be written.
    fn ping(&self, payload: &str) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Pulls the next event from the connection.
    ///
    /// Blocks until an event is available. This is the one blocking point
    /// of the receive loop; it is interrupted only by connection closure,
    /// which surfaces as `Failure(ConnectionClosed)`.
    fn next_event(&self) -> impl Future<Output = BusEvent> + Send;

    /// Closes the connection.
    ///
    /// Idempotent. Unblocks a pending `next_event` per the graceful-exit
    /// contract above.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// A source that lends bus connections on demand and accepts them back.
///
/// This is typically backed by a connection pool; the library never opens
/// connections itself.
pub trait ConnectionSource: Send + Sync + 'static {
    /// The connection type lent by this source.
    type Connection: BusConnection;

    /// Lends one connection.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if no connection can be provided.
    fn acquire(
        &self,
    ) -> impl Future<Output = Result<Arc<Self::Connection>, TransportError>> + Send;

    /// Accepts a connection back after use.
    ///
    /// The handle may still be shared at this point (the supervisor keeps a
    /// control reference until it is replaced); sources decide whether to
    /// recycle or discard it.
    fn release(&self, connection: Arc<Self::Connection>) -> impl Future<Output = ()> + Send;
}
