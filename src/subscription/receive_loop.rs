// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-connection receive loop.
//!
//! A [`ReceiveLoop`] is created on every (re)connection: it acquires one
//! connection from the source, issues the subscribe request, then blocks in
//! a receive cycle dispatching messages until the connection ends. It is
//! destroyed when the connection ends, normally or otherwise, or when a
//! scheduled refresh supersedes it.
//!
//! There is no retry at this layer: if the subscribe fails or the connection
//! breaks, the loop reports the failure once and exits. Reconnection happens
//! exclusively through the supervisor's refresh timer.

use std::sync::Arc;

use crate::bus::{BusConnection, BusEvent, ChangeKind, ConnectionSource};
use crate::subscription::Subscription;

/// Lifecycle state of one receive loop instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopState {
    /// Acquiring a connection and subscribing.
    Connecting,
    /// Subscribed and pulling events.
    Subscribed,
    /// The connection ended gracefully; the loop is winding down.
    Draining,
    /// Terminal. The connection handle has been released to the source.
    Closed,
}

/// One receive loop instance, owning one connection for its lifetime.
pub(crate) struct ReceiveLoop<S: ConnectionSource> {
    subscription: Subscription<S>,
    state: LoopState,
}

impl<S: ConnectionSource> ReceiveLoop<S> {
    pub(crate) fn new(subscription: Subscription<S>) -> Self {
        Self {
            subscription,
            state: LoopState::Connecting,
        }
    }

    /// Runs the loop to completion.
    ///
    /// Acquires a connection, installs it as the subscription's current
    /// handle, subscribes, then pulls events until the connection ends.
    /// The handle is released back to the source on every exit path.
    pub(crate) async fn run(mut self) {
        let Some(binding) = self.subscription.binding() else {
            return;
        };
        let channel = binding.channel.clone();
        let source = self.subscription.source();

        let conn = match source.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(error = %e, channel = %channel, "failed to acquire bus connection");
                self.state = LoopState::Closed;
                return;
            }
        };

        if !self.subscription.install_connection(Arc::clone(&conn)) {
            // Stopped while we were connecting; hand the connection back.
            conn.close().await;
            source.release(conn).await;
            self.state = LoopState::Closed;
            return;
        }

        if let Err(e) = conn.subscribe(&channel).await {
            tracing::error!(
                error = %e,
                channel = %channel,
                connection = %conn.id(),
                "subscribe failed"
            );
            self.release(conn).await;
            return;
        }

        self.state = LoopState::Subscribed;
        tracing::debug!(channel = %channel, connection = %conn.id(), "subscribed");

        loop {
            match conn.next_event().await {
                BusEvent::Message(msg) => {
                    if let Err(e) = (binding.handler)(self.subscription.cancel_token(), msg) {
                        tracing::warn!(error = %e, channel = %channel, "message handler failed");
                    }
                }
                BusEvent::Failure(cause) if cause.is_connection_closed() => {
                    // Closed by stop or a scheduled refresh; exit silently.
                    self.state = LoopState::Draining;
                    break;
                }
                BusEvent::Failure(cause) => {
                    tracing::error!(
                        error = %cause,
                        channel = %channel,
                        connection = %conn.id(),
                        "connection failed; reconnecting on next refresh"
                    );
                    break;
                }
                BusEvent::StateChange(change) if change.kind == ChangeKind::Unsubscribed => {
                    self.state = LoopState::Draining;
                    break;
                }
                BusEvent::StateChange(_) | BusEvent::Pong(_) => {}
            }
        }

        self.release(conn).await;
    }

    /// Clears the subscription's handle if it is still ours and returns the
    /// connection to the source.
    async fn release(&mut self, conn: Arc<S::Connection>) {
        self.subscription.clear_connection(&conn);
        self.subscription.source().release(conn).await;
        tracing::trace!(
            from = ?self.state,
            channel = ?self.subscription.channel(),
            "receive loop closed"
        );
        self.state = LoopState::Closed;
    }
}
