// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscription supervisor.
//!
//! A [`Subscription`] keeps exactly one live subscription to a named
//! broadcast channel. It forks a receive loop on start, probes the
//! connection with periodic keepalives, and proactively rotates the
//! connection on a refresh timer to defend against transport-side idle
//! disconnects. Recovery from failures is timer-driven: a broken connection
//! is not retried immediately, it is replaced on the next refresh.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::bus::{BusConnection, BusMessage, ConnectionSource};
use crate::error::{ConfigError, HandlerError, Result};
use crate::subscription::receive_loop::ReceiveLoop;

/// Default interval between forced connection rotations.
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(3 * 60);

/// Default interval between keepalive probes.
const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Grace period during a rotation for in-flight deliveries to flush.
const ROTATION_GRACE: Duration = Duration::from_secs(1);

/// Payload sent with keepalive probes.
const KEEPALIVE_PAYLOAD: &str = "PING";

/// Handler invoked once per received message.
///
/// The handler runs synchronously inside the receive loop; a failing
/// handler is logged and delivery continues with the next message. The
/// cancellation token passed in is the subscription's, so long-running
/// handlers can observe shutdown.
pub type MessageHandler =
    Arc<dyn Fn(&CancellationToken, BusMessage) -> std::result::Result<(), HandlerError> + Send + Sync>;

/// The channel a subscription is bound to, together with its handler.
#[derive(Clone)]
pub(crate) struct ChannelBinding {
    pub(crate) channel: String,
    pub(crate) handler: MessageHandler,
}

struct Inner<S: ConnectionSource> {
    source: Arc<S>,
    /// Caller-owned cancellation signal; observed, never cancelled by us.
    cancel: CancellationToken,
    /// Child of `cancel`, additionally cancelled by an explicit `stop`.
    stop_token: CancellationToken,
    refresh_interval: Duration,
    keepalive_interval: Duration,
    binding: Mutex<Option<ChannelBinding>>,
    /// Current connection handle; exclusively owned by the active receive
    /// loop, held here only for control calls (ping, unsubscribe, close).
    connection: Mutex<Option<Arc<S::Connection>>>,
    keepalive_paused: AtomicBool,
    started: AtomicBool,
    stopped: AtomicBool,
}

/// A resilient subscription to one broadcast channel.
///
/// `Subscription` is cheaply cloneable (via `Arc`); clones share the same
/// underlying state, so any clone can be used to stop the subscription.
///
/// # Lifecycle
///
/// 1. Build with [`Subscription::builder`] (a cancellation token is
///    required)
/// 2. Bind a channel and handler with [`subscribe`](Subscription::subscribe)
/// 3. Fork [`start`](Subscription::start) onto a task; it runs until the
///    token is cancelled or [`stop`](Subscription::stop) is called
///
/// A stopped subscription is terminal: create a new instance to listen
/// again.
///
/// # Examples
///
/// ```ignore
/// use std::sync::Arc;
/// use buskeeper::{Subscription, subscription::MessageHandler};
/// use tokio_util::sync::CancellationToken;
///
/// let token = CancellationToken::new();
/// let sub = Subscription::builder(Arc::new(source))
///     .cancel_token(token.clone())
///     .build()?;
///
/// sub.subscribe("policy", Arc::new(|_ctx, msg| {
///     tracing::info!(payload = ?msg.payload_str(), "policy update");
///     Ok(())
/// }))?;
///
/// let runner = sub.clone();
/// tokio::spawn(async move { runner.start().await });
/// ```
pub struct Subscription<S: ConnectionSource> {
    inner: Arc<Inner<S>>,
}

impl<S: ConnectionSource> Clone for Subscription<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: ConnectionSource> Subscription<S> {
    /// Creates a new builder over the given connection source.
    #[must_use]
    pub fn builder(source: Arc<S>) -> SubscriptionBuilder<S> {
        SubscriptionBuilder::new(source)
    }

    /// Binds this subscription to a channel and message handler.
    ///
    /// Must be called exactly once, before [`start`](Subscription::start).
    /// The binding is immutable afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyChannel`] if the channel name is empty,
    /// or [`ConfigError::AlreadySubscribed`] on a second call.
    pub fn subscribe(&self, channel: impl Into<String>, handler: MessageHandler) -> Result<()> {
        let channel = channel.into();
        if channel.is_empty() {
            return Err(ConfigError::EmptyChannel.into());
        }

        let mut binding = self.inner.binding.lock();
        if let Some(existing) = binding.as_ref() {
            return Err(ConfigError::AlreadySubscribed(existing.channel.clone()).into());
        }
        *binding = Some(ChannelBinding { channel, handler });
        Ok(())
    }

    /// Runs the subscription until cancellation or [`stop`](Subscription::stop).
    ///
    /// Forks the first receive loop, then waits on three signals:
    /// cancellation (stop and return), the refresh timer (rotate the
    /// connection), and the keepalive timer (probe the connection).
    /// Callers normally fork this onto its own task.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotSubscribed`] if no channel is bound, or
    /// [`ConfigError::AlreadyStarted`] on a second call. Steady-state
    /// failures never surface here; they are logged and recovered from
    /// internally.
    pub async fn start(&self) -> Result<()> {
        let channel = self
            .channel()
            .ok_or(ConfigError::NotSubscribed)?;
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(ConfigError::AlreadyStarted.into());
        }

        tracing::debug!(
            channel = %channel,
            refresh = ?self.inner.refresh_interval,
            keepalive = ?self.inner.keepalive_interval,
            "starting subscription"
        );
        self.spawn_receive_loop();

        let start = Instant::now();
        let mut refresh =
            tokio::time::interval_at(start + self.inner.refresh_interval, self.inner.refresh_interval);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut keepalive = tokio::time::interval_at(
            start + self.inner.keepalive_interval,
            self.inner.keepalive_interval,
        );
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                // Cancellation wins over a simultaneously expired timer.
                biased;
                () = self.inner.stop_token.cancelled() => {
                    self.stop().await;
                    return Ok(());
                }
                _ = refresh.tick() => {
                    self.spawn_rotation();
                }
                _ = keepalive.tick() => {
                    if !self.inner.keepalive_paused.load(Ordering::Acquire)
                        && let Some(conn) = self.current_connection()
                    {
                        // Fire-and-forget; a reply surfaces as a Pong event.
                        let _ = conn.ping(KEEPALIVE_PAYLOAD).await;
                    }
                }
            }
        }
    }

    /// Stops the subscription.
    ///
    /// Idempotent: the first call closes the current connection and cancels
    /// the coordination loop; subsequent calls are no-ops. A receive loop
    /// still blocked on the connection observes the close as a graceful
    /// exit.
    pub async fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.stop_token.cancel();

        let conn = self.inner.connection.lock().take();
        if let Some(conn) = conn {
            conn.close().await;
        }
        tracing::debug!(channel = ?self.channel(), "subscription stopped");
    }

    /// Returns the channel this subscription is bound to, if any.
    #[must_use]
    pub fn channel(&self) -> Option<String> {
        self.inner.binding.lock().as_ref().map(|b| b.channel.clone())
    }

    /// Returns `true` once the subscription has been stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Returns the caller-supplied cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    pub(crate) fn source(&self) -> Arc<S> {
        Arc::clone(&self.inner.source)
    }

    pub(crate) fn binding(&self) -> Option<ChannelBinding> {
        self.inner.binding.lock().clone()
    }

    pub(crate) fn current_connection(&self) -> Option<Arc<S::Connection>> {
        self.inner.connection.lock().clone()
    }

    /// Installs a freshly acquired connection as the current handle.
    ///
    /// Returns `false` if the subscription stopped in the meantime; the
    /// caller then owns the cleanup of the connection.
    pub(crate) fn install_connection(&self, conn: Arc<S::Connection>) -> bool {
        let mut slot = self.inner.connection.lock();
        if self.inner.stopped.load(Ordering::SeqCst) {
            return false;
        }
        *slot = Some(conn);
        true
    }

    /// Clears the current handle, but only if it is still `conn`.
    ///
    /// A rotation may already have replaced the handle; in that case the
    /// newer connection stays in place.
    pub(crate) fn clear_connection(&self, conn: &Arc<S::Connection>) {
        let mut slot = self.inner.connection.lock();
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, conn)) {
            *slot = None;
        }
    }

    fn spawn_receive_loop(&self) {
        let receive_loop = ReceiveLoop::new(self.clone());
        tokio::spawn(receive_loop.run());
    }

    fn spawn_rotation(&self) {
        let sub = self.clone();
        // Rotation runs on its own task so the coordination loop keeps
        // serving keepalives and cancellation during the grace delay.
        tokio::spawn(async move { sub.rotate().await });
    }

    /// Rotates the live connection: unsubscribe the old one, wait out the
    /// grace period, fork a replacement receive loop. The old loop drains
    /// independently and is never awaited.
    async fn rotate(&self) {
        if self.is_stopped() {
            return;
        }
        tracing::debug!(channel = ?self.channel(), "rotating bus connection");

        self.inner.keepalive_paused.store(true, Ordering::Release);
        if let Some(conn) = self.current_connection() {
            // Best effort: a broken connection cannot unsubscribe, and the
            // replacement does not depend on it.
            let _ = conn.unsubscribe().await;
        }
        tokio::time::sleep(ROTATION_GRACE).await;
        self.inner.keepalive_paused.store(false, Ordering::Release);

        if self.is_stopped() {
            return;
        }
        self.spawn_receive_loop();
    }
}

impl<S: ConnectionSource> std::fmt::Debug for Subscription<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel())
            .field("refresh_interval", &self.inner.refresh_interval)
            .field("keepalive_interval", &self.inner.keepalive_interval)
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

/// Builder for configuring a [`Subscription`].
///
/// # Examples
///
/// ```ignore
/// let sub = Subscription::builder(Arc::new(source))
///     .cancel_token(token)
///     .refresh_interval(Duration::from_secs(60))
///     .keepalive_interval(Duration::from_secs(10))
///     .build()?;
/// ```
pub struct SubscriptionBuilder<S: ConnectionSource> {
    source: Arc<S>,
    cancel: Option<CancellationToken>,
    refresh_interval: Duration,
    keepalive_interval: Duration,
}

impl<S: ConnectionSource> SubscriptionBuilder<S> {
    /// Creates a builder over the given connection source.
    #[must_use]
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            cancel: None,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
        }
    }

    /// Sets the caller-owned cancellation token. Required.
    #[must_use]
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Sets the interval between forced connection rotations
    /// (default: 3 minutes). A zero duration selects the default.
    #[must_use]
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Sets the interval between keepalive probes (default: 30 seconds).
    /// A zero duration selects the default.
    #[must_use]
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Builds the subscription.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCancelToken`] if no cancellation token
    /// was supplied.
    pub fn build(self) -> Result<Subscription<S>> {
        let cancel = self.cancel.ok_or(ConfigError::MissingCancelToken)?;
        let stop_token = cancel.child_token();

        let refresh_interval = if self.refresh_interval.is_zero() {
            DEFAULT_REFRESH_INTERVAL
        } else {
            self.refresh_interval
        };
        let keepalive_interval = if self.keepalive_interval.is_zero() {
            DEFAULT_KEEPALIVE_INTERVAL
        } else {
            self.keepalive_interval
        };

        Ok(Subscription {
            inner: Arc::new(Inner {
                source: self.source,
                cancel,
                stop_token,
                refresh_interval,
                keepalive_interval,
                binding: Mutex::new(None),
                connection: Mutex::new(None),
                keepalive_paused: AtomicBool::new(false),
                started: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
            }),
        })
    }
}
