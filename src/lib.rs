// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `buskeeper` - resilient publish/subscribe channel listeners.
//!
//! This library keeps exactly one live subscription to a named broadcast
//! channel on a message-bus service, delivers every incoming message to a
//! caller-supplied handler, and keeps the subscription alive across network
//! interruptions, idle-connection rot, and periodic forced connection
//! refresh.
//!
//! # How it works
//!
//! - **You bring the transport.** The library consumes a
//!   [`ConnectionSource`](bus::ConnectionSource) (usually a connection
//!   pool) lending [`BusConnection`](bus::BusConnection) handles; it never
//!   speaks a wire protocol itself.
//! - **One receive loop at a time.** Starting a [`Subscription`] forks a
//!   receive loop that subscribes the channel and dispatches events to
//!   your handler.
//! - **Keepalive probes** (default every 30 seconds) prevent idle
//!   teardown by the transport.
//! - **Scheduled refresh** (default every 3 minutes) proactively rotates
//!   the connection, even if it looks healthy. A broken connection is not
//!   retried immediately; it is replaced on the next refresh.
//! - **Cooperative shutdown.** A caller-owned `CancellationToken` (or an
//!   explicit [`stop`](Subscription::stop)) terminates the subscription;
//!   stopped subscriptions are terminal.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use buskeeper::Subscription;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> buskeeper::Result<()> {
//!     // `pool` implements buskeeper::bus::ConnectionSource.
//!     let token = CancellationToken::new();
//!     let sub = Subscription::builder(Arc::new(pool))
//!         .cancel_token(token.clone())
//!         .build()?;
//!
//!     sub.subscribe("policy", Arc::new(|_ctx, msg| {
//!         tracing::info!(payload = ?msg.payload_str(), "policy update");
//!         Ok(())
//!     }))?;
//!
//!     let runner = sub.clone();
//!     tokio::spawn(async move { runner.start().await });
//!
//!     // ... later: token.cancel() or sub.stop().await
//!     Ok(())
//! }
//! ```
//!
//! # Failure model
//!
//! Callers see failures only at configuration time
//! ([`ConfigError`](error::ConfigError)). Once running, transport failures
//! are logged via `tracing` and recovered from on the next refresh cycle;
//! handler failures are logged and delivery continues. Steady-state health
//! is observable through logs and delivery gaps, not return values.

pub mod bus;
pub mod config;
pub mod error;
pub mod subscription;

pub use bus::{BusConnection, BusEvent, BusMessage, ConnectionId, ConnectionSource};
pub use config::{BusConfig, NamedBusConfig};
pub use error::{ConfigError, Error, HandlerError, Result, TransportError};
pub use subscription::{MessageHandler, Subscription, SubscriptionBuilder};
