// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Resilient channel subscriptions.
//!
//! This module is the control surface of the library: a [`Subscription`]
//! owns one live listener on a broadcast channel and keeps it alive across
//! network interruptions, idle-connection rot, and scheduled connection
//! refresh.
//!
//! # Overview
//!
//! A subscription is built over a [`ConnectionSource`], bound to a channel
//! and a [`MessageHandler`], and then started on a task of its own. From
//! that point three signals drive it:
//!
//! - the caller's cancellation token (or an explicit
//!   [`stop`](Subscription::stop)), which terminates it
//! - the refresh timer, which proactively replaces the live connection
//! - the keepalive timer, which probes the connection to prevent idle
//!   teardown
//!
//! Failures on the wire are classified, logged, and recovered from on the
//! next refresh; they never surface to the caller. Only configuration
//! errors are returned synchronously.
//!
//! # Delivery semantics
//!
//! Best effort. Messages within one connection are delivered in transport
//! order; across a rotation the old and new connections may interleave or
//! drop. Handler failures are logged and do not interrupt delivery.
//!
//! [`ConnectionSource`]: crate::bus::ConnectionSource

mod receive_loop;
mod supervisor;

pub use supervisor::{MessageHandler, Subscription, SubscriptionBuilder};
