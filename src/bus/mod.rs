// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Message-bus transport abstraction.
//!
//! The library does not speak any wire protocol itself. Instead it consumes
//! two traits supplied by the caller:
//!
//! - [`ConnectionSource`]: lends one bus connection on demand and accepts it
//!   back on release (typically backed by a connection pool)
//! - [`BusConnection`]: a single connection supporting subscribe,
//!   unsubscribe, keepalive probes, and a blocking receive cycle
//!
//! The receive cycle yields [`BusEvent`] values: published messages,
//! transport failures, subscription state changes, and keepalive replies.
//!
//! # Graceful-exit signaling
//!
//! Connection implementations must surface a locally caused close as
//! [`TransportError::ConnectionClosed`](crate::error::TransportError::ConnectionClosed).
//! The supervisor's failure classification is a pattern match on that
//! variant; error message text is never inspected.

mod connection;
mod event;

pub use connection::{BusConnection, ConnectionId, ConnectionSource};
pub use event::{BusEvent, BusMessage, ChangeKind, SubscriptionChange};
