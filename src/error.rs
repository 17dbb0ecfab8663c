// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `buskeeper` library.
//!
//! This module provides the error hierarchy for the two failure classes the
//! library distinguishes: configuration errors, which are returned
//! synchronously to the caller, and transport failures, which are handled
//! internally by the subscription supervisor and surface only through logs.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error in the subscription configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error reported by the bus transport.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Errors in the construction-time configuration of a subscription.
///
/// These are the only errors that cross the public API boundary: once a
/// subscription is running, failures are logged and recovered from
/// internally rather than returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The channel name was empty.
    #[error("channel name must not be empty")]
    EmptyChannel,

    /// No cancellation token was supplied.
    #[error("a cancellation token is required")]
    MissingCancelToken,

    /// `start` was called before `subscribe`.
    #[error("subscription has no channel; call subscribe first")]
    NotSubscribed,

    /// `subscribe` was called on an already configured subscription.
    #[error("subscription is already bound to channel {0}")]
    AlreadySubscribed(String),

    /// `start` was called more than once.
    #[error("subscription is already running")]
    AlreadyStarted,

    /// A bus configuration failed validation.
    #[error("invalid bus configuration: {0}")]
    InvalidBusConfig(String),
}

/// Errors produced by a bus connection or connection source.
///
/// Implementations of [`ConnectionSource`](crate::bus::ConnectionSource)
/// construct these to describe transport-level failures. The
/// [`ConnectionClosed`](TransportError::ConnectionClosed) variant has special
/// meaning: it marks a termination caused by this side closing the
/// connection, and the receive loop exits silently on it instead of logging
/// a failure.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection was closed locally (by `stop` or a scheduled refresh).
    ///
    /// Sources must map their underlying library's closed-by-local-close
    /// errors onto this variant; the graceful-exit classification is a
    /// pattern match on it and nothing else.
    #[error("connection closed")]
    ConnectionClosed,

    /// Establishing or maintaining the connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The subscribe request was rejected by the bus.
    #[error("subscribe failed: {0}")]
    SubscribeFailed(String),

    /// The bus reported a protocol-level error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A transport operation timed out.
    #[error("operation timed out after {0} ms")]
    Timeout(u64),
}

impl TransportError {
    /// Returns `true` if this failure marks a graceful, locally caused
    /// connection termination.
    #[must_use]
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed)
    }
}

/// Error type returned by message handlers.
///
/// Handler failures are logged by the receive loop and never propagated to
/// the transport; delivery of subsequent messages continues.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
