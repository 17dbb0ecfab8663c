// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bus event types.

use crate::error::TransportError;

/// A message published to a channel.
///
/// # Examples
///
/// ```
/// use buskeeper::bus::BusMessage;
///
/// let msg = BusMessage::new("policy", b"reload".to_vec());
/// assert_eq!(msg.channel, "policy");
/// assert_eq!(msg.payload_str(), Some("reload"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// The channel the message was published to.
    pub channel: String,
    /// The raw message payload.
    pub payload: Vec<u8>,
}

impl BusMessage {
    /// Creates a new message for the given channel.
    #[must_use]
    pub fn new(channel: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            channel: channel.into(),
            payload,
        }
    }

    /// Returns the payload as UTF-8 text, if it is valid UTF-8.
    #[must_use]
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Parses the payload as JSON into the given type.
    ///
    /// # Errors
    ///
    /// Returns error if the payload is not valid JSON for the target type.
    pub fn payload_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

/// The kind of a subscription state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The subscribe request was acknowledged by the bus.
    Subscribed,
    /// The channel was unsubscribed.
    Unsubscribed,
}

/// A change in the subscription state of a connection, as reported by the
/// bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionChange {
    /// What changed.
    pub kind: ChangeKind,
    /// The channel the change applies to.
    pub channel: String,
}

impl SubscriptionChange {
    /// Creates a subscribe acknowledgement for the given channel.
    #[must_use]
    pub fn subscribed(channel: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Subscribed,
            channel: channel.into(),
        }
    }

    /// Creates an unsubscribe notification for the given channel.
    #[must_use]
    pub fn unsubscribed(channel: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Unsubscribed,
            channel: channel.into(),
        }
    }
}

/// An event produced by a bus connection's receive cycle.
///
/// Events are transient: the receive loop consumes each one synchronously
/// and never stores it. Besides published messages, the cycle can observe
/// transport failures, subscription state changes, and replies to keepalive
/// probes.
#[derive(Debug)]
pub enum BusEvent {
    /// A message was published to a subscribed channel.
    Message(BusMessage),

    /// The transport reported a failure.
    ///
    /// A [`TransportError::ConnectionClosed`] cause marks a graceful,
    /// locally caused termination; anything else is an unexpected break.
    Failure(TransportError),

    /// The subscription state of the connection changed.
    StateChange(SubscriptionChange),

    /// A reply to a keepalive probe.
    ///
    /// The receive loop ignores these; they exist so that probe replies
    /// arriving through the regular receive call do not disturb delivery.
    Pong(String),
}

impl BusEvent {
    /// Returns `true` if this event carries a published message.
    #[must_use]
    pub fn is_message(&self) -> bool {
        matches!(self, Self::Message(_))
    }

    /// Returns `true` if this event reports a transport failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }
}
