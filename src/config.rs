// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dial and pool configuration for bus connection sources.
//!
//! The library itself never opens connections, but a
//! [`ConnectionSource`](crate::bus::ConnectionSource) implementation needs a
//! construction-time contract for where the bus lives and how its pool
//! should behave. [`BusConfig`] is that contract; [`NamedBusConfig`] wraps
//! it for deployments that configure several buses and mark one as the
//! default.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Error};

fn default_port() -> u16 {
    6379
}

fn default_max_idle() -> usize {
    8
}

fn default_max_active() -> usize {
    64
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Dial and pool parameters for one bus endpoint.
///
/// Field names follow the kebab-case keys used in configuration files.
///
/// # Examples
///
/// ```
/// use buskeeper::config::BusConfig;
/// use std::time::Duration;
///
/// let config = BusConfig::new("bus.internal")
///     .with_port(6380)
///     .with_password("secret")
///     .with_connect_timeout(Duration::from_secs(2));
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BusConfig {
    /// Bus host name or address.
    pub host: String,
    /// Bus port.
    pub port: u16,
    /// Logical database index, for buses that have one.
    pub database: u32,
    /// Password, if the bus requires authentication.
    pub password: Option<String>,
    /// Maximum number of idle connections kept in the pool.
    pub max_idle: usize,
    /// Maximum number of connections the pool will open.
    pub max_active: usize,
    /// Whether `acquire` waits for a free connection when the pool is
    /// exhausted instead of failing.
    pub wait: bool,
    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
    /// Timeout for a single read on a connection.
    ///
    /// Zero means no read timeout; a subscribed connection blocks in its
    /// receive cycle indefinitely.
    pub read_timeout: Duration,
    /// Maximum lifetime of a pooled connection before it is retired.
    pub max_conn_lifetime: Duration,
    /// How long an idle connection may sit in the pool before being closed.
    pub idle_timeout: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            database: 0,
            password: None,
            max_idle: default_max_idle(),
            max_active: default_max_active(),
            wait: true,
            connect_timeout: default_connect_timeout(),
            read_timeout: Duration::ZERO,
            max_conn_lifetime: Duration::ZERO,
            idle_timeout: Duration::from_secs(240),
        }
    }
}

impl BusConfig {
    /// Creates a configuration for the given host with default pool
    /// parameters.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Sets the bus port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the logical database index.
    #[must_use]
    pub fn with_database(mut self, database: u32) -> Self {
        self.database = database;
        self
    }

    /// Sets the authentication password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the pool size limits.
    #[must_use]
    pub fn with_pool_limits(mut self, max_idle: usize, max_active: usize) -> Self {
        self.max_idle = max_idle;
        self.max_active = max_active;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Checks the configuration for obvious mistakes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the host is empty or the port is zero.
    pub fn validate(&self) -> Result<(), Error> {
        if self.host.is_empty() {
            return Err(ConfigError::InvalidBusConfig("host must be specified".to_string()).into());
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidBusConfig("port must not be zero".to_string()).into());
        }
        Ok(())
    }
}

/// A named bus configuration, for deployments with several buses.
///
/// At most one entry in a set should be marked as the default; ties are
/// resolved in favor of the first marked entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NamedBusConfig {
    /// Name of this bus entry.
    pub name: String,
    /// Whether this entry is the default bus.
    #[serde(default)]
    pub default: bool,
    /// The dial and pool parameters.
    pub config: BusConfig,
}

/// Selects the default entry from a set of named configurations.
///
/// Returns the first entry marked `default`, or `None` if no entry is
/// marked.
#[must_use]
pub fn default_config(configs: &[NamedBusConfig]) -> Option<&NamedBusConfig> {
    configs.iter().find(|c| c.default)
}
