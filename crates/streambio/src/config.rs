// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint configuration.
//!
//! # Example
//!
//! ```
//! use streambio::BridgeConfig;
//!
//! let config = BridgeConfig {
//!     pair_buffer_size: 64 * 1024,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```
//!
//! # Environment
//!
//! [`BridgeConfig::from_env`] starts from the defaults and applies:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `STREAMBIO_BLOCKING` | `blocking` (`1`/`true`/`yes` or `0`/`false`/`no`) |
//! | `STREAMBIO_PAIR_BUFFER` | `pair_buffer_size` |
//! | `STREAMBIO_BUFFER_SIZE` | `buffer_size` |
//! | `STREAMBIO_READ_CHUNK` | `read_chunk` |

use crate::error::{BioError, Result};

/// Default per-direction capacity of a loopback pair (one TLS record plus slack).
pub const DEFAULT_PAIR_BUFFER_SIZE: usize = 17 * 1024;

/// Default capacity of the buffering filter.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Default receive size used by the TLS filter.
pub const DEFAULT_READ_CHUNK: usize = 16 * 1024;

/// Endpoint configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Synchronous mode: wait on deferred futures instead of reporting retry.
    pub blocking: bool,

    /// Per-direction capacity of loopback pairs
    pub pair_buffer_size: usize,

    /// Capacity of the buffering filter
    pub buffer_size: usize,

    /// Bytes requested from the lower endpoint per TLS record pull
    pub read_chunk: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            blocking: false,
            pair_buffer_size: DEFAULT_PAIR_BUFFER_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            read_chunk: DEFAULT_READ_CHUNK,
        }
    }
}

impl BridgeConfig {
    /// Defaults with `STREAMBIO_*` environment overrides applied.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("STREAMBIO_BLOCKING") {
            match parse_bool(&raw) {
                Some(v) => config.blocking = v,
                None => log::warn!("[CONFIG] ignoring STREAMBIO_BLOCKING={:?}", raw),
            }
        }
        apply_size(&lookup, "STREAMBIO_PAIR_BUFFER", &mut config.pair_buffer_size);
        apply_size(&lookup, "STREAMBIO_BUFFER_SIZE", &mut config.buffer_size);
        apply_size(&lookup, "STREAMBIO_READ_CHUNK", &mut config.read_chunk);

        config
    }

    /// Builder: set synchronous mode
    pub fn with_blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    /// Builder: set loopback pair capacity
    pub fn with_pair_buffer_size(mut self, size: usize) -> Self {
        self.pair_buffer_size = size;
        self
    }

    /// Builder: set buffering filter capacity
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Builder: set TLS read chunk
    pub fn with_read_chunk(mut self, size: usize) -> Self {
        self.read_chunk = size;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.pair_buffer_size == 0 {
            return Err(BioError::Config("pair_buffer_size must be > 0".into()));
        }
        if self.buffer_size == 0 {
            return Err(BioError::Config("buffer_size must be > 0".into()));
        }
        if self.read_chunk == 0 {
            return Err(BioError::Config("read_chunk must be > 0".into()));
        }
        Ok(())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn apply_size(lookup: &impl Fn(&str) -> Option<String>, key: &str, field: &mut usize) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<usize>() {
        Ok(v) if v > 0 => *field = v,
        _ => log::warn!("[CONFIG] ignoring {}={:?}", key, raw),
    }
}
