// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # streambio - synchronous TLS transports over asynchronous streams
//!
//! A TLS engine that pulls bytes through a synchronous, non-blocking
//! transport interface (read, write, flush answering "done", "retry" or
//! "failed") is bridged here onto an asynchronous byte stream whose
//! operations may complete immediately or later through a future.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use streambio::endpoint::stream_ep;
//! use streambio::registry::stacked;
//! use streambio::tls::{new_ssl_endpoint, Role, TlsContext, TlsMethod};
//! use streambio::{AsyncStream, Result};
//!
//! fn connect(stream: Arc<dyn AsyncStream>) -> Result<()> {
//!     let ctx = TlsContext::new(TlsMethod::tls());
//!     ctx.use_system_roots();
//!
//!     let transport = stream_ep::new_endpoint(stream);
//!     let mut tls = stacked(new_ssl_endpoint(&ctx, Role::Client, Some("example.com"))?, transport);
//!     loop {
//!         match tls.handshake() {
//!             Ok(()) => break,
//!             // Re-drive once the stream's waker fires.
//!             Err(e) if e.is_would_block() => continue,
//!             Err(e) => return Err(e),
//!         }
//!     }
//!     let mut written = 0;
//!     tls.send_all(b"GET / HTTP/1.0\r\n\r\n", &mut written)
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                        Engine / caller                              |
//! |   recv | send | flush | handshake | shutdown   -> Result / WouldBlock|
//! +---------------------------------------------------------------------+
//! |                     Endpoint chain (registry)                       |
//! |   tls filter -> buffer / base64 filters -> source/sink endpoint     |
//! +---------------------------------------------------------------------+
//! |                     Stream endpoint adapter                         |
//! |   Success -> done | Pending -> retry READ/WRITE/IO_SPECIAL | Fatal   |
//! +---------------------------------------------------------------------+
//! |                          Stream bridge                              |
//! |   read slot | write slot | flush slot   (one in-flight op each)     |
//! +---------------------------------------------------------------------+
//! |                        AsyncStream                                  |
//! |   receive(max_len) | send(bytes) | flush()  -> Immediate / Deferred |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`FutureHandle`] | Pollable, takeable handle on one asynchronous result |
//! | [`PendingSlot`] | At most one in-flight operation per direction |
//! | [`StreamBridge`] | Non-blocking `try_read`/`try_write`/`try_flush` over an [`AsyncStream`] |
//! | [`Endpoint`] | Transport endpoint with retry flags and an owned chain below it |
//! | [`tls::TlsContext`] | Shared certificate and verification settings |
//!
//! ## Modules Overview
//!
//! - [`bridge`] - stream bridge and its outcome type
//! - [`endpoint`] - endpoint model plus the stream, memory, pair, buffer and base64 methods
//! - [`registry`] - chaining, teardown and live-endpoint accounting
//! - [`tls`] - TLS method/context handles and the TLS filter endpoint
//! - [`config`], [`logging`], [`metrics`] - ambient configuration, logging setup and counters

/// Stream bridge: non-blocking read/write/flush over an asynchronous stream.
pub mod bridge;
/// Bridge configuration (defaults, environment overrides, validation).
pub mod config;
/// Transport endpoints, retry flags and the built-in endpoint methods.
pub mod endpoint;
/// Error types for streams and endpoint chains.
pub mod error;
/// Per-thread queue of endpoint failure messages.
pub mod error_queue;
/// Future handles and the immediate-or-deferred answer shape.
pub mod future;
/// env_logger initialisation helpers.
pub mod logging;
/// Bridge operation counters.
pub mod metrics;
/// Endpoint chaining and teardown.
pub mod registry;
/// Pending-operation slots.
pub mod slot;
/// Asynchronous byte stream trait and adapters.
pub mod stream;
/// TLS handles and the TLS filter endpoint.
pub mod tls;

pub use bridge::{Outcome, StreamBridge};
pub use config::BridgeConfig;
pub use endpoint::pair::make_pair;
pub use endpoint::{Ctrl, Endpoint, EndpointCx, EndpointMethod, IoStatus, RetryFlags};
pub use error::{BioError, Result, RetryReason, StreamError, StreamResult};
pub use future::{FutureHandle, FutureState, MaybeReady};
pub use metrics::{BridgeMetrics, BridgeMetricsSnapshot};
pub use registry::{live_endpoints, pop, push, stacked};
pub use slot::{OpKind, PendingSlot, SlotPoll};
pub use stream::AsyncStream;
#[cfg(feature = "runtime-tokio")]
pub use stream::IoStream;
