// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport endpoint over an asynchronous stream.
//!
//! Maps [`StreamBridge`] outcomes onto the endpoint contract:
//!
//! | Bridge outcome | read / write | ctrl flush |
//! |----------------|--------------|------------|
//! | `Success` | `Complete(n)` | `Complete(0)` |
//! | `Pending` | `Retry` + `READ` / `WRITE` | `Retry` + `IO_SPECIAL` |
//! | `Fatal` | `Error` (message queued) | `Error` (message queued) |
//!
//! The bridge is created with the endpoint and destroyed with it; any
//! operation still in flight at that point is released, not cancelled.

use std::sync::Arc;
use std::task::Waker;

use crate::bridge::{Outcome, StreamBridge};
use crate::config::BridgeConfig;
use crate::endpoint::{Ctrl, Endpoint, EndpointCx, EndpointMethod, IoStatus};
use crate::metrics::BridgeMetrics;
use crate::stream::AsyncStream;

/// Method name of stream endpoints.
pub const NAME: &str = "stream";

struct StreamMethod {
    bridge: StreamBridge,
}

impl EndpointMethod for StreamMethod {
    fn name(&self) -> &'static str {
        NAME
    }

    fn read(&mut self, cx: &mut EndpointCx<'_>, buf: &mut [u8]) -> IoStatus<usize> {
        if buf.is_empty() {
            return IoStatus::Complete(0);
        }
        match self.bridge.try_read(buf.len()) {
            Outcome::Success(data) => {
                let n = data.len();
                buf[..n].copy_from_slice(&data);
                IoStatus::Complete(n)
            }
            Outcome::Pending => cx.retry_read(),
            Outcome::Fatal(e) => cx.fail(format!("receive failed: {}", e)),
        }
    }

    fn write(&mut self, cx: &mut EndpointCx<'_>, buf: &[u8]) -> IoStatus<usize> {
        match self.bridge.try_write(buf) {
            Outcome::Success(n) => IoStatus::Complete(n),
            Outcome::Pending => cx.retry_write(),
            Outcome::Fatal(e) => cx.fail(format!("send failed: {}", e)),
        }
    }

    fn ctrl(&mut self, cx: &mut EndpointCx<'_>, cmd: Ctrl) -> IoStatus<usize> {
        match cmd {
            Ctrl::Flush => match self.bridge.try_flush() {
                Outcome::Success(()) => IoStatus::Complete(0),
                Outcome::Pending => cx.retry_special(),
                Outcome::Fatal(e) => cx.fail(format!("flush failed: {}", e)),
            },
            // Nothing is buffered here and there is no session to drive.
            Ctrl::Pending | Ctrl::Handshake | Ctrl::Shutdown => IoStatus::Complete(0),
        }
    }

    fn set_waker(&mut self, waker: &Waker) {
        self.bridge.set_waker(waker.clone());
    }
}

/// Create a non-blocking endpoint over `stream`.
pub fn new_endpoint(stream: Arc<dyn AsyncStream>) -> Endpoint {
    from_bridge(StreamBridge::new(stream))
}

/// Create an endpoint over `stream` using the mode from `config`.
pub fn with_config(stream: Arc<dyn AsyncStream>, config: &BridgeConfig) -> Endpoint {
    from_bridge(StreamBridge::with_config(stream, config))
}

/// Create an endpoint reporting into `metrics`.
pub fn with_metrics(
    stream: Arc<dyn AsyncStream>,
    config: &BridgeConfig,
    metrics: Arc<BridgeMetrics>,
) -> Endpoint {
    from_bridge(StreamBridge::with_config(stream, config).with_metrics(metrics))
}

/// Create an endpoint around an existing bridge.
pub fn from_bridge(bridge: StreamBridge) -> Endpoint {
    Endpoint::new(StreamMethod { bridge })
}
