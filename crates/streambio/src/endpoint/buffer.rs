// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Buffering filter endpoint.
//!
//! Coalesces small writes until the buffer is full or the chain is flushed.
//! Reads pass straight through to the next endpoint.

use crate::config::BridgeConfig;
use crate::endpoint::{Ctrl, Endpoint, EndpointCx, EndpointMethod, IoStatus};

/// Method name of buffering filters.
pub const NAME: &str = "buffer";

struct BufferMethod {
    out: Vec<u8>,
    capacity: usize,
}

impl BufferMethod {
    /// Push buffered bytes down the chain until empty or blocked.
    fn drain(&mut self, cx: &mut EndpointCx<'_>) -> IoStatus<()> {
        while !self.out.is_empty() {
            match cx.forward_write(&self.out) {
                IoStatus::Complete(0) => return cx.fail("next endpoint accepted no bytes"),
                IoStatus::Complete(n) => {
                    self.out.drain(..n);
                }
                IoStatus::Retry => return IoStatus::Retry,
                IoStatus::Error => return IoStatus::Error,
            }
        }
        IoStatus::Complete(())
    }
}

impl EndpointMethod for BufferMethod {
    fn name(&self) -> &'static str {
        NAME
    }

    fn read(&mut self, cx: &mut EndpointCx<'_>, buf: &mut [u8]) -> IoStatus<usize> {
        cx.forward_read(buf)
    }

    fn write(&mut self, cx: &mut EndpointCx<'_>, buf: &[u8]) -> IoStatus<usize> {
        if self.out.len() + buf.len() <= self.capacity {
            self.out.extend_from_slice(buf);
            return IoStatus::Complete(buf.len());
        }

        match self.drain(cx) {
            IoStatus::Complete(()) => {}
            IoStatus::Retry => return IoStatus::Retry,
            IoStatus::Error => return IoStatus::Error,
        }

        if buf.len() >= self.capacity {
            return cx.forward_write(buf);
        }
        self.out.extend_from_slice(buf);
        IoStatus::Complete(buf.len())
    }

    fn ctrl(&mut self, cx: &mut EndpointCx<'_>, cmd: Ctrl) -> IoStatus<usize> {
        match cmd {
            Ctrl::Flush | Ctrl::Shutdown => match self.drain(cx) {
                IoStatus::Complete(()) => cx.forward_ctrl(cmd),
                IoStatus::Retry => IoStatus::Retry,
                IoStatus::Error => IoStatus::Error,
            },
            Ctrl::Pending | Ctrl::Handshake => cx.forward_ctrl(cmd),
        }
    }
}

/// Create a buffering filter holding at most `capacity` bytes.
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn new_filter(capacity: usize) -> Endpoint {
    assert!(capacity > 0, "buffer filter capacity must be > 0");
    Endpoint::new(BufferMethod {
        out: Vec::with_capacity(capacity),
        capacity,
    })
}

/// Create a buffering filter sized from `config`.
pub fn with_config(config: &BridgeConfig) -> Endpoint {
    new_filter(config.buffer_size)
}
