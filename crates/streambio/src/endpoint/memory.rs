// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory source/sink endpoint.
//!
//! Writes append to an internal buffer and reads drain it. An empty
//! read-write buffer is a read retry; a read-only buffer created from bytes
//! reports end of stream once drained.

use std::collections::VecDeque;

use crate::endpoint::{Ctrl, Endpoint, EndpointCx, EndpointMethod, IoStatus};

/// Method name of memory endpoints.
pub const NAME: &str = "memory";

struct MemoryMethod {
    data: VecDeque<u8>,
    read_only: bool,
}

impl EndpointMethod for MemoryMethod {
    fn name(&self) -> &'static str {
        NAME
    }

    fn read(&mut self, cx: &mut EndpointCx<'_>, buf: &mut [u8]) -> IoStatus<usize> {
        if self.data.is_empty() {
            if self.read_only {
                return IoStatus::Complete(0);
            }
            return cx.retry_read();
        }
        let n = buf.len().min(self.data.len());
        for (dst, src) in buf.iter_mut().zip(self.data.drain(..n)) {
            *dst = src;
        }
        IoStatus::Complete(n)
    }

    fn write(&mut self, cx: &mut EndpointCx<'_>, buf: &[u8]) -> IoStatus<usize> {
        if self.read_only {
            return cx.fail("write to read-only memory endpoint");
        }
        self.data.extend(buf);
        IoStatus::Complete(buf.len())
    }

    fn ctrl(&mut self, _cx: &mut EndpointCx<'_>, cmd: Ctrl) -> IoStatus<usize> {
        match cmd {
            Ctrl::Pending => IoStatus::Complete(self.data.len()),
            Ctrl::Flush | Ctrl::Handshake | Ctrl::Shutdown => IoStatus::Complete(0),
        }
    }
}

/// Create an empty read-write memory endpoint.
pub fn new_endpoint() -> Endpoint {
    Endpoint::new(MemoryMethod {
        data: VecDeque::new(),
        read_only: false,
    })
}

/// Create a read-only memory endpoint over a copy of `data`.
pub fn from_bytes(data: &[u8]) -> Endpoint {
    Endpoint::new(MemoryMethod {
        data: data.iter().copied().collect(),
        read_only: true,
    })
}
