// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Loopback endpoint pairs.
//!
//! [`make_pair`] returns two endpoints sharing a bounded in-memory channel in
//! each direction: bytes written into one become readable from the other.
//! The two sides are owned independently.
//!
//! ```text
//!   side A --write--> [ A->B buffer ] --read--> side B
//!   side A <--read--- [ B->A buffer ] <--write-- side B
//! ```
//!
//! | Situation | read | write |
//! |-----------|------|-------|
//! | data available / space available | `Complete(n)` | `Complete(n)` (may be partial) |
//! | nothing to read, peer alive | `Retry` + `READ` | |
//! | buffer full | | `Retry` + `WRITE` |
//! | peer freed | `Complete(0)` once drained | `Error` |

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::BridgeConfig;
use crate::endpoint::{Ctrl, Endpoint, EndpointCx, EndpointMethod, IoStatus};

/// Method name of pair endpoints.
pub const NAME: &str = "pair";

struct Shared {
    /// `queues[i]` holds bytes written by side `i`
    queues: [VecDeque<u8>; 2],
    freed: [bool; 2],
    capacity: usize,
}

struct PairHalf {
    side: usize,
    shared: Arc<Mutex<Shared>>,
}

impl PairHalf {
    fn peer(&self) -> usize {
        1 - self.side
    }
}

impl EndpointMethod for PairHalf {
    fn name(&self) -> &'static str {
        NAME
    }

    fn read(&mut self, cx: &mut EndpointCx<'_>, buf: &mut [u8]) -> IoStatus<usize> {
        let peer = self.peer();
        let mut guard = self.shared.lock();
        let shared = &mut *guard;
        let incoming = &mut shared.queues[peer];
        if incoming.is_empty() {
            if shared.freed[peer] {
                return IoStatus::Complete(0);
            }
            return cx.retry_read();
        }
        let n = buf.len().min(incoming.len());
        for (dst, src) in buf.iter_mut().zip(incoming.drain(..n)) {
            *dst = src;
        }
        log::trace!("[PAIR] side {} read {} bytes", self.side, n);
        IoStatus::Complete(n)
    }

    fn write(&mut self, cx: &mut EndpointCx<'_>, buf: &[u8]) -> IoStatus<usize> {
        let mut shared = self.shared.lock();
        if shared.freed[self.peer()] {
            drop(shared);
            return cx.fail("peer endpoint was freed");
        }
        let space = shared.capacity - shared.queues[self.side].len();
        if space == 0 {
            return cx.retry_write();
        }
        let n = buf.len().min(space);
        shared.queues[self.side].extend(&buf[..n]);
        log::trace!("[PAIR] side {} wrote {} bytes", self.side, n);
        IoStatus::Complete(n)
    }

    fn ctrl(&mut self, _cx: &mut EndpointCx<'_>, cmd: Ctrl) -> IoStatus<usize> {
        match cmd {
            Ctrl::Pending => IoStatus::Complete(self.shared.lock().queues[self.peer()].len()),
            Ctrl::Flush | Ctrl::Handshake | Ctrl::Shutdown => IoStatus::Complete(0),
        }
    }
}

impl Drop for PairHalf {
    fn drop(&mut self) {
        self.shared.lock().freed[self.side] = true;
        log::debug!("[PAIR] side {} freed", self.side);
    }
}

/// Create a loopback pair with the default per-direction capacity.
pub fn make_pair() -> (Endpoint, Endpoint) {
    make_pair_with_capacity(BridgeConfig::default().pair_buffer_size)
}

/// Create a loopback pair sized from `config`.
pub fn make_pair_with_config(config: &BridgeConfig) -> (Endpoint, Endpoint) {
    make_pair_with_capacity(config.pair_buffer_size)
}

/// Create a loopback pair buffering at most `capacity` bytes per direction.
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn make_pair_with_capacity(capacity: usize) -> (Endpoint, Endpoint) {
    assert!(capacity > 0, "make_pair: capacity must be > 0");
    let shared = Arc::new(Mutex::new(Shared {
        queues: [VecDeque::new(), VecDeque::new()],
        freed: [false, false],
        capacity,
    }));
    log::debug!("[PAIR] created (capacity {})", capacity);
    let a = Endpoint::new(PairHalf {
        side: 0,
        shared: Arc::clone(&shared),
    });
    let b = Endpoint::new(PairHalf { side: 1, shared });
    (a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BioError, RetryReason};

    #[test]
    fn test_bytes_cross_over() {
        let (mut a, mut b) = make_pair();
        assert_eq!(a.send(b"ping").unwrap(), 4);
        assert_eq!(b.pending().unwrap(), 4);
        assert_eq!(a.pending().unwrap(), 0);

        let mut buf = [0u8; 8];
        assert_eq!(b.recv(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"ping");

        assert_eq!(b.send(b"pong").unwrap(), 4);
        assert_eq!(a.recv(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"pong");
    }

    #[test]
    fn test_empty_is_read_retry() {
        let (mut a, _b) = make_pair();
        match a.recv(&mut [0u8; 4]) {
            Err(BioError::WouldBlock(RetryReason::Read)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_full_is_write_retry() {
        let (mut a, mut b) = make_pair_with_capacity(8);
        assert_eq!(a.send(b"0123456789").unwrap(), 8);
        match a.send(b"x") {
            Err(BioError::WouldBlock(RetryReason::Write)) => {}
            other => panic!("unexpected result: {:?}", other),
        }

        let mut buf = [0u8; 3];
        assert_eq!(b.recv(&mut buf).unwrap(), 3);
        assert_eq!(a.send(b"89ab").unwrap(), 3);
    }

    #[test]
    fn test_send_all_resumes_after_would_block() {
        let (mut a, mut b) = make_pair_with_capacity(4);
        let payload = b"abcdefgh";
        let mut written = 0;

        match a.send_all(payload, &mut written) {
            Err(BioError::WouldBlock(RetryReason::Write)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(written, 4);

        let mut received = Vec::new();
        let mut buf = [0u8; 8];
        loop {
            let n = b.recv(&mut buf).unwrap();
            received.extend_from_slice(&buf[..n]);
            match a.send_all(payload, &mut written) {
                Ok(()) => break,
                Err(e) => assert!(e.is_would_block(), "send_all: {}", e),
            }
        }
        assert_eq!(written, payload.len());
        let n = b.recv(&mut buf).unwrap();
        received.extend_from_slice(&buf[..n]);
        assert_eq!(received, payload);
    }

    #[test]
    fn test_freeing_one_side_leaves_other_usable() {
        let (mut a, mut b) = make_pair();
        b.send(b"last words").unwrap();
        drop(b);

        let mut buf = [0u8; 32];
        assert_eq!(a.recv(&mut buf).unwrap(), 10);
        assert_eq!(&buf[..10], b"last words");
        assert_eq!(a.recv(&mut buf).unwrap(), 0);
        assert!(matches!(a.send(b"anyone?"), Err(BioError::Fatal(_))));
    }

    #[test]
    fn test_config_capacity() {
        let config = BridgeConfig::default().with_pair_buffer_size(2);
        let (mut a, _b) = make_pair_with_config(&config);
        assert_eq!(a.send(b"abc").unwrap(), 2);
    }
}
