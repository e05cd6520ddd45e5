// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Asynchronous byte streams.
//!
//! [`AsyncStream`] is the collaborator a stream endpoint drives. Each of its
//! operations answers with a [`MaybeReady`]: the outcome is either known
//! right away or carried by a future handle that resolves later.
//!
//! # Contract
//!
//! - `receive(max_len)` must never produce more than `max_len` bytes. An
//!   empty buffer means end of stream.
//! - `send(bytes)` reports only success or failure; the caller accounts for
//!   the length itself.
//! - `flush()` may complete immediately when the stream has nothing to flush;
//!   the default implementation does exactly that.
//!
//! Streams are shared through `Arc` and take `&self`; implementations keep
//! whatever interior synchronisation they need.

use bytes::Bytes;

use crate::future::MaybeReady;

#[cfg(feature = "runtime-tokio")]
pub mod tokio_io;

#[cfg(feature = "runtime-tokio")]
pub use tokio_io::IoStream;

/// Asynchronous byte stream driven by a stream endpoint.
pub trait AsyncStream: Send + Sync {
    /// Receive at most `max_len` bytes.
    fn receive(&self, max_len: usize) -> MaybeReady<Bytes>;

    /// Send all of `data`.
    fn send(&self, data: Bytes) -> MaybeReady<()>;

    /// Flush buffered output.
    fn flush(&self) -> MaybeReady<()> {
        MaybeReady::ready(())
    }
}

// ============================================================================
// Test mock stream
// ============================================================================

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::error::{StreamError, StreamResult};
    use futures::channel::oneshot;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Scripted answer for one stream call.
    pub enum Script<T> {
        /// Answer synchronously.
        Immediate(StreamResult<T>),
        /// Answer with a future that resolves when the sender fires.
        Deferred(oneshot::Receiver<StreamResult<T>>),
    }

    fn into_answer<T: Send + 'static>(script: Option<Script<T>>, fallback: T) -> MaybeReady<T> {
        match script {
            Some(Script::Immediate(result)) => MaybeReady::Immediate(result),
            Some(Script::Deferred(rx)) => MaybeReady::deferred(async move {
                rx.await
                    .unwrap_or_else(|_| Err(StreamError::other("script sender dropped")))
            }),
            None => MaybeReady::ready(fallback),
        }
    }

    /// Mock asynchronous stream for testing.
    ///
    /// Each call pops the next scripted answer for its operation. When the
    /// script is empty: receive answers an empty buffer, send and flush
    /// succeed immediately.
    #[derive(Default)]
    pub struct ScriptedStream {
        receives: Mutex<VecDeque<Script<Bytes>>>,
        sends: Mutex<VecDeque<Script<()>>>,
        flushes: Mutex<VecDeque<Script<()>>>,
        /// `max_len` of every receive call
        receive_calls: Mutex<Vec<usize>>,
        /// Payload of every send call
        sent: Mutex<Vec<Bytes>>,
        flush_calls: Mutex<usize>,
    }

    impl ScriptedStream {
        /// Create a stream with empty scripts.
        pub fn new() -> Self {
            Self::default()
        }

        /// Script an immediate receive answer.
        pub fn push_receive(&self, result: StreamResult<Bytes>) {
            self.receives.lock().push_back(Script::Immediate(result));
        }

        /// Script a deferred receive answer; resolve it through the sender.
        pub fn defer_receive(&self) -> oneshot::Sender<StreamResult<Bytes>> {
            let (tx, rx) = oneshot::channel();
            self.receives.lock().push_back(Script::Deferred(rx));
            tx
        }

        /// Script an immediate send answer.
        pub fn push_send(&self, result: StreamResult<()>) {
            self.sends.lock().push_back(Script::Immediate(result));
        }

        /// Script a deferred send answer.
        pub fn defer_send(&self) -> oneshot::Sender<StreamResult<()>> {
            let (tx, rx) = oneshot::channel();
            self.sends.lock().push_back(Script::Deferred(rx));
            tx
        }

        /// Script an immediate flush answer.
        pub fn push_flush(&self, result: StreamResult<()>) {
            self.flushes.lock().push_back(Script::Immediate(result));
        }

        /// Script a deferred flush answer.
        pub fn defer_flush(&self) -> oneshot::Sender<StreamResult<()>> {
            let (tx, rx) = oneshot::channel();
            self.flushes.lock().push_back(Script::Deferred(rx));
            tx
        }

        /// `max_len` of every receive call so far.
        pub fn receive_calls(&self) -> Vec<usize> {
            self.receive_calls.lock().clone()
        }

        /// Payloads of every send call so far.
        pub fn sent(&self) -> Vec<Bytes> {
            self.sent.lock().clone()
        }

        /// Number of flush calls so far.
        pub fn flush_calls(&self) -> usize {
            *self.flush_calls.lock()
        }
    }

    impl AsyncStream for ScriptedStream {
        fn receive(&self, max_len: usize) -> MaybeReady<Bytes> {
            self.receive_calls.lock().push(max_len);
            let script = self.receives.lock().pop_front();
            into_answer(script, Bytes::new())
        }

        fn send(&self, data: Bytes) -> MaybeReady<()> {
            self.sent.lock().push(data);
            let script = self.sends.lock().pop_front();
            into_answer(script, ())
        }

        fn flush(&self) -> MaybeReady<()> {
            *self.flush_calls.lock() += 1;
            let script = self.flushes.lock().pop_front();
            into_answer(script, ())
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
