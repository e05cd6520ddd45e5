// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stream bridge.
//!
//! Turns an [`AsyncStream`] into three non-blocking, resumable operations
//! (`try_read`, `try_write`, `try_flush`), each backed by its own
//! [`PendingSlot`]. The three slots are independent: a pending read and a
//! pending write may coexist.
//!
//! # Poll/resume protocol
//!
//! ```text
//!                try_*(..)
//!                    |
//!          slot in flight?
//!           /              \
//!         yes               no
//!          |                 |
//!     poll the slot     issue stream call
//!     /    |     \        /           \
//! Pending Done-ok Done-err  Immediate   Deferred
//!    |     |       |         |  |          |
//! Pending Success Fatal  Success Fatal  begin slot
//!                                         |
//!                                      Pending
//! ```
//!
//! A call never waits (unless the bridge runs in synchronous mode) and never
//! polls a future it has just begun: the deferred answer is reported as
//! `Pending` and observed on the next retry.
//!
//! # Write accounting
//!
//! `send` reports no byte count, so the length requested when the write was
//! begun is stashed in the write slot and reported on completion. While a
//! write is in flight, later `try_write` calls only poll it; their payload is
//! ignored. Callers must retry with the same logical write.

use std::fmt;
use std::sync::Arc;
use std::task::Waker;

use bytes::Bytes;
use futures::task::noop_waker_ref;

use crate::config::BridgeConfig;
use crate::error::StreamError;
use crate::future::MaybeReady;
use crate::metrics::BridgeMetrics;
use crate::slot::{OpKind, PendingSlot, SlotPoll};
use crate::stream::AsyncStream;

/// Outcome of one bridge operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The operation completed.
    Success(T),
    /// The operation is in flight; retry it later.
    Pending,
    /// The stream failed; do not retry.
    Fatal(StreamError),
}

impl<T> Outcome<T> {
    /// Check whether the operation is still in flight.
    pub fn is_pending(&self) -> bool {
        matches!(self, Outcome::Pending)
    }

    /// Map the success value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Success(v) => Outcome::Success(f(v)),
            Outcome::Pending => Outcome::Pending,
            Outcome::Fatal(e) => Outcome::Fatal(e),
        }
    }
}

/// Adapter from an asynchronous stream to non-blocking synchronous operations.
pub struct StreamBridge {
    stream: Arc<dyn AsyncStream>,
    /// Aux: `max_len` of the receive that was issued
    read: PendingSlot<Bytes, usize>,
    /// Aux: length of the write that was begun
    write: PendingSlot<(), usize>,
    flush: PendingSlot<()>,
    waker: Option<Waker>,
    blocking: bool,
    metrics: Option<Arc<BridgeMetrics>>,
}

impl StreamBridge {
    /// Create a bridge over `stream` in non-blocking mode.
    pub fn new(stream: Arc<dyn AsyncStream>) -> Self {
        log::debug!("[BRIDGE] created");
        Self {
            stream,
            read: PendingSlot::new(OpKind::Read),
            write: PendingSlot::new(OpKind::Write),
            flush: PendingSlot::new(OpKind::Flush),
            waker: None,
            blocking: false,
            metrics: None,
        }
    }

    /// Create a bridge using the mode from `config`.
    pub fn with_config(stream: Arc<dyn AsyncStream>, config: &BridgeConfig) -> Self {
        let mut bridge = Self::new(stream);
        bridge.blocking = config.blocking;
        bridge
    }

    /// Builder: attach a metrics sink
    pub fn with_metrics(mut self, metrics: Arc<BridgeMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Switch synchronous mode on or off.
    ///
    /// In synchronous mode an operation left in flight by an earlier
    /// non-blocking call is waited on by the next call of its kind.
    pub fn set_blocking(&mut self, blocking: bool) {
        self.blocking = blocking;
    }

    /// Whether deferred answers are waited on inline.
    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    /// Install the waker used when polling in-flight operations.
    pub fn set_waker(&mut self, waker: Waker) {
        self.waker = Some(waker);
    }

    /// Remove the installed waker.
    pub fn clear_waker(&mut self) {
        self.waker = None;
    }

    /// Underlying stream.
    pub fn stream(&self) -> &Arc<dyn AsyncStream> {
        &self.stream
    }

    /// Check whether an operation of `kind` is in flight.
    pub fn is_in_flight(&self, kind: OpKind) -> bool {
        match kind {
            OpKind::Read => self.read.is_in_flight(),
            OpKind::Write => self.write.is_in_flight(),
            OpKind::Flush => self.flush.is_in_flight(),
        }
    }

    /// Length of the write currently in flight, if any.
    pub fn pending_write_len(&self) -> Option<usize> {
        self.write.aux().copied()
    }

    // ========================================================================
    // Read path
    // ========================================================================

    /// Read at most `max_len` bytes.
    pub fn try_read(&mut self, max_len: usize) -> Outcome<Bytes> {
        let polled = if self.blocking {
            self.read.wait()
        } else {
            let waker = self.waker.as_ref().unwrap_or_else(|| noop_waker_ref());
            self.read.poll(waker)
        };
        match polled {
            SlotPoll::Done(result, requested) => {
                self.record(|m| m.record_completed_after_defer(OpKind::Read));
                return self.finish_read(result, max_len.min(requested));
            }
            SlotPoll::Pending => {
                log::trace!("[BRIDGE] read still pending");
                return Outcome::Pending;
            }
            SlotPoll::Idle => {}
        }

        self.record(|m| m.record_issued(OpKind::Read));
        match self.stream.receive(max_len) {
            MaybeReady::Immediate(result) => {
                self.record(|m| m.record_immediate(OpKind::Read));
                self.finish_read(result, max_len)
            }
            MaybeReady::Deferred(handle) => {
                self.record(|m| m.record_deferred(OpKind::Read));
                if self.blocking {
                    let result = handle.wait();
                    self.record(|m| m.record_completed_after_defer(OpKind::Read));
                    return self.finish_read(result, max_len);
                }
                self.read.begin(handle, max_len);
                self.arm_waker();
                log::trace!("[BRIDGE] read of {} deferred", max_len);
                Outcome::Pending
            }
        }
    }

    fn finish_read(
        &self,
        result: Result<Bytes, StreamError>,
        max_len: usize,
    ) -> Outcome<Bytes> {
        match result {
            Ok(mut data) => {
                if data.len() > max_len {
                    let excess = data.len() - max_len;
                    log::warn!(
                        "[BRIDGE] receive returned {} bytes for a {}-byte read, dropping {}",
                        data.len(),
                        max_len,
                        excess
                    );
                    self.record(|m| m.record_truncated(excess));
                    data.truncate(max_len);
                }
                self.record(|m| m.record_bytes_received(data.len()));
                Outcome::Success(data)
            }
            Err(e) => {
                log::debug!("[BRIDGE] read failed: {}", e);
                self.record(|m| m.record_fatal(OpKind::Read));
                Outcome::Fatal(e)
            }
        }
    }

    // ========================================================================
    // Write path
    // ========================================================================

    /// Write `data`, reporting the number of bytes written on success.
    ///
    /// While a write is in flight `data` is ignored and the in-flight write
    /// is polled instead.
    pub fn try_write(&mut self, data: &[u8]) -> Outcome<usize> {
        let polled = if self.blocking {
            self.write.wait()
        } else {
            let waker = self.waker.as_ref().unwrap_or_else(|| noop_waker_ref());
            self.write.poll(waker)
        };
        match polled {
            SlotPoll::Done(result, len) => {
                self.record(|m| m.record_completed_after_defer(OpKind::Write));
                return self.finish_write(result, len);
            }
            SlotPoll::Pending => {
                log::trace!(
                    "[BRIDGE] write still pending ({} bytes offered meanwhile)",
                    data.len()
                );
                return Outcome::Pending;
            }
            SlotPoll::Idle => {}
        }

        let len = data.len();
        self.record(|m| m.record_issued(OpKind::Write));
        match self.stream.send(Bytes::copy_from_slice(data)) {
            MaybeReady::Immediate(result) => {
                self.record(|m| m.record_immediate(OpKind::Write));
                self.finish_write(result, len)
            }
            MaybeReady::Deferred(handle) => {
                self.record(|m| m.record_deferred(OpKind::Write));
                if self.blocking {
                    let result = handle.wait();
                    self.record(|m| m.record_completed_after_defer(OpKind::Write));
                    return self.finish_write(result, len);
                }
                self.write.begin(handle, len);
                self.arm_waker();
                log::trace!("[BRIDGE] write of {} deferred", len);
                Outcome::Pending
            }
        }
    }

    fn finish_write(&self, result: Result<(), StreamError>, len: usize) -> Outcome<usize> {
        match result {
            Ok(()) => {
                self.record(|m| m.record_bytes_sent(len));
                Outcome::Success(len)
            }
            Err(e) => {
                log::debug!("[BRIDGE] write of {} failed: {}", len, e);
                self.record(|m| m.record_fatal(OpKind::Write));
                Outcome::Fatal(e)
            }
        }
    }

    // ========================================================================
    // Flush path
    // ========================================================================

    /// Flush the stream.
    pub fn try_flush(&mut self) -> Outcome<()> {
        let polled = if self.blocking {
            self.flush.wait()
        } else {
            let waker = self.waker.as_ref().unwrap_or_else(|| noop_waker_ref());
            self.flush.poll(waker)
        };
        match polled {
            SlotPoll::Done(result, ()) => {
                self.record(|m| m.record_completed_after_defer(OpKind::Flush));
                return self.finish_flush(result);
            }
            SlotPoll::Pending => return Outcome::Pending,
            SlotPoll::Idle => {}
        }

        self.record(|m| m.record_issued(OpKind::Flush));
        match self.stream.flush() {
            MaybeReady::Immediate(result) => {
                self.record(|m| m.record_immediate(OpKind::Flush));
                self.finish_flush(result)
            }
            MaybeReady::Deferred(handle) => {
                self.record(|m| m.record_deferred(OpKind::Flush));
                if self.blocking {
                    let result = handle.wait();
                    self.record(|m| m.record_completed_after_defer(OpKind::Flush));
                    return self.finish_flush(result);
                }
                self.flush.begin(handle, ());
                self.arm_waker();
                log::trace!("[BRIDGE] flush deferred");
                Outcome::Pending
            }
        }
    }

    fn finish_flush(&self, result: Result<(), StreamError>) -> Outcome<()> {
        match result {
            Ok(()) => Outcome::Success(()),
            Err(e) => {
                log::debug!("[BRIDGE] flush failed: {}", e);
                self.record(|m| m.record_fatal(OpKind::Flush));
                Outcome::Fatal(e)
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// A freshly begun future has not seen the installed waker yet; wake it
    /// once so the owner retries and the next poll registers it.
    fn arm_waker(&self) {
        if let Some(waker) = &self.waker {
            waker.wake_by_ref();
        }
    }

    fn record(&self, f: impl FnOnce(&BridgeMetrics)) {
        if let Some(metrics) = &self.metrics {
            f(metrics);
        }
    }
}

impl Drop for StreamBridge {
    fn drop(&mut self) {
        let dropped = [
            self.read.abandon(),
            self.write.abandon(),
            self.flush.abandon(),
        ]
        .iter()
        .filter(|&&d| d)
        .count();

        if dropped > 0 {
            log::warn!(
                "[BRIDGE] destroyed with {} operation(s) in flight; releasing them",
                dropped
            );
            self.record(|m| m.record_abandoned(dropped));
        } else {
            log::debug!("[BRIDGE] destroyed");
        }
    }
}

impl fmt::Debug for StreamBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamBridge")
            .field("read", &self.read)
            .field("write", &self.write)
            .field("flush", &self.flush)
            .field("blocking", &self.blocking)
            .field("waker", &self.waker.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::mock::ScriptedStream;
    use futures::task::{waker, ArcWake};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn bridge_over(stream: &Arc<ScriptedStream>) -> StreamBridge {
        StreamBridge::new(Arc::clone(stream) as Arc<dyn AsyncStream>)
    }

    struct CountingWaker(AtomicUsize);

    impl ArcWake for CountingWaker {
        fn wake_by_ref(arc_self: &Arc<Self>) {
            arc_self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_immediate_read() {
        let stream = Arc::new(ScriptedStream::new());
        stream.push_receive(Ok(Bytes::from(vec![7u8; 40])));
        let mut bridge = bridge_over(&stream);

        match bridge.try_read(100) {
            Outcome::Success(data) => assert_eq!(data.len(), 40),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(!bridge.is_in_flight(OpKind::Read));
        assert_eq!(stream.receive_calls(), vec![100]);
    }

    #[test]
    fn test_deferred_read_is_not_reissued() {
        let stream = Arc::new(ScriptedStream::new());
        let tx = stream.defer_receive();
        let mut bridge = bridge_over(&stream);

        assert_eq!(bridge.try_read(100), Outcome::Pending);
        assert!(bridge.is_in_flight(OpKind::Read));
        assert_eq!(bridge.try_read(100), Outcome::Pending);
        assert_eq!(stream.receive_calls(), vec![100]);

        tx.send(Ok(Bytes::from(vec![1u8; 40]))).unwrap();
        match bridge.try_read(100) {
            Outcome::Success(data) => assert_eq!(data.len(), 40),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(!bridge.is_in_flight(OpKind::Read));
        assert_eq!(stream.receive_calls(), vec![100]);
    }

    #[test]
    fn test_overlong_receive_is_truncated() {
        let stream = Arc::new(ScriptedStream::new());
        stream.push_receive(Ok(Bytes::from_static(b"0123456789")));
        let metrics = Arc::new(BridgeMetrics::new());
        let mut bridge = bridge_over(&stream).with_metrics(Arc::clone(&metrics));

        assert_eq!(
            bridge.try_read(4),
            Outcome::Success(Bytes::from_static(b"0123"))
        );
        assert_eq!(metrics.snapshot().bytes_truncated, 6);
        assert_eq!(metrics.snapshot().bytes_received, 4);
    }

    #[test]
    fn test_deferred_read_truncates_to_smaller_retry_len() {
        let stream = Arc::new(ScriptedStream::new());
        let tx = stream.defer_receive();
        let mut bridge = bridge_over(&stream);

        assert_eq!(bridge.try_read(10), Outcome::Pending);
        tx.send(Ok(Bytes::from_static(b"0123456789"))).unwrap();
        assert_eq!(
            bridge.try_read(3),
            Outcome::Success(Bytes::from_static(b"012"))
        );
    }

    #[test]
    fn test_read_failure_is_fatal() {
        let stream = Arc::new(ScriptedStream::new());
        stream.push_receive(Err(StreamError::closed()));
        let mut bridge = bridge_over(&stream);
        assert_eq!(bridge.try_read(8), Outcome::Fatal(StreamError::closed()));
    }

    #[test]
    fn test_write_reports_begin_length() {
        let stream = Arc::new(ScriptedStream::new());
        let tx = stream.defer_send();
        let mut bridge = bridge_over(&stream);

        assert_eq!(bridge.try_write(&[0u8; 500]), Outcome::Pending);
        assert_eq!(bridge.pending_write_len(), Some(500));

        // A different payload while in flight only polls.
        assert_eq!(bridge.try_write(&[1u8; 20]), Outcome::Pending);
        assert_eq!(stream.sent().len(), 1);

        tx.send(Ok(())).unwrap();
        assert_eq!(bridge.try_write(&[1u8; 20]), Outcome::Success(500));
        assert_eq!(bridge.pending_write_len(), None);
    }

    #[test]
    fn test_immediate_write_and_failure() {
        let stream = Arc::new(ScriptedStream::new());
        stream.push_send(Ok(()));
        stream.push_send(Err(StreamError::other("reset")));
        let mut bridge = bridge_over(&stream);

        assert_eq!(bridge.try_write(b"hello"), Outcome::Success(5));
        assert!(matches!(bridge.try_write(b"again"), Outcome::Fatal(_)));
        assert_eq!(
            stream.sent(),
            vec![Bytes::from_static(b"hello"), Bytes::from_static(b"again")]
        );
    }

    #[test]
    fn test_flush_paths() {
        let stream = Arc::new(ScriptedStream::new());
        let tx = stream.defer_flush();
        let mut bridge = bridge_over(&stream);

        assert_eq!(bridge.try_flush(), Outcome::Pending);
        assert_eq!(bridge.try_flush(), Outcome::Pending);
        tx.send(Ok(())).unwrap();
        assert_eq!(bridge.try_flush(), Outcome::Success(()));
        assert_eq!(stream.flush_calls(), 1);

        // Empty script: immediate no-op flush.
        assert_eq!(bridge.try_flush(), Outcome::Success(()));
        assert_eq!(stream.flush_calls(), 2);
    }

    #[test]
    fn test_slots_are_independent() {
        let stream = Arc::new(ScriptedStream::new());
        let read_tx = stream.defer_receive();
        let write_tx = stream.defer_send();
        let mut bridge = bridge_over(&stream);

        assert_eq!(bridge.try_read(16), Outcome::Pending);
        assert_eq!(bridge.try_write(b"abc"), Outcome::Pending);
        assert!(bridge.is_in_flight(OpKind::Read));
        assert!(bridge.is_in_flight(OpKind::Write));

        write_tx.send(Ok(())).unwrap();
        assert_eq!(bridge.try_write(b"abc"), Outcome::Success(3));
        assert_eq!(bridge.try_read(16), Outcome::Pending);

        read_tx.send(Ok(Bytes::from_static(b"xy"))).unwrap();
        assert_eq!(bridge.try_read(16), Outcome::Success(Bytes::from_static(b"xy")));
    }

    #[test]
    fn test_waker_is_armed_and_registered() {
        let stream = Arc::new(ScriptedStream::new());
        let tx = stream.defer_receive();
        let counter = Arc::new(CountingWaker(AtomicUsize::new(0)));
        let mut bridge = bridge_over(&stream);
        bridge.set_waker(waker(Arc::clone(&counter)));

        assert_eq!(bridge.try_read(8), Outcome::Pending);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        // This poll registers the waker with the in-flight future.
        assert_eq!(bridge.try_read(8), Outcome::Pending);
        tx.send(Ok(Bytes::from_static(b"ok"))).unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
        assert_eq!(bridge.try_read(8), Outcome::Success(Bytes::from_static(b"ok")));
    }

    #[test]
    fn test_blocking_mode_waits() {
        let stream = Arc::new(ScriptedStream::new());
        let tx = stream.defer_receive();
        let mut bridge = StreamBridge::with_config(
            Arc::clone(&stream) as Arc<dyn AsyncStream>,
            &BridgeConfig::default().with_blocking(true),
        );
        assert!(bridge.is_blocking());

        let sender = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            tx.send(Ok(Bytes::from_static(b"sync"))).unwrap();
        });
        assert_eq!(bridge.try_read(8), Outcome::Success(Bytes::from_static(b"sync")));
        assert!(!bridge.is_in_flight(OpKind::Read));
        sender.join().unwrap();
    }

    #[test]
    fn test_blocking_mode_waits_on_earlier_deferral() {
        let stream = Arc::new(ScriptedStream::new());
        let tx = stream.defer_receive();
        let mut bridge = bridge_over(&stream);

        assert_eq!(bridge.try_read(8), Outcome::Pending);
        bridge.set_blocking(true);

        let sender = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            tx.send(Ok(Bytes::from_static(b"late"))).unwrap();
        });
        assert_eq!(bridge.try_read(8), Outcome::Success(Bytes::from_static(b"late")));
        assert!(!bridge.is_in_flight(OpKind::Read));
        assert_eq!(stream.receive_calls(), vec![8]);
        sender.join().unwrap();
    }

    #[test]
    fn test_deferred_write_failure_is_fatal() {
        let stream = Arc::new(ScriptedStream::new());
        let tx = stream.defer_send();
        let metrics = Arc::new(BridgeMetrics::new());
        let mut bridge = bridge_over(&stream).with_metrics(Arc::clone(&metrics));

        assert_eq!(bridge.try_write(b"payload"), Outcome::Pending);
        tx.send(Err(StreamError::other("reset"))).unwrap();
        assert_eq!(
            bridge.try_write(b"payload"),
            Outcome::Fatal(StreamError::other("reset"))
        );
        assert!(!bridge.is_in_flight(OpKind::Write));
        assert_eq!(metrics.snapshot().bytes_sent, 0);
    }

    #[test]
    fn test_flush_failure_is_fatal() {
        let stream = Arc::new(ScriptedStream::new());
        stream.push_flush(Err(StreamError::closed()));
        let tx = stream.defer_flush();
        let mut bridge = bridge_over(&stream);

        assert_eq!(bridge.try_flush(), Outcome::Fatal(StreamError::closed()));

        assert_eq!(bridge.try_flush(), Outcome::Pending);
        tx.send(Err(StreamError::other("flush refused"))).unwrap();
        assert_eq!(
            bridge.try_flush(),
            Outcome::Fatal(StreamError::other("flush refused"))
        );
        assert!(!bridge.is_in_flight(OpKind::Flush));
        assert_eq!(stream.flush_calls(), 2);
    }

    #[test]
    fn test_drop_releases_in_flight_futures() {
        let stream = Arc::new(ScriptedStream::new());
        let tx = stream.defer_send();
        let metrics = Arc::new(BridgeMetrics::new());
        let mut bridge = bridge_over(&stream).with_metrics(Arc::clone(&metrics));

        assert_eq!(bridge.try_write(b"data"), Outcome::Pending);
        drop(bridge);

        assert!(tx.is_canceled());
        assert_eq!(metrics.snapshot().abandoned, 1);
    }

    #[test]
    fn test_metrics_count_immediate_and_deferred() {
        let stream = Arc::new(ScriptedStream::new());
        stream.push_receive(Ok(Bytes::from_static(b"a")));
        let tx = stream.defer_receive();
        let metrics = Arc::new(BridgeMetrics::new());
        let mut bridge = bridge_over(&stream).with_metrics(Arc::clone(&metrics));

        let _ = bridge.try_read(4);
        let _ = bridge.try_read(4);
        tx.send(Ok(Bytes::from_static(b"bc"))).unwrap();
        let _ = bridge.try_read(4);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.read.issued, 2);
        assert_eq!(snapshot.read.immediate, 1);
        assert_eq!(snapshot.read.deferred, 1);
        assert_eq!(snapshot.read.completed_after_defer, 1);
        assert_eq!(snapshot.bytes_received, 3);
    }
}
