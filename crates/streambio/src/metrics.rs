// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stream bridge metrics.
//!
//! Counters are kept per operation kind (read, write, flush):
//! - calls issued to the asynchronous stream
//! - answers that were immediate vs deferred
//! - deferred operations that later completed
//! - fatal outcomes
//!
//! plus byte totals and teardown accounting.
//!
//! # Example
//!
//! ```
//! use streambio::metrics::BridgeMetrics;
//! use streambio::slot::OpKind;
//!
//! let metrics = BridgeMetrics::new();
//! metrics.record_issued(OpKind::Read);
//! metrics.record_immediate(OpKind::Read);
//! metrics.record_bytes_received(40);
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.read.issued, 1);
//! assert_eq!(snapshot.bytes_received, 40);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::slot::OpKind;

// ============================================================================
// Per-operation counters
// ============================================================================

#[derive(Debug, Default)]
struct OpCounters {
    issued: AtomicU64,
    immediate: AtomicU64,
    deferred: AtomicU64,
    completed_after_defer: AtomicU64,
    fatal: AtomicU64,
}

impl OpCounters {
    fn snapshot(&self) -> OpMetricsSnapshot {
        OpMetricsSnapshot {
            issued: self.issued.load(Ordering::Relaxed),
            immediate: self.immediate.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            completed_after_defer: self.completed_after_defer.load(Ordering::Relaxed),
            fatal: self.fatal.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.issued.store(0, Ordering::Relaxed);
        self.immediate.store(0, Ordering::Relaxed);
        self.deferred.store(0, Ordering::Relaxed);
        self.completed_after_defer.store(0, Ordering::Relaxed);
        self.fatal.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of the counters of one operation kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpMetricsSnapshot {
    /// Calls issued to the stream
    pub issued: u64,

    /// Calls answered synchronously
    pub immediate: u64,

    /// Calls answered with a future
    pub deferred: u64,

    /// Deferred calls whose future later resolved (ok or error)
    pub completed_after_defer: u64,

    /// Operations that ended in a fatal error
    pub fatal: u64,
}

// ============================================================================
// Bridge metrics
// ============================================================================

/// Metrics for one or more stream bridges.
///
/// Share it through an `Arc` to aggregate several bridges.
#[derive(Debug)]
pub struct BridgeMetrics {
    read: OpCounters,
    write: OpCounters,
    flush: OpCounters,

    /// Bytes delivered upward by reads
    bytes_received: AtomicU64,

    /// Bytes confirmed sent by writes
    bytes_sent: AtomicU64,

    /// Bytes dropped because a receive returned more than requested
    bytes_truncated: AtomicU64,

    /// In-flight futures dropped at teardown
    abandoned: AtomicU64,

    start_time: Instant,
}

impl BridgeMetrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        Self {
            read: OpCounters::default(),
            write: OpCounters::default(),
            flush: OpCounters::default(),
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_truncated: AtomicU64::new(0),
            abandoned: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    fn counters(&self, kind: OpKind) -> &OpCounters {
        match kind {
            OpKind::Read => &self.read,
            OpKind::Write => &self.write,
            OpKind::Flush => &self.flush,
        }
    }

    // ========================================================================
    // Recording
    // ========================================================================

    /// Record a call issued to the stream.
    pub fn record_issued(&self, kind: OpKind) {
        self.counters(kind).issued.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an immediate answer.
    pub fn record_immediate(&self, kind: OpKind) {
        self.counters(kind).immediate.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a deferred answer.
    pub fn record_deferred(&self, kind: OpKind) {
        self.counters(kind).deferred.fetch_add(1, Ordering::Relaxed);
    }

    /// Record resolution of a deferred operation.
    pub fn record_completed_after_defer(&self, kind: OpKind) {
        self.counters(kind)
            .completed_after_defer
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Record a fatal outcome.
    pub fn record_fatal(&self, kind: OpKind) {
        self.counters(kind).fatal.fetch_add(1, Ordering::Relaxed);
    }

    /// Record bytes delivered by a read.
    pub fn record_bytes_received(&self, bytes: usize) {
        self.bytes_received
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record bytes confirmed by a write.
    pub fn record_bytes_sent(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record bytes dropped by truncation.
    pub fn record_truncated(&self, bytes: usize) {
        self.bytes_truncated
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record in-flight futures dropped at teardown.
    pub fn record_abandoned(&self, count: usize) {
        self.abandoned.fetch_add(count as u64, Ordering::Relaxed);
    }

    // ========================================================================
    // Snapshot
    // ========================================================================

    /// Take a snapshot of all metrics.
    pub fn snapshot(&self) -> BridgeMetricsSnapshot {
        BridgeMetricsSnapshot {
            read: self.read.snapshot(),
            write: self.write.snapshot(),
            flush: self.flush.snapshot(),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_truncated: self.bytes_truncated.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            uptime_secs: self.start_time.elapsed().as_secs_f64(),
        }
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.read.reset();
        self.write.reset();
        self.flush.reset();
        self.bytes_received.store(0, Ordering::Relaxed);
        self.bytes_sent.store(0, Ordering::Relaxed);
        self.bytes_truncated.store(0, Ordering::Relaxed);
        self.abandoned.store(0, Ordering::Relaxed);
    }
}

impl Default for BridgeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of bridge metrics.
#[derive(Clone, Debug, Default)]
pub struct BridgeMetricsSnapshot {
    /// Read counters
    pub read: OpMetricsSnapshot,

    /// Write counters
    pub write: OpMetricsSnapshot,

    /// Flush counters
    pub flush: OpMetricsSnapshot,

    /// Bytes delivered by reads
    pub bytes_received: u64,

    /// Bytes confirmed by writes
    pub bytes_sent: u64,

    /// Bytes dropped by truncation
    pub bytes_truncated: u64,

    /// In-flight futures dropped at teardown
    pub abandoned: u64,

    /// Uptime in seconds
    pub uptime_secs: f64,
}

impl BridgeMetricsSnapshot {
    /// Fraction of issued calls (all kinds) that were answered immediately.
    pub fn immediate_ratio(&self) -> f64 {
        let issued = self.read.issued + self.write.issued + self.flush.issued;
        if issued == 0 {
            return 1.0;
        }
        let immediate = self.read.immediate + self.write.immediate + self.flush.immediate;
        immediate as f64 / issued as f64
    }
}

// ============================================================================
// Tests
// ============================================================================
