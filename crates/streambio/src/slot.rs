// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pending-operation slots.
//!
//! A slot holds at most one in-flight future for one operation kind, plus
//! auxiliary data needed to finish that operation once the future resolves
//! (for writes: the length that was requested when the future was begun).
//!
//! # State Machine
//!
//! ```text
//!      +---------+   begin(handle, aux)   +----------+
//!      |  Empty  |----------------------->| InFlight |
//!      +---------+                        +----+-----+
//!           ^                                  | poll: unresolved -> Pending
//!           |          poll: resolved          | (slot unchanged)
//!           +----------- Done(result, aux) ----+
//! ```
//!
//! A resolved future is drained exactly once: the poll that observes the
//! resolution empties the slot, and the next poll reports [`SlotPoll::Idle`]
//! until a new operation is begun.

use std::fmt;
use std::task::Waker;

use crate::error::StreamResult;
use crate::future::{FutureHandle, FutureState};

/// Operation kind served by a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Receive from the stream.
    Read,
    /// Send to the stream.
    Write,
    /// Flush the stream.
    Flush,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OpKind::Read => "read",
            OpKind::Write => "write",
            OpKind::Flush => "flush",
        };
        write!(f, "{}", s)
    }
}

/// Result of polling a slot.
#[derive(Debug)]
pub enum SlotPoll<T, A> {
    /// No operation is pending.
    Idle,
    /// The pending operation has not resolved; the slot is unchanged.
    Pending,
    /// The pending operation resolved; the slot is now empty.
    Done(StreamResult<T>, A),
}

/// Holder for at most one in-flight operation of one kind.
pub struct PendingSlot<T, A = ()> {
    kind: OpKind,
    in_flight: Option<(FutureHandle<T>, A)>,
}

impl<T: Send + 'static, A> PendingSlot<T, A> {
    /// Create an empty slot.
    pub fn new(kind: OpKind) -> Self {
        Self {
            kind,
            in_flight: None,
        }
    }

    /// Operation kind served by this slot.
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    /// Check whether an operation is in flight.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Auxiliary data of the in-flight operation.
    pub fn aux(&self) -> Option<&A> {
        self.in_flight.as_ref().map(|(_, aux)| aux)
    }

    /// Stash an in-flight operation.
    ///
    /// # Panics
    ///
    /// Panics if an operation is already in flight. Callers must poll the
    /// existing one to completion first.
    pub fn begin(&mut self, handle: FutureHandle<T>, aux: A) {
        assert!(
            self.in_flight.is_none(),
            "PendingSlot::begin: {} operation already in flight",
            self.kind
        );
        log::trace!("[SLOT] begin {}", self.kind);
        self.in_flight = Some((handle, aux));
    }

    /// Poll the in-flight operation once.
    pub fn poll(&mut self, waker: &Waker) -> SlotPoll<T, A> {
        let Some((handle, _)) = self.in_flight.as_mut() else {
            return SlotPoll::Idle;
        };
        match handle.poll_state(waker) {
            FutureState::Unresolved => SlotPoll::Pending,
            _ => self.drain(),
        }
    }

    /// Block until the in-flight operation resolves.
    pub fn wait(&mut self) -> SlotPoll<T, A> {
        match self.in_flight.take() {
            None => SlotPoll::Idle,
            Some((handle, aux)) => {
                log::trace!("[SLOT] waiting on {}", self.kind);
                SlotPoll::Done(handle.wait(), aux)
            }
        }
    }

    /// Drop the in-flight operation without waiting for it.
    ///
    /// The underlying computation is not cancelled; only this slot's
    /// reference to it goes away. Returns whether anything was dropped.
    pub fn abandon(&mut self) -> bool {
        self.in_flight.take().is_some()
    }

    fn drain(&mut self) -> SlotPoll<T, A> {
        match self.in_flight.take() {
            Some((mut handle, aux)) => match handle.take() {
                Some(result) => {
                    log::trace!("[SLOT] drained {} (ok={})", self.kind, result.is_ok());
                    SlotPoll::Done(result, aux)
                }
                None => panic!(
                    "PendingSlot: {} future resolved but its result was already consumed",
                    self.kind
                ),
            },
            None => SlotPoll::Idle,
        }
    }
}

impl<T, A> fmt::Debug for PendingSlot<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSlot")
            .field("kind", &self.kind)
            .field("in_flight", &self.in_flight.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
