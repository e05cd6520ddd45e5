// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Future handles and the immediate-or-deferred result shape.
//!
//! A [`FutureHandle`] owns one asynchronous computation producing a
//! [`StreamResult`]. It can be queried without blocking: querying polls the
//! computation once and caches the outcome, so the resolved value is kept
//! until it is taken. Taking consumes the value; a handle yields its result
//! at most once.
//!
//! ```text
//!  Unresolved --(poll: Ready)--> Resolved --(take)--> Taken
//!      |                                                ^
//!      +------------------(wait: block_on)--------------+
//! ```
//!
//! Asynchronous streams answer every operation with a [`MaybeReady`]: either
//! the outcome is already known ([`MaybeReady::Immediate`]) or a handle to
//! the pending computation is returned ([`MaybeReady::Deferred`]).

use std::fmt;
use std::future::Future;
use std::task::{Context, Poll, Waker};

use futures::future::BoxFuture;
use futures::task::noop_waker_ref;
use futures::FutureExt;

use crate::error::StreamResult;

// ============================================================================
// Future state
// ============================================================================

/// Non-blocking view of a [`FutureHandle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FutureState {
    /// The computation has not produced a value yet.
    Unresolved,
    /// The computation succeeded; the value is waiting to be taken.
    ResolvedOk,
    /// The computation failed; the error is waiting to be taken.
    ResolvedErr,
    /// The result has already been taken.
    Consumed,
}

impl FutureState {
    /// Check whether a result is available to take.
    pub fn is_resolved(&self) -> bool {
        matches!(self, FutureState::ResolvedOk | FutureState::ResolvedErr)
    }
}

enum HandleState<T> {
    Unresolved(BoxFuture<'static, StreamResult<T>>),
    Resolved(StreamResult<T>),
    Consumed,
}

// ============================================================================
// Future handle
// ============================================================================

/// Owning handle to an asynchronous computation of `StreamResult<T>`.
pub struct FutureHandle<T> {
    state: HandleState<T>,
}

impl<T: Send + 'static> FutureHandle<T> {
    /// Wrap a future.
    pub fn new<F>(fut: F) -> Self
    where
        F: Future<Output = StreamResult<T>> + Send + 'static,
    {
        Self {
            state: HandleState::Unresolved(fut.boxed()),
        }
    }

    /// Create a handle that is already resolved.
    pub fn resolved(result: StreamResult<T>) -> Self {
        Self {
            state: HandleState::Resolved(result),
        }
    }

    /// Block the calling thread until the computation resolves.
    ///
    /// Only used when an endpoint runs in synchronous mode; the bridge path
    /// never waits.
    pub fn wait(self) -> StreamResult<T> {
        match self.state {
            HandleState::Unresolved(fut) => futures::executor::block_on(fut),
            HandleState::Resolved(result) => result,
            HandleState::Consumed => panic!("FutureHandle::wait on a consumed handle"),
        }
    }
}

impl<T> FutureHandle<T> {
    /// Poll once (if still unresolved) and report the state.
    ///
    /// `waker` is woken by the computation when it makes progress after
    /// this call returned [`FutureState::Unresolved`].
    pub fn poll_state(&mut self, waker: &Waker) -> FutureState {
        if let HandleState::Unresolved(fut) = &mut self.state {
            let mut cx = Context::from_waker(waker);
            match fut.as_mut().poll(&mut cx) {
                Poll::Ready(result) => self.state = HandleState::Resolved(result),
                Poll::Pending => return FutureState::Unresolved,
            }
        }
        self.peek()
    }

    /// Poll once with a no-op waker and report the state.
    pub fn state(&mut self) -> FutureState {
        self.poll_state(noop_waker_ref())
    }

    /// Report the cached state without polling.
    pub fn peek(&self) -> FutureState {
        match &self.state {
            HandleState::Unresolved(_) => FutureState::Unresolved,
            HandleState::Resolved(Ok(_)) => FutureState::ResolvedOk,
            HandleState::Resolved(Err(_)) => FutureState::ResolvedErr,
            HandleState::Consumed => FutureState::Consumed,
        }
    }

    /// Take the resolved result.
    ///
    /// Returns `None` if the computation is unresolved or the result was
    /// already taken.
    pub fn take(&mut self) -> Option<StreamResult<T>> {
        match std::mem::replace(&mut self.state, HandleState::Consumed) {
            HandleState::Resolved(result) => Some(result),
            other => {
                if matches!(other, HandleState::Unresolved(_)) {
                    self.state = other;
                }
                None
            }
        }
    }
}

impl<T> fmt::Debug for FutureHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FutureHandle")
            .field("state", &self.peek())
            .finish()
    }
}

// ============================================================================
// Immediate or deferred
// ============================================================================

/// Answer of an asynchronous stream operation.
#[derive(Debug)]
pub enum MaybeReady<T> {
    /// The outcome was available synchronously.
    Immediate(StreamResult<T>),
    /// The outcome will be produced by the handle later.
    Deferred(FutureHandle<T>),
}

impl<T: Send + 'static> MaybeReady<T> {
    /// Immediate success.
    pub fn ready(value: T) -> Self {
        MaybeReady::Immediate(Ok(value))
    }

    /// Immediate failure.
    pub fn failed(err: crate::error::StreamError) -> Self {
        MaybeReady::Immediate(Err(err))
    }

    /// Defer to a future without polling it.
    pub fn deferred<F>(fut: F) -> Self
    where
        F: Future<Output = StreamResult<T>> + Send + 'static,
    {
        MaybeReady::Deferred(FutureHandle::new(fut))
    }

    /// Poll `fut` once; answer immediately if it is already complete.
    ///
    /// Streams whose operations usually complete without waiting use this to
    /// avoid handing a future to the bridge at all.
    pub fn poll_once<F>(fut: F, waker: &Waker) -> Self
    where
        F: Future<Output = StreamResult<T>> + Send + 'static,
    {
        let mut handle = FutureHandle::new(fut);
        if handle.poll_state(waker).is_resolved() {
            if let Some(result) = handle.take() {
                return MaybeReady::Immediate(result);
            }
        }
        MaybeReady::Deferred(handle)
    }

    /// Check whether the outcome is already known.
    pub fn is_immediate(&self) -> bool {
        matches!(self, MaybeReady::Immediate(_))
    }
}

// ============================================================================
// Tests
// ============================================================================
