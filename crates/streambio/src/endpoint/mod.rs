// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport endpoints.
//!
//! An [`Endpoint`] is what a synchronous, pull-based engine reads from and
//! writes to. Its behaviour comes from an [`EndpointMethod`] (the transport
//! vtable); the endpoint itself owns the retry flags and, optionally, the
//! next endpoint down the chain.
//!
//! ```text
//!   caller --recv/send/flush/handshake/shutdown--> Endpoint (TLS filter)
//!                                                     | owns
//!                                                     v
//!                                                  Endpoint (stream adapter)
//!                                                     |
//!                                                     v
//!                                                  StreamBridge --> AsyncStream
//! ```
//!
//! # Status and retry flags
//!
//! Every engine-level operation (`read`, `write`, `ctrl`) returns an
//! [`IoStatus`]:
//!
//! | Status | Flags |
//! |--------|-------|
//! | `Complete(n)` | cleared |
//! | `Retry` | `SHOULD_RETRY` plus exactly one of `READ`, `WRITE`, `IO_SPECIAL` |
//! | `Error` | cleared; a message is queued in [`crate::error_queue`] |
//!
//! Flags are cleared before each call reaches the method. A method returning
//! `Retry` without exactly one direction breaks the contract and panics.
//!
//! # Caller surface
//!
//! [`Endpoint::recv`], [`Endpoint::send`], [`Endpoint::flush`],
//! [`Endpoint::handshake`] and [`Endpoint::shutdown`] wrap the engine-level
//! operations into [`Result`]s: a retry becomes [`BioError::WouldBlock`], an
//! error drains the per-thread error queue into [`BioError::Fatal`].

use std::fmt;
use std::task::Waker;

use bitflags::bitflags;

use crate::error::{BioError, Result, RetryReason};
use crate::error_queue;
use crate::registry;

pub mod base64;
pub mod buffer;
pub mod memory;
pub mod pair;
pub mod stream_ep;

// ============================================================================
// Retry flags and status
// ============================================================================

bitflags! {
    /// Retry flags of an endpoint.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct RetryFlags: u8 {
        /// Waiting for the transport to deliver bytes.
        const READ = 0x01;
        /// Waiting for the transport to accept bytes.
        const WRITE = 0x02;
        /// Waiting on a control operation (flush).
        const IO_SPECIAL = 0x04;
        /// The last operation should be retried.
        const SHOULD_RETRY = 0x08;
    }
}

impl RetryFlags {
    /// The directional flags.
    pub const DIRECTIONS: Self = Self::READ.union(Self::WRITE).union(Self::IO_SPECIAL);

    /// Flags for a retry in the direction of `reason`.
    pub fn retry(reason: RetryReason) -> Self {
        let direction = match reason {
            RetryReason::Read => Self::READ,
            RetryReason::Write => Self::WRITE,
            RetryReason::IoSpecial => Self::IO_SPECIAL,
        };
        Self::SHOULD_RETRY | direction
    }

    /// Direction of a well-formed retry, `None` otherwise.
    pub fn reason(self) -> Option<RetryReason> {
        if !self.contains(Self::SHOULD_RETRY) {
            return None;
        }
        let directions = self & Self::DIRECTIONS;
        if directions == Self::READ {
            Some(RetryReason::Read)
        } else if directions == Self::WRITE {
            Some(RetryReason::Write)
        } else if directions == Self::IO_SPECIAL {
            Some(RetryReason::IoSpecial)
        } else {
            None
        }
    }
}

/// Status of an engine-level endpoint operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IoStatus<T> {
    /// The operation completed.
    Complete(T),
    /// Not complete yet; the retry flags say which direction to wait on.
    Retry,
    /// The operation failed; do not retry.
    Error,
}

impl<T> IoStatus<T> {
    /// Map the completion value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> IoStatus<U> {
        match self {
            IoStatus::Complete(v) => IoStatus::Complete(f(v)),
            IoStatus::Retry => IoStatus::Retry,
            IoStatus::Error => IoStatus::Error,
        }
    }
}

/// Control commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Ctrl {
    /// Push buffered output down the chain.
    Flush,
    /// Drive a TLS handshake to completion.
    Handshake,
    /// Send a TLS close notification and flush it.
    Shutdown,
    /// Number of bytes readable without touching the transport.
    Pending,
}

impl fmt::Display for Ctrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Ctrl::Flush => "flush",
            Ctrl::Handshake => "handshake",
            Ctrl::Shutdown => "shutdown",
            Ctrl::Pending => "pending",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Method vtable
// ============================================================================

/// Behaviour of one kind of endpoint.
///
/// Methods report their outcome through [`IoStatus`] and set retry flags
/// through the [`EndpointCx`] they are handed. Filters reach the next
/// endpoint down the chain through the same context.
pub trait EndpointMethod: Send {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Read into `buf`. `Complete(0)` means end of stream.
    fn read(&mut self, cx: &mut EndpointCx<'_>, buf: &mut [u8]) -> IoStatus<usize>;

    /// Write from `buf`, returning how many bytes were consumed.
    fn write(&mut self, cx: &mut EndpointCx<'_>, buf: &[u8]) -> IoStatus<usize>;

    /// Control command. The default forwards it down the chain.
    fn ctrl(&mut self, cx: &mut EndpointCx<'_>, cmd: Ctrl) -> IoStatus<usize> {
        cx.forward_ctrl(cmd)
    }

    /// Install the waker used by in-flight asynchronous operations.
    fn set_waker(&mut self, _waker: &Waker) {}
}

/// What a method sees of its endpoint while it runs.
pub struct EndpointCx<'a> {
    name: &'static str,
    flags: &'a mut RetryFlags,
    next: Option<&'a mut Endpoint>,
}

impl EndpointCx<'_> {
    /// Clear all retry flags.
    pub fn clear_retry(&mut self) {
        *self.flags = RetryFlags::empty();
    }

    /// Mark a read retry and return `Retry`.
    pub fn retry_read<T>(&mut self) -> IoStatus<T> {
        self.retry(RetryReason::Read)
    }

    /// Mark a write retry and return `Retry`.
    pub fn retry_write<T>(&mut self) -> IoStatus<T> {
        self.retry(RetryReason::Write)
    }

    /// Mark a control-operation retry and return `Retry`.
    pub fn retry_special<T>(&mut self) -> IoStatus<T> {
        self.retry(RetryReason::IoSpecial)
    }

    /// Mark a retry in the direction of `reason` and return `Retry`.
    pub fn retry<T>(&mut self, reason: RetryReason) -> IoStatus<T> {
        *self.flags = RetryFlags::retry(reason);
        IoStatus::Retry
    }

    /// Copy the retry flags of the next endpoint.
    pub fn copy_next_retry(&mut self) {
        *self.flags = match &self.next {
            Some(next) => next.flags,
            None => RetryFlags::empty(),
        };
    }

    /// Queue `msg` on the error queue and return `Error`.
    pub fn fail<T>(&mut self, msg: impl Into<String>) -> IoStatus<T> {
        let msg = msg.into();
        log::debug!("[ENDPOINT] {}: {}", self.name, msg);
        error_queue::push(format!("{}: {}", self.name, msg));
        self.clear_retry();
        IoStatus::Error
    }

    /// Next endpoint down the chain.
    pub fn next(&mut self) -> Option<&mut Endpoint> {
        self.next.as_deref_mut()
    }

    /// Check whether a next endpoint is chained.
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    /// Read from the next endpoint, inheriting its retry flags.
    pub fn forward_read(&mut self, buf: &mut [u8]) -> IoStatus<usize> {
        let status = match self.next.as_deref_mut() {
            Some(next) => next.read(buf),
            None => return self.fail("read with no next endpoint"),
        };
        self.inherit(status)
    }

    /// Write to the next endpoint, inheriting its retry flags.
    pub fn forward_write(&mut self, buf: &[u8]) -> IoStatus<usize> {
        let status = match self.next.as_deref_mut() {
            Some(next) => next.write(buf),
            None => return self.fail("write with no next endpoint"),
        };
        self.inherit(status)
    }

    /// Send `cmd` to the next endpoint, inheriting its retry flags.
    ///
    /// At the bottom of a chain, `Flush` and `Pending` complete with 0 and
    /// the TLS-only commands are no-ops.
    pub fn forward_ctrl(&mut self, cmd: Ctrl) -> IoStatus<usize> {
        let status = match self.next.as_deref_mut() {
            Some(next) => next.ctrl(cmd),
            None => return IoStatus::Complete(0),
        };
        self.inherit(status)
    }

    fn inherit(&mut self, status: IoStatus<usize>) -> IoStatus<usize> {
        if status == IoStatus::Retry {
            self.copy_next_retry();
        }
        status
    }
}

// ============================================================================
// Endpoint
// ============================================================================

/// Transport endpoint: a method, its retry flags, and the owned chain below it.
pub struct Endpoint {
    id: u64,
    method: Box<dyn EndpointMethod>,
    flags: RetryFlags,
    next: Option<Box<Endpoint>>,
}

impl Endpoint {
    /// Create an endpoint running `method`.
    pub fn new(method: impl EndpointMethod + 'static) -> Self {
        Self::from_boxed(Box::new(method))
    }

    /// Create an endpoint from a boxed method.
    pub fn from_boxed(method: Box<dyn EndpointMethod>) -> Self {
        let id = registry::track_create();
        log::debug!("[ENDPOINT] created {} #{}", method.name(), id);
        Self {
            id,
            method,
            flags: RetryFlags::empty(),
            next: None,
        }
    }

    /// Process-unique endpoint id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Method name.
    pub fn method_name(&self) -> &'static str {
        self.method.name()
    }

    /// Next endpoint down the chain.
    pub fn next(&self) -> Option<&Endpoint> {
        self.next.as_deref()
    }

    /// Mutable access to the next endpoint down the chain.
    pub fn next_mut(&mut self) -> Option<&mut Endpoint> {
        self.next.as_deref_mut()
    }

    pub(crate) fn replace_next(&mut self, next: Option<Endpoint>) -> Option<Endpoint> {
        let previous = std::mem::replace(&mut self.next, next.map(Box::new));
        previous.map(|b| *b)
    }

    /// Install `waker` on this endpoint and every endpoint below it.
    pub fn set_waker(&mut self, waker: &Waker) {
        self.method.set_waker(waker);
        if let Some(next) = self.next.as_deref_mut() {
            next.set_waker(waker);
        }
    }

    // ========================================================================
    // Engine-level operations
    // ========================================================================

    /// Read into `buf`.
    pub fn read(&mut self, buf: &mut [u8]) -> IoStatus<usize> {
        let (mut cx, method) = self.split();
        let status = method.read(&mut cx, buf);
        self.settle("read", status)
    }

    /// Write from `buf`.
    pub fn write(&mut self, buf: &[u8]) -> IoStatus<usize> {
        let (mut cx, method) = self.split();
        let status = method.write(&mut cx, buf);
        self.settle("write", status)
    }

    /// Run a control command.
    pub fn ctrl(&mut self, cmd: Ctrl) -> IoStatus<usize> {
        let (mut cx, method) = self.split();
        let status = method.ctrl(&mut cx, cmd);
        self.settle("ctrl", status)
    }

    fn split(&mut self) -> (EndpointCx<'_>, &mut dyn EndpointMethod) {
        self.flags = RetryFlags::empty();
        let cx = EndpointCx {
            name: self.method.name(),
            flags: &mut self.flags,
            next: self.next.as_deref_mut(),
        };
        (cx, self.method.as_mut())
    }

    fn settle<T>(&mut self, op: &str, status: IoStatus<T>) -> IoStatus<T> {
        match status {
            IoStatus::Retry => {
                if self.flags.reason().is_none() {
                    panic!(
                        "[ENDPOINT] {} #{} {}: retry reported with flags {:?}",
                        self.method.name(),
                        self.id,
                        op,
                        self.flags
                    );
                }
                log::trace!(
                    "[ENDPOINT] {} #{} {} -> retry {:?}",
                    self.method.name(),
                    self.id,
                    op,
                    self.flags
                );
            }
            IoStatus::Complete(_) | IoStatus::Error => self.flags = RetryFlags::empty(),
        }
        status
    }

    // ========================================================================
    // Retry-flag queries
    // ========================================================================

    /// Current retry flags.
    pub fn retry_flags(&self) -> RetryFlags {
        self.flags
    }

    /// The last operation should be retried.
    pub fn should_retry(&self) -> bool {
        self.flags.contains(RetryFlags::SHOULD_RETRY)
    }

    /// The retry waits for readable bytes.
    pub fn should_read(&self) -> bool {
        self.flags.contains(RetryFlags::READ)
    }

    /// The retry waits for writable space.
    pub fn should_write(&self) -> bool {
        self.flags.contains(RetryFlags::WRITE)
    }

    /// The retry waits on a control operation.
    pub fn should_io_special(&self) -> bool {
        self.flags.contains(RetryFlags::IO_SPECIAL)
    }

    /// Direction of the pending retry.
    pub fn retry_reason(&self) -> Option<RetryReason> {
        self.flags.reason()
    }

    // ========================================================================
    // Caller surface
    // ========================================================================

    /// Receive into `buf`; `Ok(0)` means end of stream.
    pub fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        error_queue::clear();
        let status = self.read(buf);
        self.into_result(status)
    }

    /// Send from `buf`, returning how many bytes were accepted.
    pub fn send(&mut self, buf: &[u8]) -> Result<usize> {
        error_queue::clear();
        let status = self.write(buf);
        self.into_result(status)
    }

    /// Send all of `buf`, resuming at `*written`.
    ///
    /// `*written` advances as bytes are accepted, so after a would-block it
    /// holds the progress so far. Retry with the same `buf` and counter.
    pub fn send_all(&mut self, buf: &[u8], written: &mut usize) -> Result<()> {
        while *written < buf.len() {
            let n = self.send(&buf[*written..])?;
            if n == 0 {
                return Err(BioError::Fatal("endpoint accepted no bytes".into()));
            }
            *written += n;
        }
        Ok(())
    }

    /// Flush the chain.
    pub fn flush(&mut self) -> Result<()> {
        self.run_ctrl(Ctrl::Flush).map(|_| ())
    }

    /// Drive the TLS handshake of this chain.
    pub fn handshake(&mut self) -> Result<()> {
        self.run_ctrl(Ctrl::Handshake).map(|_| ())
    }

    /// Send a TLS close notification.
    pub fn shutdown(&mut self) -> Result<()> {
        self.run_ctrl(Ctrl::Shutdown).map(|_| ())
    }

    /// Bytes readable without touching the transport.
    pub fn pending(&mut self) -> Result<usize> {
        self.run_ctrl(Ctrl::Pending)
    }

    fn run_ctrl(&mut self, cmd: Ctrl) -> Result<usize> {
        error_queue::clear();
        let status = self.ctrl(cmd);
        self.into_result(status)
    }

    fn into_result(&self, status: IoStatus<usize>) -> Result<usize> {
        match status {
            IoStatus::Complete(n) => Ok(n),
            IoStatus::Retry => match self.flags.reason() {
                Some(reason) => Err(BioError::WouldBlock(reason)),
                None => panic!(
                    "[ENDPOINT] {} #{}: retry without a direction flag",
                    self.method.name(),
                    self.id
                ),
            },
            IoStatus::Error => Err(BioError::Fatal(error_queue::drain_message())),
        }
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        log::debug!("[ENDPOINT] destroyed {} #{}", self.method.name(), self.id);
        registry::track_destroy();
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id)
            .field("method", &self.method.name())
            .field("flags", &self.flags)
            .field("next", &self.next)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
