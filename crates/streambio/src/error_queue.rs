// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-thread engine error queue.
//!
//! Endpoints record a descriptive message here whenever they fail an
//! operation. The caller-facing surface clears the queue before calling into
//! a chain and drains it at the point of failure, so a message is never left
//! behind for a later, unrelated call to pick up.

use std::cell::RefCell;
use std::collections::VecDeque;

/// Oldest entries are discarded beyond this depth.
const MAX_QUEUED_ERRORS: usize = 64;

thread_local! {
    static QUEUE: RefCell<VecDeque<String>> = const { RefCell::new(VecDeque::new()) };
}

/// Record a failure message.
pub fn push(msg: impl Into<String>) {
    let msg = msg.into();
    log::trace!("[ERRQ] push: {}", msg);
    QUEUE.with(|q| {
        let mut q = q.borrow_mut();
        if q.len() == MAX_QUEUED_ERRORS {
            q.pop_front();
        }
        q.push_back(msg);
    });
}

/// Discard all queued messages.
pub fn clear() {
    QUEUE.with(|q| q.borrow_mut().clear());
}

/// Check whether the queue is empty.
pub fn is_empty() -> bool {
    QUEUE.with(|q| q.borrow().is_empty())
}

/// Remove and return all queued messages, oldest first.
pub fn drain() -> Vec<String> {
    QUEUE.with(|q| q.borrow_mut().drain(..).collect())
}

/// Remove all queued messages and join them with newlines.
pub fn drain_message() -> String {
    drain().join("\n")
}
