// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Layered-transport registry.
//!
//! Endpoints form single-linked owning chains: an upper endpoint owns the
//! endpoint below it, and dropping the top of a chain drops every endpoint
//! in it exactly once, top first.
//!
//! ```text
//!   push(&mut tls, stream_ep)
//!
//!   tls --owns--> stream_ep --owns--> (nothing)
//!
//!   drop(tls)  =>  tls destroyed, then stream_ep destroyed
//! ```
//!
//! Chains are acyclic by construction: [`push`] takes the lower endpoint by
//! value, so an endpoint can only ever be reachable from one owner.
//!
//! The registry also keeps a process-wide count of live endpoints.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::endpoint::Endpoint;

static LIVE_ENDPOINTS: AtomicUsize = AtomicUsize::new(0);
static NEXT_ENDPOINT_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn track_create() -> u64 {
    LIVE_ENDPOINTS.fetch_add(1, Ordering::Relaxed);
    NEXT_ENDPOINT_ID.fetch_add(1, Ordering::Relaxed)
}

pub(crate) fn track_destroy() {
    LIVE_ENDPOINTS.fetch_sub(1, Ordering::Relaxed);
}

/// Number of endpoints currently alive in this process.
pub fn live_endpoints() -> usize {
    LIVE_ENDPOINTS.load(Ordering::Relaxed)
}

/// Chain `lower` directly under `upper`.
///
/// Any endpoint previously chained under `upper` (and everything below it)
/// is released first.
pub fn push(upper: &mut Endpoint, lower: Endpoint) {
    log::debug!(
        "[CHAIN] push {} #{} under {} #{}",
        lower.method_name(),
        lower.id(),
        upper.method_name(),
        upper.id()
    );
    if let Some(previous) = upper.replace_next(None) {
        log::debug!(
            "[CHAIN] releasing previous lower endpoint {} #{}",
            previous.method_name(),
            previous.id()
        );
        drop(previous);
    }
    upper.replace_next(Some(lower));
}

/// Chain `lower` under `upper` and return the top of the chain.
pub fn stacked(mut upper: Endpoint, lower: Endpoint) -> Endpoint {
    push(&mut upper, lower);
    upper
}

/// Detach and return the endpoint chained under `upper`.
pub fn pop(upper: &mut Endpoint) -> Option<Endpoint> {
    let lower = upper.replace_next(None)?;
    log::debug!(
        "[CHAIN] pop {} #{} from {} #{}",
        lower.method_name(),
        lower.id(),
        upper.method_name(),
        upper.id()
    );
    Some(lower)
}

/// Number of endpoints in the chain starting at `top`.
pub fn chain_len(top: &Endpoint) -> usize {
    std::iter::successors(Some(top), |ep| ep.next()).count()
}

/// Method names along the chain, top first.
pub fn chain_names(top: &Endpoint) -> Vec<&'static str> {
    std::iter::successors(Some(top), |ep| ep.next())
        .map(Endpoint::method_name)
        .collect()
}
