// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::channel::oneshot;
use futures::task::ArcWake;
use parking_lot::Mutex;
use streambio::{AsyncStream, MaybeReady, StreamError, StreamResult};

/// Asynchronous stream whose operations complete when the test says so.
///
/// - `receive` answers immediately from delivered data, otherwise defers
///   until [`ManualStream::deliver`] is called.
/// - `send` and `flush` always defer until completed by the test.
#[derive(Default)]
pub struct ManualStream {
    inbound: Mutex<VecDeque<u8>>,
    waiting_receives: Mutex<VecDeque<(usize, oneshot::Sender<StreamResult<Bytes>>)>>,
    waiting_sends: Mutex<VecDeque<(Bytes, oneshot::Sender<StreamResult<()>>)>>,
    waiting_flushes: Mutex<VecDeque<oneshot::Sender<StreamResult<()>>>>,
    receive_calls: AtomicUsize,
    send_calls: AtomicUsize,
}

fn deferred<T: Send + 'static>(rx: oneshot::Receiver<StreamResult<T>>) -> MaybeReady<T> {
    MaybeReady::deferred(async move {
        rx.await
            .unwrap_or_else(|_| Err(StreamError::other("manual stream dropped the operation")))
    })
}

impl ManualStream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `data` available; resolves the oldest waiting receive first.
    pub fn deliver(&self, data: &[u8]) {
        let waiting = self.waiting_receives.lock().pop_front();
        match waiting {
            Some((max_len, tx)) => {
                let n = max_len.min(data.len());
                let _ = tx.send(Ok(Bytes::copy_from_slice(&data[..n])));
                self.inbound.lock().extend(&data[n..]);
            }
            None => self.inbound.lock().extend(data),
        }
    }

    /// Fail the oldest waiting receive.
    pub fn fail_receive(&self, message: &str) {
        if let Some((_, tx)) = self.waiting_receives.lock().pop_front() {
            let _ = tx.send(Err(StreamError::other(message)));
        }
    }

    /// Complete the oldest waiting send, returning its payload.
    pub fn complete_send(&self) -> Option<Bytes> {
        let (data, tx) = self.waiting_sends.lock().pop_front()?;
        let _ = tx.send(Ok(()));
        Some(data)
    }

    /// Complete the oldest waiting flush.
    pub fn complete_flush(&self) -> bool {
        match self.waiting_flushes.lock().pop_front() {
            Some(tx) => tx.send(Ok(())).is_ok(),
            None => false,
        }
    }

    /// Senders whose operation was dropped by its owner.
    pub fn abandoned(&self) -> usize {
        let receives = self
            .waiting_receives
            .lock()
            .iter()
            .filter(|(_, tx)| tx.is_canceled())
            .count();
        let sends = self
            .waiting_sends
            .lock()
            .iter()
            .filter(|(_, tx)| tx.is_canceled())
            .count();
        let flushes = self
            .waiting_flushes
            .lock()
            .iter()
            .filter(|tx| tx.is_canceled())
            .count();
        receives + sends + flushes
    }

    pub fn receive_calls(&self) -> usize {
        self.receive_calls.load(Ordering::SeqCst)
    }

    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }
}

impl AsyncStream for ManualStream {
    fn receive(&self, max_len: usize) -> MaybeReady<Bytes> {
        self.receive_calls.fetch_add(1, Ordering::SeqCst);
        let mut inbound = self.inbound.lock();
        if !inbound.is_empty() {
            let n = max_len.min(inbound.len());
            let data: Vec<u8> = inbound.drain(..n).collect();
            return MaybeReady::ready(Bytes::from(data));
        }
        drop(inbound);
        let (tx, rx) = oneshot::channel();
        self.waiting_receives.lock().push_back((max_len, tx));
        deferred(rx)
    }

    fn send(&self, data: Bytes) -> MaybeReady<()> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.waiting_sends.lock().push_back((data, tx));
        deferred(rx)
    }

    fn flush(&self) -> MaybeReady<()> {
        let (tx, rx) = oneshot::channel();
        self.waiting_flushes.lock().push_back(tx);
        deferred(rx)
    }
}

/// Waker counting how often it was woken.
#[derive(Default)]
pub struct CountingWaker(AtomicUsize);

impl CountingWaker {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl ArcWake for CountingWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Self-signed identity for "localhost".
pub struct Identity {
    pub cert_pem: String,
    pub key_pem: String,
}

pub fn localhost_identity() -> Identity {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .expect("certificate generation");
    Identity {
        cert_pem: certified.cert.pem(),
        key_pem: certified.key_pair.serialize_pem(),
    }
}
