// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! [`AsyncStream`] over tokio I/O objects.
//!
//! The I/O object is split into independently locked read and write halves
//! so a receive waiting on the peer never holds up a send. Every operation is
//! polled once on creation; it answers immediately when the object can
//! complete it without waiting.

use std::sync::Arc;

use bytes::Bytes;
use futures::task::noop_waker_ref;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;

use super::AsyncStream;
use crate::error::StreamError;
use crate::future::MaybeReady;

/// Asynchronous stream backed by a tokio `AsyncRead + AsyncWrite` object.
pub struct IoStream<T> {
    reader: Arc<Mutex<ReadHalf<T>>>,
    writer: Arc<Mutex<WriteHalf<T>>>,
}

impl<T> IoStream<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wrap an I/O object.
    pub fn new(io: T) -> Self {
        let (reader, writer) = tokio::io::split(io);
        Self {
            reader: Arc::new(Mutex::new(reader)),
            writer: Arc::new(Mutex::new(writer)),
        }
    }
}

impl<T> AsyncStream for IoStream<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    fn receive(&self, max_len: usize) -> MaybeReady<Bytes> {
        let reader = Arc::clone(&self.reader);
        MaybeReady::poll_once(
            async move {
                let mut reader = reader.lock().await;
                let mut buf = vec![0u8; max_len];
                let n = reader.read(&mut buf).await.map_err(StreamError::from)?;
                buf.truncate(n);
                Ok(Bytes::from(buf))
            },
            noop_waker_ref(),
        )
    }

    fn send(&self, data: Bytes) -> MaybeReady<()> {
        let writer = Arc::clone(&self.writer);
        MaybeReady::poll_once(
            async move {
                let mut writer = writer.lock().await;
                writer.write_all(&data).await.map_err(StreamError::from)
            },
            noop_waker_ref(),
        )
    }

    fn flush(&self) -> MaybeReady<()> {
        let writer = Arc::clone(&self.writer);
        MaybeReady::poll_once(
            async move {
                let mut writer = writer.lock().await;
                writer.flush().await.map_err(StreamError::from)
            },
            noop_waker_ref(),
        )
    }
}
