// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Base64 filter endpoint.
//!
//! Writes are encoded into 64-column lines; a line is emitted once 48 input
//! bytes are available, and the padded remainder is emitted on flush. Reads
//! decode whatever the next endpoint delivers, ignoring whitespace.

use std::collections::VecDeque;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::endpoint::{Ctrl, Endpoint, EndpointCx, EndpointMethod, IoStatus};

/// Method name of base64 filters.
pub const NAME: &str = "base64";

/// Input bytes per encoded line (64 output columns).
const LINE_INPUT: usize = 48;

/// Encoded bytes pulled from the next endpoint per read.
const READ_CHUNK: usize = 1024;

#[derive(Default)]
struct Base64Method {
    /// Raw bytes not yet forming a full line
    raw: Vec<u8>,
    /// Encoded text not yet accepted by the next endpoint
    encoded: Vec<u8>,
    /// Base64 characters not yet forming a full quad
    text: Vec<u8>,
    /// Decoded bytes not yet handed to the reader
    decoded: VecDeque<u8>,
}

impl Base64Method {
    fn encode_lines(&mut self) {
        while self.raw.len() >= LINE_INPUT {
            let line: Vec<u8> = self.raw.drain(..LINE_INPUT).collect();
            self.encoded.extend_from_slice(STANDARD.encode(&line).as_bytes());
            self.encoded.push(b'\n');
        }
    }

    fn encode_tail(&mut self) {
        if !self.raw.is_empty() {
            let tail = std::mem::take(&mut self.raw);
            self.encoded.extend_from_slice(STANDARD.encode(&tail).as_bytes());
            self.encoded.push(b'\n');
        }
    }

    fn drain_encoded(&mut self, cx: &mut EndpointCx<'_>) -> IoStatus<()> {
        while !self.encoded.is_empty() {
            match cx.forward_write(&self.encoded) {
                IoStatus::Complete(0) => return cx.fail("next endpoint accepted no bytes"),
                IoStatus::Complete(n) => {
                    self.encoded.drain(..n);
                }
                IoStatus::Retry => return IoStatus::Retry,
                IoStatus::Error => return IoStatus::Error,
            }
        }
        IoStatus::Complete(())
    }

    /// Decode every complete quad in `text`.
    ///
    /// Each flush of the encoder ends with its own padding, so the text is
    /// decoded in segments ending at padded quads.
    fn decode_quads(&mut self, final_chunk: bool) -> Result<(), base64::DecodeError> {
        let usable = if final_chunk {
            self.text.len()
        } else {
            self.text.len() - self.text.len() % 4
        };
        let quads: Vec<u8> = self.text.drain(..usable).collect();

        let mut out = Vec::with_capacity(quads.len() / 4 * 3);
        let mut start = 0;
        for (i, quad) in quads.chunks(4).enumerate() {
            if quad.contains(&b'=') {
                let end = (i * 4 + quad.len()).min(quads.len());
                STANDARD.decode_vec(&quads[start..end], &mut out)?;
                start = end;
            }
        }
        if start < quads.len() {
            STANDARD.decode_vec(&quads[start..], &mut out)?;
        }
        self.decoded.extend(out);
        Ok(())
    }

    fn take_decoded(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.decoded.len());
        for (dst, src) in buf.iter_mut().zip(self.decoded.drain(..n)) {
            *dst = src;
        }
        n
    }
}

impl EndpointMethod for Base64Method {
    fn name(&self) -> &'static str {
        NAME
    }

    fn read(&mut self, cx: &mut EndpointCx<'_>, buf: &mut [u8]) -> IoStatus<usize> {
        if buf.is_empty() {
            return IoStatus::Complete(0);
        }
        loop {
            if !self.decoded.is_empty() {
                return IoStatus::Complete(self.take_decoded(buf));
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = match cx.forward_read(&mut chunk) {
                IoStatus::Complete(n) => n,
                IoStatus::Retry => return IoStatus::Retry,
                IoStatus::Error => return IoStatus::Error,
            };
            self.text
                .extend(chunk[..n].iter().copied().filter(|b| !b.is_ascii_whitespace()));

            if let Err(e) = self.decode_quads(n == 0) {
                return cx.fail(format!("invalid base64 input: {}", e));
            }
            if n == 0 {
                // End of stream: hand out what is left, then report EOF.
                return IoStatus::Complete(self.take_decoded(buf));
            }
        }
    }

    fn write(&mut self, cx: &mut EndpointCx<'_>, buf: &[u8]) -> IoStatus<usize> {
        match self.drain_encoded(cx) {
            IoStatus::Complete(()) => {}
            IoStatus::Retry => return IoStatus::Retry,
            IoStatus::Error => return IoStatus::Error,
        }

        self.raw.extend_from_slice(buf);
        self.encode_lines();

        // The input is accepted; encoded text the next endpoint cannot take
        // yet stays queued for the next write or flush.
        match self.drain_encoded(cx) {
            IoStatus::Error => IoStatus::Error,
            IoStatus::Complete(()) | IoStatus::Retry => {
                cx.clear_retry();
                IoStatus::Complete(buf.len())
            }
        }
    }

    fn ctrl(&mut self, cx: &mut EndpointCx<'_>, cmd: Ctrl) -> IoStatus<usize> {
        match cmd {
            Ctrl::Flush => {
                self.encode_tail();
                match self.drain_encoded(cx) {
                    IoStatus::Complete(()) => cx.forward_ctrl(Ctrl::Flush),
                    IoStatus::Retry => IoStatus::Retry,
                    IoStatus::Error => IoStatus::Error,
                }
            }
            Ctrl::Pending => IoStatus::Complete(self.decoded.len()),
            Ctrl::Handshake | Ctrl::Shutdown => cx.forward_ctrl(cmd),
        }
    }
}

/// Create a base64 filter.
pub fn new_filter() -> Endpoint {
    Endpoint::new(Base64Method::default())
}
