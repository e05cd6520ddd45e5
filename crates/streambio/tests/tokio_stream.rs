// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![cfg(feature = "runtime-tokio")]
#![allow(clippy::uninlined_format_args)] // Test readability over pedantic

//! TLS over tokio I/O objects.
//!
//! Each peer is a TLS endpoint stacked on a stream endpoint wrapping one end
//! of a `tokio::io::duplex`. The driver yields to the runtime between rounds,
//! the way an async task re-drives the engine after its waker fires.

mod common;

use std::sync::Arc;

use common::localhost_identity;
use streambio::endpoint::stream_ep;
use streambio::tls::{new_ssl_endpoint, Role, TlsContext, TlsMethod};
use streambio::{stacked, AsyncStream, Endpoint, IoStream};

fn peer(io: tokio::io::DuplexStream, ctx: &TlsContext, role: Role) -> Endpoint {
    let stream: Arc<dyn AsyncStream> = Arc::new(IoStream::new(io));
    let name = (role == Role::Client).then_some("localhost");
    stacked(
        new_ssl_endpoint(ctx, role, name).unwrap(),
        stream_ep::new_endpoint(stream),
    )
}

#[tokio::test]
async fn test_tls_over_duplex() {
    let id = localhost_identity();
    let server_ctx = TlsContext::new(TlsMethod::tls());
    server_ctx.use_certificate_chain_pem(id.cert_pem.as_bytes()).unwrap();
    server_ctx.use_private_key_pem(id.key_pem.as_bytes()).unwrap();
    let client_ctx = TlsContext::new(TlsMethod::tls());
    client_ctx.add_root_pem(id.cert_pem.as_bytes()).unwrap();

    let (a, b) = tokio::io::duplex(64 * 1024);
    let mut client = peer(a, &client_ctx, Role::Client);
    let mut server = peer(b, &server_ctx, Role::Server);

    let (mut client_done, mut server_done) = (false, false);
    for _ in 0..256 {
        if !client_done {
            match client.handshake() {
                Ok(()) => client_done = true,
                Err(e) => assert!(e.is_would_block(), "client handshake: {}", e),
            }
        }
        if !server_done {
            match server.handshake() {
                Ok(()) => server_done = true,
                Err(e) => assert!(e.is_would_block(), "server handshake: {}", e),
            }
        }
        if client_done && server_done {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(client_done && server_done, "handshake did not converge");

    client.send_all(b"ping over duplex", &mut 0).unwrap();
    let mut buf = [0u8; 64];
    let mut got = Vec::new();
    for _ in 0..256 {
        match server.recv(&mut buf) {
            Ok(n) => {
                got.extend_from_slice(&buf[..n]);
                break;
            }
            Err(e) => assert!(e.is_would_block(), "server recv: {}", e),
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(got, b"ping over duplex");
}
