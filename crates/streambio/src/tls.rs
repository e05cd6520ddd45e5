// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TLS method/context handles and the TLS filter endpoint.
//!
//! The filter drives a rustls connection through whatever endpoint is
//! chained below it. It never blocks: when the lower endpoint would block,
//! the filter reports a retry in the same direction.
//!
//! # Handles
//!
//! - [`TlsMethod`]: process-wide protocol selection. Methods are statics and
//!   are never finalised.
//! - [`TlsContext`]: certificates, trust roots and verification settings.
//!   Cloning shares the context; it is finalised once, when the last clone
//!   is dropped.
//!
//! # Example
//!
//! ```no_run
//! use streambio::endpoint::pair::make_pair;
//! use streambio::registry::stacked;
//! use streambio::tls::{new_ssl_endpoint, Role, TlsContext, TlsMethod};
//!
//! # fn main() -> streambio::Result<()> {
//! let ctx = TlsContext::new(TlsMethod::tls());
//! ctx.load_verify_file("ca.pem")?;
//!
//! let (near, _far) = make_pair();
//! let mut client = stacked(new_ssl_endpoint(&ctx, Role::Client, Some("example.com"))?, near);
//! match client.handshake() {
//!     Ok(()) => {}
//!     Err(e) if e.is_would_block() => { /* retry once the transport is ready */ }
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, WebPkiSupportedAlgorithms};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::server::WebPkiClientVerifier;
use rustls::{
    ClientConfig, ClientConnection, Connection, DigitallySignedStruct, RootCertStore,
    ServerConfig, ServerConnection, SignatureScheme, SupportedProtocolVersion,
};

use crate::config::BridgeConfig;
use crate::endpoint::{Ctrl, Endpoint, EndpointCx, EndpointMethod, IoStatus};
use crate::error::{BioError, Result};

/// Method name of TLS filter endpoints.
pub const NAME: &str = "tls";

// ============================================================================
// Method handles
// ============================================================================

static ALL_VERSIONS: [&SupportedProtocolVersion; 2] =
    [&rustls::version::TLS13, &rustls::version::TLS12];
static TLS13_ONLY: [&SupportedProtocolVersion; 1] = [&rustls::version::TLS13];

static TLS_METHOD: TlsMethod = TlsMethod {
    name: "TLS",
    versions: &ALL_VERSIONS,
};
static TLS13_METHOD: TlsMethod = TlsMethod {
    name: "TLSv1.3",
    versions: &TLS13_ONLY,
};

/// Protocol selection shared by every context created from it.
pub struct TlsMethod {
    name: &'static str,
    versions: &'static [&'static SupportedProtocolVersion],
}

impl TlsMethod {
    /// TLS 1.2 and 1.3, negotiated.
    pub fn tls() -> &'static TlsMethod {
        &TLS_METHOD
    }

    /// TLS 1.3 only.
    pub fn tls13() -> &'static TlsMethod {
        &TLS13_METHOD
    }

    /// Method name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for TlsMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsMethod").field("name", &self.name).finish()
    }
}

// ============================================================================
// Context handles
// ============================================================================

/// Peer verification policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VerifyMode {
    /// Do not verify the peer certificate chain (testing only).
    None,
    /// Clients verify the server against the trust roots. Servers do not ask
    /// for client certificates.
    #[default]
    Peer,
    /// As `Peer`, and servers require a client certificate chaining to the
    /// trust roots.
    FailIfNoPeerCert,
}

struct ContextState {
    roots: RootCertStore,
    cert_chain: Vec<CertificateDer<'static>>,
    key: Option<PrivateKeyDer<'static>>,
    verify: VerifyMode,
    alpn: Vec<Vec<u8>>,
}

impl Default for ContextState {
    fn default() -> Self {
        Self {
            roots: RootCertStore::empty(),
            cert_chain: Vec::new(),
            key: None,
            verify: VerifyMode::default(),
            alpn: Vec::new(),
        }
    }
}

struct ContextInner {
    method: &'static TlsMethod,
    state: Mutex<ContextState>,
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        log::debug!("[TLS] {} context finalised", self.method.name);
    }
}

/// Shared TLS context handle.
#[derive(Clone)]
pub struct TlsContext {
    inner: Arc<ContextInner>,
}

impl TlsContext {
    /// Create an empty context for `method`.
    pub fn new(method: &'static TlsMethod) -> Self {
        log::debug!("[TLS] {} context created", method.name);
        Self {
            inner: Arc::new(ContextInner {
                method,
                state: Mutex::new(ContextState::default()),
            }),
        }
    }

    /// Method this context was created from.
    pub fn method(&self) -> &'static TlsMethod {
        self.inner.method
    }

    /// Number of live handles to this context.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Add every certificate of a PEM file to the trust roots.
    pub fn load_verify_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let pem = std::fs::read(path.as_ref())?;
        self.add_root_pem(&pem)
    }

    /// Add every certificate of a PEM buffer to the trust roots.
    ///
    /// Returns the number of certificates added.
    pub fn add_root_pem(&self, pem: &[u8]) -> Result<usize> {
        let certs = parse_certs(pem)?;
        let mut state = self.inner.state.lock();
        for cert in &certs {
            state.roots.add(cert.clone())?;
        }
        log::debug!("[TLS] added {} trust root(s)", certs.len());
        Ok(certs.len())
    }

    /// Add the bundled Mozilla trust roots.
    pub fn use_system_roots(&self) {
        let mut state = self.inner.state.lock();
        state
            .roots
            .extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    /// Number of trust roots.
    pub fn root_count(&self) -> usize {
        self.inner.state.lock().roots.len()
    }

    /// Set the certificate chain presented to peers (leaf first).
    pub fn use_certificate_chain_pem(&self, pem: &[u8]) -> Result<()> {
        let certs = parse_certs(pem)?;
        self.inner.state.lock().cert_chain = certs;
        Ok(())
    }

    /// Set the private key matching the certificate chain.
    pub fn use_private_key_pem(&self, pem: &[u8]) -> Result<()> {
        let key = PrivateKeyDer::from_pem_slice(pem)
            .map_err(|e| BioError::Config(format!("invalid private key PEM: {}", e)))?;
        self.inner.state.lock().key = Some(key);
        Ok(())
    }

    /// Set the peer verification policy.
    pub fn set_verify(&self, mode: VerifyMode) {
        self.inner.state.lock().verify = mode;
    }

    /// Set the ALPN protocols offered (client) or accepted (server).
    pub fn set_alpn_protocols(&self, protocols: Vec<Vec<u8>>) {
        self.inner.state.lock().alpn = protocols;
    }

    fn provider() -> Arc<CryptoProvider> {
        Arc::new(rustls::crypto::ring::default_provider())
    }

    fn client_config(&self) -> Result<Arc<ClientConfig>> {
        let state = self.inner.state.lock();
        let provider = Self::provider();
        let algorithms = provider.signature_verification_algorithms;
        let builder = ClientConfig::builder_with_provider(provider)
            .with_protocol_versions(self.inner.method.versions)?;

        let builder = match state.verify {
            VerifyMode::None => builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerifier { algorithms })),
            VerifyMode::Peer | VerifyMode::FailIfNoPeerCert => {
                builder.with_root_certificates(state.roots.clone())
            }
        };

        let mut config = match &state.key {
            Some(key) if !state.cert_chain.is_empty() => {
                builder.with_client_auth_cert(state.cert_chain.clone(), key.clone_key())?
            }
            _ => builder.with_no_client_auth(),
        };
        config.alpn_protocols = state.alpn.clone();
        Ok(Arc::new(config))
    }

    fn server_config(&self) -> Result<Arc<ServerConfig>> {
        let state = self.inner.state.lock();
        let key = match &state.key {
            Some(key) if !state.cert_chain.is_empty() => key.clone_key(),
            _ => {
                return Err(BioError::Config(
                    "server context requires a certificate chain and private key".into(),
                ))
            }
        };

        let provider = Self::provider();
        let builder = ServerConfig::builder_with_provider(Arc::clone(&provider))
            .with_protocol_versions(self.inner.method.versions)?;

        let builder = match state.verify {
            VerifyMode::FailIfNoPeerCert => {
                let verifier =
                    WebPkiClientVerifier::builder_with_provider(Arc::new(state.roots.clone()), provider)
                        .build()
                        .map_err(|e| BioError::Config(format!("client verifier: {}", e)))?;
                builder.with_client_cert_verifier(verifier)
            }
            VerifyMode::None | VerifyMode::Peer => builder.with_no_client_auth(),
        };

        let mut config = builder.with_single_cert(state.cert_chain.clone(), key)?;
        config.alpn_protocols = state.alpn.clone();
        Ok(Arc::new(config))
    }
}

impl fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("TlsContext")
            .field("method", &self.inner.method.name)
            .field("roots", &state.roots.len())
            .field("cert_chain", &state.cert_chain.len())
            .field("has_key", &state.key.is_some())
            .field("verify", &state.verify)
            .finish()
    }
}

fn parse_certs(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    let certs: Vec<CertificateDer<'static>> = CertificateDer::pem_slice_iter(pem)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| BioError::Config(format!("invalid certificate PEM: {}", e)))?;
    if certs.is_empty() {
        return Err(BioError::Config("no certificates found in PEM data".into()));
    }
    Ok(certs)
}

// ============================================================================
// No-verification certificate verifier (testing only)
// ============================================================================

/// Accepts any server certificate chain; handshake signatures are still checked.
#[derive(Debug)]
struct NoVerifier {
    algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

// ============================================================================
// TLS filter endpoint
// ============================================================================

/// Side of the TLS session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Initiates the handshake.
    Client,
    /// Answers the handshake.
    Server,
}

/// `io::Read`/`io::Write` view of the next endpoint for rustls.
///
/// A retry from the next endpoint surfaces as `WouldBlock`; its retry flags
/// have already been copied onto the filter.
struct LowerIo<'a, 'b> {
    cx: &'a mut EndpointCx<'b>,
    limit: usize,
}

impl Read for LowerIo<'_, '_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len().min(self.limit);
        match self.cx.forward_read(&mut buf[..len]) {
            IoStatus::Complete(n) => Ok(n),
            IoStatus::Retry => Err(io::ErrorKind::WouldBlock.into()),
            IoStatus::Error => Err(io::Error::other("lower endpoint read failed")),
        }
    }
}

impl Write for LowerIo<'_, '_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.cx.forward_write(buf) {
            IoStatus::Complete(n) => Ok(n),
            IoStatus::Retry => Err(io::ErrorKind::WouldBlock.into()),
            IoStatus::Error => Err(io::Error::other("lower endpoint write failed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct TlsFilter {
    conn: Connection,
    role: Role,
    read_chunk: usize,
    handshake_done: bool,
    close_sent: bool,
    lower_eof: bool,
    /// Decrypted bytes not yet handed to the caller
    plaintext_ready: usize,
}

impl TlsFilter {
    /// Write queued records to the next endpoint.
    fn push_out(&mut self, cx: &mut EndpointCx<'_>) -> IoStatus<()> {
        while self.conn.wants_write() {
            let mut lower = LowerIo {
                cx: &mut *cx,
                limit: usize::MAX,
            };
            match self.conn.write_tls(&mut lower) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return IoStatus::Retry,
                Err(e) => return cx.fail(format!("record write failed: {}", e)),
            }
        }
        IoStatus::Complete(())
    }

    /// Pull records from the next endpoint and process them.
    fn pull_in(&mut self, cx: &mut EndpointCx<'_>) -> IoStatus<usize> {
        let mut lower = LowerIo {
            cx: &mut *cx,
            limit: self.read_chunk,
        };
        let n = match self.conn.read_tls(&mut lower) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return IoStatus::Retry,
            Err(e) => return cx.fail(format!("record read failed: {}", e)),
        };
        if n == 0 {
            if self.lower_eof {
                return cx.fail("lower endpoint closed");
            }
            self.lower_eof = true;
            return IoStatus::Complete(0);
        }
        match self.conn.process_new_packets() {
            Ok(state) => self.plaintext_ready = state.plaintext_bytes_to_read(),
            Err(e) => {
                // Best effort: let the peer see the alert.
                let _ = self.push_out(cx);
                return cx.fail(format!("TLS error: {}", e));
            }
        }
        IoStatus::Complete(n)
    }

    fn handshake(&mut self, cx: &mut EndpointCx<'_>) -> IoStatus<usize> {
        loop {
            match self.push_out(cx) {
                IoStatus::Complete(()) => {}
                other => return other.map(|_| 0),
            }
            if !self.conn.is_handshaking() {
                if !self.handshake_done {
                    self.handshake_done = true;
                    log::debug!(
                        "[TLS] {:?} handshake complete ({:?}, alpn {:?})",
                        self.role,
                        self.conn.protocol_version(),
                        self.conn
                            .alpn_protocol()
                            .map(|p| String::from_utf8_lossy(p).into_owned())
                    );
                }
                return IoStatus::Complete(0);
            }
            match self.pull_in(cx) {
                IoStatus::Complete(0) => return cx.fail("connection closed during handshake"),
                IoStatus::Complete(_) => {}
                other => return other,
            }
        }
    }
}

impl EndpointMethod for TlsFilter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn read(&mut self, cx: &mut EndpointCx<'_>, buf: &mut [u8]) -> IoStatus<usize> {
        if buf.is_empty() {
            return IoStatus::Complete(0);
        }
        if self.conn.is_handshaking() {
            match self.handshake(cx) {
                IoStatus::Complete(_) => {}
                other => return other,
            }
        }
        loop {
            match self.conn.reader().read(buf) {
                Ok(n) => {
                    self.plaintext_ready = self.plaintext_ready.saturating_sub(n);
                    return IoStatus::Complete(n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return cx.fail("peer closed the transport without close_notify")
                }
                Err(e) => return cx.fail(format!("plaintext read failed: {}", e)),
            }
            match self.push_out(cx) {
                IoStatus::Complete(()) => {}
                other => return other.map(|_| 0),
            }
            match self.pull_in(cx) {
                IoStatus::Complete(_) => {}
                other => return other,
            }
        }
    }

    fn write(&mut self, cx: &mut EndpointCx<'_>, buf: &[u8]) -> IoStatus<usize> {
        if self.conn.is_handshaking() {
            match self.handshake(cx) {
                IoStatus::Complete(_) => {}
                other => return other,
            }
        }
        // Earlier records go first; this is the backpressure point.
        match self.push_out(cx) {
            IoStatus::Complete(()) => {}
            other => return other.map(|_| 0),
        }

        let n = match self.conn.writer().write(buf) {
            Ok(n) => n,
            Err(e) => return cx.fail(format!("plaintext write failed: {}", e)),
        };
        if n == 0 && !buf.is_empty() {
            return cx.retry_write();
        }

        // Accepted; records the lower endpoint cannot take yet stay queued.
        match self.push_out(cx) {
            IoStatus::Error => IoStatus::Error,
            IoStatus::Complete(()) | IoStatus::Retry => {
                cx.clear_retry();
                IoStatus::Complete(n)
            }
        }
    }

    fn ctrl(&mut self, cx: &mut EndpointCx<'_>, cmd: Ctrl) -> IoStatus<usize> {
        match cmd {
            Ctrl::Handshake => self.handshake(cx),
            Ctrl::Flush => match self.push_out(cx) {
                IoStatus::Complete(()) => cx.forward_ctrl(Ctrl::Flush),
                other => other.map(|_| 0),
            },
            Ctrl::Shutdown => {
                if !self.close_sent {
                    self.conn.send_close_notify();
                    self.close_sent = true;
                    log::debug!("[TLS] {:?} close_notify queued", self.role);
                }
                match self.push_out(cx) {
                    IoStatus::Complete(()) => cx.forward_ctrl(Ctrl::Flush),
                    other => other.map(|_| 0),
                }
            }
            // Only records already pulled in count; the connection is not touched.
            Ctrl::Pending => IoStatus::Complete(self.plaintext_ready),
        }
    }
}

/// Create a TLS filter endpoint for `role`.
///
/// Clients must name the server they expect; servers pass `None`.
pub fn new_ssl_endpoint(
    ctx: &TlsContext,
    role: Role,
    server_name: Option<&str>,
) -> Result<Endpoint> {
    new_ssl_endpoint_with_config(ctx, role, server_name, &BridgeConfig::default())
}

/// Create a TLS filter endpoint pulling `config.read_chunk` bytes per record read.
pub fn new_ssl_endpoint_with_config(
    ctx: &TlsContext,
    role: Role,
    server_name: Option<&str>,
    config: &BridgeConfig,
) -> Result<Endpoint> {
    config.validate()?;
    let conn: Connection = match role {
        Role::Client => {
            let name = server_name
                .ok_or_else(|| BioError::Config("client endpoint requires a server name".into()))?;
            let name = ServerName::try_from(name.to_string())
                .map_err(|e| BioError::Config(format!("invalid server name {:?}: {}", name, e)))?;
            ClientConnection::new(ctx.client_config()?, name)?.into()
        }
        Role::Server => ServerConnection::new(ctx.server_config()?)?.into(),
    };
    log::debug!("[TLS] {:?} endpoint over {} context", role, ctx.method().name);
    Ok(Endpoint::new(TlsFilter {
        conn,
        role,
        read_chunk: config.read_chunk,
        handshake_done: false,
        close_sent: false,
        lower_eof: false,
        plaintext_ready: 0,
    }))
}

// ============================================================================
// Tests
// ============================================================================
