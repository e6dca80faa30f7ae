//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! rustls backend.
//!
//! rustls is driven through its buffer API: ciphertext is fed with
//! `read_tls` from [`EngineIo`], processed, and flushed with `write_tls`
//! back into [`EngineIo`]. Certificate verification runs through
//! [`AdvisoryVerifier`], which records the outcome and lets the handshake
//! continue.

use crate::engine::trust::default_roots;
use crate::engine::{
    BackendKind, Decoded, EngineIo, HandshakeStatus, Identity, PeerVerification, Role,
    SessionInfo, TlsBackend,
};
use crate::transport::TransportError;
use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, WebPkiSupportedAlgorithms, ring};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::{ClientConfig, ClientConnection, Connection, DigitallySignedStruct, ServerConfig};
use rustls::{ServerConnection, SignatureScheme};
use std::io::{self, Read, Write};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, PoisonError};

/// Protocol versions offered, newest first. SSLv3, TLS 1.0 and 1.1 are
/// never offered.
static PROTOCOL_VERSIONS: &[&rustls::SupportedProtocolVersion] =
    &[&rustls::version::TLS13, &rustls::version::TLS12];

/// The ring provider restricted to elliptic-curve key exchange.
fn provider() -> Arc<CryptoProvider> {
    let mut provider = ring::default_provider();
    provider.kx_groups = vec![
        ring::kx_group::X25519,
        ring::kx_group::SECP256R1,
        ring::kx_group::SECP384R1,
    ];
    Arc::new(provider)
}

/// Server certificate verifier that never rejects.
///
/// The chain and hostname are checked against the default trust store and
/// the result is stored for the layer above. Handshake signatures are still
/// verified for real: they prove possession of the presented key and are
/// required for the session keys to be sound.
#[derive(Debug)]
struct AdvisoryVerifier {
    inner: Option<Arc<WebPkiServerVerifier>>,
    algorithms: WebPkiSupportedAlgorithms,
    check_hostname: bool,
    outcome: Arc<Mutex<PeerVerification>>,
}

impl AdvisoryVerifier {
    fn new(
        provider: &Arc<CryptoProvider>,
        check_hostname: bool,
        outcome: Arc<Mutex<PeerVerification>>,
    ) -> Self {
        let inner = WebPkiServerVerifier::builder_with_provider(default_roots(), Arc::clone(provider))
            .build()
            .ok();
        Self {
            inner,
            algorithms: provider.signature_verification_algorithms,
            check_hostname,
            outcome,
        }
    }

    fn record(&self, verification: PeerVerification) {
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = verification;
    }
}

impl ServerCertVerifier for AdvisoryVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        if self.check_hostname {
            let verification = match &self.inner {
                None => PeerVerification::Failed {
                    reason: "no trust anchors".to_string(),
                },
                Some(inner) => match inner.verify_server_cert(
                    end_entity,
                    intermediates,
                    server_name,
                    ocsp_response,
                    now,
                ) {
                    Ok(_) => PeerVerification::Verified,
                    Err(error) => PeerVerification::Failed {
                        reason: error.to_string(),
                    },
                },
            };
            self.record(verification);
        }
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// Server certificate resolver for a server without an identity.
///
/// Every handshake fails with a protocol alert.
#[derive(Debug)]
struct NoIdentity;

impl ResolvesServerCert for NoIdentity {
    fn resolve(&self, _client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        None
    }
}

fn config_error(error: rustls::Error) -> TransportError {
    TransportError::invalid_configuration(format!("failed to build TLS configuration: {error}"))
}

/// A rustls connection wired to an [`EngineIo`].
pub(crate) struct RustlsBackend {
    conn: Connection,
    io: EngineIo,
    role: Role,
    host: Option<String>,
    verification: Arc<Mutex<PeerVerification>>,
}

impl RustlsBackend {
    /// Creates a connection for `role`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::CredentialError`] if the identity is
    /// rejected, or [`TransportError::InvalidConfiguration`] if the host is
    /// not a valid server name.
    pub(crate) fn new(
        role: Role,
        host: Option<&str>,
        identity: Option<&Identity>,
        io: EngineIo,
    ) -> Result<Self, TransportError> {
        let provider = provider();
        let verification = Arc::new(Mutex::new(PeerVerification::NotPerformed));

        let conn = match role {
            Role::Client => {
                let verifier = AdvisoryVerifier::new(&provider, host.is_some(), Arc::clone(&verification));
                let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
                    .with_protocol_versions(PROTOCOL_VERSIONS)
                    .map_err(config_error)?
                    .dangerous()
                    .with_custom_certificate_verifier(Arc::new(verifier));
                let config = match identity {
                    Some(identity) => builder
                        .with_client_auth_cert(
                            identity.certificate_chain().to_vec(),
                            identity.private_key().clone_key(),
                        )
                        .map_err(TransportError::credential)?,
                    None => builder.with_no_client_auth(),
                };

                // Without a host no SNI is sent: rustls omits it for IP names.
                let server_name = match host {
                    Some(host) => ServerName::try_from(host.to_string()).map_err(|e| {
                        TransportError::invalid_configuration(format!("invalid host {host:?}: {e}"))
                    })?,
                    None => ServerName::from(IpAddr::from(Ipv4Addr::UNSPECIFIED)),
                };
                let client = ClientConnection::new(Arc::new(config), server_name)
                    .map_err(config_error)?;
                Connection::Client(client)
            }
            Role::Server => {
                let builder = ServerConfig::builder_with_provider(Arc::clone(&provider))
                    .with_protocol_versions(PROTOCOL_VERSIONS)
                    .map_err(config_error)?
                    .with_no_client_auth();
                let config = match identity {
                    Some(identity) => builder
                        .with_single_cert(
                            identity.certificate_chain().to_vec(),
                            identity.private_key().clone_key(),
                        )
                        .map_err(TransportError::credential)?,
                    None => builder.with_cert_resolver(Arc::new(NoIdentity)),
                };
                let server = ServerConnection::new(Arc::new(config)).map_err(config_error)?;
                Connection::Server(server)
            }
        };

        Ok(Self {
            conn,
            io,
            role,
            host: match role {
                Role::Client => host.map(str::to_string),
                Role::Server => None,
            },
            verification,
        })
    }

    /// Writes every pending TLS record to the lower transport.
    fn flush(&mut self) -> io::Result<()> {
        while self.conn.wants_write() {
            self.conn.write_tls(&mut self.io)?;
        }
        Ok(())
    }

    /// Feeds one chunk of ciphertext into the connection and processes it.
    fn read_and_process(&mut self) -> Result<Option<usize>, String> {
        let read = loop {
            match self.conn.read_tls(&mut self.io) {
                Ok(read) => break read,
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(error.to_string()),
            }
        };
        if read == 0 {
            return Ok(Some(0));
        }
        if let Err(error) = self.conn.process_new_packets() {
            // Send the alert describing the failure before giving up.
            let _ = self.flush();
            return Err(error.to_string());
        }
        self.flush().map_err(|e| e.to_string())?;
        Ok(Some(read))
    }
}

impl TlsBackend for RustlsBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Rustls
    }

    fn start_handshake(&mut self) -> HandshakeStatus {
        // A client queues its hello on construction.
        match self.flush() {
            Ok(()) => HandshakeStatus::Progressed,
            Err(error) => HandshakeStatus::Failed(error.to_string()),
        }
    }

    fn continue_handshake(&mut self) -> HandshakeStatus {
        if let Err(error) = self.flush() {
            return HandshakeStatus::Failed(error.to_string());
        }
        if !self.conn.is_handshaking() {
            return HandshakeStatus::Completed;
        }
        match self.read_and_process() {
            Ok(None) => HandshakeStatus::WouldBlock,
            Ok(Some(0)) => HandshakeStatus::Failed("connection closed during handshake".to_string()),
            Ok(Some(_)) if self.conn.is_handshaking() => HandshakeStatus::Progressed,
            Ok(Some(_)) => HandshakeStatus::Completed,
            Err(reason) => HandshakeStatus::Failed(reason),
        }
    }

    fn is_complete(&self) -> bool {
        !self.conn.is_handshaking()
    }

    fn encode(&mut self, plaintext: &[u8]) -> Result<(), String> {
        // The plaintext buffer is bounded, so seal and flush in slices.
        let mut written = 0;
        while written < plaintext.len() {
            let accepted = self
                .conn
                .writer()
                .write(&plaintext[written..])
                .map_err(|e| e.to_string())?;
            let buffered = self.conn.wants_write();
            self.flush().map_err(|e| e.to_string())?;
            if accepted == 0 && !buffered {
                return Err("TLS record layer accepted no data".to_string());
            }
            written += accepted;
        }
        Ok(())
    }

    fn decode(&mut self, buf: &mut [u8]) -> Decoded {
        loop {
            match self.conn.reader().read(buf) {
                Ok(0) => return Decoded::Closed,
                Ok(len) => return Decoded::Data(len),
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {}
                // Peer went away without close-notify.
                Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => {
                    return Decoded::Closed;
                }
                Err(error) => return Decoded::Failed(error.to_string()),
            }

            match self.read_and_process() {
                Ok(None) => return Decoded::WouldBlock,
                Ok(Some(0)) => return Decoded::Closed,
                Ok(Some(_)) => {}
                Err(reason) => return Decoded::Failed(reason),
            }
        }
    }

    fn close_notify(&mut self) {
        self.conn.send_close_notify();
        let _ = self.flush();
    }

    fn session_info(&self) -> SessionInfo {
        SessionInfo {
            backend: BackendKind::Rustls,
            role: self.role,
            host: self.host.clone(),
            protocol_version: self.conn.protocol_version().map(|v| format!("{v:?}")),
            cipher_suite: self
                .conn
                .negotiated_cipher_suite()
                .map(|suite| format!("{:?}", suite.suite())),
            peer_verification: self
                .verification
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }

    fn io(&self) -> &EngineIo {
        &self.io
    }

    fn io_mut(&mut self) -> &mut EngineIo {
        &mut self.io
    }
}
