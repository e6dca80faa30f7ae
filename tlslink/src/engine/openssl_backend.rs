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

//! OpenSSL backend.
//!
//! OpenSSL pulls and pushes through the `Read`/`Write` impls of
//! [`EngineIo`], wrapped in an [`SslStream`]. `WANT_READ` is OpenSSL's
//! would-block: during the handshake it is re-polled while input is still
//! queued and reported as would-block otherwise.

use crate::engine::{
    BackendKind, Decoded, EngineIo, HandshakeStatus, Identity, PeerVerification, Role,
    SessionInfo, TlsBackend,
};
use crate::transport::TransportError;
use openssl::pkey::PKey;
use openssl::ssl::{
    ErrorCode, Ssl, SslContextBuilder, SslMethod, SslOptions, SslStream, SslVerifyMode,
    SslVersion,
};
use openssl::x509::{X509, X509VerifyResult};
use rustls::pki_types::PrivateKeyDer;

#[cfg(feature = "observability")]
use tracing::warn;

const CIPHER_LIST: &str = "ALL:!LOW:!EXP:!RC4:!MD5:@STRENGTH";
const GROUPS_LIST: &str = "P-256";

fn setup_error(error: openssl::error::ErrorStack) -> TransportError {
    TransportError::invalid_configuration(format!("failed to set up OpenSSL: {error}"))
}

fn load_identity(ctx: &mut SslContextBuilder, identity: &Identity) -> Result<(), TransportError> {
    let mut chain = identity.certificate_chain().iter();
    let leaf = chain
        .next()
        .ok_or_else(|| TransportError::credential("no certificates found"))?;
    let leaf: X509 = X509::from_der(leaf).map_err(TransportError::credential)?;
    ctx.set_certificate(&*leaf)
        .map_err(TransportError::credential)?;
    for cert in chain {
        ctx.add_extra_chain_cert(X509::from_der(cert).map_err(TransportError::credential)?)
            .map_err(TransportError::credential)?;
    }

    let key = match identity.private_key() {
        PrivateKeyDer::Pkcs8(key) => PKey::private_key_from_pkcs8(key.secret_pkcs8_der()),
        other => PKey::private_key_from_der(other.secret_der()),
    }
    .map_err(TransportError::credential)?;
    ctx.set_private_key(&key).map_err(TransportError::credential)?;
    ctx.check_private_key().map_err(TransportError::credential)
}

/// An OpenSSL session wired to an [`EngineIo`].
pub(crate) struct OpenSslBackend {
    stream: SslStream<EngineIo>,
    role: Role,
    host: Option<String>,
}

impl OpenSslBackend {
    pub(crate) fn new(
        role: Role,
        host: Option<&str>,
        identity: Option<&Identity>,
        io: EngineIo,
    ) -> Result<Self, TransportError> {
        let mut ctx = SslContextBuilder::new(SslMethod::tls()).map_err(setup_error)?;
        ctx.set_options(SslOptions::NO_SSLV3 | SslOptions::NO_COMPRESSION);
        ctx.set_min_proto_version(Some(SslVersion::TLS1_2))
            .map_err(setup_error)?;
        ctx.set_cipher_list(CIPHER_LIST).map_err(setup_error)?;
        ctx.set_groups_list(GROUPS_LIST).map_err(setup_error)?;
        // Verification results are read back after the handshake, never enforced.
        ctx.set_verify(SslVerifyMode::NONE);

        match identity {
            Some(identity) => load_identity(&mut ctx, identity)?,
            None => {
                if let Err(_error) = ctx.set_default_verify_paths() {
                    #[cfg(feature = "observability")]
                    warn!(error = %_error, "SSL root CA certificates unavailable");
                }
            }
        }

        let ctx = ctx.build();
        let mut ssl = Ssl::new(&ctx).map_err(setup_error)?;
        let host = match role {
            Role::Client => {
                ssl.set_connect_state();
                host.map(str::to_string)
            }
            Role::Server => {
                ssl.set_accept_state();
                None
            }
        };
        if let Some(host) = &host {
            ssl.set_hostname(host).map_err(setup_error)?;
            ssl.param_mut().set_host(host).map_err(setup_error)?;
        }

        let stream = SslStream::new(ssl, io).map_err(setup_error)?;
        Ok(Self { stream, role, host })
    }

    fn handshake(&mut self) -> HandshakeStatus {
        match self.stream.do_handshake() {
            Ok(()) => HandshakeStatus::Completed,
            Err(error) => match error.code() {
                ErrorCode::WANT_READ if self.stream.get_ref().has_pending_input() => {
                    HandshakeStatus::Progressed
                }
                ErrorCode::WANT_READ => HandshakeStatus::WouldBlock,
                ErrorCode::WANT_WRITE => HandshakeStatus::Progressed,
                _ => HandshakeStatus::Failed(error.to_string()),
            },
        }
    }
}

impl TlsBackend for OpenSslBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::OpenSsl
    }

    fn start_handshake(&mut self) -> HandshakeStatus {
        self.handshake()
    }

    fn continue_handshake(&mut self) -> HandshakeStatus {
        self.handshake()
    }

    fn is_complete(&self) -> bool {
        self.stream.ssl().is_init_finished()
    }

    fn encode(&mut self, plaintext: &[u8]) -> Result<(), String> {
        let mut written = 0;
        while written < plaintext.len() {
            match self.stream.ssl_write(&plaintext[written..]) {
                Ok(len) => written += len,
                Err(error) if error.code() == ErrorCode::WANT_WRITE => {}
                Err(error) => return Err(error.to_string()),
            }
        }
        Ok(())
    }

    fn decode(&mut self, buf: &mut [u8]) -> Decoded {
        match self.stream.ssl_read(buf) {
            Ok(0) => Decoded::Closed,
            Ok(len) => Decoded::Data(len),
            Err(error) => match error.code() {
                ErrorCode::WANT_READ | ErrorCode::WANT_WRITE => Decoded::WouldBlock,
                ErrorCode::ZERO_RETURN => Decoded::Closed,
                // EOF without close-notify.
                ErrorCode::SYSCALL if error.io_error().is_none() => Decoded::Closed,
                _ => Decoded::Failed(error.to_string()),
            },
        }
    }

    fn close_notify(&mut self) {
        let _ = self.stream.shutdown();
    }

    fn session_info(&self) -> SessionInfo {
        let ssl = self.stream.ssl();
        let peer_verification = if self.host.is_none() {
            PeerVerification::NotPerformed
        } else {
            match ssl.verify_result() {
                X509VerifyResult::OK => PeerVerification::Verified,
                result => PeerVerification::Failed {
                    reason: result.error_string().to_string(),
                },
            }
        };
        SessionInfo {
            backend: BackendKind::OpenSsl,
            role: self.role,
            host: self.host.clone(),
            protocol_version: Some(ssl.version_str().to_string()),
            cipher_suite: ssl.current_cipher().map(|cipher| cipher.name().to_string()),
            peer_verification,
        }
    }

    fn io(&self) -> &EngineIo {
        self.stream.get_ref()
    }

    fn io_mut(&mut self) -> &mut EngineIo {
        self.stream.get_mut()
    }
}
