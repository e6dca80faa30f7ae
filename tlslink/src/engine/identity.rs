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

//! Local certificate and private key.

use crate::transport::TransportError;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

/// A certificate chain and the private key matching its leaf.
///
/// The identity is backend-neutral: it is kept in DER form and converted by
/// each backend when a session is created. Construction checks that the key
/// can be used for signing, so a bad identity fails here rather than during
/// the handshake.
///
/// # Examples
///
/// ```rust,no_run
/// use tlslink::engine::Identity;
///
/// let cert = std::fs::read("server.crt")?;
/// let key = std::fs::read("server.key")?;
/// let identity = Identity::from_pem(&cert, &key)?;
/// assert!(!identity.certificate_chain().is_empty());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Identity {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl Identity {
    /// Parses a PEM certificate chain (leaf first) and a PEM private key.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::CredentialError`] if no certificate or no
    /// private key is found, or the key type is not supported.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self, TransportError> {
        let chain = rustls_pemfile::certs(&mut &cert_pem[..])
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| TransportError::credential(format!("failed to parse certificates: {e}")))?;

        let key = rustls_pemfile::private_key(&mut &key_pem[..])
            .map_err(|e| TransportError::credential(format!("failed to parse private key: {e}")))?
            .ok_or_else(|| TransportError::credential("no private key found"))?;

        Self::new(chain, key)
    }

    /// Builds an identity from DER certificates (leaf first) and a PKCS#8
    /// DER private key.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::CredentialError`] if the chain is empty or
    /// the key type is not supported.
    pub fn from_der(chain: Vec<Vec<u8>>, pkcs8_key: Vec<u8>) -> Result<Self, TransportError> {
        let chain = chain.into_iter().map(CertificateDer::from).collect();
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(pkcs8_key));
        Self::new(chain, key)
    }

    fn new(
        chain: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
    ) -> Result<Self, TransportError> {
        if chain.is_empty() {
            return Err(TransportError::credential("no certificates found"));
        }
        rustls::crypto::ring::sign::any_supported_type(&key)
            .map_err(|e| TransportError::credential(format!("unusable private key: {e}")))?;
        Ok(Self { chain, key })
    }

    /// Certificate chain, leaf first.
    pub fn certificate_chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    /// Private key matching the leaf certificate.
    pub fn private_key(&self) -> &PrivateKeyDer<'static> {
        &self.key
    }
}

impl Clone for Identity {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
            key: self.key.clone_key(),
        }
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("certificates", &self.chain.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generated() -> rcgen::CertifiedKey {
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap()
    }

    #[test]
    fn test_from_pem() {
        let generated = generated();
        let identity = Identity::from_pem(
            generated.cert.pem().as_bytes(),
            generated.key_pair.serialize_pem().as_bytes(),
        )
        .unwrap();
        assert_eq!(identity.certificate_chain().len(), 1);
        assert_eq!(
            identity.certificate_chain()[0].as_ref(),
            generated.cert.der().as_ref()
        );
    }

    #[test]
    fn test_from_der() {
        let generated = generated();
        let identity = Identity::from_der(
            vec![generated.cert.der().to_vec()],
            generated.key_pair.serialize_der(),
        )
        .unwrap();
        assert_eq!(identity.clone().certificate_chain().len(), 1);
    }

    #[test]
    fn test_missing_key_is_credential_error() {
        let generated = generated();
        let error = Identity::from_pem(generated.cert.pem().as_bytes(), b"").unwrap_err();
        assert!(error.is_credential_error());
    }

    #[test]
    fn test_empty_chain_is_credential_error() {
        let generated = generated();
        let error = Identity::from_der(Vec::new(), generated.key_pair.serialize_der()).unwrap_err();
        assert!(error.is_credential_error());
    }

    #[test]
    fn test_garbage_key_is_credential_error() {
        let generated = generated();
        let error =
            Identity::from_der(vec![generated.cert.der().to_vec()], vec![1, 2, 3]).unwrap_err();
        assert!(error.is_credential_error());
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let generated = generated();
        let identity = Identity::from_der(
            vec![generated.cert.der().to_vec()],
            generated.key_pair.serialize_der(),
        )
        .unwrap();
        let debug = format!("{identity:?}");
        assert!(debug.contains("certificates: 1"));
    }
}
