//! X.509 certificates and the public keys they carry

use crate::error::{TokenError, TokenResult};
use der::{Decode, Encode};
use sha2::{Digest, Sha256};
use spki::ObjectIdentifier;
use std::fmt;
use std::sync::Arc;
use x509_cert::Certificate as X509Certificate;

/// Public half of a key pair, as found in a certificate's SubjectPublicKeyInfo
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    algorithm: ObjectIdentifier,
    spki_der: Vec<u8>,
    key_bytes: Vec<u8>,
}

/// RSA public key components, big-endian with leading zeros stripped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaComponents {
    pub modulus: Vec<u8>,
    pub public_exponent: Vec<u8>,
}

impl PublicKey {
    /// Algorithm OID from the SubjectPublicKeyInfo
    #[must_use]
    pub fn algorithm(&self) -> ObjectIdentifier {
        self.algorithm
    }

    /// DER encoded SubjectPublicKeyInfo
    #[must_use]
    pub fn spki_der(&self) -> &[u8] {
        &self.spki_der
    }

    #[must_use]
    pub fn is_rsa(&self) -> bool {
        self.algorithm == pkcs1::ALGORITHM_OID
    }

    /// Modulus and exponent, or `None` for non-RSA keys
    #[must_use]
    pub fn rsa_components(&self) -> Option<RsaComponents> {
        if !self.is_rsa() {
            return None;
        }
        let key = pkcs1::RsaPublicKey::from_der(&self.key_bytes).ok()?;
        Some(RsaComponents {
            modulus: key.modulus.as_bytes().to_vec(),
            public_exponent: key.public_exponent.as_bytes().to_vec(),
        })
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("algorithm", &self.algorithm.to_string())
            .field("spki_len", &self.spki_der.len())
            .finish()
    }
}

/// A certificate read from the token
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Arc<[u8]>,
    subject: String,
    public_key: PublicKey,
}

impl Certificate {
    /// Parse a DER encoded X.509 certificate.
    ///
    /// The bytes kept are the certificate's canonical DER re-encoding.
    pub fn from_der(bytes: &[u8]) -> TokenResult<Self> {
        let parsed = X509Certificate::from_der(bytes)
            .map_err(|e| TokenError::Certificate(format!("Invalid X.509 certificate: {}", e)))?;

        let der = parsed
            .to_der()
            .map_err(|e| TokenError::Certificate(format!("Failed to encode certificate: {}", e)))?;

        let spki = &parsed.tbs_certificate.subject_public_key_info;
        let spki_der = spki
            .to_der()
            .map_err(|e| TokenError::Certificate(format!("Failed to encode public key: {}", e)))?;

        let public_key = PublicKey {
            algorithm: spki.algorithm.oid,
            spki_der,
            key_bytes: spki.subject_public_key.raw_bytes().to_vec(),
        };

        Ok(Self {
            der: der.into(),
            subject: parsed.tbs_certificate.subject.to_string(),
            public_key,
        })
    }

    #[must_use]
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// Subject distinguished name in RFC 4514 form
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// SHA-256 over the DER encoding
    #[must_use]
    pub fn sha256(&self) -> [u8; 32] {
        Sha256::digest(&self.der).into()
    }

    /// Lowercase hex SHA-256 over the DER encoding
    #[must_use]
    pub fn fingerprint_sha256(&self) -> String {
        hex::encode(self.sha256())
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Certificate(subject={}, len={})", self.subject, self.der.len())
    }
}
