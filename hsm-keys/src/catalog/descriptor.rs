//! Key descriptor types

use crate::token::{Certificate, PrivateKeyHandle, PublicKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation a key is eligible for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyUse {
    #[serde(rename = "sig")]
    Signing,
    #[serde(rename = "enc")]
    Encryption,
}

impl KeyUse {
    /// Algorithm advertised for keys of this use
    #[must_use]
    pub const fn default_algorithm(&self) -> KeyAlgorithm {
        match self {
            Self::Signing => KeyAlgorithm::Rs256,
            Self::Encryption => KeyAlgorithm::RsaOaep,
        }
    }
}

impl fmt::Display for KeyUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signing => write!(f, "sig"),
            Self::Encryption => write!(f, "enc"),
        }
    }
}

/// Advertised algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    /// RSASSA-PKCS1-v1_5 with SHA-256
    #[serde(rename = "RS256")]
    Rs256,
    /// RSAES-OAEP
    #[serde(rename = "RSA-OAEP")]
    RsaOaep,
}

impl KeyAlgorithm {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Rs256 => "RS256",
            Self::RsaOaep => "RSA-OAEP",
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyType {
    Rsa,
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rsa => write!(f, "RSA"),
        }
    }
}

/// Lifecycle state. Every key this provider surfaces is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyStatus {
    Active,
}

/// Stable key identifier: lowercase hex SHA-256 of the certificate DER
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    #[must_use]
    pub fn from_certificate(certificate: &Certificate) -> Self {
        Self(certificate.fingerprint_sha256())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for KeyId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One key on the token, usually a key pair. Immutable once built.
#[derive(Debug, Clone)]
pub struct KeyDescriptor {
    alias: String,
    key_use: KeyUse,
    algorithm: KeyAlgorithm,
    key_type: KeyType,
    key_id: KeyId,
    certificate: Certificate,
    private_key: Option<PrivateKeyHandle>,
    status: KeyStatus,
}

impl KeyDescriptor {
    pub(crate) fn new(
        alias: impl Into<String>,
        key_use: KeyUse,
        certificate: Certificate,
        private_key: Option<PrivateKeyHandle>,
    ) -> Self {
        Self {
            alias: alias.into(),
            key_use,
            algorithm: key_use.default_algorithm(),
            key_type: KeyType::Rsa,
            key_id: KeyId::from_certificate(&certificate),
            certificate,
            private_key,
            status: KeyStatus::Active,
        }
    }

    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    #[must_use]
    pub fn key_use(&self) -> KeyUse {
        self.key_use
    }

    #[must_use]
    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    #[must_use]
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    #[must_use]
    pub fn key_id(&self) -> &KeyId {
        &self.key_id
    }

    #[must_use]
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    #[must_use]
    pub fn public_key(&self) -> &PublicKey {
        self.certificate.public_key()
    }

    /// Reference into the token; pass it back to the session to use the key.
    /// `None` for certificate-only entries such as trusted CA roots.
    #[must_use]
    pub fn private_key(&self) -> Option<PrivateKeyHandle> {
        self.private_key
    }

    #[must_use]
    pub fn has_private_key(&self) -> bool {
        self.private_key.is_some()
    }

    #[must_use]
    pub fn status(&self) -> KeyStatus {
        self.status
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == KeyStatus::Active
    }
}
