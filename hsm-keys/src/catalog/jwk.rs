//! JSON Web Key publication

use super::descriptor::{KeyAlgorithm, KeyDescriptor, KeyType, KeyUse};
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};
use serde::{Deserialize, Serialize};

/// Public JWK for one descriptor (RFC 7517)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: KeyType,
    pub kid: String,
    pub alg: KeyAlgorithm,
    #[serde(rename = "use")]
    pub key_use: KeyUse,
    pub n: String,
    pub e: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub x5c: Vec<String>,
    #[serde(rename = "x5t#S256")]
    pub x5t_s256: String,
}

impl Jwk {
    /// `None` when the descriptor's key is not RSA
    #[must_use]
    pub fn from_descriptor(descriptor: &KeyDescriptor) -> Option<Self> {
        let Some(rsa) = descriptor.public_key().rsa_components() else {
            tracing::debug!(
                target: "hsm::keys",
                alias = descriptor.alias(),
                "skipping non-RSA key in JWK set"
            );
            return None;
        };
        let certificate = descriptor.certificate();

        Some(Self {
            kty: descriptor.key_type(),
            kid: descriptor.key_id().to_string(),
            alg: descriptor.algorithm(),
            key_use: descriptor.key_use(),
            n: URL_SAFE_NO_PAD.encode(&rsa.modulus),
            e: URL_SAFE_NO_PAD.encode(&rsa.public_exponent),
            x5c: vec![STANDARD.encode(certificate.as_der())],
            x5t_s256: URL_SAFE_NO_PAD.encode(certificate.sha256()),
        })
    }
}

/// JWK Set document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(all(test, feature = "simulation"))]
mod tests {
    use super::*;
    use crate::catalog::{AliasSelection, KeyCatalog};
    use crate::simulation::{MemoryKeyStore, MemoryToken};

    const SIG_CERT: &[u8] = include_bytes!("../../tests/fixtures/sig-key.der");
    const ENC_CERT: &[u8] = include_bytes!("../../tests/fixtures/enc-key.der");

    #[test]
    fn publishes_rsa_keys() {
        let token = MemoryToken::open(
            MemoryKeyStore::new()
                .with_key("sig-key", SIG_CERT)
                .with_key("enc-key", ENC_CERT),
        );
        let catalog = KeyCatalog::build(&token, &AliasSelection::default()).unwrap();
        let jwks = catalog.jwks().unwrap();

        assert_eq!(jwks.keys.len(), 2);
        let sig = &jwks.keys[0];
        assert_eq!(sig.e, "AQAB");
        assert_eq!(sig.alg, KeyAlgorithm::Rs256);
        assert_eq!(
            sig.kid,
            "3563864dbbc7da22d099e144752210362a4fce3028937cd0b80fa168ce1105bf"
        );
        assert_eq!(URL_SAFE_NO_PAD.decode(&sig.n).unwrap().len(), 256);
        assert_eq!(STANDARD.decode(&sig.x5c[0]).unwrap(), SIG_CERT);
        assert_eq!(jwks.keys[1].key_use, KeyUse::Encryption);
    }

    #[test]
    fn json_uses_jwk_member_names() {
        let token = MemoryToken::open(MemoryKeyStore::new().with_key("enc-key", ENC_CERT));
        let catalog = KeyCatalog::build(&token, &AliasSelection::default()).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&catalog.jwks().unwrap().to_json().unwrap()).unwrap();

        let key = &json["keys"][0];
        assert_eq!(key["kty"], "RSA");
        assert_eq!(key["use"], "enc");
        assert_eq!(key["alg"], "RSA-OAEP");
        assert!(key["x5t#S256"].is_string());
    }
}
