//! # hsm-keys
//!
//! HSM-backed key material provider for identity and authentication hosts.
//!
//! The crate discovers the RSA key pairs held on a PKCS#11 token, classifies each
//! as a signing or encryption key, and exposes them as immutable descriptors with
//! stable key ids. Private keys never leave the token: descriptors carry only an
//! opaque handle scoped to the session that issued it.
//!
//! ## Layers
//!
//! - [`bootstrap`]: registers the token's driver once per process and opens
//!   logged-in sessions
//! - [`catalog`]: alias selection and descriptor construction
//! - [`provider`]: the `hsm` provider type as the host sees it
//!
//! ## Features
//!
//! - `simulation` (default): in-memory token for tests and local development
//! - `pkcs11`: real tokens via PKCS#11 (cryptoki)
//!
//! ## Usage
//!
//! ```ignore
//! use hsm_keys::{HsmKeyProviderFactory, KeyProviderFactory, ProviderConfig};
//!
//! let factory = HsmKeyProviderFactory::pkcs11("/etc/hsm-keys/pkcs11.toml")?;
//! let config = ProviderConfig::default()
//!     .with_pin("1234")
//!     .with_sig_alias("jwt-signing");
//!
//! let provider = factory.activate(&config)?;
//! let signing = provider.signing_key()?.expect("signing key");
//! println!("kid={} alg={}", signing.key_id(), signing.algorithm());
//! ```

pub mod bootstrap;
pub mod catalog;
pub mod config;
pub mod error;
pub mod provider;
pub mod token;

#[cfg(feature = "pkcs11")]
pub mod pkcs11;

#[cfg(feature = "simulation")]
pub mod simulation;

// Re-exports
pub use bootstrap::{ProviderRegistry, TokenIdentity, TokenSessionBootstrap};
pub use catalog::{
    classify_alias, AliasSelection, Jwk, JwkSet, KeyAlgorithm, KeyCatalog, KeyDescriptor, KeyId,
    KeyStatus, KeyType, KeyUse,
};
pub use config::{ConfigProperty, DriverConfig, Pin, PropertyKind, ProviderConfig};
pub use error::{HsmResult, KeyProviderError, TokenError, TokenResult};
pub use provider::{
    HsmKeyProvider, HsmKeyProviderFactory, KeyProvider, KeyProviderFactory,
    ProviderFactoryRegistry,
};
pub use token::{
    Certificate, DriverLoader, PrivateKeyHandle, PublicKey, RsaComponents, SessionId, TokenDriver,
    TokenStore,
};

#[cfg(feature = "pkcs11")]
pub use pkcs11::{Pkcs11Driver, Pkcs11Loader, Pkcs11Token};

#[cfg(feature = "simulation")]
pub use simulation::{MemoryDriver, MemoryKeyStore, MemoryLoader, MemoryToken};
