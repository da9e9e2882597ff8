//! Key provider error types

use thiserror::Error;

/// Result type for host-facing key provider operations
pub type HsmResult<T> = std::result::Result<T, KeyProviderError>;

/// Result type for calls across the token boundary
pub type TokenResult<T> = std::result::Result<T, TokenError>;

/// Errors raised by a token driver or token session
#[derive(Error, Debug)]
pub enum TokenError {
    /// Driver configuration could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Driver configuration was read but is malformed
    #[error("Invalid driver configuration: {0}")]
    InvalidDriverConfig(String),

    /// PKCS#11 module call failed
    #[error("PKCS#11 error: {0}")]
    Pkcs11(String),

    /// No slot matched the driver configuration
    #[error("Slot not found: {0}")]
    SlotNotFound(String),

    /// Login to the token was rejected
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Certificate is missing or could not be decoded
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// Private key handle does not belong to this session
    #[error("Unknown private key handle: {0}")]
    UnknownHandle(String),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

impl From<anyhow::Error> for TokenError {
    fn from(err: anyhow::Error) -> Self {
        TokenError::Other(err.to_string())
    }
}

/// Errors surfaced to the host when a provider is activated or queried
#[derive(Error, Debug)]
pub enum KeyProviderError {
    /// Driver could not be located, registered or logged into
    #[error("Token unavailable at '{locator}'")]
    TokenUnavailable {
        locator: String,
        #[source]
        source: TokenError,
    },

    /// A selected alias could not be turned into a key descriptor
    #[error("Failed to load key '{alias}'")]
    KeyLoadFailure {
        alias: String,
        #[source]
        source: TokenError,
    },

    /// Token aliases could not be enumerated
    #[error("Failed to enumerate token aliases")]
    AliasListing {
        #[source]
        source: TokenError,
    },

    /// The catalog was queried after `close()`
    #[error("Key catalog is closed")]
    CatalogClosed,

    /// Host configuration value could not be interpreted
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl KeyProviderError {
    pub(crate) fn token_unavailable(locator: impl Into<String>, source: TokenError) -> Self {
        KeyProviderError::TokenUnavailable {
            locator: locator.into(),
            source,
        }
    }

    pub(crate) fn key_load(alias: impl Into<String>, source: TokenError) -> Self {
        KeyProviderError::KeyLoadFailure {
            alias: alias.into(),
            source,
        }
    }

    /// True when the failure is infrastructure related (token unreachable, login rejected)
    #[must_use]
    pub fn is_token_failure(&self) -> bool {
        matches!(
            self,
            KeyProviderError::TokenUnavailable { .. } | KeyProviderError::AliasListing { .. }
        )
    }

    /// True when the failure comes from key selection (wrong alias, missing certificate)
    #[must_use]
    pub fn is_key_selection_failure(&self) -> bool {
        matches!(self, KeyProviderError::KeyLoadFailure { .. })
    }
}
