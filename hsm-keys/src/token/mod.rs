//! Token boundary
//!
//! The key provider never talks to a PKCS#11 module directly. It goes through
//! three narrow traits:
//!
//! - [`DriverLoader`] reads a locator and configures a driver
//! - [`TokenDriver`] opens authenticated sessions against one token
//! - [`TokenStore`] is one open session: aliases, certificates, private key handles
//!
//! Private keys cross this boundary only as [`PrivateKeyHandle`] values.

mod certificate;
mod handle;

pub use certificate::{Certificate, PublicKey, RsaComponents};
pub use handle::{PrivateKeyHandle, SessionId};

use crate::config::Pin;
use crate::error::TokenResult;
use std::path::Path;
use std::sync::Arc;

/// One authenticated session against a token
pub trait TokenStore: Send + Sync {
    /// Session this store belongs to; every handle it returns carries it
    fn session_id(&self) -> SessionId;

    /// All aliases on the token, in the order the token reports them
    fn list_aliases(&self) -> TokenResult<Vec<String>>;

    /// Whether `alias` names an entry on the token
    fn contains_alias(&self, alias: &str) -> TokenResult<bool> {
        Ok(self.list_aliases()?.iter().any(|a| a == alias))
    }

    /// Certificate stored under `alias`, if any
    fn certificate(&self, alias: &str) -> TokenResult<Option<Certificate>>;

    /// Reference to the private key stored under `alias`, if any.
    ///
    /// The session is already logged in, so no credential is taken here.
    fn private_key_handle(&self, alias: &str) -> TokenResult<Option<PrivateKeyHandle>>;
}

/// A configured driver for one token
pub trait TokenDriver: Send + Sync {
    /// Name the driver was registered under
    fn name(&self) -> &str;

    /// Open a session, logging in with `pin` when one is given
    fn open_session(&self, pin: Option<&Pin>) -> TokenResult<Arc<dyn TokenStore>>;
}

/// Builds a driver from a locator. Registration is the caller's business.
pub trait DriverLoader: Send + Sync {
    fn load(&self, locator: &Path) -> TokenResult<Arc<dyn TokenDriver>>;
}
