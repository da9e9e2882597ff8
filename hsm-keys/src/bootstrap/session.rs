//! Opening authenticated token sessions

use super::registry::{ProviderRegistry, TokenIdentity};
use crate::config::Pin;
use crate::error::{HsmResult, KeyProviderError, TokenError};
use crate::token::{DriverLoader, TokenStore};
use std::path::Path;
use std::sync::Arc;

/// Produces logged-in [`TokenStore`]s, registering the token's driver on first use
#[derive(Clone)]
pub struct TokenSessionBootstrap {
    registry: Arc<ProviderRegistry>,
    loader: Arc<dyn DriverLoader>,
}

impl TokenSessionBootstrap {
    pub fn new(registry: Arc<ProviderRegistry>, loader: Arc<dyn DriverLoader>) -> Self {
        Self { registry, loader }
    }

    /// Bootstrap against the process-wide registry
    pub fn global(loader: Arc<dyn DriverLoader>) -> Self {
        Self::new(ProviderRegistry::global(), loader)
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Open a session on the token behind `locator`.
    ///
    /// Every failure on the way (unreadable locator, driver load, login, alias
    /// enumeration) is reported as `TokenUnavailable`.
    pub fn open(&self, locator: &Path, pin: Option<&Pin>) -> HsmResult<Arc<dyn TokenStore>> {
        let identity = TokenIdentity::from_locator(locator);
        let unavailable =
            |source: TokenError| KeyProviderError::token_unavailable(identity.to_string(), source);

        let driver = self
            .registry
            .get_or_register(&identity, self.loader.as_ref())
            .map_err(unavailable)?;

        let store = driver.open_session(pin).map_err(unavailable)?;
        let aliases = store.list_aliases().map_err(unavailable)?;

        tracing::info!(
            target: "hsm::keys",
            token = %identity,
            provider = driver.name(),
            session = %store.session_id(),
            aliases = aliases.len(),
            "token session opened"
        );
        tracing::debug!(target: "hsm::keys", token = %identity, ?aliases, "token aliases");

        Ok(store)
    }
}
