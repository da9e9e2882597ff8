//! Provider factory and the host's factory registry

use super::hsm_provider::{HsmKeyProvider, KeyProvider};
use crate::bootstrap::TokenSessionBootstrap;
use crate::catalog::{AliasSelection, KeyCatalog};
use crate::config::{config_properties, ConfigProperty, ProviderConfig, DEFAULT_DRIVER_CONFIG};
use crate::error::{HsmResult, KeyProviderError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Creates key providers of one type from host configuration
pub trait KeyProviderFactory: Send + Sync {
    /// Identifier the host registers this provider type under
    fn id(&self) -> &'static str;

    /// Short description for administrators
    fn help_text(&self) -> &'static str;

    /// Options administrators can set
    fn config_properties(&self) -> Vec<ConfigProperty>;

    /// Activate a provider. Fails rather than return a provider with no keys
    /// when the token or a selected key cannot be reached.
    fn create(&self, config: &ProviderConfig) -> HsmResult<Box<dyn KeyProvider>>;
}

/// Factory for HSM-backed RSA key providers
#[derive(Clone)]
pub struct HsmKeyProviderFactory {
    locator: PathBuf,
    bootstrap: TokenSessionBootstrap,
}

impl HsmKeyProviderFactory {
    pub const PROVIDER_ID: &'static str = "hsm";
    pub const HELP_TEXT: &'static str = "HSM-backed RSA keys via PKCS#11";

    /// Factory for the token described by the driver configuration at `locator`
    pub fn new(locator: impl Into<PathBuf>, bootstrap: TokenSessionBootstrap) -> HsmResult<Self> {
        let locator = locator.into();
        if locator.as_os_str().is_empty() {
            return Err(KeyProviderError::InvalidConfig(
                "token locator must not be empty".to_string(),
            ));
        }
        Ok(Self { locator, bootstrap })
    }

    /// Factory for [`DEFAULT_DRIVER_CONFIG`]
    pub fn with_default_locator(bootstrap: TokenSessionBootstrap) -> Self {
        Self {
            locator: PathBuf::from(DEFAULT_DRIVER_CONFIG),
            bootstrap,
        }
    }

    /// Factory loading real PKCS#11 modules through the process-wide registry
    #[cfg(feature = "pkcs11")]
    pub fn pkcs11(locator: impl Into<PathBuf>) -> HsmResult<Self> {
        Self::new(
            locator,
            TokenSessionBootstrap::global(Arc::new(crate::pkcs11::Pkcs11Loader)),
        )
    }

    #[must_use]
    pub fn locator(&self) -> &Path {
        &self.locator
    }

    /// Open a session and build the catalog
    pub fn activate(&self, config: &ProviderConfig) -> HsmResult<HsmKeyProvider> {
        let result = self
            .bootstrap
            .open(&self.locator, config.pin.as_ref())
            .and_then(|store| {
                let catalog = KeyCatalog::build(store.as_ref(), &AliasSelection::from(config))?;
                Ok(HsmKeyProvider::new(catalog, store))
            });

        if let Err(err) = &result {
            tracing::warn!(
                target: "hsm::keys",
                locator = %self.locator.display(),
                error = %err,
                cause = ?std::error::Error::source(err).map(ToString::to_string),
                "HSM key provider activation failed"
            );
        }
        result
    }
}

impl KeyProviderFactory for HsmKeyProviderFactory {
    fn id(&self) -> &'static str {
        Self::PROVIDER_ID
    }

    fn help_text(&self) -> &'static str {
        Self::HELP_TEXT
    }

    fn config_properties(&self) -> Vec<ConfigProperty> {
        config_properties()
    }

    fn create(&self, config: &ProviderConfig) -> HsmResult<Box<dyn KeyProvider>> {
        Ok(Box::new(self.activate(config)?))
    }
}

/// The host's registry of provider types, keyed by factory id
#[derive(Default)]
pub struct ProviderFactoryRegistry {
    factories: RwLock<HashMap<&'static str, Arc<dyn KeyProviderFactory>>>,
}

impl ProviderFactoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory`, returning the one it replaced
    pub fn register(
        &self,
        factory: Arc<dyn KeyProviderFactory>,
    ) -> Option<Arc<dyn KeyProviderFactory>> {
        self.factories.write().insert(factory.id(), factory)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<dyn KeyProviderFactory>> {
        self.factories.read().get(id).cloned()
    }

    /// Registered ids, sorted
    #[must_use]
    pub fn ids(&self) -> Vec<&'static str> {
        let mut ids: Vec<_> = self.factories.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
