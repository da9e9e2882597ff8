//! Key provider backed by a token session

use crate::catalog::{JwkSet, KeyCatalog, KeyDescriptor, KeyUse};
use crate::error::HsmResult;
use crate::token::TokenStore;
use std::sync::Arc;

/// What the host asks of an activated key provider
pub trait KeyProvider: Send + Sync {
    /// Keys exposed by this provider. Re-iterable; reflects activation time.
    fn keys(&self) -> HsmResult<&[KeyDescriptor]>;

    /// Stop serving keys
    fn close(&self);
}

/// Keys from one HSM token session
pub struct HsmKeyProvider {
    catalog: KeyCatalog,
    store: Arc<dyn TokenStore>,
}

impl HsmKeyProvider {
    pub fn new(catalog: KeyCatalog, store: Arc<dyn TokenStore>) -> Self {
        Self { catalog, store }
    }

    #[must_use]
    pub fn catalog(&self) -> &KeyCatalog {
        &self.catalog
    }

    /// Session the descriptors' private key handles belong to
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    /// The active signing key, if any
    pub fn signing_key(&self) -> HsmResult<Option<&KeyDescriptor>> {
        self.catalog.active_key(KeyUse::Signing)
    }

    /// The active encryption key, if any
    pub fn encryption_key(&self) -> HsmResult<Option<&KeyDescriptor>> {
        self.catalog.active_key(KeyUse::Encryption)
    }

    pub fn jwks(&self) -> HsmResult<JwkSet> {
        self.catalog.jwks()
    }
}

impl KeyProvider for HsmKeyProvider {
    fn keys(&self) -> HsmResult<&[KeyDescriptor]> {
        self.catalog.descriptors()
    }

    fn close(&self) {
        self.catalog.close();
    }
}
