//! Process-wide driver registry

use crate::error::TokenResult;
use crate::token::{DriverLoader, TokenDriver};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Registry shared by every provider in the process
static GLOBAL: Lazy<Arc<ProviderRegistry>> = Lazy::new(|| Arc::new(ProviderRegistry::new()));

/// Identity of a token: the locator it is reached through
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenIdentity(PathBuf);

impl TokenIdentity {
    /// Identity for `locator`. Existing paths are canonicalized so that two
    /// spellings of the same file share one registration.
    #[must_use]
    pub fn from_locator(locator: &Path) -> Self {
        Self(
            locator
                .canonicalize()
                .unwrap_or_else(|_| locator.to_path_buf()),
        )
    }

    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for TokenIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Registered drivers keyed by token identity.
///
/// Lookup, load and insert happen under one lock, so each identity is loaded at
/// most once and a failed load leaves nothing behind.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Mutex<HashMap<TokenIdentity, Arc<dyn TokenDriver>>>,
}

impl ProviderRegistry {
    /// An empty registry, independent of the global one
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    #[must_use]
    pub fn global() -> Arc<ProviderRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Return the driver registered for `identity`, loading and registering it first
    /// if there is none
    pub fn get_or_register(
        &self,
        identity: &TokenIdentity,
        loader: &dyn DriverLoader,
    ) -> TokenResult<Arc<dyn TokenDriver>> {
        let mut providers = self.providers.lock();

        if let Some(driver) = providers.get(identity) {
            tracing::debug!(
                target: "hsm::keys",
                token = %identity,
                provider = driver.name(),
                "reusing registered provider"
            );
            return Ok(Arc::clone(driver));
        }

        let driver = loader.load(identity.as_path())?;
        tracing::info!(
            target: "hsm::keys",
            token = %identity,
            provider = driver.name(),
            "registered provider"
        );
        providers.insert(identity.clone(), Arc::clone(&driver));
        Ok(driver)
    }

    /// Driver registered for `identity`, if any
    #[must_use]
    pub fn get(&self, identity: &TokenIdentity) -> Option<Arc<dyn TokenDriver>> {
        self.providers.lock().get(identity).cloned()
    }

    #[must_use]
    pub fn is_registered(&self, identity: &TokenIdentity) -> bool {
        self.providers.lock().contains_key(identity)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.lock().is_empty()
    }
}
