//! Alias selection and catalog construction

use super::descriptor::{KeyDescriptor, KeyId, KeyUse};
use super::jwk::{Jwk, JwkSet};
use crate::config::ProviderConfig;
use crate::error::{HsmResult, KeyProviderError, TokenError};
use crate::token::TokenStore;
use std::sync::atomic::{AtomicBool, Ordering};

/// Explicitly configured aliases
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasSelection {
    pub sig_alias: Option<String>,
    pub enc_alias: Option<String>,
}

impl AliasSelection {
    #[must_use]
    pub fn new(sig_alias: Option<String>, enc_alias: Option<String>) -> Self {
        Self {
            sig_alias,
            enc_alias,
        }
    }
}

impl From<&ProviderConfig> for AliasSelection {
    fn from(config: &ProviderConfig) -> Self {
        Self::new(config.sig_alias.clone(), config.enc_alias.clone())
    }
}

/// Use inferred from an alias name: anything containing "enc" (any case) encrypts.
#[must_use]
pub fn classify_alias(alias: &str) -> KeyUse {
    if alias.to_lowercase().contains("enc") {
        KeyUse::Encryption
    } else {
        KeyUse::Signing
    }
}

/// Descriptors built from one token session.
///
/// The set is fixed at build time; nothing is re-read from the token afterwards.
#[derive(Debug)]
pub struct KeyCatalog {
    descriptors: Vec<KeyDescriptor>,
    closed: AtomicBool,
}

impl KeyCatalog {
    /// Select aliases and build one descriptor each.
    ///
    /// Configured aliases that exist on the token are used as-is. Only when none of
    /// them produced a descriptor is every alias on the token loaded, with its use
    /// inferred by [`classify_alias`]. Any load error fails the whole build.
    pub fn build(store: &dyn TokenStore, selection: &AliasSelection) -> HsmResult<Self> {
        let mut descriptors = Vec::new();

        let configured = [
            (selection.sig_alias.as_deref(), KeyUse::Signing),
            (selection.enc_alias.as_deref(), KeyUse::Encryption),
        ];
        for (alias, key_use) in configured {
            let Some(alias) = alias else { continue };
            let present = store
                .contains_alias(alias)
                .map_err(|e| KeyProviderError::key_load(alias, e))?;
            if present {
                descriptors.push(Self::load(store, alias, key_use)?);
            } else {
                tracing::debug!(
                    target: "hsm::keys",
                    alias,
                    %key_use,
                    "configured alias not on token"
                );
            }
        }

        if descriptors.is_empty() {
            let aliases = store
                .list_aliases()
                .map_err(|source| KeyProviderError::AliasListing { source })?;
            tracing::debug!(
                target: "hsm::keys",
                count = aliases.len(),
                "no configured alias matched, inferring key use from alias names"
            );
            for alias in &aliases {
                descriptors.push(Self::load(store, alias, classify_alias(alias))?);
            }
        }

        tracing::info!(
            target: "hsm::keys",
            session = %store.session_id(),
            keys = descriptors.len(),
            "key catalog built"
        );

        Ok(Self {
            descriptors,
            closed: AtomicBool::new(false),
        })
    }

    fn load(store: &dyn TokenStore, alias: &str, key_use: KeyUse) -> HsmResult<KeyDescriptor> {
        let certificate = store
            .certificate(alias)
            .map_err(|e| KeyProviderError::key_load(alias, e))?
            .ok_or_else(|| {
                KeyProviderError::key_load(
                    alias,
                    TokenError::Certificate("no certificate stored under alias".to_string()),
                )
            })?;

        let private_key = store
            .private_key_handle(alias)
            .map_err(|e| KeyProviderError::key_load(alias, e))?;
        if private_key.is_none() {
            tracing::warn!(
                target: "hsm::keys",
                alias,
                %key_use,
                "no private key stored under alias, keeping certificate only"
            );
        }

        let descriptor = KeyDescriptor::new(alias, key_use, certificate, private_key);
        tracing::debug!(
            target: "hsm::keys",
            alias,
            %key_use,
            algorithm = %descriptor.algorithm(),
            kid = %descriptor.key_id(),
            "loaded key"
        );
        Ok(descriptor)
    }

    fn ensure_open(&self) -> HsmResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(KeyProviderError::CatalogClosed)
        } else {
            Ok(())
        }
    }

    /// All descriptors, in build order
    pub fn descriptors(&self) -> HsmResult<&[KeyDescriptor]> {
        self.ensure_open()?;
        Ok(&self.descriptors)
    }

    pub fn iter(&self) -> HsmResult<std::slice::Iter<'_, KeyDescriptor>> {
        Ok(self.descriptors()?.iter())
    }

    pub fn len(&self) -> HsmResult<usize> {
        Ok(self.descriptors()?.len())
    }

    pub fn is_empty(&self) -> HsmResult<bool> {
        Ok(self.descriptors()?.is_empty())
    }

    /// First active key of the given use that has a private key on the token
    pub fn active_key(&self, key_use: KeyUse) -> HsmResult<Option<&KeyDescriptor>> {
        Ok(self
            .descriptors()?
            .iter()
            .find(|d| d.key_use() == key_use && d.is_active() && d.has_private_key()))
    }

    /// Descriptor with the given key id
    pub fn find_by_kid(&self, kid: &str) -> HsmResult<Option<&KeyDescriptor>> {
        Ok(self
            .descriptors()?
            .iter()
            .find(|d| d.key_id().as_str() == kid))
    }

    /// Descriptors whose certificate has the given key id, one per use at most
    /// unless the token holds duplicate certificates
    pub fn by_key_id<'a>(
        &'a self,
        kid: &'a KeyId,
    ) -> HsmResult<impl Iterator<Item = &'a KeyDescriptor>> {
        Ok(self.descriptors()?.iter().filter(move |d| d.key_id() == kid))
    }

    /// Public keys for publication. Keys that are not RSA are left out.
    pub fn jwks(&self) -> HsmResult<JwkSet> {
        let keys = self
            .descriptors()?
            .iter()
            .filter(|d| d.is_active())
            .filter_map(Jwk::from_descriptor)
            .collect();
        Ok(JwkSet { keys })
    }

    /// Mark the catalog unusable. Token resources are untouched; the session is
    /// owned by whoever opened it.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(target: "hsm::keys", "key catalog closed");
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
