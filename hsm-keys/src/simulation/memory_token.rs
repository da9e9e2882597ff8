//! Memory-backed token, driver and loader

use crate::config::Pin;
use crate::error::{TokenError, TokenResult};
use crate::token::{
    Certificate, DriverLoader, PrivateKeyHandle, SessionId, TokenDriver, TokenStore,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct MemoryEntry {
    alias: String,
    certificate: Option<Vec<u8>>,
    has_private_key: bool,
    failing: bool,
}

/// Token contents: ordered entries plus injected faults
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyStore {
    entries: Vec<MemoryEntry>,
    listing_fails: bool,
}

impl MemoryKeyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key pair with its certificate
    #[must_use]
    pub fn with_key(self, alias: impl Into<String>, certificate_der: &[u8]) -> Self {
        self.with_entry(alias.into(), Some(certificate_der.to_vec()), true, false)
    }

    /// Add a certificate with no private key behind it
    #[must_use]
    pub fn with_certificate_only(self, alias: impl Into<String>, certificate_der: &[u8]) -> Self {
        self.with_entry(alias.into(), Some(certificate_der.to_vec()), false, false)
    }

    /// Add a private key with no certificate
    #[must_use]
    pub fn with_private_key_only(self, alias: impl Into<String>) -> Self {
        self.with_entry(alias.into(), None, true, false)
    }

    /// Add an alias whose certificate and key reads fail with a device error
    #[must_use]
    pub fn with_failing_alias(self, alias: impl Into<String>) -> Self {
        self.with_entry(alias.into(), None, false, true)
    }

    /// Make alias enumeration fail
    #[must_use]
    pub fn with_failing_listing(mut self) -> Self {
        self.listing_fails = true;
        self
    }

    fn with_entry(
        mut self,
        alias: String,
        certificate: Option<Vec<u8>>,
        has_private_key: bool,
        failing: bool,
    ) -> Self {
        self.entries.push(MemoryEntry {
            alias,
            certificate,
            has_private_key,
            failing,
        });
        self
    }

    fn position(&self, alias: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.alias == alias)
    }
}

/// One session against a [`MemoryKeyStore`]
#[derive(Debug)]
pub struct MemoryToken {
    session: SessionId,
    store: MemoryKeyStore,
}

impl MemoryToken {
    #[must_use]
    pub fn open(store: MemoryKeyStore) -> Self {
        Self {
            session: SessionId::next(),
            store,
        }
    }

    /// Alias a handle refers to. Stands in for running an operation on the key.
    pub fn resolve(&self, handle: &PrivateKeyHandle) -> TokenResult<&str> {
        if !handle.belongs_to(self.session) {
            return Err(TokenError::UnknownHandle(format!(
                "{:?} was issued by another session",
                handle
            )));
        }
        self.store
            .entries
            .get(handle.index() as usize)
            .filter(|e| e.has_private_key)
            .map(|e| e.alias.as_str())
            .ok_or_else(|| TokenError::UnknownHandle(format!("{:?}", handle)))
    }

    fn entry(&self, alias: &str) -> TokenResult<Option<(usize, &MemoryEntry)>> {
        match self.store.position(alias) {
            Some(index) => {
                let entry = &self.store.entries[index];
                if entry.failing {
                    return Err(TokenError::Pkcs11(format!(
                        "CKR_DEVICE_ERROR reading '{}'",
                        alias
                    )));
                }
                Ok(Some((index, entry)))
            }
            None => Ok(None),
        }
    }
}

impl TokenStore for MemoryToken {
    fn session_id(&self) -> SessionId {
        self.session
    }

    fn list_aliases(&self) -> TokenResult<Vec<String>> {
        if self.store.listing_fails {
            return Err(TokenError::Pkcs11("CKR_DEVICE_REMOVED".to_string()));
        }
        Ok(self.store.entries.iter().map(|e| e.alias.clone()).collect())
    }

    fn contains_alias(&self, alias: &str) -> TokenResult<bool> {
        Ok(self.store.position(alias).is_some())
    }

    fn certificate(&self, alias: &str) -> TokenResult<Option<Certificate>> {
        match self.entry(alias)? {
            Some((_, entry)) => entry
                .certificate
                .as_deref()
                .map(Certificate::from_der)
                .transpose(),
            None => Ok(None),
        }
    }

    fn private_key_handle(&self, alias: &str) -> TokenResult<Option<PrivateKeyHandle>> {
        Ok(self.entry(alias)?.and_then(|(index, entry)| {
            entry
                .has_private_key
                .then(|| PrivateKeyHandle::new(self.session, index as u32))
        }))
    }
}

/// Driver over a fixed [`MemoryKeyStore`]
#[derive(Debug)]
pub struct MemoryDriver {
    name: String,
    store: MemoryKeyStore,
    pin: Option<Pin>,
    sessions_opened: AtomicUsize,
}

impl MemoryDriver {
    #[must_use]
    pub fn new(name: impl Into<String>, store: MemoryKeyStore) -> Self {
        Self {
            name: name.into(),
            store,
            pin: None,
            sessions_opened: AtomicUsize::new(0),
        }
    }

    /// Require this PIN at login
    #[must_use]
    pub fn with_pin(mut self, pin: impl Into<String>) -> Self {
        self.pin = Some(Pin::new(pin));
        self
    }

    #[must_use]
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }
}

impl TokenDriver for MemoryDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn open_session(&self, pin: Option<&Pin>) -> TokenResult<Arc<dyn TokenStore>> {
        if let Some(expected) = &self.pin {
            match pin {
                Some(given) if given == expected => {}
                Some(_) => return Err(TokenError::Authentication("CKR_PIN_INCORRECT".to_string())),
                None => {
                    return Err(TokenError::Authentication(
                        "CKR_USER_NOT_LOGGED_IN".to_string(),
                    ))
                }
            }
        }

        self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryToken::open(self.store.clone())) as Arc<dyn TokenStore>)
    }
}

/// Loader resolving locators to pre-built memory drivers
#[derive(Default)]
pub struct MemoryLoader {
    drivers: Mutex<HashMap<PathBuf, Arc<MemoryDriver>>>,
    loads: AtomicUsize,
}

impl MemoryLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `driver` for `locator`
    #[must_use]
    pub fn with_driver(self, locator: impl Into<PathBuf>, driver: MemoryDriver) -> Self {
        self.drivers.lock().insert(locator.into(), Arc::new(driver));
        self
    }

    /// Driver served for `locator`, for inspecting session counts
    #[must_use]
    pub fn driver(&self, locator: &Path) -> Option<Arc<MemoryDriver>> {
        self.drivers.lock().get(locator).cloned()
    }

    /// How many times `load` was called
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl DriverLoader for MemoryLoader {
    fn load(&self, locator: &Path) -> TokenResult<Arc<dyn TokenDriver>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let driver = self.driver(locator).ok_or_else(|| {
            TokenError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no driver configuration at {}", locator.display()),
            ))
        })?;
        Ok(driver as Arc<dyn TokenDriver>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIG_CERT: &[u8] = include_bytes!("../../tests/fixtures/sig-key.der");

    fn store() -> MemoryKeyStore {
        MemoryKeyStore::new()
            .with_key("sig-key", SIG_CERT)
            .with_certificate_only("cert-only", SIG_CERT)
            .with_private_key_only("key-only")
    }

    #[test]
    fn lists_aliases_in_insertion_order() {
        let token = MemoryToken::open(store());
        assert_eq!(
            token.list_aliases().unwrap(),
            vec!["sig-key", "cert-only", "key-only"]
        );
        assert!(token.contains_alias("key-only").unwrap());
        assert!(!token.contains_alias("missing").unwrap());
    }

    #[test]
    fn absent_material_is_none() {
        let token = MemoryToken::open(store());
        assert!(token.certificate("key-only").unwrap().is_none());
        assert!(token.private_key_handle("cert-only").unwrap().is_none());
        assert!(token.certificate("missing").unwrap().is_none());
    }

    #[test]
    fn handles_resolve_only_in_their_session() {
        let first = MemoryToken::open(store());
        let second = MemoryToken::open(store());
        let handle = first.private_key_handle("sig-key").unwrap().unwrap();

        assert_eq!(first.resolve(&handle).unwrap(), "sig-key");
        assert!(matches!(
            second.resolve(&handle),
            Err(TokenError::UnknownHandle(_))
        ));
    }

    #[test]
    fn failing_alias_errors() {
        let token = MemoryToken::open(MemoryKeyStore::new().with_failing_alias("broken"));
        assert!(matches!(token.certificate("broken"), Err(TokenError::Pkcs11(_))));
        assert!(token.contains_alias("broken").unwrap());
    }

    #[test]
    fn driver_checks_pin() {
        let driver = MemoryDriver::new("sim", store()).with_pin("1234");
        assert!(matches!(
            driver.open_session(Some(&Pin::new("0000"))),
            Err(TokenError::Authentication(_))
        ));
        assert!(matches!(
            driver.open_session(None),
            Err(TokenError::Authentication(_))
        ));
        assert!(driver.open_session(Some(&Pin::new("1234"))).is_ok());
        assert_eq!(driver.sessions_opened(), 1);
    }

    #[test]
    fn loader_reports_missing_locator() {
        let loader = MemoryLoader::new();
        assert!(matches!(
            loader.load(Path::new("/virtual/none.toml")),
            Err(TokenError::Io(_))
        ));
        assert_eq!(loader.load_count(), 1);
    }
}
