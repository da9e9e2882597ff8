//! PKCS#11 driver, loader and session store

use crate::config::{DriverConfig, Pin};
use crate::error::{TokenError, TokenResult};
use crate::token::{
    Certificate, DriverLoader, PrivateKeyHandle, SessionId, TokenDriver, TokenStore,
};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

use cryptoki::{
    context::{CInitializeArgs, Pkcs11},
    error::{Error as CryptokiError, RvError},
    object::{Attribute, AttributeType, ObjectClass, ObjectHandle},
    session::{Session, UserType},
    slot::Slot,
    types::AuthPin,
};

/// Loads a PKCS#11 module described by a driver configuration file
#[derive(Debug, Default, Clone, Copy)]
pub struct Pkcs11Loader;

impl DriverLoader for Pkcs11Loader {
    fn load(&self, locator: &Path) -> TokenResult<Arc<dyn TokenDriver>> {
        let config = DriverConfig::load(locator)?;
        let driver = Pkcs11Driver::new(&config)?;
        Ok(Arc::new(driver) as Arc<dyn TokenDriver>)
    }
}

/// An initialized PKCS#11 module bound to one slot
pub struct Pkcs11Driver {
    name: String,
    ctx: Pkcs11,
    slot: Slot,
}

impl Pkcs11Driver {
    /// Load and initialize the module, then resolve the configured slot
    pub fn new(config: &DriverConfig) -> TokenResult<Self> {
        let ctx = Pkcs11::new(&config.library).map_err(|e| {
            TokenError::Pkcs11(format!(
                "Failed to load library {}: {}",
                config.library.display(),
                e
            ))
        })?;

        ctx.initialize(CInitializeArgs::OsThreads)
            .map_err(|e| TokenError::Pkcs11(format!("Failed to initialize: {}", e)))?;

        let slot = Self::select_slot(&ctx, config)?;

        tracing::info!(
            target: "hsm::keys",
            provider = %config.provider_name(),
            slot = slot.id(),
            "PKCS#11 module loaded"
        );

        Ok(Self {
            name: config.provider_name(),
            ctx,
            slot,
        })
    }

    fn select_slot(ctx: &Pkcs11, config: &DriverConfig) -> TokenResult<Slot> {
        let slots = ctx
            .get_slots_with_token()
            .map_err(|e| TokenError::Pkcs11(format!("Failed to get slots: {}", e)))?;

        if let Some(id) = config.slot {
            return slots
                .into_iter()
                .find(|s| s.id() == id)
                .ok_or_else(|| TokenError::SlotNotFound(format!("slot id {}", id)));
        }

        if let Some(label) = &config.token_label {
            for slot in &slots {
                let info = ctx
                    .get_token_info(*slot)
                    .map_err(|e| TokenError::Pkcs11(format!("Failed to get token info: {}", e)))?;
                if info.label().trim() == label.as_str() {
                    return Ok(*slot);
                }
            }
            return Err(TokenError::SlotNotFound(format!("token label '{}'", label)));
        }

        slots.get(config.slot_index).copied().ok_or_else(|| {
            TokenError::SlotNotFound(format!(
                "Slot {} not found. {} slot(s) available.",
                config.slot_index,
                slots.len()
            ))
        })
    }
}

impl TokenDriver for Pkcs11Driver {
    fn name(&self) -> &str {
        &self.name
    }

    fn open_session(&self, pin: Option<&Pin>) -> TokenResult<Arc<dyn TokenStore>> {
        let session = self
            .ctx
            .open_ro_session(self.slot)
            .map_err(|e| TokenError::Pkcs11(format!("Failed to open session: {}", e)))?;

        if let Some(pin) = pin {
            let auth_pin = AuthPin::new(pin.expose().to_string());
            match session.login(UserType::User, Some(&auth_pin)) {
                Ok(()) => {}
                // Login state is per token, an earlier session may already hold it
                Err(CryptokiError::Pkcs11(RvError::UserAlreadyLoggedIn, ..)) => {
                    tracing::debug!(
                        target: "hsm::keys",
                        provider = %self.name,
                        "token already logged in"
                    );
                }
                Err(e) => return Err(TokenError::Authentication(e.to_string())),
            }
        }

        Ok(Arc::new(Pkcs11Token::new(session)) as Arc<dyn TokenStore>)
    }
}

/// One logged-in PKCS#11 session.
///
/// Aliases are the labels of certificate objects. Private key handles index a
/// per-session table of object handles, so nothing but that index leaves the store.
pub struct Pkcs11Token {
    id: SessionId,
    session: Mutex<Session>,
    keys: Mutex<Vec<ObjectHandle>>,
}

impl Pkcs11Token {
    fn new(session: Session) -> Self {
        Self {
            id: SessionId::next(),
            session: Mutex::new(session),
            keys: Mutex::new(Vec::new()),
        }
    }

    /// Run `op` against the session and the key object behind `handle`.
    ///
    /// This is the only way to reach the private key; signing or decryption is done
    /// by the token inside `op`.
    pub fn with_private_key<R>(
        &self,
        handle: &PrivateKeyHandle,
        op: impl FnOnce(&Session, ObjectHandle) -> R,
    ) -> TokenResult<R> {
        if !handle.belongs_to(self.id) {
            return Err(TokenError::UnknownHandle(format!(
                "{:?} was issued by another session",
                handle
            )));
        }
        let object = self
            .keys
            .lock()
            .get(handle.index() as usize)
            .copied()
            .ok_or_else(|| TokenError::UnknownHandle(format!("{:?}", handle)))?;

        let session = self.session.lock();
        Ok(op(&session, object))
    }

    fn find_first(session: &Session, template: &[Attribute]) -> TokenResult<Option<ObjectHandle>> {
        let objects = session
            .find_objects(template)
            .map_err(|e| TokenError::Pkcs11(e.to_string()))?;
        Ok(objects.first().copied())
    }

    fn find_certificate(session: &Session, alias: &str) -> TokenResult<Option<ObjectHandle>> {
        Self::find_first(
            session,
            &[
                Attribute::Class(ObjectClass::CERTIFICATE),
                Attribute::Label(alias.as_bytes().to_vec()),
            ],
        )
    }
}

impl TokenStore for Pkcs11Token {
    fn session_id(&self) -> SessionId {
        self.id
    }

    fn list_aliases(&self) -> TokenResult<Vec<String>> {
        let session = self.session.lock();
        let objects = session
            .find_objects(&[Attribute::Class(ObjectClass::CERTIFICATE)])
            .map_err(|e| TokenError::Pkcs11(e.to_string()))?;

        let mut aliases: Vec<String> = Vec::new();
        for object in objects {
            let attrs = session
                .get_attributes(object, &[AttributeType::Label])
                .map_err(|e| TokenError::Pkcs11(e.to_string()))?;
            for attr in attrs {
                if let Attribute::Label(label) = attr {
                    let Some(label) = decode_label(label) else { continue };
                    if !aliases.contains(&label) {
                        aliases.push(label);
                    }
                }
            }
        }

        Ok(aliases)
    }

    fn contains_alias(&self, alias: &str) -> TokenResult<bool> {
        let session = self.session.lock();
        Ok(Self::find_certificate(&session, alias)?.is_some())
    }

    fn certificate(&self, alias: &str) -> TokenResult<Option<Certificate>> {
        let session = self.session.lock();
        let Some(object) = Self::find_certificate(&session, alias)? else {
            return Ok(None);
        };

        let attrs = session
            .get_attributes(object, &[AttributeType::Value])
            .map_err(|e| TokenError::Pkcs11(e.to_string()))?;

        attrs
            .into_iter()
            .find_map(|attr| match attr {
                Attribute::Value(der) => Some(der),
                _ => None,
            })
            .map(|der| Certificate::from_der(&der))
            .transpose()
    }

    fn private_key_handle(&self, alias: &str) -> TokenResult<Option<PrivateKeyHandle>> {
        let session = self.session.lock();

        // Pair by CKA_ID with the certificate, then fall back to a matching label
        let mut object = None;
        if let Some(cert) = Self::find_certificate(&session, alias)? {
            let attrs = session
                .get_attributes(cert, &[AttributeType::Id])
                .map_err(|e| TokenError::Pkcs11(e.to_string()))?;
            let id = attrs.into_iter().find_map(|attr| match attr {
                Attribute::Id(id) if !id.is_empty() => Some(id),
                _ => None,
            });
            if let Some(id) = id {
                object = Self::find_first(
                    &session,
                    &[Attribute::Class(ObjectClass::PRIVATE_KEY), Attribute::Id(id)],
                )?;
            }
        }
        if object.is_none() {
            object = Self::find_first(
                &session,
                &[
                    Attribute::Class(ObjectClass::PRIVATE_KEY),
                    Attribute::Label(alias.as_bytes().to_vec()),
                ],
            )?;
        }

        let Some(object) = object else {
            return Ok(None);
        };

        let mut keys = self.keys.lock();
        let index = match keys.iter().position(|k| *k == object) {
            Some(index) => index,
            None => {
                keys.push(object);
                keys.len() - 1
            }
        };
        Ok(Some(PrivateKeyHandle::new(self.id, index as u32)))
    }
}

/// Certificate labels are looked up by their exact bytes, so a label that is
/// not UTF-8 could never be found again by name and is not listed.
fn decode_label(label: Vec<u8>) -> Option<String> {
    match String::from_utf8(label) {
        Ok(label) => Some(label),
        Err(e) => {
            tracing::warn!(
                target: "hsm::keys",
                label = %hex::encode(e.as_bytes()),
                "skipping certificate with non UTF-8 label"
            );
            None
        }
    }
}
