//! Provider and driver configuration

use crate::error::{TokenError, TokenResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// Driver configuration used when the factory is not given an explicit locator
pub const DEFAULT_DRIVER_CONFIG: &str = "/etc/hsm-keys/pkcs11.toml";

/// Host configuration key for the token PIN
pub const PIN_PROPERTY: &str = "pin";
/// Host configuration key for the explicit signing alias
pub const SIG_ALIAS_PROPERTY: &str = "sigAlias";
/// Host configuration key for the explicit encryption alias
pub const ENC_ALIAS_PROPERTY: &str = "encAlias";

/// Token credential. Wiped on drop and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Pin(Zeroizing<String>);

impl Pin {
    pub fn new(pin: impl Into<String>) -> Self {
        Self(Zeroizing::new(pin.into()))
    }

    /// Borrow the PIN for a login call
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(***)")
    }
}

impl<'de> Deserialize<'de> for Pin {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Pin::new)
    }
}

/// Options recognized by the `hsm` key provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Credential for the token session
    #[serde(default, skip_serializing)]
    pub pin: Option<Pin>,

    /// Alias of the signing key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig_alias: Option<String>,

    /// Alias of the encryption key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enc_alias: Option<String>,
}

impl ProviderConfig {
    /// Build from the flat string map the host stores for a provider component.
    ///
    /// Blank values count as absent. Keys this provider does not know are ignored,
    /// they belong to the host (priority, enabled flags and so on).
    #[must_use]
    pub fn from_properties(properties: &HashMap<String, String>) -> Self {
        let get = |key: &str| {
            properties
                .get(key)
                .filter(|value| !value.trim().is_empty())
                .cloned()
        };

        Self {
            pin: get(PIN_PROPERTY).map(Pin::new),
            sig_alias: get(SIG_ALIAS_PROPERTY),
            enc_alias: get(ENC_ALIAS_PROPERTY),
        }
    }

    #[must_use]
    pub fn with_pin(mut self, pin: impl Into<String>) -> Self {
        self.pin = Some(Pin::new(pin));
        self
    }

    #[must_use]
    pub fn with_sig_alias(mut self, alias: impl Into<String>) -> Self {
        self.sig_alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn with_enc_alias(mut self, alias: impl Into<String>) -> Self {
        self.enc_alias = Some(alias.into());
        self
    }
}

/// How a configuration value is rendered in the host's admin UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Password,
    String,
}

/// Admin display metadata for one configuration option
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigProperty {
    pub name: &'static str,
    pub label: &'static str,
    pub help_text: &'static str,
    pub kind: PropertyKind,
}

/// The options offered to administrators, in display order
#[must_use]
pub fn config_properties() -> Vec<ConfigProperty> {
    vec![
        ConfigProperty {
            name: PIN_PROPERTY,
            label: "HSM PIN",
            help_text: "PIN for PKCS#11 session",
            kind: PropertyKind::Password,
        },
        ConfigProperty {
            name: SIG_ALIAS_PROPERTY,
            label: "Signing alias",
            help_text: "Alias for SIG key in HSM",
            kind: PropertyKind::String,
        },
        ConfigProperty {
            name: ENC_ALIAS_PROPERTY,
            label: "Encryption alias",
            help_text: "Alias for ENC key in HSM",
            kind: PropertyKind::String,
        },
    ]
}

/// Driver configuration file the token locator points at
///
/// ```toml
/// name = "UtimacoHSM"
/// library = "/opt/utimaco/lib/libcs_pkcs11_R3.so"
/// slot_index = 0
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Provider name, registered as `PKCS11-<name>`
    pub name: String,

    /// Path to the PKCS#11 module (.so/.dll)
    pub library: PathBuf,

    /// Explicit slot id (takes precedence over `slot_index` and `token_label`)
    #[serde(default)]
    pub slot: Option<u64>,

    /// Position among the slots that hold a token
    #[serde(default)]
    pub slot_index: usize,

    /// Select the slot whose token carries this label
    #[serde(default)]
    pub token_label: Option<String>,
}

impl DriverConfig {
    /// Read and parse a driver configuration file
    pub fn load(path: &Path) -> TokenResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    /// Parse driver configuration from TOML text
    pub fn parse(raw: &str) -> TokenResult<Self> {
        let config: DriverConfig =
            toml::from_str(raw).map_err(|e| TokenError::InvalidDriverConfig(e.to_string()))?;

        if config.name.trim().is_empty() {
            return Err(TokenError::InvalidDriverConfig(
                "name must not be empty".to_string(),
            ));
        }
        if config.library.as_os_str().is_empty() {
            return Err(TokenError::InvalidDriverConfig(
                "library must not be empty".to_string(),
            ));
        }

        Ok(config)
    }

    /// Name under which the configured provider is registered
    #[must_use]
    pub fn provider_name(&self) -> String {
        format!("PKCS11-{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_properties_reads_known_keys() {
        let mut props = HashMap::new();
        props.insert("pin".to_string(), "1234".to_string());
        props.insert("sigAlias".to_string(), "sig-key".to_string());
        props.insert("priority".to_string(), "100".to_string());

        let config = ProviderConfig::from_properties(&props);
        assert_eq!(config.pin.as_ref().map(Pin::expose), Some("1234"));
        assert_eq!(config.sig_alias.as_deref(), Some("sig-key"));
        assert!(config.enc_alias.is_none());
    }

    #[test]
    fn test_blank_properties_are_absent() {
        let mut props = HashMap::new();
        props.insert("pin".to_string(), String::new());
        props.insert("encAlias".to_string(), "   ".to_string());

        let config = ProviderConfig::from_properties(&props);
        assert!(config.pin.is_none());
        assert!(config.enc_alias.is_none());
    }

    #[test]
    fn test_pin_is_redacted() {
        let config = ProviderConfig::default().with_pin("987654");
        let debug = format!("{config:?}");
        assert!(!debug.contains("987654"));
        assert!(debug.contains("Pin(***)"));

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("987654"));
    }

    #[test]
    fn test_provider_config_json_keys() {
        let config: ProviderConfig =
            serde_json::from_str(r#"{"pin":"0000","sigAlias":"a","encAlias":"b"}"#).unwrap();
        assert_eq!(config.pin.map(|p| p.expose().to_string()), Some("0000".to_string()));
        assert_eq!(config.sig_alias.as_deref(), Some("a"));
        assert_eq!(config.enc_alias.as_deref(), Some("b"));
    }

    #[test]
    fn test_config_properties_order_and_kinds() {
        let props = config_properties();
        let names: Vec<_> = props.iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["pin", "sigAlias", "encAlias"]);
        assert_eq!(props[0].kind, PropertyKind::Password);
        assert_eq!(props[1].kind, PropertyKind::String);
    }

    #[test]
    fn test_driver_config_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name = \"UtimacoHSM\"").unwrap();
        writeln!(file, "library = \"/opt/utimaco/lib/libcs_pkcs11_R3.so\"").unwrap();
        writeln!(file, "slot_index = 1").unwrap();

        let config = DriverConfig::load(file.path()).unwrap();
        assert_eq!(config.name, "UtimacoHSM");
        assert_eq!(config.slot_index, 1);
        assert!(config.slot.is_none());
        assert_eq!(config.provider_name(), "PKCS11-UtimacoHSM");
    }

    #[test]
    fn test_driver_config_missing_file() {
        let err = DriverConfig::load(Path::new("/nonexistent/hsm/driver.toml")).unwrap_err();
        assert!(matches!(err, TokenError::Io(_)));
    }

    #[test]
    fn test_driver_config_malformed() {
        let err = DriverConfig::parse("library = ").unwrap_err();
        assert!(matches!(err, TokenError::InvalidDriverConfig(_)));

        let err = DriverConfig::parse("name = \"\"\nlibrary = \"/x.so\"").unwrap_err();
        assert!(matches!(err, TokenError::InvalidDriverConfig(_)));
    }
}
