// Integration tests for HSM key provider activation against a simulated token
#![cfg(feature = "simulation")]

use hsm_keys::{
    HsmKeyProviderFactory, KeyProvider, KeyProviderError, KeyProviderFactory, KeyUse,
    MemoryDriver, MemoryKeyStore, MemoryLoader, ProviderConfig, ProviderRegistry, TokenError,
    TokenSessionBootstrap,
};
use std::collections::HashMap;
use std::sync::Arc;

const LOCATOR: &str = "/virtual/activation/utimaco.toml";
const PIN: &str = "123456";

const SIG_CERT: &[u8] = include_bytes!("fixtures/sig-key.der");
const ENC_CERT: &[u8] = include_bytes!("fixtures/enc-key.der");
const OTHER_CERT: &[u8] = include_bytes!("fixtures/other.der");

fn three_key_token() -> MemoryKeyStore {
    MemoryKeyStore::new()
        .with_key("sig-key", SIG_CERT)
        .with_key("enc-key", ENC_CERT)
        .with_key("other", OTHER_CERT)
}

fn factory_for(store: MemoryKeyStore) -> (HsmKeyProviderFactory, Arc<MemoryLoader>) {
    let loader = Arc::new(MemoryLoader::new().with_driver(
        LOCATOR,
        MemoryDriver::new("PKCS11-UtimacoHSM", store).with_pin(PIN),
    ));
    let bootstrap = TokenSessionBootstrap::new(Arc::new(ProviderRegistry::new()), loader.clone());
    let factory = HsmKeyProviderFactory::new(LOCATOR, bootstrap).unwrap();
    (factory, loader)
}

fn aliases_and_uses(provider: &dyn KeyProvider) -> Vec<(String, KeyUse)> {
    provider
        .keys()
        .unwrap()
        .iter()
        .map(|d| (d.alias().to_string(), d.key_use()))
        .collect()
}

#[test]
fn test_explicit_signing_alias_only() {
    let (factory, _) = factory_for(three_key_token());
    let config = ProviderConfig::default().with_pin(PIN).with_sig_alias("sig-key");

    let provider = factory.create(&config).unwrap();
    assert_eq!(
        aliases_and_uses(provider.as_ref()),
        vec![("sig-key".to_string(), KeyUse::Signing)]
    );
}

#[test]
fn test_fallback_inference_over_all_aliases() {
    let (factory, _) = factory_for(three_key_token());
    let config = ProviderConfig::default().with_pin(PIN);

    let provider = factory.create(&config).unwrap();
    assert_eq!(
        aliases_and_uses(provider.as_ref()),
        vec![
            ("sig-key".to_string(), KeyUse::Signing),
            ("enc-key".to_string(), KeyUse::Encryption),
            ("other".to_string(), KeyUse::Signing),
        ]
    );
}

#[test]
fn test_nonexistent_signing_alias_falls_back_to_inference() {
    let (factory, _) = factory_for(three_key_token());
    let config = ProviderConfig::default()
        .with_pin(PIN)
        .with_sig_alias("nonexistent");

    let provider = factory.create(&config).unwrap();
    assert_eq!(provider.keys().unwrap().len(), 3);
}

#[test]
fn test_host_properties_drive_selection() {
    let (factory, _) = factory_for(three_key_token());
    let mut props = HashMap::new();
    props.insert("pin".to_string(), PIN.to_string());
    props.insert("sigAlias".to_string(), String::new());
    props.insert("encAlias".to_string(), "enc-key".to_string());

    let provider = factory
        .activate(&ProviderConfig::from_properties(&props))
        .unwrap();
    assert!(provider.signing_key().unwrap().is_none());
    assert_eq!(provider.encryption_key().unwrap().unwrap().alias(), "enc-key");
}

#[test]
fn test_repeated_activation_is_deterministic() {
    let (factory, loader) = factory_for(three_key_token());
    let config = ProviderConfig::default().with_pin(PIN);

    let first = factory.activate(&config).unwrap();
    let second = factory.activate(&config).unwrap();

    let fingerprint = |p: &hsm_keys::HsmKeyProvider| {
        p.keys()
            .unwrap()
            .iter()
            .map(|d| {
                (
                    d.alias().to_string(),
                    d.key_use(),
                    d.key_id().clone(),
                    d.algorithm(),
                )
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(fingerprint(&first), fingerprint(&second));

    // Two sessions, one driver registration
    assert_eq!(loader.load_count(), 1);
    assert_ne!(first.store().session_id(), second.store().session_id());
}

#[test]
fn test_missing_certificate_aborts_activation() {
    let store = MemoryKeyStore::new()
        .with_key("sig-key", SIG_CERT)
        .with_private_key_only("broken-enc");
    let (factory, _) = factory_for(store);

    let err = factory
        .create(&ProviderConfig::default().with_pin(PIN))
        .err()
        .expect("activation must fail");

    assert!(err.is_key_selection_failure());
    match err {
        KeyProviderError::KeyLoadFailure { alias, .. } => assert_eq!(alias, "broken-enc"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_trusted_certificate_entry_does_not_abort_activation() {
    let store = MemoryKeyStore::new()
        .with_certificate_only("ca-root", OTHER_CERT)
        .with_key("sig-key", SIG_CERT)
        .with_key("enc-key", ENC_CERT);
    let (factory, _) = factory_for(store);

    let provider = factory
        .activate(&ProviderConfig::default().with_pin(PIN))
        .unwrap();
    assert_eq!(provider.keys().unwrap().len(), 3);
    assert_eq!(provider.signing_key().unwrap().unwrap().alias(), "sig-key");
    assert_eq!(provider.encryption_key().unwrap().unwrap().alias(), "enc-key");

    let root = &provider.keys().unwrap()[0];
    assert_eq!(root.alias(), "ca-root");
    assert!(root.private_key().is_none());
}

#[test]
fn test_wrong_pin_is_infrastructure_failure() {
    let (factory, _) = factory_for(three_key_token());
    let err = factory
        .create(&ProviderConfig::default().with_pin("000000"))
        .err()
        .expect("activation must fail");

    assert!(err.is_token_failure());
    assert!(matches!(
        err,
        KeyProviderError::TokenUnavailable {
            source: TokenError::Authentication(_),
            ..
        }
    ));
}

#[test]
fn test_jwks_publication_matches_descriptors() {
    let (factory, _) = factory_for(three_key_token());
    let provider = factory
        .activate(&ProviderConfig::default().with_pin(PIN))
        .unwrap();

    let jwks = provider.jwks().unwrap();
    let kids: Vec<_> = jwks.keys.iter().map(|k| k.kid.as_str()).collect();
    let expected: Vec<_> = provider
        .keys()
        .unwrap()
        .iter()
        .map(|d| d.key_id().as_str())
        .collect();
    assert_eq!(kids, expected);
}

#[test]
fn test_close_makes_provider_unusable() {
    let (factory, _) = factory_for(three_key_token());
    let provider = factory
        .activate(&ProviderConfig::default().with_pin(PIN))
        .unwrap();

    provider.close();
    assert!(matches!(provider.keys(), Err(KeyProviderError::CatalogClosed)));
    assert!(matches!(
        provider.signing_key(),
        Err(KeyProviderError::CatalogClosed)
    ));
}
