//! Host-facing key provider and factory

mod factory;
mod hsm_provider;

pub use factory::{HsmKeyProviderFactory, KeyProviderFactory, ProviderFactoryRegistry};
pub use hsm_provider::{HsmKeyProvider, KeyProvider};
