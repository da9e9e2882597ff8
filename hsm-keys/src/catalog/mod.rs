//! Key material catalog
//!
//! Turns an open token session plus optional alias configuration into a fixed,
//! ordered set of [`KeyDescriptor`]s.

mod descriptor;
mod jwk;
mod key_catalog;

pub use descriptor::{KeyAlgorithm, KeyDescriptor, KeyId, KeyStatus, KeyType, KeyUse};
pub use jwk::{Jwk, JwkSet};
pub use key_catalog::{classify_alias, AliasSelection, KeyCatalog};
