//! PKCS#11 token support

#[cfg(feature = "pkcs11")]
mod pkcs11_token;

#[cfg(feature = "pkcs11")]
pub use pkcs11_token::{Pkcs11Driver, Pkcs11Loader, Pkcs11Token};
