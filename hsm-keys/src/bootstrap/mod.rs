//! Token session bootstrap
//!
//! Drivers are process-global resources: a PKCS#11 module is initialized once per
//! process and shared by every session on it. [`ProviderRegistry`] holds them
//! and [`TokenSessionBootstrap`] opens sessions through it.

mod registry;
mod session;

pub use registry::{ProviderRegistry, TokenIdentity};
pub use session::TokenSessionBootstrap;
