//! In-process token simulation for tests and local development

mod memory_token;

pub use memory_token::{MemoryDriver, MemoryKeyStore, MemoryLoader, MemoryToken};
