// File: feedguard-core/src/repositories/mod.rs

pub mod memory;

pub use memory::{MemoryWhitelistStore, StoreSnapshot};
