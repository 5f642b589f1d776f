pub mod whitelist;

pub use whitelist::{MemoryWhitelistStore, StoreSnapshot};
