// File: feedguard-common/src/traits/mod.rs
pub mod dom_traits;
pub mod store_traits;

pub use dom_traits::HostDom;
pub use store_traits::WhitelistStore;
