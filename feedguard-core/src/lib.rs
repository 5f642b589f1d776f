// src/lib.rs

pub mod config;
pub mod logging;
pub mod dom;
pub mod cache;
pub mod filter;
pub mod engine;
pub mod tasks;
pub mod repositories;
pub mod context;
pub mod console;
pub mod test_utils;

pub use feedguard_common::error::Error;
pub use config::{FilterConfig, HostSelectors};
pub use context::FilterContext;
pub use dom::MemoryDom;
pub use engine::FilterEngine;
pub use repositories::memory::MemoryWhitelistStore;
