// File: feedguard-common/src/models/mod.rs
pub mod settings;
pub mod filter;
pub mod marker;
pub mod dom;
pub mod collection;

pub use settings::{DisplayMode, FilterSettings};
pub use filter::{FilterAction, FilterResult, FilterStats};
pub use marker::Marker;
pub use dom::{MutationRecord, NodeId, ObserverId};
pub use collection::{Collection, ImportMode, StoreEvent, SubscriptionId};
