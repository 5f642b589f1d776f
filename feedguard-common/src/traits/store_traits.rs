use tokio::sync::mpsc::UnboundedReceiver;
use crate::error::Error;
use crate::models::collection::{StoreEvent, SubscriptionId};
use crate::models::settings::FilterSettings;

/// Read side of the whitelist/collection store, as consumed by the core.
///
/// Both lookups are expected to be fast in-memory reads; the engine calls
/// them from inside its per-message loop.
pub trait WhitelistStore: Send + Sync {
    /// Case-insensitive membership test against the active collection.
    fn is_whitelisted(&self, username: &str) -> Result<bool, Error>;

    fn active_settings(&self) -> Result<FilterSettings, Error>;

    fn subscribe(&self) -> (SubscriptionId, UnboundedReceiver<StoreEvent>);

    fn unsubscribe(&self, id: SubscriptionId);
}
