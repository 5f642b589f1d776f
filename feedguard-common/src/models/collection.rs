use std::collections::BTreeSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::models::settings::FilterSettings;

/// One named whitelist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub name: String,
    /// Normalised (trimmed, lowercased) usernames.
    pub users: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

/// How `import_json` combines incoming data with what is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    Replace,
    Merge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Change notifications published by the whitelist store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    UserAdded { collection: String, username: String },
    UserRemoved { collection: String, username: String },
    WhitelistCleared { collection: String },
    CollectionSwitched { from: String, to: String },
    SettingsChanged(FilterSettings),
    Imported,
}

impl StoreEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            StoreEvent::UserAdded { .. } => "user_added",
            StoreEvent::UserRemoved { .. } => "user_removed",
            StoreEvent::WhitelistCleared { .. } => "whitelist_cleared",
            StoreEvent::CollectionSwitched { .. } => "collection_switched",
            StoreEvent::SettingsChanged(_) => "settings_changed",
            StoreEvent::Imported => "imported",
        }
    }
}
