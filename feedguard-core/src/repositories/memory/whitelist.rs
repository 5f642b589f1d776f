// File: feedguard-core/src/repositories/memory/whitelist.rs
//
// In-memory whitelist/collection store. The serialised `StoreSnapshot` is
// the persisted blob; the filtering core only ever sees it through the
// `WhitelistStore` trait.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

use feedguard_common::models::{Collection, FilterSettings, ImportMode, StoreEvent, SubscriptionId};
use feedguard_common::traits::WhitelistStore;
use crate::Error;

pub const DEFAULT_COLLECTION: &str = "default";
pub const MAX_USERNAME_LEN: usize = 32;
const SNAPSHOT_VERSION: u32 = 1;

/// The whole persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub version: u32,
    pub active_collection: String,
    #[serde(default)]
    pub settings: FilterSettings,
    pub collections: Vec<Collection>,
}

struct CollectionEntry {
    users: HashSet<String>,
    created_at: DateTime<Utc>,
}

impl CollectionEntry {
    fn new() -> Self {
        Self { users: HashSet::new(), created_at: Utc::now() }
    }

    fn to_model(&self, name: &str) -> Collection {
        Collection {
            name: name.to_string(),
            users: self.users.iter().cloned().collect::<BTreeSet<_>>(),
            created_at: self.created_at,
        }
    }
}

struct StoreData {
    collections: HashMap<String, CollectionEntry>,
    active: String,
    settings: FilterSettings,
}

impl StoreData {
    fn active_entry(&self) -> Result<&CollectionEntry, Error> {
        self.collections
            .get(&self.active)
            .ok_or_else(|| Error::Store(format!("active collection '{}' is missing", self.active)))
    }

    fn active_entry_mut(&mut self) -> Result<&mut CollectionEntry, Error> {
        let active = self.active.clone();
        self.collections
            .get_mut(&active)
            .ok_or_else(|| Error::Store(format!("active collection '{}' is missing", active)))
    }
}

/// Trim and lowercase; rejects empty names and names over 32 characters.
pub fn normalize_username(raw: &str) -> Result<String, Error> {
    let name = raw.trim().to_lowercase();
    if name.is_empty() {
        return Err(Error::Validation("username is empty".into()));
    }
    if name.chars().count() > MAX_USERNAME_LEN {
        return Err(Error::Validation(format!(
            "username '{}' is longer than {} characters",
            name, MAX_USERNAME_LEN
        )));
    }
    Ok(name)
}

fn normalize_collection_name(raw: &str) -> Result<String, Error> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(Error::Validation("collection name is empty".into()));
    }
    Ok(name.to_string())
}

pub struct MemoryWhitelistStore {
    data: RwLock<StoreData>,
    subscribers: Mutex<HashMap<u64, UnboundedSender<StoreEvent>>>,
    next_subscription: AtomicU64,
}

impl Default for MemoryWhitelistStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWhitelistStore {
    /// A store holding one empty `"default"` collection and default settings.
    pub fn new() -> Self {
        let mut collections = HashMap::new();
        collections.insert(DEFAULT_COLLECTION.to_string(), CollectionEntry::new());
        Self {
            data: RwLock::new(StoreData {
                collections,
                active: DEFAULT_COLLECTION.to_string(),
                settings: FilterSettings::default(),
            }),
            subscribers: Mutex::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    /// Convenience for tests and the CLI: default collection pre-filled.
    pub fn with_users<I, S>(users: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let store = Self::new();
        {
            let mut data = store.data.write();
            let entry = data.active_entry_mut()?;
            for user in users {
                entry.users.insert(normalize_username(user.as_ref())?);
            }
        }
        Ok(store)
    }

    fn publish(&self, event: StoreEvent) {
        let mut subs = self.subscribers.lock();
        let before = subs.len();
        subs.retain(|_, tx| tx.send(event.clone()).is_ok());
        let dropped = before - subs.len();
        if dropped > 0 {
            debug!("Dropped {} closed store subscribers", dropped);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    // ----- users in the active collection -----

    /// Returns false if the user was already present.
    pub fn add_user(&self, username: &str) -> Result<bool, Error> {
        let name = normalize_username(username)?;
        let (added, collection) = {
            let mut data = self.data.write();
            let added = data.active_entry_mut()?.users.insert(name.clone());
            (added, data.active.clone())
        };
        if added {
            info!("Whitelisted '{}' in '{}'", name, collection);
            self.publish(StoreEvent::UserAdded { collection, username: name });
        }
        Ok(added)
    }

    /// Returns false if the user was not present.
    pub fn remove_user(&self, username: &str) -> Result<bool, Error> {
        let name = normalize_username(username)?;
        let (removed, collection) = {
            let mut data = self.data.write();
            let removed = data.active_entry_mut()?.users.remove(&name);
            (removed, data.active.clone())
        };
        if removed {
            info!("Removed '{}' from '{}'", name, collection);
            self.publish(StoreEvent::UserRemoved { collection, username: name });
        }
        Ok(removed)
    }

    /// Empty the active collection. Returns how many users were removed.
    pub fn clear_whitelist(&self) -> Result<usize, Error> {
        let (count, collection) = {
            let mut data = self.data.write();
            let entry = data.active_entry_mut()?;
            let count = entry.users.len();
            entry.users.clear();
            (count, data.active.clone())
        };
        info!("Cleared {} users from '{}'", count, collection);
        self.publish(StoreEvent::WhitelistCleared { collection });
        Ok(count)
    }

    /// Sorted users of the active collection.
    pub fn users(&self) -> Result<Vec<String>, Error> {
        let data = self.data.read();
        let mut users: Vec<String> = data.active_entry()?.users.iter().cloned().collect();
        users.sort();
        Ok(users)
    }

    // ----- collections -----

    pub fn create_collection(&self, name: &str) -> Result<(), Error> {
        let name = normalize_collection_name(name)?;
        let mut data = self.data.write();
        if data.collections.contains_key(&name) {
            return Err(Error::Validation(format!("collection '{}' already exists", name)));
        }
        data.collections.insert(name.clone(), CollectionEntry::new());
        info!("Created collection '{}'", name);
        Ok(())
    }

    /// The active collection and the last remaining one cannot be deleted.
    pub fn delete_collection(&self, name: &str) -> Result<(), Error> {
        let mut data = self.data.write();
        if !data.collections.contains_key(name) {
            return Err(Error::NotFound(format!("collection '{}'", name)));
        }
        if data.active == name {
            return Err(Error::Validation(format!("cannot delete the active collection '{}'", name)));
        }
        if data.collections.len() == 1 {
            return Err(Error::Validation("cannot delete the last collection".into()));
        }
        data.collections.remove(name);
        info!("Deleted collection '{}'", name);
        Ok(())
    }

    pub fn rename_collection(&self, from: &str, to: &str) -> Result<(), Error> {
        let to = normalize_collection_name(to)?;
        let mut data = self.data.write();
        if data.collections.contains_key(&to) {
            return Err(Error::Validation(format!("collection '{}' already exists", to)));
        }
        let entry = data
            .collections
            .remove(from)
            .ok_or_else(|| Error::NotFound(format!("collection '{}'", from)))?;
        data.collections.insert(to.clone(), entry);
        if data.active == from {
            data.active = to.clone();
        }
        info!("Renamed collection '{}' to '{}'", from, to);
        Ok(())
    }

    /// Make `name` the active collection. Returns false if it already was.
    pub fn switch_collection(&self, name: &str) -> Result<bool, Error> {
        let from = {
            let mut data = self.data.write();
            if !data.collections.contains_key(name) {
                return Err(Error::NotFound(format!("collection '{}'", name)));
            }
            if data.active == name {
                return Ok(false);
            }
            std::mem::replace(&mut data.active, name.to_string())
        };
        info!("Switched active collection from '{}' to '{}'", from, name);
        self.publish(StoreEvent::CollectionSwitched { from, to: name.to_string() });
        Ok(true)
    }

    /// All collections, sorted by name.
    pub fn collections(&self) -> Vec<Collection> {
        let data = self.data.read();
        let mut out: Vec<Collection> = data
            .collections
            .iter()
            .map(|(name, entry)| entry.to_model(name))
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn active_collection(&self) -> String {
        self.data.read().active.clone()
    }

    // ----- settings -----

    pub fn settings(&self) -> FilterSettings {
        self.data.read().settings
    }

    /// Replace the settings; subscribers are only told about real changes.
    pub fn set_settings(&self, settings: FilterSettings) {
        let changed = {
            let mut data = self.data.write();
            let changed = data.settings != settings;
            data.settings = settings;
            changed
        };
        if changed {
            info!("Filter settings changed: {:?}", settings);
            self.publish(StoreEvent::SettingsChanged(settings));
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        let mut s = self.settings();
        s.enabled = enabled;
        self.set_settings(s);
    }

    pub fn set_hard_hide(&self, hard_hide: bool) {
        let mut s = self.settings();
        s.hard_hide = hard_hide;
        self.set_settings(s);
    }

    pub fn set_show_all_temporary(&self, show_all: bool) {
        let mut s = self.settings();
        s.show_all_temporary = show_all;
        self.set_settings(s);
    }

    // ----- import / export -----

    pub fn snapshot(&self) -> StoreSnapshot {
        let (active, settings) = {
            let data = self.data.read();
            (data.active.clone(), data.settings)
        };
        StoreSnapshot {
            version: SNAPSHOT_VERSION,
            active_collection: active,
            settings,
            collections: self.collections(),
        }
    }

    pub fn export_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    /// Load an exported blob. `Replace` swaps the whole state (collections,
    /// active collection and settings); `Merge` unions users into
    /// same-named collections and adds missing ones, leaving the active
    /// collection and settings alone. Nothing changes if validation fails.
    pub fn import_json(&self, json: &str, mode: ImportMode) -> Result<(), Error> {
        let snapshot: StoreSnapshot = serde_json::from_str(json)?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(Error::Validation(format!(
                "unsupported export version {}",
                snapshot.version
            )));
        }

        let mut incoming: HashMap<String, CollectionEntry> = HashMap::new();
        for collection in &snapshot.collections {
            let name = normalize_collection_name(&collection.name)?;
            let entry = incoming.entry(name).or_insert_with(|| CollectionEntry {
                users: HashSet::new(),
                created_at: collection.created_at,
            });
            for user in &collection.users {
                entry.users.insert(normalize_username(user)?);
            }
        }

        {
            let mut data = self.data.write();
            match mode {
                ImportMode::Replace => {
                    if incoming.is_empty() {
                        return Err(Error::Validation("export contains no collections".into()));
                    }
                    if !incoming.contains_key(&snapshot.active_collection) {
                        return Err(Error::Validation(format!(
                            "active collection '{}' is not in the export",
                            snapshot.active_collection
                        )));
                    }
                    data.collections = incoming;
                    data.active = snapshot.active_collection.clone();
                    data.settings = snapshot.settings;
                }
                ImportMode::Merge => {
                    for (name, entry) in incoming {
                        match data.collections.get_mut(&name) {
                            Some(existing) => existing.users.extend(entry.users),
                            None => {
                                data.collections.insert(name, entry);
                            }
                        }
                    }
                }
            }
        }
        info!("Imported {} collections ({:?})", snapshot.collections.len(), mode);
        self.publish(StoreEvent::Imported);
        Ok(())
    }
}

impl WhitelistStore for MemoryWhitelistStore {
    fn is_whitelisted(&self, username: &str) -> Result<bool, Error> {
        let name = username.trim().to_lowercase();
        let data = self.data.read();
        Ok(data.active_entry()?.users.contains(&name))
    }

    fn active_settings(&self) -> Result<FilterSettings, Error> {
        Ok(self.settings())
    }

    fn subscribe(&self) -> (SubscriptionId, UnboundedReceiver<StoreEvent>) {
        let id = self.next_subscription.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().insert(id, tx);
        debug!("Store subscriber {} registered", id);
        (SubscriptionId(id), rx)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if self.subscribers.lock().remove(&id.0).is_some() {
            debug!("Store subscriber {} removed", id.0);
        }
    }
}
