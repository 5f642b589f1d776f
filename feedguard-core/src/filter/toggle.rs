// File: feedguard-core/src/filter/toggle.rs

use dashmap::DashMap;

/// Session-scoped per-message visibility overrides, keyed by message id.
///
/// Nothing here is persisted; a page reload starts empty.
#[derive(Debug, Default)]
pub struct ToggleRegistry {
    overrides: DashMap<String, bool>,
}

impl ToggleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` forces the message visible; `false` defers to the policy.
    pub fn set(&self, message_id: &str, visible: bool) {
        self.overrides.insert(message_id.to_string(), visible);
    }

    /// `None` means "no override".
    pub fn get(&self, message_id: &str) -> Option<bool> {
        self.overrides.get(message_id).map(|v| *v)
    }

    pub fn remove(&self, message_id: &str) -> Option<bool> {
        self.overrides.remove(message_id).map(|(_, v)| v)
    }

    pub fn clear(&self) {
        self.overrides.clear();
    }

    /// Ids that currently carry an override.
    pub fn ids(&self) -> Vec<String> {
        self.overrides.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}
