// File: feedguard-core/src/context.rs
//
// One filtering session bound to one host document. Nothing is global;
// several contexts can run side by side.

use std::sync::Arc;
use tracing::debug;

use feedguard_common::models::{FilterAction, FilterStats};
use feedguard_common::traits::HostDom;
use crate::config::FilterConfig;
use crate::engine::{FilterEngine, Lifecycle};
use crate::repositories::MemoryWhitelistStore;
use crate::tasks::watcher::{locate_root, scan_messages};
use crate::Error;

/// A row of `FilterContext::report`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageReport {
    pub message_id: String,
    pub author: Option<String>,
    /// `None` until the engine has handled the message.
    pub action: Option<FilterAction>,
}

#[derive(Clone)]
pub struct FilterContext {
    pub engine: Arc<FilterEngine>,
    pub store: Arc<MemoryWhitelistStore>,
    dom: Arc<dyn HostDom>,
}

impl FilterContext {
    /// Context with an empty in-memory store.
    pub fn new(dom: Arc<dyn HostDom>, config: FilterConfig) -> Result<Self, Error> {
        Self::with_store(dom, Arc::new(MemoryWhitelistStore::new()), config)
    }

    pub fn with_store(
        dom: Arc<dyn HostDom>,
        store: Arc<MemoryWhitelistStore>,
        config: FilterConfig,
    ) -> Result<Self, Error> {
        let engine = FilterEngine::new(dom.clone(), store.clone(), config)?;
        Ok(Self { engine, store, dom })
    }

    pub async fn initialize(&self) {
        self.engine.initialize().await;
    }

    pub fn shutdown(&self) {
        self.engine.shutdown();
    }

    pub async fn refresh_all(&self) {
        self.engine.refresh_all().await;
    }

    pub fn clear_all(&self) {
        self.engine.clear_all();
    }

    pub fn stats(&self) -> FilterStats {
        self.engine.stats()
    }

    pub fn reset_stats(&self) {
        self.engine.reset_stats();
    }

    pub fn is_enabled(&self) -> bool {
        self.engine.is_enabled()
    }

    pub fn is_running(&self) -> bool {
        self.engine.lifecycle() == Lifecycle::Running
    }

    pub fn set_toggle(&self, message_id: &str, visible: bool) -> bool {
        self.engine.set_toggle(message_id, visible)
    }

    pub fn get_toggle(&self, message_id: &str) -> Option<bool> {
        self.engine.get_toggle(message_id)
    }

    pub fn expand(&self, message_id: &str) -> bool {
        self.engine.expand(message_id)
    }

    pub fn clear_toggles(&self) {
        self.engine.clear_toggles();
    }

    /// Every rendered message in document order with its cached author and
    /// the action currently applied to it.
    pub fn report(&self) -> Vec<MessageReport> {
        let selectors = &self.engine.config().selectors;
        let root = locate_root(self.dom.as_ref(), selectors);
        let rows: Vec<MessageReport> = scan_messages(self.dom.as_ref(), selectors, root)
            .into_iter()
            .filter_map(|node| {
                let message_id = self.dom.attribute(node, &selectors.message_id_attr)?;
                let author = self
                    .engine
                    .cached_result(&message_id)
                    .and_then(|r| r.username);
                Some(MessageReport {
                    action: self.engine.applied_action(&message_id),
                    message_id,
                    author,
                })
            })
            .collect();
        debug!("Report covers {} messages", rows.len());
        rows
    }
}
