// File: feedguard-core/src/engine/mod.rs

//! The filtering engine: resolves each rendered message to an author,
//! decides its visibility and applies that decision to the host DOM.
//!
//! All engine state lives behind one mutex, and every per-message
//! resolve+apply runs with it held. Lifecycle and generation checks happen
//! under the same lock, so `shutdown` and `refresh_all` serialise with any
//! in-flight work instead of racing it.

pub mod apply;

use std::collections::HashSet;
use std::sync::{Arc, Weak};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use feedguard_common::models::{
    FilterAction, FilterResult, FilterSettings, FilterStats, Marker, NodeId, SubscriptionId,
};
use feedguard_common::traits::{HostDom, WhitelistStore};
use crate::cache::ResultCache;
use crate::config::FilterConfig;
use crate::filter::policy::{decide, whitelisted_badge};
use crate::filter::{IdentityResolver, ToggleRegistry};
use crate::tasks::timers::TimerRegistry;
use crate::tasks::watcher::{locate_root, scan_messages, MessageSink, MutationWatcher};
use crate::Error;
use apply::DomApplier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed; direct calls work but nothing is observed yet.
    Idle,
    Running,
    /// Nothing touches the DOM until `initialize` is called again.
    ShutDown,
}

struct EngineState {
    cache: ResultCache,
    stats: FilterStats,
    /// Bumped by every refresh; work scheduled under an older value is stale.
    generation: u64,
    lifecycle: Lifecycle,
    /// Ids already counted in `stats` since the last reset or clear.
    counted: HashSet<String>,
}

pub struct FilterEngine {
    weak_self: Weak<FilterEngine>,
    dom: Arc<dyn HostDom>,
    store: Arc<dyn WhitelistStore>,
    config: FilterConfig,
    resolver: IdentityResolver,
    applier: DomApplier,
    toggles: ToggleRegistry,
    timers: TimerRegistry,
    state: Mutex<EngineState>,
    watcher: Mutex<Option<MutationWatcher>>,
    store_listener: Mutex<Option<(SubscriptionId, JoinHandle<()>)>>,
}

impl FilterEngine {
    pub fn new(
        dom: Arc<dyn HostDom>,
        store: Arc<dyn WhitelistStore>,
        config: FilterConfig,
    ) -> Result<Arc<Self>, Error> {
        config.validate()?;
        debug!("FilterEngine::new() called");
        Ok(Arc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            resolver: IdentityResolver::new(dom.clone(), &config),
            applier: DomApplier::new(dom.clone(), config.max_sweep_nodes, config.placeholder_preview),
            dom,
            store,
            config,
            toggles: ToggleRegistry::new(),
            timers: TimerRegistry::new(),
            state: Mutex::new(EngineState {
                cache: ResultCache::new(),
                stats: FilterStats::default(),
                generation: 0,
                lifecycle: Lifecycle::Idle,
                counted: HashSet::new(),
            }),
            watcher: Mutex::new(None),
            store_listener: Mutex::new(None),
        }))
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.lock().lifecycle
    }

    /// Subscribe to store changes, start watching the DOM and filter
    /// everything already rendered. Calling it twice is a no-op.
    pub async fn initialize(&self) {
        {
            let mut state = self.state.lock();
            if state.lifecycle == Lifecycle::Running {
                debug!("FilterEngine already running");
                return;
            }
            state.lifecycle = Lifecycle::Running;
            state.generation += 1;
        }
        info!("Initializing filter engine");

        let (sub_id, mut rx) = self.store.subscribe();
        let weak = self.weak_self.clone();
        let listener = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let mut coalesced = 0;
                while rx.try_recv().is_ok() {
                    coalesced += 1;
                }
                let Some(engine) = weak.upgrade() else { break };
                info!("Whitelist store changed ({}, +{} more); refreshing", event.event_type(), coalesced);
                engine.refresh_all().await;
            }
            debug!("Store listener exiting");
        });
        {
            // shutdown takes the listener under the same lock
            let state = self.state.lock();
            if state.lifecycle != Lifecycle::Running {
                drop(state);
                self.store.unsubscribe(sub_id);
                listener.abort();
                return;
            }
            let previous = self.store_listener.lock().replace((sub_id, listener));
            if let Some((old_id, old)) = previous {
                self.store.unsubscribe(old_id);
                old.abort();
            }
        }

        let sink: Weak<dyn MessageSink> = self.weak_self.clone();
        let watcher = MutationWatcher::new(self.dom.clone(), &self.config, sink);
        watcher.start().await;
        let state = self.state.lock();
        if state.lifecycle != Lifecycle::Running {
            // shut down while the initial scan was running
            watcher.stop();
            return;
        }
        let previous = self.watcher.lock().replace(watcher);
        if let Some(old) = previous {
            old.stop();
        }
    }

    /// Stop observing, cancel all pending work and put every message back
    /// to fully visible. No DOM mutation happens after this returns.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        let watcher = self.watcher.lock().take();
        if let Some(watcher) = watcher {
            watcher.stop();
        }
        let listener = self.store_listener.lock().take();
        if let Some((sub_id, listener)) = listener {
            self.store.unsubscribe(sub_id);
            listener.abort();
        }
        let cancelled = self.timers.cancel_all();

        if state.lifecycle == Lifecycle::ShutDown {
            return;
        }
        let restored = self.restore_everything();
        state.cache.clear();
        state.counted.clear();
        state.generation += 1;
        state.lifecycle = Lifecycle::ShutDown;
        self.toggles.clear();
        info!(
            "Filter engine shut down ({} timers cancelled, {} messages restored)",
            cancelled, restored
        );
    }

    /// Resolve, classify and apply each node, `batch_size` at a time,
    /// yielding to the runtime between batches.
    pub async fn process_messages(&self, nodes: Vec<NodeId>) {
        if nodes.is_empty() {
            return;
        }
        let generation = {
            let state = self.state.lock();
            if state.lifecycle == Lifecycle::ShutDown {
                debug!("Ignoring {} messages after shutdown", nodes.len());
                return;
            }
            state.generation
        };

        let batch_size = self.config.batch_size.max(1);
        for (index, chunk) in nodes.chunks(batch_size).enumerate() {
            if index > 0 {
                tokio::task::yield_now().await;
            }
            let settings = self.current_settings();
            if !self.run_batch(chunk, generation, settings.as_ref()) {
                debug!("Batch {} superseded; dropping the rest", index);
                return;
            }
        }
    }

    /// One batch under the state lock. Returns false if the work is stale.
    fn run_batch(&self, chunk: &[NodeId], generation: u64, settings: Option<&FilterSettings>) -> bool {
        let mut state = self.state.lock();
        if state.lifecycle == Lifecycle::ShutDown || state.generation != generation {
            return false;
        }
        for &node in chunk {
            if let Err(e) = self.process_one(&mut state, node, settings) {
                warn!("Failed to filter message {}: {}; leaving it visible", node, e);
                if let Err(e) = self.applier.restore(node) {
                    error!("Could not restore message {} either: {}", node, e);
                }
            }
        }
        true
    }

    fn process_one(
        &self,
        state: &mut EngineState,
        node: NodeId,
        settings: Option<&FilterSettings>,
    ) -> Result<Option<FilterAction>, Error> {
        if !self.dom.is_connected(node) {
            return Ok(None);
        }
        let Some(message_id) = self.resolver.message_id(node) else {
            return Ok(None);
        };

        let (result, fresh) = match state.cache.lookup(&message_id) {
            Some(hit) => {
                trace!("Cache hit for {}", message_id);
                (hit, false)
            }
            None => {
                let username = self.resolver.extract_username(node);
                let (is_whitelisted, cacheable) = match username.as_deref() {
                    Some(name) => match self.store.is_whitelisted(name) {
                        Ok(found) => (found, true),
                        Err(e) => {
                            error!("Whitelist lookup for '{}' failed: {}; treating as not whitelisted", name, e);
                            (false, false)
                        }
                    },
                    None => (false, false),
                };
                let result = FilterResult { username, is_whitelisted };
                // uncached results are resolved again on every pass
                let first = state.counted.insert(message_id.clone());
                if first {
                    state.stats.processed += 1;
                    if is_whitelisted {
                        state.stats.whitelisted += 1;
                    }
                }
                if cacheable {
                    state.cache.insert(&message_id, result.clone());
                }
                (result, first)
            }
        };

        let toggle = self.toggles.get(&message_id);
        let (action, badge) = match (result.username.as_deref(), settings) {
            (Some(_), Some(s)) => (
                decide(result.is_whitelisted, s, toggle),
                whitelisted_badge(result.is_whitelisted, s),
            ),
            // unknown author or unreadable settings: never hide
            _ => (FilterAction::Show, false),
        };
        if fresh && action.suppresses() {
            state.stats.filtered += 1;
        }

        self.applier
            .apply(node, &message_id, action, result.username.as_deref(), badge)?;
        debug!(
            "Message {} by {:?} -> {}",
            message_id,
            result.username,
            action.as_str()
        );
        if action.suppresses() {
            self.schedule_rechecks(&message_id, action, state.generation);
        }
        Ok(Some(action))
    }

    /// Re-run the descendant sweep later, for content the host renders
    /// asynchronously after the message first appears.
    fn schedule_rechecks(&self, message_id: &str, action: FilterAction, generation: u64) {
        for delay in self.config.recheck_delays() {
            let weak = self.weak_self.clone();
            let id = message_id.to_string();
            self.timers.schedule(delay, move || {
                if let Some(engine) = weak.upgrade() {
                    engine.recheck(&id, action, generation);
                }
            });
        }
    }

    fn recheck(&self, message_id: &str, action: FilterAction, generation: u64) {
        let state = self.state.lock();
        if state.lifecycle == Lifecycle::ShutDown || state.generation != generation {
            return;
        }
        let Some(node) = self.find_message(message_id) else {
            return;
        };
        if self.applier.current_action(node) != Some(action) {
            return;
        }
        match self.applier.sweep(node) {
            Ok(0) => {}
            Ok(n) => debug!("Re-check of {} suppressed {} late descendants", message_id, n),
            Err(e) => warn!("Re-check of {} failed: {}", message_id, e),
        }
    }

    /// Drop cached results, re-scan every present message and re-apply.
    ///
    /// When the new settings show everything, all messages are made visible
    /// before this returns; otherwise the re-scan supersedes any batch that
    /// is still in flight.
    pub async fn refresh_all(&self) {
        let settings = self.current_settings();
        let nodes = {
            let mut state = self.state.lock();
            if state.lifecycle == Lifecycle::ShutDown {
                return;
            }
            state.generation += 1;
            state.cache.clear();
            state.counted.clear();
            self.timers.cancel_all();

            let nodes = self.all_messages();
            info!("Refreshing {} messages (generation {})", nodes.len(), state.generation);
            if settings.as_ref().map(|s| s.shows_everything()).unwrap_or(true) {
                for node in &nodes {
                    if let Err(e) = self.applier.show(*node, false) {
                        warn!("Failed to un-filter {}: {}", node, e);
                    }
                }
            }
            nodes
        };
        self.process_messages(nodes).await;
    }

    /// Remove every filtering effect and forget cached results and toggles.
    pub fn clear_all(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        state.cache.clear();
        state.counted.clear();
        self.timers.cancel_all();
        self.toggles.clear();
        let restored = self.restore_everything();
        info!("Cleared filter state; {} messages restored", restored);
    }

    fn restore_everything(&self) -> usize {
        let mut restored = 0;
        for node in self.all_messages() {
            match self.applier.restore(node) {
                Ok(()) => restored += 1,
                Err(e) => warn!("Failed to restore {}: {}", node, e),
            }
        }
        restored
    }

    fn all_messages(&self) -> Vec<NodeId> {
        let root = locate_root(self.dom.as_ref(), &self.config.selectors);
        scan_messages(self.dom.as_ref(), &self.config.selectors, root)
    }

    /// Live node currently rendering `message_id`.
    pub fn find_message(&self, message_id: &str) -> Option<NodeId> {
        let marker = Marker::attr_equals(&self.config.selectors.message_id_attr, message_id);
        let root = locate_root(self.dom.as_ref(), &self.config.selectors);
        std::iter::once(root)
            .chain(self.dom.query_all(root, &marker))
            .find(|n| self.dom.matches(*n, &marker) && self.resolver.is_message(*n))
    }

    /// Purge cache and toggle entries of messages that left the document,
    /// unless the host has already rendered the same id again elsewhere.
    pub fn forget(&self, removed: Vec<NodeId>) {
        let ids: Vec<String> = removed
            .into_iter()
            .filter_map(|n| self.resolver.message_id(n))
            .collect();
        if ids.is_empty() {
            return;
        }
        let live: HashSet<String> = self
            .all_messages()
            .into_iter()
            .filter_map(|n| self.resolver.message_id(n))
            .collect();
        let mut state = self.state.lock();
        let mut purged = 0;
        for id in ids.iter().filter(|id| !live.contains(*id)) {
            state.cache.remove(id);
            state.counted.remove(id);
            self.toggles.remove(id);
            purged += 1;
        }
        if purged > 0 {
            debug!("Purged {} removed messages", purged);
        }
    }

    fn current_settings(&self) -> Option<FilterSettings> {
        match self.store.active_settings() {
            Ok(settings) => Some(settings),
            Err(e) => {
                error!("Could not read filter settings: {}; showing everything", e);
                None
            }
        }
    }

    // ----- per-message toggle -----

    /// Override one message's visibility and re-apply just that message.
    ///
    /// Only rendered messages take an override. `false` drops the override,
    /// which hands the message back to the policy.
    pub fn set_toggle(&self, message_id: &str, visible: bool) -> bool {
        if self.find_message(message_id).is_none() {
            debug!("Toggle target {} is not rendered", message_id);
            self.toggles.remove(message_id);
            return false;
        }
        if visible {
            self.toggles.set(message_id, true);
        } else {
            self.toggles.remove(message_id);
        }
        self.reapply_one(message_id)
    }

    pub fn get_toggle(&self, message_id: &str) -> Option<bool> {
        self.toggles.get(message_id)
    }

    /// Placeholder click.
    pub fn expand(&self, message_id: &str) -> bool {
        self.set_toggle(message_id, true)
    }

    /// Forget every override and re-apply the messages that had one.
    pub fn clear_toggles(&self) {
        let ids = self.toggles.ids();
        self.toggles.clear();
        for id in ids {
            self.reapply_one(&id);
        }
    }

    fn reapply_one(&self, message_id: &str) -> bool {
        let settings = self.current_settings();
        let mut state = self.state.lock();
        if state.lifecycle == Lifecycle::ShutDown {
            return false;
        }
        let Some(node) = self.find_message(message_id) else {
            debug!("Toggle target {} is not rendered", message_id);
            return false;
        };
        match self.process_one(&mut state, node, settings.as_ref()) {
            Ok(action) => action.is_some(),
            Err(e) => {
                warn!("Failed to re-apply {}: {}", message_id, e);
                if let Err(e) = self.applier.restore(node) {
                    error!("Could not restore message {} either: {}", node, e);
                }
                false
            }
        }
    }

    // ----- stats & status -----

    pub fn stats(&self) -> FilterStats {
        self.state.lock().stats
    }

    pub fn reset_stats(&self) {
        let mut state = self.state.lock();
        state.stats = FilterStats::default();
        state.counted.clear();
    }

    pub fn cached_results(&self) -> usize {
        self.state.lock().cache.len()
    }

    /// Result cache (hits, misses) since the engine was built.
    pub fn cache_counters(&self) -> (u64, u64) {
        let state = self.state.lock();
        (state.cache.hits(), state.cache.misses())
    }

    pub fn cached_result(&self, message_id: &str) -> Option<FilterResult> {
        self.state.lock().cache.peek(message_id).cloned()
    }

    pub fn toggle_count(&self) -> usize {
        self.toggles.len()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    /// True while running with filtering switched on in the store.
    pub fn is_enabled(&self) -> bool {
        self.lifecycle() == Lifecycle::Running
            && self.current_settings().map(|s| s.enabled).unwrap_or(false)
    }

    /// Action currently applied to a rendered message.
    pub fn applied_action(&self, message_id: &str) -> Option<FilterAction> {
        self.find_message(message_id)
            .and_then(|n| self.applier.current_action(n))
    }
}

#[async_trait]
impl MessageSink for FilterEngine {
    async fn messages_added(&self, nodes: Vec<NodeId>) {
        self.process_messages(nodes).await;
    }

    fn messages_removed(&self, nodes: Vec<NodeId>) {
        self.forget(nodes);
    }
}

impl Drop for FilterEngine {
    fn drop(&mut self) {
        self.timers.cancel_all();
        if let Some((_, listener)) = self.store_listener.get_mut().take() {
            listener.abort();
        }
    }
}
