// File: feedguard-core/src/tasks/watcher.rs

use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use feedguard_common::models::{Marker, MutationRecord, NodeId, ObserverId};
use feedguard_common::traits::HostDom;
use crate::config::{FilterConfig, HostSelectors};
use crate::engine::apply::PLACEHOLDER_CLASS;

/// Receiver of the watcher's flushed batches.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Newly seen (or re-rendered) message nodes, in discovery order, deduplicated.
    async fn messages_added(&self, nodes: Vec<NodeId>);

    /// Message nodes that left the document. They may already be unreadable.
    fn messages_removed(&self, nodes: Vec<NodeId>);
}

/// The observed root: the message container if present, else the document.
pub fn locate_root(dom: &dyn HostDom, selectors: &HostSelectors) -> NodeId {
    let document = dom.document();
    dom.query_first(document, &selectors.container).unwrap_or(document)
}

/// Every message currently under `root`, in document order.
pub fn scan_messages(dom: &dyn HostDom, selectors: &HostSelectors, root: NodeId) -> Vec<NodeId> {
    let mut found = Vec::new();
    if dom.matches(root, &selectors.message) {
        found.push(root);
    }
    found.extend(dom.query_all(root, &selectors.message));
    found
}

struct WatchShared {
    dom: Arc<dyn HostDom>,
    selectors: HostSelectors,
    debounce: Duration,
    placeholder: Marker,
    sink: Weak<dyn MessageSink>,
}

#[derive(Default)]
struct WatcherState {
    observer: Option<ObserverId>,
    task: Option<JoinHandle<()>>,
}

/// Watches the host document for inserted messages and forwards them in
/// debounced batches.
pub struct MutationWatcher {
    shared: Arc<WatchShared>,
    state: Mutex<WatcherState>,
}

impl MutationWatcher {
    pub fn new(dom: Arc<dyn HostDom>, config: &FilterConfig, sink: Weak<dyn MessageSink>) -> Self {
        Self {
            shared: Arc::new(WatchShared {
                dom,
                selectors: config.selectors.clone(),
                debounce: config.debounce(),
                placeholder: Marker::class(PLACEHOLDER_CLASS),
                sink,
            }),
            state: Mutex::new(WatcherState::default()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().task.is_some()
    }

    /// Start observing, then hand every already-present message to the sink.
    ///
    /// The observer is attached before the initial scan, so nothing rendered
    /// in between is missed (at worst it is seen twice, which the sink's
    /// cache absorbs).
    pub async fn start(&self) {
        let root = {
            let mut state = self.state.lock();
            if state.task.is_some() {
                warn!("MutationWatcher::start() called while already running");
                return;
            }
            let (observer, rx) = self.shared.dom.observe();
            let root = locate_root(self.shared.dom.as_ref(), &self.shared.selectors);
            if root == self.shared.dom.document() {
                info!("Message container not found; observing the whole document");
            }
            state.observer = Some(observer);
            state.task = Some(tokio::spawn(run_watch_loop(self.shared.clone(), rx, root)));
            root
        };

        let existing = scan_messages(self.shared.dom.as_ref(), &self.shared.selectors, root);
        info!("MutationWatcher started; {} messages already present", existing.len());
        if existing.is_empty() {
            return;
        }
        if let Some(sink) = self.shared.sink.upgrade() {
            sink.messages_added(existing).await;
        }
    }

    /// Disconnect and drop anything buffered. No batch is delivered after this returns.
    pub fn stop(&self) {
        let (observer, task) = {
            let mut state = self.state.lock();
            (state.observer.take(), state.task.take())
        };
        if let Some(observer) = observer {
            self.shared.dom.disconnect(observer);
        }
        if let Some(task) = task {
            task.abort();
            debug!("MutationWatcher stopped");
        }
    }
}

impl Drop for MutationWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_watch_loop(shared: Arc<WatchShared>, mut rx: UnboundedReceiver<MutationRecord>, mut root: NodeId) {
    loop {
        let Some(first) = rx.recv().await else {
            debug!("Mutation channel closed; watch loop exiting");
            return;
        };
        let mut batch = vec![first];
        let deadline = Instant::now() + shared.debounce;
        let mut closed = false;
        loop {
            tokio::select! {
                next = rx.recv() => match next {
                    Some(record) => batch.push(record),
                    None => {
                        closed = true;
                        break;
                    }
                },
                _ = sleep_until(deadline) => break,
            }
        }

        let mut added;
        if !shared.dom.is_connected(root) {
            // The host swapped the whole tree out from under us.
            root = locate_root(shared.dom.as_ref(), &shared.selectors);
            warn!("Observed root detached; re-scanning from {}", root);
            added = scan_messages(shared.dom.as_ref(), &shared.selectors, root);
        } else {
            if root == shared.dom.document() {
                let located = locate_root(shared.dom.as_ref(), &shared.selectors);
                if located != root {
                    debug!("Message container appeared at {}", located);
                    root = located;
                }
            }
            added = Vec::new();
        }

        let (found, removed) = shared.collect(&batch, root);
        let mut seen: HashSet<NodeId> = added.iter().copied().collect();
        for node in found {
            if seen.insert(node) {
                added.push(node);
            }
        }

        let Some(sink) = shared.sink.upgrade() else {
            debug!("Sink dropped; watch loop exiting");
            return;
        };
        debug!("Flushing {} mutation records: {} added, {} removed", batch.len(), added.len(), removed.len());
        if !removed.is_empty() {
            sink.messages_removed(removed);
        }
        if !added.is_empty() {
            sink.messages_added(added).await;
        }
        if closed {
            return;
        }
    }
}

impl WatchShared {
    /// Split a batch into candidate message nodes and removed message nodes.
    fn collect(&self, batch: &[MutationRecord], root: NodeId) -> (Vec<NodeId>, Vec<NodeId>) {
        let dom = self.dom.as_ref();
        let mut added = Vec::new();
        let mut added_seen = HashSet::new();
        let mut removed = Vec::new();
        let mut removed_seen = HashSet::new();

        for record in batch {
            for node in &record.removed {
                for message in scan_messages(dom, &self.selectors, *node) {
                    if removed_seen.insert(message) {
                        removed.push(message);
                    }
                }
            }
            for node in &record.added {
                let node = *node;
                if !dom.is_element(node) || !dom.is_connected(node) || !dom.contains(root, node) {
                    continue;
                }
                if dom.matches(node, &self.placeholder) {
                    continue;
                }
                let mut messages = scan_messages(dom, &self.selectors, node);
                if messages.is_empty() {
                    // Content injected into an existing message: re-apply that message.
                    if let Some(enclosing) = dom.parent(node).and_then(|p| dom.closest(p, &self.selectors.message)) {
                        messages.push(enclosing);
                    }
                }
                for message in messages {
                    if added_seen.insert(message) {
                        added.push(message);
                    }
                }
            }
        }
        (added, removed)
    }
}
