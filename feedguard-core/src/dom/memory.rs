// File: feedguard-core/src/dom/memory.rs
//
// An arena-backed document implementing `HostDom`. Used headless (CLI,
// tests) and as the reference for what the core expects from a real DOM.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

use feedguard_common::models::{MutationRecord, NodeId, ObserverId};
use feedguard_common::traits::HostDom;
use crate::Error;

#[derive(Debug, Clone)]
struct ElementData {
    tag: String,
    attrs: BTreeMap<String, String>,
    classes: Vec<String>,
    style: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
enum NodeKind {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct Arena {
    nodes: Vec<NodeData>,
}

impl Arena {
    fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0 as usize)
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id.0 as usize)
    }

    fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.get(id).map(|n| &n.kind) {
            Some(NodeKind::Element(e)) => Some(e),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData, Error> {
        match self.get_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Element(e)) => Ok(e),
            Some(NodeKind::Text(_)) => Err(Error::Dom(format!("{} is a text node", id))),
            None => Err(Error::Dom(format!("{} does not exist", id))),
        }
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u64);
        self.nodes.push(NodeData { kind, parent: None, children: Vec::new() });
        id
    }

    /// Unlink `node` from its parent. Returns the old parent.
    fn detach(&mut self, node: NodeId) -> Option<NodeId> {
        let parent = self.get(node)?.parent?;
        if let Some(p) = self.get_mut(parent) {
            p.children.retain(|c| *c != node);
        }
        if let Some(n) = self.get_mut(node) {
            n.parent = None;
        }
        Some(parent)
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.get(n).and_then(|d| d.parent);
        }
        false
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let Some(data) = self.get(node) else { return };
        match &data.kind {
            NodeKind::Text(t) => out.push_str(t),
            NodeKind::Element(_) => {
                for child in &data.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }
}

/// In-memory `HostDom`.
pub struct MemoryDom {
    arena: Mutex<Arena>,
    observers: Mutex<HashMap<u64, UnboundedSender<MutationRecord>>>,
    next_observer: AtomicU64,
    /// Bumped by every successful mutating call.
    revision: AtomicU64,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDom {
    pub fn new() -> Self {
        let mut arena = Arena { nodes: Vec::new() };
        arena.push(NodeKind::Element(ElementData {
            tag: "#document".to_string(),
            attrs: BTreeMap::new(),
            classes: Vec::new(),
            style: BTreeMap::new(),
        }));
        Self {
            arena: Mutex::new(arena),
            observers: Mutex::new(HashMap::new()),
            next_observer: AtomicU64::new(1),
            revision: AtomicU64::new(0),
        }
    }

    /// Number of mutating calls so far; lets callers assert "nothing changed".
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    /// Create a detached element with classes and attributes in one go.
    pub fn element(&self, tag: &str, classes: &[&str], attrs: &[(&str, &str)]) -> NodeId {
        let mut arena = self.arena.lock();
        arena.push(NodeKind::Element(ElementData {
            tag: tag.to_string(),
            attrs: attrs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            classes: classes.iter().map(|c| c.to_string()).collect(),
            style: BTreeMap::new(),
        }))
    }

    /// Append a text child to `parent`.
    pub fn append_text(&self, parent: NodeId, text: &str) -> Result<NodeId, Error> {
        let text_node = self.create_text(text);
        self.append_child(parent, text_node)?;
        Ok(text_node)
    }

    /// Insert `child` into `parent` before `reference` (or at the end).
    pub fn insert_before(&self, parent: NodeId, child: NodeId, reference: Option<NodeId>) -> Result<(), Error> {
        let mut records = Vec::new();
        {
            let mut arena = self.arena.lock();
            if arena.element(parent).is_none() {
                return Err(Error::Dom(format!("cannot insert into {}", parent)));
            }
            if arena.get(child).is_none() {
                return Err(Error::Dom(format!("{} does not exist", child)));
            }
            if arena.is_inclusive_ancestor(child, parent) {
                return Err(Error::Dom(format!("inserting {} into {} would create a cycle", child, parent)));
            }
            if let Some(old_parent) = arena.detach(child) {
                records.push(MutationRecord { target: old_parent, added: vec![], removed: vec![child] });
            }
            let Some(p) = arena.get_mut(parent) else {
                return Err(Error::Dom(format!("{} does not exist", parent)));
            };
            let index = reference
                .and_then(|r| p.children.iter().position(|c| *c == r))
                .unwrap_or(p.children.len());
            p.children.insert(index, child);
            if let Some(c) = arena.get_mut(child) {
                c.parent = Some(parent);
            }
            records.push(MutationRecord { target: parent, added: vec![child], removed: vec![] });
        }
        self.bump();
        self.emit(records);
        Ok(())
    }

    fn bump(&self) {
        self.revision.fetch_add(1, Ordering::SeqCst);
    }

    /// Deliver records after the arena lock is released.
    fn emit(&self, records: Vec<MutationRecord>) {
        if records.is_empty() {
            return;
        }
        let mut observers = self.observers.lock();
        observers.retain(|id, tx| {
            for record in &records {
                if tx.send(record.clone()).is_err() {
                    trace!("Dropping closed observer {}", id);
                    return false;
                }
            }
            true
        });
    }
}

impl HostDom for MemoryDom {
    fn document(&self) -> NodeId {
        NodeId(0)
    }

    fn is_element(&self, node: NodeId) -> bool {
        self.arena.lock().element(node).is_some()
    }

    fn is_connected(&self, node: NodeId) -> bool {
        let arena = self.arena.lock();
        arena.get(node).is_some() && arena.is_inclusive_ancestor(NodeId(0), node)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.arena.lock().get(node).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.arena.lock().get(node).map(|n| n.children.clone()).unwrap_or_default()
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        self.arena.lock().element(node).map(|e| e.tag.clone())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        let arena = self.arena.lock();
        let el = arena.element(node)?;
        if name == "class" {
            return (!el.classes.is_empty()).then(|| el.classes.join(" "));
        }
        el.attrs.get(name).cloned()
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), Error> {
        let changed = {
            let mut arena = self.arena.lock();
            let el = arena.element_mut(node)?;
            if name == "class" {
                let classes: Vec<String> = value.split_whitespace().map(str::to_string).collect();
                let changed = classes != el.classes;
                el.classes = classes;
                changed
            } else {
                el.attrs.insert(name.to_string(), value.to_string()).as_deref() != Some(value)
            }
        };
        if changed {
            self.bump();
        }
        Ok(())
    }

    fn remove_attribute(&self, node: NodeId, name: &str) -> Result<(), Error> {
        let changed = {
            let mut arena = self.arena.lock();
            let el = arena.element_mut(node)?;
            if name == "class" {
                let had = !el.classes.is_empty();
                el.classes.clear();
                had
            } else {
                el.attrs.remove(name).is_some()
            }
        };
        if changed {
            self.bump();
        }
        Ok(())
    }

    fn class_list(&self, node: NodeId) -> Vec<String> {
        self.arena.lock().element(node).map(|e| e.classes.clone()).unwrap_or_default()
    }

    fn add_class(&self, node: NodeId, class: &str) -> Result<(), Error> {
        let changed = {
            let mut arena = self.arena.lock();
            let el = arena.element_mut(node)?;
            if el.classes.iter().any(|c| c == class) {
                false
            } else {
                el.classes.push(class.to_string());
                true
            }
        };
        if changed {
            self.bump();
        }
        Ok(())
    }

    fn remove_class(&self, node: NodeId, class: &str) -> Result<(), Error> {
        let changed = {
            let mut arena = self.arena.lock();
            let el = arena.element_mut(node)?;
            let before = el.classes.len();
            el.classes.retain(|c| c != class);
            before != el.classes.len()
        };
        if changed {
            self.bump();
        }
        Ok(())
    }

    fn style(&self, node: NodeId, property: &str) -> Option<String> {
        self.arena.lock().element(node).and_then(|e| e.style.get(property).cloned())
    }

    fn set_style(&self, node: NodeId, property: &str, value: &str) -> Result<(), Error> {
        let changed = {
            let mut arena = self.arena.lock();
            let el = arena.element_mut(node)?;
            el.style.insert(property.to_string(), value.to_string()).as_deref() != Some(value)
        };
        if changed {
            self.bump();
        }
        Ok(())
    }

    fn remove_style(&self, node: NodeId, property: &str) -> Result<(), Error> {
        let changed = {
            let mut arena = self.arena.lock();
            arena.element_mut(node)?.style.remove(property).is_some()
        };
        if changed {
            self.bump();
        }
        Ok(())
    }

    fn own_text(&self, node: NodeId) -> String {
        let arena = self.arena.lock();
        let Some(data) = arena.get(node) else { return String::new() };
        let mut out = String::new();
        for child in &data.children {
            if let Some(NodeKind::Text(t)) = arena.get(*child).map(|c| &c.kind) {
                out.push_str(t);
            }
        }
        out
    }

    fn text_content(&self, node: NodeId) -> String {
        let arena = self.arena.lock();
        let mut out = String::new();
        arena.collect_text(node, &mut out);
        out
    }

    fn create_element(&self, tag: &str) -> NodeId {
        self.element(tag, &[], &[])
    }

    fn create_text(&self, text: &str) -> NodeId {
        self.arena.lock().push(NodeKind::Text(text.to_string()))
    }

    fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), Error> {
        self.insert_before(parent, child, None)
    }

    fn remove(&self, node: NodeId) -> Result<(), Error> {
        let old_parent = {
            let mut arena = self.arena.lock();
            if arena.get(node).is_none() {
                return Err(Error::Dom(format!("{} does not exist", node)));
            }
            arena.detach(node)
        };
        if let Some(parent) = old_parent {
            self.bump();
            self.emit(vec![MutationRecord { target: parent, added: vec![], removed: vec![node] }]);
        }
        Ok(())
    }

    fn observe(&self) -> (ObserverId, UnboundedReceiver<MutationRecord>) {
        let id = self.next_observer.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.lock().insert(id, tx);
        (ObserverId(id), rx)
    }

    fn disconnect(&self, observer: ObserverId) {
        self.observers.lock().remove(&observer.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedguard_common::models::Marker;

    #[test]
    fn test_tree_building_and_text() {
        let dom = MemoryDom::new();
        let root = dom.document();
        let list = dom.element("ol", &["list"], &[("data-list-id", "chat-messages")]);
        dom.append_child(root, list).unwrap();
        let li = dom.element("li", &[], &[("id", "chat-messages-1-1")]);
        dom.append_child(list, li).unwrap();
        dom.append_text(li, "hello ").unwrap();
        let b = dom.create_element("b");
        dom.append_child(li, b).unwrap();
        dom.append_text(b, "world").unwrap();

        assert_eq!(dom.text_content(li), "hello world");
        assert_eq!(dom.own_text(li), "hello ");
        assert!(dom.is_connected(b));
        assert_eq!(dom.query_all(root, &Marker::attr_prefix("id", "chat-messages-")), vec![li]);
        assert_eq!(dom.closest(b, &Marker::Tag { name: "ol".into() }), Some(list));
    }

    #[test]
    fn test_remove_keeps_node_readable() {
        let dom = MemoryDom::new();
        let li = dom.element("li", &["message"], &[("id", "chat-messages-1-9")]);
        dom.append_child(dom.document(), li).unwrap();
        dom.remove(li).unwrap();
        assert!(!dom.is_connected(li));
        assert_eq!(dom.attribute(li, "id").as_deref(), Some("chat-messages-1-9"));
    }

    #[test]
    fn test_cycle_rejected() {
        let dom = MemoryDom::new();
        let a = dom.create_element("div");
        let b = dom.create_element("div");
        dom.append_child(a, b).unwrap();
        assert!(matches!(dom.append_child(b, a), Err(Error::Dom(_))));
    }

    #[test]
    fn test_class_ops_are_idempotent() {
        let dom = MemoryDom::new();
        let el = dom.create_element("div");
        dom.add_class(el, "x").unwrap();
        let rev = dom.revision();
        dom.add_class(el, "x").unwrap();
        assert_eq!(dom.revision(), rev);
        assert_eq!(dom.class_list(el), vec!["x".to_string()]);
        assert_eq!(dom.attribute(el, "class").as_deref(), Some("x"));
    }

    #[test]
    fn test_previous_element_sibling_skips_text() {
        let dom = MemoryDom::new();
        let root = dom.document();
        let a = dom.create_element("li");
        dom.append_child(root, a).unwrap();
        dom.append_text(root, "\n").unwrap();
        let b = dom.create_element("li");
        dom.append_child(root, b).unwrap();
        assert_eq!(dom.previous_element_sibling(b), Some(a));
        assert_eq!(dom.previous_element_sibling(a), None);
    }

    #[tokio::test]
    async fn test_observers_receive_child_list_records() {
        let dom = MemoryDom::new();
        let (id, mut rx) = dom.observe();
        let li = dom.create_element("li");
        dom.append_child(dom.document(), li).unwrap();
        let rec = rx.recv().await.expect("record");
        assert_eq!(rec.added, vec![li]);
        assert_eq!(rec.target, dom.document());

        dom.disconnect(id);
        assert_eq!(dom.observer_count(), 0);
        dom.remove(li).unwrap();
        assert!(rx.recv().await.is_none());
    }
}
