use tokio::sync::mpsc::UnboundedReceiver;
use crate::error::Error;
use crate::models::dom::{MutationRecord, NodeId, ObserverId};
use crate::models::marker::Marker;

/// The host page's document, as seen by the filtering core.
///
/// Implementations are synchronous and must never call back into an
/// observer while a mutating call is on the stack; records are queued on
/// the observer's channel instead.
pub trait HostDom: Send + Sync {
    fn document(&self) -> NodeId;

    fn is_element(&self, node: NodeId) -> bool;
    /// True while the node is reachable from `document()`.
    fn is_connected(&self, node: NodeId) -> bool;
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn children(&self, node: NodeId) -> Vec<NodeId>;
    fn tag_name(&self, node: NodeId) -> Option<String>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;
    fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), Error>;
    fn remove_attribute(&self, node: NodeId, name: &str) -> Result<(), Error>;

    fn class_list(&self, node: NodeId) -> Vec<String>;
    fn add_class(&self, node: NodeId, class: &str) -> Result<(), Error>;
    fn remove_class(&self, node: NodeId, class: &str) -> Result<(), Error>;

    fn style(&self, node: NodeId, property: &str) -> Option<String>;
    fn set_style(&self, node: NodeId, property: &str, value: &str) -> Result<(), Error>;
    fn remove_style(&self, node: NodeId, property: &str) -> Result<(), Error>;

    /// Concatenated text of the node's direct text children.
    fn own_text(&self, node: NodeId) -> String;
    /// Concatenated text of every text node in the subtree, in document order.
    fn text_content(&self, node: NodeId) -> String;

    fn create_element(&self, tag: &str) -> NodeId;
    fn create_text(&self, text: &str) -> NodeId;
    fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), Error>;
    /// Detach `node` from its parent. The node stays readable afterwards.
    fn remove(&self, node: NodeId) -> Result<(), Error>;

    /// Subscribe to childList mutations anywhere in the document.
    fn observe(&self) -> (ObserverId, UnboundedReceiver<MutationRecord>);
    fn disconnect(&self, observer: ObserverId);

    fn matches(&self, node: NodeId, marker: &Marker) -> bool {
        let Some(tag) = self.tag_name(node) else {
            return false;
        };
        let classes = self.class_list(node);
        marker.matches_parts(&tag, &classes, &|name: &str| self.attribute(node, name))
    }

    /// Pre-order snapshot of every element below `node` (not including it).
    fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            if !self.is_element(next) {
                continue;
            }
            out.push(next);
            stack.extend(self.children(next).into_iter().rev());
        }
        out
    }

    fn query_first(&self, root: NodeId, marker: &Marker) -> Option<NodeId> {
        self.descendants(root).into_iter().find(|n| self.matches(*n, marker))
    }

    fn query_all(&self, root: NodeId, marker: &Marker) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|n| self.matches(*n, marker))
            .collect()
    }

    /// Nearest inclusive ancestor matching `marker`.
    fn closest(&self, node: NodeId, marker: &Marker) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(n) = current {
            if self.matches(n, marker) {
                return Some(n);
            }
            current = self.parent(n);
        }
        None
    }

    /// True if `node` is `ancestor` or lies below it.
    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    fn previous_element_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|s| *s == node)?;
        siblings[..pos]
            .iter()
            .rev()
            .copied()
            .find(|s| self.is_element(*s))
    }
}
