// File: feedguard-core/src/engine/apply.rs
//
// Presentation-only DOM changes for a filtering decision. Nothing here
// detaches a message node: every change is undone by `show`/`restore`.

use std::sync::Arc;
use tracing::trace;

use feedguard_common::models::{FilterAction, Marker, NodeId};
use feedguard_common::traits::HostDom;
use crate::Error;

pub const STATE_ATTR: &str = "data-feedguard-state";
pub const SUPPRESSED_ATTR: &str = "data-feedguard-suppressed";
pub const TARGET_ATTR: &str = "data-feedguard-target";

pub const WHITELISTED_CLASS: &str = "feedguard-whitelisted";
pub const COLLAPSED_CLASS: &str = "feedguard-collapsed";
pub const REMOVED_CLASS: &str = "feedguard-removed";
pub const PLACEHOLDER_CLASS: &str = "feedguard-placeholder";

const SUPPRESS_STYLES: [(&str, &str); 2] = [("opacity", "0"), ("filter", "blur(6px)")];

pub struct DomApplier {
    dom: Arc<dyn HostDom>,
    max_sweep_nodes: usize,
    placeholder_preview: bool,
    placeholder: Marker,
    suppressed: Marker,
}

impl DomApplier {
    pub fn new(dom: Arc<dyn HostDom>, max_sweep_nodes: usize, placeholder_preview: bool) -> Self {
        Self {
            dom,
            max_sweep_nodes,
            placeholder_preview,
            placeholder: Marker::class(PLACEHOLDER_CLASS),
            suppressed: Marker::AttrPresent { name: SUPPRESSED_ATTR.to_string() },
        }
    }

    /// Action currently applied to `node`, if any.
    pub fn current_action(&self, node: NodeId) -> Option<FilterAction> {
        self.dom
            .attribute(node, STATE_ATTR)
            .and_then(|s| FilterAction::parse(&s))
    }

    /// Apply `action`. Applying the same action twice leaves the same DOM.
    pub fn apply(
        &self,
        node: NodeId,
        message_id: &str,
        action: FilterAction,
        username: Option<&str>,
        badge: bool,
    ) -> Result<(), Error> {
        match action {
            FilterAction::Show => self.show(node, badge),
            FilterAction::Collapse => self.collapse(node, message_id, username),
            FilterAction::Remove => self.hide(node),
        }
    }

    pub fn show(&self, node: NodeId, badge: bool) -> Result<(), Error> {
        self.undo_suppression(node)?;
        if badge {
            self.dom.add_class(node, WHITELISTED_CLASS)?;
        } else {
            self.dom.remove_class(node, WHITELISTED_CLASS)?;
        }
        self.dom.set_attribute(node, STATE_ATTR, FilterAction::Show.as_str())
    }

    /// Strip every trace of filtering, including the state marker.
    pub fn restore(&self, node: NodeId) -> Result<(), Error> {
        self.undo_suppression(node)?;
        self.dom.remove_class(node, WHITELISTED_CLASS)?;
        self.dom.remove_attribute(node, STATE_ATTR)
    }

    fn collapse(&self, node: NodeId, message_id: &str, username: Option<&str>) -> Result<(), Error> {
        if self.current_action(node) == Some(FilterAction::Remove) {
            self.dom.remove_style(node, "display")?;
        }
        self.dom.remove_class(node, REMOVED_CLASS)?;
        self.dom.remove_class(node, WHITELISTED_CLASS)?;
        self.dom.add_class(node, COLLAPSED_CLASS)?;
        self.ensure_placeholder(node, message_id, username)?;
        self.sweep(node)?;
        self.dom.set_attribute(node, STATE_ATTR, FilterAction::Collapse.as_str())
    }

    fn hide(&self, node: NodeId) -> Result<(), Error> {
        self.remove_placeholders(node)?;
        self.dom.remove_class(node, COLLAPSED_CLASS)?;
        self.dom.remove_class(node, WHITELISTED_CLASS)?;
        self.dom.add_class(node, REMOVED_CLASS)?;
        self.dom.set_style(node, "display", "none")?;
        self.sweep(node)?;
        self.dom.set_attribute(node, STATE_ATTR, FilterAction::Remove.as_str())
    }

    fn undo_suppression(&self, node: NodeId) -> Result<(), Error> {
        if self.current_action(node) == Some(FilterAction::Remove) {
            self.dom.remove_style(node, "display")?;
        }
        self.dom.remove_class(node, REMOVED_CLASS)?;
        self.dom.remove_class(node, COLLAPSED_CLASS)?;
        self.remove_placeholders(node)?;
        self.unsweep(node)
    }

    /// Suppress every text-bearing descendant individually. The host styles
    /// nested author/content elements itself, so a class on the message node
    /// alone does not reliably hide them. Returns how many were newly hit.
    pub fn sweep(&self, node: NodeId) -> Result<usize, Error> {
        let snapshot: Vec<NodeId> = self
            .dom
            .descendants(node)
            .into_iter()
            .take(self.max_sweep_nodes)
            .collect();
        let mut newly = 0;
        for el in snapshot {
            if self.dom.closest(el, &self.placeholder).is_some() {
                continue;
            }
            if self.dom.own_text(el).trim().is_empty() {
                continue;
            }
            if self.dom.attribute(el, SUPPRESSED_ATTR).is_none() {
                newly += 1;
            }
            for (prop, value) in SUPPRESS_STYLES {
                self.dom.set_style(el, prop, value)?;
            }
            self.dom.set_attribute(el, SUPPRESSED_ATTR, "1")?;
        }
        if newly > 0 {
            trace!("Swept {} descendants of {}", newly, node);
        }
        Ok(newly)
    }

    fn unsweep(&self, node: NodeId) -> Result<(), Error> {
        for el in self.dom.query_all(node, &self.suppressed) {
            for (prop, _) in SUPPRESS_STYLES {
                self.dom.remove_style(el, prop)?;
            }
            self.dom.remove_attribute(el, SUPPRESSED_ATTR)?;
        }
        Ok(())
    }

    fn placeholders(&self, node: NodeId) -> Vec<NodeId> {
        self.dom
            .children(node)
            .into_iter()
            .filter(|c| self.dom.matches(*c, &self.placeholder))
            .collect()
    }

    fn ensure_placeholder(&self, node: NodeId, message_id: &str, username: Option<&str>) -> Result<(), Error> {
        if !self.placeholders(node).is_empty() {
            return Ok(());
        }
        let text = match (self.placeholder_preview, username) {
            (true, Some(name)) => format!("Message from {}...", name),
            _ => "Hidden message".to_string(),
        };
        let placeholder = self.dom.create_element("div");
        self.dom.add_class(placeholder, PLACEHOLDER_CLASS)?;
        self.dom.set_attribute(placeholder, TARGET_ATTR, message_id)?;
        let label = self.dom.create_text(&text);
        self.dom.append_child(placeholder, label)?;
        self.dom.append_child(node, placeholder)
    }

    fn remove_placeholders(&self, node: NodeId) -> Result<(), Error> {
        for p in self.placeholders(node) {
            self.dom.remove(p)?;
        }
        Ok(())
    }

    /// Text of the placeholder currently attached to `node`.
    pub fn placeholder_text(&self, node: NodeId) -> Option<String> {
        self.placeholders(node).first().map(|p| self.dom.text_content(*p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::helpers::ChatPage;

    fn applier(page: &ChatPage) -> DomApplier {
        DomApplier::new(page.dom.clone(), 2000, true)
    }

    #[test]
    fn test_collapse_twice_is_idempotent() {
        let page = ChatPage::new().unwrap();
        let m = page.push(Some("bob"), "spam").unwrap();
        let a = applier(&page);
        let id = page.id_of(m);
        a.apply(m, &id, FilterAction::Collapse, Some("bob"), false).unwrap();
        let rev = page.dom.revision();
        let children = page.dom.children(m).len();
        a.apply(m, &id, FilterAction::Collapse, Some("bob"), false).unwrap();
        assert_eq!(page.dom.revision(), rev, "second apply must not change anything");
        assert_eq!(page.dom.children(m).len(), children);
        assert_eq!(a.placeholder_text(m).as_deref(), Some("Message from bob..."));
    }

    #[test]
    fn test_collapse_suppresses_nested_text() {
        let page = ChatPage::new().unwrap();
        let m = page.push(Some("bob"), "spam").unwrap();
        let a = applier(&page);
        a.apply(m, &page.id_of(m), FilterAction::Collapse, Some("bob"), false).unwrap();
        let content = page.content_of(m).unwrap();
        assert_eq!(page.dom.style(content, "opacity").as_deref(), Some("0"));
        assert!(page.dom.class_list(m).contains(&COLLAPSED_CLASS.to_string()));
        // placeholder text stays readable
        let placeholder = page.dom.query_first(m, &Marker::class(PLACEHOLDER_CLASS)).unwrap();
        assert_eq!(page.dom.style(placeholder, "opacity"), None);
    }

    #[test]
    fn test_remove_then_show_restores() {
        let page = ChatPage::new().unwrap();
        let m = page.push(Some("bob"), "spam").unwrap();
        let a = applier(&page);
        let id = page.id_of(m);
        a.apply(m, &id, FilterAction::Remove, Some("bob"), false).unwrap();
        assert_eq!(page.dom.style(m, "display").as_deref(), Some("none"));
        assert!(page.dom.is_connected(m));

        a.apply(m, &id, FilterAction::Show, Some("bob"), true).unwrap();
        assert_eq!(page.dom.style(m, "display"), None);
        let content = page.content_of(m).unwrap();
        assert_eq!(page.dom.style(content, "opacity"), None);
        assert_eq!(page.dom.attribute(content, SUPPRESSED_ATTR), None);
        assert!(page.dom.class_list(m).contains(&WHITELISTED_CLASS.to_string()));
        assert_eq!(a.current_action(m), Some(FilterAction::Show));
    }

    #[test]
    fn test_collapse_to_remove_drops_placeholder() {
        let page = ChatPage::new().unwrap();
        let m = page.push(Some("bob"), "spam").unwrap();
        let a = applier(&page);
        let id = page.id_of(m);
        a.apply(m, &id, FilterAction::Collapse, Some("bob"), false).unwrap();
        a.apply(m, &id, FilterAction::Remove, Some("bob"), false).unwrap();
        assert_eq!(a.placeholder_text(m), None);
        assert!(!page.dom.class_list(m).contains(&COLLAPSED_CLASS.to_string()));
    }

    #[test]
    fn test_restore_clears_state_marker() {
        let page = ChatPage::new().unwrap();
        let m = page.push(Some("bob"), "spam").unwrap();
        let a = applier(&page);
        a.apply(m, &page.id_of(m), FilterAction::Collapse, None, false).unwrap();
        assert_eq!(a.placeholder_text(m).as_deref(), Some("Hidden message"));
        a.restore(m).unwrap();
        assert_eq!(a.current_action(m), None);
        assert_eq!(a.placeholder_text(m), None);
    }
}
