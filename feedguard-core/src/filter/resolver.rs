// File: feedguard-core/src/filter/resolver.rs

use std::sync::Arc;
use tracing::{debug, trace};

use feedguard_common::models::{Marker, NodeId};
use feedguard_common::traits::HostDom;
use crate::config::{FilterConfig, HostSelectors};

/// Works out who wrote a rendered message.
///
/// The host only marks the author on the first message of a visual group,
/// so continuation messages are resolved by walking back through earlier
/// siblings. Resolution never fails loudly: `None` means "not a user
/// message as far as we can tell", and callers leave such messages visible.
pub struct IdentityResolver {
    dom: Arc<dyn HostDom>,
    selectors: HostSelectors,
    max_hops: usize,
    max_username_len: usize,
}

impl IdentityResolver {
    pub fn new(dom: Arc<dyn HostDom>, config: &FilterConfig) -> Self {
        Self {
            dom,
            selectors: config.selectors.clone(),
            max_hops: config.max_backward_hops,
            max_username_len: config.max_username_len,
        }
    }

    pub fn is_message(&self, node: NodeId) -> bool {
        self.dom.matches(node, &self.selectors.message)
    }

    /// Host-assigned stable id, if `node` is a message.
    pub fn message_id(&self, node: NodeId) -> Option<String> {
        if !self.is_message(node) {
            return None;
        }
        self.dom
            .attribute(node, &self.selectors.message_id_attr)
            .filter(|id| !id.trim().is_empty())
    }

    /// Full resolution: direct markup first, then grouped-message inheritance.
    pub fn extract_username(&self, node: NodeId) -> Option<String> {
        if let Some(name) = self.direct_username(node) {
            return Some(name);
        }
        if self.has_marker(node, &self.selectors.group_start) {
            // A group head without a readable name: nothing to inherit from.
            debug!("Message {} starts a group but has no readable author", node);
            return None;
        }
        self.inherit_from_group(node)
    }

    /// Steps that only look inside `node` itself.
    pub fn direct_username(&self, node: NodeId) -> Option<String> {
        self.header_username(node)
            .or_else(|| self.reply_author(node))
            .or_else(|| self.fallback_username(node))
    }

    // (1) the header's username marker, ignoring the one inside a reply preview
    fn header_username(&self, node: NodeId) -> Option<String> {
        self.dom
            .query_all(node, &self.selectors.username)
            .into_iter()
            .filter(|el| !self.inside_reply(node, *el))
            .find_map(|el| non_empty(self.dom.text_content(el)))
    }

    // (2) reply-to preview author
    fn reply_author(&self, node: NodeId) -> Option<String> {
        self.dom
            .query_all(node, &self.selectors.reply_container)
            .into_iter()
            .find_map(|reply| {
                self.dom
                    .query_first(reply, &self.selectors.username)
                    .and_then(|el| non_empty(self.dom.text_content(el)))
            })
    }

    // (3) anything whose class mentions "username", with a length cutoff
    fn fallback_username(&self, node: NodeId) -> Option<String> {
        self.dom
            .query_all(node, &self.selectors.username_fallback)
            .into_iter()
            .filter_map(|el| non_empty(self.dom.text_content(el)))
            .find(|name| {
                let ok = name.chars().count() <= self.max_username_len;
                if !ok {
                    trace!("Rejecting {}-char username candidate", name.chars().count());
                }
                ok
            })
    }

    // (4) walk back through preceding siblings, at most `max_hops` of them
    fn inherit_from_group(&self, node: NodeId) -> Option<String> {
        let mut current = node;
        for hop in 1..=self.max_hops {
            let prev = self.dom.previous_element_sibling(current)?;
            current = prev;
            if !self.is_message(prev) {
                continue;
            }
            if let Some(name) = self.direct_username(prev) {
                debug!("Message {} inherits author '{}' from {} ({} hops back)", node, name, prev, hop);
                return Some(name);
            }
            if self.has_marker(prev, &self.selectors.group_start) {
                debug!("Backward search for {} stopped at unreadable group head {}", node, prev);
                return None;
            }
        }
        debug!("Backward search for {} gave up after {} hops", node, self.max_hops);
        None
    }

    fn has_marker(&self, node: NodeId, marker: &Marker) -> bool {
        self.dom.matches(node, marker) || self.dom.query_first(node, marker).is_some()
    }

    fn inside_reply(&self, message: NodeId, el: NodeId) -> bool {
        match self.dom.closest(el, &self.selectors.reply_container) {
            Some(reply) => self.dom.contains(message, reply),
            None => false,
        }
    }
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
