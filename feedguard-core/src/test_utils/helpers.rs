// File: feedguard-core/src/test_utils/helpers.rs
//
// Builders for Discord-shaped pages in a `MemoryDom`, shared by unit and
// integration tests and by the CLI's demo page.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use feedguard_common::models::NodeId;
use feedguard_common::traits::HostDom;
use crate::dom::MemoryDom;
use crate::Error;

/// A page with one message list, the shape the default selectors expect.
pub struct ChatPage {
    pub dom: Arc<MemoryDom>,
    pub list: NodeId,
    next_message: AtomicU64,
}

impl ChatPage {
    pub fn new() -> Result<Self, Error> {
        let dom = Arc::new(MemoryDom::new());
        let main = dom.element("main", &["chatContent_a1"], &[]);
        dom.append_child(dom.document(), main)?;
        let list = dom.element("ol", &["scrollerInner_b2"], &[("data-list-id", "chat-messages")]);
        dom.append_child(main, list)?;
        Ok(Self { dom, list, next_message: AtomicU64::new(1) })
    }

    pub fn message_id(n: u64) -> String {
        format!("chat-messages-1-{}", n)
    }

    fn next_id(&self) -> String {
        Self::message_id(self.next_message.fetch_add(1, Ordering::SeqCst))
    }

    /// Build a detached message. `author: None` renders a grouped continuation.
    pub fn build_message(&self, author: Option<&str>, text: &str) -> Result<NodeId, Error> {
        self.build_with_reply(None, author, text)
    }

    fn build_with_reply(&self, replied_to: Option<&str>, author: Option<&str>, text: &str) -> Result<NodeId, Error> {
        let dom = &self.dom;
        let id = self.next_id();
        let li = dom.element("li", &["messageListItem_c3"], &[("id", id.as_str())]);
        let classes: Vec<&str> = if author.is_some() {
            vec!["message_d4", "groupStart_e5"]
        } else {
            vec!["message_d4"]
        };
        let body = dom.element("div", &classes, &[("role", "article")]);
        dom.append_child(li, body)?;
        let contents = dom.element("div", &["contents_f6"], &[]);
        dom.append_child(body, contents)?;

        if let Some(target) = replied_to {
            let reply = dom.element("div", &["repliedMessage_g7"], &[]);
            dom.append_child(contents, reply)?;
            let who = dom.element("span", &["username_h8"], &[]);
            dom.append_child(reply, who)?;
            dom.append_text(who, target)?;
            let preview = dom.element("div", &["repliedTextPreview_i9"], &[]);
            dom.append_child(reply, preview)?;
            dom.append_text(preview, "earlier message")?;
        }

        if let Some(name) = author {
            let header = dom.element("h3", &["header_j0"], &[]);
            dom.append_child(contents, header)?;
            let header_text = dom.element("span", &["headerText_k1"], &[]);
            dom.append_child(header, header_text)?;
            let who = dom.element("span", &["username_h8", "desaturateUserColors_l2"], &[]);
            dom.append_child(header_text, who)?;
            dom.append_text(who, name)?;
        }

        let content = dom.element("div", &["messageContent_m3"], &[]);
        dom.append_child(contents, content)?;
        dom.append_text(content, text)?;
        Ok(li)
    }

    /// Append a message to the list and return its node.
    pub fn push(&self, author: Option<&str>, text: &str) -> Result<NodeId, Error> {
        let li = self.build_message(author, text)?;
        self.dom.append_child(self.list, li)?;
        Ok(li)
    }

    /// Append a reply whose preview names `replied_to`.
    pub fn push_reply(&self, replied_to: &str, author: Option<&str>, text: &str) -> Result<NodeId, Error> {
        let li = self.build_with_reply(Some(replied_to), author, text)?;
        self.dom.append_child(self.list, li)?;
        Ok(li)
    }

    /// Append a non-message row (date divider).
    pub fn push_divider(&self, label: &str) -> Result<NodeId, Error> {
        let div = self.dom.element("div", &["divider_n4"], &[("role", "separator")]);
        self.dom.append_text(div, label)?;
        self.dom.append_child(self.list, div)?;
        Ok(div)
    }

    /// Id attribute of a message node built by this page.
    pub fn id_of(&self, node: NodeId) -> String {
        self.dom.attribute(node, "id").unwrap_or_default()
    }

    /// Content element of a message (the part the host renders text into).
    pub fn content_of(&self, node: NodeId) -> Option<NodeId> {
        self.dom
            .query_first(node, &feedguard_common::models::Marker::class_prefix("messageContent_"))
    }
}
