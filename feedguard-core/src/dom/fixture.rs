// File: feedguard-core/src/dom/fixture.rs

use std::collections::BTreeMap;
use std::path::Path;
use serde::{Deserialize, Serialize};

use feedguard_common::models::NodeId;
use feedguard_common::traits::HostDom;
use crate::dom::memory::MemoryDom;
use crate::Error;

/// Serialisable description of a page, used to seed a `MemoryDom`.
///
/// ```json
/// { "tag": "li", "attrs": { "id": "chat-messages-1-2" },
///   "children": [ { "tag": "span", "classes": ["username_a1"], "text": "alice" } ] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFixture {
    pub tag: String,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    /// Leading text child, emitted before `children`.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub children: Vec<PageFixture>,
}

impl PageFixture {
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}

impl MemoryDom {
    /// Build `fixture` under `parent`, returning the new subtree's root.
    pub fn build_fixture(&self, parent: NodeId, fixture: &PageFixture) -> Result<NodeId, Error> {
        let classes: Vec<&str> = fixture.classes.iter().map(String::as_str).collect();
        let attrs: Vec<(&str, &str)> = fixture
            .attrs
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let el = self.element(&fixture.tag, &classes, &attrs);
        if let Some(text) = &fixture.text {
            self.append_text(el, text)?;
        }
        for child in &fixture.children {
            self.build_fixture(el, child)?;
        }
        // Attach last so observers see one insertion for the whole subtree.
        self.append_child(parent, el)?;
        Ok(el)
    }

    pub fn from_fixture(fixture: &PageFixture) -> Result<Self, Error> {
        let dom = MemoryDom::new();
        dom.build_fixture(dom.document(), fixture)?;
        Ok(dom)
    }
}
