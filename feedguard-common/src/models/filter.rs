use serde::{Deserialize, Serialize};

/// What to do with one rendered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterAction {
    Show,
    /// Dimmed, content suppressed, placeholder shown, click-to-expand.
    Collapse,
    /// Hidden from layout, but the node stays attached and can be restored.
    Remove,
}

impl FilterAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterAction::Show => "show",
            FilterAction::Collapse => "collapse",
            FilterAction::Remove => "remove",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "show" => Some(FilterAction::Show),
            "collapse" => Some(FilterAction::Collapse),
            "remove" => Some(FilterAction::Remove),
            _ => None,
        }
    }

    pub fn suppresses(&self) -> bool {
        !matches!(self, FilterAction::Show)
    }
}

/// Cached outcome of resolving one message id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterResult {
    pub username: Option<String>,
    pub is_whitelisted: bool,
}

/// Counters since the last explicit reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStats {
    pub processed: u64,
    pub filtered: u64,
    pub whitelisted: u64,
}
