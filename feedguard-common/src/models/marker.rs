use serde::{Deserialize, Serialize};

/// A tiny selector vocabulary, enough to describe the host's message markup
/// without pulling in a CSS engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Marker {
    Tag { name: String },
    Class { name: String },
    ClassPrefix { prefix: String },
    ClassContains { needle: String },
    AttrPresent { name: String },
    AttrEquals { name: String, value: String },
    AttrPrefix { name: String, prefix: String },
    All { of: Vec<Marker> },
    Any { of: Vec<Marker> },
}

impl Marker {
    pub fn class(name: &str) -> Self {
        Marker::Class { name: name.to_string() }
    }

    pub fn class_prefix(prefix: &str) -> Self {
        Marker::ClassPrefix { prefix: prefix.to_string() }
    }

    pub fn class_contains(needle: &str) -> Self {
        Marker::ClassContains { needle: needle.to_string() }
    }

    pub fn attr_equals(name: &str, value: &str) -> Self {
        Marker::AttrEquals { name: name.to_string(), value: value.to_string() }
    }

    pub fn attr_prefix(name: &str, prefix: &str) -> Self {
        Marker::AttrPrefix { name: name.to_string(), prefix: prefix.to_string() }
    }

    /// Match against the parts of an element. `attr` looks up an attribute by name.
    pub fn matches_parts<F>(&self, tag: &str, classes: &[String], attr: &F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        match self {
            Marker::Tag { name } => tag.eq_ignore_ascii_case(name),
            Marker::Class { name } => classes.iter().any(|c| c == name),
            Marker::ClassPrefix { prefix } => classes.iter().any(|c| c.starts_with(prefix.as_str())),
            Marker::ClassContains { needle } => classes.iter().any(|c| c.contains(needle.as_str())),
            Marker::AttrPresent { name } => attr(name).is_some(),
            Marker::AttrEquals { name, value } => attr(name).as_deref() == Some(value.as_str()),
            Marker::AttrPrefix { name, prefix } => attr(name)
                .map(|v| v.starts_with(prefix.as_str()))
                .unwrap_or(false),
            Marker::All { of } => of.iter().all(|m| m.matches_parts(tag, classes, attr)),
            Marker::Any { of } => of.iter().any(|m| m.matches_parts(tag, classes, attr)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_class_markers() {
        let cls = classes(&["username_f9f2ca", "desaturateUserColors_b72bd3"]);
        let no_attr = |_: &str| None;
        assert!(Marker::class_prefix("username_").matches_parts("span", &cls, &no_attr));
        assert!(Marker::class_contains("Colors").matches_parts("span", &cls, &no_attr));
        assert!(!Marker::class("username").matches_parts("span", &cls, &no_attr));
    }

    #[test]
    fn test_attr_and_combinators() {
        let attr = |name: &str| {
            if name == "id" { Some("chat-messages-1-2".to_string()) } else { None }
        };
        let msg = Marker::attr_prefix("id", "chat-messages-");
        assert!(msg.matches_parts("li", &[], &attr));
        let both = Marker::All { of: vec![msg.clone(), Marker::Tag { name: "LI".into() }] };
        assert!(both.matches_parts("li", &[], &attr));
        let either = Marker::Any { of: vec![Marker::attr_equals("role", "article"), msg] };
        assert!(either.matches_parts("div", &[], &attr));
    }

    #[test]
    fn test_marker_json_round_shape() {
        let m: Marker = serde_json::from_str(r#"{"kind":"class_prefix","prefix":"username_"}"#).unwrap();
        assert_eq!(m, Marker::class_prefix("username_"));
    }
}
