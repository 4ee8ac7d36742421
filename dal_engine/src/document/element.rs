use super::{Tag, VoNode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Owned document node.
///
/// JSON form: `{"tag": "FIELD", "attrs": {"name": "ra"}, "text": "...",
/// "children": [...]}`; every key except `tag` may be omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub tag: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: BTreeMap::new(),
            text: None,
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn td(text: impl Into<String>) -> Self {
        Self::new("TD").with_text(text)
    }

    pub fn tr<S: Into<String>>(cells: impl IntoIterator<Item = S>) -> Self {
        Self::new("TR").with_children(cells.into_iter().map(Self::td))
    }
}

impl VoNode for Element {
    fn tag(&self) -> Tag {
        Tag::from_name(&self.tag)
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn value(&self) -> Option<&str> {
        self.text.as_deref()
    }

    fn children(&self) -> impl Iterator<Item = &Self> {
        self.children.iter()
    }
}
