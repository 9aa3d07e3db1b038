//! Node payloads: elements, attributes, text.

use smallvec::SmallVec;

/// Index of a node inside a [`Document`](super::Document) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(super) usize);

impl NodeId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Payload of a single arena slot.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Synthetic document root; never serialized itself.
    Root,
    Element(Element),
    /// Raw source text, emitted verbatim.
    Text(String),
    Comment(String),
}

/// Ordered attribute map.
///
/// Names are stored lowercase; values are entity-decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(SmallVec<[(String, String); 6]>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has(&self, name: &str) -> bool {
        self.0.iter().any(|(k, _)| k == name)
    }

    /// Set a value, keeping the original position when the name exists.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let pos = self.0.iter().position(|(k, _)| k == name)?;
        Some(self.0.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = Self::new();
        for (k, v) in iter {
            attrs.set(k, v);
        }
        attrs
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for Attributes {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// Element node: tag name, attributes, dev-mode exemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lowercase tag name.
    pub tag: String,
    pub attrs: Attributes,
    /// Carries `data-ampdevmode`; honored only when the document is in dev mode.
    pub exempt: bool,
}

impl Element {
    pub fn new(tag: impl Into<String>, attrs: Attributes) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attrs,
            exempt: false,
        }
    }

    #[inline]
    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag == tag
    }

    #[inline]
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name)
    }

    #[inline]
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.has(name)
    }

    #[inline]
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attrs.set(name, value);
    }

    #[inline]
    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        self.attrs.remove(name)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.get_attr("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    pub fn add_class(&mut self, class: &str) {
        let merged = crate::utils::html::merge_classes(self.get_attr("class").unwrap_or(""), [class]);
        self.set_attr("class", merged);
    }
}
