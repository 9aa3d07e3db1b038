//! Arena-backed document tree.
//!
//! All nodes live in one `Vec` and are referenced by [`NodeId`]. Parent and
//! child links are indices, so passes can hold ids across mutations without
//! aliasing. Detached nodes stay in the arena until the document is dropped;
//! [`Document::is_attached`] tells live nodes from orphans.
//!
//! # Mutation primitives
//!
//! | Operation       | Effect                                             |
//! |-----------------|----------------------------------------------------|
//! | `append_child`  | Detach `child`, push it under `parent`             |
//! | `insert_before` | Detach `child`, insert it before `reference`       |
//! | `replace`       | Put `new` at `old`'s position, detach `old`        |
//! | `remove`        | Detach a subtree                                   |
//! | `unwrap`        | Move children into the parent, detach the element  |
//! | `deep_clone`    | Copy a subtree into fresh, detached slots          |

mod node;
mod parse;
mod serialize;

pub use node::{Attributes, Element, NodeId, NodeKind};
pub use parse::parse;
pub use serialize::{serialize, serialize_node};

/// Attribute that marks an element as exempt from sanitization in dev mode.
pub const DEV_MODE_ATTR: &str = "data-ampdevmode";

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A parsed document owned by exactly one sanitization run.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    /// Doctype name (`html`) when the source declared one.
    pub doctype: Option<String>,
    dev_mode: bool,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
            root: NodeId(0),
            doctype: None,
            dev_mode: false,
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(elem) => Some(elem),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element(elem) => Some(elem),
            _ => None,
        }
    }

    /// Tag name of an element node.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag.as_str())
    }

    #[inline]
    pub fn is_tag(&self, id: NodeId, tag: &str) -> bool {
        self.tag(id) == Some(tag)
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.get_attr(name))
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Parent, only if it is an element (not the document root).
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|&p| self.element(p).is_some())
    }

    #[inline]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Element ancestors, nearest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent_element(id), move |&p| self.parent_element(p))
    }

    /// All nodes below `id` in document order (excluding `id`).
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// Attached elements in document order.
    pub fn elements(&self) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|&id| self.element(id).is_some())
            .collect()
    }

    /// Snapshot of attached elements with the given tag, in document order.
    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|&id| self.is_tag(id, tag))
            .collect()
    }

    /// Whether the node is reachable from the document root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent(current) {
                Some(p) => current = p,
                None => return false,
            }
        }
    }

    // ========================================================================
    // dev mode
    // ========================================================================

    /// Whether `data-ampdevmode` exemptions are honored.
    #[inline]
    pub fn dev_mode(&self) -> bool {
        self.dev_mode
    }

    pub fn set_dev_mode(&mut self, enabled: bool) {
        self.dev_mode = enabled;
    }

    /// Whether sanitizers must leave this element alone.
    pub fn is_exempt(&self, id: NodeId) -> bool {
        self.dev_mode && self.element(id).is_some_and(|e| e.exempt)
    }

    // ========================================================================
    // construction
    // ========================================================================

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str, attrs: Attributes) -> NodeId {
        self.push(NodeKind::Element(Element::new(tag, attrs)))
    }

    /// Create a detached node from a prepared element.
    pub fn adopt_element(&mut self, elem: Element) -> NodeId {
        self.push(NodeKind::Element(elem))
    }

    /// Create a detached raw text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Comment(text.into()))
    }

    // ========================================================================
    // mutation
    // ========================================================================

    /// Remove a node from its parent's child list. No-op when detached.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Remove a subtree from the tree.
    #[inline]
    pub fn remove(&mut self, id: NodeId) {
        self.detach(id);
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Insert `child` before `reference`; appends when `reference` is not a child.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) {
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        match children.iter().position(|&c| c == reference) {
            Some(pos) => children.insert(pos, child),
            None => children.push(child),
        }
        self.nodes[child.0].parent = Some(parent);
    }

    /// Put `new` where `old` is and detach `old`. No-op when `old` is detached.
    pub fn replace(&mut self, old: NodeId, new: NodeId) {
        if old == new {
            return;
        }
        let Some(parent) = self.parent(old) else {
            return;
        };
        self.insert_before(parent, new, old);
        self.detach(old);
    }

    /// Replace an element with its children.
    pub fn unwrap(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
            self.insert_before(parent, child, id);
        }
        self.detach(id);
    }

    /// Keep `original` under a `<noscript>` appended to `host`.
    pub fn append_fallback(&mut self, host: NodeId, original: NodeId) -> NodeId {
        let noscript = self.create_element("noscript", Attributes::new());
        self.append_child(noscript, original);
        self.append_child(host, noscript);
        noscript
    }

    /// Copy a subtree into new detached slots.
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let copy = self.push(self.nodes[id.0].kind.clone());
        let children = self.nodes[id.0].children.clone();
        for child in children {
            let child_copy = self.deep_clone(child);
            self.append_child(copy, child_copy);
        }
        copy
    }
}
