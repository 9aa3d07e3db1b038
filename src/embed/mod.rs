//! Embed handlers.
//!
//! An embed handler turns one family of third-party markup into its dialect
//! component and names the extension scripts it needs. The `embed` pass runs
//! every registered handler in registration order.
//!
//! # Module Structure
//!
//! - `iframe` - `<iframe>` to `amp-iframe`
//! - `video` - `<video>` to `amp-video`

mod iframe;
mod video;

pub use iframe::IframeEmbed;
pub use video::VideoEmbed;

use crate::dom::{Document, NodeId};
use crate::layout::parse_pixels;
use crate::pipeline::SanitizationContext;

pub trait EmbedHandler: Send + Sync {
    /// Registry key.
    fn name(&self) -> &'static str;

    /// Convert matching elements; returns how many were produced.
    fn sanitize(&self, doc: &mut Document, ctx: &mut SanitizationContext) -> usize;

    fn scripts(&self) -> &'static [&'static str];
}

/// Ordered set of handlers, keyed by name.
#[derive(Default)]
pub struct EmbedRegistry {
    handlers: Vec<Box<dyn EmbedHandler>>,
}

impl EmbedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the bundled handlers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(IframeEmbed));
        registry.register(Box::new(VideoEmbed));
        registry
    }

    /// Add a handler, replacing one registered under the same name.
    pub fn register(&mut self, handler: Box<dyn EmbedHandler>) {
        match self.handlers.iter().position(|h| h.name() == handler.name()) {
            Some(pos) => self.handlers[pos] = handler,
            None => self.handlers.push(handler),
        }
    }

    pub fn unregister(&mut self, name: &str) -> Option<Box<dyn EmbedHandler>> {
        let pos = self.handlers.iter().position(|h| h.name() == name)?;
        Some(self.handlers.remove(pos))
    }

    pub fn handlers(&self) -> impl Iterator<Item = &dyn EmbedHandler> {
        self.handlers.iter().map(|h| h.as_ref())
    }

    pub fn get(&self, name: &str) -> Option<&dyn EmbedHandler> {
        self.handlers().find(|h| h.name() == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Every script any registered handler may need, deduplicated.
    pub fn scripts(&self) -> Vec<&'static str> {
        let mut scripts = Vec::new();
        for script in self.handlers.iter().flat_map(|h| h.scripts()) {
            if !scripts.contains(script) {
                scripts.push(*script);
            }
        }
        scripts
    }
}

/// Elements with `tag` a handler may rewrite: attached, not exempt, not a fallback.
pub(crate) fn candidates(doc: &Document, tag: &str) -> Vec<NodeId> {
    doc.elements_by_tag(tag)
        .into_iter()
        .filter(|&id| !doc.is_exempt(id) && !doc.ancestors(id).any(|a| doc.is_tag(a, "noscript")))
        .collect()
}

/// Numeric attribute value, or the default.
pub(crate) fn pixels_or(doc: &Document, id: NodeId, name: &str, default: u32) -> String {
    doc.attr(id, name)
        .and_then(parse_pixels)
        .unwrap_or(default)
        .to_string()
}
