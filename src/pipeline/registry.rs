//! Pass id → factory table.

use rustc_hash::FxHashMap;

use super::pass::{
    PassArgs, PassDeps, PassError, SanitizationPass, embed::EmbedPass, img::ImgPass,
    tag_and_attribute::TagAndAttributePass,
};
use crate::dom::Document;

/// Builds a pass for one run.
pub type PassFactory =
    fn(&Document, &PassArgs, &PassDeps) -> Result<Box<dyn SanitizationPass>, PassError>;

/// Order used when no pass list is configured.
pub const DEFAULT_PASSES: &[&str] = &[
    super::pass::embed::ID,
    super::pass::img::ID,
    super::pass::tag_and_attribute::ID,
];

#[derive(Clone)]
pub struct PassRegistry {
    factories: FxHashMap<&'static str, PassFactory>,
    /// Registration order, for listings.
    order: Vec<&'static str>,
}

impl Default for PassRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl PassRegistry {
    pub fn empty() -> Self {
        Self {
            factories: FxHashMap::default(),
            order: Vec::new(),
        }
    }

    /// Registry holding the bundled passes.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(super::pass::embed::ID, EmbedPass::factory);
        registry.register(super::pass::img::ID, ImgPass::factory);
        registry.register(super::pass::tag_and_attribute::ID, TagAndAttributePass::factory);
        registry
    }

    /// Add or replace a factory.
    pub fn register(&mut self, id: &'static str, factory: PassFactory) {
        if self.factories.insert(id, factory).is_none() {
            self.order.push(id);
        }
    }

    pub fn get(&self, id: &str) -> Option<PassFactory> {
        self.factories.get(id).copied()
    }

    /// Registered ids, in registration order.
    pub fn ids(&self) -> &[&'static str] {
        &self.order
    }

    /// Configured ids with no factory.
    pub fn unknown<'a>(&self, ids: &'a [String]) -> Vec<&'a str> {
        ids.iter()
            .map(String::as_str)
            .filter(|id| !self.factories.contains_key(id))
            .collect()
    }
}

impl std::fmt::Debug for PassRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassRegistry")
            .field("ids", &self.order)
            .finish()
    }
}
