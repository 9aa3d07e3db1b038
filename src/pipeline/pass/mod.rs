//! Sanitization passes.
//!
//! A pass is one ordered tree-mutation stage. The pipeline builds every pass
//! through its registered factory, hands each the ids of its siblings, then
//! runs them strictly in order.
//!
//! | Id                  | Effect                                              |
//! |---------------------|-----------------------------------------------------|
//! | `embed`             | `<iframe>`/`<video>` to components via embed handlers |
//! | `img`               | `<img>` to `amp-img` / `amp-anim` / `amp-pixel`     |
//! | `tag_and_attribute` | allowlist enforcement against the rule repository   |

pub mod embed;
pub mod img;
pub mod tag_and_attribute;

use std::sync::Arc;

use thiserror::Error;

use super::context::{SanitizationContext, SanitizeOptions, Stylesheet};
use crate::dimensions::{DimensionExtractor, NullExtractor};
use crate::dom::Document;
use crate::embed::EmbedRegistry;
use crate::spec::{Format, SpecError, SpecRepository};

pub trait SanitizationPass {
    /// Stable registry id.
    fn id(&self) -> &'static str;

    /// Bind expectations about sibling passes before any mutation.
    fn init(&mut self, _siblings: &PassSiblings) {}

    fn sanitize(
        &mut self,
        doc: &mut Document,
        ctx: &mut SanitizationContext,
    ) -> Result<(), PassError>;

    /// Extension scripts needed by what this pass produced.
    fn scripts(&self) -> Vec<String> {
        Vec::new()
    }

    fn stylesheets(&self) -> Vec<Stylesheet> {
        Vec::new()
    }
}

#[derive(Debug, Error)]
pub enum PassError {
    #[error("unknown argument `{key}` for pass `{pass}`")]
    UnknownArg { pass: String, key: String },

    #[error("invalid argument `{key}` for pass `{pass}`: {message}")]
    InvalidArg {
        pass: String,
        key: String,
        message: String,
    },

    #[error("invalid options for pass `{pass}`")]
    Options {
        pass: String,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error("{0}")]
    Failed(String),
}

/// Ids of all constructed passes, in run order, seen from one pass.
#[derive(Debug, Clone)]
pub struct PassSiblings {
    ids: Vec<&'static str>,
    position: usize,
}

impl PassSiblings {
    pub fn new(ids: Vec<&'static str>, position: usize) -> Self {
        Self { ids, position }
    }

    pub fn ids(&self) -> &[&'static str] {
        &self.ids
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(&id)
    }

    /// Whether `id` runs after the observing pass.
    pub fn runs_after(&self, id: &str) -> bool {
        self.ids
            .iter()
            .position(|&i| i == id)
            .is_some_and(|pos| pos > self.position)
    }

    /// Whether `id` runs before the observing pass.
    pub fn runs_before(&self, id: &str) -> bool {
        self.ids
            .iter()
            .position(|&i| i == id)
            .is_some_and(|pos| pos < self.position)
    }
}

/// Options merged with per-pass overrides, plus pass-specific extras.
#[derive(Debug, Clone, Default)]
pub struct PassArgs {
    pub options: SanitizeOptions,
    pub extra: toml::Table,
}

impl PassArgs {
    /// Overlay `overrides` on the shared options.
    ///
    /// Keys naming a [`SanitizeOptions`] field replace that field; every other
    /// key lands in `extra` for the pass factory to check.
    pub fn merge(
        pass: &str,
        base: &SanitizeOptions,
        overrides: Option<&toml::Table>,
    ) -> Result<Self, PassError> {
        let Some(overrides) = overrides.filter(|o| !o.is_empty()) else {
            return Ok(Self {
                options: base.clone(),
                extra: toml::Table::new(),
            });
        };

        let mut merged = toml::Value::try_from(base).map_err(|e| PassError::InvalidArg {
            pass: pass.to_string(),
            key: "*".to_string(),
            message: e.to_string(),
        })?;
        let mut extra = toml::Table::new();
        if let Some(table) = merged.as_table_mut() {
            for (key, value) in overrides {
                if SanitizeOptions::FIELDS.contains(&key.as_str()) {
                    table.insert(key.clone(), value.clone());
                } else {
                    extra.insert(key.clone(), value.clone());
                }
            }
        }

        let options = merged.try_into().map_err(|source| PassError::Options {
            pass: pass.to_string(),
            source,
        })?;
        Ok(Self { options, extra })
    }

    /// Reject extras the pass does not understand.
    pub fn expect_only(&self, pass: &str, allowed: &[&str]) -> Result<(), PassError> {
        match self.extra.keys().find(|k| !allowed.contains(&k.as_str())) {
            Some(key) => Err(PassError::UnknownArg {
                pass: pass.to_string(),
                key: key.clone(),
            }),
            None => Ok(()),
        }
    }

    /// A string-list extra, e.g. `handlers = ["iframe"]`.
    pub fn string_list(&self, pass: &str, key: &str) -> Result<Option<Vec<String>>, PassError> {
        let Some(value) = self.extra.get(key) else {
            return Ok(None);
        };
        let invalid = || PassError::InvalidArg {
            pass: pass.to_string(),
            key: key.to_string(),
            message: "expected an array of strings".to_string(),
        };
        let array = value.as_array().ok_or_else(invalid)?;
        array
            .iter()
            .map(|v| v.as_str().map(str::to_string).ok_or_else(invalid))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

/// Typed collaborators handed to every factory.
#[derive(Clone)]
pub struct PassDeps {
    pub rules: Arc<SpecRepository>,
    pub dimensions: Arc<dyn DimensionExtractor>,
    pub embeds: Arc<EmbedRegistry>,
}

impl PassDeps {
    pub fn new(rules: Arc<SpecRepository>) -> Self {
        Self {
            rules,
            dimensions: Arc::new(NullExtractor),
            embeds: Arc::new(EmbedRegistry::with_defaults()),
        }
    }

    /// Bundled AMP rules, no dimension source, default embed handlers.
    pub fn bundled() -> Self {
        Self::new(SpecRepository::bundled(Format::Amp))
    }

    pub fn with_dimensions(mut self, dimensions: Arc<dyn DimensionExtractor>) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_embeds(mut self, embeds: Arc<EmbedRegistry>) -> Self {
        self.embeds = embeds;
        self
    }
}

impl std::fmt::Debug for PassDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassDeps")
            .field("format", &self.rules.format())
            .field("embeds", &self.embeds.names())
            .finish_non_exhaustive()
    }
}
