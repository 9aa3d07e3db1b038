//! `[pipeline]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [pipeline]
//! passes = ["embed", "img", "tag_and_attribute"]
//! format = "AMP"                    # AMP | AMP4EMAIL
//!
//! [pipeline.args.img]
//! native_img_used = true            # Overrides [sanitizer] for this pass only
//!
//! [pipeline.args.embed]
//! handlers = ["iframe"]             # Pass-specific extras
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};
use crate::dom::Document;
use crate::pipeline::pass::{PassArgs, PassDeps};
use crate::pipeline::{DEFAULT_PASSES, PassArgsTable, PassRegistry, SanitizeOptions};
use crate::spec::Format;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pass ids, in run order.
    pub passes: Vec<String>,

    /// Rule dialect.
    pub format: Format,

    /// Per-pass overrides, keyed by pass id.
    pub args: toml::Table,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            passes: DEFAULT_PASSES.iter().map(|id| id.to_string()).collect(),
            format: Format::default(),
            args: toml::Table::new(),
        }
    }
}

impl PipelineConfig {
    pub const PASSES: FieldPath = FieldPath::new("pipeline.passes");
    pub const ARGS: FieldPath = FieldPath::new("pipeline.args");

    /// Check pass ids and per-pass args against `registry`.
    ///
    /// Args are test-merged over `options` and handed to each factory with an
    /// empty document, so contract violations surface before any file is read.
    pub fn validate(
        &self,
        registry: &PassRegistry,
        options: &SanitizeOptions,
        diag: &mut ConfigDiagnostics,
    ) {
        if self.passes.is_empty() {
            diag.warn(Self::PASSES, "is empty, documents will pass through unchanged");
        }

        let mut seen = Vec::with_capacity(self.passes.len());
        for id in &self.passes {
            if seen.contains(&id) {
                diag.error(Self::PASSES, format!("pass `{id}` listed twice"));
            }
            seen.push(id);
        }

        for id in registry.unknown(&self.passes) {
            diag.error_with_hint(
                Self::PASSES,
                format!("unknown pass `{id}`"),
                format!("known passes: {}", registry.ids().join(", ")),
            );
        }

        let args = match self.pass_args() {
            Ok(args) => args,
            Err(id) => {
                diag.error(Self::ARGS, format!("`args.{id}` must be a table"));
                return;
            }
        };

        let doc = Document::new();
        let deps = PassDeps::bundled();
        for (id, table) in &args {
            if !self.passes.contains(id) {
                diag.warn(Self::ARGS, format!("`args.{id}` is unused, `{id}` is not in passes"));
                continue;
            }
            let Some(factory) = registry.get(id) else {
                continue;
            };
            let checked =
                PassArgs::merge(id, options, Some(table)).and_then(|merged| factory(&doc, &merged, &deps));
            if let Err(e) = checked {
                diag.error(Self::ARGS, e.to_string());
            }
        }
    }

    /// Split `args` into per-pass tables. `Err` names the first non-table entry.
    pub fn pass_args(&self) -> Result<PassArgsTable, String> {
        self.args
            .iter()
            .map(|(id, value)| match value {
                toml::Value::Table(table) => Ok((id.clone(), table.clone())),
                _ => Err(id.clone()),
            })
            .collect()
    }
}
