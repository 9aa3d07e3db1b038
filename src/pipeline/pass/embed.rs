//! `embed` pass: run the registered embed handlers.

use std::sync::Arc;

use super::{PassArgs, PassDeps, PassError, SanitizationPass};
use crate::dom::Document;
use crate::embed::EmbedRegistry;
use crate::pipeline::SanitizationContext;

pub const ID: &str = "embed";

pub struct EmbedPass {
    registry: Arc<EmbedRegistry>,
    /// Restrict to these handler names; all when `None`.
    only: Option<Vec<String>>,
    scripts: Vec<String>,
}

impl EmbedPass {
    pub fn factory(
        _doc: &Document,
        args: &PassArgs,
        deps: &PassDeps,
    ) -> Result<Box<dyn SanitizationPass>, PassError> {
        args.expect_only(ID, &["handlers"])?;
        let only = args.string_list(ID, "handlers")?;
        if let Some(names) = &only
            && let Some(unknown) = names.iter().find(|n| deps.embeds.get(n).is_none())
        {
            return Err(PassError::InvalidArg {
                pass: ID.to_string(),
                key: "handlers".to_string(),
                message: format!("no embed handler named `{unknown}`"),
            });
        }
        Ok(Box::new(Self {
            registry: Arc::clone(&deps.embeds),
            only,
            scripts: Vec::new(),
        }))
    }
}

impl SanitizationPass for EmbedPass {
    fn id(&self) -> &'static str {
        ID
    }

    fn sanitize(
        &mut self,
        doc: &mut Document,
        ctx: &mut SanitizationContext,
    ) -> Result<(), PassError> {
        for handler in self.registry.handlers() {
            if let Some(only) = &self.only
                && !only.iter().any(|n| n == handler.name())
            {
                continue;
            }
            let produced = handler.sanitize(doc, ctx);
            crate::debug!("embed"; "{}: {} element(s)", handler.name(), produced);
            if produced > 0 {
                for script in handler.scripts() {
                    if !self.scripts.iter().any(|s| s == script) {
                        self.scripts.push(script.to_string());
                    }
                }
            }
        }
        Ok(())
    }

    fn scripts(&self) -> Vec<String> {
        self.scripts.clone()
    }
}
