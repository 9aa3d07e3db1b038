//! Sanitization pipeline.
//!
//! Runs an ordered list of passes over one [`Document`]. Pass order is a
//! correctness dependency: the allowlist pass assumes element rewriting has
//! already happened.
//!
//! # Lifecycle
//!
//! ```text
//! ┌─────────────┐  init()  ┌─────────────┐ sanitize() ┌────────────┐     ┌──────┐
//! │ Constructed │ ───────> │ Initialized │ ─────────> │ Sanitizing │ ──> │ Done │
//! └─────────────┘          └─────────────┘            └────────────┘     └──────┘
//!  unknown ids and             every pass sees          each pass isolated;
//!  failing factories           its siblings             failures become
//!  are logged and skipped                               PASS_FAILED diagnostics
//! ```
//!
//! [`Sanitizer`] wraps the lifecycle for the common case:
//!
//! ```ignore
//! let (html, output) = Sanitizer::new(SanitizeOptions::default()).sanitize_html(input)?;
//! ```

mod context;
pub mod pass;
mod registry;

use std::panic::{AssertUnwindSafe, catch_unwind};

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::dom::{self, Document};
use pass::{PassArgs, PassDeps, PassSiblings, SanitizationPass};

pub use context::{
    Diagnostic, DiagnosticCode, Manifest, SanitizationContext, SanitizeOptions, SanitizeOutput,
    Stylesheet,
};
pub use registry::{DEFAULT_PASSES, PassFactory, PassRegistry};

// =============================================================================
// Pipeline
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Constructed,
    Initialized,
    Sanitizing,
    Done,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline is {actual:?}, expected {expected:?}")]
    State {
        expected: PipelineState,
        actual: PipelineState,
    },
}

/// Per-pass overrides keyed by pass id.
pub type PassArgsTable = FxHashMap<String, toml::Table>;

pub struct SanitizerPipeline {
    passes: Vec<Box<dyn SanitizationPass>>,
    skipped: Vec<String>,
    state: PipelineState,
}

impl SanitizerPipeline {
    /// Build every configured pass. Passes that cannot be built are skipped.
    pub fn construct(
        doc: &Document,
        ids: &[String],
        registry: &PassRegistry,
        options: &SanitizeOptions,
        args: &PassArgsTable,
        deps: &PassDeps,
    ) -> Self {
        let mut passes = Vec::with_capacity(ids.len());
        let mut skipped = Vec::new();

        for id in ids {
            let Some(factory) = registry.get(id) else {
                crate::log!("pipeline"; "unknown pass `{}`, skipped", id);
                skipped.push(id.clone());
                continue;
            };
            let built = PassArgs::merge(id, options, args.get(id))
                .and_then(|merged| factory(doc, &merged, deps));
            match built {
                Ok(pass) => passes.push(pass),
                Err(e) => {
                    crate::log!("pipeline"; "pass `{}` skipped: {}", id, e);
                    skipped.push(id.clone());
                }
            }
        }

        Self {
            passes,
            skipped,
            state: PipelineState::Constructed,
        }
    }

    #[inline]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Ids of the constructed passes, in run order.
    pub fn pass_ids(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.id()).collect()
    }

    /// Configured ids dropped at construction.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    fn expect(&self, expected: PipelineState) -> Result<(), PipelineError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(PipelineError::State {
                expected,
                actual: self.state,
            })
        }
    }

    /// Let every pass see its siblings before any mutation.
    pub fn init(&mut self) -> Result<(), PipelineError> {
        self.expect(PipelineState::Constructed)?;
        let ids = self.pass_ids();
        for (position, pass) in self.passes.iter_mut().enumerate() {
            pass.init(&PassSiblings::new(ids.clone(), position));
        }
        self.state = PipelineState::Initialized;
        Ok(())
    }

    /// Run every pass in order, merging what each reports into `ctx`.
    pub fn sanitize(
        &mut self,
        doc: &mut Document,
        ctx: &mut SanitizationContext,
    ) -> Result<(), PipelineError> {
        self.expect(PipelineState::Initialized)?;
        self.state = PipelineState::Sanitizing;

        for pass in &mut self.passes {
            let id = pass.id();
            ctx.set_current_pass(Some(id));
            crate::debug!("pipeline"; "running `{}`", id);

            let failure = match catch_unwind(AssertUnwindSafe(|| pass.sanitize(doc, ctx))) {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(payload) => Some(panic_message(payload.as_ref())),
            };
            if let Some(message) = failure {
                crate::log!("pipeline"; "pass `{}` failed: {}", id, message);
                ctx.report(Diagnostic::new(DiagnosticCode::PassFailed).message(message));
            }

            for script in pass.scripts() {
                ctx.manifest.add_script(script);
            }
            for stylesheet in pass.stylesheets() {
                ctx.manifest.add_stylesheet(stylesheet);
            }
        }

        ctx.set_current_pass(None);
        self.state = PipelineState::Done;
        Ok(())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

// =============================================================================
// Sanitizer
// =============================================================================

/// Configured entry point: options, collaborators, pass order.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    options: SanitizeOptions,
    deps: PassDeps,
    passes: Vec<String>,
    pass_args: PassArgsTable,
    registry: PassRegistry,
}

impl Sanitizer {
    /// Default passes over the bundled AMP rules, without a dimension source.
    pub fn new(options: SanitizeOptions) -> Self {
        Self {
            options,
            deps: PassDeps::bundled(),
            passes: DEFAULT_PASSES.iter().map(|s| s.to_string()).collect(),
            pass_args: PassArgsTable::default(),
            registry: PassRegistry::with_builtin(),
        }
    }

    pub fn with_deps(mut self, deps: PassDeps) -> Self {
        self.deps = deps;
        self
    }

    pub fn with_passes<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.passes = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides for one pass, merged over the shared options.
    pub fn with_pass_args(mut self, id: impl Into<String>, args: toml::Table) -> Self {
        self.pass_args.insert(id.into(), args);
        self
    }

    pub fn with_registry(mut self, registry: PassRegistry) -> Self {
        self.registry = registry;
        self
    }

    #[inline]
    pub fn options(&self) -> &SanitizeOptions {
        &self.options
    }

    #[inline]
    pub fn deps(&self) -> &PassDeps {
        &self.deps
    }

    pub fn passes(&self) -> &[String] {
        &self.passes
    }

    /// Sanitize a parsed document in place.
    pub fn run(&self, doc: &mut Document) -> Result<SanitizeOutput, PipelineError> {
        if self.options.dev_mode {
            doc.set_dev_mode(true);
        }

        let mut pipeline = SanitizerPipeline::construct(
            doc,
            &self.passes,
            &self.registry,
            &self.options,
            &self.pass_args,
            &self.deps,
        );
        pipeline.init()?;

        let mut ctx = SanitizationContext::new(self.options.clone());
        pipeline.sanitize(doc, &mut ctx)?;
        Ok(ctx.into_output())
    }

    /// Parse, sanitize and serialize markup.
    pub fn sanitize_html(&self, html: &str) -> Result<(String, SanitizeOutput), PipelineError> {
        let mut doc = dom::parse(html);
        let output = self.run(&mut doc)?;
        Ok((dom::serialize(&doc), output))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::dimensions::{DimensionExtractor, DimensionMap, Dimensions, StaticDimensions};
    use crate::spec::SpecRepository;

    struct Exploding;

    impl SanitizationPass for Exploding {
        fn id(&self) -> &'static str {
            "exploding"
        }

        fn sanitize(
            &mut self,
            doc: &mut Document,
            _ctx: &mut SanitizationContext,
        ) -> Result<(), pass::PassError> {
            let root = doc.root();
            let marker = doc.create_comment("touched");
            doc.append_child(root, marker);
            panic!("boom");
        }

        fn scripts(&self) -> Vec<String> {
            vec!["amp-bind".to_string()]
        }
    }

    fn exploding_factory(
        _doc: &Document,
        _args: &PassArgs,
        _deps: &PassDeps,
    ) -> Result<Box<dyn SanitizationPass>, pass::PassError> {
        Ok(Box::new(Exploding))
    }

    fn sanitize(html: &str, options: SanitizeOptions) -> (String, SanitizeOutput) {
        Sanitizer::new(options).sanitize_html(html).unwrap()
    }

    #[test]
    fn test_default_pipeline_end_to_end() {
        let (html, output) = sanitize(
            r#"<figure class="wp-block-image"><img src="https://x.com/a.gif" width="300" height="200" onclick="x()"></figure><iframe src="https://x.com/embed"></iframe>"#,
            SanitizeOptions::default(),
        );
        assert_eq!(
            html,
            concat!(
                r#"<figure class="wp-block-image"><amp-anim src="https://x.com/a.gif" width="300" height="200" layout="intrinsic"></amp-anim></figure>"#,
                r#"<amp-iframe src="https://x.com/embed" width="600" height="400" layout="intrinsic" sandbox="allow-scripts allow-same-origin" frameborder="0"></amp-iframe>"#,
            )
        );
        assert_eq!(output.manifest.scripts, ["amp-iframe", "amp-anim"]);

        let onclick = &output.diagnostics[0];
        assert_eq!(onclick.code, DiagnosticCode::DisallowedAttr);
        assert_eq!(onclick.pass.as_deref(), Some("tag_and_attribute"));
        assert_eq!(onclick.attributes, ["onclick"]);
    }

    #[test]
    fn test_rerun_is_stable() {
        let options = SanitizeOptions {
            add_noscript_fallback: true,
            ..Default::default()
        };
        let (first, _) = sanitize(
            r#"<p><img src="/a.png" width="10" height="20" alt="a"><video src="/v.mp4"></video></p>"#,
            options.clone(),
        );
        assert!(first.contains("<noscript><img"));
        let (second, output) = sanitize(&first, options);
        assert_eq!(second, first);
        assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    }

    #[test]
    fn test_unknown_pass_is_skipped() {
        let doc = Document::new();
        let ids = vec!["img".to_string(), "whitelist".to_string()];
        let pipeline = SanitizerPipeline::construct(
            &doc,
            &ids,
            &PassRegistry::with_builtin(),
            &SanitizeOptions::default(),
            &PassArgsTable::default(),
            &PassDeps::bundled(),
        );
        assert_eq!(pipeline.pass_ids(), ["img"]);
        assert_eq!(pipeline.skipped(), ["whitelist"]);
    }

    #[test]
    fn test_bad_pass_args_skip_only_that_pass() {
        let mut args = toml::Table::new();
        args.insert("colour".into(), toml::Value::Boolean(true));
        let sanitizer = Sanitizer::new(SanitizeOptions::default()).with_pass_args("img", args);

        let (html, _) = sanitizer
            .sanitize_html(r#"<img src="/a.png" width="1" height="1">"#)
            .unwrap();
        // img never ran, so the allowlist keeps the sized native image
        assert_eq!(html, r#"<img src="/a.png" width="1" height="1">"#);
    }

    #[test]
    fn test_pass_args_override_options() {
        let mut args = toml::Table::new();
        args.insert("native_img_used".into(), toml::Value::Boolean(true));
        let sanitizer = Sanitizer::new(SanitizeOptions::default()).with_pass_args("img", args);

        let (html, output) = sanitizer
            .sanitize_html(r#"<img src="/a.png" width="1" height="1">"#)
            .unwrap();
        assert!(html.starts_with("<img "));
        assert_eq!(output.manifest.stylesheets.len(), 1);
    }

    #[test]
    fn test_panicking_pass_is_isolated() {
        let mut registry = PassRegistry::with_builtin();
        registry.register("exploding", exploding_factory);
        let sanitizer = Sanitizer::new(SanitizeOptions::default())
            .with_registry(registry)
            .with_passes(["exploding", "img"]);

        let (html, output) = sanitizer
            .sanitize_html(r#"<img src="/a.png" width="1" height="1">"#)
            .unwrap();
        assert!(html.contains("<amp-img"));
        assert!(html.contains("<!--touched-->"));
        assert!(output.has(DiagnosticCode::PassFailed));
        assert_eq!(output.diagnostics[0].pass.as_deref(), Some("exploding"));
        assert_eq!(output.diagnostics[0].message.as_deref(), Some("panicked: boom"));
        assert_eq!(output.manifest.scripts, ["amp-bind"]);
    }

    #[test]
    fn test_state_machine() {
        let mut doc = Document::new();
        let mut pipeline = SanitizerPipeline::construct(
            &doc,
            &[],
            &PassRegistry::with_builtin(),
            &SanitizeOptions::default(),
            &PassArgsTable::default(),
            &PassDeps::bundled(),
        );
        let mut ctx = SanitizationContext::default();
        assert!(matches!(
            pipeline.sanitize(&mut doc, &mut ctx),
            Err(PipelineError::State {
                expected: PipelineState::Initialized,
                actual: PipelineState::Constructed,
            })
        ));
        pipeline.init().unwrap();
        assert!(pipeline.init().is_err());
        pipeline.sanitize(&mut doc, &mut ctx).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Done);
    }

    #[derive(Default)]
    struct Counting {
        table: StaticDimensions,
        calls: Mutex<usize>,
    }

    impl DimensionExtractor for Counting {
        fn extract(&self, urls: &BTreeSet<String>) -> DimensionMap {
            *self.calls.lock() += 1;
            self.table.extract(urls)
        }
    }

    #[test]
    fn test_one_lookup_per_document() {
        let mut table = StaticDimensions::new();
        table.insert("/a.png", Dimensions::new(800, 600));
        let extractor = Arc::new(Counting {
            table,
            ..Default::default()
        });
        let deps = PassDeps::new(SpecRepository::bundled(crate::spec::Format::Amp))
            .with_dimensions(Arc::clone(&extractor) as Arc<dyn DimensionExtractor>);

        let (html, _) = Sanitizer::new(SanitizeOptions::default())
            .with_deps(deps)
            .sanitize_html(r#"<img src="/a.png"><img src="/a.png" width="400"><img src="/b.png">"#)
            .unwrap();
        assert_eq!(*extractor.calls.lock(), 1);
        assert!(html.contains(r#"width="400" height="300""#));
        assert!(html.contains(r#"width="800" height="600""#));
        assert!(html.contains("amp-wp-unknown-size"));
    }

    #[test]
    fn test_dev_mode_option() {
        let html = r#"<p><img data-ampdevmode src="/a.png"></p>"#;
        let (out, _) = sanitize(
            html,
            SanitizeOptions {
                dev_mode: true,
                ..Default::default()
            },
        );
        assert_eq!(out, html);

        let (out, _) = sanitize(html, SanitizeOptions::default());
        assert!(out.contains("<amp-img"));
    }
}
