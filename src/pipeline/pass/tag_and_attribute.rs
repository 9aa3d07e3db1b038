//! `tag_and_attribute` pass: enforce the rule repository.
//!
//! Runs last. Every attached element is resolved to one [`TagSpec`]:
//!
//! | Finding                          | Action                         | Diagnostic              |
//! |----------------------------------|--------------------------------|-------------------------|
//! | no spec for the tag              | unwrap (remove raw-text tags)  | `DISALLOWED_TAG`        |
//! | specs exist, none fits context   | remove                         | `SPEC_MISMATCH`         |
//! | attribute not in the spec        | drop attribute                 | `DISALLOWED_ATTR`       |
//! | attribute value rejected         | drop attribute                 | `INVALID_ATTR_VALUE`    |
//! | mandatory attribute missing      | remove                         | `REQUIRED_ATTR_MISSING` |
//! | layout unsupported, none fits    | remove                         | `INVALID_ATTR_VALUE`    |
//! | descendant outside allowed list  | unwrap descendant              | `DISALLOWED_TAG`        |
//!
//! Extensions required by kept tags and attributes are reported as scripts.

use std::sync::Arc;

use super::{PassArgs, PassDeps, PassError, PassSiblings, SanitizationPass};
use crate::dom::{Document, NodeId};
use crate::layout::{self, Layout};
use crate::pipeline::{Diagnostic, DiagnosticCode, SanitizationContext};
use crate::spec::{SpecRepository, TagSpec};
use crate::utils::html::drops_content;

pub const ID: &str = "tag_and_attribute";

/// Passes producing elements this pass must see.
const REWRITING_PASSES: &[&str] = &[super::embed::ID, super::img::ID];

pub struct TagAndAttributePass {
    rules: Arc<SpecRepository>,
    /// Rewriting passes ordered after this one.
    late_rewriters: Vec<&'static str>,
    scripts: Vec<String>,
}

impl TagAndAttributePass {
    pub fn factory(
        _doc: &Document,
        args: &PassArgs,
        deps: &PassDeps,
    ) -> Result<Box<dyn SanitizationPass>, PassError> {
        args.expect_only(ID, &[])?;
        Ok(Box::new(Self {
            rules: Arc::clone(&deps.rules),
            late_rewriters: Vec::new(),
            scripts: Vec::new(),
        }))
    }

    fn require(&mut self, extensions: &[String]) {
        for ext in extensions {
            if !self.scripts.contains(ext) {
                self.scripts.push(ext.clone());
            }
        }
    }

    fn check_element(
        &mut self,
        doc: &mut Document,
        ctx: &mut SanitizationContext,
        id: NodeId,
    ) -> Result<(), PassError> {
        let Some(tag) = doc.tag(id).map(str::to_string) else {
            return Ok(());
        };
        let rules = Arc::clone(&self.rules);

        let candidates = rules.tag_specs_for(&tag);
        if candidates.is_empty() {
            drop_disallowed(doc, id);
            ctx.report(Diagnostic::new(DiagnosticCode::DisallowedTag).node(&tag));
            return Ok(());
        }
        let Some(spec) = rules.resolve(doc, id, &candidates).spec() else {
            doc.remove(id);
            let names: Vec<&str> = candidates.iter().map(|s| s.spec_name.as_str()).collect();
            ctx.report(
                Diagnostic::new(DiagnosticCode::SpecMismatch)
                    .node(&tag)
                    .message(format!("no rule fits here (tried {})", names.join(", "))),
            );
            return Ok(());
        };

        // attribute allowlist
        let attrs: Vec<(String, String)> = doc
            .element(id)
            .map(|e| {
                e.attrs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        let mut extensions = spec.requires_extension.clone();
        for (name, value) in attrs {
            let code = match rules.find_attr(spec, &name)? {
                None => DiagnosticCode::DisallowedAttr,
                Some(attr) if !rules.validate_attr_value(attr, &value) => {
                    DiagnosticCode::InvalidAttrValue
                }
                Some(attr) => {
                    extensions.extend(attr.requires_extension.iter().cloned());
                    continue;
                }
            };
            if let Some(elem) = doc.element_mut(id) {
                elem.remove_attr(&name);
            }
            ctx.report(
                Diagnostic::new(code)
                    .node(&tag)
                    .spec_name(&spec.spec_name)
                    .attribute(name),
            );
        }

        let missing = rules
            .attributes_for(spec)?
            .into_iter()
            .find(|a| a.mandatory && !a.is_prefix() && doc.attr(id, &a.name).is_none())
            .map(|a| a.name.clone());
        if let Some(name) = missing {
            doc.remove(id);
            ctx.report(
                Diagnostic::new(DiagnosticCode::RequiredAttrMissing)
                    .node(&tag)
                    .spec_name(&spec.spec_name)
                    .attribute(name),
            );
            return Ok(());
        }

        if spec.has_layout() && !check_layout(doc, ctx, id, spec) {
            return Ok(());
        }
        if let Some(list) = &spec.descendant_list {
            let allowed = rules.descendant_list(list).unwrap_or_default();
            check_descendants(doc, ctx, id, spec, allowed);
        }

        self.require(&extensions);
        Ok(())
    }
}

/// Unwrap a disallowed element, or remove it when its content is not text.
fn drop_disallowed(doc: &mut Document, id: NodeId) {
    if doc.tag(id).is_some_and(drops_content) {
        doc.remove(id);
    } else {
        doc.unwrap(id);
    }
}

/// Validate `layout` against the spec. Returns false when the element was removed.
fn check_layout(
    doc: &mut Document,
    ctx: &mut SanitizationContext,
    id: NodeId,
    spec: &TagSpec,
) -> bool {
    let invalid = || {
        Diagnostic::new(DiagnosticCode::InvalidAttrValue)
            .node(&spec.tag)
            .spec_name(&spec.spec_name)
            .attribute("layout")
    };

    let hint = doc.attr(id, "layout").map(Layout::parse);
    let resolve = |doc: &Document, hint: Option<Layout>| {
        layout::resolve(hint, doc.attr(id, "width"), doc.attr(id, "height"), &spec.layouts)
    };

    let first = match hint {
        Some(Some(layout)) => resolve(&*doc, Some(layout)),
        Some(None) => Err(layout::LayoutError::Unknown(
            doc.attr(id, "layout").unwrap_or_default().to_string(),
        )),
        None => resolve(&*doc, None),
    };
    let err = match first {
        Ok(_) => return true,
        Err(err) => err,
    };

    if hint.is_some() {
        // drop the hint and infer one from the dimensions
        if let Some(elem) = doc.element_mut(id) {
            elem.remove_attr("layout");
        }
        ctx.report(invalid().message(err.to_string()));
        if resolve(&*doc, None).is_ok() {
            return true;
        }
    }

    doc.remove(id);
    ctx.report(invalid().message(format!("no supported layout: {err}")));
    false
}

fn check_descendants(
    doc: &mut Document,
    ctx: &mut SanitizationContext,
    id: NodeId,
    spec: &TagSpec,
    allowed: &[String],
) {
    for node in doc.descendants(id) {
        let Some(tag) = doc.tag(node).map(str::to_string) else {
            continue;
        };
        if !doc.is_attached(node) || allowed.iter().any(|a| *a == tag) {
            continue;
        }
        drop_disallowed(doc, node);
        ctx.report(
            Diagnostic::new(DiagnosticCode::DisallowedTag)
                .node(tag)
                .spec_name(&spec.spec_name)
                .message(format!("not allowed inside <{}>", spec.tag)),
        );
    }
}

impl SanitizationPass for TagAndAttributePass {
    fn id(&self) -> &'static str {
        ID
    }

    fn init(&mut self, siblings: &PassSiblings) {
        self.late_rewriters = REWRITING_PASSES
            .iter()
            .copied()
            .filter(|&p| siblings.runs_after(p))
            .collect();
        for pass in &self.late_rewriters {
            crate::log!(
                "pipeline";
                "`{}` is ordered after `{}`; elements it produces are not checked",
                pass,
                ID
            );
        }
    }

    fn sanitize(
        &mut self,
        doc: &mut Document,
        ctx: &mut SanitizationContext,
    ) -> Result<(), PassError> {
        for id in doc.elements() {
            if !doc.is_attached(id) || doc.is_exempt(id) {
                continue;
            }
            if let Err(e) = self.check_element(doc, ctx, id) {
                let tag = doc.tag(id).unwrap_or_default().to_string();
                ctx.report(
                    Diagnostic::new(DiagnosticCode::PassFailed)
                        .node(tag)
                        .message(e.to_string()),
                );
            }
        }
        Ok(())
    }

    fn scripts(&self) -> Vec<String> {
        self.scripts.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{parse, serialize};
    use crate::spec::Format;

    fn run_format(html: &str, format: Format) -> (String, SanitizationContext, Vec<String>) {
        let mut doc = parse(html);
        let deps = PassDeps::new(SpecRepository::bundled(format));
        let mut pass = TagAndAttributePass::factory(&doc, &PassArgs::default(), &deps).unwrap();
        let mut ctx = SanitizationContext::default();
        pass.sanitize(&mut doc, &mut ctx).unwrap();
        (serialize(&doc), ctx, pass.scripts())
    }

    fn run(html: &str) -> (String, SanitizationContext, Vec<String>) {
        run_format(html, Format::Amp)
    }

    fn codes(ctx: &SanitizationContext) -> Vec<DiagnosticCode> {
        ctx.diagnostics().iter().map(|d| d.code).collect()
    }

    #[test]
    fn test_unknown_tag_is_unwrapped() {
        let (html, ctx, _) = run("<p><blink>hi <b>there</b></blink></p>");
        assert_eq!(html, "<p>hi <b>there</b></p>");
        assert_eq!(codes(&ctx), [DiagnosticCode::DisallowedTag]);
        assert_eq!(ctx.diagnostics()[0].node_name.as_deref(), Some("blink"));
    }

    #[test]
    fn test_unknown_embedding_tag_is_removed() {
        let (html, _, _) = run(r#"<div><object data="x.swf">fallback</object>ok</div>"#);
        assert_eq!(html, "<div>ok</div>");
    }

    #[test]
    fn test_spec_mismatch_removes() {
        let (html, ctx, _) = run("<div><script>alert(1)</script>text</div>");
        assert_eq!(html, "<div>text</div>");
        assert_eq!(codes(&ctx), [DiagnosticCode::SpecMismatch]);
    }

    #[test]
    fn test_disallowed_and_invalid_attributes() {
        let (html, ctx, _) = run(
            r#"<p onclick="x()" class="a" data-x="1">t</p><a href="javascript:alert(1)" target="_new">x</a>"#,
        );
        assert_eq!(html, r#"<p class="a" data-x="1">t</p><a>x</a>"#);

        let diags = ctx.diagnostics();
        assert_eq!(diags.len(), 3);
        assert_eq!(diags[0].code, DiagnosticCode::DisallowedAttr);
        assert_eq!(diags[0].attributes, ["onclick"]);
        assert_eq!(diags[1].code, DiagnosticCode::InvalidAttrValue);
        assert_eq!(diags[1].attributes, ["href"]);
        assert_eq!(diags[2].attributes, ["target"]);
    }

    #[test]
    fn test_important_in_style_is_rejected() {
        let (html, _, _) = run(r#"<span style="color:red !important">x</span>"#);
        assert_eq!(html, "<span>x</span>");
    }

    #[test]
    fn test_missing_mandatory_attribute_removes() {
        let (html, ctx, _) = run(r#"<div><amp-img layout="fill"></amp-img></div>"#);
        assert_eq!(html, "<div></div>");
        let diag = &ctx.diagnostics()[0];
        assert_eq!(diag.code, DiagnosticCode::RequiredAttrMissing);
        assert_eq!(diag.spec_name.as_deref(), Some("amp-img"));
        assert_eq!(diag.attributes, ["src"]);
    }

    #[test]
    fn test_unsupported_layout_falls_back_to_inferred() {
        let (html, ctx, _) =
            run(r#"<amp-img src="/a.png" layout="container" width="1" height="1"></amp-img>"#);
        assert_eq!(html, r#"<amp-img src="/a.png" width="1" height="1"></amp-img>"#);
        assert_eq!(codes(&ctx), [DiagnosticCode::InvalidAttrValue]);
    }

    #[test]
    fn test_unresolvable_layout_removes() {
        let (html, ctx, _) = run(r#"<p><amp-img src="/a.png" layout="responsive"></amp-img></p>"#);
        assert_eq!(html, "<p></p>");
        assert_eq!(
            codes(&ctx),
            [DiagnosticCode::InvalidAttrValue, DiagnosticCode::InvalidAttrValue]
        );
    }

    #[test]
    fn test_descendant_list() {
        let (html, ctx, _) = run(
            r#"<picture><source srcset="/a.webp"><img src="/a.png" width="1" height="1"><span>x</span></picture>"#,
        );
        assert_eq!(
            html,
            r#"<picture><source srcset="/a.webp"><img src="/a.png" width="1" height="1">x</picture>"#
        );
        let diag = &ctx.diagnostics()[0];
        assert_eq!(diag.code, DiagnosticCode::DisallowedTag);
        assert_eq!(diag.spec_name.as_deref(), Some("picture"));
    }

    #[test]
    fn test_required_extensions() {
        let (_, _, scripts) = run(
            r#"<amp-anim src="/a.gif" width="1" height="1" lightbox></amp-anim><amp-anim src="/b.gif" width="1" height="1"></amp-anim>"#,
        );
        assert_eq!(scripts, ["amp-anim", "amp-lightbox-gallery"]);

        let (_, _, scripts) = run("<p>plain</p>");
        assert!(scripts.is_empty());
    }

    #[test]
    fn test_head_dispatch() {
        let html = concat!(
            "<html><head>",
            r#"<script async src="https://cdn.ampproject.org/v0.js"></script>"#,
            r#"<script async custom-element="amp-anim" src="https://cdn.ampproject.org/v0/amp-anim-0.1.js"></script>"#,
            "<style amp-custom>p{color:red}</style>",
            "</head><body><p>x</p></body></html>"
        );
        let (out, ctx, _) = run(html);
        assert!(ctx.diagnostics().is_empty(), "{:?}", ctx.diagnostics());
        assert_eq!(out, html);

        let (out, ctx, _) = run("<p><style amp-custom>p{}</style></p>");
        assert_eq!(out, "<p></p>");
        assert_eq!(codes(&ctx), [DiagnosticCode::SpecMismatch]);
    }

    #[test]
    fn test_story_player_anchor() {
        let html = r#"<amp-story-player layout="fixed" width="360" height="600"><a href="https://x.com/s" class="story">Story</a></amp-story-player>"#;
        let (out, ctx, scripts) = run(html);
        assert_eq!(out, html);
        assert!(ctx.diagnostics().is_empty());
        assert_eq!(scripts, ["amp-story-player"]);

        let (out, _, _) = run(r#"<amp-story-player layout="fixed" width="360" height="600"><a>Story</a></amp-story-player>"#);
        assert!(!out.contains("<a>"));
    }

    #[test]
    fn test_email_format_drops_unsupported_components() {
        let (html, ctx, _) = run_format(
            r#"<amp-iframe src="https://x.com" width="1" height="1" layout="fixed">x</amp-iframe>"#,
            Format::Amp4email,
        );
        assert_eq!(html, "x");
        assert_eq!(codes(&ctx), [DiagnosticCode::DisallowedTag]);
    }

    #[test]
    fn test_dev_mode_exemption() {
        let html = r#"<html data-ampdevmode><body><p data-ampdevmode onclick="go()">t</p><p onclick="go()">u</p></body></html>"#;
        let (out, _, _) = run(html);
        assert_eq!(
            out,
            r#"<html data-ampdevmode><body><p data-ampdevmode onclick="go()">t</p><p>u</p></body></html>"#
        );
    }

    #[test]
    fn test_rule_error_does_not_stop_siblings() {
        let json = r#"{
            "attr_lists": {"link-attrs": [{"name": "href"}]},
            "tags": [
                {"tag": "a", "attr_lists": ["link-attrs"]},
                {"tag": "p"}
            ]
        }"#;
        let mut rules = SpecRepository::from_json(json, Format::Amp).unwrap();
        rules.forget_attr_list("link-attrs");

        let mut doc = parse(r#"<a href="/x">x</a><p onclick="y()">z</p>"#);
        let deps = PassDeps::new(Arc::new(rules));
        let mut pass = TagAndAttributePass::factory(&doc, &PassArgs::default(), &deps).unwrap();
        let mut ctx = SanitizationContext::default();
        pass.sanitize(&mut doc, &mut ctx).unwrap();

        assert_eq!(
            codes(&ctx),
            [DiagnosticCode::PassFailed, DiagnosticCode::DisallowedAttr]
        );
        assert_eq!(ctx.diagnostics()[0].node_name.as_deref(), Some("a"));
        assert_eq!(serialize(&doc), r#"<a href="/x">x</a><p>z</p>"#);
    }

    #[test]
    fn test_init_notes_late_rewriters() {
        let deps = PassDeps::bundled();
        let mut pass = TagAndAttributePass {
            rules: Arc::clone(&deps.rules),
            late_rewriters: Vec::new(),
            scripts: Vec::new(),
        };
        pass.init(&PassSiblings::new(vec![ID, super::super::img::ID], 0));
        assert_eq!(pass.late_rewriters, [super::super::img::ID]);

        pass.init(&PassSiblings::new(vec![super::super::img::ID, ID], 1));
        assert!(pass.late_rewriters.is_empty());
    }
}
