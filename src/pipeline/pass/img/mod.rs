//! `img` pass: `<img>` to `amp-img`, `amp-anim` or `amp-pixel`.
//!
//! # Per-node flow
//!
//! ```text
//! img ──skip?──> untouched (exempt, fallback copy, story-player poster)
//!  │
//!  ├─ no src ───────────> removed + REQUIRED_ATTR_MISSING
//!  ├─ tracking pixel ───> amp-pixel (nodisplay)
//!  │
//!  ├─ <picture> unwrap, smiley sizing
//!  ├─ needs size? ──yes─> batch (keyed by URL) ──> one extract() ──┐
//!  │                                                               │
//!  └──────────────────────────────> convert <──────────────────────┘
//!        project attrs → lightbox → tag → default layout → style
//!        → replace → noscript fallback
//! ```

mod lightbox;
mod sizing;

pub use sizing::{UNKNOWN_HEIGHT_CLASS, UNKNOWN_SIZE_CLASS, UNKNOWN_WIDTH_CLASS};

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::{PassArgs, PassDeps, PassError, SanitizationPass};
use crate::dimensions::DimensionExtractor;
use crate::dom::{Attributes, Document, NodeId};
use crate::layout::{self, Layout, is_numeric};
use crate::pipeline::{
    Diagnostic, DiagnosticCode, SanitizationContext, SanitizeOptions, Stylesheet,
};
use crate::spec::SpecRepository;
use crate::utils::css::rewrite_display;
use crate::utils::html::merge_classes;
use crate::utils::url::{bare_host, has_extension, normalize_for_lookup, path_of};

pub const ID: &str = "img";

const SMILEY_CLASS: &str = "wp-smiley";
const SMILEY_SIZE: &str = "72";
const ENFORCED_SIZES_CLASS: &str = "amp-wp-enforced-sizes";
const ENFORCED_SIZES_CSS: &str = "max-width:100%;height:auto";

pub struct ImgPass {
    options: SanitizeOptions,
    rules: Arc<SpecRepository>,
    dimensions: Arc<dyn DimensionExtractor>,
    anim_used: bool,
    lightbox_used: bool,
    enforced_sizes: bool,
}

impl ImgPass {
    pub fn factory(
        _doc: &Document,
        args: &PassArgs,
        deps: &PassDeps,
    ) -> Result<Box<dyn SanitizationPass>, PassError> {
        args.expect_only(ID, &[])?;
        Ok(Box::new(Self {
            options: args.options.clone(),
            rules: Arc::clone(&deps.rules),
            dimensions: Arc::clone(&deps.dimensions),
            anim_used: false,
            lightbox_used: false,
            enforced_sizes: false,
        }))
    }

    /// Replace a tracking pixel with `amp-pixel`.
    fn replace_with_pixel(&self, doc: &mut Document, id: NodeId, src: &str) {
        let mut attrs = Attributes::from([("src", src), ("layout", Layout::Nodisplay.as_str())]);
        if let Some(policy) = doc.attr(id, "referrerpolicy") {
            attrs.set("referrerpolicy", policy);
        }
        if self.options.server_side_layout {
            self.apply_server_layout("amp-pixel", &mut attrs);
        }
        let pixel = doc.create_element("amp-pixel", attrs);
        doc.replace(id, pixel);
    }

    /// Layout classes and `i-amphtml-layout` for pre-rendered output.
    fn apply_server_layout(&self, tag: &str, attrs: &mut Attributes) {
        let supported = self
            .rules
            .primary_spec(tag)
            .map(|spec| spec.layouts.as_slice())
            .unwrap_or_default();
        let hint = attrs.get("layout").and_then(Layout::parse);
        match layout::resolve(hint, attrs.get("width"), attrs.get("height"), supported) {
            Ok(resolved) => {
                let class = merge_classes(
                    attrs.get("class").unwrap_or(""),
                    resolved.classes.iter().map(String::as_str),
                );
                attrs.set("class", class);
                attrs.set("i-amphtml-layout", resolved.layout.as_str());
            }
            Err(e) => crate::debug!("img"; "no server-side layout for <{}>: {}", tag, e),
        }
    }

    /// Build the substitute for one sized node and swap it in.
    fn convert(&mut self, doc: &mut Document, id: NodeId) -> Result<(), PassError> {
        let Some(original) = doc.element(id).cloned() else {
            return Ok(());
        };
        let mut attrs = sizing::project_attributes(&original.attrs);
        let src = attrs.get("src").unwrap_or_default().to_string();

        if lightbox::propagate(doc, id, &mut attrs) {
            self.lightbox_used = true;
        }

        let in_picture = doc
            .parent_element(id)
            .is_some_and(|p| doc.is_tag(p, "picture"));
        let keep_tag = self.options.native_img_used || in_picture;
        let tag = if keep_tag {
            original.tag.as_str()
        } else if has_extension(&src, "gif") {
            "amp-anim"
        } else {
            "amp-img"
        };

        if keep_tag {
            if !attrs.has("decoding") {
                attrs.set("decoding", "async");
            }
            let class = merge_classes(attrs.get("class").unwrap_or(""), [ENFORCED_SIZES_CLASS]);
            attrs.set("class", class);
            self.enforced_sizes = true;
        } else {
            if !attrs.has("layout") && is_numeric(attrs.get("width")) && is_numeric(attrs.get("height"))
            {
                let layout = if self.options.align_wide_support && in_wide_figure(doc, id) {
                    Layout::Responsive
                } else {
                    Layout::Intrinsic
                };
                attrs.set("layout", layout.as_str());
            }
            if attrs.has("sizes") {
                attrs.set("disable-inline-width", "");
            }
        }

        if let Some(layout) = attrs.get("layout").and_then(Layout::parse) {
            let rewritten = attrs
                .get("style")
                .and_then(|style| rewrite_display(style, layout.css_display()));
            if let Some(style) = rewritten {
                attrs.set("style", style);
            }
        }

        if !keep_tag && self.options.server_side_layout {
            if self.rules.primary_spec(tag).is_none() {
                return Err(PassError::Failed(format!("no rule for <{tag}>")));
            }
            self.apply_server_layout(tag, &mut attrs);
        }
        if tag == "amp-anim" {
            self.anim_used = true;
        }

        let replacement = doc.create_element(tag, attrs);
        if let Some(elem) = doc.element_mut(id) {
            elem.remove_attr("id");
        }
        doc.replace(id, replacement);
        if self.options.add_noscript_fallback && !keep_tag {
            doc.append_fallback(replacement, id);
        }
        Ok(())
    }
}

/// Nodes this pass must never touch.
fn is_skipped(doc: &Document, id: NodeId) -> bool {
    if doc.is_exempt(id) {
        return true;
    }
    let Some(parent) = doc.parent_element(id) else {
        return false;
    };
    let grandparent = doc.parent_element(parent).and_then(|g| doc.tag(g));

    // fallback copy kept by an earlier run
    let in_fallback =
        doc.is_tag(parent, "noscript") && grandparent.is_some_and(|t| t.starts_with("amp-"));
    let story_poster = doc.is_tag(parent, "a") && grandparent == Some("amp-story-player");
    in_fallback || story_poster
}

fn is_tracking_pixel(src: &str) -> bool {
    bare_host(src).as_deref() == Some("facebook.com") && path_of(src).as_deref() == Some("/tr")
}

/// Inside a wide- or full-aligned figure, looking through a wrapping anchor.
fn in_wide_figure(doc: &Document, id: NodeId) -> bool {
    let mut container = doc.parent_element(id);
    if let Some(anchor) = container
        && doc.is_tag(anchor, "a")
    {
        container = doc.parent_element(anchor);
    }
    let Some(figure) = container.filter(|&c| doc.is_tag(c, "figure")) else {
        return false;
    };
    let wide = |node: NodeId| {
        doc.element(node)
            .is_some_and(|e| e.has_class("alignwide") || e.has_class("alignfull"))
    };
    wide(figure) || doc.parent_element(figure).is_some_and(wide)
}

impl SanitizationPass for ImgPass {
    fn id(&self) -> &'static str {
        ID
    }

    fn sanitize(
        &mut self,
        doc: &mut Document,
        ctx: &mut SanitizationContext,
    ) -> Result<(), PassError> {
        let mut deferred: BTreeMap<String, Vec<NodeId>> = BTreeMap::new();
        let mut ready = Vec::new();

        for id in doc.elements_by_tag("img") {
            if !doc.is_attached(id) || is_skipped(doc, id) {
                continue;
            }

            let src = doc.attr(id, "src").map(str::trim).unwrap_or("").to_string();
            if src.is_empty() {
                doc.remove(id);
                ctx.report(
                    Diagnostic::new(DiagnosticCode::RequiredAttrMissing)
                        .node("img")
                        .spec_name("amp-img")
                        .attribute("src"),
                );
                continue;
            }
            if is_tracking_pixel(&src) {
                self.replace_with_pixel(doc, id, &src);
                continue;
            }

            if !self.options.allow_picture
                && let Some(picture) = doc.parent_element(id).filter(|&p| doc.is_tag(p, "picture"))
            {
                doc.replace(picture, id);
            }

            let native = self.options.native_img_used;
            let Some(elem) = doc.element_mut(id) else {
                continue;
            };
            if elem.get_attr("class").map(str::trim) == Some(SMILEY_CLASS) {
                elem.set_attr("width", SMILEY_SIZE);
                elem.set_attr("height", SMILEY_SIZE);
                if !native {
                    elem.set_attr("data-amp-noloading", "");
                }
            }

            let layout = sizing::requested_layout(&elem.attrs);
            if sizing::needs_dimensions(layout, &elem.attrs) {
                deferred
                    .entry(normalize_for_lookup(&src))
                    .or_default()
                    .push(id);
            } else {
                ready.push(id);
            }
        }

        if !deferred.is_empty() {
            let urls: BTreeSet<String> = deferred.keys().cloned().collect();
            crate::debug!("img"; "looking up {} image size(s)", urls.len());
            let found = self.dimensions.extract(&urls);
            for (url, ids) in &deferred {
                let dims = found.get(url).copied().flatten();
                for &id in ids {
                    if let Some(elem) = doc.element_mut(id) {
                        sizing::apply_dimensions(elem, dims, &self.options);
                    }
                }
            }
            ready.extend(deferred.into_values().flatten());
        }

        for id in ready {
            if let Err(e) = self.convert(doc, id) {
                ctx.report(
                    Diagnostic::new(DiagnosticCode::PassFailed)
                        .node("img")
                        .message(e.to_string()),
                );
            }
        }
        Ok(())
    }

    fn scripts(&self) -> Vec<String> {
        let mut scripts = Vec::new();
        if self.anim_used {
            scripts.push("amp-anim".to_string());
        }
        if self.lightbox_used {
            scripts.push("amp-lightbox-gallery".to_string());
        }
        scripts
    }

    fn stylesheets(&self) -> Vec<Stylesheet> {
        if self.enforced_sizes {
            vec![Stylesheet::new(
                format!(".{ENFORCED_SIZES_CLASS}"),
                ENFORCED_SIZES_CSS,
            )]
        } else {
            Vec::new()
        }
    }
}
