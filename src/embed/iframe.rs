use super::{EmbedHandler, candidates, pixels_or};
use crate::dom::{Attributes, Document};
use crate::pipeline::{Diagnostic, DiagnosticCode, SanitizationContext};

const DEFAULT_WIDTH: u32 = 600;
const DEFAULT_HEIGHT: u32 = 400;
const DEFAULT_SANDBOX: &str = "allow-scripts allow-same-origin";

/// `<iframe>` to `amp-iframe`.
pub struct IframeEmbed;

impl EmbedHandler for IframeEmbed {
    fn name(&self) -> &'static str {
        "iframe"
    }

    fn sanitize(&self, doc: &mut Document, ctx: &mut SanitizationContext) -> usize {
        let mut produced = 0;
        for id in candidates(doc, "iframe") {
            let src = doc.attr(id, "src").map(str::trim).unwrap_or("");
            if src.is_empty() {
                doc.remove(id);
                ctx.report(
                    Diagnostic::new(DiagnosticCode::RequiredAttrMissing)
                        .node("iframe")
                        .spec_name("amp-iframe")
                        .attribute("src"),
                );
                continue;
            }

            let Some(original) = doc.element(id).cloned() else {
                continue;
            };
            let mut attrs: Attributes = original
                .attrs
                .iter()
                .filter(|(name, _)| !matches!(*name, "width" | "height" | "style"))
                .collect();
            attrs.set("width", pixels_or(doc, id, "width", DEFAULT_WIDTH));
            attrs.set("height", pixels_or(doc, id, "height", DEFAULT_HEIGHT));
            if !attrs.has("layout") {
                attrs.set("layout", "intrinsic");
            }
            if !attrs.has("sandbox") {
                attrs.set("sandbox", DEFAULT_SANDBOX);
            }
            if !attrs.has("frameborder") {
                attrs.set("frameborder", "0");
            }

            let replacement = doc.create_element("amp-iframe", attrs);
            if let Some(elem) = doc.element_mut(id) {
                elem.remove_attr("id");
            }
            doc.replace(id, replacement);
            if ctx.options.add_noscript_fallback {
                doc.append_fallback(replacement, id);
            }
            produced += 1;
        }
        produced
    }

    fn scripts(&self) -> &'static [&'static str] {
        &["amp-iframe"]
    }
}
