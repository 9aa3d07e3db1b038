use super::{EmbedHandler, candidates, pixels_or};
use crate::dom::{Attributes, Document};
use crate::pipeline::{Diagnostic, DiagnosticCode, SanitizationContext};

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 360;

/// `<video>` to `amp-video`. `<source>` and `<track>` children move along.
pub struct VideoEmbed;

impl EmbedHandler for VideoEmbed {
    fn name(&self) -> &'static str {
        "video"
    }

    fn sanitize(&self, doc: &mut Document, ctx: &mut SanitizationContext) -> usize {
        let mut produced = 0;
        for id in candidates(doc, "video") {
            let has_src = doc.attr(id, "src").is_some_and(|s| !s.trim().is_empty());
            let has_source = doc
                .children(id)
                .iter()
                .any(|&c| doc.is_tag(c, "source"));
            if !has_src && !has_source {
                doc.remove(id);
                ctx.report(
                    Diagnostic::new(DiagnosticCode::RequiredAttrMissing)
                        .node("video")
                        .spec_name("amp-video")
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
                .filter(|(name, _)| !matches!(*name, "width" | "height"))
                .collect();
            attrs.set("width", pixels_or(doc, id, "width", DEFAULT_WIDTH));
            attrs.set("height", pixels_or(doc, id, "height", DEFAULT_HEIGHT));
            if !attrs.has("layout") {
                attrs.set("layout", "responsive");
            }

            let replacement = doc.create_element("amp-video", attrs);
            let media: Vec<_> = doc
                .children(id)
                .iter()
                .copied()
                .filter(|&c| doc.is_tag(c, "source") || doc.is_tag(c, "track"))
                .collect();
            for child in media {
                // the fallback keeps its own copy
                let moved = if ctx.options.add_noscript_fallback {
                    doc.deep_clone(child)
                } else {
                    child
                };
                doc.append_child(replacement, moved);
            }

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
        &["amp-video"]
    }
}
