//! Build a [`Document`] from markup using `tl`.
//!
//! Attribute values are entity-decoded so passes compare plain strings;
//! text is kept as raw source and re-emitted verbatim.

use super::{Attributes, DEV_MODE_ATTR, Document, Element, NodeId};
use crate::utils::html::{start_tag_attributes, unescape};

/// Parse an HTML document or fragment.
///
/// `tl` is lenient, so this only fails on inputs it cannot tokenize at all;
/// such input is kept as a single text node.
pub fn parse(html: &str) -> Document {
    let mut doc = Document::new();
    doc.doctype = detect_doctype(html);

    let Ok(dom) = tl::parse(html, tl::ParserOptions::default()) else {
        let text = doc.create_text(html);
        doc.append_child(doc.root(), text);
        return doc;
    };

    let parser = dom.parser();
    let root = doc.root();
    for handle in dom.children() {
        convert(&mut doc, root, *handle, parser);
    }

    let dev_mode = doc
        .elements_by_tag("html")
        .first()
        .is_some_and(|&html| doc.element(html).is_some_and(|e| e.has_attr(DEV_MODE_ATTR)));
    doc.set_dev_mode(dev_mode);

    doc
}

fn detect_doctype(html: &str) -> Option<String> {
    let trimmed = html.trim_start();
    let head = trimmed.get(..9)?;
    if !head.eq_ignore_ascii_case("<!doctype") {
        return None;
    }
    let end = trimmed.find('>')?;
    let name = trimmed[9..end].trim();
    Some(if name.is_empty() { "html".to_string() } else { name.to_string() })
}

/// Convert a `tl` node and its subtree, appending it under `parent`.
fn convert(doc: &mut Document, parent: NodeId, handle: tl::NodeHandle, parser: &tl::Parser) {
    let Some(node) = handle.get(parser) else {
        return;
    };

    match node {
        tl::Node::Tag(tag) => {
            let name = tag.name().as_utf8_str().to_ascii_lowercase();
            if name.starts_with('!') {
                return;
            }

            // tl mangles names that follow a valueless attribute and loses
            // source order, so attributes come from the raw start tag
            let raw = tag.raw().as_utf8_str();
            let attrs: Attributes = start_tag_attributes(&raw)
                .into_iter()
                .map(|(key, value)| {
                    let value = unescape(&value).into_owned();
                    (key, value)
                })
                .collect();

            let mut elem = Element::new(name, attrs);
            elem.exempt = elem.has_attr(DEV_MODE_ATTR);
            let id = doc.adopt_element(elem);
            doc.append_child(parent, id);

            for child in tag.children().top().iter() {
                convert(doc, id, *child, parser);
            }
        }
        tl::Node::Raw(bytes) => {
            let text = bytes.as_utf8_str();
            if text.trim_start().starts_with("<!") {
                return;
            }
            let id = doc.create_text(text.into_owned());
            doc.append_child(parent, id);
        }
        tl::Node::Comment(bytes) => {
            let raw = bytes.as_utf8_str();
            let inner = raw
                .trim_start_matches("<!--")
                .trim_end_matches("-->")
                .to_string();
            let id = doc.create_comment(inner);
            doc.append_child(parent, id);
        }
    }
}
