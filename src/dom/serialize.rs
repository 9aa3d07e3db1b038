//! Render a [`Document`] back to HTML.

use super::{Document, NodeId, NodeKind};
use crate::utils::html::{escape_attr, is_void_element};

/// Serialize the whole document, including its doctype.
pub fn serialize(doc: &Document) -> String {
    let mut out = String::new();
    if let Some(doctype) = &doc.doctype {
        out.push_str("<!DOCTYPE ");
        out.push_str(doctype);
        out.push('>');
    }
    for &child in doc.children(doc.root()) {
        write_node(doc, child, &mut out);
    }
    out
}

/// Outer HTML of a single node.
pub fn serialize_node(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, id, &mut out);
    out
}

fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    match &doc.node(id).kind {
        NodeKind::Root => {
            for &child in doc.children(id) {
                write_node(doc, child, out);
            }
        }
        NodeKind::Text(text) => out.push_str(text),
        NodeKind::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeKind::Element(elem) => {
            out.push('<');
            out.push_str(&elem.tag);
            for (name, value) in elem.attrs.iter() {
                out.push(' ');
                out.push_str(name);
                // Boolean-style attributes stay bare: `<amp-img lightbox>`
                if !value.is_empty() {
                    out.push_str("=\"");
                    out.push_str(&escape_attr(value));
                    out.push('"');
                }
            }
            out.push('>');

            if is_void_element(&elem.tag) {
                return;
            }
            for &child in doc.children(id) {
                write_node(doc, child, out);
            }
            out.push_str("</");
            out.push_str(&elem.tag);
            out.push('>');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Attributes, parse};
    use super::*;

    #[test]
    fn test_round_trip_fragment() {
        let html = r#"<p class="a">Hi <b>there</b><br></p>"#;
        assert_eq!(serialize(&parse(html)), html);
    }

    #[test]
    fn test_attribute_escaping() {
        let mut doc = Document::new();
        let img = doc.create_element(
            "amp-img",
            Attributes::from([("alt", "\"quoted\" & <tag>"), ("lightbox", "")]),
        );
        doc.append_child(doc.root(), img);
        assert_eq!(
            serialize(&doc),
            r#"<amp-img alt="&quot;quoted&quot; &amp; &lt;tag&gt;" lightbox></amp-img>"#
        );
    }

    #[test]
    fn test_doctype_is_emitted() {
        let doc = parse("<!DOCTYPE html><html><body></body></html>");
        assert!(serialize(&doc).starts_with("<!DOCTYPE html><html>"));
    }
}
