//! Lightbox attribute propagation.
//!
//! Block markup puts the lightbox flag on a wrapper:
//!
//! ```text
//! figure[data-amp-lightbox] > img
//! figure[data-amp-lightbox] > a[href=file] > img
//! div.wp-block-image[data-amp-lightbox] > figure > img
//! ```
//!
//! The flag is read from the nearest `<figure>` (the image's parent, or for a
//! file anchor the anchor's parent or grandparent), or from a block wrapper
//! directly above that figure.

use crate::dom::{Attributes, Document, NodeId};
use crate::utils::html::is_truthy;
use crate::utils::url::has_file_extension;

pub const LIGHTBOX_DATA_ATTR: &str = "data-amp-lightbox";
const BLOCK_CLASS: &str = "wp-block-image";

/// Copy lightbox attributes onto `attrs` when a wrapper asks for it.
///
/// A wrapping anchor that links straight to the media file is replaced by the
/// image. Returns whether lightbox attributes were added.
pub fn propagate(doc: &mut Document, img: NodeId, attrs: &mut Attributes) -> bool {
    let Some(parent) = doc.parent_element(img) else {
        return false;
    };

    let links_to_file = doc.is_tag(parent, "a")
        && doc.attr(parent, "href").is_some_and(has_file_extension);
    let figure = if doc.is_tag(parent, "figure") {
        parent
    } else if links_to_file {
        let up = doc.parent_element(parent);
        let upper = up.and_then(|id| doc.parent_element(id));
        match [up, upper].into_iter().flatten().find(|&id| doc.is_tag(id, "figure")) {
            Some(figure) => figure,
            None => return false,
        }
    } else {
        return false;
    };

    let source = match doc.parent_element(figure) {
        Some(wrapper) if doc.element(wrapper).is_some_and(|e| e.has_class(BLOCK_CLASS)) => wrapper,
        _ => figure,
    };
    if !doc.attr(source, LIGHTBOX_DATA_ATTR).is_some_and(is_truthy) {
        return false;
    }

    attrs.set(LIGHTBOX_DATA_ATTR, "");
    attrs.set("lightbox", "");
    if links_to_file {
        doc.replace(parent, img);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{parse, serialize};

    fn run(html: &str) -> (bool, Attributes, String) {
        let mut doc = parse(html);
        let img = doc.elements_by_tag("img")[0];
        let mut attrs = Attributes::new();
        let added = propagate(&mut doc, img, &mut attrs);
        (added, attrs, serialize(&doc))
    }

    #[test]
    fn test_figure_flag() {
        let (added, attrs, _) =
            run(r#"<figure class="wp-block-image" data-amp-lightbox="true"><img src="a.jpg"></figure>"#);
        assert!(added);
        assert_eq!(attrs.get("lightbox"), Some(""));
        assert_eq!(attrs.get(LIGHTBOX_DATA_ATTR), Some(""));
    }

    #[test]
    fn test_falsy_flag_is_ignored() {
        let (added, attrs, _) =
            run(r#"<figure data-amp-lightbox="false"><img src="a.jpg"></figure>"#);
        assert!(!added);
        assert!(attrs.is_empty());
    }

    #[test]
    fn test_aligned_wrapper() {
        let (added, _, _) = run(
            r#"<div class="wp-block-image" data-amp-lightbox="1"><figure class="alignleft"><img src="a.jpg"></figure></div>"#,
        );
        assert!(added);
    }

    #[test]
    fn test_file_anchor_is_unwrapped() {
        let (added, _, html) = run(
            r#"<figure class="wp-block-image" data-amp-lightbox="true"><a href="https://x.com/up/a.jpg"><img src="a.jpg"></a></figure>"#,
        );
        assert!(added);
        assert_eq!(
            html,
            r#"<figure class="wp-block-image" data-amp-lightbox="true"><img src="a.jpg"></figure>"#
        );
    }

    #[test]
    fn test_attachment_anchor_is_kept() {
        let (added, _, html) = run(
            r#"<figure class="wp-block-image" data-amp-lightbox="true"><a href="https://x.com/?attachment_id=4"><img src="a.jpg"></a></figure>"#,
        );
        assert!(!added);
        assert!(html.contains("<a href="));
    }

    #[test]
    fn test_plain_figure_with_file_anchor() {
        let (added, attrs, html) = run(
            r#"<figure data-amp-lightbox="true"><a href="/up/cat.jpg"><img src="/up/cat.jpg"></a></figure>"#,
        );
        assert!(added);
        assert_eq!(attrs.get("lightbox"), Some(""));
        assert_eq!(
            html,
            r#"<figure data-amp-lightbox="true"><img src="/up/cat.jpg"></figure>"#
        );
    }

    #[test]
    fn test_file_anchor_nested_in_figure() {
        let (added, _, html) = run(
            r#"<figure data-amp-lightbox="true"><div><a href="/up/cat.jpg"><img src="a.jpg"></a></div></figure>"#,
        );
        assert!(added);
        assert!(!html.contains("<a "));
    }

    #[test]
    fn test_file_anchor_without_figure() {
        let (added, attrs, html) = run(
            r#"<div class="wp-block-image" data-amp-lightbox="true"><a href="/up/cat.jpg"><img src="a.jpg"></a></div>"#,
        );
        assert!(!added);
        assert!(attrs.is_empty());
        assert!(html.contains(r#"<a href="/up/cat.jpg">"#));
    }
}
