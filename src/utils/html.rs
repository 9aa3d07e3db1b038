//! HTML utility functions.
//!
//! Provides common HTML processing functions:
//! - `escape_attr()`, `unescape()` - HTML entity escaping
//! - `is_void_element()` - Self-closing elements (br, img, etc.)
//! - `is_raw_text_element()` - Raw text elements (script, style)
//! - `drops_content()` - Disallowed elements whose children are meaningless without them
//! - `merge_classes()` - Class list deduplication
//! - `is_truthy()` - Loose boolean attribute values
//! - `start_tag_attributes()` - Start-tag attributes in source order

use std::borrow::Cow;

// =============================================================================
// HTML Escaping
// =============================================================================

/// Characters that require HTML escaping.
const ESCAPE_CHARS: [char; 5] = ['<', '>', '&', '"', '\''];

/// Get the HTML entity for a special character.
#[inline]
fn escape_char(c: char) -> Option<&'static str> {
    match c {
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '&' => Some("&amp;"),
        '"' => Some("&quot;"),
        '\'' => Some("&#39;"),
        _ => None,
    }
}

/// Escape HTML attribute values.
///
/// Uses `Cow` to avoid allocation when no escaping is needed.
#[inline]
pub fn escape_attr(s: &str) -> Cow<'_, str> {
    if !s.contains(&ESCAPE_CHARS[..]) {
        return Cow::Borrowed(s);
    }

    let mut result = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match escape_char(c) {
            Some(entity) => result.push_str(entity),
            None => result.push(c),
        }
    }
    Cow::Owned(result)
}

/// Unescape HTML entities back to characters.
///
/// Handles common named entities and numeric character references.
/// Unknown entities are kept verbatim.
pub fn unescape(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }

    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find('&') {
        result.push_str(&rest[..pos]);
        rest = &rest[pos + 1..];

        let Some(end) = rest.find(';').filter(|&end| end > 0 && end <= 10) else {
            result.push('&');
            continue;
        };

        let entity = &rest[..end];
        match decode_entity(entity) {
            Some(c) => {
                result.push(c);
                rest = &rest[end + 1..];
            }
            None => result.push('&'),
        }
    }
    result.push_str(rest);

    Cow::Owned(result)
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{00A0}'),
        s if s.starts_with("#x") || s.starts_with("#X") => {
            u32::from_str_radix(&s[2..], 16).ok().and_then(char::from_u32)
        }
        s if s.starts_with('#') => s[1..].parse().ok().and_then(char::from_u32),
        _ => None,
    }
}

// =============================================================================
// Element Classification
// =============================================================================

/// Check if an HTML tag is a void element (self-closing).
///
/// Void elements cannot have children and are rendered without a closing tag.
#[inline]
pub fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}

/// Check if tag is a raw text element (content should not be HTML-escaped).
#[inline]
pub fn is_raw_text_element(tag: &str) -> bool {
    matches!(tag, "script" | "style")
}

/// Disallowed elements removed together with their subtree.
///
/// Every other disallowed element is unwrapped so its text survives.
#[inline]
pub fn drops_content(tag: &str) -> bool {
    matches!(
        tag,
        "script"
            | "style"
            | "template"
            | "object"
            | "embed"
            | "applet"
            | "iframe"
            | "frame"
            | "frameset"
            | "svg"
            | "math"
            | "canvas"
    )
}

// =============================================================================
// Attribute Values
// =============================================================================

/// Loose boolean parsing for data attributes (`1`, `true`, `on`, `yes`).
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

/// Append class names to an existing class list.
///
/// Result is whitespace-normalized and deduplicated, keeping first occurrence.
pub fn merge_classes<'a>(existing: &str, extra: impl IntoIterator<Item = &'a str>) -> String {
    let mut classes: Vec<&str> = Vec::new();
    for class in existing.split_whitespace().chain(
        extra
            .into_iter()
            .flat_map(|c| c.split_whitespace()),
    ) {
        if !classes.contains(&class) {
            classes.push(class);
        }
    }
    classes.join(" ")
}

/// Attributes of an element's start tag, in source order.
///
/// `raw` is the element's source starting at `<`; scanning stops at the first
/// unquoted `>`. Names are lowercased, values are returned undecoded, and a
/// valueless attribute gets an empty value. Repeated names keep the first.
pub fn start_tag_attributes(raw: &str) -> Vec<(String, String)> {
    let mut attrs: Vec<(String, String)> = Vec::new();
    let mut chars = raw.chars().peekable();

    // tag name
    if chars.next() != Some('<') {
        return attrs;
    }
    while chars
        .peek()
        .is_some_and(|c| !c.is_whitespace() && *c != '>' && *c != '/')
    {
        chars.next();
    }

    while let Some(c) = chars.next() {
        if c.is_whitespace() || c == '/' {
            continue;
        }
        if c == '>' {
            break;
        }

        let mut name = String::new();
        name.push(c.to_ascii_lowercase());
        while let Some(&next) = chars.peek() {
            if next == '=' || next == '>' || next == '/' || next.is_whitespace() {
                break;
            }
            name.push(next.to_ascii_lowercase());
            chars.next();
        }

        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let mut value = String::new();
        if chars.peek() == Some(&'=') {
            chars.next();
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }
            match chars.peek().copied() {
                Some(quote @ ('"' | '\'')) => {
                    chars.next();
                    for c in chars.by_ref() {
                        if c == quote {
                            break;
                        }
                        value.push(c);
                    }
                }
                _ => {
                    while let Some(&c) = chars.peek() {
                        if c.is_whitespace() || c == '>' {
                            break;
                        }
                        value.push(c);
                        chars.next();
                    }
                }
            }
        }

        if !attrs.iter().any(|(n, _)| *n == name) {
            attrs.push((name, value));
        }
    }
    attrs
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_attr() {
        assert_eq!(escape_attr("normal"), "normal");
        assert_eq!(escape_attr("a\"b&c"), "a&quot;b&amp;c");
        assert_eq!(escape_attr("it's"), "it&#39;s");
        assert_eq!(escape_attr("<x>"), "&lt;x&gt;");
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("hello"), "hello");
        assert_eq!(unescape("&lt;script&gt;"), "<script>");
        assert_eq!(unescape("a &amp; b"), "a & b");
        assert_eq!(unescape("&quot;hi&quot;"), "\"hi\"");
        assert_eq!(unescape("&#39;"), "'");
        assert_eq!(unescape("&#x27;"), "'");
        assert_eq!(unescape("&#65;"), "A");
        assert_eq!(unescape("&nbsp;"), "\u{00A0}");
    }

    #[test]
    fn test_unescape_keeps_unknown() {
        assert_eq!(unescape("a & b"), "a & b");
        assert_eq!(unescape("?x=1&y=2"), "?x=1&y=2");
        assert_eq!(unescape("&bogus;"), "&bogus;");
    }

    #[test]
    fn test_void_elements() {
        assert!(is_void_element("br"));
        assert!(is_void_element("img"));
        assert!(is_void_element("source"));
        assert!(!is_void_element("div"));
        assert!(!is_void_element("amp-img"));
    }

    #[test]
    fn test_raw_text_elements() {
        assert!(is_raw_text_element("script"));
        assert!(is_raw_text_element("style"));
        assert!(!is_raw_text_element("pre"));
    }

    #[test]
    fn test_drops_content() {
        assert!(drops_content("script"));
        assert!(drops_content("iframe"));
        assert!(!drops_content("font"));
        assert!(!drops_content("center"));
    }

    #[test]
    fn test_is_truthy() {
        assert!(is_truthy("true"));
        assert!(is_truthy(" TRUE "));
        assert!(is_truthy("1"));
        assert!(!is_truthy(""));
        assert!(!is_truthy("false"));
        assert!(!is_truthy("0"));
    }

    #[test]
    fn test_merge_classes() {
        assert_eq!(merge_classes("", ["a"]), "a");
        assert_eq!(merge_classes("  a  b ", ["b", "c"]), "a b c");
        assert_eq!(merge_classes("x", ["y z", "x"]), "x y z");
    }

    #[test]
    fn test_start_tag_attributes() {
        let attrs = start_tag_attributes(
            r#"<IMG Src="a>b.png" width=10 alt='x "y"' data-z loading = lazy>rest"#,
        );
        let expected = [
            ("src", "a>b.png"),
            ("width", "10"),
            ("alt", "x \"y\""),
            ("data-z", ""),
            ("loading", "lazy"),
        ];
        assert_eq!(attrs.len(), expected.len());
        for ((name, value), (en, ev)) in attrs.iter().zip(expected) {
            assert_eq!((name.as_str(), value.as_str()), (en, ev));
        }
        assert!(start_tag_attributes("<br/>").is_empty());
        assert!(start_tag_attributes("text").is_empty());
    }

    #[test]
    fn test_start_tag_attributes_after_valueless() {
        let attrs = start_tag_attributes(r#"<input disabled/>"#);
        assert_eq!(attrs, [("disabled".to_string(), String::new())]);

        let attrs = start_tag_attributes(r#"<script async src="/v0.js"></script>"#);
        assert_eq!(attrs[0], ("async".to_string(), String::new()));
        assert_eq!(attrs[1], ("src".to_string(), "/v0.js".to_string()));
    }

    #[test]
    fn test_start_tag_attributes_first_wins() {
        let attrs = start_tag_attributes(r#"<a href="1" HREF="2">"#);
        assert_eq!(attrs, [("href".to_string(), "1".to_string())]);
    }
}
