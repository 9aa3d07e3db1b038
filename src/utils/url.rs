//! URL inspection helpers for `src` / `href` values.
//!
//! Values in markup may be absolute, protocol-relative (`//host/x`),
//! site-root (`/x`) or relative (`x`). All helpers accept every form.

use std::sync::OnceLock;

use percent_encoding::percent_decode_str;
use url::Url;

/// Dummy base used to parse relative references.
fn base() -> &'static Url {
    static BASE: OnceLock<Url> = OnceLock::new();
    BASE.get_or_init(|| Url::parse("http://ampify.invalid/").expect("static base URL is valid"))
}

/// Parse any markup URL form into an absolute `Url`.
///
/// Protocol-relative values are given `https:`; relative values resolve
/// against a placeholder host, so only their path is meaningful.
pub fn parse_loose(value: &str) -> Option<Url> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Some(rest) = value.strip_prefix("//") {
        return Url::parse(&format!("https://{rest}")).ok();
    }
    match Url::parse(value) {
        Ok(url) => Some(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => base().join(value).ok(),
        Err(_) => None,
    }
}

/// Normalize a URL for dimension lookup: protocol-relative becomes `https:`.
pub fn normalize_for_lookup(value: &str) -> String {
    let value = value.trim();
    match value.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => value.to_string(),
    }
}

/// Decoded path component, without query or fragment.
pub fn path_of(value: &str) -> Option<String> {
    let url = parse_loose(value)?;
    Some(
        percent_decode_str(url.path())
            .decode_utf8()
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| url.path().to_string()),
    )
}

/// Host with a leading `www.` removed, for absolute URLs only.
pub fn bare_host(value: &str) -> Option<String> {
    let value = value.trim();
    if !(value.starts_with("//") || value.contains("://")) {
        return None;
    }
    let url = parse_loose(value)?;
    let host = url.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}

/// Whether the URL path ends in a file extension (`/a/b.jpg`), i.e. points
/// directly at a media file rather than an attachment page.
pub fn has_file_extension(value: &str) -> bool {
    path_of(value)
        .and_then(|path| {
            let name = path.rsplit('/').next()?.to_string();
            let (stem, ext) = name.rsplit_once('.')?;
            Some(
                !stem.is_empty()
                    && !ext.is_empty()
                    && ext.chars().all(|c| c.is_alphanumeric() || c == '_'),
            )
        })
        .unwrap_or(false)
}

/// Whether the URL path ends with the given extension (case-insensitive).
pub fn has_extension(value: &str, ext: &str) -> bool {
    path_of(value).is_some_and(|path| {
        path.rsplit_once('.')
            .is_some_and(|(_, e)| e.eq_ignore_ascii_case(ext))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_loose_forms() {
        assert_eq!(
            parse_loose("https://example.com/a.png").unwrap().path(),
            "/a.png"
        );
        assert_eq!(
            parse_loose("//cdn.example.com/a.png").unwrap().scheme(),
            "https"
        );
        assert_eq!(parse_loose("/img/a.png").unwrap().path(), "/img/a.png");
        assert_eq!(parse_loose("img/a.png").unwrap().path(), "/img/a.png");
        assert!(parse_loose("  ").is_none());
    }

    #[test]
    fn test_path_of_strips_query_and_decodes() {
        assert_eq!(
            path_of("https://x.com/a%20b.jpg?w=10#top").as_deref(),
            Some("/a b.jpg")
        );
    }

    #[test]
    fn test_bare_host() {
        assert_eq!(
            bare_host("https://www.facebook.com/tr?id=1").as_deref(),
            Some("facebook.com")
        );
        assert_eq!(
            bare_host("//facebook.com/tr").as_deref(),
            Some("facebook.com")
        );
        assert_eq!(bare_host("/tr"), None);
    }

    #[test]
    fn test_has_file_extension() {
        assert!(has_file_extension("https://example.com/uploads/cat.jpg"));
        assert!(has_file_extension("/uploads/cat.JPEG?ver=2"));
        assert!(!has_file_extension("https://example.com/cat/"));
        assert!(!has_file_extension("https://example.com/?attachment_id=5"));
        assert!(!has_file_extension("https://example.com/2020/cat-photo"));
    }

    #[test]
    fn test_has_extension() {
        assert!(has_extension("https://example.com/a.gif", "gif"));
        assert!(has_extension("/a.GIF?x=1", "gif"));
        assert!(!has_extension("/a.gifv", "gif"));
        assert!(!has_extension("/gif/a.png", "gif"));
    }

    #[test]
    fn test_normalize_for_lookup() {
        assert_eq!(normalize_for_lookup("//x.com/a.png"), "https://x.com/a.png");
        assert_eq!(normalize_for_lookup(" /a.png "), "/a.png");
    }
}
