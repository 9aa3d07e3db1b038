//! Layout inference.
//!
//! Every dialect element is assigned one [`Layout`]. [`resolve`] is a pure
//! function of the explicit hint, the raw `width`/`height` attribute values
//! and the layouts a tag supports.
//!
//! | Layout         | Needs width | Needs height | CSS display    |
//! |----------------|-------------|--------------|----------------|
//! | `fixed`        | yes         | yes          | `inline-block` |
//! | `fixed-height` | no          | yes          | `block`        |
//! | `responsive`   | yes         | yes          | `block`        |
//! | `intrinsic`    | yes         | yes          | `inline-block` |
//! | `fill`         | no          | no           | `block`        |
//! | `flex-item`    | no          | no           | `block`        |
//! | `container`    | no          | no           | `inline-block` |
//! | `nodisplay`    | no          | no           | `none`         |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    Fixed,
    FixedHeight,
    Responsive,
    Fill,
    Container,
    Nodisplay,
    Intrinsic,
    FlexItem,
}

impl Layout {
    pub const ALL: [Layout; 8] = [
        Self::Fixed,
        Self::FixedHeight,
        Self::Responsive,
        Self::Fill,
        Self::Container,
        Self::Nodisplay,
        Self::Intrinsic,
        Self::FlexItem,
    ];

    /// Attribute spelling (`fixed-height`).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::FixedHeight => "fixed-height",
            Self::Responsive => "responsive",
            Self::Fill => "fill",
            Self::Container => "container",
            Self::Nodisplay => "nodisplay",
            Self::Intrinsic => "intrinsic",
            Self::FlexItem => "flex-item",
        }
    }

    /// Parse an attribute value. Accepts `FIXED_HEIGHT` as well as `fixed-height`.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL.into_iter().find(|l| l.as_str() == normalized)
    }

    /// CSS `display` value an element with this layout must use.
    pub const fn css_display(self) -> &'static str {
        match self {
            Self::FixedHeight | Self::Responsive | Self::Fill | Self::FlexItem => "block",
            Self::Nodisplay => "none",
            _ => "inline-block",
        }
    }

    pub const fn requires_width(self) -> bool {
        matches!(self, Self::Fixed | Self::Responsive | Self::Intrinsic)
    }

    pub const fn requires_height(self) -> bool {
        matches!(
            self,
            Self::Fixed | Self::FixedHeight | Self::Responsive | Self::Intrinsic
        )
    }

    /// Layouts whose box size is known before content loads.
    pub const fn is_size_defined(self) -> bool {
        matches!(
            self,
            Self::Fixed
                | Self::FixedHeight
                | Self::Responsive
                | Self::Fill
                | Self::FlexItem
                | Self::Intrinsic
        )
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layout {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| LayoutError::Unknown(s.to_string()))
    }
}

/// Parse an integer pixel value. `"50%"`, `"10px"`, `"auto"` are not numeric.
pub fn parse_pixels(value: &str) -> Option<u32> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

#[inline]
pub fn is_numeric(value: Option<&str>) -> bool {
    value.and_then(parse_pixels).is_some()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("unknown layout `{0}`")]
    Unknown(String),

    #[error("layout `{0}` is not supported by this element")]
    Unsupported(Layout),

    #[error("layout `{0}` requires a numeric width")]
    MissingWidth(Layout),

    #[error("layout `{0}` requires a numeric height")]
    MissingHeight(Layout),
}

/// Effective layout plus the classes a pre-rendered element carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLayout {
    pub layout: Layout,
    pub classes: Vec<String>,
}

/// Compute an element's layout.
///
/// Without a hint: no dimensions gives `container`, a height alone (or with
/// `width="auto"`) gives `fixed-height`, anything else `fixed`. An empty
/// `supported` slice accepts every layout.
pub fn resolve(
    hint: Option<Layout>,
    width: Option<&str>,
    height: Option<&str>,
    supported: &[Layout],
) -> Result<ResolvedLayout, LayoutError> {
    let width_auto = width.is_some_and(|w| w.trim() == "auto");
    let has_width = is_numeric(width);
    let has_height = is_numeric(height);

    let layout = match hint {
        Some(layout) => layout,
        None if width.is_none() && height.is_none() => Layout::Container,
        None if has_height && (width.is_none() || width_auto) => Layout::FixedHeight,
        None => Layout::Fixed,
    };

    if !supported.is_empty() && !supported.contains(&layout) {
        return Err(LayoutError::Unsupported(layout));
    }
    if layout.requires_width() && !has_width {
        return Err(LayoutError::MissingWidth(layout));
    }
    if layout.requires_height() && !has_height {
        return Err(LayoutError::MissingHeight(layout));
    }
    if layout == Layout::FixedHeight && width.is_some() && !width_auto && !has_width {
        return Err(LayoutError::MissingWidth(layout));
    }

    let mut classes = vec![format!("i-amphtml-layout-{}", layout.as_str())];
    if layout.is_size_defined() {
        classes.push("i-amphtml-layout-size-defined".to_string());
    }

    Ok(ResolvedLayout { layout, classes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spellings() {
        assert_eq!(Layout::parse("fixed-height"), Some(Layout::FixedHeight));
        assert_eq!(Layout::parse("FIXED_HEIGHT"), Some(Layout::FixedHeight));
        assert_eq!(Layout::parse(" Intrinsic "), Some(Layout::Intrinsic));
        assert_eq!(Layout::parse("stretchy"), None);
        assert!("bogus".parse::<Layout>().is_err());
    }

    #[test]
    fn test_parse_pixels() {
        assert_eq!(parse_pixels("300"), Some(300));
        assert_eq!(parse_pixels(" 72 "), Some(72));
        assert_eq!(parse_pixels("50%"), None);
        assert_eq!(parse_pixels("10px"), None);
        assert_eq!(parse_pixels("auto"), None);
        assert_eq!(parse_pixels("1.5"), None);
        assert_eq!(parse_pixels(""), None);
    }

    #[test]
    fn test_css_display() {
        assert_eq!(Layout::Responsive.css_display(), "block");
        assert_eq!(Layout::FixedHeight.css_display(), "block");
        assert_eq!(Layout::Nodisplay.css_display(), "none");
        assert_eq!(Layout::Intrinsic.css_display(), "inline-block");
        assert_eq!(Layout::Fixed.css_display(), "inline-block");
    }

    #[test]
    fn test_resolve_inference() {
        let l = |w, h| resolve(None, w, h, &[]).map(|r| r.layout);
        assert_eq!(l(None, None), Ok(Layout::Container));
        assert_eq!(l(None, Some("100")), Ok(Layout::FixedHeight));
        assert_eq!(l(Some("auto"), Some("100")), Ok(Layout::FixedHeight));
        assert_eq!(l(Some("300"), Some("100")), Ok(Layout::Fixed));
        assert_eq!(l(Some("300"), None), Err(LayoutError::MissingHeight(Layout::Fixed)));
    }

    #[test]
    fn test_resolve_hint_and_supported() {
        let supported = [Layout::Fixed, Layout::Nodisplay];
        assert_eq!(
            resolve(Some(Layout::Responsive), Some("1"), Some("1"), &supported),
            Err(LayoutError::Unsupported(Layout::Responsive))
        );
        assert_eq!(
            resolve(Some(Layout::Nodisplay), None, None, &supported).map(|r| r.layout),
            Ok(Layout::Nodisplay)
        );
        assert_eq!(
            resolve(Some(Layout::Intrinsic), Some("50%"), Some("10"), &[]),
            Err(LayoutError::MissingWidth(Layout::Intrinsic))
        );
    }

    #[test]
    fn test_resolve_classes() {
        let resolved = resolve(Some(Layout::Responsive), Some("4"), Some("3"), &[]).unwrap();
        assert_eq!(
            resolved.classes,
            ["i-amphtml-layout-responsive", "i-amphtml-layout-size-defined"]
        );

        let resolved = resolve(Some(Layout::Nodisplay), None, None, &[]).unwrap();
        assert_eq!(resolved.classes, ["i-amphtml-layout-nodisplay"]);
    }
}
