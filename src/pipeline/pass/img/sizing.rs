//! Dimension detection and application for `<img>` nodes.

use crate::dimensions::Dimensions;
use crate::dom::{Attributes, Element};
use crate::layout::{Layout, is_numeric, parse_pixels};
use crate::pipeline::SanitizeOptions;
use crate::utils::html::merge_classes;

pub const UNKNOWN_SIZE_CLASS: &str = "amp-wp-unknown-size";
pub const UNKNOWN_WIDTH_CLASS: &str = "amp-wp-unknown-width";
pub const UNKNOWN_HEIGHT_CLASS: &str = "amp-wp-unknown-height";

/// Layout the node asks for: `data-amp-layout`, then `layout`, then intrinsic.
///
/// An unrecognized value yields `None`.
pub fn requested_layout(attrs: &Attributes) -> Option<Layout> {
    match attrs.get("data-amp-layout").or_else(|| attrs.get("layout")) {
        Some(value) => Layout::parse(value),
        None => Some(Layout::Intrinsic),
    }
}

/// Whether the node cannot be laid out from its own attributes.
pub fn needs_dimensions(layout: Option<Layout>, attrs: &Attributes) -> bool {
    let width = is_numeric(attrs.get("width"));
    let height = is_numeric(attrs.get("height"));
    match layout {
        Some(Layout::FixedHeight) => !height,
        Some(Layout::Fixed | Layout::Responsive | Layout::Intrinsic) => !width || !height,
        _ => false,
    }
}

fn pixels(elem: &Element, name: &str) -> Option<u32> {
    elem.get_attr(name).and_then(parse_pixels)
}

fn scale(value: u32, numerator: u32, denominator: u32) -> Option<f64> {
    (denominator > 0).then(|| f64::from(value) * f64::from(numerator) / f64::from(denominator))
}

/// Fill in missing `width`/`height` from the extracted size.
///
/// A missing axis keeps the aspect ratio of the extracted size when the other
/// axis is numeric and both extracted axes are non-zero; otherwise it takes
/// the base size (the extracted axis if non-zero, or the configured fallback).
/// Height is computed after width, so a width set here feeds the height ratio.
pub fn apply_dimensions(elem: &mut Element, found: Option<Dimensions>, options: &SanitizeOptions) {
    let found_width = found.map(|d| d.width).filter(|&w| w > 0);
    let found_height = found.map(|d| d.height).filter(|&h| h > 0);
    let ratio = found_width.zip(found_height);

    let mut flags: Vec<&str> = Vec::new();
    if ratio.is_none() {
        flags.push(UNKNOWN_SIZE_CLASS);
    }

    if pixels(elem, "width").is_none() {
        let width = match (pixels(elem, "height"), ratio) {
            (Some(height), Some((w, h))) => scale(height, w, h),
            _ => None,
        };
        let width = match (width, found_width) {
            (Some(width), _) => width,
            (None, Some(w)) => f64::from(w),
            (None, None) => {
                flags.push(UNKNOWN_WIDTH_CLASS);
                f64::from(options.fallback_width())
            }
        };
        elem.set_attr("width", (width.round() as u32).to_string());
    }

    if pixels(elem, "height").is_none() {
        let height = match (pixels(elem, "width"), ratio) {
            (Some(width), Some((w, h))) => scale(width, h, w),
            _ => None,
        };
        let height = match (height, found_height) {
            (Some(height), _) => height,
            (None, Some(h)) => f64::from(h),
            (None, None) => {
                flags.push(UNKNOWN_HEIGHT_CLASS);
                f64::from(SanitizeOptions::DEFAULT_HEIGHT)
            }
        };
        elem.set_attr("height", (height.round() as u32).to_string());
    }

    if !flags.is_empty() {
        let class = merge_classes(elem.get_attr("class").unwrap_or(""), flags);
        elem.set_attr("class", class);
    }
}

/// Attribute set of the substitute element.
pub fn project_attributes(attrs: &Attributes) -> Attributes {
    let mut out = Attributes::new();
    for (name, value) in attrs.iter() {
        match name {
            "width" | "height" => {
                if let Some(px) = parse_pixels(value) {
                    out.set(name, px.to_string());
                }
            }
            "data-amp-layout" => out.set("layout", value),
            "data-amp-noloading" => out.set("noloading", ""),
            "intrinsicsize" => {}
            "loading" if value.trim().eq_ignore_ascii_case("lazy") => {}
            "decoding" if value.trim().eq_ignore_ascii_case("async") => {}
            _ => out.set(name, value),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn img(attrs: &[(&str, &str)]) -> Element {
        Element::new("img", attrs.iter().copied().collect())
    }

    #[test]
    fn test_requested_layout() {
        let attrs = Attributes::from([("data-amp-layout", "fill"), ("layout", "fixed")]);
        assert_eq!(requested_layout(&attrs), Some(Layout::Fill));
        let attrs = Attributes::from([("layout", "fixed-height")]);
        assert_eq!(requested_layout(&attrs), Some(Layout::FixedHeight));
        assert_eq!(requested_layout(&Attributes::new()), Some(Layout::Intrinsic));
        assert_eq!(requested_layout(&Attributes::from([("layout", "odd")])), None);
    }

    #[test]
    fn test_needs_dimensions() {
        let sized = Attributes::from([("width", "10"), ("height", "20")]);
        assert!(!needs_dimensions(Some(Layout::Intrinsic), &sized));

        let percent = Attributes::from([("width", "50%"), ("height", "20")]);
        assert!(needs_dimensions(Some(Layout::Responsive), &percent));
        assert!(!needs_dimensions(Some(Layout::FixedHeight), &percent));
        assert!(!needs_dimensions(Some(Layout::Fill), &Attributes::new()));
        assert!(!needs_dimensions(None, &Attributes::new()));
        assert!(needs_dimensions(Some(Layout::FixedHeight), &Attributes::new()));
    }

    #[test]
    fn test_height_from_aspect_ratio() {
        let mut elem = img(&[("width", "300")]);
        apply_dimensions(&mut elem, Some(Dimensions::new(600, 400)), &SanitizeOptions::default());
        assert_eq!(elem.get_attr("width"), Some("300"));
        assert_eq!(elem.get_attr("height"), Some("200"));
        assert_eq!(elem.get_attr("class"), None);
    }

    #[test]
    fn test_width_from_aspect_ratio_rounds() {
        let mut elem = img(&[("height", "100")]);
        apply_dimensions(&mut elem, Some(Dimensions::new(1000, 300)), &SanitizeOptions::default());
        assert_eq!(elem.get_attr("width"), Some("333"));
        assert_eq!(elem.get_attr("height"), Some("100"));
    }

    #[test]
    fn test_extracted_size_used_when_both_missing() {
        let mut elem = img(&[]);
        apply_dimensions(&mut elem, Some(Dimensions::new(1024, 768)), &SanitizeOptions::default());
        assert_eq!(elem.get_attr("width"), Some("1024"));
        assert_eq!(elem.get_attr("height"), Some("768"));
    }

    #[test]
    fn test_unknown_size_defaults_and_flags() {
        let mut elem = img(&[("class", "wp-image-5")]);
        apply_dimensions(&mut elem, None, &SanitizeOptions::default());
        assert_eq!(elem.get_attr("width"), Some("600"));
        assert_eq!(elem.get_attr("height"), Some("400"));
        assert_eq!(
            elem.get_attr("class"),
            Some("wp-image-5 amp-wp-unknown-size amp-wp-unknown-width amp-wp-unknown-height")
        );

        let mut elem = img(&[("height", "50")]);
        let options = SanitizeOptions {
            content_max_width: Some(780),
            ..Default::default()
        };
        apply_dimensions(&mut elem, None, &options);
        assert_eq!(elem.get_attr("width"), Some("780"));
        assert_eq!(elem.get_attr("height"), Some("50"));
        assert_eq!(
            elem.get_attr("class"),
            Some("amp-wp-unknown-size amp-wp-unknown-width")
        );
    }

    #[test]
    fn test_zero_extracted_height_falls_back_to_base() {
        let mut elem = img(&[("height", "10")]);
        apply_dimensions(&mut elem, Some(Dimensions::new(50, 0)), &SanitizeOptions::default());
        assert_eq!(elem.get_attr("width"), Some("50"));
        assert_eq!(elem.get_attr("height"), Some("10"));

        let mut elem = img(&[]);
        apply_dimensions(&mut elem, Some(Dimensions::new(50, 0)), &SanitizeOptions::default());
        assert_eq!(elem.get_attr("width"), Some("50"));
        assert_eq!(elem.get_attr("height"), Some("400"));
        assert_eq!(
            elem.get_attr("class"),
            Some("amp-wp-unknown-size amp-wp-unknown-height")
        );
    }

    #[test]
    fn test_zero_extracted_width_falls_back_to_base() {
        let mut elem = img(&[("height", "10")]);
        apply_dimensions(&mut elem, Some(Dimensions::new(0, 30)), &SanitizeOptions::default());
        assert_eq!(elem.get_attr("width"), Some("600"));
        assert_eq!(elem.get_attr("height"), Some("10"));
        assert_eq!(
            elem.get_attr("class"),
            Some("amp-wp-unknown-size amp-wp-unknown-width")
        );

        let mut elem = img(&[]);
        let options = SanitizeOptions {
            content_max_width: Some(780),
            ..Default::default()
        };
        apply_dimensions(&mut elem, Some(Dimensions::new(0, 30)), &options);
        assert_eq!(elem.get_attr("width"), Some("780"));
        assert_eq!(elem.get_attr("height"), Some("30"));
    }

    #[test]
    fn test_project_attributes() {
        let attrs = Attributes::from([
            ("src", "a.png"),
            ("width", "50%"),
            ("height", " 20 "),
            ("data-amp-layout", "fill"),
            ("data-amp-noloading", ""),
            ("intrinsicsize", "10x10"),
            ("loading", "lazy"),
            ("decoding", "async"),
            ("srcset", "a.png 1x"),
            ("data-id", "7"),
        ]);
        let out = project_attributes(&attrs);
        let names: Vec<_> = out.iter().map(|(k, _)| k).collect();
        assert_eq!(names, ["src", "height", "layout", "noloading", "srcset", "data-id"]);
        assert_eq!(out.get("height"), Some("20"));
        assert_eq!(out.get("layout"), Some("fill"));

        let kept = project_attributes(&Attributes::from([("loading", "eager"), ("decoding", "sync")]));
        assert_eq!(kept.len(), 2);
    }
}
