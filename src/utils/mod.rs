//! Shared helpers for markup, inline styles and URLs.

pub mod css;
pub mod html;
pub mod url;
