//! Per-run options and accumulated output.

use serde::{Deserialize, Serialize};

/// Options recognized by the built-in passes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizeOptions {
    /// Keep each replaced element inside a `<noscript>` of its substitute.
    pub add_noscript_fallback: bool,
    /// Keep `<img>` tags instead of substituting `amp-img`.
    pub native_img_used: bool,
    /// Leave `<picture>` wrapping intact.
    pub allow_picture: bool,
    /// Fallback width when an image cannot be sized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_max_width: Option<u32>,
    /// Wide/full aligned figures get a responsive default layout.
    pub align_wide_support: bool,
    /// Honor `data-ampdevmode` even without `<html data-ampdevmode>`.
    pub dev_mode: bool,
    /// Pre-render layout classes and `i-amphtml-layout` on generated elements.
    pub server_side_layout: bool,
}

impl SanitizeOptions {
    pub const FIELDS: &'static [&'static str] = &[
        "add_noscript_fallback",
        "native_img_used",
        "allow_picture",
        "content_max_width",
        "align_wide_support",
        "dev_mode",
        "server_side_layout",
    ];

    pub const DEFAULT_WIDTH: u32 = 600;
    pub const DEFAULT_HEIGHT: u32 = 400;

    /// Width used when an image cannot be sized.
    pub fn fallback_width(&self) -> u32 {
        self.content_max_width.unwrap_or(Self::DEFAULT_WIDTH)
    }
}

/// A CSS rule a pass needs in the page stylesheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stylesheet {
    pub selector: String,
    pub css: String,
}

impl Stylesheet {
    pub fn new(selector: impl Into<String>, css: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            css: css.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    RequiredAttrMissing,
    DisallowedTag,
    DisallowedAttr,
    InvalidAttrValue,
    SpecMismatch,
    PassFailed,
}

impl DiagnosticCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RequiredAttrMissing => "REQUIRED_ATTR_MISSING",
            Self::DisallowedTag => "DISALLOWED_TAG",
            Self::DisallowedAttr => "DISALLOWED_ATTR",
            Self::InvalidAttrValue => "INVALID_ATTR_VALUE",
            Self::SpecMismatch => "SPEC_MISMATCH",
            Self::PassFailed => "PASS_FAILED",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal content finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    /// Pass that reported it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass: Option<String>,
    /// Tag of the offending element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode) -> Self {
        Self {
            code,
            pass: None,
            node_name: None,
            spec_name: None,
            attributes: Vec::new(),
            message: None,
        }
    }

    pub fn node(mut self, tag: impl Into<String>) -> Self {
        self.node_name = Some(tag.into());
        self
    }

    pub fn spec_name(mut self, name: impl Into<String>) -> Self {
        self.spec_name = Some(name.into());
        self
    }

    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.attributes.push(name.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code)?;
        if let Some(node) = &self.node_name {
            write!(f, " <{node}>")?;
        }
        if !self.attributes.is_empty() {
            write!(f, " [{}]", self.attributes.join(", "))?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

/// Extension scripts and CSS a sanitized document depends on.
///
/// Both lists are deduplicated and keep first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub scripts: Vec<String>,
    pub stylesheets: Vec<Stylesheet>,
}

impl Manifest {
    pub fn add_script(&mut self, script: impl Into<String>) {
        let script = script.into();
        if !self.scripts.contains(&script) {
            self.scripts.push(script);
        }
    }

    pub fn add_stylesheet(&mut self, stylesheet: Stylesheet) {
        if !self.stylesheets.contains(&stylesheet) {
            self.stylesheets.push(stylesheet);
        }
    }

    pub fn merge(&mut self, other: Manifest) {
        other.scripts.into_iter().for_each(|s| self.add_script(s));
        other
            .stylesheets
            .into_iter()
            .for_each(|s| self.add_stylesheet(s));
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty() && self.stylesheets.is_empty()
    }
}

/// Shared state threaded through every pass of one run.
#[derive(Debug, Default)]
pub struct SanitizationContext {
    pub options: SanitizeOptions,
    pub manifest: Manifest,
    diagnostics: Vec<Diagnostic>,
    current_pass: Option<&'static str>,
}

impl SanitizationContext {
    pub fn new(options: SanitizeOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Record a diagnostic, attributing it to the running pass.
    pub fn report(&mut self, mut diagnostic: Diagnostic) {
        if diagnostic.pass.is_none() {
            diagnostic.pass = self.current_pass.map(str::to_string);
        }
        crate::debug!("diagnostic"; "{}", diagnostic);
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn current_pass(&self) -> Option<&'static str> {
        self.current_pass
    }

    pub(crate) fn set_current_pass(&mut self, pass: Option<&'static str>) {
        self.current_pass = pass;
    }

    pub(crate) fn into_output(self) -> SanitizeOutput {
        SanitizeOutput {
            manifest: self.manifest,
            diagnostics: self.diagnostics,
        }
    }
}

/// Everything a run produces besides the mutated document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizeOutput {
    pub manifest: Manifest,
    pub diagnostics: Vec<Diagnostic>,
}

impl SanitizeOutput {
    pub fn has(&self, code: DiagnosticCode) -> bool {
        self.diagnostics.iter().any(|d| d.code == code)
    }
}
