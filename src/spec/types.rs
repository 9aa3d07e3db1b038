//! Rule records deserialized from `rules.json`.
//!
//! Records are plain data. Regexes are compiled once by
//! [`SpecRepository`](super::SpecRepository) at load time and cached on the
//! attribute record.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use super::SpecError;
use crate::layout::Layout;

/// Output dialect a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Format {
    #[default]
    Amp,
    Amp4email,
}

impl Format {
    pub fn all() -> Vec<Format> {
        vec![Format::Amp, Format::Amp4email]
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "AMP" => Some(Self::Amp),
            "AMP4EMAIL" => Some(Self::Amp4email),
            _ => None,
        }
    }
}

/// Constraints on URL-valued attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlSpec {
    /// Allowed schemes, lowercase, without `:`.
    pub protocols: Vec<String>,
    pub allow_relative: bool,
    pub allow_empty: bool,
}

impl UrlSpec {
    pub fn accepts(&self, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return self.allow_empty;
        }
        match url::Url::parse(value) {
            Ok(url) => self.protocols.iter().any(|p| p == url.scheme()),
            Err(url::ParseError::RelativeUrlWithoutBase) => self.allow_relative,
            Err(_) => false,
        }
    }
}

/// A single attribute constraint.
///
/// A trailing `*` in `name` turns the record into a prefix rule
/// (`data-*` matches `data-foo`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttrSpec {
    pub name: String,
    pub mandatory: bool,
    /// Allowed literal values. Empty means unrestricted.
    pub value: Vec<String>,
    pub value_regex: Option<String>,
    pub value_url: Option<UrlSpec>,
    pub disallowed_value_regex: Option<String>,
    pub case_insensitive: bool,
    pub requires_extension: Vec<String>,

    #[serde(skip)]
    value_re: Option<Regex>,
    #[serde(skip)]
    disallowed_re: Option<Regex>,
}

impl AttrSpec {
    #[inline]
    pub fn is_prefix(&self) -> bool {
        self.name.ends_with('*')
    }

    pub fn matches_name(&self, name: &str) -> bool {
        match self.name.strip_suffix('*') {
            Some(prefix) => name.len() > prefix.len() && name.starts_with(prefix),
            None => self.name == name,
        }
    }

    /// Compile `value_regex` (anchored) and `disallowed_value_regex` (search).
    pub(super) fn compile(&mut self) -> Result<(), SpecError> {
        let build = |pattern: &str| {
            RegexBuilder::new(pattern)
                .case_insensitive(self.case_insensitive)
                .build()
                .map_err(|source| SpecError::Pattern {
                    attr: self.name.clone(),
                    source,
                })
        };
        self.value_re = self
            .value_regex
            .as_deref()
            .map(|p| build(&format!("^(?:{p})$")))
            .transpose()?;
        self.disallowed_re = self
            .disallowed_value_regex
            .as_deref()
            .map(build)
            .transpose()?;
        Ok(())
    }

    /// Whether `value` satisfies every value constraint of this record.
    pub fn accepts(&self, value: &str) -> bool {
        if !self.value.is_empty() {
            let listed = self.value.iter().any(|allowed| {
                if self.case_insensitive {
                    allowed.eq_ignore_ascii_case(value)
                } else {
                    allowed == value
                }
            });
            if !listed {
                return false;
            }
        }
        if let Some(re) = &self.value_re
            && !re.is_match(value)
        {
            return false;
        }
        if let Some(url_spec) = &self.value_url {
            // srcset-style lists carry one URL per comma-separated candidate
            let ok = if self.name == "srcset" {
                value
                    .split(',')
                    .filter_map(|c| c.split_whitespace().next())
                    .all(|u| url_spec.accepts(u))
            } else {
                url_spec.accepts(value)
            };
            if !ok {
                return false;
            }
        }
        if let Some(re) = &self.disallowed_re
            && re.is_match(value)
        {
            return false;
        }
        true
    }
}

/// Named, reusable group of attribute records.
#[derive(Debug, Clone, Default)]
pub struct AttributeList {
    pub id: String,
    pub attrs: Vec<AttrSpec>,
}

/// Attribute/value pair that selects one of several specs sharing a tag.
///
/// Without `value`, the attribute's presence is the dispatch key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dispatch {
    pub attribute: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl Dispatch {
    pub fn matches(&self, actual: Option<&str>) -> bool {
        match (&self.value, actual) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(expected), Some(actual)) => expected.eq_ignore_ascii_case(actual.trim()),
        }
    }
}

/// Declarative rule for one tag in one context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagSpec {
    /// Identity used in diagnostics. Defaults to the tag name.
    #[serde(default)]
    pub spec_name: String,
    pub tag: String,
    #[serde(default)]
    pub attrs: Vec<AttrSpec>,
    #[serde(default)]
    pub attr_lists: Vec<String>,
    #[serde(default)]
    pub mandatory_parent: Option<String>,
    #[serde(default)]
    pub mandatory_ancestor: Option<String>,
    #[serde(default)]
    pub disallowed_ancestor: Vec<String>,
    #[serde(default)]
    pub descendant_list: Option<String>,
    #[serde(default)]
    pub layouts: Vec<Layout>,
    #[serde(default)]
    pub requires_extension: Vec<String>,
    #[serde(default = "Format::all")]
    pub formats: Vec<Format>,
    #[serde(default)]
    pub specificity: u32,
    #[serde(default)]
    pub dispatch: Option<Dispatch>,
}

impl TagSpec {
    pub fn supports(&self, format: Format) -> bool {
        self.formats.contains(&format)
    }

    /// Whether the element is a dialect component with a managed layout.
    #[inline]
    pub fn has_layout(&self) -> bool {
        !self.layouts.is_empty()
    }
}
