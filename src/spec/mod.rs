//! Rule specification repository.
//!
//! One immutable table of [`TagSpec`]s, reusable [`AttributeList`]s and
//! descendant allowlists, loaded from JSON and queried by every pass.
//!
//! # Resolution
//!
//! Several specs may share a tag name (`<script>`, `<style>`, `<source>`).
//! [`SpecRepository::resolve`] narrows the candidates for a concrete element:
//!
//! ```text
//! candidates ──> dispatch key matches? ──yes──> dispatched pool
//!                        │ no
//!                        v
//!                 undispatched pool
//!                        │
//!          parent / ancestor constraints hold
//!                        │
//!          highest specificity (first declared wins ties)
//!                        │
//!                 Match(spec) | NoMatch
//! ```
//!
//! Referenced attribute and descendant lists are checked at load, as is the
//! uniqueness of each tag + dispatch key combination.

mod error;
mod types;

pub use error::SpecError;
pub use types::{AttrSpec, AttributeList, Dispatch, Format, TagSpec, UrlSpec};

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::dom::{Document, NodeId};

/// Attribute list applied to every tag.
pub const GLOBAL_ATTRS: &str = "$GLOBAL_ATTRS";
/// Attribute list shared by layout-managed components.
pub const LAYOUT_ATTRS: &str = "$AMP_LAYOUT_ATTRS";

const BUNDLED_RULES: &str = include_str!("rules.json");

static BUNDLED_AMP: LazyLock<Arc<SpecRepository>> = LazyLock::new(|| load_bundled(Format::Amp));
static BUNDLED_EMAIL: LazyLock<Arc<SpecRepository>> =
    LazyLock::new(|| load_bundled(Format::Amp4email));

fn load_bundled(format: Format) -> Arc<SpecRepository> {
    Arc::new(
        SpecRepository::from_json(BUNDLED_RULES, format).expect("bundled rules.json is valid"),
    )
}

#[derive(Deserialize)]
struct RuleFile {
    #[serde(default)]
    attr_lists: BTreeMap<String, Vec<AttrSpec>>,
    #[serde(default)]
    descendant_lists: BTreeMap<String, Vec<String>>,
    tags: Vec<TagSpec>,
}

/// Result of narrowing candidates for one element.
#[derive(Debug, Clone, Copy)]
pub enum Resolution<'a> {
    Match(&'a TagSpec),
    NoMatch,
}

impl<'a> Resolution<'a> {
    pub fn spec(self) -> Option<&'a TagSpec> {
        match self {
            Self::Match(spec) => Some(spec),
            Self::NoMatch => None,
        }
    }
}

#[derive(Debug)]
pub struct SpecRepository {
    format: Format,
    tags: Vec<TagSpec>,
    by_tag: FxHashMap<String, Vec<usize>>,
    attr_lists: FxHashMap<String, AttributeList>,
    descendant_lists: FxHashMap<String, Vec<String>>,
}

impl SpecRepository {
    /// Process-wide repository built from the rules shipped with the crate.
    pub fn bundled(format: Format) -> Arc<SpecRepository> {
        match format {
            Format::Amp => Arc::clone(&BUNDLED_AMP),
            Format::Amp4email => Arc::clone(&BUNDLED_EMAIL),
        }
    }

    pub fn from_path(path: &Path, format: Format) -> Result<Self, SpecError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| SpecError::Io(path.to_path_buf(), e))?;
        Self::from_json(&content, format)
    }

    /// Parse, compile and cross-check a rule file.
    pub fn from_json(json: &str, format: Format) -> Result<Self, SpecError> {
        let file: RuleFile = serde_json::from_str(json)?;

        let mut attr_lists = FxHashMap::default();
        for (id, mut attrs) in file.attr_lists {
            for attr in &mut attrs {
                attr.compile()?;
            }
            attr_lists.insert(id.clone(), AttributeList { id, attrs });
        }

        let mut tags = file.tags;
        for spec in &mut tags {
            spec.tag.make_ascii_lowercase();
            if spec.spec_name.is_empty() {
                spec.spec_name = spec.tag.clone();
            }
            for attr in &mut spec.attrs {
                attr.compile()?;
            }
            if let Some(list) = spec.attr_lists.iter().find(|l| !attr_lists.contains_key(*l)) {
                return Err(SpecError::DanglingAttrList {
                    spec: spec.spec_name.clone(),
                    list: list.clone(),
                });
            }
            if let Some(list) = &spec.descendant_list
                && !file.descendant_lists.contains_key(list)
            {
                return Err(SpecError::UnknownDescendantList {
                    spec: spec.spec_name.clone(),
                    list: list.clone(),
                });
            }
        }
        check_dispatch_keys(&tags)?;

        let mut by_tag: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        for (index, spec) in tags.iter().enumerate() {
            by_tag.entry(spec.tag.clone()).or_default().push(index);
        }

        Ok(Self {
            format,
            tags,
            by_tag,
            attr_lists,
            descendant_lists: file.descendant_lists.into_iter().collect(),
        })
    }

    #[inline]
    pub fn format(&self) -> Format {
        self.format
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Candidate specs for a tag in this repository's format, in declared order.
    pub fn tag_specs_for(&self, tag: &str) -> Vec<&TagSpec> {
        let tag = tag.to_ascii_lowercase();
        self.by_tag
            .get(&tag)
            .map(|indices| {
                indices
                    .iter()
                    .map(|&i| &self.tags[i])
                    .filter(|spec| spec.supports(self.format))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// First spec declared for a tag, ignoring context.
    pub fn primary_spec(&self, tag: &str) -> Option<&TagSpec> {
        self.tag_specs_for(tag).into_iter().next()
    }

    /// Pick the spec governing `element` among `candidates`.
    pub fn resolve<'a>(
        &self,
        doc: &Document,
        element: NodeId,
        candidates: &[&'a TagSpec],
    ) -> Resolution<'a> {
        let dispatched: Vec<&TagSpec> = candidates
            .iter()
            .copied()
            .filter(|spec| {
                spec.dispatch
                    .as_ref()
                    .is_some_and(|d| d.matches(doc.attr(element, &d.attribute)))
            })
            .collect();

        let pool: Vec<&TagSpec> = if dispatched.is_empty() {
            candidates
                .iter()
                .copied()
                .filter(|spec| spec.dispatch.is_none())
                .collect()
        } else {
            dispatched
        };

        // max_by_key keeps the last maximum; iterate reversed so the first declared wins ties
        pool.into_iter()
            .rev()
            .filter(|spec| context_satisfied(doc, element, spec))
            .max_by_key(|spec| spec.specificity)
            .map_or(Resolution::NoMatch, Resolution::Match)
    }

    /// Look up a list by id. Unknown ids mean the rule file is corrupt.
    pub fn attribute_list(&self, id: &str) -> Result<&AttributeList, SpecError> {
        self.attr_lists
            .get(id)
            .ok_or_else(|| SpecError::UnknownAttrList(id.to_string()))
    }

    /// Every attribute record applying to `spec`: own, referenced lists, global.
    pub fn attributes_for<'a>(&'a self, spec: &'a TagSpec) -> Result<Vec<&'a AttrSpec>, SpecError> {
        let mut attrs: Vec<&AttrSpec> = spec.attrs.iter().collect();
        for id in &spec.attr_lists {
            attrs.extend(self.attribute_list(id)?.attrs.iter());
        }
        if let Some(global) = self.attr_lists.get(GLOBAL_ATTRS) {
            attrs.extend(global.attrs.iter());
        }
        Ok(attrs)
    }

    /// Record governing attribute `name`; exact names win over prefix rules.
    pub fn find_attr<'a>(
        &'a self,
        spec: &'a TagSpec,
        name: &str,
    ) -> Result<Option<&'a AttrSpec>, SpecError> {
        let attrs = self.attributes_for(spec)?;
        Ok(attrs
            .iter()
            .find(|a| !a.is_prefix() && a.name == name)
            .or_else(|| attrs.iter().find(|a| a.is_prefix() && a.matches_name(name)))
            .copied())
    }

    /// Allowed descendant tags for a descendant list id.
    pub fn descendant_list(&self, id: &str) -> Option<&[String]> {
        self.descendant_lists.get(id).map(Vec::as_slice)
    }

    #[inline]
    pub fn validate_attr_value(&self, attr: &AttrSpec, value: &str) -> bool {
        attr.accepts(value)
    }

    #[cfg(test)]
    pub(crate) fn forget_attr_list(&mut self, id: &str) {
        self.attr_lists.remove(id);
    }
}

fn context_satisfied(doc: &Document, element: NodeId, spec: &TagSpec) -> bool {
    if let Some(parent) = &spec.mandatory_parent {
        let parent_tag = doc.parent_element(element).and_then(|p| doc.tag(p));
        if parent_tag != Some(parent.as_str()) {
            return false;
        }
    }
    if let Some(ancestor) = &spec.mandatory_ancestor
        && !doc.ancestors(element).any(|a| doc.is_tag(a, ancestor))
    {
        return false;
    }
    !doc.ancestors(element)
        .any(|a| spec.disallowed_ancestor.iter().any(|d| doc.is_tag(a, d)))
}

/// Two specs for one tag must differ in dispatch key or placement context.
fn check_dispatch_keys(tags: &[TagSpec]) -> Result<(), SpecError> {
    type Key<'a> = (
        &'a str,
        Option<&'a Dispatch>,
        Option<&'a str>,
        Option<&'a str>,
        u32,
    );
    let mut seen: FxHashMap<Key<'_>, &str> = FxHashMap::default();
    for spec in tags {
        let key = (
            spec.tag.as_str(),
            spec.dispatch.as_ref(),
            spec.mandatory_parent.as_deref(),
            spec.mandatory_ancestor.as_deref(),
            spec.specificity,
        );
        if let Some(first) = seen.insert(key, &spec.spec_name) {
            return Err(SpecError::AmbiguousDispatch {
                first: first.to_string(),
                second: spec.spec_name.clone(),
            });
        }
    }
    Ok(())
}
