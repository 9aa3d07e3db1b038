//! `ampify rules <TAG>`: list the specs a tag can resolve to.

use std::fmt::Write as _;

use anyhow::{Result, bail};
use owo_colors::OwoColorize;

use crate::config::AmpifyConfig;
use crate::spec::{AttrSpec, Format, SpecRepository, TagSpec};

pub fn show_rules(tag: &str, format: Option<Format>, config: &AmpifyConfig) -> Result<()> {
    let format = format.unwrap_or(config.pipeline.format);
    let repo = config.rules.load(format)?;
    print!("{}", describe(&repo, tag)?);
    Ok(())
}

/// Render every candidate spec for `tag`, in declared order.
pub fn describe(repo: &SpecRepository, tag: &str) -> Result<String> {
    let specs = repo.tag_specs_for(tag);
    if specs.is_empty() {
        bail!("no rules for <{}> in {:?}", tag.to_ascii_lowercase(), repo.format());
    }

    let mut out = String::new();
    for spec in specs {
        describe_spec(repo, spec, &mut out)?;
        out.push('\n');
    }
    Ok(out)
}

fn describe_spec(repo: &SpecRepository, spec: &TagSpec, out: &mut String) -> Result<()> {
    writeln!(out, "{} {}", spec.spec_name.bold(), format!("<{}>", spec.tag).dimmed())?;

    if let Some(dispatch) = &spec.dispatch {
        match &dispatch.value {
            Some(value) => writeln!(out, "  dispatch:   {}={value}", dispatch.attribute)?,
            None => writeln!(out, "  dispatch:   [{}]", dispatch.attribute)?,
        }
    }
    if spec.specificity > 0 {
        writeln!(out, "  specificity: {}", spec.specificity)?;
    }
    if let Some(parent) = &spec.mandatory_parent {
        writeln!(out, "  parent:     {parent}")?;
    }
    if let Some(ancestor) = &spec.mandatory_ancestor {
        writeln!(out, "  ancestor:   {ancestor}")?;
    }
    if !spec.disallowed_ancestor.is_empty() {
        writeln!(out, "  not inside: {}", spec.disallowed_ancestor.join(", "))?;
    }
    if spec.has_layout() {
        let layouts: Vec<_> = spec.layouts.iter().map(|l| l.as_str()).collect();
        writeln!(out, "  layouts:    {}", layouts.join(", "))?;
    }
    if let Some(list) = &spec.descendant_list {
        let allowed = repo.descendant_list(list).unwrap_or_default();
        writeln!(out, "  children:   {}", allowed.join(", "))?;
    }
    if !spec.requires_extension.is_empty() {
        writeln!(out, "  extensions: {}", spec.requires_extension.join(", "))?;
    }

    let attrs = repo.attributes_for(spec)?;
    if !attrs.is_empty() {
        writeln!(out, "  attributes:")?;
        for attr in attrs {
            writeln!(out, "    {}", describe_attr(attr))?;
        }
    }
    Ok(())
}

fn describe_attr(attr: &AttrSpec) -> String {
    let mut line = if attr.mandatory {
        format!("{}", attr.name.green().bold())
    } else {
        attr.name.clone()
    };
    if !attr.value.is_empty() {
        let _ = write!(line, " = {}", attr.value.join(" | "));
    }
    if let Some(re) = &attr.value_regex {
        let _ = write!(line, " ~ /{re}/");
    }
    if let Some(url) = &attr.value_url {
        let _ = write!(line, " (url: {})", url.protocols.join(", "));
    }
    if let Some(re) = &attr.disallowed_value_regex {
        let _ = write!(line, " !~ /{re}/");
    }
    if !attr.requires_extension.is_empty() {
        let _ = write!(line, " [{}]", attr.requires_extension.join(", "));
    }
    line
}
