//! Inline style helpers.
//!
//! Only declaration-level rewriting of `style` attributes. Full CSS parsing
//! is out of scope.

/// Rewrite the `display` declaration of an inline style.
///
/// Returns `None` when the style has no `display` declaration, leaving the
/// attribute untouched.
pub fn rewrite_display(style: &str, display: &str) -> Option<String> {
    let mut found = false;
    let declarations: Vec<String> = style
        .split(';')
        .map(str::trim)
        .filter(|decl| !decl.is_empty())
        .map(|decl| match decl.split_once(':') {
            Some((prop, _)) if prop.trim().eq_ignore_ascii_case("display") => {
                found = true;
                format!("display:{display}")
            }
            _ => decl.to_string(),
        })
        .collect();

    found.then(|| declarations.join(";"))
}
