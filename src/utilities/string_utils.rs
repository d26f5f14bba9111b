//! String helpers shared by the prompt composer and the repair pass.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

static VARIABLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());
static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").unwrap());
static SPACE_BEFORE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+([,.!?])").unwrap());
static DOUBLED_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([,.!?])").unwrap());
static LEADING_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\s,.!?;:\-|]+").unwrap());

/// Fill `{variable}` placeholders from `inputs`.
///
/// # Errors
/// Returns an error naming the first placeholder with no value in `inputs`.
pub fn interpolate(template: &str, inputs: &HashMap<&str, String>) -> Result<String, String> {
    if !template.contains('{') {
        return Ok(template.to_string());
    }

    if let Some(missing) = VARIABLE_PATTERN
        .captures_iter(template)
        .map(|cap| cap.get(1).map_or("", |m| m.as_str()))
        .find(|name| !inputs.contains_key(name))
    {
        return Err(format!(
            "Template variable '{}' not found in inputs",
            missing
        ));
    }

    let rendered = VARIABLE_PATTERN.replace_all(template, |cap: &regex::Captures<'_>| {
        inputs
            .get(&cap[1])
            .cloned()
            .unwrap_or_default()
    });
    Ok(rendered.into_owned())
}

/// Collapse the debris a token deletion leaves behind: doubled spaces,
/// spaces before punctuation, `, !` sequences and leading punctuation.
pub fn tidy_after_removal(text: &str) -> String {
    let collapsed = MULTI_SPACE.replace_all(text, " ");
    let attached = SPACE_BEFORE_PUNCT.replace_all(&collapsed, "$1");
    let deduped = DOUBLED_PUNCT.replace_all(&attached, "$1");
    let stripped = LEADING_PUNCT.replace(&deduped, "");
    stripped.trim().to_string()
}

/// Upper-case the first character, leaving the rest untouched.
pub fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Truncate to at most `max` characters for log lines.
pub fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
