//! Splits one completion into several chat bubbles.

/// In-text delimiter the multi-message prompt asks the model to emit.
pub const MULTI_MESSAGE_DELIMITER: &str = "||";

/// Split `text` on [`MULTI_MESSAGE_DELIMITER`], trimming and dropping empty parts.
///
/// Always returns at least one element.
pub fn segment(text: &str) -> Vec<String> {
    if !text.contains(MULTI_MESSAGE_DELIMITER) {
        return vec![text.to_string()];
    }

    let parts: Vec<String> = text
        .split(MULTI_MESSAGE_DELIMITER)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect();

    if parts.is_empty() {
        vec![text.to_string()]
    } else {
        parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_two() {
        assert_eq!(segment("Arre wait||kya hua?"), vec!["Arre wait", "kya hua?"]);
        assert_eq!(segment("a || b"), vec!["a", "b"]);
    }

    #[test]
    fn test_no_delimiter_is_identity() {
        assert_eq!(segment("  just one  "), vec!["  just one  "]);
        assert_eq!(segment("a | b"), vec!["a | b"]);
    }

    #[test]
    fn test_empty_parts_dropped() {
        assert_eq!(segment("||one|| ||two||"), vec!["one", "two"]);
    }

    #[test]
    fn test_only_delimiters_keeps_original() {
        assert_eq!(segment(" || "), vec![" || "]);
    }
}
