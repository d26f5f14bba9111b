//! Deterministic pattern matching used when the LLM is unavailable.

use rand::seq::IndexedRandom;
use rand::Rng;

use super::patterns::{PatternCategory, PatternEntry, PatternOutput};
use crate::utilities::i18n::get_i18n;

/// Case-insensitive containment in either direction.
pub fn is_input_match(user_input: &str, pattern_input: &str) -> bool {
    let user = user_input.trim().to_lowercase();
    let pattern = pattern_input.trim().to_lowercase();
    // An empty string is contained in everything; it matches nothing here.
    if user.is_empty() || pattern.is_empty() {
        return false;
    }
    user.contains(&pattern) || pattern.contains(&user)
}

/// First pattern, in enumeration order, whose input matches `user_input`.
pub fn find_matching_pattern<'a>(
    user_input: &str,
    categories: &[&'a PatternCategory],
) -> Option<&'a PatternEntry> {
    categories
        .iter()
        .flat_map(|c| c.patterns.iter())
        .find(|p| is_input_match(user_input, &p.input))
}

/// Pick one candidate uniformly; a single output is returned as is.
///
/// An empty candidate list yields the catalog's `empty_candidates` text.
pub fn select_random_response<R: Rng + ?Sized>(output: &PatternOutput, rng: &mut R) -> String {
    match output {
        PatternOutput::Single(s) => s.clone(),
        PatternOutput::Many(candidates) => candidates
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| get_i18n().errors("empty_candidates").to_string()),
    }
}
