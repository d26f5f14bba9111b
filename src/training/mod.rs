//! Training patterns: the few-shot examples and fallback replies of each persona.

pub mod fallback;
pub mod patterns;
pub mod scorer;

pub use fallback::{find_matching_pattern, is_input_match, select_random_response};
pub use patterns::{PatternCategory, PatternEntry, PatternLibrary, PatternOutput, PatternSet};
pub use scorer::{score, select_relevant_examples, ScoredExample};
