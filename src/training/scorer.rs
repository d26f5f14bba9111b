//! Heuristic relevance between a live user message and a pattern input.

use std::cmp::Ordering;

use rand::Rng;
use serde::Serialize;

use super::fallback::select_random_response;
use super::patterns::PatternCategory;

/// Words that boost a score by [`EMOTIONAL_BOOST`] when the user uses them.
pub const EMOTIONAL_WORDS: &[&str] = &[
    "love", "miss", "sad", "happy", "angry", "excited", "tired", "stressed",
];

pub const EMOTIONAL_BOOST: f64 = 1.5;

/// A pattern annotated with its score for the current message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredExample {
    pub input: String,
    /// One candidate output, chosen uniformly.
    pub output: String,
    pub category: String,
    pub score: f64,
}

fn overlaps(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}

/// Score how well `pattern_input` matches `user_input`, in `[0, 1]`.
///
/// Word overlap ratio, boosted for emotional vocabulary, weighted by length
/// similarity, capped at 1.0. An empty user message scores 0.
pub fn score(user_input: &str, pattern_input: &str) -> f64 {
    let user_lower = user_input.to_lowercase();
    let pattern_lower = pattern_input.to_lowercase();
    let user_words: Vec<&str> = user_lower.split_whitespace().collect();
    let pattern_words: Vec<&str> = pattern_lower.split_whitespace().collect();

    if user_words.is_empty() {
        return 0.0;
    }

    let matches = user_words
        .iter()
        .filter(|w| pattern_words.iter().any(|p| overlaps(p, w)))
        .count();
    let mut score = matches as f64 / user_words.len() as f64;

    let emotional = user_words
        .iter()
        .any(|w| EMOTIONAL_WORDS.iter().any(|e| overlaps(e, w)));
    if emotional {
        score *= EMOTIONAL_BOOST;
    }

    let (u, p) = (user_words.len() as f64, pattern_words.len() as f64);
    let length_similarity = 1.0 - (u - p).abs() / u.max(p);
    score *= 0.5 + length_similarity * 0.5;

    score.min(1.0)
}

/// Score every pattern in `categories`, keep those above `min_score`, and
/// return the best `limit` in descending order.
///
/// Ties keep enumeration order.
pub fn select_relevant_examples<R: Rng + ?Sized>(
    user_input: &str,
    categories: &[&PatternCategory],
    limit: usize,
    min_score: f64,
    rng: &mut R,
) -> Vec<ScoredExample> {
    let mut examples = Vec::new();
    for category in categories {
        for pattern in &category.patterns {
            let score = score(user_input, &pattern.input);
            if score > min_score {
                examples.push(ScoredExample {
                    input: pattern.input.clone(),
                    output: select_random_response(&pattern.output, rng),
                    category: category.name.clone(),
                    score,
                });
            }
        }
    }

    examples.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    examples.truncate(limit);
    log::debug!(
        "Selected {} relevant examples for {:?}",
        examples.len(),
        crate::utilities::string_utils::preview(user_input, 40)
    );
    examples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::patterns::{PatternEntry, PatternOutput};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn entry(input: &str, output: &str) -> PatternEntry {
        PatternEntry {
            input: input.into(),
            output: PatternOutput::Single(output.into()),
            emotions: vec![],
            follow_up_questions: vec![],
        }
    }

    #[test]
    fn test_exact_match_scores_one() {
        assert!((score("good morning", "Good morning") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input_scores_zero() {
        assert_eq!(score("", "hello"), 0.0);
        assert_eq!(score("   ", "hello"), 0.0);
        assert_eq!(score("", ""), 0.0);
    }

    #[test]
    fn test_length_weighting() {
        // one of two user words matches; lengths equal
        let s = score("hello there", "hello world");
        assert!((s - 0.5).abs() < 1e-9);
        // one of one matches, pattern twice as long: 1 * (0.5 + 0.5 * 0.5)
        let s = score("hello", "hello world");
        assert!((s - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_emotional_boost_is_capped() {
        // 1.0 * 1.5 capped at 1.0
        assert_eq!(score("miss you", "Miss you"), 1.0);
        // 0.5 * 1.5 = 0.75 with equal lengths
        let s = score("sad today", "sad face");
        assert!((s - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_score_bounds() {
        let samples = ["", "a", "hey baby", "I am so stressed and tired", "🥰", "x y z w"];
        for a in samples {
            for b in samples {
                let s = score(a, b);
                assert!((0.0..=1.0).contains(&s), "score({:?}, {:?}) = {}", a, b, s);
            }
        }
    }

    #[test]
    fn test_selection_sorted_stable_and_limited() {
        let first = PatternCategory {
            name: "one".into(),
            patterns: vec![entry("hello there", "a"), entry("unrelated", "b")],
        };
        let second = PatternCategory {
            name: "two".into(),
            patterns: vec![entry("hello there", "c"), entry("hello", "d")],
        };
        let mut rng = StdRng::seed_from_u64(7);
        let picked = select_relevant_examples("hello there", &[&first, &second], 2, 0.1, &mut rng);

        assert_eq!(picked.len(), 2);
        // equal scores keep enumeration order
        assert_eq!(picked[0].output, "a");
        assert_eq!(picked[0].category, "one");
        assert_eq!(picked[1].output, "c");
        assert!(picked.iter().all(|e| e.score > 0.1));
    }

    #[test]
    fn test_selection_drops_irrelevant() {
        let category = PatternCategory {
            name: "c".into(),
            patterns: vec![entry("quantum physics", "x")],
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert!(select_relevant_examples("good night", &[&category], 5, 0.1, &mut rng).is_empty());
    }
}
