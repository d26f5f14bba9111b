//! Variety metrics over a run of persona replies.
//!
//! Used by evaluation tooling and tests to check that consecutive replies do
//! not keep reopening with the same greeting or pet name.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::features::FeatureExtractor;

static FORMULAIC: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)hey love.*how are you",
        r"(?i)hi baby.*how's your day",
        r"(?i)hello.*how are you doing",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static REACTIVE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^(yaar|arre|dude|bc)\s",
        r"(?i)really\?|what\?|why\?",
        r"(?i)same here|i know|exactly",
        r"(?i)oh no|aww|wow",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Replies shorter than this never count towards natural flow.
const NATURAL_FLOW_MIN_CHARS: usize = 10;

/// Aggregate repetition and variety figures for a sequence of replies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarietyReport {
    pub total_responses: usize,
    /// Adjacent reply pairs opening with the same greeting.
    pub consecutive_greeting_repetition: usize,
    /// Adjacent reply pairs carrying the same pet name.
    pub consecutive_pet_name_repetition: usize,
    /// Unique greetings over greetings used, in percent (100 when none used).
    pub greeting_variety: f64,
    /// Unique pet names over pet names used, in percent (100 when none used).
    pub pet_name_variety: f64,
    /// Share of replies that skip the greeting and answer directly, in percent.
    pub natural_flow: f64,
    /// Share of replies that react to the user, in percent.
    pub contextual_responses: f64,
    pub formulaic_responses: usize,
    pub greetings_used: Vec<String>,
    pub pet_names_used: Vec<String>,
}

impl VarietyReport {
    pub fn from_replies(extractor: &FeatureExtractor, replies: &[String]) -> Self {
        let mut greetings_used = Vec::new();
        let mut pet_names_used = Vec::new();
        let mut consecutive_greeting_repetition = 0;
        let mut consecutive_pet_name_repetition = 0;
        let mut natural = 0usize;
        let mut reactive = 0usize;
        let mut formulaic_responses = 0;

        let mut previous_greeting: Option<String> = None;
        let mut previous_pet_name: Option<String> = None;

        for reply in replies {
            let greeting = extractor.extract_greeting(reply);
            let pet_name = extractor.extract_pet_name(reply);

            if greeting.is_some() && greeting == previous_greeting {
                consecutive_greeting_repetition += 1;
            }
            if pet_name.is_some() && pet_name == previous_pet_name {
                consecutive_pet_name_repetition += 1;
            }

            if FORMULAIC.iter().any(|re| re.is_match(reply)) {
                formulaic_responses += 1;
            }
            if REACTIVE.iter().any(|re| re.is_match(reply)) {
                reactive += 1;
            }
            if greeting.is_none() && reply.chars().count() > NATURAL_FLOW_MIN_CHARS {
                natural += 1;
            }

            greetings_used.extend(greeting.clone());
            pet_names_used.extend(pet_name.clone());
            previous_greeting = greeting;
            previous_pet_name = pet_name;
        }

        Self {
            total_responses: replies.len(),
            consecutive_greeting_repetition,
            consecutive_pet_name_repetition,
            greeting_variety: uniqueness(&greetings_used),
            pet_name_variety: uniqueness(&pet_names_used),
            natural_flow: percent(natural, replies.len()),
            contextual_responses: percent(reactive, replies.len()),
            formulaic_responses,
            greetings_used,
            pet_names_used,
        }
    }

    /// True when no adjacent pair repeats a greeting or a pet name.
    pub fn is_repetition_free(&self) -> bool {
        self.consecutive_greeting_repetition == 0 && self.consecutive_pet_name_repetition == 0
    }
}

fn uniqueness(used: &[String]) -> f64 {
    if used.is_empty() {
        return 100.0;
    }
    let unique: HashSet<&String> = used.iter().collect();
    percent(unique.len(), used.len())
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replies(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_counts_adjacent_repeats_only() {
        let fx = FeatureExtractor::default();
        let report = VarietyReport::from_replies(
            &fx,
            &replies(&[
                "Hey baby, how's it going?",
                "Hey! missed you baby",
                "Arre so tell me about your day",
                "Hey, kya kar rahe ho?",
            ]),
        );
        assert_eq!(report.total_responses, 4);
        assert_eq!(report.consecutive_greeting_repetition, 1);
        assert_eq!(report.consecutive_pet_name_repetition, 1);
        assert_eq!(report.greetings_used, vec!["hey", "hey", "arre", "hey"]);
        assert!((report.greeting_variety - 50.0).abs() < 1e-9);
        assert!(!report.is_repetition_free());
    }

    #[test]
    fn test_natural_flow_and_empty_input() {
        let fx = FeatureExtractor::default();
        let report = VarietyReport::from_replies(
            &fx,
            &replies(&["Wait really? tell me more", "Hi!", "ok"]),
        );
        // "ok" is too short, "Hi!" opens with a greeting
        assert!((report.natural_flow - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.pet_name_variety, 100.0);
        assert!(report.is_repetition_free());

        let empty = VarietyReport::from_replies(&fx, &[]);
        assert_eq!(empty.total_responses, 0);
        assert_eq!(empty.natural_flow, 0.0);
    }
}
