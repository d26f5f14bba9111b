//! Repair pass that keeps consecutive persona replies from opening with the
//! same greeting or reusing the same pet name.
//!
//! The prompt already names the forbidden tokens; this pass catches the
//! replies where the model ignored it. Each collision is repaired by either
//! stripping the token or substituting an alternative, chosen by a coin
//! weighted with [`RepairPolicy::strip_probability`]. A repair never yields
//! an empty message: if every option empties the text, the original is kept.

use std::sync::Arc;

use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Serialize;

use super::features::{FeatureExtractor, PetNameMatch};
use super::segmenter::MULTI_MESSAGE_DELIMITER;
use crate::utilities::string_utils::{capitalize_first, tidy_after_removal};

/// Probability split between stripping and substituting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepairPolicy {
    /// Chance of stripping the colliding token; the rest substitutes.
    pub strip_probability: f64,
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self {
            strip_probability: 0.6,
        }
    }
}

/// Greeting and pet name of one persona reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepetitionState {
    pub greeting: Option<String>,
    pub pet_name: Option<String>,
}

impl RepetitionState {
    /// True when the reply carried neither token.
    pub fn is_empty(&self) -> bool {
        self.greeting.is_none() && self.pet_name.is_none()
    }
}

/// Bound on repairs of one reply that repeats the colliding term.
const MAX_PET_NAME_REPAIRS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RepairAction {
    Strip,
    Substitute,
}

/// Detects and repairs greeting / pet-name collisions between turns.
#[derive(Debug, Clone)]
pub struct RepetitionGuard {
    extractor: Arc<FeatureExtractor>,
    policy: RepairPolicy,
}

impl RepetitionGuard {
    /// A non-finite probability falls back to the default split.
    pub fn new(extractor: Arc<FeatureExtractor>, policy: RepairPolicy) -> Self {
        let strip_probability = if policy.strip_probability.is_finite() {
            policy.strip_probability.clamp(0.0, 1.0)
        } else {
            log::warn!(
                "Ignoring non-finite strip probability {}",
                policy.strip_probability
            );
            RepairPolicy::default().strip_probability
        };
        Self {
            extractor,
            policy: RepairPolicy { strip_probability },
        }
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn policy(&self) -> RepairPolicy {
        self.policy
    }

    /// Tokens of `reply`, or an empty state when there is no reply.
    pub fn state_of(&self, reply: Option<&str>) -> RepetitionState {
        match reply {
            Some(text) => RepetitionState {
                greeting: self.extractor.extract_greeting(text),
                pet_name: self.extractor.extract_pet_name(text),
            },
            None => RepetitionState::default(),
        }
    }

    /// Repair `current` against the persona's `previous` reply.
    ///
    /// Greeting collisions are handled first, pet-name collisions second.
    /// Returns `current` unchanged when nothing collides.
    pub fn reconcile<R: Rng + ?Sized>(
        &self,
        current: &str,
        previous: Option<&str>,
        rng: &mut R,
    ) -> String {
        let Some(previous) = previous else {
            return current.to_string();
        };
        if current.trim().is_empty() {
            return current.to_string();
        }

        let mut text = current.to_string();
        if let Some(repaired) = self.repair_greeting(&text, previous, rng) {
            text = repaired;
        }
        if let Some(repaired) = self.repair_pet_name(&text, previous, rng) {
            text = repaired;
        }

        if text.trim().is_empty() {
            current.to_string()
        } else {
            text
        }
    }

    fn choose_action<R: Rng + ?Sized>(&self, rng: &mut R) -> RepairAction {
        if rng.random_bool(self.policy.strip_probability) {
            RepairAction::Strip
        } else {
            RepairAction::Substitute
        }
    }

    /// Apply strip-or-substitute with the empty-result fallbacks.
    fn apply<R, S, T>(&self, text: &str, rng: &mut R, strip: S, substitute: T) -> String
    where
        R: Rng + ?Sized,
        S: Fn(&str) -> Option<String>,
        T: Fn(&str, &mut R) -> Option<String>,
    {
        let non_empty = |s: Option<String>| s.filter(|t| !t.trim().is_empty());

        let repaired = match self.choose_action(rng) {
            RepairAction::Strip => {
                non_empty(strip(text)).or_else(|| non_empty(substitute(text, rng)))
            }
            RepairAction::Substitute => {
                non_empty(substitute(text, rng)).or_else(|| non_empty(strip(text)))
            }
        };
        repaired.unwrap_or_else(|| text.to_string())
    }

    fn repair_greeting<R: Rng + ?Sized>(
        &self,
        text: &str,
        previous: &str,
        rng: &mut R,
    ) -> Option<String> {
        let previous_greeting = self.extractor.extract_greeting(previous)?;
        let found = self.extractor.match_greeting(text)?;
        if found.token != previous_greeting {
            return None;
        }

        let alternatives: Vec<&String> = self
            .extractor
            .vocabulary()
            .greeting_alternatives
            .iter()
            .filter(|g| g.to_lowercase() != found.token)
            .collect();

        let strip = |t: &str| Some(capitalize_first(&tidy_after_removal(&t[found.end..])));
        let substitute = |t: &str, rng: &mut R| {
            let alternative = alternatives.choose(rng)?;
            let original = &t[found.start..found.end];
            Some(format!(
                "{}{}{}",
                &t[..found.start],
                match_case(original, alternative),
                &t[found.end..]
            ))
        };

        let repaired = self.apply(text, rng, strip, substitute);
        log::debug!(
            "Repeated greeting '{}' repaired: {:?} -> {:?}",
            found.token,
            text,
            repaired
        );
        Some(repaired)
    }

    fn repair_pet_name<R: Rng + ?Sized>(
        &self,
        text: &str,
        previous: &str,
        rng: &mut R,
    ) -> Option<String> {
        let previous_term = self.extractor.extract_pet_name(previous)?;
        let mut found = self
            .extractor
            .match_pet_name(text)
            .filter(|m| m.token == previous_term)?;

        let alternatives: Vec<&String> = self
            .extractor
            .vocabulary()
            .pet_names
            .iter()
            .filter(|p| p.to_lowercase() != previous_term)
            .collect();

        // A reply may address the user with the same term more than once.
        let mut repaired = text.to_string();
        for _ in 0..MAX_PET_NAME_REPAIRS {
            let strip = |t: &str| {
                let tidied = tidy_after_removal(&strip_pet_name(t, &found));
                if found.bubble_start == 0 {
                    Some(capitalize_first(&tidied))
                } else {
                    Some(tidied)
                }
            };
            let substitute = |t: &str, rng: &mut R| {
                let alternative = alternatives.choose(rng)?;
                Some(format!(
                    "{}{}{}",
                    &t[..found.start],
                    match_case(&t[found.start..found.end], alternative),
                    &t[found.end..]
                ))
            };

            let next = self.apply(&repaired, rng, strip, substitute);
            if next == repaired {
                break;
            }
            repaired = next;
            match self.extractor.find_pet_name(&repaired, &previous_term) {
                Some(m) => found = m,
                None => break,
            }
        }

        log::debug!(
            "Repeated pet name '{}' repaired: {:?} -> {:?}",
            previous_term,
            text,
            repaired
        );
        Some(repaired)
    }
}

/// Remove the matched pet name. A bare salutation ("Hey baby!") goes as a
/// whole; otherwise only the term and the separator before it.
fn strip_pet_name(text: &str, found: &PetNameMatch) -> String {
    let after = &text[found.end..];
    if found.salutation {
        let rest = after.trim_start();
        if rest.is_empty()
            || rest.starts_with(['!', ',', '.', '?'])
            || rest.starts_with(MULTI_MESSAGE_DELIMITER)
        {
            let rest = rest.trim_start_matches(['!', ',', '.', '?']).trim_start();
            return format!("{}{}", &text[..found.bubble_start], rest);
        }
    }
    let head = text[..found.start].trim_end_matches([',', ' ', '\t']);
    format!("{}{}", head, after)
}

/// Capitalize `replacement` if `original` starts upper-case.
fn match_case(original: &str, replacement: &str) -> String {
    if original.chars().next().is_some_and(char::is_uppercase) {
        capitalize_first(replacement)
    } else {
        replacement.to_string()
    }
}
