//! Greeting and pet-name detection.
//!
//! Greetings live in a word-level trie and the longest phrase that prefixes
//! the text wins, so "good morning" beats "morning" no matter how the
//! vocabulary is ordered. Pet names are tested in vocabulary order and the
//! first term satisfying any positional rule is returned.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::segmenter::MULTI_MESSAGE_DELIMITER;
use crate::utilities::errors::ConfigError;

/// Vocabulary driving detection and repair. Part of persona configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    /// Canonical greeting phrases, lower-case, words separated by one space.
    pub greetings: Vec<String>,
    /// Greeting words after which a pet name counts as a salutation.
    #[serde(default = "default_pet_name_leads")]
    pub pet_name_leads: Vec<String>,
    /// Affectionate terms in precedence order.
    pub pet_names: Vec<String>,
    /// Openers offered when a greeting must not be reused.
    #[serde(default = "default_greeting_alternatives")]
    pub greeting_alternatives: Vec<String>,
}

fn default_pet_name_leads() -> Vec<String> {
    ["hey", "hi", "yo", "arre"].map(String::from).to_vec()
}

fn default_greeting_alternatives() -> Vec<String> {
    ["hi", "hello", "hey", "arre", "yo", "hola"]
        .map(String::from)
        .to_vec()
}

impl Default for Vocabulary {
    fn default() -> Self {
        let greetings = [
            "hey", "hi", "hello", "hola", "namaste", "yo", "arre", "arree", "dude", "yaar", "bc",
            "sunn", "good morning", "good afternoon", "good evening", "morning", "evening",
            "kya haal hai", "wassup", "sup", "kaise ho", "kaisi ho", "kkrh", "how are you",
            "how's it going", "what's up",
        ];
        let pet_names = [
            "love", "baby", "cutie", "yaar", "cutiee", "mister", "handsome", "sweetheart", "jaan",
            "babe",
        ];
        Self {
            greetings: greetings.map(String::from).to_vec(),
            pet_name_leads: default_pet_name_leads(),
            pet_names: pet_names.map(String::from).to_vec(),
            greeting_alternatives: default_greeting_alternatives(),
        }
    }
}

/// A greeting found at the start of a text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GreetingMatch {
    /// Canonical lower-case phrase.
    pub token: String,
    /// Byte offset in the original text where the phrase starts.
    pub start: usize,
    /// Byte offset in the original text just past the phrase.
    pub end: usize,
}

#[derive(Debug, Default, Clone)]
struct TrieNode {
    children: HashMap<String, TrieNode>,
    terminal: Option<String>,
}

/// Word-level trie of greeting phrases.
#[derive(Debug, Default, Clone)]
struct GreetingTrie {
    root: TrieNode,
}

impl GreetingTrie {
    fn insert(&mut self, phrase: &str) {
        let canonical = phrase.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        if canonical.is_empty() {
            return;
        }
        let mut node = &mut self.root;
        for word in canonical.split(' ') {
            node = node.children.entry(word.to_string()).or_default();
        }
        node.terminal = Some(canonical);
    }

    /// Longest phrase prefixing `text` at a word boundary.
    fn longest_prefix(&self, text: &str) -> Option<GreetingMatch> {
        let start = text.len() - text.trim_start().len();
        let mut node = &self.root;
        let mut best = None;
        let mut pos = start;

        loop {
            let (word, word_end) = read_word(text, pos)?;
            match node.children.get(&word) {
                Some(next) => node = next,
                None => break,
            }
            if let Some(token) = &node.terminal {
                best = Some(GreetingMatch {
                    token: token.clone(),
                    start,
                    end: word_end,
                });
            }
            // Phrase words are separated by exactly one space.
            match text[word_end..].chars().next() {
                Some(' ') => pos = word_end + 1,
                _ => break,
            }
        }
        best
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '\'' || c == '\u{2019}'
}

/// Read one lower-cased word starting at byte `pos`.
fn read_word(text: &str, pos: usize) -> Option<(String, usize)> {
    let rest = &text[pos..];
    let len: usize = rest
        .chars()
        .take_while(|c| is_word_char(*c))
        .map(char::len_utf8)
        .sum();
    if len == 0 {
        return None;
    }
    let word = rest[..len].replace('\u{2019}', "'").to_lowercase();
    Some((word, pos + len))
}

/// A pet name found by one of the positional rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetNameMatch {
    /// Canonical lower-case term.
    pub token: String,
    /// Byte offset in the original text where the term starts.
    pub start: usize,
    /// Byte offset in the original text just past the term.
    pub end: usize,
    /// Byte offset of the chat bubble holding the term.
    pub bubble_start: usize,
    /// The term directly follows a lead word at the bubble start ("Hey baby").
    pub salutation: bool,
}

/// Positional rules for one pet name. Group 1 of every rule is the term.
#[derive(Debug, Clone)]
struct PetNameRule {
    term: String,
    salutation: Option<Regex>,
    positional: Vec<Regex>,
}

impl PetNameRule {
    fn compile(term: &str, leads: &str) -> Result<Self, ConfigError> {
        let t = regex::escape(term);
        let build = |pattern: String| {
            Regex::new(&pattern).map_err(|e| {
                ConfigError::Validation(format!("pet name '{}' does not compile: {}", term, e))
            })
        };

        let salutation = if leads.is_empty() {
            None
        } else {
            // "hey baby" at the very start
            Some(build(format!(r"(?i)^(?:{leads})\s+({t})\b"))?)
        };
        let positional = vec![
            // "baby, ..." at the very start
            build(format!(r"(?i)^({t}),"))?,
            // " baby!" / " baby," / " baby." / " baby?" anywhere
            build(format!(r"(?i)(?:^|\s)({t})[!,.?]"))?,
            // "... baby" at the end, trailing punctuation or emoji allowed
            build(format!(r"(?i)(?:^|\s)({t})[^\p{{L}}\p{{N}}_]*$"))?,
        ];

        Ok(Self {
            term: term.to_string(),
            salutation,
            positional,
        })
    }

    /// Earliest rule-satisfying span of the term in `bubble`.
    fn find(&self, bubble: &str) -> Option<(usize, usize, bool)> {
        let salutation = self.salutation.iter().map(|r| (r, true));
        let positional = self.positional.iter().map(|r| (r, false));
        salutation
            .chain(positional)
            .filter_map(|(rule, is_salutation)| {
                let term = rule.captures(bubble)?.get(1)?;
                Some((term.start(), term.end(), is_salutation))
            })
            .min_by_key(|(start, _, _)| *start)
    }
}

/// Non-empty chat bubbles of `text` (split on the multi-message delimiter
/// and on newlines), trimmed, with their byte offsets.
fn bubbles(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut part_offset = 0;
    for part in text.split(MULTI_MESSAGE_DELIMITER) {
        let mut line_offset = part_offset;
        for line in part.split('\n') {
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                let lead = line.len() - line.trim_start().len();
                out.push((line_offset + lead, trimmed));
            }
            line_offset += line.len() + 1;
        }
        part_offset += part.len() + MULTI_MESSAGE_DELIMITER.len();
    }
    out
}

/// Pure greeting / pet-name extraction over a fixed vocabulary.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    vocabulary: Vocabulary,
    greetings: GreetingTrie,
    pet_name_rules: Vec<PetNameRule>,
}

impl FeatureExtractor {
    /// Compile the vocabulary.
    ///
    /// # Errors
    /// [`ConfigError::Validation`] when a pet name does not compile into a rule.
    pub fn new(vocabulary: Vocabulary) -> Result<Self, ConfigError> {
        let mut greetings = GreetingTrie::default();
        for phrase in &vocabulary.greetings {
            greetings.insert(phrase);
        }

        let leads = vocabulary
            .pet_name_leads
            .iter()
            .map(|l| regex::escape(&l.to_lowercase()))
            .collect::<Vec<_>>()
            .join("|");

        let pet_name_rules = vocabulary
            .pet_names
            .iter()
            .map(|term| PetNameRule::compile(&term.to_lowercase(), &leads))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            vocabulary,
            greetings,
            pet_name_rules,
        })
    }

    /// The vocabulary this extractor was built from.
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Canonical greeting token leading `text`, if any.
    pub fn extract_greeting(&self, text: &str) -> Option<String> {
        self.match_greeting(text).map(|m| m.token)
    }

    /// Leading greeting with its byte span in `text`.
    pub fn match_greeting(&self, text: &str) -> Option<GreetingMatch> {
        self.greetings.longest_prefix(text)
    }

    /// First vocabulary pet name used in `text`, if any.
    ///
    /// Each chat bubble (split on the multi-message delimiter or a newline)
    /// is tested as its own text, so "...miss you baby||kya hua?" still
    /// counts "baby" as sentence-final.
    pub fn extract_pet_name(&self, text: &str) -> Option<String> {
        self.match_pet_name(text).map(|m| m.token)
    }

    /// First vocabulary pet name with the span of the occurrence that
    /// satisfied a rule. Other uses of the same word are not part of it.
    pub fn match_pet_name(&self, text: &str) -> Option<PetNameMatch> {
        let bubbles = bubbles(text);
        self.pet_name_rules
            .iter()
            .find_map(|rule| first_occurrence(rule, &bubbles))
    }

    /// Rule-satisfying occurrence of the vocabulary pet name `term`.
    pub fn find_pet_name(&self, text: &str, term: &str) -> Option<PetNameMatch> {
        let rule = self.pet_name_rules.iter().find(|r| r.term == term)?;
        first_occurrence(rule, &bubbles(text))
    }
}

fn first_occurrence(rule: &PetNameRule, bubbles: &[(usize, &str)]) -> Option<PetNameMatch> {
    bubbles.iter().find_map(|(offset, bubble)| {
        let (start, end, salutation) = rule.find(bubble)?;
        Some(PetNameMatch {
            token: rule.term.clone(),
            start: offset + start,
            end: offset + end,
            bubble_start: *offset,
            salutation,
        })
    })
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(Vocabulary::default()).expect("default vocabulary compiles")
    }
}
