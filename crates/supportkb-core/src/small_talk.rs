//! Heuristic for skipping retrieval on greetings and acknowledgements.
//!
//! A message counts as small talk when it is short and every word is in the
//! small-talk vocabulary. One word outside it ("refund", "password", "how", ...) makes
//! the message informational.

use std::collections::HashSet;

const GREETINGS: &[&str] = &[
    "hi", "hello", "hey", "heya", "hiya", "yo", "howdy", "greetings", "morning", "afternoon",
    "evening", "good", "bye", "goodbye", "cya", "later", "see", "ya", "you",
];

const ACKNOWLEDGEMENTS: &[&str] = &[
    "thanks", "thank", "thx", "ty", "cheers", "ok", "okay", "k", "kk", "cool", "great", "nice",
    "awesome", "perfect", "got", "it", "sure", "yes", "yeah", "yep", "no", "nope", "alright",
    "fine", "sounds", "lol", "so", "much", "very", "there", "all", "again", "appreciate",
    "appreciated",
];

/// Word-list small-talk predicate.
#[derive(Debug, Clone)]
pub struct SmallTalkFilter {
    vocabulary: HashSet<String>,
    max_words: usize,
}

impl Default for SmallTalkFilter {
    fn default() -> Self {
        Self::new(4)
    }
}

impl SmallTalkFilter {
    /// Built-in vocabulary; messages longer than `max_words` are never small talk.
    pub fn new(max_words: usize) -> Self {
        Self {
            vocabulary: GREETINGS
                .iter()
                .chain(ACKNOWLEDGEMENTS)
                .map(|w| (*w).to_string())
                .collect(),
            max_words,
        }
    }

    pub fn is_small_talk(&self, message: &str) -> bool {
        let words: Vec<String> = message
            .split_whitespace()
            .map(|w| {
                w.chars()
                    .filter(|c| c.is_alphanumeric())
                    .flat_map(char::to_lowercase)
                    .collect::<String>()
            })
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() || words.len() > self.max_words {
            return false;
        }
        words.iter().all(|w| self.vocabulary.contains(w))
    }
}
