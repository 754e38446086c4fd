//! Fake task titles
//!
//! The API only needs a short, non-empty, human-readable string. Titles are
//! built from a fixed word list: 4 to 8 words, first letter capitalized, no
//! trailing period.

use rand::{Rng, RngCore};

/// Produces title text for create/update payloads
pub trait PayloadGenerator: Send {
    fn title(&mut self, rng: &mut dyn RngCore) -> String;
}

const WORDS: &[&str] = &[
    "review", "quarterly", "report", "update", "the", "deployment", "pipeline", "call",
    "vendor", "about", "invoice", "schedule", "team", "meeting", "prepare", "slides",
    "for", "customer", "demo", "fix", "flaky", "integration", "tests", "refactor",
    "billing", "module", "write", "release", "notes", "order", "new", "office",
    "chairs", "backup", "database", "before", "migration", "plan", "sprint", "goals",
    "clean", "up", "old", "branches", "renew", "certificate", "draft", "proposal",
    "check", "server", "logs", "and", "metrics", "book", "travel", "conference",
    "send", "weekly", "summary", "to", "stakeholders", "rotate", "api", "keys",
];

const MIN_WORDS: usize = 4;
const MAX_WORDS: usize = 8;

/// Word-list title generator
#[derive(Debug, Clone, Copy, Default)]
pub struct LoremTitles;

impl PayloadGenerator for LoremTitles {
    fn title(&mut self, rng: &mut dyn RngCore) -> String {
        let count = rng.gen_range(MIN_WORDS..=MAX_WORDS);
        let mut title = String::new();

        for i in 0..count {
            let word = WORDS[rng.gen_range(0..WORDS.len())];
            if i == 0 {
                let mut chars = word.chars();
                if let Some(first) = chars.next() {
                    title.extend(first.to_uppercase());
                    title.push_str(chars.as_str());
                }
            } else {
                title.push(' ');
                title.push_str(word);
            }
        }

        title
    }
}
