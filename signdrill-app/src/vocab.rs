use clap::ValueEnum;
use signdrill_core::CardId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Difficulty {
    Beginner,
    Intermediate,
}

use Difficulty::{Beginner as B, Intermediate as I};

/// Vocabulary offered by `signdrill seed`, grouped by category.
pub const STARTER_VOCABULARY: &[(&str, &[(&str, Difficulty)])] = &[
    ("Alphabet", &[("A", B), ("B", B), ("C", B), ("Z", B)]),
    ("Numbers", &[("1", B), ("2", B), ("3", B), ("10", B)]),
    (
        "Greetings",
        &[("Hello", B), ("Goodbye", B), ("Thank you", B), ("Please", B), ("How are you", I)],
    ),
    (
        "Common Phrases",
        &[
            ("I need help", I),
            ("Where is the bathroom", I),
            ("My name is", I),
            ("Nice to meet you", I),
        ],
    ),
    ("Emotions", &[("Happy", B), ("Sad", B), ("Angry", B), ("Surprised", B)]),
    (
        "Questions",
        &[("What", B), ("Where", B), ("When", B), ("Why", B), ("Who", B), ("How", B)],
    ),
    ("Food and Drink", &[("Water", B), ("Food", B), ("Eat", B), ("Drink", B)]),
    ("Time", &[("Time", B), ("Today", B), ("Tomorrow", I), ("Yesterday", I)]),
    (
        "Colors",
        &[("Red", B), ("Blue", B), ("Green", B), ("Yellow", B), ("Black", B), ("White", B)],
    ),
    (
        "Family",
        &[("Mother", B), ("Father", B), ("Sister", B), ("Brother", B), ("Family", B)],
    ),
];

fn entries() -> impl Iterator<Item = (&'static str, &'static str, Difficulty)> {
    STARTER_VOCABULARY
        .iter()
        .flat_map(|(cat, words)| words.iter().map(move |(w, d)| (*cat, *w, *d)))
}

/// Starter `(category, word)` pairs, optionally only one level.
pub fn starter_pairs(
    level: Option<Difficulty>,
) -> impl Iterator<Item = (&'static str, &'static str)> {
    entries()
        .filter(move |(_, _, d)| level.map_or(true, |l| l == *d))
        .map(|(c, w, _)| (c, w))
}

/// Level of a starter sign; `None` for cards added by hand.
pub fn difficulty_of(id: &CardId) -> Option<Difficulty> {
    entries()
        .find(|(c, w, _)| CardId::new(c, w) == *id)
        .map(|(_, _, d)| d)
}
