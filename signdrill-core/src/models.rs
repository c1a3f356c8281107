use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::CoreError;

pub type ReviewId = Uuid;

pub const EF_MIN: f64 = 1.3;
pub const EF_DEFAULT: f64 = 2.5;
pub const QUALITY_MAX: u8 = 5;
/// Lowest quality that counts as a successful recall.
pub const QUALITY_PASS: u8 = 3;
/// Upper bound on a scheduled interval, roughly a century.
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// Storage key for a card, derived from its `(category, word)` pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    /// `category-word`, with `%` and `-` escaped inside each part so distinct
    /// pairs never collide.
    pub fn new(category: &str, word: &str) -> Self {
        Self(format!("{}-{}", escape_part(category), escape_part(word)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn escape_part(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '%' => out.push_str("%25"),
            '-' => out.push_str("%2D"),
            c => out.push(c),
        }
    }
    out
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CardId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CardId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Recall quality on the 0..=5 scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u8) -> Result<Self, CoreError> {
        if value > QUALITY_MAX {
            return Err(CoreError::InvalidQuality(value));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_success(self) -> bool {
        self.0 >= QUALITY_PASS
    }

    pub fn label(self) -> &'static str {
        match self.0 {
            0 => "Failed completely",
            1 => "Failed mostly",
            2 => "Failed partially",
            3 => "Difficult recall",
            4 => "Good recall",
            _ => "Perfect recall",
        }
    }

    pub fn all() -> impl Iterator<Item = Quality> {
        (0..=QUALITY_MAX).map(Quality)
    }
}

impl TryFrom<u8> for Quality {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Quality::new(value)
    }
}

impl From<Quality> for u8 {
    fn from(q: Quality) -> Self {
        q.0
    }
}

impl FromStr for Quality {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let v: u8 = s
            .trim()
            .parse()
            .map_err(|_| CoreError::Invalid("quality must be a number 0-5"))?;
        Quality::new(v)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scheduling state for one sign. Field names follow the browser client's
/// stored layout so its exports load directly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub category: String,
    pub word: String,

    pub ease_factor: f64,
    pub interval: u32,
    pub repetitions: u32,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub last_reviewed: Option<DateTime<Utc>>,
}

impl Card {
    /// A never-reviewed card that is due immediately.
    pub fn new(category: impl Into<String>, word: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            category: category.into(),
            word: word.into(),
            ease_factor: EF_DEFAULT,
            interval: 0,
            repetitions: 0,
            due_date: now,
            last_reviewed: None,
        }
    }

    pub fn id(&self) -> CardId {
        CardId::new(&self.category, &self.word)
    }

    pub fn is_new(&self) -> bool {
        self.repetitions == 0
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_date <= now
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub card_id: CardId,
    pub quality: Quality,
    pub reviewed_at: DateTime<Utc>,
    pub interval_applied: u32,
    pub ease_after: f64,
}

impl Review {
    pub fn new(
        card_id: CardId,
        quality: Quality,
        reviewed_at: DateTime<Utc>,
        interval_applied: u32,
        ease_after: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            card_id,
            quality,
            reviewed_at,
            interval_applied,
            ease_after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_id_matches_plain_key_format() {
        assert_eq!(CardId::new("greetings", "hello").as_str(), "greetings-hello");
        assert_eq!(CardId::new("Greetings", "Thank you"), CardId::new("Greetings", "Thank you"));
    }

    #[test]
    fn card_id_escapes_separator() {
        let a = CardId::new("a-b", "c");
        let b = CardId::new("a", "b-c");
        assert_ne!(a, b);
        assert_eq!(CardId::new("x%", "y").as_str(), "x%25-y");
    }

    #[test]
    fn quality_rejects_out_of_range() {
        assert!(Quality::new(5).is_ok());
        assert!(matches!(Quality::new(6), Err(CoreError::InvalidQuality(6))));
        assert!("7".parse::<Quality>().is_err());
        assert!("x".parse::<Quality>().is_err());
        assert_eq!(" 4 ".parse::<Quality>().unwrap().value(), 4);
    }

    #[test]
    fn quality_success_threshold() {
        let passed: Vec<u8> = Quality::all().filter(|q| q.is_success()).map(u8::from).collect();
        assert_eq!(passed, vec![3, 4, 5]);
    }

    #[test]
    fn card_deserializes_browser_layout() {
        let raw = r#"{
            "category": "greetings",
            "word": "hello",
            "easeFactor": 2.36,
            "interval": 6,
            "repetitions": 2,
            "dueDate": "2024-03-01T10:00:00.000Z",
            "lastReviewed": null
        }"#;
        let card: Card = serde_json::from_str(raw).unwrap();
        assert_eq!(card.repetitions, 2);
        assert_eq!(card.interval, 6);
        assert!(card.last_reviewed.is_none());
        assert_eq!(card.id().as_str(), "greetings-hello");
    }

    #[test]
    fn quality_deserialize_validates() {
        assert!(serde_json::from_str::<Quality>("9").is_err());
        assert_eq!(serde_json::from_str::<Quality>("2").unwrap().value(), 2);
    }
}
