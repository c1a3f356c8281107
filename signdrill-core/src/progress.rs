//! Per-sign practice progress, rebuilt from the review log.
//!
//! Each passed review moves a sign one step toward mastery and each failed
//! review moves it one step back. Once a sign reaches [`MASTERY_TARGET`] it
//! stays mastered and an [`Achievement`] is recorded.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::{daily_streak, Card, CardId, Review};

/// Passed reviews needed to master a sign.
pub const MASTERY_TARGET: u8 = 5;

const TOP_CATEGORIES: usize = 3;
const TOP_WORDS: usize = 5;
const RECENT_DAYS: usize = 7;
const RECENT_ACHIEVEMENTS: usize = 5;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WordProgress {
    pub card_id: CardId,
    pub category: String,
    pub word: String,
    pub times_practiced: u32,
    pub last_practiced: Option<DateTime<Utc>>,
    pub mastery_progress: u8,
    pub mastered: bool,
}

impl WordProgress {
    fn new(card: &Card) -> Self {
        Self {
            card_id: card.id(),
            category: card.category.clone(),
            word: card.word.clone(),
            times_practiced: 0,
            last_practiced: None,
            mastery_progress: 0,
            mastered: false,
        }
    }

    /// Returns true when this practice is the one that masters the sign.
    fn practice(&mut self, passed: bool, at: DateTime<Utc>) -> bool {
        self.times_practiced += 1;
        self.last_practiced = Some(at);
        if self.mastered {
            return false;
        }
        if passed {
            self.mastery_progress += 1;
            if self.mastery_progress >= MASTERY_TARGET {
                self.mastered = true;
                return true;
            }
        } else {
            self.mastery_progress = self.mastery_progress.saturating_sub(1);
        }
        false
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Achievement {
    pub card_id: CardId,
    pub category: String,
    pub word: String,
    pub achieved_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ProgressBook {
    pub words: BTreeMap<CardId, WordProgress>,
    /// In the order they were earned.
    pub achievements: Vec<Achievement>,
}

impl ProgressBook {
    pub fn practiced(&self) -> usize {
        self.words.len()
    }

    pub fn mastered(&self) -> usize {
        self.words.values().filter(|w| w.mastered).count()
    }
}

/// Replay `reviews` in time order. Reviews of cards no longer in `cards`
/// are skipped.
pub fn track_progress(reviews: &[Review], cards: &HashMap<CardId, Card>) -> ProgressBook {
    let mut ordered: Vec<&Review> = reviews.iter().collect();
    ordered.sort_by_key(|r| r.reviewed_at);

    let mut book = ProgressBook::default();
    for r in ordered {
        let Some(card) = cards.get(&r.card_id) else {
            continue;
        };
        let entry = book
            .words
            .entry(r.card_id.clone())
            .or_insert_with(|| WordProgress::new(card));
        if entry.practice(r.quality.is_success(), r.reviewed_at) {
            book.achievements.push(Achievement {
                card_id: entry.card_id.clone(),
                category: entry.category.clone(),
                word: entry.word.clone(),
                achieved_at: r.reviewed_at,
            });
        }
    }
    book
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CategoryProgress {
    pub name: String,
    pub practiced: usize,
    pub mastered: usize,
    /// Whole percent.
    pub mastery_rate: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DayActivity {
    pub date: NaiveDate,
    /// Distinct signs practiced that day.
    pub signs: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProgressReport {
    pub practiced: usize,
    pub mastered: usize,
    pub mastery_rate: u32,
    pub streak: u32,
    pub top_categories: Vec<CategoryProgress>,
    pub top_words: Vec<WordProgress>,
    /// Newest day first.
    pub recent_activity: Vec<DayActivity>,
    /// Newest first.
    pub recent_achievements: Vec<Achievement>,
}

fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        0
    } else {
        (part as f64 * 100.0 / whole as f64).round() as u32
    }
}

pub fn progress_report(
    reviews: &[Review],
    cards: &HashMap<CardId, Card>,
    today: NaiveDate,
) -> ProgressReport {
    let book = track_progress(reviews, cards);

    let mut per_cat: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for w in book.words.values() {
        let slot = per_cat.entry(w.category.as_str()).or_default();
        slot.0 += 1;
        if w.mastered {
            slot.1 += 1;
        }
    }
    let mut top_categories: Vec<CategoryProgress> = per_cat
        .into_iter()
        .map(|(name, (practiced, mastered))| CategoryProgress {
            name: name.to_string(),
            practiced,
            mastered,
            mastery_rate: percent(mastered, practiced),
        })
        .collect();
    // Stable sort keeps ties in name order.
    top_categories.sort_by(|a, b| b.practiced.cmp(&a.practiced));
    top_categories.truncate(TOP_CATEGORIES);

    let mut top_words: Vec<WordProgress> = book.words.values().cloned().collect();
    top_words.sort_by(|a, b| b.times_practiced.cmp(&a.times_practiced));
    top_words.truncate(TOP_WORDS);

    let mut days: BTreeMap<NaiveDate, BTreeSet<&CardId>> = BTreeMap::new();
    for r in reviews.iter().filter(|r| book.words.contains_key(&r.card_id)) {
        days.entry(r.reviewed_at.date_naive())
            .or_default()
            .insert(&r.card_id);
    }
    let recent_activity = days
        .into_iter()
        .rev()
        .take(RECENT_DAYS)
        .map(|(date, ids)| DayActivity { date, signs: ids.len() })
        .collect();

    let recent_achievements = book
        .achievements
        .iter()
        .rev()
        .take(RECENT_ACHIEVEMENTS)
        .cloned()
        .collect();

    let practiced = book.practiced();
    let mastered = book.mastered();
    ProgressReport {
        practiced,
        mastered,
        mastery_rate: percent(mastered, practiced),
        streak: daily_streak(reviews, today),
        top_categories,
        top_words,
        recent_activity,
        recent_achievements,
    }
}
