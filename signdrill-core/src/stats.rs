use crate::{Card, CardId, Quality, Review};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Cards at or beyond this interval count as mastered.
pub const MASTERED_INTERVAL_DAYS: u32 = 30;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeckStats {
    pub total_cards: usize,
    pub cards_with_repetitions: usize,
    pub mastered_cards: usize,
    pub due_cards: usize,
}

pub fn deck_stats<'a>(cards: impl IntoIterator<Item = &'a Card>, now: DateTime<Utc>) -> DeckStats {
    let mut s = DeckStats::default();
    for c in cards {
        s.total_cards += 1;
        if c.repetitions > 0 {
            s.cards_with_repetitions += 1;
        }
        if c.interval >= MASTERED_INTERVAL_DAYS {
            s.mastered_cards += 1;
        }
        if c.is_due(now) {
            s.due_cards += 1;
        }
    }
    s
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Totals {
    pub total: u32,
    pub failed: u32,
    pub passed: u32,
    quality_sum: u32,
}

impl Totals {
    pub fn record(&mut self, q: Quality) {
        self.total += 1;
        self.quality_sum += q.value() as u32;
        if q.is_success() {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64
        }
    }

    pub fn average_quality(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.quality_sum as f64 / self.total as f64
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct StatsSummary {
    pub totals: Totals,
    pub per_day: BTreeMap<NaiveDate, Totals>,
}

pub fn summarize(reviews: &[Review]) -> StatsSummary {
    let mut summary = StatsSummary::default();
    for r in reviews {
        summary.totals.record(r.quality);
        let d = r.reviewed_at.date_naive();
        summary.per_day.entry(d).or_default().record(r.quality);
    }
    summary
}

/// Consecutive review days ending today. A streak that ended yesterday still
/// counts until today is over.
pub fn daily_streak(reviews: &[Review], today: NaiveDate) -> u32 {
    let per_day = summarize(reviews).per_day;
    let active = |d: &NaiveDate| per_day.get(d).map(|t| t.total > 0).unwrap_or(false);

    let mut day = today;
    if !active(&day) {
        day -= Duration::days(1);
    }
    let mut streak = 0u32;
    while active(&day) {
        streak += 1;
        day -= Duration::days(1);
    }
    streak
}

pub fn per_category_totals(
    reviews: &[Review],
    cards: &HashMap<CardId, Card>,
) -> BTreeMap<String, Totals> {
    let mut map: BTreeMap<String, Totals> = BTreeMap::new();
    for r in reviews {
        if let Some(card) = cards.get(&r.card_id) {
            map.entry(card.category.clone()).or_default().record(r.quality);
        }
    }
    map
}
