use crate::{Card, Quality, Review, EF_MIN, MAX_INTERVAL_DAYS};
use chrono::{DateTime, Duration, Utc};

#[derive(Debug)]
pub struct ScheduleOutcome {
    pub updated_card: Card,
    pub review: Review,
}

/// SM-2 ease update. Evaluated for every review, pass or fail.
pub fn next_ease(ease: f64, quality: Quality) -> f64 {
    let miss = (5 - quality.value()) as f64;
    let delta = 0.1 - miss * (0.08 + miss * 0.02);
    (ease + delta).max(EF_MIN)
}

fn grown_interval(interval: u32, ease: f64) -> u32 {
    let next = (f64::from(interval) * ease).round();
    if next.is_finite() && next < f64::from(MAX_INTERVAL_DAYS) {
        next.max(0.0) as u32
    } else {
        MAX_INTERVAL_DAYS
    }
}

/// Compute the next scheduling state for `card` reviewed at `now`.
///
/// The interval grows from the ease factor the card had *before* this
/// review; the updated ease only affects later reviews.
pub fn schedule(card: &Card, quality: Quality, now: DateTime<Utc>) -> ScheduleOutcome {
    let mut card = card.clone();

    if quality.is_success() {
        card.interval = match card.repetitions {
            0 => 1,
            1 => 6,
            _ => grown_interval(card.interval, card.ease_factor),
        };
        card.repetitions += 1;
    } else {
        card.repetitions = 0;
        card.interval = 0;
    }

    card.ease_factor = next_ease(card.ease_factor, quality);
    card.due_date = now
        .checked_add_signed(Duration::days(i64::from(card.interval)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    card.last_reviewed = Some(now);

    let review = Review::new(card.id(), quality, now, card.interval, card.ease_factor);

    ScheduleOutcome { updated_card: card, review }
}
