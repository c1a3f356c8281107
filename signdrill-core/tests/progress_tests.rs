use chrono::{DateTime, Duration, TimeZone, Utc};
use signdrill_core::{
    progress_report, track_progress, Card, CardId, Quality, Review, MASTERY_TARGET,
};
use std::collections::HashMap;

fn deck(pairs: &[(&str, &str)], now: DateTime<Utc>) -> HashMap<CardId, Card> {
    pairs
        .iter()
        .map(|(c, w)| {
            let card = Card::new(*c, *w, now);
            (card.id(), card)
        })
        .collect()
}

fn review(category: &str, word: &str, q: u8, at: DateTime<Utc>) -> Review {
    Review::new(CardId::new(category, word), Quality::new(q).unwrap(), at, 1, 2.5)
}

#[test]
fn five_passes_master_a_sign_with_one_achievement() {
    let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let cards = deck(&[("Greetings", "Hello")], t0);
    let mut reviews = Vec::new();
    for i in 0..4 {
        reviews.push(review("Greetings", "Hello", 4, t0 + Duration::hours(i)));
    }
    reviews.push(review("Greetings", "Hello", 1, t0 + Duration::hours(4)));
    assert_eq!(
        track_progress(&reviews, &cards).words[&CardId::new("Greetings", "Hello")].mastery_progress,
        3
    );

    for i in 5..9 {
        reviews.push(review("Greetings", "Hello", 5, t0 + Duration::hours(i)));
    }
    let book = track_progress(&reviews, &cards);
    let hello = &book.words[&CardId::new("Greetings", "Hello")];
    assert!(hello.mastered);
    assert_eq!(hello.mastery_progress, MASTERY_TARGET);
    assert_eq!(hello.times_practiced, 9);
    assert_eq!(book.achievements.len(), 1);
    assert_eq!(book.achievements[0].achieved_at, t0 + Duration::hours(6));
}

#[test]
fn replay_order_follows_review_time() {
    let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let cards = deck(&[("Colors", "Red")], t0);
    // Stored out of order: the failure came first, then a pass.
    let reviews = vec![
        review("Colors", "Red", 5, t0 + Duration::minutes(5)),
        review("Colors", "Red", 0, t0),
    ];
    let book = track_progress(&reviews, &cards);
    assert_eq!(book.words[&CardId::new("Colors", "Red")].mastery_progress, 1);
}

#[test]
fn report_ranks_and_windows() {
    let today = Utc.with_ymd_and_hms(2026, 3, 20, 12, 0, 0).unwrap();
    let cards = deck(
        &[
            ("Colors", "Red"),
            ("Colors", "Blue"),
            ("Family", "Mother"),
            ("Time", "Today"),
            ("Numbers", "1"),
        ],
        today,
    );
    let mut reviews = Vec::new();
    // Red mastered over five days, Blue practiced twice.
    for d in 0..5 {
        reviews.push(review("Colors", "Red", 5, today - Duration::days(d)));
    }
    reviews.push(review("Colors", "Blue", 2, today));
    reviews.push(review("Colors", "Blue", 3, today));
    reviews.push(review("Family", "Mother", 4, today - Duration::days(9)));
    reviews.push(review("Time", "Today", 4, today - Duration::days(10)));
    reviews.push(review("Numbers", "1", 4, today - Duration::days(11)));
    // A card that has since been removed does not count.
    reviews.push(review("Colors", "Gone", 5, today));

    let report = progress_report(&reviews, &cards, today.date_naive());
    assert_eq!(report.practiced, 5);
    assert_eq!(report.mastered, 1);
    assert_eq!(report.mastery_rate, 20);
    assert_eq!(report.streak, 5);

    assert_eq!(report.top_categories.len(), 3);
    assert_eq!(report.top_categories[0].name, "Colors");
    assert_eq!(report.top_categories[0].practiced, 2);
    assert_eq!(report.top_categories[0].mastery_rate, 50);
    // ties fall back to name order
    assert_eq!(report.top_categories[1].name, "Family");
    assert_eq!(report.top_categories[2].name, "Numbers");

    assert_eq!(report.top_words[0].word, "Red");
    assert_eq!(report.top_words[1].word, "Blue");

    assert_eq!(report.recent_activity.len(), 7);
    assert_eq!(report.recent_activity[0].date, today.date_naive());
    assert_eq!(report.recent_activity[0].signs, 2);

    assert_eq!(report.recent_achievements.len(), 1);
    assert_eq!(report.recent_achievements[0].word, "Red");
}

#[test]
fn empty_log_gives_empty_report() {
    let today = Utc::now();
    let report = progress_report(&[], &deck(&[("Colors", "Red")], today), today.date_naive());
    assert_eq!(report.practiced, 0);
    assert_eq!(report.mastery_rate, 0);
    assert!(report.top_words.is_empty());
    assert!(report.recent_activity.is_empty());
}
