use crate::Card;
use chrono::{DateTime, Utc};

pub fn filter_by_text(cards: &[Card], query: &str) -> Vec<Card> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return cards.to_vec();
    }
    cards
        .iter()
        .filter(|c| c.word.to_lowercase().contains(&q) || c.category.to_lowercase().contains(&q))
        .cloned()
        .collect()
}

pub fn filter_by_category(cards: &[Card], category: &str) -> Vec<Card> {
    let q = category.trim().to_lowercase();
    cards
        .iter()
        .filter(|c| c.category.to_lowercase() == q)
        .cloned()
        .collect()
}

pub fn filter_due(cards: &[Card], now: DateTime<Utc>) -> Vec<Card> {
    cards.iter().filter(|c| c.is_due(now)).cloned().collect()
}

pub fn filter_new(cards: &[Card]) -> Vec<Card> {
    cards.iter().filter(|c| c.is_new()).cloned().collect()
}
