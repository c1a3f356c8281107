use crate::{Card, CardId, CoreError, Review};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
pub struct MemoryStore {
    cards: RwLock<HashMap<CardId, Card>>,
    reviews: RwLock<Vec<Review>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cards(cards: impl IntoIterator<Item = Card>) -> Self {
        let map = cards.into_iter().map(|c| (c.id(), c)).collect();
        Self {
            cards: RwLock::new(map),
            reviews: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl crate::store::CardStore for MemoryStore {
    async fn get(&self, id: &CardId) -> Result<Option<Card>, CoreError> {
        Ok(self.cards.read().get(id).cloned())
    }

    async fn put(&self, card: &Card) -> Result<(), CoreError> {
        self.cards.write().insert(card.id(), card.clone());
        Ok(())
    }

    async fn get_all(&self) -> Result<HashMap<CardId, Card>, CoreError> {
        Ok(self.cards.read().clone())
    }

    async fn insert_review(&self, review: &Review) -> Result<(), CoreError> {
        self.reviews.write().push(review.clone());
        Ok(())
    }

    async fn list_reviews(&self) -> Result<Vec<Review>, CoreError> {
        let mut v = self.reviews.read().clone();
        v.sort_by_key(|r| r.reviewed_at);
        Ok(v)
    }

    async fn record_review(&self, card: &Card, review: &Review) -> Result<(), CoreError> {
        let mut cards = self.cards.write();
        let mut reviews = self.reviews.write();
        cards.insert(card.id(), card.clone());
        reviews.push(review.clone());
        Ok(())
    }

    async fn reset(&self, cards: &[Card]) -> Result<(), CoreError> {
        let mut map = self.cards.write();
        let mut reviews = self.reviews.write();
        *map = cards.iter().map(|c| (c.id(), c.clone())).collect();
        reviews.clear();
        Ok(())
    }
}
