use crate::{Card, CardId, CoreError, Review};
use async_trait::async_trait;
use std::collections::HashMap;

pub mod memory;

pub use memory::MemoryStore;

/// Durable home of card scheduling state. Plain data access; scheduling
/// rules live in [`crate::scheduler`] and [`crate::session`].
#[async_trait]
pub trait CardStore: Send + Sync {
    // Cards
    async fn get(&self, id: &CardId) -> Result<Option<Card>, CoreError>;
    async fn put(&self, card: &Card) -> Result<(), CoreError>;
    async fn get_all(&self) -> Result<HashMap<CardId, Card>, CoreError>;

    // Reviews
    async fn insert_review(&self, review: &Review) -> Result<(), CoreError>;
    async fn list_reviews(&self) -> Result<Vec<Review>, CoreError>;

    /// Store the rescheduled card and its review log entry as one write.
    /// On error neither is applied.
    async fn record_review(&self, card: &Card, review: &Review) -> Result<(), CoreError>;

    /// Replace every card with `cards` and empty the review log, as one write.
    async fn reset(&self, cards: &[Card]) -> Result<(), CoreError>;
}

#[async_trait]
impl<S: CardStore + ?Sized> CardStore for std::sync::Arc<S> {
    async fn get(&self, id: &CardId) -> Result<Option<Card>, CoreError> {
        (**self).get(id).await
    }

    async fn put(&self, card: &Card) -> Result<(), CoreError> {
        (**self).put(card).await
    }

    async fn get_all(&self) -> Result<HashMap<CardId, Card>, CoreError> {
        (**self).get_all().await
    }

    async fn insert_review(&self, review: &Review) -> Result<(), CoreError> {
        (**self).insert_review(review).await
    }

    async fn list_reviews(&self) -> Result<Vec<Review>, CoreError> {
        (**self).list_reviews().await
    }

    async fn record_review(&self, card: &Card, review: &Review) -> Result<(), CoreError> {
        (**self).record_review(card, review).await
    }

    async fn reset(&self, cards: &[Card]) -> Result<(), CoreError> {
        (**self).reset(cards).await
    }
}
