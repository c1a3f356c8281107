use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{schedule, Card, CardId, CardStore, CoreError, Quality, ScheduleOutcome};

pub const DEFAULT_DUE_LIMIT: usize = 20;

/// Caps applied when a study session is assembled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLimits {
    pub new_cards: usize,
    pub total_cards: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            new_cards: 5,
            total_cards: DEFAULT_DUE_LIMIT,
        }
    }
}

/// Cards with `due_date <= now`, most overdue first, at most `limit`.
pub fn get_due_cards(
    cards: impl IntoIterator<Item = Card>,
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<Card> {
    let mut due: Vec<Card> = cards.into_iter().filter(|c| c.is_due(now)).collect();
    // Id breaks ties so selection does not depend on store iteration order.
    due.sort_by_cached_key(|c| (c.due_date, c.id()));
    due.truncate(limit);
    due
}

/// A snapshot of a card taken when the session started.
#[derive(Clone, Debug, Serialize)]
pub struct SessionCard {
    pub card: Card,
    pub answered: bool,
    pub quality: Option<Quality>,
}

impl SessionCard {
    fn fresh(card: Card) -> Self {
        Self {
            card,
            answered: false,
            quality: None,
        }
    }

    pub fn id(&self) -> CardId {
        self.card.id()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub total_cards: usize,
    pub new_cards: usize,
    pub review_cards: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    InProgress,
    Complete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SessionProgress {
    pub answered: usize,
    pub total: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SessionStats {
    pub total_cards: usize,
    pub cards_completed: usize,
    pub average_quality: f64,
}

/// One study sitting. Owns copies of the selected cards; the store is never
/// reached through a session.
#[derive(Clone, Debug)]
pub struct Session {
    cards: Vec<SessionCard>,
    new_cards: usize,
    review_cards: usize,
    started_at: DateTime<Utc>,
}

impl Session {
    /// Select up to `limits.new_cards` new cards, fill the rest of
    /// `limits.total_cards` with review cards, then shuffle.
    ///
    /// Selection priority is due order; presentation order is random.
    pub fn start<R: Rng + ?Sized>(
        cards: impl IntoIterator<Item = Card>,
        now: DateTime<Utc>,
        limits: SessionLimits,
        rng: &mut R,
    ) -> Self {
        let due = get_due_cards(cards, now, limits.total_cards);
        let (fresh, review): (Vec<Card>, Vec<Card>) = due.into_iter().partition(Card::is_new);

        let new_take: Vec<Card> = fresh.into_iter().take(limits.new_cards).collect();
        let review_room = limits.total_cards.saturating_sub(new_take.len());
        let review_take: Vec<Card> = review.into_iter().take(review_room).collect();

        let new_cards = new_take.len();
        let review_cards = review_take.len();

        let mut selected: Vec<SessionCard> = new_take
            .into_iter()
            .chain(review_take)
            .map(SessionCard::fresh)
            .collect();
        selected.shuffle(rng);

        Self {
            cards: selected,
            new_cards,
            review_cards,
            started_at: now,
        }
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            total_cards: self.cards.len(),
            new_cards: self.new_cards,
            review_cards: self.review_cards,
        }
    }

    pub fn cards(&self) -> &[SessionCard] {
        &self.cards
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// First unanswered card in presentation order; `None` once every card
    /// has been answered.
    pub fn next_card(&self) -> Option<&SessionCard> {
        self.cards.iter().find(|c| !c.answered)
    }

    pub fn state(&self) -> SessionState {
        if self.next_card().is_none() {
            SessionState::Complete
        } else {
            SessionState::InProgress
        }
    }

    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            answered: self.cards.iter().filter(|c| c.answered).count(),
            total: self.cards.len(),
        }
    }

    /// Fails unless `id` is in this session and still unanswered.
    pub fn check_answerable(&self, id: &CardId) -> Result<(), CoreError> {
        match self.cards.iter().find(|c| &c.id() == id) {
            None => Err(CoreError::NotInSession(id.clone())),
            Some(c) if c.answered => Err(CoreError::AlreadyAnswered(id.clone())),
            Some(_) => Ok(()),
        }
    }

    pub fn mark_answered(&mut self, id: &CardId, quality: Quality) -> Result<(), CoreError> {
        self.check_answerable(id)?;
        if let Some(entry) = self.cards.iter_mut().find(|c| &c.id() == id) {
            entry.answered = true;
            entry.quality = Some(quality);
        }
        Ok(())
    }

    pub fn stats(&self) -> SessionStats {
        let answered: Vec<u8> = self
            .cards
            .iter()
            .filter(|c| c.answered)
            .filter_map(|c| c.quality.map(Quality::value))
            .collect();
        let average_quality = if answered.is_empty() {
            0.0
        } else {
            answered.iter().map(|&q| q as f64).sum::<f64>() / answered.len() as f64
        };
        SessionStats {
            total_cards: self.cards.len(),
            cards_completed: answered.len(),
            average_quality,
        }
    }

    /// Close the session and report what was studied.
    pub fn end(self) -> SessionStats {
        self.stats()
    }
}

/// Session operations against a [`CardStore`].
pub struct SessionManager<S: CardStore> {
    store: S,
    limits: SessionLimits,
}

impl<S: CardStore> SessionManager<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            limits: SessionLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: SessionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    /// Create the card with defaults unless it already exists. An existing
    /// card is returned unchanged.
    pub async fn add_card(
        &self,
        category: &str,
        word: &str,
        now: DateTime<Utc>,
    ) -> Result<Card, CoreError> {
        let id = CardId::new(category, word);
        if let Some(existing) = self.store.get(&id).await? {
            return Ok(existing);
        }
        let card = Card::new(category, word, now);
        self.store.put(&card).await?;
        tracing::debug!(card = %id, "card added");
        Ok(card)
    }

    pub async fn due_cards(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Card>, CoreError> {
        let cards = self.store.get_all().await?;
        Ok(get_due_cards(cards.into_values(), now, limit))
    }

    /// Schedule one review outside any session and persist the result.
    pub async fn review(
        &self,
        id: &CardId,
        quality: Quality,
        now: DateTime<Utc>,
    ) -> Result<ScheduleOutcome, CoreError> {
        let card = self.store.get(id).await?.ok_or(CoreError::NotFound("card"))?;
        self.apply(&card, quality, now).await
    }

    async fn apply(
        &self,
        card: &Card,
        quality: Quality,
        now: DateTime<Utc>,
    ) -> Result<ScheduleOutcome, CoreError> {
        let out = schedule(card, quality, now);
        self.store.record_review(&out.updated_card, &out.review).await?;
        tracing::debug!(
            card = %out.review.card_id,
            quality = quality.value(),
            interval = out.updated_card.interval,
            ease = out.updated_card.ease_factor,
            "review recorded"
        );
        Ok(out)
    }

    pub async fn start_session<R: Rng + ?Sized>(
        &self,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<Session, CoreError> {
        let cards = self.store.get_all().await?;
        let session = Session::start(cards.into_values(), now, self.limits, rng);
        let info = session.info();
        tracing::info!(
            total = info.total_cards,
            new = info.new_cards,
            review = info.review_cards,
            "session started"
        );
        Ok(session)
    }

    /// Schedule the answered card against the store and mark it answered in
    /// `session`. A card can be answered once per session.
    pub async fn record_answer(
        &self,
        session: &mut Session,
        id: &CardId,
        quality: Quality,
        now: DateTime<Utc>,
    ) -> Result<Card, CoreError> {
        let card = self.store.get(id).await?.ok_or(CoreError::NotFound("card"))?;
        session.check_answerable(id)?;
        let out = self.apply(&card, quality, now).await?;
        session.mark_answered(id, quality)?;
        Ok(out.updated_card)
    }

    /// Return every card to its unreviewed state and drop the review log.
    /// Returns how many cards were reset.
    pub async fn reset_progress(&self, now: DateTime<Utc>) -> Result<usize, CoreError> {
        let fresh: Vec<Card> = self
            .store
            .get_all()
            .await?
            .into_values()
            .map(|c| Card::new(c.category, c.word, now))
            .collect();
        self.store.reset(&fresh).await?;
        tracing::info!(cards = fresh.len(), "progress reset");
        Ok(fresh.len())
    }

    pub fn end_session(&self, session: Session) -> SessionStats {
        let stats = session.end();
        if stats.cards_completed < stats.total_cards {
            tracing::info!(
                unanswered = stats.total_cards - stats.cards_completed,
                "session ended early"
            );
        }
        tracing::info!(
            total = stats.total_cards,
            completed = stats.cards_completed,
            average = stats.average_quality,
            "session ended"
        );
        stats
    }
}
