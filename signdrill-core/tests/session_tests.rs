use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use signdrill_core::{
    get_due_cards, Card, CardId, CardStore, CoreError, MemoryStore, Quality, Session,
    SessionLimits, SessionManager, SessionState,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

fn q(v: u8) -> Quality {
    Quality::new(v).unwrap()
}

fn due_at(word: &str, due: DateTime<Utc>, reps: u32) -> Card {
    let mut c = Card::new("test", word, due);
    c.repetitions = reps;
    if reps > 0 {
        c.interval = 6;
    }
    c
}

#[test]
fn due_cards_most_overdue_first() {
    let now = Utc::now();
    let cards = vec![
        due_at("plus1", now + Duration::days(1), 0),
        due_at("minus5", now - Duration::days(5), 0),
        due_at("minus2", now - Duration::days(2), 0),
    ];
    let due = get_due_cards(cards, now, 20);
    let words: Vec<&str> = due.iter().map(|c| c.word.as_str()).collect();
    assert_eq!(words, vec!["minus5", "minus2"]);
}

#[test]
fn due_cards_respects_limit_and_boundary() {
    let now = Utc::now();
    let cards = (0..30).map(|i| due_at(&format!("w{i}"), now - Duration::minutes(i), 0));
    let due = get_due_cards(cards, now, 20);
    assert_eq!(due.len(), 20);
    assert_eq!(due[0].word, "w29");

    let exact = get_due_cards(vec![due_at("now", now, 0)], now, 20);
    assert_eq!(exact.len(), 1);
}

#[test]
fn session_takes_all_when_under_limits() {
    let now = Utc::now();
    let mut cards = Vec::new();
    for i in 0..3 {
        cards.push(due_at(&format!("new{i}"), now - Duration::hours(i + 1), 0));
    }
    for i in 0..7 {
        cards.push(due_at(&format!("rev{i}"), now - Duration::hours(i + 1), 2));
    }
    let mut rng = StdRng::seed_from_u64(42);
    let s = Session::start(cards.clone(), now, SessionLimits::default(), &mut rng);
    let info = s.info();
    assert_eq!(info.total_cards, 10);
    assert_eq!(info.new_cards, 3);
    assert_eq!(info.review_cards, 7);

    let picked: HashSet<CardId> = s.cards().iter().map(|c| c.id()).collect();
    let all: HashSet<CardId> = cards.iter().map(Card::id).collect();
    assert_eq!(picked, all);
    assert!(s.cards().iter().all(|c| !c.answered && c.quality.is_none()));
}

#[test]
fn shuffle_is_seeded_and_permutes() {
    let now = Utc::now();
    let cards: Vec<Card> = (0..12)
        .map(|i| due_at(&format!("w{i:02}"), now - Duration::hours(12 - i), 1))
        .collect();
    let order = |seed| {
        let mut rng = StdRng::seed_from_u64(seed);
        Session::start(cards.clone(), now, SessionLimits::default(), &mut rng)
            .cards()
            .iter()
            .map(|c| c.card.word.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(order(9), order(9));

    let due_order: Vec<String> = cards.iter().map(|c| c.word.clone()).collect();
    let mut seen_other = false;
    for seed in 0..8 {
        let o = order(seed);
        let mut sorted = o.clone();
        sorted.sort();
        assert_eq!(sorted, due_order);
        seen_other |= o != due_order;
    }
    assert!(seen_other);
}

#[test]
fn stats_average_over_answered_only() {
    let now = Utc::now();
    let cards: Vec<Card> = (0..4).map(|i| due_at(&format!("w{i}"), now, 0)).collect();
    let mut rng = StdRng::seed_from_u64(5);
    let mut s = Session::start(cards, now, SessionLimits::default(), &mut rng);

    let ids: Vec<CardId> = s.cards().iter().map(|c| c.id()).collect();
    for (id, v) in ids.iter().zip([2u8, 4, 5]) {
        s.mark_answered(id, q(v)).unwrap();
    }
    assert_eq!(s.state(), SessionState::InProgress);
    assert_eq!(s.progress().answered, 3);

    let stats = s.end();
    assert_eq!(stats.total_cards, 4);
    assert_eq!(stats.cards_completed, 3);
    assert!((stats.average_quality - 11.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn answering_every_card_completes_session() {
    let now = Utc::now();
    let manager = SessionManager::new(MemoryStore::new());
    for w in ["hello", "goodbye", "please"] {
        manager.add_card("greetings", w, now).await.unwrap();
    }

    let mut rng = StdRng::seed_from_u64(11);
    let mut session = manager.start_session(now, &mut rng).await.unwrap();
    assert_eq!(session.info().total_cards, 3);

    while let Some(next) = session.next_card() {
        let id = next.id();
        manager.record_answer(&mut session, &id, q(4), now).await.unwrap();
    }
    assert!(session.next_card().is_none());
    assert_eq!(session.state(), SessionState::Complete);

    let stored = manager.store().get_all().await.unwrap();
    assert!(stored.values().all(|c| c.repetitions == 1 && c.interval == 1));
    assert_eq!(manager.store().list_reviews().await.unwrap().len(), 3);

    let stats = manager.end_session(session);
    assert_eq!(stats.cards_completed, 3);
    assert!((stats.average_quality - 4.0).abs() < 1e-9);
}

#[tokio::test]
async fn snapshot_is_not_live() {
    let now = Utc::now();
    let manager = SessionManager::new(MemoryStore::new());
    let card = manager.add_card("emotions", "happy", now).await.unwrap();

    let mut rng = StdRng::seed_from_u64(1);
    let mut session = manager.start_session(now, &mut rng).await.unwrap();
    manager.record_answer(&mut session, &card.id(), q(5), now).await.unwrap();

    let snap = &session.cards()[0];
    assert!(snap.answered);
    assert_eq!(snap.quality, Some(q(5)));
    assert_eq!(snap.card.repetitions, 0);
    let stored = manager.store().get(&card.id()).await.unwrap().unwrap();
    assert_eq!(stored.repetitions, 1);
}

#[tokio::test]
async fn second_answer_is_rejected_without_rescheduling() {
    let now = Utc::now();
    let manager = SessionManager::new(MemoryStore::new());
    let card = manager.add_card("questions", "why", now).await.unwrap();

    let mut rng = StdRng::seed_from_u64(1);
    let mut session = manager.start_session(now, &mut rng).await.unwrap();
    manager.record_answer(&mut session, &card.id(), q(4), now).await.unwrap();

    let err = manager
        .record_answer(&mut session, &card.id(), q(4), now)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::AlreadyAnswered(_)));

    let stored = manager.store().get(&card.id()).await.unwrap().unwrap();
    assert_eq!(stored.repetitions, 1);
    assert_eq!(manager.store().list_reviews().await.unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_card_is_not_found() {
    let now = Utc::now();
    let manager = SessionManager::new(MemoryStore::new());
    manager.add_card("colors", "red", now).await.unwrap();
    let mut rng = StdRng::seed_from_u64(1);
    let mut session = manager.start_session(now, &mut rng).await.unwrap();

    let err = manager
        .record_answer(&mut session, &CardId::new("colors", "mauve"), q(3), now)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));

    let err = manager
        .review(&CardId::new("colors", "mauve"), q(3), now)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn card_outside_session_is_rejected() {
    let now = Utc::now();
    let manager = SessionManager::new(MemoryStore::new());
    let mut rng = StdRng::seed_from_u64(1);
    let mut session = manager.start_session(now, &mut rng).await.unwrap();
    assert!(session.is_empty());

    let late = manager.add_card("food and drink", "water", now).await.unwrap();
    let err = manager
        .record_answer(&mut session, &late.id(), q(5), now)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotInSession(_)));
    let stored = manager.store().get(&late.id()).await.unwrap().unwrap();
    assert!(stored.is_new());
}

#[tokio::test]
async fn empty_session_reports_zero() {
    let now = Utc::now();
    let manager = SessionManager::new(MemoryStore::new());
    let card = manager.add_card("time", "tomorrow", now).await.unwrap();
    manager.review(&card.id(), q(5), now).await.unwrap();

    let mut rng = StdRng::seed_from_u64(1);
    let session = manager.start_session(now, &mut rng).await.unwrap();
    assert_eq!(session.info().total_cards, 0);
    assert!(session.next_card().is_none());

    let stats = manager.end_session(session);
    assert_eq!(stats.total_cards, 0);
    assert_eq!(stats.cards_completed, 0);
    assert_eq!(stats.average_quality, 0.0);
}

#[tokio::test]
async fn add_card_keeps_existing_progress() {
    let now = Utc::now();
    let manager = SessionManager::new(MemoryStore::new());
    let card = manager.add_card("alphabet", "A", now).await.unwrap();
    manager.review(&card.id(), q(5), now).await.unwrap();
    manager.review(&card.id(), q(5), now).await.unwrap();

    let again = manager.add_card("alphabet", "A", now + Duration::days(3)).await.unwrap();
    assert_eq!(again.repetitions, 2);
    assert_eq!(again.interval, 6);
    assert_eq!(manager.store().get_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn custom_limits_are_applied() {
    let now = Utc::now();
    let manager = SessionManager::new(MemoryStore::new())
        .with_limits(SessionLimits { new_cards: 2, total_cards: 3 });
    for i in 0..6 {
        manager.add_card("numbers", &i.to_string(), now - Duration::minutes(i)).await.unwrap();
    }
    let mut rng = StdRng::seed_from_u64(1);
    let info = manager.start_session(now, &mut rng).await.unwrap().info();
    assert_eq!(info.new_cards, 2);
    assert_eq!(info.review_cards, 0);
    assert_eq!(info.total_cards, 2);
}

/// Memory store whose next `record_review` fails without writing anything.
struct FailOnceStore {
    inner: MemoryStore,
    fail_next: AtomicBool,
}

#[async_trait::async_trait]
impl CardStore for FailOnceStore {
    async fn get(&self, id: &CardId) -> Result<Option<Card>, CoreError> {
        self.inner.get(id).await
    }
    async fn put(&self, card: &Card) -> Result<(), CoreError> {
        self.inner.put(card).await
    }
    async fn get_all(&self) -> Result<HashMap<CardId, Card>, CoreError> {
        self.inner.get_all().await
    }
    async fn insert_review(&self, review: &signdrill_core::Review) -> Result<(), CoreError> {
        self.inner.insert_review(review).await
    }
    async fn list_reviews(&self) -> Result<Vec<signdrill_core::Review>, CoreError> {
        self.inner.list_reviews().await
    }
    async fn record_review(
        &self,
        card: &Card,
        review: &signdrill_core::Review,
    ) -> Result<(), CoreError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(CoreError::Storage("io"));
        }
        self.inner.record_review(card, review).await
    }
    async fn reset(&self, cards: &[Card]) -> Result<(), CoreError> {
        self.inner.reset(cards).await
    }
}

#[tokio::test]
async fn failed_write_can_be_retried_without_double_scheduling() {
    let now = Utc::now();
    let store = FailOnceStore {
        inner: MemoryStore::with_cards(vec![due_at("hello", now, 1)]),
        fail_next: AtomicBool::new(true),
    };
    let manager = SessionManager::new(store);
    let mut rng = StdRng::seed_from_u64(21);
    let mut session = manager.start_session(now, &mut rng).await.unwrap();
    let id = CardId::new("test", "hello");

    let err = manager.record_answer(&mut session, &id, q(5), now).await;
    assert!(matches!(err, Err(CoreError::Storage(_))));
    assert_eq!(manager.store().get(&id).await.unwrap().unwrap().repetitions, 1);
    assert_eq!(session.state(), SessionState::InProgress);

    let card = manager.record_answer(&mut session, &id, q(5), now).await.unwrap();
    assert_eq!(card.repetitions, 2);
    assert_eq!(card.interval, 6);
    assert_eq!(manager.store().list_reviews().await.unwrap().len(), 1);
    assert_eq!(session.state(), SessionState::Complete);
}

#[tokio::test]
async fn reset_progress_returns_cards_to_new() {
    let now = Utc::now();
    let store = MemoryStore::with_cards(vec![due_at("a", now, 3), due_at("b", now, 0)]);
    let manager = SessionManager::new(store);
    manager.review(&CardId::new("test", "a"), q(4), now).await.unwrap();

    assert_eq!(manager.reset_progress(now).await.unwrap(), 2);
    let cards = manager.store().get_all().await.unwrap();
    assert!(cards.values().all(|c| c.is_new() && c.last_reviewed.is_none()));
    assert!(manager.store().list_reviews().await.unwrap().is_empty());
}
