use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use signdrill_core::{
    daily_streak, deck_stats, filter_by_category, filter_by_text, progress_report, summarize,
    CardId, CardStore, ProgressReport, Quality, Session, SessionStats, DEFAULT_DUE_LIMIT,
};

use crate::api::dto::{
    AnswerIn, AnswerOut, ApiError, CardIn, CardOut, NextOut, ResetOut, SessionStarted, StatsOut,
};
use crate::cli::commands::Manager;

type SharedSession = Arc<tokio::sync::Mutex<Session>>;

/// How long the server keeps sessions nobody has ended.
#[derive(Clone, Copy, Debug)]
pub struct SessionPolicy {
    pub idle_ttl: Duration,
    pub max_sessions: usize,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::minutes(60),
            max_sessions: 256,
        }
    }
}

struct SessionSlot {
    session: SharedSession,
    touched: DateTime<Utc>,
}

pub struct AppState {
    pub manager: Manager,
    policy: SessionPolicy,
    sessions: Mutex<HashMap<Uuid, SessionSlot>>,
}

impl AppState {
    pub fn new(manager: Manager, policy: SessionPolicy) -> Self {
        Self {
            manager,
            policy,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn session(&self, id: Uuid) -> Result<SharedSession, ApiError> {
        let mut sessions = self.sessions.lock();
        let slot = sessions.get_mut(&id).ok_or_else(ApiError::session_not_found)?;
        slot.touched = Utc::now();
        Ok(slot.session.clone())
    }

    fn insert(&self, session: Session, now: DateTime<Utc>) -> Uuid {
        let mut sessions = self.sessions.lock();
        evict_idle(&mut sessions, now - self.policy.idle_ttl);
        while sessions.len() >= self.policy.max_sessions.max(1) {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, slot)| slot.touched)
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                    tracing::info!(session = %id, "session evicted, server at capacity");
                }
                None => break,
            }
        }
        let id = Uuid::new_v4();
        sessions.insert(
            id,
            SessionSlot {
                session: Arc::new(tokio::sync::Mutex::new(session)),
                touched: now,
            },
        );
        id
    }

    fn remove(&self, id: Uuid) -> Option<SharedSession> {
        self.sessions.lock().remove(&id).map(|slot| slot.session)
    }

    /// Drop sessions untouched since `now - idle_ttl`. Returns how many.
    pub fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        evict_idle(&mut self.sessions.lock(), now - self.policy.idle_ttl)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }
}

fn evict_idle(sessions: &mut HashMap<Uuid, SessionSlot>, cutoff: DateTime<Utc>) -> usize {
    let before = sessions.len();
    sessions.retain(|_, slot| slot.touched > cutoff);
    let evicted = before - sessions.len();
    if evicted > 0 {
        tracing::info!(evicted, "idle sessions dropped");
    }
    evicted
}

#[derive(Deserialize)]
pub struct CardQuery {
    category: Option<String>,
    q: Option<String>,
}

#[derive(Deserialize)]
pub struct DueQuery {
    limit: Option<usize>,
}

pub async fn list_cards(
    State(st): State<Arc<AppState>>,
    Query(q): Query<CardQuery>,
) -> Result<Json<Vec<CardOut>>, ApiError> {
    let mut cards: Vec<_> = st.manager.store().get_all().await?.into_values().collect();
    cards.sort_by(|a, b| (&a.category, &a.word).cmp(&(&b.category, &b.word)));
    if let Some(cat) = &q.category {
        cards = filter_by_category(&cards, cat);
    }
    if let Some(text) = &q.q {
        cards = filter_by_text(&cards, text);
    }
    Ok(Json(cards.into_iter().map(CardOut::from).collect()))
}

pub async fn add_card(
    State(st): State<Arc<AppState>>,
    Json(body): Json<CardIn>,
) -> Result<Json<CardOut>, ApiError> {
    if body.category.trim().is_empty() || body.word.trim().is_empty() {
        return Err(ApiError(
            StatusCode::UNPROCESSABLE_ENTITY,
            "category and word are required".to_string(),
        ));
    }
    let card = st
        .manager
        .add_card(body.category.trim(), body.word.trim(), Utc::now())
        .await?;
    Ok(Json(card.into()))
}

pub async fn due_cards(
    State(st): State<Arc<AppState>>,
    Query(q): Query<DueQuery>,
) -> Result<Json<Vec<CardOut>>, ApiError> {
    let limit = q.limit.unwrap_or(DEFAULT_DUE_LIMIT);
    let due = st.manager.due_cards(Utc::now(), limit).await?;
    Ok(Json(due.into_iter().map(CardOut::from).collect()))
}

pub async fn stats(State(st): State<Arc<AppState>>) -> Result<Json<StatsOut>, ApiError> {
    let now = Utc::now();
    let cards = st.manager.store().get_all().await?;
    let reviews = st.manager.store().list_reviews().await?;
    let summary = summarize(&reviews);
    Ok(Json(StatsOut {
        deck: deck_stats(cards.values(), now),
        reviews: summary.totals.total,
        accuracy: summary.totals.accuracy(),
        average_quality: summary.totals.average_quality(),
        streak: daily_streak(&reviews, now.date_naive()),
    }))
}

pub async fn progress(State(st): State<Arc<AppState>>) -> Result<Json<ProgressReport>, ApiError> {
    let cards = st.manager.store().get_all().await?;
    let reviews = st.manager.store().list_reviews().await?;
    Ok(Json(progress_report(&reviews, &cards, Utc::now().date_naive())))
}

pub async fn reset_progress(State(st): State<Arc<AppState>>) -> Result<Json<ResetOut>, ApiError> {
    let cards_reset = st.manager.reset_progress(Utc::now()).await?;
    Ok(Json(ResetOut { cards_reset }))
}

pub async fn start_session(
    State(st): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<SessionStarted>), ApiError> {
    let mut rng = StdRng::from_os_rng();
    let session = st.manager.start_session(Utc::now(), &mut rng).await?;
    let info = session.info();
    let id = st.insert(session, Utc::now());
    Ok((StatusCode::CREATED, Json(SessionStarted { session_id: id, info })))
}

pub async fn next_card(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<NextOut>, ApiError> {
    let shared = st.session(id)?;
    let session = shared.lock().await;
    Ok(Json(NextOut {
        card: session.next_card().map(|c| c.card.clone().into()),
        progress: session.progress(),
        state: session.state(),
    }))
}

pub async fn answer(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<AnswerIn>,
) -> Result<Json<AnswerOut>, ApiError> {
    let quality = Quality::new(body.quality)?;
    let card_id = CardId::from(body.card_id);
    let shared = st.session(id)?;
    let mut session = shared.lock().await;
    let card = st
        .manager
        .record_answer(&mut session, &card_id, quality, Utc::now())
        .await?;
    Ok(Json(AnswerOut {
        card: card.into(),
        progress: session.progress(),
        state: session.state(),
    }))
}

pub async fn end_session(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionStats>, ApiError> {
    let shared = st.remove(id).ok_or_else(ApiError::session_not_found)?;
    // Waits out an answer still in flight for this session.
    let session = shared.lock().await.clone();
    Ok(Json(st.manager.end_session(session)))
}
