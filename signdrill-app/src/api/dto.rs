use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use signdrill_core::{
    Card, CoreError, DeckStats, SessionInfo, SessionProgress, SessionState,
};
use uuid::Uuid;

#[derive(Serialize)]
pub struct CardOut {
    pub id: String,
    pub category: String,
    pub word: String,
    pub ease_factor: f64,
    pub interval: u32,
    pub repetitions: u32,
    pub due_date: DateTime<Utc>,
    pub last_reviewed: Option<DateTime<Utc>>,
}

impl From<Card> for CardOut {
    fn from(c: Card) -> Self {
        Self {
            id: c.id().to_string(),
            category: c.category,
            word: c.word,
            ease_factor: c.ease_factor,
            interval: c.interval,
            repetitions: c.repetitions,
            due_date: c.due_date,
            last_reviewed: c.last_reviewed,
        }
    }
}

#[derive(Deserialize)]
pub struct CardIn {
    pub category: String,
    pub word: String,
}

#[derive(Serialize)]
pub struct SessionStarted {
    pub session_id: Uuid,
    #[serde(flatten)]
    pub info: SessionInfo,
}

#[derive(Serialize)]
pub struct NextOut {
    pub card: Option<CardOut>,
    pub progress: SessionProgress,
    pub state: SessionState,
}

#[derive(Deserialize)]
pub struct AnswerIn {
    pub card_id: String,
    pub quality: u8,
}

#[derive(Serialize)]
pub struct AnswerOut {
    pub card: CardOut,
    pub progress: SessionProgress,
    pub state: SessionState,
}

#[derive(Serialize)]
pub struct StatsOut {
    #[serde(flatten)]
    pub deck: DeckStats,
    pub reviews: u32,
    pub accuracy: f64,
    pub average_quality: f64,
    pub streak: u32,
}

#[derive(Serialize)]
pub struct ResetOut {
    pub cards_reset: usize,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

pub struct ApiError(pub StatusCode, pub String);

impl ApiError {
    pub fn session_not_found() -> Self {
        Self(StatusCode::NOT_FOUND, "session not found".to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        let status = match &e {
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::InvalidQuality(_) | CoreError::Invalid(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CoreError::AlreadyAnswered(_) | CoreError::NotInSession(_) => StatusCode::CONFLICT,
            CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %e, "request failed");
        }
        Self(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(ErrorBody { error: self.1 })).into_response()
    }
}
