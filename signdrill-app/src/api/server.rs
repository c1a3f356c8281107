use axum::{
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::api::routes::{
    add_card, answer, due_cards, end_session, list_cards, next_card, progress, reset_progress,
    start_session, stats, AppState, SessionPolicy,
};
use crate::cli::commands::Manager;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/cards", get(list_cards).post(add_card))
        .route("/due", get(due_cards))
        .route("/stats", get(stats))
        .route("/progress", get(progress))
        .route("/progress/reset", post(reset_progress))
        .route("/sessions", post(start_session))
        .route("/sessions/:id/next", get(next_card))
        .route("/sessions/:id/answers", post(answer))
        .route("/sessions/:id/end", post(end_session))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn run(manager: Manager, addr: SocketAddr, policy: SessionPolicy) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(manager, policy));
    let app = router(state.clone());

    // Abandoned sessions are swept even when no new session is started.
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            tick.tick().await;
            state.evict_idle(chrono::Utc::now());
        }
    });

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "api listening");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
