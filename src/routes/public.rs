use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints outside the gate. None of them renders a screen, so none of them needs a
/// role decision. Sign-in lives with the gated screens because the gate is what keeps
/// it to anonymous users.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check; does not touch the backend.
        .route("/health", get(|| async { "ok" }))
        // GET /session
        // Session snapshot for the browser shell. Reports `loading` during bootstrap.
        .route("/session", get(handlers::get_session))
        // POST /logout
        // Local sign-out; redirects to /login.
        .route("/logout", post(handlers::logout))
}
