use crate::{AppState, handlers};
use axum::{
    Router,
    routing::get,
};

/// Authenticated Router Module
///
/// Screens every signed-in role may open (`required_roles = None` in the route table),
/// plus sign-in, which the gate offers only to anonymous users.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET/POST /login
        // Sign-in form and credential exchange; signed-in users are redirected to /dashboard.
        .route(
            "/login",
            get(handlers::login_screen).post(handlers::login),
        )
        // GET /dashboard
        // Headline stats for the organization.
        .route("/dashboard", get(handlers::dashboard))
        // GET/POST /complaints
        // Complaint list (filtered locally) and filing a new complaint.
        .route(
            "/complaints",
            get(handlers::list_complaints).post(handlers::create_complaint),
        )
        // GET/POST /chatbot
        // Assistant screen and message exchange.
        .route(
            "/chatbot",
            get(handlers::chatbot_screen).post(handlers::chat),
        )
}
