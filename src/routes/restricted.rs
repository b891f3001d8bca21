use crate::{AppState, handlers};
use axum::{
    Router,
    routing::get,
};

/// Restricted Router Module
///
/// Screens limited to part of the role set. A signed-in user whose role is not listed
/// for the screen is redirected to /dashboard by the gate; these handlers never see them.
pub fn restricted_routes() -> Router<AppState> {
    Router::new()
        // Leads: system_admin, org_admin, employee.
        .route(
            "/leads",
            get(handlers::list_leads).post(handlers::create_lead),
        )
        .route(
            "/leads/{id}",
            get(handlers::get_lead)
                .put(handlers::update_lead)
                .delete(handlers::delete_lead),
        )
        // Users and subscription: system_admin, org_admin.
        .route("/users", get(handlers::users_screen))
        .route("/subscription", get(handlers::subscription_screen))
}
