use axum::{
    Json, Router,
    extract::{FromRef, Request, State},
    http::{HeaderName, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde_json::json;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Session context, role policy and navigation.
pub mod access;
pub mod auth;
pub mod navigation;

// Backend client, credential persistence and configuration.
pub mod backend;
pub mod config;
pub mod storage;

// Request handling and the shapes it exchanges.
pub mod error;
pub mod filters;
pub mod handlers;
pub mod models;

// Module for routing segregation (Public, Authenticated, Restricted).
pub mod routes;
use access::GateDecision;
use routes::{authenticated, public, restricted};

// --- Public Re-exports ---

pub use auth::{AuthGateway, GatewayState, Session};
pub use backend::{BackendState, CrmBackend, HttpBackend, MockBackend};
pub use config::AppConfig;
pub use error::PortalError;
pub use storage::{FileSessionStore, MemorySessionStore, SessionStoreState};

/// ApiDoc
///
/// OpenAPI document for the portal's endpoints, served at `/api-docs/openapi.json`.
/// Page envelopes are generic and only described in prose; the data they carry is listed
/// under the schemas.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_session, handlers::login_screen, handlers::login, handlers::logout,
        handlers::dashboard, handlers::list_leads, handlers::get_lead, handlers::create_lead,
        handlers::update_lead, handlers::delete_lead, handlers::list_complaints,
        handlers::create_complaint, handlers::chatbot_screen, handlers::chat,
        handlers::users_screen, handlers::subscription_screen
    ),
    components(
        schemas(
            models::Role, models::Identity, models::LoginRequest, models::Lead, models::LeadStatus,
            models::NewLead, models::LeadUpdate, models::Complaint, models::ComplaintKind,
            models::Priority, models::ComplaintStatus, models::NewComplaint, models::ChatQuery,
            models::ChatReply, models::Activity, models::ActivityKind, models::DashboardStats,
            models::SubscriptionTier, models::TierPlan, models::SessionView, models::LoginScreen,
            models::ChatScreen, models::UsersScreen, navigation::MenuItem, access::Route,
        )
    ),
    tags(
        (name = "crm-portal", description = "CRM Portal API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Everything a request may need: the session context and the loaded configuration.
/// Cloning is cheap; the gateway is shared behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The single session context. Owns the backend client and the session store.
    pub gateway: GatewayState,
    /// Configuration: The loaded, immutable environment configuration.
    pub config: AppConfig,
}

impl AppState {
    pub fn new(gateway: GatewayState, config: AppConfig) -> Self {
        Self { gateway, config }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for GatewayState {
    fn from_ref(app_state: &AppState) -> GatewayState {
        app_state.gateway.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// gate
///
/// The route gate for every screen. Asks `access::decide` what to do with the request
/// path under the current session:
///
/// * `Wait` answers 202 with `{"status":"loading"}` while the session is resolving.
/// * `Redirect` answers 303 to the target route.
/// * `Render` lets the handler run.
async fn gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let session = state.gateway.session();
    match access::decide(&session, request.uri().path()) {
        GateDecision::Render(_) => next.run(request).await,
        GateDecision::Wait => {
            (StatusCode::ACCEPTED, Json(json!({ "status": "loading" }))).into_response()
        }
        GateDecision::Redirect(route) => Redirect::to(route.path()).into_response(),
    }
}

/// create_router
///
/// Assembles the portal's routes, applies the gate to every screen and wraps the whole
/// thing in the observability layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Screens: every one of them passes through the gate.
    let screens = authenticated::authenticated_routes()
        .merge(restricted::restricted_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), gate));

    // 3. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: No gate applied.
        .merge(public::public_routes())
        .merge(screens)
        // The portal root is the dashboard; the gate takes it from there.
        .route(
            "/",
            get(|| async { Redirect::to(access::SAFE_DEFAULT.path()) }),
        )
        .fallback(handlers::fallback)
        .with_state(state);

    // 4. Observability and Correlation Layers (Applied outermost/first)
    base_router
        .layer(
            ServiceBuilder::new()
                // 4a. Request ID Generation: a UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 4b. Request Tracing: one span per request, carrying the request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 4c. Request ID Propagation: echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 5. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, URI and the request ID, so every log line of
/// one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
