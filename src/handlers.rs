use crate::{
    AppState,
    access::{self, Route},
    auth::{CurrentUser, Session},
    error::{PortalError, Result},
    filters::ListFilter,
    models::{
        ChatQuery, ChatReply, ChatScreen, Complaint, ComplaintStatus, DashboardStats, Identity,
        Lead, LeadUpdate, LoginRequest, LoginScreen, NewComplaint, NewLead, Page, Role,
        SessionView, TierPlan, UsersScreen,
    },
    navigation::menu_for,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
};
use std::sync::Arc;

/// Shown by the assistant when the backend fails for any reason other than an expired
/// session.
pub const CHAT_FALLBACK: &str =
    "I'm sorry, I'm having trouble responding right now. Please try again later.";

/// Wraps screen data in the page envelope for `role`.
fn page<T>(route: Route, role: Role, data: T) -> Page<T> {
    Page {
        route,
        title: route.entry().title.to_string(),
        portal_title: role.display_name().to_string(),
        menu: menu_for(role),
        data,
    }
}

fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PortalError::Validation(format!("{field} is required")));
    }
    Ok(())
}

// --- Session & Login ---

/// get_session
///
/// [Public Route] Current session status, identity and sidebar. Never redirects, so the
/// browser shell can poll it while bootstrap is still running.
#[utoipa::path(
    get,
    path = "/session",
    responses((status = 200, description = "Session snapshot", body = SessionView))
)]
pub async fn get_session(State(state): State<AppState>) -> Json<SessionView> {
    let session = state.gateway.session();
    let (identity, since) = match &session {
        Session::Authenticated { identity, since } => (Some(identity.as_ref().clone()), Some(*since)),
        _ => (None, None),
    };

    Json(SessionView {
        context_id: state.gateway.id(),
        status: session.status().to_string(),
        display_name: identity.as_ref().map(Identity::display_name),
        initials: identity.as_ref().map(Identity::initials),
        menu: session.role().map(menu_for).unwrap_or_default(),
        identity,
        authenticated_at: since,
    })
}

/// login_screen
///
/// [Anonymous Route] The sign-in form. An authenticated user is sent to the dashboard
/// by the gate before this runs.
#[utoipa::path(
    get,
    path = "/login",
    responses(
        (status = 200, description = "Login screen"),
        (status = 303, description = "Already signed in")
    )
)]
pub async fn login_screen() -> Json<Page<LoginScreen>> {
    Json(Page {
        route: Route::Login,
        title: Route::Login.entry().title.to_string(),
        portal_title: String::new(),
        menu: vec![],
        data: LoginScreen {
            fields: vec!["email".to_string(), "password".to_string()],
        },
    })
}

/// login
///
/// [Anonymous Route] Signs in through the auth gateway. Backend rejections are returned to
/// the caller as-is (401 with the backend's message).
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in; dashboard page for the new identity"),
        (status = 401, description = "Invalid credentials"),
        (status = 422, description = "Missing email or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Page<Identity>>> {
    let identity = state.gateway.login(&payload.email, &payload.password).await?;
    let role = identity.role;
    Ok(Json(page(
        access::SAFE_DEFAULT,
        role,
        Arc::unwrap_or_clone(identity),
    )))
}

/// logout
///
/// [Public Route] Ends the session locally and sends the browser to the login screen.
/// The token is not revoked server-side.
#[utoipa::path(
    post,
    path = "/logout",
    responses((status = 303, description = "Signed out"))
)]
pub async fn logout(State(state): State<AppState>) -> Redirect {
    state.gateway.logout();
    Redirect::to(Route::Login.path())
}

// --- Dashboard ---

/// dashboard
///
/// [Authenticated Route] Headline numbers. If the stats call fails for any reason other
/// than an expired session, zeroed stats are shown instead of an error.
#[utoipa::path(
    get,
    path = "/dashboard",
    responses((status = 200, description = "Dashboard page"))
)]
pub async fn dashboard(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Page<DashboardStats>>> {
    let stats = match state
        .gateway
        .authorized(|api, cred| async move { api.dashboard_stats(&cred).await })
        .await
    {
        Ok(stats) => stats,
        Err(e @ PortalError::AuthRejected(_)) => return Err(e),
        Err(e) => {
            tracing::warn!(error = %e, "dashboard stats unavailable; showing zeroes");
            DashboardStats::default()
        }
    };
    Ok(Json(page(Route::Dashboard, user.role(), stats)))
}

// --- Leads ---

/// list_leads
///
/// [Staff Route] All leads visible to the user, filtered locally by `search` and `status`.
#[utoipa::path(
    get,
    path = "/leads",
    params(ListFilter),
    responses((status = 200, description = "Leads page"))
)]
pub async fn list_leads(
    user: CurrentUser,
    State(state): State<AppState>,
    Query(filter): Query<ListFilter>,
) -> Result<Json<Page<Vec<Lead>>>> {
    let leads = state
        .gateway
        .authorized(|api, cred| async move { api.list_leads(&cred).await })
        .await?;
    Ok(Json(page(Route::Leads, user.role(), filter.leads(leads))))
}

/// get_lead
///
/// [Staff Route] One lead by id.
#[utoipa::path(
    get,
    path = "/leads/{id}",
    params(("id" = String, Path, description = "Lead ID")),
    responses(
        (status = 200, description = "Lead page"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_lead(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Page<Lead>>> {
    let lead = state
        .gateway
        .authorized(|api, cred| async move { api.get_lead(&cred, &id).await })
        .await?;
    Ok(Json(page(Route::Leads, user.role(), lead)))
}

/// create_lead
///
/// [Staff Route] Adds a lead. Names and email are required.
#[utoipa::path(
    post,
    path = "/leads",
    request_body = NewLead,
    responses(
        (status = 201, description = "Created", body = Lead),
        (status = 422, description = "Invalid lead")
    )
)]
pub async fn create_lead(
    _user: CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<NewLead>,
) -> Result<impl IntoResponse> {
    require(&payload.first_name, "first name")?;
    require(&payload.last_name, "last name")?;
    require(&payload.email, "email")?;

    let lead = state
        .gateway
        .authorized(|api, cred| async move { api.create_lead(&cred, &payload).await })
        .await?;
    Ok((StatusCode::CREATED, Json(lead)))
}

/// update_lead
///
/// [Staff Route] Partial update; only provided fields are forwarded.
#[utoipa::path(
    put,
    path = "/leads/{id}",
    params(("id" = String, Path, description = "Lead ID")),
    request_body = LeadUpdate,
    responses((status = 200, description = "Updated", body = Lead))
)]
pub async fn update_lead(
    _user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<LeadUpdate>,
) -> Result<Json<Lead>> {
    let lead = state
        .gateway
        .authorized(|api, cred| async move { api.update_lead(&cred, &id, &payload).await })
        .await?;
    Ok(Json(lead))
}

/// delete_lead
///
/// [Staff Route] Removes a lead.
#[utoipa::path(
    delete,
    path = "/leads/{id}",
    params(("id" = String, Path, description = "Lead ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_lead(
    _user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state
        .gateway
        .authorized(|api, cred| async move { api.delete_lead(&cred, &id).await })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Complaints ---

/// list_complaints
///
/// [Authenticated Route] Complaints visible to the user, filtered locally.
#[utoipa::path(
    get,
    path = "/complaints",
    params(ListFilter),
    responses((status = 200, description = "Complaints page"))
)]
pub async fn list_complaints(
    user: CurrentUser,
    State(state): State<AppState>,
    Query(filter): Query<ListFilter>,
) -> Result<Json<Page<Vec<Complaint>>>> {
    let complaints = state
        .gateway
        .authorized(|api, cred| async move { api.list_complaints(&cred).await })
        .await?;
    Ok(Json(page(
        Route::Complaints,
        user.role(),
        filter.complaints(complaints),
    )))
}

/// create_complaint
///
/// [Authenticated Route] Files a complaint. New complaints always start `open`,
/// whatever status the caller sent.
#[utoipa::path(
    post,
    path = "/complaints",
    request_body = NewComplaint,
    responses(
        (status = 201, description = "Created", body = Complaint),
        (status = 422, description = "Invalid complaint")
    )
)]
pub async fn create_complaint(
    _user: CurrentUser,
    State(state): State<AppState>,
    Json(mut payload): Json<NewComplaint>,
) -> Result<impl IntoResponse> {
    require(&payload.title, "title")?;
    require(&payload.description, "description")?;
    payload.status = Some(ComplaintStatus::Open);

    let complaint = state
        .gateway
        .authorized(|api, cred| async move { api.create_complaint(&cred, &payload).await })
        .await?;
    Ok((StatusCode::CREATED, Json(complaint)))
}

// --- Assistant ---

/// chatbot_screen
///
/// [Authenticated Route] The assistant screen with its role-specific greeting.
#[utoipa::path(
    get,
    path = "/chatbot",
    responses((status = 200, description = "Chat page"))
)]
pub async fn chatbot_screen(user: CurrentUser) -> Json<Page<ChatScreen>> {
    let greeting = match user.role() {
        Role::Customer => "Hello! I'm your AI support assistant. How can I help you today?",
        _ => {
            "Hello! I'm your AI assistant. I can help you with leads, complaints, and customer insights."
        }
    };
    Json(page(
        Route::Chatbot,
        user.role(),
        ChatScreen {
            greeting: greeting.to_string(),
        },
    ))
}

/// chat
///
/// [Authenticated Route] Forwards one message to the assistant. Backend failures other
/// than an expired session produce an apology reply rather than an error.
#[utoipa::path(
    post,
    path = "/chatbot",
    request_body = ChatQuery,
    responses((status = 200, description = "Assistant reply", body = ChatReply))
)]
pub async fn chat(
    _user: CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<ChatQuery>,
) -> Result<Json<ChatReply>> {
    require(&payload.message, "message")?;

    match state
        .gateway
        .authorized(|api, cred| async move { api.chat(&cred, &payload).await })
        .await
    {
        Ok(reply) => Ok(Json(reply)),
        Err(e @ PortalError::AuthRejected(_)) => Err(e),
        Err(e) => {
            tracing::warn!(error = %e, "assistant unavailable");
            Ok(Json(ChatReply {
                response: CHAT_FALLBACK.to_string(),
            }))
        }
    }
}

// --- Admin Screens ---

/// users_screen
///
/// [Admin Route] User management. Lists which roles the current user may invite.
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "Users page"),
        (status = 303, description = "Role not permitted")
    )
)]
pub async fn users_screen(user: CurrentUser) -> Json<Page<UsersScreen>> {
    Json(page(
        Route::Users,
        user.role(),
        UsersScreen {
            invitable_roles: access::invitable_roles(user.role()),
        },
    ))
}

/// subscription_screen
///
/// [Admin Route] The plan catalogue. Billing is handled elsewhere.
#[utoipa::path(
    get,
    path = "/subscription",
    responses(
        (status = 200, description = "Subscription page"),
        (status = 303, description = "Role not permitted")
    )
)]
pub async fn subscription_screen(user: CurrentUser) -> Json<Page<Vec<TierPlan>>> {
    Json(page(Route::Subscription, user.role(), TierPlan::catalogue()))
}

/// fallback
///
/// Unknown paths land on the dashboard (which itself sends anonymous users to login).
pub async fn fallback() -> Redirect {
    Redirect::to(access::SAFE_DEFAULT.path())
}
