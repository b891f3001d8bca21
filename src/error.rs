use crate::access;
use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// PortalError
///
/// Every failure the portal can observe while talking to the session store or the CRM
/// backend. Callers match on the variant; the HTTP layer maps each one to a status code.
#[derive(Debug, Error)]
pub enum PortalError {
    /// The backend could not be reached (DNS, connect, timeout, reset).
    #[error("backend unreachable: {0}")]
    Network(String),

    /// Bad credentials, or a bearer token the backend no longer accepts.
    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    /// Authenticated, but the role may not open this screen. Rendered as a redirect to the
    /// dashboard. Raised by `CurrentUser` when a handler is reached outside the gate.
    #[error("role may not access this route")]
    RoleForbidden,

    /// Form-level input problem caught before any network call.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Any other non-success answer from the backend.
    #[error("backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    /// The backend answered with a body we could not decode.
    #[error("malformed backend response: {0}")]
    Decode(String),

    /// The durable session store failed to read or write.
    #[error("session store failure: {0}")]
    Storage(#[from] std::io::Error),

    /// The session context has been torn down.
    #[error("session context closed")]
    Closed,

    /// A logout or teardown happened while the call was in flight; its result was dropped.
    #[error("session changed while the request was in flight")]
    Superseded,
}

pub type Result<T> = std::result::Result<T, PortalError>;

impl PortalError {
    /// True for errors that mean "the current credential is no good".
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, PortalError::AuthRejected(_))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            PortalError::AuthRejected(_) => StatusCode::UNAUTHORIZED,
            PortalError::RoleForbidden => StatusCode::SEE_OTHER,
            PortalError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            // Client errors (404, 403, 400) pass through; server errors become 502.
            PortalError::Backend { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(StatusCode::is_client_error)
                .unwrap_or(StatusCode::BAD_GATEWAY),
            PortalError::Network(_) | PortalError::Decode(_) => StatusCode::BAD_GATEWAY,
            PortalError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PortalError::Closed => StatusCode::SERVICE_UNAVAILABLE,
            PortalError::Superseded => StatusCode::CONFLICT,
        }
    }
}

impl From<reqwest::Error> for PortalError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            PortalError::Decode(e.to_string())
        } else {
            PortalError::Network(e.to_string())
        }
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if let PortalError::RoleForbidden = self {
            return (status, [(header::LOCATION, access::SAFE_DEFAULT.path())]).into_response();
        }

        match &self {
            PortalError::Storage(_) | PortalError::Decode(_) => {
                tracing::error!(error = %self, "request failed")
            }
            _ => tracing::debug!(error = %self, "request failed"),
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
