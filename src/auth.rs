use crate::{
    access::{self, Route},
    backend::BackendState,
    error::{PortalError, Result},
    models::{Credential, Identity, LoginRequest, Role},
    storage::SessionStoreState,
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Utc};
use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};
use tokio::sync::{Mutex, watch};
use uuid::Uuid;

/// Session
///
/// The derived authentication state of the portal. Never persisted: it is rebuilt from
/// the stored credential by `AuthGateway::bootstrap` on every start.
///
/// `Unknown` and `Loading` both mean "resolving"; the gate shows a placeholder for them.
#[derive(Debug, Clone, PartialEq)]
pub enum Session {
    /// Before bootstrap has finished.
    Unknown,
    /// A login call is in flight.
    Loading,
    Authenticated {
        identity: Arc<Identity>,
        since: DateTime<Utc>,
    },
    Anonymous,
}

impl Session {
    pub fn is_loading(&self) -> bool {
        matches!(self, Session::Unknown | Session::Loading)
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Session::Authenticated { identity, .. } => Some(identity),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.identity().map(|i| i.role)
    }

    pub fn status(&self) -> &'static str {
        match self {
            Session::Unknown | Session::Loading => "loading",
            Session::Authenticated { .. } => "authenticated",
            Session::Anonymous => "anonymous",
        }
    }

    fn authenticated(identity: Arc<Identity>) -> Self {
        Session::Authenticated {
            identity,
            since: Utc::now(),
        }
    }
}

/// AuthGateway
///
/// The explicitly owned session context. It is the only component allowed to move the
/// `Session` between states, and the only one that writes the session store.
///
/// * `bootstrap` and `login` are serialized by an in-flight guard.
/// * Every transition (state + store side effect) is applied inside the watch channel's
///   write lock, so subscribers never observe a half-applied session.
/// * Each operation records the session epoch when it starts. `logout`, an
///   authentication rejection and `teardown` advance the epoch; a result that comes back
///   under an older epoch is dropped instead of applied.
pub struct AuthGateway {
    id: Uuid,
    store: SessionStoreState,
    backend: BackendState,
    state: watch::Sender<Session>,
    in_flight: Mutex<()>,
    epoch: AtomicU64,
    closed: AtomicBool,
}

/// GatewayState
///
/// The concrete type used to share the session context across the application.
pub type GatewayState = Arc<AuthGateway>;

impl AuthGateway {
    pub fn new(store: SessionStoreState, backend: BackendState) -> Self {
        let (state, _) = watch::channel(Session::Unknown);
        Self {
            id: Uuid::new_v4(),
            store,
            backend,
            state,
            in_flight: Mutex::new(()),
            epoch: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Identifier of this session context, attached to every log line it emits.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Change feed of the session; each value is a complete session.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn backend(&self) -> &BackendState {
        &self.backend
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn open_epoch(&self) -> Result<u64> {
        if self.is_closed() {
            return Err(PortalError::Closed);
        }
        Ok(self.epoch.load(Ordering::SeqCst))
    }

    /// Applies `apply` under the state lock if the context is still open and still on
    /// `epoch`. Returns `None` when the result was discarded.
    fn commit<T>(&self, epoch: u64, apply: impl FnOnce(&mut Session) -> T) -> Option<T> {
        let mut out = None;
        self.state.send_if_modified(|session| {
            if self.is_closed() || self.epoch.load(Ordering::SeqCst) != epoch {
                return false;
            }
            out = Some(apply(session));
            true
        });
        if out.is_none() {
            tracing::debug!(context = %self.id, epoch, "discarding stale session update");
        }
        out
    }

    /// Clears the credential and ends the session, advancing the epoch.
    fn invalidate(&self, session: &mut Session) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.store.clear() {
            tracing::warn!(context = %self.id, error = %e, "failed to clear stored credential");
        }
        *session = Session::Anonymous;
    }

    /// bootstrap
    ///
    /// Resolves the session at start-up. No stored credential: anonymous, no network
    /// call. Otherwise the credential is checked against `/auth/me`; any failure, network
    /// included, clears it and leaves the session anonymous. There is no retry.
    pub async fn bootstrap(&self) -> Result<Session> {
        let _guard = self.in_flight.lock().await;
        let epoch = self.open_epoch()?;

        let stored = self.store.load().unwrap_or_else(|e| {
            tracing::warn!(context = %self.id, error = %e, "session store unreadable; starting anonymous");
            None
        });

        let Some(credential) = stored else {
            tracing::debug!(context = %self.id, "no stored credential");
            self.commit(epoch, |s| *s = Session::Anonymous);
            return Ok(self.session());
        };

        match self.backend.me(&credential).await {
            Ok(identity) => {
                tracing::info!(context = %self.id, user = %identity.email, role = %identity.role, "session restored");
                self.commit(epoch, |s| *s = Session::authenticated(Arc::new(identity)));
            }
            Err(e) => {
                tracing::warn!(context = %self.id, error = %e, "stored credential not accepted; starting anonymous");
                self.commit(epoch, |s| self.invalidate(s));
            }
        }

        Ok(self.session())
    }

    /// login
    ///
    /// Exchanges email and password for a credential and identity. The session reads
    /// `Loading` while the call is in flight. On success the credential is persisted and
    /// the identity published together. On any failure, input validation included, the
    /// session ends anonymous and the error is returned unchanged. A login abandoned
    /// mid-flight (its future dropped) also ends anonymous.
    pub async fn login(&self, email: &str, password: &str) -> Result<Arc<Identity>> {
        let email = email.trim();

        let _guard = self.in_flight.lock().await;
        let epoch = self.open_epoch()?;

        if let Err(e) = validate_login(email, password) {
            self.commit(epoch, |s| self.invalidate(s));
            return Err(e);
        }

        self.commit(epoch, |s| *s = Session::Loading)
            .ok_or(PortalError::Closed)?;
        let pending = PendingLogin {
            gateway: self,
            epoch,
            armed: true,
        };

        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        let outcome = self.backend.login(&request).await;
        pending.settle();

        match outcome {
            Ok(response) => {
                let identity = Arc::new(response.user);
                let applied = self.commit(epoch, |s| {
                    match self.store.save(&response.access_token) {
                        Ok(()) => {
                            *s = Session::authenticated(identity.clone());
                            Ok(())
                        }
                        Err(e) => {
                            *s = Session::Anonymous;
                            Err(e)
                        }
                    }
                });

                match applied {
                    Some(Ok(())) => {
                        tracing::info!(context = %self.id, user = %identity.email, role = %identity.role, "logged in");
                        Ok(identity)
                    }
                    Some(Err(e)) => Err(e),
                    None => Err(PortalError::Superseded),
                }
            }
            Err(e) => {
                tracing::info!(context = %self.id, user = %email, error = %e, "login failed");
                self.commit(epoch, |s| self.invalidate(s));
                Err(e)
            }
        }
    }

    /// logout
    ///
    /// Purely local: forgets the credential and identity immediately. The token is not
    /// revoked server-side. Any login or bootstrap still in flight will be discarded.
    pub fn logout(&self) {
        self.state.send_modify(|s| self.invalidate(s));
        tracing::info!(context = %self.id, "logged out");
    }

    /// teardown
    ///
    /// Ends the context's lifetime. In-flight results are dropped and no further
    /// transitions are applied. The stored credential is kept for the next start.
    pub fn teardown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(context = %self.id, "session context torn down");
    }

    /// authorized
    ///
    /// The single interception point for authenticated backend calls. Supplies the
    /// stored credential to `call`; if the backend answers 401 the session is ended
    /// through the same path as `logout` before the error is returned.
    pub async fn authorized<T, F, Fut>(&self, call: F) -> Result<T>
    where
        F: FnOnce(BackendState, Credential) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let epoch = self.open_epoch()?;
        if self.session().identity().is_none() {
            return Err(PortalError::AuthRejected("not logged in".to_string()));
        }

        let Some(credential) = self.store.load()? else {
            self.commit(epoch, |s| self.invalidate(s));
            return Err(PortalError::AuthRejected("credential missing".to_string()));
        };

        match call(self.backend.clone(), credential).await {
            Err(e) if e.is_auth_rejection() => {
                tracing::warn!(context = %self.id, error = %e, "backend rejected credential; ending session");
                self.commit(epoch, |s| self.invalidate(s));
                Err(e)
            }
            other => other,
        }
    }
}

fn validate_login(email: &str, password: &str) -> Result<()> {
    if email.is_empty() || !email.contains('@') {
        return Err(PortalError::Validation("a valid email is required".to_string()));
    }
    if password.is_empty() {
        return Err(PortalError::Validation("password is required".to_string()));
    }
    Ok(())
}

/// Armed while a login call is awaited with `Loading` published. If the login future is
/// dropped before `settle`, the session is ended under the login's epoch.
struct PendingLogin<'a> {
    gateway: &'a AuthGateway,
    epoch: u64,
    armed: bool,
}

impl PendingLogin<'_> {
    fn settle(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingLogin<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let gateway = self.gateway;
        tracing::debug!(context = %gateway.id, "login abandoned while in flight");
        gateway.commit(self.epoch, |s| gateway.invalidate(s));
    }
}

/// CurrentUser Extractor Result
///
/// The identity behind a request that has passed the gate. Handlers take it as an
/// argument. Without a session the request is redirected to `/login`; a role the route
/// table does not admit for the request path is refused with `PortalError::RoleForbidden`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Arc<Identity>);

impl CurrentUser {
    pub fn role(&self) -> Role {
        self.0.role
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    GatewayState: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let gateway = GatewayState::from_ref(state);
        let Session::Authenticated { identity, .. } = gateway.session() else {
            return Err(Redirect::to(Route::Login.path()).into_response());
        };

        if let Some(entry) = access::resolve(parts.uri.path()) {
            if !entry.permits(identity.role) {
                tracing::debug!(role = %identity.role, route = ?entry.route, "handler refused role");
                return Err(PortalError::RoleForbidden.into_response());
            }
        }

        Ok(CurrentUser(identity))
    }
}
