use crate::{
    error::{PortalError, Result},
    models::{
        ChatQuery, ChatReply, Complaint, ComplaintStatus, Credential, DashboardStats, Identity,
        Lead, LeadUpdate, LoginRequest, LoginResponse, NewComplaint, NewLead, Role,
    },
};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::sync::Notify;

/// CrmBackend Trait
///
/// The contract for every call the portal makes to the externally owned CRM REST API.
/// Handlers and the auth gateway only ever see this trait, so the reqwest client
/// (`HttpBackend`) can be swapped for the in-memory `MockBackend` in tests.
///
/// Authenticated calls take the credential explicitly; attaching it and interpreting
/// a 401 is the gateway's job, not the caller's.
#[async_trait]
pub trait CrmBackend: Send + Sync {
    // --- Auth ---
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse>;
    async fn me(&self, credential: &Credential) -> Result<Identity>;

    // --- Leads ---
    async fn list_leads(&self, credential: &Credential) -> Result<Vec<Lead>>;
    async fn get_lead(&self, credential: &Credential, id: &str) -> Result<Lead>;
    async fn create_lead(&self, credential: &Credential, lead: &NewLead) -> Result<Lead>;
    async fn update_lead(&self, credential: &Credential, id: &str, update: &LeadUpdate)
    -> Result<Lead>;
    async fn delete_lead(&self, credential: &Credential, id: &str) -> Result<()>;

    // --- Complaints ---
    async fn list_complaints(&self, credential: &Credential) -> Result<Vec<Complaint>>;
    async fn create_complaint(
        &self,
        credential: &Credential,
        complaint: &NewComplaint,
    ) -> Result<Complaint>;

    // --- Assistant & Dashboard ---
    async fn chat(&self, credential: &Credential, query: &ChatQuery) -> Result<ChatReply>;
    async fn dashboard_stats(&self, credential: &Credential) -> Result<DashboardStats>;
}

/// BackendState
///
/// The concrete type used to share backend access across the application.
pub type BackendState = Arc<dyn CrmBackend>;

// --- reqwest implementation ---

/// HttpBackend
///
/// `CrmBackend` over HTTP. Every request is bounded by the configured timeout; every
/// authenticated request carries `Authorization: Bearer <token>`.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, credential: Option<&Credential>) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match credential {
            Some(c) => builder.header(reqwest::header::AUTHORIZATION, c.bearer()),
            None => builder,
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = check(builder.send().await?).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| PortalError::Decode(e.to_string()))
    }

    async fn send_with_body<B, T>(
        &self,
        method: Method,
        path: &str,
        credential: &Credential,
        body: &B,
    ) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(self.request(method, path, Some(credential)).json(body))
            .await
    }
}

/// Maps a non-success response onto the error taxonomy.
///
/// Only 401 means "your token is no good". A 403 is the backend refusing an action to a
/// valid session and must not end that session.
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = error_detail(response).await;
    match status {
        StatusCode::UNAUTHORIZED => Err(PortalError::AuthRejected(message)),
        _ => Err(PortalError::Backend {
            status: status.as_u16(),
            message,
        }),
    }
}

/// Pulls a readable message out of an error body (`{"detail": ...}` is the backend's shape).
async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| {
            if text.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                text
            }
        })
}

#[async_trait]
impl CrmBackend for HttpBackend {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse> {
        self.send_json(self.request(Method::POST, "/auth/login", None).json(request))
            .await
    }

    async fn me(&self, credential: &Credential) -> Result<Identity> {
        self.send_json(self.request(Method::GET, "/auth/me", Some(credential)))
            .await
    }

    async fn list_leads(&self, credential: &Credential) -> Result<Vec<Lead>> {
        self.send_json(self.request(Method::GET, "/leads", Some(credential)))
            .await
    }

    async fn get_lead(&self, credential: &Credential, id: &str) -> Result<Lead> {
        self.send_json(self.request(Method::GET, &format!("/leads/{id}"), Some(credential)))
            .await
    }

    async fn create_lead(&self, credential: &Credential, lead: &NewLead) -> Result<Lead> {
        self.send_with_body(Method::POST, "/leads", credential, lead)
            .await
    }

    async fn update_lead(
        &self,
        credential: &Credential,
        id: &str,
        update: &LeadUpdate,
    ) -> Result<Lead> {
        self.send_with_body(Method::PUT, &format!("/leads/{id}"), credential, update)
            .await
    }

    async fn delete_lead(&self, credential: &Credential, id: &str) -> Result<()> {
        let builder = self.request(Method::DELETE, &format!("/leads/{id}"), Some(credential));
        check(builder.send().await?).await?;
        Ok(())
    }

    async fn list_complaints(&self, credential: &Credential) -> Result<Vec<Complaint>> {
        self.send_json(self.request(Method::GET, "/complaints", Some(credential)))
            .await
    }

    async fn create_complaint(
        &self,
        credential: &Credential,
        complaint: &NewComplaint,
    ) -> Result<Complaint> {
        self.send_with_body(Method::POST, "/complaints", credential, complaint)
            .await
    }

    async fn chat(&self, credential: &Credential, query: &ChatQuery) -> Result<ChatReply> {
        self.send_with_body(Method::POST, "/chatbot/query", credential, query)
            .await
    }

    async fn dashboard_stats(&self, credential: &Credential) -> Result<DashboardStats> {
        self.send_json(self.request(Method::GET, "/dashboard/stats", Some(credential)))
            .await
    }
}

// --- In-memory implementation ---

struct MockAccount {
    password: String,
    identity: Identity,
}

/// MockBackend
///
/// An in-memory `CrmBackend` used by the test suites and for offline demos. It ships with
/// the demo account `admin@crm.com` / `demo123` (role `system_admin`), issues
/// deterministic tokens (`mock-token-<id>`), and counts every call so tests can assert
/// that no network round-trip happened.
pub struct MockBackend {
    accounts: Mutex<HashMap<String, MockAccount>>,
    tokens: Mutex<HashMap<String, Identity>>,
    leads: Mutex<Vec<Lead>>,
    complaints: Mutex<Vec<Complaint>>,
    stats: Mutex<Option<DashboardStats>>,
    offline: AtomicBool,
    login_gate: Mutex<Option<Arc<Notify>>>,
    me_gate: Mutex<Option<Arc<Notify>>>,
    calls: AtomicUsize,
    me_calls: AtomicUsize,
    login_calls: AtomicUsize,
    next_id: AtomicUsize,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        let mock = Self {
            accounts: Mutex::new(HashMap::new()),
            tokens: Mutex::new(HashMap::new()),
            leads: Mutex::new(Vec::new()),
            complaints: Mutex::new(Vec::new()),
            stats: Mutex::new(Some(DashboardStats::default())),
            offline: AtomicBool::new(false),
            login_gate: Mutex::new(None),
            me_gate: Mutex::new(None),
            calls: AtomicUsize::new(0),
            me_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            next_id: AtomicUsize::new(1000),
        };
        mock.add_account(
            "demo123",
            Identity {
                id: "1".to_string(),
                email: "admin@crm.com".to_string(),
                first_name: "Demo".to_string(),
                last_name: "Admin".to_string(),
                role: Role::SystemAdmin,
                organization_id: None,
                is_active: true,
            },
        );
        mock
    }

    /// Registers an account that can log in with `password`. Returns the token it will
    /// be issued, which is also accepted by `/auth/me` straight away.
    pub fn add_account(&self, password: &str, identity: Identity) -> Credential {
        let token = Self::token_for(&identity);
        lock(&self.tokens).insert(token.as_str().to_string(), identity.clone());
        lock(&self.accounts).insert(
            identity.email.clone(),
            MockAccount {
                password: password.to_string(),
                identity,
            },
        );
        token
    }

    /// Shorthand for an active account with the given role and email.
    pub fn add_user(&self, email: &str, password: &str, role: Role) -> Credential {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        self.add_account(
            password,
            Identity {
                id,
                email: email.to_string(),
                first_name: String::new(),
                last_name: String::new(),
                role,
                organization_id: Some("org-1".to_string()),
                is_active: true,
            },
        )
    }

    pub fn token_for(identity: &Identity) -> Credential {
        Credential::new(format!("mock-token-{}", identity.id))
    }

    /// Makes the backend stop accepting `credential`, as if it expired server-side.
    pub fn revoke(&self, credential: &Credential) {
        lock(&self.tokens).remove(credential.as_str());
    }

    /// While offline every call fails with `PortalError::Network`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Makes `/dashboard/stats` fail with a 500.
    pub fn fail_stats(&self) {
        *lock(&self.stats) = None;
    }

    pub fn set_stats(&self, stats: DashboardStats) {
        *lock(&self.stats) = Some(stats);
    }

    pub fn seed_leads(&self, leads: Vec<Lead>) {
        *lock(&self.leads) = leads;
    }

    pub fn seed_complaints(&self, complaints: Vec<Complaint>) {
        *lock(&self.complaints) = complaints;
    }

    /// Holds every subsequent login until the returned handle is notified.
    pub fn hold_logins(&self) -> Arc<Notify> {
        hold(&self.login_gate)
    }

    /// Holds every subsequent `/auth/me` until the returned handle is notified.
    pub fn hold_me(&self) -> Arc<Notify> {
        hold(&self.me_gate)
    }

    /// Total number of backend calls of any kind.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn me_calls(&self) -> usize {
        self.me_calls.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(PortalError::Network("connection refused".to_string()));
        }
        Ok(())
    }

    fn authorize(&self, credential: &Credential) -> Result<Identity> {
        self.enter()?;
        lock(&self.tokens)
            .get(credential.as_str())
            .cloned()
            .ok_or_else(|| PortalError::AuthRejected("Invalid token".to_string()))
    }

    fn fresh_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::SeqCst).to_string()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn hold(slot: &Mutex<Option<Arc<Notify>>>) -> Arc<Notify> {
    let gate = Arc::new(Notify::new());
    *lock(slot) = Some(gate.clone());
    gate
}

async fn wait_for_release(slot: &Mutex<Option<Arc<Notify>>>) {
    let gate = lock(slot).clone();
    if let Some(gate) = gate {
        gate.notified().await;
    }
}

fn not_found(what: &str) -> PortalError {
    PortalError::Backend {
        status: 404,
        message: format!("{what} not found"),
    }
}

#[async_trait]
impl CrmBackend for MockBackend {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.enter()?;

        wait_for_release(&self.login_gate).await;

        let accounts = lock(&self.accounts);
        match accounts.get(&request.email) {
            Some(account) if account.password == request.password => Ok(LoginResponse {
                access_token: Self::token_for(&account.identity),
                token_type: Some("bearer".to_string()),
                user: account.identity.clone(),
            }),
            _ => Err(PortalError::AuthRejected("Invalid credentials".to_string())),
        }
    }

    async fn me(&self, credential: &Credential) -> Result<Identity> {
        self.me_calls.fetch_add(1, Ordering::SeqCst);
        wait_for_release(&self.me_gate).await;
        self.authorize(credential)
    }

    async fn list_leads(&self, credential: &Credential) -> Result<Vec<Lead>> {
        self.authorize(credential)?;
        Ok(lock(&self.leads).clone())
    }

    async fn get_lead(&self, credential: &Credential, id: &str) -> Result<Lead> {
        self.authorize(credential)?;
        lock(&self.leads)
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .ok_or_else(|| not_found("lead"))
    }

    async fn create_lead(&self, credential: &Credential, lead: &NewLead) -> Result<Lead> {
        let owner = self.authorize(credential)?;
        let created = Lead {
            id: self.fresh_id(),
            first_name: lead.first_name.clone(),
            last_name: lead.last_name.clone(),
            email: lead.email.clone(),
            phone: lead.phone.clone(),
            company: lead.company.clone(),
            status: lead.status,
            score: lead.score,
            assigned_to: Some(owner.id),
            source: lead.source.clone(),
            value: lead.value,
            notes: lead.notes.clone(),
            organization_id: owner.organization_id,
            created_at: None,
            updated_at: None,
        };
        lock(&self.leads).push(created.clone());
        Ok(created)
    }

    async fn update_lead(
        &self,
        credential: &Credential,
        id: &str,
        update: &LeadUpdate,
    ) -> Result<Lead> {
        self.authorize(credential)?;
        let mut leads = lock(&self.leads);
        let lead = leads
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| not_found("lead"))?;

        if let Some(v) = &update.first_name {
            lead.first_name = v.clone();
        }
        if let Some(v) = &update.last_name {
            lead.last_name = v.clone();
        }
        if let Some(v) = &update.email {
            lead.email = v.clone();
        }
        if let Some(v) = &update.phone {
            lead.phone = Some(v.clone());
        }
        if let Some(v) = &update.company {
            lead.company = Some(v.clone());
        }
        if let Some(v) = update.status {
            lead.status = v;
        }
        if let Some(v) = update.score {
            lead.score = v;
        }
        if let Some(v) = &update.notes {
            lead.notes = Some(v.clone());
        }
        Ok(lead.clone())
    }

    async fn delete_lead(&self, credential: &Credential, id: &str) -> Result<()> {
        self.authorize(credential)?;
        let mut leads = lock(&self.leads);
        let before = leads.len();
        leads.retain(|l| l.id != id);
        if leads.len() == before {
            return Err(not_found("lead"));
        }
        Ok(())
    }

    async fn list_complaints(&self, credential: &Credential) -> Result<Vec<Complaint>> {
        self.authorize(credential)?;
        Ok(lock(&self.complaints).clone())
    }

    async fn create_complaint(
        &self,
        credential: &Credential,
        complaint: &NewComplaint,
    ) -> Result<Complaint> {
        let owner = self.authorize(credential)?;
        let created = Complaint {
            id: self.fresh_id(),
            title: complaint.title.clone(),
            description: complaint.description.clone(),
            kind: complaint.kind,
            priority: complaint.priority,
            status: complaint.status.unwrap_or(ComplaintStatus::Open),
            customer_id: Some(owner.id),
            assigned_to: None,
            organization_id: owner.organization_id,
            created_at: None,
            updated_at: None,
        };
        lock(&self.complaints).push(created.clone());
        Ok(created)
    }

    async fn chat(&self, credential: &Credential, query: &ChatQuery) -> Result<ChatReply> {
        self.authorize(credential)?;
        Ok(ChatReply {
            response: format!("You asked: {}", query.message),
        })
    }

    async fn dashboard_stats(&self, credential: &Credential) -> Result<DashboardStats> {
        self.authorize(credential)?;
        lock(&self.stats).clone().ok_or(PortalError::Backend {
            status: 500,
            message: "stats unavailable".to_string(),
        })
    }
}
