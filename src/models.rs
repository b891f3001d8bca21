use crate::{access::Route, navigation::MenuItem};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Identity & Credential ---

/// Role
///
/// The four tenant roles known to the CRM backend. Serialized exactly as the backend
/// emits them (`system_admin`, `org_admin`, ...), which is also the form used in the
/// role→route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Role {
    SystemAdmin,
    OrgAdmin,
    Employee,
    Customer,
}

impl Role {
    /// Every role, in descending order of privilege.
    pub const ALL: [Role; 4] = [
        Role::SystemAdmin,
        Role::OrgAdmin,
        Role::Employee,
        Role::Customer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SystemAdmin => "system_admin",
            Role::OrgAdmin => "org_admin",
            Role::Employee => "employee",
            Role::Customer => "customer",
        }
    }

    /// Human-readable portal title shown next to the product name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::SystemAdmin => "System Admin",
            Role::OrgAdmin => "Organization Admin",
            Role::Employee => "Employee",
            Role::Customer => "Customer Portal",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity
///
/// The typed user identity resolved from the backend's `/auth/login` or `/auth/me`.
/// Immutable for the lifetime of a session; a re-login replaces it wholesale.
///
/// The backend is inconsistent about naming (`organizationId` on login, `organization_id`
/// on `/me`) and id types (string on login, integer on `/me`), so both spellings are
/// accepted and ids are normalised to opaque strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Identity {
    #[serde(deserialize_with = "opaque_id")]
    pub id: String,
    pub email: String,
    #[serde(default, alias = "first_name")]
    pub first_name: String,
    #[serde(default, alias = "last_name")]
    pub last_name: String,
    pub role: Role,
    #[serde(default, alias = "organization_id", deserialize_with = "opaque_id_opt")]
    pub organization_id: Option<String>,
    #[serde(default = "default_active", alias = "is_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Identity {
    /// Display name, falling back to the email when the backend sent no names.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }

    /// Avatar initials, e.g. "AD" for "Ada Doe".
    pub fn initials(&self) -> String {
        self.first_name
            .chars()
            .take(1)
            .chain(self.last_name.chars().take(1))
            .collect::<String>()
            .to_uppercase()
    }
}

/// Credential
///
/// An opaque bearer token. It is never parsed, validated or logged locally: the backend
/// is the only authority on whether it is still good.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Accepts a JSON string or integer and yields it as a string.
fn opaque_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Int(n) => n.to_string(),
    })
}

fn opaque_id_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
    }

    Ok(
        Option::<RawId>::deserialize(deserializer)?.map(|raw| match raw {
            RawId::Text(s) => s,
            RawId::Int(n) => n.to_string(),
        }),
    )
}

// --- Auth Payloads ---

/// LoginRequest
///
/// Body for `POST /auth/login` on the backend, and for `POST /login` on the portal.
#[derive(Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    #[schema(example = "admin@crm.com")]
    pub email: String,
    #[schema(example = "demo123")]
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// LoginResponse
///
/// Backend answer to a successful login.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: Credential,
    #[serde(default)]
    pub token_type: Option<String>,
    pub user: Identity,
}

// --- Leads ---

/// LeadStatus
///
/// Sales pipeline stage of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Proposal,
    Won,
    Lost,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Proposal => "proposal",
            LeadStatus::Won => "won",
            LeadStatus::Lost => "lost",
        }
    }
}

/// Lead
///
/// A prospective customer record as returned by `GET /leads`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Lead {
    #[serde(deserialize_with = "opaque_id")]
    pub id: String,
    #[serde(default, alias = "first_name")]
    pub first_name: String,
    #[serde(default, alias = "last_name")]
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    pub status: LeadStatus,
    #[serde(default)]
    pub score: i32,
    #[serde(
        default,
        alias = "assigned_to",
        alias = "assigned_to_id",
        deserialize_with = "opaque_id_opt"
    )]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, alias = "organization_id", deserialize_with = "opaque_id_opt")]
    pub organization_id: Option<String>,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<String>,
    #[serde(default, alias = "updated_at")]
    pub updated_at: Option<String>,
}

/// NewLead
///
/// Input payload for creating a lead (`POST /leads`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewLead {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub status: LeadStatus,
    #[serde(default)]
    pub score: i32,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// LeadUpdate
///
/// Partial update payload (`PUT /leads/{id}`). Only provided fields are sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LeadUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LeadStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// --- Complaints ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ComplaintKind {
    Product,
    Service,
    Billing,
    Technical,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ComplaintStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl ComplaintStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplaintStatus::Open => "open",
            ComplaintStatus::InProgress => "in_progress",
            ComplaintStatus::Resolved => "resolved",
            ComplaintStatus::Closed => "closed",
        }
    }
}

/// Complaint
///
/// A customer complaint ticket as returned by `GET /complaints`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Complaint {
    #[serde(deserialize_with = "opaque_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    // `type` is a keyword; kept as "type" on the wire.
    #[serde(rename = "type")]
    pub kind: ComplaintKind,
    pub priority: Priority,
    pub status: ComplaintStatus,
    #[serde(default, alias = "customer_id", deserialize_with = "opaque_id_opt")]
    pub customer_id: Option<String>,
    #[serde(
        default,
        alias = "assigned_to",
        alias = "assigned_to_id",
        deserialize_with = "opaque_id_opt"
    )]
    pub assigned_to: Option<String>,
    #[serde(default, alias = "organization_id", deserialize_with = "opaque_id_opt")]
    pub organization_id: Option<String>,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<String>,
    #[serde(default, alias = "updated_at")]
    pub updated_at: Option<String>,
}

/// NewComplaint
///
/// Input payload for filing a complaint. The status is always `open` on creation and is
/// set by the portal, not the caller.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewComplaint {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: ComplaintKind,
    pub priority: Priority,
    #[serde(default)]
    pub status: Option<ComplaintStatus>,
}

// --- Chatbot ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ChatQuery {
    #[schema(example = "How many open complaints do I have?")]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ChatReply {
    pub response: String,
}

// --- Dashboard ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ActivityKind {
    Lead,
    Complaint,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Activity {
    #[serde(deserialize_with = "opaque_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub action: String,
    pub description: String,
    pub timestamp: String,
}

/// DashboardStats
///
/// Output of `GET /dashboard/stats`. The `Default` value (all zeros, twelve empty
/// months) is what the dashboard shows when the stats fetch fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DashboardStats {
    #[serde(default)]
    pub total_leads: u64,
    #[serde(default)]
    pub active_complaints: u64,
    #[serde(default)]
    pub conversion_rate: f64,
    #[serde(default)]
    pub avg_response_time: f64,
    #[serde(default)]
    pub monthly_leads: Vec<u64>,
    #[serde(default)]
    pub recent_activities: Vec<Activity>,
}

impl Default for DashboardStats {
    fn default() -> Self {
        Self {
            total_leads: 0,
            active_complaints: 0,
            conversion_rate: 0.0,
            avg_response_time: 0.0,
            monthly_leads: vec![0; 12],
            recent_activities: vec![],
        }
    }
}

// --- Subscription ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SubscriptionTier {
    Free,
    Premium,
}

/// TierPlan
///
/// One entry of the static subscription catalogue shown on `/subscription`.
/// Billing itself is handled by an external provider.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TierPlan {
    pub tier: SubscriptionTier,
    pub name: String,
    pub monthly_price_usd: u32,
    pub features: Vec<String>,
}

impl TierPlan {
    /// The plans offered on the subscription screen. Prices are display-only.
    pub fn catalogue() -> Vec<TierPlan> {
        let plan = |tier, name: &str, price, features: &[&str]| TierPlan {
            tier,
            name: name.to_string(),
            monthly_price_usd: price,
            features: features.iter().map(|f| f.to_string()).collect(),
        };
        vec![
            plan(
                SubscriptionTier::Free,
                "Free",
                0,
                &[
                    "Up to 100 leads per month",
                    "Basic lead scoring",
                    "Email support",
                    "2 team members",
                    "Basic reporting",
                ],
            ),
            plan(
                SubscriptionTier::Premium,
                "Premium",
                49,
                &[
                    "Unlimited leads",
                    "Advanced AI lead scoring",
                    "Priority support",
                    "Unlimited team members",
                    "Advanced analytics",
                    "RAG-powered chatbot",
                    "Advanced complaint routing",
                ],
            ),
        ]
    }
}

// --- Screen View Models (Output) ---

/// Page
///
/// Envelope for every screen the portal renders: which route it is, the sidebar for the
/// current role, and the screen's own data.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Page<T> {
    pub route: Route,
    pub title: String,
    /// e.g. "System Admin", shown under the product name. Empty on the login screen.
    pub portal_title: String,
    pub menu: Vec<MenuItem>,
    pub data: T,
}

/// SessionView
///
/// Output of `GET /session`: what the browser shell needs to decide what to draw.
#[derive(Debug, Clone, Serialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SessionView {
    #[ts(type = "string")]
    pub context_id: Uuid,
    /// `loading`, `authenticated` or `anonymous`.
    pub status: String,
    pub identity: Option<Identity>,
    pub display_name: Option<String>,
    pub initials: Option<String>,
    #[ts(type = "string | null")]
    pub authenticated_at: Option<DateTime<Utc>>,
    pub menu: Vec<MenuItem>,
}

#[derive(Debug, Clone, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginScreen {
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct ChatScreen {
    pub greeting: String,
}

/// UsersScreen
///
/// The user-management screen. The member list itself is not served by the portal;
/// only which roles the current user may invite.
#[derive(Debug, Clone, Serialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UsersScreen {
    pub invitable_roles: Vec<Role>,
}
