//! Role→route table and the authorization gate.
//!
//! `ROUTES` is the only place that says which role may open which screen. The gate
//! (`decide`) and the navigation composer (`crate::navigation::menu_for`) both read it,
//! so a menu link can never point at a screen the gate would bounce.

use crate::{auth::Session, models::Role};
use serde::Serialize;
use ts_rs::TS;
use utoipa::ToSchema;

/// Route
///
/// Every screen of the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Route {
    Login,
    Dashboard,
    Users,
    Leads,
    Complaints,
    Chatbot,
    Subscription,
}

/// Where the gate sends an authenticated user who may not see the requested screen,
/// and where unknown paths land.
pub const SAFE_DEFAULT: Route = Route::Dashboard;

const ADMINS: &[Role] = &[Role::SystemAdmin, Role::OrgAdmin];
const STAFF: &[Role] = &[Role::SystemAdmin, Role::OrgAdmin, Role::Employee];

/// RouteEntry
///
/// One row of the role→route table.
#[derive(Debug)]
pub struct RouteEntry {
    pub route: Route,
    pub path: &'static str,
    pub title: &'static str,
    /// `None` admits any authenticated role.
    pub required_roles: Option<&'static [Role]>,
    /// Reachable without a session (the login screen).
    pub public: bool,
    /// Menu label used when no per-role override exists.
    pub label: &'static str,
    pub labels: &'static [(Role, &'static str)],
    /// Roles that may open the screen but do not get a menu link for it.
    pub hidden_for: &'static [Role],
}

impl RouteEntry {
    /// Menu label for `role`, or `None` if the entry is not a menu item for that role.
    /// Does not check access; callers pair it with `can_access`.
    pub fn label_for(&self, role: Role) -> Option<&'static str> {
        if self.public || self.hidden_for.contains(&role) {
            return None;
        }
        Some(
            self.labels
                .iter()
                .find(|(r, _)| *r == role)
                .map(|(_, label)| *label)
                .unwrap_or(self.label),
        )
    }

    pub fn permits(&self, role: Role) -> bool {
        can_access(role, self.required_roles)
    }
}

/// The role→route table, in menu order.
pub static ROUTES: &[RouteEntry] = &[
    RouteEntry {
        route: Route::Login,
        path: "/login",
        title: "Sign in",
        required_roles: None,
        public: true,
        label: "Sign in",
        labels: &[],
        hidden_for: &[],
    },
    RouteEntry {
        route: Route::Dashboard,
        path: "/dashboard",
        title: "Dashboard",
        required_roles: None,
        public: false,
        label: "Dashboard",
        labels: &[],
        hidden_for: &[Role::Customer],
    },
    RouteEntry {
        route: Route::Users,
        path: "/users",
        title: "Users",
        required_roles: Some(ADMINS),
        public: false,
        label: "Team Members",
        labels: &[(Role::SystemAdmin, "All Users")],
        hidden_for: &[],
    },
    RouteEntry {
        route: Route::Leads,
        path: "/leads",
        title: "Leads",
        required_roles: Some(STAFF),
        public: false,
        label: "Leads",
        labels: &[
            (Role::SystemAdmin, "All Leads"),
            (Role::Employee, "My Leads"),
        ],
        hidden_for: &[],
    },
    RouteEntry {
        route: Route::Complaints,
        path: "/complaints",
        title: "Complaints",
        required_roles: None,
        public: false,
        label: "Complaints",
        labels: &[
            (Role::SystemAdmin, "All Complaints"),
            (Role::Employee, "My Complaints"),
            (Role::Customer, "My Complaints"),
        ],
        hidden_for: &[],
    },
    RouteEntry {
        route: Route::Chatbot,
        path: "/chatbot",
        title: "AI Assistant",
        required_roles: None,
        public: false,
        label: "AI Assistant",
        labels: &[(Role::Customer, "Support Chat")],
        hidden_for: &[Role::SystemAdmin],
    },
    RouteEntry {
        route: Route::Subscription,
        path: "/subscription",
        title: "Subscription",
        required_roles: Some(ADMINS),
        public: false,
        label: "Subscription",
        labels: &[(Role::SystemAdmin, "Subscriptions")],
        hidden_for: &[],
    },
];

impl Route {
    pub fn entry(&self) -> &'static RouteEntry {
        // Every variant has exactly one row; see `every_route_has_an_entry`.
        ROUTES
            .iter()
            .find(|e| e.route == *self)
            .unwrap_or(&ROUTES[0])
    }

    pub fn path(&self) -> &'static str {
        self.entry().path
    }
}

/// can_access
///
/// `required_roles == None` admits any authenticated role; otherwise the role must be
/// listed. Evaluated on every navigation, never cached.
pub fn can_access(role: Role, required_roles: Option<&[Role]>) -> bool {
    match required_roles {
        None => true,
        Some(allowed) => allowed.contains(&role),
    }
}

/// Roles a user with `role` may create from the user-management screen. System admins
/// onboard organization admins; organization admins onboard their own staff and
/// customers and may not create peers.
pub fn invitable_roles(role: Role) -> Vec<Role> {
    match role {
        Role::SystemAdmin => vec![Role::OrgAdmin, Role::Employee, Role::Customer],
        Role::OrgAdmin => vec![Role::Employee, Role::Customer],
        Role::Employee | Role::Customer => vec![],
    }
}

/// Looks up the table row for a request path. Sub-paths resolve to their screen
/// (`/leads/42` → leads); query strings and trailing slashes are ignored.
pub fn resolve(path: &str) -> Option<&'static RouteEntry> {
    let path = path.split(['?', '#']).next().unwrap_or("");
    let first = path.trim_start_matches('/').split('/').next().unwrap_or("");
    if first.is_empty() {
        return None;
    }
    ROUTES
        .iter()
        .find(|e| e.path.trim_start_matches('/') == first)
}

/// GateDecision
///
/// Outcome of one navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(tag = "action", content = "route", rename_all = "snake_case")]
#[ts(export)]
pub enum GateDecision {
    /// The session is still resolving: show a neutral placeholder, do not redirect.
    Wait,
    Render(Route),
    Redirect(Route),
}

/// decide
///
/// The per-render state machine:
/// loading → `Wait`; no identity → `/login`; role not permitted → `/dashboard`;
/// otherwise render. Unknown paths (and `/`) go to `/dashboard`. An authenticated user
/// asking for `/login` is sent to `/dashboard` as well.
pub fn decide(session: &Session, path: &str) -> GateDecision {
    let Some(entry) = resolve(path) else {
        return GateDecision::Redirect(SAFE_DEFAULT);
    };

    if session.is_loading() {
        return GateDecision::Wait;
    }

    if entry.public {
        return match session.identity() {
            Some(_) => GateDecision::Redirect(SAFE_DEFAULT),
            None => GateDecision::Render(entry.route),
        };
    }

    match session.identity() {
        None => GateDecision::Redirect(Route::Login),
        Some(identity) if !entry.permits(identity.role) => {
            tracing::debug!(role = %identity.role, route = ?entry.route, "route not permitted for role");
            GateDecision::Redirect(SAFE_DEFAULT)
        }
        Some(_) => GateDecision::Render(entry.route),
    }
}
