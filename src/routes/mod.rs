/// Router Module Index
///
/// Splits the portal's screens by who may reach them. The split mirrors the role→route
/// table in `crate::access`; the gate layer applied in `create_router` is what actually
/// enforces it.

/// Routes that work without a session (health, session status, sign in/out).
pub mod public;

/// Screens open to every authenticated role.
pub mod authenticated;

/// Screens limited to a subset of roles (leads, users, subscription).
pub mod restricted;
