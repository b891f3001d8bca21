use crate::{
    access::{ROUTES, Route},
    models::Role,
};
use serde::Serialize;
use ts_rs::TS;
use utoipa::ToSchema;

/// MenuItem
///
/// One sidebar link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct MenuItem {
    pub route: Route,
    pub path: String,
    pub label: String,
}

/// menu_for
///
/// The ordered sidebar for `role`. Built from the same table the gate reads and
/// filtered through the gate's own `permits` check, so every link is openable.
pub fn menu_for(role: Role) -> Vec<MenuItem> {
    ROUTES
        .iter()
        .filter(|entry| entry.permits(role))
        .filter_map(|entry| {
            entry.label_for(role).map(|label| MenuItem {
                route: entry.route,
                path: entry.path.to_string(),
                label: label.to_string(),
            })
        })
        .collect()
}
