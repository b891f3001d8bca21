//! Client-side filtering of lists already fetched from the backend.

use crate::models::{Complaint, Lead};
use serde::Deserialize;
use utoipa::IntoParams;

/// ListFilter
///
/// Query parameters accepted by the `/leads` and `/complaints` screens.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListFilter {
    /// Case-insensitive substring match.
    pub search: Option<String>,
    /// Exact status match; `all` or absent disables the filter.
    pub status: Option<String>,
}

impl ListFilter {
    fn needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    fn status_matches(&self, status: &str) -> bool {
        match self.status.as_deref().map(str::trim) {
            None | Some("") | Some("all") => true,
            Some(wanted) => wanted == status,
        }
    }

    /// Leads whose first name, last name, email or company contains the search term,
    /// and whose status matches.
    pub fn leads(&self, leads: Vec<Lead>) -> Vec<Lead> {
        let needle = self.needle();
        leads
            .into_iter()
            .filter(|lead| {
                let matches_search = needle.as_deref().is_none_or(|n| {
                    contains(&lead.first_name, n)
                        || contains(&lead.last_name, n)
                        || contains(&lead.email, n)
                        || lead.company.as_deref().is_some_and(|c| contains(c, n))
                });
                matches_search && self.status_matches(lead.status.as_str())
            })
            .collect()
    }

    /// Complaints whose title or description contains the search term, and whose
    /// status matches.
    pub fn complaints(&self, complaints: Vec<Complaint>) -> Vec<Complaint> {
        let needle = self.needle();
        complaints
            .into_iter()
            .filter(|c| {
                let matches_search = needle
                    .as_deref()
                    .is_none_or(|n| contains(&c.title, n) || contains(&c.description, n));
                matches_search && self.status_matches(c.status.as_str())
            })
            .collect()
    }
}

fn contains(haystack: &str, lowered_needle: &str) -> bool {
    haystack.to_lowercase().contains(lowered_needle)
}
