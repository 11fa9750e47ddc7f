//! Query strings accepted by the listing routes, and their translation
//! into service filters.

use serde::Deserialize;

use crate::article::{ArticleFilter, ArticleSort, ArticleStatus};
use crate::errors::BackendError;
use crate::organizer::{OrganizerFilter, OrganizerSort, OrganizerStatus};
use crate::query::{SortOrder, StatusFilter};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleListQuery {
    pub status: Option<String>,
    pub author: Option<String>,
    pub search: Option<String>,
    /// Comma-separated.
    pub tags: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl ArticleListQuery {
    pub fn into_filter(self) -> Result<ArticleFilter, BackendError> {
        Ok(ArticleFilter {
            status: parse_status(self.status.as_deref(), ArticleStatus::parse)?,
            author: self.author,
            search: self.search,
            tags: split_tags(self.tags.as_deref()),
            page: parse_number(self.page.as_deref()),
            limit: parse_number(self.limit.as_deref()),
            sort_by: parse_choice("sortBy", self.sort_by.as_deref(), ArticleSort::parse)?,
            sort_order: parse_choice("sortOrder", self.sort_order.as_deref(), SortOrder::parse)?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizerListQuery {
    pub status: Option<String>,
    pub category: Option<String>,
    pub verified: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    /// Comma-separated.
    pub tags: Option<String>,
    pub search: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl OrganizerListQuery {
    pub fn into_filter(self) -> Result<OrganizerFilter, BackendError> {
        Ok(OrganizerFilter {
            status: parse_status(self.status.as_deref(), OrganizerStatus::parse)?,
            category: self.category,
            verified: parse_choice("verified", self.verified.as_deref(), |v| v.parse().ok())?,
            city: self.city,
            state: self.state,
            country: self.country,
            tags: split_tags(self.tags.as_deref()),
            search: self.search,
            page: parse_number(self.page.as_deref()),
            limit: parse_number(self.limit.as_deref()),
            sort_by: parse_choice("sortBy", self.sort_by.as_deref(), OrganizerSort::parse)?,
            sort_order: parse_choice("sortOrder", self.sort_order.as_deref(), SortOrder::parse)?,
        })
    }
}

/// `all` or no parameter means any status; an empty value means
/// records without one.
fn parse_status<S>(value: Option<&str>, parse: impl Fn(&str) -> Option<S>) -> Result<StatusFilter<S>, BackendError> {
    match value {
        None | Some("all") => Ok(StatusFilter::Any),
        Some("") => Ok(StatusFilter::Unset),
        Some(other) => parse(other)
            .map(StatusFilter::Only)
            .ok_or_else(|| BackendError::validation("status", format!("unknown status {:?}", other))),
    }
}

fn parse_choice<T>(
    field: &'static str,
    value: Option<&str>,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, BackendError> {
    match value.filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => parse(v)
            .map(Some)
            .ok_or_else(|| BackendError::validation(field, format!("unsupported value {:?}", v))),
    }
}

// unparseable numbers get the same treatment as out-of-range ones
fn parse_number(value: Option<&str>) -> Option<i64> {
    value.and_then(|v| v.trim().parse().ok())
}

fn split_tags(value: Option<&str>) -> Vec<String> {
    value
        .map(|tags| {
            tags.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}
