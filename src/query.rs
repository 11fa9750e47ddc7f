//! Filtering, ordering and pagination shared by both storage backends.
//!
//! Services describe what they want as [`Criteria`]. The in-process
//! store runs criteria directly with [`Criteria::run`]; the managed
//! store receives the native part as a [`Query`] and the rest is
//! finished client-side. Both paths go through the same comparison and
//! matching code here, so they agree on results and pagination.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::docstore::{lookup, Fields, Snapshot};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;

/// A single condition on a (possibly nested, dot-separated) field.
/// Filters in a list are combined with AND.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    Equals { field: &'static str, value: Value },
    /// The field is absent or null.
    Missing { field: &'static str },
    /// The field is an array sharing at least one string with `values`.
    ContainsAny {
        field: &'static str,
        values: Vec<String>,
    },
}

impl Filter {
    pub fn equals(field: &'static str, value: impl Into<Value>) -> Self {
        Filter::Equals {
            field,
            value: value.into(),
        }
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        match self {
            Filter::Equals { field, value } => lookup(fields, field) == Some(value),
            Filter::Missing { field } => matches!(lookup(fields, field), None | Some(Value::Null)),
            Filter::ContainsAny { field, values } => match lookup(fields, field) {
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .any(|item| values.iter().any(|v| v == item)),
                _ => false,
            },
        }
    }
}

/// Which of the three states a status filter is in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusFilter<S> {
    /// No restriction.
    Any,
    /// Only records without a status.
    Unset,
    Only(S),
}

impl<S> Default for StatusFilter<S> {
    fn default() -> Self {
        StatusFilter::Any
    }
}

impl<S> StatusFilter<S> {
    pub fn to_filter(&self, field: &'static str, name: impl Fn(&S) -> &'static str) -> Option<Filter> {
        match self {
            StatusFilter::Any => None,
            StatusFilter::Unset => Some(Filter::Missing { field }),
            StatusFilter::Only(status) => Some(Filter::equals(field, name(status))),
        }
    }
}

/// How values of a sortable field compare.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortKind {
    /// Byte order of the UTF-8 text.
    Text,
    Number,
    /// RFC 3339 timestamps, compared as instants.
    Timestamp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Desc
    }
}

impl SortOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Order {
    pub field: &'static str,
    pub kind: SortKind,
    pub direction: SortOrder,
}

impl Order {
    /// Compares two documents by this key. Missing values, nulls and
    /// values of the wrong type sort lowest.
    pub fn compare(&self, a: &Fields, b: &Fields) -> Ordering {
        let ordering = self
            .key(a)
            .partial_cmp(&self.key(b))
            .unwrap_or(Ordering::Equal);

        match self.direction {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }

    fn key<'a>(&self, fields: &'a Fields) -> SortKey<'a> {
        let value = match lookup(fields, self.field) {
            Some(value) => value,
            None => return SortKey::Missing,
        };

        match self.kind {
            SortKind::Text => value.as_str().map_or(SortKey::Missing, SortKey::Text),
            SortKind::Number => value.as_f64().map_or(SortKey::Missing, SortKey::Number),
            SortKind::Timestamp => value
                .as_str()
                .and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok())
                .map_or(SortKey::Missing, SortKey::Timestamp),
        }
    }
}

#[derive(Debug, PartialEq, PartialOrd)]
enum SortKey<'a> {
    Missing,
    Text(&'a str),
    Number(f64),
    Timestamp(OffsetDateTime),
}

/// A case-insensitive substring search over a fixed set of text fields.
#[derive(Clone, Debug, PartialEq)]
pub struct Search {
    needle: String,
    fields: &'static [&'static str],
}

impl Search {
    /// Returns `None` for an empty term, which means "don't search".
    pub fn new(term: &str, fields: &'static [&'static str]) -> Option<Self> {
        if term.is_empty() {
            return None;
        }

        Some(Search {
            needle: term.to_lowercase(),
            fields,
        })
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        self.fields.iter().any(|field| {
            lookup(fields, field)
                .and_then(Value::as_str)
                .map_or(false, |text| text.to_lowercase().contains(&self.needle))
        })
    }
}

/// A normalized, 1-based page request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub number: u64,
    pub limit: u64,
}

impl Default for Page {
    fn default() -> Self {
        Page {
            number: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Page {
    /// Builds a page from raw request values. Missing, zero or negative
    /// values fall back to the defaults.
    pub fn new(number: Option<i64>, limit: Option<i64>) -> Self {
        let positive = |n: Option<i64>| n.and_then(|n| u64::try_from(n).ok()).filter(|n| *n > 0);

        Page {
            number: positive(number).unwrap_or(DEFAULT_PAGE),
            limit: positive(limit).unwrap_or(DEFAULT_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.number - 1).saturating_mul(self.limit)
    }

    /// Takes this page's slice out of an already filtered and sorted list.
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        let offset = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(self.limit).unwrap_or(usize::MAX);

        items.into_iter().skip(offset).take(limit).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u64,
    pub total_pages: u64,
    pub total_items: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: Page, total_items: u64) -> Self {
        let total_pages = total_items / page.limit + u64::from(total_items % page.limit != 0);

        Pagination {
            current_page: page.number,
            total_pages,
            total_items,
            has_next: page.number < total_pages,
            has_prev: page.number > 1,
        }
    }
}

/// One page of results together with its pagination metadata.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Listing<T> {
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Listing<U>, E> {
        Ok(Listing {
            items: self.items.into_iter().map(f).collect::<Result<_, _>>()?,
            pagination: self.pagination,
        })
    }
}

/// A query in the form the managed document store runs natively.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl Query {
    pub fn first(filter: Filter) -> Self {
        Query {
            filters: vec![filter],
            limit: Some(1),
            ..Query::default()
        }
    }

    /// Runs the query over documents given in storage order.
    pub fn apply(&self, documents: impl IntoIterator<Item = Snapshot>) -> Vec<Snapshot> {
        let mut matched: Vec<Snapshot> = documents
            .into_iter()
            .filter(|d| self.filters.iter().all(|f| f.matches(&d.fields)))
            .collect();

        if let Some(order) = &self.order {
            matched.sort_by(|a, b| order.compare(&a.fields, &b.fields));
        }

        let offset = self.offset.map_or(0, |o| usize::try_from(o).unwrap_or(usize::MAX));
        let limit = self.limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));

        matched.into_iter().skip(offset).take(limit).collect()
    }
}

/// Everything a listing call asked for, in a backend-neutral form.
#[derive(Clone, Debug, PartialEq)]
pub struct Criteria {
    pub filters: Vec<Filter>,
    pub search: Option<Search>,
    pub order: Order,
    pub page: Page,
}

impl Criteria {
    /// Whether the managed store can run the whole thing, paging included.
    pub fn is_native(&self) -> bool {
        self.search.is_none()
    }

    /// The part of the criteria the managed store runs itself. Paging is
    /// left out when a search has to be applied client-side first.
    pub fn to_query(&self) -> Query {
        let native = self.is_native();

        Query {
            filters: self.filters.clone(),
            order: Some(self.order),
            offset: if native { Some(self.page.offset()) } else { None },
            limit: if native { Some(self.page.limit) } else { None },
        }
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        self.filters.iter().all(|f| f.matches(fields))
            && self.search.as_ref().map_or(true, |s| s.matches(fields))
    }

    /// Runs the criteria in-process over documents in storage order.
    pub fn run(&self, documents: impl IntoIterator<Item = Snapshot>) -> Listing<Snapshot> {
        let mut matched: Vec<Snapshot> = documents
            .into_iter()
            .filter(|d| self.matches(&d.fields))
            .collect();
        matched.sort_by(|a, b| self.order.compare(&a.fields, &b.fields));

        self.paginate(matched)
    }

    /// Slices a fully filtered and sorted result down to the requested page.
    pub fn paginate(&self, matched: Vec<Snapshot>) -> Listing<Snapshot> {
        let total_items = matched.len() as u64;

        Listing {
            items: self.page.slice(matched),
            pagination: Pagination::new(self.page, total_items),
        }
    }
}
