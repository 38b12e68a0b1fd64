//! Listing query state and its URL representation.

use std::collections::BTreeMap;

use serde::Serialize;
use shared::domain::{SortDirection, SortField};
use url::form_urlencoded;

pub const PARAM_SEARCH: &str = "q";
pub const PARAM_SORT_BY: &str = "sortBy";
pub const PARAM_SORT_ORDER: &str = "sortOrder";
pub const PARAM_PAGE: &str = "page";

pub const DEFAULT_PAGE_NUMBER: u32 = 1;

/// Search text, sort and page number that together select one page of results.
///
/// Values are immutable: every `with_*` method returns a new query. The search
/// term is always stored trimmed and the page number is never below 1.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    search_term: String,
    sort_field: SortField,
    sort_direction: SortDirection,
    page_number: u32,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            search_term: String::new(),
            sort_field: SortField::default(),
            sort_direction: SortDirection::default(),
            page_number: DEFAULT_PAGE_NUMBER,
        }
    }
}

impl Query {
    pub fn new(
        search_term: &str,
        sort_field: SortField,
        sort_direction: SortDirection,
        page_number: u32,
    ) -> Self {
        Self {
            search_term: search_term.trim().to_string(),
            sort_field,
            sort_direction,
            page_number: page_number.max(DEFAULT_PAGE_NUMBER),
        }
    }

    /// Builds the query described by URL parameters. Absent or unparseable
    /// values fall back to their defaults; this never fails.
    pub fn from_url_state(url_state: &UrlState) -> Self {
        let search_term = url_state.get(PARAM_SEARCH).unwrap_or_default();
        let sort_field = url_state
            .get(PARAM_SORT_BY)
            .and_then(SortField::parse)
            .unwrap_or_default();
        let sort_direction = url_state
            .get(PARAM_SORT_ORDER)
            .and_then(SortDirection::parse)
            .unwrap_or_default();
        let page_number = url_state
            .get(PARAM_PAGE)
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|page| *page >= DEFAULT_PAGE_NUMBER)
            .unwrap_or(DEFAULT_PAGE_NUMBER);

        Self::new(search_term, sort_field, sort_direction, page_number)
    }

    /// Minimal URL parameters for this query: values equal to their default
    /// are left out.
    pub fn to_url_state(&self) -> UrlState {
        let mut url_state = UrlState::default();
        if self.is_filtered() {
            url_state.insert(PARAM_SEARCH, &self.search_term);
        }
        if self.sort_field != SortField::default() {
            url_state.insert(PARAM_SORT_BY, self.sort_field.as_str());
        }
        if self.sort_direction != SortDirection::default() {
            url_state.insert(PARAM_SORT_ORDER, self.sort_direction.as_str());
        }
        if self.page_number != DEFAULT_PAGE_NUMBER {
            url_state.insert(PARAM_PAGE, &self.page_number.to_string());
        }
        url_state
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn sort_field(&self) -> SortField {
        self.sort_field
    }

    pub fn sort_direction(&self) -> SortDirection {
        self.sort_direction
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn is_filtered(&self) -> bool {
        !self.search_term.is_empty()
    }

    /// A new filter invalidates the old page position.
    pub fn with_search_term(&self, text: &str) -> Self {
        Self::new(text, self.sort_field, self.sort_direction, DEFAULT_PAGE_NUMBER)
    }

    pub fn with_sort(&self, sort_field: SortField, sort_direction: SortDirection) -> Self {
        Self::new(&self.search_term, sort_field, sort_direction, DEFAULT_PAGE_NUMBER)
    }

    pub fn with_page(&self, page_number: u32) -> Self {
        Self::new(
            &self.search_term,
            self.sort_field,
            self.sort_direction,
            page_number,
        )
    }

    pub fn to_page_request(&self, page_size: u32) -> PageRequest {
        PageRequest {
            page_number: self.page_number,
            page_size: page_size.max(1),
            search: self.is_filtered().then(|| self.search_term.clone()),
            sort_by: Some(self.sort_field),
            sort_order: Some(self.sort_direction),
        }
    }
}

/// Query string parameters of `GET /course`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    #[serde(rename = "pageNumber")]
    pub page_number: u32,
    #[serde(rename = "pageSize")]
    pub page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(rename = "sortby", skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortField>,
    #[serde(rename = "sortOrder", skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortDirection>,
}

/// String parameters of the shareable URL, owned by whoever renders it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlState(BTreeMap<String, String>);

impl UrlState {
    /// Parses `a=1&b=2` (a leading `?` is allowed). When a key repeats, the
    /// first occurrence wins.
    pub fn from_query_string(raw: &str) -> Self {
        let raw = raw.trim().trim_start_matches('?');
        let mut params = BTreeMap::new();
        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            params
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }
        Self(params)
    }

    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.0.iter())
            .finish()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.0.insert(key.to_string(), value.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<K, V> FromIterator<(K, V)> for UrlState
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
#[path = "tests/query_tests.rs"]
mod tests;
