//! Coordinates the course listing query with asynchronous page fetches.
//!
//! Every query change stamps a fetch with the next sequence number. A result
//! is applied only if its sequence number is still the latest one issued, so
//! the displayed page always belongs to the most recent query regardless of
//! the order in which responses arrive.

use std::sync::Arc;

use shared::{
    domain::{CourseLevel, SortDirection, SortField},
    protocol::{CoursePage, CourseSummary},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    error::ClientError,
    query::{Query, UrlState},
    CourseApi,
};

pub const DEFAULT_PAGE_SIZE: u32 = 12;
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum ListEvent {
    QueryChanged {
        seq: u64,
        query: Query,
    },
    PageLoaded {
        seq: u64,
        page_number: u32,
        total_pages: u32,
        total_count: u64,
    },
    FetchFailed {
        seq: u64,
        message: String,
        /// Set when the failure came from a [`ClientError`] that may clear up
        /// on its own (see [`ClientError::is_retryable`]).
        retryable: bool,
    },
    Superseded {
        seq: u64,
        latest: u64,
    },
}

/// What happened to the fetch started by a controller call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    Failed,
    /// A newer fetch was issued before this one settled; its result was dropped.
    Superseded,
    /// Nothing was issued (e.g. `next_page` on the last page).
    Skipped,
}

/// Everything the presentation layer needs to render the list view.
#[derive(Debug, Clone, PartialEq)]
pub struct ListSnapshot {
    pub query: Query,
    pub page: Option<CoursePage>,
    pub loading: bool,
    pub error: Option<String>,
}

impl ListSnapshot {
    pub fn can_go_previous(&self) -> bool {
        self.page.as_ref().is_some_and(|page| page.has_previous_page)
    }

    pub fn can_go_next(&self) -> bool {
        self.page.as_ref().is_some_and(|page| page.has_next_page)
    }
}

struct ControllerState {
    query: Query,
    page: Option<CoursePage>,
    issued_seq: u64,
    settled_seq: u64,
    error: Option<String>,
}

impl ControllerState {
    /// Keeps `page_number` inside the last known page range.
    fn clamp_page(&self, page_number: u32) -> u32 {
        let page_number = page_number.max(1);
        match &self.page {
            Some(page) => page_number.min(page.total_pages.max(1)),
            None => page_number,
        }
    }
}

pub struct ListQueryController {
    api: Arc<dyn CourseApi>,
    page_size: u32,
    state: Mutex<ControllerState>,
    events: broadcast::Sender<ListEvent>,
}

impl ListQueryController {
    /// Creates a controller whose query is parsed from `url_state`. No fetch is
    /// issued until `refresh` or a setter is called.
    pub fn initialize(api: Arc<dyn CourseApi>, page_size: u32, url_state: &UrlState) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            api,
            page_size: page_size.max(1),
            state: Mutex::new(ControllerState {
                query: Query::from_url_state(url_state),
                page: None,
                issued_seq: 0,
                settled_seq: 0,
                error: None,
            }),
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ListEvent> {
        self.events.subscribe()
    }

    pub async fn query(&self) -> Query {
        self.state.lock().await.query.clone()
    }

    pub async fn current_url_representation(&self) -> UrlState {
        self.state.lock().await.query.to_url_state()
    }

    pub async fn snapshot(&self) -> ListSnapshot {
        let state = self.state.lock().await;
        ListSnapshot {
            query: state.query.clone(),
            page: state.page.clone(),
            loading: state.settled_seq < state.issued_seq,
            error: state.error.clone(),
        }
    }

    /// Items of the current page, narrowed to `level` on the client since the
    /// listing endpoint cannot filter by level.
    pub async fn visible_items(&self, level: Option<CourseLevel>) -> Vec<CourseSummary> {
        let state = self.state.lock().await;
        let Some(page) = &state.page else {
            return Vec::new();
        };
        page.courses
            .iter()
            .filter(|course| level.map_or(true, |level| course.has_level(level)))
            .cloned()
            .collect()
    }

    pub async fn refresh(&self) -> FetchOutcome {
        self.issue(|state| Some(state.query.clone())).await
    }

    pub async fn set_search_term(&self, text: &str) -> FetchOutcome {
        self.issue(|state| Some(state.query.with_search_term(text)))
            .await
    }

    pub async fn set_sort(&self, field: SortField, direction: SortDirection) -> FetchOutcome {
        self.issue(|state| Some(state.query.with_sort(field, direction)))
            .await
    }

    /// Out-of-range pages are clamped to `[1, totalPages]` of the latest page.
    pub async fn set_page(&self, page_number: u32) -> FetchOutcome {
        self.issue(|state| Some(state.query.with_page(state.clamp_page(page_number))))
            .await
    }

    /// Steps from the displayed page, not from a query still in flight.
    pub async fn next_page(&self) -> FetchOutcome {
        self.issue(|state| {
            let page = state.page.as_ref().filter(|page| page.has_next_page)?;
            let target = state.clamp_page(page.page_number.saturating_add(1));
            Some(state.query.with_page(target))
        })
        .await
    }

    /// Steps from the displayed page, not from a query still in flight.
    pub async fn previous_page(&self) -> FetchOutcome {
        self.issue(|state| {
            let page = state.page.as_ref().filter(|page| page.has_previous_page)?;
            let target = state.clamp_page(page.page_number.saturating_sub(1));
            Some(state.query.with_page(target))
        })
        .await
    }

    async fn issue<F>(&self, next_query: F) -> FetchOutcome
    where
        F: FnOnce(&ControllerState) -> Option<Query>,
    {
        let (seq, query) = {
            let mut state = self.state.lock().await;
            let Some(query) = next_query(&*state) else {
                return FetchOutcome::Skipped;
            };
            state.issued_seq += 1;
            state.query = query.clone();
            (state.issued_seq, query)
        };

        info!(
            seq,
            search = query.search_term(),
            sort_by = %query.sort_field(),
            sort_order = %query.sort_direction(),
            page = query.page_number(),
            "fetching course page"
        );
        let _ = self.events.send(ListEvent::QueryChanged {
            seq,
            query: query.clone(),
        });

        let result = self
            .api
            .list_courses(query.to_page_request(self.page_size))
            .await;
        self.settle(seq, result).await
    }

    async fn settle(&self, seq: u64, result: anyhow::Result<CoursePage>) -> FetchOutcome {
        let mut state = self.state.lock().await;
        if seq != state.issued_seq {
            debug!(seq, latest = state.issued_seq, "dropping superseded course page");
            let _ = self.events.send(ListEvent::Superseded {
                seq,
                latest: state.issued_seq,
            });
            return FetchOutcome::Superseded;
        }

        state.settled_seq = seq;
        match result {
            Ok(page) => {
                let _ = self.events.send(ListEvent::PageLoaded {
                    seq,
                    page_number: page.page_number,
                    total_pages: page.total_pages,
                    total_count: page.total_count,
                });
                state.page = Some(page);
                state.error = None;
                FetchOutcome::Applied
            }
            Err(err) => {
                let message = format!("{err:#}");
                let retryable = err
                    .downcast_ref::<ClientError>()
                    .is_some_and(ClientError::is_retryable);
                warn!(seq, retryable, error = %message, "course page fetch failed");
                let _ = self.events.send(ListEvent::FetchFailed {
                    seq,
                    message: message.clone(),
                    retryable,
                });
                state.error = Some(message);
                FetchOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
