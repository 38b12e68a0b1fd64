use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::CourseId,
    error::ApiError,
    protocol::{
        CourseDetail, CoursePage, CourseReview, LoginRequest, RatingRequest, Session,
        SimilarCourse, SimilarCoursesResponse,
    },
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

pub mod controller;
pub mod error;
pub mod query;

pub use controller::{FetchOutcome, ListEvent, ListQueryController, ListSnapshot};
pub use error::ClientError;
pub use query::{PageRequest, Query, UrlState};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Read access to the remote course catalogue.
#[async_trait]
pub trait CourseApi: Send + Sync {
    async fn list_courses(&self, request: PageRequest) -> Result<CoursePage>;
    async fn get_course(&self, course_id: &CourseId) -> Result<CourseDetail>;
    async fn list_reviews(&self, course_id: &CourseId) -> Result<Vec<CourseReview>>;
    async fn similar_courses(&self, course_id: &CourseId) -> Result<Vec<SimilarCourse>>;
}

/// HTTP client for the course backend. Holds the bearer token of the
/// signed-in user, if any.
pub struct CourseClient {
    http: Client,
    base_url: Url,
    token: RwLock<Option<String>>,
}

impl CourseClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let parsed = Url::parse(base_url.trim()).map_err(|err| ClientError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: err.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "url cannot carry a path".to_string(),
            });
        }
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: parsed,
            token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub async fn restore_session(&self, token: impl Into<String>) {
        *self.token.write().await = Some(token.into());
    }

    pub async fn logout(&self) {
        *self.token.write().await = None;
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let url = self.endpoint(&["login"])?;
        let res = self
            .http
            .post(url)
            .json(&LoginRequest {
                email: email.trim().to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        let session: Session = read_json(res).await?;
        *self.token.write().await = Some(session.token.clone());
        info!(user_id = %session.user.id, "signed in");
        Ok(session)
    }

    /// Rates a course on a 1..=5 scale. A blank review is sent as `null`.
    pub async fn submit_rating(
        &self,
        course_id: &CourseId,
        rating: u8,
        review: Option<&str>,
    ) -> Result<(), ClientError> {
        if !(1..=5).contains(&rating) {
            return Err(ClientError::InvalidRating(rating));
        }
        let Some(token) = self.token().await else {
            return Err(ClientError::NotAuthenticated);
        };

        let url = self.endpoint(&["rating", course_id.0.as_str()])?;
        let body = RatingRequest {
            rating,
            review: review
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string),
        };
        let res = self
            .http
            .put(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        ensure_success(res)?;
        info!(course_id = %course_id, rating, "rating submitted");
        Ok(())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: "url cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ClientError> {
        let url = self.endpoint(segments)?;
        debug!(%url, "GET");
        let res = self.http.get(url).send().await?;
        read_json(res).await
    }
}

#[async_trait]
impl CourseApi for CourseClient {
    async fn list_courses(&self, request: PageRequest) -> Result<CoursePage> {
        let url = self.endpoint(&["course"])?;
        debug!(%url, ?request, "GET");
        let res = self
            .http
            .get(url)
            .query(&request)
            .send()
            .await
            .map_err(ClientError::from)?;
        Ok(read_json(res).await?)
    }

    async fn get_course(&self, course_id: &CourseId) -> Result<CourseDetail> {
        Ok(self.get_json(&["course", course_id.0.as_str()]).await?)
    }

    async fn list_reviews(&self, course_id: &CourseId) -> Result<Vec<CourseReview>> {
        Ok(self.get_json(&["rating", course_id.0.as_str()]).await?)
    }

    async fn similar_courses(&self, course_id: &CourseId) -> Result<Vec<SimilarCourse>> {
        let response: SimilarCoursesResponse =
            self.get_json(&["course", course_id.0.as_str(), "similar"]).await?;
        Ok(response.similar_courses)
    }
}

/// Turns any non-success status into an [`ApiError`]; the body is not interpreted.
fn ensure_success(res: Response) -> Result<Response, ClientError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    warn!(status = status.as_u16(), url = %res.url(), "course backend returned an error status");
    let message = status
        .canonical_reason()
        .unwrap_or("unexpected status")
        .to_string();
    Err(ApiError::from_status(status.as_u16(), message).into())
}

async fn read_json<T: DeserializeOwned>(res: Response) -> Result<T, ClientError> {
    Ok(ensure_success(res)?.json::<T>().await?)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
