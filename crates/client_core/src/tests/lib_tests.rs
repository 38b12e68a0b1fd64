use super::*;

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query as QueryParams, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::{
    domain::{SortDirection, SortField},
    error::ErrorCode,
};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct ServerState {
    list_queries: Arc<Mutex<Vec<HashMap<String, String>>>>,
    ratings: Arc<Mutex<Vec<(String, Option<String>, Value)>>>,
    fail_listing: bool,
}

fn catalogue_page(page_number: u32, page_size: u32, total_count: u64) -> Value {
    let total_pages = total_count.div_ceil(u64::from(page_size)) as u32;
    let start = u64::from(page_number - 1) * u64::from(page_size);
    let end = (start + u64::from(page_size)).min(total_count);
    let courses: Vec<Value> = (start..end)
        .map(|index| {
            json!({
                "id": format!("course-{index}"),
                "title": format!("Course {index}"),
                "description": "",
                "platform": "Coursera",
                "courseLevels": ["Beginner"],
                "tags": ["rust"],
                "ratingAverage": "4.7",
                "ratingCount": 120
            })
        })
        .collect();
    json!({
        "totalCount": total_count,
        "pageNumber": page_number,
        "pageSize": page_size,
        "totalPages": total_pages,
        "hasPreviousPage": page_number > 1,
        "hasNextPage": page_number < total_pages,
        "courses": courses
    })
}

async fn handle_list(
    State(state): State<ServerState>,
    QueryParams(params): QueryParams<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    state.list_queries.lock().await.push(params.clone());
    if state.fail_listing {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    let page_number = params
        .get("pageNumber")
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(1);
    let page_size = params
        .get("pageSize")
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(10);
    Ok(Json(catalogue_page(page_number, page_size, 25)))
}

async fn handle_course(Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    if id != "c-1" {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(json!({
        "id": "c-1",
        "title": "Async Rust",
        "platform": "Udemy",
        "ratingAverage": 4.9,
        "ratingCount": "87",
        "requirements": ["basic Rust"],
        "platformUrl": "https://example.com/c-1"
    })))
}

async fn handle_reviews(Path(_id): Path<String>) -> Json<Value> {
    Json(json!([
        {"rating": 5, "review": "great", "userName": "ana", "updateAt": "2024-05-01"},
        {"rating": 3, "review": null, "userName": "rui", "updateAt": "2024-05-02"}
    ]))
}

async fn handle_similar(Path(_id): Path<String>) -> Json<Value> {
    Json(json!({
        "similarCourses": [{"id": "c-2", "title": "Tokio", "ratingAverage": "4.1", "ratingCount": "9"}]
    }))
}

async fn handle_login(Json(body): Json<Value>) -> Result<Json<Value>, StatusCode> {
    if body["password"] != "hunter2" {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(Json(json!({
        "token": "token-abc",
        "user": {"id": 42, "name": "Ana", "email": body["email"].clone()}
    })))
}

async fn handle_rating(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    let auth = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    state.ratings.lock().await.push((id, auth, body));
    StatusCode::NO_CONTENT
}

async fn spawn_course_server(state: ServerState) -> anyhow::Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new()
        .route("/api/course", get(handle_list))
        .route("/api/course/:id", get(handle_course))
        .route("/api/course/:id/similar", get(handle_similar))
        .route("/api/rating/:id", get(handle_reviews).put(handle_rating))
        .route("/api/login", post(handle_login))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}/api"))
}

#[tokio::test]
async fn list_courses_sends_listing_parameters() {
    let state = ServerState::default();
    let base_url = spawn_course_server(state.clone()).await.expect("spawn server");
    let client = CourseClient::new(&base_url).expect("client");

    let request = Query::new(" rust ", SortField::RatingCount, SortDirection::Asc, 2).to_page_request(12);
    let page = client.list_courses(request).await.expect("list");
    assert_eq!(page.page_number, 2);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.courses.len(), 12);
    assert_eq!(page.courses[0].rating_count, "120");

    let queries = state.list_queries.lock().await;
    let params = &queries[0];
    assert_eq!(params.get("pageNumber").map(String::as_str), Some("2"));
    assert_eq!(params.get("pageSize").map(String::as_str), Some("12"));
    assert_eq!(params.get("search").map(String::as_str), Some("rust"));
    assert_eq!(params.get("sortby").map(String::as_str), Some("ratingCount"));
    assert_eq!(params.get("sortOrder").map(String::as_str), Some("asc"));
}

#[tokio::test]
async fn list_courses_omits_blank_search() {
    let state = ServerState::default();
    let base_url = spawn_course_server(state.clone()).await.expect("spawn server");
    let client = CourseClient::new(&base_url).expect("client");

    client
        .list_courses(Query::default().with_search_term("   ").to_page_request(12))
        .await
        .expect("list");
    assert!(!state.list_queries.lock().await[0].contains_key("search"));
}

#[tokio::test]
async fn non_success_status_maps_to_api_error() {
    let state = ServerState {
        fail_listing: true,
        ..ServerState::default()
    };
    let base_url = spawn_course_server(state).await.expect("spawn server");
    let client = CourseClient::new(&base_url).expect("client");

    let err = client
        .list_courses(Query::default().to_page_request(12))
        .await
        .expect_err("must fail");
    let api_error = err
        .downcast_ref::<ClientError>()
        .and_then(ClientError::api_error)
        .expect("api error");
    assert_eq!(api_error.status, 503);
    assert_eq!(api_error.code, ErrorCode::Unavailable);
    assert!(err
        .downcast_ref::<ClientError>()
        .is_some_and(ClientError::is_retryable));
}

#[tokio::test]
async fn refused_connection_is_a_retryable_transport_error() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let client = CourseClient::new(&format!("http://{addr}/api")).expect("client");

    let err = client
        .list_courses(Query::default().to_page_request(12))
        .await
        .expect_err("nothing is listening");
    let client_error = err.downcast_ref::<ClientError>().expect("typed error");
    assert!(matches!(client_error, ClientError::Transport(_)));
    assert!(client_error.is_retryable());
    assert!(!client_error.requires_reauth());
}

#[tokio::test]
async fn course_detail_reviews_and_similar() {
    let base_url = spawn_course_server(ServerState::default())
        .await
        .expect("spawn server");
    let client = CourseClient::new(&base_url).expect("client");
    let course_id = CourseId::from("c-1");

    let detail = client.get_course(&course_id).await.expect("detail");
    assert_eq!(detail.summary.title, "Async Rust");
    assert_eq!(detail.summary.rating_average, "4.9");
    assert_eq!(detail.requirements, vec!["basic Rust".to_string()]);

    let reviews = client.list_reviews(&course_id).await.expect("reviews");
    assert_eq!(reviews.len(), 2);
    assert_eq!(reviews[1].review, None);

    let similar = client.similar_courses(&course_id).await.expect("similar");
    assert_eq!(similar[0].id, CourseId::from("c-2"));

    let missing = client
        .get_course(&CourseId::from("nope"))
        .await
        .expect_err("missing course");
    assert!(missing.to_string().contains("NotFound"), "{missing}");
}

#[tokio::test]
async fn login_then_rate_sends_bearer_and_null_blank_review() {
    let state = ServerState::default();
    let base_url = spawn_course_server(state.clone()).await.expect("spawn server");
    let client = CourseClient::new(&base_url).expect("client");

    let session = client
        .login(" ana@example.com ", "hunter2")
        .await
        .expect("login");
    assert_eq!(session.user.id, "42");
    assert_eq!(session.user.email, "ana@example.com");
    assert_eq!(client.token().await.as_deref(), Some("token-abc"));

    client
        .submit_rating(&CourseId::from("c-1"), 4, Some("   "))
        .await
        .expect("rate");
    client
        .submit_rating(&CourseId::from("c-1"), 5, Some(" loved it "))
        .await
        .expect("rate");

    let ratings = state.ratings.lock().await;
    assert_eq!(ratings[0].0, "c-1");
    assert_eq!(ratings[0].1.as_deref(), Some("Bearer token-abc"));
    assert_eq!(ratings[0].2, json!({"rating": 4, "review": null}));
    assert_eq!(ratings[1].2, json!({"rating": 5, "review": "loved it"}));
}

#[tokio::test]
async fn failed_login_keeps_session_empty() {
    let base_url = spawn_course_server(ServerState::default())
        .await
        .expect("spawn server");
    let client = CourseClient::new(&base_url).expect("client");

    let err = client
        .login("ana@example.com", "wrong")
        .await
        .expect_err("bad credentials");
    assert!(err.requires_reauth());
    assert!(!err.is_retryable());
    assert_eq!(client.token().await, None);
}

#[tokio::test]
async fn rating_is_validated_before_any_request() {
    let state = ServerState::default();
    let base_url = spawn_course_server(state.clone()).await.expect("spawn server");
    let client = CourseClient::new(&base_url).expect("client");
    let course_id = CourseId::from("c-1");

    let err = client
        .submit_rating(&course_id, 3, None)
        .await
        .expect_err("needs session");
    assert!(matches!(err, ClientError::NotAuthenticated));

    client.restore_session("restored").await;
    for rating in [0, 6] {
        let err = client
            .submit_rating(&course_id, rating, None)
            .await
            .expect_err("out of range");
        assert!(matches!(err, ClientError::InvalidRating(value) if value == rating));
    }
    assert!(state.ratings.lock().await.is_empty());

    client.logout().await;
    assert_eq!(client.token().await, None);
}

#[test]
fn rejects_base_url_without_path_support() {
    assert!(matches!(
        CourseClient::new("mailto:someone@example.com"),
        Err(ClientError::InvalidBaseUrl { .. })
    ));
    assert!(CourseClient::new("not a url").is_err());
}

#[tokio::test]
async fn controller_pages_through_http_backend() {
    let state = ServerState::default();
    let base_url = spawn_course_server(state.clone()).await.expect("spawn server");
    let client = Arc::new(CourseClient::new(&base_url).expect("client"));
    let controller = ListQueryController::initialize(
        client,
        controller::DEFAULT_PAGE_SIZE,
        &UrlState::from_query_string(""),
    );

    assert_eq!(controller.refresh().await, FetchOutcome::Applied);
    let snapshot = controller.snapshot().await;
    let page = snapshot.page.expect("first page");
    assert_eq!(page.total_count, 25);
    assert_eq!(page.total_pages, 3);
    assert!(page.has_next_page);

    assert_eq!(controller.set_page(2).await, FetchOutcome::Applied);
    let snapshot = controller.snapshot().await;
    assert!(!snapshot.loading);
    assert_eq!(snapshot.query.page_number(), 2);
    let page = snapshot.page.expect("second page");
    assert_eq!(page.page_number, 2);
    assert!(page.has_previous_page);
    assert_eq!(
        controller.current_url_representation().await.to_query_string(),
        "page=2"
    );

    let queries = state.list_queries.lock().await;
    assert_eq!(queries.len(), 2);
    assert_eq!(queries[0].get("sortby").map(String::as_str), Some("rating"));
    assert_eq!(queries[0].get("sortOrder").map(String::as_str), Some("desc"));
}
