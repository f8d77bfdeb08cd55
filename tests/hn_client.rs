//! The reqwest transport against a local stand-in for the Hacker News API.

use axum::Router;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use beststories::hn::{HnApi, HnTransport, ItemKind, UpstreamError};
use std::time::Duration;

async fn item(Path(file): Path<String>) -> Response {
    match file.as_str() {
        "1.json" => (
            StatusCode::OK,
            r#"{"by":"pg","descendants":15,"id":1,"score":57,"time":1160418111,
                "title":"Y Combinator","type":"story","url":"http://ycombinator.com"}"#,
        )
            .into_response(),
        "2.json" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        "3.json" => (StatusCode::OK, "null").into_response(),
        "4.json" => (StatusCode::OK, r#"{"id": "four""#).into_response(),
        "5.json" => StatusCode::TOO_MANY_REQUESTS.into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn spawn_upstream(ids_body: &'static str) -> String {
    let app = Router::new()
        .route("/v0/beststories.json", get(move || async move { ids_body }))
        .route("/v0/item/{file}", get(item));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/v0")
}

async fn api(ids_body: &'static str) -> HnApi {
    let base = spawn_upstream(ids_body).await;
    HnApi::new(&base, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn parses_ranked_ids() {
    let api = api("[9129911, 9129199, 9127761]").await;
    assert_eq!(
        api.best_story_ids().await.unwrap(),
        vec![9129911, 9129199, 9127761]
    );
}

#[tokio::test]
async fn null_ranking_is_empty() {
    let api = api("null").await;
    assert!(api.best_story_ids().await.unwrap().is_empty());
}

#[tokio::test]
async fn parses_item() {
    let api = api("[]").await;
    let story = api.item(1).await.unwrap();
    assert_eq!(story.id, 1);
    assert_eq!(story.title.as_deref(), Some("Y Combinator"));
    assert_eq!(story.by.as_deref(), Some("pg"));
    assert_eq!(story.descendants, Some(15));
    assert_eq!(story.kind, ItemKind::Story);
}

#[tokio::test]
async fn server_error_maps_to_status() {
    let api = api("[]").await;
    let err = api.item(2).await.unwrap_err();
    assert!(matches!(err, UpstreamError::Status(500)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn null_item_is_not_found() {
    let api = api("[]").await;
    assert!(matches!(api.item(3).await, Err(UpstreamError::NotFound)));
}

#[tokio::test]
async fn http_404_is_not_found() {
    let api = api("[]").await;
    let err = api.item(99).await.unwrap_err();
    assert!(matches!(err, UpstreamError::NotFound));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn malformed_body_is_parse_error() {
    let api = api("[]").await;
    let err = api.item(4).await.unwrap_err();
    assert!(matches!(err, UpstreamError::Parse { .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn throttling_is_transient_but_spares_the_breaker() {
    let api = api("[]").await;
    let err = api.item(5).await.unwrap_err();
    assert!(matches!(err, UpstreamError::Status(429)));
    assert!(err.is_transient());
    assert!(!err.trips_breaker());
}

#[tokio::test]
async fn unreachable_upstream_is_transient() {
    // Bind then drop to obtain a port with nothing listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = HnApi::new(&format!("http://{addr}/v0"), Duration::from_secs(2)).unwrap();
    let err = api.best_story_ids().await.unwrap_err();
    assert!(err.is_transient(), "unexpected error: {err:?}");
}
