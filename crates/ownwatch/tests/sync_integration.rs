//! End-to-end sync runs against mocked Trakt and Micropub endpoints.
//!
//! These tests require the `sqlite` and `migrate` features to be enabled
//! and use an in-memory SQLite database.

#![cfg(all(feature = "sqlite", feature = "migrate"))]

use std::sync::Arc;
use std::time::Duration;

use ownwatch::http::{HttpMethod, HttpResponse, MockTransport};
use ownwatch::retry::RetryConfig;
use ownwatch::{
    AccessToken, DbUserStore, Direction, MicropubClient, StoredCredentials, SyncEngine,
    SyncService, TraktClient, User, UserStore, WatermarkState, connect_and_migrate,
};
use serde_json::{Value, json};

const API_URL: &str = "https://api.trakt.test";
const HISTORY_URL: &str = "https://api.trakt.test/sync/history";
const PROFILE: &str = "https://alice.example/";
const MICROPUB: &str = "https://alice.example/micropub";

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

struct Fixture {
    transport: MockTransport,
    store: Arc<DbUserStore>,
    service: SyncService,
}

async fn setup() -> Fixture {
    let db = connect_and_migrate("sqlite::memory:")
        .await
        .expect("Failed to create test database");
    let store = Arc::new(DbUserStore::new(db));

    let mut user = User::new(PROFILE);
    user.publish_endpoint = Some(MICROPUB.to_string());
    user.history_token = Some(AccessToken::bearer("trakt-secret"));
    user.publish_token = Some(AccessToken::bearer("site-secret"));
    store.save(&user).await.expect("seed user");

    let transport = MockTransport::new();
    let tokens = Arc::new(StoredCredentials);
    let trakt = TraktClient::new_with_transport("client-123", tokens.clone(), Arc::new(transport.clone()))
        .with_api_url(API_URL)
        .with_retry(RetryConfig::disabled());
    let micropub = MicropubClient::new_with_transport(tokens, Arc::new(transport.clone()));

    let service = SyncService::new(SyncEngine::new(
        Arc::new(trakt),
        Arc::new(micropub),
        store.clone(),
    ));

    Fixture {
        transport,
        store,
        service,
    }
}

fn history_page(page: u32, page_count: u32, records: Value) -> HttpResponse {
    HttpResponse {
        status: 200,
        headers: vec![
            ("X-Pagination-Page".to_string(), page.to_string()),
            ("X-Pagination-Page-Count".to_string(), page_count.to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
        ],
        body: serde_json::to_vec(&records).expect("json"),
    }
}

fn status(code: u16) -> HttpResponse {
    HttpResponse {
        status: code,
        headers: Vec::new(),
        body: Vec::new(),
    }
}

fn movie(id: i64, watched_at: &str, title: &str, slug: &str) -> Value {
    json!({
        "id": id,
        "watched_at": watched_at,
        "action": "watch",
        "type": "movie",
        "movie": { "title": title, "year": 2020, "ids": { "trakt": id * 10, "slug": slug } }
    })
}

fn episode(id: i64, watched_at: &str) -> Value {
    json!({
        "id": id,
        "watched_at": watched_at,
        "action": "scrobble",
        "type": "episode",
        "episode": { "season": 1, "number": 3, "title": "Pilot Redux", "ids": { "trakt": 7 } },
        "show": { "title": "Some Show", "year": 2019, "ids": { "trakt": 8, "slug": "some-show" } }
    })
}

fn publish_bodies(transport: &MockTransport) -> Vec<Value> {
    transport
        .requests()
        .into_iter()
        .filter(|r| r.method == HttpMethod::Post)
        .map(|r| serde_json::from_slice(&r.body).expect("json body"))
        .collect()
}

fn history_queries(transport: &MockTransport) -> Vec<String> {
    transport
        .requests()
        .into_iter()
        .filter(|r| r.method == HttpMethod::Get)
        .map(|r| r.url.split_once('?').map(|(_, q)| q.to_string()).unwrap_or_default())
        .collect()
}

#[tokio::test]
async fn backfill_publishes_every_page_and_persists_watermark() {
    let fx = setup().await;
    fx.transport.push_response(
        HttpMethod::Get,
        HISTORY_URL,
        history_page(
            1,
            2,
            json!([
                movie(30, "2023-05-03T20:00:00.000Z", "Third", "third-2020"),
                episode(20, "2023-05-02T20:00:00.000Z"),
            ]),
        ),
    );
    fx.transport.push_response(
        HttpMethod::Get,
        HISTORY_URL,
        history_page(2, 2, json!([movie(10, "2023-05-01T20:00:00.000Z", "First", "first-2020")])),
    );
    for _ in 0..3 {
        fx.transport.push_response(HttpMethod::Post, MICROPUB, status(201));
    }

    let report = tokio::time::timeout(TEST_TIMEOUT, fx.service.run_now(PROFILE, Direction::Older, true))
        .await
        .expect("test timed out")
        .expect("run");

    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.published, 3);

    let queries = history_queries(&fx.transport);
    assert_eq!(queries, vec!["limit=100&page=1", "limit=100&page=2"]);

    let bodies = publish_bodies(&fx.transport);
    assert_eq!(bodies.len(), 3);
    assert_eq!(bodies[0]["properties"]["summary"], json!(["Just watched: Third"]));
    assert_eq!(
        bodies[1]["properties"]["summary"],
        json!(["Just watched: Pilot Redux (Some Show S1E3)"])
    );
    assert_eq!(bodies[1]["properties"]["published"], json!(["2023-05-02T20:00:00Z"]));
    assert_eq!(
        bodies[1]["properties"]["watch-of"][0]["properties"]["show"][0]["properties"]["url"],
        json!(["https://trakt.tv/shows/some-show"])
    );

    let posts: Vec<_> = fx
        .transport
        .requests()
        .into_iter()
        .filter(|r| r.method == HttpMethod::Post)
        .collect();
    assert_eq!(posts[0].header("Authorization"), Some("Bearer site-secret"));
    assert_eq!(posts[0].header("Content-Type"), Some("application/json"));

    let gets: Vec<_> = fx
        .transport
        .requests()
        .into_iter()
        .filter(|r| r.method == HttpMethod::Get)
        .collect();
    assert_eq!(gets[0].header("trakt-api-key"), Some("client-123"));
    assert_eq!(gets[0].header("trakt-api-version"), Some("2"));
    assert_eq!(gets[0].header("Authorization"), Some("Bearer trakt-secret"));

    let saved = fx.store.get(PROFILE).await.expect("user");
    assert_eq!(saved.watermark.newest_seen_id(), 30);
    assert_eq!(saved.watermark.oldest_seen_id(), 10);
}

#[tokio::test]
async fn catch_up_is_bounded_by_newest_and_skips_the_boundary_record() {
    let fx = setup().await;

    let mut user = fx.store.get(PROFILE).await.expect("user");
    let newest = "2023-05-03T20:00:00Z".parse().expect("timestamp");
    let oldest = "2023-05-01T20:00:00Z".parse().expect("timestamp");
    user.watermark = WatermarkState::from_parts(Some((newest, 30)), Some((oldest, 10)));
    fx.store.save(&user).await.expect("save");

    fx.transport.push_response(
        HttpMethod::Get,
        HISTORY_URL,
        history_page(
            1,
            1,
            json!([
                movie(31, "2023-05-04T09:30:00.000Z", "Fourth", "fourth-2020"),
                movie(30, "2023-05-03T20:00:00.000Z", "Third", "third-2020"),
            ]),
        ),
    );
    fx.transport.push_response(HttpMethod::Post, MICROPUB, status(202));

    let report = tokio::time::timeout(TEST_TIMEOUT, fx.service.run_now(PROFILE, Direction::Newer, false))
        .await
        .expect("test timed out")
        .expect("run");

    assert_eq!(report.published, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(
        history_queries(&fx.transport),
        vec!["limit=100&page=1&start_at=2023-05-03T20%3A00%3A00Z"]
    );
    assert_eq!(publish_bodies(&fx.transport).len(), 1);

    let saved = fx.store.get(PROFILE).await.expect("user");
    assert_eq!(saved.watermark.newest_seen_id(), 31);
    assert_eq!(saved.watermark.oldest_seen_id(), 10);
}

#[tokio::test]
async fn rejected_publish_keeps_earlier_progress_only() {
    let fx = setup().await;
    fx.transport.push_response(
        HttpMethod::Get,
        HISTORY_URL,
        history_page(
            1,
            1,
            json!([
                movie(1, "2023-01-01T10:00:00Z", "A", "a"),
                movie(2, "2023-01-01T11:00:00Z", "B", "b"),
                movie(3, "2023-01-01T12:00:00Z", "C", "c"),
            ]),
        ),
    );
    fx.transport.push_response(HttpMethod::Post, MICROPUB, status(201));
    fx.transport.push_response(
        HttpMethod::Post,
        MICROPUB,
        HttpResponse {
            status: 400,
            headers: Vec::new(),
            body: b"invalid_request".to_vec(),
        },
    );

    let report = tokio::time::timeout(TEST_TIMEOUT, fx.service.run_now(PROFILE, Direction::Newer, false))
        .await
        .expect("test timed out")
        .expect("publish failures are reported, not raised");

    assert_eq!(report.published, 1);
    assert!(report
        .publish_error
        .as_deref()
        .is_some_and(|e| e.contains("400") && e.contains("invalid_request")));
    assert_eq!(publish_bodies(&fx.transport).len(), 2);

    let saved = fx.store.get(PROFILE).await.expect("user");
    assert_eq!(saved.watermark.newest_seen_id(), 1);
    assert_eq!(saved.watermark.oldest_seen_id(), 1);

    let status = fx.service.status(PROFILE).await.expect("status");
    assert!(!status.running);
    assert!(status.last_outcome.is_some());
}

#[tokio::test]
async fn missing_pagination_headers_abort_the_run() {
    let fx = setup().await;
    fx.transport.push_response(
        HttpMethod::Get,
        HISTORY_URL,
        HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: b"[]".to_vec(),
        },
    );

    let err = tokio::time::timeout(TEST_TIMEOUT, fx.service.run_now(PROFILE, Direction::Newer, false))
        .await
        .expect("test timed out")
        .expect_err("no pagination headers");

    assert!(err.to_string().contains("X-Pagination-Page"));
    assert!(!fx.service.coordinator().is_running(PROFILE));
    assert!(fx.store.get(PROFILE).await.expect("user").watermark.is_empty());
}
