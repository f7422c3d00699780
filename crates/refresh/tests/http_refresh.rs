//! End-to-end refresh runs against a mock listGrid endpoint.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gridcache_cache::{CacheStore, MemoryStore};
use gridcache_core::config::FetchConfig;
use gridcache_refresh::{HttpGridFetcher, RefreshOutcome, RefreshPipeline};

const VIEW_PATH: &str = "/api/sqlViews/abc/data.json";

fn pipeline(store: Arc<MemoryStore>) -> RefreshPipeline {
    let fetcher = HttpGridFetcher::from_config(&FetchConfig {
        timeout_secs: 2,
        ..FetchConfig::default()
    })
    .expect("client builds");
    RefreshPipeline::new(Arc::new(fetcher), store)
}

#[tokio::test]
async fn full_table_is_requested_and_stored() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(VIEW_PATH))
        .and(query_param("paging", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "listGrid": {
                "title": "Facility list",
                "headers": ["code", "name", "district"],
                "rows": [
                    ["FAC-1", "Alpha", "North"],
                    [null, "Ghost", "Nowhere"],
                    ["FAC-2", "Beta", "South"]
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let url = format!("{}{}", server.uri(), VIEW_PATH);

    let outcome = pipeline(store.clone()).run(&url).await;

    assert_eq!(outcome, RefreshOutcome::Stored { records: 2, skipped: 1 });
    let value = store.get(VIEW_PATH, "FAC-1").await.unwrap().expect("FAC-1 cached");
    let parsed: serde_json::Value = serde_json::from_str(&value).unwrap();
    assert_eq!(parsed["title"], "Facility list");
    assert_eq!(parsed["rows"], json!([["FAC-1", "Alpha", "North"]]));
    assert_eq!(parsed["width"], 3);
    assert_eq!(parsed["height"], 1);
}

#[tokio::test]
async fn server_error_skips_the_write() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(VIEW_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let url = format!("{}{}", server.uri(), VIEW_PATH);

    let outcome = pipeline(store.clone()).run(&url).await;

    assert!(matches!(outcome, RefreshOutcome::FetchFailed(msg) if msg.contains("500")));
    assert_eq!(store.len(VIEW_PATH).await.unwrap(), 0);
}

#[tokio::test]
async fn failed_fetch_keeps_previous_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(VIEW_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "listGrid": { "title": "t", "headers": ["code"], "rows": [["KEEP"]] }
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(VIEW_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let pipeline = pipeline(store.clone());
    let url = format!("{}{}", server.uri(), VIEW_PATH);

    assert!(matches!(pipeline.run(&url).await, RefreshOutcome::Stored { records: 1, .. }));
    assert!(matches!(pipeline.run(&url).await, RefreshOutcome::FetchFailed(_)));
    assert!(store.get(VIEW_PATH, "KEEP").await.unwrap().is_some());
}

#[tokio::test]
async fn body_without_list_grid_is_a_decode_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(VIEW_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "rows": [] })))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let url = format!("{}{}", server.uri(), VIEW_PATH);

    let outcome = pipeline(store.clone()).run(&url).await;

    assert!(matches!(outcome, RefreshOutcome::FetchFailed(msg) if msg.contains("decode")));
    assert!(store.namespaces().await.unwrap().is_empty());
}

#[tokio::test]
async fn slow_source_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(VIEW_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(5))
                .set_body_json(json!({ "listGrid": { "title": "t", "headers": [], "rows": [] } })),
        )
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let url = format!("{}{}", server.uri(), VIEW_PATH);

    let outcome = pipeline(store).run(&url).await;

    assert!(matches!(outcome, RefreshOutcome::FetchFailed(_)));
}
