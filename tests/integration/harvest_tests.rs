//! Integration tests for the harvester
//!
//! These tests use wiremock to simulate the remote content service and
//! exercise the full harvest cycle end-to-end: pagination, bounded-concurrency
//! dispatch, failure isolation, and sink resumption.

use frond::config::{
    ChildRule, CollectionDescriptor, Config, ExtractionConfig, HarvesterConfig, ListingRules,
    OutputConfig, ServiceConfig, SourceFormat,
};
use frond::harvest::run_harvest;
use frond::model::{CollectionKind, PaginationProtocol};
use frond::FrondError;
use serde_json::json;
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration against the given mock server
fn create_test_config(
    base_url: &str,
    dir: &Path,
    collections: Vec<CollectionDescriptor>,
    extraction: ExtractionConfig,
) -> Config {
    Config {
        harvester: HarvesterConfig {
            concurrency: 4,
            page_size: 2,
            page_delay_ms: 0,
            request_interval_ms: 0,
            max_retries: 0,
            retry_backoff_ms: 1,
            failure_threshold: 100,
        },
        service: ServiceConfig {
            base_url: base_url.to_string(),
            token_env: None,
            user_agent: "frond-test/1.0".to_string(),
        },
        output: OutputConfig {
            dataset_path: dir.join("dataset.jsonl").to_string_lossy().into_owned(),
            failure_log_path: dir.join("failures.jsonl").to_string_lossy().into_owned(),
        },
        collections,
        extraction,
    }
}

fn offset_collection(id: &str, locator: &str) -> CollectionDescriptor {
    CollectionDescriptor {
        id: id.to_string(),
        kind: CollectionKind::Space,
        protocol: PaginationProtocol::Offset,
        locator: locator.to_string(),
        item_locator: Some("/api/item/{id}".to_string()),
        item_selector: None,
        next_selector: None,
    }
}

fn json_extraction() -> ExtractionConfig {
    let mut metadata = BTreeMap::new();
    metadata.insert("author".to_string(), "/author".to_string());

    ExtractionConfig {
        source: SourceFormat::Json,
        id: "/id".to_string(),
        title: "/title".to_string(),
        body: "/body/value".to_string(),
        body_is_html: true,
        metadata,
        listing: ListingRules::default(),
        children: vec![],
    }
}

/// Mounts listing pages of item ids at `/listing`, chained with next links
async fn mount_listing(server: &MockServer, pages: &[&[&str]]) {
    let mut start = 0u64;
    for (index, page) in pages.iter().enumerate() {
        let stubs: Vec<_> = page.iter().map(|id| json!({"id": id})).collect();
        let links = if index + 1 < pages.len() {
            json!({"next": "/listing"})
        } else {
            json!({})
        };

        Mock::given(method("GET"))
            .and(path("/listing"))
            .and(query_param("start", start.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": stubs,
                "_links": links
            })))
            .mount(server)
            .await;

        start += page.len() as u64;
    }
}

/// Mounts one item detail endpoint
async fn mount_item(server: &MockServer, id: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/api/item/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(item_detail(id)))
        .mount(server)
        .await;
}

fn item_detail(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "title": format!("Item {}", id),
        "body": {"value": format!("<p>Body of {}</p><p>Second paragraph.</p>", id)},
        "author": "alice"
    })
}

fn read_dataset(path: &str) -> Vec<serde_json::Value> {
    let content = std::fs::read_to_string(path).unwrap_or_default();
    content
        .lines()
        .map(|line| serde_json::from_str(line).expect("every dataset line parses"))
        .collect()
}

#[tokio::test]
async fn test_offset_pagination_covers_every_item() {
    let server = MockServer::start().await;

    // 5 items in pages of 2: the last page is short
    mount_listing(&server, &[&["1", "2"], &["3", "4"], &["5"]]).await;
    for id in ["1", "2", "3", "4", "5"] {
        mount_item(&server, id).await;
    }

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(
        &server.uri(),
        dir.path(),
        vec![offset_collection("ENG", "/listing")],
        json_extraction(),
    );
    let dataset_path = config.output.dataset_path.clone();

    let summary = run_harvest(config, true).await.expect("harvest failed");

    assert_eq!(summary.records_written, 5);
    assert_eq!(summary.items_failed, 0);
    assert_eq!(summary.collections_completed, 1);

    let records = read_dataset(&dataset_path);
    assert_eq!(records.len(), 5);

    let ids: HashSet<&str> = records.iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids.len(), 5, "no duplicates, no gaps");

    // Extraction stripped markup but kept paragraph boundaries
    let first = records
        .iter()
        .find(|r| r["id"] == "1")
        .expect("item 1 present");
    assert_eq!(first["body_text"], "Body of 1\nSecond paragraph.");
    assert_eq!(first["metadata"]["author"], "alice");
    assert_eq!(first["metadata"]["collection"], "ENG");
}

#[tokio::test]
async fn test_link_follow_collection_harvests_rendered_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/topics"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><body>
            <a class="question" href="{0}/q/1">Q1</a>
            <a class="question" href="{0}/q/2">Q2</a>
            <a class="next" href="{0}/topics2">next</a>
            </body></html>"#,
            server.uri()
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/topics2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><body><a class="question" href="{}/q/3">Q3</a></body></html>"#,
            server.uri()
        )))
        .mount(&server)
        .await;

    for q in ["1", "2", "3"] {
        Mock::given(method("GET"))
            .and(path(format!("/q/{}", q)))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"<html><body>
                <h1 class="title">Question {0}</h1>
                <div class="post"><p>How does {0} work?</p><p>Details.</p></div>
                </body></html>"#,
                q
            )))
            .mount(&server)
            .await;
    }

    let collection = CollectionDescriptor {
        id: "forum".to_string(),
        kind: CollectionKind::Topic,
        protocol: PaginationProtocol::LinkFollow,
        locator: "/topics".to_string(),
        item_locator: None,
        item_selector: Some("a.question".to_string()),
        next_selector: Some("a.next".to_string()),
    };
    let extraction = ExtractionConfig {
        source: SourceFormat::Html,
        id: "@reference".to_string(),
        title: "h1.title".to_string(),
        body: "div.post".to_string(),
        body_is_html: false,
        metadata: BTreeMap::new(),
        listing: ListingRules::default(),
        children: vec![],
    };

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server.uri(), dir.path(), vec![collection], extraction);
    let dataset_path = config.output.dataset_path.clone();

    let summary = run_harvest(config, true).await.expect("harvest failed");

    assert_eq!(summary.records_written, 3);

    let records = read_dataset(&dataset_path);
    let q1 = records
        .iter()
        .find(|r| r["title"] == "Question 1")
        .expect("question 1 present");
    assert_eq!(q1["body_text"], "How does 1 work?\nDetails.");
    // Link-follow ids are the resolved item URLs
    assert!(q1["id"].as_str().unwrap().ends_with("/q/1"));
}

#[tokio::test]
async fn test_single_broken_item_is_isolated() {
    let server = MockServer::start().await;

    let ids: Vec<String> = (1..=10).map(|i| i.to_string()).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    mount_listing(&server, &[&id_refs[..5], &id_refs[5..]]).await;

    for id in &ids {
        if id == "7" {
            Mock::given(method("GET"))
                .and(path("/api/item/7"))
                .respond_with(ResponseTemplate::new(500))
                .mount(&server)
                .await;
        } else {
            mount_item(&server, id).await;
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(
        &server.uri(),
        dir.path(),
        vec![offset_collection("ENG", "/listing")],
        json_extraction(),
    );
    let dataset_path = config.output.dataset_path.clone();
    let failure_log_path = config.output.failure_log_path.clone();

    let summary = run_harvest(config, true).await.expect("run must complete");

    assert_eq!(summary.records_written, 9);
    assert_eq!(summary.items_failed, 1);

    let records = read_dataset(&dataset_path);
    assert_eq!(records.len(), 9);
    assert!(records.iter().all(|r| r["id"] != "7"));

    let failures = std::fs::read_to_string(&failure_log_path).unwrap();
    let events: Vec<serde_json::Value> = failures
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["id"], "7");
    assert_eq!(events[0]["collection"], "ENG");
}

#[tokio::test]
async fn test_resumed_rerun_is_idempotent() {
    let server = MockServer::start().await;

    mount_listing(&server, &[&["1", "2"], &["3"]]).await;
    for id in ["1", "2", "3"] {
        mount_item(&server, id).await;
    }

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(
        &server.uri(),
        dir.path(),
        vec![offset_collection("ENG", "/listing")],
        json_extraction(),
    );
    let dataset_path = config.output.dataset_path.clone();

    let first = run_harvest(config.clone(), true).await.unwrap();
    assert_eq!(first.records_written, 3);

    // Second run resumes against the unchanged backend and same output
    let second = run_harvest(config, false).await.unwrap();
    assert_eq!(second.records_written, 0);
    assert_eq!(second.items_skipped, 3);

    let records = read_dataset(&dataset_path);
    assert_eq!(records.len(), 3);
    let ids: HashSet<&str> = records.iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids.len(), 3, "no duplicate ids after the merged runs");
}

#[tokio::test]
async fn test_concurrency_stays_bounded() {
    let server = MockServer::start().await;

    let ids: Vec<String> = (1..=6).map(|i| i.to_string()).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    mount_listing(&server, &[&id_refs[..]]).await;

    for id in &ids {
        Mock::given(method("GET"))
            .and(path(format!("/api/item/{}", id)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(item_detail(id))
                    .set_delay(Duration::from_millis(150)),
            )
            .mount(&server)
            .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(
        &server.uri(),
        dir.path(),
        vec![offset_collection("ENG", "/listing")],
        json_extraction(),
    );
    config.harvester.concurrency = 2;

    let started = std::time::Instant::now();
    let summary = run_harvest(config, true).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(summary.records_written, 6);
    // 6 items of 150ms each under a bound of 2 need at least 3 sequential
    // waves; finishing faster would mean more than 2 were in flight at once
    assert!(
        elapsed >= Duration::from_millis(450),
        "6 fetches finished in {:?}, concurrency bound violated",
        elapsed
    );
}

#[tokio::test]
async fn test_authorization_rejection_aborts_the_run() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/listing"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(
        &server.uri(),
        dir.path(),
        vec![
            offset_collection("ENG", "/listing"),
            offset_collection("OPS", "/listing"),
        ],
        json_extraction(),
    );
    let dataset_path = config.output.dataset_path.clone();

    let result = run_harvest(config, true).await;
    assert!(matches!(
        result,
        Err(FrondError::Authorization { status: 401, .. })
    ));

    // Nothing was harvested, and the second collection was never attempted
    assert_eq!(read_dataset(&dataset_path).len(), 0);
}

#[tokio::test]
async fn test_failure_threshold_aborts_the_run() {
    let server = MockServer::start().await;

    let ids: Vec<String> = (1..=10).map(|i| i.to_string()).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    mount_listing(&server, &[&id_refs[..]]).await;

    // Every item is broken
    for id in &ids {
        Mock::given(method("GET"))
            .and(path(format!("/api/item/{}", id)))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(
        &server.uri(),
        dir.path(),
        vec![offset_collection("ENG", "/listing")],
        json_extraction(),
    );
    config.harvester.failure_threshold = 3;

    let result = run_harvest(config, true).await;
    assert!(matches!(
        result,
        Err(FrondError::FailureThreshold { failures } ) if failures >= 3
    ));
}

#[tokio::test]
async fn test_unavailable_collection_does_not_stop_the_next() {
    let server = MockServer::start().await;

    // First collection's listing is broken outright
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    mount_listing(&server, &[&["1", "2"]]).await;
    for id in ["1", "2"] {
        mount_item(&server, id).await;
    }

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(
        &server.uri(),
        dir.path(),
        vec![
            offset_collection("BAD", "/broken"),
            offset_collection("ENG", "/listing"),
        ],
        json_extraction(),
    );
    let dataset_path = config.output.dataset_path.clone();

    let summary = run_harvest(config, true).await.expect("run must continue");

    assert_eq!(summary.collections_unavailable, 1);
    assert_eq!(summary.collections_completed, 1);
    assert_eq!(summary.records_written, 2);
    assert_eq!(read_dataset(&dataset_path).len(), 2);
}

#[tokio::test]
async fn test_children_are_flattened_into_shallow_refs() {
    let server = MockServer::start().await;

    mount_listing(&server, &[&["1"]]).await;
    mount_item(&server, "1").await;

    // Comments for item 1, paginated across two pages
    Mock::given(method("GET"))
        .and(path("/api/item/1/comments"))
        .and(query_param("start", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "c1", "author": "bob", "when": "2024-01-01", "text": "<p>first</p>"},
                {"id": "c2", "author": "eve", "when": "2024-01-02", "text": "<p>second</p>"}
            ],
            "_links": {"next": "/api/item/1/comments"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/item/1/comments"))
        .and(query_param("start", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "c3", "author": "bob", "when": "2024-01-03", "text": "<p>third</p>"}
            ],
            "_links": {}
        })))
        .mount(&server)
        .await;

    let mut extraction = json_extraction();
    extraction.children.push(ChildRule {
        kind: "comment".to_string(),
        locator: "/api/item/{id}/comments".to_string(),
        id: "/id".to_string(),
        author: Some("/author".to_string()),
        timestamp: Some("/when".to_string()),
        body: Some("/text".to_string()),
        body_is_html: true,
    });

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(
        &server.uri(),
        dir.path(),
        vec![offset_collection("ENG", "/listing")],
        extraction,
    );
    let dataset_path = config.output.dataset_path.clone();

    let summary = run_harvest(config, true).await.unwrap();
    assert_eq!(summary.records_written, 1);

    let records = read_dataset(&dataset_path);
    let children = records[0]["children"].as_array().unwrap();
    assert_eq!(children.len(), 3);
    assert_eq!(children[0]["kind"], "comment");
    assert_eq!(children[0]["author"], "bob");
    assert_eq!(children[0]["body"], "first");
    // The record carries no partial marker when everything extracted
    assert!(records[0]["metadata"].get("partial_fields").is_none());
}

#[tokio::test]
async fn test_failed_sub_fetch_degrades_to_partial_record() {
    let server = MockServer::start().await;

    mount_listing(&server, &[&["1"]]).await;
    mount_item(&server, "1").await;

    Mock::given(method("GET"))
        .and(path("/api/item/1/comments"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut extraction = json_extraction();
    extraction.children.push(ChildRule {
        kind: "comment".to_string(),
        locator: "/api/item/{id}/comments".to_string(),
        id: "/id".to_string(),
        author: None,
        timestamp: None,
        body: Some("/text".to_string()),
        body_is_html: false,
    });

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(
        &server.uri(),
        dir.path(),
        vec![offset_collection("ENG", "/listing")],
        extraction,
    );
    let dataset_path = config.output.dataset_path.clone();

    let summary = run_harvest(config, true).await.unwrap();

    // The record still ships, marked incomplete
    assert_eq!(summary.records_written, 1);
    assert_eq!(summary.items_failed, 0);

    let records = read_dataset(&dataset_path);
    let partial = records[0]["metadata"]["partial_fields"].as_array().unwrap();
    assert!(partial.contains(&json!("children:comment")));
    assert_eq!(records[0]["children"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_missing_fields_become_explicit_sentinels() {
    let server = MockServer::start().await;

    mount_listing(&server, &[&["1"]]).await;

    // Detail without title or author
    Mock::given(method("GET"))
        .and(path("/api/item/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "1",
            "body": {"value": "<p>only a body</p>"}
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(
        &server.uri(),
        dir.path(),
        vec![offset_collection("ENG", "/listing")],
        json_extraction(),
    );
    let dataset_path = config.output.dataset_path.clone();

    let summary = run_harvest(config, true).await.unwrap();
    assert_eq!(summary.records_written, 1);

    let records = read_dataset(&dataset_path);
    assert_eq!(records[0]["title"], "");
    assert_eq!(records[0]["metadata"]["author"], serde_json::Value::Null);

    let partial = records[0]["metadata"]["partial_fields"].as_array().unwrap();
    assert!(partial.contains(&json!("title")));
    assert!(partial.contains(&json!("author")));
}
