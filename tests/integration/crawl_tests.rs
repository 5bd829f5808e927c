//! Integration tests for the crawler
//!
//! These tests use wiremock to stand in for the blog API and run the full
//! probe, bootstrap, crawl and save cycle end-to-end in both dialects.

use serde_json::json;
use tumbl_tally::config::{parse_config, Config};
use tumbl_tally::crawler::{crawl, CancelHandle, CrawlEngine};
use tumbl_tally::output::{load_statistics, BlogStatistics};
use tumbl_tally::storage::{save_report, SnapshotStore, SqliteStorage};
use tumbl_tally::{CrawlStatus, PostType};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BLOG: &str = "demo.example.com";
const BLOG_URL: &str = "https://demo.example.com";

/// Creates a test configuration pointing the API at the mock server
fn create_test_config(mode: &str, endpoint: &str, extra_crawl: &str, db_path: &str) -> Config {
    let toml = format!(
        r#"
[api]
mode = "{mode}"
api-key = "TESTKEY"
endpoint = "{endpoint}"

[crawl]
{extra_crawl}

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = "{db_path}"
"#
    );
    parse_config(&toml).expect("test config should be valid")
}

fn json_posts_page(total: u64, ids: std::ops::Range<u64>) -> String {
    let posts: Vec<serde_json::Value> = ids
        .map(|id| {
            let kind = if id % 2 == 0 { "photo" } else { "text" };
            json!({
                "id": id,
                "id_string": id.to_string(),
                "type": kind,
                "timestamp": 1_400_000_000 + id,
                "tags": [format!("tag{}", id % 5), "common"],
                "photos": [{
                    "original_size": {"url": format!("https://m.example.com/{}.jpg", id), "width": 800, "height": 600},
                    "alt_sizes": [{"url": format!("https://m.example.com/{}_500.jpg", id), "width": 500, "height": 375}]
                }]
            })
        })
        .collect();

    json!({
        "meta": {"status": 200, "msg": "OK"},
        "response": {
            "blog": {
                "name": "demo", "title": "Demo Blog", "description": "A demo blog",
                "url": "https://demo.example.com/", "posts": total, "updated": 1_400_000_500,
                "is_nsfw": false, "ask": true, "ask_anon": true
            },
            "posts": posts,
            "total_posts": total
        }
    })
    .to_string()
}

fn xml_posts_page(total: u64, ids: std::ops::Range<u64>) -> String {
    let posts: String = ids
        .map(|id| {
            if id % 3 == 0 {
                format!(
                    r#"<post id="{id}" type="photo" unix-timestamp="{ts}" width="1000" height="500">
  <photo-url max-width="1280">https://m.example.com/{id}_1280.jpg</photo-url>
  <photo-url max-width="500">https://m.example.com/{id}_500.jpg</photo-url>
  <tag>pics</tag>
</post>
"#,
                    ts = 1_400_000_000 + id
                )
            } else {
                format!(
                    r#"<post id="{id}" type="regular" unix-timestamp="{ts}">
  <regular-body>&lt;p&gt;post {id}&lt;/p&gt;</regular-body>
  <tag>words</tag>
</post>
"#,
                    ts = 1_400_000_000 + id
                )
            }
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<tumblr version="1.0">
<tumblelog name="demo" timezone="US/Eastern" title="Demo Blog">A demo blog</tumblelog>
<posts start="0" total="{total}">
{posts}</posts>
</tumblr>"#
    )
}

async fn mount_json(server: &MockServer, offset: u64, limit: u32, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/v2/blog/{}/posts", BLOG)))
        .and(query_param("offset", offset.to_string()))
        .and(query_param("limit", limit.to_string()))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn mount_xml(server: &MockServer, start: u64, num: u32, body: String) {
    Mock::given(method("GET"))
        .and(path("/api/read"))
        .and(query_param("start", start.to_string()))
        .and(query_param("num", num.to_string()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/xml"),
        )
        .mount(server)
        .await;
}

fn json_ok(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "application/json")
}

async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|r| r.len())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_full_json_crawl_and_snapshot() {
    let server = MockServer::start().await;
    mount_json(&server, 0, 1, json_ok(json_posts_page(45, 0..1))).await;
    mount_json(&server, 0, 20, json_ok(json_posts_page(45, 0..20))).await;
    mount_json(&server, 20, 20, json_ok(json_posts_page(45, 20..40))).await;
    mount_json(&server, 40, 20, json_ok(json_posts_page(45, 40..45))).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tally.db");
    let config = create_test_config(
        "json",
        &server.uri(),
        r#"image-size = "medium""#,
        db_path.to_str().unwrap(),
    );

    let engine = CrawlEngine::from_config(&config).unwrap();
    let report = crawl(&engine, BLOG, CancelHandle::new()).await;

    assert_eq!(report.status, CrawlStatus::Completed);
    assert_eq!(report.blog.url, BLOG_URL);
    assert_eq!(report.blog.title, "Demo Blog");
    assert!(report.blog.anonymous_asks_enabled);
    assert_eq!(report.blog.post_count(), 45);
    assert_eq!(report.progress.percent_complete, 100);
    assert_eq!(report.type_counters.get(&PostType::Photo), Some(&23));
    assert_eq!(report.type_counters.get(&PostType::Text), Some(&22));
    assert_eq!(report.tag_index.len(), 6);
    assert_eq!(request_count(&server).await, 4);

    let photo = report
        .blog
        .sorted_posts()
        .into_iter()
        .find(|p| p.post_type == PostType::Photo)
        .unwrap();
    let variants = photo.photo_variants.as_ref().unwrap();
    assert_eq!(variants.len(), 1);
    assert_eq!(variants[0].width, 500);

    let mut storage = SqliteStorage::new(&db_path).unwrap();
    storage
        .save_snapshot(&report.blog, report.status, "hash")
        .unwrap();

    let stored = load_statistics(&storage, BLOG_URL, 3).unwrap().unwrap();
    let live = BlogStatistics::from_report(&report, 3);
    assert_eq!(stored.stored_posts, 45);
    assert_eq!(stored.posts_by_type, live.posts_by_type);
    assert_eq!(stored.unique_tags, live.unique_tags);
    assert_eq!(stored.top_tags[0], ("common".to_string(), 45));
    assert_eq!(stored.status, Some(CrawlStatus::Completed));
}

#[tokio::test]
async fn test_full_xml_crawl() {
    let server = MockServer::start().await;
    mount_xml(&server, 0, 1, xml_posts_page(120, 0..1)).await;
    mount_xml(&server, 0, 50, xml_posts_page(120, 0..50)).await;
    mount_xml(&server, 50, 50, xml_posts_page(120, 50..100)).await;
    mount_xml(&server, 100, 50, xml_posts_page(120, 100..120)).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tally.db");
    let config = create_test_config("xml", &server.uri(), "", db_path.to_str().unwrap());

    let engine = CrawlEngine::from_config(&config).unwrap();
    let report = crawl(&engine, BLOG, CancelHandle::new()).await;

    assert_eq!(report.status, CrawlStatus::Completed);
    assert_eq!(report.blog.name, "demo");
    assert_eq!(report.blog.description, "A demo blog");
    assert!(!report.blog.is_adult_content);
    assert_eq!(report.blog.declared_total_posts, 120);
    assert_eq!(report.blog.post_count(), 120);
    assert_eq!(report.type_counters.get(&PostType::Photo), Some(&40));
    assert_eq!(report.type_counters.get(&PostType::Text), Some(&80));
    assert_eq!(
        report.tag_index.iter().cloned().collect::<Vec<_>>(),
        vec!["pics".to_string(), "words".to_string()]
    );

    let photo = report
        .blog
        .posts()
        .find(|p| p.post_type == PostType::Photo)
        .unwrap();
    let variant = &photo.photo_variants.as_ref().unwrap()[0];
    assert!(variant.url.ends_with("_1280.jpg"));
    assert_eq!(variant.width, 1000);
    assert_eq!(variant.height, 500);
}

#[tokio::test]
async fn test_nonexistent_blog_is_invalid_source() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string(
            r#"{"meta":{"status":404,"msg":"Not Found"},"response":[]}"#,
        ))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tally.db");
    let config = create_test_config("json", &server.uri(), "", db_path.to_str().unwrap());

    let engine = CrawlEngine::from_config(&config).unwrap();
    assert!(!engine.probe(BLOG).await);

    let report = crawl(&engine, BLOG, CancelHandle::new()).await;
    assert_eq!(report.status, CrawlStatus::InvalidSource);
    assert_eq!(report.blog.url, BLOG_URL);
    assert_eq!(report.blog.post_count(), 0);
    assert_eq!(report.progress.pages_fetched, 0);
    // One probe from `probe`, one from `crawl`; no page queries
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn test_outage_on_recrawl_keeps_stored_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tally.db");

    let healthy = MockServer::start().await;
    mount_json(&healthy, 0, 1, json_ok(json_posts_page(45, 0..1))).await;
    mount_json(&healthy, 0, 20, json_ok(json_posts_page(45, 0..20))).await;
    mount_json(&healthy, 20, 20, json_ok(json_posts_page(45, 20..40))).await;
    mount_json(&healthy, 40, 20, json_ok(json_posts_page(45, 40..45))).await;

    let config = create_test_config("json", &healthy.uri(), "", db_path.to_str().unwrap());
    let engine = CrawlEngine::from_config(&config).unwrap();
    let report = crawl(&engine, BLOG, CancelHandle::new()).await;
    let mut storage = SqliteStorage::new(&db_path).unwrap();
    assert!(save_report(&mut storage, &report, "hash").unwrap());

    let down = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&down)
        .await;

    let config = create_test_config("json", &down.uri(), "", db_path.to_str().unwrap());
    let engine = CrawlEngine::from_config(&config).unwrap();
    let report = crawl(&engine, BLOG, CancelHandle::new()).await;
    assert_eq!(report.status, CrawlStatus::InvalidSource);
    assert!(!save_report(&mut storage, &report, "hash").unwrap());

    let stored = storage.load_snapshot(BLOG_URL).unwrap().unwrap();
    assert_eq!(stored.post_count(), 45);
    assert_eq!(stored.title, "Demo Blog");
    let info = storage.snapshot_info(BLOG_URL).unwrap().unwrap();
    assert_eq!(info.status, CrawlStatus::Completed);
}

#[tokio::test]
async fn test_failure_mid_crawl_keeps_partial_results() {
    let server = MockServer::start().await;
    mount_json(&server, 0, 1, json_ok(json_posts_page(45, 0..1))).await;
    mount_json(&server, 0, 20, json_ok(json_posts_page(45, 0..20))).await;
    mount_json(&server, 20, 20, ResponseTemplate::new(500)).await;
    mount_json(&server, 40, 20, json_ok(json_posts_page(45, 40..45))).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tally.db");
    let config = create_test_config("json", &server.uri(), "", db_path.to_str().unwrap());

    let engine = CrawlEngine::from_config(&config).unwrap();
    let report = crawl(&engine, BLOG, CancelHandle::new()).await;

    assert_eq!(report.status, CrawlStatus::UnableToDownload);
    assert_eq!(report.blog.post_count(), 20);
    assert_eq!(report.progress.parsed_count, 20);
    assert_eq!(report.progress.percent_complete, 44);
    assert_eq!(request_count(&server).await, 3);

    let mut storage = SqliteStorage::new(&db_path).unwrap();
    storage
        .save_snapshot(&report.blog, report.status, "hash")
        .unwrap();
    let info = storage.snapshot_info(BLOG_URL).unwrap().unwrap();
    assert_eq!(info.status, CrawlStatus::UnableToDownload);
    assert_eq!(info.stored_posts, 20);
}

#[tokio::test]
async fn test_zero_declared_total_completes_immediately() {
    let server = MockServer::start().await;
    mount_json(&server, 0, 1, json_ok(json_posts_page(0, 0..0))).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tally.db");
    let config = create_test_config("json", &server.uri(), "", db_path.to_str().unwrap());

    let engine = CrawlEngine::from_config(&config).unwrap();
    let report = crawl(&engine, BLOG, CancelHandle::new()).await;

    assert_eq!(report.status, CrawlStatus::Completed);
    assert_eq!(report.progress.percent_complete, 0);
    assert!(report.tag_index.is_empty());
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_concurrent_pages_match_sequential_results() {
    let server = MockServer::start().await;
    mount_json(&server, 0, 1, json_ok(json_posts_page(45, 0..1))).await;
    mount_json(&server, 0, 20, json_ok(json_posts_page(45, 0..20))).await;
    mount_json(&server, 20, 20, json_ok(json_posts_page(45, 20..40))).await;
    mount_json(&server, 40, 20, json_ok(json_posts_page(45, 40..45))).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tally.db");

    let sequential = create_test_config("json", &server.uri(), "", db_path.to_str().unwrap());
    let concurrent = create_test_config(
        "json",
        &server.uri(),
        "max-concurrent-pages = 3",
        db_path.to_str().unwrap(),
    );

    let a = crawl(
        &CrawlEngine::from_config(&sequential).unwrap(),
        BLOG,
        CancelHandle::new(),
    )
    .await;
    let b = crawl(
        &CrawlEngine::from_config(&concurrent).unwrap(),
        BLOG,
        CancelHandle::new(),
    )
    .await;

    assert_eq!(a.status, b.status);
    assert_eq!(a.tag_index, b.tag_index);
    assert_eq!(a.type_counters, b.type_counters);
    assert_eq!(a.blog.post_count(), b.blog.post_count());
    assert_eq!(a.progress.parsed_count, b.progress.parsed_count);
}

#[tokio::test]
async fn test_photo_only_and_max_posts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/blog/{}/posts/photo", BLOG)))
        .and(query_param("limit", "1"))
        .respond_with(json_ok(json_posts_page(100, 0..1)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/blog/{}/posts/photo", BLOG)))
        .and(query_param("offset", "0"))
        .and(query_param("limit", "20"))
        .respond_with(json_ok(json_posts_page(100, 0..20)))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tally.db");
    let config = create_test_config(
        "json",
        &server.uri(),
        "post-type = \"photo\"\nmax-posts = 15",
        db_path.to_str().unwrap(),
    );

    let engine = CrawlEngine::from_config(&config).unwrap();
    let report = crawl(&engine, BLOG, CancelHandle::new()).await;

    assert_eq!(report.status, CrawlStatus::Completed);
    assert_eq!(report.progress.total_target, 15);
    assert_eq!(report.progress.parsed_count, 15);
    assert_eq!(report.progress.percent_complete, 100);
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn test_cancelled_before_start_fetches_no_pages() {
    let server = MockServer::start().await;
    mount_json(&server, 0, 1, json_ok(json_posts_page(45, 0..1))).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tally.db");
    let config = create_test_config("json", &server.uri(), "", db_path.to_str().unwrap());

    let cancel = CancelHandle::new();
    cancel.cancel();

    let engine = CrawlEngine::from_config(&config).unwrap();
    let report = crawl(&engine, BLOG, cancel).await;

    assert_eq!(report.status, CrawlStatus::Completed);
    assert_eq!(report.blog.post_count(), 0);
    assert_eq!(report.blog.declared_total_posts, 45);
    assert_eq!(request_count(&server).await, 1);
}
