//! Integration tests for the strips webcomic aggregator
//!
//! These tests verify the full workflow from configuration loading through
//! crawling against a stubbed comic site and browsing the stored archive.

mod common {
    use tempfile::TempDir;

    /// Create a temporary directory for test databases
    pub fn create_temp_dir() -> TempDir {
        tempfile::tempdir().expect("Failed to create temp directory")
    }

    /// Create a test database path
    pub fn create_db_path(temp_dir: &TempDir) -> String {
        let db_path = temp_dir.path().join("test.db");
        format!("sqlite:{}?mode=rwc", db_path.display())
    }
}

#[cfg(test)]
mod config_integration_tests {
    use strips::config::Config;

    #[test]
    fn test_load_shipped_config() {
        let config = Config::load("strips.toml");
        assert!(config.is_ok(), "Failed to load strips.toml: {:?}", config.err());

        let config = config.unwrap();
        assert!(config.crawl_interval > 0, "crawl_interval should be positive");
        assert!(!config.user_agent.is_empty());
    }
}

#[cfg(test)]
mod catalog_integration_tests {
    use super::common::*;
    use strips::comics;
    use strips::db::Database;

    #[tokio::test]
    async fn test_catalog_syncs_into_database() {
        let temp_dir = create_temp_dir();
        let db = Database::new(&create_db_path(&temp_dir)).await.unwrap();
        db.initialize().await.unwrap();

        let metas: Vec<_> = comics::all().iter().map(|c| c.meta()).collect();
        db.sync_comics(&metas).await.unwrap();

        let stored = db.get_all_comics().await.unwrap();
        assert_eq!(stored.len(), metas.len());

        let xkcd = db.get_comic_by_slug("xkcd").await.unwrap().unwrap();
        assert_eq!(xkcd.name, "xkcd");
        assert!(xkcd.active);

        let reveland = db.get_comic_by_slug("reveland").await.unwrap().unwrap();
        assert!(!reveland.active);
        assert_eq!(reveland.end_date.as_deref(), Some("2013-04-17"));
    }

    #[tokio::test]
    async fn test_catalog_sync_is_idempotent() {
        let temp_dir = create_temp_dir();
        let db = Database::new(&create_db_path(&temp_dir)).await.unwrap();
        db.initialize().await.unwrap();

        let metas: Vec<_> = comics::all().iter().map(|c| c.meta()).collect();
        db.sync_comics(&metas).await.unwrap();
        db.sync_comics(&metas).await.unwrap();

        let stored = db.get_all_comics().await.unwrap();
        assert_eq!(stored.len(), metas.len());
    }
}

#[cfg(test)]
mod crawl_and_browse_tests {
    use super::common::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::{get, post};
    use axum::Router;
    use chrono::NaiveDate;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use strips::aggregator::Aggregator;
    use strips::crawler::{ComicMeta, CrawlSession, Crawler, CrawlerImage};
    use strips::db::Database;
    use strips::error::CrawlResult;
    use strips::routes::{self, AppState};
    use strips::scheduling::{ymd, HistoryCapability};

    /// A page-scraping crawler pointed at a stubbed comic site.
    struct StubComic {
        site: String,
    }

    #[async_trait]
    impl Crawler for StubComic {
        fn meta(&self) -> ComicMeta {
            ComicMeta {
                slug: "stubcomic",
                name: "Stub Comic",
                language: "en",
                url: "http://stub.example.com/",
                start_date: Some(ymd(2010, 1, 1)),
                end_date: None,
                active: true,
                rights: "Stub Author",
            }
        }

        fn history(&self) -> HistoryCapability {
            HistoryCapability::Days(3650)
        }

        async fn crawl(
            &self,
            session: &CrawlSession,
            pub_date: NaiveDate,
        ) -> CrawlResult<Vec<CrawlerImage>> {
            let page = session
                .parse_page(&format!("{}/strip/{}", self.site, pub_date))
                .await?;
            Ok(page
                .src("img.comic")
                .map(|url| CrawlerImage {
                    url,
                    title: page.alt("img.comic"),
                    text: page.title_attr("img.comic"),
                })
                .into_iter()
                .collect())
        }
    }

    async fn serve_strip(server: &MockServer, date: &str, image_bytes: &[u8]) {
        let html = format!(
            r#"<html><body>
                <img class="comic" src="/images/{date}.png" alt="Strip for {date}" title="hover text">
            </body></html>"#
        );
        Mock::given(method("GET"))
            .and(path(format!("/strip/{date}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(html))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/images/{date}.png")))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(image_bytes.to_vec(), "image/png"),
            )
            .mount(server)
            .await;
    }

    async fn setup() -> (tempfile::TempDir, Arc<Database>, Aggregator, StubComic, MockServer) {
        let temp_dir = create_temp_dir();
        let db = Database::new(&create_db_path(&temp_dir)).await.unwrap();
        db.initialize().await.unwrap();

        let server = MockServer::start().await;
        let comic = StubComic {
            site: server.uri(),
        };
        db.sync_comics(&[comic.meta()]).await.unwrap();

        let db = Arc::new(db);
        let aggregator = Aggregator::new(db.clone(), "strips-test/1.0");
        (temp_dir, db, aggregator, comic, server)
    }

    fn build_app(db: Arc<Database>, aggregator: Arc<Aggregator>) -> Router {
        let state = Arc::new(AppState {
            db,
            aggregator,
            site_url: "http://strips.example.com".to_string(),
        });
        Router::new()
            .route("/", get(routes::index))
            .route("/health", get(routes::health))
            .route("/crawl/status", get(routes::crawl_status))
            .route("/my", get(routes::my_latest))
            .route("/my/feed.xml", get(routes::my_feed))
            .route("/my/toggle", post(routes::toggle_subscription))
            .route("/my/:year/:month/:day", get(routes::my_day))
            .route("/:slug", get(routes::comic_latest))
            .route("/:slug/website", get(routes::comic_website))
            .route("/:slug/feed.xml", get(routes::comic_feed))
            .route("/:slug/:year/:month", get(routes::comic_month))
            .route("/:slug/:year/:month/:day", get(routes::comic_day))
            .with_state(state)
    }

    async fn body_of(app: &Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_crawl_then_browse_archive() {
        let (_temp_dir, db, aggregator, comic, server) = setup().await;

        // Three strips on the stub site, one per day
        let today = comic.current_date();
        for days_back in 0..3 {
            let date = today - chrono::Duration::days(days_back);
            serve_strip(&server, &date.to_string(), date.to_string().as_bytes()).await;
        }

        let from = today - chrono::Duration::days(2);
        let added = aggregator
            .crawl_comic(&comic, Some(from), Some(today))
            .await
            .unwrap();
        assert_eq!(added, 3);

        let app = build_app(db.clone(), Arc::new(aggregator));

        // Latest view shows today's strip
        let (status, body) = body_of(&app, "/stubcomic").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(&format!("/images/{today}.png")));
        assert!(body.contains("hover text"));

        // Day view for the oldest strip, with a link forward
        let day_uri = format!("/stubcomic/{}", from.format("%Y/%m/%d"));
        let (status, body) = body_of(&app, &day_uri).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(&format!("/images/{from}.png")));

        // The comic feed lists all three releases
        let (status, body) = body_of(&app, "/stubcomic/feed.xml").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.matches("<item>").count(), 3);
    }

    #[tokio::test]
    async fn test_recrawl_adds_nothing_new() {
        let (_temp_dir, db, aggregator, comic, server) = setup().await;

        let today = comic.current_date();
        serve_strip(&server, &today.to_string(), b"strip-bytes").await;

        assert_eq!(aggregator.crawl_comic(&comic, None, None).await.unwrap(), 1);
        assert_eq!(aggregator.crawl_comic(&comic, None, None).await.unwrap(), 0);

        let stored = db.get_comic_by_slug("stubcomic").await.unwrap().unwrap();
        assert_eq!(db.get_release_count_for_comic(stored.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_subscription_workflow_end_to_end() {
        let (_temp_dir, db, aggregator, comic, server) = setup().await;

        let today = comic.current_date();
        serve_strip(&server, &today.to_string(), b"strip-bytes").await;
        aggregator.crawl_comic(&comic, None, None).await.unwrap();

        let user = db.create_user("alice").await.unwrap();
        let app = build_app(db.clone(), Arc::new(aggregator));

        // Not subscribed yet: my comics is empty
        let (status, body) = body_of(&app, &format!("/my?key={}", user.secret_key)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body.contains("Stub Comic"));

        // Subscribe via the form endpoint
        let form = format!("key={}&slug=stubcomic", user.secret_key);
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/my/toggle")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from(form))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        // Now the release shows up in my comics and the personal feed
        let (_, body) = body_of(&app, &format!("/my?key={}", user.secret_key)).await;
        assert!(body.contains("Stub Comic"));

        let (_, body) = body_of(&app, &format!("/my/feed.xml?key={}", user.secret_key)).await;
        assert!(body.contains("Stub Comic"));
    }
}
