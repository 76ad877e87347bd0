//! The batch crawl loop: for each comic and date, run the adapter and store
//! what it found.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::comics;
use crate::crawler::{CrawlSession, Crawler};
use crate::db::Database;
use crate::download;

/// Comics crawled at once. Each comic still crawls its own dates in order.
const CONCURRENT_CRAWLS: usize = 4;

#[derive(Debug, PartialEq, Eq)]
enum CrawlOutcome {
    Added,
    AlreadyArchived,
    NoRelease,
    Skipped,
}

pub struct Aggregator {
    client: Client,
    db: Arc<Database>,
    crawling: Arc<RwLock<bool>>,
}

impl Aggregator {
    pub fn new(db: Arc<Database>, user_agent: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            db,
            crawling: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn is_crawling(&self) -> bool {
        *self.crawling.read().await
    }

    /// Crawl every active comic in the catalog. A second call while one is
    /// running is a no-op.
    pub async fn crawl_all(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> anyhow::Result<()> {
        {
            let mut crawling = self.crawling.write().await;
            if *crawling {
                info!("Crawl already in progress, skipping");
                return Ok(());
            }
            *crawling = true;
        }

        let crawlers: Vec<_> = comics::all()
            .into_iter()
            .filter(|crawler| crawler.meta().active)
            .collect();
        let result = self.do_crawl(crawlers, from, to).await;

        {
            let mut crawling = self.crawling.write().await;
            *crawling = false;
        }

        result
    }

    /// Crawl an explicit list of comics by slug; retired comics are allowed
    /// here so old archives can be backfilled.
    pub async fn crawl_slugs(
        &self,
        slugs: &[String],
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> anyhow::Result<()> {
        let mut crawlers = Vec::new();
        for slug in slugs {
            let crawler =
                comics::by_slug(slug).with_context(|| format!("unknown comic {slug:?}"))?;
            crawlers.push(crawler);
        }
        self.do_crawl(crawlers, from, to).await
    }

    async fn do_crawl(
        &self,
        crawlers: Vec<Box<dyn Crawler>>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> anyhow::Result<()> {
        info!("Crawling {} comics", crawlers.len());

        let tasks: Vec<_> = crawlers
            .into_iter()
            .map(|crawler| self.crawl_comic_logged(crawler, from, to))
            .collect();
        stream::iter(tasks)
            .buffer_unordered(CONCURRENT_CRAWLS)
            .collect::<Vec<_>>()
            .await;

        info!("Crawl complete");
        Ok(())
    }

    async fn crawl_comic_logged(
        &self,
        crawler: Box<dyn Crawler>,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) {
        if let Err(e) = self.crawl_comic(crawler.as_ref(), from, to).await {
            error!("Failed to crawl '{}': {}", crawler.meta().slug, e);
        }
    }

    /// Crawl one comic over an inclusive date range, defaulting to the
    /// comic's current date. The range is clamped to what the crawler can
    /// actually answer for.
    pub async fn crawl_comic(
        &self,
        crawler: &dyn Crawler,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> anyhow::Result<u32> {
        let meta = crawler.meta();
        let comic = self
            .db
            .get_comic_by_slug(meta.slug)
            .await?
            .with_context(|| format!("comic {:?} not in database", meta.slug))?;

        let today = crawler.current_date();
        let to = to.unwrap_or(today).min(today);
        let from = from.unwrap_or(to).max(crawler.earliest_date());

        debug!("Crawling '{}' from {} to {}", meta.slug, from, to);
        let session = CrawlSession::for_crawler(self.client.clone(), crawler);

        let mut added = 0;
        let mut last_error = None;
        let mut date = from;
        while date <= to {
            match self.crawl_one_date(&session, crawler, comic.id, date).await {
                Ok(CrawlOutcome::Added) => {
                    info!("Added release for '{}' on {}", meta.slug, date);
                    added += 1;
                }
                Ok(CrawlOutcome::AlreadyArchived) => {
                    debug!("'{}' already has a release on {}", meta.slug, date);
                }
                Ok(CrawlOutcome::NoRelease) => {
                    debug!("No release found for '{}' on {}", meta.slug, date);
                }
                Ok(CrawlOutcome::Skipped) => {}
                Err(e) => {
                    warn!("Crawling '{}' on {} failed: {}", meta.slug, date, e);
                    last_error = Some(e.to_string());
                }
            }
            let Some(next) = date.succ_opt() else {
                break;
            };
            date = next;
        }

        self.db
            .update_comic_crawled(comic.id, last_error.as_deref())
            .await?;
        Ok(added)
    }

    async fn crawl_one_date(
        &self,
        session: &CrawlSession,
        crawler: &dyn Crawler,
        comic_id: i64,
        pub_date: NaiveDate,
    ) -> anyhow::Result<CrawlOutcome> {
        if self.db.release_exists(comic_id, pub_date).await? {
            return Ok(CrawlOutcome::AlreadyArchived);
        }

        if let Err(e) = crawler.check_release_date(pub_date) {
            if e.is_schedule_miss() {
                debug!(
                    "Skipping {} for '{}': {}",
                    pub_date,
                    crawler.meta().slug,
                    e
                );
                return Ok(CrawlOutcome::Skipped);
            }
            return Err(e.into());
        }

        let images = crawler.crawl(session, pub_date).await?;
        if images.is_empty() {
            return Ok(CrawlOutcome::NoRelease);
        }

        let mut image_ids = Vec::with_capacity(images.len());
        for image in &images {
            let checksum = download::image_checksum(session, &image.url).await?;
            let image_id = match self.db.find_image(comic_id, &checksum).await? {
                Some(existing) => {
                    debug!(
                        "Image {} already stored for '{}', reusing",
                        image.url,
                        crawler.meta().slug
                    );
                    existing.id
                }
                None => {
                    self.db
                        .insert_image(
                            comic_id,
                            &image.url,
                            &checksum,
                            image.title.as_deref(),
                            image.text.as_deref(),
                        )
                        .await?
                }
            };
            image_ids.push(image_id);
        }

        self.db.add_release(comic_id, pub_date, &image_ids).await?;
        Ok(CrawlOutcome::Added)
    }
}

/// Crawl once at startup, then again on every interval tick.
pub async fn start_background_crawl(aggregator: Arc<Aggregator>, interval_minutes: u64) {
    let interval = Duration::from_secs(interval_minutes * 60);

    info!("Starting initial crawl");
    if let Err(e) = aggregator.crawl_all(None, None).await {
        error!("Initial crawl failed: {}", e);
    }

    loop {
        tokio::time::sleep(interval).await;
        info!("Starting scheduled crawl");
        if let Err(e) = aggregator.crawl_all(None, None).await {
            error!("Scheduled crawl failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{ComicMeta, CrawlerImage};
    use crate::error::CrawlResult;
    use crate::scheduling::{ymd, HistoryCapability};
    use async_trait::async_trait;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct TestComic {
        image_url: String,
        title: Option<String>,
    }

    #[async_trait]
    impl Crawler for TestComic {
        fn meta(&self) -> ComicMeta {
            ComicMeta {
                slug: "testcomic",
                name: "Test Comic",
                language: "en",
                url: "http://comic.example.com/",
                start_date: Some(ymd(2010, 1, 1)),
                end_date: None,
                active: true,
                rights: "Test Author",
            }
        }

        fn history(&self) -> HistoryCapability {
            HistoryCapability::Days(3650)
        }

        async fn crawl(
            &self,
            _session: &CrawlSession,
            _pub_date: NaiveDate,
        ) -> CrawlResult<Vec<CrawlerImage>> {
            Ok(vec![CrawlerImage {
                url: self.image_url.clone(),
                title: self.title.clone(),
                text: None,
            }])
        }
    }

    struct EmptyComic;

    #[async_trait]
    impl Crawler for EmptyComic {
        fn meta(&self) -> ComicMeta {
            TestComic {
                image_url: String::new(),
                title: None,
            }
            .meta()
        }

        async fn crawl(
            &self,
            _session: &CrawlSession,
            _pub_date: NaiveDate,
        ) -> CrawlResult<Vec<CrawlerImage>> {
            Ok(vec![])
        }
    }

    async fn create_test_db() -> Arc<Database> {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.initialize().await.unwrap();
        db.sync_comics(&[TestComic {
            image_url: String::new(),
            title: None,
        }
        .meta()])
            .await
            .unwrap();
        Arc::new(db)
    }

    async fn serve_image(server: &MockServer, route: &str, body: &[u8]) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_vec(), "image/png"))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_crawl_stores_release_and_image() {
        let server = MockServer::start().await;
        serve_image(&server, "/strip.png", b"image-bytes").await;

        let db = create_test_db().await;
        let aggregator = Aggregator::new(db.clone(), "strips-test/1.0");
        let comic = TestComic {
            image_url: format!("{}/strip.png", server.uri()),
            title: Some("Episode 1".to_string()),
        };

        let added = aggregator.crawl_comic(&comic, None, None).await.unwrap();
        assert_eq!(added, 1);

        let stored = db.get_comic_by_slug("testcomic").await.unwrap().unwrap();
        assert!(stored.last_crawled.is_some());
        assert!(stored.last_error.is_none());

        let release = db
            .get_latest_release_for_comic(stored.id)
            .await
            .unwrap()
            .unwrap();
        let images = db.get_images_for_release(release.id).await.unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].title.as_deref(), Some("Episode 1"));
    }

    #[tokio::test]
    async fn test_existing_release_is_not_recrawled() {
        let server = MockServer::start().await;
        serve_image(&server, "/strip.png", b"image-bytes").await;

        let db = create_test_db().await;
        let aggregator = Aggregator::new(db.clone(), "strips-test/1.0");
        let comic = TestComic {
            image_url: format!("{}/strip.png", server.uri()),
            title: None,
        };

        assert_eq!(aggregator.crawl_comic(&comic, None, None).await.unwrap(), 1);
        assert_eq!(aggregator.crawl_comic(&comic, None, None).await.unwrap(), 0);

        let stored = db.get_comic_by_slug("testcomic").await.unwrap().unwrap();
        assert_eq!(db.get_release_count_for_comic(stored.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_identical_image_is_reused_across_dates() {
        let server = MockServer::start().await;
        serve_image(&server, "/strip.png", b"same-bytes-every-day").await;

        let db = create_test_db().await;
        let aggregator = Aggregator::new(db.clone(), "strips-test/1.0");
        let comic = TestComic {
            image_url: format!("{}/strip.png", server.uri()),
            title: None,
        };

        let today = comic.current_date();
        let from = today - chrono::Duration::days(1);
        let added = aggregator
            .crawl_comic(&comic, Some(from), Some(today))
            .await
            .unwrap();
        assert_eq!(added, 2);

        let stored = db.get_comic_by_slug("testcomic").await.unwrap().unwrap();
        assert_eq!(db.get_release_count_for_comic(stored.id).await.unwrap(), 2);

        // Both releases point at the single stored image row.
        let dates = db.get_release_dates_for_comic(stored.id).await.unwrap();
        assert_eq!(dates.len(), 2);
        let first = db
            .get_releases_for_comic_on(stored.id, from)
            .await
            .unwrap();
        let second = db
            .get_releases_for_comic_on(stored.id, today)
            .await
            .unwrap();
        let first_images = db.get_images_for_release(first[0].id).await.unwrap();
        let second_images = db.get_images_for_release(second[0].id).await.unwrap();
        assert_eq!(first_images[0].id, second_images[0].id);
    }

    #[tokio::test]
    async fn test_no_release_is_not_an_error() {
        let db = create_test_db().await;
        let aggregator = Aggregator::new(db.clone(), "strips-test/1.0");

        let added = aggregator.crawl_comic(&EmptyComic, None, None).await.unwrap();
        assert_eq!(added, 0);

        let stored = db.get_comic_by_slug("testcomic").await.unwrap().unwrap();
        assert!(stored.last_error.is_none());
    }

    #[tokio::test]
    async fn test_broken_image_sets_last_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let db = create_test_db().await;
        let aggregator = Aggregator::new(db.clone(), "strips-test/1.0");
        let comic = TestComic {
            image_url: format!("{}/strip.png", server.uri()),
            title: None,
        };

        let added = aggregator.crawl_comic(&comic, None, None).await.unwrap();
        assert_eq!(added, 0);

        let stored = db.get_comic_by_slug("testcomic").await.unwrap().unwrap();
        assert!(stored.last_error.is_some());
        assert_eq!(db.get_release_count_for_comic(stored.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_slug_is_an_error() {
        let db = create_test_db().await;
        let aggregator = Aggregator::new(db, "strips-test/1.0");
        let result = aggregator
            .crawl_slugs(&["no-such-comic".to_string()], None, None)
            .await;
        assert!(result.is_err());
    }
}
