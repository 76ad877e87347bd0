//! The per-comic adapter contract.
//!
//! Every tracked comic supplies one [`Crawler`] implementation: a block of
//! metadata, the scheduling contract (history capability, publication
//! schedule, time zone), and a `crawl` routine that turns a publication date
//! into zero or more images by scraping the site's pages or feed.

mod feed;
mod page;

pub use feed::{FeedEntry, ParsedFeed};
pub use page::Page;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;

use crate::error::{CrawlError, CrawlResult};
use crate::scheduling::{self, HistoryCapability};

/// Static facts about a comic, mirrored into the database at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComicMeta {
    pub slug: &'static str,
    pub name: &'static str,
    pub language: &'static str,
    pub url: &'static str,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub active: bool,
    pub rights: &'static str,
}

/// One image reported by a crawl, with optional title and caption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlerImage {
    pub url: String,
    pub title: Option<String>,
    pub text: Option<String>,
}

impl CrawlerImage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            text: None,
        }
    }
}

/// A per-comic adapter. Implementations override only what their site needs;
/// the scheduling defaults describe a comic that may publish any day, keeps
/// no history, and lives in UTC.
#[async_trait]
pub trait Crawler: Send + Sync {
    fn meta(&self) -> ComicMeta;

    fn history(&self) -> HistoryCapability {
        HistoryCapability::None
    }

    /// Publication weekdays in `"Mo,We,Fr"` notation, if known.
    fn schedule(&self) -> Option<&'static str> {
        None
    }

    /// The site's whole-hour UTC offset, used to decide which date an entry
    /// or "today" falls on.
    fn utc_offset(&self) -> i32 {
        0
    }

    /// Extra request headers for sites that refuse the default client.
    fn headers(&self) -> Vec<(&'static str, &'static str)> {
        Vec::new()
    }

    /// Fetch and parse whatever the site offers for `pub_date`. An empty
    /// vector means no release was published that day.
    async fn crawl(
        &self,
        session: &CrawlSession,
        pub_date: NaiveDate,
    ) -> CrawlResult<Vec<CrawlerImage>>;

    /// Today, as the comic's site sees it.
    fn current_date(&self) -> NaiveDate {
        scheduling::current_date(self.utc_offset())
    }

    /// Earliest date worth crawling: bounded by both the history capability
    /// and the comic's own start date.
    fn earliest_date(&self) -> NaiveDate {
        let earliest = self.history().earliest(self.current_date());
        match self.meta().start_date {
            Some(start) if start > earliest => start,
            _ => earliest,
        }
    }

    /// Validate a requested date against the scheduling contract. Runs
    /// before any network access.
    fn check_release_date(&self, pub_date: NaiveDate) -> CrawlResult<()> {
        let meta = self.meta();
        scheduling::check_release_date(
            pub_date,
            self.current_date(),
            self.history(),
            self.schedule(),
            meta.start_date,
            meta.end_date,
        )
    }
}

/// HTTP session bound to one crawler: carries its extra headers and time
/// zone so parsed feeds can resolve entry dates.
pub struct CrawlSession {
    client: Client,
    headers: Vec<(&'static str, &'static str)>,
    utc_offset_hours: i32,
}

impl CrawlSession {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            headers: Vec::new(),
            utc_offset_hours: 0,
        }
    }

    pub fn for_crawler(client: Client, crawler: &dyn Crawler) -> Self {
        Self {
            client,
            headers: crawler.headers(),
            utc_offset_hours: crawler.utc_offset(),
        }
    }

    /// GET a URL with the crawler's headers, requiring a success status.
    pub(crate) async fn get(&self, url: &str) -> CrawlResult<reqwest::Response> {
        let mut request = self.client.get(url);
        for (name, value) in &self.headers {
            request = request.header(*name, *value);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(CrawlError::BadStatus {
                status: response.status(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    /// Fetch an HTML page and wrap it for CSS-selector access. Relative URLs
    /// resolve against the final (post-redirect) URL.
    pub async fn parse_page(&self, url: &str) -> CrawlResult<Page> {
        let response = self.get(url).await?;
        let base = Some(response.url().clone());
        let html = response.text().await?;
        Ok(Page::new(base, html))
    }

    /// Fetch and parse an RSS/Atom feed.
    pub async fn parse_feed(&self, url: &str) -> CrawlResult<ParsedFeed> {
        let response = self.get(url).await?;
        let bytes = response.bytes().await?;
        let feed = feed_rs::parser::parse(&bytes[..])?;
        Ok(ParsedFeed::new(feed, self.utc_offset_hours))
    }

    /// Fetch raw bytes plus the reported content type, for image downloads.
    pub(crate) async fn get_bytes(&self, url: &str) -> CrawlResult<(Option<String>, Vec<u8>)> {
        let response = self.get(url).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;
        Ok((content_type, bytes.to_vec()))
    }
}
