//! Wrapper around parsed syndication feeds. Crawler definitions pick entries
//! by publication date (in the comic's time zone) and then dig into the
//! entry's embedded HTML with the same selector accessors as full pages.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use url::Url;

use super::page::Page;

/// A fetched and parsed RSS/Atom document.
#[derive(Debug)]
pub struct ParsedFeed {
    utc_offset_hours: i32,
    entries: Vec<FeedEntry>,
}

impl ParsedFeed {
    pub(crate) fn new(feed: feed_rs::model::Feed, utc_offset_hours: i32) -> Self {
        let entries = feed.entries.into_iter().map(FeedEntry::new).collect();
        Self {
            utc_offset_hours,
            entries,
        }
    }

    pub fn entries(&self) -> &[FeedEntry] {
        &self.entries
    }

    /// Entries published on the given date, as seen from the crawler's time
    /// zone. Falls back to the updated timestamp for feeds that omit
    /// publication times.
    pub fn for_date(&self, date: NaiveDate) -> impl Iterator<Item = &FeedEntry> {
        let offset_hours = self.utc_offset_hours;
        self.entries
            .iter()
            .filter(move |entry| entry.local_date(offset_hours) == Some(date))
    }
}

/// One feed entry.
#[derive(Debug)]
pub struct FeedEntry {
    inner: feed_rs::model::Entry,
}

impl FeedEntry {
    fn new(inner: feed_rs::model::Entry) -> Self {
        Self { inner }
    }

    pub fn title(&self) -> Option<&str> {
        self.inner.title.as_ref().map(|t| t.content.as_str())
    }

    pub fn link(&self) -> Option<&str> {
        self.inner.links.first().map(|l| l.href.as_str())
    }

    /// Category labels, falling back to the raw term.
    pub fn tags(&self) -> Vec<&str> {
        self.inner
            .categories
            .iter()
            .map(|c| c.label.as_deref().unwrap_or(c.term.as_str()))
            .collect()
    }

    pub fn published(&self) -> Option<DateTime<Utc>> {
        self.inner.published.or(self.inner.updated)
    }

    /// Entry summary as a selectable HTML fragment.
    pub fn summary(&self) -> Option<Page> {
        let html = self.inner.summary.as_ref()?.content.clone();
        Some(Page::new(self.base_url(), html))
    }

    /// Entry content body as a selectable HTML fragment.
    pub fn content(&self) -> Option<Page> {
        let html = self.inner.content.as_ref()?.body.as_ref()?.clone();
        Some(Page::new(self.base_url(), html))
    }

    fn base_url(&self) -> Option<Url> {
        self.link().and_then(|link| Url::parse(link).ok())
    }

    fn local_date(&self, utc_offset_hours: i32) -> Option<NaiveDate> {
        let offset = FixedOffset::east_opt(utc_offset_hours * 3600)?;
        Some(self.published()?.with_timezone(&offset).date_naive())
    }
}
