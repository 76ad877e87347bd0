use async_trait::async_trait;
use chrono::NaiveDate;

use crate::crawler::{ComicMeta, CrawlSession, Crawler, CrawlerImage};
use crate::error::CrawlResult;
use crate::scheduling::{ymd, HistoryCapability};

pub struct LookingForGroup;

#[async_trait]
impl Crawler for LookingForGroup {
    fn meta(&self) -> ComicMeta {
        ComicMeta {
            slug: "lookingforgroup",
            name: "Looking For Group",
            language: "en",
            url: "http://www.lfgcomic.com/",
            start_date: Some(ymd(2006, 11, 6)),
            end_date: None,
            active: true,
            rights: "Ryan Sohmer & Lar deSouza",
        }
    }

    fn history(&self) -> HistoryCapability {
        HistoryCapability::Since(ymd(2006, 11, 6))
    }

    fn schedule(&self) -> Option<&'static str> {
        Some("Mo,Th")
    }

    fn utc_offset(&self) -> i32 {
        -5
    }

    async fn crawl(
        &self,
        session: &CrawlSession,
        pub_date: NaiveDate,
    ) -> CrawlResult<Vec<CrawlerImage>> {
        let feed = session
            .parse_feed("http://feeds.feedburner.com/LookingForGroup")
            .await?;
        // Comic entries are titled with the bare page number; multi-page
        // updates produce several entries on the same day.
        let mut images = Vec::new();
        for entry in feed.for_date(pub_date) {
            let title = match entry.title() {
                Some(t) if !t.is_empty() && t.chars().all(|c| c.is_ascii_digit()) => t.to_string(),
                _ => continue,
            };
            let Some(summary) = entry.summary() else {
                continue;
            };
            let Some(url) =
                summary.src(r#"a[rel="bookmark"] img[src*="lfgcomic.com/wp-content/"]"#)
            else {
                continue;
            };
            images.push(CrawlerImage {
                url: url.replace("-210x300", ""),
                title: Some(title),
                text: None,
            });
        }
        Ok(images)
    }
}
