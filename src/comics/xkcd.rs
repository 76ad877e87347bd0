use async_trait::async_trait;
use chrono::NaiveDate;

use crate::crawler::{ComicMeta, CrawlSession, Crawler, CrawlerImage};
use crate::error::CrawlResult;
use crate::scheduling::{ymd, HistoryCapability};

pub struct Xkcd;

#[async_trait]
impl Crawler for Xkcd {
    fn meta(&self) -> ComicMeta {
        ComicMeta {
            slug: "xkcd",
            name: "xkcd",
            language: "en",
            url: "https://xkcd.com/",
            start_date: Some(ymd(2006, 1, 1)),
            end_date: None,
            active: true,
            rights: "Randall Munroe, CC BY-NC 2.5",
        }
    }

    fn history(&self) -> HistoryCapability {
        // The feed holds roughly the last four strips.
        HistoryCapability::Days(6)
    }

    fn schedule(&self) -> Option<&'static str> {
        Some("Mo,We,Fr")
    }

    fn utc_offset(&self) -> i32 {
        -5
    }

    async fn crawl(
        &self,
        session: &CrawlSession,
        pub_date: NaiveDate,
    ) -> CrawlResult<Vec<CrawlerImage>> {
        let feed = session.parse_feed("https://xkcd.com/rss.xml").await?;
        for entry in feed.for_date(pub_date) {
            let Some(summary) = entry.summary() else {
                continue;
            };
            let Some(url) = summary.src("img") else {
                continue;
            };
            // The punchline lives in the image's title attribute.
            return Ok(vec![CrawlerImage {
                url,
                title: entry.title().map(str::to_string),
                text: summary.title_attr("img"),
            }]);
        }
        Ok(vec![])
    }
}
