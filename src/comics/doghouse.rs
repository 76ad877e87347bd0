use async_trait::async_trait;
use chrono::NaiveDate;

use crate::crawler::{ComicMeta, CrawlSession, Crawler, CrawlerImage};
use crate::error::CrawlResult;
use crate::scheduling::{ymd, HistoryCapability};

pub struct DoghouseDiaries;

#[async_trait]
impl Crawler for DoghouseDiaries {
    fn meta(&self) -> ComicMeta {
        ComicMeta {
            slug: "doghouse",
            name: "The Doghouse Diaries",
            language: "en",
            url: "http://www.thedoghousediaries.com/",
            start_date: Some(ymd(2009, 1, 8)),
            end_date: None,
            active: true,
            rights: "Will, Ray, & Raf",
        }
    }

    fn history(&self) -> HistoryCapability {
        HistoryCapability::Days(30)
    }

    fn schedule(&self) -> Option<&'static str> {
        Some("Mo,We,Fr")
    }

    fn utc_offset(&self) -> i32 {
        -8
    }

    async fn crawl(
        &self,
        session: &CrawlSession,
        pub_date: NaiveDate,
    ) -> CrawlResult<Vec<CrawlerImage>> {
        let feed = session
            .parse_feed("http://feeds.feedburner.com/thedoghousediaries/feed")
            .await?;
        for entry in feed.for_date(pub_date) {
            let Some(content) = entry.content() else {
                continue;
            };
            let Some(url) = content.src("img.comic-item") else {
                continue;
            };
            return Ok(vec![CrawlerImage {
                url,
                title: content.alt("img.comic-item"),
                text: content.title_attr("img.comic-item"),
            }]);
        }
        Ok(vec![])
    }
}
