use async_trait::async_trait;
use chrono::NaiveDate;

use crate::crawler::{ComicMeta, CrawlSession, Crawler, CrawlerImage};
use crate::error::CrawlResult;
use crate::scheduling::{ymd, HistoryCapability};

pub struct Q2qComics;

#[async_trait]
impl Crawler for Q2qComics {
    fn meta(&self) -> ComicMeta {
        ComicMeta {
            slug: "q2qcomics",
            name: "Q2Q Comics",
            language: "en",
            url: "http://q2qcomics.com/",
            start_date: Some(ymd(2014, 3, 8)),
            end_date: None,
            active: true,
            rights: "Steve Younkins",
        }
    }

    fn history(&self) -> HistoryCapability {
        HistoryCapability::Days(14)
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
        let feed = session.parse_feed("http://q2qcomics.com/feed/").await?;
        for entry in feed.for_date(pub_date) {
            if !entry.tags().contains(&"Comics") {
                continue;
            }
            let Some(content) = entry.content() else {
                continue;
            };
            let Some(url) = content.src("img.size-full") else {
                continue;
            };
            let title = entry
                .title()
                .map(|t| t.replace("Q2Q Comics ", ""));
            return Ok(vec![CrawlerImage {
                url,
                title,
                text: None,
            }]);
        }
        Ok(vec![])
    }
}
