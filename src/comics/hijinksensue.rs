use async_trait::async_trait;
use chrono::NaiveDate;

use crate::crawler::{ComicMeta, CrawlSession, Crawler, CrawlerImage};
use crate::error::CrawlResult;
use crate::scheduling::{ymd, HistoryCapability};

pub struct HijinksEnsue;

#[async_trait]
impl Crawler for HijinksEnsue {
    fn meta(&self) -> ComicMeta {
        ComicMeta {
            slug: "hijinksensue",
            name: "HijiNKS Ensue",
            language: "en",
            url: "http://hijinksensue.com/",
            start_date: Some(ymd(2007, 5, 11)),
            end_date: None,
            active: true,
            rights: "Joel Watson",
        }
    }

    fn history(&self) -> HistoryCapability {
        HistoryCapability::Days(40)
    }

    fn utc_offset(&self) -> i32 {
        -6
    }

    async fn crawl(
        &self,
        session: &CrawlSession,
        pub_date: NaiveDate,
    ) -> CrawlResult<Vec<CrawlerImage>> {
        let feed = session.parse_feed("http://hijinksensue.com/feed/").await?;
        for entry in feed.for_date(pub_date) {
            // The feed mixes comics with blog posts.
            if !entry.link().is_some_and(|link| link.contains("/comic/")) {
                continue;
            }
            let Some(content) = entry.content() else {
                continue;
            };
            let Some(url) = content.src("img.wp-post-image") else {
                continue;
            };
            return Ok(vec![CrawlerImage {
                url: url.replace("-300x120", ""),
                title: entry.title().map(str::to_string),
                text: None,
            }]);
        }
        Ok(vec![])
    }
}
