use async_trait::async_trait;
use chrono::NaiveDate;

use crate::crawler::{ComicMeta, CrawlSession, Crawler, CrawlerImage};
use crate::error::CrawlResult;
use crate::scheduling::{ymd, HistoryCapability};

pub struct Dilbert;

#[async_trait]
impl Crawler for Dilbert {
    fn meta(&self) -> ComicMeta {
        ComicMeta {
            slug: "dilbert",
            name: "Dilbert",
            language: "en",
            url: "https://dilbert.com/",
            start_date: Some(ymd(1989, 4, 16)),
            end_date: Some(ymd(2023, 3, 12)),
            active: false,
            rights: "Scott Adams",
        }
    }

    fn history(&self) -> HistoryCapability {
        HistoryCapability::Since(ymd(1989, 4, 16))
    }

    fn utc_offset(&self) -> i32 {
        -5
    }

    async fn crawl(
        &self,
        session: &CrawlSession,
        pub_date: NaiveDate,
    ) -> CrawlResult<Vec<CrawlerImage>> {
        let page = session
            .parse_page(&format!("https://dilbert.com/strip/{pub_date}"))
            .await?;
        let Some(url) = page.src("img.img-comic") else {
            return Ok(vec![]);
        };
        Ok(vec![CrawlerImage {
            url,
            title: page.alt("img.img-comic"),
            text: None,
        }])
    }
}
