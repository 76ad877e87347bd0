use async_trait::async_trait;
use chrono::NaiveDate;

use crate::crawler::{ComicMeta, CrawlSession, Crawler, CrawlerImage};
use crate::error::CrawlResult;
use crate::scheduling::ymd;

pub struct DevilBear;

#[async_trait]
impl Crawler for DevilBear {
    fn meta(&self) -> ComicMeta {
        ComicMeta {
            slug: "devilbear",
            name: "The Devil Bear",
            language: "en",
            url: "http://www.thedevilbear.com/",
            start_date: Some(ymd(2009, 1, 1)),
            end_date: None,
            active: true,
            rights: "Ben Bourbon",
        }
    }

    fn schedule(&self) -> Option<&'static str> {
        Some("Tu,Fr")
    }

    fn utc_offset(&self) -> i32 {
        -5
    }

    async fn crawl(
        &self,
        session: &CrawlSession,
        _pub_date: NaiveDate,
    ) -> CrawlResult<Vec<CrawlerImage>> {
        // The front page only ever shows the current strip.
        let page = session.parse_page("http://www.thedevilbear.com/").await?;
        Ok(page
            .src("#cg_img img")
            .map(CrawlerImage::new)
            .into_iter()
            .collect())
    }
}
