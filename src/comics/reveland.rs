use async_trait::async_trait;
use chrono::NaiveDate;

use crate::crawler::{ComicMeta, CrawlSession, Crawler, CrawlerImage};
use crate::error::CrawlResult;
use crate::scheduling::ymd;

pub struct Reveland;

#[async_trait]
impl Crawler for Reveland {
    fn meta(&self) -> ComicMeta {
        ComicMeta {
            slug: "reveland",
            name: "Reveland",
            language: "no",
            url: "http://reveland.nettserier.no/",
            start_date: Some(ymd(2007, 3, 20)),
            end_date: Some(ymd(2013, 4, 17)),
            active: false,
            rights: "Jorunn Hanto-Haugse",
        }
    }

    async fn crawl(
        &self,
        _session: &CrawlSession,
        _pub_date: NaiveDate,
    ) -> CrawlResult<Vec<CrawlerImage>> {
        // Comic no longer published; the archive stays browsable.
        Ok(vec![])
    }
}
