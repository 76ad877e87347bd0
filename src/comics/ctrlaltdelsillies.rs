use async_trait::async_trait;
use chrono::NaiveDate;

use crate::crawler::{ComicMeta, CrawlSession, Crawler, CrawlerImage};
use crate::error::CrawlResult;
use crate::scheduling::{ymd, HistoryCapability};

pub struct CtrlAltDelSillies;

#[async_trait]
impl Crawler for CtrlAltDelSillies {
    fn meta(&self) -> ComicMeta {
        ComicMeta {
            slug: "ctrlaltdelsillies",
            name: "Ctrl+Alt+Del Sillies",
            language: "en",
            url: "http://www.cad-comic.com/sillies/",
            start_date: Some(ymd(2008, 6, 27)),
            end_date: None,
            active: true,
            rights: "Tim Buckley",
        }
    }

    fn history(&self) -> HistoryCapability {
        HistoryCapability::Since(ymd(2008, 6, 27))
    }

    fn utc_offset(&self) -> i32 {
        -5
    }

    // Without a User-Agent set, the server returns empty responses
    fn headers(&self) -> Vec<(&'static str, &'static str)> {
        vec![("User-Agent", "Mozilla/4.0")]
    }

    async fn crawl(
        &self,
        session: &CrawlSession,
        pub_date: NaiveDate,
    ) -> CrawlResult<Vec<CrawlerImage>> {
        let page = session
            .parse_page(&format!(
                "http://www.cad-comic.com/sillies/{}",
                pub_date.format("%Y%m%d")
            ))
            .await?;
        Ok(page
            .src(r#"img[src*="/comics/"]"#)
            .map(CrawlerImage::new)
            .into_iter()
            .collect())
    }
}
