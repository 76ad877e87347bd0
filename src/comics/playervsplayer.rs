use async_trait::async_trait;
use chrono::NaiveDate;

use crate::crawler::{ComicMeta, CrawlSession, Crawler, CrawlerImage};
use crate::error::CrawlResult;
use crate::scheduling::{ymd, HistoryCapability};

pub struct PlayerVsPlayer;

#[async_trait]
impl Crawler for PlayerVsPlayer {
    fn meta(&self) -> ComicMeta {
        ComicMeta {
            slug: "playervsplayer",
            name: "Player vs Player",
            language: "en",
            url: "http://pvponline.com/",
            start_date: Some(ymd(1998, 5, 4)),
            end_date: None,
            active: true,
            rights: "Scott R. Kurtz",
        }
    }

    fn history(&self) -> HistoryCapability {
        HistoryCapability::Days(14)
    }

    fn schedule(&self) -> Option<&'static str> {
        Some("Mo,Tu,We,Th,Fr")
    }

    fn utc_offset(&self) -> i32 {
        -5
    }

    async fn crawl(
        &self,
        session: &CrawlSession,
        pub_date: NaiveDate,
    ) -> CrawlResult<Vec<CrawlerImage>> {
        let feed = session.parse_feed("http://pvponline.com/feed/").await?;
        for entry in feed.for_date(pub_date) {
            let Some(title) = entry.title().and_then(|t| t.strip_prefix("Comic: ")) else {
                continue;
            };
            let title = title.to_string();
            let Some(link) = entry.link() else {
                continue;
            };
            // The feed entry only links the post; the strip is on the page.
            let page = session.parse_page(link).await?;
            let Some(url) = page.src(r#".comic-art img[src*="/comic/"]"#) else {
                continue;
            };
            return Ok(vec![CrawlerImage {
                url,
                title: Some(title),
                text: None,
            }]);
        }
        Ok(vec![])
    }
}
