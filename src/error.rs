use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised while validating a crawl request or talking to a comic site.
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("release date {0} is in the future")]
    ReleaseInFuture(NaiveDate),

    #[error("history is not available before {0}")]
    OutsideHistory(NaiveDate),

    #[error("comic was not published before {0}")]
    BeforeComicStart(NaiveDate),

    #[error("comic stopped publishing on {0}")]
    AfterComicEnd(NaiveDate),

    #[error("comic does not publish on {0}")]
    NotScheduled(chrono::Weekday),

    #[error("unknown day token {0:?} in schedule")]
    BadSchedule(String),

    #[error("server returned {status} for {url}")]
    BadStatus {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("expected an image at {url}, got {content_type:?}")]
    NotAnImage {
        url: String,
        content_type: Option<String>,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed parsing failed: {0}")]
    FeedParse(#[from] feed_rs::parser::ParseFeedError),
}

impl CrawlError {
    /// Scheduling misses are expected during a date-range crawl and are
    /// skipped quietly; everything else is worth a warning.
    pub fn is_schedule_miss(&self) -> bool {
        matches!(
            self,
            CrawlError::ReleaseInFuture(_)
                | CrawlError::OutsideHistory(_)
                | CrawlError::BeforeComicStart(_)
                | CrawlError::AfterComicEnd(_)
                | CrawlError::NotScheduled(_)
        )
    }
}

pub type CrawlResult<T> = std::result::Result<T, CrawlError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    #[test]
    fn test_schedule_misses_are_classified() {
        let date = NaiveDate::from_ymd_opt(2015, 6, 1).unwrap();
        assert!(CrawlError::ReleaseInFuture(date).is_schedule_miss());
        assert!(CrawlError::OutsideHistory(date).is_schedule_miss());
        assert!(CrawlError::NotScheduled(Weekday::Tue).is_schedule_miss());
        assert!(!CrawlError::BadSchedule("Xx".into()).is_schedule_miss());
    }

    #[test]
    fn test_error_messages_name_the_date() {
        let date = NaiveDate::from_ymd_opt(2015, 6, 1).unwrap();
        assert_eq!(
            CrawlError::OutsideHistory(date).to_string(),
            "history is not available before 2015-06-01"
        );
        assert_eq!(
            CrawlError::NotScheduled(Weekday::Mon).to_string(),
            "comic does not publish on Mon"
        );
    }
}
