//! The scheduling contract: how far back a crawler can look, which weekdays a
//! comic publishes on, and what "today" means in the comic's time zone.

use chrono::{Datelike, Duration, FixedOffset, NaiveDate, Utc, Weekday};

use crate::error::{CrawlError, CrawlResult};

/// How far back in time a crawler can be asked for releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryCapability {
    /// Only the current date is crawlable.
    None,
    /// A rolling window of whole days back from the current date.
    Days(u32),
    /// Everything since a fixed date, typically the site archive's first page.
    Since(NaiveDate),
}

impl HistoryCapability {
    /// Earliest crawlable date, given the crawler's current date.
    pub fn earliest(&self, today: NaiveDate) -> NaiveDate {
        match *self {
            HistoryCapability::None => today,
            HistoryCapability::Days(days) => today - Duration::days(i64::from(days)),
            HistoryCapability::Since(date) => date,
        }
    }
}

/// Set of weekdays a comic publishes on, written `"Mo,We,Fr"` in crawler
/// definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule(u8);

impl Schedule {
    pub fn parse(spec: &str) -> CrawlResult<Schedule> {
        let mut days = 0u8;
        for token in spec.split(',') {
            let token = token.trim();
            let day = match token {
                "Mo" => Weekday::Mon,
                "Tu" => Weekday::Tue,
                "We" => Weekday::Wed,
                "Th" => Weekday::Thu,
                "Fr" => Weekday::Fri,
                "Sa" => Weekday::Sat,
                "Su" => Weekday::Sun,
                _ => return Err(CrawlError::BadSchedule(token.to_string())),
            };
            days |= 1 << day.num_days_from_monday();
        }
        Ok(Schedule(days))
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }
}

/// The current date as seen from a whole-hour UTC offset.
pub fn current_date(utc_offset_hours: i32) -> NaiveDate {
    let offset = FixedOffset::east_opt(utc_offset_hours * 3600)
        .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
    Utc::now().with_timezone(&offset).date_naive()
}

/// Shared date helper for crawler definitions and tests.
pub fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

/// Validate a requested publication date against a crawler's scheduling
/// contract. Runs before any network access.
pub fn check_release_date(
    pub_date: NaiveDate,
    today: NaiveDate,
    history: HistoryCapability,
    schedule: Option<&str>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> CrawlResult<()> {
    if pub_date > today {
        return Err(CrawlError::ReleaseInFuture(pub_date));
    }
    let earliest = history.earliest(today);
    if pub_date < earliest {
        return Err(CrawlError::OutsideHistory(earliest));
    }
    if let Some(start) = start_date {
        if pub_date < start {
            return Err(CrawlError::BeforeComicStart(start));
        }
    }
    if let Some(end) = end_date {
        if pub_date > end {
            return Err(CrawlError::AfterComicEnd(end));
        }
    }
    if let Some(spec) = schedule {
        let schedule = Schedule::parse(spec)?;
        if !schedule.contains(pub_date.weekday()) {
            return Err(CrawlError::NotScheduled(pub_date.weekday()));
        }
    }
    Ok(())
}
