//! Date handling for portal request parameters.
//!
//! The portal's forms send dates as `YYYY/MM/DD`. Observation times in the
//! database are timezone-naive timestamps, so dates are promoted to midnight
//! `NaiveDateTime`s.

use chrono::{Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Format of dates in portal requests.
pub const PORTAL_DATE_FORMAT: &str = "%Y/%m/%d";

/// A calendar date as sent by the portal (`YYYY/MM/DD`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortalDate(NaiveDate);

impl PortalDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Parse a `YYYY/MM/DD` string.
    ///
    /// Fails for strings in any other layout and for impossible dates such
    /// as `2000/02/30`.
    pub fn parse(s: &str) -> Result<Self, TimeParseError> {
        NaiveDate::parse_from_str(s, PORTAL_DATE_FORMAT)
            .map(Self)
            .map_err(|_| TimeParseError::InvalidFormat(s.to_string()))
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Midnight at the start of this date.
    pub fn start_of_day(&self) -> NaiveDateTime {
        self.0.and_time(NaiveTime::MIN)
    }
}

impl std::fmt::Display for PortalDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(PORTAL_DATE_FORMAT))
    }
}

/// Optional start/end bounds used to clip returned observations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipDates {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl ClipDates {
    pub fn new(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        Self { start, end }
    }

    /// No clipping in either direction.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Start bound truncated to midnight. Monthly counts are dated the first
    /// of the month, so a mid-month start excludes its own month.
    pub fn month_count_start(&self) -> Option<NaiveDateTime> {
        self.start.map(|s| s.date().and_time(NaiveTime::MIN))
    }

    /// End bound truncated to midnight and pushed forward one month, so the
    /// month containing the end date is counted.
    pub fn month_count_end(&self) -> Option<NaiveDateTime> {
        self.end.and_then(|e| {
            e.date()
                .checked_add_months(Months::new(1))
                .map(|d| d.and_time(NaiveTime::MIN))
        })
    }

    /// Whether a timestamp falls inside the (inclusive) bounds.
    pub fn contains(&self, t: &NaiveDateTime) -> bool {
        self.start.map_or(true, |s| *t >= s) && self.end.map_or(true, |e| *t <= e)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid date (expected YYYY/MM/DD): {0}")]
    InvalidFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_parse_portal_date() {
        let d = PortalDate::parse("2000/01/31").unwrap();
        assert_eq!(d.date().year(), 2000);
        assert_eq!(d.date().month(), 1);
        assert_eq!(d.date().day(), 31);
        assert_eq!(d.to_string(), "2000/01/31");
    }

    #[test]
    fn test_parse_rejects_other_layouts() {
        assert!(PortalDate::parse("2000-01-31").is_err());
        assert!(PortalDate::parse("2000/Jan/01").is_err());
        assert!(PortalDate::parse("2000/02/30").is_err());
    }

    #[test]
    fn test_month_count_bounds() {
        let start = PortalDate::parse("2000/01/15").unwrap().start_of_day();
        let end = PortalDate::parse("2000/01/31").unwrap().start_of_day();
        let clip = ClipDates::new(Some(start), Some(end));

        assert_eq!(clip.month_count_start(), Some(start));
        assert_eq!(
            clip.month_count_end(),
            Some(PortalDate::parse("2000/02/29").unwrap().start_of_day())
        );
    }

    #[test]
    fn test_contains_is_inclusive() {
        let start = PortalDate::parse("2000/01/01").unwrap().start_of_day();
        let end = PortalDate::parse("2000/01/31").unwrap().start_of_day();
        let clip = ClipDates::new(Some(start), Some(end));

        assert!(clip.contains(&start));
        assert!(clip.contains(&end));
        assert!(!clip.contains(&PortalDate::parse("2000/02/01").unwrap().start_of_day()));
        assert!(ClipDates::none().contains(&start));
    }
}
