//! Calendar buckets and bucket token derivation.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Granularity at which a counter's usage implicitly resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// One bucket per calendar day
    Day,
    /// One bucket per calendar month
    Month,
}

impl TimeUnit {
    /// Token identifying the calendar period containing `at`.
    ///
    /// `D_<yyyy><ddd>` for days (ordinal day of year), `M_<yyyy><mm>` for
    /// months. Calendar fields are read in the zone `at` carries.
    pub fn bucket_token<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> String {
        match self {
            TimeUnit::Day => format!("D_{:04}{:03}", at.year(), at.ordinal()),
            TimeUnit::Month => format!("M_{:04}{:02}", at.year(), at.month()),
        }
    }

    /// Start of the bucket following the one containing `at`.
    pub fn next_rollover(&self, at: &DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
        let date = at.date_naive();
        let next = match self {
            TimeUnit::Day => date.succ_opt()?,
            TimeUnit::Month => {
                let (year, month) = if date.month() == 12 {
                    (date.year() + 1, 1)
                } else {
                    (date.year(), date.month() + 1)
                };
                NaiveDate::from_ymd_opt(year, month, 1)?
            }
        };

        let midnight = next.and_hms_opt(0, 0, 0)?;
        at.offset().from_local_datetime(&midnight).single()
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeUnit::Day => f.write_str("day"),
            TimeUnit::Month => f.write_str("month"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_day_token() {
        assert_eq!(TimeUnit::Day.bucket_token(&utc(2016, 4, 14, 12, 0)), "D_2016105");
        assert_eq!(TimeUnit::Day.bucket_token(&utc(2016, 1, 1, 0, 0)), "D_2016001");
        assert_eq!(TimeUnit::Day.bucket_token(&utc(2016, 12, 31, 23, 59)), "D_2016366");
    }

    #[test]
    fn test_month_token() {
        assert_eq!(TimeUnit::Month.bucket_token(&utc(2016, 4, 14, 12, 0)), "M_201604");
        assert_eq!(TimeUnit::Month.bucket_token(&utc(2016, 12, 1, 0, 0)), "M_201612");
    }

    #[test]
    fn test_same_period_same_token() {
        let morning = utc(2016, 4, 14, 0, 0);
        let night = utc(2016, 4, 14, 23, 59);
        assert_eq!(
            TimeUnit::Day.bucket_token(&morning),
            TimeUnit::Day.bucket_token(&night)
        );
        assert_ne!(
            TimeUnit::Day.bucket_token(&night),
            TimeUnit::Day.bucket_token(&utc(2016, 4, 15, 0, 1))
        );
    }

    #[test]
    fn test_year_change_changes_day_token() {
        assert_ne!(
            TimeUnit::Day.bucket_token(&utc(2016, 3, 1, 12, 0)),
            TimeUnit::Day.bucket_token(&utc(2017, 3, 1, 12, 0))
        );
    }

    #[test]
    fn test_token_follows_offset() {
        let at = utc(2016, 4, 14, 23, 0);
        let east = FixedOffset::east_opt(2 * 3600).unwrap();

        assert_eq!(TimeUnit::Day.bucket_token(&at), "D_2016105");
        assert_eq!(TimeUnit::Day.bucket_token(&at.with_timezone(&east)), "D_2016106");
    }

    #[test]
    fn test_next_rollover() {
        let offset = FixedOffset::east_opt(0).unwrap();
        let at = utc(2016, 12, 31, 18, 30).with_timezone(&offset);

        let next_day = TimeUnit::Day.next_rollover(&at).unwrap();
        assert_eq!(next_day, utc(2017, 1, 1, 0, 0).with_timezone(&offset));

        let next_month = TimeUnit::Month.next_rollover(&at).unwrap();
        assert_eq!(next_month, utc(2017, 1, 1, 0, 0).with_timezone(&offset));

        let april = utc(2016, 4, 14, 12, 0).with_timezone(&offset);
        assert_eq!(
            TimeUnit::Month.next_rollover(&april).unwrap(),
            utc(2016, 5, 1, 0, 0).with_timezone(&offset)
        );
    }

    #[test]
    fn test_unit_serde() {
        let unit: TimeUnit = serde_yaml::from_str("month").unwrap();
        assert_eq!(unit, TimeUnit::Month);
        assert_eq!(unit.to_string(), "month");
    }
}
