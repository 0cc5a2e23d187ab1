//! Calendar periods for history views.
//!
//! A period is a granularity plus a non-negative offset counting back from
//! the period containing `now`. Day and week periods close at
//! `23:59:59.999`; month and year periods close at `23:59:59`.
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("local time {local} does not exist in this time zone")]
    NonexistentLocalTime { local: NaiveDateTime },
    #[error("period offset {offset} reaches outside the supported calendar")]
    OutOfRange { offset: u32 },
    #[error("unknown period granularity '{0}' (expected day, week, month or year)")]
    UnknownGranularity(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    #[default]
    Week,
    Month,
    Year,
}

impl Granularity {
    pub const ALL: [Self; 4] = [Self::Day, Self::Week, Self::Month, Self::Year];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Granularity {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|granularity| granularity.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| PeriodError::UnknownGranularity(s.to_string()))
    }
}

/// Inclusive instant range.
#[derive(Debug, Clone)]
pub struct DateRange<Tz: TimeZone> {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl<Tz: TimeZone> DateRange<Tz> {
    #[must_use]
    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        self.start.with_timezone(&Utc) <= *instant && *instant <= self.end.with_timezone(&Utc)
    }

    #[must_use]
    pub fn to_utc(&self) -> DateRange<Utc> {
        DateRange {
            start: self.start.with_timezone(&Utc),
            end: self.end.with_timezone(&Utc),
        }
    }

    /// Short human label such as `Mar 10 - Mar 16`.
    #[must_use]
    pub fn label(&self) -> String {
        format!(
            "{} - {}",
            self.start.date_naive().format("%b %-d"),
            self.end.date_naive().format("%b %-d")
        )
    }
}

/// Resolve the period `offset` steps before the one containing `now`, in
/// `now`'s time zone.
///
/// # Errors
///
/// Returns an error when the offset leaves chrono's calendar or a boundary
/// falls on a local time that cannot be resolved.
pub fn period_range<Tz: TimeZone>(
    granularity: Granularity,
    offset: u32,
    now: &DateTime<Tz>,
) -> Result<DateRange<Tz>, PeriodError> {
    let today = now.date_naive();
    let out_of_range = || PeriodError::OutOfRange { offset };
    let (first, last, end_time) = match granularity {
        Granularity::Day => {
            let day = today
                .checked_sub_days(Days::new(u64::from(offset)))
                .ok_or_else(out_of_range)?;
            (day, day, end_of_day_millis())
        }
        Granularity::Week => {
            let back = u64::from(today.weekday().num_days_from_monday()) + u64::from(offset) * 7;
            let monday = today
                .checked_sub_days(Days::new(back))
                .ok_or_else(out_of_range)?;
            let sunday = monday
                .checked_add_days(Days::new(6))
                .ok_or_else(out_of_range)?;
            (monday, sunday, end_of_day_millis())
        }
        Granularity::Month => {
            let months = i64::from(today.year()) * 12 + i64::from(today.month0()) - i64::from(offset);
            let year = i32::try_from(months.div_euclid(12)).map_err(|_| out_of_range())?;
            let month0 = u32::try_from(months.rem_euclid(12)).map_err(|_| out_of_range())?;
            let first = NaiveDate::from_ymd_opt(year, month0 + 1, 1).ok_or_else(out_of_range)?;
            let last = first
                .checked_add_months(chrono::Months::new(1))
                .and_then(|next| next.pred_opt())
                .ok_or_else(out_of_range)?;
            (first, last, end_of_day_seconds())
        }
        Granularity::Year => {
            let year = i32::try_from(offset)
                .ok()
                .and_then(|offset| today.year().checked_sub(offset))
                .ok_or_else(out_of_range)?;
            let first = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(out_of_range)?;
            let last = NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(out_of_range)?;
            (first, last, end_of_day_seconds())
        }
    };

    let zone = now.timezone();
    Ok(DateRange {
        start: resolve_local(&zone, first.and_time(NaiveTime::MIN))?,
        end: resolve_local(&zone, last.and_time(end_time))?,
    })
}

fn end_of_day_millis() -> NaiveTime {
    NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN)
}

fn end_of_day_seconds() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

// A boundary inside a DST gap moves forward by the usual one-hour shift.
fn resolve_local<Tz: TimeZone>(zone: &Tz, local: NaiveDateTime) -> Result<DateTime<Tz>, PeriodError> {
    zone.from_local_datetime(&local)
        .earliest()
        .or_else(|| {
            local
                .checked_add_signed(TimeDelta::hours(1))
                .and_then(|shifted| zone.from_local_datetime(&shifted).earliest())
        })
        .ok_or(PeriodError::NonexistentLocalTime { local })
}

/// Navigation state of a history view: granularity plus how many periods
/// back from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PeriodCursor {
    granularity: Granularity,
    offset: u32,
}

impl PeriodCursor {
    #[must_use]
    pub const fn new(granularity: Granularity) -> Self {
        Self {
            granularity,
            offset: 0,
        }
    }

    #[must_use]
    pub const fn granularity(&self) -> Granularity {
        self.granularity
    }

    #[must_use]
    pub const fn offset(&self) -> u32 {
        self.offset
    }

    #[must_use]
    pub const fn is_current(&self) -> bool {
        self.offset == 0
    }

    pub const fn older(&mut self) {
        self.offset = self.offset.saturating_add(1);
    }

    pub const fn newer(&mut self) {
        self.offset = self.offset.saturating_sub(1);
    }

    /// Switching granularity returns to the current period.
    pub const fn set_granularity(&mut self, granularity: Granularity) {
        self.granularity = granularity;
        self.offset = 0;
    }

    #[must_use]
    pub const fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// # Errors
    ///
    /// See [`period_range`].
    pub fn range<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<DateRange<Tz>, PeriodError> {
        period_range(self.granularity, self.offset, now)
    }
}
