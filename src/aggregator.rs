//! Worked-time totals over the local day, week, month and all time.
//!
//! Boundaries are derived from `now` and a fixed local offset on every query, then each closed
//! interval contributes its overlap with every period. Nothing is cached between calls.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, EnumIter};
use tracing::debug;
use utoipa::ToSchema;

use crate::directory::EmployeeDirectory;
use crate::error::Result;
use crate::model::employee::{Employee, EmployeeRef};
use crate::model::interval::Interval;
use crate::store::RecordStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
    Total,
}

/// Half-open `[start, end)` UTC ranges of the local day, week (Monday first) and month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodBounds {
    pub day: (DateTime<Utc>, DateTime<Utc>),
    pub week: (DateTime<Utc>, DateTime<Utc>),
    pub month: (DateTime<Utc>, DateTime<Utc>),
}

impl PeriodBounds {
    /// `None` for [`Period::Total`], which has no bounds.
    pub fn range(&self, period: Period) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match period {
            Period::Day => Some(self.day),
            Period::Week => Some(self.week),
            Period::Month => Some(self.month),
            Period::Total => None,
        }
    }
}

fn local_midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(NaiveTime::MIN);
    Utc.from_utc_datetime(&(local - Duration::seconds(offset.local_minus_utc() as i64)))
}

fn days_in_month(year: i32, month: u32) -> i64 {
    match month {
        2 if year % 4 == 0 && (year % 100 != 0 || year % 400 == 0) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Calendar boundaries around `now` in the local time given by `offset`.
pub fn period_bounds(now: DateTime<Utc>, offset: FixedOffset) -> PeriodBounds {
    let today = now.with_timezone(&offset).date_naive();

    let day_start = local_midnight(today, offset);
    let day_end = day_start + Duration::days(1);

    let week_start = day_start - Duration::days(today.weekday().num_days_from_monday() as i64);
    let week_end = week_start + Duration::days(7);

    // December ends on January 1st of the next year: 31 days after December 1st
    let month_start = day_start - Duration::days(today.day0() as i64);
    let month_end = month_start + Duration::days(days_in_month(today.year(), today.month()));

    PeriodBounds {
        day: (day_start, day_end),
        week: (week_start, week_end),
        month: (month_start, month_end),
    }
}

/// Length of the intersection of `[start, end)` and `[period_start, period_end)`, never negative.
pub fn overlap(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
) -> Duration {
    let latest_start = start.max(period_start);
    let earliest_end = end.min(period_end);
    (earliest_end - latest_start).max(Duration::zero())
}

/// Hours, minutes and seconds of a worked-time total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Hms {
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

/// A whole number of worked seconds. Fractions are truncated, never rounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct WorkedTime(i64);

impl WorkedTime {
    pub fn from_seconds(seconds: i64) -> Self {
        Self(seconds)
    }

    pub fn seconds(self) -> i64 {
        self.0
    }

    pub fn hms(self) -> Hms {
        Hms {
            hours: self.0 / 3600,
            minutes: (self.0 % 3600) / 60,
            seconds: self.0 % 60,
        }
    }

    pub fn hours(self) -> f64 {
        self.0 as f64 / 3600.0
    }

    /// `HH:MM:SS`, hours widening past two digits as needed.
    pub fn clock(self) -> String {
        let Hms {
            hours,
            minutes,
            seconds,
        } = self.hms();
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Totals {
    pub employee: Employee,
    pub day: WorkedTime,
    pub week: WorkedTime,
    pub month: WorkedTime,
    pub total: WorkedTime,
}

impl Totals {
    pub fn get(&self, period: Period) -> WorkedTime {
        match period {
            Period::Day => self.day,
            Period::Week => self.week,
            Period::Month => self.month,
            Period::Total => self.total,
        }
    }
}

/// Sums each closed interval's overlap with every period, in [`Period`] order. Open intervals
/// are skipped.
pub fn accumulate(intervals: &[Interval], bounds: &PeriodBounds) -> [Duration; 4] {
    let mut sums = [Duration::zero(); 4];

    for interval in intervals {
        let Some(end) = interval.clock_out else {
            continue;
        };
        let start = interval.clock_in;

        for (sum, period) in sums.iter_mut().zip(Period::iter()) {
            *sum += match bounds.range(period) {
                Some((period_start, period_end)) => overlap(start, end, period_start, period_end),
                None => end - start,
            };
        }
    }

    sums
}

pub struct Aggregator<'a, S> {
    store: &'a S,
    directory: &'a EmployeeDirectory,
    offset: FixedOffset,
}

impl<'a, S: RecordStore> Aggregator<'a, S> {
    pub fn new(store: &'a S, directory: &'a EmployeeDirectory, offset: FixedOffset) -> Self {
        Self {
            store,
            directory,
            offset,
        }
    }

    pub async fn compute_totals(
        &self,
        reference: &EmployeeRef,
        now: DateTime<Utc>,
    ) -> Result<Totals> {
        let employee = self.directory.lookup(self.store, reference).await?;
        let bounds = period_bounds(now, self.offset);
        let intervals = self.store.find_closed_intervals(employee.id).await?;
        debug!(employee_id = employee.id, count = intervals.len(), "Aggregating intervals");

        let [day, week, month, total] =
            accumulate(&intervals, &bounds).map(|d| WorkedTime::from_seconds(d.num_seconds()));

        Ok(Totals {
            employee,
            day,
            week,
            month,
            total,
        })
    }
}
