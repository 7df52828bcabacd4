//! Which (day, city) slices a run requests, and in what order.
//!
//! Order matters: when the insertion budget runs out, every slice after the
//! cut-off is skipped. Slices are ordered days outer, cities inner, with cities
//! in input order.

use chrono::{DateTime, Days, NaiveDate, Utc};

use crate::model::CityCoordinate;

/// One UTC calendar day as a half-open `[start, end)` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub day: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    /// `None` for the last representable date, which has no following midnight.
    pub fn for_day(day: NaiveDate) -> Option<Self> {
        let start = day.and_time(chrono::NaiveTime::MIN).and_utc();
        let end = day
            .checked_add_days(Days::new(1))?
            .and_time(chrono::NaiveTime::MIN)
            .and_utc();

        Some(Self { day, start, end })
    }
}

/// Up to `days` consecutive windows beginning at `start`; stops short at the
/// end of the calendar.
pub fn day_windows(start: NaiveDate, days: u32) -> Vec<DayWindow> {
    start
        .iter_days()
        .take(days as usize)
        .filter_map(DayWindow::for_day)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchSlice<'a> {
    pub window: DayWindow,
    pub city: &'a CityCoordinate,
}

pub fn plan_slices<'a>(cities: &'a [CityCoordinate], windows: &[DayWindow]) -> Vec<FetchSlice<'a>> {
    windows
        .iter()
        .flat_map(|window| cities.iter().map(move |city| FetchSlice { window: *window, city }))
        .collect()
}
