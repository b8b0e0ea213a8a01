use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::date_util::{iso_week_bounds, parse_timestamp};
use crate::error::Result;
use crate::query::period::{Period, PeriodSelection};
use crate::storage::repository;
use crate::storage::Database;

/// One entry of a week or month picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodOption {
    pub label: String,
    pub year: i32,
    /// Week number or month number.
    pub value: u32,
    /// Compact selection with the year pinned, e.g. `2024-W05` or `2024-03`.
    pub key: String,
}

impl PeriodOption {
    fn new(period: &Period, year: i32, value: u32) -> Self {
        Self {
            label: period.label(),
            year,
            value,
            key: period.to_key(),
        }
    }

    /// The selection that resolves back to exactly this entry.
    pub fn selection(&self) -> Result<PeriodSelection> {
        PeriodSelection::parse(&self.key)
    }
}

/// ISO weeks touching `[from, to]`, newest first.
pub fn week_options(from: NaiveDate, to: NaiveDate) -> Vec<PeriodOption> {
    let mut options = Vec::new();
    if from > to {
        return options;
    }
    let mut cursor = to;
    loop {
        let iso = cursor.iso_week();
        let Some((monday, _)) = iso_week_bounds(iso.year(), iso.week()) else {
            break;
        };
        let period = Period::Week {
            year: iso.year(),
            week: iso.week(),
        };
        options.push(PeriodOption::new(&period, iso.year(), iso.week()));
        if monday <= from {
            break;
        }
        cursor = monday - Duration::days(1);
    }
    options
}

/// Calendar months touching `[from, to]`, newest first.
pub fn month_options(from: NaiveDate, to: NaiveDate) -> Vec<PeriodOption> {
    let mut options = Vec::new();
    if from > to {
        return options;
    }
    let (mut year, mut month) = (to.year(), to.month());
    let stop = (from.year(), from.month());
    loop {
        options.push(PeriodOption::new(&Period::Month { year, month }, year, month));
        if (year, month) <= stop {
            break;
        }
        if month == 1 {
            year -= 1;
            month = 12;
        } else {
            month -= 1;
        }
    }
    options
}

/// Earliest and latest registration dates across the three queues.
pub async fn data_span(db: &Database) -> Result<Option<(NaiveDate, NaiveDate)>> {
    let span = db.reader().call(|conn| repository::ticket_span(conn)).await?;
    Ok(span.and_then(|(min, max)| {
        let min = parse_timestamp(&min)?;
        let max = parse_timestamp(&max)?;
        Some((min.date(), max.date()))
    }))
}
