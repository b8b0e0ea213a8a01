use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::Serialize;

use crate::clock::Clock;
use crate::date_util::{
    end_of_day, iso_week_bounds, last_day_of_month, month_name_ru, parse_date, start_of_day,
};
use crate::error::{Error, Result};

static RE_WEEK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:(\d{4})-)?[wW](\d{1,2})$").unwrap());
static RE_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[mM](\d{1,2})|(\d{4})-(\d{2}))$").unwrap());
static RE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2})\s*\.\.\s*(\d{4}-\d{2}-\d{2})$").unwrap()
});

/// Filtering granularity chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodMode {
    Week,
    Month,
    CustomRange,
}

/// Raw period controls as submitted by the presentation layer. Exactly the
/// payload belonging to `mode` must be populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodSelection {
    pub mode: PeriodMode,
    pub week: Option<u32>,
    pub month: Option<u32>,
    /// Year of the week or month. When absent it is inferred from today.
    pub year: Option<i32>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl PeriodSelection {
    pub fn week(week: u32) -> Self {
        Self {
            mode: PeriodMode::Week,
            week: Some(week),
            month: None,
            year: None,
            start_date: None,
            end_date: None,
        }
    }

    pub fn month(month: u32) -> Self {
        Self {
            mode: PeriodMode::Month,
            week: None,
            month: Some(month),
            year: None,
            start_date: None,
            end_date: None,
        }
    }

    pub fn range(start: &str, end: &str) -> Self {
        Self {
            mode: PeriodMode::CustomRange,
            week: None,
            month: None,
            year: None,
            start_date: Some(start.to_string()),
            end_date: Some(end.to_string()),
        }
    }

    /// Pin a week or month selection to an explicit year.
    pub fn with_year(mut self, year: Option<i32>) -> Self {
        self.year = year;
        self
    }

    /// Build a selection from independent inputs, inferring the mode from
    /// whichever one is present. Fails when none or several are given.
    pub fn from_inputs(
        week: Option<u32>,
        month: Option<u32>,
        start_date: Option<String>,
        end_date: Option<String>,
    ) -> Result<Self> {
        let has_range = start_date.is_some() || end_date.is_some();
        let populated = [week.is_some(), month.is_some(), has_range]
            .iter()
            .filter(|&&p| p)
            .count();
        if populated != 1 {
            return Err(Error::Validation(
                "choose exactly one of week, month or date range".into(),
            ));
        }
        let mode = if week.is_some() {
            PeriodMode::Week
        } else if month.is_some() {
            PeriodMode::Month
        } else {
            PeriodMode::CustomRange
        };
        Ok(Self {
            mode,
            week,
            month,
            year: None,
            start_date,
            end_date,
        })
    }

    /// Parse a compact selection string.
    ///
    /// Supported formats:
    /// - `w5`, `W05`: ISO week number, year inferred
    /// - `2024-W05`: ISO week of an explicit ISO week-year
    /// - `m3`, `M03`: month number, year inferred
    /// - `2024-03`: month of an explicit year
    /// - `2025-01-01..2025-01-31`: inclusive date range
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let number = |text: &str| -> Result<u32> {
            text.parse()
                .map_err(|_| Error::Validation(format!("invalid period: {s}")))
        };
        let year = |text: Option<&str>| -> Result<Option<i32>> {
            text.map(str::parse)
                .transpose()
                .map_err(|_| Error::Validation(format!("invalid year: {s}")))
        };

        if let Some(caps) = RE_WEEK.captures(s) {
            let pinned = year(caps.get(1).map(|m| m.as_str()))?;
            return Ok(Self::week(number(&caps[2])?).with_year(pinned));
        }

        if let Some(caps) = RE_MONTH.captures(s) {
            let selection = match caps.get(1) {
                Some(m) => Self::month(number(m.as_str())?),
                None => {
                    let pinned = year(caps.get(2).map(|m| m.as_str()))?;
                    Self::month(number(&caps[3])?).with_year(pinned)
                }
            };
            return Ok(selection);
        }

        if let Some(caps) = RE_RANGE.captures(s) {
            return Ok(Self::range(&caps[1], &caps[2]));
        }

        Err(Error::Validation(format!("unrecognized period: {s}")))
    }

    fn check_exclusive(&self) -> Result<()> {
        let has_range = self.start_date.is_some() || self.end_date.is_some();
        let (own, others) = match self.mode {
            PeriodMode::Week => (self.week.is_some(), self.month.is_some() || has_range),
            PeriodMode::Month => (self.month.is_some(), self.week.is_some() || has_range),
            PeriodMode::CustomRange => (
                self.start_date.is_some() && self.end_date.is_some(),
                self.week.is_some() || self.month.is_some() || self.year.is_some(),
            ),
        };
        if !own {
            return Err(Error::Validation(format!(
                "{:?} selection is missing its value",
                self.mode
            )));
        }
        if others {
            return Err(Error::Validation(format!(
                "{:?} selection must not carry values of another mode",
                self.mode
            )));
        }
        Ok(())
    }
}

/// Inclusive calendar-day range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// First instant of the range (start 00:00:00).
    pub fn start_instant(&self) -> NaiveDateTime {
        start_of_day(self.start)
    }

    /// Last instant of the range (end 23:59:59).
    pub fn end_instant(&self) -> NaiveDateTime {
        end_of_day(self.end)
    }

    /// Number of calendar days covered, both ends included.
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// A concrete period of one of the three kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Period {
    Week { year: i32, week: u32 },
    Month { year: i32, month: u32 },
    Range { start: NaiveDate, end: NaiveDate },
}

impl Period {
    /// Get the date range (inclusive start, inclusive end) for this period.
    pub fn date_range(&self) -> Result<DateRange> {
        match self {
            Period::Week { year, week } => {
                let (start, end) = iso_week_bounds(*year, *week).ok_or_else(|| {
                    Error::Validation(format!("week {week} does not exist in {year}"))
                })?;
                Ok(DateRange { start, end })
            }
            Period::Month { year, month } => {
                let start = NaiveDate::from_ymd_opt(*year, *month, 1)
                    .ok_or_else(|| Error::Validation(format!("invalid month: {month}")))?;
                let end = last_day_of_month(*year, *month)
                    .ok_or_else(|| Error::Validation(format!("invalid month: {month}")))?;
                Ok(DateRange { start, end })
            }
            Period::Range { start, end } => {
                if start > end {
                    return Err(Error::Validation(format!(
                        "range start {start} is after end {end}"
                    )));
                }
                Ok(DateRange {
                    start: *start,
                    end: *end,
                })
            }
        }
    }

    /// Get the comparison period: the one immediately preceding this one.
    ///
    /// Fails when that period falls outside the representable calendar.
    pub fn previous(&self) -> Result<Self> {
        let out_of_range = || Error::Validation(format!("no period precedes {self}"));
        let previous = match self {
            Period::Week { year, week: 1 } => Period::Week {
                year: year.checked_sub(1).ok_or_else(out_of_range)?,
                week: 52,
            },
            Period::Week { year, week } => Period::Week {
                year: *year,
                week: week - 1,
            },
            Period::Month { year, month: 1 } => Period::Month {
                year: year.checked_sub(1).ok_or_else(out_of_range)?,
                month: 12,
            },
            Period::Month { year, month } => Period::Month {
                year: *year,
                month: month - 1,
            },
            Period::Range { start, end } => {
                let days = (*end - *start).num_days() + 1;
                Period::Range {
                    start: start
                        .checked_sub_signed(Duration::days(days))
                        .ok_or_else(out_of_range)?,
                    end: start
                        .checked_sub_signed(Duration::days(1))
                        .ok_or_else(out_of_range)?,
                }
            }
        };
        Ok(previous)
    }

    pub fn mode(&self) -> PeriodMode {
        match self {
            Period::Week { .. } => PeriodMode::Week,
            Period::Month { .. } => PeriodMode::Month,
            Period::Range { .. } => PeriodMode::CustomRange,
        }
    }

    /// Canonical key string.
    pub fn to_key(&self) -> String {
        match self {
            Period::Week { year, week } => format!("{year}-W{week:02}"),
            Period::Month { year, month } => format!("{year}-{month:02}"),
            Period::Range { start, end } => format!("{start}..{end}"),
        }
    }

    /// Human-readable label as shown in the period pickers.
    pub fn label(&self) -> String {
        match self {
            Period::Week { year, week } => match iso_week_bounds(*year, *week) {
                Some((start, end)) => format!(
                    "Неделя {week} ({} - {})",
                    start.format("%d-%m-%Y"),
                    end.format("%d-%m-%Y")
                ),
                None => format!("Неделя {week}"),
            },
            Period::Month { year, month } => format!("{} {year}", month_name_ru(*month)),
            Period::Range { start, end } => {
                format!("{} - {}", start.format("%d-%m-%Y"), end.format("%d-%m-%Y"))
            }
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_key())
    }
}

/// A period together with its concrete day range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSpan {
    pub period: Period,
    pub range: DateRange,
}

impl ResolvedSpan {
    fn new(period: Period) -> Result<Self> {
        let range = period.date_range()?;
        Ok(Self { period, range })
    }
}

/// The selected period and the comparison period preceding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPeriod {
    pub mode: PeriodMode,
    pub current: ResolvedSpan,
    pub previous: ResolvedSpan,
}

/// Turn a user selection into concrete current and previous periods.
///
/// Without an explicit year, week and month numbers greater than today's are
/// read as belonging to the previous year, so picking "week 50" in January
/// means last December.
pub fn resolve(selection: &PeriodSelection, clock: &dyn Clock) -> Result<ResolvedPeriod> {
    selection.check_exclusive()?;
    let today = clock.today();

    let current = match selection.mode {
        PeriodMode::Week => {
            let week = selection.week.unwrap_or_default();
            if !(1..=53).contains(&week) {
                return Err(Error::Validation(format!(
                    "week must be between 1 and 53, got {week}"
                )));
            }
            let iso = today.iso_week();
            let year = match selection.year {
                Some(year) => year,
                None if week > iso.week() => iso.year() - 1,
                None => iso.year(),
            };
            Period::Week { year, week }
        }
        PeriodMode::Month => {
            let month = selection.month.unwrap_or_default();
            if !(1..=12).contains(&month) {
                return Err(Error::Validation(format!(
                    "month must be between 1 and 12, got {month}"
                )));
            }
            let year = match selection.year {
                Some(year) => year,
                None if month > today.month() => today.year() - 1,
                None => today.year(),
            };
            Period::Month { year, month }
        }
        PeriodMode::CustomRange => {
            let raw_start = selection.start_date.as_deref().unwrap_or_default();
            let raw_end = selection.end_date.as_deref().unwrap_or_default();
            let start = parse_date(raw_start)
                .ok_or_else(|| Error::Validation(format!("invalid start date: {raw_start}")))?;
            let end = parse_date(raw_end)
                .ok_or_else(|| Error::Validation(format!("invalid end date: {raw_end}")))?;
            Period::Range { start, end }
        }
    };

    let current = ResolvedSpan::new(current)?;
    let previous = ResolvedSpan::new(current.period.previous()?)?;
    log::info!(
        "Resolved {} (previous {})",
        current.period,
        previous.period
    );

    Ok(ResolvedPeriod {
        mode: current.period.mode(),
        current,
        previous,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn clock() -> FixedClock {
        // 2025-10-15 is a Wednesday in ISO week 42.
        FixedClock(date(2025, 10, 15))
    }

    #[test]
    fn test_parse_week() {
        assert_eq!(PeriodSelection::parse("w5").unwrap(), PeriodSelection::week(5));
        assert_eq!(PeriodSelection::parse("W05").unwrap(), PeriodSelection::week(5));
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(PeriodSelection::parse("m3").unwrap(), PeriodSelection::month(3));
        assert_eq!(PeriodSelection::parse("M12").unwrap(), PeriodSelection::month(12));
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(
            PeriodSelection::parse("2025-01-01..2025-01-31").unwrap(),
            PeriodSelection::range("2025-01-01", "2025-01-31")
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert!(PeriodSelection::parse("garbage").is_err());
        assert!(PeriodSelection::parse("2025-Q1").is_err());
    }

    #[test]
    fn test_from_inputs_requires_exactly_one() {
        assert!(matches!(
            PeriodSelection::from_inputs(None, None, None, None),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            PeriodSelection::from_inputs(Some(3), Some(4), None, None),
            Err(Error::Validation(_))
        ));
        let sel = PeriodSelection::from_inputs(None, Some(4), None, None).unwrap();
        assert_eq!(sel.mode, PeriodMode::Month);
        let (start, end) = (Some("2025-01-01".into()), Some("2025-01-02".into()));
        let sel = PeriodSelection::from_inputs(None, None, start, end).unwrap();
        assert_eq!(sel.mode, PeriodMode::CustomRange);
    }

    #[test]
    fn test_resolve_rejects_mixed_payloads() {
        let mut sel = PeriodSelection::week(3);
        sel.month = Some(4);
        assert!(matches!(resolve(&sel, &clock()), Err(Error::Validation(_))));

        let mut sel = PeriodSelection::month(3);
        sel.month = None;
        assert!(matches!(resolve(&sel, &clock()), Err(Error::Validation(_))));

        let mut sel = PeriodSelection::range("2025-01-01", "2025-01-31");
        sel.end_date = None;
        assert!(matches!(resolve(&sel, &clock()), Err(Error::Validation(_))));
    }

    #[test]
    fn test_resolve_week_same_year() {
        let resolved = resolve(&PeriodSelection::week(10), &clock()).unwrap();
        assert_eq!(resolved.mode, PeriodMode::Week);
        assert_eq!(resolved.current.period, Period::Week { year: 2025, week: 10 });
        assert_eq!(resolved.previous.period, Period::Week { year: 2025, week: 9 });
        assert_eq!(resolved.current.range.start, date(2025, 3, 3));
        assert_eq!(resolved.current.range.end, date(2025, 3, 9));
        assert_eq!(resolved.current.range.start.weekday(), chrono::Weekday::Mon);
    }

    #[test]
    fn test_resolve_week_one_wraps_to_week_52() {
        let resolved = resolve(&PeriodSelection::week(1), &clock()).unwrap();
        assert_eq!(resolved.current.period, Period::Week { year: 2025, week: 1 });
        assert_eq!(resolved.previous.period, Period::Week { year: 2024, week: 52 });
        assert!(resolved.previous.range.end < resolved.current.range.start);
    }

    #[test]
    fn test_resolve_week_after_current_rolls_back_a_year() {
        let resolved = resolve(&PeriodSelection::week(50), &clock()).unwrap();
        assert_eq!(resolved.current.period, Period::Week { year: 2024, week: 50 });
        assert_eq!(resolved.previous.period, Period::Week { year: 2024, week: 49 });
    }

    #[test]
    fn test_resolve_week_out_of_domain() {
        assert!(resolve(&PeriodSelection::week(0), &clock()).is_err());
        assert!(resolve(&PeriodSelection::week(54), &clock()).is_err());
        // Week 53 rolls back to 2024, which only has 52 ISO weeks.
        assert!(matches!(
            resolve(&PeriodSelection::week(53), &clock()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_previous_week_is_contiguous() {
        for week in 2..=52 {
            let current = Period::Week { year: 2025, week };
            let cur = current.date_range().unwrap();
            let prev = current.previous().unwrap().date_range().unwrap();
            assert_eq!(prev.end + Duration::days(1), cur.start, "week {week}");
            assert_eq!(prev.num_days(), 7);
        }
    }

    #[test]
    fn test_resolve_month() {
        let resolved = resolve(&PeriodSelection::month(2), &clock()).unwrap();
        assert_eq!(resolved.current.period, Period::Month { year: 2025, month: 2 });
        assert_eq!(resolved.current.range.start, date(2025, 2, 1));
        assert_eq!(resolved.current.range.end, date(2025, 2, 28));
        assert_eq!(resolved.previous.range.start, date(2025, 1, 1));
        assert_eq!(resolved.previous.range.end, date(2025, 1, 31));
    }

    #[test]
    fn test_resolve_month_january_wraps_to_december() {
        let resolved = resolve(&PeriodSelection::month(1), &clock()).unwrap();
        assert_eq!(resolved.previous.period, Period::Month { year: 2024, month: 12 });
        assert_eq!(resolved.previous.range.end, date(2024, 12, 31));
    }

    #[test]
    fn test_resolve_month_after_current_rolls_back_a_year() {
        let resolved = resolve(&PeriodSelection::month(11), &clock()).unwrap();
        assert_eq!(resolved.current.period, Period::Month { year: 2024, month: 11 });
        assert_eq!(resolved.current.range.end, date(2024, 11, 30));
    }

    #[test]
    fn test_resolve_month_out_of_domain() {
        assert!(resolve(&PeriodSelection::month(0), &clock()).is_err());
        assert!(resolve(&PeriodSelection::month(13), &clock()).is_err());
    }

    #[test]
    fn test_previous_month_is_contiguous() {
        for month in 1..=12 {
            let current = Period::Month { year: 2024, month };
            let cur = current.date_range().unwrap();
            let prev = current.previous().unwrap().date_range().unwrap();
            assert_eq!(prev.end + Duration::days(1), cur.start, "month {month}");
        }
    }

    #[test]
    fn test_resolve_range_previous_has_same_length() {
        let resolved =
            resolve(&PeriodSelection::range("2025-01-10", "2025-01-20"), &clock()).unwrap();
        let cur = resolved.current.range;
        let prev = resolved.previous.range;
        assert_eq!(cur.num_days(), 11);
        assert_eq!(prev.num_days(), cur.num_days());
        assert!(prev.end < cur.start);
        assert!(prev.end_instant() < cur.start_instant());
        assert_eq!(prev.start, date(2024, 12, 30));
        assert_eq!(prev.end, date(2025, 1, 9));
    }

    #[test]
    fn test_resolve_range_single_day() {
        let resolved =
            resolve(&PeriodSelection::range("2025-03-01", "2025-03-01"), &clock()).unwrap();
        assert_eq!(resolved.previous.range.start, date(2025, 2, 28));
        assert_eq!(resolved.previous.range.end, date(2025, 2, 28));
    }

    #[test]
    fn test_resolve_range_invalid() {
        assert!(resolve(&PeriodSelection::range("2025-02-01", "2025-01-01"), &clock()).is_err());
        assert!(resolve(&PeriodSelection::range("2025-02-30", "2025-03-01"), &clock()).is_err());
        assert!(resolve(&PeriodSelection::range("yesterday", "2025-03-01"), &clock()).is_err());
    }

    #[test]
    fn test_to_key_and_label() {
        assert_eq!(Period::Week { year: 2025, week: 5 }.to_key(), "2025-W05");
        assert_eq!(Period::Month { year: 2025, month: 3 }.to_key(), "2025-03");
        assert_eq!(
            Period::Week { year: 2025, week: 1 }.label(),
            "Неделя 1 (30-12-2024 - 05-01-2025)"
        );
        assert_eq!(Period::Month { year: 2025, month: 3 }.label(), "Март 2025");
    }

    #[test]
    fn test_range_instants() {
        let range = DateRange {
            start: date(2025, 3, 1),
            end: date(2025, 3, 2),
        };
        let last = date(2025, 3, 2).and_hms_opt(23, 59, 59).unwrap();
        assert_eq!(range.start_instant(), date(2025, 3, 1).and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(range.end_instant(), last);
    }

    #[test]
    fn test_parse_with_year() {
        assert_eq!(
            PeriodSelection::parse("2024-W05").unwrap(),
            PeriodSelection::week(5).with_year(Some(2024))
        );
        assert_eq!(
            PeriodSelection::parse("2024-03").unwrap(),
            PeriodSelection::month(3).with_year(Some(2024))
        );
        assert!(PeriodSelection::parse("2024-3").is_err());
    }

    #[test]
    fn test_resolve_explicit_year_skips_rollback() {
        // Month 3 is before October, so it would otherwise resolve to 2025.
        let sel = PeriodSelection::month(3).with_year(Some(2024));
        let resolved = resolve(&sel, &clock()).unwrap();
        assert_eq!(resolved.current.period, Period::Month { year: 2024, month: 3 });
        assert_eq!(resolved.previous.period, Period::Month { year: 2024, month: 2 });

        // Week 50 is after week 42, so it would otherwise resolve to 2024.
        let sel = PeriodSelection::week(50).with_year(Some(2023));
        let resolved = resolve(&sel, &clock()).unwrap();
        assert_eq!(resolved.current.period, Period::Week { year: 2023, week: 50 });
    }

    #[test]
    fn test_resolve_range_rejects_year() {
        let sel = PeriodSelection::range("2025-01-01", "2025-01-31").with_year(Some(2025));
        assert!(matches!(resolve(&sel, &clock()), Err(Error::Validation(_))));
    }

    #[test]
    fn test_resolve_range_at_calendar_floor() {
        let sel = PeriodSelection::range("-262143-01-01", "-262143-01-02");
        assert!(matches!(resolve(&sel, &clock()), Err(Error::Validation(_))));

        let floor = Period::Range {
            start: NaiveDate::MIN,
            end: NaiveDate::MIN,
        };
        assert!(matches!(floor.previous(), Err(Error::Validation(_))));
    }
}
