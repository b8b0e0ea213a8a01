use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

/// Storage format for ticket timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const MONTH_NAMES_RU: [&str; 12] = [
    "Январь", "Февраль", "Март", "Апрель", "Май", "Июнь", "Июль", "Август", "Сентябрь", "Октябрь",
    "Ноябрь", "Декабрь",
];

/// Get the last day of a given month. `None` for an out-of-range month.
pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }?;
    Some(first_of_next - Duration::days(1))
}

/// Monday and Sunday of an ISO week. `None` when the week does not exist in that year.
pub fn iso_week_bounds(year: i32, week: u32) -> Option<(NaiveDate, NaiveDate)> {
    let monday = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)?;
    Some((monday, monday + Duration::days(6)))
}

/// Russian month name for 1..=12.
pub fn month_name_ru(month: u32) -> &'static str {
    MONTH_NAMES_RU
        .get(month.wrapping_sub(1) as usize)
        .copied()
        .unwrap_or("")
}

pub fn start_of_day(d: NaiveDate) -> NaiveDateTime {
    d.and_time(NaiveTime::MIN)
}

pub fn end_of_day(d: NaiveDate) -> NaiveDateTime {
    // 23:59:59 is always a valid wall time.
    d.and_hms_opt(23, 59, 59).unwrap_or_else(|| start_of_day(d))
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Parse a stored timestamp. Accepts a bare date, `YYYY-MM-DD HH:MM:SS` and the `T` separated form.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| parse_date(s).map(start_of_day))
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}
