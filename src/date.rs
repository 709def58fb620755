//! Calendar-day arithmetic for trip ranges.
//!
//! Everything here works on [`NaiveDate`] values, so time-of-day and
//! daylight-saving shifts never leak into day counts. Timestamps coming from
//! a clock or a picker are reduced to their local calendar day with
//! [`start_of_day`] before any arithmetic happens.

use chrono::{DateTime, Datelike, Days, Local, NaiveDate, NaiveDateTime, TimeZone, Weekday};

/// Anything that can be reduced to a calendar day.
pub trait ToCalendarDay {
    fn to_calendar_day(&self) -> NaiveDate;
}

impl ToCalendarDay for NaiveDate {
    fn to_calendar_day(&self) -> NaiveDate {
        *self
    }
}

impl ToCalendarDay for NaiveDateTime {
    fn to_calendar_day(&self) -> NaiveDate {
        self.date()
    }
}

impl<Tz: TimeZone> ToCalendarDay for DateTime<Tz> {
    /// Uses the date as seen in the value's own time zone.
    fn to_calendar_day(&self) -> NaiveDate {
        self.date_naive()
    }
}

/// The local calendar day right now.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn start_of_day<T: ToCalendarDay + ?Sized>(d: &T) -> NaiveDate {
    d.to_calendar_day()
}

/// The day `n` days after `d` (`n` may be negative). Saturates at the
/// bounds of the representable range.
pub fn add_days(d: NaiveDate, n: i64) -> NaiveDate {
    let shifted = if n >= 0 {
        d.checked_add_days(Days::new(n.unsigned_abs()))
    } else {
        d.checked_sub_days(Days::new(n.unsigned_abs()))
    };
    shifted.unwrap_or(if n < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}

/// Signed whole-day difference `a - b`; positive when `a` is after `b`.
pub fn diff_days<A, B>(a: &A, b: &B) -> i64
where
    A: ToCalendarDay + ?Sized,
    B: ToCalendarDay + ?Sized,
{
    (start_of_day(a) - start_of_day(b)).num_days()
}

/// The Monday on or before `d`. Weeks start on Monday.
pub fn monday_of_week<T: ToCalendarDay + ?Sized>(d: &T) -> NaiveDate {
    let day = start_of_day(d);
    let offset = day.weekday().num_days_from_monday();
    add_days(day, -i64::from(offset))
}

pub fn friday_of_week<T: ToCalendarDay + ?Sized>(d: &T) -> NaiveDate {
    add_days(monday_of_week(d), 4)
}

pub fn is_monday<T: ToCalendarDay + ?Sized>(d: &T) -> bool {
    start_of_day(d).weekday() == Weekday::Mon
}

pub fn is_friday<T: ToCalendarDay + ?Sized>(d: &T) -> bool {
    start_of_day(d).weekday() == Weekday::Fri
}

fn short_day(d: NaiveDate) -> String {
    d.format("%a, %b %-d").to_string()
}

/// Render a range as `Mon, Jun 10 → Fri, Jun 14`.
pub fn format_range<S, E>(start: &S, end: &E) -> String
where
    S: ToCalendarDay + ?Sized,
    E: ToCalendarDay + ?Sized,
{
    format!(
        "{} \u{2192} {}",
        short_day(start_of_day(start)),
        short_day(start_of_day(end))
    )
}

/// Parse an ISO 8601 `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{value}'. Use YYYY-MM-DD."))
}
