//! Rule-generated holiday tables shipped with the crate.
//!
//! Fixed-date holidays that fall on a weekend move to their observed weekday
//! (Saturday to the preceding Friday, Sunday to the following Monday) and the
//! weekend date itself is not listed.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::BTreeMap;

use super::Holiday;

/// `n`-th (1-based) occurrence of `weekday` in the month.
fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

/// Last occurrence of `weekday` in the month.
fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last = first_of_next.pred_opt()?;
    let back = (7 + last.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    Some(last - Duration::days(i64::from(back)))
}

/// Observed date for a fixed-date holiday.
fn observed(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date.pred_opt().unwrap_or(date),
        Weekday::Sun => date.succ_opt().unwrap_or(date),
        _ => date,
    }
}

fn fixed(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).map(observed)
}

/// United States federal holidays plus the common days off around them.
pub fn united_states(first_year: i32, years: u32) -> Vec<Holiday> {
    let mut table: BTreeMap<&'static str, Vec<NaiveDate>> = BTreeMap::new();
    // Exclusive bound, clamped to the last year chrono can represent
    let last_year = first_year
        .saturating_add(i32::try_from(years).unwrap_or(i32::MAX))
        .min(NaiveDate::MAX.year().saturating_add(1));

    for year in first_year..last_year {
        let mut add = |name: &'static str, date: Option<NaiveDate>| {
            if let Some(date) = date {
                table.entry(name).or_default().push(date);
            }
        };

        add("New Year's Day", fixed(year, 1, 1));
        if year >= 1986 {
            add(
                "Martin Luther King Jr. Day",
                nth_weekday(year, 1, Weekday::Mon, 3),
            );
        }
        add("Washington's Birthday", nth_weekday(year, 2, Weekday::Mon, 3));
        add("Memorial Day", last_weekday(year, 5, Weekday::Mon));
        if year >= 2021 {
            add("Juneteenth National Independence Day", fixed(year, 6, 19));
        }
        add("Independence Day", fixed(year, 7, 4));
        add("Labor Day", nth_weekday(year, 9, Weekday::Mon, 1));
        add("Columbus Day", nth_weekday(year, 10, Weekday::Mon, 2));
        add("Veterans Day", fixed(year, 11, 11));

        let thanksgiving = nth_weekday(year, 11, Weekday::Thu, 4);
        add("Thanksgiving", thanksgiving);
        add("Day After Thanksgiving", thanksgiving.and_then(|d| d.succ_opt()));

        add("Christmas Eve", NaiveDate::from_ymd_opt(year, 12, 24));
        add("Christmas Day", fixed(year, 12, 25));
        add("New Year's Eve", NaiveDate::from_ymd_opt(year, 12, 31));
    }

    table
        .into_iter()
        .map(|(name, dates)| Holiday::new(name, dates))
        .collect()
}
