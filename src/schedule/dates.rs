use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

/// Canonical date-key form used by the ledger: `dd.mm.yyyy`.
pub const DATE_KEY_FMT: &str = "%d.%m.%Y";

/// Normalizes free-text user input (`15.02`, `15.02.25`, `15.02.2025`,
/// `/` tolerated as separator) to the canonical date key. Short forms take
/// the year from `today`. Returns `None` for anything unparseable or for
/// impossible calendar dates.
pub fn normalize_date(text: &str, today: NaiveDate) -> Option<String> {
    static SHORT: OnceLock<Regex> = OnceLock::new();
    static FULL: OnceLock<Regex> = OnceLock::new();

    let text = text.trim().replace('/', ".");
    if text.is_empty() {
        return None;
    }

    let short = SHORT.get_or_init(|| Regex::new(r"^(\d{1,2})\.(\d{1,2})$").expect("date regex"));
    if let Some(c) = short.captures(&text) {
        let day: u32 = c[1].parse().ok()?;
        let month: u32 = c[2].parse().ok()?;
        let date = NaiveDate::from_ymd_opt(today.year(), month, day)?;
        return Some(date.format(DATE_KEY_FMT).to_string());
    }

    let full = FULL
        .get_or_init(|| Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{2}|\d{4})$").expect("date regex"));
    if let Some(c) = full.captures(&text) {
        let day: u32 = c[1].parse().ok()?;
        let month: u32 = c[2].parse().ok()?;
        let mut year: i32 = c[3].parse().ok()?;
        if year < 100 {
            year += 2000;
        }
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        return Some(date.format(DATE_KEY_FMT).to_string());
    }

    None
}

pub fn parse_date_key(date_key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date_key, DATE_KEY_FMT).ok()
}

/// Combines a date key and an `HH:MM` time string into a naive slot start.
pub fn slot_naive(date_key: &str, time: &str) -> Option<NaiveDateTime> {
    let date = parse_date_key(date_key)?;
    let time = NaiveTime::parse_from_str(time, "%H:%M").ok()?;
    Some(date.and_time(time))
}

/// Deterministic order id: `YYYYMMDD-HHMM-<user id>`. Stable for the life of
/// the appointment; unique because a slot is claimed at most once.
pub fn gen_order_id(date_key: &str, time: &str, user_id: u64) -> Option<String> {
    let slot = slot_naive(date_key, time)?;
    Some(format!("{}-{}", slot.format("%Y%m%d-%H%M"), user_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 10).unwrap()
    }

    #[test]
    fn short_form_takes_current_year() {
        assert_eq!(normalize_date("15.02", today()).as_deref(), Some("15.02.2025"));
        assert_eq!(normalize_date("1.3", today()).as_deref(), Some("01.03.2025"));
    }

    #[test]
    fn two_digit_year_is_expanded() {
        assert_eq!(
            normalize_date("15.02.25", today()).as_deref(),
            Some("15.02.2025")
        );
        assert_eq!(
            normalize_date("15.02.2025", today()).as_deref(),
            Some("15.02.2025")
        );
    }

    #[test]
    fn slash_separator_is_tolerated() {
        assert_eq!(normalize_date("15/02", today()).as_deref(), Some("15.02.2025"));
    }

    #[test]
    fn impossible_dates_are_rejected() {
        assert_eq!(normalize_date("31.13", today()), None);
        assert_eq!(normalize_date("30.02", today()), None);
        assert_eq!(normalize_date("abc", today()), None);
        assert_eq!(normalize_date("", today()), None);
        assert_eq!(normalize_date("15.02.20255", today()), None);
    }

    #[test]
    fn order_id_is_deterministic() {
        assert_eq!(
            gen_order_id("15.02.2025", "10:00", 42).as_deref(),
            Some("20250215-1000-42")
        );
        assert_eq!(gen_order_id("15.02.2025", "25:00", 42), None);
    }

    #[test]
    fn slot_parsing() {
        let slot = slot_naive("15.02.2025", "09:00").unwrap();
        assert_eq!(slot.format("%Y-%m-%d %H:%M").to_string(), "2025-02-15 09:00");
        assert!(slot_naive("15.13.2025", "09:00").is_none());
    }
}
