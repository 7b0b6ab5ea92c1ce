use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use crate::schedule::holidays::ua_public_holidays;

/// Business hours: one-hour slots starting 09:00..=19:00.
pub const FIRST_HOUR: u32 = 9;
pub const LAST_HOUR: u32 = 19;

/// Decides which calendar days are open for booking and owns the shop-local
/// clock. Holiday sets are computed once per year and cached.
pub struct CalendarPolicy {
    tz: Tz,
    holidays: Mutex<HashMap<i32, BTreeSet<NaiveDate>>>,
}

impl CalendarPolicy {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            holidays: Mutex::new(HashMap::new()),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn now_local(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    pub fn today(&self) -> NaiveDate {
        self.now_local().date_naive()
    }

    pub fn today_key(&self) -> String {
        self.now_local().format(super::dates::DATE_KEY_FMT).to_string()
    }

    /// A date is closed on the weekly rest day (Sunday) and on national
    /// holidays; every other day is open.
    pub fn is_open(&self, date: NaiveDate) -> bool {
        if date.weekday() == Weekday::Sun {
            return false;
        }
        !self.is_holiday(date)
    }

    fn is_holiday(&self, date: NaiveDate) -> bool {
        let mut cache = self.holidays.lock().expect("holiday cache poisoned");
        cache
            .entry(date.year())
            .or_insert_with(|| ua_public_holidays(date.year()))
            .contains(&date)
    }

    /// Resolves a naive slot start to a timezone-aware instant. `None` for
    /// local times that do not exist (DST gap).
    pub fn localize(&self, slot: NaiveDateTime) -> Option<DateTime<Tz>> {
        self.tz.from_local_datetime(&slot).earliest()
    }
}

/// The full business-hour grid, in ascending order.
pub fn hour_slots() -> impl Iterator<Item = String> {
    (FIRST_HOUR..=LAST_HOUR).map(|h| format!("{h:02}:00"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CalendarPolicy {
        CalendarPolicy::new(chrono_tz::Europe::Kyiv)
    }

    #[test]
    fn sundays_are_closed() {
        // 16.02.2025 is a Sunday
        assert!(!policy().is_open(NaiveDate::from_ymd_opt(2025, 2, 16).unwrap()));
        // 15.02.2025 is a Saturday and stays open
        assert!(policy().is_open(NaiveDate::from_ymd_opt(2025, 2, 15).unwrap()));
    }

    #[test]
    fn holidays_are_closed() {
        assert!(!policy().is_open(NaiveDate::from_ymd_opt(2025, 8, 24).unwrap()));
        assert!(!policy().is_open(NaiveDate::from_ymd_opt(2025, 12, 25).unwrap()));
    }

    #[test]
    fn ordinary_weekday_is_open() {
        assert!(policy().is_open(NaiveDate::from_ymd_opt(2025, 2, 17).unwrap()));
    }

    #[test]
    fn grid_shape() {
        let slots: Vec<String> = hour_slots().collect();
        assert_eq!(slots.len(), 11);
        assert_eq!(slots.first().map(String::as_str), Some("09:00"));
        assert_eq!(slots.last().map(String::as_str), Some("19:00"));
    }
}
