use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};

/// Ukrainian public holidays for one year: fixed dates plus the movable
/// feasts tied to Orthodox Easter (Easter itself and Trinity).
pub fn ua_public_holidays(year: i32) -> BTreeSet<NaiveDate> {
    let mut days = BTreeSet::new();

    let fixed: [(u32, u32); 9] = [
        (1, 1),   // Новий рік
        (3, 8),   // Міжнародний жіночий день
        (5, 1),   // День праці
        (5, 8),   // День пам'яті та перемоги
        (6, 28),  // День Конституції
        (7, 15),  // День Української Державності
        (8, 24),  // День Незалежності
        (10, 1),  // День захисників і захисниць
        (12, 25), // Різдво
    ];
    for (month, day) in fixed {
        if let Some(d) = NaiveDate::from_ymd_opt(year, month, day) {
            days.insert(d);
        }
    }

    let easter = orthodox_easter(year);
    days.insert(easter);
    days.insert(easter + Duration::days(49)); // Трійця

    days
}

/// Orthodox Easter by the Meeus Julian algorithm, shifted to the Gregorian
/// calendar. The +13 day offset holds for 1900..=2099, which covers any date
/// a booking bot will ever be asked about.
fn orthodox_easter(year: i32) -> NaiveDate {
    let a = year % 4;
    let b = year % 7;
    let c = year % 19;
    let d = (19 * c + 15) % 30;
    let e = (2 * a + 4 * b - d + 34).rem_euclid(7);
    let month = (d + e + 114) / 31;
    let day = (d + e + 114) % 31 + 1;

    let julian = NaiveDate::from_ymd_opt(year, month as u32, day as u32)
        .expect("computus always yields a valid March/April date");
    julian + Duration::days(13)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn easter_known_years() {
        assert_eq!(
            orthodox_easter(2024),
            NaiveDate::from_ymd_opt(2024, 5, 5).unwrap()
        );
        assert_eq!(
            orthodox_easter(2025),
            NaiveDate::from_ymd_opt(2025, 4, 20).unwrap()
        );
        assert_eq!(
            orthodox_easter(2026),
            NaiveDate::from_ymd_opt(2026, 4, 12).unwrap()
        );
    }

    #[test]
    fn fixed_holidays_present() {
        let days = ua_public_holidays(2025);
        assert!(days.contains(&NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
        assert!(days.contains(&NaiveDate::from_ymd_opt(2025, 8, 24).unwrap()));
        assert!(days.contains(&NaiveDate::from_ymd_opt(2025, 12, 25).unwrap()));
        // Трійця 2025: 20.04 + 49 днів
        assert!(days.contains(&NaiveDate::from_ymd_opt(2025, 6, 8).unwrap()));
    }

    #[test]
    fn ordinary_days_absent() {
        let days = ua_public_holidays(2025);
        assert!(!days.contains(&NaiveDate::from_ymd_opt(2025, 2, 15).unwrap()));
    }
}
