use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;

const UA_MONTHS: [&str; 12] = [
    "Січень",
    "Лютий",
    "Березень",
    "Квітень",
    "Травень",
    "Червень",
    "Липень",
    "Серпень",
    "Вересень",
    "Жовтень",
    "Листопад",
    "Грудень",
];

pub fn ensure_receipts_dir(path: &Path) -> Result<PathBuf> {
    fs::create_dir_all(path)
        .with_context(|| format!("cannot create receipts dir {}", path.display()))?;
    path.canonicalize()
        .with_context(|| format!("cannot resolve receipts dir {}", path.display()))
}

fn safe_filename(name: &str) -> String {
    name.chars()
        .filter(|ch| ch.is_alphanumeric() || matches!(ch, '-' | '_' | '.' | '#' | ' '))
        .collect::<String>()
        .trim()
        .to_string()
}

/// The order id starts with the slot timestamp (`YYYYMMDD-HHMM-...`); use it
/// so receipts land in the month the work was booked for.
fn parse_order_dt(order_id: &str) -> Option<NaiveDateTime> {
    let mut head = order_id.splitn(3, '-');
    let date = head.next()?;
    let time = head.next()?;
    NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y%m%d %H%M").ok()
}

fn month_dir_name(dt: NaiveDateTime) -> String {
    use chrono::Datelike;
    let month = UA_MONTHS
        .get(dt.month() as usize - 1)
        .copied()
        .unwrap_or("Місяць");
    format!("{} {}", month, dt.year())
}

fn make_filename(dt: NaiveDateTime, user_name: Option<&str>, order_id: &str, ext: &str) -> String {
    let stamp = dt.format("%Y-%m-%d_%H%M");
    let base = match user_name {
        Some(name) if !name.trim().is_empty() => format!("{stamp}__{name}"),
        _ => format!("{stamp}__order_{order_id}"),
    };
    format!("{}.{}", safe_filename(&base), ext.trim_start_matches('.'))
}

/// Writes a receipt under `<receipts_dir>/<Місяць YYYY>/`. The filename
/// carries the slot timestamp plus the customer name or order id, so two
/// orders saved at the same instant never collide.
pub fn save_receipt_bytes(
    order_id: &str,
    raw: &[u8],
    receipts_dir: &Path,
    ext: &str,
    user_name: Option<&str>,
    fallback_dt: NaiveDateTime,
) -> Result<PathBuf> {
    if raw.is_empty() {
        bail!("refusing to save an empty receipt for order {order_id}");
    }

    let dt = parse_order_dt(order_id).unwrap_or(fallback_dt);
    let month_dir = receipts_dir.join(month_dir_name(dt));
    fs::create_dir_all(&month_dir)
        .with_context(|| format!("cannot create {}", month_dir.display()))?;

    let path = month_dir.join(make_filename(dt, user_name, order_id, ext));
    fs::write(&path, raw).with_context(|| format!("cannot write {}", path.display()))?;

    let abs = path.canonicalize().unwrap_or(path);
    log::info!("Receipt saved: {}", abs.display());
    Ok(abs)
}

/// Plain-text test receipt. This is an explicit simulation; no acquiring
/// happens anywhere in the bot.
pub fn format_receipt_text(
    order_id: &str,
    amount_uah: i64,
    customer_name: &str,
    phone: &str,
    now: NaiveDateTime,
) -> String {
    let lines = [
        "=== TEST RECEIPT ===".to_string(),
        format!("Date:       {}", now.format("%Y-%m-%d %H:%M:%S")),
        format!("Order ID:   {order_id}"),
        format!(
            "Customer:   {}",
            if customer_name.is_empty() {
                "—"
            } else {
                customer_name
            }
        ),
        format!(
            "Phone:      {}",
            if phone.is_empty() {
                "—".to_string()
            } else {
                format!("+380{phone}")
            }
        ),
        format!("Amount:     {amount_uah} UAH"),
        "Status:     PAID (test)".to_string(),
        "Note:       This is a test receipt (no real acquiring).".to_string(),
    ];
    lines.join("\n") + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 2, 15)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn order_timestamp_is_recovered() {
        let parsed = parse_order_dt("20250215-1000-42").unwrap();
        assert_eq!(parsed, dt());
        assert!(parse_order_dt("garbage").is_none());
    }

    #[test]
    fn filename_prefers_customer_name() {
        let name = make_filename(dt(), Some("Тарас Коваль"), "20250215-1000-42", "txt");
        assert_eq!(name, "2025-02-15_1000__Тарас Коваль.txt");
        let anon = make_filename(dt(), None, "20250215-1000-42", ".txt");
        assert_eq!(anon, "2025-02-15_1000__order_20250215-1000-42.txt");
    }

    #[test]
    fn unsafe_characters_are_stripped() {
        assert_eq!(safe_filename("a/b\\c:d*e?.txt"), "abcde.txt");
    }

    #[test]
    fn save_creates_month_subdir_and_refuses_empty() {
        let dir = std::env::temp_dir().join(format!("sto-receipts-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);

        let path = save_receipt_bytes(
            "20250215-1000-42",
            b"=== TEST RECEIPT ===\n",
            &dir,
            "txt",
            None,
            dt(),
        )
        .unwrap();
        assert!(path.exists());
        assert!(path.parent().unwrap().ends_with("Лютий 2025"));

        let err = save_receipt_bytes("20250215-1000-42", b"", &dir, "txt", None, dt());
        assert!(err.is_err());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn receipt_text_shape() {
        let text = format_receipt_text("20250215-1000-42", 1850, "Тарас Коваль", "0671234567", dt());
        assert!(text.contains("Order ID:   20250215-1000-42"));
        assert!(text.contains("Amount:     1850 UAH"));
        assert!(text.contains("+3800671234567"));
        assert!(text.contains("PAID (test)"));
    }
}
