use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Result;
use regex::Regex;
use reqwest_middleware::ClientBuilder;
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde_json::Value;

const BAZAGAI_BASE: &str = "https://baza-gai.com.ua/nomer";
const RETRIES: u32 = 1;

/// What the plate registry knows about a vehicle. Format validity never
/// implies existence; this is only ever filled from a registry answer.
#[derive(Debug, Clone)]
pub struct PlateInfo {
    pub plate: String,
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub model_year: Option<String>,
    pub vin: Option<String>,
    pub is_stolen: bool,
}

pub fn normalize_plate(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '–' | '—'))
        .collect::<String>()
        .to_uppercase()
}

/// Ukrainian civilian plate: 2 letters + 4 digits + 2 letters, Latin or
/// Cyrillic (including І/Ї/Є).
pub fn plate_format_ok(s: &str) -> bool {
    static PLATE_RE: OnceLock<Regex> = OnceLock::new();
    let re = PLATE_RE.get_or_init(|| {
        Regex::new(r"^[A-ZА-ЯІЇЄ]{2}\d{4}[A-ZА-ЯІЇЄ]{2}$").expect("plate regex")
    });
    re.is_match(&normalize_plate(s))
}

/// Baza-GAI lookup. `Ok(None)` covers every refusal (bad format, missing
/// key, registry miss); `Err` is a transport failure. Both degrade the same
/// way upstream: the plate cannot be confirmed right now.
pub async fn fetch_plate_info(
    plate: &str,
    api_key: Option<&str>,
    timeout_sec: u64,
) -> Result<Option<PlateInfo>> {
    let plate = normalize_plate(plate);
    if !plate_format_ok(&plate) {
        return Ok(None);
    }
    let Some(api_key) = api_key.filter(|k| !k.is_empty()) else {
        log::warn!("[baza-gai] API key is missing, request skipped");
        return Ok(None);
    };

    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(RETRIES);
    let client = ClientBuilder::new(
        reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()?,
    )
    .with(RetryTransientMiddleware::new_with_policy(retry_policy))
    .build();

    let response = client
        .get(format!("{BAZAGAI_BASE}/{plate}"))
        .header("Accept", "application/json")
        .header("X-Api-Key", api_key)
        .send()
        .await?;

    if response.status() != reqwest::StatusCode::OK {
        log::warn!("[baza-gai] HTTP {} for plate {}", response.status(), plate);
        return Ok(None);
    }

    let data: Value = serde_json::from_str(&response.text().await?)?;
    let text = |keys: &[&str]| {
        keys.iter().find_map(|k| match data.get(*k) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    };

    Ok(Some(PlateInfo {
        plate,
        vendor: text(&["vendor", "make"]),
        model: text(&["model"]),
        model_year: text(&["model_year", "year"]),
        vin: text(&["vin"]),
        is_stolen: data
            .get("is_stolen")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyrillic_plate_validates() {
        assert!(plate_format_ok("АА1234ВС"));
        // normalization handles case, spaces and dashes
        assert!(plate_format_ok("аа 1234-вс"));
        assert_eq!(normalize_plate("аа 1234–вс"), "АА1234ВС");
    }

    #[test]
    fn latin_and_extended_letters() {
        assert!(plate_format_ok("AB1234CE"));
        assert!(plate_format_ok("ІВ5678ЇЄ"));
    }

    #[test]
    fn wrong_shapes_fail() {
        assert!(!plate_format_ok("AA1234")); // too short
        assert!(!plate_format_ok("AA12345CE")); // five digits
        assert!(!plate_format_ok("1234ABCD"));
        assert!(!plate_format_ok(""));
    }
}
