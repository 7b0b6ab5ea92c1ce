use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Result;
use regex::Regex;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde_json::Value;

use crate::models::VehicleInfo;

const AUTODEV_URL: &str = "https://api.auto.dev/vin";
const VPIC_URL: &str = "https://vpic.nhtsa.dot.gov/api/vehicles/DecodeVinValues";
const RETRIES: u32 = 1;

// ISO 3779 positional weights
const WEIGHTS: [u32; 17] = [8, 7, 6, 5, 4, 3, 2, 10, 0, 9, 8, 7, 6, 5, 4, 3, 2];

pub fn normalize_vin(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// 17 characters, Latin letters and digits, I/O/Q excluded.
pub fn vin_format_ok(s: &str) -> bool {
    static VIN_RE: OnceLock<Regex> = OnceLock::new();
    let re = VIN_RE.get_or_init(|| Regex::new(r"^[A-HJ-NPR-Z0-9]{17}$").expect("vin regex"));
    re.is_match(&normalize_vin(s))
}

// ISO 3779 transliteration; digits map to themselves
fn translit(ch: char) -> Option<u32> {
    Some(match ch {
        '0'..='9' => ch as u32 - '0' as u32,
        'A' | 'J' => 1,
        'B' | 'K' | 'S' => 2,
        'C' | 'L' | 'T' => 3,
        'D' | 'M' | 'U' => 4,
        'E' | 'N' | 'V' => 5,
        'F' | 'W' => 6,
        'G' | 'P' | 'X' => 7,
        'H' | 'Y' => 8,
        'R' | 'Z' => 9,
        _ => return None,
    })
}

/// ISO 3779 check digit: weighted sum mod 11, `X` for a remainder of 10,
/// compared against position 9.
pub fn vin_checksum_ok(s: &str) -> bool {
    let vin = normalize_vin(s);
    if !vin_format_ok(&vin) {
        return false;
    }
    let mut total = 0u32;
    for (i, ch) in vin.chars().enumerate() {
        match translit(ch) {
            Some(v) => total += v * WEIGHTS[i],
            None => return false,
        }
    }
    let remainder = total % 11;
    let expected = if remainder == 10 {
        'X'
    } else {
        char::from_digit(remainder, 10).expect("mod 11 remainder is a digit")
    };
    vin.chars().nth(8) == Some(expected)
}

fn http_client(timeout_sec: u64) -> Result<ClientWithMiddleware> {
    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(RETRIES);
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_sec))
        .build()?;
    Ok(ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}

/// Auto.dev VIN decode. `Ok(Some(..))` for any 200 answer (the descriptor
/// may still be partially empty), `Ok(None)` when the registry refused,
/// `Err` on transport problems. Never called before the checksum passes.
pub async fn fetch_vehicle_by_vin(
    vin: &str,
    api_key: &str,
    timeout_sec: u64,
) -> Result<Option<VehicleInfo>> {
    let client = http_client(timeout_sec)?;
    let response = client
        .get(format!("{AUTODEV_URL}/{vin}"))
        .header("Accept", "application/json")
        .header("x-api-key", api_key)
        .send()
        .await?;

    if response.status() != reqwest::StatusCode::OK {
        log::warn!("[auto.dev] HTTP {} for VIN {}", response.status(), vin);
        return Ok(None);
    }

    let payload: Value = serde_json::from_str(&response.text().await?)?;
    Ok(Some(extract_vehicle(&payload)))
}

/// Auto.dev answers with several payload shapes; probe them in a fixed
/// order: top level, then `data`/`vehicle`/`specs`, then `results[0]`.
fn extract_vehicle(payload: &Value) -> VehicleInfo {
    fn text(v: Option<&Value>) -> Option<String> {
        match v {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
    fn pick(obj: &Value, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| text(obj.get(*k)))
    }

    let mut make = pick(payload, &["make", "manufacturer"]);
    let mut model = pick(payload, &["model"]);
    let mut year = pick(payload, &["year"]);

    if let Some(nested) = ["data", "vehicle", "specs"]
        .iter()
        .find_map(|k| payload.get(*k).filter(|v| v.is_object()))
    {
        make = make.or_else(|| pick(nested, &["make", "manufacturer"]));
        model = model.or_else(|| pick(nested, &["model"]));
        year = year.or_else(|| pick(nested, &["year", "model_year", "year_of_manufacture"]));
    }

    if let Some(first) = payload
        .get("results")
        .or_else(|| payload.get("Result"))
        .and_then(|v| v.as_array())
        .and_then(|a| a.first())
    {
        make = make.or_else(|| pick(first, &["make", "manufacturer"]));
        model = model.or_else(|| pick(first, &["model"]));
        year = year.or_else(|| pick(first, &["year", "model_year"]));
    }

    VehicleInfo { make, model, year }
}

/// vPIC fallback: the VIN counts as confirmed when the decoder answers with
/// an error-code class of 0, 7 or 8 for any candidate model year.
pub async fn vpic_confirms(vin: &str, year_candidates: &[i32], timeout_sec: u64) -> Result<bool> {
    let client = http_client(timeout_sec)?;
    for year in year_candidates {
        let response = client
            .get(format!("{VPIC_URL}/{vin}?format=json&modelyear={year}"))
            .send()
            .await?;
        if response.status() != reqwest::StatusCode::OK {
            continue;
        }
        let payload: Value = serde_json::from_str(&response.text().await?)?;
        let code = payload
            .get("Results")
            .and_then(|v| v.as_array())
            .and_then(|a| a.first())
            .and_then(|r| r.get("ErrorCode"))
            .map(|v| match v {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        if code.starts_with('0') || code.starts_with('7') || code.starts_with('8') {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD_VIN: &str = "1HGCM82633A004352";

    #[test]
    fn canonical_vin_passes() {
        assert!(vin_format_ok(GOOD_VIN));
        assert!(vin_checksum_ok(GOOD_VIN));
        // normalization: case and stray whitespace
        assert!(vin_checksum_ok(" 1hgcm82633a004352 "));
    }

    #[test]
    fn format_rejects_before_checksum() {
        assert!(!vin_format_ok("AAAAAAAA")); // wrong length
        assert!(!vin_checksum_ok("AAAAAAAA"));
        assert!(!vin_format_ok("IIIIIIIIIIIIIIIII")); // I excluded
        assert!(!vin_format_ok("1HGCM82633A00435")); // 16 chars
    }

    #[test]
    fn checksum_is_sensitive_to_mutation() {
        // flipping any non-check character must break at least one position
        let mut broke = 0;
        for i in 0..17 {
            if i == 8 {
                continue;
            }
            let mut chars: Vec<char> = GOOD_VIN.chars().collect();
            chars[i] = if chars[i] == '7' { '5' } else { '7' };
            let mutated: String = chars.iter().collect();
            if !vin_checksum_ok(&mutated) {
                broke += 1;
            }
        }
        assert!(broke > 0);
    }

    #[test]
    fn extraction_rules_probe_in_order() {
        let top: Value = serde_json::json!({"make": "Honda", "model": "Accord", "year": 2003});
        let v = extract_vehicle(&top);
        assert_eq!(v.make.as_deref(), Some("Honda"));
        assert_eq!(v.year.as_deref(), Some("2003"));

        let nested: Value = serde_json::json!({
            "data": {"manufacturer": "Toyota", "model": "Corolla", "model_year": "2019"}
        });
        let v = extract_vehicle(&nested);
        assert_eq!(v.make.as_deref(), Some("Toyota"));
        assert_eq!(v.year.as_deref(), Some("2019"));

        let results: Value = serde_json::json!({"results": [{"make": "Audi", "year": 2021}]});
        let v = extract_vehicle(&results);
        assert_eq!(v.make.as_deref(), Some("Audi"));

        let empty: Value = serde_json::json!({"something": "else"});
        assert!(extract_vehicle(&empty).is_empty());
    }
}
