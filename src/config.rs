use std::collections::HashSet;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{bail, Context, Result};
use chrono_tz::Tz;
use percent_encoding::percent_decode_str;
use regex::Regex;
use url::Url;

const DEFAULT_TIMEZONE: &str = "Europe/Kyiv";
const DEFAULT_RECEIPTS_DIR: &str = "./receipts";
const GCAL_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

#[derive(Clone, Debug)]
pub struct GcalConfig {
    pub api_base: String,
    pub calendar_id: String,
    pub token: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bot_token: String,
    pub admin_ids: HashSet<u64>,
    pub tz: Tz,
    pub receipts_dir: PathBuf,
    pub auto_dev_api_key: String,
    pub auto_dev_timeout: u64,
    pub bazagai_api_key: Option<String>,
    pub bazagai_timeout: u64,
    pub gcal: Option<GcalConfig>,
    pub route_url: Option<Url>,
}

impl Config {
    /// Reads the whole configuration from the environment. Missing required
    /// credentials are fatal; optional integrations degrade with a warning.
    pub fn from_env() -> Result<Self> {
        let bot_token = match env::var("BOT_TOKEN") {
            Ok(v) if !v.trim().is_empty() => v,
            _ => bail!("BOT_TOKEN is not set in .env"),
        };
        let auto_dev_api_key = match env::var("AUTO_DEV_API_KEY") {
            Ok(v) if !v.trim().is_empty() => v,
            _ => bail!("AUTO_DEV_API_KEY is not set in .env (Auto.dev is required)"),
        };

        let admin_ids = parse_admin_ids(&env::var("ADMIN_IDS").unwrap_or_default());
        if admin_ids.is_empty() {
            log::warn!("ADMIN_IDS is empty, admin menu will be unreachable");
        }

        let tz_raw = env::var("TIMEZONE").unwrap_or_else(|_| DEFAULT_TIMEZONE.to_string());
        let tz: Tz = tz_raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid TIMEZONE {:?}: {}", tz_raw, e))?;

        let receipts_dir =
            PathBuf::from(env::var("RECEIPTS_DIR").unwrap_or_else(|_| DEFAULT_RECEIPTS_DIR.into()));

        let auto_dev_timeout = parse_secs("AUTO_DEV_TIMEOUT", 10)?;
        let bazagai_timeout = parse_secs("BAZAGAI_TIMEOUT", 10)?;
        let bazagai_api_key = env::var("BAZAGAI_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let gcal = match (env::var("GOOGLE_CALENDAR_ID"), env::var("GOOGLE_API_TOKEN")) {
            (Ok(id), Ok(token)) if !id.trim().is_empty() && !token.trim().is_empty() => {
                Some(GcalConfig {
                    api_base: env::var("GOOGLE_CALENDAR_API_BASE")
                        .unwrap_or_else(|_| GCAL_API_BASE.to_string()),
                    calendar_id: normalize_calendar_id(&id),
                    token,
                })
            }
            _ => None,
        };

        let route_url = match env::var("ROUTE_URL") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                Url::parse(raw.trim()).with_context(|| format!("invalid ROUTE_URL {:?}", raw))?,
            ),
            _ => None,
        };

        Ok(Self {
            bot_token,
            admin_ids,
            tz,
            receipts_dir,
            auto_dev_api_key,
            auto_dev_timeout,
            bazagai_api_key,
            bazagai_timeout,
            gcal,
            route_url,
        })
    }
}

fn parse_secs(var: &str, default: u64) -> Result<u64> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{var} must be a number of seconds, got {raw:?}")),
        Err(_) => Ok(default),
    }
}

fn parse_admin_ids(raw: &str) -> HashSet<u64> {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    let re = DIGITS.get_or_init(|| Regex::new(r"\d+").expect("digits regex"));
    re.find_iter(raw)
        .filter_map(|m| m.as_str().parse::<u64>().ok())
        .collect()
}

/// Accepts either a bare calendar id or a pasted Google Calendar URL
/// (embed/ical links) and reduces it to the underlying calendar address.
pub fn normalize_calendar_id(raw: &str) -> String {
    static GROUP: OnceLock<Regex> = OnceLock::new();
    static GMAIL: OnceLock<Regex> = OnceLock::new();

    let mut candidate = raw.trim().to_string();

    if candidate.starts_with("http://") || candidate.starts_with("https://") {
        if let Ok(u) = Url::parse(&candidate) {
            if let Some((_, src)) = u.query_pairs().find(|(k, _)| k == "src") {
                candidate = src.into_owned();
            } else if let Some(segments) = u.path_segments() {
                let parts: Vec<&str> = segments.collect();
                if let Some(i) = parts.iter().position(|s| *s == "ical") {
                    if let Some(next) = parts.get(i + 1) {
                        candidate = next.to_string();
                    }
                }
            }
        }
    }

    // embed links double-encode the id
    for _ in 0..2 {
        let decoded = percent_decode_str(&candidate)
            .decode_utf8_lossy()
            .to_string();
        if decoded == candidate {
            break;
        }
        candidate = decoded;
    }
    let candidate = candidate.trim();

    let group = GROUP.get_or_init(|| {
        Regex::new(r"([A-Za-z0-9._+-]+@group\.calendar\.google\.com)").expect("group regex")
    });
    if let Some(m) = group.find(candidate) {
        return m.as_str().to_string();
    }
    let gmail =
        GMAIL.get_or_init(|| Regex::new(r"([A-Za-z0-9._%+-]+@gmail\.com)").expect("gmail regex"));
    if let Some(m) = gmail.find(candidate) {
        return m.as_str().to_string();
    }
    candidate.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_ids_parsed_from_any_separator() {
        let ids = parse_admin_ids("123, 456;789");
        assert_eq!(ids, HashSet::from([123, 456, 789]));
        assert!(parse_admin_ids("").is_empty());
    }

    #[test]
    fn calendar_id_from_embed_url() {
        let raw = "https://calendar.google.com/calendar/embed?src=abc123%40group.calendar.google.com&ctz=Europe%2FKyiv";
        assert_eq!(
            normalize_calendar_id(raw),
            "abc123@group.calendar.google.com"
        );
    }

    #[test]
    fn calendar_id_passthrough() {
        assert_eq!(
            normalize_calendar_id("  shop@gmail.com "),
            "shop@gmail.com"
        );
        assert_eq!(normalize_calendar_id("primary"), "primary");
    }
}
