use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::DateTime;
use chrono_tz::Tz;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde_json::{json, Value};

use crate::config::GcalConfig;

const RETRIES: u32 = 1;
const TIMEOUT_SECS: u64 = 12;

/// Google Calendar mirror of the booking book. Every call here is
/// best-effort and happens strictly after the ledger has committed; a
/// calendar failure never becomes a booking failure.
pub struct CalendarClient {
    cfg: GcalConfig,
}

pub struct OrderEvent<'a> {
    pub order_id: &'a str,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub customer_name: &'a str,
    pub phone: &'a str,
    pub vin: &'a str,
    pub car_line: &'a str,
    pub reason: &'a str,
}

impl CalendarClient {
    pub fn new(cfg: GcalConfig) -> Self {
        Self { cfg }
    }

    pub fn calendar_id(&self) -> &str {
        &self.cfg.calendar_id
    }

    fn http(&self) -> Result<ClientWithMiddleware> {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(RETRIES);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()?;
        Ok(ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build())
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.cfg.api_base,
            utf8_percent_encode(&self.cfg.calendar_id, NON_ALPHANUMERIC)
        )
    }

    /// Startup probe: can this token see the calendar at all. Advisory only.
    pub async fn can_access(&self) -> bool {
        let url = format!(
            "{}/calendars/{}",
            self.cfg.api_base,
            utf8_percent_encode(&self.cfg.calendar_id, NON_ALPHANUMERIC)
        );
        match self.get(&url).await {
            Ok(_) => true,
            Err(e) => {
                log::warn!("Google Calendar: access probe failed: {e}");
                false
            }
        }
    }

    /// Creates the one-hour event for an order, tagged with the order id in
    /// the event's private extended properties. Returns the event id.
    pub async fn create_event_for_order(&self, ev: &OrderEvent<'_>) -> Result<String> {
        let customer = if ev.customer_name.is_empty() {
            "Клієнт"
        } else {
            ev.customer_name
        };
        let phone_line = if ev.phone.is_empty() {
            "Телефон: —".to_string()
        } else {
            format!("Телефон: +380{}", ev.phone)
        };
        let description = [
            format!("Замовлення: #{}", ev.order_id),
            format!("Клієнт: {}", customer),
            phone_line,
            format!("VIN: {}", if ev.vin.is_empty() { "—" } else { ev.vin }),
            format!(
                "Авто: {}",
                if ev.car_line.is_empty() { "—" } else { ev.car_line }
            ),
            format!("Причина: {}", ev.reason),
        ]
        .join("\n");

        let body = json!({
            "summary": format!("СТО: {} — {}", customer, ev.reason),
            "description": description,
            "start": {"dateTime": ev.start.to_rfc3339()},
            "end": {"dateTime": ev.end.to_rfc3339()},
            "reminders": {"useDefault": true},
            "extendedProperties": {"private": {"order_id": ev.order_id}},
        });

        let response = self
            .http()?
            .post(self.events_url())
            .bearer_auth(&self.cfg.token)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&body)?)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if status != reqwest::StatusCode::OK {
            return Err(anyhow!("calendar insert failed: HTTP {status}: {text}"));
        }
        let created: Value = serde_json::from_str(&text)?;
        created
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("calendar insert answered without an event id"))
    }

    /// Idempotently stamps the order id onto an existing event.
    pub async fn ensure_order_id(&self, event_id: &str, order_id: &str) -> Result<()> {
        let url = format!("{}/{}", self.events_url(), event_id);
        let event = self.get(&url).await?;

        let tagged = event
            .pointer("/extendedProperties/private/order_id")
            .and_then(Value::as_str)
            == Some(order_id);
        if tagged {
            return Ok(());
        }

        let body = json!({
            "extendedProperties": {"private": {"order_id": order_id}},
        });
        let response = self
            .http()?
            .patch(&url)
            .bearer_auth(&self.cfg.token)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&body)?)
            .send()
            .await?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(anyhow!("calendar patch failed: HTTP {}", response.status()));
        }
        Ok(())
    }

    async fn get(&self, url: &str) -> Result<Value> {
        let response = self
            .http()?
            .get(url)
            .bearer_auth(&self.cfg.token)
            .header("Accept", "application/json")
            .send()
            .await?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(anyhow!("HTTP {}", response.status()));
        }
        Ok(serde_json::from_str(&response.text().await?)?)
    }
}
