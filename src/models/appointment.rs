use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use teloxide::types::UserId;

/// Billing side of an appointment. Replaces "amount defaults to zero" and
/// "receipt file exists" conventions with an explicit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingStatus {
    Unbilled,
    Billed,
    Paid,
}

/// A committed booking: one claimed slot plus its order/billing record.
/// Never deleted; there is no cancellation flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub date_key: String,
    pub time: String,
    pub user_id: UserId,
    pub reason: String,
    pub order_id: String,
    pub amount_uah: i64,
    pub status: BillingStatus,
    pub gcal_event_id: Option<String>,
    pub receipt_path: Option<PathBuf>,
}
