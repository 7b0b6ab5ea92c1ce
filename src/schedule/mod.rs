pub mod dates;
pub mod holidays;
pub mod policy;

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt;
use std::path::PathBuf;

use chrono::Timelike;
use teloxide::types::UserId;

use crate::models::{Appointment, BillingStatus};
use self::policy::CalendarPolicy;

/// Why a claim was refused. Everything here is recoverable: the user is sent
/// back to date or time selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimError {
    BadSlot,
    PastSlot,
    ClosedDay,
    SlotTaken,
}

impl fmt::Display for ClaimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimError::BadSlot => write!(f, "slot does not parse as date+time"),
            ClaimError::PastSlot => write!(f, "slot start is already in the past"),
            ClaimError::ClosedDay => write!(f, "day is closed for booking"),
            ClaimError::SlotTaken => write!(f, "slot is already taken"),
        }
    }
}

impl Error for ClaimError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountError {
    NotFound,
    Negative,
}

impl fmt::Display for AmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmountError::NotFound => write!(f, "appointment not found"),
            AmountError::Negative => write!(f, "amount must be non-negative"),
        }
    }
}

impl Error for AmountError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentError {
    UnknownOrder,
    NotBilled,
}

impl fmt::Display for PaymentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentError::UnknownOrder => write!(f, "no appointment with this order id"),
            PaymentError::NotBilled => write!(f, "no positive amount has been set"),
        }
    }
}

impl Error for PaymentError {}

/// The authoritative booking state: which slots are taken, and the
/// appointment records behind them. Both maps are mutated only together,
/// inside one critical section (the whole book sits behind a single mutex in
/// `BotState`), so a taken slot always has exactly one appointment.
#[derive(Default)]
pub struct ScheduleBook {
    booked: HashMap<String, HashSet<String>>,
    appointments: HashMap<String, Vec<Appointment>>,
}

impl ScheduleBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Free business-hour slots for a date, ascending. For today, hours that
    /// have already started are excluded.
    pub fn available_times(&self, policy: &CalendarPolicy, date_key: &str) -> Vec<String> {
        self.available_times_at(date_key, &policy.today_key(), policy.now_local().hour())
    }

    fn available_times_at(
        &self,
        date_key: &str,
        today_key: &str,
        current_hour: u32,
    ) -> Vec<String> {
        let taken = self.booked.get(date_key);
        policy::hour_slots()
            .enumerate()
            .filter(|(i, t)| {
                let hour = policy::FIRST_HOUR + *i as u32;
                if date_key == today_key && hour <= current_hour {
                    return false;
                }
                !taken.is_some_and(|set| set.contains(t))
            })
            .map(|(_, t)| t)
            .collect()
    }

    /// Claims a slot and creates the appointment, as one transaction.
    /// Everything is re-validated here, whatever earlier renders showed:
    /// the clock and the ledger both move between render and commit.
    pub fn claim(
        &mut self,
        policy: &CalendarPolicy,
        date_key: &str,
        time: &str,
        user_id: UserId,
        reason: &str,
    ) -> Result<Appointment, ClaimError> {
        let slot = dates::slot_naive(date_key, time).ok_or(ClaimError::BadSlot)?;
        let start = policy.localize(slot).ok_or(ClaimError::BadSlot)?;
        if start <= policy.now_local() {
            return Err(ClaimError::PastSlot);
        }
        if !policy.is_open(slot.date()) {
            return Err(ClaimError::ClosedDay);
        }

        let order_id = dates::gen_order_id(date_key, time, user_id.0).ok_or(ClaimError::BadSlot)?;

        let taken = self.booked.entry(date_key.to_string()).or_default();
        if !taken.insert(time.to_string()) {
            return Err(ClaimError::SlotTaken);
        }

        let appt = Appointment {
            date_key: date_key.to_string(),
            time: time.to_string(),
            user_id,
            reason: reason.to_string(),
            order_id,
            amount_uah: 0,
            status: BillingStatus::Unbilled,
            gcal_event_id: None,
            receipt_path: None,
        };
        self.appointments
            .entry(date_key.to_string())
            .or_default()
            .push(appt.clone());
        Ok(appt)
    }

    pub fn find(&self, date_key: &str, time: &str, user_id: UserId) -> Option<&Appointment> {
        self.appointments
            .get(date_key)?
            .iter()
            .find(|a| a.time == time && a.user_id == user_id)
    }

    fn find_mut(&mut self, date_key: &str, time: &str, user_id: UserId) -> Option<&mut Appointment> {
        self.appointments
            .get_mut(date_key)?
            .iter_mut()
            .find(|a| a.time == time && a.user_id == user_id)
    }

    /// Admin mutation: sets the amount due and moves the order to `Billed`.
    /// The order id never changes once present; it is re-derived only if the
    /// record somehow lost it, so repeated calls are idempotent.
    pub fn set_amount(
        &mut self,
        date_key: &str,
        time: &str,
        user_id: UserId,
        amount_uah: i64,
    ) -> Result<Appointment, AmountError> {
        if amount_uah < 0 {
            return Err(AmountError::Negative);
        }
        let fallback_order_id = dates::gen_order_id(date_key, time, user_id.0);
        let appt = self
            .find_mut(date_key, time, user_id)
            .ok_or(AmountError::NotFound)?;
        appt.amount_uah = amount_uah;
        appt.status = BillingStatus::Billed;
        if appt.order_id.is_empty() {
            if let Some(id) = fallback_order_id {
                appt.order_id = id;
            }
        }
        Ok(appt.clone())
    }

    pub fn find_by_order(&self, order_id: &str) -> Option<&Appointment> {
        self.appointments
            .values()
            .flat_map(|items| items.iter())
            .find(|a| a.order_id == order_id)
    }

    /// Terminal payment step. Only billed orders with a positive amount can
    /// be paid; called after the receipt file has been written.
    pub fn mark_paid(
        &mut self,
        order_id: &str,
        receipt_path: PathBuf,
    ) -> Result<Appointment, PaymentError> {
        let appt = self
            .appointments
            .values_mut()
            .flat_map(|items| items.iter_mut())
            .find(|a| a.order_id == order_id)
            .ok_or(PaymentError::UnknownOrder)?;
        if appt.status == BillingStatus::Unbilled || appt.amount_uah <= 0 {
            return Err(PaymentError::NotBilled);
        }
        appt.status = BillingStatus::Paid;
        appt.receipt_path = Some(receipt_path);
        Ok(appt.clone())
    }

    /// Best-effort calendar linkage, attached after the event is created.
    pub fn attach_calendar_event(
        &mut self,
        date_key: &str,
        time: &str,
        user_id: UserId,
        event_id: &str,
    ) -> bool {
        match self.find_mut(date_key, time, user_id) {
            Some(appt) => {
                appt.gcal_event_id = Some(event_id.to_string());
                true
            }
            None => false,
        }
    }

    /// All appointments for a date, sorted by time ascending.
    pub fn schedule_for(&self, date_key: &str) -> Vec<Appointment> {
        let mut items: Vec<Appointment> = self
            .appointments
            .get(date_key)
            .map(|v| v.to_vec())
            .unwrap_or_default();
        items.sort_by(|a, b| a.time.cmp(&b.time));
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use chrono_tz::Europe::Kyiv;

    fn policy() -> CalendarPolicy {
        CalendarPolicy::new(Kyiv)
    }

    // a date far enough out that "past slot" checks never trip in tests
    fn far_date() -> String {
        let today = policy().today();
        let mut d = today + chrono::Duration::days(30);
        loop {
            if policy().is_open(d) {
                break;
            }
            d += chrono::Duration::days(1);
        }
        d.format(dates::DATE_KEY_FMT).to_string()
    }

    #[test]
    fn claim_marks_slot_taken_and_creates_appointment() {
        let p = policy();
        let date = far_date();
        let mut book = ScheduleBook::new();

        let appt = book.claim(&p, &date, "10:00", UserId(7), "діагностика").unwrap();
        assert_eq!(appt.time, "10:00");
        assert_eq!(appt.status, BillingStatus::Unbilled);
        assert_eq!(appt.amount_uah, 0);
        assert!(appt.order_id.ends_with("-7"));

        assert!(book.find(&date, "10:00", UserId(7)).is_some());
        assert!(!book.available_times(&p, &date).contains(&"10:00".to_string()));
    }

    #[test]
    fn second_claim_for_same_slot_is_rejected() {
        let p = policy();
        let date = far_date();
        let mut book = ScheduleBook::new();

        book.claim(&p, &date, "11:00", UserId(1), "заміна шин").unwrap();
        let err = book.claim(&p, &date, "11:00", UserId(2), "діагностика");
        assert_eq!(err.unwrap_err(), ClaimError::SlotTaken);
        // the loser left no appointment behind
        assert!(book.find(&date, "11:00", UserId(2)).is_none());
    }

    #[test]
    fn past_and_closed_claims_are_rejected() {
        let p = policy();
        let mut book = ScheduleBook::new();

        let yesterday = (p.today() - chrono::Duration::days(1))
            .format(dates::DATE_KEY_FMT)
            .to_string();
        assert_eq!(
            book.claim(&p, &yesterday, "10:00", UserId(1), "x").unwrap_err(),
            ClaimError::PastSlot
        );

        // find a Sunday well in the future
        let mut d = p.today() + chrono::Duration::days(30);
        while d.weekday() != chrono::Weekday::Sun {
            d += chrono::Duration::days(1);
        }
        let sunday = d.format(dates::DATE_KEY_FMT).to_string();
        assert_eq!(
            book.claim(&p, &sunday, "10:00", UserId(1), "x").unwrap_err(),
            ClaimError::ClosedDay
        );

        assert_eq!(
            book.claim(&p, &far_date(), "33:00", UserId(1), "x").unwrap_err(),
            ClaimError::BadSlot
        );
    }

    #[test]
    fn availability_cuts_off_past_hours_today() {
        let book = ScheduleBook::new();
        let times = book.available_times_at("15.02.2025", "15.02.2025", 12);
        assert_eq!(times.first().map(String::as_str), Some("13:00"));
        assert!(!times.contains(&"12:00".to_string()));

        // other dates keep the full grid
        let times = book.available_times_at("16.02.2025", "15.02.2025", 12);
        assert_eq!(times.len(), 11);

        // after the last hour nothing is left
        let times = book.available_times_at("15.02.2025", "15.02.2025", 19);
        assert!(times.is_empty());
    }

    #[test]
    fn set_amount_keeps_order_id() {
        let p = policy();
        let date = far_date();
        let mut book = ScheduleBook::new();

        let appt = book.claim(&p, &date, "12:00", UserId(5), "заміна мастила").unwrap();
        let billed = book.set_amount(&date, "12:00", UserId(5), 1850).unwrap();
        assert_eq!(billed.amount_uah, 1850);
        assert_eq!(billed.status, BillingStatus::Billed);
        assert_eq!(billed.order_id, appt.order_id);

        // idempotent: same id after a second call
        let again = book.set_amount(&date, "12:00", UserId(5), 2000).unwrap();
        assert_eq!(again.order_id, appt.order_id);

        assert_eq!(
            book.set_amount(&date, "12:00", UserId(5), -1).unwrap_err(),
            AmountError::Negative
        );
        assert_eq!(
            book.set_amount(&date, "13:00", UserId(5), 100).unwrap_err(),
            AmountError::NotFound
        );
    }

    #[test]
    fn payment_requires_billed_order() {
        let p = policy();
        let date = far_date();
        let mut book = ScheduleBook::new();

        let appt = book.claim(&p, &date, "14:00", UserId(9), "діагностика").unwrap();
        let path = PathBuf::from("/tmp/receipt.txt");

        assert_eq!(
            book.mark_paid(&appt.order_id, path.clone()).unwrap_err(),
            PaymentError::NotBilled
        );
        assert_eq!(
            book.mark_paid("20990101-0900-1", path.clone()).unwrap_err(),
            PaymentError::UnknownOrder
        );

        book.set_amount(&date, "14:00", UserId(9), 500).unwrap();
        let paid = book.mark_paid(&appt.order_id, path.clone()).unwrap();
        assert_eq!(paid.status, BillingStatus::Paid);
        assert_eq!(paid.receipt_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn schedule_is_sorted_by_time() {
        let p = policy();
        let date = far_date();
        let mut book = ScheduleBook::new();

        book.claim(&p, &date, "15:00", UserId(1), "a").unwrap();
        book.claim(&p, &date, "09:00", UserId(2), "b").unwrap();
        book.claim(&p, &date, "12:00", UserId(3), "c").unwrap();

        let times: Vec<String> = book.schedule_for(&date).into_iter().map(|a| a.time).collect();
        assert_eq!(times, vec!["09:00", "12:00", "15:00"]);
        assert!(book.schedule_for("01.01.2099").is_empty());
    }
}
