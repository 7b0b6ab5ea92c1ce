use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use chrono::Duration;
use teloxide::types::UserId;

use sto_bot::bot_state::BotState;
use sto_bot::config::Config;
use sto_bot::models::{BillingStatus, UserProfile, VehicleInfo};
use sto_bot::receipts;
use sto_bot::schedule::{dates, ClaimError};

fn test_config(receipts_dir: PathBuf) -> Config {
    Config {
        bot_token: "000:test".to_string(),
        admin_ids: HashSet::from([1]),
        tz: chrono_tz::Europe::Kyiv,
        receipts_dir,
        auto_dev_api_key: "test-key".to_string(),
        auto_dev_timeout: 10,
        bazagai_api_key: None,
        bazagai_timeout: 10,
        gcal: None,
        route_url: None,
    }
}

fn receipts_sandbox(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("sto-bot-{}-{}", tag, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

/// First open date at least 30 days out, so "past slot" never interferes.
fn open_date(state: &BotState) -> String {
    let mut d = state.policy.today() + Duration::days(30);
    while !state.policy.is_open(d) {
        d += Duration::days(1);
    }
    d.format(dates::DATE_KEY_FMT).to_string()
}

fn customer() -> UserProfile {
    UserProfile {
        full_name: "Тарас Коваль".to_string(),
        phone: "0671234567".to_string(),
        vin: Some("1HGCM82633A004352".to_string()),
        plate: None,
        vehicle: VehicleInfo {
            make: Some("Honda".to_string()),
            model: Some("Accord".to_string()),
            year: Some("2003".to_string()),
        },
    }
}

#[tokio::test]
async fn booking_to_paid_receipt() {
    let sandbox = receipts_sandbox("flow");
    let state = BotState::new(test_config(sandbox.clone()));
    let uid = UserId(42);
    let date_key = open_date(&state);

    state.insert_user(uid, customer()).await;
    assert!(state.is_registered(uid).await);

    // claim a slot
    let appt = state
        .schedule()
        .await
        .claim(&state.policy, &date_key, "10:00", uid, "діагностика")
        .expect("fresh slot claims");
    assert_eq!(appt.status, BillingStatus::Unbilled);
    assert_eq!(
        appt.order_id,
        dates::gen_order_id(&date_key, "10:00", uid.0).unwrap()
    );

    // the slot disappears from availability and cannot be claimed again
    {
        let book = state.schedule().await;
        assert!(!book
            .available_times(&state.policy, &date_key)
            .contains(&"10:00".to_string()));
    }
    assert_eq!(
        state
            .schedule()
            .await
            .claim(&state.policy, &date_key, "10:00", UserId(77), "заміна шин")
            .unwrap_err(),
        ClaimError::SlotTaken
    );

    // paying before the admin set an amount is refused
    assert!(state
        .schedule()
        .await
        .mark_paid(&appt.order_id, PathBuf::from("/nowhere"))
        .is_err());

    // admin sets the amount; the order id stays put
    let billed = state
        .schedule()
        .await
        .set_amount(&date_key, "10:00", uid, 1850)
        .unwrap();
    assert_eq!(billed.amount_uah, 1850);
    assert_eq!(billed.order_id, appt.order_id);
    assert_eq!(billed.status, BillingStatus::Billed);

    // simulated payment: receipt file first, then the paid mark
    let now = state.policy.now_local().naive_local();
    let text = receipts::format_receipt_text(
        &billed.order_id,
        billed.amount_uah,
        "Тарас Коваль",
        "0671234567",
        now,
    );
    let path = receipts::save_receipt_bytes(
        &billed.order_id,
        text.as_bytes(),
        &sandbox,
        "txt",
        Some("Тарас Коваль"),
        now,
    )
    .unwrap();
    assert!(path.exists());

    let paid = state
        .schedule()
        .await
        .mark_paid(&billed.order_id, path.clone())
        .unwrap();
    assert_eq!(paid.status, BillingStatus::Paid);
    assert_eq!(paid.receipt_path.as_deref(), Some(path.as_path()));

    let _ = fs::remove_dir_all(&sandbox);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_have_one_winner() {
    let state = BotState::new(test_config(receipts_sandbox("race")));
    let date_key = open_date(&state);

    let mut tasks = Vec::new();
    for i in 0..16u64 {
        let state = state.clone();
        let date_key = date_key.clone();
        tasks.push(tokio::spawn(async move {
            state
                .schedule()
                .await
                .claim(&state.policy, &date_key, "11:00", UserId(100 + i), "діагностика")
                .is_ok()
        }));
    }

    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    // losers see the conflict, and availability agrees
    assert!(!state
        .schedule()
        .await
        .available_times(&state.policy, &date_key)
        .contains(&"11:00".to_string()));
}

#[tokio::test]
async fn unregistered_user_has_no_profile() {
    let state = BotState::new(test_config(receipts_sandbox("users")));
    assert!(!state.is_registered(UserId(5)).await);
    assert!(state.user(UserId(5)).await.is_none());

    state.insert_user(UserId(5), customer()).await;
    let profile = state.user(UserId(5)).await.unwrap();
    assert_eq!(profile.car_line(), "Honda, Accord, 2003");
}

#[tokio::test]
async fn sessions_replace_not_stack() {
    use sto_bot::models::Conversation;

    let state = BotState::new(test_config(receipts_sandbox("sessions")));
    let uid = UserId(9);

    state.set_session(uid, Conversation::RegName).await;
    state.set_session(uid, Conversation::BookDate).await;

    // a second flow entry replaced the first one
    assert!(matches!(
        state.session(uid).await,
        Some(Conversation::BookDate)
    ));

    state.clear_session(uid).await;
    assert!(state.session(uid).await.is_none());
}

#[test]
fn date_normalization_follows_user_input() {
    let today = chrono::NaiveDate::from_ymd_opt(2025, 1, 20).unwrap();
    assert_eq!(
        dates::normalize_date("15.02", today).as_deref(),
        Some("15.02.2025")
    );
    assert_eq!(
        dates::normalize_date("15.02.25", today).as_deref(),
        Some("15.02.2025")
    );
    assert_eq!(dates::normalize_date("31.13", today), None);
}
