use chrono::Duration;
use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId, UserId};

use crate::bot_state::BotState;
use crate::gcal::OrderEvent;
use crate::handlers::utils::{
    main_menu, plate_retry_keyboard, reason_label, reasons_keyboard, time_keyboard,
};
use crate::handlers::{admin, payments, HandlerResult};
use crate::models::{Conversation, UserProfile};
use crate::schedule::dates::slot_naive;

pub async fn callback_handler(bot: Bot, q: CallbackQuery, state: BotState) -> HandlerResult {
    let Some(data) = q.data.clone() else {
        return Ok(());
    };
    let Some(message) = q.message.as_ref() else {
        return Ok(());
    };
    let chat_id = message.chat().id;
    let message_id = message.id();
    let uid = q.from.id;

    match data.as_str() {
        "reg:via_vin" => choose_vin(&bot, &q, &state, chat_id, message_id).await,
        "reg:via_plate" => choose_plate(&bot, &q, &state, chat_id, message_id).await,
        "vin:confirm_yes" => vin_confirm_yes(&bot, &q, &state, chat_id, message_id).await,
        "vin:confirm_no" => vin_confirm_no(&bot, &q, &state, chat_id, message_id).await,
        "plate:confirm_yes" => plate_confirm_yes(&bot, &q, &state, chat_id, message_id).await,
        "plate:confirm_no" => plate_confirm_no(&bot, &q, &state, chat_id, message_id).await,
        "time_back" => time_back(&bot, &q, &state, chat_id, message_id).await,
        "reason_back" => reason_back(&bot, &q, &state, chat_id, message_id).await,
        d if d.starts_with("time:") => {
            let time = d.trim_start_matches("time:").to_string();
            pick_time(&bot, &q, &state, chat_id, message_id, time).await
        }
        d if d.starts_with("reason:") => {
            let tag = d.trim_start_matches("reason:").to_string();
            pick_reason(&bot, &q, &state, chat_id, message_id, tag).await
        }
        d if d.starts_with("ready:") => {
            let payload = d.trim_start_matches("ready:").to_string();
            admin::on_ready_click(&bot, &q, &state, payload).await
        }
        d if d.starts_with(&format!("{}:", payments::PAY_CALLBACK_PREFIX)) => {
            let order_id = d.split_once(':').map(|(_, id)| id.trim()).unwrap_or("");
            payments::simulate_payment(&bot, &q, &state, order_id, uid).await
        }
        _ => {
            bot.answer_callback_query(q.id.clone()).await?;
            Ok(())
        }
    }
}

fn reg_credentials(conv: Option<Conversation>) -> Option<(String, String)> {
    conv.as_ref().and_then(Conversation::reg_credentials)
}

async fn choose_vin(
    bot: &Bot,
    q: &CallbackQuery,
    state: &BotState,
    chat_id: ChatId,
    message_id: MessageId,
) -> HandlerResult {
    let uid = q.from.id;
    let Some((full_name, phone)) = reg_credentials(state.session(uid).await) else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };
    state
        .set_session(uid, Conversation::RegVin { full_name, phone })
        .await;
    bot.edit_message_text(
        chat_id,
        message_id,
        "Введи VIN (17 символів, латиниця/цифри, без I/O/Q):",
    )
    .await?;
    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

async fn choose_plate(
    bot: &Bot,
    q: &CallbackQuery,
    state: &BotState,
    chat_id: ChatId,
    message_id: MessageId,
) -> HandlerResult {
    let uid = q.from.id;
    let Some((full_name, phone)) = reg_credentials(state.session(uid).await) else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };
    state
        .set_session(uid, Conversation::RegPlate { full_name, phone })
        .await;
    bot.edit_message_text(
        chat_id,
        message_id,
        "Введи держномер авто (наприклад, АА1234ВС).",
    )
    .await?;
    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

async fn vin_confirm_yes(
    bot: &Bot,
    q: &CallbackQuery,
    state: &BotState,
    chat_id: ChatId,
    message_id: MessageId,
) -> HandlerResult {
    let uid = q.from.id;
    let Some(Conversation::RegVinConfirm {
        full_name,
        phone,
        vin,
        vehicle,
    }) = state.session(uid).await
    else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    state
        .insert_user(
            uid,
            UserProfile {
                full_name,
                phone,
                vin: Some(vin),
                plate: None,
                vehicle,
            },
        )
        .await;
    state.clear_session(uid).await;

    bot.edit_message_text(chat_id, message_id, "Реєстрацію завершено ✅")
        .await?;
    bot.send_message(chat_id, "Тепер натисни «Зробити запис».")
        .reply_markup(main_menu(true, state.is_admin(uid)))
        .await?;
    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

async fn vin_confirm_no(
    bot: &Bot,
    q: &CallbackQuery,
    state: &BotState,
    chat_id: ChatId,
    message_id: MessageId,
) -> HandlerResult {
    let uid = q.from.id;
    let Some((full_name, phone)) = reg_credentials(state.session(uid).await) else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };
    state
        .set_session(uid, Conversation::RegVin { full_name, phone })
        .await;
    bot.edit_message_text(chat_id, message_id, "Введи інший VIN (17 символів):")
        .await?;
    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

async fn plate_confirm_yes(
    bot: &Bot,
    q: &CallbackQuery,
    state: &BotState,
    chat_id: ChatId,
    message_id: MessageId,
) -> HandlerResult {
    let uid = q.from.id;
    let Some(Conversation::RegPlateConfirm {
        full_name,
        phone,
        plate,
        vehicle,
    }) = state.session(uid).await
    else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    state
        .insert_user(
            uid,
            UserProfile {
                full_name,
                phone,
                vin: None,
                plate: Some(plate),
                vehicle,
            },
        )
        .await;
    state.clear_session(uid).await;

    bot.edit_message_text(chat_id, message_id, "Реєстрацію завершено ✅")
        .await?;
    bot.send_message(chat_id, "Тепер натисни «Зробити запис».")
        .reply_markup(main_menu(true, state.is_admin(uid)))
        .await?;
    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

async fn plate_confirm_no(
    bot: &Bot,
    q: &CallbackQuery,
    state: &BotState,
    chat_id: ChatId,
    message_id: MessageId,
) -> HandlerResult {
    let uid = q.from.id;
    let Some((full_name, phone)) = reg_credentials(state.session(uid).await) else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };
    state
        .set_session(uid, Conversation::RegVehicleMethod { full_name, phone })
        .await;
    bot.edit_message_text(chat_id, message_id, "Окей. Обери інший спосіб:")
        .reply_markup(plate_retry_keyboard())
        .await?;
    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

async fn pick_time(
    bot: &Bot,
    q: &CallbackQuery,
    state: &BotState,
    chat_id: ChatId,
    message_id: MessageId,
    time: String,
) -> HandlerResult {
    let uid = q.from.id;
    let Some(Conversation::BookTime { date_key }) = state.session(uid).await else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    // the keyboard may be stale: re-validate against the clock and ledger
    let still_free = {
        let book = state.schedule().await;
        book.available_times(&state.policy, &date_key).contains(&time)
    };
    let in_future = slot_naive(&date_key, &time)
        .and_then(|slot| state.policy.localize(slot))
        .is_some_and(|start| start > state.policy.now_local());

    if !still_free || !in_future {
        bot.answer_callback_query(q.id.clone())
            .text("Цей час недоступний. Обери інший.")
            .show_alert(true)
            .await?;
        let times = state.schedule().await.available_times(&state.policy, &date_key);
        bot.edit_message_text(chat_id, message_id, format!("Оберіть інший час на {date_key}:"))
            .reply_markup(time_keyboard(&times))
            .await?;
        return Ok(());
    }

    state
        .set_session(
            uid,
            Conversation::BookReason {
                date_key: date_key.clone(),
                time: time.clone(),
            },
        )
        .await;
    bot.edit_message_text(
        chat_id,
        message_id,
        format!("Обери причину візиту на {date_key} о {time}:"),
    )
    .reply_markup(reasons_keyboard())
    .await?;
    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

async fn time_back(
    bot: &Bot,
    q: &CallbackQuery,
    state: &BotState,
    chat_id: ChatId,
    message_id: MessageId,
) -> HandlerResult {
    let uid = q.from.id;
    if let Some(Conversation::BookTime { .. }) = state.session(uid).await {
        state.set_session(uid, Conversation::BookDate).await;
        bot.edit_message_text(chat_id, message_id, "Введи нову дату dd.mm або dd.mm.yy:")
            .await?;
    }
    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

async fn reason_back(
    bot: &Bot,
    q: &CallbackQuery,
    state: &BotState,
    chat_id: ChatId,
    message_id: MessageId,
) -> HandlerResult {
    let uid = q.from.id;
    if let Some(Conversation::BookReason { date_key, .. }) = state.session(uid).await {
        let times = state.schedule().await.available_times(&state.policy, &date_key);
        state
            .set_session(
                uid,
                Conversation::BookTime {
                    date_key: date_key.clone(),
                },
            )
            .await;
        bot.edit_message_text(chat_id, message_id, format!("Оберіть час (09–19) на {date_key}:"))
            .reply_markup(time_keyboard(&times))
            .await?;
    }
    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

async fn pick_reason(
    bot: &Bot,
    q: &CallbackQuery,
    state: &BotState,
    chat_id: ChatId,
    message_id: MessageId,
    tag: String,
) -> HandlerResult {
    let uid = q.from.id;
    let Some(Conversation::BookReason { date_key, time }) = state.session(uid).await else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    if tag == "other" {
        state
            .set_session(uid, Conversation::BookReasonOther { date_key, time })
            .await;
        bot.edit_message_text(chat_id, message_id, "Введи коротко іншу причину:")
            .await?;
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    }

    let Some(reason) = reason_label(&tag) else {
        bot.answer_callback_query(q.id.clone())
            .text("Невідома причина")
            .show_alert(true)
            .await?;
        return Ok(());
    };

    if finalize_booking(state, uid, &date_key, &time, reason).await {
        state.clear_session(uid).await;
        bot.edit_message_text(
            chat_id,
            message_id,
            format!("✅ Запис створено на {date_key} о {time}.\nПричина: {reason}\n\nДякуємо! Чекаємо 🤝"),
        )
        .await?;
        bot.send_message(chat_id, "Повертаю в головне меню.")
            .reply_markup(main_menu(true, state.is_admin(uid)))
            .await?;
        bot.answer_callback_query(q.id.clone()).await?;
    } else {
        bot.answer_callback_query(q.id.clone())
            .text("Цей слот недоступний (можливо, час уже минув або його зайняли).")
            .show_alert(true)
            .await?;
        let times = state.schedule().await.available_times(&state.policy, &date_key);
        state
            .set_session(
                uid,
                Conversation::BookTime {
                    date_key: date_key.clone(),
                },
            )
            .await;
        bot.edit_message_text(chat_id, message_id, format!("Оберіть інший час на {date_key}:"))
            .reply_markup(time_keyboard(&times))
            .await?;
    }
    Ok(())
}

/// Commits the booking. The ledger claim is the whole transaction; the
/// calendar mirror runs afterwards in its own task and can only ever add an
/// event id to an already-committed appointment.
pub async fn finalize_booking(
    state: &BotState,
    uid: UserId,
    date_key: &str,
    time: &str,
    reason: &str,
) -> bool {
    let claimed = {
        let mut book = state.schedule().await;
        book.claim(&state.policy, date_key, time, uid, reason)
    };

    let appt = match claimed {
        Ok(appt) => appt,
        Err(e) => {
            log::info!("finalize_booking rejected → {date_key} {time}: {e}");
            return false;
        }
    };
    log::info!(
        "BOOKED: {} {} by {} — {} (order_id={})",
        date_key,
        time,
        uid,
        reason,
        appt.order_id
    );

    if let Some(calendar) = state.calendar.clone() {
        let state = state.clone();
        let appt = appt.clone();
        tokio::spawn(async move {
            let Some(start) = slot_naive(&appt.date_key, &appt.time)
                .and_then(|slot| state.policy.localize(slot))
            else {
                return;
            };
            let end = start + Duration::hours(1);
            let profile = state.user(appt.user_id).await;
            let (name, phone, vin, car_line) = match &profile {
                Some(p) => (
                    p.full_name.clone(),
                    p.phone.clone(),
                    p.vin.clone().unwrap_or_default(),
                    p.car_line(),
                ),
                None => (String::new(), String::new(), String::new(), String::new()),
            };

            let event = OrderEvent {
                order_id: &appt.order_id,
                start,
                end,
                customer_name: &name,
                phone: &phone,
                vin: &vin,
                car_line: &car_line,
                reason: &appt.reason,
            };
            match calendar.create_event_for_order(&event).await {
                Ok(event_id) => {
                    state
                        .schedule()
                        .await
                        .attach_calendar_event(&appt.date_key, &appt.time, appt.user_id, &event_id);
                    log::info!("Google Calendar: event created ({event_id})");
                    if let Err(e) = calendar.ensure_order_id(&event_id, &appt.order_id).await {
                        log::warn!("Google Calendar: order tag check failed: {e}");
                    }
                }
                Err(e) => {
                    log::error!("Google Calendar: failed to create event: {e}");
                }
            }
        });
    }

    true
}
