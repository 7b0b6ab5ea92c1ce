use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, UserId};

use crate::bot_state::BotState;
use crate::handlers::payments::PAY_CALLBACK_PREFIX;
use crate::handlers::utils::{admin_menu, cancel_menu};
use crate::handlers::HandlerResult;
use crate::models::{Appointment, Conversation};
use crate::schedule::dates::normalize_date;
use crate::schedule::AmountError;

const DENIED: &str = "❌ Доступ тільки для адміністратора.";

pub async fn admin_entry(bot: &Bot, msg: &Message, state: &BotState) -> HandlerResult {
    let Some(uid) = msg.from.as_ref().map(|u| u.id) else {
        return Ok(());
    };
    if !state.is_admin(uid) {
        bot.send_message(msg.chat.id, DENIED).await?;
        return Ok(());
    }
    bot.send_message(msg.chat.id, "Адмін-меню:")
        .reply_markup(admin_menu())
        .await?;
    Ok(())
}

pub async fn admin_today(bot: &Bot, msg: &Message, state: &BotState) -> HandlerResult {
    let Some(uid) = msg.from.as_ref().map(|u| u.id) else {
        return Ok(());
    };
    if !state.is_admin(uid) {
        bot.send_message(msg.chat.id, DENIED).await?;
        return Ok(());
    }
    // menu buttons are ignored while an admin flow is mid-way
    if state.session(uid).await.is_some() {
        return Ok(());
    }
    let today = state.policy.today_key();
    send_schedule(bot, msg.chat.id, state, &today).await
}

pub async fn admin_pick_date(bot: &Bot, msg: &Message, state: &BotState) -> HandlerResult {
    let Some(uid) = msg.from.as_ref().map(|u| u.id) else {
        return Ok(());
    };
    if !state.is_admin(uid) {
        bot.send_message(msg.chat.id, DENIED).await?;
        return Ok(());
    }
    if state.session(uid).await.is_some() {
        return Ok(());
    }
    state.set_session(uid, Conversation::AdminDate).await;
    bot.send_message(msg.chat.id, "Введіть дату у форматі dd.mm або dd.mm.yy:")
        .reply_markup(cancel_menu())
        .await?;
    Ok(())
}

pub async fn admin_date_input(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    text: &str,
) -> HandlerResult {
    let Some(uid) = msg.from.as_ref().map(|u| u.id) else {
        return Ok(());
    };
    if !state.is_admin(uid) {
        return Ok(());
    }
    let Some(date_key) = normalize_date(text, state.policy.today()) else {
        bot.send_message(msg.chat.id, "Дата некоректна. Приклад: 15.02 або 15.02.25")
            .await?;
        return Ok(());
    };
    state.clear_session(uid).await;
    send_schedule(bot, msg.chat.id, state, &date_key).await
}

async fn render_schedule(state: &BotState, date_key: &str) -> (String, Vec<Appointment>) {
    let items = state.schedule().await.schedule_for(date_key);
    if items.is_empty() {
        return (format!("📭 На {date_key} записів немає."), items);
    }

    let mut lines = vec![format!("📅 Записи на {date_key}:"), String::new()];
    for appt in &items {
        let profile = state.user(appt.user_id).await;
        let (fio, phone, vin, plate, car) = match &profile {
            Some(p) => (
                p.full_name.clone(),
                p.phone.clone(),
                p.vin.clone().unwrap_or_else(|| "—".to_string()),
                p.plate.clone().unwrap_or_else(|| "—".to_string()),
                p.car_line(),
            ),
            None => (
                "—".to_string(),
                "—".to_string(),
                "—".to_string(),
                "—".to_string(),
                "—".to_string(),
            ),
        };
        let gcal = appt.gcal_event_id.as_deref().unwrap_or("—");
        lines.push(format!(
            "• {} — {}\n  📞 +380{} | VIN: {} | №: {}\n  🚗 {}\n  🎯 {}\n  💵 {} грн\n  🧾 Order ID: {}\n  🗓 Google Event ID: {}",
            appt.time, fio, phone, vin, plate, car, appt.reason, appt.amount_uah, appt.order_id, gcal
        ));
        lines.push("─".repeat(20));
    }
    (lines.join("\n"), items)
}

/// Full day view with a «Авто готове» button per appointment.
pub async fn send_schedule(
    bot: &Bot,
    chat_id: ChatId,
    state: &BotState,
    date_key: &str,
) -> HandlerResult {
    let (text, items) = render_schedule(state, date_key).await;
    if items.is_empty() {
        bot.send_message(chat_id, text).await?;
        return Ok(());
    }

    let rows: Vec<Vec<InlineKeyboardButton>> = items
        .iter()
        .map(|appt| {
            vec![InlineKeyboardButton::callback(
                format!("💬 Авто готове • {}", appt.time),
                format!("ready:{}|{}|{}", appt.date_key, appt.time, appt.user_id.0),
            )]
        })
        .collect();

    bot.send_message(chat_id, text)
        .reply_markup(InlineKeyboardMarkup::new(rows))
        .await?;
    Ok(())
}

/// «Авто готове» click: opens an amount-entry session for this appointment.
pub async fn on_ready_click(
    bot: &Bot,
    q: &CallbackQuery,
    state: &BotState,
    payload: String,
) -> HandlerResult {
    let uid = q.from.id;
    if !state.is_admin(uid) {
        bot.answer_callback_query(q.id.clone())
            .text("Доступ лише для адміністратора")
            .show_alert(true)
            .await?;
        return Ok(());
    }

    let mut parts = payload.split('|');
    let parsed = match (parts.next(), parts.next(), parts.next()) {
        (Some(date_key), Some(time), Some(raw_uid)) => raw_uid
            .parse::<u64>()
            .ok()
            .map(|client| (date_key.to_string(), time.to_string(), UserId(client))),
        _ => None,
    };
    let Some((date_key, time, client)) = parsed else {
        bot.answer_callback_query(q.id.clone())
            .text("Некоректні дані кнопки.")
            .show_alert(true)
            .await?;
        return Ok(());
    };

    let current = {
        let book = state.schedule().await;
        book.find(&date_key, &time, client).map(|a| a.amount_uah)
    };
    let Some(current) = current else {
        bot.answer_callback_query(q.id.clone())
            .text("Запис не знайдено")
            .show_alert(true)
            .await?;
        return Ok(());
    };

    let fio = state
        .user(client)
        .await
        .map(|p| p.full_name)
        .unwrap_or_else(|| "Клієнт".to_string());

    state
        .set_session(
            uid,
            Conversation::AdminAmount {
                date_key: date_key.clone(),
                time: time.clone(),
                client,
            },
        )
        .await;

    if let Some(message) = q.message.as_ref() {
        bot.send_message(
            message.chat().id,
            format!(
                "Введи суму до сплати для {fio} на {date_key} о {time} (зараз: {current} грн).\nНапр.: 1850"
            ),
        )
        .reply_markup(cancel_menu())
        .await?;
    }
    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

/// Amount entry. The amount commits before the customer notification is
/// attempted; a failed notification is reported but never rolls it back.
pub async fn admin_amount_input(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    date_key: String,
    time: String,
    client: UserId,
    text: &str,
) -> HandlerResult {
    let Some(uid) = msg.from.as_ref().map(|u| u.id) else {
        return Ok(());
    };
    if !state.is_admin(uid) {
        return Ok(());
    }

    let normalized = text.trim().replace(',', ".");
    let amount_uah = match normalized.parse::<f64>() {
        Ok(v) if v >= 0.0 => v.trunc() as i64,
        _ => {
            bot.send_message(msg.chat.id, "Введи число (грн), напр.: 1850")
                .await?;
            return Ok(());
        }
    };

    let billed = {
        let mut book = state.schedule().await;
        book.set_amount(&date_key, &time, client, amount_uah)
    };
    let appt = match billed {
        Ok(appt) => appt,
        Err(AmountError::NotFound) => {
            bot.send_message(msg.chat.id, "Запис не знайдено після перевірки.")
                .await?;
            state.clear_session(uid).await;
            return Ok(());
        }
        Err(AmountError::Negative) => {
            bot.send_message(msg.chat.id, "Введи число (грн), напр.: 1850")
                .await?;
            return Ok(());
        }
    };

    let mut rows = vec![vec![InlineKeyboardButton::callback(
        "💳 Оплатити",
        format!("{}:{}", PAY_CALLBACK_PREFIX, appt.order_id),
    )]];
    if let Some(route) = state.config.route_url.clone() {
        rows.push(vec![InlineKeyboardButton::url("📍 Маршрут до СТО", route)]);
    }

    let notify = bot
        .send_message(
            ChatId(client.0 as i64),
            format!(
                "🚗 Авто готове до видачі.\nЗамовлення #{}\nДо сплати: {} грн",
                appt.order_id, appt.amount_uah
            ),
        )
        .reply_markup(InlineKeyboardMarkup::new(rows))
        .await;

    match notify {
        Ok(_) => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "✅ Суму встановлено і повідомлення надіслано клієнту.\nДата: {}, час: {}\nСума: {} грн\nOrder: #{}",
                    date_key, time, appt.amount_uah, appt.order_id
                ),
            )
            .reply_markup(admin_menu())
            .await?;
        }
        Err(e) => {
            log::error!("[admin] send car ready failed: {e}");
            bot.send_message(
                msg.chat.id,
                "Не вдалося надіслати клієнту. Перевір, що бот може писати користувачу.",
            )
            .reply_markup(admin_menu())
            .await?;
        }
    }

    state.clear_session(uid).await;
    Ok(())
}
