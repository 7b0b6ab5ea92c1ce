use chrono::Datelike;
use teloxide::prelude::*;
use teloxide::types::{Contact, UserId};

use crate::bot_state::BotState;
use crate::handlers::utils::{
    admin_menu, cancel_menu, contact_or_cancel_menu, main_menu, plate_confirm_keyboard,
    time_keyboard, vehicle_method_keyboard, vin_confirm_keyboard, ADMIN_TEXT, BOOK_TEXT,
    CANCEL_TEXT, REGISTER_TEXT,
};
use crate::handlers::{admin, callbacks, HandlerResult};
use crate::models::{Conversation, VehicleInfo};
use crate::schedule::dates::{normalize_date, parse_date_key};
use crate::vehicle;
use crate::vehicle::plate::{fetch_plate_info, normalize_plate, plate_format_ok};

pub async fn message_handler(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    let Some(user) = msg.from.clone() else {
        return Ok(());
    };
    let uid = user.id;
    let chat_id = msg.chat.id;

    // contact share is the alternative phone entry during registration
    if let Some(contact) = msg.contact().cloned() {
        if let Some(Conversation::RegPhone { full_name }) = state.session(uid).await {
            return reg_phone_contact(&bot, &msg, &state, uid, full_name, contact).await;
        }
        return Ok(());
    }

    let Some(text) = msg.text() else {
        return Ok(());
    };
    // commands are consumed by the command branch
    if text.starts_with('/') {
        return Ok(());
    }

    // the universal cancel wins over every state
    if text == CANCEL_TEXT {
        state.clear_session(uid).await;
        bot.send_message(chat_id, "Дію скасовано. Повертаю в головне меню.")
            .reply_markup(main_menu(state.is_registered(uid).await, state.is_admin(uid)))
            .await?;
        return Ok(());
    }

    match text {
        REGISTER_TEXT => start_registration(&bot, &msg, &state, uid).await,
        BOOK_TEXT => start_booking(&bot, &msg, &state, uid).await,
        ADMIN_TEXT => admin::admin_entry(&bot, &msg, &state).await,
        "📋 Записи на сьогодні" => admin::admin_today(&bot, &msg, &state).await,
        "📅 Записи на дату" => admin::admin_pick_date(&bot, &msg, &state).await,
        "⬅️ В головне меню" => {
            bot.send_message(chat_id, "Повертаю в головне:")
                .reply_markup(main_menu(state.is_registered(uid).await, state.is_admin(uid)))
                .await?;
            Ok(())
        }
        _ => match state.session(uid).await {
            Some(Conversation::RegName) => reg_name_input(&bot, &msg, &state, uid, text).await,
            Some(Conversation::RegPhone { full_name }) => {
                reg_phone_text(&bot, &msg, &state, uid, full_name, text).await
            }
            Some(Conversation::RegVin { full_name, phone }) => {
                reg_vin_input(&bot, &msg, &state, uid, full_name, phone, text).await
            }
            Some(Conversation::RegPlate { full_name, phone }) => {
                reg_plate_input(&bot, &msg, &state, uid, full_name, phone, text).await
            }
            Some(Conversation::BookDate) => book_date_input(&bot, &msg, &state, uid, text).await,
            Some(Conversation::BookReasonOther { date_key, time }) => {
                book_reason_other_input(&bot, &msg, &state, uid, date_key, time, text).await
            }
            Some(Conversation::AdminDate) => admin::admin_date_input(&bot, &msg, &state, text).await,
            Some(Conversation::AdminAmount {
                date_key,
                time,
                client,
            }) => admin::admin_amount_input(&bot, &msg, &state, date_key, time, client, text).await,
            _ => {
                if state.is_admin(uid) {
                    bot.send_message(chat_id, "Адмін-меню:")
                        .reply_markup(admin_menu())
                        .await?;
                } else {
                    bot.send_message(chat_id, "Скористайся меню нижче 👇")
                        .reply_markup(main_menu(state.is_registered(uid).await, false))
                        .await?;
                }
                Ok(())
            }
        },
    }
}

async fn start_registration(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    uid: UserId,
) -> HandlerResult {
    if state.is_registered(uid).await {
        bot.send_message(msg.chat.id, "Ти вже зареєстрований ✅")
            .reply_markup(main_menu(true, state.is_admin(uid)))
            .await?;
        return Ok(());
    }
    state.set_session(uid, Conversation::RegName).await;
    bot.send_message(msg.chat.id, "Введи Ім'я та прізвище одним рядком:")
        .reply_markup(cancel_menu())
        .await?;
    Ok(())
}

async fn reg_name_input(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    uid: UserId,
    text: &str,
) -> HandlerResult {
    let full: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if full.chars().count() < 3 || !full.contains(' ') {
        bot.send_message(
            msg.chat.id,
            "Будь ласка, введи Ім'я та прізвище (через пробіл).",
        )
        .await?;
        return Ok(());
    }
    state
        .set_session(uid, Conversation::RegPhone { full_name: full })
        .await;
    bot.send_message(
        msg.chat.id,
        "Введи номер телефону (10 цифр, без +38) або натисни кнопку нижче:",
    )
    .reply_markup(contact_or_cancel_menu())
    .await?;
    Ok(())
}

async fn reg_phone_text(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    uid: UserId,
    full_name: String,
    text: &str,
) -> HandlerResult {
    let text = text.trim();
    if text.len() == 10 && text.chars().all(|c| c.is_ascii_digit()) {
        advance_to_vehicle_method(bot, msg, state, uid, full_name, text.to_string()).await
    } else {
        bot.send_message(
            msg.chat.id,
            "Телефон має містити рівно 10 цифр. Спробуй ще раз або натисни кнопку нижче.",
        )
        .reply_markup(contact_or_cancel_menu())
        .await?;
        Ok(())
    }
}

async fn reg_phone_contact(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    uid: UserId,
    full_name: String,
    contact: Contact,
) -> HandlerResult {
    // only the sender's own number is trusted
    if contact.user_id != Some(uid) {
        bot.send_message(msg.chat.id, "❌ Можна надіслати тільки власний номер.")
            .reply_markup(contact_or_cancel_menu())
            .await?;
        return Ok(());
    }

    let digits: String = contact
        .phone_number
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    if digits.len() < 10 {
        bot.send_message(
            msg.chat.id,
            "Телефон має містити рівно 10 цифр. Спробуй ще раз або натисни кнопку нижче.",
        )
        .reply_markup(contact_or_cancel_menu())
        .await?;
        return Ok(());
    }
    let phone = digits[digits.len() - 10..].to_string();
    advance_to_vehicle_method(bot, msg, state, uid, full_name, phone).await
}

async fn advance_to_vehicle_method(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    uid: UserId,
    full_name: String,
    phone: String,
) -> HandlerResult {
    state
        .set_session(uid, Conversation::RegVehicleMethod { full_name, phone })
        .await;
    bot.send_message(msg.chat.id, "Оберіть спосіб реєстрації автомобіля:")
        .reply_markup(vehicle_method_keyboard())
        .await?;
    Ok(())
}

async fn reg_vin_input(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    uid: UserId,
    full_name: String,
    phone: String,
    text: &str,
) -> HandlerResult {
    // no locks are held across the registry round-trips
    match vehicle::verify_vin(text, &state.config, state.policy.today().year()).await {
        Err(rejection) => {
            bot.send_message(msg.chat.id, format!("❌ {}", rejection.user_message()))
                .await?;
        }
        Ok(verified) => {
            let make = verified.vehicle.make.as_deref().unwrap_or("—");
            let model = verified.vehicle.model.as_deref().unwrap_or("—");
            let year = verified.vehicle.year.as_deref().unwrap_or("—");
            bot.send_message(
                msg.chat.id,
                format!(
                    "{}\nЗнайшов авто: {} {}, {}\n\nПідтверджуєш?",
                    verified.note, make, model, year
                ),
            )
            .reply_markup(vin_confirm_keyboard())
            .await?;
            state
                .set_session(
                    uid,
                    Conversation::RegVinConfirm {
                        full_name,
                        phone,
                        vin: verified.vin,
                        vehicle: verified.vehicle,
                    },
                )
                .await;
        }
    }
    Ok(())
}

async fn reg_plate_input(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    uid: UserId,
    full_name: String,
    phone: String,
    text: &str,
) -> HandlerResult {
    let plate = normalize_plate(text);
    if !plate_format_ok(&plate) {
        bot.send_message(
            msg.chat.id,
            "Невірний формат. Приклад: АА1234ВС (без пробілів/дефісів).",
        )
        .await?;
        return Ok(());
    }

    let info = match fetch_plate_info(
        &plate,
        state.config.bazagai_api_key.as_deref(),
        state.config.bazagai_timeout,
    )
    .await
    {
        Ok(info) => info,
        Err(e) => {
            log::error!("Baza-GAI fetch error: {e}");
            None
        }
    };

    let Some(info) = info else {
        bot.send_message(
            msg.chat.id,
            "Не вдалося підтягнути авто за номером. Спробуй інший номер або реєстрацію за VIN.",
        )
        .await?;
        return Ok(());
    };

    let vendor = info.vendor.clone().unwrap_or_else(|| "—".to_string());
    let model = info.model.clone().unwrap_or_else(|| "—".to_string());
    let year = info.model_year.clone().unwrap_or_else(|| "—".to_string());
    let warn = if info.is_stolen {
        "⚠️ В базі позначено як можливе викрадення!\n"
    } else {
        ""
    };

    bot.send_message(
        msg.chat.id,
        format!(
            "{warn}Знайшов авто:\n• Марка/модель: {vendor} {model}\n• Рік: {year}\n\nПідтверджуєш?"
        ),
    )
    .reply_markup(plate_confirm_keyboard())
    .await?;

    state
        .set_session(
            uid,
            Conversation::RegPlateConfirm {
                full_name,
                phone,
                plate: info.plate,
                vehicle: VehicleInfo {
                    make: info.vendor,
                    model: info.model,
                    year: info.model_year,
                },
            },
        )
        .await;
    Ok(())
}

async fn start_booking(bot: &Bot, msg: &Message, state: &BotState, uid: UserId) -> HandlerResult {
    if !state.is_registered(uid).await {
        bot.send_message(msg.chat.id, "Спочатку зареєструйся, будь ласка.")
            .reply_markup(main_menu(false, state.is_admin(uid)))
            .await?;
        return Ok(());
    }
    state.set_session(uid, Conversation::BookDate).await;
    bot.send_message(msg.chat.id, "Введи дату dd.mm або dd.mm.yy:")
        .reply_markup(cancel_menu())
        .await?;
    Ok(())
}

async fn book_date_input(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    uid: UserId,
    text: &str,
) -> HandlerResult {
    let Some(date_key) = normalize_date(text, state.policy.today()) else {
        bot.send_message(msg.chat.id, "Дата некоректна. Приклад: 15.02 або 15.02.25")
            .await?;
        return Ok(());
    };

    let Some(date) = parse_date_key(&date_key) else {
        bot.send_message(msg.chat.id, "Дата некоректна. Приклад: 15.02 або 15.02.25")
            .await?;
        return Ok(());
    };
    if date < state.policy.today() {
        bot.send_message(
            msg.chat.id,
            "❌ Не можна записуватись на минулу дату. Обери іншу.",
        )
        .reply_markup(cancel_menu())
        .await?;
        return Ok(());
    }
    if !state.policy.is_open(date) {
        bot.send_message(
            msg.chat.id,
            format!("❌ На {date_key} запис недоступний. Обери іншу дату."),
        )
        .reply_markup(cancel_menu())
        .await?;
        return Ok(());
    }

    let times = state
        .schedule()
        .await
        .available_times(&state.policy, &date_key);
    state
        .set_session(
            uid,
            Conversation::BookTime {
                date_key: date_key.clone(),
            },
        )
        .await;
    bot.send_message(msg.chat.id, format!("Оберіть час (09–19) на {date_key}:"))
        .reply_markup(time_keyboard(&times))
        .await?;
    Ok(())
}

async fn book_reason_other_input(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    uid: UserId,
    date_key: String,
    time: String,
    text: &str,
) -> HandlerResult {
    let reason: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if reason.chars().count() < 3 {
        bot.send_message(
            msg.chat.id,
            "Дуже коротко. Опиши трохи детальніше (від 3 символів).",
        )
        .await?;
        return Ok(());
    }

    if callbacks::finalize_booking(state, uid, &date_key, &time, &reason).await {
        state.clear_session(uid).await;
        bot.send_message(
            msg.chat.id,
            format!(
                "✅ Запис створено на {date_key} о {time}.\nПричина: {reason}\n\nДякуємо! Чекаємо 🤝"
            ),
        )
        .await?;
        bot.send_message(msg.chat.id, "Повертаю в головне меню.")
            .reply_markup(main_menu(true, state.is_admin(uid)))
            .await?;
    } else {
        let times = state
            .schedule()
            .await
            .available_times(&state.policy, &date_key);
        state
            .set_session(
                uid,
                Conversation::BookTime {
                    date_key: date_key.clone(),
                },
            )
            .await;
        bot.send_message(
            msg.chat.id,
            "Цей слот недоступний (можливо, час уже минув або його зайняли). Обери інший:",
        )
        .reply_markup(time_keyboard(&times))
        .await?;
    }
    Ok(())
}
