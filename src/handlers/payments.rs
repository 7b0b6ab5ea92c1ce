use teloxide::prelude::*;
use teloxide::types::{InputFile, UserId};

use crate::bot_state::BotState;
use crate::handlers::HandlerResult;
use crate::receipts;

pub const PAY_CALLBACK_PREFIX: &str = "pay";

/// Simulated payment for one order. No real acquiring: the order must carry
/// an admin-set positive amount, the receipt file is written, the order is
/// marked paid, and the file goes back to the customer.
pub async fn simulate_payment(
    bot: &Bot,
    q: &CallbackQuery,
    state: &BotState,
    order_id: &str,
    uid: UserId,
) -> HandlerResult {
    if order_id.is_empty() {
        bot.answer_callback_query(q.id.clone())
            .text("Некоректні дані платежу")
            .show_alert(true)
            .await?;
        return Ok(());
    }

    // everything needed later is cloned out so no lock outlives this block
    let found = {
        let book = state.schedule().await;
        book.find_by_order(order_id).cloned()
    };
    let Some(appt) = found else {
        bot.answer_callback_query(q.id.clone())
            .text("Замовлення не знайдено.")
            .show_alert(true)
            .await?;
        return Ok(());
    };
    if appt.amount_uah <= 0 {
        bot.answer_callback_query(q.id.clone())
            .text("Сума не встановлена адміністратором.")
            .show_alert(true)
            .await?;
        return Ok(());
    }

    let profile = state.user(appt.user_id).await;
    let customer_name = profile
        .as_ref()
        .map(|p| p.full_name.clone())
        .unwrap_or_default();
    let phone = profile.as_ref().map(|p| p.phone.clone()).unwrap_or_default();

    let now = state.policy.now_local().naive_local();
    let receipt_text =
        receipts::format_receipt_text(order_id, appt.amount_uah, &customer_name, &phone, now);

    let receipt_path = match receipts::save_receipt_bytes(
        order_id,
        receipt_text.as_bytes(),
        &state.config.receipts_dir,
        "txt",
        if customer_name.is_empty() {
            None
        } else {
            Some(&customer_name)
        },
        now,
    ) {
        Ok(path) => path,
        Err(e) => {
            log::error!("[payments] receipt save failed for order {order_id}: {e}");
            bot.answer_callback_query(q.id.clone())
                .text("Не вдалося зберегти квитанцію 😕")
                .show_alert(true)
                .await?;
            return Ok(());
        }
    };
    log::info!("[payments] receipt saved for order {order_id}: {}", receipt_path.display());

    if let Err(e) = {
        let mut book = state.schedule().await;
        book.mark_paid(order_id, receipt_path.clone())
    } {
        log::error!("[payments] mark_paid failed for order {order_id}: {e}");
        bot.answer_callback_query(q.id.clone())
            .text("Замовлення не готове до оплати.")
            .show_alert(true)
            .await?;
        return Ok(());
    }

    let send = bot
        .send_document(ChatId(uid.0 as i64), InputFile::file(receipt_path))
        .caption(format!(
            "🧾 Квитанція по замовленню #{}\nСума: {} грн\nДякуємо за оплату!",
            order_id, appt.amount_uah
        ))
        .await;

    match send {
        Ok(_) => {
            bot.answer_callback_query(q.id.clone())
                .text("Оплату проведено (тест). Квитанцію надіслано.")
                .show_alert(true)
                .await?;
        }
        Err(e) => {
            // the billing record already committed; only delivery failed
            log::error!("[payments] send receipt failed: {e}");
            bot.answer_callback_query(q.id.clone())
                .text("Не вдалося надіслати файл квитанції 😕")
                .show_alert(true)
                .await?;
        }
    }
    Ok(())
}
