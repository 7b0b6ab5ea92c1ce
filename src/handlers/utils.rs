use teloxide::types::{
    ButtonRequest, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup,
    ReplyMarkup,
};

pub const CANCEL_TEXT: &str = "Скасувати";
pub const REGISTER_TEXT: &str = "Зареєструватися";
pub const BOOK_TEXT: &str = "Зробити запис";
pub const ADMIN_TEXT: &str = "🛠 Адмін";

/// Visit reasons offered on the inline keyboard, tag → label.
pub const REASONS: [(&str, &str); 4] = [
    ("oil", "заміна мастила"),
    ("diag", "діагностика"),
    ("tires", "заміна шин"),
    ("other", "інша причина"),
];

pub fn reason_label(tag: &str) -> Option<&'static str> {
    REASONS
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, label)| *label)
}

/// Головне меню
pub fn main_menu(is_registered: bool, is_admin: bool) -> ReplyMarkup {
    let mut rows = vec![vec![KeyboardButton::new(if is_registered {
        BOOK_TEXT
    } else {
        REGISTER_TEXT
    })]];
    if is_admin {
        rows.push(vec![KeyboardButton::new(ADMIN_TEXT)]);
    }
    rows.push(vec![KeyboardButton::new(CANCEL_TEXT)]);
    ReplyMarkup::Keyboard(KeyboardMarkup::new(rows).resize_keyboard())
}

pub fn cancel_menu() -> ReplyMarkup {
    ReplyMarkup::Keyboard(
        KeyboardMarkup::new(vec![vec![KeyboardButton::new(CANCEL_TEXT)]]).resize_keyboard(),
    )
}

pub fn contact_or_cancel_menu() -> ReplyMarkup {
    ReplyMarkup::Keyboard(
        KeyboardMarkup::new(vec![
            vec![KeyboardButton::new("📲 Надіслати мій номер").request(ButtonRequest::Contact)],
            vec![KeyboardButton::new(CANCEL_TEXT)],
        ])
        .resize_keyboard(),
    )
}

pub fn admin_menu() -> ReplyMarkup {
    ReplyMarkup::Keyboard(
        KeyboardMarkup::new(vec![
            vec![KeyboardButton::new("📋 Записи на сьогодні")],
            vec![KeyboardButton::new("📅 Записи на дату")],
            vec![KeyboardButton::new("⬅️ В головне меню")],
        ])
        .resize_keyboard(),
    )
}

/// Free slots as callback buttons, four per row, plus a back button.
/// `times` must already be filtered by the ledger.
pub fn time_keyboard(times: &[String]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = times
        .chunks(4)
        .map(|chunk| {
            chunk
                .iter()
                .map(|t| InlineKeyboardButton::callback(t.clone(), format!("time:{t}")))
                .collect()
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback("Назад", "time_back")]);
    InlineKeyboardMarkup::new(rows)
}

pub fn reasons_keyboard() -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = REASONS
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|(tag, label)| {
                    InlineKeyboardButton::callback(label.to_string(), format!("reason:{tag}"))
                })
                .collect()
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback("Назад", "reason_back")]);
    InlineKeyboardMarkup::new(rows)
}

pub fn vehicle_method_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("🔑 За VIN", "reg:via_vin"),
        InlineKeyboardButton::callback("🔤 За номером авто", "reg:via_plate"),
    ]])
}

pub fn vin_confirm_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Так, це моє авто", "vin:confirm_yes"),
        InlineKeyboardButton::callback("❌ Ні, ввести інший VIN", "vin:confirm_no"),
    ]])
}

pub fn plate_confirm_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Так, це моє авто", "plate:confirm_yes"),
        InlineKeyboardButton::callback("❌ Ні, не моє", "plate:confirm_no"),
    ]])
}

pub fn plate_retry_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "🔁 Ввести інший номер",
            "reg:via_plate",
        )],
        vec![InlineKeyboardButton::callback(
            "🔑 Реєстрація за VIN",
            "reg:via_vin",
        )],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_tags_resolve() {
        assert_eq!(reason_label("diag"), Some("діагностика"));
        assert_eq!(reason_label("nope"), None);
    }

    #[test]
    fn time_keyboard_chunks_by_four() {
        let times: Vec<String> = ["09:00", "10:00", "11:00", "12:00", "13:00"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let kb = time_keyboard(&times);
        // 4 + 1 slots, then the back row
        assert_eq!(kb.inline_keyboard.len(), 3);
        assert_eq!(kb.inline_keyboard[0].len(), 4);
        assert_eq!(kb.inline_keyboard[1].len(), 1);
    }
}
