use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::bot_state::BotState;
use crate::handlers::utils::main_menu;
use crate::handlers::HandlerResult;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Доступні команди:")]
pub enum Command {
    #[command(description = "почати роботу з ботом")]
    Start,
    #[command(description = "показати допомогу")]
    Help,
}

pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: BotState,
) -> HandlerResult {
    match cmd {
        Command::Start => handle_start(bot, msg, state).await?,
        Command::Help => handle_help(bot, msg, state).await?,
    }
    Ok(())
}

async fn handle_start(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    let Some(uid) = msg.from.as_ref().map(|u| u.id) else {
        return Ok(());
    };
    // /start always drops whatever flow was in progress
    state.clear_session(uid).await;

    let is_registered = state.is_registered(uid).await;
    bot.send_message(
        msg.chat.id,
        "Привіт! 👋 Це бот запису на СТО.\n\n\
         • Якщо ти вже зареєстрований — тисни «Зробити запис».\n\
         • Якщо ні — тисни «Зареєструватися».",
    )
    .reply_markup(main_menu(is_registered, state.is_admin(uid)))
    .await?;
    Ok(())
}

async fn handle_help(bot: Bot, msg: Message, state: BotState) -> HandlerResult {
    let Some(uid) = msg.from.as_ref().map(|u| u.id) else {
        return Ok(());
    };
    bot.send_message(
        msg.chat.id,
        "ℹ️ Як це працює:\n\
         1. «Зареєструватися» — ім'я, телефон і авто (VIN або держномер).\n\
         2. «Зробити запис» — дата, вільна година, причина візиту.\n\
         3. Коли авто готове, прийде повідомлення з сумою і кнопкою оплати.\n\n\
         «Скасувати» перериває будь-яку дію.",
    )
    .reply_markup(main_menu(state.is_registered(uid).await, state.is_admin(uid)))
    .await?;
    Ok(())
}
