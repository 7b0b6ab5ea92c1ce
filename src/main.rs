use teloxide::prelude::*;

use sto_bot::bot_state::BotState;
use sto_bot::config::Config;
use sto_bot::handlers::commands::Command;
use sto_bot::handlers::{callback_handler, command_handler, message_handler};
use sto_bot::receipts;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    env_logger::init();
    log::info!("Starting service-station booking bot...");

    let config = Config::from_env()?;
    log::info!("TIMEZONE in use: {}", config.tz);

    let receipts_dir = receipts::ensure_receipts_dir(&config.receipts_dir)?;
    log::info!("Receipts dir: {}", receipts_dir.display());

    let bot = Bot::new(config.bot_token.clone());
    let state = BotState::new(config);

    match &state.calendar {
        Some(calendar) => {
            log::info!("Calendar ID in use: {:?}", calendar.calendar_id());
            if calendar.can_access().await {
                log::info!("✅ Google Calendar: client initialized");
            } else {
                log::error!(
                    "Google Calendar: no access to the configured calendar, event inserts will fail"
                );
            }
        }
        None => {
            log::warn!(
                "Google Calendar is not configured (GOOGLE_CALENDAR_ID or GOOGLE_API_TOKEN missing)"
            );
        }
    }

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(command_handler),
        )
        .branch(Update::filter_callback_query().endpoint(callback_handler))
        .branch(Update::filter_message().endpoint(message_handler));

    log::info!("🚀 Starting dispatcher...");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Bot stopped.");
    Ok(())
}
