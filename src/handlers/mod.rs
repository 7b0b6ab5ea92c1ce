pub mod admin;
pub mod callbacks;
pub mod commands;
pub mod messages;
pub mod payments;
pub mod utils;

use std::error::Error;

pub use callbacks::callback_handler;
pub use commands::command_handler;
pub use messages::message_handler;

pub type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;
