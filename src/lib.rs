pub mod bot_state;
pub mod config;
pub mod gcal;
pub mod handlers;
pub mod models;
pub mod receipts;
pub mod schedule;
pub mod vehicle;
