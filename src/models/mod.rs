pub mod appointment;
pub mod conversation;
pub mod user;

pub use appointment::{Appointment, BillingStatus};
pub use conversation::Conversation;
pub use user::{UserProfile, VehicleInfo};
