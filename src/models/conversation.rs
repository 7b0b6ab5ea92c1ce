use teloxide::types::UserId;

use super::VehicleInfo;

/// Per-user conversation state. At most one live session per user: entering
/// any flow replaces whatever was active before, and the universal
/// «Скасувати» clears it from every state.
#[derive(Debug, Clone)]
pub enum Conversation {
    // registration
    RegName,
    RegPhone {
        full_name: String,
    },
    RegVehicleMethod {
        full_name: String,
        phone: String,
    },
    RegVin {
        full_name: String,
        phone: String,
    },
    RegVinConfirm {
        full_name: String,
        phone: String,
        vin: String,
        vehicle: VehicleInfo,
    },
    RegPlate {
        full_name: String,
        phone: String,
    },
    RegPlateConfirm {
        full_name: String,
        phone: String,
        plate: String,
        vehicle: VehicleInfo,
    },
    // booking
    BookDate,
    BookTime {
        date_key: String,
    },
    BookReason {
        date_key: String,
        time: String,
    },
    BookReasonOther {
        date_key: String,
        time: String,
    },
    // admin
    AdminDate,
    AdminAmount {
        date_key: String,
        time: String,
        client: UserId,
    },
}

impl Conversation {
    /// Name and phone accumulated so far, for the registration states that
    /// allow switching between the VIN and plate branches.
    pub fn reg_credentials(&self) -> Option<(String, String)> {
        match self {
            Conversation::RegVehicleMethod { full_name, phone }
            | Conversation::RegVin { full_name, phone }
            | Conversation::RegPlate { full_name, phone }
            | Conversation::RegVinConfirm {
                full_name, phone, ..
            }
            | Conversation::RegPlateConfirm {
                full_name, phone, ..
            } => Some((full_name.clone(), phone.clone())),
            _ => None,
        }
    }
}
