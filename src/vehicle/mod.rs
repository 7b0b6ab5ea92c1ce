pub mod plate;
pub mod vin;

use crate::config::Config;
use crate::models::VehicleInfo;

/// Why a VIN was turned away. Only local checks can reject; registry
/// trouble never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VinRejection {
    Format,
    Checksum,
}

impl VinRejection {
    pub fn user_message(&self) -> &'static str {
        match self {
            VinRejection::Format => "Формат VIN має бути 17 символів (без I/O/Q).",
            VinRejection::Checksum => "Контрольна цифра VIN не сходиться (ISO-3779).",
        }
    }
}

pub struct VinVerification {
    pub vin: String,
    pub note: String,
    pub vehicle: VehicleInfo,
}

/// Full VIN verification: local format and checksum gates first, then
/// best-effort enrichment via Auto.dev, falling back to vPIC confirmation.
/// A checksum-valid VIN is accepted even when both registries are down;
/// enrichment is not a correctness gate.
pub async fn verify_vin(
    raw: &str,
    cfg: &Config,
    current_year: i32,
) -> Result<VinVerification, VinRejection> {
    let vin = vin::normalize_vin(raw);
    if !vin::vin_format_ok(&vin) {
        return Err(VinRejection::Format);
    }
    if !vin::vin_checksum_ok(&vin) {
        return Err(VinRejection::Checksum);
    }

    match vin::fetch_vehicle_by_vin(&vin, &cfg.auto_dev_api_key, cfg.auto_dev_timeout).await {
        Ok(Some(vehicle)) => {
            return Ok(VinVerification {
                vin,
                note: "VIN підтверджено (Auto.dev).".to_string(),
                vehicle,
            });
        }
        Ok(None) => {}
        Err(e) => log::warn!("Auto.dev error: {e}"),
    }

    let note = match vin::vpic_confirms(&vin, &[current_year, current_year - 1], 10).await {
        Ok(true) => "VIN підтверджено (vPIC).",
        Ok(false) => "VIN пройшов перевірку контрольної суми.",
        Err(e) => {
            log::warn!("vPIC error: {e}");
            "VIN пройшов перевірку контрольної суми."
        }
    };

    Ok(VinVerification {
        vin,
        note: note.to_string(),
        vehicle: VehicleInfo::default(),
    })
}
