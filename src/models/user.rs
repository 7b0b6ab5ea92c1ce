use serde::{Deserialize, Serialize};

/// Best-effort vehicle descriptor from the registries; any field may be
/// unknown without invalidating the registration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehicleInfo {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<String>,
}

impl VehicleInfo {
    pub fn is_empty(&self) -> bool {
        self.make.is_none() && self.model.is_none() && self.year.is_none()
    }

    /// "Make, Model, Year" with unknown parts skipped.
    pub fn line(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.make, &self.model, &self.year]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub full_name: String,
    /// 10 digits, local format without +38.
    pub phone: String,
    pub vin: Option<String>,
    pub plate: Option<String>,
    pub vehicle: VehicleInfo,
}

impl UserProfile {
    /// Vehicle line for schedule renders, falling back to the plate.
    pub fn car_line(&self) -> String {
        self.vehicle
            .line()
            .or_else(|| self.plate.clone())
            .unwrap_or_else(|| "—".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vehicle_line_skips_unknowns() {
        let v = VehicleInfo {
            make: Some("Toyota".into()),
            model: None,
            year: Some("2019".into()),
        };
        assert_eq!(v.line().as_deref(), Some("Toyota, 2019"));
        assert_eq!(VehicleInfo::default().line(), None);
    }

    #[test]
    fn car_line_falls_back_to_plate() {
        let p = UserProfile {
            full_name: "Тарас Коваль".into(),
            phone: "0671234567".into(),
            vin: None,
            plate: Some("АА1234ВС".into()),
            vehicle: VehicleInfo::default(),
        };
        assert_eq!(p.car_line(), "АА1234ВС");
    }
}
