// Vehicle Domain Model

use super::Timestamp;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Vehicle ID (UUID v4)
pub type VehicleId = String;

/// Vehicle Type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleType {
    Normal,
    Refrigerated,
    Dangerous,
}

impl VehicleType {
    pub const ALL: [VehicleType; 3] = [
        VehicleType::Normal,
        VehicleType::Refrigerated,
        VehicleType::Dangerous,
    ];

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            VehicleType::Normal => "General cargo",
            VehicleType::Refrigerated => "Refrigerated",
            VehicleType::Dangerous => "Dangerous goods",
        }
    }
}

impl std::fmt::Display for VehicleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VehicleType::Normal => write!(f, "NORMAL"),
            VehicleType::Refrigerated => write!(f, "REFRIGERATED"),
            VehicleType::Dangerous => write!(f, "DANGEROUS"),
        }
    }
}

impl FromStr for VehicleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(VehicleType::Normal),
            "refrigerated" | "reefer" => Ok(VehicleType::Refrigerated),
            "dangerous" | "hazmat" => Ok(VehicleType::Dangerous),
            other => Err(format!("unknown vehicle type: {}", other)),
        }
    }
}

/// Canonical plate form: trimmed and uppercased
pub fn normalize_plate(plate: &str) -> String {
    plate.trim().to_uppercase()
}

/// Vehicle Entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub plate_number: String,
    pub vehicle_type: VehicleType,
    pub registered_at: Timestamp,
}

impl Vehicle {
    /// Create a new vehicle, normalizing the plate number
    pub fn new(
        id: impl Into<String>,
        registered_at: Timestamp,
        plate_number: &str,
        vehicle_type: VehicleType,
    ) -> Self {
        Self {
            id: id.into(),
            plate_number: normalize_plate(plate_number),
            vehicle_type,
            registered_at,
        }
    }
}
