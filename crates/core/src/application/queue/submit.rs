// Submit Use Case - one form creates driver, vehicle and registration together

use crate::application::config::QueueConfig;
use crate::domain::{Timestamp, VehicleType};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Registration form as entered at the gate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationForm {
    pub driver_name: String,
    pub phone_number: String,

    #[serde(default)]
    pub license_number: Option<String>,

    #[serde(default)]
    pub is_continuous: bool,

    /// Booked slot, required for continuous drivers and ignored otherwise
    #[serde(default)]
    pub expected_check_in_time: Option<Timestamp>,

    pub plate_number: String,
    pub vehicle_type: VehicleType,
}

impl RegistrationForm {
    /// Walk-in driver, checked in on submission
    pub fn walk_in(
        driver_name: impl Into<String>,
        phone_number: impl Into<String>,
        plate_number: impl Into<String>,
        vehicle_type: VehicleType,
    ) -> Self {
        Self {
            driver_name: driver_name.into(),
            phone_number: phone_number.into(),
            license_number: None,
            is_continuous: false,
            expected_check_in_time: None,
            plate_number: plate_number.into(),
            vehicle_type,
        }
    }

    /// Continuous driver with a booked slot
    pub fn continuous(
        driver_name: impl Into<String>,
        phone_number: impl Into<String>,
        plate_number: impl Into<String>,
        vehicle_type: VehicleType,
        expected_check_in_time: Timestamp,
    ) -> Self {
        Self {
            is_continuous: true,
            expected_check_in_time: Some(expected_check_in_time),
            ..Self::walk_in(driver_name, phone_number, plate_number, vehicle_type)
        }
    }
}

/// Validate a form against the clock and the queue configuration
pub fn validate_form(form: &RegistrationForm, now: Timestamp, config: &QueueConfig) -> Result<()> {
    if form.driver_name.trim().is_empty() {
        return Err(AppError::Validation(
            "driver name cannot be empty".to_string(),
        ));
    }

    let phone = form.phone_number.trim();
    if phone.is_empty() {
        return Err(AppError::Validation(
            "phone number cannot be empty".to_string(),
        ));
    }
    if !phone
        .chars()
        .all(|c| c.is_ascii_digit() || c == '+' || c == '-' || c == ' ')
    {
        return Err(AppError::Validation(format!(
            "phone number must contain only digits: {}",
            phone
        )));
    }

    if form.plate_number.trim().is_empty() {
        return Err(AppError::Validation(
            "plate number cannot be empty".to_string(),
        ));
    }

    if form.is_continuous {
        let Some(expected) = form.expected_check_in_time else {
            return Err(AppError::Validation(
                "continuous drivers must book an expected check-in time".to_string(),
            ));
        };
        if expected < now {
            return Err(AppError::Validation(format!(
                "expected check-in time {} is in the past",
                expected
            )));
        }
        if expected > now + config.max_slot_ahead_ms {
            return Err(AppError::Validation(format!(
                "expected check-in time {} is too far ahead (max {} ms)",
                expected, config.max_slot_ahead_ms
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::constants::HOUR_MS;

    const NOW: i64 = 100 * HOUR_MS;

    fn validate(form: &RegistrationForm) -> Result<()> {
        validate_form(form, NOW, &QueueConfig::default())
    }

    #[test]
    fn test_validate_empty_name() {
        let form = RegistrationForm::walk_in("   ", "13800000000", "ABC123", VehicleType::Normal);
        let result = validate(&form);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("driver name"));
    }

    #[test]
    fn test_validate_phone() {
        let form = RegistrationForm::walk_in("Li", "", "ABC123", VehicleType::Normal);
        assert!(validate(&form).unwrap_err().to_string().contains("phone"));

        let form = RegistrationForm::walk_in("Li", "138-abc", "ABC123", VehicleType::Normal);
        assert!(validate(&form).unwrap_err().to_string().contains("only digits"));
    }

    #[test]
    fn test_validate_empty_plate() {
        let form = RegistrationForm::walk_in("Li", "138", " ", VehicleType::Normal);
        assert!(validate(&form).unwrap_err().to_string().contains("plate"));
    }

    #[test]
    fn test_validate_continuous_slot() {
        let mut form =
            RegistrationForm::continuous("Li", "138", "ABC123", VehicleType::Normal, NOW + HOUR_MS);
        assert!(validate(&form).is_ok());

        form.expected_check_in_time = None;
        assert!(validate(&form).unwrap_err().to_string().contains("book"));

        form.expected_check_in_time = Some(NOW - 1);
        assert!(validate(&form).unwrap_err().to_string().contains("past"));

        form.expected_check_in_time = Some(NOW + 12 * HOUR_MS + 1);
        assert!(validate(&form).unwrap_err().to_string().contains("too far"));

        form.expected_check_in_time = Some(NOW + 12 * HOUR_MS);
        assert!(validate(&form).is_ok());
    }

    #[test]
    fn test_walk_in_slot_is_ignored() {
        let mut form = RegistrationForm::walk_in("Li", "+86 138", "abc123", VehicleType::Dangerous);
        form.expected_check_in_time = Some(NOW - HOUR_MS);
        assert!(validate(&form).is_ok());
    }
}
