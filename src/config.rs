//! Configuration for the audio backend

use crate::error::{BackendError, Result};
use crate::host::ConfigurationSection;
use crate::math::{Pose, Vec3};

/// Speed of sound in air, meters per second.
pub const DEFAULT_SPEED_OF_SOUND: f32 = 343.3;

/// One world unit per meter, used by effects that need physical units
/// (air absorption and the like).
pub const DEFAULT_METERS_PER_UNIT: f32 = 1.0;

/// Listener gain applied on load. Starting silent avoids pops while the
/// host brings sources up.
pub const DEFAULT_LISTENER_GAIN: f32 = 0.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub listener_gain: f32,
    pub speed_of_sound: f32,
    pub meters_per_unit: f32,
    /// Output device to open (None = system default)
    pub device_name: Option<String>,
    pub listener_pose: Pose,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            listener_gain: DEFAULT_LISTENER_GAIN,
            speed_of_sound: DEFAULT_SPEED_OF_SOUND,
            meters_per_unit: DEFAULT_METERS_PER_UNIT,
            device_name: None,
            listener_pose: Pose::identity(),
        }
    }
}

impl BackendConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener_gain(mut self, gain: f32) -> Self {
        self.listener_gain = gain;
        self
    }

    pub fn speed_of_sound(mut self, speed: f32) -> Self {
        self.speed_of_sound = speed;
        self
    }

    pub fn meters_per_unit(mut self, meters: f32) -> Self {
        self.meters_per_unit = meters;
        self
    }

    pub fn device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    pub fn listener_pose(mut self, pose: Pose) -> Self {
        self.listener_pose = pose;
        self
    }

    /// Read the backend's configuration section. Missing keys keep their
    /// defaults.
    ///
    /// Recognised keys: `gain`, `speed_of_sound`, `meters_per_unit`,
    /// `device`, `listener_position` (as `x,y,z`).
    pub fn from_section(section: &dyn ConfigurationSection) -> Result<Self> {
        let mut config = Self::default();

        if let Some(value) = section.get("gain") {
            config.listener_gain = parse_number("gain", value)?;
        }
        if let Some(value) = section.get("speed_of_sound") {
            config.speed_of_sound = parse_number("speed_of_sound", value)?;
        }
        if let Some(value) = section.get("meters_per_unit") {
            config.meters_per_unit = parse_number("meters_per_unit", value)?;
        }
        if let Some(value) = section.get("device") {
            let name = value.trim();
            if !name.is_empty() {
                config.device_name = Some(name.to_string());
            }
        }
        if let Some(value) = section.get("listener_position") {
            config.listener_pose = Pose::from_position(parse_vec3("listener_position", value)?);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.listener_gain.is_finite() || self.listener_gain < 0.0 {
            return Err(BackendError::Configuration(format!(
                "gain must be a non-negative number, got {}",
                self.listener_gain
            )));
        }
        if !self.speed_of_sound.is_finite() || self.speed_of_sound <= 0.0 {
            return Err(BackendError::Configuration(format!(
                "speed_of_sound must be positive, got {}",
                self.speed_of_sound
            )));
        }
        if !self.meters_per_unit.is_finite() || self.meters_per_unit <= 0.0 {
            return Err(BackendError::Configuration(format!(
                "meters_per_unit must be positive, got {}",
                self.meters_per_unit
            )));
        }
        if !self.listener_pose.is_finite() {
            return Err(BackendError::Configuration(
                "listener pose must be finite".into(),
            ));
        }
        Ok(())
    }
}

fn parse_number(key: &str, value: &str) -> Result<f32> {
    value.trim().parse::<f32>().map_err(|e| {
        BackendError::Configuration(format!("{} = {:?} is not a number: {}", key, value, e))
    })
}

fn parse_vec3(key: &str, value: &str) -> Result<Vec3> {
    let components = value
        .split(',')
        .map(|part| parse_number(key, part))
        .collect::<Result<Vec<f32>>>()?;

    match components.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(BackendError::Configuration(format!(
            "{} = {:?} must have three components",
            key, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::EmptySection;
    use std::collections::HashMap;

    fn section(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = BackendConfig::from_section(&EmptySection).unwrap();
        assert_eq!(config, BackendConfig::default());
        assert_eq!(config.listener_gain, 0.0);
        assert_eq!(config.speed_of_sound, 343.3);
        assert_eq!(config.meters_per_unit, 1.0);
        assert!(config.device_name.is_none());
    }

    #[test]
    fn test_section_overrides() {
        let values = section(&[
            ("gain", "0.25"),
            ("speed_of_sound", " 340 "),
            ("device", "Speakers"),
            ("listener_position", "1, 2.5, -3"),
        ]);
        let config = BackendConfig::from_section(&values).unwrap();

        assert_eq!(config.listener_gain, 0.25);
        assert_eq!(config.speed_of_sound, 340.0);
        assert_eq!(config.meters_per_unit, 1.0);
        assert_eq!(config.device_name.as_deref(), Some("Speakers"));
        assert_eq!(config.listener_pose.position, Vec3::new(1.0, 2.5, -3.0));
    }

    #[test]
    fn test_blank_device_means_default() {
        let config = BackendConfig::from_section(&section(&[("device", "  ")])).unwrap();
        assert!(config.device_name.is_none());
    }

    #[test]
    fn test_invalid_values() {
        assert!(BackendConfig::from_section(&section(&[("gain", "loud")])).is_err());
        assert!(BackendConfig::from_section(&section(&[("gain", "-1")])).is_err());
        assert!(BackendConfig::from_section(&section(&[("speed_of_sound", "0")])).is_err());
        assert!(BackendConfig::from_section(&section(&[("meters_per_unit", "inf")])).is_err());
        assert!(BackendConfig::from_section(&section(&[("listener_position", "1,2")])).is_err());
    }

    #[test]
    fn test_builder() {
        let config = BackendConfig::new()
            .listener_gain(1.0)
            .speed_of_sound(1500.0)
            .meters_per_unit(0.3048)
            .device_name("Headphones");

        assert!(config.validate().is_ok());
        assert_eq!(config.device_name.as_deref(), Some("Headphones"));
        assert!(BackendConfig::new().speed_of_sound(-1.0).validate().is_err());
    }
}
