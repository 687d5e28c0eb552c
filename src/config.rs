//! Serializable controller configuration.
//!
//! JSON is handled by `serde-json-core`, so parsing and writing work in
//! `no_std` against caller-provided buffers.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MinMaxError;
use crate::log::debug;
use crate::pid::{DerivativeStart, IntegerPidController, Overflow};

#[derive(Debug)]
pub enum ConfigError {
    Json(serde_json_core::de::Error),
    Serialize(serde_json_core::ser::Error),
    Limits(MinMaxError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Json(e) => write!(f, "invalid config JSON: {}", e),
            ConfigError::Serialize(e) => write!(f, "config serialization failed: {}", e),
            ConfigError::Limits(e) => write!(f, "invalid output limits: {}", e),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConfigError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ConfigError::Json(_) => defmt::write!(f, "invalid config JSON"),
            ConfigError::Serialize(_) => defmt::write!(f, "config serialization failed"),
            ConfigError::Limits(e) => defmt::write!(f, "invalid output limits: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

impl From<MinMaxError> for ConfigError {
    fn from(e: MinMaxError) -> Self {
        ConfigError::Limits(e)
    }
}

impl From<serde_json_core::de::Error> for ConfigError {
    fn from(e: serde_json_core::de::Error) -> Self {
        ConfigError::Json(e)
    }
}

impl From<serde_json_core::ser::Error> for ConfigError {
    fn from(e: serde_json_core::ser::Error) -> Self {
        ConfigError::Serialize(e)
    }
}

/// Gains, setpoint, limits and modes of an [`IntegerPidController`].
///
/// Missing limits keep the full-range default on that side.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PidConfig {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub setpoint: i64,
    pub output_min: Option<i64>,
    pub output_max: Option<i64>,
    pub derivative_start: DerivativeStart,
    pub overflow: Overflow,
}

impl PidConfig {
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let (config, _) = serde_json_core::from_slice::<PidConfig>(bytes)?;
        Ok(config)
    }

    /// Write the config as JSON into `buf`, returning the number of bytes used.
    pub fn to_json(&self, buf: &mut [u8]) -> Result<usize, ConfigError> {
        Ok(serde_json_core::to_slice(self, buf)?)
    }

    pub fn build(&self) -> Result<IntegerPidController, ConfigError> {
        let mut pid = IntegerPidController::new(self.kp, self.ki, self.kd);
        pid.set_setpoint(self.setpoint)
            .set_derivative_start(self.derivative_start)
            .set_overflow(self.overflow);

        if self.output_min.is_some() || self.output_max.is_some() {
            let (default_min, default_max) = pid.output_limits();
            pid.set_output_limits(
                self.output_min.unwrap_or(default_min),
                self.output_max.unwrap_or(default_max),
            )?;
        }
        debug!(
            "pid built from config: setpoint={} limits={}..{}",
            pid.setpoint(),
            pid.output_limits().0,
            pid.output_limits().1
        );
        Ok(pid)
    }
}
