//! The externally visible view of the circulator

use std::fmt;
use std::str::FromStr;

use joule_proto::{CirculatorDataPoint, ErrorState, ProgramStep};
use serde::{Deserialize, Serialize};

use crate::config::CoordinatorConfig;

// Accepted ranges for user settings
pub const MIN_TARGET_TEMPERATURE: f32 = 0.0;
pub const MAX_TARGET_TEMPERATURE: f32 = 100.0;
pub const MIN_COOK_TIME_MINUTES: f32 = 0.0;
/// 24 hours
pub const MAX_COOK_TIME_MINUTES: f32 = 1440.0;

/// Display preference only; the device always works in °C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TemperatureUnit {
    #[serde(rename = "°C")]
    Celsius,
    #[default]
    #[serde(rename = "°F")]
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown temperature unit {0:?} (expected °C or °F)")]
pub struct ParseUnitError(String);

impl FromStr for TemperatureUnit {
    type Err = ParseUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "°c" | "c" | "celsius" => Ok(Self::Celsius),
            "°f" | "f" | "fahrenheit" => Ok(Self::Fahrenheit),
            _ => Err(ParseUnitError(s.to_string())),
        }
    }
}

/// Complete state handed to consumers. Replaced as a whole, never edited in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Snapshot {
    /// Bath temperature from the latest telemetry, °C; 0.0 until the first reading
    pub current_temperature: f32,
    pub is_cooking: bool,
    /// °C
    pub target_temperature: f32,
    pub cook_time_minutes: f32,
    pub temperature_unit: TemperatureUnit,
    #[serde(serialize_with = "debug_name::serialize")]
    pub program_step: Option<ProgramStep>,
    /// Seconds
    pub time_remaining: u32,
    #[serde(serialize_with = "debug_name::serialize")]
    pub error_state: Option<ErrorState>,
}

impl Snapshot {
    pub fn from_config(config: &CoordinatorConfig) -> Self {
        Self {
            current_temperature: 0.0,
            is_cooking: false,
            target_temperature: config.target_temperature,
            cook_time_minutes: config.cook_time_minutes,
            temperature_unit: config.temperature_unit,
            program_step: None,
            time_remaining: 0,
            error_state: None,
        }
    }

    /// The snapshot that follows `self` once `point` has arrived.
    pub fn with_telemetry(self, point: &CirculatorDataPoint) -> Self {
        Self {
            current_temperature: point.bath_temp,
            is_cooking: is_cooking(point.program_step, self.is_cooking),
            program_step: Some(point.program_step),
            time_remaining: point.time_remaining,
            error_state: Some(point.error_state),
            ..self
        }
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::from_config(&CoordinatorConfig::default())
    }
}

/// Cooking flag implied by a program step.
///
/// `Error` says nothing about whether a program is still loaded, so the
/// previous value stands.
pub fn is_cooking(step: ProgramStep, previous: bool) -> bool {
    match step {
        ProgramStep::PreHeat | ProgramStep::WaitForFood | ProgramStep::Cook => true,
        ProgramStep::Unknown | ProgramStep::WaitForRemoveFood => false,
        ProgramStep::Error => previous,
    }
}

/// Whole seconds for a cook time in minutes, rounded to nearest.
pub fn minutes_to_seconds(minutes: f32) -> u32 {
    (f64::from(minutes) * 60.0).round() as u32
}

mod debug_name {
    use serde::Serializer;

    pub fn serialize<S, T>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: std::fmt::Debug,
    {
        match value {
            Some(v) => serializer.collect_str(&format_args!("{v:?}")),
            None => serializer.serialize_none(),
        }
    }
}
