use crate::controller::Timings;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 50;
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 120;
pub const DEFAULT_NEAR_THRESHOLD_CM: f32 = 50.0;
pub const DEFAULT_FAR_THRESHOLD_CM: f32 = 70.0;
pub const DEFAULT_ROAD_WARNING_MS: u64 = 3000;
pub const DEFAULT_WATERWAY_WARNING_MS: u64 = 3000;
pub const DEFAULT_ROTATION_MS: u64 = 4000;
pub const DEFAULT_CLEAR_WINDOW_MS: u64 = 6000;
pub const DEFAULT_FLASH_HALF_PERIOD_MS: u64 = 500;
pub const DEFAULT_ECHO_TIMEOUT_MS: u64 = 30;
pub const DEFAULT_MAX_RANGE_CM: f32 = 400.0;
// 200 of 255 on an 8-bit PWM channel.
pub const DEFAULT_MOTOR_DUTY: f64 = 0.78;
pub const DEFAULT_PWM_FREQUENCY_HZ: f64 = 1000.0;

const MAX_TICK_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub controller: Option<ControllerSection>,
    #[serde(default)]
    pub hardware: Option<HardwareSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port to listen on (default: 8080)
    pub port: Option<u16>,
}

/// Thresholds and phase durations of the bridge cycle. Every field is optional.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ControllerSection {
    pub tick_interval_ms: Option<u64>,
    pub sample_interval_ms: Option<u64>,
    pub near_threshold_cm: Option<f32>,
    pub far_threshold_cm: Option<f32>,
    pub road_warning_ms: Option<u64>,
    pub waterway_warning_ms: Option<u64>,
    pub rotation_ms: Option<u64>,
    /// Continuous "no boat" time required before closing.
    pub clear_window_ms: Option<u64>,
    pub flash_half_period_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HardwareSection {
    #[serde(default)]
    pub simulated: bool,
    pub echo_timeout_ms: Option<u64>,
    pub max_range_cm: Option<f32>,
    pub motor_duty: Option<f64>,
    pub pwm_frequency_hz: Option<f64>,
    pub status_led: Option<u8>,
    pub motor: Option<MotorPins>,
    pub road: Option<LampPins>,
    pub waterway: Option<LampPins>,
    pub sensor_a: Option<SensorPins>,
    pub sensor_b: Option<SensorPins>,
}

/// BCM pin numbers for the H-bridge.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct MotorPins {
    pub in1: u8,
    pub in2: u8,
    pub enable: u8,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct LampPins {
    pub red: u8,
    pub yellow: u8,
    pub green: u8,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct SensorPins {
    pub trigger: u8,
    pub echo: u8,
}

/// Fully resolved pin map, only available when every table is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinMap {
    pub motor: MotorPins,
    pub road: LampPins,
    pub waterway: LampPins,
    pub sensor_a: SensorPins,
    pub sensor_b: SensorPins,
    pub status_led: Option<u8>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    fn validate(&self) -> Result<(), ConfigError> {
        let timings = self.timings();
        let max_range_cm = self.max_range_cm();
        if !max_range_cm.is_finite() || max_range_cm <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "max_range_cm ({max_range_cm}) must be a positive number"
            )));
        }
        let thresholds = [
            ("near_threshold_cm", timings.near_threshold_cm),
            ("far_threshold_cm", timings.far_threshold_cm),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} ({value}) must be a non-negative number"
                )));
            }
        }
        // A silent sensor reads as max range and must count as clear.
        if timings.far_threshold_cm >= max_range_cm {
            return Err(ConfigError::Invalid(format!(
                "far_threshold_cm ({}) must be below max_range_cm ({max_range_cm})",
                timings.far_threshold_cm
            )));
        }
        if timings.far_threshold_cm < timings.near_threshold_cm {
            return Err(ConfigError::Invalid(format!(
                "far_threshold_cm ({}) must not be below near_threshold_cm ({})",
                timings.far_threshold_cm, timings.near_threshold_cm
            )));
        }
        let durations = [
            ("road_warning_ms", timings.road_warning),
            ("waterway_warning_ms", timings.waterway_warning),
            ("rotation_ms", timings.rotation),
            ("clear_window_ms", timings.clear_window),
            ("flash_half_period_ms", timings.flash_half_period),
            ("tick_interval_ms", self.tick_interval()),
            ("sample_interval_ms", self.sample_interval()),
            ("echo_timeout_ms", self.echo_timeout()),
        ];
        for (name, duration) in durations {
            if duration.is_zero() {
                return Err(ConfigError::Invalid(format!("{name} must be greater than 0")));
            }
        }
        if self.tick_interval() > Duration::from_millis(MAX_TICK_INTERVAL_MS) {
            return Err(ConfigError::Invalid(format!(
                "tick_interval_ms must be at most {MAX_TICK_INTERVAL_MS}"
            )));
        }
        if !(0.0..=1.0).contains(&self.motor_duty()) {
            return Err(ConfigError::Invalid(
                "motor_duty must be within 0.0..=1.0".to_string(),
            ));
        }
        if !self.simulated() && self.pin_map().is_none() {
            return Err(ConfigError::Invalid(
                "hardware pin tables are required unless simulated = true".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the server port (default: 8080)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    pub fn log_level(&self) -> &str {
        &self.logging.level
    }

    fn controller_section(&self) -> ControllerSection {
        self.controller.clone().unwrap_or_default()
    }

    pub fn timings(&self) -> Timings {
        let section = self.controller_section();
        let ms = |value: Option<u64>, default: u64| Duration::from_millis(value.unwrap_or(default));
        Timings {
            near_threshold_cm: section
                .near_threshold_cm
                .unwrap_or(DEFAULT_NEAR_THRESHOLD_CM),
            far_threshold_cm: section.far_threshold_cm.unwrap_or(DEFAULT_FAR_THRESHOLD_CM),
            road_warning: ms(section.road_warning_ms, DEFAULT_ROAD_WARNING_MS),
            waterway_warning: ms(section.waterway_warning_ms, DEFAULT_WATERWAY_WARNING_MS),
            rotation: ms(section.rotation_ms, DEFAULT_ROTATION_MS),
            clear_window: ms(section.clear_window_ms, DEFAULT_CLEAR_WINDOW_MS),
            flash_half_period: ms(section.flash_half_period_ms, DEFAULT_FLASH_HALF_PERIOD_MS),
            max_range_cm: self.max_range_cm(),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        let ms = self
            .controller
            .as_ref()
            .and_then(|c| c.tick_interval_ms)
            .unwrap_or(DEFAULT_TICK_INTERVAL_MS);
        Duration::from_millis(ms)
    }

    pub fn sample_interval(&self) -> Duration {
        let ms = self
            .controller
            .as_ref()
            .and_then(|c| c.sample_interval_ms)
            .unwrap_or(DEFAULT_SAMPLE_INTERVAL_MS);
        Duration::from_millis(ms)
    }

    /// A missing `[hardware]` section means the simulated board.
    pub fn simulated(&self) -> bool {
        self.hardware.as_ref().map(|h| h.simulated).unwrap_or(true)
    }

    pub fn echo_timeout(&self) -> Duration {
        let ms = self
            .hardware
            .as_ref()
            .and_then(|h| h.echo_timeout_ms)
            .unwrap_or(DEFAULT_ECHO_TIMEOUT_MS);
        Duration::from_millis(ms)
    }

    pub fn max_range_cm(&self) -> f32 {
        self.hardware
            .as_ref()
            .and_then(|h| h.max_range_cm)
            .unwrap_or(DEFAULT_MAX_RANGE_CM)
    }

    pub fn motor_duty(&self) -> f64 {
        self.hardware
            .as_ref()
            .and_then(|h| h.motor_duty)
            .unwrap_or(DEFAULT_MOTOR_DUTY)
    }

    pub fn pwm_frequency_hz(&self) -> f64 {
        self.hardware
            .as_ref()
            .and_then(|h| h.pwm_frequency_hz)
            .unwrap_or(DEFAULT_PWM_FREQUENCY_HZ)
    }

    pub fn pin_map(&self) -> Option<PinMap> {
        let hw = self.hardware.as_ref()?;
        Some(PinMap {
            motor: hw.motor?,
            road: hw.road?,
            waterway: hw.waterway?,
            sensor_a: hw.sensor_a?,
            sensor_b: hw.sensor_b?,
            status_led: hw.status_led,
        })
    }
}
