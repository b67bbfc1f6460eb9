//! Assembles lamps, motor and sensors into something the controller can drive.

use crate::config::Config;
use crate::error::AppError;
use crate::gpio::OutputLine;
use crate::gpio::mock::{MockOutputLine, MockPwmLine};
use crate::motor::{MotorActuator, MotorLines};
use crate::sensor::mock::MockRangeDriver;
use crate::sensor::{DistanceSensor, SensorId, SensorPair};
use crate::signal::{LampLines, LampState, SignalPair};
use std::time::Duration;

pub struct Board {
    pub signals: SignalPair,
    pub motor: MotorActuator,
    pub sensors: SensorPair,
    /// Always-on indicator; held so the line stays driven.
    pub status_led: Option<Box<dyn OutputLine>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardSettings {
    pub flash_half_period: Duration,
    pub motor_duty: f64,
    pub max_range_cm: f32,
    pub echo_timeout: Duration,
    pub pwm_frequency_hz: f64,
}

impl BoardSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            flash_half_period: config.timings().flash_half_period,
            motor_duty: config.motor_duty(),
            max_range_cm: config.max_range_cm(),
            echo_timeout: config.echo_timeout(),
            pwm_frequency_hz: config.pwm_frequency_hz(),
        }
    }
}

/// Probe onto the three lamps of one simulated light.
#[derive(Debug, Clone, Default)]
pub struct LampProbe {
    pub red: MockOutputLine,
    pub yellow: MockOutputLine,
    pub green: MockOutputLine,
}

impl LampProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> LampLines {
        LampLines {
            red: Box::new(self.red.clone()),
            yellow: Box::new(self.yellow.clone()),
            green: Box::new(self.green.clone()),
        }
    }

    pub fn state(&self) -> LampState {
        LampState {
            red: self.red.is_high(),
            yellow: self.yellow.is_high(),
            green: self.green.is_high(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MotorProbe {
    pub in1: MockOutputLine,
    pub in2: MockOutputLine,
    pub enable: MockPwmLine,
}

impl MotorProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> MotorLines {
        MotorLines {
            in1: Box::new(self.in1.clone()),
            in2: Box::new(self.in2.clone()),
            enable: Box::new(self.enable.clone()),
        }
    }

    pub fn is_stopped(&self) -> bool {
        !self.in1.is_high() && !self.in2.is_high() && self.enable.duty() == 0.0
    }
}

/// In-memory board plus the handles to observe and script it.
pub struct SimulatedBoard {
    pub board: Board,
    pub road: LampProbe,
    pub waterway: LampProbe,
    pub motor: MotorProbe,
    pub sensor_a: MockRangeDriver,
    pub sensor_b: MockRangeDriver,
}

impl SimulatedBoard {
    /// Both sensors start out seeing nothing.
    pub fn new(settings: &BoardSettings) -> Self {
        let road = LampProbe::new();
        let waterway = LampProbe::new();
        let motor = MotorProbe::new();
        let sensor_a = MockRangeDriver::clear();
        let sensor_b = MockRangeDriver::clear();

        let board = Board {
            signals: SignalPair::new(road.lines(), waterway.lines(), settings.flash_half_period),
            motor: MotorActuator::new(motor.lines(), settings.motor_duty),
            sensors: SensorPair {
                a: DistanceSensor::new(
                    SensorId::A,
                    Box::new(sensor_a.clone()),
                    settings.max_range_cm,
                ),
                b: DistanceSensor::new(
                    SensorId::B,
                    Box::new(sensor_b.clone()),
                    settings.max_range_cm,
                ),
            },
            status_led: None,
        };

        Self {
            board,
            road,
            waterway,
            motor,
            sensor_a,
            sensor_b,
        }
    }
}

/// Configure every line before the controller's first tick.
#[cfg(target_os = "linux")]
pub fn raspberry_pi(pins: &crate::config::PinMap, settings: &BoardSettings) -> Result<Board, AppError> {
    use crate::gpio::pi::PiGpio;
    use crate::sensor::hcsr04::Hcsr04;

    let gpio = PiGpio::new()?;
    let lamps = |pins: &crate::config::LampPins| -> Result<LampLines, AppError> {
        Ok(LampLines {
            red: Box::new(gpio.output(pins.red)?),
            yellow: Box::new(gpio.output(pins.yellow)?),
            green: Box::new(gpio.output(pins.green)?),
        })
    };
    let signals = SignalPair::new(
        lamps(&pins.road)?,
        lamps(&pins.waterway)?,
        settings.flash_half_period,
    );

    let motor = MotorActuator::new(
        MotorLines {
            in1: Box::new(gpio.output(pins.motor.in1)?),
            in2: Box::new(gpio.output(pins.motor.in2)?),
            enable: Box::new(gpio.pwm(pins.motor.enable, settings.pwm_frequency_hz)?),
        },
        settings.motor_duty,
    );

    let sensor = |id: SensorId, pins: &crate::config::SensorPins| -> Result<DistanceSensor, AppError> {
        let driver = Hcsr04::new(
            gpio.output(pins.trigger)?,
            gpio.input(pins.echo)?,
            settings.echo_timeout,
        );
        Ok(DistanceSensor::new(id, Box::new(driver), settings.max_range_cm))
    };
    let sensors = SensorPair {
        a: sensor(SensorId::A, &pins.sensor_a)?,
        b: sensor(SensorId::B, &pins.sensor_b)?,
    };

    let status_led = match pins.status_led {
        Some(pin) => {
            let mut line = gpio.output(pin)?;
            line.set_high();
            Some(Box::new(line) as Box<dyn OutputLine>)
        }
        None => None,
    };

    Ok(Board {
        signals,
        motor,
        sensors,
        status_led,
    })
}

/// Build the board the configuration asks for.
pub fn from_config(config: &Config) -> Result<Board, AppError> {
    let settings = BoardSettings::from_config(config);
    if config.simulated() {
        return Ok(SimulatedBoard::new(&settings).board);
    }
    let pins = config
        .pin_map()
        .ok_or_else(|| AppError::Gpio("hardware pin map missing".to_string()))?;

    #[cfg(target_os = "linux")]
    {
        raspberry_pi(&pins, &settings)
    }

    #[cfg(not(target_os = "linux"))]
    {
        let _ = pins;
        Err(AppError::Gpio(
            "GPIO hardware requires Linux/Raspberry Pi".to_string(),
        ))
    }
}
