use crate::error::AppError;
use crate::gpio::{InputLine, OutputLine, PwmLine};
use ::rppal::gpio::{Gpio, InputPin, OutputPin};

/// Owns the GPIO peripheral handle and hands out configured lines by BCM number.
pub struct PiGpio {
    gpio: Gpio,
}

impl PiGpio {
    pub fn new() -> Result<Self, AppError> {
        let gpio = Gpio::new().map_err(|err| AppError::Gpio(err.to_string()))?;
        Ok(Self { gpio })
    }

    pub fn output(&self, pin: u8) -> Result<PiOutputLine, AppError> {
        let output = self
            .gpio
            .get(pin)
            .map_err(|err| AppError::Gpio(format!("pin {pin}: {err}")))?
            .into_output_low();
        Ok(PiOutputLine { pin: output })
    }

    pub fn pwm(&self, pin: u8, frequency_hz: f64) -> Result<PiPwmLine, AppError> {
        let output = self
            .gpio
            .get(pin)
            .map_err(|err| AppError::Gpio(format!("pin {pin}: {err}")))?
            .into_output_low();
        Ok(PiPwmLine {
            pin: output,
            frequency_hz,
        })
    }

    pub fn input(&self, pin: u8) -> Result<PiInputLine, AppError> {
        let input = self
            .gpio
            .get(pin)
            .map_err(|err| AppError::Gpio(format!("pin {pin}: {err}")))?
            .into_input();
        Ok(PiInputLine { pin: input })
    }
}

pub struct PiOutputLine {
    pin: OutputPin,
}

impl OutputLine for PiOutputLine {
    fn set_level(&mut self, high: bool) {
        if high {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }
}

/// Software PWM on a regular output pin.
pub struct PiPwmLine {
    pin: OutputPin,
    frequency_hz: f64,
}

impl PwmLine for PiPwmLine {
    fn set_duty(&mut self, duty: f64) -> Result<(), AppError> {
        if duty <= 0.0 {
            self.pin
                .clear_pwm()
                .map_err(|err| AppError::Pwm(err.to_string()))?;
            self.pin.set_low();
            return Ok(());
        }
        self.pin
            .set_pwm_frequency(self.frequency_hz, duty.min(1.0))
            .map_err(|err| AppError::Pwm(err.to_string()))
    }
}

pub struct PiInputLine {
    pin: InputPin,
}

impl InputLine for PiInputLine {
    fn is_high(&self) -> bool {
        self.pin.is_high()
    }
}
