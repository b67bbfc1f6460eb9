//! Trigger/echo ultrasonic ranging (HC-SR04 and compatibles).
//!
//! A 10 µs pulse on the trigger line starts a measurement; the sensor then
//! holds the echo line high for as long as the sound took to travel out and
//! back. Both the wait for the rising edge and the pulse width are bounded by
//! the configured timeout, so a missing echo costs at most two timeouts.

use crate::error::AppError;
use crate::gpio::{InputLine, OutputLine};
use crate::sensor::RangeDriver;
use std::time::{Duration, Instant};

/// Speed of sound in cm/µs at roughly room temperature.
const SOUND_CM_PER_US: f32 = 0.034;
const SETTLE: Duration = Duration::from_micros(2);
const TRIGGER_PULSE: Duration = Duration::from_micros(10);

pub struct Hcsr04<T, E> {
    trigger: T,
    echo: E,
    timeout: Duration,
}

impl<T, E> Hcsr04<T, E>
where
    T: OutputLine,
    E: InputLine,
{
    pub fn new(trigger: T, echo: E, timeout: Duration) -> Self {
        Self {
            trigger,
            echo,
            timeout,
        }
    }

    fn pulse_trigger(&mut self) {
        self.trigger.set_low();
        spin_for(SETTLE);
        self.trigger.set_high();
        spin_for(TRIGGER_PULSE);
        self.trigger.set_low();
    }

    fn wait_for_level(&self, high: bool, since: Instant) -> Result<Instant, AppError> {
        loop {
            let now = Instant::now();
            if self.echo.is_high() == high {
                return Ok(now);
            }
            if now.duration_since(since) >= self.timeout {
                let edge = if high { "rising" } else { "falling" };
                return Err(AppError::Sensor(format!(
                    "echo timeout waiting for {edge} edge"
                )));
            }
            std::hint::spin_loop();
        }
    }
}

impl<T, E> RangeDriver for Hcsr04<T, E>
where
    T: OutputLine,
    E: InputLine,
{
    fn read_cm(&mut self) -> Result<f32, AppError> {
        self.pulse_trigger();
        let rise = self.wait_for_level(true, Instant::now())?;
        let fall = self.wait_for_level(false, rise)?;
        Ok(echo_width_to_cm(fall.duration_since(rise)))
    }
}

pub fn echo_width_to_cm(width: Duration) -> f32 {
    width.as_micros() as f32 * SOUND_CM_PER_US / 2.0
}

fn spin_for(duration: Duration) {
    let start = Instant::now();
    while start.elapsed() < duration {
        std::hint::spin_loop();
    }
}
