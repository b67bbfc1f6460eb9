//! Line-level abstractions between the bridge logic and the board.
//!
//! Lamps, motor direction pins and sensor triggers are plain digital outputs,
//! the motor enable pin is a PWM output and sensor echoes are digital inputs.
//! The Raspberry Pi implementation lives in [`pi`]; [`mock`] keeps the
//! levels in memory so tests can probe what the controller drove.

use crate::error::AppError;

pub mod mock;
#[cfg(target_os = "linux")]
pub mod pi;

pub trait OutputLine: Send {
    fn set_level(&mut self, high: bool);

    fn set_high(&mut self) {
        self.set_level(true);
    }

    fn set_low(&mut self) {
        self.set_level(false);
    }
}

pub trait PwmLine: Send {
    /// Drive the line at `duty` (0.0..=1.0). A duty of 0.0 holds it low.
    fn set_duty(&mut self, duty: f64) -> Result<(), AppError>;
}

pub trait InputLine: Send {
    fn is_high(&self) -> bool;
}
