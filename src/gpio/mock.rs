use crate::error::AppError;
use crate::gpio::{InputLine, OutputLine, PwmLine};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// In-memory digital output. Clones share the same level.
#[derive(Debug, Clone, Default)]
pub struct MockOutputLine {
    level: Arc<AtomicBool>,
}

impl MockOutputLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_high(&self) -> bool {
        self.level.load(Ordering::SeqCst)
    }
}

impl OutputLine for MockOutputLine {
    fn set_level(&mut self, high: bool) {
        self.level.store(high, Ordering::SeqCst);
    }
}

/// In-memory PWM output storing the duty as `f32` bits.
#[derive(Debug, Clone, Default)]
pub struct MockPwmLine {
    duty_bits: Arc<AtomicU32>,
    fail: bool,
}

impl MockPwmLine {
    pub fn new() -> Self {
        Self::default()
    }

    /// A line whose every write fails, for exercising error paths.
    pub fn failing() -> Self {
        Self {
            duty_bits: Arc::default(),
            fail: true,
        }
    }

    pub fn duty(&self) -> f64 {
        f64::from(f32::from_bits(self.duty_bits.load(Ordering::SeqCst)))
    }
}

impl PwmLine for MockPwmLine {
    fn set_duty(&mut self, duty: f64) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::Pwm("mock pwm write failed".to_string()));
        }
        self.duty_bits
            .store((duty as f32).to_bits(), Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockInputLine {
    level: Arc<AtomicBool>,
}

impl MockInputLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drive(&self, high: bool) {
        self.level.store(high, Ordering::SeqCst);
    }
}

impl InputLine for MockInputLine {
    fn is_high(&self) -> bool {
        self.level.load(Ordering::SeqCst)
    }
}
