use crate::error::AppError;
use crate::sensor::RangeDriver;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockReading {
    Cm(f32),
    Timeout,
}

/// Scriptable ranging driver. Clones share the scripted reading, so a test can
/// keep one clone as a handle while the sensor owns the other.
#[derive(Debug, Clone)]
pub struct MockRangeDriver {
    reading: Arc<Mutex<MockReading>>,
}

impl MockRangeDriver {
    pub fn new(reading: MockReading) -> Self {
        Self {
            reading: Arc::new(Mutex::new(reading)),
        }
    }

    /// Nothing in range.
    pub fn clear() -> Self {
        Self::new(MockReading::Timeout)
    }

    pub fn set(&self, reading: MockReading) {
        if let Ok(mut guard) = self.reading.lock() {
            *guard = reading;
        }
    }

    pub fn set_cm(&self, cm: f32) {
        self.set(MockReading::Cm(cm));
    }

    pub fn set_timeout(&self) {
        self.set(MockReading::Timeout);
    }
}

impl RangeDriver for MockRangeDriver {
    fn read_cm(&mut self) -> Result<f32, AppError> {
        let reading = *self
            .reading
            .lock()
            .map_err(|_| AppError::Sensor("mock reading lock poisoned".to_string()))?;
        match reading {
            MockReading::Cm(cm) => Ok(cm),
            MockReading::Timeout => Err(AppError::Sensor("mock echo timeout".to_string())),
        }
    }
}
