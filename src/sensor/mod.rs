use crate::error::AppError;
use serde::Serialize;
use std::fmt;
use tracing::debug;

pub mod hcsr04;
pub mod mock;

/// Largest reading a sensor reports; also the substitute for "no echo".
pub const MAX_RANGE_CM: f32 = 400.0;

/// A bounded range reading in centimetres.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Distance(f32);

impl Distance {
    pub const MAX: Distance = Distance(MAX_RANGE_CM);

    /// Clamp a plausible reading into `0..=max_cm`.
    pub fn from_cm(cm: f32, max_cm: f32) -> Self {
        Distance(cm.max(0.0).min(max_cm))
    }

    /// The reading reported when nothing echoes back within `max_cm`.
    pub fn at_max(max_cm: f32) -> Self {
        Distance(max_cm)
    }

    pub fn cm(self) -> f32 {
        self.0
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}cm", self.0)
    }
}

/// Raw ranging hardware. Errors mean the echo never arrived.
pub trait RangeDriver: Send {
    fn read_cm(&mut self) -> Result<f32, AppError>;
}

/// Which crossing direction a sensor watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorId {
    A,
    B,
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorId::A => f.write_str("A"),
            SensorId::B => f.write_str("B"),
        }
    }
}

pub struct DistanceSensor {
    id: SensorId,
    driver: Box<dyn RangeDriver>,
    max_range_cm: f32,
}

impl DistanceSensor {
    pub fn new(id: SensorId, driver: Box<dyn RangeDriver>, max_range_cm: f32) -> Self {
        Self {
            id,
            driver,
            max_range_cm,
        }
    }

    pub fn id(&self) -> SensorId {
        self.id
    }

    pub fn max_distance(&self) -> Distance {
        Distance::at_max(self.max_range_cm)
    }

    /// Read once. A timeout, a zero or an out-of-range echo all read as maximum range.
    pub fn measure(&mut self) -> Distance {
        let raw = self.driver.read_cm();
        if let Err(err) = &raw {
            debug!(sensor = %self.id, error = %err, "No echo, reporting maximum range");
        }
        normalize_reading(raw, self.max_range_cm)
    }
}

/// The two sensors, one per crossing direction.
pub struct SensorPair {
    pub a: DistanceSensor,
    pub b: DistanceSensor,
}

impl SensorPair {
    pub fn measure(&mut self) -> (Distance, Distance) {
        (self.a.measure(), self.b.measure())
    }
}

pub fn normalize_reading(raw: Result<f32, AppError>, max_cm: f32) -> Distance {
    match raw {
        Ok(cm) if cm.is_finite() && cm > 0.0 && cm <= max_cm => Distance::from_cm(cm, max_cm),
        _ => Distance::at_max(max_cm),
    }
}
