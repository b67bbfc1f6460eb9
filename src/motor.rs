use crate::gpio::{OutputLine, PwmLine};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MotorDirection {
    Stopped,
    Forward,
    Backward,
}

pub struct MotorLines {
    pub in1: Box<dyn OutputLine>,
    pub in2: Box<dyn OutputLine>,
    pub enable: Box<dyn PwmLine>,
}

/// H-bridge bridge motor at a fixed duty. Never stops on its own; how long it
/// runs is decided by the controller.
pub struct MotorActuator {
    lines: MotorLines,
    duty: f64,
    direction: MotorDirection,
}

impl MotorActuator {
    /// Takes ownership of the lines and makes sure the motor is stopped.
    pub fn new(lines: MotorLines, duty: f64) -> Self {
        let mut motor = Self {
            lines,
            duty,
            direction: MotorDirection::Stopped,
        };
        motor.write(MotorDirection::Stopped);
        motor
    }

    pub fn direction(&self) -> MotorDirection {
        self.direction
    }

    pub fn forward(&mut self) {
        self.drive(MotorDirection::Forward);
    }

    pub fn backward(&mut self) {
        self.drive(MotorDirection::Backward);
    }

    pub fn stop(&mut self) {
        self.drive(MotorDirection::Stopped);
    }

    fn drive(&mut self, direction: MotorDirection) {
        if self.direction == direction {
            return;
        }
        debug!(from = ?self.direction, to = ?direction, "Motor direction changed");
        self.write(direction);
    }

    fn write(&mut self, direction: MotorDirection) {
        let (in1, in2, duty) = match direction {
            MotorDirection::Forward => (false, true, self.duty),
            MotorDirection::Backward => (true, false, self.duty),
            MotorDirection::Stopped => (false, false, 0.0),
        };
        // Cut power before flipping direction.
        if let Err(err) = self.lines.enable.set_duty(0.0) {
            warn!(error = %err, "Failed to cut motor enable");
        }
        self.lines.in1.set_level(in1);
        self.lines.in2.set_level(in2);
        if duty > 0.0
            && let Err(err) = self.lines.enable.set_duty(duty)
        {
            warn!(error = %err, ?direction, "Failed to set motor duty");
        }
        self.direction = direction;
    }
}
