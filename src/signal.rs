//! Road and waterway traffic lights.
//!
//! [`SignalPair`] drives six lamps and mirrors what it last drove so the API can
//! report it without touching the hardware. Flashing is owned per side by a
//! [`Flasher`], which keeps its own phase across calls and toggles on wall-clock
//! time rather than on how often it is polled.

use crate::gpio::OutputLine;
use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Yellow,
    Green,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Road,
    Waterway,
}

/// Which lamps of one light are lit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LampState {
    pub red: bool,
    pub yellow: bool,
    pub green: bool,
}

impl LampState {
    pub fn steady(color: Color) -> Self {
        Self {
            red: color == Color::Red,
            yellow: color == Color::Yellow,
            green: color == Color::Green,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignalError {
    #[error("road and waterway cannot both be green")]
    ConflictingGreens,
}

/// The three lamp outputs of one light.
pub struct LampLines {
    pub red: Box<dyn OutputLine>,
    pub yellow: Box<dyn OutputLine>,
    pub green: Box<dyn OutputLine>,
}

struct Light {
    lines: LampLines,
    color: Color,
    lamps: LampState,
    flasher: Flasher,
    flashing: bool,
}

impl Light {
    fn new(lines: LampLines, half_period: Duration) -> Self {
        Self {
            lines,
            color: Color::Red,
            lamps: LampState::default(),
            flasher: Flasher::new(half_period),
            flashing: false,
        }
    }

    fn write(&mut self, lamps: LampState) {
        self.lines.red.set_level(lamps.red);
        self.lines.yellow.set_level(lamps.yellow);
        self.lines.green.set_level(lamps.green);
        self.lamps = lamps;
    }

    fn show(&mut self, color: Color) {
        let mut lamps = LampState::steady(color);
        if self.flashing {
            lamps.yellow = self.flasher.is_lit();
        }
        self.color = color;
        self.write(lamps);
    }

    fn write_yellow(&mut self, lit: bool) {
        self.lines.yellow.set_level(lit);
        self.lamps.yellow = lit;
    }
}

/// Toggles one indicator every half period.
#[derive(Debug, Clone)]
pub struct Flasher {
    half_period: Duration,
    last_flip: Option<Instant>,
    lit: bool,
}

impl Flasher {
    pub fn new(half_period: Duration) -> Self {
        Self {
            half_period,
            last_flip: None,
            lit: false,
        }
    }

    /// Advance to `now`. Returns the new level when it changed.
    ///
    /// The first poll after a reset lights the lamp immediately.
    pub fn poll(&mut self, now: Instant) -> Option<bool> {
        let due = match self.last_flip {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.half_period,
        };
        if !due {
            return None;
        }
        self.lit = !self.lit;
        self.last_flip = Some(now);
        Some(self.lit)
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    pub fn reset(&mut self) {
        self.last_flip = None;
        self.lit = false;
    }
}

pub struct SignalPair {
    road: Light,
    waterway: Light,
}

impl SignalPair {
    /// Wraps the lamp lines and drives the baseline: road green, waterway red.
    pub fn new(road: LampLines, waterway: LampLines, flash_half_period: Duration) -> Self {
        let mut pair = Self {
            road: Light::new(road, flash_half_period),
            waterway: Light::new(waterway, flash_half_period),
        };
        pair.road.show(Color::Green);
        pair.waterway.show(Color::Red);
        pair
    }

    fn light_mut(&mut self, side: Side) -> &mut Light {
        match side {
            Side::Road => &mut self.road,
            Side::Waterway => &mut self.waterway,
        }
    }

    /// Show a steady color on each side. A side that is flashing keeps its
    /// yellow lamp under the flasher's control.
    ///
    /// Asking for two greens drives both sides red and fails.
    pub fn set(&mut self, road: Color, waterway: Color) -> Result<(), SignalError> {
        if road == Color::Green && waterway == Color::Green {
            self.road.show(Color::Red);
            self.waterway.show(Color::Red);
            return Err(SignalError::ConflictingGreens);
        }
        // Red goes up before the other side can turn green.
        if road == Color::Green {
            self.waterway.show(waterway);
            self.road.show(road);
        } else {
            self.road.show(road);
            self.waterway.show(waterway);
        }
        Ok(())
    }

    /// Flash the yellow lamp of `side`. Safe to call every tick; the lamp only
    /// changes once per half period.
    ///
    /// The half period is fixed per pair by [`SignalPair::new`], so both sides
    /// always blink at the configured cadence.
    pub fn flash(&mut self, side: Side, now: Instant) {
        let light = self.light_mut(side);
        light.flashing = true;
        if let Some(lit) = light.flasher.poll(now) {
            trace!(side = ?side, lit, "Flash toggle");
            light.write_yellow(lit);
        }
    }

    /// End flashing and restore the yellow lamp to what the steady color implies.
    pub fn stop_flash(&mut self, side: Side) {
        let light = self.light_mut(side);
        if !light.flashing {
            return;
        }
        light.flashing = false;
        light.flasher.reset();
        let steady = light.color == Color::Yellow;
        light.write_yellow(steady);
    }

    pub fn is_flashing(&self, side: Side) -> bool {
        match side {
            Side::Road => self.road.flashing,
            Side::Waterway => self.waterway.flashing,
        }
    }

    pub fn color(&self, side: Side) -> Color {
        match side {
            Side::Road => self.road.color,
            Side::Waterway => self.waterway.color,
        }
    }

    pub fn lamps(&self, side: Side) -> LampState {
        match side {
            Side::Road => self.road.lamps,
            Side::Waterway => self.waterway.lamps,
        }
    }
}
