//! The bridge cycle.
//!
//! ```text
//! Idle -> RoadWarning -> WaterwayWarning -> Opening -> Open -> Closing -> Idle
//! ```
//!
//! All timing is measured from a single per-state entry timestamp (plus the
//! motion start inside `Opening`/`Closing`) and polled once per tick, so no
//! phase ever blocks the caller. Every transition goes through
//! [`BridgeController::enter`], which commands lights and motor for the new
//! state before returning; callers holding the controller lock never observe a
//! half-applied configuration.

use crate::motor::{MotorActuator, MotorDirection};
use crate::sensor::{Distance, MAX_RANGE_CM};
use crate::signal::{Color, LampState, Side, SignalPair};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub mod command;

pub use command::{CommandOutcome, OverrideCommand, OverrideError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatingState {
    /// Bridge down, road open.
    Idle,
    RoadWarning,
    WaterwayWarning,
    Opening,
    Open,
    Closing,
}

impl OperatingState {
    pub fn as_str(self) -> &'static str {
        match self {
            OperatingState::Idle => "IDLE",
            OperatingState::RoadWarning => "ROAD_WARNING",
            OperatingState::WaterwayWarning => "WATERWAY_WARNING",
            OperatingState::Opening => "OPENING",
            OperatingState::Open => "OPEN",
            OperatingState::Closing => "CLOSING",
        }
    }

    /// States in which the motor may be commanded to move.
    pub fn allows_motion(self) -> bool {
        matches!(self, OperatingState::Opening | OperatingState::Closing)
    }
}

impl fmt::Display for OperatingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    #[serde(rename = "auto")]
    Automatic,
    #[serde(rename = "manual")]
    Manual,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Automatic => f.write_str("auto"),
            Mode::Manual => f.write_str("manual"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" | "automatic" => Ok(Mode::Automatic),
            "manual" => Ok(Mode::Manual),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

/// Thresholds and phase durations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timings {
    /// A reading at or below this means a boat is approaching.
    pub near_threshold_cm: f32,
    /// Both readings above this mean the waterway is clear.
    pub far_threshold_cm: f32,
    pub road_warning: Duration,
    pub waterway_warning: Duration,
    /// How long the motor runs to fully open or close the bridge.
    pub rotation: Duration,
    pub clear_window: Duration,
    pub flash_half_period: Duration,
    /// Reading assumed before the first sample; matches what a silent sensor reports.
    pub max_range_cm: f32,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            near_threshold_cm: 50.0,
            far_threshold_cm: 70.0,
            road_warning: Duration::from_millis(3000),
            waterway_warning: Duration::from_millis(3000),
            rotation: Duration::from_millis(4000),
            clear_window: Duration::from_millis(6000),
            flash_half_period: Duration::from_millis(500),
            max_range_cm: MAX_RANGE_CM,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerState {
    pub state: OperatingState,
    pub state_entered_at: Instant,
    /// First tick of the current uninterrupted "both clear" run while `Open`.
    pub clear_since: Option<Instant>,
    /// When the motor started in `Opening`/`Closing`. `None` during the
    /// warning part of an automatic close.
    pub motion_started_at: Option<Instant>,
    pub mode: Mode,
    pub last_ranges: (Distance, Distance),
}

/// Time left until the next timer-driven transition, split by which light it
/// concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhaseTimers {
    pub road: Duration,
    pub waterway: Duration,
}

impl PhaseTimers {
    pub fn remaining(&self) -> Duration {
        self.road.max(self.waterway)
    }
}

/// Point-in-time view for the API.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BridgeSnapshot {
    pub state: OperatingState,
    pub mode: Mode,
    pub motor: MotorDirection,
    pub road_color: Color,
    pub waterway_color: Color,
    pub road_lamps: LampState,
    pub waterway_lamps: LampState,
    pub ranges: (Distance, Distance),
    pub timers: PhaseTimers,
}

pub struct BridgeController {
    timings: Timings,
    state: ControllerState,
    signals: SignalPair,
    motor: MotorActuator,
}

impl BridgeController {
    /// Starts in `Idle`/`Automatic` with road green and waterway red.
    pub fn new(timings: Timings, signals: SignalPair, motor: MotorActuator, now: Instant) -> Self {
        let far = Distance::at_max(timings.max_range_cm);
        let mut controller = Self {
            timings,
            state: ControllerState {
                state: OperatingState::Idle,
                state_entered_at: now,
                clear_since: None,
                motion_started_at: None,
                mode: Mode::Automatic,
                last_ranges: (far, far),
            },
            signals,
            motor,
        };
        controller.apply_outputs(OperatingState::Idle, now);
        controller
    }

    pub fn state(&self) -> OperatingState {
        self.state.state
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    pub fn controller_state(&self) -> &ControllerState {
        &self.state
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    pub fn motor_direction(&self) -> MotorDirection {
        self.motor.direction()
    }

    pub fn signals(&self) -> &SignalPair {
        &self.signals
    }

    fn is_near(&self, distance: Distance) -> bool {
        distance.cm() <= self.timings.near_threshold_cm
    }

    fn is_clear(&self, distance: Distance) -> bool {
        distance.cm() > self.timings.far_threshold_cm
    }

    /// Evaluate one tick. At most one transition happens per call.
    pub fn tick(&mut self, now: Instant, a: Distance, b: Distance) -> OperatingState {
        self.state.last_ranges = (a, b);
        let elapsed = now.saturating_duration_since(self.state.state_entered_at);
        let automatic = self.state.mode == Mode::Automatic;

        match self.state.state {
            // Motion bounds hold in both modes.
            OperatingState::Opening => {
                self.signals.flash(Side::Waterway, now);
                if self.motion_elapsed(now) >= self.timings.rotation {
                    self.enter(OperatingState::Open, now, "bridge fully open");
                }
            }
            OperatingState::Closing => {
                self.signals.flash(Side::Waterway, now);
                match self.state.motion_started_at {
                    None if elapsed >= self.timings.waterway_warning => {
                        self.start_closing_motion(now);
                    }
                    None => {}
                    Some(started) => {
                        if now.saturating_duration_since(started) >= self.timings.rotation {
                            self.enter(OperatingState::Idle, now, "bridge closed");
                        }
                    }
                }
            }
            _ if !automatic => {}
            OperatingState::Idle => {
                if self.is_near(a) || self.is_near(b) {
                    info!(distance_a = %a, distance_b = %b, "Boat detected");
                    self.enter(OperatingState::RoadWarning, now, "boat detected");
                }
            }
            OperatingState::RoadWarning => {
                if elapsed >= self.timings.road_warning {
                    self.enter(OperatingState::WaterwayWarning, now, "road warned");
                }
            }
            OperatingState::WaterwayWarning => {
                self.signals.flash(Side::Waterway, now);
                if elapsed >= self.timings.waterway_warning {
                    self.enter(OperatingState::Opening, now, "waterway warned");
                }
            }
            OperatingState::Open => self.evaluate_clear_window(now, a, b),
        }

        self.state.state
    }

    fn motion_elapsed(&self, now: Instant) -> Duration {
        let started = self
            .state
            .motion_started_at
            .unwrap_or(self.state.state_entered_at);
        now.saturating_duration_since(started)
    }

    fn evaluate_clear_window(&mut self, now: Instant, a: Distance, b: Distance) {
        if !(self.is_clear(a) && self.is_clear(b)) {
            if self.state.clear_since.take().is_some() {
                debug!(distance_a = %a, distance_b = %b, "Waterway busy again, clear window reset");
            }
            return;
        }
        let since = match self.state.clear_since {
            Some(since) => since,
            None => {
                info!(
                    window_ms = self.timings.clear_window.as_millis() as u64,
                    "Waterway clear, waiting before closing"
                );
                self.state.clear_since = Some(now);
                now
            }
        };
        if now.saturating_duration_since(since) >= self.timings.clear_window {
            self.enter(OperatingState::Closing, now, "waterway clear");
        }
    }

    fn start_closing_motion(&mut self, now: Instant) {
        info!("Lowering bridge");
        self.state.motion_started_at = Some(now);
        self.motor.backward();
    }

    /// Apply an override. Mode switches and stops always succeed; open and
    /// close need manual mode.
    pub fn apply(
        &mut self,
        command: OverrideCommand,
        now: Instant,
    ) -> Result<CommandOutcome, OverrideError> {
        match command {
            OverrideCommand::SetMode(mode) => {
                info!(from = %self.state.mode, to = %mode, "Mode change");
                self.state.mode = mode;
                self.enter(OperatingState::Idle, now, "mode change");
            }
            OverrideCommand::Stop => {
                self.enter(OperatingState::Idle, now, "stop requested");
            }
            OverrideCommand::Open | OverrideCommand::Close
                if self.state.mode != Mode::Manual =>
            {
                warn!(%command, state = %self.state.state, "Rejected override outside manual mode");
                return Err(OverrideError::ManualModeRequired {
                    command,
                    state: self.state.state,
                    mode: self.state.mode,
                });
            }
            OverrideCommand::Open => {
                if matches!(
                    self.state.state,
                    OperatingState::Opening | OperatingState::Open
                ) {
                    debug!(state = %self.state.state, "Open requested while already open");
                } else {
                    self.enter(OperatingState::Opening, now, "manual open");
                }
            }
            OverrideCommand::Close => {
                if self.state.state == OperatingState::Closing {
                    debug!("Close requested while already closing");
                } else {
                    self.enter(OperatingState::Closing, now, "manual close");
                    self.start_closing_motion(now);
                }
            }
        }
        Ok(CommandOutcome {
            command,
            state: self.state.state,
            mode: self.state.mode,
        })
    }

    fn enter(&mut self, next: OperatingState, now: Instant, reason: &'static str) {
        info!(from = %self.state.state, to = %next, mode = %self.state.mode, reason, "State transition");
        self.state.state = next;
        self.state.state_entered_at = now;
        self.state.clear_since = None;
        self.state.motion_started_at = None;
        self.apply_outputs(next, now);
    }

    fn apply_outputs(&mut self, state: OperatingState, now: Instant) {
        let (road, waterway) = match state {
            OperatingState::Idle => (Color::Green, Color::Red),
            OperatingState::RoadWarning => (Color::Yellow, Color::Red),
            OperatingState::WaterwayWarning
            | OperatingState::Opening
            | OperatingState::Closing => (Color::Red, Color::Red),
            OperatingState::Open => (Color::Red, Color::Green),
        };
        let flashing = matches!(
            state,
            OperatingState::WaterwayWarning | OperatingState::Opening | OperatingState::Closing
        );
        if !state.allows_motion() {
            self.motor.stop();
        }
        if !flashing {
            self.signals.stop_flash(Side::Waterway);
        }
        if let Err(err) = self.signals.set(road, waterway) {
            error!(error = %err, %state, "Refused light configuration");
        }
        if flashing {
            self.signals.flash(Side::Waterway, now);
        }
        // Lights are already showing red on both sides before the motor moves.
        if state == OperatingState::Opening {
            self.state.motion_started_at = Some(now);
            self.motor.forward();
        }
    }

    pub fn timers(&self, now: Instant) -> PhaseTimers {
        let left = |total: Duration, since: Instant| {
            total.saturating_sub(now.saturating_duration_since(since))
        };
        let entered = self.state.state_entered_at;
        let automatic = self.state.mode == Mode::Automatic;
        let mut timers = PhaseTimers::default();
        match self.state.state {
            OperatingState::RoadWarning if automatic => {
                timers.road = left(self.timings.road_warning, entered);
            }
            OperatingState::WaterwayWarning if automatic => {
                timers.waterway = left(self.timings.waterway_warning, entered);
            }
            OperatingState::Open if automatic => {
                if let Some(since) = self.state.clear_since {
                    timers.waterway = left(self.timings.clear_window, since);
                }
            }
            OperatingState::Opening => {
                timers.waterway = self.timings.rotation.saturating_sub(self.motion_elapsed(now));
            }
            OperatingState::Closing => {
                timers.waterway = match self.state.motion_started_at {
                    None => left(self.timings.waterway_warning, entered),
                    Some(started) => left(self.timings.rotation, started),
                };
            }
            _ => {}
        }
        timers
    }

    pub fn snapshot(&self, now: Instant) -> BridgeSnapshot {
        BridgeSnapshot {
            state: self.state.state,
            mode: self.state.mode,
            motor: self.motor.direction(),
            road_color: self.signals.color(Side::Road),
            waterway_color: self.signals.color(Side::Waterway),
            road_lamps: self.signals.lamps(Side::Road),
            waterway_lamps: self.signals.lamps(Side::Waterway),
            ranges: self.state.last_ranges,
            timers: self.timers(now),
        }
    }
}
