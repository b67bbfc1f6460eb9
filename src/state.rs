//! The single synchronization boundary around the controller.
//!
//! The control thread and the HTTP handlers both take this lock for exactly
//! one evaluation (a tick, an override or a snapshot) and never hold it across
//! sensor I/O.

use crate::controller::{
    BridgeController, BridgeSnapshot, CommandOutcome, OverrideCommand, OverrideError,
};
use crate::error::AppError;
use crate::sensor::Distance;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use thiserror::Error;

pub type SharedController = Arc<Mutex<BridgeController>>;

pub fn shared(controller: BridgeController) -> SharedController {
    Arc::new(Mutex::new(controller))
}

pub fn lock(controller: &SharedController) -> Result<MutexGuard<'_, BridgeController>, AppError> {
    controller.lock().map_err(|_| AppError::StateLock)
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Rejected(#[from] OverrideError),
    #[error(transparent)]
    App(#[from] AppError),
}

/// Run one tick under the lock and return the resulting snapshot.
pub fn tick(
    controller: &SharedController,
    now: Instant,
    ranges: (Distance, Distance),
) -> Result<BridgeSnapshot, AppError> {
    let mut guard = lock(controller)?;
    guard.tick(now, ranges.0, ranges.1);
    Ok(guard.snapshot(now))
}

pub fn apply(
    controller: &SharedController,
    command: OverrideCommand,
    now: Instant,
) -> Result<CommandOutcome, ApplyError> {
    let mut guard = lock(controller)?;
    Ok(guard.apply(command, now)?)
}

pub fn snapshot(controller: &SharedController, now: Instant) -> Result<BridgeSnapshot, AppError> {
    let guard = lock(controller)?;
    Ok(guard.snapshot(now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{BoardSettings, SimulatedBoard};
    use crate::controller::{Mode, OperatingState, Timings};
    use std::time::Duration;

    fn controller() -> SharedController {
        let settings = BoardSettings {
            flash_half_period: Duration::from_millis(500),
            motor_duty: 0.78,
            max_range_cm: 400.0,
            echo_timeout: Duration::from_millis(30),
            pwm_frequency_hz: 1000.0,
        };
        let sim = SimulatedBoard::new(&settings);
        shared(BridgeController::new(
            Timings::default(),
            sim.board.signals,
            sim.board.motor,
            Instant::now(),
        ))
    }

    #[test]
    fn override_is_visible_to_next_tick() -> Result<(), Box<dyn std::error::Error>> {
        let shared = controller();
        let now = Instant::now();

        apply(&shared, OverrideCommand::SetMode(Mode::Manual), now)?;
        let snapshot = tick(&shared, now, (Distance::from_cm(10.0, 400.0), Distance::MAX))?;

        assert_eq!(snapshot.mode, Mode::Manual);
        assert_eq!(snapshot.state, OperatingState::Idle);
        Ok(())
    }

    #[test]
    fn rejected_override_is_reported() {
        let shared = controller();

        let result = apply(&shared, OverrideCommand::Open, Instant::now());

        assert!(matches!(result, Err(ApplyError::Rejected(_))));
    }

    #[test]
    fn poisoned_lock_maps_to_state_lock_error() {
        let shared = controller();
        let for_thread = Arc::clone(&shared);
        let _ = std::thread::spawn(move || {
            let _guard = for_thread.lock().expect("lock for poison");
            panic!("poison lock");
        })
        .join();

        let result = snapshot(&shared, Instant::now());

        assert!(matches!(result, Err(AppError::StateLock)));
    }
}
