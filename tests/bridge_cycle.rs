use bridge_control::board::{BoardSettings, SimulatedBoard};
use bridge_control::controller::{
    BridgeController, Mode, OperatingState, OverrideCommand, Timings,
};
use bridge_control::error::AppError;
use bridge_control::motor::MotorDirection;
use bridge_control::runtime::{Sampler, spawn_control_thread};
use bridge_control::signal::{Color, LampState};
use bridge_control::state::{self, ApplyError, SharedController};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

struct Harness {
    controller: SharedController,
    sampler: Sampler,
    sim: Sim,
    t0: Instant,
}

struct Sim {
    road: bridge_control::board::LampProbe,
    waterway: bridge_control::board::LampProbe,
    motor: bridge_control::board::MotorProbe,
    sensor_a: bridge_control::sensor::mock::MockRangeDriver,
    sensor_b: bridge_control::sensor::mock::MockRangeDriver,
}

fn settings(timings: &Timings) -> BoardSettings {
    BoardSettings {
        flash_half_period: timings.flash_half_period,
        motor_duty: 0.78,
        max_range_cm: 400.0,
        echo_timeout: Duration::from_millis(30),
        pwm_frequency_hz: 1000.0,
    }
}

impl Harness {
    fn new(timings: Timings, sample_interval: Duration) -> Self {
        let simulated = SimulatedBoard::new(&settings(&timings));
        let t0 = Instant::now();
        let board = simulated.board;
        let controller = state::shared(BridgeController::new(
            timings,
            board.signals,
            board.motor,
            t0,
        ));
        Self {
            controller,
            sampler: Sampler::new(board.sensors, sample_interval),
            sim: Sim {
                road: simulated.road,
                waterway: simulated.waterway,
                motor: simulated.motor,
                sensor_a: simulated.sensor_a,
                sensor_b: simulated.sensor_b,
            },
            t0,
        }
    }

    fn at(&self, ms: u64) -> Instant {
        self.t0 + Duration::from_millis(ms)
    }

    /// Tick every 50ms of simulated time from `from` up to and including `to`.
    fn run(&mut self, from: u64, to: u64) -> Result<OperatingState, AppError> {
        let mut current = OperatingState::Idle;
        for ms in (from..=to).step_by(50) {
            let now = self.at(ms);
            let ranges = self.sampler.sample(now);
            let snapshot = state::tick(&self.controller, now, ranges)?;
            assert!(
                !(self.sim.road.state().green && self.sim.waterway.state().green),
                "both sides green at {ms}ms"
            );
            if !snapshot.state.allows_motion() {
                assert!(self.sim.motor.is_stopped(), "motor moving in {}", snapshot.state);
            }
            current = snapshot.state;
        }
        Ok(current)
    }
}

#[test]
fn automatic_cycle_opens_for_boat_and_closes_after_clear_window() -> Result<(), AppError> {
    let mut harness = Harness::new(Timings::default(), Duration::from_millis(100));

    assert_eq!(harness.run(0, 500)?, OperatingState::Idle);

    harness.sim.sensor_a.set_cm(35.0);
    assert_eq!(harness.run(550, 600)?, OperatingState::RoadWarning);
    assert_eq!(harness.sim.road.state(), LampState::steady(Color::Yellow));

    // Boat leaves during the warning; the cycle still completes.
    harness.sim.sensor_a.set_cm(300.0);
    assert_eq!(harness.run(650, 3600)?, OperatingState::WaterwayWarning);
    assert!(harness.sim.waterway.red.is_high());

    assert_eq!(harness.run(3650, 6600)?, OperatingState::Opening);
    assert_eq!(
        state::snapshot(&harness.controller, harness.at(6600))?.motor,
        MotorDirection::Forward
    );

    assert_eq!(harness.run(6650, 10600)?, OperatingState::Open);
    assert_eq!(harness.sim.waterway.state(), LampState::steady(Color::Green));
    assert_eq!(harness.sim.road.state(), LampState::steady(Color::Red));

    // A second boat keeps the bridge open.
    harness.sim.sensor_b.set_cm(40.0);
    assert_eq!(harness.run(10650, 20000)?, OperatingState::Open);

    harness.sim.sensor_b.set_timeout();
    assert_eq!(harness.run(20050, 25000)?, OperatingState::Open);
    assert_eq!(harness.run(25050, 26500)?, OperatingState::Closing);
    assert!(harness.sim.motor.is_stopped());

    assert_eq!(harness.run(26550, 29500)?, OperatingState::Closing);
    assert_eq!(
        state::snapshot(&harness.controller, harness.at(29500))?.motor,
        MotorDirection::Backward
    );

    assert_eq!(harness.run(29550, 34000)?, OperatingState::Idle);
    assert_eq!(harness.sim.road.state(), LampState::steady(Color::Green));
    assert_eq!(harness.sim.waterway.state(), LampState::steady(Color::Red));
    assert!(harness.sim.motor.is_stopped());
    Ok(())
}

#[test]
fn manual_override_flow() -> Result<(), Box<dyn std::error::Error>> {
    let mut harness = Harness::new(Timings::default(), Duration::from_millis(100));

    let rejected = state::apply(&harness.controller, OverrideCommand::Open, harness.at(0));
    assert!(matches!(rejected, Err(ApplyError::Rejected(_))));

    let outcome = state::apply(
        &harness.controller,
        OverrideCommand::SetMode(Mode::Manual),
        harness.at(0),
    )?;
    assert_eq!(outcome.mode, Mode::Manual);

    // Sensors are ignored in manual mode.
    harness.sim.sensor_a.set_cm(5.0);
    assert_eq!(harness.run(50, 5000)?, OperatingState::Idle);

    let outcome = state::apply(&harness.controller, OverrideCommand::Open, harness.at(5000))?;
    assert_eq!(outcome.state, OperatingState::Opening);
    assert_eq!(harness.run(5050, 8950)?, OperatingState::Opening);
    assert_eq!(harness.run(9000, 30000)?, OperatingState::Open);

    state::apply(&harness.controller, OverrideCommand::Close, harness.at(30000))?;
    assert_eq!(harness.run(30050, 33950)?, OperatingState::Closing);
    assert_eq!(harness.run(34000, 34000)?, OperatingState::Idle);

    state::apply(
        &harness.controller,
        OverrideCommand::SetMode(Mode::Automatic),
        harness.at(35000),
    )?;
    assert_eq!(harness.run(35050, 35100)?, OperatingState::RoadWarning);

    let outcome = state::apply(&harness.controller, OverrideCommand::Stop, harness.at(35200))?;
    assert_eq!(outcome.state, OperatingState::Idle);
    assert_eq!(outcome.mode, Mode::Automatic);
    assert_eq!(harness.sim.road.state(), LampState::steady(Color::Green));
    Ok(())
}

#[test]
fn control_thread_reacts_to_boat_and_stops_on_flag() -> Result<(), AppError> {
    let timings = Timings {
        road_warning: Duration::from_secs(60),
        ..Timings::default()
    };
    let harness = Harness::new(timings, Duration::from_millis(5));
    let stop = Arc::new(AtomicBool::new(false));
    let handle = spawn_control_thread(
        harness.sampler,
        Arc::clone(&harness.controller),
        Duration::from_millis(5),
        Arc::clone(&stop),
    );

    harness.sim.sensor_b.set_cm(20.0);
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut observed = OperatingState::Idle;
    while Instant::now() < deadline {
        observed = state::snapshot(&harness.controller, Instant::now())?.state;
        if observed != OperatingState::Idle {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    stop.store(true, Ordering::Relaxed);
    assert!(handle.join().is_ok());
    assert_eq!(observed, OperatingState::RoadWarning);
    Ok(())
}
