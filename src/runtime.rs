use crate::controller::BridgeSnapshot;
use crate::error::AppError;
use crate::sensor::{Distance, SensorPair};
use crate::state::{self, SharedController};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const STOP_POLL_STEP: Duration = Duration::from_millis(10);

/// Samples both sensors no more often than `interval`, reusing the previous
/// pair in between.
pub struct Sampler {
    sensors: SensorPair,
    interval: Duration,
    last_sample: Option<Instant>,
    last: (Distance, Distance),
}

impl Sampler {
    pub fn new(sensors: SensorPair, interval: Duration) -> Self {
        let last = (sensors.a.max_distance(), sensors.b.max_distance());
        Self {
            sensors,
            interval,
            last_sample: None,
            last,
        }
    }

    pub fn sample(&mut self, now: Instant) -> (Distance, Distance) {
        let due = self
            .last_sample
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval);
        if due {
            self.last = self.sensors.measure();
            self.last_sample = Some(now);
            debug!(distance_a = %self.last.0, distance_b = %self.last.1, "Sensors sampled");
        }
        self.last
    }
}

/// Sample (outside the lock), then evaluate one tick under it.
pub fn run_tick(
    sampler: &mut Sampler,
    controller: &SharedController,
) -> Result<BridgeSnapshot, AppError> {
    let ranges = sampler.sample(Instant::now());
    state::tick(controller, Instant::now(), ranges)
}

pub fn spawn_control_thread(
    mut sampler: Sampler,
    controller: SharedController,
    tick_interval: Duration,
    stop: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        info!(
            tick_ms = tick_interval.as_millis() as u64,
            "Control loop started"
        );
        while !stop.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();

            if let Err(err) = run_tick(&mut sampler, &controller) {
                warn!(error = %err, "Control tick failed");
            }

            sleep_with_stop(tick_interval, &stop, cycle_start);
        }
        info!("Control loop stopped");
    })
}

fn sleep_with_stop(duration: Duration, stop: &AtomicBool, start: Instant) {
    loop {
        let elapsed = start.elapsed();
        if elapsed >= duration || stop.load(Ordering::Relaxed) {
            return;
        }
        std::thread::sleep((duration - elapsed).min(STOP_POLL_STEP));
    }
}
