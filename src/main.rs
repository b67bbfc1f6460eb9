use bridge_control::controller::BridgeController;
use bridge_control::runtime::{Sampler, spawn_control_thread};
use bridge_control::{api, board, config, state};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::Level;

fn parse_level(level: &str) -> Option<Level> {
    level.trim().parse::<Level>().ok()
}

fn init_tracing(level: &str) {
    let max_level = parse_level(level).unwrap_or(Level::INFO);
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(max_level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
    if parse_level(level).is_none() {
        tracing::warn!(level, "Unknown log level, using info");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_default()?;
    init_tracing(config.log_level());
    tracing::info!(
        config_path = config::DEFAULT_CONFIG_PATH,
        simulated = config.simulated(),
        "bridge-control starting"
    );

    // Lamps and motor must be configured before the first tick; a failure here
    // exits so the supervisor restarts us.
    let hardware = board::from_config(&config).inspect_err(|err| {
        tracing::error!(error = %err, "Hardware bring-up failed");
    })?;
    let _status_led = hardware.status_led;

    let controller = state::shared(BridgeController::new(
        config.timings(),
        hardware.signals,
        hardware.motor,
        Instant::now(),
    ));

    let stop_flag = Arc::new(AtomicBool::new(false));
    let sampler = Sampler::new(hardware.sensors, config.sample_interval());
    let control_handle = spawn_control_thread(
        sampler,
        Arc::clone(&controller),
        config.tick_interval(),
        Arc::clone(&stop_flag),
    );

    let app = api::router(Arc::clone(&controller));
    let port = config.server_port();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    let served = axum::serve(listener, app).await;

    stop_flag.store(true, Ordering::Relaxed);
    if control_handle.join().is_err() {
        tracing::error!("Control thread panicked");
    }

    served?;
    Ok(())
}
