use crate::api::responses::{
    ApiErrorCode, CommandAckResponse, CommandErrorCode, DistanceResponse, DistancesResponse,
    ErrorResponse, LightResponse, LightsResponse, ModeResponse, StateResponse, StatusResponse,
    TimersResponse,
};
use crate::controller::{BridgeSnapshot, Mode, OverrideCommand};
use crate::state::{self, ApplyError, SharedController};
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Instant, SystemTime};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{error, info};

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";
const MANUAL_MODE_REQUIRED_MESSAGE: &str = "Manual mode required";

#[derive(Debug)]
enum TimestampError {
    Format(time::error::Format),
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampError::Format(err) => write!(f, "timestamp format error: {err}"),
        }
    }
}

pub enum ApiResponse<T> {
    Success(T),
    Error {
        status: StatusCode,
        body: ErrorResponse,
    },
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match self {
            ApiResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            ApiResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub enum CommandResponse {
    Ack {
        status: StatusCode,
        body: CommandAckResponse,
    },
    Error {
        status: StatusCode,
        body: ErrorResponse,
    },
}

impl IntoResponse for CommandResponse {
    fn into_response(self) -> Response {
        match self {
            CommandResponse::Ack { status, body } => (status, Json(body)).into_response(),
            CommandResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ModeParams {
    pub value: Option<String>,
}

pub async fn get_status(State(controller): State<SharedController>) -> impl IntoResponse {
    build_view_response(
        &controller,
        "/api/status",
        Instant::now(),
        SystemTime::now(),
        StatusResponse::from_snapshot,
    )
}

pub async fn get_state(State(controller): State<SharedController>) -> impl IntoResponse {
    build_view_response(
        &controller,
        "/api/state",
        Instant::now(),
        SystemTime::now(),
        |snapshot, timestamp| StateResponse {
            state: snapshot.state,
            timestamp,
        },
    )
}

pub async fn get_mode(State(controller): State<SharedController>) -> impl IntoResponse {
    build_view_response(
        &controller,
        "/api/mode",
        Instant::now(),
        SystemTime::now(),
        |snapshot, timestamp| ModeResponse {
            value: snapshot.mode,
            timestamp,
        },
    )
}

pub async fn get_lights(State(controller): State<SharedController>) -> impl IntoResponse {
    build_view_response(
        &controller,
        "/api/lights",
        Instant::now(),
        SystemTime::now(),
        lights_view,
    )
}

pub async fn get_distance(State(controller): State<SharedController>) -> impl IntoResponse {
    build_view_response(
        &controller,
        "/api/distance",
        Instant::now(),
        SystemTime::now(),
        |snapshot, timestamp| DistanceResponse {
            distances: DistancesResponse::from_snapshot(snapshot),
            timestamp,
        },
    )
}

pub async fn get_timers(State(controller): State<SharedController>) -> impl IntoResponse {
    build_view_response(
        &controller,
        "/api/timers",
        Instant::now(),
        SystemTime::now(),
        timers_view,
    )
}

pub async fn post_mode(
    State(controller): State<SharedController>,
    Query(params): Query<ModeParams>,
) -> impl IntoResponse {
    build_mode_response(&controller, params, Instant::now(), SystemTime::now())
}

pub async fn post_open(State(controller): State<SharedController>) -> impl IntoResponse {
    build_command_response(
        &controller,
        OverrideCommand::Open,
        Instant::now(),
        SystemTime::now(),
    )
}

pub async fn post_close(State(controller): State<SharedController>) -> impl IntoResponse {
    build_command_response(
        &controller,
        OverrideCommand::Close,
        Instant::now(),
        SystemTime::now(),
    )
}

pub async fn post_stop(State(controller): State<SharedController>) -> impl IntoResponse {
    build_command_response(
        &controller,
        OverrideCommand::Stop,
        Instant::now(),
        SystemTime::now(),
    )
}

fn lights_view(snapshot: &BridgeSnapshot, timestamp: String) -> LightsResponse {
    LightsResponse {
        road: LightResponse {
            color: snapshot.road_color,
            lamps: snapshot.road_lamps,
        },
        waterway: LightResponse {
            color: snapshot.waterway_color,
            lamps: snapshot.waterway_lamps,
        },
        timestamp,
    }
}

fn timers_view(snapshot: &BridgeSnapshot, timestamp: String) -> TimersResponse {
    TimersResponse {
        road_remaining_ms: snapshot.timers.road.as_millis() as u64,
        waterway_remaining_ms: snapshot.timers.waterway.as_millis() as u64,
        timestamp,
    }
}

fn build_view_response<T, F>(
    controller: &SharedController,
    endpoint: &str,
    now: Instant,
    wall: SystemTime,
    view: F,
) -> ApiResponse<T>
where
    F: FnOnce(&BridgeSnapshot, String) -> T,
{
    let snapshot = match state::snapshot(controller, now) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            return ApiResponse::Error {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: internal_error(endpoint, &err.to_string()),
            };
        }
    };
    match format_timestamp(wall) {
        Ok(timestamp) => ApiResponse::Success(view(&snapshot, timestamp)),
        Err(_) => ApiResponse::Error {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: internal_error(endpoint, "timestamp formatting failure"),
        },
    }
}

fn build_mode_response(
    controller: &SharedController,
    params: ModeParams,
    now: Instant,
    wall: SystemTime,
) -> CommandResponse {
    let Some(value) = params.value else {
        return invalid_mode_response("missing value", wall);
    };
    match value.parse::<Mode>() {
        Ok(mode) => build_command_response(controller, OverrideCommand::SetMode(mode), now, wall),
        Err(message) => invalid_mode_response(&message, wall),
    }
}

fn invalid_mode_response(message: &str, wall: SystemTime) -> CommandResponse {
    match format_timestamp(wall) {
        Ok(timestamp) => CommandResponse::Error {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse {
                error_code: ApiErrorCode::InvalidMode,
                error_message: message.to_string(),
                timestamp,
            },
        },
        Err(_) => command_internal_error("timestamp formatting failure"),
    }
}

fn build_command_response(
    controller: &SharedController,
    command: OverrideCommand,
    now: Instant,
    wall: SystemTime,
) -> CommandResponse {
    let result = state::apply(controller, command, now);
    let timestamp = match format_timestamp(wall) {
        Ok(formatted) => formatted,
        Err(_) => return command_internal_error("timestamp formatting failure"),
    };

    match result {
        Ok(outcome) => {
            info!(%command, state = %outcome.state, mode = %outcome.mode, "Override accepted");
            CommandResponse::Ack {
                status: StatusCode::OK,
                body: CommandAckResponse {
                    accepted: true,
                    state: outcome.state,
                    mode: outcome.mode,
                    error_code: None,
                    error_message: None,
                    timestamp,
                },
            }
        }
        Err(ApplyError::Rejected(rejection)) => CommandResponse::Ack {
            status: StatusCode::FORBIDDEN,
            body: CommandAckResponse {
                accepted: false,
                state: rejection.state(),
                mode: rejection.mode(),
                error_code: Some(CommandErrorCode::ManualModeRequired),
                error_message: Some(MANUAL_MODE_REQUIRED_MESSAGE.to_string()),
                timestamp,
            },
        },
        Err(ApplyError::App(err)) => command_internal_error(&err.to_string()),
    }
}

fn command_internal_error(message: &str) -> CommandResponse {
    CommandResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: internal_error("override command", message),
    }
}

fn internal_error(endpoint: &str, message: &str) -> ErrorResponse {
    error!(endpoint, message, "Internal error while handling request");
    let formatted = format_timestamp(SystemTime::now()).unwrap_or_else(|err| {
        error!(error = %err, "Failed to format internal error timestamp");
        OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    });
    ErrorResponse {
        error_code: ApiErrorCode::InternalError,
        error_message: INTERNAL_ERROR_MESSAGE.to_string(),
        timestamp: formatted,
    }
}

fn format_timestamp(timestamp: SystemTime) -> Result<String, TimestampError> {
    let datetime = OffsetDateTime::from(timestamp);
    datetime.format(&Rfc3339).map_err(TimestampError::Format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{BoardSettings, SimulatedBoard};
    use crate::controller::{BridgeController, OperatingState, Timings};
    use crate::sensor::Distance;
    use crate::signal::Color;
    use std::sync::Arc;
    use std::time::{Duration, UNIX_EPOCH};

    fn controller() -> SharedController {
        let timings = Timings::default();
        let settings = BoardSettings {
            flash_half_period: timings.flash_half_period,
            motor_duty: 0.78,
            max_range_cm: 400.0,
            echo_timeout: Duration::from_millis(30),
            pwm_frequency_hz: 1000.0,
        };
        let sim = SimulatedBoard::new(&settings);
        state::shared(BridgeController::new(
            timings,
            sim.board.signals,
            sim.board.motor,
            Instant::now(),
        ))
    }

    fn poisoned() -> SharedController {
        let shared = controller();
        let for_thread = Arc::clone(&shared);
        let _ = std::thread::spawn(move || {
            let _guard = for_thread.lock().expect("lock for poison");
            panic!("poison lock");
        })
        .join();
        shared
    }

    fn wall() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1)
    }

    #[test]
    fn status_reports_idle_baseline() {
        let shared = controller();

        let response = build_view_response(
            &shared,
            "/api/status",
            Instant::now(),
            wall(),
            StatusResponse::from_snapshot,
        );

        match response {
            ApiResponse::Success(body) => {
                assert_eq!(body.state, OperatingState::Idle);
                assert_eq!(body.mode, Mode::Automatic);
                assert_eq!(body.road.color, Color::Green);
                assert!(body.road.lamps.green);
                assert!(body.waterway.lamps.red);
                assert_eq!(body.distances.a_cm, 400.0);
                assert_eq!(body.remaining_ms, 0);
                assert_eq!(body.timestamp, "1970-01-01T00:00:01Z");
            }
            ApiResponse::Error { status, .. } => panic!("expected success, got {status}"),
        }
    }

    #[test]
    fn timers_report_road_warning_countdown() -> Result<(), Box<dyn std::error::Error>> {
        let shared = controller();
        let t0 = Instant::now();
        state::tick(&shared, t0, (Distance::from_cm(20.0, 400.0), Distance::MAX))?;

        let response = build_view_response(
            &shared,
            "/api/timers",
            t0 + Duration::from_millis(1000),
            wall(),
            timers_view,
        );

        match response {
            ApiResponse::Success(body) => {
                assert_eq!(body.road_remaining_ms, 2000);
                assert_eq!(body.waterway_remaining_ms, 0);
            }
            ApiResponse::Error { status, .. } => panic!("expected success, got {status}"),
        }
        Ok(())
    }

    #[test]
    fn view_returns_internal_error_when_lock_poisoned() {
        let shared = poisoned();

        let response = build_view_response(&shared, "/api/lights", Instant::now(), wall(), lights_view);

        match response {
            ApiResponse::Error { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body.error_code, ApiErrorCode::InternalError);
                assert_eq!(body.error_message, "Internal server error");
            }
            ApiResponse::Success(_) => panic!("expected internal error response"),
        }
    }

    #[test]
    fn open_is_rejected_in_automatic_mode() {
        let shared = controller();

        let response = build_command_response(&shared, OverrideCommand::Open, Instant::now(), wall());

        match response {
            CommandResponse::Ack { status, body } => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert!(!body.accepted);
                assert_eq!(body.state, OperatingState::Idle);
                assert_eq!(body.mode, Mode::Automatic);
                assert_eq!(body.error_code, Some(CommandErrorCode::ManualModeRequired));
            }
            CommandResponse::Error { status, .. } => panic!("expected rejection ack, got {status}"),
        }
    }

    #[test]
    fn manual_mode_then_open_is_accepted() {
        let shared = controller();
        let now = Instant::now();

        let mode = build_mode_response(
            &shared,
            ModeParams {
                value: Some("manual".to_string()),
            },
            now,
            wall(),
        );
        assert!(matches!(
            mode,
            CommandResponse::Ack {
                status: StatusCode::OK,
                ..
            }
        ));

        match build_command_response(&shared, OverrideCommand::Open, now, wall()) {
            CommandResponse::Ack { status, body } => {
                assert_eq!(status, StatusCode::OK);
                assert!(body.accepted);
                assert_eq!(body.state, OperatingState::Opening);
                assert_eq!(body.mode, Mode::Manual);
            }
            CommandResponse::Error { status, .. } => panic!("expected ack, got {status}"),
        }
    }

    #[test]
    fn stop_is_always_accepted() {
        let shared = controller();

        match build_command_response(&shared, OverrideCommand::Stop, Instant::now(), wall()) {
            CommandResponse::Ack { status, body } => {
                assert_eq!(status, StatusCode::OK);
                assert!(body.accepted);
                assert_eq!(body.state, OperatingState::Idle);
            }
            CommandResponse::Error { status, .. } => panic!("expected ack, got {status}"),
        }
    }

    #[test]
    fn invalid_or_missing_mode_is_bad_request() {
        let shared = controller();

        for value in [None, Some("sideways".to_string())] {
            let response = build_mode_response(&shared, ModeParams { value }, Instant::now(), wall());
            match response {
                CommandResponse::Error { status, body } => {
                    assert_eq!(status, StatusCode::BAD_REQUEST);
                    assert_eq!(body.error_code, ApiErrorCode::InvalidMode);
                }
                CommandResponse::Ack { .. } => panic!("expected bad request"),
            }
        }
    }

    #[test]
    fn command_returns_internal_error_when_lock_poisoned() {
        let shared = poisoned();

        let response = build_command_response(&shared, OverrideCommand::Stop, Instant::now(), wall());

        match response {
            CommandResponse::Error { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body.error_code, ApiErrorCode::InternalError);
            }
            CommandResponse::Ack { .. } => panic!("expected internal error"),
        }
    }
}
