use crate::controller::{BridgeSnapshot, Mode, OperatingState};
use crate::motor::MotorDirection;
use crate::signal::{Color, LampState};
use serde::Serialize;

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct LightResponse {
    pub color: Color,
    #[serde(flatten)]
    pub lamps: LampState,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct DistancesResponse {
    pub a_cm: f32,
    pub b_cm: f32,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct StatusResponse {
    pub state: OperatingState,
    pub mode: Mode,
    pub motor: MotorDirection,
    pub road: LightResponse,
    pub waterway: LightResponse,
    pub distances: DistancesResponse,
    pub remaining_ms: u64,
    pub timestamp: String,
}

impl StatusResponse {
    pub fn from_snapshot(snapshot: &BridgeSnapshot, timestamp: String) -> Self {
        Self {
            state: snapshot.state,
            mode: snapshot.mode,
            motor: snapshot.motor,
            road: LightResponse {
                color: snapshot.road_color,
                lamps: snapshot.road_lamps,
            },
            waterway: LightResponse {
                color: snapshot.waterway_color,
                lamps: snapshot.waterway_lamps,
            },
            distances: DistancesResponse::from_snapshot(snapshot),
            remaining_ms: snapshot.timers.remaining().as_millis() as u64,
            timestamp,
        }
    }
}

impl DistancesResponse {
    pub fn from_snapshot(snapshot: &BridgeSnapshot) -> Self {
        Self {
            a_cm: snapshot.ranges.0.cm(),
            b_cm: snapshot.ranges.1.cm(),
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct StateResponse {
    pub state: OperatingState,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ModeResponse {
    pub value: Mode,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct LightsResponse {
    pub road: LightResponse,
    pub waterway: LightResponse,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct DistanceResponse {
    #[serde(flatten)]
    pub distances: DistancesResponse,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct TimersResponse {
    pub road_remaining_ms: u64,
    pub waterway_remaining_ms: u64,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct CommandAckResponse {
    pub accepted: bool,
    pub state: OperatingState,
    pub mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<CommandErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandErrorCode {
    ManualModeRequired,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ErrorResponse {
    pub error_code: ApiErrorCode,
    pub error_message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    InvalidMode,
    InternalError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn light_response_flattens_lamps() {
        let response = LightResponse {
            color: Color::Red,
            lamps: LampState {
                red: true,
                yellow: true,
                green: false,
            },
        };

        let value = serde_json::to_value(response).expect("serialize light response");
        assert_eq!(
            value,
            json!({
                "color": "red",
                "red": true,
                "yellow": true,
                "green": false
            })
        );
    }

    #[test]
    fn accepted_ack_omits_error_fields() {
        let response = CommandAckResponse {
            accepted: true,
            state: OperatingState::Opening,
            mode: Mode::Manual,
            error_code: None,
            error_message: None,
            timestamp: "2026-01-11T12:30:00Z".to_string(),
        };

        let value = serde_json::to_value(response).expect("serialize ack");
        assert_eq!(
            value,
            json!({
                "accepted": true,
                "state": "OPENING",
                "mode": "manual",
                "timestamp": "2026-01-11T12:30:00Z"
            })
        );
    }

    #[test]
    fn rejected_ack_uses_screaming_snake_case_code() {
        let response = CommandAckResponse {
            accepted: false,
            state: OperatingState::WaterwayWarning,
            mode: Mode::Automatic,
            error_code: Some(CommandErrorCode::ManualModeRequired),
            error_message: Some("Manual mode required".to_string()),
            timestamp: "2026-01-11T12:31:00Z".to_string(),
        };

        let value = serde_json::to_value(response).expect("serialize rejected ack");
        assert_eq!(
            value,
            json!({
                "accepted": false,
                "state": "WATERWAY_WARNING",
                "mode": "auto",
                "error_code": "MANUAL_MODE_REQUIRED",
                "error_message": "Manual mode required",
                "timestamp": "2026-01-11T12:31:00Z"
            })
        );
    }

    #[test]
    fn distance_response_flattens_readings() {
        let response = DistanceResponse {
            distances: DistancesResponse {
                a_cm: 42.5,
                b_cm: 400.0,
            },
            timestamp: "2026-01-11T12:32:00Z".to_string(),
        };

        let value = serde_json::to_value(response).expect("serialize distance response");
        assert_eq!(
            value,
            json!({
                "a_cm": 42.5,
                "b_cm": 400.0,
                "timestamp": "2026-01-11T12:32:00Z"
            })
        );
    }

    #[test]
    fn error_response_uses_screaming_snake_case_code() {
        let response = ErrorResponse {
            error_code: ApiErrorCode::InvalidMode,
            error_message: "invalid value".to_string(),
            timestamp: "2026-01-11T12:33:00Z".to_string(),
        };

        let value = serde_json::to_value(response).expect("serialize error response");
        assert_eq!(
            value,
            json!({
                "error_code": "INVALID_MODE",
                "error_message": "invalid value",
                "timestamp": "2026-01-11T12:33:00Z"
            })
        );
    }
}
