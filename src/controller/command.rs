use crate::controller::{Mode, OperatingState};
use std::fmt;
use thiserror::Error;

/// Requests from the override channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideCommand {
    SetMode(Mode),
    Open,
    Close,
    Stop,
}

impl fmt::Display for OverrideCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverrideCommand::SetMode(mode) => write!(f, "set_mode({mode})"),
            OverrideCommand::Open => f.write_str("open"),
            OverrideCommand::Close => f.write_str("close"),
            OverrideCommand::Stop => f.write_str("stop"),
        }
    }
}

/// Accepted command together with where it left the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutcome {
    pub command: OverrideCommand,
    pub state: OperatingState,
    pub mode: Mode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OverrideError {
    #[error("{command} requires manual mode (state {state}, mode {mode})")]
    ManualModeRequired {
        command: OverrideCommand,
        state: OperatingState,
        mode: Mode,
    },
}

impl OverrideError {
    pub fn state(&self) -> OperatingState {
        match self {
            OverrideError::ManualModeRequired { state, .. } => *state,
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            OverrideError::ManualModeRequired { mode, .. } => *mode,
        }
    }
}
