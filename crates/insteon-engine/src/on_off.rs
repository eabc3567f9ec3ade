//! On/off modes and manual-change directions.

use std::fmt;
use std::str::FromStr;

use insteon_message::{CMD_START_MANUAL_CHANGE, CMD_STOP_MANUAL_CHANGE};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// How a level change is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// The device's configured ramp rate.
    #[default]
    Normal,
    /// Fast on/off.
    Fast,
    /// Immediate change.
    Instant,
    /// Explicit transition time.
    Ramp,
}

impl Mode {
    /// All modes, in a fixed order.
    pub const ALL: [Mode; 4] = [Mode::Normal, Mode::Fast, Mode::Instant, Mode::Ramp];

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Normal => "normal",
            Mode::Fast => "fast",
            Mode::Instant => "instant",
            Mode::Ramp => "ramp",
        }
    }

    /// Mode selected by the legacy boolean flags. Fast wins over instant.
    pub fn from_flags(fast: Option<bool>, instant: Option<bool>) -> Option<Mode> {
        if fast == Some(true) {
            Some(Mode::Fast)
        } else if instant == Some(true) {
            Some(Mode::Instant)
        } else {
            None
        }
    }

    /// Effective mode: an explicit mode, else the legacy flags, else normal.
    pub fn resolve(mode: Option<Mode>, fast: Option<bool>, instant: Option<bool>) -> Mode {
        mode.or_else(|| Mode::from_flags(fast, instant))
            .unwrap_or_default()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Mode::Normal),
            "fast" => Ok(Mode::Fast),
            "instant" => Ok(Mode::Instant),
            "ramp" => Ok(Mode::Ramp),
            other => Err(EngineError::configuration(format!("unknown mode '{other}'"))),
        }
    }
}

/// Direction of a manual (button held) level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Manual {
    /// Brightening.
    Up,
    /// Dimming.
    Down,
    /// Button released.
    Stop,
}

impl Manual {
    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Manual::Up => "up",
            Manual::Down => "down",
            Manual::Stop => "stop",
        }
    }

    /// Signed encoding: up 1, stop 0, down -1.
    pub fn as_int(self) -> i8 {
        match self {
            Manual::Up => 1,
            Manual::Stop => 0,
            Manual::Down => -1,
        }
    }

    /// OpenHAB rollershutter encoding: down 0, stop 1, up 2.
    pub fn as_openhab(self) -> u8 {
        match self {
            Manual::Down => 0,
            Manual::Stop => 1,
            Manual::Up => 2,
        }
    }

    /// Decode from a start/stop manual-change command.
    pub fn from_command(cmd1: u8, cmd2: u8) -> Option<Manual> {
        match (cmd1, cmd2) {
            (CMD_START_MANUAL_CHANGE, 0x00) => Some(Manual::Down),
            (CMD_START_MANUAL_CHANGE, 0x01) => Some(Manual::Up),
            (CMD_STOP_MANUAL_CHANGE, _) => Some(Manual::Stop),
            _ => None,
        }
    }
}

impl fmt::Display for Manual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Manual {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Manual::Up),
            "down" => Ok(Manual::Down),
            "stop" => Ok(Manual::Stop),
            other => Err(EngineError::configuration(format!("unknown manual change '{other}'"))),
        }
    }
}
