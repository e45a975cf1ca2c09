//! Status and mode enums for stream tasks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Lifecycle status of a stream task as tracked by the client.
///
/// `Idle -> Running -> Stopped`; `Stopped` is terminal for a task id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Task known locally but not yet streaming.
    #[default]
    Idle,
    /// Task is streaming on the backend.
    Running,
    /// Task was stopped or interrupted.
    Stopped,
}

impl TaskStatus {
    /// Returns true if the status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Whether moving from `self` to `next` is allowed.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running) | (Self::Idle, Self::Stopped) | (Self::Running, Self::Stopped)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "IDLE",
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
        };
        f.write_str(s)
    }
}

/// Output layout requested when creating a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum OutputMode {
    /// Large picture, used by the web client.
    Large,
    /// Small picture, used by mobile clients.
    #[default]
    Small,
}

impl OutputMode {
    /// Wire value of the `OutputMode` field.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Large => 1,
            Self::Small => 2,
        }
    }
}

impl From<OutputMode> for u8 {
    fn from(mode: OutputMode) -> Self {
        mode.as_u8()
    }
}

impl TryFrom<u8> for OutputMode {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Large),
            2 => Ok(Self::Small),
            other => Err(CoreError::InvalidInput(format!("unknown output mode {}", other))),
        }
    }
}

impl FromStr for OutputMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "large" => Ok(Self::Large),
            "small" => Ok(Self::Small),
            other => Err(CoreError::InvalidInput(format!("unknown output mode '{}'", other))),
        }
    }
}

/// How a running task is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveType {
    /// Server-side text to speech.
    Text,
    /// Pre-recorded audio.
    Audio,
    /// Streamed TTS over a websocket.
    WsTts,
}

impl DriveType {
    /// All drive types, in display order.
    pub const ALL: [DriveType; 3] = [Self::Text, Self::Audio, Self::WsTts];
}

impl fmt::Display for DriveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Text => "text",
            Self::Audio => "audio",
            Self::WsTts => "ws-tts",
        };
        f.write_str(s)
    }
}

impl FromStr for DriveType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "audio" => Ok(Self::Audio),
            "ws-tts" | "ws_tts" | "wstts" => Ok(Self::WsTts),
            other => Err(CoreError::InvalidInput(format!("unknown drive type '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        assert!(TaskStatus::Idle.can_transition_to(TaskStatus::Running));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Stopped));
        assert!(TaskStatus::Idle.can_transition_to(TaskStatus::Stopped));
        assert!(!TaskStatus::Stopped.can_transition_to(TaskStatus::Running));
        assert!(!TaskStatus::Running.can_transition_to(TaskStatus::Idle));
        assert!(!TaskStatus::Stopped.can_transition_to(TaskStatus::Stopped));
    }

    #[test]
    fn test_output_mode_wire_value() {
        assert_eq!(serde_json::to_string(&OutputMode::Small).unwrap(), "2");
        let mode: OutputMode = serde_json::from_str("1").unwrap();
        assert_eq!(mode, OutputMode::Large);
        assert!(serde_json::from_str::<OutputMode>("7").is_err());
    }

    #[test]
    fn test_drive_type_parse() {
        assert_eq!("ws-tts".parse::<DriveType>().unwrap(), DriveType::WsTts);
        assert_eq!("TEXT".parse::<DriveType>().unwrap(), DriveType::Text);
        assert!("video".parse::<DriveType>().is_err());
    }
}
