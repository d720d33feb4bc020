// Wire types for the command boundary

use serde::{Deserialize, Serialize};

use crate::motor::Movement;

/// Command from teleop/scripts -> runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DriveCommand {
    /// Run one catalog movement to completion.
    Move { movement: Movement },
    /// One teleop input sample; axes in [-1, 1].
    Teleop { x: f32, y: f32, r: f32 },
    /// Force every motor to a stop and latch the ramp-abort flag.
    EmergencyStop,
    /// Clear the latch once the robot has settled.
    ResetEmergencyStop,
    /// Shut the runtime down.
    Quit,
}

/// Health status published by the runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
    EmergencyStopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_json_shapes() {
        let cmd: DriveCommand =
            serde_json::from_str(r#"{"type":"move","movement":"strafe_left"}"#).unwrap();
        match cmd {
            DriveCommand::Move { movement } => assert_eq!(movement, Movement::StrafeLeft),
            other => panic!("unexpected command: {other:?}"),
        }

        let cmd: DriveCommand =
            serde_json::from_str(r#"{"type":"teleop","x":0.5,"y":-1.0,"r":0.0}"#).unwrap();
        match cmd {
            DriveCommand::Teleop { x, y, r } => {
                assert_eq!((x, y, r), (0.5, -1.0, 0.0));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cmd: DriveCommand = serde_json::from_str(r#"{"type":"emergency_stop"}"#).unwrap();
        assert!(matches!(cmd, DriveCommand::EmergencyStop));
    }

    #[test]
    fn test_health_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&RuntimeHealth::CmdStale).unwrap(),
            r#""cmd_stale""#
        );
    }
}
