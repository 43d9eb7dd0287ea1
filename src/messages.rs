// Message types exchanged with the runtime over zenoh, all JSON

use serde::{Deserialize, Serialize};

use crate::arm::{ArmPosition, ArmTelemetry};
use crate::drive::DriveTelemetry;
use crate::drive::path_follower::TrajectorySetpoint;
use crate::geometry::Pose2d;
use crate::intake::{IntakeMode, IntakeTelemetry};

// Teleop/scripts -> runtime, drive subsystem
// e.g. {"type":"velocity","vx":1.0,"vy":0.0,"omega":0.5,"field_relative":true}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DriveCommand {
    /// m/s and rad/s; robot-relative unless `field_relative`
    Velocity {
        vx: f64,
        vy: f64,
        omega: f64,
        #[serde(default)]
        field_relative: bool,
    },
    Stop,
    StopWithX,
    Characterize {
        volts: f64,
    },
    DriveRamp {
        module: usize,
        volts: f64,
    },
    TurnRamp {
        module: usize,
        volts: f64,
    },
    ResetPose {
        pose: Pose2d,
    },
    ResetHeading,
    BrakeMode {
        enabled: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArmCommand {
    Manual { input: f64 },
    GoTo { position: ArmPosition },
    Target { angle: f64 },
    Hold,
    Extend,
    Retract,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntakeCommand {
    pub mode: IntakeMode,
}

// Path planner -> runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PathCommand {
    Start { pose: Pose2d },
    Follow { setpoint: TrajectorySetpoint },
    Finish,
}

// Driver station heartbeat; the robot stays enabled only while these keep arriving
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DriverStationPacket {
    pub enabled: bool,
    #[serde(default)]
    pub red_alliance: bool,
}

// Runtime -> dashboards/loggers, once per cycle
#[derive(Debug, Clone, Serialize)]
pub struct RobotTelemetry {
    pub enabled: bool,
    pub drive: DriveTelemetry,
    pub arm: ArmTelemetry,
    pub intake: IntakeTelemetry,
    pub path_target: Option<Pose2d>,
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    Disabled,
    DsStale,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn velocity_defaults_to_robot_relative() {
        let cmd: DriveCommand =
            serde_json::from_str(r#"{"type":"velocity","vx":1.0,"vy":-0.5,"omega":0.25}"#)
                .unwrap();
        assert_eq!(
            cmd,
            DriveCommand::Velocity {
                vx: 1.0,
                vy: -0.5,
                omega: 0.25,
                field_relative: false
            }
        );
    }

    #[test]
    fn unit_commands_parse() {
        let cmd: DriveCommand = serde_json::from_str(r#"{"type":"stop_with_x"}"#).unwrap();
        assert_eq!(cmd, DriveCommand::StopWithX);

        let cmd: ArmCommand =
            serde_json::from_str(r#"{"type":"go_to","position":"amp"}"#).unwrap();
        assert_eq!(
            cmd,
            ArmCommand::GoTo {
                position: ArmPosition::Amp
            }
        );

        let cmd: IntakeCommand = serde_json::from_str(r#"{"mode":"intaking"}"#).unwrap();
        assert_eq!(cmd.mode, IntakeMode::Intaking);
    }

    #[test]
    fn path_setpoint_velocity_is_optional() {
        let json = r#"{
            "type": "follow",
            "setpoint": { "pose": { "translation": { "x": 1.0, "y": 2.0 }, "rotation": 0.5 } }
        }"#;
        let cmd: PathCommand = serde_json::from_str(json).unwrap();
        match cmd {
            PathCommand::Follow { setpoint } => {
                assert_eq!(setpoint.pose.x(), 1.0);
                assert!(setpoint.velocity.is_zero());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ds_packet_alliance_defaults_to_blue() {
        let packet: DriverStationPacket = serde_json::from_str(r#"{"enabled":true}"#).unwrap();
        assert!(packet.enabled);
        assert!(!packet.red_alliance);
    }

    #[test]
    fn health_is_snake_case() {
        assert_eq!(
            serde_json::to_string(&RuntimeHealth::DsStale).unwrap(),
            r#""ds_stale""#
        );
    }

    #[test]
    fn malformed_command_is_rejected() {
        assert!(serde_json::from_str::<DriveCommand>(r#"{"type":"warp","speed":9}"#).is_err());
    }
}
