// Whole robot: the drive, arm and intake stepped together once per cycle,
// plus routing of incoming commands to the right subsystem

use tracing::{info, warn};

use crate::arm::Arm;
use crate::config::{ConfigError, RobotConfig};
use crate::drive::Drive;
use crate::drive::path_follower::{FollowerConfig, PathFollower};
use crate::geometry::ChassisSpeeds;
use crate::intake::NoteIntake;
use crate::messages::{ArmCommand, DriveCommand, IntakeCommand, PathCommand, RobotTelemetry};

pub struct Robot {
    drive: Drive,
    arm: Arm,
    intake: NoteIntake,
    follower: PathFollower,
    enabled: bool,
}

impl Robot {
    pub fn new(drive: Drive, arm: Arm, intake: NoteIntake, follower: PathFollower) -> Self {
        Self {
            drive,
            arm,
            intake,
            follower,
            enabled: false,
        }
    }

    /// Every subsystem on simulated hardware
    pub fn simulated(config: &RobotConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let period = config.drive.loop_period_secs;

        let drive = Drive::simulated(config.drive.clone())?;
        let arm = Arm::simulated(config.arm.clone(), period);
        let intake = NoteIntake::simulated(config.intake.clone(), period);
        let follower = PathFollower::new(&FollowerConfig::default(), period);
        Ok(Self::new(drive, arm, intake, follower))
    }

    pub fn on_drive_command(&mut self, cmd: DriveCommand) {
        match cmd {
            DriveCommand::Velocity {
                vx,
                vy,
                omega,
                field_relative,
            } => {
                let speeds = if field_relative {
                    ChassisSpeeds::from_field_relative(vx, vy, omega, self.drive.rotation())
                } else {
                    ChassisSpeeds::new(vx, vy, omega)
                };
                self.drive.run_velocity(speeds);
            }
            DriveCommand::Stop => self.drive.stop(),
            DriveCommand::StopWithX => self.drive.stop_with_x(),
            DriveCommand::Characterize { volts } => self.drive.run_characterization_volts(volts),
            DriveCommand::DriveRamp { module, volts } => {
                self.drive.run_drive_ramp_volts(module, volts)
            }
            DriveCommand::TurnRamp { module, volts } => {
                self.drive.run_turn_ramp_volts(module, volts)
            }
            DriveCommand::ResetPose { pose } => self.drive.set_pose(pose),
            DriveCommand::ResetHeading => self.drive.reset_field_heading(),
            DriveCommand::BrakeMode { enabled } => {
                self.drive.set_brake_mode(enabled);
                self.intake.set_brake_mode(enabled);
            }
        }
    }

    pub fn on_arm_command(&mut self, cmd: ArmCommand) {
        match cmd {
            ArmCommand::Manual { input } => self.arm.set_manual(input),
            ArmCommand::GoTo { position } => self.arm.go_to(position),
            ArmCommand::Target { angle } => self.arm.set_target_position(angle),
            ArmCommand::Hold => self.arm.set_target_to_current(),
            ArmCommand::Extend => self.arm.set_extended(),
            ArmCommand::Retract => self.arm.set_retracted(),
        }
    }

    pub fn on_intake_command(&mut self, cmd: IntakeCommand) {
        self.intake.set_mode(cmd.mode);
    }

    pub fn on_path_command(&mut self, cmd: PathCommand) {
        match cmd {
            PathCommand::Start { pose } => self.follower.start(&mut self.drive, pose),
            PathCommand::Follow { setpoint } => {
                if self.follower.target().is_none() {
                    warn!("Path setpoint received before start, following anyway");
                }
                self.follower.follow(&mut self.drive, &setpoint);
            }
            PathCommand::Finish => self.follower.finish(&mut self.drive),
        }
    }

    /// Alliance only affects path mirroring
    pub fn set_red_alliance(&mut self, red: bool) {
        self.follower.set_mirror_for_red(red);
    }

    /// Run one control cycle of every subsystem
    pub fn periodic(&mut self, enabled: bool) -> RobotTelemetry {
        if enabled != self.enabled {
            info!("Robot {}", if enabled { "enabled" } else { "disabled" });
            self.enabled = enabled;
        }

        RobotTelemetry {
            enabled,
            drive: self.drive.periodic(enabled),
            arm: self.arm.periodic(enabled),
            intake: self.intake.periodic(enabled),
            path_target: self.follower.target(),
        }
    }

    pub fn drive(&self) -> &Drive {
        &self.drive
    }

    pub fn intake(&self) -> &NoteIntake {
        &self.intake
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm::{ArmMode, ArmPosition};
    use crate::drive::path_follower::TrajectorySetpoint;
    use crate::geometry::{Pose2d, Rotation2d};
    use crate::intake::IntakeMode;

    fn robot() -> Robot {
        Robot::simulated(&RobotConfig::default()).unwrap()
    }

    #[test]
    fn invalid_config_is_fatal() {
        let mut config = RobotConfig::default();
        config.drive.wheel_radius = -1.0;
        assert!(Robot::simulated(&config).is_err());
    }

    #[test]
    fn disabled_cycle_reports_no_setpoints() {
        let mut robot = robot();
        robot.on_drive_command(DriveCommand::Velocity {
            vx: 1.0,
            vy: 0.0,
            omega: 0.0,
            field_relative: false,
        });
        let telemetry = robot.periodic(false);
        assert!(!telemetry.enabled);
        assert!(telemetry.drive.setpoints.is_empty());
    }

    #[test]
    fn field_relative_command_uses_heading() {
        let mut robot = robot();
        robot.on_drive_command(DriveCommand::ResetPose {
            pose: Pose2d::new(0.0, 0.0, Rotation2d::from_degrees(90.0)),
        });
        robot.on_drive_command(DriveCommand::Velocity {
            vx: 1.0,
            vy: 0.0,
            omega: 0.0,
            field_relative: true,
        });

        let setpoint = robot.drive().setpoint();
        assert!(setpoint.vx.abs() < 1e-9);
        assert!((setpoint.vy + 1.0).abs() < 1e-9);
    }

    #[test]
    fn commands_reach_subsystems() {
        let mut robot = robot();
        robot.on_arm_command(ArmCommand::GoTo {
            position: ArmPosition::Drive,
        });
        robot.on_intake_command(IntakeCommand {
            mode: IntakeMode::Intaking,
        });
        let telemetry = robot.periodic(true);

        assert!(matches!(telemetry.arm.mode, ArmMode::GoToPosition { .. }));
        assert_eq!(telemetry.intake.mode, IntakeMode::Intaking);
        assert_eq!(robot.intake().mode(), IntakeMode::Intaking);
    }

    #[test]
    fn path_commands_drive_the_follower() {
        let mut robot = robot();
        robot.set_red_alliance(false);
        robot.on_path_command(PathCommand::Start {
            pose: Pose2d::new(2.0, 3.0, Rotation2d::ZERO),
        });
        assert_eq!(robot.drive().pose(), Pose2d::new(2.0, 3.0, Rotation2d::ZERO));

        robot.on_path_command(PathCommand::Follow {
            setpoint: TrajectorySetpoint {
                pose: Pose2d::new(2.0, 3.0, Rotation2d::ZERO),
                velocity: ChassisSpeeds::new(0.5, 0.0, 0.0),
            },
        });
        let telemetry = robot.periodic(true);
        assert!(telemetry.path_target.is_some());
        assert!((robot.drive().setpoint().vx - 0.5).abs() < 1e-9);

        robot.on_path_command(PathCommand::Finish);
        assert!(robot.drive().setpoint().is_zero());
    }
}
