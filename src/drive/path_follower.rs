// Bridge between the drive and an external trajectory generator
//
// The generator decides where the robot should be each cycle; this module
// only corrects toward that target and hands robot-relative speeds to the
// drive's velocity sink.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::Drive;
use crate::config::FIELD_LENGTH_METERS;
use crate::control::{PidController, PidGains};
use crate::geometry::{ChassisSpeeds, Pose2d, Rotation2d};

/// What a path follower needs from a holonomic drivetrain
pub trait HolonomicDrive {
    fn pose(&self) -> Pose2d;

    /// Hard override of the pose estimate
    fn reset_pose(&mut self, pose: Pose2d);

    /// Measured robot-relative velocity
    fn robot_relative_speeds(&self) -> ChassisSpeeds;

    /// Velocity sink, consumed on the drive's next cycle
    fn drive_robot_relative(&mut self, speeds: ChassisSpeeds);
}

impl HolonomicDrive for Drive {
    fn pose(&self) -> Pose2d {
        Drive::pose(self)
    }

    fn reset_pose(&mut self, pose: Pose2d) {
        self.set_pose(pose);
    }

    fn robot_relative_speeds(&self) -> ChassisSpeeds {
        self.chassis_speeds()
    }

    fn drive_robot_relative(&mut self, speeds: ChassisSpeeds) {
        self.run_velocity(speeds);
    }
}

/// One sample of an externally generated trajectory, in blue-alliance field
/// coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrajectorySetpoint {
    pub pose: Pose2d,
    /// Field-relative feed-forward velocity
    #[serde(default)]
    pub velocity: ChassisSpeeds,
}

impl TrajectorySetpoint {
    /// The same setpoint seen from the red alliance side of the field
    pub fn mirrored(&self, field_length: f64) -> Self {
        let pose = Pose2d::new(
            field_length - self.pose.x(),
            self.pose.y(),
            Rotation2d::new(PI - self.pose.rotation().radians()),
        );
        let velocity =
            ChassisSpeeds::new(-self.velocity.vx, self.velocity.vy, -self.velocity.omega);
        Self { pose, velocity }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowerConfig {
    /// Field x/y correction, m/s per meter of error
    pub translation: PidGains,
    /// Heading correction, rad/s per radian of error
    pub rotation: PidGains,
    pub field_length: f64,
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self {
            translation: PidGains::proportional(5.0),
            rotation: PidGains::proportional(5.0),
            field_length: FIELD_LENGTH_METERS,
        }
    }
}

pub struct PathFollower {
    x_controller: PidController,
    y_controller: PidController,
    rotation_controller: PidController,
    field_length: f64,
    mirror_for_red: bool,
    target: Option<Pose2d>,
}

impl PathFollower {
    pub fn new(config: &FollowerConfig, period: f64) -> Self {
        let mut rotation_controller = PidController::new(config.rotation, period);
        rotation_controller.enable_continuous_input(-PI, PI);

        Self {
            x_controller: PidController::new(config.translation, period),
            y_controller: PidController::new(config.translation, period),
            rotation_controller,
            field_length: config.field_length,
            mirror_for_red: false,
            target: None,
        }
    }

    /// Whether incoming setpoints are mirrored onto the red half of the field
    pub fn set_mirror_for_red(&mut self, mirror: bool) {
        if mirror != self.mirror_for_red {
            info!("Path mirroring for red alliance: {}", mirror);
        }
        self.mirror_for_red = mirror;
    }

    fn alliance_relative(&self, setpoint: &TrajectorySetpoint) -> TrajectorySetpoint {
        if self.mirror_for_red {
            setpoint.mirrored(self.field_length)
        } else {
            *setpoint
        }
    }

    /// Begin a path: the drive's pose is reset to the path's start
    pub fn start<D: HolonomicDrive>(&mut self, drive: &mut D, start: Pose2d) {
        let start = self
            .alliance_relative(&TrajectorySetpoint {
                pose: start,
                velocity: ChassisSpeeds::default(),
            })
            .pose;

        self.x_controller.reset();
        self.y_controller.reset();
        self.rotation_controller.reset();
        drive.reset_pose(start);
        self.target = Some(start);
    }

    /// Correct toward `setpoint` and send the result to the drive
    ///
    /// Returns the robot-relative speeds written to the velocity sink.
    pub fn follow<D: HolonomicDrive>(
        &mut self,
        drive: &mut D,
        setpoint: &TrajectorySetpoint,
    ) -> ChassisSpeeds {
        let target = self.alliance_relative(setpoint);
        let pose = drive.pose();

        let vx = target.velocity.vx + self.x_controller.calculate(pose.x(), target.pose.x());
        let vy = target.velocity.vy + self.y_controller.calculate(pose.y(), target.pose.y());
        let omega = target.velocity.omega
            + self
                .rotation_controller
                .calculate(pose.rotation().radians(), target.pose.rotation().radians());

        let speeds = ChassisSpeeds::from_field_relative(vx, vy, omega, pose.rotation());
        drive.drive_robot_relative(speeds);
        self.target = Some(target.pose);
        speeds
    }

    /// End the path and stop the drive
    pub fn finish<D: HolonomicDrive>(&mut self, drive: &mut D) {
        drive.drive_robot_relative(ChassisSpeeds::default());
        self.target = None;
    }

    /// Pose currently being tracked, already mirrored if applicable
    pub fn target(&self) -> Option<Pose2d> {
        self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriveConfig;

    #[derive(Default)]
    struct FakeDrive {
        pose: Pose2d,
        commanded: Option<ChassisSpeeds>,
    }

    impl HolonomicDrive for FakeDrive {
        fn pose(&self) -> Pose2d {
            self.pose
        }

        fn reset_pose(&mut self, pose: Pose2d) {
            self.pose = pose;
        }

        fn robot_relative_speeds(&self) -> ChassisSpeeds {
            ChassisSpeeds::default()
        }

        fn drive_robot_relative(&mut self, speeds: ChassisSpeeds) {
            self.commanded = Some(speeds);
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn on_target_passes_feedforward_through() {
        let mut drive = FakeDrive::default();
        let mut follower = PathFollower::new(&FollowerConfig::default(), 0.02);
        let setpoint = TrajectorySetpoint {
            pose: Pose2d::default(),
            velocity: ChassisSpeeds::new(1.5, -0.5, 0.2),
        };

        let speeds = follower.follow(&mut drive, &setpoint);
        assert_eq!(drive.commanded, Some(speeds));
        assert_close(speeds.vx, 1.5);
        assert_close(speeds.vy, -0.5);
        assert_close(speeds.omega, 0.2);
    }

    #[test]
    fn lagging_behind_adds_correction_in_robot_frame() {
        let mut drive = FakeDrive {
            pose: Pose2d::new(0.0, 0.0, Rotation2d::from_degrees(90.0)),
            ..FakeDrive::default()
        };
        let mut follower = PathFollower::new(&FollowerConfig::default(), 0.02);
        let setpoint = TrajectorySetpoint {
            pose: Pose2d::new(0.2, 0.0, Rotation2d::from_degrees(90.0)),
            velocity: ChassisSpeeds::default(),
        };

        // Target is 0.2 m ahead along field x, which is the robot's right
        let speeds = follower.follow(&mut drive, &setpoint);
        assert_close(speeds.vx, 0.0);
        assert_close(speeds.vy, -1.0);
        assert_close(speeds.omega, 0.0);
    }

    #[test]
    fn start_resets_pose_and_mirrors_for_red() {
        let mut drive = FakeDrive::default();
        let mut follower = PathFollower::new(&FollowerConfig::default(), 0.02);
        follower.set_mirror_for_red(true);
        follower.start(&mut drive, Pose2d::new(2.0, 5.0, Rotation2d::ZERO));

        assert_close(drive.pose.x(), FIELD_LENGTH_METERS - 2.0);
        assert_close(drive.pose.y(), 5.0);
        assert_close(drive.pose.rotation().degrees().abs(), 180.0);
        assert_eq!(follower.target(), Some(drive.pose));
    }

    #[test]
    fn mirrored_velocity_flips_x_and_rotation() {
        let setpoint = TrajectorySetpoint {
            pose: Pose2d::new(1.0, 2.0, Rotation2d::from_degrees(30.0)),
            velocity: ChassisSpeeds::new(1.0, 0.5, 0.3),
        };
        let mirrored = setpoint.mirrored(10.0);
        assert_close(mirrored.pose.x(), 9.0);
        assert_close(mirrored.pose.rotation().degrees(), 150.0);
        assert_eq!(mirrored.velocity, ChassisSpeeds::new(-1.0, 0.5, -0.3));
    }

    #[test]
    fn finish_stops_the_drive() {
        let mut drive = FakeDrive::default();
        let mut follower = PathFollower::new(&FollowerConfig::default(), 0.02);
        follower.follow(&mut drive, &TrajectorySetpoint::default());
        follower.finish(&mut drive);
        assert_eq!(drive.commanded, Some(ChassisSpeeds::default()));
        assert_eq!(follower.target(), None);
    }

    #[test]
    fn drive_is_a_holonomic_drive() {
        let mut drive = Drive::simulated(DriveConfig::default()).unwrap();
        let mut follower = PathFollower::new(&FollowerConfig::default(), 0.02);
        follower.start(&mut drive, Pose2d::new(1.0, 1.0, Rotation2d::ZERO));
        assert_close(HolonomicDrive::pose(&drive).x(), 1.0);

        let setpoint = TrajectorySetpoint {
            pose: Pose2d::new(1.0, 1.0, Rotation2d::ZERO),
            velocity: ChassisSpeeds::new(1.0, 0.0, 0.0),
        };
        follower.follow(&mut drive, &setpoint);
        assert_close(drive.setpoint().vx, 1.0);
    }
}
