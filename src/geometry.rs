// Planar geometry used by the drive: rotations, translations, poses, twists
// and chassis velocities. Conventions: x forward, y left, counter-clockwise
// positive, field frame origin at the blue alliance corner.

use std::f64::consts::PI;
use std::ops::{Add, Div, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Below this, small-angle series are used instead of sin/cos ratios
const EPSILON: f64 = 1e-9;

/// A planar rotation, stored alongside its cosine and sine
///
/// Serialized as plain radians.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Rotation2d {
    value: f64,
    cos: f64,
    sin: f64,
}

impl Rotation2d {
    pub const ZERO: Rotation2d = Rotation2d {
        value: 0.0,
        cos: 1.0,
        sin: 0.0,
    };

    pub fn new(radians: f64) -> Self {
        Self {
            value: radians,
            cos: radians.cos(),
            sin: radians.sin(),
        }
    }

    pub fn from_degrees(degrees: f64) -> Self {
        Self::new(degrees.to_radians())
    }

    /// Rotation pointing along the vector (x, y), wrapped to (-pi, pi]
    ///
    /// A zero-length vector gives the zero rotation.
    pub fn from_components(x: f64, y: f64) -> Self {
        let magnitude = x.hypot(y);
        if magnitude > 1e-6 {
            let (cos, sin) = (x / magnitude, y / magnitude);
            Self {
                value: sin.atan2(cos),
                cos,
                sin,
            }
        } else {
            Self::ZERO
        }
    }

    pub fn radians(&self) -> f64 {
        self.value
    }

    pub fn degrees(&self) -> f64 {
        self.value.to_degrees()
    }

    pub fn cos(&self) -> f64 {
        self.cos
    }

    pub fn sin(&self) -> f64 {
        self.sin
    }

    /// Compose two rotations; the result is wrapped to (-pi, pi]
    pub fn rotate_by(&self, other: Rotation2d) -> Self {
        Self::from_components(
            self.cos * other.cos - self.sin * other.sin,
            self.cos * other.sin + self.sin * other.cos,
        )
    }

    /// The same heading turned half a revolution
    pub fn flipped(&self) -> Self {
        self.rotate_by(Rotation2d::new(PI))
    }
}

impl Default for Rotation2d {
    fn default() -> Self {
        Self::ZERO
    }
}

impl PartialEq for Rotation2d {
    fn eq(&self, other: &Self) -> bool {
        (self.cos - other.cos).hypot(self.sin - other.sin) < EPSILON
    }
}

impl Add for Rotation2d {
    type Output = Rotation2d;

    fn add(self, rhs: Rotation2d) -> Rotation2d {
        self.rotate_by(rhs)
    }
}

impl Sub for Rotation2d {
    type Output = Rotation2d;

    fn sub(self, rhs: Rotation2d) -> Rotation2d {
        self.rotate_by(-rhs)
    }
}

impl Neg for Rotation2d {
    type Output = Rotation2d;

    fn neg(self) -> Rotation2d {
        Rotation2d::new(-self.value)
    }
}

impl From<f64> for Rotation2d {
    fn from(radians: f64) -> Self {
        Rotation2d::new(radians)
    }
}

impl From<Rotation2d> for f64 {
    fn from(rotation: Rotation2d) -> Self {
        rotation.value
    }
}

/// A point or vector on the field, in meters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Translation2d {
    pub x: f64,
    pub y: f64,
}

impl Translation2d {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn angle(&self) -> Rotation2d {
        Rotation2d::from_components(self.x, self.y)
    }

    pub fn rotate_by(&self, rotation: Rotation2d) -> Self {
        Self {
            x: self.x * rotation.cos() - self.y * rotation.sin(),
            y: self.x * rotation.sin() + self.y * rotation.cos(),
        }
    }
}

impl Add for Translation2d {
    type Output = Translation2d;

    fn add(self, rhs: Translation2d) -> Translation2d {
        Translation2d::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Translation2d {
    type Output = Translation2d;

    fn sub(self, rhs: Translation2d) -> Translation2d {
        Translation2d::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Translation2d {
    type Output = Translation2d;

    fn neg(self) -> Translation2d {
        Translation2d::new(-self.x, -self.y)
    }
}

impl Mul<f64> for Translation2d {
    type Output = Translation2d;

    fn mul(self, scalar: f64) -> Translation2d {
        Translation2d::new(self.x * scalar, self.y * scalar)
    }
}

impl Div<f64> for Translation2d {
    type Output = Translation2d;

    fn div(self, scalar: f64) -> Translation2d {
        Translation2d::new(self.x / scalar, self.y / scalar)
    }
}

/// Motion along an arc expressed in the frame of the pose it starts from
///
/// Used both for per-cycle displacement (meters, radians) and, in
/// `Drive::field_velocity`, for rates (m/s, rad/s).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Twist2d {
    pub dx: f64,
    pub dy: f64,
    pub dtheta: f64,
}

impl Twist2d {
    pub fn new(dx: f64, dy: f64, dtheta: f64) -> Self {
        Self { dx, dy, dtheta }
    }
}

/// Robot position and heading in the field frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose2d {
    pub translation: Translation2d,
    pub rotation: Rotation2d,
}

impl Pose2d {
    pub fn new(x: f64, y: f64, rotation: Rotation2d) -> Self {
        Self {
            translation: Translation2d::new(x, y),
            rotation,
        }
    }

    pub fn x(&self) -> f64 {
        self.translation.x
    }

    pub fn y(&self) -> f64 {
        self.translation.y
    }

    pub fn rotation(&self) -> Rotation2d {
        self.rotation
    }

    /// This pose expressed in the frame of `origin`
    pub fn relative_to(&self, origin: &Pose2d) -> Pose2d {
        Pose2d {
            translation: (self.translation - origin.translation).rotate_by(-origin.rotation),
            rotation: self.rotation - origin.rotation,
        }
    }

    /// Apply a pose expressed in this pose's frame
    fn transform_by(&self, local: &Pose2d) -> Pose2d {
        Pose2d {
            translation: self.translation + local.translation.rotate_by(self.rotation),
            rotation: local.rotation + self.rotation,
        }
    }

    /// Follow a constant-curvature twist starting from this pose
    ///
    /// The twist is in the robot frame, so straight addition of its
    /// components to the field pose would be wrong whenever dtheta != 0.
    pub fn exp(&self, twist: &Twist2d) -> Pose2d {
        let Twist2d { dx, dy, dtheta } = *twist;
        let sin_theta = dtheta.sin();
        let cos_theta = dtheta.cos();

        let (s, c) = if dtheta.abs() < EPSILON {
            (1.0 - dtheta * dtheta / 6.0, 0.5 * dtheta)
        } else {
            (sin_theta / dtheta, (1.0 - cos_theta) / dtheta)
        };

        let local = Pose2d {
            translation: Translation2d::new(dx * s - dy * c, dx * c + dy * s),
            rotation: Rotation2d::from_components(cos_theta, sin_theta),
        };
        self.transform_by(&local)
    }

    /// The twist that takes this pose to `end`; inverse of `exp`
    pub fn log(&self, end: &Pose2d) -> Twist2d {
        let transform = end.relative_to(self);
        let dtheta = transform.rotation.radians();
        let half_dtheta = dtheta / 2.0;
        let cos_minus_one = transform.rotation.cos() - 1.0;

        let half_theta_by_tan_of_half_dtheta = if cos_minus_one.abs() < EPSILON {
            1.0 - dtheta * dtheta / 12.0
        } else {
            -(half_dtheta * transform.rotation.sin()) / cos_minus_one
        };

        let translation_part = transform.translation.rotate_by(Rotation2d::from_components(
            half_theta_by_tan_of_half_dtheta,
            -half_dtheta,
        )) * half_theta_by_tan_of_half_dtheta.hypot(half_dtheta);

        Twist2d::new(translation_part.x, translation_part.y, dtheta)
    }
}

/// Body-frame chassis velocity command
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChassisSpeeds {
    /// Forward velocity, m/s
    pub vx: f64,
    /// Leftward velocity, m/s
    pub vy: f64,
    /// Counter-clockwise angular velocity, rad/s
    pub omega: f64,
}

impl ChassisSpeeds {
    pub fn new(vx: f64, vy: f64, omega: f64) -> Self {
        Self { vx, vy, omega }
    }

    /// Convert a field-relative command into the robot frame
    pub fn from_field_relative(vx: f64, vy: f64, omega: f64, robot_angle: Rotation2d) -> Self {
        let rotated = Translation2d::new(vx, vy).rotate_by(-robot_angle);
        Self::new(rotated.x, rotated.y, omega)
    }

    /// Speeds that, held for `dt` seconds, land on the pose the original
    /// command would reach if translation and rotation were applied at once
    ///
    /// Removes the sideways drift a spinning robot picks up when it
    /// translates in a straight line over a finite control period.
    pub fn discretize(&self, dt: f64) -> Self {
        let desired_delta = Pose2d::new(
            self.vx * dt,
            self.vy * dt,
            Rotation2d::new(self.omega * dt),
        );
        let twist = Pose2d::default().log(&desired_delta);
        Self::new(twist.dx / dt, twist.dy / dt, twist.dtheta / dt)
    }

    pub fn is_zero(&self) -> bool {
        self.vx == 0.0 && self.vy == 0.0 && self.omega == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn rotation_arithmetic_wraps() {
        let a = Rotation2d::from_degrees(170.0);
        let b = Rotation2d::from_degrees(20.0);
        assert_close((a + b).degrees(), -170.0);
        assert_close((b - a).degrees(), -150.0);
        assert_eq!(a.flipped(), Rotation2d::from_degrees(-10.0));
    }

    #[test]
    fn rotation_serializes_as_radians() {
        let json = serde_json::to_string(&Rotation2d::new(0.5)).unwrap();
        assert_eq!(json, "0.5");
        let back: Rotation2d = serde_json::from_str("0.25").unwrap();
        assert_close(back.radians(), 0.25);
    }

    #[test]
    fn exp_straight_line_is_plain_translation() {
        let start = Pose2d::new(1.0, 2.0, Rotation2d::from_degrees(90.0));
        let end = start.exp(&Twist2d::new(1.0, 0.0, 0.0));
        assert_close(end.x(), 1.0);
        assert_close(end.y(), 3.0);
        assert_close(end.rotation().degrees(), 90.0);
    }

    #[test]
    fn exp_follows_an_arc() {
        // Quarter circle of radius one
        let end = Pose2d::default().exp(&Twist2d::new(FRAC_PI_2, 0.0, FRAC_PI_2));
        assert_close(end.x(), 1.0);
        assert_close(end.y(), 1.0);
        assert_close(end.rotation().degrees(), 90.0);
    }

    #[test]
    fn log_inverts_exp() {
        let start = Pose2d::new(0.3, -1.2, Rotation2d::new(0.7));
        let twist = Twist2d::new(0.4, -0.1, 0.35);
        let end = start.exp(&twist);
        let recovered = start.log(&end);
        assert_close(recovered.dx, twist.dx);
        assert_close(recovered.dy, twist.dy);
        assert_close(recovered.dtheta, twist.dtheta);
    }

    #[test]
    fn discretize_without_rotation_is_identity() {
        let speeds = ChassisSpeeds::new(1.5, -0.5, 0.0).discretize(0.02);
        assert_close(speeds.vx, 1.5);
        assert_close(speeds.vy, -0.5);
        assert_close(speeds.omega, 0.0);
    }

    #[test]
    fn discretize_lands_on_the_straight_line_target() {
        let dt = 0.02;
        let command = ChassisSpeeds::new(2.0, 0.0, 3.0);
        let discrete = command.discretize(dt);
        let end = Pose2d::default().exp(&Twist2d::new(
            discrete.vx * dt,
            discrete.vy * dt,
            discrete.omega * dt,
        ));
        assert_close(end.x(), 2.0 * dt);
        assert_close(end.y(), 0.0);
        assert_close(end.rotation().radians(), 3.0 * dt);
    }

    #[test]
    fn field_relative_command_is_rotated_into_robot_frame() {
        let speeds =
            ChassisSpeeds::from_field_relative(1.0, 0.0, 0.5, Rotation2d::from_degrees(90.0));
        assert_close(speeds.vx, 0.0);
        assert_close(speeds.vy, -1.0);
        assert_close(speeds.omega, 0.5);
    }
}
