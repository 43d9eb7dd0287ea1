// Swerve kinematics for a four-module base
// Converts body-frame velocities (vx, vy, omega) to per-module (speed, angle)
// setpoints, and measured module states/deltas back to chassis motion.

use nalgebra::{Matrix3, SMatrix, SVector};
use serde::{Deserialize, Serialize};

use crate::geometry::{ChassisSpeeds, Rotation2d, Translation2d, Twist2d};

/// Number of swerve modules: front-left, front-right, back-left, back-right
pub const NUM_MODULES: usize = 4;

/// Velocity and heading of one wheel
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SwerveModuleState {
    /// Wheel surface speed in m/s (signed)
    pub speed: f64,
    pub angle: Rotation2d,
}

impl SwerveModuleState {
    pub fn new(speed: f64, angle: Rotation2d) -> Self {
        Self { speed, angle }
    }

    /// Equivalent state that needs at most a 90 degree turn from `current_angle`
    ///
    /// Pointing the wheel the opposite way and spinning it backwards gives the
    /// same motion.
    pub fn optimize(&self, current_angle: Rotation2d) -> Self {
        let delta = self.angle - current_angle;
        if delta.degrees().abs() > 90.0 {
            Self::new(-self.speed, self.angle.flipped())
        } else {
            *self
        }
    }
}

/// Cumulative travel and current heading of one wheel
///
/// Also used for the per-cycle delta: distance since the previous cycle,
/// paired with the heading measured this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SwerveModulePosition {
    /// Meters
    pub distance: f64,
    pub angle: Rotation2d,
}

impl SwerveModulePosition {
    pub fn new(distance: f64, angle: Rotation2d) -> Self {
        Self { distance, angle }
    }
}

/// Wheel layouts the kinematics can't be built from
#[derive(Debug, thiserror::Error)]
pub enum KinematicsError {
    #[error("Module {index} translation is not finite: {translation:?}")]
    NonFinite {
        index: usize,
        translation: Translation2d,
    },

    #[error("Module translations are degenerate, chassis motion can't be recovered from them")]
    Degenerate,
}

pub struct SwerveKinematics {
    translations: [Translation2d; NUM_MODULES],
    /// Least-squares solution of the 8x3 inverse kinematics system
    forward: SMatrix<f64, 3, 8>,
    /// Heading each module holds when the chassis is commanded to stand still
    headings: [Rotation2d; NUM_MODULES],
}

impl SwerveKinematics {
    /// Build kinematics for modules at `translations` from the robot center
    pub fn new(translations: [Translation2d; NUM_MODULES]) -> Result<Self, KinematicsError> {
        // Each row pair maps chassis (vx, vy, omega) onto one module's
        // velocity vector: [1, 0, -y] and [0, 1, x]
        let mut inverse = SMatrix::<f64, 8, 3>::zeros();
        for (i, translation) in translations.iter().enumerate() {
            if !translation.x.is_finite() || !translation.y.is_finite() {
                return Err(KinematicsError::NonFinite {
                    index: i,
                    translation: *translation,
                });
            }
            inverse[(2 * i, 0)] = 1.0;
            inverse[(2 * i, 2)] = -translation.y;
            inverse[(2 * i + 1, 1)] = 1.0;
            inverse[(2 * i + 1, 2)] = translation.x;
        }

        let normal: Matrix3<f64> = inverse.transpose() * inverse;
        if normal.determinant().abs() < 1e-9 {
            return Err(KinematicsError::Degenerate);
        }
        let normal_inverse = normal.try_inverse().ok_or(KinematicsError::Degenerate)?;

        Ok(Self {
            translations,
            forward: normal_inverse * inverse.transpose(),
            headings: [Rotation2d::ZERO; NUM_MODULES],
        })
    }

    pub fn translations(&self) -> &[Translation2d; NUM_MODULES] {
        &self.translations
    }

    /// Convert a body-frame velocity into module setpoints
    ///
    /// A zero command keeps every module at its last heading (or the heading
    /// forced by `reset_headings`) instead of snapping back to zero.
    pub fn to_module_states(
        &mut self,
        speeds: &ChassisSpeeds,
    ) -> [SwerveModuleState; NUM_MODULES] {
        if speeds.is_zero() {
            return self.headings.map(|heading| SwerveModuleState::new(0.0, heading));
        }

        let mut states = [SwerveModuleState::default(); NUM_MODULES];
        for (i, translation) in self.translations.iter().enumerate() {
            let vx = speeds.vx - speeds.omega * translation.y;
            let vy = speeds.vy + speeds.omega * translation.x;

            let angle = Rotation2d::from_components(vx, vy);
            states[i] = SwerveModuleState::new(vx.hypot(vy), angle);
            self.headings[i] = angle;
        }
        states
    }

    /// Least-squares chassis velocity from measured module states
    pub fn to_chassis_speeds(&self, states: &[SwerveModuleState; NUM_MODULES]) -> ChassisSpeeds {
        let [vx, vy, omega] = self.solve(|i| {
            let state = &states[i];
            (state.speed * state.angle.cos(), state.speed * state.angle.sin())
        });
        ChassisSpeeds::new(vx, vy, omega)
    }

    /// Robot-frame motion from per-cycle module deltas
    pub fn to_twist(&self, deltas: &[SwerveModulePosition; NUM_MODULES]) -> Twist2d {
        let [dx, dy, dtheta] = self.solve(|i| {
            let delta = &deltas[i];
            (delta.distance * delta.angle.cos(), delta.distance * delta.angle.sin())
        });
        Twist2d::new(dx, dy, dtheta)
    }

    fn solve(&self, module_vector: impl Fn(usize) -> (f64, f64)) -> [f64; 3] {
        let mut measured = SVector::<f64, 8>::zeros();
        for i in 0..NUM_MODULES {
            let (x, y) = module_vector(i);
            measured[2 * i] = x;
            measured[2 * i + 1] = y;
        }
        let chassis = self.forward * measured;
        [chassis[0], chassis[1], chassis[2]]
    }

    /// Force the headings used for zero-velocity commands
    pub fn reset_headings(&mut self, headings: [Rotation2d; NUM_MODULES]) {
        self.headings = headings;
    }

    /// Scale every wheel speed by the same factor so none exceeds `max_speed`
    ///
    /// Leaves the states alone when they are already within the limit.
    pub fn desaturate(states: &mut [SwerveModuleState], max_speed: f64) {
        let real_max = states
            .iter()
            .map(|state| state.speed.abs())
            .fold(0.0f64, f64::max);

        if real_max > max_speed {
            let scale = max_speed / real_max;
            for state in states.iter_mut() {
                state.speed *= scale;
            }
        }
    }
}
