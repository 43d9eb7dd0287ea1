// Feedforward models: voltage needed to hold a velocity (and, for arms,
// to fight gravity)

use serde::{Deserialize, Serialize};

use super::sign;

/// ks * sgn(v) + kv * v + ka * a
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SimpleMotorFeedforward {
    pub ks: f64,
    pub kv: f64,
    #[serde(default)]
    pub ka: f64,
}

impl SimpleMotorFeedforward {
    pub fn new(ks: f64, kv: f64) -> Self {
        Self { ks, kv, ka: 0.0 }
    }

    pub fn calculate(&self, velocity: f64) -> f64 {
        self.calculate_with_accel(velocity, 0.0)
    }

    pub fn calculate_with_accel(&self, velocity: f64, acceleration: f64) -> f64 {
        self.ks * sign(velocity) + self.kv * velocity + self.ka * acceleration
    }
}

/// ks * sgn(v) + kg * cos(angle) + kv * v + ka * a
///
/// Angle is measured from horizontal, so gravity load peaks at zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ArmFeedforward {
    pub ks: f64,
    pub kg: f64,
    pub kv: f64,
    #[serde(default)]
    pub ka: f64,
}

impl ArmFeedforward {
    pub fn new(ks: f64, kg: f64, kv: f64, ka: f64) -> Self {
        Self { ks, kg, kv, ka }
    }

    pub fn calculate(&self, position_rad: f64, velocity: f64) -> f64 {
        self.calculate_with_accel(position_rad, velocity, 0.0)
    }

    pub fn calculate_with_accel(&self, position_rad: f64, velocity: f64, acceleration: f64) -> f64 {
        self.ks * sign(velocity)
            + self.kg * position_rad.cos()
            + self.kv * velocity
            + self.ka * acceleration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_velocity_has_no_static_term() {
        let ff = SimpleMotorFeedforward::new(0.1, 0.13);
        assert_eq!(ff.calculate(0.0), 0.0);
        assert!((ff.calculate(10.0) - 1.4).abs() < 1e-9);
        assert!((ff.calculate(-10.0) + 1.4).abs() < 1e-9);
    }

    #[test]
    fn arm_gravity_term_follows_cosine() {
        let ff = ArmFeedforward::new(0.0, 0.5, 0.0, 0.0);
        assert!((ff.calculate(0.0, 0.0) - 0.5).abs() < 1e-9);
        assert!(ff.calculate(std::f64::consts::FRAC_PI_2, 0.0).abs() < 1e-9);
    }
}
