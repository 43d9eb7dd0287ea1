// PID feedback controller for fixed-period loops

use serde::{Deserialize, Serialize};

/// Proportional, integral and derivative gains
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl PidGains {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }

    pub fn proportional(kp: f64) -> Self {
        Self::new(kp, 0.0, 0.0)
    }
}

/// Wrap `input` into `[min, max)`
fn input_modulus(mut input: f64, min: f64, max: f64) -> f64 {
    let modulus = max - min;

    let num_max = ((input - min) / modulus).trunc();
    input -= num_max * modulus;

    let num_min = ((input - max) / modulus).trunc();
    input -= num_min * modulus;

    input
}

/// A PID controller that is called exactly once per `period`
#[derive(Debug, Clone)]
pub struct PidController {
    gains: PidGains,
    period: f64,
    continuous: Option<(f64, f64)>,
    integrator_range: (f64, f64),
    setpoint: f64,
    position_error: f64,
    velocity_error: f64,
    total_error: f64,
}

impl PidController {
    pub fn new(gains: PidGains, period: f64) -> Self {
        Self {
            gains,
            period,
            continuous: None,
            integrator_range: (-1.0, 1.0),
            setpoint: 0.0,
            position_error: 0.0,
            velocity_error: 0.0,
            total_error: 0.0,
        }
    }

    /// Treat `min` and `max` as the same point, e.g. -pi and pi for angles
    ///
    /// The controller then always takes the short way around.
    pub fn enable_continuous_input(&mut self, min: f64, max: f64) {
        self.continuous = Some((min, max));
    }

    /// Bounds on the integral term's contribution to the output
    pub fn set_integrator_range(&mut self, min: f64, max: f64) {
        self.integrator_range = (min, max);
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    /// Error from the most recent `calculate`
    pub fn position_error(&self) -> f64 {
        self.position_error
    }

    pub fn velocity_error(&self) -> f64 {
        self.velocity_error
    }

    pub fn calculate(&mut self, measurement: f64, setpoint: f64) -> f64 {
        self.setpoint = setpoint;
        let previous_error = self.position_error;

        self.position_error = match self.continuous {
            Some((min, max)) => {
                let error_bound = (max - min) / 2.0;
                input_modulus(setpoint - measurement, -error_bound, error_bound)
            }
            None => setpoint - measurement,
        };
        self.velocity_error = (self.position_error - previous_error) / self.period;

        let PidGains { kp, ki, kd } = self.gains;
        if ki != 0.0 {
            let (min, max) = self.integrator_range;
            self.total_error =
                (self.total_error + self.position_error * self.period).clamp(min / ki, max / ki);
        }

        kp * self.position_error + ki * self.total_error + kd * self.velocity_error
    }

    /// Clear accumulated error history
    pub fn reset(&mut self) {
        self.position_error = 0.0;
        self.velocity_error = 0.0;
        self.total_error = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn proportional_output() {
        let mut pid = PidController::new(PidGains::proportional(2.0), 0.02);
        assert!((pid.calculate(1.0, 3.0) - 4.0).abs() < 1e-9);
        assert!((pid.position_error() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn continuous_input_takes_the_short_way() {
        let mut pid = PidController::new(PidGains::proportional(1.0), 0.02);
        pid.enable_continuous_input(-PI, PI);

        // From 170 degrees to -170 degrees is +20 degrees, not -340
        let output = pid.calculate(170f64.to_radians(), (-170f64).to_radians());
        assert!((output - 20f64.to_radians()).abs() < 1e-9);
    }

    #[test]
    fn integrator_is_clamped() {
        let mut pid = PidController::new(PidGains::new(0.0, 1.0, 0.0), 1.0);
        pid.set_integrator_range(-0.5, 0.5);
        for _ in 0..10 {
            pid.calculate(0.0, 1.0);
        }
        assert!((pid.calculate(0.0, 1.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn derivative_uses_error_change_per_period() {
        let mut pid = PidController::new(PidGains::new(0.0, 0.0, 1.0), 0.5);
        pid.calculate(0.0, 1.0);
        let output = pid.calculate(0.0, 2.0);
        // error went 1 -> 2 over half a second
        assert!((output - 2.0).abs() < 1e-9);
    }
}
