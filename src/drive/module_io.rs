// Hardware boundary for one swerve module
//
// The drive only ever talks to a module through `ModuleIo`, so the same
// control code runs against real motor controllers, the physics sim below,
// or recorded logs.

use serde::Serialize;

use crate::geometry::Rotation2d;
use crate::sim::{DcMotor, DcMotorSim};

/// One cycle's sensor snapshot for a module
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ModuleIoInputs {
    pub connected: bool,

    pub drive_position_rad: f64,
    pub drive_velocity_rad_per_sec: f64,
    pub drive_applied_volts: f64,
    pub drive_current_amps: f64,

    /// Absolute encoder, used once to line up the relative encoder
    pub turn_absolute_position: Rotation2d,
    /// Relative (motor) encoder
    pub turn_position: Rotation2d,
    pub turn_velocity_rad_per_sec: f64,
    pub turn_applied_volts: f64,
    pub turn_current_amps: f64,
}

pub trait ModuleIo {
    /// Read every sensor once
    fn update_inputs(&mut self) -> ModuleIoInputs;

    fn set_drive_voltage(&mut self, volts: f64);

    fn set_turn_voltage(&mut self, volts: f64);

    fn set_drive_brake_mode(&mut self, _enable: bool) {}

    fn set_turn_brake_mode(&mut self, _enable: bool) {}
}

/// Drive and turn gearing of the simulated module
const DRIVE_GEAR_RATIO: f64 = 6.75;
const TURN_GEAR_RATIO: f64 = 150.0 / 7.0;
const DRIVE_MOI: f64 = 0.025;
const TURN_MOI: f64 = 0.004;
const MAX_VOLTS: f64 = 12.0;

/// Physics-simulated module, stepped once per `update_inputs`
pub struct ModuleIoSim {
    drive_sim: DcMotorSim,
    turn_sim: DcMotorSim,
    turn_absolute_init: Rotation2d,
    drive_applied_volts: f64,
    turn_applied_volts: f64,
    period: f64,
}

impl ModuleIoSim {
    /// `turn_absolute_init` is where the absolute encoder reads at power-on
    pub fn new(turn_absolute_init: Rotation2d, period: f64) -> Self {
        Self {
            drive_sim: DcMotorSim::new(DcMotor::neo(1), DRIVE_GEAR_RATIO, DRIVE_MOI),
            turn_sim: DcMotorSim::new(DcMotor::neo(1), TURN_GEAR_RATIO, TURN_MOI),
            turn_absolute_init,
            drive_applied_volts: 0.0,
            turn_applied_volts: 0.0,
            period,
        }
    }
}

impl ModuleIo for ModuleIoSim {
    fn update_inputs(&mut self) -> ModuleIoInputs {
        self.drive_sim.update(self.period);
        self.turn_sim.update(self.period);

        let turn_relative = self.turn_sim.position_rad();
        ModuleIoInputs {
            connected: true,
            drive_position_rad: self.drive_sim.position_rad(),
            drive_velocity_rad_per_sec: self.drive_sim.velocity_rad_per_sec(),
            drive_applied_volts: self.drive_applied_volts,
            drive_current_amps: self.drive_sim.current_draw_amps(),
            turn_absolute_position: Rotation2d::new(turn_relative) + self.turn_absolute_init,
            turn_position: Rotation2d::new(turn_relative),
            turn_velocity_rad_per_sec: self.turn_sim.velocity_rad_per_sec(),
            turn_applied_volts: self.turn_applied_volts,
            turn_current_amps: self.turn_sim.current_draw_amps(),
        }
    }

    fn set_drive_voltage(&mut self, volts: f64) {
        self.drive_applied_volts = volts.clamp(-MAX_VOLTS, MAX_VOLTS);
        self.drive_sim.set_input_voltage(self.drive_applied_volts);
    }

    fn set_turn_voltage(&mut self, volts: f64) {
        self.turn_applied_volts = volts.clamp(-MAX_VOLTS, MAX_VOLTS);
        self.turn_sim.set_input_voltage(self.turn_applied_volts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voltage_is_clamped_to_battery() {
        let mut io = ModuleIoSim::new(Rotation2d::ZERO, 0.02);
        io.set_drive_voltage(20.0);
        io.set_turn_voltage(-15.0);
        let inputs = io.update_inputs();
        assert_eq!(inputs.drive_applied_volts, 12.0);
        assert_eq!(inputs.turn_applied_volts, -12.0);
        assert!(inputs.drive_velocity_rad_per_sec > 0.0);
        assert!(inputs.turn_velocity_rad_per_sec < 0.0);
    }

    #[test]
    fn absolute_encoder_carries_initial_offset() {
        let mut io = ModuleIoSim::new(Rotation2d::new(1.0), 0.02);
        let inputs = io.update_inputs();
        assert!((inputs.turn_absolute_position.radians() - 1.0).abs() < 1e-9);
        assert!(inputs.turn_position.radians().abs() < 1e-9);
    }
}
