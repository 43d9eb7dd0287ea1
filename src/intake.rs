// Note intake: a single roller motor and a note sensor

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::IntakeConfig;
use crate::sim::{DcMotor, DcMotorSim};

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct NoteIntakeIoInputs {
    pub velocity_rpm: f64,
    pub has_note: bool,
    pub applied_volts: f64,
    pub current_amps: f64,
}

/// Intake hardware; the defaults describe an intake that is not fitted
pub trait NoteIntakeIo {
    fn update_inputs(&mut self) -> NoteIntakeIoInputs {
        NoteIntakeIoInputs::default()
    }

    fn set_voltage(&mut self, _volts: f64) {}

    fn set_brake_mode(&mut self, _brake: bool) {}
}

/// Roller revolutions needed to pull a note in or push it out
const NOTE_TRAVEL_ROTATIONS: f64 = 3.0;
const GEAR_RATIO: f64 = 3.0;
const MOI: f64 = 0.002;

/// Roller sim; a note is picked up after the roller has pulled inward far
/// enough and released after it has pushed outward as far
pub struct NoteIntakeIoSim {
    sim: DcMotorSim,
    applied_volts: f64,
    has_note: bool,
    travel_rad: f64,
    period: f64,
}

impl NoteIntakeIoSim {
    pub fn new(period: f64) -> Self {
        Self {
            sim: DcMotorSim::new(DcMotor::neo(1), GEAR_RATIO, MOI),
            applied_volts: 0.0,
            has_note: false,
            travel_rad: 0.0,
            period,
        }
    }
}

impl NoteIntakeIo for NoteIntakeIoSim {
    fn update_inputs(&mut self) -> NoteIntakeIoInputs {
        let before = self.sim.position_rad();
        self.sim.update(self.period);
        let moved = self.sim.position_rad() - before;

        let needed = NOTE_TRAVEL_ROTATIONS * std::f64::consts::TAU;
        if self.has_note != (moved > 0.0) {
            self.travel_rad += moved.abs();
        } else {
            self.travel_rad = 0.0;
        }
        if self.travel_rad >= needed {
            self.has_note = !self.has_note;
            self.travel_rad = 0.0;
        }

        NoteIntakeIoInputs {
            velocity_rpm: self.sim.velocity_rad_per_sec() * 60.0 / std::f64::consts::TAU,
            has_note: self.has_note,
            applied_volts: self.applied_volts,
            current_amps: self.sim.current_draw_amps(),
        }
    }

    fn set_voltage(&mut self, volts: f64) {
        self.applied_volts = volts.clamp(-12.0, 12.0);
        self.sim.set_input_voltage(self.applied_volts);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeMode {
    #[default]
    Idle,
    Intaking,
    Ejecting,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntakeTelemetry {
    pub inputs: NoteIntakeIoInputs,
    pub mode: IntakeMode,
}

pub struct NoteIntake {
    io: Box<dyn NoteIntakeIo + Send>,
    inputs: NoteIntakeIoInputs,
    config: IntakeConfig,
    mode: IntakeMode,
}

impl NoteIntake {
    pub fn new(io: Box<dyn NoteIntakeIo + Send>, config: IntakeConfig) -> Self {
        Self {
            io,
            inputs: NoteIntakeIoInputs::default(),
            config,
            mode: IntakeMode::Idle,
        }
    }

    pub fn simulated(config: IntakeConfig, period: f64) -> Self {
        Self::new(Box::new(NoteIntakeIoSim::new(period)), config)
    }

    pub fn periodic(&mut self, enabled: bool) -> IntakeTelemetry {
        self.inputs = self.io.update_inputs();

        if !enabled {
            self.mode = IntakeMode::Idle;
        } else if self.mode == IntakeMode::Intaking && self.inputs.has_note {
            info!("Note acquired");
            self.mode = IntakeMode::Idle;
        }

        let volts = match self.mode {
            IntakeMode::Idle => 0.0,
            IntakeMode::Intaking => self.config.intake_volts,
            IntakeMode::Ejecting => -self.config.eject_volts,
        };
        self.io.set_voltage(volts);

        IntakeTelemetry {
            inputs: self.inputs,
            mode: self.mode,
        }
    }

    pub fn set_mode(&mut self, mode: IntakeMode) {
        if mode != self.mode {
            debug!("Intake mode {:?} -> {:?}", self.mode, mode);
        }
        self.mode = mode;
    }

    pub fn set_brake_mode(&mut self, brake: bool) {
        self.io.set_brake_mode(brake);
    }

    pub fn mode(&self) -> IntakeMode {
        self.mode
    }

    pub fn has_note(&self) -> bool {
        self.inputs.has_note
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Intake with no hardware behind it
    struct Absent;

    impl NoteIntakeIo for Absent {}

    #[test]
    fn absent_hardware_reads_defaults() {
        let mut intake = NoteIntake::new(Box::new(Absent), IntakeConfig::default());
        intake.set_mode(IntakeMode::Intaking);
        let telemetry = intake.periodic(true);
        assert!(!telemetry.inputs.has_note);
        assert_eq!(telemetry.mode, IntakeMode::Intaking);
    }

    #[test]
    fn disabled_forces_idle() {
        let mut intake = NoteIntake::simulated(IntakeConfig::default(), 0.02);
        intake.set_mode(IntakeMode::Ejecting);
        let telemetry = intake.periodic(false);
        assert_eq!(telemetry.mode, IntakeMode::Idle);
        assert_eq!(intake.mode(), IntakeMode::Idle);
    }

    #[test]
    fn intaking_stops_once_a_note_is_held() {
        let mut intake = NoteIntake::simulated(IntakeConfig::default(), 0.02);
        intake.set_mode(IntakeMode::Intaking);
        for _ in 0..100 {
            intake.periodic(true);
        }
        assert!(intake.has_note());
        assert_eq!(intake.mode(), IntakeMode::Idle);
    }

    #[test]
    fn ejecting_releases_the_note() {
        let mut intake = NoteIntake::simulated(IntakeConfig::default(), 0.02);
        intake.set_mode(IntakeMode::Intaking);
        for _ in 0..100 {
            intake.periodic(true);
        }

        intake.set_mode(IntakeMode::Ejecting);
        for _ in 0..100 {
            intake.periodic(true);
        }
        assert!(!intake.has_note());
    }
}
