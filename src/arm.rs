// Note-scoring arm: one pivot joint driven by feedforward only, plus a
// pneumatic piston
//
// The joint is either under manual (joystick) control or following a
// trapezoidal profile toward a preset angle.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ArmConfig;
use crate::control::{ArmFeedforward, Constraints, ProfileState, TrapezoidProfile, sign};
use crate::sim::{DcMotor, DcMotorSim};

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ArmIoInputs {
    /// Radians above horizontal
    pub angle_rad: f64,
    pub velocity_rad_per_sec: f64,
    pub applied_volts: f64,
    pub current_amps: f64,
    pub extended: bool,
}

pub trait ArmIo {
    fn update_inputs(&mut self) -> ArmIoInputs;

    fn set_voltage(&mut self, volts: f64);

    fn extend(&mut self);

    fn retract(&mut self);
}

const GEAR_RATIO: f64 = 100.0;
const MOI: f64 = 0.5;
const MIN_ANGLE_RAD: f64 = 0.0;
const MAX_ANGLE_RAD: f64 = 2.0;
const MAX_VOLTS: f64 = 12.0;

/// Two NEOs on a geared pivot with hard stops at both ends
///
/// Gravity is modelled as a voltage offset of `gravity_volts * cos(angle)`
/// and joint friction as a constant `friction_volts` against the motion, the
/// same shapes the arm feedforward compensates.
pub struct ArmIoSim {
    sim: DcMotorSim,
    gravity_volts: f64,
    friction_volts: f64,
    applied_volts: f64,
    extended: bool,
    period: f64,
}

impl ArmIoSim {
    pub fn new(gravity_volts: f64, friction_volts: f64, period: f64) -> Self {
        Self {
            sim: DcMotorSim::new(DcMotor::neo(2), GEAR_RATIO, MOI),
            gravity_volts,
            friction_volts,
            applied_volts: 0.0,
            extended: false,
            period,
        }
    }
}

impl ArmIo for ArmIoSim {
    fn update_inputs(&mut self) -> ArmIoInputs {
        let angle = self.sim.position_rad();
        let velocity = self.sim.velocity_rad_per_sec();
        let drive_volts = self.applied_volts - self.gravity_volts * angle.cos();
        let stuck = velocity == 0.0 && drive_volts.abs() <= self.friction_volts;

        if stuck {
            self.sim.set_input_voltage(0.0);
        } else {
            let direction = if velocity != 0.0 { sign(velocity) } else { sign(drive_volts) };
            self.sim
                .set_input_voltage(drive_volts - self.friction_volts * direction);
        }
        self.sim.update(self.period);

        // Friction can stop the joint but never push it backwards
        let angle = self.sim.position_rad();
        let reversed = sign(self.sim.velocity_rad_per_sec()) == -sign(velocity);
        if velocity != 0.0 && reversed && drive_volts.abs() <= self.friction_volts {
            self.sim.set_state(angle, 0.0);
        }

        let angle = self.sim.position_rad();
        if !(MIN_ANGLE_RAD..=MAX_ANGLE_RAD).contains(&angle) {
            self.sim.set_state(angle.clamp(MIN_ANGLE_RAD, MAX_ANGLE_RAD), 0.0);
        }

        ArmIoInputs {
            angle_rad: self.sim.position_rad(),
            velocity_rad_per_sec: self.sim.velocity_rad_per_sec(),
            applied_volts: self.applied_volts,
            current_amps: self.sim.current_draw_amps(),
            extended: self.extended,
        }
    }

    fn set_voltage(&mut self, volts: f64) {
        self.applied_volts = volts.clamp(-MAX_VOLTS, MAX_VOLTS);
    }

    fn extend(&mut self) {
        self.extended = true;
    }

    fn retract(&mut self) {
        self.extended = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ArmMode {
    /// Joystick input in [-1, 1], scaled to the manual velocity limit
    Manual { input: f64 },
    GoToPosition {
        setpoint: ProfileState,
        goal: ProfileState,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PistonState {
    Extended,
    Retracted,
}

/// Named arm angles from the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmPosition {
    Amp,
    Trap,
    Drive,
    Intake,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArmTelemetry {
    pub inputs: ArmIoInputs,
    pub mode: ArmMode,
    pub piston: PistonState,
    pub feedforward_volts: f64,
}

pub struct Arm {
    io: Box<dyn ArmIo + Send>,
    inputs: ArmIoInputs,
    config: ArmConfig,
    feedforward: ArmFeedforward,
    profile: TrapezoidProfile,
    period: f64,
    mode: ArmMode,
    piston: PistonState,
}

impl Arm {
    pub fn new(io: Box<dyn ArmIo + Send>, config: ArmConfig, period: f64) -> Self {
        let profile = TrapezoidProfile::new(Constraints::new(
            config.max_velocity,
            config.max_acceleration,
        ));
        Self {
            io,
            inputs: ArmIoInputs::default(),
            feedforward: config.feedforward,
            config,
            profile,
            period,
            mode: ArmMode::Manual { input: 0.0 },
            piston: PistonState::Retracted,
        }
    }

    pub fn simulated(config: ArmConfig, period: f64) -> Self {
        let io = ArmIoSim::new(config.feedforward.kg, config.feedforward.ks, period);
        Self::new(Box::new(io), config, period)
    }

    pub fn periodic(&mut self, enabled: bool) -> ArmTelemetry {
        self.inputs = self.io.update_inputs();

        if !enabled && self.mode != (ArmMode::Manual { input: 0.0 }) {
            debug!("Arm disabled, dropping to manual");
            self.mode = ArmMode::Manual { input: 0.0 };
        }

        let volts = if enabled {
            match &mut self.mode {
                ArmMode::Manual { input } => self.feedforward.calculate(
                    self.inputs.angle_rad,
                    self.config.max_manual_velocity * *input,
                ),
                ArmMode::GoToPosition { setpoint, goal } => {
                    *setpoint = self.profile.calculate(self.period, *setpoint, *goal);
                    self.feedforward
                        .calculate(setpoint.position, setpoint.velocity)
                }
            }
        } else {
            0.0
        };
        self.io.set_voltage(volts);

        match self.piston {
            PistonState::Extended => self.io.extend(),
            PistonState::Retracted => self.io.retract(),
        }

        ArmTelemetry {
            inputs: self.inputs,
            mode: self.mode,
            piston: self.piston,
            feedforward_volts: volts,
        }
    }

    pub fn set_manual(&mut self, input: f64) {
        self.mode = ArmMode::Manual {
            input: input.clamp(-1.0, 1.0),
        };
    }

    /// Start a profile from the arm's measured state to `angle_rad`
    pub fn set_target_position(&mut self, angle_rad: f64) {
        info!("Arm target {:.3} rad", angle_rad);
        self.mode = ArmMode::GoToPosition {
            setpoint: ProfileState::new(self.inputs.angle_rad, self.inputs.velocity_rad_per_sec),
            goal: ProfileState::new(angle_rad, 0.0),
        };
    }

    /// Bring the arm to rest where it is
    pub fn set_target_to_current(&mut self) {
        self.set_target_position(self.inputs.angle_rad);
    }

    pub fn go_to(&mut self, position: ArmPosition) {
        let angle = match position {
            ArmPosition::Amp => self.config.amp_position,
            ArmPosition::Trap => self.config.trap_position,
            ArmPosition::Drive => self.config.drive_position,
            ArmPosition::Intake => self.config.intake_position,
        };
        self.set_target_position(angle);
    }

    /// True once the profile has settled on its goal; never true in manual
    pub fn has_reached_target(&self) -> bool {
        match self.mode {
            ArmMode::Manual { .. } => false,
            ArmMode::GoToPosition { setpoint, goal } => setpoint == goal,
        }
    }

    pub fn set_extended(&mut self) {
        self.piston = PistonState::Extended;
    }

    pub fn set_retracted(&mut self) {
        self.piston = PistonState::Retracted;
    }

    pub fn mode(&self) -> ArmMode {
        self.mode
    }

    pub fn piston(&self) -> PistonState {
        self.piston
    }

    pub fn angle(&self) -> f64 {
        self.inputs.angle_rad
    }
}
