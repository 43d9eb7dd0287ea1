// Swerve drive subsystem
//
// Provides:
// - Swerve kinematics (body velocity <-> module states, odometry twists)
// - Per-module closed-loop speed/angle control over a swappable IO layer
// - The per-cycle coordinator: sensor snapshot, odometry, setpoint dispatch
// - A holonomic path-follower bridge

mod gyro_io;
pub mod kinematics;
mod module;
mod module_io;
pub mod path_follower;

pub use gyro_io::{GyroIo, GyroIoInputs, NoGyro};
pub use kinematics::{
    KinematicsError, NUM_MODULES, SwerveKinematics, SwerveModulePosition, SwerveModuleState,
};
pub use module::{MODULE_NAMES, Module};
pub use module_io::{ModuleIo, ModuleIoInputs, ModuleIoSim};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, DriveConfig};
use crate::geometry::{ChassisSpeeds, Pose2d, Rotation2d, Translation2d, Twist2d};

/// What the modules are asked to do each enabled cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriveMode {
    /// Track the chassis velocity setpoint
    Velocity,
    /// All drive motors open loop, wheels held straight
    Characterization { volts: f64 },
    /// One module's drive motor open loop, the rest stopped
    DriveRamp { module: usize, volts: f64 },
    /// One module's turn motor open loop, the rest stopped
    TurnRamp { module: usize, volts: f64 },
}

/// Per-cycle drive record for the telemetry sink
#[derive(Debug, Clone, Serialize)]
pub struct DriveTelemetry {
    pub pose: Pose2d,
    pub measured_states: [SwerveModuleState; NUM_MODULES],
    /// Desaturated setpoints; empty when no velocity command was issued
    pub setpoints: Vec<SwerveModuleState>,
    /// Setpoints after per-module angle optimization
    pub setpoints_optimized: Vec<SwerveModuleState>,
    pub field_velocity: Twist2d,
    pub gyro_connected: bool,
}

pub struct Drive {
    config: DriveConfig,
    gyro_io: Box<dyn GyroIo + Send>,
    gyro_inputs: GyroIoInputs,
    modules: [Module; NUM_MODULES],
    kinematics: SwerveKinematics,

    pose: Pose2d,
    last_gyro_rotation: Rotation2d,
    field_velocity: Twist2d,
    measured_states: [SwerveModuleState; NUM_MODULES],

    // Latest command wins; read once per cycle
    setpoint: ChassisSpeeds,
    mode: DriveMode,
}

impl Drive {
    /// Build the drive; modules are given front-left, front-right, back-left, back-right
    pub fn new(
        config: DriveConfig,
        gyro_io: Box<dyn GyroIo + Send>,
        module_ios: [Box<dyn ModuleIo + Send>; NUM_MODULES],
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let kinematics = SwerveKinematics::new(config.module_translations())?;

        let mut index = 0;
        let modules = module_ios.map(|io| {
            let module = Module::new(io, index, &config);
            index += 1;
            module
        });

        info!(
            "Drive ready: max {:.2} m/s, {:.2} rad/s, base radius {:.3} m",
            config.max_linear_speed,
            config.max_angular_speed(),
            config.drive_base_radius()
        );

        Ok(Self {
            config,
            gyro_io,
            gyro_inputs: GyroIoInputs::default(),
            modules,
            kinematics,
            pose: Pose2d::default(),
            last_gyro_rotation: Rotation2d::ZERO,
            field_velocity: Twist2d::default(),
            measured_states: [SwerveModuleState::default(); NUM_MODULES],
            setpoint: ChassisSpeeds::default(),
            mode: DriveMode::Velocity,
        })
    }

    /// Simulated modules and no gyro
    pub fn simulated(config: DriveConfig) -> Result<Self, ConfigError> {
        let period = config.loop_period_secs;
        // Arbitrary power-on wheel headings, as a real robot would have
        let module_ios = [0.25, -0.5, 1.0, -1.25].map(|init| {
            Box::new(ModuleIoSim::new(Rotation2d::new(init), period)) as Box<dyn ModuleIo + Send>
        });
        Self::new(config, Box::new(NoGyro), module_ios)
    }

    /// Run one control cycle
    ///
    /// `enabled` is the external safety state; while it is false every
    /// module is stopped and no setpoints are produced.
    pub fn periodic(&mut self, enabled: bool) -> DriveTelemetry {
        // Sensor snapshot: nothing below reads hardware again this cycle
        let gyro_inputs = self.gyro_io.update_inputs();
        if gyro_inputs.connected != self.gyro_inputs.connected {
            debug!("Gyro connected: {}", gyro_inputs.connected);
        }
        self.gyro_inputs = gyro_inputs;
        for module in &mut self.modules {
            module.periodic();
        }

        // Odometry: robot-frame motion since last cycle from the wheels
        let deltas = self.modules.each_ref().map(Module::position_delta);
        let mut twist = self.kinematics.to_twist(&deltas);

        if self.gyro_inputs.connected {
            // The gyro is authoritative for rotation when present
            let current = self.gyro_inputs.yaw_position;
            twist.dtheta = (current - self.last_gyro_rotation).radians();
            self.last_gyro_rotation = current;
        } else {
            self.last_gyro_rotation =
                Rotation2d::new(self.last_gyro_rotation.radians() + twist.dtheta);
        }
        self.pose = self.pose.exp(&twist);

        let (setpoints, setpoints_optimized) = if enabled {
            self.run_mode()
        } else {
            for module in &mut self.modules {
                module.stop();
            }
            (Vec::new(), Vec::new())
        };

        // Field velocity from what the wheels are actually doing
        self.measured_states = self.modules.each_ref().map(Module::state);
        let chassis = self.kinematics.to_chassis_speeds(&self.measured_states);
        let linear = Translation2d::new(chassis.vx, chassis.vy).rotate_by(self.rotation());
        let yaw_rate = if self.gyro_inputs.connected {
            self.gyro_inputs.yaw_velocity_rad_per_sec
        } else {
            chassis.omega
        };
        self.field_velocity = Twist2d::new(linear.x, linear.y, yaw_rate);

        DriveTelemetry {
            pose: self.pose,
            measured_states: self.measured_states,
            setpoints,
            setpoints_optimized,
            field_velocity: self.field_velocity,
            gyro_connected: self.gyro_inputs.connected,
        }
    }

    fn run_mode(&mut self) -> (Vec<SwerveModuleState>, Vec<SwerveModuleState>) {
        match self.mode {
            DriveMode::Velocity => {
                let discrete = self.setpoint.discretize(self.config.loop_period_secs);
                let mut states = self.kinematics.to_module_states(&discrete);
                SwerveKinematics::desaturate(&mut states, self.config.max_linear_speed);

                let optimized = self
                    .modules
                    .iter_mut()
                    .zip(states)
                    .map(|(module, state)| module.run_setpoint(state))
                    .collect();
                (states.to_vec(), optimized)
            }
            DriveMode::Characterization { volts } => {
                for module in &mut self.modules {
                    module.run_characterization(volts);
                }
                (Vec::new(), Vec::new())
            }
            DriveMode::DriveRamp { module: index, volts } => {
                for (i, module) in self.modules.iter_mut().enumerate() {
                    if i == index {
                        module.run_drive_volts(volts);
                    } else {
                        module.stop();
                    }
                }
                (Vec::new(), Vec::new())
            }
            DriveMode::TurnRamp { module: index, volts } => {
                for (i, module) in self.modules.iter_mut().enumerate() {
                    if i == index {
                        module.run_turn_volts(volts);
                    } else {
                        module.stop();
                    }
                }
                (Vec::new(), Vec::new())
            }
        }
    }

    /// Set the robot-relative velocity used from the next cycle on
    pub fn run_velocity(&mut self, speeds: ChassisSpeeds) {
        self.setpoint = speeds;
        self.mode = DriveMode::Velocity;
    }

    pub fn stop(&mut self) {
        self.run_velocity(ChassisSpeeds::default());
    }

    /// Stop with the wheels in an X so the robot resists being pushed
    ///
    /// The wheels return to normal the next time a nonzero velocity is
    /// requested.
    pub fn stop_with_x(&mut self) {
        let headings = self.kinematics.translations().map(|t| t.angle());
        self.kinematics.reset_headings(headings);
        self.stop();
    }

    /// Open-loop drive voltage on every module for feedforward characterization
    pub fn run_characterization_volts(&mut self, volts: f64) {
        self.mode = DriveMode::Characterization { volts };
    }

    /// Open-loop drive voltage on one module, for testing its wiring
    pub fn run_drive_ramp_volts(&mut self, module: usize, volts: f64) {
        if module < NUM_MODULES {
            self.mode = DriveMode::DriveRamp { module, volts };
        } else {
            warn!("Ignoring drive ramp for module index {}", module);
        }
    }

    /// Open-loop turn voltage on one module, for testing its wiring
    pub fn run_turn_ramp_volts(&mut self, module: usize, volts: f64) {
        if module < NUM_MODULES {
            self.mode = DriveMode::TurnRamp { module, volts };
        } else {
            warn!("Ignoring turn ramp for module index {}", module);
        }
    }

    /// Mean drive velocity in rad/s
    pub fn characterization_velocity(&self) -> f64 {
        self.modules
            .iter()
            .map(Module::characterization_velocity)
            .sum::<f64>()
            / NUM_MODULES as f64
    }

    pub fn set_brake_mode(&mut self, enabled: bool) {
        for module in &mut self.modules {
            module.set_brake_mode(enabled);
        }
    }

    pub fn pose(&self) -> Pose2d {
        self.pose
    }

    pub fn rotation(&self) -> Rotation2d {
        self.pose.rotation()
    }

    /// Overwrite the odometry pose; no blending with the old estimate
    pub fn set_pose(&mut self, pose: Pose2d) {
        info!(
            "Pose reset to ({:.2}, {:.2}, {:.1} deg)",
            pose.x(),
            pose.y(),
            pose.rotation().degrees()
        );
        self.pose = pose;
    }

    pub fn reset_field_heading(&mut self) {
        self.gyro_io.reset_imu();
    }

    /// Measured field-frame velocity: m/s for x/y, rad/s for rotation
    pub fn field_velocity(&self) -> Twist2d {
        self.field_velocity
    }

    pub fn yaw_velocity(&self) -> f64 {
        self.gyro_inputs.yaw_velocity_rad_per_sec
    }

    pub fn measured_states(&self) -> [SwerveModuleState; NUM_MODULES] {
        self.measured_states
    }

    /// Robot-relative velocity from the measured module states
    pub fn chassis_speeds(&self) -> ChassisSpeeds {
        self.kinematics.to_chassis_speeds(&self.measured_states)
    }

    pub fn module_translations(&self) -> [Translation2d; NUM_MODULES] {
        *self.kinematics.translations()
    }

    pub fn max_linear_speed(&self) -> f64 {
        self.config.max_linear_speed
    }

    pub fn max_angular_speed(&self) -> f64 {
        self.config.max_angular_speed()
    }

    pub fn mode(&self) -> DriveMode {
        self.mode
    }

    pub fn setpoint(&self) -> ChassisSpeeds {
        self.setpoint
    }
}
