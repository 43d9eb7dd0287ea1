// One swerve module: closed-loop wheel speed and steering angle on top of a
// `ModuleIo`

use std::f64::consts::PI;

use tracing::debug;

use super::kinematics::{SwerveModulePosition, SwerveModuleState};
use super::module_io::{ModuleIo, ModuleIoInputs};
use crate::config::DriveConfig;
use crate::control::{PidController, SimpleMotorFeedforward};
use crate::geometry::Rotation2d;

pub const MODULE_NAMES: [&str; 4] = ["FrontLeft", "FrontRight", "BackLeft", "BackRight"];

pub struct Module {
    io: Box<dyn ModuleIo + Send>,
    index: usize,
    inputs: ModuleIoInputs,
    wheel_radius: f64,

    drive_feedforward: SimpleMotorFeedforward,
    drive_feedback: PidController,
    turn_feedback: PidController,

    // None while the module is stopped or running open loop
    angle_setpoint: Option<Rotation2d>,
    speed_setpoint: Option<f64>,

    // Relative encoder offset, latched from the absolute encoder's first reading
    turn_relative_offset: Option<Rotation2d>,
    last_position_meters: f64,
    position_delta: SwerveModulePosition,
}

impl Module {
    pub fn new(io: Box<dyn ModuleIo + Send>, index: usize, config: &DriveConfig) -> Self {
        let mut turn_feedback = PidController::new(config.turn_feedback, config.loop_period_secs);
        turn_feedback.enable_continuous_input(-PI, PI);

        Self {
            io,
            index,
            inputs: ModuleIoInputs::default(),
            wheel_radius: config.wheel_radius,
            drive_feedforward: config.drive_feedforward,
            drive_feedback: PidController::new(config.drive_feedback, config.loop_period_secs),
            turn_feedback,
            angle_setpoint: None,
            speed_setpoint: None,
            turn_relative_offset: None,
            last_position_meters: 0.0,
            position_delta: SwerveModulePosition::default(),
        }
    }

    /// Take this cycle's sensor snapshot and the odometry delta since the last one
    pub fn periodic(&mut self) {
        self.inputs = self.io.update_inputs();

        if self.turn_relative_offset.is_none()
            && self.inputs.turn_absolute_position.radians() != 0.0
        {
            let offset = self.inputs.turn_absolute_position - self.inputs.turn_position;
            debug!(
                "Module {} turn offset latched at {:.3} rad",
                MODULE_NAMES[self.index],
                offset.radians()
            );
            self.turn_relative_offset = Some(offset);
        }

        // Distance since last cycle, heading from this cycle
        let position = self.position_meters();
        self.position_delta =
            SwerveModulePosition::new(position - self.last_position_meters, self.angle());
        self.last_position_meters = position;
    }

    fn apply_closed_loop(&mut self) {
        let Some(angle_setpoint) = self.angle_setpoint else {
            return;
        };

        let turn_volts = self
            .turn_feedback
            .calculate(self.angle().radians(), angle_setpoint.radians());
        self.io.set_turn_voltage(turn_volts);

        if let Some(speed_setpoint) = self.speed_setpoint {
            // Drive speed shrinks with the cosine of the remaining turn error
            let adjusted_speed = speed_setpoint * self.turn_feedback.position_error().cos();
            let velocity_rad_per_sec = adjusted_speed / self.wheel_radius;

            let drive_volts = self.drive_feedforward.calculate(velocity_rad_per_sec)
                + self
                    .drive_feedback
                    .calculate(self.inputs.drive_velocity_rad_per_sec, velocity_rad_per_sec);
            self.io.set_drive_voltage(drive_volts);
        }
    }

    /// Track `state`, turning at most 90 degrees; returns the state actually tracked
    pub fn run_setpoint(&mut self, state: SwerveModuleState) -> SwerveModuleState {
        let optimized = state.optimize(self.angle());
        self.angle_setpoint = Some(optimized.angle);
        self.speed_setpoint = Some(optimized.speed);
        self.apply_closed_loop();
        optimized
    }

    /// Hold the wheel straight and drive it open loop at `volts`
    pub fn run_characterization(&mut self, volts: f64) {
        self.angle_setpoint = Some(Rotation2d::ZERO);
        self.speed_setpoint = None;
        self.apply_closed_loop();
        self.io.set_drive_voltage(volts);
    }

    /// Raw drive motor voltage with the turn motor idle
    pub fn run_drive_volts(&mut self, volts: f64) {
        self.angle_setpoint = None;
        self.speed_setpoint = None;
        self.io.set_turn_voltage(0.0);
        self.io.set_drive_voltage(volts);
    }

    /// Raw turn motor voltage with the drive motor idle
    pub fn run_turn_volts(&mut self, volts: f64) {
        self.angle_setpoint = None;
        self.speed_setpoint = None;
        self.io.set_drive_voltage(0.0);
        self.io.set_turn_voltage(volts);
    }

    /// Zero both motors; the wheel stays where it is pointing
    pub fn stop(&mut self) {
        self.io.set_turn_voltage(0.0);
        self.io.set_drive_voltage(0.0);
        self.angle_setpoint = None;
        self.speed_setpoint = None;
    }

    pub fn set_brake_mode(&mut self, enabled: bool) {
        self.io.set_drive_brake_mode(enabled);
        self.io.set_turn_brake_mode(enabled);
    }

    pub fn angle(&self) -> Rotation2d {
        match self.turn_relative_offset {
            Some(offset) => self.inputs.turn_position + offset,
            None => Rotation2d::ZERO,
        }
    }

    pub fn position_meters(&self) -> f64 {
        self.inputs.drive_position_rad * self.wheel_radius
    }

    pub fn velocity_meters_per_sec(&self) -> f64 {
        self.inputs.drive_velocity_rad_per_sec * self.wheel_radius
    }

    pub fn position(&self) -> SwerveModulePosition {
        SwerveModulePosition::new(self.position_meters(), self.angle())
    }

    pub fn position_delta(&self) -> SwerveModulePosition {
        self.position_delta
    }

    /// Measured speed and heading
    pub fn state(&self) -> SwerveModuleState {
        SwerveModuleState::new(self.velocity_meters_per_sec(), self.angle())
    }

    /// Drive velocity in rad/s, for feedforward characterization
    pub fn characterization_velocity(&self) -> f64 {
        self.inputs.drive_velocity_rad_per_sec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::module_io::ModuleIoSim;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorded {
        inputs: ModuleIoInputs,
        drive_volts: Option<f64>,
        turn_volts: Option<f64>,
        brake: Option<bool>,
    }

    struct RecordingIo(Arc<Mutex<Recorded>>);

    impl ModuleIo for RecordingIo {
        fn update_inputs(&mut self) -> ModuleIoInputs {
            self.0.lock().unwrap().inputs
        }

        fn set_drive_voltage(&mut self, volts: f64) {
            self.0.lock().unwrap().drive_volts = Some(volts);
        }

        fn set_turn_voltage(&mut self, volts: f64) {
            self.0.lock().unwrap().turn_volts = Some(volts);
        }

        fn set_drive_brake_mode(&mut self, enable: bool) {
            self.0.lock().unwrap().brake = Some(enable);
        }
    }

    fn recording_module() -> (Module, Arc<Mutex<Recorded>>) {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let module = Module::new(
            Box::new(RecordingIo(recorded.clone())),
            0,
            &DriveConfig::default(),
        );
        (module, recorded)
    }

    fn point_wheel(recorded: &Arc<Mutex<Recorded>>, radians: f64) {
        let mut recorded = recorded.lock().unwrap();
        recorded.inputs.turn_absolute_position = Rotation2d::new(radians);
        recorded.inputs.turn_position = Rotation2d::new(radians);
    }

    #[test]
    fn setpoint_behind_the_wheel_is_flipped() {
        let (mut module, recorded) = recording_module();
        point_wheel(&recorded, 0.2);
        module.periodic();

        let tracked =
            module.run_setpoint(SwerveModuleState::new(1.0, Rotation2d::from_degrees(180.0)));
        assert!((tracked.speed + 1.0).abs() < 1e-9);
        assert!(tracked.angle.degrees().abs() < 1e-9);

        let recorded = recorded.lock().unwrap();
        // Turning back toward zero from +0.2 rad, driving backwards
        assert!(recorded.turn_volts.unwrap() < 0.0);
        assert!(recorded.drive_volts.unwrap() < 0.0);
    }

    #[test]
    fn stop_zeroes_both_motors() {
        let (mut module, recorded) = recording_module();
        module.periodic();
        module.run_setpoint(SwerveModuleState::new(2.0, Rotation2d::ZERO));
        module.stop();

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.drive_volts, Some(0.0));
        assert_eq!(recorded.turn_volts, Some(0.0));
    }

    #[test]
    fn characterization_bypasses_velocity_loop() {
        let (mut module, recorded) = recording_module();
        module.periodic();
        module.run_characterization(3.5);
        assert_eq!(recorded.lock().unwrap().drive_volts, Some(3.5));

        module.run_drive_volts(-2.0);
        let snapshot = recorded.lock().unwrap();
        assert_eq!(snapshot.drive_volts, Some(-2.0));
        assert_eq!(snapshot.turn_volts, Some(0.0));
    }

    #[test]
    fn position_delta_pairs_new_distance_with_current_angle() {
        let (mut module, recorded) = recording_module();
        point_wheel(&recorded, 0.5);
        module.periodic();

        {
            let mut recorded = recorded.lock().unwrap();
            recorded.inputs.drive_position_rad = 10.0;
            recorded.inputs.turn_absolute_position = Rotation2d::new(1.0);
            recorded.inputs.turn_position = Rotation2d::new(1.0);
        }
        module.periodic();

        let delta = module.position_delta();
        assert!((delta.distance - 10.0 * DriveConfig::default().wheel_radius).abs() < 1e-9);
        assert!((delta.angle.radians() - 1.0).abs() < 1e-9);
        assert_eq!(module.position().distance, delta.distance);

        module.periodic();
        assert!(module.position_delta().distance.abs() < 1e-9);
    }

    #[test]
    fn brake_mode_reaches_io() {
        let (mut module, recorded) = recording_module();
        module.set_brake_mode(true);
        assert_eq!(recorded.lock().unwrap().brake, Some(true));
    }

    #[test]
    fn simulated_module_tracks_setpoint() {
        let config = DriveConfig::default();
        let io = ModuleIoSim::new(Rotation2d::new(0.3), config.loop_period_secs);
        let mut module = Module::new(Box::new(io), 1, &config);
        let target = SwerveModuleState::new(2.0, Rotation2d::from_degrees(45.0));

        for _ in 0..150 {
            module.periodic();
            module.run_setpoint(target);
        }

        let measured = module.state();
        assert!((measured.angle.degrees() - 45.0).abs() < 1.0, "{measured:?}");
        assert!((measured.speed - 2.0).abs() < 0.1, "{measured:?}");
    }
}
