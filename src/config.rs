// Timeouts, topics, robot geometry and tuning
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::control::{ArmFeedforward, PidGains, SimpleMotorFeedforward};
use crate::drive::kinematics::{KinematicsError, NUM_MODULES};
use crate::geometry::Translation2d;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;
pub const LOOP_PERIOD_SECS: f64 = 0.02;

// Driver station watchdog: the robot disables itself when enable packets stop
pub const DS_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD_DRIVE: &str = "robot/cmd/drive"; // velocity / stop / x-lock / characterization
pub const TOPIC_CMD_ARM: &str = "robot/cmd/arm";
pub const TOPIC_CMD_INTAKE: &str = "robot/cmd/intake";
pub const TOPIC_CMD_PATH: &str = "robot/cmd/path"; // trajectory setpoints from the path planner
pub const TOPIC_DS_CONTROL: &str = "robot/ds/control"; // enable/disable heartbeat
pub const TOPIC_TELEMETRY: &str = "robot/telemetry";
pub const TOPIC_HEALTH: &str = "robot/state/health";

// Field length along x, used to mirror paths for the red alliance
pub const FIELD_LENGTH_METERS: f64 = 16.541;

/// Problems with the robot configuration; all of them are fatal at startup
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid {field} = {value}: must be {requirement}")]
    Invalid {
        field: &'static str,
        value: f64,
        requirement: &'static str,
    },

    #[error("Invalid module layout: {0}")]
    Kinematics(#[from] KinematicsError),
}

fn require_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            value,
            requirement: "finite and greater than zero",
        })
    }
}

/// Whole-robot configuration, loadable from JSON
///
/// Missing fields fall back to the defaults below.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub drive: DriveConfig,
    pub arm: ArmConfig,
    pub intake: IntakeConfig,
}

impl RobotConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: RobotConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.drive.validate()?;
        self.arm.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Distance between front and back module centers, m
    pub track_width_x: f64,
    /// Distance between left and right module centers, m
    pub track_width_y: f64,
    pub wheel_radius: f64,
    pub max_linear_speed: f64,
    pub loop_period_secs: f64,
    /// Drive motor feedforward, volts per wheel rad/s
    pub drive_feedforward: SimpleMotorFeedforward,
    pub drive_feedback: PidGains,
    /// Turn angle feedback, volts per radian of error
    pub turn_feedback: PidGains,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            track_width_x: 0.5588,
            track_width_y: 0.5588,
            wheel_radius: 0.0508,
            max_linear_speed: 4.42,
            loop_period_secs: LOOP_PERIOD_SECS,
            drive_feedforward: SimpleMotorFeedforward::new(0.0, 0.13),
            drive_feedback: PidGains::proportional(0.1),
            turn_feedback: PidGains::proportional(10.0),
        }
    }
}

impl DriveConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("drive.track_width_x", self.track_width_x)?;
        require_positive("drive.track_width_y", self.track_width_y)?;
        require_positive("drive.wheel_radius", self.wheel_radius)?;
        require_positive("drive.max_linear_speed", self.max_linear_speed)?;
        require_positive("drive.loop_period_secs", self.loop_period_secs)?;
        Ok(())
    }

    /// Distance from the robot center to each module
    pub fn drive_base_radius(&self) -> f64 {
        (self.track_width_x / 2.0).hypot(self.track_width_y / 2.0)
    }

    pub fn max_angular_speed(&self) -> f64 {
        self.max_linear_speed / self.drive_base_radius()
    }

    /// Module centers relative to the robot center: FL, FR, BL, BR
    pub fn module_translations(&self) -> [Translation2d; NUM_MODULES] {
        let x = self.track_width_x / 2.0;
        let y = self.track_width_y / 2.0;
        [
            Translation2d::new(x, y),
            Translation2d::new(x, -y),
            Translation2d::new(-x, y),
            Translation2d::new(-x, -y),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmConfig {
    pub feedforward: ArmFeedforward,
    /// Profile limits, rad/s and rad/s^2
    pub max_velocity: f64,
    pub max_acceleration: f64,
    /// Joystick full scale in manual mode, rad/s
    pub max_manual_velocity: f64,
    // Preset angles, radians above horizontal
    pub amp_position: f64,
    pub trap_position: f64,
    pub drive_position: f64,
    pub intake_position: f64,
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            feedforward: ArmFeedforward::new(0.1, 0.4, 2.0, 0.0),
            max_velocity: 3.0,
            max_acceleration: 6.0,
            max_manual_velocity: 0.5,
            amp_position: 1.75,
            trap_position: 1.45,
            drive_position: 0.35,
            intake_position: 0.05,
        }
    }
}

impl ArmConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("arm.max_velocity", self.max_velocity)?;
        require_positive("arm.max_acceleration", self.max_acceleration)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    pub intake_volts: f64,
    pub eject_volts: f64,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            intake_volts: 8.0,
            eject_volts: 6.0,
        }
    }
}
