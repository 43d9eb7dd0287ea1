// Hardware boundary for the yaw sensor

use serde::Serialize;

use crate::geometry::Rotation2d;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct GyroIoInputs {
    /// False means the readings below must not be trusted this cycle
    pub connected: bool,
    pub yaw_position: Rotation2d,
    pub yaw_velocity_rad_per_sec: f64,
}

/// Yaw sensor capability; the defaults describe a gyro that is not there
pub trait GyroIo {
    fn update_inputs(&mut self) -> GyroIoInputs {
        GyroIoInputs::default()
    }

    /// Re-zero the sensor's yaw
    fn reset_imu(&mut self) {}
}

/// Permanently disconnected gyro; the drive falls back to wheel odometry
#[derive(Debug, Default)]
pub struct NoGyro;

impl GyroIo for NoGyro {}
