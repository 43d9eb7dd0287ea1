// 50 Hz robot loop with a driver-station watchdog
// The robot is only enabled while enable packets keep arriving: if the driver
// station crashes or the link drops, the robot disables itself within DS_TIMEOUT

use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use tokio::time::interval;
use tracing::{debug, info, warn};
use zenoh::handlers::FifoChannelHandler;
use zenoh::pubsub::Subscriber;
use zenoh::sample::Sample;

use crate::config::{
    LOOP_HZ, RobotConfig, TOPIC_CMD_ARM, TOPIC_CMD_DRIVE, TOPIC_CMD_INTAKE, TOPIC_CMD_PATH,
    TOPIC_DS_CONTROL, TOPIC_HEALTH, TOPIC_TELEMETRY,
};
use crate::messages::{
    ArmCommand, DriveCommand, DriverStationPacket, IntakeCommand, PathCommand, RobotTelemetry,
    RuntimeHealth,
};
use crate::robot::Robot;

pub struct Runtime {
    robot: Robot,
    ds_packet: Option<DriverStationPacket>,
    ds_received_at: Instant,
    ds_timeout: Duration,
    health: RuntimeHealth,
}

impl Runtime {
    pub fn new(robot: Robot, ds_timeout: Duration) -> Self {
        Self {
            robot,
            ds_packet: None,
            ds_received_at: Instant::now(),
            ds_timeout,
            health: RuntimeHealth::DsStale, // Start stale until first packet
        }
    }

    fn on_ds_packet(&mut self, packet: DriverStationPacket, now: Instant) {
        let was_red = self.ds_packet.is_some_and(|p| p.red_alliance);
        if self.ds_packet.is_none() || packet.red_alliance != was_red {
            self.robot.set_red_alliance(packet.red_alliance);
        }
        self.ds_packet = Some(packet);
        self.ds_received_at = now;
    }

    /// Whether the robot may move this cycle (includes watchdog logic)
    fn check_enabled(&mut self, now: Instant) -> bool {
        let packet_age = now.saturating_duration_since(self.ds_received_at);

        match self.ds_packet {
            Some(_) if packet_age > self.ds_timeout => {
                // Watchdog triggered - disable the robot
                if self.health != RuntimeHealth::DsStale {
                    warn!("Driver station stale ({:?} old), disabling robot", packet_age);
                }
                self.health = RuntimeHealth::DsStale;
                false
            }
            Some(packet) if packet.enabled => {
                self.health = RuntimeHealth::Ok;
                true
            }
            Some(_) => {
                self.health = RuntimeHealth::Disabled;
                false
            }
            None => {
                // No packet ever received
                self.health = RuntimeHealth::DsStale;
                false
            }
        }
    }

    fn step(&mut self, now: Instant) -> RobotTelemetry {
        let enabled = self.check_enabled(now);
        self.robot.periodic(enabled)
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }
}

/// Non-blocking: take every pending sample, skipping ones that do not parse
fn drain<T: DeserializeOwned>(
    subscriber: &Subscriber<FifoChannelHandler<Sample>>,
    topic: &str,
) -> Vec<T> {
    let mut messages = Vec::new();
    while let Ok(Some(sample)) = subscriber.try_recv() {
        let payload = sample.payload().to_bytes();
        match serde_json::from_slice::<T>(&payload) {
            Ok(message) => messages.push(message),
            Err(e) => warn!("Failed to parse message on {}: {}", topic, e),
        }
    }
    messages
}

pub async fn run(
    config: RobotConfig,
    ds_timeout: Duration,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let robot = Robot::simulated(&config)?;

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let sub_drive = session.declare_subscriber(TOPIC_CMD_DRIVE).await?;
    let sub_arm = session.declare_subscriber(TOPIC_CMD_ARM).await?;
    let sub_intake = session.declare_subscriber(TOPIC_CMD_INTAKE).await?;
    let sub_path = session.declare_subscriber(TOPIC_CMD_PATH).await?;
    let sub_ds = session.declare_subscriber(TOPIC_DS_CONTROL).await?;
    let pub_telemetry = session.declare_publisher(TOPIC_TELEMETRY).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut runtime = Runtime::new(robot, ds_timeout);
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!(
        "Runtime started: {}Hz loop, {}ms driver station timeout",
        LOOP_HZ,
        ds_timeout.as_millis()
    );
    info!(
        "Subscribed to: {}, {}, {}, {}, {}",
        TOPIC_CMD_DRIVE, TOPIC_CMD_ARM, TOPIC_CMD_INTAKE, TOPIC_CMD_PATH, TOPIC_DS_CONTROL
    );
    info!("Publishing to: {}, {}", TOPIC_TELEMETRY, TOPIC_HEALTH);

    loop {
        tick.tick().await;
        let now = Instant::now();

        // 1. Drain all pending messages (non-blocking); later commands overwrite earlier ones
        for packet in drain::<DriverStationPacket>(&sub_ds, TOPIC_DS_CONTROL) {
            runtime.on_ds_packet(packet, now);
        }
        for cmd in drain::<DriveCommand>(&sub_drive, TOPIC_CMD_DRIVE) {
            debug!("Drive command: {:?}", cmd);
            runtime.robot.on_drive_command(cmd);
        }
        for cmd in drain::<ArmCommand>(&sub_arm, TOPIC_CMD_ARM) {
            debug!("Arm command: {:?}", cmd);
            runtime.robot.on_arm_command(cmd);
        }
        for cmd in drain::<IntakeCommand>(&sub_intake, TOPIC_CMD_INTAKE) {
            runtime.robot.on_intake_command(cmd);
        }
        for cmd in drain::<PathCommand>(&sub_path, TOPIC_CMD_PATH) {
            runtime.robot.on_path_command(cmd);
        }

        // 2. Step every subsystem (includes watchdog logic)
        let telemetry = runtime.step(now);

        // 3. Publish telemetry
        let telemetry_json = serde_json::to_string(&telemetry)?;
        pub_telemetry.put(telemetry_json).await?;

        // 4. Publish health
        let health_json = serde_json::to_string(&runtime.health)?;
        pub_health.put(health_json).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DS_TIMEOUT;

    fn runtime() -> Runtime {
        let robot = Robot::simulated(&RobotConfig::default()).unwrap();
        Runtime::new(robot, DS_TIMEOUT)
    }

    fn enable_packet() -> DriverStationPacket {
        DriverStationPacket {
            enabled: true,
            red_alliance: false,
        }
    }

    #[test]
    fn starts_stale_and_disabled() {
        let mut runtime = runtime();
        let telemetry = runtime.step(Instant::now());
        assert!(!telemetry.enabled);
        assert_eq!(runtime.health(), RuntimeHealth::DsStale);
    }

    #[test]
    fn fresh_enable_packet_enables() {
        let mut runtime = runtime();
        let now = Instant::now();
        runtime.on_ds_packet(enable_packet(), now);
        runtime.robot.on_drive_command(DriveCommand::Velocity {
            vx: 1.0,
            vy: 0.0,
            omega: 0.0,
            field_relative: false,
        });

        let telemetry = runtime.step(now + Duration::from_millis(20));
        assert!(telemetry.enabled);
        assert_eq!(telemetry.drive.setpoints.len(), 4);
        assert_eq!(runtime.health(), RuntimeHealth::Ok);
    }

    #[test]
    fn watchdog_disables_after_timeout() {
        let mut runtime = runtime();
        let now = Instant::now();
        runtime.on_ds_packet(enable_packet(), now);

        let telemetry = runtime.step(now + DS_TIMEOUT + Duration::from_millis(1));
        assert!(!telemetry.enabled);
        assert!(telemetry.drive.setpoints.is_empty());
        assert_eq!(runtime.health(), RuntimeHealth::DsStale);
    }

    #[test]
    fn explicit_disable_is_not_stale() {
        let mut runtime = runtime();
        let now = Instant::now();
        runtime.on_ds_packet(
            DriverStationPacket {
                enabled: false,
                red_alliance: true,
            },
            now,
        );

        assert!(!runtime.step(now).enabled);
        assert_eq!(runtime.health(), RuntimeHealth::Disabled);
    }
}
