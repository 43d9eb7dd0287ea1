// Keyboard teleop: WASD move, Z/X rotate, R/F speed, C x-lock, G field/robot
// relative, Space enable/disable, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::{Duration, Instant};
use tracing::info;

use swerve_zenoh_runtime::config::{TOPIC_CMD_DRIVE, TOPIC_DS_CONTROL};
use swerve_zenoh_runtime::messages::{DriveCommand, DriverStationPacket};

const SPEEDS: [f64; 3] = [0.5, 1.5, 3.0]; // m/s
const THETA_SPEEDS: [f64; 3] = [45.0, 90.0, 180.0]; // deg/s
const INPUT_TIMEOUT_MS: u64 = 100; // Reset velocities after this much time with no input

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let pub_drive = session.declare_publisher(TOPIC_CMD_DRIVE).await?;
    let pub_ds = session.declare_publisher(TOPIC_DS_CONTROL).await?;

    info!("Controls: WASD=move, Z/X=rotate, R/F=speed, Q=quit");
    info!("          C=x-lock, G=field relative, Space=enable/disable");
    info!("Speed: LOW, robot DISABLED");

    enable_raw_mode()?;
    let result = run_teleop(&pub_drive, &pub_ds).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    pub_drive: &zenoh::pubsub::Publisher<'_>,
    pub_ds: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut speed_idx: usize = 0;
    let mut enabled = false;
    let mut field_relative = false;
    let mut x_lock = false;

    // Persistent velocity state
    let mut vx = 0.0;
    let mut vy = 0.0;
    let mut omega_deg = 0.0;
    let mut last_movement_input = Instant::now();

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;
                let moved = matches!(
                    code,
                    KeyCode::Char('w' | 's' | 'a' | 'd' | 'z' | 'x')
                );
                if pressed && moved {
                    last_movement_input = Instant::now();
                    x_lock = false;
                }

                match code {
                    KeyCode::Char('w') if pressed => vx = SPEEDS[speed_idx],
                    KeyCode::Char('s') if pressed => vx = -SPEEDS[speed_idx],
                    KeyCode::Char('a') if pressed => vy = SPEEDS[speed_idx],
                    KeyCode::Char('d') if pressed => vy = -SPEEDS[speed_idx],

                    // Rotation
                    KeyCode::Char('z') if pressed => omega_deg = THETA_SPEEDS[speed_idx],
                    KeyCode::Char('x') if pressed => omega_deg = -THETA_SPEEDS[speed_idx],

                    // Speed control
                    KeyCode::Char('r') if pressed => {
                        speed_idx = (speed_idx + 1).min(2);
                        print_speed(speed_idx);
                    }
                    KeyCode::Char('f') if pressed => {
                        speed_idx = speed_idx.saturating_sub(1);
                        print_speed(speed_idx);
                    }

                    KeyCode::Char('c') if pressed => {
                        x_lock = true;
                        info!("X-lock");
                    }
                    KeyCode::Char('g') if pressed => {
                        field_relative = !field_relative;
                        info!("Field relative: {}", field_relative);
                    }
                    KeyCode::Char(' ') if kind == KeyEventKind::Press => {
                        enabled = !enabled;
                        info!("Robot {}", if enabled { "ENABLED" } else { "DISABLED" });
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => {}
                }
            }
        }

        // Reset velocities if no movement input for INPUT_TIMEOUT_MS
        if last_movement_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            vx = 0.0;
            vy = 0.0;
            omega_deg = 0.0;
        }

        // Always publish at ~50Hz so the runtime's watchdog stays fed
        let packet = DriverStationPacket {
            enabled,
            red_alliance: false,
        };
        pub_ds.put(serde_json::to_string(&packet)?).await?;

        let cmd = if x_lock {
            DriveCommand::StopWithX
        } else {
            DriveCommand::Velocity {
                vx,
                vy,
                omega: f64::to_radians(omega_deg),
                field_relative,
            }
        };
        pub_drive.put(serde_json::to_string(&cmd)?).await?;
    }

    // Leave the robot disabled on the way out
    let packet = DriverStationPacket::default();
    pub_ds.put(serde_json::to_string(&packet)?).await?;

    Ok(())
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {}", label);
}
