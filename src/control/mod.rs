// Feedback and feedforward building blocks shared by the mechanisms
//
// Provides:
// - PID feedback with optional continuous (wrapping) input
// - Motor and arm feedforward models
// - Trapezoidal motion profiles for position-seeking mechanisms

mod feedforward;
mod pid;
mod profile;

pub use feedforward::{ArmFeedforward, SimpleMotorFeedforward};
pub use pid::{PidController, PidGains};
pub use profile::{Constraints, ProfileState, TrapezoidProfile};

/// Sign of `value`, with zero mapping to zero (unlike `f64::signum`)
pub(crate) fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}
