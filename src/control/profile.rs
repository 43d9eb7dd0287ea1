// Trapezoidal motion profile: accelerate at a fixed rate, cruise at a
// velocity cap, decelerate into the goal

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    pub max_velocity: f64,
    pub max_acceleration: f64,
}

impl Constraints {
    pub fn new(max_velocity: f64, max_acceleration: f64) -> Self {
        Self {
            max_velocity,
            max_acceleration,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProfileState {
    pub position: f64,
    pub velocity: f64,
}

impl ProfileState {
    pub fn new(position: f64, velocity: f64) -> Self {
        Self { position, velocity }
    }

    fn scaled(self, direction: f64) -> Self {
        Self::new(self.position * direction, self.velocity * direction)
    }
}

/// Phase boundaries of one profile, in seconds from its start
struct Phases {
    direction: f64,
    current: ProfileState,
    goal: ProfileState,
    end_accel: f64,
    end_full_speed: f64,
    end_decel: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct TrapezoidProfile {
    constraints: Constraints,
}

impl TrapezoidProfile {
    pub fn new(constraints: Constraints) -> Self {
        Self { constraints }
    }

    fn phases(&self, current: ProfileState, goal: ProfileState) -> Phases {
        let Constraints {
            max_velocity,
            max_acceleration,
        } = self.constraints;

        // Solve every profile as if it moved in the positive direction
        let direction = if current.position > goal.position {
            -1.0
        } else {
            1.0
        };
        let mut current = current.scaled(direction);
        let goal = goal.scaled(direction);
        current.velocity = current.velocity.min(max_velocity);

        let cutoff_begin = current.velocity / max_acceleration;
        let cutoff_dist_begin = cutoff_begin * cutoff_begin * max_acceleration / 2.0;
        let cutoff_end = goal.velocity / max_acceleration;
        let cutoff_dist_end = cutoff_end * cutoff_end * max_acceleration / 2.0;

        let full_trapezoid_dist =
            cutoff_dist_begin + (goal.position - current.position) + cutoff_dist_end;
        let mut acceleration_time = max_velocity / max_acceleration;
        let mut full_speed_dist =
            full_trapezoid_dist - acceleration_time * acceleration_time * max_acceleration;

        // Triangle profile: never reaches the velocity cap
        if full_speed_dist < 0.0 {
            acceleration_time = (full_trapezoid_dist / max_acceleration).sqrt();
            full_speed_dist = 0.0;
        }

        let end_accel = acceleration_time - cutoff_begin;
        let end_full_speed = end_accel + full_speed_dist / max_velocity;
        let end_decel = end_full_speed + acceleration_time - cutoff_end;

        Phases {
            direction,
            current,
            goal,
            end_accel,
            end_full_speed,
            end_decel,
        }
    }

    /// State `t` seconds after starting at `current` on the way to `goal`
    pub fn calculate(&self, t: f64, current: ProfileState, goal: ProfileState) -> ProfileState {
        let Constraints {
            max_velocity,
            max_acceleration,
        } = self.constraints;
        let phases = self.phases(current, goal);
        let Phases { current, goal, .. } = phases;

        let mut result = current;
        if t < phases.end_accel {
            result.velocity += t * max_acceleration;
            result.position += (current.velocity + t * max_acceleration / 2.0) * t;
        } else if t < phases.end_full_speed {
            result.velocity = max_velocity;
            result.position += (current.velocity + phases.end_accel * max_acceleration / 2.0)
                * phases.end_accel
                + max_velocity * (t - phases.end_accel);
        } else if t <= phases.end_decel {
            let time_left = phases.end_decel - t;
            result.velocity = goal.velocity + time_left * max_acceleration;
            result.position =
                goal.position - (goal.velocity + time_left * max_acceleration / 2.0) * time_left;
        } else {
            result = goal;
        }

        result.scaled(phases.direction)
    }

    /// Seconds from `current` until the profile settles on `goal`
    pub fn total_time(&self, current: ProfileState, goal: ProfileState) -> f64 {
        self.phases(current, goal).end_decel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaches_goal_and_respects_velocity_cap() {
        let profile = TrapezoidProfile::new(Constraints::new(1.0, 2.0));
        let goal = ProfileState::new(3.0, 0.0);
        let mut state = ProfileState::default();

        for _ in 0..500 {
            state = profile.calculate(0.02, state, goal);
            assert!(state.velocity <= 1.0 + 1e-9);
        }
        assert!((state.position - 3.0).abs() < 1e-9);
        assert!(state.velocity.abs() < 1e-9);
    }

    #[test]
    fn moves_backwards_when_goal_is_behind() {
        let profile = TrapezoidProfile::new(Constraints::new(1.0, 2.0));
        let next = profile.calculate(0.1, ProfileState::new(1.0, 0.0), ProfileState::default());
        assert!(next.position < 1.0);
        assert!(next.velocity < 0.0);
    }

    #[test]
    fn total_time_of_a_full_trapezoid() {
        // 0.5 s up to speed, 0.5 s down, 2 m cruise at 1 m/s
        let profile = TrapezoidProfile::new(Constraints::new(1.0, 2.0));
        let time = profile.total_time(ProfileState::default(), ProfileState::new(2.5, 0.0));
        assert!((time - 3.0).abs() < 1e-9);
    }
}
