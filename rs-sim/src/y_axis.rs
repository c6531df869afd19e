use tracing::{trace, warn};

use crate::float_to_double;

/// Java computes drag as a double times `0.98F`, which widens to 0.9800000190734863.
pub const FAULTY_DRAG: f64 = 0.98f32 as f64;
const GRAVITY: f64 = 0.08;
const SLOW_FALLING_GRAVITY: f64 = 0.01;
const MAX_DRIFT: f64 = 1.0e-4;
const DRIFT_LOG_INTERVAL: u64 = 20;

/// What the simulator reads from one movement report.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VerticalInput {
    pub y_position: f32,
    /// Client velocity at the end of this tick.
    pub delta_y: f32,
    pub handle_teleport: bool,
    pub gliding: bool,
    pub in_vehicle: bool,
    pub touching_water: bool,
    pub last_tick_end_velocity_y: f32,
    pub entity_y: f32,
    pub jumped_on_ground: bool,
    pub jump_velocity: f32,
    pub colliding_vertically: bool,
}

/// Tracks the vertical position the way a Java client would, with its
/// float/double mix, so anticheats see the values they expect.
#[derive(Debug, Clone)]
pub struct YAxisSimulator {
    last_fp_y_position: f32,
    double_y_position: f64,
    /// `f64::MAX` until seeded from the client.
    velocity: f64,
    ticks: u64,
}

impl Default for YAxisSimulator {
    fn default() -> Self {
        Self {
            last_fp_y_position: 0.0,
            double_y_position: 0.0,
            velocity: f64::MAX,
            ticks: 0,
        }
    }
}

impl YAxisSimulator {
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn reset(&mut self) {
        self.velocity = f64::MAX;
    }

    pub fn simulate(&mut self, input: &VerticalInput) -> f64 {
        self.ticks += 1;

        // Anticheats exempt these; Bedrock and Java disagree too much to model.
        if input.gliding || input.in_vehicle || input.touching_water {
            self.velocity = f64::MAX;
            return float_to_double(input.y_position);
        }

        let last_end_velocity = input.last_tick_end_velocity_y;
        if self.velocity == f64::MAX {
            self.velocity = float_to_double(last_end_velocity);
            self.last_fp_y_position = input.entity_y;
            self.double_y_position = float_to_double(input.entity_y);
        }

        if input.handle_teleport {
            self.last_fp_y_position = input.y_position;
            self.double_y_position = float_to_double(input.y_position);
            self.velocity = float_to_double(input.delta_y);
            return self.double_y_position;
        }

        let delta_y = input.y_position - self.last_fp_y_position;
        let mut final_delta_y = float_to_double(delta_y);

        if input.jumped_on_ground {
            if (delta_y - input.jump_velocity).abs() as f64 <= MAX_DRIFT {
                self.velocity = input.jump_velocity as f64;
            } else {
                self.velocity = final_delta_y;
            }
        }

        if input.colliding_vertically {
            let collided = float_to_double(delta_y - last_end_velocity);
            let guessed = self.velocity + collided;
            if (guessed - delta_y as f64).abs() < MAX_DRIFT {
                final_delta_y = guessed;
            }
            self.velocity = 0.0;
        } else {
            final_delta_y = self.velocity;
        }

        let slow_falling = (((input.delta_y / 0.98f32) - 0.01f32) as f64 - self.velocity).abs() < 1.0e-3;
        let gravity = if slow_falling { SLOW_FALLING_GRAVITY } else { GRAVITY };
        self.velocity = (self.velocity - gravity) * FAULTY_DRAG;

        self.last_fp_y_position = input.y_position;
        self.double_y_position += final_delta_y;

        if input.colliding_vertically && last_end_velocity < 0.0 {
            self.double_y_position = float_to_double(input.y_position);
        }

        let client_y = float_to_double(input.y_position);
        let diff = (self.double_y_position - client_y).abs();
        if diff > MAX_DRIFT {
            warn!(
                "Vertical desync of {}: simulated {}, client {}, velocity {}, delta {}",
                diff, self.double_y_position, input.y_position, self.velocity, input.delta_y
            );
            self.double_y_position = client_y;
            self.velocity = float_to_double(input.delta_y / 0.98f32) * FAULTY_DRAG;
        } else if self.ticks % DRIFT_LOG_INTERVAL == 0 {
            trace!(
                "Vertical drift {}: simulated {}, client {}, velocity {}",
                diff, self.double_y_position, input.y_position, self.velocity
            );
        }

        self.double_y_position
    }
}
