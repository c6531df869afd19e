pub mod bounding_box;
pub mod collision;
pub mod manager;
pub mod piston;
pub mod shared;
pub mod world;
pub mod y_axis;

pub use bounding_box::BoundingBox;
pub use collision::{BlockCollision, CollisionRegistry, CollisionTableError, ScaffoldingContact};
pub use manager::{ClientUpdate, CollisionContext, CollisionManager, CollisionResult, PlayerState};
pub use piston::{NoPistons, PistonCache, PistonState};
pub use shared::{Axis, Direction};
pub use world::{BlockRange, ChunkCache, WorldView};
pub use y_axis::{VerticalInput, YAxisSimulator};

/// Slack used everywhere boxes are compared, and the gap kept between the player and walls.
pub const COLLISION_TOLERANCE: f64 = 0.00001;
pub const PLAYER_STEP_UP: f64 = 0.6;
/// Squared distance between reported and corrected movement that triggers a client correction.
pub const INCORRECT_MOVEMENT_THRESHOLD: f64 = 0.08;
pub const PLAYER_WIDTH: f64 = 0.6;
pub const PLAYER_HEIGHT: f64 = 1.8;
/// Bedrock reports the eye position; Java expects the feet.
pub const PLAYER_EYE_OFFSET: f32 = 1.62;

/// Widens through the shortest decimal form, so `0.1f32` becomes `0.1` and not `0.10000000149011612`.
pub fn float_to_double(value: f32) -> f64 {
    value.to_string().parse().unwrap_or(value as f64)
}
