use std::collections::{HashMap, HashSet};

use bevy::math::{DVec3, IVec3, Vec3};
use tracing::error;

use crate::bounding_box::BoundingBox;
use crate::collision::offset_against;
use crate::shared::Axis;

/// Largest distance pistons may move the player per tick, per axis.
pub const MAX_PLAYER_DISPLACEMENT: f64 = 0.51;

/// What the movement pipeline needs to know about pistons this tick.
pub trait PistonState {
    fn has_active_pistons(&self) -> bool;
    fn is_player_attached_to_honey(&self) -> bool;
    fn is_player_collided(&self) -> bool;
    fn is_player_slime_collision(&self) -> bool;
    fn player_motion(&self) -> Vec3;

    /// Restricts `offset` by the moving block starting at `pos`, if any.
    fn compute_collision_offset(
        &self,
        pos: IVec3,
        player: &BoundingBox,
        axis: Axis,
        offset: f64,
    ) -> f64;

    /// The moving block starting at `pos` overlaps `player`.
    fn check_collision(&self, pos: IVec3, player: &BoundingBox) -> bool;
}

/// No pistons anywhere.
pub struct NoPistons;

impl PistonState for NoPistons {
    fn has_active_pistons(&self) -> bool {
        false
    }

    fn is_player_attached_to_honey(&self) -> bool {
        false
    }

    fn is_player_collided(&self) -> bool {
        false
    }

    fn is_player_slime_collision(&self) -> bool {
        false
    }

    fn player_motion(&self) -> Vec3 {
        Vec3::ZERO
    }

    fn compute_collision_offset(
        &self,
        _pos: IVec3,
        _player: &BoundingBox,
        _axis: Axis,
        offset: f64,
    ) -> f64 {
        offset
    }

    fn check_collision(&self, _pos: IVec3, _player: &BoundingBox) -> bool {
        false
    }
}

/// A block being carried by a piston, keyed by its starting position.
#[derive(Debug, Clone)]
pub struct MovingBlock {
    pub piston: IVec3,
    pub boxes: Vec<BoundingBox>,
    /// Current displacement from the starting position.
    pub progress: DVec3,
}

#[derive(Debug, Default)]
pub struct PistonCache {
    pistons: HashSet<IVec3>,
    moving_blocks: HashMap<IVec3, MovingBlock>,
    player_displacement: DVec3,
    player_motion: Vec3,
    player_collided: bool,
    player_slime_collision: bool,
    player_attached_to_honey: bool,
}

impl PistonCache {
    /// Start of a tick: per-tick player effects are cleared.
    pub fn tick(&mut self) {
        self.player_displacement = DVec3::ZERO;
        self.player_motion = Vec3::ZERO;
        self.player_collided = false;
        self.player_slime_collision = false;
        self.player_attached_to_honey = false;

        if self.pistons.is_empty() && !self.moving_blocks.is_empty() {
            for (pos, block) in &self.moving_blocks {
                error!(
                    "Moving block at {} was previously owned by the piston at {}",
                    pos, block.piston
                );
            }
            self.moving_blocks.clear();
        }
    }

    pub fn add_piston(&mut self, pos: IVec3) {
        self.pistons.insert(pos);
    }

    /// Removes the piston and every block it was moving.
    pub fn remove_piston(&mut self, pos: IVec3) {
        self.pistons.remove(&pos);
        self.moving_blocks.retain(|_, block| block.piston != pos);
    }

    pub fn add_moving_block(&mut self, start: IVec3, block: MovingBlock) {
        self.moving_blocks.insert(start, block);
    }

    pub fn set_block_progress(&mut self, start: IVec3, progress: DVec3) {
        if let Some(block) = self.moving_blocks.get_mut(&start) {
            block.progress = progress;
        }
    }

    pub fn set_player_motion(&mut self, motion: Vec3) {
        self.player_motion = motion;
    }

    pub fn set_player_collided(&mut self, collided: bool) {
        self.player_collided = collided;
    }

    pub fn set_player_slime_collision(&mut self, collision: bool) {
        self.player_slime_collision = collision;
    }

    pub fn set_player_attached_to_honey(&mut self, attached: bool) {
        self.player_attached_to_honey = attached;
    }

    pub fn player_displacement(&self) -> DVec3 {
        self.player_displacement
    }

    /// Adds to this tick's displacement and returns the part still allowed
    /// under the per-tick clamp.
    pub fn clamp_displacement(&mut self, displacement: DVec3) -> DVec3 {
        let total = (self.player_displacement + displacement).clamp(
            DVec3::splat(-MAX_PLAYER_DISPLACEMENT),
            DVec3::splat(MAX_PLAYER_DISPLACEMENT),
        );
        let delta = total - self.player_displacement;
        self.player_displacement = total;
        delta
    }

    pub fn clear(&mut self) {
        self.pistons.clear();
        self.moving_blocks.clear();
    }
}

impl PistonState for PistonCache {
    fn has_active_pistons(&self) -> bool {
        !self.pistons.is_empty()
    }

    fn is_player_attached_to_honey(&self) -> bool {
        self.player_attached_to_honey
    }

    fn is_player_collided(&self) -> bool {
        self.player_collided
    }

    fn is_player_slime_collision(&self) -> bool {
        self.player_slime_collision
    }

    fn player_motion(&self) -> Vec3 {
        self.player_motion
    }

    fn compute_collision_offset(
        &self,
        pos: IVec3,
        player: &BoundingBox,
        axis: Axis,
        offset: f64,
    ) -> f64 {
        match self.moving_blocks.get(&pos) {
            Some(block) => {
                offset_against(&block.boxes, pos.as_dvec3() + block.progress, player, axis, offset)
                    .unwrap_or(0.0)
            }
            None => offset,
        }
    }

    fn check_collision(&self, pos: IVec3, player: &BoundingBox) -> bool {
        self.moving_blocks.get(&pos).is_some_and(|block| {
            let origin = pos.as_dvec3() + block.progress;
            block.boxes.iter().any(|b| b.check_intersection(origin, player))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displacement_is_clamped_per_tick() {
        let mut cache = PistonCache::default();
        let first = cache.clamp_displacement(DVec3::new(0.3, 0.0, -0.4));
        assert_eq!(first, DVec3::new(0.3, 0.0, -0.4));
        let second = cache.clamp_displacement(DVec3::new(0.3, 0.0, -0.4));
        assert!((second.x - 0.21).abs() < 1e-12);
        assert!((second.z + 0.11).abs() < 1e-12);
        assert_eq!(cache.player_displacement(), DVec3::new(0.51, 0.0, -0.51));

        cache.tick();
        assert_eq!(cache.player_displacement(), DVec3::ZERO);
    }

    #[test]
    fn moving_block_restricts_offset() {
        let mut cache = PistonCache::default();
        cache.add_piston(IVec3::new(0, 0, -1));
        cache.add_moving_block(
            IVec3::ZERO,
            MovingBlock {
                piston: IVec3::new(0, 0, -1),
                boxes: vec![BoundingBox::new(0.5, 0.5, 0.5, 1.0, 1.0, 1.0)],
                progress: DVec3::ZERO,
            },
        );
        assert!(cache.has_active_pistons());

        let player = BoundingBox::new(0.5, 1.9, 0.5, 0.6, 1.8, 0.6);
        let offset = cache.compute_collision_offset(IVec3::ZERO, &player, Axis::Y, -0.5);
        assert_eq!(offset, 0.0);

        cache.set_block_progress(IVec3::ZERO, DVec3::new(0.0, -0.25, 0.0));
        let offset = cache.compute_collision_offset(IVec3::ZERO, &player, Axis::Y, -0.5);
        assert!((offset + 0.25).abs() < 1e-12);

        // Elsewhere nothing moves.
        let offset = cache.compute_collision_offset(IVec3::new(4, 0, 0), &player, Axis::Y, -0.5);
        assert_eq!(offset, -0.5);

        let inside = BoundingBox::new(0.5, 1.2, 0.5, 0.6, 1.8, 0.6);
        assert!(cache.check_collision(IVec3::ZERO, &inside));
        assert!(!cache.check_collision(IVec3::ZERO, &player));

        cache.remove_piston(IVec3::new(0, 0, -1));
        assert!(!cache.has_active_pistons());
        let offset = cache.compute_collision_offset(IVec3::ZERO, &player, Axis::Y, -0.5);
        assert_eq!(offset, -0.5);
    }
}
