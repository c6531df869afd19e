use std::sync::LazyLock;

use bevy::math::{DVec3, IVec3, Vec3};
use rs_utils::ScaffoldingFlags;
use tracing::{debug, trace};

use crate::bounding_box::BoundingBox;
use crate::collision::{BlockCollision, CollisionRegistry, ScaffoldingContact};
use crate::piston::{PistonCache, PistonState};
use crate::shared::Axis;
use crate::world::{BlockRange, WorldView};
use crate::{
    COLLISION_TOLERANCE, INCORRECT_MOVEMENT_THRESHOLD, PLAYER_EYE_OFFSET, PLAYER_HEIGHT,
    PLAYER_STEP_UP, PLAYER_WIDTH, float_to_double,
};

static FLUID_COLLISION: LazyLock<BlockCollision> = LazyLock::new(BlockCollision::fluid);
const WATER_LAYER_HEIGHT: f64 = 1.0 / 9.0;

/// Read-only collaborators for one movement tick.
#[derive(Clone, Copy)]
pub struct CollisionContext<'a> {
    pub world: &'a dyn WorldView,
    pub registry: &'a CollisionRegistry,
    pub pistons: &'a dyn PistonState,
}

/// Snapshot of the player entity the pipeline reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerState {
    pub on_ground: bool,
    pub sneaking: bool,
    pub bounding_box_height: f64,
    pub in_vehicle: bool,
    /// Riding a vehicle whose movement the client decides.
    pub controlling_client_vehicle: bool,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            on_ground: false,
            sneaking: false,
            bounding_box_height: PLAYER_HEIGHT,
            in_vehicle: false,
            controlling_client_vehicle: false,
        }
    }
}

/// Position to forward to the Java server. `on_ground` is `None` when it should not be set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionResult {
    pub position: DVec3,
    pub on_ground: Option<bool>,
}

/// Packets the session owes the Bedrock client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClientUpdate {
    /// `position` is the Bedrock eye position.
    CorrectPosition { position: Vec3, on_ground: bool },
    /// Movement was cancelled; move the client back to the last accepted eye position.
    Resync { position: Vec3 },
    ScaffoldingFlags(ScaffoldingFlags),
}

pub struct CollisionManager {
    player_box: BoundingBox,
    contact: ScaffoldingContact,
    last_flags: ScaffoldingFlags,
    updates: Vec<ClientUpdate>,
}

impl Default for CollisionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CollisionManager {
    pub fn new() -> Self {
        Self {
            player_box: BoundingBox::new(0.0, 0.0, 0.0, PLAYER_WIDTH, PLAYER_HEIGHT, PLAYER_WIDTH),
            contact: ScaffoldingContact::default(),
            last_flags: ScaffoldingFlags::default(),
            updates: Vec::new(),
        }
    }

    pub fn player_bounding_box(&self) -> BoundingBox {
        self.player_box
    }

    pub fn scaffolding_contact(&self) -> ScaffoldingContact {
        self.contact
    }

    /// Changes the box height, keeping its bottom in place.
    pub fn update_player_bounding_box_height(&mut self, height: f64) {
        let bottom = self.player_box.min_on(Axis::Y);
        self.player_box.middle.y = bottom + height / 2.0;
        self.player_box.size.y = height;
    }

    /// Moves the box so its bottom center is at `position`.
    pub fn update_player_bounding_box(&mut self, position: DVec3, height: f64) {
        self.update_player_bounding_box_height(height);
        self.set_bottom_center(position);
    }

    fn set_bottom_center(&mut self, position: DVec3) {
        self.player_box.middle = DVec3::new(
            position.x,
            position.y + self.player_box.size.y / 2.0,
            position.z,
        );
    }

    /// Drains packets queued for the Bedrock client.
    pub fn take_client_updates(&mut self) -> Vec<ClientUpdate> {
        std::mem::take(&mut self.updates)
    }

    /// Corrects a Bedrock movement report before it goes to the Java server.
    ///
    /// Returns `None` when the movement must not be forwarded.
    pub fn adjust_bedrock_position(
        &mut self,
        bedrock_position: Vec3,
        on_ground: bool,
        teleported: bool,
        player: &PlayerState,
        ctx: &CollisionContext,
    ) -> Option<CollisionResult> {
        // Bedrock clients slide off honey; the Java server moves them instead.
        if ctx.pistons.is_player_attached_to_honey() {
            return None;
        }

        let java_y = (bedrock_position.y - PLAYER_EYE_OFFSET) as f64;
        let mut position = DVec3::new(
            float_to_double(bedrock_position.x),
            java_y,
            float_to_double(bedrock_position.z),
        );

        if player.controlling_client_vehicle {
            self.set_bottom_center(position);
            return Some(CollisionResult {
                position: self.player_box.bottom_center(),
                on_ground: None,
            });
        }

        let accepted = self.player_box;
        let movement = position - self.player_box.bottom_center();
        let adjusted = self.correct_player_movement(movement, false, teleported, player.on_ground, ctx);
        self.player_box = self
            .player_box
            .translated(adjusted)
            .translated(ctx.pistons.player_motion().as_dvec3());

        if !self.correct_player_position(player.sneaking, ctx) {
            self.player_box = accepted;
            self.recalculate_position();
            return None;
        }
        if ctx.pistons.is_player_collided() {
            return None;
        }

        position = self.player_box.bottom_center();

        let new_on_ground = (adjusted.y != movement.y && movement.y < 0.0) || on_ground;
        if on_ground != new_on_ground
            || movement.distance_squared(adjusted) > INCORRECT_MOVEMENT_THRESHOLD
        {
            // Vehicles dismount on a correction, and piston pushes resolve themselves.
            if !player.in_vehicle
                && ctx.pistons.player_motion() == Vec3::ZERO
                && !ctx.pistons.is_player_slime_collision()
            {
                debug!(
                    "Correcting client position to {:?} (movement {:?}, adjusted {:?})",
                    position, movement, adjusted
                );
                self.updates.push(ClientUpdate::CorrectPosition {
                    position: to_bedrock(position),
                    on_ground,
                });
            }
        }

        if !new_on_ground {
            position.y = trim_vertical(position.y);
        }

        trace!("Forwarding {:?} on_ground={}", position, on_ground);
        Some(CollisionResult {
            position,
            on_ground: Some(on_ground),
        })
    }

    fn recalculate_position(&mut self) {
        let position = to_bedrock(self.player_box.bottom_center());
        debug!("Cancelled movement, resyncing client to {:?}", position);
        self.updates.push(ClientUpdate::Resync { position });
    }

    /// Every block that may touch `bounding_box`, padded by one block while pistons move.
    pub fn collidable_blocks(&self, bounding_box: &BoundingBox, pistons: &dyn PistonState) -> BlockRange {
        let position = bounding_box.bottom_center();
        let piston_expand = if pistons.has_active_pistons() { 1.0 } else { 0.0 };
        let half = bounding_box.size / 2.0;

        let min = IVec3::new(
            (position.x - (half.x + COLLISION_TOLERANCE + piston_expand)).floor() as i32,
            // Fences reach half a block above their own cell.
            (position.y - 0.5 - COLLISION_TOLERANCE - piston_expand / 2.0).floor() as i32,
            (position.z - (half.z + COLLISION_TOLERANCE + piston_expand)).floor() as i32,
        );
        let max = IVec3::new(
            (position.x + half.x + COLLISION_TOLERANCE + piston_expand).floor() as i32,
            (position.y + bounding_box.size.y + piston_expand).floor() as i32,
            (position.z + half.z + COLLISION_TOLERANCE + piston_expand).floor() as i32,
        );
        BlockRange::new(min, max)
    }

    /// Narrow phase over the blocks around the player. `false` cancels the movement.
    pub fn correct_player_position(&mut self, sneaking: bool, ctx: &CollisionContext) -> bool {
        self.contact.reset();

        let range = self.collidable_blocks(&self.player_box, ctx.pistons);
        let states = ctx.world.blocks_in(&range);

        for (pos, state) in range.iter().zip(&states) {
            if let Some(collision) = ctx.registry.collision(*state) {
                self.player_box = collision.before_correct_position(pos, self.player_box);
            }
        }

        for (pos, state) in range.iter().zip(&states) {
            let Some(collision) = ctx.registry.collision(*state) else {
                continue;
            };
            match collision.correct_position(pos, self.player_box, &mut self.contact) {
                Some(corrected) => self.player_box = corrected,
                None => return false,
            }
        }

        self.update_scaffolding_flags(sneaking);
        true
    }

    pub fn correct_player_movement(
        &self,
        movement: DVec3,
        check_world: bool,
        teleported: bool,
        on_ground: bool,
        ctx: &CollisionContext,
    ) -> DVec3 {
        if teleported || (!check_world && !ctx.pistons.has_active_pistons()) {
            return movement;
        }
        self.correct_movement(
            movement,
            self.player_box,
            on_ground,
            PLAYER_STEP_UP,
            check_world,
            false,
            ctx,
        )
    }

    /// Sweeps `bounding_box` along `movement`, stepping up ledges up to `step_up` when grounded.
    #[allow(clippy::too_many_arguments)]
    pub fn correct_movement(
        &self,
        movement: DVec3,
        bounding_box: BoundingBox,
        on_ground: bool,
        step_up: f64,
        check_world: bool,
        walk_on_lava: bool,
        ctx: &CollisionContext,
    ) -> DVec3 {
        let mut adjusted = movement;
        if movement != DVec3::ZERO {
            adjusted = self.correct_movement_for_collisions(movement, bounding_box, check_world, walk_on_lava, ctx);
        }

        let vertical_collision = adjusted.y != movement.y;
        let horizontal_collision = adjusted.x != movement.x || adjusted.z != movement.z;
        let falling = movement.y < 0.0;
        let on_ground = on_ground || (vertical_collision && falling);
        if !(on_ground && horizontal_collision) {
            return adjusted;
        }

        let horizontal = DVec3::new(movement.x, 0.0, movement.z);
        let mut step_up_movement = self.correct_movement_for_collisions(
            horizontal + DVec3::Y * step_up,
            bounding_box,
            check_world,
            walk_on_lava,
            ctx,
        );

        let stretched = bounding_box.extended(horizontal);
        let max_step_up = self
            .correct_movement_for_collisions(DVec3::Y * step_up, stretched, check_world, walk_on_lava, ctx)
            .y;
        if max_step_up < step_up {
            // Something above caps the step.
            let lowered = bounding_box.translated(DVec3::Y * max_step_up);
            let lowered_movement =
                self.correct_movement_for_collisions(horizontal, lowered, check_world, walk_on_lava, ctx);
            if horizontal_length_squared(lowered_movement) > horizontal_length_squared(step_up_movement) {
                step_up_movement = lowered_movement + DVec3::Y * max_step_up;
            }
        }

        if horizontal_length_squared(step_up_movement) > horizontal_length_squared(adjusted) {
            let stepped = bounding_box.translated(step_up_movement);
            let vertical = self
                .correct_movement_for_collisions(
                    DVec3::Y * (movement.y - step_up_movement.y),
                    stepped,
                    check_world,
                    walk_on_lava,
                    ctx,
                )
                .y;
            adjusted = step_up_movement + DVec3::Y * vertical;
        }
        adjusted
    }

    fn correct_movement_for_collisions(
        &self,
        movement: DVec3,
        bounding_box: BoundingBox,
        check_world: bool,
        walk_on_lava: bool,
        ctx: &CollisionContext,
    ) -> DVec3 {
        let DVec3 {
            x: mut movement_x,
            y: mut movement_y,
            z: mut movement_z,
        } = movement;

        let range = self.collidable_blocks(&bounding_box.extended(movement), ctx.pistons);
        let states = if check_world {
            ctx.world.blocks_in(&range)
        } else {
            Vec::new()
        };
        let sweep = Sweep {
            range,
            states: &states,
            check_world,
            walk_on_lava,
            ctx,
        };

        let mut moving = bounding_box;
        if movement_y.abs() > COLLISION_TOLERANCE {
            movement_y = sweep.offset(&moving, Axis::Y, movement_y);
            moving.translate(0.0, movement_y, 0.0);
        }
        let z_first = movement_z.abs() > movement_x.abs();
        if z_first && movement_z.abs() > COLLISION_TOLERANCE {
            movement_z = sweep.offset(&moving, Axis::Z, movement_z);
            moving.translate(0.0, 0.0, movement_z);
        }
        if movement_x.abs() > COLLISION_TOLERANCE {
            movement_x = sweep.offset(&moving, Axis::X, movement_x);
            moving.translate(movement_x, 0.0, 0.0);
        }
        if !z_first && movement_z.abs() > COLLISION_TOLERANCE {
            movement_z = sweep.offset(&moving, Axis::Z, movement_z);
        }

        DVec3::new(movement_x, movement_y, movement_z)
    }

    /// Lava source blocks the player is above behave like a half slab for lava walkers.
    pub fn collision_lava_walking<'r>(
        &self,
        state: u32,
        block_y: i32,
        bounding_box: &BoundingBox,
        registry: &'r CollisionRegistry,
    ) -> Option<&'r BlockCollision> {
        lava_walking(state, block_y, bounding_box, registry)
    }

    /// The block at the player's eyes is a water source.
    pub fn is_player_in_water(&self, ctx: &CollisionContext) -> bool {
        let state = ctx.world.block_at(self.eye_block());
        ctx.registry.is_water_source(state)
    }

    /// A sneaking player would collide with the block at their eyes if they stood up.
    pub fn is_under_slab(&self, sneaking: bool, ctx: &CollisionContext) -> bool {
        if !sneaking {
            return false;
        }
        let pos = self.eye_block();
        let Some(collision) = ctx.registry.collision(ctx.world.block_at(pos)) else {
            return false;
        };

        let bottom = self.player_box.min_on(Axis::Y);
        let mut standing = self.player_box;
        standing.size.y = PLAYER_HEIGHT;
        standing.middle.y = bottom + PLAYER_HEIGHT / 2.0;
        collision.check_intersection(pos, &standing) || ctx.pistons.check_collision(pos, &standing)
    }

    /// The eyes, lowered by one water layer, are below the water surface of their block.
    pub fn is_water_in_eyes(&self, eye_height: f64, ctx: &CollisionContext) -> bool {
        let eye = self.player_box.bottom_center() + DVec3::Y * (eye_height - WATER_LAYER_HEIGHT);
        let state = ctx.world.block_at(eye.floor().as_ivec3());
        ctx.registry
            .water_height(state)
            .is_some_and(|height| eye.y < eye.y.floor() + height)
    }

    fn eye_block(&self) -> IVec3 {
        let eye = self.player_box.bottom_center() + DVec3::Y * PLAYER_EYE_OFFSET as f64;
        eye.floor().as_ivec3()
    }

    /// Mirrors the scaffolding contact into Bedrock entity flags, queued only when they change.
    pub fn update_scaffolding_flags(&mut self, sneaking: bool) {
        let ScaffoldingContact { touching, on } = self.contact;
        let flags = ScaffoldingFlags {
            over_descendable_block: on,
            in_ascendable_block: touching,
            over_scaffolding: (touching || on) && sneaking,
            in_scaffolding: touching,
        };
        if flags != self.last_flags {
            self.last_flags = flags;
            self.updates.push(ClientUpdate::ScaffoldingFlags(flags));
        }
    }

    /// Moves the player by a piston push, clamped per tick and corrected against the world.
    pub fn displace_player(
        &mut self,
        pistons: &mut PistonCache,
        displacement: DVec3,
        on_ground: bool,
        world: &dyn WorldView,
        registry: &CollisionRegistry,
    ) {
        let delta = pistons.clamp_displacement(displacement);
        let ctx = CollisionContext {
            world,
            registry,
            pistons: &*pistons,
        };
        let delta = self.correct_player_movement(delta, true, false, on_ground, &ctx);
        if delta == DVec3::ZERO {
            return;
        }
        self.player_box = self.player_box.translated(delta);
        self.updates.push(ClientUpdate::CorrectPosition {
            position: to_bedrock(self.player_box.bottom_center()),
            on_ground,
        });
    }
}

/// Candidate blocks for one swept movement.
struct Sweep<'a> {
    range: BlockRange,
    states: &'a [u32],
    check_world: bool,
    walk_on_lava: bool,
    ctx: &'a CollisionContext<'a>,
}

impl Sweep<'_> {
    fn offset(&self, bounding_box: &BoundingBox, axis: Axis, mut offset: f64) -> f64 {
        for (i, pos) in self.range.iter().enumerate() {
            if self.check_world {
                let state = self.states.get(i).copied().unwrap_or(0);
                let collision = if self.walk_on_lava {
                    lava_walking(state, pos.y, bounding_box, self.ctx.registry)
                } else {
                    self.ctx.registry.collision(state)
                };
                if let Some(collision) = collision
                    && !collision.is_scaffolding()
                {
                    offset = collision.compute_collision_offset(pos, bounding_box, axis, offset);
                }
            }
            offset = self
                .ctx
                .pistons
                .compute_collision_offset(pos, bounding_box, axis, offset);
            if offset.abs() < COLLISION_TOLERANCE {
                return 0.0;
            }
        }
        offset
    }
}

fn lava_walking<'r>(
    state: u32,
    block_y: i32,
    bounding_box: &BoundingBox,
    registry: &'r CollisionRegistry,
) -> Option<&'r BlockCollision> {
    if registry.lava_level(state) == Some(0) && FLUID_COLLISION.is_below(block_y, bounding_box) {
        return Some(&*FLUID_COLLISION);
    }
    registry.collision(state)
}

/// Java feet position to the Bedrock eye position.
fn to_bedrock(position: DVec3) -> Vec3 {
    let mut position = position.as_vec3();
    position.y += PLAYER_EYE_OFFSET;
    position
}

fn horizontal_length_squared(v: DVec3) -> f64 {
    v.x * v.x + v.z * v.z
}

/// Rounds to five decimals so the Java server never sees a player a hair inside a block.
fn trim_vertical(y: f64) -> f64 {
    format!("{:.5}", y).parse().unwrap_or(y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_to_five_decimals() {
        assert_eq!(trim_vertical(64.123456789), 64.12346);
        assert_eq!(trim_vertical(-3.0), -3.0);
        assert_eq!(trim_vertical(70.99999999), 71.0);
    }

    #[test]
    fn client_positions_are_eye_level() {
        let eye = to_bedrock(DVec3::new(0.5, 64.0, -2.5));
        assert_eq!(eye, Vec3::new(0.5, 64.0 + PLAYER_EYE_OFFSET, -2.5));
    }

    #[test]
    fn height_update_keeps_bottom() {
        let mut manager = CollisionManager::new();
        manager.update_player_bounding_box(DVec3::new(1.5, 64.0, -2.5), PLAYER_HEIGHT);
        manager.update_player_bounding_box_height(1.5);
        let bb = manager.player_bounding_box();
        assert_eq!(bb.bottom_center(), DVec3::new(1.5, 64.0, -2.5));
        assert_eq!(bb.size.y, 1.5);
    }
}
