use bevy::math::{DVec3, IVec3};

use crate::COLLISION_TOLERANCE;
use crate::bounding_box::BoundingBox;
use crate::shared::Axis;

pub mod registry;
mod shapes;

pub use registry::{BlockMapping, CollisionRegistry, CollisionTableError, FluidKind};
pub use shapes::{CollisionKind, PaneConnection};

/// Highest ledge the narrow phase will lift a player onto (beds).
pub const MAX_STEP_UP: f64 = 0.5625;

/// Scaffolding contact gathered while correcting the player position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScaffoldingContact {
    pub touching: bool,
    pub on: bool,
}

impl ScaffoldingContact {
    pub fn reset(&mut self) {
        self.touching = false;
        self.on = false;
    }
}

/// Collision for one block shape. Sub-boxes are relative to the block origin.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockCollision {
    pub boxes: Vec<BoundingBox>,
    pub push_up_tolerance: f64,
    pub push_away_tolerance: f64,
    pub kind: CollisionKind,
}

impl BlockCollision {
    pub fn new(kind: CollisionKind, boxes: Vec<BoundingBox>) -> Self {
        let push_up_tolerance = match kind {
            CollisionKind::Snow { .. } => 0.125,
            _ => 1.0,
        };
        Self {
            boxes,
            push_up_tolerance,
            push_away_tolerance: COLLISION_TOLERANCE * 1.1,
            kind,
        }
    }

    pub fn solid() -> Self {
        Self::new(
            CollisionKind::Solid,
            vec![BoundingBox::new(0.5, 0.5, 0.5, 1.0, 1.0, 1.0)],
        )
    }

    /// Half-height box that lets lava walkers stand on a lava source.
    pub fn fluid() -> Self {
        Self::new(
            CollisionKind::Other,
            vec![BoundingBox::new(0.5, 0.25, 0.5, 1.0, 0.5, 1.0)],
        )
    }

    pub fn is_scaffolding(&self) -> bool {
        self.kind == CollisionKind::Scaffolding
    }

    /// Runs for every nearby block before any `correct_position` call.
    pub fn before_correct_position(&self, pos: IVec3, player: BoundingBox) -> BoundingBox {
        match self.kind {
            CollisionKind::DirtPath => self.push_off_full_height(pos, player),
            CollisionKind::Snow { layers: 4 | 8 } => self.sink_into_snow(pos, player),
            _ => player,
        }
    }

    /// Returns the corrected player box, or `None` if the movement has to be cancelled.
    pub fn correct_position(
        &self,
        pos: IVec3,
        player: BoundingBox,
        contact: &mut ScaffoldingContact,
    ) -> Option<BoundingBox> {
        match self.kind {
            CollisionKind::Scaffolding => {
                self.probe_scaffolding(pos, &player, contact);
                Some(player)
            }
            CollisionKind::Snow { .. } => {
                if self.snow_step_too_high(pos, &player) {
                    return None;
                }
                Some(self.correct_generic(pos, player))
            }
            CollisionKind::EndPortalFrame => {
                let player = self.lift_out_of_eye(pos, player);
                Some(self.correct_generic(pos, player))
            }
            CollisionKind::Door { push } => {
                let player = self.correct_generic(pos, player);
                Some(self.push_out_of_panel(pos, player, push, shapes::DOOR_OVERLAP))
            }
            CollisionKind::Trapdoor { push } => {
                let player = self.correct_generic(pos, player);
                Some(self.push_out_of_panel(pos, player, push, shapes::TRAPDOOR_OVERLAP))
            }
            CollisionKind::GlassPane { connection } => {
                let player = self.correct_generic(pos, player);
                Some(self.snap_to_pane_end(pos, player, connection))
            }
            CollisionKind::Solid | CollisionKind::Other | CollisionKind::DirtPath => {
                Some(self.correct_generic(pos, player))
            }
        }
    }

    /// Step-up onto low sub-boxes, then nudge the player off faces it is pressed against.
    pub(crate) fn correct_generic(&self, pos: IVec3, mut player: BoundingBox) -> BoundingBox {
        let origin = pos.as_dvec3();
        let mut player_min_y = player.min_on(Axis::Y);

        for b in &self.boxes {
            let box_min_y = b.min_on(Axis::Y) + origin.y;
            let box_max_y = b.max_on(Axis::Y) + origin.y;
            if b.check_intersection(origin, &player)
                && player_min_y + self.push_up_tolerance >= box_min_y
                && box_max_y - player_min_y <= MAX_STEP_UP
            {
                player.translate(0.0, box_max_y - player_min_y, 0.0);
                player_min_y = player.min_on(Axis::Y);
            }

            // Grown on X/Z so blocks the player is flush against count as touching.
            let mut grown = player.resized(COLLISION_TOLERANCE * 2.0, 0.0, COLLISION_TOLERANCE * 2.0);
            if b.check_intersection(origin, &grown) {
                self.push_away_from_faces(b, pos, &mut grown);
                player.middle = grown.middle;
            }
        }
        player
    }

    fn push_away_from_faces(&self, b: &BoundingBox, pos: IVec3, player: &mut BoundingBox) {
        let origin = pos.as_dvec3();
        let relative = player.bottom_center() - origin;
        let half = player.size / 2.0;

        let x_ulp = f32_ulp((player.middle.x.abs() + half.x).max(origin.x.abs() + 1.0));
        let z_ulp = f32_ulp((player.middle.z.abs() + half.z).max(origin.z.abs() + 1.0));
        let x_tolerance = self.push_away_tolerance.max(x_ulp);
        let z_tolerance = self.push_away_tolerance.max(z_ulp);

        let north = b.min_on(Axis::Z) - relative.z - half.z;
        if north.abs() < z_tolerance {
            player.translate(0.0, 0.0, north);
        }
        let south = b.max_on(Axis::Z) - relative.z + half.z;
        if south.abs() < z_tolerance {
            player.translate(0.0, 0.0, south);
        }
        let east = b.max_on(Axis::X) - relative.x + half.x;
        if east.abs() < x_tolerance {
            player.translate(east, 0.0, 0.0);
        }
        let west = b.min_on(Axis::X) - relative.x - half.x;
        if west.abs() < x_tolerance {
            player.translate(west, 0.0, 0.0);
        }
        let bottom = b.min_on(Axis::Y) - relative.y - player.size.y;
        if bottom.abs() < self.push_away_tolerance {
            player.translate(0.0, bottom, 0.0);
        }
    }

    pub fn check_intersection(&self, pos: IVec3, player: &BoundingBox) -> bool {
        let origin = pos.as_dvec3();
        self.boxes.iter().any(|b| b.check_intersection(origin, player))
    }

    /// Most restrictive movement along `axis` over all sub-boxes; snaps to zero under the tolerance.
    pub fn compute_collision_offset(
        &self,
        pos: IVec3,
        player: &BoundingBox,
        axis: Axis,
        offset: f64,
    ) -> f64 {
        offset_against(&self.boxes, pos.as_dvec3(), player, axis, offset).unwrap_or(0.0)
    }

    /// Every sub-box top is at or below the bottom of `player`.
    pub fn is_below(&self, block_y: i32, player: &BoundingBox) -> bool {
        let min_y = player.min_on(Axis::Y);
        self.boxes
            .iter()
            .all(|b| block_y as f64 + b.max_on(Axis::Y) - min_y <= COLLISION_TOLERANCE)
    }
}

/// `None` once the offset has been cut below the collision tolerance.
pub(crate) fn offset_against(
    boxes: &[BoundingBox],
    origin: DVec3,
    player: &BoundingBox,
    axis: Axis,
    mut offset: f64,
) -> Option<f64> {
    for b in boxes {
        offset = b.max_offset(origin, player, axis, offset);
        if offset.abs() < COLLISION_TOLERANCE {
            return None;
        }
    }
    Some(offset)
}

/// Gap between `value` (narrowed to f32) and the next f32 away from zero.
pub(crate) fn f32_ulp(value: f64) -> f64 {
    let value = (value as f32).abs();
    if !value.is_finite() {
        return f64::INFINITY;
    }
    let next = f32::from_bits(value.to_bits() + 1);
    (next - value) as f64
}
