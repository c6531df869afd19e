use bevy::math::{DVec3, IVec3};

use super::{BlockCollision, ScaffoldingContact};
use crate::COLLISION_TOLERANCE;
use crate::bounding_box::BoundingBox;
use crate::shared::{Axis, Direction};

/// Doors are 0.1875 thick on Java and 0.1825 on Bedrock.
pub(super) const DOOR_OVERLAP: f64 = 0.005;
pub(super) const TRAPDOOR_OVERLAP: f64 = 0.0125;
/// Distance the Java pane post reaches past a Bedrock pane end.
const PANE_OVERHANG: f64 = 0.0625;
const PANE_POST_HALF_WIDTH: f64 = 0.0625;
const END_PORTAL_EYE_HEIGHT: f64 = 0.1875;
const SNOW_MAX_STEP: f64 = 0.5;
const SNOW_ROUNDING_BAND: f64 = 0.125;
const DIRT_PATH_SINK: f64 = 0.0625;
const PROBE_SHRINK: f64 = 0.0001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollisionKind {
    Solid,
    Other,
    DirtPath,
    /// `push` points from the panel into the rest of the block.
    Door {
        push: Direction,
    },
    Trapdoor {
        push: Direction,
    },
    GlassPane {
        connection: PaneConnection,
    },
    Snow {
        layers: u8,
    },
    Scaffolding,
    /// End portal frame holding an eye.
    EndPortalFrame,
}

/// Pane shapes whose Java post sticks out past the Bedrock model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaneConnection {
    Single(Direction),
    Corner(Direction, Direction),
}

impl PaneConnection {
    /// Reads `north`/`east`/`south`/`west` flags. Straight, tee, cross and
    /// unconnected panes match Bedrock and return `None`.
    pub fn from_sides(north: bool, east: bool, south: bool, west: bool) -> Option<Self> {
        let connected: Vec<Direction> = [
            (Direction::North, north),
            (Direction::East, east),
            (Direction::South, south),
            (Direction::West, west),
        ]
        .into_iter()
        .filter_map(|(dir, set)| set.then_some(dir))
        .collect();

        match connected.as_slice() {
            [single] => Some(PaneConnection::Single(*single)),
            [a, b] if a.axis() != b.axis() => Some(PaneConnection::Corner(*a, *b)),
            _ => None,
        }
    }

    pub fn open_ends(&self) -> Vec<Direction> {
        match *self {
            PaneConnection::Single(dir) => vec![dir.opposite()],
            PaneConnection::Corner(a, b) => vec![a.opposite(), b.opposite()],
        }
    }
}

impl BlockCollision {
    pub(super) fn push_off_full_height(&self, pos: IVec3, mut player: BoundingBox) -> BoundingBox {
        let block_top = pos.y as f64 + 1.0;
        if (block_top - player.min_on(Axis::Y)).abs() <= COLLISION_TOLERANCE {
            player.translate(0.0, -DIRT_PATH_SINK, 0.0);
        }
        player
    }

    /// Bedrock rounds 4 and 8 layer snow up to the next half block.
    pub(super) fn sink_into_snow(&self, pos: IVec3, mut player: BoundingBox) -> BoundingBox {
        let Some(top) = self.snow_top(pos) else {
            return player;
        };
        let player_min_y = player.min_on(Axis::Y);
        if player_min_y > top && player_min_y <= top + SNOW_ROUNDING_BAND {
            player.translate(0.0, top - player_min_y, 0.0);
        }
        player
    }

    pub(super) fn snow_step_too_high(&self, pos: IVec3, player: &BoundingBox) -> bool {
        let Some(top) = self.snow_top(pos) else {
            return false;
        };
        let probe = player.resized(-PROBE_SHRINK, -PROBE_SHRINK, -PROBE_SHRINK);
        self.check_intersection(pos, &probe) && top - probe.min_on(Axis::Y) > SNOW_MAX_STEP
    }

    fn snow_top(&self, pos: IVec3) -> Option<f64> {
        self.boxes
            .first()
            .map(|b| b.max_on(Axis::Y) + pos.y as f64)
    }

    pub(super) fn probe_scaffolding(
        &self,
        pos: IVec3,
        player: &BoundingBox,
        contact: &mut ScaffoldingContact,
    ) {
        let inside = player
            .resized(0.0, -0.001, 0.0)
            .translated(DVec3::new(0.0, 0.002, 0.0));
        if self.check_intersection(pos, &inside) {
            contact.touching = true;
            contact.on = true;
            return;
        }

        let below = player
            .resized(0.0, 0.001, 0.0)
            .translated(DVec3::new(0.0, -0.002, 0.0));
        if self.check_intersection(pos, &below) {
            contact.on = true;
        }
    }

    pub(super) fn lift_out_of_eye(&self, pos: IVec3, mut player: BoundingBox) -> BoundingBox {
        let origin = pos.as_dvec3();
        for eye in self.boxes.iter().filter(|b| b.min_on(Axis::Y) > COLLISION_TOLERANCE) {
            if !eye.check_intersection(origin, &player) {
                continue;
            }
            let lift = eye.max_on(Axis::Y) + origin.y - player.min_on(Axis::Y);
            if lift > 0.0 && lift <= END_PORTAL_EYE_HEIGHT + COLLISION_TOLERANCE {
                player.translate(0.0, lift, 0.0);
            }
        }
        player
    }

    pub(super) fn push_out_of_panel(
        &self,
        pos: IVec3,
        mut player: BoundingBox,
        push: Direction,
        max_depth: f64,
    ) -> BoundingBox {
        let origin = pos.as_dvec3();
        for panel in &self.boxes {
            let probe = player.resized(-PROBE_SHRINK, -PROBE_SHRINK, -PROBE_SHRINK);
            if !panel.check_intersection(origin, &probe) {
                continue;
            }
            let depth = player.intersection_size(&panel.translated(origin), push);
            if depth > 0.0 && depth <= max_depth {
                player = player.translated(push.scaled(depth + COLLISION_TOLERANCE * 1.01));
            }
        }
        player
    }

    pub(super) fn snap_to_pane_end(
        &self,
        pos: IVec3,
        player: BoundingBox,
        connection: PaneConnection,
    ) -> BoundingBox {
        let probe = player.resized(-PROBE_SHRINK, -PROBE_SHRINK, -PROBE_SHRINK);
        if !self.check_intersection(pos, &probe) {
            return player;
        }

        let post_center = pos.as_dvec3() + DVec3::splat(0.5);
        let mut best: Option<DVec3> = None;
        for end in connection.open_ends() {
            let axis = end.axis();
            let face = axis.choose(post_center + end.scaled(PANE_POST_HALF_WIDTH));
            let needed = if end.is_positive() {
                face - player.min_on(axis)
            } else {
                face - player.max_on(axis)
            };
            let distance = if end.is_positive() { needed } else { -needed };
            if distance <= 0.0 || distance > PANE_OVERHANG {
                continue;
            }
            let shift = end.scaled(distance + COLLISION_TOLERANCE * 1.01);
            if best.is_none_or(|b| shift.length_squared() < b.length_squared()) {
                best = Some(shift);
            }
        }

        match best {
            Some(shift) => player.translated(shift),
            None => player,
        }
    }
}
