use bevy::math::DVec3;

use crate::COLLISION_TOLERANCE;
use crate::shared::{Axis, Direction};

/// Axis-aligned box stored as its center and full extents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub middle: DVec3,
    pub size: DVec3,
}

impl BoundingBox {
    pub const fn new(
        middle_x: f64,
        middle_y: f64,
        middle_z: f64,
        size_x: f64,
        size_y: f64,
        size_z: f64,
    ) -> Self {
        Self {
            middle: DVec3::new(middle_x, middle_y, middle_z),
            size: DVec3::new(size_x, size_y, size_z),
        }
    }

    /// Box from block-local corners, e.g. `from_corners([0, 0, 0], [1, 0.5, 1])` for a bottom slab.
    pub fn from_corners(min: [f64; 3], max: [f64; 3]) -> Self {
        let min = DVec3::from_array(min);
        let max = DVec3::from_array(max);
        Self {
            middle: (min + max) / 2.0,
            size: max - min,
        }
    }

    pub fn translate(&mut self, x: f64, y: f64, z: f64) {
        self.middle.x += x;
        self.middle.y += y;
        self.middle.z += z;
    }

    pub fn translated(mut self, offset: DVec3) -> Self {
        self.translate(offset.x, offset.y, offset.z);
        self
    }

    /// Grows the box so it covers its whole sweep along a movement vector.
    pub fn extend(&mut self, x: f64, y: f64, z: f64) {
        self.middle.x += x / 2.0;
        self.middle.y += y / 2.0;
        self.middle.z += z / 2.0;

        self.size.x += x.abs();
        self.size.y += y.abs();
        self.size.z += z.abs();
    }

    pub fn extended(mut self, movement: DVec3) -> Self {
        self.extend(movement.x, movement.y, movement.z);
        self
    }

    /// Changes the size around the same center.
    pub fn resized(mut self, x: f64, y: f64, z: f64) -> Self {
        self.size.x += x;
        self.size.y += y;
        self.size.z += z;
        self
    }

    pub fn check_intersection(&self, offset: DVec3, other: &BoundingBox) -> bool {
        Axis::VALUES
            .iter()
            .all(|axis| self.check_overlap_in_axis(offset, other, *axis))
    }

    pub fn min(&self) -> DVec3 {
        self.middle - self.size / 2.0
    }

    pub fn max(&self) -> DVec3 {
        self.middle + self.size / 2.0
    }

    pub fn min_on(&self, axis: Axis) -> f64 {
        axis.choose(self.middle) - axis.choose(self.size) / 2.0
    }

    pub fn max_on(&self, axis: Axis) -> f64 {
        axis.choose(self.middle) + axis.choose(self.size) / 2.0
    }

    pub fn bottom_center(&self) -> DVec3 {
        DVec3::new(
            self.middle.x,
            self.middle.y - self.size.y / 2.0,
            self.middle.z,
        )
    }

    fn check_overlap_in_axis(&self, offset: DVec3, other: &BoundingBox, axis: Axis) -> bool {
        let distance = (axis.choose(self.middle) + axis.choose(offset)) - axis.choose(other.middle);
        distance.abs() * 2.0 < axis.choose(self.size) + axis.choose(other.size)
    }

    /// How far `other` may travel along `axis` before touching this box (placed at `offset`).
    ///
    /// `current` is the movement allowed so far. The result is never larger in
    /// magnitude than `current` and never points the other way; boxes that do
    /// not overlap on the two remaining axes leave `current` untouched.
    pub fn max_offset(&self, offset: DVec3, other: &BoundingBox, axis: Axis, current: f64) -> f64 {
        for a in Axis::VALUES {
            if a != axis && !self.check_overlap_in_axis(offset, other, a) {
                return current;
            }
        }

        if current > 0.0 {
            let min = self.min_on(axis) + axis.choose(offset);
            let max = other.max_on(axis);
            if min - max >= -2.0 * COLLISION_TOLERANCE {
                return (min - max).max(0.0).min(current);
            }
        } else if current < 0.0 {
            let min = other.min_on(axis);
            let max = self.max_on(axis) + axis.choose(offset);
            if min - max >= -2.0 * COLLISION_TOLERANCE {
                return (max - min).min(0.0).max(current);
            }
        }
        current
    }

    /// Distance this box has to travel towards `side` to sit flush against
    /// that face of `other`.
    pub fn intersection_size(&self, other: &BoundingBox, side: Direction) -> f64 {
        match side {
            Direction::Down => self.max().y - other.min().y,
            Direction::Up => other.max().y - self.min().y,
            Direction::North => self.max().z - other.min().z,
            Direction::South => other.max().z - self.min().z,
            Direction::West => self.max().x - other.min().x,
            Direction::East => other.max().x - self.min().x,
        }
    }
}
