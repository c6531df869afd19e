use std::collections::HashMap;
use std::fs;
use std::path::Path;

use rs_utils::BlockStateKey;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::{BlockCollision, CollisionKind, PaneConnection};
use crate::bounding_box::BoundingBox;
use crate::shared::Direction;

/// Errors raised while building the collision table.
#[derive(Debug, Error)]
pub enum CollisionTableError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{identifier} references missing collision index {index}")]
    MissingCollisionIndex { identifier: String, index: usize },

    #[error("{identifier} has an invalid `{property}` property")]
    InvalidProperty {
        identifier: String,
        property: &'static str,
    },
}

/// One entry of the block mapping table, indexed by Java block state id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BlockMapping {
    pub java_identifier: String,
    #[serde(default)]
    pub collision_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FluidKind {
    Water,
    Lava,
}

/// Block state id -> collision shape. Built once, shared read-only.
#[derive(Debug, Default)]
pub struct CollisionRegistry {
    shapes: Vec<BlockCollision>,
    by_state: Vec<Option<usize>>,
    fluids: HashMap<u32, (FluidKind, u8)>,
}

impl CollisionRegistry {
    pub fn load(collision_path: &Path, blocks_path: &Path) -> Result<Self, CollisionTableError> {
        let collision_json = fs::read_to_string(collision_path)?;
        let blocks_json = fs::read_to_string(blocks_path)?;
        let registry = Self::from_json(&collision_json, &blocks_json)?;
        debug!(
            "Loaded {} block states with {} distinct collision shapes from {}",
            registry.state_count(),
            registry.shape_count(),
            collision_path.display()
        );
        Ok(registry)
    }

    /// `collision_json` is a list of box lists (`[mid_x, mid_y, mid_z, size_x, size_y, size_z]`),
    /// `blocks_json` a list of [`BlockMapping`] (or `null`) in state id order.
    pub fn from_json(collision_json: &str, blocks_json: &str) -> Result<Self, CollisionTableError> {
        let raw: Vec<Vec<[f64; 6]>> = serde_json::from_str(collision_json)?;
        let mappings: Vec<Option<BlockMapping>> = serde_json::from_str(blocks_json)?;

        let boxes = raw
            .into_iter()
            .map(|list| {
                let mut boxes: Vec<BoundingBox> = list
                    .into_iter()
                    .map(|[mx, my, mz, sx, sy, sz]| BoundingBox::new(mx, my, mz, sx, sy, sz))
                    .collect();
                // Lowest boxes first so step-ups resolve bottom to top.
                boxes.sort_by(|a, b| a.middle.y.total_cmp(&b.middle.y));
                boxes
            })
            .collect();

        Self::from_parts(boxes, &mappings)
    }

    pub fn from_parts(
        boxes: Vec<Vec<BoundingBox>>,
        mappings: &[Option<BlockMapping>],
    ) -> Result<Self, CollisionTableError> {
        let mut registry = CollisionRegistry {
            shapes: Vec::new(),
            by_state: Vec::with_capacity(mappings.len()),
            fluids: HashMap::new(),
        };
        let mut unique: HashMap<(CollisionKind, usize), usize> = HashMap::new();

        for (state, mapping) in mappings.iter().enumerate() {
            let Some(mapping) = mapping else {
                warn!("Missing block mapping for Java block {}", state);
                registry.by_state.push(None);
                continue;
            };

            let key = BlockStateKey::parse(&mapping.java_identifier);
            if let Some(fluid) = fluid_of(&key) {
                registry.fluids.insert(state as u32, fluid);
            }

            let Some(kind) = classify(&key, &mapping.java_identifier, mapping.collision_index)? else {
                registry.by_state.push(None);
                continue;
            };

            let dedup_key = match kind {
                // Snow boxes come from the layer count, not the table.
                CollisionKind::Snow { .. } => (kind, 0),
                _ => (kind, mapping.collision_index),
            };
            let index = match unique.get(&dedup_key) {
                Some(&index) => index,
                None => {
                    let shape_boxes = shape_boxes(kind, &boxes, mapping)?;
                    registry.shapes.push(BlockCollision::new(kind, shape_boxes));
                    let index = registry.shapes.len() - 1;
                    unique.insert(dedup_key, index);
                    index
                }
            };
            registry.by_state.push(Some(index));
        }

        Ok(registry)
    }

    pub fn collision(&self, state: u32) -> Option<&BlockCollision> {
        let index = (*self.by_state.get(state as usize)?)?;
        self.shapes.get(index)
    }

    pub fn fluid(&self, state: u32) -> Option<(FluidKind, u8)> {
        self.fluids.get(&state).copied()
    }

    pub fn lava_level(&self, state: u32) -> Option<u8> {
        match self.fluid(state)? {
            (FluidKind::Lava, level) => Some(level),
            _ => None,
        }
    }

    pub fn is_water_source(&self, state: u32) -> bool {
        self.fluid(state) == Some((FluidKind::Water, 0))
    }

    /// Height of the water surface within the block, or `None` when the state holds no water.
    pub fn water_height(&self, state: u32) -> Option<f64> {
        match self.fluid(state)? {
            // Falling water fills the block.
            (FluidKind::Water, level) if level >= 8 => Some(1.0),
            (FluidKind::Water, level) => Some(1.0 - (level as f64 + 1.0) / 9.0),
            _ => None,
        }
    }

    pub fn state_count(&self) -> usize {
        self.by_state.len()
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }
}

fn fluid_of(key: &BlockStateKey) -> Option<(FluidKind, u8)> {
    let kind = match key.name.as_str() {
        "water" => FluidKind::Water,
        "lava" => FluidKind::Lava,
        _ => return None,
    };
    let level = key
        .property("level")
        .and_then(|level| level.parse().ok())
        .unwrap_or(0);
    Some((kind, level))
}

fn classify(
    key: &BlockStateKey,
    identifier: &str,
    collision_index: usize,
) -> Result<Option<CollisionKind>, CollisionTableError> {
    let invalid = |property| CollisionTableError::InvalidProperty {
        identifier: identifier.to_string(),
        property,
    };
    let name = key.name.as_str();

    let kind = if name == "dirt_path" || name == "grass_path" {
        CollisionKind::DirtPath
    } else if name.ends_with("_trapdoor") {
        let facing = horizontal_facing(key).ok_or_else(|| invalid("facing"))?;
        let push = if key.flag("open") {
            facing
        } else {
            match key.property("half") {
                Some("top") => Direction::Down,
                Some("bottom") => Direction::Up,
                _ => return Err(invalid("half")),
            }
        };
        CollisionKind::Trapdoor { push }
    } else if name.ends_with("_door") {
        let facing = horizontal_facing(key).ok_or_else(|| invalid("facing"))?;
        let push = match (key.flag("open"), key.property("hinge")) {
            (false, _) => facing,
            (true, Some("right")) => facing.counter_clockwise(),
            (true, Some("left")) => facing.clockwise(),
            (true, _) => return Err(invalid("hinge")),
        };
        CollisionKind::Door { push }
    } else if (name.ends_with("glass_pane") || name == "iron_bars")
        && let Some(connection) = PaneConnection::from_sides(
            key.flag("north"),
            key.flag("east"),
            key.flag("south"),
            key.flag("west"),
        )
    {
        CollisionKind::GlassPane { connection }
    } else if name == "snow" {
        let layers = key
            .property("layers")
            .and_then(|layers| layers.parse::<u8>().ok())
            .filter(|layers| (1..=8).contains(layers))
            .ok_or_else(|| invalid("layers"))?;
        CollisionKind::Snow { layers }
    } else if name == "scaffolding" {
        CollisionKind::Scaffolding
    } else if name == "end_portal_frame" && key.flag("eye") {
        CollisionKind::EndPortalFrame
    } else {
        match collision_index {
            0 => return Ok(None),
            1 => CollisionKind::Solid,
            _ => CollisionKind::Other,
        }
    };
    Ok(Some(kind))
}

fn horizontal_facing(key: &BlockStateKey) -> Option<Direction> {
    key.property("facing")
        .and_then(Direction::from_string)
        .filter(|dir| Direction::HORIZONTAL.contains(dir))
}

fn shape_boxes(
    kind: CollisionKind,
    table: &[Vec<BoundingBox>],
    mapping: &BlockMapping,
) -> Result<Vec<BoundingBox>, CollisionTableError> {
    match kind {
        CollisionKind::Solid => Ok(BlockCollision::solid().boxes),
        CollisionKind::Snow { layers } if layers <= 1 => Ok(Vec::new()),
        CollisionKind::Snow { layers } => Ok(vec![BoundingBox::from_corners(
            [0.0, 0.0, 0.0],
            [1.0, (layers - 1) as f64 * 0.125, 1.0],
        )]),
        _ => table.get(mapping.collision_index).cloned().ok_or_else(|| {
            CollisionTableError::MissingCollisionIndex {
                identifier: mapping.java_identifier.clone(),
                index: mapping.collision_index,
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const COLLISION_JSON: &str = r#"[
        [],
        [[0.5, 0.5, 0.5, 1.0, 1.0, 1.0]],
        [[0.5, 0.75, 0.5, 1.0, 0.5, 1.0], [0.5, 0.25, 0.5, 1.0, 0.5, 1.0]],
        [[0.5, 0.5, 0.09375, 1.0, 1.0, 0.1875]]
    ]"#;

    fn mapping(identifier: &str, collision_index: usize) -> Option<BlockMapping> {
        Some(BlockMapping {
            java_identifier: identifier.to_string(),
            collision_index,
        })
    }

    fn door_boxes() -> Vec<Vec<BoundingBox>> {
        vec![
            Vec::new(),
            vec![BoundingBox::new(0.5, 0.5, 0.5, 1.0, 1.0, 1.0)],
            vec![BoundingBox::new(0.5, 0.5, 0.09375, 1.0, 1.0, 0.1875)],
        ]
    }

    #[test]
    fn loads_table_from_disk() {
        let mut collision = NamedTempFile::new().unwrap();
        collision.write_all(COLLISION_JSON.as_bytes()).unwrap();
        let mut blocks = NamedTempFile::new().unwrap();
        blocks
            .write_all(
                br#"[
                    {"java_identifier": "minecraft:air", "collision_index": 0},
                    {"java_identifier": "minecraft:stone", "collision_index": 1},
                    {"java_identifier": "minecraft:granite", "collision_index": 1},
                    {"java_identifier": "minecraft:stone_slab[type=double]", "collision_index": 2},
                    null,
                    {"java_identifier": "minecraft:water[level=0]", "collision_index": 0},
                    {"java_identifier": "minecraft:lava[level=3]", "collision_index": 0}
                ]"#,
            )
            .unwrap();

        let registry = CollisionRegistry::load(collision.path(), blocks.path()).unwrap();
        assert_eq!(registry.state_count(), 7);
        assert!(registry.collision(0).is_none());
        assert_eq!(registry.collision(1).unwrap().kind, CollisionKind::Solid);
        // Identical shapes share one entry.
        assert_eq!(registry.shape_count(), 2);
        assert!(std::ptr::eq(
            registry.collision(1).unwrap(),
            registry.collision(2).unwrap()
        ));
        let slab = registry.collision(3).unwrap();
        assert!(slab.boxes[0].middle.y < slab.boxes[1].middle.y);
        assert!(registry.collision(4).is_none());
        assert!(registry.collision(99).is_none());
        assert!(registry.is_water_source(5));
        assert_eq!(registry.lava_level(6), Some(3));
        assert_eq!(registry.lava_level(5), None);
        assert!((registry.water_height(5).unwrap() - 8.0 / 9.0).abs() < 1e-12);
        assert_eq!(registry.water_height(6), None);
        assert_eq!(registry.water_height(1), None);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CollisionRegistry::load(&dir.path().join("nope.json"), &dir.path().join("b.json"))
            .unwrap_err();
        assert!(matches!(err, CollisionTableError::Io(_)));
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = CollisionRegistry::from_json("[[1, 2]", "[]").unwrap_err();
        assert!(matches!(err, CollisionTableError::Json(_)));
    }

    #[test]
    fn missing_collision_index_is_reported() {
        let err = CollisionRegistry::from_parts(
            door_boxes(),
            &[mapping("minecraft:cobblestone_wall[up=true]", 9)],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CollisionTableError::MissingCollisionIndex { index: 9, .. }
        ));
    }

    #[test]
    fn door_push_follows_facing_and_hinge() {
        let registry = CollisionRegistry::from_parts(
            door_boxes(),
            &[
                mapping("minecraft:oak_door[facing=north,half=lower,hinge=left,open=false,powered=false]", 2),
                mapping("minecraft:oak_door[facing=north,half=lower,hinge=left,open=true,powered=false]", 2),
                mapping("minecraft:oak_door[facing=north,half=lower,hinge=right,open=true,powered=false]", 2),
                mapping("minecraft:oak_trapdoor[facing=east,half=top,open=false]", 2),
                mapping("minecraft:oak_trapdoor[facing=east,half=top,open=true]", 2),
            ],
        )
        .unwrap();
        let push = |state| registry.collision(state).map(|c| c.kind);
        assert_eq!(push(0), Some(CollisionKind::Door { push: Direction::North }));
        assert_eq!(push(1), Some(CollisionKind::Door { push: Direction::East }));
        assert_eq!(push(2), Some(CollisionKind::Door { push: Direction::West }));
        assert_eq!(push(3), Some(CollisionKind::Trapdoor { push: Direction::Down }));
        assert_eq!(push(4), Some(CollisionKind::Trapdoor { push: Direction::East }));
    }

    #[test]
    fn invalid_properties_fail_the_build() {
        let err = CollisionRegistry::from_parts(
            door_boxes(),
            &[mapping("minecraft:oak_door[facing=up,half=lower,hinge=left,open=false]", 2)],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CollisionTableError::InvalidProperty { property: "facing", .. }
        ));

        let err = CollisionRegistry::from_parts(door_boxes(), &[mapping("minecraft:snow[layers=9]", 1)])
            .unwrap_err();
        assert!(matches!(
            err,
            CollisionTableError::InvalidProperty { property: "layers", .. }
        ));
    }

    #[test]
    fn snow_and_special_shapes() {
        let registry = CollisionRegistry::from_parts(
            door_boxes(),
            &[
                mapping("minecraft:snow[layers=1]", 0),
                mapping("minecraft:snow[layers=8]", 1),
                mapping("minecraft:glass_pane[east=true,north=false,south=false,waterlogged=false,west=false]", 1),
                mapping("minecraft:glass_pane[east=true,north=false,south=false,waterlogged=false,west=true]", 1),
                mapping("minecraft:scaffolding[bottom=false,distance=0,waterlogged=false]", 1),
                mapping("minecraft:end_portal_frame[eye=false,facing=north]", 1),
            ],
        )
        .unwrap();

        let single = registry.collision(0).unwrap();
        assert_eq!(single.kind, CollisionKind::Snow { layers: 1 });
        assert!(single.boxes.is_empty());
        assert_eq!(single.push_up_tolerance, 0.125);

        let full = registry.collision(1).unwrap();
        assert_eq!(full.boxes[0].max_on(crate::shared::Axis::Y), 0.875);

        assert_eq!(
            registry.collision(2).unwrap().kind,
            CollisionKind::GlassPane {
                connection: PaneConnection::Single(Direction::East)
            }
        );
        assert_eq!(registry.collision(3).unwrap().kind, CollisionKind::Solid);
        assert!(registry.collision(4).unwrap().is_scaffolding());
        assert_eq!(registry.collision(5).unwrap().kind, CollisionKind::Solid);
    }
}
