use std::path::{Path, PathBuf};

use bevy::prelude::Vec3;
use crossbeam::channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};

pub mod registry;
pub use registry::BlockStateKey;

pub const BRIDGE_DATA_ROOT_ENV: &str = "BRIDGE_DATA_ROOT";

/// Directory holding `collision.json` and `blocks.json` when no explicit path is given.
pub fn bridge_data_root() -> PathBuf {
    if let Ok(explicit) = std::env::var(BRIDGE_DATA_ROOT_ENV) {
        let path = PathBuf::from(explicit);
        if path.exists() {
            return path;
        }
    }

    if let Ok(exe) = std::env::current_exe()
        && let Some(exe_dir) = exe.parent()
    {
        let sibling_data = exe_dir.join("data");
        if sibling_data.exists() {
            return sibling_data;
        }
    }

    let repo_data = Path::new(env!("CARGO_MANIFEST_DIR")).join("../rs-bridge/data");
    if repo_data.exists() {
        return repo_data;
    }

    PathBuf::from("data")
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChunkSection {
    pub y: i32,
    /// 4096 block state ids, `y * 256 + z * 16 + x`
    pub blocks: Vec<u32>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChunkData {
    pub x: i32,
    pub z: i32,
    pub full: bool,
    pub sections: Vec<ChunkSection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockUpdate {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub block_state: u32,
}

/// One movement tick as reported by the Bedrock client.
///
/// `position` is the Bedrock eye position; `delta` is the client's velocity at
/// the end of the tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementReport {
    pub tick: u64,
    pub position: [f32; 3],
    pub delta: [f32; 3],
    pub on_ground: bool,
    pub teleported: bool,
    pub sneaking: bool,
    pub gliding: bool,
    pub in_vehicle: bool,
    pub touching_water: bool,
    pub jumped_on_ground: bool,
    pub colliding_vertically: bool,
}

impl Default for MovementReport {
    fn default() -> Self {
        Self {
            tick: 0,
            position: [0.0; 3],
            delta: [0.0; 3],
            on_ground: false,
            teleported: false,
            sneaking: false,
            gliding: false,
            in_vehicle: false,
            touching_water: false,
            jumped_on_ground: false,
            colliding_vertically: false,
        }
    }
}

impl MovementReport {
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn delta(&self) -> Vec3 {
        Vec3::from_array(self.delta)
    }
}

/// Bedrock entity flags that mirror scaffolding state Java infers client-side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScaffoldingFlags {
    pub over_descendable_block: bool,
    pub in_ascendable_block: bool,
    pub over_scaffolding: bool,
    pub in_scaffolding: bool,
}

/// One line of a movement trace, or a message from the server side of the bridge.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToSessionMessage {
    Movement(MovementReport),
    ChunkData(ChunkData),
    BlockUpdates { updates: Vec<BlockUpdate> },
    /// Server teleport; `position` is the Java feet position.
    Teleport { position: [f64; 3] },
    /// New world after death or a dimension change.
    Respawn { position: [f64; 3] },
    UnloadChunk { x: i32, z: i32 },
    PistonAdded { position: [i32; 3] },
    PistonRemoved { position: [i32; 3] },
    /// A block carried by the piston at `piston`, keyed by where it started.
    MovingBlock {
        start: [i32; 3],
        piston: [i32; 3],
        block_state: u32,
        #[serde(default)]
        progress: [f64; 3],
    },
    /// Direct push from a piston head or moving block this tick.
    PistonPush { displacement: [f64; 3] },
    /// Player contact with moving honey or slime, valid for the next movement tick.
    PlayerContact {
        #[serde(default)]
        honey: bool,
        #[serde(default)]
        slime: bool,
        #[serde(default)]
        collided: bool,
        #[serde(default)]
        motion: [f32; 3],
    },
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FromSessionMessage {
    /// Position to forward to the Java server.
    Forward {
        tick: u64,
        position: [f64; 3],
        on_ground: Option<bool>,
        vertical: Option<f64>,
    },
    /// Movement was dropped; nothing goes to the Java server.
    Cancelled { tick: u64 },
    /// Position pushed back to the Bedrock client.
    CorrectPosition {
        tick: u64,
        position: [f32; 3],
        on_ground: bool,
    },
    /// Movement was cancelled; `position` is the last accepted eye position.
    Resync { tick: u64, position: [f32; 3] },
    ScaffoldingFlags { tick: u64, flags: ScaffoldingFlags },
    Closed,
}

pub struct ToSession(pub Sender<ToSessionMessage>);

pub struct FromSession(pub Receiver<FromSessionMessage>);
