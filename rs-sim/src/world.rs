use std::collections::HashMap;

use bevy::math::IVec3;
use rs_utils::{BlockUpdate, ChunkData};

const CHUNK_SIZE: i32 = 16;
const SECTION_HEIGHT: i32 = 16;
const SECTION_VOLUME: usize = 16 * 16 * 16;
const AIR: u32 = 0;

/// Inclusive block range, iterated y, then z, then x.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub min: IVec3,
    pub max: IVec3,
}

impl BlockRange {
    pub fn new(min: IVec3, max: IVec3) -> Self {
        Self { min, max }
    }

    pub fn len(&self) -> usize {
        let extent = (self.max - self.min + IVec3::ONE).max(IVec3::ZERO);
        extent.x as usize * extent.y as usize * extent.z as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = IVec3> + '_ {
        (self.min.y..=self.max.y).flat_map(move |y| {
            (self.min.z..=self.max.z)
                .flat_map(move |z| (self.min.x..=self.max.x).map(move |x| IVec3::new(x, y, z)))
        })
    }
}

/// Block state lookups. Positions without loaded data read as air.
pub trait WorldView {
    fn block_at(&self, pos: IVec3) -> u32;

    /// States for every position of `range`, in iteration order.
    fn blocks_in(&self, range: &BlockRange) -> Vec<u32> {
        range.iter().map(|pos| self.block_at(pos)).collect()
    }
}

#[derive(Clone, Default)]
struct ChunkColumn {
    sections: HashMap<i32, Vec<u32>>,
}

impl ChunkColumn {
    fn set_section(&mut self, y: i32, blocks: Vec<u32>) {
        if blocks.len() != SECTION_VOLUME {
            tracing::warn!("Dropping section {} with {} blocks", y, blocks.len());
            return;
        }
        self.sections.insert(y, blocks);
    }
}

/// Chunk column store fed by chunk data and block update packets.
#[derive(Default)]
pub struct ChunkCache {
    chunks: HashMap<(i32, i32), ChunkColumn>,
}

impl ChunkCache {
    pub fn update_chunk(&mut self, chunk: ChunkData) {
        let entry = self.chunks.entry((chunk.x, chunk.z)).or_default();
        if chunk.full {
            *entry = ChunkColumn::default();
        }
        for section in chunk.sections {
            entry.set_section(section.y, section.blocks);
        }
    }

    pub fn unload_chunk(&mut self, x: i32, z: i32) {
        self.chunks.remove(&(x, z));
    }

    pub fn has_chunk(&self, x: i32, z: i32) -> bool {
        self.chunks.contains_key(&(x, z))
    }

    pub fn set_block(&mut self, pos: IVec3, state: u32) {
        let column = self
            .chunks
            .entry((pos.x.div_euclid(CHUNK_SIZE), pos.z.div_euclid(CHUNK_SIZE)))
            .or_default();
        let section = column
            .sections
            .entry(pos.y.div_euclid(SECTION_HEIGHT))
            .or_insert_with(|| vec![AIR; SECTION_VOLUME]);
        section[section_index(pos)] = state;
    }

    pub fn apply_updates(&mut self, updates: &[BlockUpdate]) {
        for update in updates {
            self.set_block(IVec3::new(update.x, update.y, update.z), update.block_state);
        }
    }
}

impl WorldView for ChunkCache {
    fn block_at(&self, pos: IVec3) -> u32 {
        let Some(column) = self
            .chunks
            .get(&(pos.x.div_euclid(CHUNK_SIZE), pos.z.div_euclid(CHUNK_SIZE)))
        else {
            return AIR;
        };
        let Some(section) = column.sections.get(&pos.y.div_euclid(SECTION_HEIGHT)) else {
            return AIR;
        };
        section.get(section_index(pos)).copied().unwrap_or(AIR)
    }
}

fn section_index(pos: IVec3) -> usize {
    let local_x = pos.x.rem_euclid(CHUNK_SIZE) as usize;
    let local_y = pos.y.rem_euclid(SECTION_HEIGHT) as usize;
    let local_z = pos.z.rem_euclid(CHUNK_SIZE) as usize;
    local_y * 16 * 16 + local_z * 16 + local_x
}
