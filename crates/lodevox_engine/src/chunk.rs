use bitflags::bitflags;
use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::block::{BlockId, MAX_LIGHT_LEVEL};
use crate::coords::{local_to_index, LocalPos};
use crate::palette::{ChunkPalette, IndexStore};

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct ChunkFlags: u8 {
        /// Block content changed since the last mesh rebuild.
        const DIRTY = 1 << 0;
    }
}

/// Palette-compressed block storage for one chunk column, plus the
/// per-cell light grid and cached occupancy stats.
///
/// Stats (`block_count`, `min_y`, `max_y`, `uniform`) are updated in
/// the same call that mutates the cells, so readers never observe them
/// out of sync with the stored indices.
#[derive(Clone, Debug)]
pub struct ChunkData {
    size: u32,
    height: u32,
    palette: ChunkPalette,
    indices: IndexStore,
    light: Vec<u8>,
    block_count: u32,
    min_y: Option<u32>,
    max_y: Option<u32>,
    uniform: Option<BlockId>,
    flags: ChunkFlags,
}

impl ChunkData {
    pub fn new(size: u32, height: u32) -> Self {
        let palette = ChunkPalette::new();
        let volume = (size * size * height) as usize;
        let indices = IndexStore::new(palette.storage_width(), volume);
        Self {
            size,
            height,
            palette,
            indices,
            light: vec![0; volume],
            block_count: 0,
            min_y: None,
            max_y: None,
            uniform: Some(BlockId::AIR),
            flags: ChunkFlags::empty(),
        }
    }

    pub fn new_filled(size: u32, height: u32, block: BlockId) -> Self {
        let mut chunk = Self::new(size, height);
        chunk.fill(block);
        chunk.flags = ChunkFlags::empty();
        chunk
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn volume(&self) -> usize {
        (self.size * self.size * self.height) as usize
    }

    pub fn get(&self, local: LocalPos) -> BlockId {
        if let Some(block) = self.uniform {
            return block;
        }
        let cell = local_to_index(local, self.size);
        self.palette.block_at(self.indices.get(cell))
    }

    /// Writes one cell and returns the block it replaced.
    pub fn set(&mut self, local: LocalPos, block: BlockId) -> BlockId {
        let cell = local_to_index(local, self.size);
        let previous = if let Some(uniform) = self.uniform {
            uniform
        } else {
            self.palette.block_at(self.indices.get(cell))
        };
        if previous == block {
            return previous;
        }

        if self.uniform.is_some() && self.volume() > 1 {
            self.uniform = None;
        } else if self.volume() == 1 {
            self.uniform = Some(block);
        }

        let index = self.palette.get_or_add_index(block);
        if self.palette.storage_width() != self.indices.width() {
            self.indices
                .resize_width(self.palette.storage_width(), self.volume());
        }
        self.indices.set(cell, index);

        let y = u32::from(local.y);
        match (previous == BlockId::AIR, block == BlockId::AIR) {
            (true, false) => {
                self.block_count += 1;
                self.min_y = Some(self.min_y.map_or(y, |min| min.min(y)));
                self.max_y = Some(self.max_y.map_or(y, |max| max.max(y)));
            }
            (false, true) => {
                self.block_count -= 1;
                if self.block_count == 0 {
                    self.min_y = None;
                    self.max_y = None;
                    self.uniform = Some(BlockId::AIR);
                } else if Some(y) == self.min_y || Some(y) == self.max_y {
                    self.rescan_y_bounds();
                }
            }
            _ => {}
        }

        self.flags.insert(ChunkFlags::DIRTY);
        previous
    }

    /// Overwrites every cell with one block id.
    pub fn fill(&mut self, block: BlockId) {
        let index = self.palette.get_or_add_index(block);
        if self.palette.storage_width() != self.indices.width() {
            self.indices
                .resize_width(self.palette.storage_width(), self.volume());
        }
        self.indices.fill(index, self.volume());

        if block == BlockId::AIR {
            self.block_count = 0;
            self.min_y = None;
            self.max_y = None;
        } else {
            self.block_count = self.volume() as u32;
            self.min_y = Some(0);
            self.max_y = Some(self.height - 1);
        }
        self.uniform = Some(block);
        self.flags.insert(ChunkFlags::DIRTY);
    }

    /// Bulk write, one stats pass per cell. Out-of-order positions are
    /// fine; later entries win on duplicates.
    pub fn set_blocks(&mut self, blocks: &[(LocalPos, BlockId)]) {
        for &(local, block) in blocks {
            self.set(local, block);
        }
    }

    /// Rebuilds the palette from a live-usage census, dropping entries
    /// no cell references any more, and re-encodes every cell through
    /// the resulting remap. Also refreshes the `uniform` cache. This is
    /// the only place the storage width may shrink.
    pub fn optimize(&mut self) {
        let volume = self.volume();
        let mut usage = vec![0usize; self.palette.len()];
        let mut first = None;
        let mut all_same = true;
        for cell in 0..volume {
            let index = self.indices.get(cell);
            usage[index] += 1;
            match first {
                None => first = Some(index),
                Some(f) if f != index => all_same = false,
                _ => {}
            }
        }

        let remap = self.palette.optimize(&usage);
        let mut packed = IndexStore::new(self.palette.storage_width(), volume);
        for cell in 0..volume {
            packed.set(cell, remap[self.indices.get(cell)]);
        }
        self.indices = packed;

        self.uniform = if all_same {
            Some(self.palette.block_at(remap[first.unwrap_or(0)]))
        } else {
            None
        };
    }

    pub fn palette(&self) -> &ChunkPalette {
        &self.palette
    }

    pub fn block_count(&self) -> u32 {
        self.block_count
    }

    pub fn min_y(&self) -> Option<u32> {
        self.min_y
    }

    pub fn max_y(&self) -> Option<u32> {
        self.max_y
    }

    /// The single block id filling the whole chunk, when cached. `None`
    /// means mixed content.
    pub fn uniform(&self) -> Option<BlockId> {
        self.uniform
    }

    pub fn is_empty(&self) -> bool {
        self.block_count == 0
    }

    pub fn is_full(&self) -> bool {
        self.block_count as usize == self.volume()
    }

    pub fn light(&self, local: LocalPos) -> u8 {
        self.light[local_to_index(local, self.size)]
    }

    pub fn set_light(&mut self, local: LocalPos, level: u8) {
        debug_assert!(level <= MAX_LIGHT_LEVEL);
        self.light[local_to_index(local, self.size)] = level;
    }

    pub fn clear_light(&mut self) {
        self.light.fill(0);
    }

    pub fn flags(&self) -> ChunkFlags {
        self.flags
    }

    pub fn is_dirty(&self) -> bool {
        self.flags.contains(ChunkFlags::DIRTY)
    }

    pub fn mark_dirty(&mut self) {
        self.flags.insert(ChunkFlags::DIRTY);
    }

    pub fn clear_dirty(&mut self) {
        self.flags.remove(ChunkFlags::DIRTY);
    }

    fn rescan_y_bounds(&mut self) {
        let layer = (self.size * self.size) as usize;
        let air = self
            .palette
            .index_of(BlockId::AIR)
            .unwrap_or(0);
        let mut min = None;
        let mut max = None;
        for y in 0..self.height {
            let base = y as usize * layer;
            let occupied = (0..layer).any(|i| self.indices.get(base + i) != air);
            if occupied {
                if min.is_none() {
                    min = Some(y);
                }
                max = Some(y);
            }
        }
        self.min_y = min;
        self.max_y = max;
    }
}

#[derive(Serialize, Deserialize)]
struct ChunkWire {
    size: u32,
    height: u32,
    palette: ChunkPalette,
    indices: IndexStore,
    light: Vec<u8>,
    dirty: bool,
}

impl Serialize for ChunkData {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        ChunkWire {
            size: self.size,
            height: self.height,
            palette: self.palette.clone(),
            indices: self.indices.clone(),
            light: self.light.clone(),
            dirty: self.is_dirty(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ChunkData {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = ChunkWire::deserialize(deserializer)?;
        let volume = (wire.size * wire.size * wire.height) as usize;
        if wire.light.len() != volume {
            return Err(de::Error::custom(format!(
                "expected {volume} light cells, got {}",
                wire.light.len()
            )));
        }
        if !wire.indices.fits(volume) {
            return Err(de::Error::custom(format!(
                "index store does not hold {volume} cells"
            )));
        }

        let mut chunk = ChunkData {
            size: wire.size,
            height: wire.height,
            palette: wire.palette,
            indices: wire.indices,
            light: wire.light,
            block_count: 0,
            min_y: None,
            max_y: None,
            uniform: None,
            flags: if wire.dirty {
                ChunkFlags::DIRTY
            } else {
                ChunkFlags::empty()
            },
        };

        // Stats are derived state; recompute them rather than trusting
        // the wire image.
        let air = chunk.palette.index_of(BlockId::AIR).unwrap_or(0);
        let mut first = None;
        let mut all_same = true;
        for cell in 0..volume {
            let index = chunk.indices.get(cell);
            match first {
                None => first = Some(index),
                Some(f) if f != index => all_same = false,
                _ => {}
            }
            if index != air {
                chunk.block_count += 1;
                let y = (cell / (wire.size * wire.size) as usize) as u32;
                chunk.min_y = Some(chunk.min_y.map_or(y, |min| min.min(y)));
                chunk.max_y = Some(chunk.max_y.map_or(y, |max| max.max(y)));
            }
        }
        if all_same {
            chunk.uniform = Some(chunk.palette.block_at(first.unwrap_or(0)));
        }

        Ok(chunk)
    }
}
