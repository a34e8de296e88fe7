use glam::IVec3;
use rustc_hash::FxHashMap;
use tracing::warn;

use crate::block::{register_default_blocks, BlockId, BlockRegistry};
use crate::chunk::ChunkData;
use crate::config::WorldConfig;
use crate::coords::{world_to_chunk, ChunkPos};
use crate::lighting::{recompute_chunk_light, update_block_light};
use crate::worldgen::TerrainGenerator;

pub const DEFAULT_WORLD_SEED: u64 = 0xC0FFEE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldStats {
    pub loaded_chunks: usize,
    pub total_blocks: u64,
}

/// Chunk manager: owns the loaded chunk map and streams chunks in and
/// out around a viewpoint. Chunks are generated on demand and lit
/// before they become visible to callers.
pub struct World {
    config: WorldConfig,
    chunks: FxHashMap<ChunkPos, ChunkData>,
    generator: TerrainGenerator,
    registry: BlockRegistry,
}

impl World {
    pub fn new(config: WorldConfig, seed: u64) -> Result<Self, String> {
        config.validate()?;
        Ok(Self {
            config,
            chunks: FxHashMap::default(),
            generator: TerrainGenerator::new(seed),
            registry: register_default_blocks(),
        })
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    pub fn seed(&self) -> u64 {
        self.generator.seed
    }

    pub fn chunk(&self, pos: ChunkPos) -> Option<&ChunkData> {
        self.chunks.get(&pos)
    }

    pub fn is_loaded(&self, pos: ChunkPos) -> bool {
        self.chunks.contains_key(&pos)
    }

    pub fn loaded_chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Streams chunks around `center`: everything outside the delete
    /// radius is dropped, everything inside the create radius exists
    /// afterwards.
    pub fn update_around_viewpoint(&mut self, center: ChunkPos) {
        let delete = self.config.delete_radius as i32;
        self.chunks
            .retain(|pos, _| pos.chebyshev_distance(center) <= delete);

        let create = self.config.create_radius as i32;
        for dq in -create..=create {
            for dp in -create..=create {
                self.ensure_chunk(center + ChunkPos::new(dp, dq));
            }
        }
    }

    /// Generates, lights, and inserts the chunk if it is not loaded.
    pub fn ensure_chunk(&mut self, pos: ChunkPos) {
        if self.chunks.contains_key(&pos) {
            return;
        }

        let mut chunk = self
            .generator
            .generate_chunk(pos, &self.config, &self.registry);
        recompute_chunk_light(&mut chunk, &self.registry);
        // Fresh chunks need a first mesh build.
        chunk.mark_dirty();
        self.chunks.insert(pos, chunk);
    }

    /// Reads a block, generating the owning chunk on demand. Positions
    /// outside the vertical range read as air.
    pub fn get_block(&mut self, world_pos: IVec3) -> BlockId {
        let Some((chunk_pos, local)) =
            world_to_chunk(world_pos, self.config.chunk_size, self.config.max_height)
        else {
            return BlockId::AIR;
        };
        self.ensure_chunk(chunk_pos);
        self.chunks
            .get(&chunk_pos)
            .expect("chunk must exist after ensure_chunk")
            .get(local)
    }

    /// Writes a block and returns the one it replaced. Unknown block
    /// ids are rejected with a warning; positions outside the vertical
    /// range are a silent no-op. Both cases return `None`.
    ///
    /// The owning chunk and its four axis neighbours are marked dirty
    /// so border faces get re-meshed, and the chunk's light grid is
    /// refreshed for the changed cell.
    pub fn set_block(&mut self, world_pos: IVec3, block: BlockId) -> Option<BlockId> {
        if block != BlockId::AIR && !self.registry.contains(block) {
            warn!("rejecting write of unknown block id {:?}", block);
            return None;
        }
        let Some((chunk_pos, local)) =
            world_to_chunk(world_pos, self.config.chunk_size, self.config.max_height)
        else {
            return None;
        };

        self.ensure_chunk(chunk_pos);
        let chunk = self
            .chunks
            .get_mut(&chunk_pos)
            .expect("chunk must exist after ensure_chunk");
        let previous = chunk.set(local, block);
        update_block_light(chunk, local, &self.registry);

        for (dp, dq) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
            let neighbor = chunk_pos + ChunkPos::new(dp, dq);
            if let Some(neighbor_chunk) = self.chunks.get_mut(&neighbor) {
                neighbor_chunk.mark_dirty();
            }
        }

        Some(previous)
    }

    /// Loaded, non-empty chunks within the render radius of `center`,
    /// in deterministic order.
    pub fn renderable_chunks(&self, center: ChunkPos) -> Vec<ChunkPos> {
        let render = self.config.render_radius as i32;
        let mut positions: Vec<ChunkPos> = self
            .chunks
            .iter()
            .filter(|(pos, chunk)| {
                pos.chebyshev_distance(center) <= render && !chunk.is_empty()
            })
            .map(|(pos, _)| *pos)
            .collect();
        positions.sort_by_key(|pos| (pos.p, pos.q));
        positions
    }

    pub fn dirty_chunks(&self) -> Vec<ChunkPos> {
        let mut positions: Vec<ChunkPos> = self
            .chunks
            .iter()
            .filter(|(_, chunk)| chunk.is_dirty())
            .map(|(pos, _)| *pos)
            .collect();
        positions.sort_by_key(|pos| (pos.p, pos.q));
        positions
    }

    pub fn clear_dirty(&mut self, pos: ChunkPos) {
        if let Some(chunk) = self.chunks.get_mut(&pos) {
            chunk.clear_dirty();
        }
    }

    pub fn stats(&self) -> WorldStats {
        WorldStats {
            loaded_chunks: self.chunks.len(),
            total_blocks: self
                .chunks
                .values()
                .map(|chunk| u64::from(chunk.block_count()))
                .sum(),
        }
    }
}
