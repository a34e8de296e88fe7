use std::ops::{Add, AddAssign, Sub, SubAssign};

use glam::IVec3;
use serde::{Deserialize, Serialize};

/// Chunk-grid coordinate. The world is chunked on X/Z only; the whole
/// vertical extent (0..max_height) belongs to one chunk.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub p: i32,
    pub q: i32,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalPos {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

impl ChunkPos {
    pub fn new(p: i32, q: i32) -> Self {
        Self { p, q }
    }

    /// Streaming distance between two chunk coordinates.
    pub fn chebyshev_distance(self, other: ChunkPos) -> i32 {
        (self.p - other.p).abs().max((self.q - other.q).abs())
    }
}

impl Add for ChunkPos {
    type Output = ChunkPos;

    fn add(self, rhs: Self) -> Self::Output {
        ChunkPos {
            p: self.p + rhs.p,
            q: self.q + rhs.q,
        }
    }
}

impl AddAssign for ChunkPos {
    fn add_assign(&mut self, rhs: Self) {
        self.p += rhs.p;
        self.q += rhs.q;
    }
}

impl Sub for ChunkPos {
    type Output = ChunkPos;

    fn sub(self, rhs: Self) -> Self::Output {
        ChunkPos {
            p: self.p - rhs.p,
            q: self.q - rhs.q,
        }
    }
}

impl SubAssign for ChunkPos {
    fn sub_assign(&mut self, rhs: Self) {
        self.p -= rhs.p;
        self.q -= rhs.q;
    }
}

fn div_rem_floor(value: i32, divisor: i32) -> (i32, i32) {
    let mut q = value / divisor;
    let mut r = value % divisor;
    if r < 0 {
        q -= 1;
        r += divisor;
    }
    (q, r)
}

/// Splits a world-space block position into its chunk coordinate and the
/// offset inside that chunk. Returns `None` when Y is outside
/// `0..max_height`; vertical misses are an expected, silent case for
/// callers doing neighbor probes.
pub fn world_to_chunk(
    world_pos: IVec3,
    chunk_size: u32,
    max_height: u32,
) -> Option<(ChunkPos, LocalPos)> {
    if world_pos.y < 0 || world_pos.y >= max_height as i32 {
        return None;
    }

    let size = chunk_size as i32;
    let (chunk_p, local_x) = div_rem_floor(world_pos.x, size);
    let (chunk_q, local_z) = div_rem_floor(world_pos.z, size);

    Some((
        ChunkPos {
            p: chunk_p,
            q: chunk_q,
        },
        LocalPos {
            x: local_x as u8,
            y: world_pos.y as u8,
            z: local_z as u8,
        },
    ))
}

pub fn chunk_to_world(chunk_pos: ChunkPos, local: LocalPos, chunk_size: u32) -> IVec3 {
    let size = chunk_size as i32;
    IVec3::new(
        chunk_pos.p * size + i32::from(local.x),
        i32::from(local.y),
        chunk_pos.q * size + i32::from(local.z),
    )
}

/// Y-major cell ordering: vertical scans walk whole XZ planes, which
/// keeps column fills and light columns contiguous.
pub fn local_to_index(local: LocalPos, chunk_size: u32) -> usize {
    let size = chunk_size as usize;
    usize::from(local.y) * size * size + usize::from(local.z) * size + usize::from(local.x)
}

pub fn index_to_local(index: usize, chunk_size: u32, max_height: u32) -> LocalPos {
    let size = chunk_size as usize;
    let volume = size * size * max_height as usize;
    assert!(index < volume, "chunk index out of bounds: {index}");

    let y = index / (size * size);
    let rem = index % (size * size);
    let z = rem / size;
    let x = rem % size;

    LocalPos {
        x: x as u8,
        y: y as u8,
        z: z as u8,
    }
}
