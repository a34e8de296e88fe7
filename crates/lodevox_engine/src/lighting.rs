use std::collections::VecDeque;

use crate::block::BlockRegistry;
use crate::chunk::ChunkData;
use crate::coords::LocalPos;

pub const NEIGHBOR_OFFSETS: [(i32, i32, i32); 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

/// Recomputes the whole light grid for one chunk from its emissive
/// blocks: every cell with nonzero luminance is seeded at its emission
/// level, then light floods outward losing one level per step. Opaque
/// cells absorb light; transparent and cross blocks pass it.
///
/// Light does not cross chunk boundaries. A lamp right at the edge
/// only brightens its own chunk.
pub fn recompute_chunk_light(chunk: &mut ChunkData, registry: &BlockRegistry) {
    chunk.clear_light();

    let mut queue = VecDeque::new();
    for y in 0..chunk.height() {
        for z in 0..chunk.size() {
            for x in 0..chunk.size() {
                let local = LocalPos {
                    x: x as u8,
                    y: y as u8,
                    z: z as u8,
                };
                let emission = registry.luminance(chunk.get(local));
                if emission == 0 {
                    continue;
                }
                chunk.set_light(local, emission);
                if emission > 1 {
                    queue.push_back((x as i32, y as i32, z as i32));
                }
            }
        }
    }

    flood(chunk, registry, &mut queue);
}

/// Refreshes lighting after a single block write at `local`.
///
/// Placing an emissive block can only add light, so it floods from the
/// new source alone. Every other change (removal, or placing an
/// occluder) can lower light somewhere, and removal is not tracked
/// incrementally; those fall back to the full recompute.
pub fn update_block_light(chunk: &mut ChunkData, local: LocalPos, registry: &BlockRegistry) {
    let emission = registry.luminance(chunk.get(local));
    if emission > 0 && emission >= chunk.light(local) {
        chunk.set_light(local, emission);
        if emission > 1 {
            let mut queue = VecDeque::new();
            queue.push_back((
                i32::from(local.x),
                i32::from(local.y),
                i32::from(local.z),
            ));
            flood(chunk, registry, &mut queue);
        }
    } else {
        recompute_chunk_light(chunk, registry);
    }
}

fn flood(chunk: &mut ChunkData, registry: &BlockRegistry, queue: &mut VecDeque<(i32, i32, i32)>) {
    let size = chunk.size() as i32;
    let height = chunk.height() as i32;

    while let Some((x, y, z)) = queue.pop_front() {
        let here = LocalPos {
            x: x as u8,
            y: y as u8,
            z: z as u8,
        };
        let level = chunk.light(here);
        if level <= 1 {
            continue;
        }
        let spread = level - 1;

        for (dx, dy, dz) in NEIGHBOR_OFFSETS {
            let nx = x + dx;
            let ny = y + dy;
            let nz = z + dz;
            if nx < 0 || nx >= size || ny < 0 || ny >= height || nz < 0 || nz >= size {
                continue;
            }
            let neighbor = LocalPos {
                x: nx as u8,
                y: ny as u8,
                z: nz as u8,
            };
            if registry.blocks_light(chunk.get(neighbor)) {
                continue;
            }
            if spread <= chunk.light(neighbor) {
                continue;
            }
            chunk.set_light(neighbor, spread);
            if spread > 1 {
                queue.push_back((nx, ny, nz));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{recompute_chunk_light, update_block_light};
    use crate::block::{register_default_blocks, BlockId, MAX_LIGHT_LEVEL};
    use crate::chunk::ChunkData;
    use crate::coords::LocalPos;

    const SIZE: u32 = 8;
    const HEIGHT: u32 = 32;

    #[test]
    fn glowstone_emits_at_full_strength() {
        let registry = register_default_blocks();
        let glowstone = registry
            .get_by_name("minecraft:glowstone")
            .expect("glowstone should be registered");

        let mut chunk = ChunkData::new(SIZE, HEIGHT);
        chunk.fill(BlockId::AIR);
        chunk.set(LocalPos { x: 3, y: 5, z: 3 }, glowstone);
        recompute_chunk_light(&mut chunk, &registry);

        assert_eq!(chunk.light(LocalPos { x: 3, y: 5, z: 3 }), MAX_LIGHT_LEVEL);
        assert_eq!(
            chunk.light(LocalPos { x: 4, y: 5, z: 3 }),
            MAX_LIGHT_LEVEL - 1
        );
        assert_eq!(
            chunk.light(LocalPos { x: 3, y: 6, z: 3 }),
            MAX_LIGHT_LEVEL - 1
        );
    }

    #[test]
    fn torch_light_falls_off_with_manhattan_distance() {
        let registry = register_default_blocks();
        let torch = registry
            .get_by_name("minecraft:torch")
            .expect("torch should be registered");

        let mut chunk = ChunkData::new(SIZE, HEIGHT);
        chunk.set(LocalPos { x: 0, y: 10, z: 0 }, torch);
        recompute_chunk_light(&mut chunk, &registry);

        assert_eq!(chunk.light(LocalPos { x: 0, y: 10, z: 0 }), 14);
        assert_eq!(chunk.light(LocalPos { x: 1, y: 10, z: 0 }), 13);
        assert_eq!(chunk.light(LocalPos { x: 2, y: 10, z: 0 }), 12);
        // Diagonal steps cost two levels, one per axis.
        assert_eq!(chunk.light(LocalPos { x: 1, y: 11, z: 1 }), 11);
        assert_eq!(chunk.light(LocalPos { x: 0, y: 24, z: 0 }), 0);
    }

    #[test]
    fn solid_wall_stops_light() {
        let registry = register_default_blocks();
        let stone = registry
            .get_by_name("minecraft:stone")
            .expect("stone should be registered");
        let torch = registry
            .get_by_name("minecraft:torch")
            .expect("torch should be registered");

        let mut chunk = ChunkData::new(SIZE, HEIGHT);
        for y in 0..HEIGHT as u8 {
            for z in 0..SIZE as u8 {
                chunk.set(LocalPos { x: 5, y, z }, stone);
            }
        }
        chunk.set(LocalPos { x: 4, y: 10, z: 4 }, torch);
        recompute_chunk_light(&mut chunk, &registry);

        assert_eq!(chunk.light(LocalPos { x: 5, y: 10, z: 4 }), 0);
        assert_eq!(chunk.light(LocalPos { x: 6, y: 10, z: 4 }), 0);
        // Light still wraps around nothing: the far side stays dark even
        // though the near side is lit.
        assert_eq!(chunk.light(LocalPos { x: 4, y: 10, z: 4 }), 14);
    }

    #[test]
    fn cutout_leaves_pass_light() {
        let registry = register_default_blocks();
        let leaves = registry
            .get_by_name("minecraft:oak_leaves")
            .expect("oak_leaves should be registered");
        let torch = registry
            .get_by_name("minecraft:torch")
            .expect("torch should be registered");

        let mut chunk = ChunkData::new(SIZE, HEIGHT);
        chunk.set(LocalPos { x: 3, y: 10, z: 2 }, leaves);
        chunk.set(LocalPos { x: 2, y: 10, z: 2 }, torch);
        recompute_chunk_light(&mut chunk, &registry);

        assert_eq!(chunk.light(LocalPos { x: 3, y: 10, z: 2 }), 13);
        assert_eq!(chunk.light(LocalPos { x: 4, y: 10, z: 2 }), 12);
    }

    #[test]
    fn placing_a_lamp_updates_incrementally() {
        let registry = register_default_blocks();
        let torch = registry
            .get_by_name("minecraft:torch")
            .expect("torch should be registered");

        let mut chunk = ChunkData::new(SIZE, HEIGHT);
        recompute_chunk_light(&mut chunk, &registry);
        assert_eq!(chunk.light(LocalPos { x: 4, y: 4, z: 4 }), 0);

        let pos = LocalPos { x: 4, y: 4, z: 4 };
        chunk.set(pos, torch);
        update_block_light(&mut chunk, pos, &registry);
        assert_eq!(chunk.light(pos), 14);
        assert_eq!(chunk.light(LocalPos { x: 4, y: 5, z: 4 }), 13);
    }

    #[test]
    fn removing_a_lamp_clears_its_light() {
        let registry = register_default_blocks();
        let torch = registry
            .get_by_name("minecraft:torch")
            .expect("torch should be registered");

        let mut chunk = ChunkData::new(SIZE, HEIGHT);
        let pos = LocalPos { x: 4, y: 4, z: 4 };
        chunk.set(pos, torch);
        recompute_chunk_light(&mut chunk, &registry);
        assert!(chunk.light(pos) > 0);

        chunk.set(pos, BlockId::AIR);
        update_block_light(&mut chunk, pos, &registry);
        assert_eq!(chunk.light(pos), 0);
        assert_eq!(chunk.light(LocalPos { x: 5, y: 4, z: 4 }), 0);
    }
}
