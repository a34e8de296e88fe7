use noise::{NoiseFn, Perlin};

use crate::block::{BlockId, BlockRegistry};
use crate::chunk::ChunkData;
use crate::config::WorldConfig;
use crate::coords::{chunk_to_world, ChunkPos, LocalPos};

/// Fractal sum of 2D Perlin octaves, normalised to `[0, 1]`.
fn octave_noise_2d(
    perlin: &Perlin,
    x: f64,
    z: f64,
    octaves: u32,
    persistence: f64,
    lacunarity: f64,
) -> f64 {
    let mut sum = 0.0;
    let mut max_value = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    for _ in 0..octaves {
        sum += perlin.get([x * frequency, z * frequency]) * amplitude;
        max_value += amplitude;
        amplitude *= persistence;
        frequency *= lacunarity;
    }
    (sum / max_value + 1.0) * 0.5
}

/// Fractal sum of 3D Perlin octaves, normalised to `[0, 1]`.
fn octave_noise_3d(
    perlin: &Perlin,
    x: f64,
    y: f64,
    z: f64,
    octaves: u32,
    persistence: f64,
    lacunarity: f64,
) -> f64 {
    let mut sum = 0.0;
    let mut max_value = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    for _ in 0..octaves {
        sum += perlin.get([x * frequency, y * frequency, z * frequency]) * amplitude;
        max_value += amplitude;
        amplitude *= persistence;
        frequency *= lacunarity;
    }
    (sum / max_value + 1.0) * 0.5
}

const CLOUD_FLOOR: u32 = 64;
const CLOUD_CEILING: u32 = 72;
/// Columns this close to a chunk edge skip tree placement so a canopy
/// never spills across the chunk boundary.
const TREE_MARGIN: u32 = 4;

#[derive(Debug, Clone)]
pub struct TerrainGenerator {
    pub seed: u64,
}

impl TerrainGenerator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn position_hash(&self, world_x: i32, world_z: i32, salt: u64) -> u64 {
        self.seed
            .wrapping_add(salt)
            .wrapping_mul(6364136223846793005)
            .wrapping_add((world_x as i64 as u64).wrapping_mul(2654435761))
            .wrapping_add((world_z as i64 as u64).wrapping_mul(40503))
    }

    /// Generates one chunk column from scratch. Deterministic for a
    /// given `(seed, pos, config)`.
    pub fn generate_chunk(
        &self,
        pos: ChunkPos,
        config: &WorldConfig,
        registry: &BlockRegistry,
    ) -> ChunkData {
        let size = config.chunk_size;
        let height = config.max_height;
        let mut chunk = ChunkData::new(size, height);

        // One noise field per concern, each derived from the seed.
        let shape = Perlin::new(self.seed as u32);
        let modulation = Perlin::new(self.seed.wrapping_add(1) as u32);
        let plant_field = Perlin::new(self.seed.wrapping_add(2) as u32);
        let flower_field = Perlin::new(self.seed.wrapping_add(3) as u32);
        let tree_field = Perlin::new(self.seed.wrapping_add(4) as u32);
        let cloud_field = Perlin::new(self.seed.wrapping_add(5) as u32);

        let air = BlockId::AIR;
        let grass_block = registry.get_by_name("minecraft:grass_block").unwrap_or(air);
        let sand = registry.get_by_name("minecraft:sand").unwrap_or(air);
        let short_grass = registry.get_by_name("minecraft:short_grass").unwrap_or(air);
        let dandelion = registry.get_by_name("minecraft:dandelion").unwrap_or(air);
        let poppy = registry.get_by_name("minecraft:poppy").unwrap_or(air);
        let oak_log = registry.get_by_name("minecraft:oak_log").unwrap_or(air);
        let oak_leaves = registry.get_by_name("minecraft:oak_leaves").unwrap_or(air);
        let cloud = registry.get_by_name("web3:cloud").unwrap_or(air);

        let ns = config.noise_scale;
        let sea = config.sea_level as i32;

        let mut surface_heights = vec![0i32; (size * size) as usize];

        // Pass 1: column fill.
        for z in 0..size {
            for x in 0..size {
                let world = chunk_to_world(
                    pos,
                    LocalPos {
                        x: x as u8,
                        y: 0,
                        z: z as u8,
                    },
                    size,
                );
                let wx = world.x as f64;
                let wz = world.z as f64;

                let f = octave_noise_2d(&shape, wx * ns, wz * ns, 4, 0.5, 2.0);
                let g = octave_noise_2d(&modulation, -wx * ns, -wz * ns, 2, 0.9, 2.0);
                let mut h =
                    (f * (g * config.height_scale + config.height_offset)).floor() as i32;

                let surface = if h <= sea {
                    h = sea;
                    sand
                } else {
                    grass_block
                };

                let top = h.min(height as i32);
                for y in 0..top {
                    chunk.set(
                        LocalPos {
                            x: x as u8,
                            y: y as u8,
                            z: z as u8,
                        },
                        surface,
                    );
                }
                surface_heights[(z * size + x) as usize] = h;
            }
        }

        // Pass 2: plants and flowers on grass, above sea level only.
        if config.plants {
            for z in 0..size {
                for x in 0..size {
                    let h = surface_heights[(z * size + x) as usize];
                    if h <= sea || h >= height as i32 {
                        continue;
                    }

                    let world = chunk_to_world(
                        pos,
                        LocalPos {
                            x: x as u8,
                            y: 0,
                            z: z as u8,
                        },
                        size,
                    );
                    let wx = world.x as f64;
                    let wz = world.z as f64;
                    let top = LocalPos {
                        x: x as u8,
                        y: h as u8,
                        z: z as u8,
                    };

                    if octave_noise_2d(&plant_field, -wx * 0.1, wz * 0.1, 4, 0.8, 2.0) > 0.6 {
                        chunk.set(top, short_grass);
                    }
                    if octave_noise_2d(&flower_field, wx * 0.05, -wz * 0.05, 4, 0.8, 2.0) > 0.7 {
                        let flower = if self.position_hash(world.x, world.z, 17) % 2 == 0 {
                            dandelion
                        } else {
                            poppy
                        };
                        chunk.set(top, flower);
                    }
                }
            }
        }

        // Pass 3: trees, kept clear of chunk edges so canopies stay local.
        if config.trees && size > 2 * TREE_MARGIN {
            for z in TREE_MARGIN..size - TREE_MARGIN {
                for x in TREE_MARGIN..size - TREE_MARGIN {
                    let h = surface_heights[(z * size + x) as usize];
                    if h <= sea {
                        continue;
                    }

                    let world = chunk_to_world(
                        pos,
                        LocalPos {
                            x: x as u8,
                            y: 0,
                            z: z as u8,
                        },
                        size,
                    );
                    let wx = world.x as f64;
                    let wz = world.z as f64;
                    if octave_noise_2d(&tree_field, wx, wz, 6, 0.5, 2.0) <= 0.84 {
                        continue;
                    }
                    if h + 8 >= height as i32 {
                        continue;
                    }

                    // Leaf sphere centred four cells above the surface.
                    for dy in 3..=7i32 {
                        for dz in -3..=3i32 {
                            for dx in -3..=3i32 {
                                if dx * dx + dz * dz + (dy - 4) * (dy - 4) < 11 {
                                    let lx = x as i32 + dx;
                                    let lz = z as i32 + dz;
                                    let ly = h + dy;
                                    let leaf = LocalPos {
                                        x: lx as u8,
                                        y: ly as u8,
                                        z: lz as u8,
                                    };
                                    if chunk.get(leaf) == air {
                                        chunk.set(leaf, oak_leaves);
                                    }
                                }
                            }
                        }
                    }
                    for dy in 0..7i32 {
                        chunk.set(
                            LocalPos {
                                x: x as u8,
                                y: (h + dy) as u8,
                                z: z as u8,
                            },
                            oak_log,
                        );
                    }
                }
            }
        }

        // Pass 4: cloud band.
        if config.clouds && height > CLOUD_FLOOR {
            let ceiling = CLOUD_CEILING.min(height);
            for z in 0..size {
                for x in 0..size {
                    let world = chunk_to_world(
                        pos,
                        LocalPos {
                            x: x as u8,
                            y: 0,
                            z: z as u8,
                        },
                        size,
                    );
                    let wx = world.x as f64;
                    let wz = world.z as f64;
                    for y in CLOUD_FLOOR..ceiling {
                        let density = octave_noise_3d(
                            &cloud_field,
                            wx * 0.01,
                            f64::from(y) * 0.1,
                            wz * 0.01,
                            8,
                            0.5,
                            2.0,
                        );
                        if density > 0.75 {
                            chunk.set(
                                LocalPos {
                                    x: x as u8,
                                    y: y as u8,
                                    z: z as u8,
                                },
                                cloud,
                            );
                        }
                    }
                }
            }
        }

        chunk.clear_dirty();
        chunk
    }
}

#[cfg(test)]
mod tests {
    use super::TerrainGenerator;
    use crate::block::{register_default_blocks, BlockId};
    use crate::config::WorldConfig;
    use crate::coords::{ChunkPos, LocalPos};

    #[test]
    fn generation_is_deterministic_for_a_seed() {
        let registry = register_default_blocks();
        let config = WorldConfig::small_flat();
        let pos = ChunkPos::new(3, -2);

        let a = TerrainGenerator::new(42).generate_chunk(pos, &config, &registry);
        let b = TerrainGenerator::new(42).generate_chunk(pos, &config, &registry);

        let bytes_a = bincode::serialize(&a).expect("serialize chunk");
        let bytes_b = bincode::serialize(&b).expect("serialize chunk");
        assert_eq!(bytes_a, bytes_b);
    }

    #[test]
    fn different_seeds_produce_different_terrain() {
        let registry = register_default_blocks();
        // Full terrain shaping; flat modes can clamp every column in a
        // chunk to sea level, masking the seed entirely.
        let config = WorldConfig::normal();
        let pos = ChunkPos::new(3, -2);

        let a = TerrainGenerator::new(42).generate_chunk(pos, &config, &registry);
        let c = TerrainGenerator::new(43).generate_chunk(pos, &config, &registry);
        assert!(
            bincode::serialize(&a).expect("serialize chunk")
                != bincode::serialize(&c).expect("serialize chunk"),
            "different seeds should diverge"
        );
    }

    #[test]
    fn every_column_reaches_at_least_sea_level() {
        let registry = register_default_blocks();
        let config = WorldConfig::small_flat();
        let chunk =
            TerrainGenerator::new(7).generate_chunk(ChunkPos::new(0, 0), &config, &registry);

        for z in 0..config.chunk_size as u8 {
            for x in 0..config.chunk_size as u8 {
                // Sea-level clamping guarantees a solid floor everywhere.
                assert_ne!(
                    chunk.get(LocalPos { x, y: 0, z }),
                    BlockId::AIR,
                    "column ({x}, {z}) has no floor"
                );
            }
        }
        assert!(chunk.block_count() > 0);
        assert!(!chunk.is_dirty());
    }

    #[test]
    fn sea_level_columns_are_sand() {
        let registry = register_default_blocks();
        let sand = registry
            .get_by_name("minecraft:sand")
            .expect("sand should be registered");
        let grass = registry
            .get_by_name("minecraft:grass_block")
            .expect("grass_block should be registered");
        let config = WorldConfig::normal();
        let chunk =
            TerrainGenerator::new(1).generate_chunk(ChunkPos::new(0, 0), &config, &registry);

        for z in 0..config.chunk_size as u8 {
            for x in 0..config.chunk_size as u8 {
                let floor = chunk.get(LocalPos { x, y: 0, z });
                assert!(
                    floor == sand || floor == grass,
                    "column floor should be a surface material"
                );
                if floor == sand {
                    // Sand columns were clamped to sea level.
                    let above_sea = LocalPos {
                        x,
                        y: config.sea_level as u8,
                        z,
                    };
                    assert_eq!(chunk.get(above_sea), BlockId::AIR);
                }
            }
        }
    }

    #[test]
    fn tiny_debug_mode_generates_no_decorations() {
        let registry = register_default_blocks();
        let config = WorldConfig::tiny_debug();
        let chunk =
            TerrainGenerator::new(99).generate_chunk(ChunkPos::new(1, 1), &config, &registry);

        let forbidden = [
            "minecraft:short_grass",
            "minecraft:dandelion",
            "minecraft:poppy",
            "minecraft:oak_log",
            "minecraft:oak_leaves",
            "web3:cloud",
        ];
        for name in forbidden {
            let id = registry.get_by_name(name).expect("block should be registered");
            assert!(
                !chunk.palette().entries().contains(&id),
                "{name} should not appear in tiny_debug terrain"
            );
        }
    }
}
