//! Chunk mesh builder: face culling, cube and cross geometry, ambient
//! occlusion, and per-texture batching.

use std::collections::BTreeMap;

use bytemuck::{Pod, Zeroable};
use lodevox_engine::block::{BlockId, BlockRegistry, BlockRenderType, Face, MAX_LIGHT_LEVEL};
use lodevox_engine::chunk::ChunkData;
use lodevox_engine::coords::LocalPos;

/// How far a liquid's exposed top surface sits below the cell ceiling.
const LIQUID_SURFACE_DROP: f32 = 0.125;
/// Cross quads are pulled slightly off the cell diagonal so they do not
/// z-fight with neighboring cube faces.
const CROSS_INSET: f32 = 0.02;
/// Vertex darkening per quantised occlusion step, floored at 0.3 so
/// corners never go fully black.
const AO_LEVELS: [f32; 4] = [1.0, 0.77, 0.53, 0.3];

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub ao: f32,
    pub light: f32,
}
const _: [(); 40] = [(); std::mem::size_of::<MeshVertex>()];

/// One draw batch: every quad in a chunk that references the same
/// texture, regardless of which block type produced it.
#[derive(Debug, Clone, Default)]
pub struct MeshBatch {
    pub texture: String,
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshBatch {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn quad_count(&self) -> usize {
        self.vertices.len() / 4
    }
}

/// Horizontally adjacent chunks for cross-boundary culling. The world
/// is not chunked vertically, so there are no Y neighbors.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChunkNeighbors<'a> {
    pub pos_x: Option<&'a ChunkData>,
    pub neg_x: Option<&'a ChunkData>,
    pub pos_z: Option<&'a ChunkData>,
    pub neg_z: Option<&'a ChunkData>,
}

#[derive(Copy, Clone)]
struct FaceSpec {
    face: Face,
    axis: usize,
    sign: i32,
    u_axis: usize,
    v_axis: usize,
    normal: [f32; 3],
}

const FACE_SPECS: [FaceSpec; 6] = [
    // +X
    FaceSpec {
        face: Face::East,
        axis: 0,
        sign: 1,
        u_axis: 1,
        v_axis: 2,
        normal: [1.0, 0.0, 0.0],
    },
    // -X
    FaceSpec {
        face: Face::West,
        axis: 0,
        sign: -1,
        u_axis: 2,
        v_axis: 1,
        normal: [-1.0, 0.0, 0.0],
    },
    // +Y
    FaceSpec {
        face: Face::Up,
        axis: 1,
        sign: 1,
        u_axis: 2,
        v_axis: 0,
        normal: [0.0, 1.0, 0.0],
    },
    // -Y
    FaceSpec {
        face: Face::Down,
        axis: 1,
        sign: -1,
        u_axis: 0,
        v_axis: 2,
        normal: [0.0, -1.0, 0.0],
    },
    // +Z
    FaceSpec {
        face: Face::South,
        axis: 2,
        sign: 1,
        u_axis: 0,
        v_axis: 1,
        normal: [0.0, 0.0, 1.0],
    },
    // -Z
    FaceSpec {
        face: Face::North,
        axis: 2,
        sign: -1,
        u_axis: 1,
        v_axis: 0,
        normal: [0.0, 0.0, -1.0],
    },
];

/// Builds the render batches for one chunk. Vertex positions are in
/// chunk-local space; the presentation layer offsets by the chunk's
/// world origin. Batches come back sorted by texture name so the
/// output is deterministic for a given chunk state.
pub fn build_chunk_mesh(
    chunk: &ChunkData,
    registry: &BlockRegistry,
    neighbors: &ChunkNeighbors<'_>,
) -> Vec<MeshBatch> {
    let mut batches: BTreeMap<String, MeshBatch> = BTreeMap::new();

    let size = chunk.size() as i32;
    let height = chunk.height() as i32;

    for y in 0..height {
        for z in 0..size {
            for x in 0..size {
                let local = LocalPos {
                    x: x as u8,
                    y: y as u8,
                    z: z as u8,
                };
                let block = chunk.get(local);
                if block == BlockId::AIR {
                    continue;
                }

                match registry.def(block).render_type {
                    BlockRenderType::Cross => {
                        emit_cross(&mut batches, chunk, registry, [x, y, z], block);
                    }
                    _ => {
                        emit_cube_faces(
                            &mut batches,
                            chunk,
                            registry,
                            neighbors,
                            [x, y, z],
                            block,
                        );
                    }
                }
            }
        }
    }

    batches.into_values().filter(|batch| !batch.is_empty()).collect()
}

fn emit_cube_faces(
    batches: &mut BTreeMap<String, MeshBatch>,
    chunk: &ChunkData,
    registry: &BlockRegistry,
    neighbors: &ChunkNeighbors<'_>,
    coords: [i32; 3],
    block: BlockId,
) {
    let is_liquid = registry.def(block).render_type == BlockRenderType::Liquid;
    let above = sample_block(chunk, neighbors, [coords[0], coords[1] + 1, coords[2]]);
    let surface_exposed = is_liquid && above != block;

    for face in FACE_SPECS {
        let mut adjacent_coords = coords;
        adjacent_coords[face.axis] += face.sign;
        let adjacent = sample_block(chunk, neighbors, adjacent_coords);

        if occludes(adjacent, registry) {
            continue;
        }
        // A liquid never draws internal faces against itself.
        if is_liquid && adjacent == block {
            continue;
        }

        let mut positions = face_positions(face, coords);
        if surface_exposed {
            let ceiling = (coords[1] + 1) as f32;
            for position in &mut positions {
                if position[1] == ceiling {
                    position[1] -= LIQUID_SURFACE_DROP;
                }
            }
        }

        let ao = if is_liquid {
            [1.0f32; 4]
        } else {
            face_ao(chunk, registry, neighbors, face, coords)
        };
        let light = face_light(chunk, registry, neighbors, adjacent_coords, block);

        let texture = registry.texture_for(block, face.face).to_string();
        push_quad(
            batches.entry(texture.clone()).or_insert_with(|| MeshBatch {
                texture,
                ..MeshBatch::default()
            }),
            positions,
            face.normal,
            [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            ao,
            light,
        );
    }
}

/// Plants render as two intersecting diagonal quads spanning the cell.
fn emit_cross(
    batches: &mut BTreeMap<String, MeshBatch>,
    chunk: &ChunkData,
    registry: &BlockRegistry,
    coords: [i32; 3],
    block: BlockId,
) {
    let x = coords[0] as f32;
    let y = coords[1] as f32;
    let z = coords[2] as f32;
    let lo = CROSS_INSET;
    let hi = 1.0 - CROSS_INSET;

    let own_light = chunk.light(LocalPos {
        x: coords[0] as u8,
        y: coords[1] as u8,
        z: coords[2] as u8,
    });
    let light = normalized_light(own_light.max(registry.luminance(block)));

    let quads = [
        (
            [
                [x + lo, y, z + lo],
                [x + hi, y, z + hi],
                [x + hi, y + 1.0, z + hi],
                [x + lo, y + 1.0, z + lo],
            ],
            [std::f32::consts::FRAC_1_SQRT_2, 0.0, -std::f32::consts::FRAC_1_SQRT_2],
        ),
        (
            [
                [x + lo, y, z + hi],
                [x + hi, y, z + lo],
                [x + hi, y + 1.0, z + lo],
                [x + lo, y + 1.0, z + hi],
            ],
            [std::f32::consts::FRAC_1_SQRT_2, 0.0, std::f32::consts::FRAC_1_SQRT_2],
        ),
    ];

    let texture = registry.texture_for(block, Face::North).to_string();
    let batch = batches.entry(texture.clone()).or_insert_with(|| MeshBatch {
        texture,
        ..MeshBatch::default()
    });
    for (positions, normal) in quads {
        push_quad(
            batch,
            positions,
            normal,
            [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]],
            [1.0; 4],
            [light; 4],
        );
    }
}

fn face_positions(face: FaceSpec, coords: [i32; 3]) -> [[f32; 3]; 4] {
    let slice = coords[face.axis];
    let u = coords[face.u_axis];
    let v = coords[face.v_axis];
    let plane = if face.sign > 0 { slice + 1 } else { slice };

    let mut p0 = [0.0f32; 3];
    p0[face.axis] = plane as f32;
    p0[face.u_axis] = u as f32;
    p0[face.v_axis] = v as f32;

    let mut p1 = p0;
    p1[face.u_axis] += 1.0;
    let mut p2 = p1;
    p2[face.v_axis] += 1.0;
    let mut p3 = p0;
    p3[face.v_axis] += 1.0;

    [p0, p1, p2, p3]
}

/// Per-vertex occlusion from the three cells touching each corner of
/// the face (two edge neighbors and the diagonal). Two blocked edges
/// pin the corner to full occlusion regardless of the diagonal.
fn face_ao(
    chunk: &ChunkData,
    registry: &BlockRegistry,
    neighbors: &ChunkNeighbors<'_>,
    face: FaceSpec,
    coords: [i32; 3],
) -> [f32; 4] {
    let corner_signs = [(-1, -1), (1, -1), (1, 1), (-1, 1)];
    let mut ao = [1.0f32; 4];

    for (i, (su, sv)) in corner_signs.into_iter().enumerate() {
        let mut base = coords;
        base[face.axis] += face.sign;

        let mut side_u = base;
        side_u[face.u_axis] += su;
        let mut side_v = base;
        side_v[face.v_axis] += sv;
        let mut corner = base;
        corner[face.u_axis] += su;
        corner[face.v_axis] += sv;

        let side_u_solid = occludes(sample_block(chunk, neighbors, side_u), registry);
        let side_v_solid = occludes(sample_block(chunk, neighbors, side_v), registry);
        let corner_solid = occludes(sample_block(chunk, neighbors, corner), registry);

        let level = if side_u_solid && side_v_solid {
            3
        } else {
            usize::from(side_u_solid) + usize::from(side_v_solid) + usize::from(corner_solid)
        };
        ao[i] = AO_LEVELS[level];
    }

    ao
}

fn face_light(
    chunk: &ChunkData,
    registry: &BlockRegistry,
    neighbors: &ChunkNeighbors<'_>,
    adjacent_coords: [i32; 3],
    block: BlockId,
) -> [f32; 4] {
    let sampled = sample_light(chunk, neighbors, adjacent_coords);
    // An emissive block's own faces never read darker than it glows.
    let level = sampled.max(registry.luminance(block));
    [normalized_light(level); 4]
}

fn normalized_light(level: u8) -> f32 {
    f32::from(level.min(MAX_LIGHT_LEVEL)) / f32::from(MAX_LIGHT_LEVEL)
}

/// Appends one quad, splitting it along whichever diagonal carries the
/// larger AO sum so occlusion gradients interpolate without seams.
fn push_quad(
    batch: &mut MeshBatch,
    positions: [[f32; 3]; 4],
    normal: [f32; 3],
    uvs: [[f32; 2]; 4],
    ao: [f32; 4],
    light: [f32; 4],
) {
    let base = batch.vertices.len() as u32;
    for i in 0..4 {
        batch.vertices.push(MeshVertex {
            position: positions[i],
            normal,
            uv: uvs[i],
            ao: ao[i],
            light: light[i],
        });
    }

    let indices = if ao[0] + ao[2] >= ao[1] + ao[3] {
        [base, base + 1, base + 2, base, base + 2, base + 3]
    } else {
        [base + 1, base + 2, base + 3, base + 1, base + 3, base]
    };
    batch.indices.extend_from_slice(&indices);
}

/// True when the block fully hides the face behind it. Cutout,
/// transparent, cross, and liquid blocks never occlude.
fn occludes(block: BlockId, registry: &BlockRegistry) -> bool {
    if block == BlockId::AIR {
        return false;
    }
    matches!(
        registry.def(block).render_type,
        BlockRenderType::Cube | BlockRenderType::Emissive
    )
}

fn sample_block(chunk: &ChunkData, neighbors: &ChunkNeighbors<'_>, coords: [i32; 3]) -> BlockId {
    let size = chunk.size() as i32;
    let height = chunk.height() as i32;
    let [x, y, z] = coords;

    if y < 0 || y >= height {
        return BlockId::AIR;
    }
    if (0..size).contains(&x) && (0..size).contains(&z) {
        return chunk.get(LocalPos {
            x: x as u8,
            y: y as u8,
            z: z as u8,
        });
    }

    let neighbor = match (axis_out(x, size), axis_out(z, size)) {
        (-1, 0) => neighbors.neg_x,
        (1, 0) => neighbors.pos_x,
        (0, -1) => neighbors.neg_z,
        (0, 1) => neighbors.pos_z,
        // Diagonal neighbors are not tracked; treat them as open.
        _ => None,
    };

    let Some(neighbor_chunk) = neighbor else {
        return BlockId::AIR;
    };
    neighbor_chunk.get(LocalPos {
        x: wrap_to_local(x, size) as u8,
        y: y as u8,
        z: wrap_to_local(z, size) as u8,
    })
}

fn sample_light(chunk: &ChunkData, neighbors: &ChunkNeighbors<'_>, coords: [i32; 3]) -> u8 {
    let size = chunk.size() as i32;
    let height = chunk.height() as i32;
    let [x, y, z] = coords;

    if y < 0 || y >= height {
        return 0;
    }
    if (0..size).contains(&x) && (0..size).contains(&z) {
        return chunk.light(LocalPos {
            x: x as u8,
            y: y as u8,
            z: z as u8,
        });
    }

    let neighbor = match (axis_out(x, size), axis_out(z, size)) {
        (-1, 0) => neighbors.neg_x,
        (1, 0) => neighbors.pos_x,
        (0, -1) => neighbors.neg_z,
        (0, 1) => neighbors.pos_z,
        _ => None,
    };

    let Some(neighbor_chunk) = neighbor else {
        return 0;
    };
    neighbor_chunk.light(LocalPos {
        x: wrap_to_local(x, size) as u8,
        y: y as u8,
        z: wrap_to_local(z, size) as u8,
    })
}

fn axis_out(value: i32, size: i32) -> i8 {
    if value < 0 {
        -1
    } else if value >= size {
        1
    } else {
        0
    }
}

fn wrap_to_local(value: i32, size: i32) -> i32 {
    if value < 0 {
        value + size
    } else if value >= size {
        value - size
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use lodevox_engine::block::{register_default_blocks, BlockId, BlockRegistry};
    use lodevox_engine::chunk::ChunkData;
    use lodevox_engine::coords::LocalPos;

    use super::{build_chunk_mesh, ChunkNeighbors, MeshBatch, LIQUID_SURFACE_DROP};

    const SIZE: u32 = 8;
    const HEIGHT: u32 = 32;

    fn block(registry: &BlockRegistry, name: &str) -> BlockId {
        registry
            .get_by_name(name)
            .unwrap_or_else(|| panic!("{name} should be registered"))
    }

    fn total_quads(batches: &[MeshBatch]) -> usize {
        batches.iter().map(MeshBatch::quad_count).sum()
    }

    #[test]
    fn isolated_block_emits_six_quads() {
        let registry = register_default_blocks();
        let stone = block(&registry, "minecraft:stone");
        let mut chunk = ChunkData::new(SIZE, HEIGHT);
        chunk.set(LocalPos { x: 3, y: 3, z: 3 }, stone);

        let batches = build_chunk_mesh(&chunk, &registry, &ChunkNeighbors::default());
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].texture, "stone");
        assert_eq!(batches[0].vertices.len(), 24);
        assert_eq!(batches[0].indices.len(), 36);
    }

    #[test]
    fn enclosed_faces_are_culled() {
        let registry = register_default_blocks();
        let stone = block(&registry, "minecraft:stone");
        let mut chunk = ChunkData::new(SIZE, HEIGHT);

        // A plus shape of seven cubes: twelve of the 42 cube faces are
        // interior and must not appear.
        let center = (3i32, 3i32, 3i32);
        chunk.set(LocalPos { x: 3, y: 3, z: 3 }, stone);
        for (dx, dy, dz) in [
            (1, 0, 0),
            (-1, 0, 0),
            (0, 1, 0),
            (0, -1, 0),
            (0, 0, 1),
            (0, 0, -1),
        ] {
            chunk.set(
                LocalPos {
                    x: (center.0 + dx) as u8,
                    y: (center.1 + dy) as u8,
                    z: (center.2 + dz) as u8,
                },
                stone,
            );
        }

        let batches = build_chunk_mesh(&chunk, &registry, &ChunkNeighbors::default());
        assert_eq!(total_quads(&batches), 30);
    }

    #[test]
    fn cross_block_emits_two_quads() {
        let registry = register_default_blocks();
        let grass = block(&registry, "minecraft:short_grass");
        let mut chunk = ChunkData::new(SIZE, HEIGHT);
        chunk.set(LocalPos { x: 2, y: 2, z: 2 }, grass);

        let batches = build_chunk_mesh(&chunk, &registry, &ChunkNeighbors::default());
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].vertices.len(), 8);
        assert_eq!(batches[0].indices.len(), 12);
    }

    #[test]
    fn batches_are_keyed_by_texture_not_block() {
        let registry = register_default_blocks();
        let grass_block = block(&registry, "minecraft:grass_block");
        let dirt = block(&registry, "minecraft:dirt");
        let mut chunk = ChunkData::new(SIZE, HEIGHT);
        chunk.set(LocalPos { x: 1, y: 1, z: 1 }, grass_block);
        chunk.set(LocalPos { x: 5, y: 1, z: 5 }, dirt);

        let batches = build_chunk_mesh(&chunk, &registry, &ChunkNeighbors::default());
        let names: Vec<&str> = batches.iter().map(|b| b.texture.as_str()).collect();
        // Sorted, and the grass block's bottom face shares the dirt batch
        // with the standalone dirt cube.
        assert_eq!(names, ["dirt", "grass_block_side", "grass_block_top"]);

        let dirt_batch = &batches[0];
        assert_eq!(dirt_batch.quad_count(), 7);
        assert_eq!(batches[1].quad_count(), 4);
        assert_eq!(batches[2].quad_count(), 1);
    }

    #[test]
    fn transparent_neighbors_do_not_cull_faces() {
        let registry = register_default_blocks();
        let stone = block(&registry, "minecraft:stone");
        let glass = block(&registry, "minecraft:glass");
        let mut chunk = ChunkData::new(SIZE, HEIGHT);
        chunk.set(LocalPos { x: 3, y: 3, z: 3 }, stone);
        chunk.set(LocalPos { x: 4, y: 3, z: 3 }, glass);

        let batches = build_chunk_mesh(&chunk, &registry, &ChunkNeighbors::default());
        let stone_batch = batches
            .iter()
            .find(|b| b.texture == "stone")
            .expect("stone batch should exist");
        // The face against the glass still renders.
        assert_eq!(stone_batch.quad_count(), 6);
    }

    #[test]
    fn liquid_surface_is_lowered_and_self_culled() {
        let registry = register_default_blocks();
        let water = block(&registry, "minecraft:water");
        let mut chunk = ChunkData::new(SIZE, HEIGHT);
        chunk.set(LocalPos { x: 2, y: 4, z: 2 }, water);
        chunk.set(LocalPos { x: 3, y: 4, z: 2 }, water);

        let batches = build_chunk_mesh(&chunk, &registry, &ChunkNeighbors::default());
        assert_eq!(batches.len(), 1);
        // Two cells, ten visible faces: the shared wall is culled both ways.
        assert_eq!(batches[0].quad_count(), 10);

        let expected_surface = 5.0 - LIQUID_SURFACE_DROP;
        let has_lowered_top = batches[0]
            .vertices
            .iter()
            .any(|v| v.normal == [0.0, 1.0, 0.0] && v.position[1] == expected_surface);
        assert!(has_lowered_top, "top faces should sit below the cell ceiling");
        let has_full_height_top = batches[0]
            .vertices
            .iter()
            .any(|v| v.normal == [0.0, 1.0, 0.0] && v.position[1] == 5.0);
        assert!(!has_full_height_top);
    }

    #[test]
    fn neighbor_chunk_blocks_cull_boundary_faces() {
        let registry = register_default_blocks();
        let stone = block(&registry, "minecraft:stone");

        let mut chunk = ChunkData::new(SIZE, HEIGHT);
        chunk.set(
            LocalPos {
                x: (SIZE - 1) as u8,
                y: 3,
                z: 3,
            },
            stone,
        );
        let mut east = ChunkData::new(SIZE, HEIGHT);
        east.set(LocalPos { x: 0, y: 3, z: 3 }, stone);

        let open = build_chunk_mesh(&chunk, &registry, &ChunkNeighbors::default());
        assert_eq!(total_quads(&open), 6);

        let neighbors = ChunkNeighbors {
            pos_x: Some(&east),
            ..ChunkNeighbors::default()
        };
        let culled = build_chunk_mesh(&chunk, &registry, &neighbors);
        assert_eq!(total_quads(&culled), 5);
    }

    #[test]
    fn ao_flips_the_quad_diagonal_toward_the_brighter_pair() {
        let registry = register_default_blocks();
        let stone = block(&registry, "minecraft:stone");
        let mut chunk = ChunkData::new(SIZE, HEIGHT);
        chunk.set(LocalPos { x: 2, y: 1, z: 2 }, stone);
        // Diagonal occluder above one corner of the top face.
        chunk.set(LocalPos { x: 1, y: 2, z: 1 }, stone);

        let batches = build_chunk_mesh(&chunk, &registry, &ChunkNeighbors::default());
        let batch = &batches[0];

        // Locate the target cube's top-face quad.
        let mut found = false;
        for quad in 0..batch.quad_count() {
            let verts = &batch.vertices[quad * 4..quad * 4 + 4];
            let is_top = verts.iter().all(|v| v.normal == [0.0, 1.0, 0.0])
                && verts.iter().all(|v| {
                    v.position[1] == 2.0
                        && (2.0..=3.0).contains(&v.position[0])
                        && (2.0..=3.0).contains(&v.position[2])
                });
            if !is_top {
                continue;
            }
            found = true;

            let ao = [verts[0].ao, verts[1].ao, verts[2].ao, verts[3].ao];
            assert!(ao[0] + ao[2] < ao[1] + ao[3], "occluded corner should darken one diagonal");

            let base = (quad * 4) as u32;
            let rel: Vec<u32> = batch.indices[quad * 6..quad * 6 + 6]
                .iter()
                .map(|i| i - base)
                .collect();
            assert_eq!(rel, [1, 2, 3, 1, 3, 0]);
        }
        assert!(found, "top face quad should exist");
    }
}
