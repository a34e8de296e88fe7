use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Dense process-wide block code. Assigned sequentially at registration;
/// chunk storage never persists these directly (chunks go through their
/// palette), so the numbering only has to be stable within one run.
#[repr(transparent)]
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Pod,
    Zeroable,
)]
pub struct BlockId(pub u16);

impl BlockId {
    pub const AIR: Self = Self(0);
}

pub const MAX_LIGHT_LEVEL: u8 = 15;

/// Identifier returned for texture lookups that cannot be resolved;
/// consumers bind it to a visually obvious checkerboard.
pub const MISSING_TEXTURE: &str = "missing";

/// Cube face, in the order used by per-direction texture mappings.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Face {
    Up,
    Down,
    North,
    South,
    East,
    West,
}

/// How the mesh builder turns a block into geometry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockRenderType {
    /// Opaque full cube; occludes all six neighbor faces.
    Cube,
    /// Two intersecting diagonal quads (plants, torches).
    Cross,
    /// See-through full cube (glass); never occludes.
    Transparent,
    /// Cube with holes in the texture (leaves); never occludes.
    Cutout,
    /// Fluid cube with a lowered top surface.
    Liquid,
    /// Opaque cube that is itself a light source.
    Emissive,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaceTextures {
    All(String),
    TopBottomSide {
        top: String,
        bottom: String,
        side: String,
    },
    PerFace {
        up: String,
        down: String,
        north: String,
        south: String,
        east: String,
        west: String,
    },
}

impl FaceTextures {
    pub fn all(name: &str) -> Self {
        Self::All(name.to_string())
    }

    pub fn texture_for(&self, face: Face) -> &str {
        match self {
            Self::All(name) => name,
            Self::TopBottomSide { top, bottom, side } => match face {
                Face::Up => top,
                Face::Down => bottom,
                _ => side,
            },
            Self::PerFace {
                up,
                down,
                north,
                south,
                east,
                west,
            } => match face {
                Face::Up => up,
                Face::Down => down,
                Face::North => north,
                Face::South => south,
                Face::East => east,
                Face::West => west,
            },
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockDef {
    /// Namespaced identifier, e.g. "minecraft:stone".
    pub name: String,
    pub display_name: String,
    pub category: String,
    pub render_type: BlockRenderType,
    pub hardness: f32,
    pub transparent: bool,
    /// Light emission 0..=15.
    pub luminance: u8,
    pub flammable: bool,
    pub solid: bool,
    pub gravity: bool,
    pub textures: FaceTextures,
}

#[derive(Default, Debug, Clone)]
pub struct BlockRegistry {
    defs: Vec<BlockDef>,
    by_name: HashMap<String, BlockId>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self {
            defs: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Registers a block definition, assigning the next sequential id.
    /// Re-registering an existing identifier is a warned no-op that
    /// returns the original id.
    pub fn register(&mut self, def: BlockDef) -> BlockId {
        if let Some(existing) = self.by_name.get(def.name.as_str()) {
            warn!("block already registered: {}", def.name);
            return *existing;
        }

        let next_index = self.defs.len();
        let id = BlockId(
            u16::try_from(next_index).expect("block registry exceeded BlockId capacity (u16::MAX)"),
        );

        self.by_name.insert(def.name.clone(), id);
        self.defs.push(def);
        id
    }

    /// Definition for an id; out-of-range ids fall back to air.
    pub fn def(&self, id: BlockId) -> &BlockDef {
        self.defs
            .get(id.0 as usize)
            .or_else(|| self.defs.get(BlockId::AIR.0 as usize))
            .expect("block registry is empty; call register_default_blocks() first")
    }

    pub fn get(&self, name: &str) -> Option<&BlockDef> {
        self.get_by_name(name).map(|id| self.def(id))
    }

    pub fn get_by_name(&self, name: &str) -> Option<BlockId> {
        self.by_name.get(name).copied()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn contains(&self, id: BlockId) -> bool {
        usize::from(id.0) < self.defs.len()
    }

    pub fn is_transparent(&self, id: BlockId) -> bool {
        self.def(id).transparent
    }

    pub fn luminance(&self, id: BlockId) -> u8 {
        if id == BlockId::AIR {
            0
        } else {
            self.def(id).luminance.min(MAX_LIGHT_LEVEL)
        }
    }

    /// Whether a block stops light. Air and transparent blocks pass it.
    pub fn blocks_light(&self, id: BlockId) -> bool {
        if id == BlockId::AIR {
            return false;
        }
        let def = self.def(id);
        def.solid && !def.transparent
    }

    /// Texture name for one face of a block; unknown ids resolve to the
    /// missing-texture placeholder rather than failing the mesh build.
    pub fn texture_for(&self, id: BlockId, face: Face) -> &str {
        if !self.contains(id) {
            return MISSING_TEXTURE;
        }
        self.def(id).textures.texture_for(face)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

pub fn register_default_blocks() -> BlockRegistry {
    fn cube(name: &str, display: &str, category: &str, hardness: f32, texture: &str) -> BlockDef {
        BlockDef {
            name: name.to_string(),
            display_name: display.to_string(),
            category: category.to_string(),
            render_type: BlockRenderType::Cube,
            hardness,
            transparent: false,
            luminance: 0,
            flammable: false,
            solid: true,
            gravity: false,
            textures: FaceTextures::all(texture),
        }
    }

    fn cross(name: &str, display: &str, texture: &str, luminance: u8) -> BlockDef {
        BlockDef {
            name: name.to_string(),
            display_name: display.to_string(),
            category: "decoration".to_string(),
            render_type: BlockRenderType::Cross,
            hardness: 0.0,
            transparent: true,
            luminance,
            flammable: true,
            solid: false,
            gravity: false,
            textures: FaceTextures::all(texture),
        }
    }

    let mut registry = BlockRegistry::new();

    let mut air = cube("minecraft:air", "Air", "special", 0.0, "air");
    air.render_type = BlockRenderType::Transparent;
    air.transparent = true;
    air.solid = false;

    let grass_block = BlockDef {
        name: "minecraft:grass_block".to_string(),
        display_name: "Grass Block".to_string(),
        category: "natural".to_string(),
        render_type: BlockRenderType::Cube,
        hardness: 0.6,
        transparent: false,
        luminance: 0,
        flammable: false,
        solid: true,
        gravity: false,
        textures: FaceTextures::TopBottomSide {
            top: "grass_block_top".to_string(),
            bottom: "dirt".to_string(),
            side: "grass_block_side".to_string(),
        },
    };

    let oak_log = BlockDef {
        name: "minecraft:oak_log".to_string(),
        display_name: "Oak Log".to_string(),
        category: "natural".to_string(),
        render_type: BlockRenderType::Cube,
        hardness: 2.0,
        transparent: false,
        luminance: 0,
        flammable: true,
        solid: true,
        gravity: false,
        textures: FaceTextures::TopBottomSide {
            top: "oak_log_top".to_string(),
            bottom: "oak_log_top".to_string(),
            side: "oak_log".to_string(),
        },
    };

    let mut sand = cube("minecraft:sand", "Sand", "natural", 0.5, "sand");
    sand.gravity = true;

    let mut oak_leaves = cube("minecraft:oak_leaves", "Oak Leaves", "natural", 0.2, "oak_leaves");
    oak_leaves.render_type = BlockRenderType::Cutout;
    oak_leaves.transparent = true;
    oak_leaves.flammable = true;

    let mut glass = cube("minecraft:glass", "Glass", "building", 0.3, "glass");
    glass.render_type = BlockRenderType::Transparent;
    glass.transparent = true;

    let mut water = cube("minecraft:water", "Water", "fluid", 100.0, "water_still");
    water.render_type = BlockRenderType::Liquid;
    water.transparent = true;
    water.solid = false;

    let mut lava = cube("minecraft:lava", "Lava", "fluid", 100.0, "lava_still");
    lava.render_type = BlockRenderType::Liquid;
    lava.transparent = true;
    lava.solid = false;
    lava.luminance = 15;

    let mut glowstone = cube("minecraft:glowstone", "Glowstone", "lighting", 0.3, "glowstone");
    glowstone.render_type = BlockRenderType::Emissive;
    glowstone.luminance = 15;

    let mut oak_planks =
        cube("minecraft:oak_planks", "Oak Planks", "building", 2.0, "oak_planks");
    oak_planks.flammable = true;

    let bedrock = cube("minecraft:bedrock", "Bedrock", "special", 1000.0, "bedrock");

    let cloud = cube("web3:cloud", "Cloud", "special", 0.0, "cloud");

    let defaults = [
        air,
        cube("minecraft:stone", "Stone", "natural", 1.5, "stone"),
        cube("minecraft:dirt", "Dirt", "natural", 0.5, "dirt"),
        grass_block,
        sand,
        cube("minecraft:cobblestone", "Cobblestone", "building", 2.0, "cobblestone"),
        bedrock,
        oak_log,
        oak_planks,
        oak_leaves,
        glass,
        water,
        lava,
        glowstone,
        cross("minecraft:torch", "Torch", "torch", 14),
        cross("minecraft:dandelion", "Dandelion", "dandelion", 0),
        cross("minecraft:poppy", "Poppy", "poppy", 0),
        cross("minecraft:short_grass", "Short Grass", "short_grass", 0),
        cross("minecraft:fern", "Fern", "fern", 0),
        cloud,
    ];

    for def in defaults {
        registry.register(def);
    }

    debug_assert_eq!(
        registry.get_by_name("minecraft:air"),
        Some(BlockId::AIR),
        "air must hold id 0"
    );

    registry
}
