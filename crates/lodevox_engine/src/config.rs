use serde::{Deserialize, Serialize};

/// One world mode: chunk geometry, streaming radii, terrain shaping
/// constants, and feature gates. Deserialisable from TOML so a custom
/// mode can be loaded from a file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorldConfig {
    /// Horizontal chunk edge in blocks. The vertical axis is not
    /// chunked; every chunk spans the full world height.
    pub chunk_size: u32,
    pub max_height: u32,
    /// Chebyshev radius inside which missing chunks are generated.
    pub create_radius: u32,
    /// Chebyshev radius inside which chunks are offered for rendering.
    pub render_radius: u32,
    /// Chebyshev radius beyond which loaded chunks are unloaded.
    pub delete_radius: u32,
    pub noise_scale: f64,
    pub height_scale: f64,
    pub height_offset: f64,
    pub sea_level: u32,
    pub plants: bool,
    pub trees: bool,
    pub clouds: bool,
}

impl WorldConfig {
    pub fn normal() -> Self {
        Self {
            chunk_size: 32,
            max_height: 256,
            create_radius: 10,
            render_radius: 10,
            delete_radius: 14,
            noise_scale: 0.01,
            height_scale: 32.0,
            height_offset: 16.0,
            sea_level: 12,
            plants: true,
            trees: true,
            clouds: true,
        }
    }

    pub fn small_flat() -> Self {
        Self {
            chunk_size: 8,
            max_height: 32,
            create_radius: 3,
            render_radius: 3,
            delete_radius: 5,
            noise_scale: 0.02,
            height_scale: 4.0,
            height_offset: 8.0,
            sea_level: 6,
            plants: true,
            trees: false,
            clouds: false,
        }
    }

    pub fn tiny_debug() -> Self {
        Self {
            chunk_size: 4,
            max_height: 16,
            create_radius: 2,
            render_radius: 2,
            delete_radius: 3,
            noise_scale: 0.05,
            height_scale: 2.0,
            height_offset: 4.0,
            sea_level: 3,
            plants: false,
            trees: false,
            clouds: false,
        }
    }

    /// Looks up a preset by the name the binaries accept on the CLI.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "normal" => Some(Self::normal()),
            "small_flat" => Some(Self::small_flat()),
            "tiny_debug" => Some(Self::tiny_debug()),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 || self.max_height == 0 {
            return Err(format!(
                "chunk dimensions must be nonzero, got {}x{}",
                self.chunk_size, self.max_height
            ));
        }
        // Local cell coordinates are stored as u8, so dimensions past
        // 256 would alias distinct positions onto the same cell.
        if self.chunk_size > 256 || self.max_height > 256 {
            return Err(format!(
                "chunk dimensions are limited to 256, got {}x{}",
                self.chunk_size, self.max_height
            ));
        }
        if self.render_radius > self.create_radius {
            return Err(format!(
                "render radius {} exceeds create radius {}",
                self.render_radius, self.create_radius
            ));
        }
        if self.create_radius > self.delete_radius {
            return Err(format!(
                "create radius {} exceeds delete radius {}",
                self.create_radius, self.delete_radius
            ));
        }
        if self.sea_level >= self.max_height {
            return Err(format!(
                "sea level {} is at or above max height {}",
                self.sea_level, self.max_height
            ));
        }
        Ok(())
    }

    pub fn chunk_volume(&self) -> usize {
        (self.chunk_size * self.chunk_size * self.max_height) as usize
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self::normal()
    }
}

#[cfg(test)]
mod tests {
    use super::WorldConfig;

    #[test]
    fn presets_pass_validation() {
        for name in ["normal", "small_flat", "tiny_debug"] {
            let config = WorldConfig::preset(name).expect("preset should exist");
            config.validate().expect("preset should be valid");
        }
        assert!(WorldConfig::preset("huge").is_none());
    }

    #[test]
    fn validation_rejects_inverted_radii() {
        let mut config = WorldConfig::small_flat();
        config.render_radius = config.create_radius + 1;
        assert!(config.validate().is_err());

        let mut config = WorldConfig::small_flat();
        config.delete_radius = config.create_radius - 1;
        assert!(config.validate().is_err());

        let mut config = WorldConfig::small_flat();
        config.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_dimensions_past_local_coordinate_range() {
        let mut config = WorldConfig::normal();
        config.max_height = 300;
        assert!(config.validate().is_err());

        let mut config = WorldConfig::normal();
        config.chunk_size = 300;
        assert!(config.validate().is_err());

        // 256 itself is fine: local coordinates run 0..=255.
        let mut config = WorldConfig::normal();
        config.max_height = 256;
        config.chunk_size = 256;
        config.validate().expect("256 is the inclusive limit");
    }

    #[test]
    fn config_loads_from_toml() {
        let text = r#"
            chunk_size = 16
            max_height = 64
            create_radius = 4
            render_radius = 4
            delete_radius = 6
            noise_scale = 0.015
            height_scale = 12.0
            height_offset = 10.0
            sea_level = 8
            plants = true
            trees = true
            clouds = false
        "#;
        let config: WorldConfig = toml::from_str(text).expect("parse config");
        assert_eq!(config.chunk_size, 16);
        assert_eq!(config.delete_radius, 6);
        assert!(config.trees);
        assert!(!config.clouds);
        config.validate().expect("parsed config should be valid");
    }
}
