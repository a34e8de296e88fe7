use std::env;
use std::fs;
use std::path::PathBuf;

use tracing::info;

use lodevox_engine::config::WorldConfig;
use lodevox_engine::coords::ChunkPos;
use lodevox_engine::world::{World, DEFAULT_WORLD_SEED};
use lodevox_mesh::{build_chunk_mesh, ChunkNeighbors};

fn main() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();

    let mut mode = String::from("small_flat");
    let mut seed = DEFAULT_WORLD_SEED;
    let mut steps: u32 = 16;
    let mut config_path: Option<PathBuf> = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--mode" => {
                let Some(value) = args.next() else {
                    eprintln!("--mode expects a preset name");
                    std::process::exit(2);
                };
                mode = value;
            }
            "--seed" => {
                let Some(value) = args.next() else {
                    eprintln!("--seed expects a numeric argument");
                    std::process::exit(2);
                };
                match value.parse::<u64>() {
                    Ok(parsed) => seed = parsed,
                    Err(err) => {
                        eprintln!("invalid seed '{value}': {err}");
                        std::process::exit(2);
                    }
                }
            }
            "--steps" => {
                let Some(value) = args.next() else {
                    eprintln!("--steps expects a numeric argument");
                    std::process::exit(2);
                };
                match value.parse::<u32>() {
                    Ok(parsed) => steps = parsed,
                    Err(err) => {
                        eprintln!("invalid step count '{value}': {err}");
                        std::process::exit(2);
                    }
                }
            }
            "--config" => {
                let Some(value) = args.next() else {
                    eprintln!("--config expects a path argument");
                    std::process::exit(2);
                };
                config_path = Some(PathBuf::from(value));
            }
            "--help" | "-h" => {
                println!(
                    "Usage: lodevox_demo [--mode <normal|small_flat|tiny_debug>] \
                     [--seed <u64>] [--steps <n>] [--config <path.toml>]"
                );
                return;
            }
            other => {
                eprintln!("unknown argument: {other}");
                std::process::exit(2);
            }
        }
    }

    let config = match config_path {
        Some(path) => match load_config(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("failed to load config {}: {err}", path.display());
                std::process::exit(1);
            }
        },
        None => match WorldConfig::preset(&mode) {
            Some(config) => config,
            None => {
                eprintln!("unknown world mode '{mode}'");
                std::process::exit(2);
            }
        },
    };

    if let Err(err) = run(config, seed, steps) {
        eprintln!("demo failed: {err}");
        std::process::exit(1);
    }
}

fn load_config(path: &std::path::Path) -> Result<WorldConfig, String> {
    let text = fs::read_to_string(path).map_err(|err| format!("read error: {err}"))?;
    let config: WorldConfig =
        toml::from_str(&text).map_err(|err| format!("parse error: {err}"))?;
    config.validate()?;
    Ok(config)
}

/// Walks the viewpoint east one chunk per tick, streaming chunks and
/// meshing whatever became dirty along the way.
fn run(config: WorldConfig, seed: u64, steps: u32) -> Result<(), String> {
    info!(
        "starting streaming walk: seed {seed}, chunk size {}, {} steps",
        config.chunk_size, steps
    );
    let mut world = World::new(config, seed)?;

    for step in 0..steps {
        let viewpoint = ChunkPos::new(step as i32, 0);
        world.update_around_viewpoint(viewpoint);

        let mut meshed = 0usize;
        let mut vertices = 0usize;
        let renderable = world.renderable_chunks(viewpoint);
        for pos in world.dirty_chunks() {
            if !renderable.contains(&pos) {
                continue;
            }
            let chunk = world.chunk(pos).expect("dirty chunk must be loaded");
            let neighbors = ChunkNeighbors {
                pos_x: world.chunk(pos + ChunkPos::new(1, 0)),
                neg_x: world.chunk(pos + ChunkPos::new(-1, 0)),
                pos_z: world.chunk(pos + ChunkPos::new(0, 1)),
                neg_z: world.chunk(pos + ChunkPos::new(0, -1)),
            };
            let batches = build_chunk_mesh(chunk, world.registry(), &neighbors);
            meshed += 1;
            vertices += batches.iter().map(|batch| batch.vertices.len()).sum::<usize>();
            world.clear_dirty(pos);
        }

        let stats = world.stats();
        info!(
            "tick {step}: viewpoint ({}, {}), {} chunks loaded, {} renderable, \
             meshed {meshed} ({vertices} vertices), {} blocks total",
            viewpoint.p,
            viewpoint.q,
            stats.loaded_chunks,
            renderable.len(),
            stats.total_blocks
        );
    }

    Ok(())
}
