use std::env;

use lodevox_engine::block::{register_default_blocks, MAX_LIGHT_LEVEL};
use lodevox_engine::config::WorldConfig;
use lodevox_engine::coords::{ChunkPos, LocalPos};
use lodevox_engine::lighting::recompute_chunk_light;
use lodevox_engine::world::DEFAULT_WORLD_SEED;
use lodevox_engine::worldgen::TerrainGenerator;

fn main() {
    let mut mode = String::from("small_flat");
    let mut seed = DEFAULT_WORLD_SEED;
    let mut positional = Vec::new();

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
            "--help" | "-h" => {
                println!("Usage: chunk_inspector [--mode <m>] [--seed <n>] <p> <q>");
                return;
            }
            other => positional.push(other.to_string()),
        }
    }

    if positional.len() != 2 {
        eprintln!("Usage: chunk_inspector [--mode <m>] [--seed <n>] <p> <q>");
        std::process::exit(2);
    }

    let (Ok(p), Ok(q)) = (positional[0].parse::<i32>(), positional[1].parse::<i32>()) else {
        eprintln!("chunk coordinates must be integers");
        std::process::exit(2);
    };

    if let Err(err) = run(&mode, seed, ChunkPos::new(p, q)) {
        eprintln!("chunk_inspector error: {err}");
        std::process::exit(1);
    }
}

fn run(mode: &str, seed: u64, pos: ChunkPos) -> Result<(), String> {
    let config = WorldConfig::preset(mode).ok_or_else(|| format!("unknown world mode '{mode}'"))?;
    let registry = register_default_blocks();
    let mut chunk = TerrainGenerator::new(seed).generate_chunk(pos, &config, &registry);
    recompute_chunk_light(&mut chunk, &registry);

    println!("Chunk ({}, {}) in mode '{mode}', seed {seed}", pos.p, pos.q);
    println!(
        "Dimensions: {}x{}x{} ({} cells)",
        chunk.size(),
        chunk.height(),
        chunk.size(),
        chunk.volume()
    );
    println!(
        "Stats: {} blocks, min Y {:?}, max Y {:?}, uniform {:?}, flags {:?}",
        chunk.block_count(),
        chunk.min_y(),
        chunk.max_y(),
        chunk.uniform().map(|id| registry.def(id).name.clone()),
        chunk.flags()
    );

    println!(
        "Palette: {} entries, storage width {:?}",
        chunk.palette().len(),
        chunk.palette().storage_width()
    );
    for (index, &id) in chunk.palette().entries().iter().enumerate() {
        println!("  [{index:3}] {} ({:?})", registry.def(id).name, id);
    }

    let mut histogram = [0usize; MAX_LIGHT_LEVEL as usize + 1];
    for y in 0..chunk.height() {
        for z in 0..chunk.size() {
            for x in 0..chunk.size() {
                let level = chunk.light(LocalPos {
                    x: x as u8,
                    y: y as u8,
                    z: z as u8,
                });
                histogram[usize::from(level)] += 1;
            }
        }
    }
    println!("Light histogram:");
    for (level, count) in histogram.iter().enumerate() {
        if *count > 0 {
            println!("  level {level:2}: {count} cells");
        }
    }

    Ok(())
}
