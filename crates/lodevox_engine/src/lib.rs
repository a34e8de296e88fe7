pub mod block;
pub mod chunk;
pub mod config;
pub mod coords;
pub mod lighting;
pub mod palette;
pub mod world;
pub mod worldgen;
