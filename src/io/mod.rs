//! Driver input parsing.

mod config;

pub use config::{
    Config, LatticeConfig, OrbitalsConfig, RngConfig, SystemConfig, WavefunctionConfig,
};
