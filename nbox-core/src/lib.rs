pub mod biome;
pub mod component;
pub mod config;
pub mod core;
#[cfg(test)]
mod example_components;
pub mod message;
pub mod registry;
pub mod solver;
pub mod standard_variables;
pub mod timeseries;
pub mod units;
pub mod utils;

pub mod errors;
