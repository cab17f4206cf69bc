//! Model components for nbox
//!
//! - [`SimpleNbox`](components::SimpleNbox): biome-partitioned terrestrial carbon cycle
//! - [`OceanCarbon`](components::OceanCarbon): two-reservoir ocean carbon uptake
//! - [`PrescribedTemperature`](components::PrescribedTemperature): global temperature from a
//!   prescribed series

pub mod components;
