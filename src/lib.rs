//! A simple climate model built around a biome-partitioned terrestrial carbon cycle.
//!
//! The standard model couples [`SimpleNbox`] (land and atmosphere) with [`OceanCarbon`] and a
//! [`PrescribedTemperature`] driver on a single [`Core`]. Runs are described by a TOML
//! [`RunConfig`]:
//!
//! ```no_run
//! let config = nbox::RunConfig::load("run.toml")?;
//! let core = nbox::run(&config)?;
//! let summary = nbox::summarise(&core)?;
//! println!("{} recorded dates", summary.snapshots.len());
//! # Ok::<(), nbox::NboxError>(())
//! ```

pub use nbox_components::components::{
    CarbonSnapshot, OceanCarbon, PrescribedTemperature, SimpleNbox,
};
pub use nbox_core::config::RunConfig;
pub use nbox_core::core::Core;
pub use nbox_core::errors::{NboxError, NboxResult};

use nbox_core::timeseries::{FloatValue, Time};
use serde::{Deserialize, Serialize};

/// Name under which the terrestrial model is registered
pub const LAND_COMPONENT: &str = "simpleNbox";
/// Name under which the ocean model is registered
pub const OCEAN_COMPONENT: &str = "ocean";

/// Build the standard model and apply every configured value
///
/// The returned core has not been prepared, so biomes can still be edited before running.
pub fn build_core(config: &RunConfig) -> NboxResult<Core> {
    let mut core = config.new_core();
    core.add_component(Box::new(SimpleNbox::new()))?;
    core.add_component(Box::new(OceanCarbon::new()))?;
    core.add_component(Box::new(PrescribedTemperature::new()))?;
    config.apply(&mut core)?;
    Ok(core)
}

/// Build the standard model and run it to the configured end date
pub fn run(config: &RunConfig) -> NboxResult<Core> {
    let mut core = build_core(config)?;
    core.run(None)?;
    log::info!(
        "Run '{}' finished at {}",
        core.settings().run_name,
        core.current_date()
    );
    if core.settings().output {
        report(&summarise(&core)?);
    }
    Ok(core)
}

/// Log the final recorded state of a run
fn report(summary: &RunSummary) {
    let (Some(land), Some(ocean)) = (summary.snapshots.last(), summary.ocean.last()) else {
        log::info!("Run '{}' recorded nothing", summary.run_name);
        return;
    };
    log::info!(
        "{} at {}: Ca = {} ppmv, land = {} PgC, ocean = {} PgC, earth = {} PgC",
        summary.run_name,
        land.date,
        land.ca,
        land.land_c(),
        ocean.surface_c + ocean.deep_c,
        land.earth_c
    );
    for (date, total) in summary.total_carbon() {
        log::debug!("{}: total carbon {} PgC", date, total);
    }
}

/// Ocean reservoirs at a recorded date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OceanSnapshot {
    pub date: Time,
    /// unit: PgC
    pub surface_c: FloatValue,
    /// unit: PgC
    pub deep_c: FloatValue,
    /// unit: PgC / yr
    pub atm_ocean_flux: FloatValue,
}

/// Everything recorded by a run of the standard model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_name: String,
    pub snapshots: Vec<CarbonSnapshot>,
    pub ocean: Vec<OceanSnapshot>,
}

impl RunSummary {
    /// Total carbon in every tracked pool at each recorded date
    pub fn total_carbon(&self) -> Vec<(Time, FloatValue)> {
        self.snapshots
            .iter()
            .zip(&self.ocean)
            .map(|(land, ocean)| {
                (
                    land.date,
                    land.atmos_c
                        + land.land_c()
                        + land.earth_c
                        + ocean.surface_c
                        + ocean.deep_c,
                )
            })
            .collect()
    }
}

/// Collect the recorded state of a core built by [`build_core`]
pub fn summarise(core: &Core) -> NboxResult<RunSummary> {
    let land = core.component::<SimpleNbox>(LAND_COMPONENT)?;
    let snapshots = land.snapshots().collect::<NboxResult<Vec<_>>>()?;
    drop(land);

    let ocean = snapshots
        .iter()
        .map(|s| {
            Ok(OceanSnapshot {
                date: s.date,
                surface_c: core
                    .get_data(nbox_core::standard_variables::D_OCEAN_SURFACE_C, Some(s.date))?
                    .value(),
                deep_c: core
                    .get_data(nbox_core::standard_variables::D_OCEAN_DEEP_C, Some(s.date))?
                    .value(),
                atm_ocean_flux: core
                    .get_data(nbox_core::standard_variables::D_OCEAN_CFLUX, Some(s.date))?
                    .value(),
            })
        })
        .collect::<NboxResult<Vec<_>>>()?;

    Ok(RunSummary {
        run_name: core.settings().run_name.clone(),
        snapshots,
        ocean,
    })
}
