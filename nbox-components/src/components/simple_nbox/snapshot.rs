use super::SimpleNbox;
use nbox_core::biome::BiomeMap;
use nbox_core::errors::NboxResult;
use nbox_core::timeseries::{FloatValue, Time};
use serde::{Deserialize, Serialize};

/// Recorded terrestrial state at a single date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonSnapshot {
    pub date: Time,
    /// unit: PgC
    pub atmos_c: FloatValue,
    /// unit: ppmv
    pub ca: FloatValue,
    /// unit: PgC
    pub earth_c: FloatValue,
    /// unit: PgC
    pub residual: FloatValue,
    pub veg_c: BiomeMap<FloatValue>,
    pub detritus_c: BiomeMap<FloatValue>,
    pub soil_c: BiomeMap<FloatValue>,
    pub permafrost_c: BiomeMap<FloatValue>,
    /// unit: PgC / yr
    pub npp: BiomeMap<FloatValue>,
    /// CO2 and CH4 respired from detritus
    /// unit: PgC / yr
    pub rh_detritus: BiomeMap<FloatValue>,
    /// CO2 and CH4 respired from soil
    /// unit: PgC / yr
    pub rh_soil: BiomeMap<FloatValue>,
}

impl CarbonSnapshot {
    /// Total land carbon across biomes
    pub fn land_c(&self) -> FloatValue {
        self.veg_c.sum() + self.detritus_c.sum() + self.soil_c.sum() + self.permafrost_c.sum()
    }
}

impl SimpleNbox {
    /// The state recorded at `date`
    pub fn snapshot(&self, date: Time) -> NboxResult<CarbonSnapshot> {
        Ok(CarbonSnapshot {
            date,
            atmos_c: self.atmos_c_ts.get(date)?,
            ca: self.ca_ts.get(date)?,
            earth_c: self.earth_c_ts.get(date)?,
            residual: self.residual_ts.get(date)?,
            veg_c: self.veg_c_tv.get(date)?,
            detritus_c: self.detritus_c_tv.get(date)?,
            soil_c: self.soil_c_tv.get(date)?,
            permafrost_c: self.permafrost_c_tv.get(date)?,
            npp: self.npp_tv.get(date)?,
            rh_detritus: self.rh_det_tv.get(date)?,
            rh_soil: self.rh_soil_tv.get(date)?,
        })
    }

    /// Every recorded state in date order
    pub fn snapshots(&self) -> impl Iterator<Item = NboxResult<CarbonSnapshot>> + '_ {
        self.atmos_c_ts.dates().map(|date| self.snapshot(date))
    }
}
