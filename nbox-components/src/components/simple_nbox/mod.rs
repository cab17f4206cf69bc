//! Biome-partitioned terrestrial carbon cycle
//!
//! `SimpleNbox` tracks the atmospheric, fossil (earth) and land carbon pools. Land carbon is
//! split into vegetation, detritus, soil and permafrost pools for each biome. The integrator
//! only sees one aggregate slot per land pool; after every step the aggregate changes are
//! apportioned back onto the biomes (see [`SimpleNbox::stash_c_values`]).
//!
//! A single `"global"` biome is used until biome-qualified data (e.g. `forest.veg_c`) is
//! supplied or the biome list is edited with [`SimpleNbox::create_biome`],
//! [`SimpleNbox::delete_biome`] and [`SimpleNbox::rename_biome`].

mod biomes;
mod data;
mod fluxes;
mod snapshot;

pub use snapshot::CarbonSnapshot;

use nbox_core::biome::{BiomeMap, DEFAULT_BIOME};
use nbox_core::component::{CarbonCycleModel, Component};
use nbox_core::core::Core;
use nbox_core::errors::{NboxError, NboxResult};
use nbox_core::message::MessageData;
use nbox_core::registry::Registry;
use nbox_core::standard_variables::*;
use nbox_core::timeseries::{FloatValue, Time, TimeSeries};
use nbox_core::units::{UnitVal, PGC_PER_PPMV};
use serde::{Deserialize, Serialize};
use std::any::Any;

/// Largest tolerated drift in total carbon between two steps
/// unit: PgC
pub const MB_EPSILON: FloatValue = 1e-3;

/// Albedo forcing assumed when none is configured
/// unit: W / m^2
const DEFAULT_FTALBEDO: FloatValue = -0.2;

const CAPABILITIES: &[&str] = &[
    D_ATMOSPHERIC_CO2,
    D_PREINDUSTRIAL_CO2,
    D_ATMOSPHERIC_C,
    D_ATMOSPHERIC_C_RESIDUAL,
    D_LAND_CFLUX,
    D_EARTHC,
    D_VEGC,
    D_DETRITUSC,
    D_SOILC,
    D_PERMAFROSTC,
    D_NPP_FLUX0,
    D_NPP,
    D_RH,
    D_RH_DETRITUS,
    D_RH_SOIL,
    D_RH_CH4,
    D_F_FROZEN,
    D_RF_T_ALBEDO,
    D_BETA,
    D_Q10_RH,
    D_WARMINGFACTOR,
    D_F_NPPV,
    D_F_NPPD,
    D_F_LITTERD,
    D_F_LUCV,
    D_F_LUCD,
    D_RH_CH4_FRAC,
    D_FFI_EMISSIONS,
    D_LUC_EMISSIONS,
    D_CO2FERT,
    D_TEMPFERTD,
    D_TEMPFERTS,
];

const INPUTS: &[&str] = &[
    D_ATMOSPHERIC_C,
    D_PREINDUSTRIAL_CO2,
    D_VEGC,
    D_DETRITUSC,
    D_SOILC,
    D_PERMAFROSTC,
    D_NPP_FLUX0,
    D_BETA,
    D_Q10_RH,
    D_WARMINGFACTOR,
    D_F_NPPV,
    D_F_NPPD,
    D_F_LITTERD,
    D_F_LUCV,
    D_F_LUCD,
    D_RH_CH4_FRAC,
    D_FFI_EMISSIONS,
    D_LUC_EMISSIONS,
    D_CA_CONSTRAIN,
    D_RF_T_ALBEDO,
    D_Q10_TEMPLAG,
    D_Q10_TEMPN,
];

/// Terrestrial carbon cycle with any number of biomes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleNbox {
    /// Biomes in creation order
    biome_list: Vec<String>,

    /// Atmospheric carbon pool
    /// unit: PgC
    atmos_c: FloatValue,
    /// Fossil carbon reservoir, drawn down by fossil emissions
    /// unit: PgC
    earth_c: FloatValue,
    veg_c: BiomeMap<FloatValue>,
    detritus_c: BiomeMap<FloatValue>,
    soil_c: BiomeMap<FloatValue>,
    permafrost_c: BiomeMap<FloatValue>,

    /// Preindustrial atmospheric CO2 concentration
    /// unit: ppmv
    c0: FloatValue,
    /// Atmospheric CO2 concentration, always `atmos_c / PGC_PER_PPMV`
    /// unit: ppmv
    ca: FloatValue,
    /// Carbon removed from the atmosphere in the last step to meet a constraint
    /// unit: PgC
    residual: FloatValue,

    // Per-biome parameters
    /// Preindustrial net primary production
    /// unit: PgC / yr
    npp_flux0: BiomeMap<FloatValue>,
    /// CO2 fertilisation strength
    beta: BiomeMap<FloatValue>,
    /// Heterotrophic respiration change per 10 degC of warming
    q10_rh: BiomeMap<FloatValue>,
    /// Biome temperature relative to the global mean
    warmingfactor: BiomeMap<FloatValue>,
    /// Fraction of NPP going to vegetation
    f_nppv: BiomeMap<FloatValue>,
    /// Fraction of NPP going to detritus
    f_nppd: BiomeMap<FloatValue>,
    /// Fraction of litter going to detritus rather than soil
    f_litterd: BiomeMap<FloatValue>,
    /// Fraction of heterotrophic respiration released as CH4
    rh_ch4_frac: BiomeMap<FloatValue>,

    /// Fraction of land-use emissions taken from vegetation
    f_lucv: FloatValue,
    /// Fraction of land-use emissions taken from detritus
    f_lucd: FloatValue,

    /// Lag between air and soil temperature
    /// unit: yr
    q10_templag: FloatValue,
    /// Length of the window averaged for soil temperature
    /// unit: yr
    q10_tempn: FloatValue,

    // Feedback factors, refreshed once per step
    co2fert: BiomeMap<FloatValue>,
    tempfertd: BiomeMap<FloatValue>,
    tempferts: BiomeMap<FloatValue>,
    f_frozen: BiomeMap<FloatValue>,
    new_thaw: BiomeMap<FloatValue>,

    // Fluxes at the last recorded date
    npp_veg: BiomeMap<FloatValue>,
    rh_det: BiomeMap<FloatValue>,
    rh_soil: BiomeMap<FloatValue>,

    // Drivers
    ffi_emissions: TimeSeries<FloatValue>,
    luc_emissions: TimeSeries<FloatValue>,
    ftalbedo: TimeSeries<FloatValue>,
    ca_constrain: TimeSeries<FloatValue>,
    tgav_record: TimeSeries<FloatValue>,

    // History
    atmos_c_ts: TimeSeries<FloatValue>,
    ca_ts: TimeSeries<FloatValue>,
    earth_c_ts: TimeSeries<FloatValue>,
    residual_ts: TimeSeries<FloatValue>,
    veg_c_tv: TimeSeries<BiomeMap<FloatValue>>,
    detritus_c_tv: TimeSeries<BiomeMap<FloatValue>>,
    soil_c_tv: TimeSeries<BiomeMap<FloatValue>>,
    permafrost_c_tv: TimeSeries<BiomeMap<FloatValue>>,
    npp_tv: TimeSeries<BiomeMap<FloatValue>>,
    rh_det_tv: TimeSeries<BiomeMap<FloatValue>>,
    rh_soil_tv: TimeSeries<BiomeMap<FloatValue>>,
    tempfertd_tv: TimeSeries<BiomeMap<FloatValue>>,
    tempferts_tv: TimeSeries<BiomeMap<FloatValue>>,
    f_frozen_tv: TimeSeries<BiomeMap<FloatValue>>,

    /// Total carbon across every slot of the state vector, once initialised
    /// unit: PgC
    masstot: Option<FloatValue>,
    /// Start of the step currently being integrated
    ode_start_date: Time,
    start_date: Time,
    in_spinup: bool,
}

impl Default for SimpleNbox {
    fn default() -> Self {
        let mut tgav_record = TimeSeries::interpolated("Tgav_record");
        tgav_record.allow_partial_interp(true);

        Self {
            biome_list: vec![DEFAULT_BIOME.to_string()],
            atmos_c: 0.0,
            earth_c: 0.0,
            veg_c: BiomeMap::new(),
            detritus_c: BiomeMap::new(),
            soil_c: BiomeMap::new(),
            permafrost_c: BiomeMap::new(),
            c0: 0.0,
            ca: 0.0,
            residual: 0.0,
            npp_flux0: BiomeMap::new(),
            beta: BiomeMap::new(),
            q10_rh: BiomeMap::new(),
            warmingfactor: BiomeMap::new(),
            f_nppv: BiomeMap::new(),
            f_nppd: BiomeMap::new(),
            f_litterd: BiomeMap::new(),
            rh_ch4_frac: BiomeMap::new(),
            f_lucv: 0.1,
            f_lucd: 0.01,
            q10_templag: 0.0,
            q10_tempn: 200.0,
            co2fert: BiomeMap::new(),
            tempfertd: BiomeMap::new(),
            tempferts: BiomeMap::new(),
            f_frozen: BiomeMap::new(),
            new_thaw: BiomeMap::new(),
            npp_veg: BiomeMap::new(),
            rh_det: BiomeMap::new(),
            rh_soil: BiomeMap::new(),
            ffi_emissions: TimeSeries::interpolated("ffi_emissions"),
            luc_emissions: TimeSeries::interpolated("luc_emissions"),
            ftalbedo: TimeSeries::interpolated("Ftalbedo"),
            ca_constrain: TimeSeries::interpolated("Ca_constrain"),
            tgav_record,
            atmos_c_ts: TimeSeries::new("atmos_c"),
            ca_ts: TimeSeries::new("Ca"),
            earth_c_ts: TimeSeries::new("earth_c"),
            residual_ts: TimeSeries::new("atmos_c_residual"),
            veg_c_tv: TimeSeries::new("veg_c"),
            detritus_c_tv: TimeSeries::new("detritus_c"),
            soil_c_tv: TimeSeries::new("soil_c"),
            permafrost_c_tv: TimeSeries::new("permafrost_c"),
            npp_tv: TimeSeries::new("npp"),
            rh_det_tv: TimeSeries::new("rh_detritus"),
            rh_soil_tv: TimeSeries::new("rh_soil"),
            tempfertd_tv: TimeSeries::new("detritus_tempfert"),
            tempferts_tv: TimeSeries::new("soil_tempfert"),
            f_frozen_tv: TimeSeries::new("f_frozen"),
            masstot: None,
            ode_start_date: 0.0,
            start_date: 0.0,
            in_spinup: false,
        }
    }
}

fn ensure_positive(name: &str, value: FloatValue) -> NboxResult<()> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(NboxError::InvalidParameter {
            name: name.to_string(),
            reason: format!("must be positive, got {}", value),
        })
    }
}

fn ensure_non_negative(name: &str, value: FloatValue) -> NboxResult<()> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(NboxError::InvalidParameter {
            name: name.to_string(),
            reason: format!("must not be negative, got {}", value),
        })
    }
}

fn ensure_partition(names: &str, a: FloatValue, b: FloatValue) -> NboxResult<()> {
    if a + b > 1.0 {
        return Err(NboxError::PartitionSumExceedsOne {
            names: names.to_string(),
            sum: a + b,
        });
    }
    Ok(())
}

impl SimpleNbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Biome names in creation order
    pub fn biomes(&self) -> &[String] {
        &self.biome_list
    }

    pub fn has_biome(&self, biome: &str) -> bool {
        self.biome_list.iter().any(|b| b == biome)
    }

    /// Atmospheric CO2 concentration in ppmv
    pub fn ca(&self) -> FloatValue {
        self.ca
    }

    pub fn masstot(&self) -> Option<FloatValue> {
        self.masstot
    }

    /// Set the preindustrial CO2 concentration
    ///
    /// Once the mass total is initialised it is shifted by the carbon equivalent of the change,
    /// so the model has to be reset before it can be run on.
    pub fn set_c0(&mut self, c0: FloatValue) {
        if let Some(masstot) = self.masstot.as_mut() {
            let massdiff = (c0 - self.c0) * PGC_PER_PPMV;
            *masstot += massdiff;
            log::debug!("massdiff = {}, new masstot = {}", massdiff, masstot);
        }
        self.c0 = c0;
    }

    /// Checks that must hold at every step
    fn sanity_checks(&self) -> NboxResult<()> {
        ensure_positive(D_ATMOSPHERIC_C, self.atmos_c)?;
        for biome in &self.biome_list {
            ensure_non_negative(D_VEGC, *self.veg_c.get(biome)?)?;
            ensure_non_negative(D_DETRITUSC, *self.detritus_c.get(biome)?)?;
            ensure_non_negative(D_SOILC, *self.soil_c.get(biome)?)?;
            ensure_non_negative(D_PERMAFROSTC, *self.permafrost_c.get(biome)?)?;
            ensure_non_negative(D_NPP_FLUX0, *self.npp_flux0.get(biome)?)?;

            let f_nppv = *self.f_nppv.get(biome)?;
            let f_nppd = *self.f_nppd.get(biome)?;
            ensure_non_negative(D_F_NPPV, f_nppv)?;
            ensure_non_negative(D_F_NPPD, f_nppd)?;
            ensure_partition("f_nppv + f_nppd", f_nppv, f_nppd)?;

            let f_litterd = *self.f_litterd.get(biome)?;
            if !(0.0..=1.0).contains(&f_litterd) {
                return Err(NboxError::InvalidParameter {
                    name: D_F_LITTERD.to_string(),
                    reason: format!("must be in [0, 1], got {}", f_litterd),
                });
            }
        }
        ensure_non_negative(D_F_LUCV, self.f_lucv)?;
        ensure_non_negative(D_F_LUCD, self.f_lucd)?;
        ensure_partition("f_lucv + f_lucd", self.f_lucv, self.f_lucd)?;
        ensure_positive(D_PREINDUSTRIAL_CO2, self.c0)?;
        ensure_positive(D_ATMOSPHERIC_CO2, self.ca)?;
        Ok(())
    }

    /// Check that the biome list and every per-biome map agree
    fn check_biome_consistency(&self) -> NboxResult<()> {
        if self.biome_list.is_empty() {
            return Err(NboxError::BiomeConflict("No biomes defined".to_string()));
        }
        if self.has_biome(DEFAULT_BIOME) && self.biome_list.len() > 1 {
            return Err(NboxError::BiomeConflict(format!(
                "Cannot have both '{}' and biome-specific data. \
                 Did you forget to rename the default biome?",
                DEFAULT_BIOME
            )));
        }
        let required = [
            (D_VEGC, &self.veg_c),
            (D_DETRITUSC, &self.detritus_c),
            (D_SOILC, &self.soil_c),
            (D_PERMAFROSTC, &self.permafrost_c),
            (D_NPP_FLUX0, &self.npp_flux0),
            (D_BETA, &self.beta),
            (D_Q10_RH, &self.q10_rh),
            (D_F_NPPV, &self.f_nppv),
            (D_F_NPPD, &self.f_nppd),
            (D_F_LITTERD, &self.f_litterd),
        ];
        for (name, map) in required {
            if !map.matches_biomes(&self.biome_list) {
                return Err(NboxError::BiomeConflict(format!(
                    "{} is defined for biomes [{}] but the biome list is [{}]",
                    name,
                    map.keys().cloned().collect::<Vec<_>>().join(", "),
                    self.biome_list.join(", ")
                )));
            }
        }
        Ok(())
    }

    /// Fill in defaults for optional per-biome values
    fn apply_biome_defaults(&mut self) {
        for biome in &self.biome_list {
            if !self.warmingfactor.contains(biome) {
                log::info!(
                    "No warmingfactor set for biome '{}', using default 1",
                    biome
                );
                self.warmingfactor.insert(biome, 1.0);
            }
            if !self.rh_ch4_frac.contains(biome) {
                log::info!("No rh_ch4_frac set for biome '{}', using default 0", biome);
                self.rh_ch4_frac.insert(biome, 0.0);
            }
            for map in [
                &mut self.co2fert,
                &mut self.tempfertd,
                &mut self.tempferts,
                &mut self.f_frozen,
            ] {
                if !map.contains(biome) {
                    map.insert(biome, 1.0);
                }
            }
            for map in [
                &mut self.new_thaw,
                &mut self.npp_veg,
                &mut self.rh_det,
                &mut self.rh_soil,
            ] {
                if !map.contains(biome) {
                    map.insert(biome, 0.0);
                }
            }
        }
    }
}

#[typetag::serde]
impl Component for SimpleNbox {
    fn name(&self) -> &str {
        "simpleNbox"
    }

    fn init(&mut self, registry: &mut Registry) -> NboxResult<()> {
        for capability in CAPABILITIES {
            registry.register_capability(capability, self.name())?;
        }
        for input in INPUTS {
            registry.register_input(input, self.name())?;
        }
        registry.register_dependency(D_OCEAN_CFLUX, self.name());
        registry.register_dependency(D_GLOBAL_TEMP, self.name());
        Ok(())
    }

    fn set_data(&mut self, variable: &str, data: &MessageData) -> NboxResult<()> {
        self.set_variable(variable, data)
            .map_err(|e| NboxError::for_variable(variable, e))
    }

    fn get_data(&self, variable: &str, date: Option<Time>) -> NboxResult<UnitVal> {
        self.get_variable(variable, date)
    }

    fn prepare_to_run(&mut self, core: &Core) -> NboxResult<()> {
        log::debug!("Preparing {} with biomes [{}]", self.name(), self.biome_list.join(", "));
        self.check_biome_consistency()?;
        self.apply_biome_defaults();

        for biome in &self.biome_list {
            ensure_non_negative(D_BETA, *self.beta.get(biome)?)?;
            ensure_positive(D_Q10_RH, *self.q10_rh.get(biome)?)?;
        }
        if self.q10_tempn < 1.0 || self.q10_templag < 0.0 {
            return Err(NboxError::InvalidParameter {
                name: D_Q10_TEMPN.to_string(),
                reason: format!(
                    "soil temperature window of {} years lagged by {} years",
                    self.q10_tempn, self.q10_templag
                ),
            });
        }

        if self.ftalbedo.is_empty() {
            log::info!(
                "No {} data, assuming a constant {} W/m2",
                D_RF_T_ALBEDO,
                DEFAULT_FTALBEDO
            );
            self.ftalbedo.set(core.start_date(), DEFAULT_FTALBEDO);
            self.ftalbedo.set(core.end_date(), DEFAULT_FTALBEDO);
        }

        self.ca = self.c0;
        self.atmos_c = self.c0 * PGC_PER_PPMV;

        if !self.ca_constrain.is_empty() {
            self.ca_constrain.allow_partial_interp(true);
            log::warn!("Atmospheric CO2 will be constrained to user-supplied values");
        }

        self.start_date = core.start_date();
        self.ode_start_date = core.start_date();
        self.in_spinup = core.in_spinup();
        self.sanity_checks()
    }

    fn run(&mut self, _t: Time, core: &Core) -> NboxResult<()> {
        self.in_spinup = core.in_spinup();
        self.sanity_checks()
    }

    fn reset(&mut self, t: Time) -> NboxResult<()> {
        let mut restored = self.clone();
        restored.earth_c = self.earth_c_ts.get(t)?;
        restored.atmos_c = self.atmos_c_ts.get(t)?;
        restored.ca = self.ca_ts.get(t)?;
        restored.residual = self.residual_ts.get(t)?;

        restored.veg_c = self.veg_c_tv.get(t)?;
        restored.detritus_c = self.detritus_c_tv.get(t)?;
        restored.soil_c = self.soil_c_tv.get(t)?;
        restored.permafrost_c = self.permafrost_c_tv.get(t)?;

        restored.npp_veg = self.npp_tv.get(t)?;
        restored.rh_det = self.rh_det_tv.get(t)?;
        restored.rh_soil = self.rh_soil_tv.get(t)?;
        restored.tempfertd = self.tempfertd_tv.get(t)?;
        restored.tempferts = self.tempferts_tv.get(t)?;
        restored.f_frozen = self.f_frozen_tv.get(t)?;

        for biome in &self.biome_list {
            let fert = if self.in_spinup {
                1.0
            } else {
                restored.calc_co2fert(biome, restored.ca)?
            };
            restored.co2fert.insert(biome, fert);
        }

        restored.tgav_record.truncate(t);
        for ts in [
            &mut restored.earth_c_ts,
            &mut restored.atmos_c_ts,
            &mut restored.ca_ts,
            &mut restored.residual_ts,
        ] {
            ts.truncate(t);
        }
        for tv in restored.histories_mut() {
            tv.truncate(t);
        }
        restored.ode_start_date = t;

        *self = restored;
        log::info!("{} reset to {}", self.name(), t);
        Ok(())
    }

    fn as_carbon_model(&self) -> Option<&dyn CarbonCycleModel> {
        Some(self)
    }

    fn as_carbon_model_mut(&mut self) -> Option<&mut dyn CarbonCycleModel> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
