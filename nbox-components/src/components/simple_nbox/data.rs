//! Reading and writing named variables

use super::SimpleNbox;
use nbox_core::biome::{split_biome_name, BiomeMap, DEFAULT_BIOME};
use nbox_core::errors::{NboxError, NboxResult};
use nbox_core::message::MessageData;
use nbox_core::standard_variables::*;
use nbox_core::timeseries::{FloatValue, Time, TimeSeries};
use nbox_core::units::{Unit, UnitVal, PPMV_PER_PGC};

fn require_global(variable: &str, biome: &str) -> NboxResult<()> {
    if biome != DEFAULT_BIOME {
        return Err(NboxError::BiomeConflict(format!(
            "{} must be global, got biome '{}'",
            variable, biome
        )));
    }
    Ok(())
}

/// Current value, summed over biomes for the default biome
fn pool_value(map: &BiomeMap<FloatValue>, biome: &str) -> NboxResult<FloatValue> {
    if biome == DEFAULT_BIOME {
        Ok(map.sum())
    } else {
        map.get(biome).copied()
    }
}

/// Current or recorded value of a per-biome quantity
fn biome_value(
    current: &BiomeMap<FloatValue>,
    history: &TimeSeries<BiomeMap<FloatValue>>,
    biome: &str,
    date: Option<Time>,
) -> NboxResult<FloatValue> {
    match date {
        None => pool_value(current, biome),
        Some(d) => pool_value(&history.get(d)?, biome),
    }
}

fn global_value(
    current: FloatValue,
    history: &TimeSeries<FloatValue>,
    date: Option<Time>,
) -> NboxResult<FloatValue> {
    match date {
        None => Ok(current),
        Some(d) => history.get(d),
    }
}

fn forbid_date(variable: &str, date: Option<Time>) -> NboxResult<()> {
    match date {
        Some(_) => Err(NboxError::DateRequirementViolation {
            variable: variable.to_string(),
            requirement: "not allowed",
        }),
        None => Ok(()),
    }
}

fn require_date(variable: &str, date: Option<Time>) -> NboxResult<Time> {
    date.ok_or_else(|| NboxError::DateRequirementViolation {
        variable: variable.to_string(),
        requirement: "required",
    })
}

impl SimpleNbox {
    /// Make `biome` known before storing data for it
    ///
    /// The first biome-specific value replaces the default biome.
    fn claim_biome(&mut self, biome: &str) -> NboxResult<()> {
        if biome == DEFAULT_BIOME {
            return Ok(());
        }
        if self.has_biome(DEFAULT_BIOME) {
            log::debug!(
                "Removing biome '{}' because it cannot coexist with biome data",
                DEFAULT_BIOME
            );
            self.biome_list.retain(|b| b != DEFAULT_BIOME);
            for map in self.biome_maps_mut() {
                map.remove(DEFAULT_BIOME);
            }
            for tv in self.histories_mut() {
                tv.remove_biome(DEFAULT_BIOME)?;
            }
        }
        if !self.has_biome(biome) {
            self.create_biome(biome)?;
        }
        Ok(())
    }

    fn check_biome(&self, variable: &str, biome: &str) -> NboxResult<()> {
        if !self.has_biome(biome) {
            return Err(NboxError::BiomeConflict(format!(
                "Biome '{}' missing from biome list while accessing '{}'",
                biome, variable
            )));
        }
        Ok(())
    }

    pub(super) fn set_variable(&mut self, variable: &str, data: &MessageData) -> NboxResult<()> {
        let (qualifier, name) = split_biome_name(variable)?;
        let biome = match qualifier {
            Some(b) => {
                self.claim_biome(b)?;
                b
            }
            None => DEFAULT_BIOME,
        };
        log::debug!("Setting {}.{} = {}", biome, name, data);

        match name {
            D_ATMOSPHERIC_C => {
                data.forbid_date(name)?;
                require_global(name, biome)?;
                self.set_c0(data.get_unitval(Unit::PgC)?.value() * PPMV_PER_PGC);
            }
            D_PREINDUSTRIAL_CO2 => {
                data.forbid_date(name)?;
                require_global(name, biome)?;
                self.set_c0(data.get_unitval(Unit::PpmvCO2)?.value());
            }
            D_VEGC | D_DETRITUSC | D_SOILC => {
                self.check_biome(name, biome)?;
                let value = data.get_unitval(Unit::PgC)?.value();
                let (current, history) = match name {
                    D_VEGC => (&mut self.veg_c, &mut self.veg_c_tv),
                    D_DETRITUSC => (&mut self.detritus_c, &mut self.detritus_c_tv),
                    _ => (&mut self.soil_c, &mut self.soil_c_tv),
                };
                current.insert(biome, value);
                // Undated values only set the current pool; a reset restores from history
                if let Some(date) = data.date {
                    history.set(date, current.clone());
                }
            }
            D_PERMAFROSTC => {
                self.check_biome(name, biome)?;
                let value = data.get_unitval(Unit::PgC)?.value();
                self.permafrost_c.insert(biome, value);
                if let Some(date) = data.date {
                    // Keep total mass unchanged by moving the difference to the earth pool
                    let delta = *self.permafrost_c_tv.get(date)?.get(biome)? - value;
                    self.earth_c = self.earth_c_ts.get(date)? + delta;
                    self.permafrost_c_tv.set(date, self.permafrost_c.clone());
                    self.earth_c_ts.set(date, self.earth_c);
                }
            }
            D_RF_T_ALBEDO => {
                let date = data.require_date(name)?;
                require_global(name, biome)?;
                self.ftalbedo
                    .set(date, data.get_unitval(Unit::WattsPerM2)?.value());
            }
            D_FFI_EMISSIONS | D_LUC_EMISSIONS => {
                let date = data.require_date(name)?;
                require_global(name, biome)?;
                let value = data.get_unitval(Unit::PgCPerYear)?.value();
                if name == D_FFI_EMISSIONS {
                    self.ffi_emissions.set(date, value);
                } else {
                    self.luc_emissions.set(date, value);
                }
            }
            D_CA_CONSTRAIN => {
                let date = data.require_date(name)?;
                require_global(name, biome)?;
                self.ca_constrain
                    .set(date, data.get_unitval(Unit::PpmvCO2)?.value());
            }
            D_NPP_FLUX0 => {
                data.forbid_date(name)?;
                self.check_biome(name, biome)?;
                self.npp_flux0
                    .insert(biome, data.get_unitval(Unit::PgCPerYear)?.value());
            }
            D_BETA | D_Q10_RH | D_WARMINGFACTOR | D_F_NPPV | D_F_NPPD | D_F_LITTERD
            | D_RH_CH4_FRAC => {
                data.forbid_date(name)?;
                self.check_biome(name, biome)?;
                let value = data.get_unitval(Unit::Unitless)?.value();
                let map = match name {
                    D_BETA => &mut self.beta,
                    D_Q10_RH => &mut self.q10_rh,
                    D_WARMINGFACTOR => &mut self.warmingfactor,
                    D_F_NPPV => &mut self.f_nppv,
                    D_F_NPPD => &mut self.f_nppd,
                    D_F_LITTERD => &mut self.f_litterd,
                    _ => &mut self.rh_ch4_frac,
                };
                map.insert(biome, value);
            }
            D_F_LUCV | D_F_LUCD | D_Q10_TEMPLAG | D_Q10_TEMPN => {
                data.forbid_date(name)?;
                require_global(name, biome)?;
                let value = data.get_unitval(Unit::Unitless)?.value();
                match name {
                    D_F_LUCV => self.f_lucv = value,
                    D_F_LUCD => self.f_lucd = value,
                    D_Q10_TEMPLAG => self.q10_templag = value,
                    _ => self.q10_tempn = value,
                }
            }
            _ => {
                return Err(NboxError::UnknownVariable {
                    component: "simpleNbox".to_string(),
                    variable: variable.to_string(),
                })
            }
        }
        Ok(())
    }

    fn parameter(
        &self,
        map: &BiomeMap<FloatValue>,
        name: &str,
        biome: &str,
        date: Option<Time>,
    ) -> NboxResult<UnitVal> {
        forbid_date(name, date)?;
        self.check_biome(name, biome)?;
        Ok(UnitVal::new(*map.get(biome)?, Unit::Unitless))
    }

    pub(super) fn get_variable(&self, variable: &str, date: Option<Time>) -> NboxResult<UnitVal> {
        let (qualifier, name) = split_biome_name(variable)?;
        let biome = qualifier.unwrap_or(DEFAULT_BIOME);
        if biome != DEFAULT_BIOME {
            self.check_biome(name, biome)?;
        }

        let pgc = |v: FloatValue| UnitVal::new(v, Unit::PgC);
        let flux = |v: FloatValue| UnitVal::new(v, Unit::PgCPerYear);

        let value = match name {
            D_ATMOSPHERIC_C => pgc(global_value(self.atmos_c, &self.atmos_c_ts, date)?),
            D_ATMOSPHERIC_CO2 => UnitVal::new(
                global_value(self.ca, &self.ca_ts, date)?,
                Unit::PpmvCO2,
            ),
            D_ATMOSPHERIC_C_RESIDUAL => {
                pgc(global_value(self.residual, &self.residual_ts, date)?)
            }
            D_PREINDUSTRIAL_CO2 => {
                forbid_date(name, date)?;
                UnitVal::new(self.c0, Unit::PpmvCO2)
            }
            D_EARTHC => pgc(global_value(self.earth_c, &self.earth_c_ts, date)?),
            D_VEGC => pgc(biome_value(&self.veg_c, &self.veg_c_tv, biome, date)?),
            D_DETRITUSC => pgc(biome_value(
                &self.detritus_c,
                &self.detritus_c_tv,
                biome,
                date,
            )?),
            D_SOILC => pgc(biome_value(&self.soil_c, &self.soil_c_tv, biome, date)?),
            D_PERMAFROSTC => pgc(biome_value(
                &self.permafrost_c,
                &self.permafrost_c_tv,
                biome,
                date,
            )?),
            D_F_FROZEN => UnitVal::new(
                biome_value(&self.f_frozen, &self.f_frozen_tv, biome, date)?,
                Unit::Unitless,
            ),
            D_NPP => flux(biome_value(&self.npp_veg, &self.npp_tv, biome, date)?),
            D_RH_DETRITUS => flux(biome_value(&self.rh_det, &self.rh_det_tv, biome, date)?),
            D_RH_SOIL => flux(biome_value(&self.rh_soil, &self.rh_soil_tv, biome, date)?),
            D_RH => flux(
                biome_value(&self.rh_det, &self.rh_det_tv, biome, date)?
                    + biome_value(&self.rh_soil, &self.rh_soil_tv, biome, date)?,
            ),
            D_RH_CH4 => {
                forbid_date(name, date)?;
                let value = if biome == DEFAULT_BIOME {
                    self.sum_over_biomes(|b| self.rh_ch4(b))?
                } else {
                    self.rh_ch4(biome)?
                };
                flux(value)
            }
            D_LAND_CFLUX => {
                forbid_date(name, date)?;
                flux(
                    self.sum_over_biomes(|b| self.npp(b))?
                        - self.sum_over_biomes(|b| self.rh(b))?
                        - self.sum_over_biomes(|b| self.rh_ch4(b))?
                        - self.emissions(&self.luc_emissions, self.ode_start_date)?,
                )
            }
            D_NPP_FLUX0 => {
                forbid_date(name, date)?;
                self.check_biome(name, biome)?;
                flux(*self.npp_flux0.get(biome)?)
            }
            D_RF_T_ALBEDO => UnitVal::new(
                self.ftalbedo.get(require_date(name, date)?)?,
                Unit::WattsPerM2,
            ),
            D_FFI_EMISSIONS => flux(self.ffi_emissions.get(require_date(name, date)?)?),
            D_LUC_EMISSIONS => flux(self.luc_emissions.get(require_date(name, date)?)?),
            D_BETA => self.parameter(&self.beta, name, biome, date)?,
            D_Q10_RH => self.parameter(&self.q10_rh, name, biome, date)?,
            D_WARMINGFACTOR => self.parameter(&self.warmingfactor, name, biome, date)?,
            D_F_NPPV => self.parameter(&self.f_nppv, name, biome, date)?,
            D_F_NPPD => self.parameter(&self.f_nppd, name, biome, date)?,
            D_F_LITTERD => self.parameter(&self.f_litterd, name, biome, date)?,
            D_RH_CH4_FRAC => self.parameter(&self.rh_ch4_frac, name, biome, date)?,
            D_CO2FERT => self.parameter(&self.co2fert, name, biome, date)?,
            D_TEMPFERTD => self.parameter(&self.tempfertd, name, biome, date)?,
            D_TEMPFERTS => self.parameter(&self.tempferts, name, biome, date)?,
            D_F_LUCV => {
                forbid_date(name, date)?;
                UnitVal::new(self.f_lucv, Unit::Unitless)
            }
            D_F_LUCD => {
                forbid_date(name, date)?;
                UnitVal::new(self.f_lucd, Unit::Unitless)
            }
            _ => {
                return Err(NboxError::UnknownVariable {
                    component: "simpleNbox".to_string(),
                    variable: variable.to_string(),
                })
            }
        };
        Ok(value)
    }
}
