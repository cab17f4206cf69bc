//! Land fluxes and the carbon-cycle step

use super::{SimpleNbox, MB_EPSILON};
use nbox_core::component::{pool, CarbonCycleModel, CarbonState, Component};
use nbox_core::core::Core;
use nbox_core::errors::{NboxError, NboxResult};
use nbox_core::message::{MessageData, MessageKind};
use nbox_core::standard_variables::{D_GLOBAL_TEMP, D_OCEAN_C};
use nbox_core::timeseries::{FloatValue, Time, TimeSeries};
use nbox_core::units::{Unit, UnitVal, PGC_PER_PPMV, PPMV_PER_PGC};
use nbox_core::utils::lognormal;

/// Fraction of vegetation carbon shed as litter each year
const LITTER_RATE: FloatValue = 0.035;
/// Fraction of detritus carbon moving into the soil each year
const DETSOIL_RATE: FloatValue = 0.6;
/// Fraction of detritus carbon respired each year at the reference temperature
const DETRITUS_RH_RATE: FloatValue = 0.25;
/// Fraction of soil carbon respired each year at the reference temperature
const SOIL_RH_RATE: FloatValue = 0.02;
/// Fraction of thawed permafrost that stays inert
const PF_STATIC_FRACTION: FloatValue = 0.4;
// Log-normal parameters of the frozen fraction against biome warming
const PF_MU: FloatValue = 1.258;
const PF_SIGMA: FloatValue = 0.618;

/// Apportionment weights for one biome
#[derive(Debug, Clone, PartialEq)]
struct Weights {
    biome: String,
    /// Share of the veg, detritus and soil changes
    pools: FloatValue,
    /// Share of the permafrost change
    permafrost: FloatValue,
}

impl SimpleNbox {
    pub(super) fn sum_over_biomes<F>(&self, f: F) -> NboxResult<FloatValue>
    where
        F: Fn(&str) -> NboxResult<FloatValue>,
    {
        self.biome_list.iter().map(|b| f(b)).sum()
    }

    /// Emissions at `t`; an empty series means no emissions
    pub(super) fn emissions(&self, series: &TimeSeries<FloatValue>, t: Time) -> NboxResult<FloatValue> {
        if series.is_empty() {
            Ok(0.0)
        } else {
            series.get(t)
        }
    }

    pub(super) fn calc_co2fert(&self, biome: &str, ca: FloatValue) -> NboxResult<FloatValue> {
        Ok(1.0 + self.beta.get(biome)? * (ca / self.c0).ln())
    }

    /// Net primary production
    /// unit: PgC / yr
    pub(super) fn npp(&self, biome: &str) -> NboxResult<FloatValue> {
        Ok(self.npp_flux0.get(biome)? * self.co2fert.get(biome)?)
    }

    fn detritus_respiration(&self, biome: &str) -> NboxResult<FloatValue> {
        Ok(self.detritus_c.get(biome)? * DETRITUS_RH_RATE * self.tempfertd.get(biome)?)
    }

    fn soil_respiration(&self, biome: &str) -> NboxResult<FloatValue> {
        Ok(self.soil_c.get(biome)? * SOIL_RH_RATE * self.tempferts.get(biome)?)
    }

    /// CO2 respired from detritus
    fn rh_fda(&self, biome: &str) -> NboxResult<FloatValue> {
        Ok(self.detritus_respiration(biome)? * (1.0 - self.rh_ch4_frac.get(biome)?))
    }

    /// CO2 respired from soil
    fn rh_fsa(&self, biome: &str) -> NboxResult<FloatValue> {
        Ok(self.soil_respiration(biome)? * (1.0 - self.rh_ch4_frac.get(biome)?))
    }

    fn rh_fda_ch4(&self, biome: &str) -> NboxResult<FloatValue> {
        Ok(self.detritus_respiration(biome)? * self.rh_ch4_frac.get(biome)?)
    }

    fn rh_fsa_ch4(&self, biome: &str) -> NboxResult<FloatValue> {
        Ok(self.soil_respiration(biome)? * self.rh_ch4_frac.get(biome)?)
    }

    /// Heterotrophic respiration released as CO2
    pub(super) fn rh(&self, biome: &str) -> NboxResult<FloatValue> {
        Ok(self.rh_fda(biome)? + self.rh_fsa(biome)?)
    }

    /// Heterotrophic respiration released as CH4
    pub(super) fn rh_ch4(&self, biome: &str) -> NboxResult<FloatValue> {
        Ok(self.rh_fda_ch4(biome)? + self.rh_fsa_ch4(biome)?)
    }

    /// Write the land, atmosphere and earth derivatives
    ///
    /// Expects `dcdt[OCEAN]` to already hold the atmosphere to ocean flux.
    fn derivatives(&self, t: Time, dcdt: &mut CarbonState) -> NboxResult<()> {
        let atmosocean_flux = dcdt[pool::OCEAN];

        let mut npp_total = 0.0;
        let mut npp_fav = 0.0;
        let mut npp_fad = 0.0;
        let mut npp_fas = 0.0;
        let mut rh_fda = 0.0;
        let mut rh_fsa = 0.0;
        let mut rh_fda_ch4 = 0.0;
        let mut rh_fsa_ch4 = 0.0;
        let mut litter_fvd = 0.0;
        let mut litter_fvs = 0.0;
        let mut detsoil = 0.0;
        let mut thaw = 0.0;

        for biome in &self.biome_list {
            let npp = self.npp(biome)?;
            let f_nppv = self.f_nppv.get(biome)?;
            let f_nppd = self.f_nppd.get(biome)?;
            npp_total += npp;
            npp_fav += npp * f_nppv;
            npp_fad += npp * f_nppd;
            npp_fas += npp * (1.0 - f_nppv - f_nppd);

            rh_fda += self.rh_fda(biome)?;
            rh_fsa += self.rh_fsa(biome)?;
            rh_fda_ch4 += self.rh_fda_ch4(biome)?;
            rh_fsa_ch4 += self.rh_fsa_ch4(biome)?;

            let litter = self.veg_c.get(biome)? * LITTER_RATE;
            let f_litterd = self.f_litterd.get(biome)?;
            litter_fvd += litter * f_litterd;
            litter_fvs += litter * (1.0 - f_litterd);

            detsoil += self.detritus_c.get(biome)? * DETSOIL_RATE;

            if !self.in_spinup {
                thaw += self.permafrost_c.get(biome)?
                    * self.new_thaw.get(biome)?
                    * (1.0 - PF_STATIC_FRACTION);
            }
        }

        let (ffi, luc) = if self.in_spinup {
            (0.0, 0.0)
        } else {
            (
                self.emissions(&self.ffi_emissions, t)?,
                self.emissions(&self.luc_emissions, t)?,
            )
        };
        let luc_fva = luc * self.f_lucv;
        let luc_fda = luc * self.f_lucd;
        let luc_fsa = luc * (1.0 - self.f_lucv - self.f_lucd);
        // Oxidised fossil methane is not modelled
        let ch4ox = 0.0;

        dcdt[pool::ATMOS] = ffi + luc + ch4ox - atmosocean_flux - npp_total
            + rh_fda
            + rh_fsa
            + rh_fda_ch4
            + rh_fsa_ch4;
        dcdt[pool::VEG] = npp_fav - litter_fvd - litter_fvs - luc_fva;
        dcdt[pool::DET] = npp_fad + litter_fvd - detsoil - rh_fda - rh_fda_ch4 - luc_fda;
        dcdt[pool::SOIL] =
            npp_fas + litter_fvs + detsoil + thaw - rh_fsa - rh_fsa_ch4 - luc_fsa;
        dcdt[pool::EARTH] = -ffi;
        dcdt[pool::PERMAFROST] = -thaw;
        Ok(())
    }

    /// Mean biome temperature over the soil window ending `q10_templag` years before `t`
    fn lagged_temperature(&self, t: Time, warmingfactor: FloatValue) -> NboxResult<FloatValue> {
        if t <= self.start_date + self.q10_templag {
            return Ok(0.0);
        }
        let end = t - self.q10_templag;
        let mut date = end - self.q10_tempn;
        let mut total = 0.0;
        while date < end {
            total += self.tgav_record.get(date)? * warmingfactor;
            date += 1.0;
        }
        Ok(total / self.q10_tempn)
    }

    fn apportion_weights(&self) -> NboxResult<Vec<Weights>> {
        let npp_rh = self
            .biome_list
            .iter()
            .map(|b| Ok(self.npp(b)? + self.rh(b)?))
            .collect::<NboxResult<Vec<_>>>()?;
        let npp_rh_total: FloatValue = npp_rh.iter().sum();
        let permafrost_total = self.permafrost_c.sum();
        let n = self.biome_list.len() as FloatValue;

        self.biome_list
            .iter()
            .zip(npp_rh)
            .map(|(biome, value)| {
                let pools = if npp_rh_total > 0.0 {
                    value / npp_rh_total
                } else {
                    1.0 / n
                };
                let permafrost = if permafrost_total > 0.0 {
                    self.permafrost_c.get(biome)? / permafrost_total
                } else {
                    0.0
                };
                Ok(Weights {
                    biome: biome.clone(),
                    pools,
                    permafrost,
                })
            })
            .collect()
    }

    fn log_pools(&self, t: Time) {
        log::debug!("---- {} pools at t={} ----", self.name(), t);
        log::debug!("atmos = {}, earth = {}", self.atmos_c, self.earth_c);
        for biome in &self.biome_list {
            log::debug!(
                "{}: veg = {:?}, detritus = {:?}, soil = {:?}, permafrost = {:?}",
                biome,
                self.veg_c.get(biome).ok(),
                self.detritus_c.get(biome).ok(),
                self.soil_c.get(biome).ok(),
                self.permafrost_c.get(biome).ok()
            );
        }
    }
}

impl CarbonCycleModel for SimpleNbox {
    fn get_c_values(&mut self, t: Time, c: &mut CarbonState) -> NboxResult<()> {
        c[pool::ATMOS] = self.atmos_c;
        c[pool::VEG] = self.veg_c.sum();
        c[pool::DET] = self.detritus_c.sum();
        c[pool::SOIL] = self.soil_c.sum();
        c[pool::EARTH] = self.earth_c;
        c[pool::PERMAFROST] = self.permafrost_c.sum();
        self.ode_start_date = t;
        Ok(())
    }

    fn calc_derivs(&self, t: Time, _c: &CarbonState, dcdt: &mut CarbonState) -> i32 {
        match self.derivatives(t, dcdt) {
            Ok(()) => 0,
            Err(e) => {
                log::error!("{}: derivatives failed at {}: {}", self.name(), t, e);
                1
            }
        }
    }

    fn slow_param_eval(&mut self, t: Time, c: &CarbonState, core: &Core) -> NboxResult<()> {
        self.in_spinup = core.in_spinup();
        self.ca = c[pool::ATMOS] * PPMV_PER_PGC;

        let tgav = core
            .get_data(D_GLOBAL_TEMP, Some(t))?
            .value_in(Unit::DegC)?;
        self.tgav_record.set(t, tgav);

        // Soil respiration only ever speeds up, so start from last step's factors
        let tempferts_last = if t > self.start_date {
            self.tempferts_tv.get(t).ok()
        } else {
            None
        };

        for biome in self.biome_list.clone() {
            if self.in_spinup {
                self.co2fert.insert(&biome, 1.0);
                self.tempfertd.insert(&biome, 1.0);
                self.tempferts.insert(&biome, 1.0);
                self.f_frozen.insert(&biome, 1.0);
                self.new_thaw.insert(&biome, 0.0);
                continue;
            }

            let co2fert = self.calc_co2fert(&biome, self.ca)?;
            self.co2fert.insert(&biome, co2fert);

            let wf = *self.warmingfactor.get(&biome)?;
            let q10 = *self.q10_rh.get(&biome)?;
            let tgav_biome = tgav * wf;
            self.tempfertd.insert(&biome, q10.powf(tgav_biome / 10.0));

            let mut new_thaw = 0.0;
            if *self.permafrost_c.get(&biome)? > 0.0 {
                let f_frozen = lognormal::survival(tgav_biome, PF_MU, PF_SIGMA);
                new_thaw = self.f_frozen.get(&biome)? - f_frozen;
                self.f_frozen.insert(&biome, f_frozen);
            }
            self.new_thaw.insert(&biome, new_thaw);

            let mut tempferts = q10.powf(self.lagged_temperature(t, wf)? / 10.0);
            if let Some(last) = tempferts_last.as_ref().and_then(|m| m.get(&biome).ok()) {
                tempferts = tempferts.max(*last);
            }
            self.tempferts.insert(&biome, tempferts);

            log::debug!(
                "{} at {}: Tgav={}, co2fert={}, tempfertd={}, tempferts={}, new_thaw={}",
                biome,
                t,
                tgav_biome,
                co2fert,
                self.tempfertd.get(&biome)?,
                tempferts,
                new_thaw
            );
        }
        Ok(())
    }

    fn stash_c_values(&mut self, t: Time, c: &CarbonState, core: &Core) -> NboxResult<()> {
        let yf = t - self.ode_start_date;
        if yf < 0.0 {
            return Err(NboxError::Error(format!(
                "Cannot stash at {} before the step start {}",
                t, self.ode_start_date
            )));
        }
        self.atmos_c = c[pool::ATMOS];

        let veg_delta = c[pool::VEG] - self.veg_c.sum();
        let det_delta = c[pool::DET] - self.detritus_c.sum();
        let soil_delta = c[pool::SOIL] - self.soil_c.sum();
        let permafrost_delta = c[pool::PERMAFROST] - self.permafrost_c.sum();
        log::debug!(
            "deltas at {}: veg={}, detritus={}, soil={}, permafrost={}",
            t,
            veg_delta,
            det_delta,
            soil_delta,
            permafrost_delta
        );

        for w in self.apportion_weights()? {
            log::debug!(
                "biome '{}' weight = {}, permafrost weight = {}",
                w.biome,
                w.pools,
                w.permafrost
            );
            for (name, map, delta, weight) in [
                ("veg", &mut self.veg_c, veg_delta, w.pools),
                ("detritus", &mut self.detritus_c, det_delta, w.pools),
                ("soil", &mut self.soil_c, soil_delta, w.pools),
                ("permafrost", &mut self.permafrost_c, permafrost_delta, w.permafrost),
            ] {
                let value = map.get_mut(&w.biome)?;
                *value += delta * weight;
                if *value < 0.0 {
                    return Err(NboxError::NegativePool {
                        pool: name.to_string(),
                        biome: w.biome.clone(),
                        value: *value,
                    });
                }
            }
        }
        self.earth_c = c[pool::EARTH];
        self.log_pools(t);

        let sum: FloatValue = c.iter().sum();
        if let Some(masstot) = self.masstot {
            let diff = (sum - masstot).abs();
            log::debug!("masstot = {}, sum = {}, diff = {}", masstot, sum, diff);
            if diff > MB_EPSILON {
                log::error!(
                    "Mass not conserved in {}: masstot = {}, sum = {}, diff = {}",
                    self.name(),
                    masstot,
                    sum,
                    diff
                );
                return Err(NboxError::MassNotConserved {
                    expected: masstot,
                    actual: sum,
                    diff,
                });
            }
        }
        self.masstot = Some(sum);

        let target_ca = if self.in_spinup {
            Some(self.c0)
        } else if self
            .ca_constrain
            .last_date()
            .is_some_and(|last| t <= last)
        {
            log::warn!("Constraining atmospheric CO2 to user-supplied value at {}", t);
            Some(self.ca_constrain.get(t)?)
        } else {
            None
        };

        match target_ca {
            Some(target_ca) => {
                let target = target_ca * PGC_PER_PPMV;
                self.residual = self.atmos_c - target;
                log::debug!(
                    "{}: have {} PgC, want {} PgC; sending residual {} to the deep ocean",
                    t,
                    self.atmos_c,
                    target,
                    self.residual
                );
                core.send_message(
                    MessageKind::DumpToDeepOcean,
                    D_OCEAN_C,
                    &MessageData::from_unitval(UnitVal::new(self.residual, Unit::PgC)),
                )?;
                self.atmos_c = target;
                self.ca = target_ca;
            }
            None => {
                self.residual = 0.0;
                self.ca = self.atmos_c * PPMV_PER_PGC;
            }
        }

        self.ode_start_date = t;
        Ok(())
    }

    fn record_state(&mut self, t: Time) -> NboxResult<()> {
        self.earth_c_ts.set(t, self.earth_c);
        self.atmos_c_ts.set(t, self.atmos_c);
        self.ca_ts.set(t, self.ca);
        self.residual_ts.set(t, self.residual);

        self.veg_c_tv.set(t, self.veg_c.clone());
        self.detritus_c_tv.set(t, self.detritus_c.clone());
        self.soil_c_tv.set(t, self.soil_c.clone());
        self.permafrost_c_tv.set(t, self.permafrost_c.clone());

        for biome in self.biome_list.clone() {
            let (npp, rh_det, rh_soil) = if self.in_spinup {
                (0.0, 0.0, 0.0)
            } else {
                (
                    self.npp(&biome)?,
                    self.rh_fda(&biome)? + self.rh_fda_ch4(&biome)?,
                    self.rh_fsa(&biome)? + self.rh_fsa_ch4(&biome)?,
                )
            };
            self.npp_veg.insert(&biome, npp);
            self.rh_det.insert(&biome, rh_det);
            self.rh_soil.insert(&biome, rh_soil);
        }
        self.npp_tv.set(t, self.npp_veg.clone());
        self.rh_det_tv.set(t, self.rh_det.clone());
        self.rh_soil_tv.set(t, self.rh_soil.clone());

        self.tempfertd_tv.set(t, self.tempfertd.clone());
        self.tempferts_tv.set(t, self.tempferts.clone());
        self.f_frozen_tv.set(t, self.f_frozen.clone());
        Ok(())
    }
}
