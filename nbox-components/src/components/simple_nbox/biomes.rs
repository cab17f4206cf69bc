//! Creating, deleting and renaming biomes

use super::SimpleNbox;
use nbox_core::biome::{BiomeMap, DEFAULT_BIOME};
use nbox_core::errors::{NboxError, NboxResult};
use nbox_core::timeseries::{FloatValue, TimeSeries};

impl SimpleNbox {
    /// Every per-biome map, pools and parameters alike
    pub(super) fn biome_maps_mut(&mut self) -> [&mut BiomeMap<FloatValue>; 20] {
        [
            &mut self.veg_c,
            &mut self.detritus_c,
            &mut self.soil_c,
            &mut self.permafrost_c,
            &mut self.npp_flux0,
            &mut self.beta,
            &mut self.q10_rh,
            &mut self.warmingfactor,
            &mut self.f_nppv,
            &mut self.f_nppd,
            &mut self.f_litterd,
            &mut self.rh_ch4_frac,
            &mut self.co2fert,
            &mut self.tempfertd,
            &mut self.tempferts,
            &mut self.f_frozen,
            &mut self.new_thaw,
            &mut self.npp_veg,
            &mut self.rh_det,
            &mut self.rh_soil,
        ]
    }

    /// Every per-biome history
    pub(super) fn histories_mut(&mut self) -> [&mut TimeSeries<BiomeMap<FloatValue>>; 10] {
        [
            &mut self.veg_c_tv,
            &mut self.detritus_c_tv,
            &mut self.soil_c_tv,
            &mut self.permafrost_c_tv,
            &mut self.npp_tv,
            &mut self.rh_det_tv,
            &mut self.rh_soil_tv,
            &mut self.tempfertd_tv,
            &mut self.tempferts_tv,
            &mut self.f_frozen_tv,
        ]
    }

    fn require_biome(&self, biome: &str) -> NboxResult<()> {
        if !self.has_biome(biome) {
            return Err(NboxError::BiomeConflict(format!(
                "Biome '{}' not found in the biome list",
                biome
            )));
        }
        Ok(())
    }

    fn require_new_biome(&self, biome: &str) -> NboxResult<()> {
        if self.has_biome(biome) {
            return Err(NboxError::BiomeConflict(format!(
                "Biome '{}' is already in the biome list",
                biome
            )));
        }
        Ok(())
    }

    /// Add an empty biome
    ///
    /// Pools, fluxes and `npp_flux0` start at zero and every recorded sample gains a zero entry
    /// for the new biome. Parameters are copied from the most recently added biome.
    pub fn create_biome(&mut self, biome: &str) -> NboxResult<()> {
        log::debug!("Creating biome '{}'", biome);
        self.require_new_biome(biome)?;
        if biome != DEFAULT_BIOME && self.has_biome(DEFAULT_BIOME) {
            return Err(NboxError::BiomeConflict(format!(
                "Cannot add biome '{}' alongside '{}'; rename '{}' first",
                biome, DEFAULT_BIOME, DEFAULT_BIOME
            )));
        }

        let mut updated = self.clone();
        for map in [
            &mut updated.veg_c,
            &mut updated.detritus_c,
            &mut updated.soil_c,
            &mut updated.permafrost_c,
            &mut updated.npp_flux0,
            &mut updated.npp_veg,
            &mut updated.rh_det,
            &mut updated.rh_soil,
            &mut updated.new_thaw,
        ] {
            map.insert(biome, 0.0);
        }
        for map in [
            &mut updated.co2fert,
            &mut updated.tempfertd,
            &mut updated.tempferts,
            &mut updated.f_frozen,
        ] {
            map.insert(biome, 1.0);
        }

        for tv in [
            &mut updated.veg_c_tv,
            &mut updated.detritus_c_tv,
            &mut updated.soil_c_tv,
            &mut updated.permafrost_c_tv,
            &mut updated.npp_tv,
            &mut updated.rh_det_tv,
            &mut updated.rh_soil_tv,
        ] {
            tv.add_biome(biome, 0.0)?;
        }
        for tv in [
            &mut updated.tempfertd_tv,
            &mut updated.tempferts_tv,
            &mut updated.f_frozen_tv,
        ] {
            tv.add_biome(biome, 1.0)?;
        }

        if let Some(last) = self.biome_list.last() {
            for map in [
                &mut updated.beta,
                &mut updated.q10_rh,
                &mut updated.warmingfactor,
                &mut updated.f_nppv,
                &mut updated.f_nppd,
                &mut updated.f_litterd,
                &mut updated.rh_ch4_frac,
            ] {
                let inherited = map.get(last).ok().copied();
                if let Some(value) = inherited {
                    map.insert(biome, value);
                }
            }
        }

        updated.biome_list.push(biome.to_string());
        *self = updated;
        Ok(())
    }

    /// Remove a biome along with its parameters and history
    pub fn delete_biome(&mut self, biome: &str) -> NboxResult<()> {
        log::debug!("Deleting biome '{}'", biome);
        self.require_biome(biome)?;

        let mut updated = self.clone();
        for map in updated.biome_maps_mut() {
            map.remove(biome);
        }
        for tv in updated.histories_mut() {
            tv.remove_biome(biome)?;
        }
        updated.biome_list.retain(|b| b != biome);
        *self = updated;
        Ok(())
    }

    /// Move everything stored under `old` to `new`
    ///
    /// The renamed biome moves to the end of the biome list.
    pub fn rename_biome(&mut self, old: &str, new: &str) -> NboxResult<()> {
        log::debug!("Renaming biome '{}' to '{}'", old, new);
        self.require_biome(old)?;
        self.require_new_biome(new)?;

        let mut updated = self.clone();
        for map in updated.biome_maps_mut() {
            if map.contains(old) {
                map.rename(old, new)?;
            }
        }
        for tv in updated.histories_mut() {
            tv.rename_biome(old, new)?;
        }
        updated.biome_list.retain(|b| b != old);
        updated.biome_list.push(new.to_string());
        *self = updated;
        Ok(())
    }
}
