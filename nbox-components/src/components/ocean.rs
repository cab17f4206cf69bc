//! Two-reservoir ocean carbon model
//!
//! The ocean holds a well-mixed surface layer exchanging CO2 with the atmosphere and a deep
//! reservoir fed by mixing from the surface. The integrator sees both reservoirs as the single
//! `OCEAN` slot of the carbon state.
//!
//! Surface pCO2 follows a Revelle-buffered linearisation around the preindustrial state:
//! $$ pCO_2 = C_0 \left(1 + R \frac{S - S_0}{S_0}\right) $$
//! and the air-sea flux is $k (C_a - pCO_2)$.

use nbox_core::component::{pool, CarbonCycleModel, CarbonState, Component};
use nbox_core::core::Core;
use nbox_core::errors::{NboxError, NboxResult};
use nbox_core::message::{MessageData, MessageKind};
use nbox_core::registry::Registry;
use nbox_core::standard_variables::{
    D_OCEAN_C, D_OCEAN_CFLUX, D_OCEAN_DEEP_C, D_OCEAN_SURFACE_C, D_PREINDUSTRIAL_CO2,
};
use nbox_core::timeseries::{FloatValue, Time, TimeSeries};
use nbox_core::units::{Unit, UnitVal, PPMV_PER_PGC};
use serde::{Deserialize, Serialize};
use std::any::Any;

const SURFACE_C: &str = "surface_c";
const DEEP_C: &str = "deep_c";
const EXCHANGE_RATE: &str = "exchange_rate";
const REVELLE_FACTOR: &str = "revelle_factor";
const MIXING_RATE: &str = "mixing_rate";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OceanCarbon {
    /// unit: PgC
    surface_c: FloatValue,
    /// unit: PgC
    deep_c: FloatValue,
    /// Air-sea gas exchange coefficient
    /// unit: PgC / yr / ppmv
    exchange_rate: FloatValue,
    /// Relative change in surface pCO2 per relative change in surface carbon
    revelle_factor: FloatValue,
    /// Fraction of the surface carbon anomaly mixed into the deep ocean each year
    /// unit: 1 / yr
    mixing_rate: FloatValue,

    /// Surface carbon at equilibrium with `c0`
    /// unit: PgC
    surface_c0: FloatValue,
    /// unit: ppmv
    c0: FloatValue,
    /// Mean atmosphere to ocean flux over the last step
    /// unit: PgC / yr
    atm_ocean_flux: FloatValue,
    ode_start_date: Time,

    surface_c_ts: TimeSeries<FloatValue>,
    deep_c_ts: TimeSeries<FloatValue>,
    atm_ocean_flux_ts: TimeSeries<FloatValue>,
}

impl Default for OceanCarbon {
    fn default() -> Self {
        Self {
            surface_c: 900.0,
            deep_c: 37100.0,
            exchange_rate: 0.05,
            revelle_factor: 10.0,
            mixing_rate: 0.05,
            surface_c0: 900.0,
            c0: 0.0,
            atm_ocean_flux: 0.0,
            ode_start_date: 0.0,
            surface_c_ts: TimeSeries::new("ocean_surface_c"),
            deep_c_ts: TimeSeries::new("ocean_deep_c"),
            atm_ocean_flux_ts: TimeSeries::new("atm_ocean_flux"),
        }
    }
}

impl OceanCarbon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total ocean carbon
    /// unit: PgC
    pub fn total_c(&self) -> FloatValue {
        self.surface_c + self.deep_c
    }

    pub fn surface_c(&self) -> FloatValue {
        self.surface_c
    }

    pub fn deep_c(&self) -> FloatValue {
        self.deep_c
    }

    /// Surface pCO2 for a given surface carbon content
    /// unit: ppmv
    fn surface_pco2(&self, surface_c: FloatValue) -> FloatValue {
        self.c0 * (1.0 + self.revelle_factor * (surface_c - self.surface_c0) / self.surface_c0)
    }

    fn validate(&self) -> NboxResult<()> {
        let invalid = |name: &str, reason: String| NboxError::InvalidParameter {
            name: name.to_string(),
            reason,
        };
        if self.surface_c <= 0.0 {
            return Err(invalid(SURFACE_C, format!("must be positive, got {}", self.surface_c)));
        }
        if self.deep_c < 0.0 {
            return Err(invalid(DEEP_C, format!("must not be negative, got {}", self.deep_c)));
        }
        if self.exchange_rate < 0.0 {
            return Err(invalid(
                EXCHANGE_RATE,
                format!("must not be negative, got {}", self.exchange_rate),
            ));
        }
        if self.revelle_factor <= 0.0 {
            return Err(invalid(
                REVELLE_FACTOR,
                format!("must be positive, got {}", self.revelle_factor),
            ));
        }
        if !(0.0..=1.0).contains(&self.mixing_rate) {
            return Err(invalid(
                MIXING_RATE,
                format!("must be in [0, 1], got {}", self.mixing_rate),
            ));
        }
        Ok(())
    }

    fn check_reservoirs(&self) -> NboxResult<()> {
        for (name, value) in [("surface", self.surface_c), ("deep", self.deep_c)] {
            if value < 0.0 {
                return Err(NboxError::NegativePool {
                    pool: format!("ocean {}", name),
                    biome: "ocean".to_string(),
                    value,
                });
            }
        }
        Ok(())
    }
}

#[typetag::serde]
impl Component for OceanCarbon {
    fn name(&self) -> &str {
        "ocean"
    }

    fn init(&mut self, registry: &mut Registry) -> NboxResult<()> {
        for capability in [D_OCEAN_C, D_OCEAN_CFLUX, D_OCEAN_SURFACE_C, D_OCEAN_DEEP_C] {
            registry.register_capability(capability, self.name())?;
        }
        for input in [SURFACE_C, DEEP_C, EXCHANGE_RATE, REVELLE_FACTOR, MIXING_RATE] {
            registry.register_input(input, self.name())?;
        }
        Ok(())
    }

    fn set_data(&mut self, variable: &str, data: &MessageData) -> NboxResult<()> {
        data.forbid_date(variable)?;
        match variable {
            SURFACE_C => self.surface_c = data.get_unitval(Unit::PgC)?.value(),
            DEEP_C => self.deep_c = data.get_unitval(Unit::PgC)?.value(),
            EXCHANGE_RATE => self.exchange_rate = data.get_unitval(Unit::Unitless)?.value(),
            REVELLE_FACTOR => self.revelle_factor = data.get_unitval(Unit::Unitless)?.value(),
            MIXING_RATE => self.mixing_rate = data.get_unitval(Unit::Unitless)?.value(),
            _ => {
                return Err(NboxError::UnknownVariable {
                    component: self.name().to_string(),
                    variable: variable.to_string(),
                })
            }
        }
        Ok(())
    }

    fn get_data(&self, variable: &str, date: Option<Time>) -> NboxResult<UnitVal> {
        let value = match (variable, date) {
            (D_OCEAN_C, None) => UnitVal::new(self.total_c(), Unit::PgC),
            (D_OCEAN_C, Some(d)) => UnitVal::new(
                self.surface_c_ts.get(d)? + self.deep_c_ts.get(d)?,
                Unit::PgC,
            ),
            (D_OCEAN_SURFACE_C, None) => UnitVal::new(self.surface_c, Unit::PgC),
            (D_OCEAN_SURFACE_C, Some(d)) => UnitVal::new(self.surface_c_ts.get(d)?, Unit::PgC),
            (D_OCEAN_DEEP_C, None) => UnitVal::new(self.deep_c, Unit::PgC),
            (D_OCEAN_DEEP_C, Some(d)) => UnitVal::new(self.deep_c_ts.get(d)?, Unit::PgC),
            (D_OCEAN_CFLUX, None) => UnitVal::new(self.atm_ocean_flux, Unit::PgCPerYear),
            (D_OCEAN_CFLUX, Some(d)) => {
                UnitVal::new(self.atm_ocean_flux_ts.get(d)?, Unit::PgCPerYear)
            }
            _ => {
                return Err(NboxError::UnknownVariable {
                    component: self.name().to_string(),
                    variable: variable.to_string(),
                })
            }
        };
        Ok(value)
    }

    fn receive_signal(
        &mut self,
        kind: MessageKind,
        datum: &str,
        data: &MessageData,
    ) -> NboxResult<()> {
        match kind {
            MessageKind::DumpToDeepOcean => {
                let dump = data.get_unitval(Unit::PgC)?.value();
                log::debug!("{} PgC dumped into the deep ocean", dump);
                self.deep_c += dump;
                self.check_reservoirs()
            }
            _ => Err(NboxError::Error(format!(
                "{} does not handle '{}' messages (datum '{}')",
                self.name(),
                kind,
                datum
            ))),
        }
    }

    fn prepare_to_run(&mut self, core: &Core) -> NboxResult<()> {
        self.validate()?;
        self.surface_c0 = self.surface_c;
        self.c0 = core
            .get_data(D_PREINDUSTRIAL_CO2, None)?
            .value_in(Unit::PpmvCO2)?;
        self.ode_start_date = core.start_date();
        log::debug!(
            "{}: surface = {} PgC, deep = {} PgC, C0 = {} ppmv",
            self.name(),
            self.surface_c,
            self.deep_c,
            self.c0
        );
        Ok(())
    }

    fn run(&mut self, _t: Time, _core: &Core) -> NboxResult<()> {
        Ok(())
    }

    fn reset(&mut self, t: Time) -> NboxResult<()> {
        self.surface_c = self.surface_c_ts.get(t)?;
        self.deep_c = self.deep_c_ts.get(t)?;
        self.atm_ocean_flux = self.atm_ocean_flux_ts.get(t)?;
        for ts in [
            &mut self.surface_c_ts,
            &mut self.deep_c_ts,
            &mut self.atm_ocean_flux_ts,
        ] {
            ts.truncate(t);
        }
        self.ode_start_date = t;
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

impl CarbonCycleModel for OceanCarbon {
    fn get_c_values(&mut self, t: Time, c: &mut CarbonState) -> NboxResult<()> {
        c[pool::OCEAN] = self.total_c();
        self.ode_start_date = t;
        Ok(())
    }

    fn calc_derivs(&self, _t: Time, c: &CarbonState, dcdt: &mut CarbonState) -> i32 {
        let surface_c = c[pool::OCEAN] - self.deep_c;
        let ca = c[pool::ATMOS] * PPMV_PER_PGC;
        dcdt[pool::OCEAN] = self.exchange_rate * (ca - self.surface_pco2(surface_c));
        0
    }

    fn slow_param_eval(&mut self, _t: Time, _c: &CarbonState, _core: &Core) -> NboxResult<()> {
        Ok(())
    }

    fn stash_c_values(&mut self, t: Time, c: &CarbonState, _core: &Core) -> NboxResult<()> {
        let dt = t - self.ode_start_date;
        let total = c[pool::OCEAN];
        self.atm_ocean_flux = if dt > 0.0 {
            (total - self.total_c()) / dt
        } else {
            0.0
        };

        self.surface_c = total - self.deep_c;
        let mixed = self.mixing_rate * dt * (self.surface_c - self.surface_c0);
        self.surface_c -= mixed;
        self.deep_c += mixed;
        log::debug!(
            "{} at {}: flux = {}, mixed = {}, surface = {}, deep = {}",
            self.name(),
            t,
            self.atm_ocean_flux,
            mixed,
            self.surface_c,
            self.deep_c
        );
        self.check_reservoirs()?;
        self.ode_start_date = t;
        Ok(())
    }

    fn record_state(&mut self, t: Time) -> NboxResult<()> {
        self.surface_c_ts.set(t, self.surface_c);
        self.deep_c_ts.set(t, self.deep_c);
        self.atm_ocean_flux_ts.set(t, self.atm_ocean_flux);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::PrescribedTemperature;
    use crate::components::SimpleNbox;
    use approx::assert_relative_eq;
    use nbox_core::core::CoreSettings;
    use nbox_core::solver::SolverSettings;
    use nbox_core::units::PGC_PER_PPMV;

    fn prepared_ocean(c0: FloatValue) -> Core {
        let mut core = Core::new(
            CoreSettings {
                do_spinup: false,
                ..CoreSettings::default()
            },
            SolverSettings::default(),
        );
        let mut nbox = SimpleNbox::new();
        nbox.set_c0(c0);
        core.add_component(Box::new(nbox)).unwrap();
        core.add_component(Box::new(OceanCarbon::new())).unwrap();
        core.add_component(Box::new(PrescribedTemperature::new()))
            .unwrap();
        core
    }

    fn standalone(c0: FloatValue) -> OceanCarbon {
        let core = prepared_ocean(c0);
        let mut ocean = OceanCarbon::new();
        ocean.prepare_to_run(&core).unwrap();
        ocean
    }

    #[test]
    fn no_flux_at_equilibrium() {
        let ocean = standalone(280.0);
        let mut c = CarbonState::zeros();
        c[pool::ATMOS] = 280.0 * PGC_PER_PPMV;
        c[pool::OCEAN] = ocean.total_c();
        let mut dcdt = CarbonState::zeros();
        assert_eq!(ocean.calc_derivs(1745.0, &c, &mut dcdt), 0);
        assert_relative_eq!(dcdt[pool::OCEAN], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn uptake_is_buffered_by_the_surface() {
        let ocean = standalone(280.0);
        let mut c = CarbonState::zeros();
        c[pool::ATMOS] = 380.0 * PGC_PER_PPMV;
        c[pool::OCEAN] = ocean.total_c();
        let mut dcdt = CarbonState::zeros();
        ocean.calc_derivs(1745.0, &c, &mut dcdt);
        assert_relative_eq!(dcdt[pool::OCEAN], 0.05 * 100.0, epsilon = 1e-9);

        // 9 PgC more in the surface raises pCO2 by 10%
        c[pool::OCEAN] += 9.0;
        ocean.calc_derivs(1745.0, &c, &mut dcdt);
        assert_relative_eq!(dcdt[pool::OCEAN], 0.05 * (380.0 - 308.0), epsilon = 1e-9);
    }

    #[test]
    fn stash_mixes_surface_anomaly_downwards() {
        let core = prepared_ocean(280.0);
        let mut ocean = standalone(280.0);
        let mut c = CarbonState::zeros();
        ocean.get_c_values(1745.0, &mut c).unwrap();
        c[pool::OCEAN] += 20.0;
        ocean.stash_c_values(1746.0, &c, &core).unwrap();

        assert_relative_eq!(ocean.get_data(D_OCEAN_CFLUX, None).unwrap().value(), 20.0);
        assert_relative_eq!(ocean.surface_c(), 900.0 + 20.0 * 0.95, epsilon = 1e-9);
        assert_relative_eq!(ocean.deep_c(), 37100.0 + 20.0 * 0.05, epsilon = 1e-9);
        assert_relative_eq!(ocean.total_c(), 38020.0, epsilon = 1e-9);
    }

    #[test]
    fn dumps_land_in_the_deep_ocean() {
        let mut ocean = OceanCarbon::new();
        let dump = MessageData::from_unitval(UnitVal::new(12.5, Unit::PgC));
        ocean
            .receive_signal(MessageKind::DumpToDeepOcean, D_OCEAN_C, &dump)
            .unwrap();
        assert_eq!(ocean.deep_c(), 37112.5);
        assert_eq!(ocean.surface_c(), 900.0);

        let drain = MessageData::from_unitval(UnitVal::new(-40000.0, Unit::PgC));
        assert!(matches!(
            ocean.receive_signal(MessageKind::DumpToDeepOcean, D_OCEAN_C, &drain),
            Err(NboxError::NegativePool { .. })
        ));
    }

    #[test]
    fn parameters_are_validated() {
        let core = prepared_ocean(280.0);
        let mut ocean = OceanCarbon::new();
        ocean
            .set_data(MIXING_RATE, &MessageData::from_text("1.5"))
            .unwrap();
        assert!(matches!(
            ocean.prepare_to_run(&core),
            Err(NboxError::InvalidParameter { .. })
        ));

        assert!(ocean
            .set_data(DEEP_C, &MessageData::from_text("1").with_date(1750.0))
            .is_err());
        assert!(matches!(
            ocean.set_data("salinity", &MessageData::from_text("35")),
            Err(NboxError::UnknownVariable { .. })
        ));
    }

    #[test]
    fn reset_restores_recorded_reservoirs() {
        let core = prepared_ocean(280.0);
        let mut ocean = standalone(280.0);
        ocean.record_state(1745.0).unwrap();

        let mut c = CarbonState::zeros();
        ocean.get_c_values(1745.0, &mut c).unwrap();
        c[pool::OCEAN] += 5.0;
        ocean.stash_c_values(1746.0, &c, &core).unwrap();
        ocean.record_state(1746.0).unwrap();
        assert!(ocean.get_data(D_OCEAN_SURFACE_C, Some(1746.0)).is_ok());

        ocean.reset(1745.0).unwrap();
        assert_eq!(ocean.surface_c(), 900.0);
        assert_eq!(ocean.deep_c(), 37100.0);
        assert!(ocean.get_data(D_OCEAN_SURFACE_C, Some(1746.0)).is_err());
    }
}
