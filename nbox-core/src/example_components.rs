use crate::component::{pool, CarbonCycleModel, CarbonState, Component};
use crate::core::Core;
use crate::errors::{NboxError, NboxResult};
use crate::message::{MessageData, MessageKind};
use crate::registry::Registry;
use crate::standard_variables::{D_ATMOSPHERIC_C, D_OCEAN_C, D_VEGC};
use crate::timeseries::{FloatValue, Time, TimeSeries};
use crate::units::{Unit, UnitVal};
use serde::{Deserialize, Serialize};
use std::any::Any;

// ============================================================================
// TwoBoxCarbon - atmosphere exchanging carbon with a single land box
// ============================================================================

/// Minimal carbon model relaxing the atmosphere and land pools towards each other
///
/// `d(atmos)/dt = -rate * (atmos - land)` and `d(land)/dt = rate * (atmos - land)`.
/// During spinup the atmosphere is pinned to `atmos_target` and the excess is dumped into the
/// deep ocean.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TwoBoxCarbon {
    pub atmos_c: FloatValue,
    pub land_c: FloatValue,
    pub rate: FloatValue,
    pub atmos_target: FloatValue,
    atmos_c_ts: TimeSeries<FloatValue>,
    land_c_ts: TimeSeries<FloatValue>,
    #[serde(skip)]
    pub finished: bool,
}

impl TwoBoxCarbon {
    pub fn new(atmos_c: FloatValue, land_c: FloatValue, rate: FloatValue) -> Self {
        Self {
            atmos_c,
            land_c,
            rate,
            atmos_target: atmos_c,
            atmos_c_ts: TimeSeries::new("atmos_c"),
            land_c_ts: TimeSeries::new("land_c"),
            finished: false,
        }
    }
}

#[typetag::serde]
impl Component for TwoBoxCarbon {
    fn name(&self) -> &str {
        "twobox"
    }

    fn init(&mut self, registry: &mut Registry) -> NboxResult<()> {
        registry.register_capability(D_ATMOSPHERIC_C, self.name())?;
        registry.register_capability(D_VEGC, self.name())?;
        registry.register_dependency(D_OCEAN_C, self.name());
        registry.register_input("rate", self.name())?;
        Ok(())
    }

    fn set_data(&mut self, variable: &str, data: &MessageData) -> NboxResult<()> {
        match variable {
            "rate" => self.rate = data.get_unitval(Unit::Unitless)?.value(),
            D_ATMOSPHERIC_C => self.atmos_c = data.get_unitval(Unit::PgC)?.value(),
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
            (D_ATMOSPHERIC_C, None) => self.atmos_c,
            (D_ATMOSPHERIC_C, Some(d)) => self.atmos_c_ts.get(d)?,
            (D_VEGC, None) => self.land_c,
            (D_VEGC, Some(d)) => self.land_c_ts.get(d)?,
            _ => {
                return Err(NboxError::UnknownVariable {
                    component: self.name().to_string(),
                    variable: variable.to_string(),
                })
            }
        };
        Ok(UnitVal::new(value, Unit::PgC))
    }

    fn run(&mut self, _t: Time, _core: &Core) -> NboxResult<()> {
        Ok(())
    }

    fn reset(&mut self, t: Time) -> NboxResult<()> {
        self.atmos_c = self.atmos_c_ts.get(t)?;
        self.land_c = self.land_c_ts.get(t)?;
        self.atmos_c_ts.truncate(t);
        self.land_c_ts.truncate(t);
        Ok(())
    }

    fn as_carbon_model(&self) -> Option<&dyn CarbonCycleModel> {
        Some(self)
    }

    fn as_carbon_model_mut(&mut self) -> Option<&mut dyn CarbonCycleModel> {
        Some(self)
    }

    fn shut_down(&mut self) {
        self.finished = true;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl CarbonCycleModel for TwoBoxCarbon {
    fn get_c_values(&mut self, _t: Time, c: &mut CarbonState) -> NboxResult<()> {
        c[pool::ATMOS] = self.atmos_c;
        c[pool::VEG] = self.land_c;
        Ok(())
    }

    fn calc_derivs(&self, _t: Time, c: &CarbonState, dcdt: &mut CarbonState) -> i32 {
        let flux = self.rate * (c[pool::ATMOS] - c[pool::VEG]);
        dcdt[pool::ATMOS] = -flux;
        dcdt[pool::VEG] = flux;
        0
    }

    fn slow_param_eval(&mut self, _t: Time, _c: &CarbonState, _core: &Core) -> NboxResult<()> {
        Ok(())
    }

    fn stash_c_values(&mut self, _t: Time, c: &CarbonState, core: &Core) -> NboxResult<()> {
        self.atmos_c = c[pool::ATMOS];
        self.land_c = c[pool::VEG];
        if core.in_spinup() {
            let residual = self.atmos_c - self.atmos_target;
            core.send_message(
                MessageKind::DumpToDeepOcean,
                D_OCEAN_C,
                &MessageData::from_unitval(UnitVal::new(residual, Unit::PgC)),
            )?;
            self.atmos_c = self.atmos_target;
        }
        Ok(())
    }

    fn record_state(&mut self, t: Time) -> NboxResult<()> {
        self.atmos_c_ts.set(t, self.atmos_c);
        self.land_c_ts.set(t, self.land_c);
        Ok(())
    }
}

// ============================================================================
// DeepSink - passive reservoir filling the ocean slot
// ============================================================================

/// Inert ocean reservoir that only accumulates carbon dumped into it
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct DeepSink {
    pub deep_c: FloatValue,
    deep_c_ts: TimeSeries<FloatValue>,
}

#[typetag::serde]
impl Component for DeepSink {
    fn name(&self) -> &str {
        "sink"
    }

    fn init(&mut self, registry: &mut Registry) -> NboxResult<()> {
        registry.register_capability(D_OCEAN_C, self.name())
    }

    fn set_data(&mut self, variable: &str, _data: &MessageData) -> NboxResult<()> {
        Err(NboxError::UnknownVariable {
            component: self.name().to_string(),
            variable: variable.to_string(),
        })
    }

    fn get_data(&self, _variable: &str, date: Option<Time>) -> NboxResult<UnitVal> {
        let value = match date {
            Some(d) => self.deep_c_ts.get(d)?,
            None => self.deep_c,
        };
        Ok(UnitVal::new(value, Unit::PgC))
    }

    fn receive_signal(
        &mut self,
        kind: MessageKind,
        _datum: &str,
        data: &MessageData,
    ) -> NboxResult<()> {
        match kind {
            MessageKind::DumpToDeepOcean => {
                self.deep_c += data.get_unitval(Unit::PgC)?.value();
                Ok(())
            }
            _ => Err(NboxError::Error(format!("unexpected message {}", kind))),
        }
    }

    fn run(&mut self, _t: Time, _core: &Core) -> NboxResult<()> {
        Ok(())
    }

    fn reset(&mut self, t: Time) -> NboxResult<()> {
        self.deep_c = self.deep_c_ts.get(t)?;
        self.deep_c_ts.truncate(t);
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

impl CarbonCycleModel for DeepSink {
    fn get_c_values(&mut self, _t: Time, c: &mut CarbonState) -> NboxResult<()> {
        c[pool::OCEAN] = self.deep_c;
        Ok(())
    }

    fn calc_derivs(&self, _t: Time, _c: &CarbonState, _dcdt: &mut CarbonState) -> i32 {
        0
    }

    fn slow_param_eval(&mut self, _t: Time, _c: &CarbonState, _core: &Core) -> NboxResult<()> {
        Ok(())
    }

    fn stash_c_values(&mut self, _t: Time, c: &CarbonState, _core: &Core) -> NboxResult<()> {
        self.deep_c = c[pool::OCEAN];
        Ok(())
    }

    fn record_state(&mut self, t: Time) -> NboxResult<()> {
        self.deep_c_ts.set(t, self.deep_c);
        Ok(())
    }
}
