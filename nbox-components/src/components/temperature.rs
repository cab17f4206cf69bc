//! Global mean temperature read from a prescribed series

use nbox_core::component::Component;
use nbox_core::core::Core;
use nbox_core::errors::{NboxError, NboxResult};
use nbox_core::message::MessageData;
use nbox_core::registry::Registry;
use nbox_core::standard_variables::D_GLOBAL_TEMP;
use nbox_core::timeseries::{FloatValue, Time, TimeSeries};
use nbox_core::units::{Unit, UnitVal};
use serde::{Deserialize, Serialize};
use std::any::Any;

/// Publishes `Tgav` from a user-supplied series
///
/// The series is interpolated between its dates and held constant beyond them. Without any
/// data the temperature anomaly is zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescribedTemperature {
    tgav: TimeSeries<FloatValue>,
    /// unit: degC
    current: FloatValue,
}

impl Default for PrescribedTemperature {
    fn default() -> Self {
        let mut tgav = TimeSeries::interpolated(D_GLOBAL_TEMP);
        tgav.allow_partial_interp(true);
        Self { tgav, current: 0.0 }
    }
}

impl PrescribedTemperature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Temperature anomaly at `t`
    pub fn at(&self, t: Time) -> NboxResult<FloatValue> {
        if self.tgav.is_empty() {
            Ok(0.0)
        } else {
            self.tgav.get(t)
        }
    }
}

#[typetag::serde]
impl Component for PrescribedTemperature {
    fn name(&self) -> &str {
        "temperature"
    }

    fn init(&mut self, registry: &mut Registry) -> NboxResult<()> {
        registry.register_capability(D_GLOBAL_TEMP, self.name())?;
        registry.register_input(D_GLOBAL_TEMP, self.name())
    }

    fn set_data(&mut self, variable: &str, data: &MessageData) -> NboxResult<()> {
        match variable {
            D_GLOBAL_TEMP => {
                let date = data.require_date(variable)?;
                self.tgav.set(date, data.get_unitval(Unit::DegC)?.value());
                Ok(())
            }
            _ => Err(NboxError::UnknownVariable {
                component: self.name().to_string(),
                variable: variable.to_string(),
            }),
        }
    }

    fn get_data(&self, variable: &str, date: Option<Time>) -> NboxResult<UnitVal> {
        if variable != D_GLOBAL_TEMP {
            return Err(NboxError::UnknownVariable {
                component: self.name().to_string(),
                variable: variable.to_string(),
            });
        }
        let value = match date {
            Some(d) => self.at(d)?,
            None => self.current,
        };
        Ok(UnitVal::new(value, Unit::DegC))
    }

    fn prepare_to_run(&mut self, core: &Core) -> NboxResult<()> {
        if self.tgav.is_empty() {
            log::info!("No {} data, assuming no warming", D_GLOBAL_TEMP);
        }
        self.current = self.at(core.start_date())?;
        Ok(())
    }

    fn run(&mut self, t: Time, _core: &Core) -> NboxResult<()> {
        self.current = self.at(t)?;
        Ok(())
    }

    fn reset(&mut self, t: Time) -> NboxResult<()> {
        self.current = self.at(t)?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dated(value: &str, date: Time) -> MessageData {
        MessageData::from_text(value).with_date(date)
    }

    #[test]
    fn interpolates_and_clamps() {
        let mut temperature = PrescribedTemperature::new();
        temperature.set_data(D_GLOBAL_TEMP, &dated("0", 1850.0)).unwrap();
        temperature.set_data(D_GLOBAL_TEMP, &dated("5", 2100.0)).unwrap();

        assert_eq!(temperature.at(1800.0).unwrap(), 0.0);
        assert_eq!(temperature.at(1975.0).unwrap(), 2.5);
        assert_eq!(temperature.at(2200.0).unwrap(), 5.0);
    }

    #[test]
    fn no_data_means_no_warming() {
        let mut temperature = PrescribedTemperature::new();
        temperature.run(2000.0, &Core::default()).unwrap();
        let tgav = temperature.get_data(D_GLOBAL_TEMP, None).unwrap();
        assert_eq!(tgav, UnitVal::new(0.0, Unit::DegC));
        assert_eq!(
            temperature.get_data(D_GLOBAL_TEMP, Some(1900.0)).unwrap().value(),
            0.0
        );
    }

    #[test]
    fn run_tracks_current_value() {
        let mut temperature = PrescribedTemperature::new();
        temperature.set_data(D_GLOBAL_TEMP, &dated("1", 2000.0)).unwrap();
        temperature.set_data(D_GLOBAL_TEMP, &dated("2", 2010.0)).unwrap();
        temperature.run(2005.0, &Core::default()).unwrap();
        assert_eq!(temperature.get_data(D_GLOBAL_TEMP, None).unwrap().value(), 1.5);

        temperature.reset(2000.0).unwrap();
        assert_eq!(temperature.get_data(D_GLOBAL_TEMP, None).unwrap().value(), 1.0);
    }

    #[test]
    fn values_need_dates() {
        let mut temperature = PrescribedTemperature::new();
        let err = temperature
            .set_data(D_GLOBAL_TEMP, &MessageData::from_text("1"))
            .unwrap_err();
        assert!(matches!(err, NboxError::DateRequirementViolation { .. }));
        assert!(temperature.get_data("Tsurface", None).is_err());
    }
}
