use crate::core::Core;
use crate::errors::{NboxError, NboxResult};
use crate::message::{MessageData, MessageKind};
use crate::registry::Registry;
use crate::timeseries::{FloatValue, Time};
use crate::units::UnitVal;
use nalgebra::SVector;
use std::any::Any;
use std::fmt::Debug;

/// Number of slots in the shared carbon state vector
pub const N_CARBON_POOLS: usize = 7;

/// Flat carbon state handed to the ODE integrator (PgC in every slot)
pub type CarbonState = SVector<FloatValue, N_CARBON_POOLS>;

/// Fixed slot indices in [`CarbonState`]
///
/// The terrestrial model owns every slot except [`pool::OCEAN`], which belongs to the ocean
/// model. Both read the whole vector.
pub mod pool {
    pub const ATMOS: usize = 0;
    pub const VEG: usize = 1;
    pub const DET: usize = 2;
    pub const SOIL: usize = 3;
    pub const OCEAN: usize = 4;
    pub const EARTH: usize = 5;
    pub const PERMAFROST: usize = 6;
}

/// Component of a model
///
/// Components are owned by the [`Core`], which routes messages between them by datum name.
/// During [`Component::init`] a component registers the data it provides, depends on and
/// accepts. All communication with other components happens through the `core` handle passed
/// into the lifecycle methods.
#[typetag::serde]
pub trait Component: Debug {
    /// Unique name of the component, also used as its configuration section
    fn name(&self) -> &str;

    /// Register capabilities, dependencies and inputs
    fn init(&mut self, registry: &mut Registry) -> NboxResult<()>;

    /// Receive a (possibly dated) value for `variable`
    fn set_data(&mut self, variable: &str, data: &MessageData) -> NboxResult<()>;

    /// Current value of `variable`, or its recorded value at `date`
    fn get_data(&self, variable: &str, date: Option<Time>) -> NboxResult<UnitVal>;

    /// Handle a message other than a plain get or set
    fn receive_signal(
        &mut self,
        kind: MessageKind,
        datum: &str,
        _data: &MessageData,
    ) -> NboxResult<()> {
        Err(NboxError::Error(format!(
            "{} does not handle '{}' messages (datum '{}')",
            self.name(),
            kind,
            datum
        )))
    }

    /// Validate configuration and initialise state before the first step
    fn prepare_to_run(&mut self, _core: &Core) -> NboxResult<()> {
        Ok(())
    }

    /// Advance to `t`
    fn run(&mut self, t: Time, core: &Core) -> NboxResult<()>;

    /// Restore the state recorded at `t` and discard anything later
    fn reset(&mut self, t: Time) -> NboxResult<()>;

    fn shut_down(&mut self) {
        log::debug!("goodbye {}", self.name());
    }

    fn as_carbon_model(&self) -> Option<&dyn CarbonCycleModel> {
        None
    }

    fn as_carbon_model_mut(&mut self) -> Option<&mut dyn CarbonCycleModel> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A component whose carbon pools are integrated by the core's ODE driver
///
/// Each outer step of length `dt` the driver calls, for every carbon model in dependency
/// order: [`get_c_values`](Self::get_c_values), [`slow_param_eval`](Self::slow_param_eval),
/// then integrates (calling [`calc_derivs`](Self::calc_derivs) any number of times), then
/// [`stash_c_values`](Self::stash_c_values) and [`record_state`](Self::record_state).
pub trait CarbonCycleModel: Component {
    /// Write this model's slots of `c` at the start of a step
    fn get_c_values(&mut self, t: Time, c: &mut CarbonState) -> NboxResult<()>;

    /// Write this model's slots of `dcdt`
    ///
    /// Must not mutate stored state. A nonzero return aborts the integration.
    fn calc_derivs(&self, t: Time, c: &CarbonState, dcdt: &mut CarbonState) -> i32;

    /// Update parameters that are held constant across a step
    fn slow_param_eval(&mut self, t: Time, c: &CarbonState, core: &Core) -> NboxResult<()>;

    /// Take ownership of the integrated pools at the end of a step
    fn stash_c_values(&mut self, t: Time, c: &CarbonState, core: &Core) -> NboxResult<()>;

    /// Snapshot all state at `t`
    fn record_state(&mut self, t: Time) -> NboxResult<()>;
}
