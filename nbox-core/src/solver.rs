//! ODE driver glue for the carbon cycle.
//!
//! Carbon models expose their pools through a flat [`CarbonState`]. For each outer step the
//! [`CarbonSystem`] combines every model's derivatives into a single system that is integrated
//! with an adaptive Dormand-Prince scheme.

use crate::component::{CarbonCycleModel, CarbonState};
use crate::errors::{NboxError, NboxResult};
use crate::timeseries::{FloatValue, Time};
use is_close::is_close;
use ode_solvers::dop_shared::SolverResult;
use ode_solvers::{Dopri5, System};
use serde::{Deserialize, Serialize};
use std::cell::Cell;

/// Integration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverSettings {
    /// Absolute error tolerance
    pub eps_abs: FloatValue,
    /// Relative error tolerance
    pub eps_rel: FloatValue,
    /// Length of an outer step
    /// unit: yr
    pub dt: FloatValue,
    /// Largest per-step change in any non-atmospheric pool for spinup to be complete
    /// unit: PgC
    pub eps_spinup: FloatValue,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            eps_abs: 1e-6,
            eps_rel: 1e-6,
            dt: 1.0,
            eps_spinup: 0.001,
        }
    }
}

impl SolverSettings {
    /// Set a single setting from its textual value
    pub fn set(&mut self, name: &str, value: &str) -> NboxResult<()> {
        let parsed: FloatValue = value.trim().parse().map_err(|_| {
            NboxError::InvalidParameter {
                name: name.to_string(),
                reason: format!("'{}' is not a number", value),
            }
        })?;
        match name {
            "eps_abs" => self.eps_abs = parsed,
            "eps_rel" => self.eps_rel = parsed,
            "dt" => self.dt = parsed,
            "eps_spinup" => self.eps_spinup = parsed,
            _ => {
                return Err(NboxError::UnknownVariable {
                    component: "solver".to_string(),
                    variable: name.to_string(),
                })
            }
        }
        self.validate()
    }

    pub fn validate(&self) -> NboxResult<()> {
        let positive = [
            ("eps_abs", self.eps_abs),
            ("eps_rel", self.eps_rel),
            ("dt", self.dt),
            ("eps_spinup", self.eps_spinup),
        ];
        for (name, value) in positive {
            if value.is_nan() || value <= 0.0 {
                return Err(NboxError::InvalidParameter {
                    name: name.to_string(),
                    reason: format!("must be positive, got {}", value),
                });
            }
        }
        Ok(())
    }
}

/// The coupled system seen by the integrator
///
/// Derivatives are evaluated model by model in dependency order into a zeroed vector, so a
/// model may read slots written by the models before it (e.g. the terrestrial model reads the
/// ocean flux).
pub struct CarbonSystem<'a> {
    models: &'a [&'a dyn CarbonCycleModel],
    status: &'a Cell<i32>,
}

impl<'a> CarbonSystem<'a> {
    pub fn new(models: &'a [&'a dyn CarbonCycleModel], status: &'a Cell<i32>) -> Self {
        Self { models, status }
    }
}

impl System<Time, CarbonState> for CarbonSystem<'_> {
    fn system(&self, t: Time, y: &CarbonState, dy: &mut CarbonState) {
        dy.fill(0.0);
        for model in self.models {
            let code = model.calc_derivs(t, y, dy);
            if code != 0 && self.status.get() == 0 {
                self.status.set(code);
            }
        }
    }

    fn solout(&mut self, _x: Time, _y: &CarbonState, _dy: &CarbonState) -> bool {
        // Stop integrating as soon as any model has reported a failure
        self.status.get() != 0
    }
}

/// Extract the state at the end of an integration
pub fn get_last_step(
    results: &SolverResult<Time, CarbonState>,
    t_expected: Time,
) -> NboxResult<CarbonState> {
    let (t, y) = results.get();
    match (t.last(), y.last()) {
        (Some(t_last), Some(y_last)) if is_close!(*t_last, t_expected) => Ok(*y_last),
        (Some(t_last), _) => Err(NboxError::Integration(format!(
            "integration stopped at {} instead of {}",
            t_last, t_expected
        ))),
        _ => Err(NboxError::Integration("no integration output".to_string())),
    }
}

/// Integrate the combined carbon models from `t0` to `t1` starting at `y0`
pub fn integrate(
    models: &[&dyn CarbonCycleModel],
    t0: Time,
    t1: Time,
    y0: CarbonState,
    settings: &SolverSettings,
) -> NboxResult<CarbonState> {
    let status = Cell::new(0);
    let system = CarbonSystem::new(models, &status);

    let mut stepper = Dopri5::new(
        system,
        t0,
        t1,
        t1 - t0,
        y0,
        settings.eps_rel,
        settings.eps_abs,
    );
    let stats = stepper
        .integrate()
        .map_err(|e| NboxError::Integration(format!("{:?}", e)))?;
    log::trace!(
        "integrated {} -> {} in {} accepted steps",
        t0,
        t1,
        stats.accepted_steps
    );

    if status.get() != 0 {
        return Err(NboxError::Integration(format!(
            "derivative evaluation failed with code {} between {} and {}",
            status.get(),
            t0,
            t1
        )));
    }
    get_last_step(stepper.results(), t1)
}
