//! The model core: component registry, message bus and run loop.
//!
//! The [`Core`] owns every component. Components never hold references to each other; they
//! receive a shared `&Core` in their lifecycle methods and use [`Core::send_message`] to reach
//! the provider of a datum. Each component sits in its own [`RefCell`] so that a component
//! being advanced can still query the others.
//!
//! A run proceeds in outer steps of `dt` years. For each step `[t0, t1]` every component is
//! run to `t1` in dependency order, then the carbon models are advanced together by the ODE
//! driver (see [`crate::solver`]) and their state recorded at `t1`.

use crate::component::{pool, CarbonState, Component, N_CARBON_POOLS};
use crate::errors::{NboxError, NboxResult};
use crate::message::{MessageData, MessageKind};
use crate::registry::Registry;
use crate::solver::{integrate, SolverSettings};
use crate::standard_variables::D_OCEAN_C;
use crate::timeseries::Time;
use crate::units::{Unit, UnitVal};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cell::{Cell, Ref, RefCell, RefMut};

/// Tolerance used when comparing dates on the step grid
const DATE_EPSILON: f64 = 1e-6;

/// Run-level settings, configured through the `core` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreSettings {
    pub run_name: String,
    #[serde(rename = "startDate")]
    pub start_date: Time,
    #[serde(rename = "endDate")]
    pub end_date: Time,
    /// Equilibrate the carbon cycle before the historical run
    pub do_spinup: bool,
    /// Maximum number of spinup steps before giving up
    pub max_spinup: usize,
    pub enabled: bool,
    /// Whether recorded output should be reported at the end of a run
    pub output: bool,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            run_name: "default".to_string(),
            start_date: 1745.0,
            end_date: 2300.0,
            do_spinup: true,
            max_spinup: 2000,
            enabled: true,
            output: true,
        }
    }
}

fn parse_bool(name: &str, value: &str) -> NboxResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(NboxError::InvalidParameter {
            name: name.to_string(),
            reason: format!("'{}' is not a boolean", other),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> NboxResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| NboxError::InvalidParameter {
            name: name.to_string(),
            reason: format!("'{}' is not a number", value),
        })
}

impl CoreSettings {
    /// Set a single setting from its textual value
    pub fn set(&mut self, name: &str, value: &str) -> NboxResult<()> {
        match name {
            "run_name" => self.run_name = value.trim().to_string(),
            "startDate" => self.start_date = parse_number(name, value)?,
            "endDate" => self.end_date = parse_number(name, value)?,
            "do_spinup" => self.do_spinup = parse_bool(name, value)?,
            "max_spinup" => self.max_spinup = parse_number(name, value)?,
            "enabled" => self.enabled = parse_bool(name, value)?,
            "output" => self.output = parse_bool(name, value)?,
            _ => {
                return Err(NboxError::UnknownVariable {
                    component: "core".to_string(),
                    variable: name.to_string(),
                })
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> NboxResult<()> {
        if self.end_date < self.start_date {
            return Err(NboxError::InvalidParameter {
                name: "endDate".to_string(),
                reason: format!(
                    "end date {} is before start date {}",
                    self.end_date, self.start_date
                ),
            });
        }
        Ok(())
    }
}

/// Owns the components and routes messages between them
#[derive(Debug, Serialize, Deserialize)]
pub struct Core {
    settings: CoreSettings,
    solver: SolverSettings,
    registry: Registry,
    components: Vec<RefCell<Box<dyn Component>>>,
    /// Component indices in dependency order, resolved by `prepare_to_run`
    order: Vec<usize>,
    current_date: Time,
    in_spinup: Cell<bool>,
    prepared: bool,
}

impl Default for Core {
    fn default() -> Self {
        Self::new(CoreSettings::default(), SolverSettings::default())
    }
}

impl Core {
    pub fn new(settings: CoreSettings, solver: SolverSettings) -> Self {
        let current_date = settings.start_date;
        Self {
            settings,
            solver,
            registry: Registry::new(),
            components: vec![],
            order: vec![],
            current_date,
            in_spinup: Cell::new(false),
            prepared: false,
        }
    }

    pub fn settings(&self) -> &CoreSettings {
        &self.settings
    }

    pub fn solver_settings(&self) -> &SolverSettings {
        &self.solver
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn start_date(&self) -> Time {
        self.settings.start_date
    }

    pub fn end_date(&self) -> Time {
        self.settings.end_date
    }

    /// Date the model has been advanced to
    pub fn current_date(&self) -> Time {
        self.current_date
    }

    pub fn in_spinup(&self) -> bool {
        self.in_spinup.get()
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Add a component and let it register its capabilities
    pub fn add_component(&mut self, mut component: Box<dyn Component>) -> NboxResult<()> {
        if self.prepared {
            return Err(NboxError::Error(format!(
                "Cannot add component '{}' after the core has been prepared",
                component.name()
            )));
        }
        let name = component.name().to_string();
        // Registration is all-or-nothing so a failed init leaves the core untouched
        let mut registry = self.registry.clone();
        registry.register_component(&name)?;
        component.init(&mut registry)?;
        self.registry = registry;
        log::debug!("Added component {}", name);
        self.components.push(RefCell::new(component));
        Ok(())
    }

    fn component_index(&self, name: &str) -> NboxResult<usize> {
        self.registry
            .components()
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| NboxError::Error(format!("Unknown component '{}'", name)))
    }

    fn borrow_component(&self, idx: usize) -> NboxResult<Ref<'_, Box<dyn Component>>> {
        self.components[idx].try_borrow().map_err(|_| {
            NboxError::Error(format!(
                "Component '{}' is busy",
                self.registry.components()[idx]
            ))
        })
    }

    fn borrow_component_mut(&self, idx: usize) -> NboxResult<RefMut<'_, Box<dyn Component>>> {
        self.components[idx].try_borrow_mut().map_err(|_| {
            NboxError::Error(format!(
                "Component '{}' is busy",
                self.registry.components()[idx]
            ))
        })
    }

    /// Borrow a component as its concrete type
    pub fn component<T: Any>(&self, name: &str) -> NboxResult<Ref<'_, T>> {
        let idx = self.component_index(name)?;
        Ref::filter_map(self.borrow_component(idx)?, |c| c.as_any().downcast_ref::<T>())
            .map_err(|_| NboxError::Error(format!("Component '{}' has a different type", name)))
    }

    /// Mutably borrow a component as its concrete type
    pub fn component_mut<T: Any>(&self, name: &str) -> NboxResult<RefMut<'_, T>> {
        let idx = self.component_index(name)?;
        RefMut::filter_map(self.borrow_component_mut(idx)?, |c| {
            c.as_any_mut().downcast_mut::<T>()
        })
        .map_err(|_| NboxError::Error(format!("Component '{}' has a different type", name)))
    }

    /// Deliver a configuration value
    ///
    /// `section` is either `core`, `solver` or the name of a component.
    pub fn set_data(&mut self, section: &str, variable: &str, data: &MessageData) -> NboxResult<()> {
        match section {
            "core" => {
                self.settings.set(variable, &data.as_text())?;
                if !self.prepared {
                    self.current_date = self.settings.start_date;
                }
                Ok(())
            }
            "solver" => self.solver.set(variable, &data.as_text()),
            _ => {
                let idx = self.component_index(section).map_err(|_| {
                    NboxError::Config(format!("Unknown section '{}'", section))
                })?;
                self.borrow_component_mut(idx)?.set_data(variable, data)
            }
        }
    }

    /// Send a message to the component responsible for `datum`
    ///
    /// `GetData` goes to the datum's provider, `SetData` to the component registered for it
    /// as an input, and `DumpToDeepOcean` to the ocean carbon provider.
    pub fn send_message(
        &self,
        kind: MessageKind,
        datum: &str,
        data: &MessageData,
    ) -> NboxResult<UnitVal> {
        match kind {
            MessageKind::GetData => {
                let idx = self.component_index(self.registry.provider(datum)?)?;
                self.borrow_component(idx)?.get_data(datum, data.date)
            }
            MessageKind::SetData => {
                let idx = self.component_index(self.registry.input_handler(datum)?)?;
                self.borrow_component_mut(idx)?.set_data(datum, data)?;
                Ok(UnitVal::zero(Unit::Unitless))
            }
            MessageKind::DumpToDeepOcean => {
                let idx = self.component_index(self.registry.provider(D_OCEAN_C)?)?;
                self.borrow_component_mut(idx)?
                    .receive_signal(kind, datum, data)?;
                Ok(UnitVal::zero(Unit::Unitless))
            }
        }
    }

    /// Current value of `datum`, or its recorded value at `date`
    pub fn get_data(&self, datum: &str, date: Option<Time>) -> NboxResult<UnitVal> {
        let data = match date {
            Some(d) => MessageData::at(d),
            None => MessageData::empty(),
        };
        self.send_message(MessageKind::GetData, datum, &data)
    }

    fn carbon_models(&self) -> NboxResult<Vec<usize>> {
        let mut models = vec![];
        for &idx in &self.order {
            if self.borrow_component(idx)?.as_carbon_model().is_some() {
                models.push(idx);
            }
        }
        Ok(models)
    }

    /// Resolve the component order and prepare every component
    ///
    /// Runs the spinup if configured and records the initial state at the start date.
    pub fn prepare_to_run(&mut self) -> NboxResult<()> {
        if self.prepared {
            return Ok(());
        }
        self.settings.validate()?;
        self.solver.validate()?;

        let order = self.registry.init_order()?;
        self.order = order
            .iter()
            .map(|name| self.component_index(name))
            .collect::<NboxResult<_>>()?;
        log::info!("Component order: {}", order.join(", "));

        self.current_date = self.settings.start_date;
        for &idx in &self.order {
            self.borrow_component_mut(idx)?.prepare_to_run(self)?;
        }

        if self.settings.do_spinup {
            self.spinup()?;
        }
        self.record_carbon_state(self.current_date)?;
        self.prepared = true;
        Ok(())
    }

    /// Advance one carbon-cycle step from `t0` to `t1`
    ///
    /// Returns the carbon state at the start and end of the step.
    fn carbon_step(&self, t0: Time, t1: Time) -> NboxResult<(CarbonState, CarbonState)> {
        let models = self.carbon_models()?;
        let mut c = CarbonState::zeros();

        for &idx in &models {
            let mut component = self.borrow_component_mut(idx)?;
            if let Some(model) = component.as_carbon_model_mut() {
                model.get_c_values(t0, &mut c)?;
            }
        }
        for &idx in &models {
            let mut component = self.borrow_component_mut(idx)?;
            if let Some(model) = component.as_carbon_model_mut() {
                model.slow_param_eval(t0, &c, self)?;
            }
        }

        let c_end = {
            let borrowed = models
                .iter()
                .map(|&idx| self.borrow_component(idx))
                .collect::<NboxResult<Vec<_>>>()?;
            let carbon_models: Vec<_> = borrowed.iter().filter_map(|c| c.as_carbon_model()).collect();
            integrate(&carbon_models, t0, t1, c, &self.solver)?
        };

        for &idx in &models {
            let mut component = self.borrow_component_mut(idx)?;
            if let Some(model) = component.as_carbon_model_mut() {
                model.stash_c_values(t1, &c_end, self)?;
            }
        }
        Ok((c, c_end))
    }

    fn record_carbon_state(&self, t: Time) -> NboxResult<()> {
        for idx in self.carbon_models()? {
            if let Some(model) = self.borrow_component_mut(idx)?.as_carbon_model_mut() {
                model.record_state(t)?;
            }
        }
        Ok(())
    }

    /// Repeat the first step with perturbations suppressed until the pools stop changing
    fn spinup(&self) -> NboxResult<()> {
        log::info!("Spinning up (max {} steps)", self.settings.max_spinup);
        self.in_spinup.set(true);
        let result = self.spinup_steps();
        self.in_spinup.set(false);
        result
    }

    fn spinup_steps(&self) -> NboxResult<()> {
        let t0 = self.settings.start_date;
        let t1 = t0 + self.solver.dt;
        for step in 1..=self.settings.max_spinup {
            let (start, end) = self.carbon_step(t0, t1)?;
            let max_delta = (0..N_CARBON_POOLS)
                .filter(|&i| i != pool::ATMOS)
                .map(|i| (end[i] - start[i]).abs())
                .fold(0.0, f64::max);
            log::debug!("Spinup step {}: max pool change {}", step, max_delta);
            if max_delta < self.solver.eps_spinup {
                log::info!("Spinup converged after {} steps", step);
                return Ok(());
            }
        }
        Err(NboxError::SpinupNotConverged(self.settings.max_spinup))
    }

    /// Run the model to `until` (defaults to the configured end date)
    pub fn run(&mut self, until: Option<Time>) -> NboxResult<()> {
        if !self.settings.enabled {
            log::info!("Run '{}' is disabled", self.settings.run_name);
            return Ok(());
        }
        self.prepare_to_run()?;

        let until = until.unwrap_or(self.settings.end_date);
        if until > self.settings.end_date + DATE_EPSILON {
            return Err(NboxError::Error(format!(
                "Cannot run to {} beyond the end date {}",
                until, self.settings.end_date
            )));
        }
        log::info!(
            "Running '{}' from {} to {}",
            self.settings.run_name,
            self.current_date,
            until
        );

        let dt = self.solver.dt;
        while self.current_date + dt <= until + DATE_EPSILON {
            let t0 = self.current_date;
            let t1 = t0 + dt;
            for &idx in &self.order {
                self.borrow_component_mut(idx)?.run(t1, self)?;
            }
            self.carbon_step(t0, t1)?;
            self.record_carbon_state(t1)?;
            self.current_date = t1;
        }
        Ok(())
    }

    /// Reset every component to its state at `t`
    pub fn reset(&mut self, t: Time) -> NboxResult<()> {
        if !self.prepared {
            return Err(NboxError::Error(
                "Cannot reset a core that has not been run".to_string(),
            ));
        }
        for &idx in &self.order {
            self.borrow_component_mut(idx)?.reset(t)?;
        }
        self.current_date = t;
        self.in_spinup.set(false);
        log::info!("Core reset to {}", t);
        Ok(())
    }

    pub fn shut_down(&mut self) {
        for component in &self.components {
            if let Ok(mut c) = component.try_borrow_mut() {
                c.shut_down();
            }
        }
    }
}
