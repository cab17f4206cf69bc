//! Run configuration read from TOML.
//!
//! A configuration file has one table per section. The `core` and `solver` tables map onto
//! [`CoreSettings`] and [`SolverSettings`]; every other table is addressed to the component of
//! the same name and is delivered value by value through [`Core::set_data`].
//!
//! Dated values can be written either as `"name[1990]" = value` or as an inline table keyed by
//! date:
//!
//! ```toml
//! [core]
//! startDate = 1745
//! endDate = 2100
//!
//! [simpleNbox]
//! C0 = 277.15
//! "forest.beta" = 0.36
//! ffi_emissions = { 1990 = 6.1, 2000 = 6.7 }
//! "Ftalbedo[1750]" = 0.0
//! ```

use crate::core::{Core, CoreSettings};
use crate::errors::{NboxError, NboxResult};
use crate::message::MessageData;
use crate::solver::SolverSettings;
use crate::timeseries::Time;
use std::path::Path;
use toml::{Table, Value};

/// A single value addressed to a component
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigEntry {
    pub section: String,
    pub name: String,
    pub date: Option<Time>,
    pub value: String,
}

impl ConfigEntry {
    pub fn message(&self) -> MessageData {
        let data = MessageData::from_text(&self.value);
        match self.date {
            Some(date) => data.with_date(date),
            None => data,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunConfig {
    pub core: CoreSettings,
    pub solver: SolverSettings,
    /// Component values in file order
    pub entries: Vec<ConfigEntry>,
}

fn parse_date(section: &str, key: &str, date: &str) -> NboxResult<Time> {
    date.trim().parse().map_err(|_| {
        NboxError::Config(format!(
            "[{}] '{}': '{}' is not a valid date",
            section, key, date
        ))
    })
}

/// Split `name[date]` into its name and date
fn split_key(section: &str, key: &str) -> NboxResult<(String, Option<Time>)> {
    match key.split_once('[') {
        None => Ok((key.trim().to_string(), None)),
        Some((name, rest)) => {
            let date = rest.strip_suffix(']').ok_or_else(|| {
                NboxError::Config(format!("[{}] '{}': unterminated date", section, key))
            })?;
            Ok((name.trim().to_string(), Some(parse_date(section, key, date)?)))
        }
    }
}

fn scalar_text(section: &str, key: &str, value: &Value) -> NboxResult<String> {
    match value {
        Value::Integer(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Boolean(b) => Ok(b.to_string()),
        Value::String(s) if s.trim_start().starts_with("csv:") => Err(NboxError::Config(
            format!("[{}] '{}': tabular inputs are not supported", section, key),
        )),
        Value::String(s) => Ok(s.trim().to_string()),
        other => Err(NboxError::Config(format!(
            "[{}] '{}': expected a scalar, found {}",
            section,
            key,
            other.type_str()
        ))),
    }
}

impl RunConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> NboxResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> NboxResult<Self> {
        let table: Table = text.parse()?;
        let mut config = RunConfig::default();

        for (section, value) in table {
            let values = match value {
                Value::Table(values) => values,
                other => {
                    return Err(NboxError::Config(format!(
                        "'{}' must be a section, found a {}",
                        section,
                        other.type_str()
                    )))
                }
            };
            match section.as_str() {
                "core" => config.core = Value::Table(values).try_into()?,
                "solver" => config.solver = Value::Table(values).try_into()?,
                _ => config.push_section(&section, values)?,
            }
        }
        config.core.validate()?;
        config.solver.validate()?;
        Ok(config)
    }

    fn push_section(&mut self, section: &str, values: Table) -> NboxResult<()> {
        for (key, value) in values {
            let (name, date) = split_key(section, &key)?;
            match value {
                Value::Table(series) => {
                    if date.is_some() {
                        return Err(NboxError::Config(format!(
                            "[{}] '{}': a dated key cannot hold a series",
                            section, key
                        )));
                    }
                    for (date, v) in series {
                        self.entries.push(ConfigEntry {
                            section: section.to_string(),
                            name: name.clone(),
                            date: Some(parse_date(section, &key, &date)?),
                            value: scalar_text(section, &key, &v)?,
                        });
                    }
                }
                other => self.entries.push(ConfigEntry {
                    section: section.to_string(),
                    name,
                    date,
                    value: scalar_text(section, &key, &other)?,
                }),
            }
        }
        Ok(())
    }

    /// An empty core carrying the run and solver settings
    pub fn new_core(&self) -> Core {
        Core::new(self.core.clone(), self.solver.clone())
    }

    /// Deliver every component value to `core`
    ///
    /// Sections must name components that have already been added.
    pub fn apply(&self, core: &mut Core) -> NboxResult<()> {
        for entry in &self.entries {
            log::debug!(
                "[{}] {} = {}",
                entry.section,
                entry.name,
                entry.message()
            );
            core.set_data(&entry.section, &entry.name, &entry.message())?;
        }
        Ok(())
    }
}
