use crate::timeseries::Time;
use crate::units::Unit;
use thiserror::Error;

/// Error type for invalid operations.
///
/// Each variant corresponds to one kind of failure a component or the core can report.
/// Nested failures raised while ingesting a variable are wrapped in [`NboxError::Variable`]
/// so the offending name travels with the original cause.
#[derive(Error, Debug)]
pub enum NboxError {
    #[error("{0}")]
    Error(String),
    #[error("Unit mismatch. Expected {expected}, got {found}")]
    UnitMismatch { expected: Unit, found: Unit },
    #[error("Date {date} is not available in timeseries '{name}'")]
    IndexError { name: String, date: Time },
    #[error("No component provides '{0}'")]
    UnknownDatum(String),
    #[error("Unknown variable '{variable}' for component '{component}'")]
    UnknownVariable { component: String, variable: String },
    #[error("Capability '{capability}' is already provided by '{existing}' (requested by '{requested}')")]
    DuplicateCapability {
        capability: String,
        existing: String,
        requested: String,
    },
    #[error("Circular dependency between components: {0}")]
    CircularDependency(String),
    #[error("{0}")]
    BiomeConflict(String),
    #[error("Date {requirement} for variable '{variable}'")]
    DateRequirementViolation {
        variable: String,
        requirement: &'static str,
    },
    #[error("{names} sum to {sum}, which exceeds 1")]
    PartitionSumExceedsOne { names: String, sum: f64 },
    #[error("{pool} pool is negative ({value}) in biome '{biome}'")]
    NegativePool {
        pool: String,
        biome: String,
        value: f64,
    },
    #[error("Mass not conserved: masstot={expected}, sum={actual}, diff={diff}")]
    MassNotConserved {
        expected: f64,
        actual: f64,
        diff: f64,
    },
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("ODE integration failed: {0}")]
    Integration(String),
    #[error("Spinup did not converge after {0} steps")]
    SpinupNotConverged(usize),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    #[error("Could not parse var '{variable}': {source}")]
    Variable {
        variable: String,
        #[source]
        source: Box<NboxError>,
    },
}

impl NboxError {
    /// Wrap an error with the name of the variable being processed.
    pub fn for_variable(variable: &str, source: NboxError) -> Self {
        NboxError::Variable {
            variable: variable.to_string(),
            source: Box::new(source),
        }
    }

    /// The innermost error, skipping any [`NboxError::Variable`] wrappers.
    pub fn root_cause(&self) -> &NboxError {
        match self {
            NboxError::Variable { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<toml::de::Error> for NboxError {
    fn from(value: toml::de::Error) -> Self {
        NboxError::Config(value.to_string())
    }
}

/// Convenience type for `Result<T, NboxError>`.
pub type NboxResult<T> = Result<T, NboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_wrapper_exposes_root_cause() {
        let err = NboxError::for_variable(
            "forest.veg_c",
            NboxError::DateRequirementViolation {
                variable: "veg_c".to_string(),
                requirement: "not allowed",
            },
        );
        assert!(err.to_string().contains("forest.veg_c"));
        assert!(matches!(
            err.root_cause(),
            NboxError::DateRequirementViolation { .. }
        ));
    }
}
