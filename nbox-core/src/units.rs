//! Unit-tagged scalar values.
//!
//! Carbon-cycle quantities are passed between components as a value paired with a unit tag.
//! Arithmetic between two [`UnitVal`]s requires matching units; mixing them yields
//! [`NboxError::UnitMismatch`](crate::errors::NboxError::UnitMismatch).
//! The only physical conversion supported is between carbon mass and atmospheric CO2
//! concentration, using a fixed airborne conversion factor.
//!
//! ```
//! use nbox_core::units::{Unit, UnitVal};
//!
//! let atmos = UnitVal::new(2.1305 * 280.0, Unit::PgC);
//! let conc = atmos.convert_to(Unit::PpmvCO2).unwrap();
//! assert!((conc.value() - 280.0).abs() < 1e-9);
//!
//! let flux = UnitVal::new(1.0, Unit::PgCPerYear);
//! assert!(atmos.try_add(flux).is_err());
//! ```

use crate::errors::{NboxError, NboxResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Div, Mul, Neg};

/// Carbon mass per unit of atmospheric CO2 concentration
/// unit: PgC / ppmv
pub const PGC_PER_PPMV: f64 = 2.1305;

/// Atmospheric CO2 concentration per unit of carbon mass
/// unit: ppmv / PgC
pub const PPMV_PER_PGC: f64 = 1.0 / PGC_PER_PPMV;

/// Unit tags understood by the model
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    /// Carbon mass
    PgC,
    /// Carbon mass flux
    PgCPerYear,
    /// Atmospheric CO2 mole fraction
    PpmvCO2,
    /// Radiative forcing
    WattsPerM2,
    /// Temperature (anomaly)
    DegC,
    Unitless,
}

impl Unit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::PgC => "PgC",
            Unit::PgCPerYear => "PgC/yr",
            Unit::PpmvCO2 => "ppmv CO2",
            Unit::WattsPerM2 => "W/m2",
            Unit::DegC => "degC",
            Unit::Unitless => "(unitless)",
        }
    }

    /// Parse a unit symbol.
    ///
    /// Whitespace is ignored and matching is case-insensitive, so `"PgC / yr"` and
    /// `"pgc/yr"` are equivalent.
    pub fn parse(input: &str) -> NboxResult<Self> {
        let normalized: String = input
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "pgc" | "gtc" => Ok(Unit::PgC),
            "pgc/yr" | "gtc/yr" => Ok(Unit::PgCPerYear),
            "ppmvco2" | "ppmv" | "ppm" => Ok(Unit::PpmvCO2),
            "w/m2" | "w/m^2" => Ok(Unit::WattsPerM2),
            "degc" | "k" => Ok(Unit::DegC),
            "" | "(unitless)" | "unitless" | "1" => Ok(Unit::Unitless),
            _ => Err(NboxError::Error(format!("Unknown unit '{}'", input))),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A value paired with its unit.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitVal {
    value: f64,
    unit: Unit,
}

impl UnitVal {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    pub fn zero(unit: Unit) -> Self {
        Self::new(0.0, unit)
    }

    /// Raw value, regardless of unit
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn units(&self) -> Unit {
        self.unit
    }

    /// Value in the requested unit, converting where a physical conversion exists
    pub fn value_in(&self, unit: Unit) -> NboxResult<f64> {
        self.convert_to(unit).map(|v| v.value)
    }

    /// Convert to a compatible unit
    pub fn convert_to(&self, unit: Unit) -> NboxResult<UnitVal> {
        let value = match (self.unit, unit) {
            (a, b) if a == b => self.value,
            (Unit::PgC, Unit::PpmvCO2) => self.value * PPMV_PER_PGC,
            (Unit::PpmvCO2, Unit::PgC) => self.value * PGC_PER_PPMV,
            (found, expected) => return Err(NboxError::UnitMismatch { expected, found }),
        };
        Ok(UnitVal::new(value, unit))
    }

    fn check_same(&self, other: &UnitVal) -> NboxResult<()> {
        if self.unit != other.unit {
            return Err(NboxError::UnitMismatch {
                expected: self.unit,
                found: other.unit,
            });
        }
        Ok(())
    }

    pub fn try_add(self, other: UnitVal) -> NboxResult<UnitVal> {
        self.check_same(&other)?;
        Ok(UnitVal::new(self.value + other.value, self.unit))
    }

    pub fn try_sub(self, other: UnitVal) -> NboxResult<UnitVal> {
        self.check_same(&other)?;
        Ok(UnitVal::new(self.value - other.value, self.unit))
    }

    /// Ratio of two values sharing a unit
    pub fn try_ratio(self, other: UnitVal) -> NboxResult<f64> {
        self.check_same(&other)?;
        Ok(self.value / other.value)
    }
}

impl Mul<f64> for UnitVal {
    type Output = UnitVal;

    fn mul(self, rhs: f64) -> Self::Output {
        UnitVal::new(self.value * rhs, self.unit)
    }
}

impl Div<f64> for UnitVal {
    type Output = UnitVal;

    fn div(self, rhs: f64) -> Self::Output {
        UnitVal::new(self.value / rhs, self.unit)
    }
}

impl Neg for UnitVal {
    type Output = UnitVal;

    fn neg(self) -> Self::Output {
        UnitVal::new(-self.value, self.unit)
    }
}

/// Values with different units are unordered
impl PartialOrd for UnitVal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.unit != other.unit {
            return None;
        }
        self.value.partial_cmp(&other.value)
    }
}

impl fmt::Display for UnitVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addition_requires_matching_units() {
        let a = UnitVal::new(1.0, Unit::PgC);
        let b = UnitVal::new(2.0, Unit::PgC);
        assert_eq!(a.try_add(b).unwrap(), UnitVal::new(3.0, Unit::PgC));
        assert_eq!(b.try_sub(a).unwrap().value(), 1.0);

        let err = a.try_add(UnitVal::new(1.0, Unit::PgCPerYear)).unwrap_err();
        assert!(matches!(
            err,
            NboxError::UnitMismatch {
                expected: Unit::PgC,
                found: Unit::PgCPerYear
            }
        ));
    }

    #[test]
    fn carbon_mass_converts_to_concentration() {
        let c = UnitVal::new(277.15, Unit::PpmvCO2);
        let mass = c.convert_to(Unit::PgC).unwrap();
        assert!((mass.value() - 277.15 * 2.1305).abs() < 1e-9);
        let back = mass.value_in(Unit::PpmvCO2).unwrap();
        assert!((back - 277.15).abs() < 1e-9);

        assert!(c.convert_to(Unit::WattsPerM2).is_err());
    }

    #[test]
    fn comparison_across_units_is_undefined() {
        let a = UnitVal::new(1.0, Unit::PgC);
        assert!(a < UnitVal::new(2.0, Unit::PgC));
        assert_eq!(a.partial_cmp(&UnitVal::new(2.0, Unit::DegC)), None);
    }

    #[test]
    fn scalar_arithmetic_keeps_unit() {
        let a = UnitVal::new(10.0, Unit::PgCPerYear);
        assert_eq!((a * 0.5).units(), Unit::PgCPerYear);
        assert_eq!((a / 4.0).value(), 2.5);
        assert_eq!((-a).value(), -10.0);
    }

    #[test]
    fn parse_symbols() {
        assert_eq!(Unit::parse("PgC / yr").unwrap(), Unit::PgCPerYear);
        assert_eq!(Unit::parse("ppmv CO2").unwrap(), Unit::PpmvCO2);
        assert_eq!(Unit::parse("W/m2").unwrap(), Unit::WattsPerM2);
        assert!(Unit::parse("furlongs").is_err());
    }
}
