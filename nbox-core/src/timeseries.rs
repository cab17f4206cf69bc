//! Date-indexed series of model values.
//!
//! A [`TimeSeries`] maps dates onto values of any type that can be linearly interpolated.
//! Samples are kept ordered by date. Lookups at a stored date return that sample exactly;
//! other dates are resolved according to the series' interpolation policies.

use crate::errors::{NboxError, NboxResult};
use crate::units::UnitVal;
use is_close::is_close;
use serde::{Deserialize, Serialize};

pub type FloatValue = f64;
pub type Time = f64;

/// Values that can be linearly interpolated between two samples
pub trait Interpolate: Clone {
    /// Interpolate between `lower` and `upper` where `frac` is in [0, 1]
    fn interpolate(lower: &Self, upper: &Self, frac: f64) -> NboxResult<Self>;
}

impl Interpolate for FloatValue {
    fn interpolate(lower: &Self, upper: &Self, frac: f64) -> NboxResult<Self> {
        Ok(lower + (upper - lower) * frac)
    }
}

impl Interpolate for UnitVal {
    fn interpolate(lower: &Self, upper: &Self, frac: f64) -> NboxResult<Self> {
        let delta = upper.try_sub(*lower)?;
        lower.try_add(delta * frac)
    }
}

/// An ordered mapping from dates onto values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries<T> {
    /// Name used in error messages
    pub name: String,
    /// Linearly interpolate between the first and last stored dates
    allow_interp: bool,
    /// Clamp to the nearest endpoint for dates outside the stored range
    allow_partial_interp: bool,
    data: Vec<(Time, T)>,
}

impl<T> Default for TimeSeries<T> {
    fn default() -> Self {
        Self::new("unnamed")
    }
}

impl<T> TimeSeries<T> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            allow_interp: false,
            allow_partial_interp: false,
            data: Vec::new(),
        }
    }

    /// Create a named series that interpolates between stored dates
    pub fn interpolated(name: &str) -> Self {
        let mut ts = Self::new(name);
        ts.allow_interp(true);
        ts
    }

    pub fn allow_interp(&mut self, allow: bool) {
        self.allow_interp = allow;
    }

    pub fn allow_partial_interp(&mut self, allow: bool) {
        self.allow_partial_interp = allow;
    }

    fn position(&self, date: Time) -> Result<usize, usize> {
        self.data.binary_search_by(|(d, _)| {
            if is_close!(*d, date) {
                std::cmp::Ordering::Equal
            } else {
                d.total_cmp(&date)
            }
        })
    }

    /// Store a value at a date, replacing any existing sample at that date
    pub fn set(&mut self, date: Time, value: T) {
        match self.position(date) {
            Ok(idx) => self.data[idx].1 = value,
            Err(idx) => self.data.insert(idx, (date, value)),
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn first_date(&self) -> Option<Time> {
        self.data.first().map(|(d, _)| *d)
    }

    pub fn last_date(&self) -> Option<Time> {
        self.data.last().map(|(d, _)| *d)
    }

    /// Remove every sample after `date`
    ///
    /// Samples stored at `date` itself are kept.
    pub fn truncate(&mut self, date: Time) {
        let keep = match self.position(date) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        };
        self.data.truncate(keep);
    }

    pub fn dates(&self) -> impl Iterator<Item = Time> + '_ {
        self.data.iter().map(|(d, _)| *d)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Time, T)> {
        self.data.iter()
    }

    /// Apply a fallible transformation to every stored sample in place
    ///
    /// Either every sample is transformed or, on error, the series is left unchanged.
    pub fn try_map_values<F>(&mut self, mut f: F) -> NboxResult<()>
    where
        F: FnMut(&T) -> NboxResult<T>,
    {
        let updated = self
            .data
            .iter()
            .map(|(d, v)| f(v).map(|nv| (*d, nv)))
            .collect::<NboxResult<Vec<_>>>()?;
        self.data = updated;
        Ok(())
    }
}

impl<T: Interpolate> TimeSeries<T> {
    fn index_error(&self, date: Time) -> NboxError {
        NboxError::IndexError {
            name: self.name.clone(),
            date,
        }
    }

    /// Get the value at `date`
    ///
    /// Exact matches are returned as stored.
    /// Otherwise the value is interpolated if `allow_interp` is set and the date lies within
    /// the stored range, or clamped to the nearest endpoint if `allow_partial_interp` is set.
    pub fn get(&self, date: Time) -> NboxResult<T> {
        let (first, last) = match (self.data.first(), self.data.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(self.index_error(date)),
        };

        match self.position(date) {
            Ok(idx) => Ok(self.data[idx].1.clone()),
            Err(idx) => {
                if date < first.0 || date > last.0 {
                    if !self.allow_partial_interp {
                        return Err(self.index_error(date));
                    }
                    let nearest = if date < first.0 { first } else { last };
                    return Ok(nearest.1.clone());
                }
                if !self.allow_interp {
                    return Err(self.index_error(date));
                }
                // `date` sits strictly between samples idx-1 and idx
                let (d0, v0) = &self.data[idx - 1];
                let (d1, v1) = &self.data[idx];
                T::interpolate(v0, v1, (date - d0) / (d1 - d0))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Unit;

    fn emissions() -> TimeSeries<UnitVal> {
        let mut ts = TimeSeries::interpolated("emissions");
        ts.set(2000.0, UnitVal::new(10.0, Unit::PgCPerYear));
        ts.set(1990.0, UnitVal::new(0.0, Unit::PgCPerYear));
        ts
    }

    #[test]
    fn exact_and_interpolated_lookup() {
        let ts = emissions();
        assert_eq!(ts.first_date(), Some(1990.0));
        assert_eq!(ts.last_date(), Some(2000.0));
        assert_eq!(ts.get(2000.0).unwrap().value(), 10.0);
        assert!((ts.get(1995.0).unwrap().value() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn out_of_range_without_partial_interp_fails() {
        let ts = emissions();
        assert!(matches!(
            ts.get(2010.0),
            Err(NboxError::IndexError { .. })
        ));
    }

    #[test]
    fn partial_interp_clamps() {
        let mut ts = emissions();
        ts.allow_partial_interp(true);
        assert_eq!(ts.get(1900.0).unwrap().value(), 0.0);
        assert_eq!(ts.get(2100.0).unwrap().value(), 10.0);
    }

    #[test]
    fn no_interp_requires_exact_dates() {
        let mut ts: TimeSeries<FloatValue> = TimeSeries::new("exact");
        ts.set(1.0, 1.0);
        ts.set(3.0, 3.0);
        assert_eq!(ts.get(3.0).unwrap(), 3.0);
        assert!(ts.get(2.0).is_err());
    }

    #[test]
    fn empty_series_is_an_error() {
        let ts: TimeSeries<FloatValue> = TimeSeries::interpolated("empty");
        assert!(matches!(ts.get(0.0), Err(NboxError::IndexError { .. })));
    }

    #[test]
    fn set_replaces_existing_sample() {
        let mut ts = emissions();
        ts.set(2000.0, UnitVal::new(12.0, Unit::PgCPerYear));
        assert_eq!(ts.size(), 2);
        assert_eq!(ts.get(2000.0).unwrap().value(), 12.0);
    }

    #[test]
    fn truncate_is_idempotent() {
        let mut ts: TimeSeries<FloatValue> = TimeSeries::new("t");
        for year in 1990..=2000 {
            ts.set(year as Time, year as FloatValue);
        }
        ts.truncate(1995.0);
        assert_eq!(ts.last_date(), Some(1995.0));
        assert_eq!(ts.size(), 6);
        ts.truncate(1995.0);
        assert_eq!(ts.size(), 6);
        ts.truncate(1992.5);
        assert_eq!(ts.last_date(), Some(1992.0));
    }

    #[test]
    fn interpolating_mixed_units_fails() {
        let mut ts = TimeSeries::interpolated("mixed");
        ts.set(0.0, UnitVal::new(0.0, Unit::PgC));
        ts.set(1.0, UnitVal::new(1.0, Unit::DegC));
        assert!(matches!(
            ts.get(0.5),
            Err(NboxError::UnitMismatch { .. })
        ));
    }
}
