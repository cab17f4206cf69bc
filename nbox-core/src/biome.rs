//! Biome-indexed values and their histories.
//!
//! The land surface is partitioned into named biomes. Per-biome pools and parameters are
//! held in a [`BiomeMap`]; time-varying per-biome state is a [`TimeSeries`] whose samples are
//! `BiomeMap`s. Adding, removing or renaming a biome rewrites every stored sample so the
//! history always shares the current biome set.

use crate::errors::{NboxError, NboxResult};
use crate::timeseries::{Interpolate, TimeSeries};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the single biome used when no partitioning has been configured
pub const DEFAULT_BIOME: &str = "global";

/// Separator between a biome and a variable name, e.g. `forest.veg_c`
pub const BIOME_SEPARATOR: char = '.';

/// Split a possibly biome-qualified variable name into `(biome, variable)`
///
/// Plain names resolve to [`DEFAULT_BIOME`].
/// At most one separator is allowed.
pub fn split_biome_name(name: &str) -> NboxResult<(Option<&str>, &str)> {
    let mut parts = name.split(BIOME_SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(var), None, _) => Ok((None, var)),
        (Some(biome), Some(var), None) => Ok((Some(biome), var)),
        _ => Err(NboxError::Error(format!(
            "'{}': max of one separator allowed in variable names",
            name
        ))),
    }
}

/// A mapping from biome name onto a value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BiomeMap<V> {
    values: BTreeMap<String, V>,
}

impl<V> Default for BiomeMap<V> {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }
}

impl<V> BiomeMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn missing(biome: &str) -> NboxError {
        NboxError::BiomeConflict(format!("Biome '{}' missing from biome map", biome))
    }

    pub fn get(&self, biome: &str) -> NboxResult<&V> {
        self.values.get(biome).ok_or_else(|| Self::missing(biome))
    }

    pub fn get_mut(&mut self, biome: &str) -> NboxResult<&mut V> {
        self.values.get_mut(biome).ok_or_else(|| Self::missing(biome))
    }

    pub fn insert(&mut self, biome: &str, value: V) -> Option<V> {
        self.values.insert(biome.to_string(), value)
    }

    pub fn remove(&mut self, biome: &str) -> Option<V> {
        self.values.remove(biome)
    }

    pub fn contains(&self, biome: &str) -> bool {
        self.values.contains_key(biome)
    }

    /// Move the value stored under `old` to `new`
    pub fn rename(&mut self, old: &str, new: &str) -> NboxResult<()> {
        if self.values.contains_key(new) {
            return Err(NboxError::BiomeConflict(format!(
                "Biome '{}' already exists",
                new
            )));
        }
        let value = self.values.remove(old).ok_or_else(|| Self::missing(old))?;
        self.values.insert(new.to_string(), value);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &V)> {
        self.values.iter()
    }

    /// True if the map holds exactly the biomes in `biomes`
    pub fn matches_biomes(&self, biomes: &[String]) -> bool {
        self.values.len() == biomes.len() && biomes.iter().all(|b| self.values.contains_key(b))
    }
}

impl BiomeMap<f64> {
    /// Sum of all values in the map
    pub fn sum(&self) -> f64 {
        self.values.values().sum()
    }
}

impl<V: Clone> FromIterator<(String, V)> for BiomeMap<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl<V: Interpolate> Interpolate for BiomeMap<V> {
    fn interpolate(lower: &Self, upper: &Self, frac: f64) -> NboxResult<Self> {
        if lower.values.len() != upper.values.len() {
            return Err(NboxError::BiomeConflict(
                "Cannot interpolate between samples with different biomes".to_string(),
            ));
        }
        lower
            .values
            .iter()
            .map(|(biome, lo)| {
                let hi = upper.get(biome)?;
                Ok((biome.clone(), V::interpolate(lo, hi, frac)?))
            })
            .collect()
    }
}

impl<V: Clone> TimeSeries<BiomeMap<V>> {
    /// Add `biome` with value `fill` to every stored sample
    pub fn add_biome(&mut self, biome: &str, fill: V) -> NboxResult<()> {
        self.try_map_values(|sample| {
            if sample.contains(biome) {
                return Err(NboxError::BiomeConflict(format!(
                    "Biome '{}' already present in history",
                    biome
                )));
            }
            let mut updated = sample.clone();
            updated.insert(biome, fill.clone());
            Ok(updated)
        })
    }

    /// Drop `biome` from every stored sample
    pub fn remove_biome(&mut self, biome: &str) -> NboxResult<()> {
        self.try_map_values(|sample| {
            let mut updated = sample.clone();
            updated.remove(biome);
            Ok(updated)
        })
    }

    /// Re-key `old` as `new` in every stored sample
    pub fn rename_biome(&mut self, old: &str, new: &str) -> NboxResult<()> {
        self.try_map_values(|sample| {
            let mut updated = sample.clone();
            updated.rename(old, new)?;
            Ok(updated)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pools(forest: f64, grass: f64) -> BiomeMap<f64> {
        [("forest".to_string(), forest), ("grass".to_string(), grass)]
            .into_iter()
            .collect()
    }

    #[test]
    fn split_names() {
        assert_eq!(split_biome_name("veg_c").unwrap(), (None, "veg_c"));
        assert_eq!(
            split_biome_name("forest.veg_c").unwrap(),
            (Some("forest"), "veg_c")
        );
        assert!(split_biome_name("a.b.c").is_err());
    }

    #[test]
    fn missing_biome_is_a_conflict() {
        let map = pools(1.0, 2.0);
        assert_eq!(*map.get("forest").unwrap(), 1.0);
        assert!(matches!(
            map.get("tundra"),
            Err(NboxError::BiomeConflict(_))
        ));
        assert_eq!(map.sum(), 3.0);
    }

    #[test]
    fn rename_rejects_existing_target() {
        let mut map = pools(1.0, 2.0);
        assert!(map.rename("forest", "grass").is_err());
        map.rename("forest", "boreal").unwrap();
        assert!(map.contains("boreal"));
        assert!(!map.contains("forest"));
        assert!(map.matches_biomes(&["boreal".to_string(), "grass".to_string()]));
    }

    #[test]
    fn history_follows_biome_changes() {
        let mut ts: TimeSeries<BiomeMap<f64>> = TimeSeries::interpolated("veg_c");
        ts.set(2000.0, pools(1.0, 2.0));
        ts.set(2001.0, pools(3.0, 4.0));

        ts.add_biome("tundra", 0.0).unwrap();
        assert_eq!(*ts.get(2000.0).unwrap().get("tundra").unwrap(), 0.0);
        assert!(ts.add_biome("tundra", 0.0).is_err());

        ts.rename_biome("forest", "boreal").unwrap();
        let sample = ts.get(2001.0).unwrap();
        assert_eq!(*sample.get("boreal").unwrap(), 3.0);
        assert!(!sample.contains("forest"));

        ts.remove_biome("grass").unwrap();
        assert_eq!(ts.get(2000.0).unwrap().len(), 2);

        let mid = ts.get(2000.5).unwrap();
        assert!((mid.get("boreal").unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn failed_rename_leaves_history_untouched() {
        let mut ts: TimeSeries<BiomeMap<f64>> = TimeSeries::new("soil_c");
        ts.set(2000.0, pools(1.0, 2.0));
        let before = ts.clone();
        assert!(ts.rename_biome("tundra", "boreal").is_err());
        assert_eq!(ts, before);
    }
}
