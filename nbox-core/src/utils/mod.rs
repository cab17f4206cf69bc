//! Numerical utilities shared by components.

pub mod lognormal;
