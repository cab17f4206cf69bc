pub mod ocean;
pub mod simple_nbox;
pub mod temperature;

pub use ocean::OceanCarbon;
pub use simple_nbox::{CarbonSnapshot, SimpleNbox, MB_EPSILON};
pub use temperature::PrescribedTemperature;
