//! Standard datum names exchanged over the message bus.
//!
//! Components register capabilities and dependencies using these names, and configuration
//! sections address component inputs with them. Per-biome data may be qualified with a biome
//! prefix (e.g. `forest.veg_c`); the registry resolves the unqualified name.
//!
//! # Available data
//!
//! ## Atmosphere
//! - [`D_ATMOSPHERIC_CO2`] - atmospheric CO2 concentration in ppmv
//! - [`D_PREINDUSTRIAL_CO2`] - preindustrial CO2 concentration in ppmv
//! - [`D_ATMOSPHERIC_C`] - atmospheric carbon pool in PgC
//!
//! ## Land
//! - [`D_VEGC`], [`D_DETRITUSC`], [`D_SOILC`], [`D_PERMAFROSTC`] - land pools in PgC
//! - [`D_NPP`], [`D_RH`], [`D_RH_DETRITUS`], [`D_RH_SOIL`], [`D_RH_CH4`] - land fluxes in PgC / yr
//!
//! ## Ocean
//! - [`D_OCEAN_C`] - total ocean carbon in PgC
//! - [`D_OCEAN_CFLUX`] - atmosphere to ocean carbon flux in PgC / yr
//!
//! ## Climate
//! - [`D_GLOBAL_TEMP`] - global mean surface temperature anomaly in degC

// ============================================================================
// Atmosphere
// ============================================================================

pub const D_ATMOSPHERIC_CO2: &str = "Ca";
pub const D_PREINDUSTRIAL_CO2: &str = "C0";
pub const D_ATMOSPHERIC_C: &str = "atmos_c";
/// Carbon removed from the atmosphere to meet a concentration constraint
pub const D_ATMOSPHERIC_C_RESIDUAL: &str = "atmos_c_residual";
pub const D_CA_CONSTRAIN: &str = "Ca_constrain";

// ============================================================================
// Land pools and fluxes
// ============================================================================

pub const D_EARTHC: &str = "earth_c";
pub const D_VEGC: &str = "veg_c";
pub const D_DETRITUSC: &str = "detritus_c";
pub const D_SOILC: &str = "soil_c";
pub const D_PERMAFROSTC: &str = "permafrost_c";

pub const D_NPP_FLUX0: &str = "npp_flux0";
pub const D_NPP: &str = "npp";
pub const D_RH: &str = "rh";
pub const D_RH_DETRITUS: &str = "rh_detritus";
pub const D_RH_SOIL: &str = "rh_soil";
pub const D_RH_CH4: &str = "rh_ch4";
pub const D_LAND_CFLUX: &str = "atm_land_flux";
pub const D_F_FROZEN: &str = "f_frozen";

// ============================================================================
// Land parameters
// ============================================================================

pub const D_BETA: &str = "beta";
pub const D_Q10_RH: &str = "q10_rh";
pub const D_WARMINGFACTOR: &str = "warmingfactor";
pub const D_F_NPPV: &str = "f_nppv";
pub const D_F_NPPD: &str = "f_nppd";
pub const D_F_LITTERD: &str = "f_litterd";
pub const D_F_LUCV: &str = "f_lucv";
pub const D_F_LUCD: &str = "f_lucd";
pub const D_RH_CH4_FRAC: &str = "rh_ch4_frac";
pub const D_Q10_TEMPLAG: &str = "q10_templag";
pub const D_Q10_TEMPN: &str = "q10_tempn";

// Feedback factors
pub const D_CO2FERT: &str = "co2fert";
pub const D_TEMPFERTD: &str = "detritus_tempfert";
pub const D_TEMPFERTS: &str = "soil_tempfert";

// ============================================================================
// Drivers
// ============================================================================

pub const D_FFI_EMISSIONS: &str = "ffi_emissions";
pub const D_LUC_EMISSIONS: &str = "luc_emissions";
pub const D_RF_T_ALBEDO: &str = "Ftalbedo";

// ============================================================================
// Ocean
// ============================================================================

pub const D_OCEAN_C: &str = "ocean_c";
pub const D_OCEAN_CFLUX: &str = "atm_ocean_flux";
pub const D_OCEAN_SURFACE_C: &str = "ocean_surface_c";
pub const D_OCEAN_DEEP_C: &str = "ocean_deep_c";

// ============================================================================
// Climate
// ============================================================================

pub const D_GLOBAL_TEMP: &str = "Tgav";
