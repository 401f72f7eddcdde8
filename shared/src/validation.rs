//! Validation utilities for agricultural monitoring data
//!
//! These checks flag suspicious values in the source files. The loader
//! counts and logs failures; rows are never dropped because of them.

// ============================================================================
// Crop Monitoring Validations
// ============================================================================

/// Validate that an NDVI reading is within the index's [-1, 1] range
pub fn validate_ndvi(ndvi: f64) -> Result<(), &'static str> {
    if !ndvi.is_finite() || !(-1.0..=1.0).contains(&ndvi) {
        return Err("NDVI must be between -1 and 1");
    }
    Ok(())
}

/// Validate that a threshold band is well ordered
pub fn validate_thresholds(lower: f64, upper: f64) -> Result<(), &'static str> {
    if lower > upper {
        return Err("Lower threshold cannot exceed upper threshold");
    }
    Ok(())
}

/// Check whether an NDVI reading falls outside its threshold band
pub fn is_outside_thresholds(ndvi: f64, lower: f64, upper: f64) -> bool {
    ndvi < lower || ndvi > upper
}

// ============================================================================
// Yield Validations
// ============================================================================

/// Validate a yield figure in tonnes per hectare
pub fn validate_yield(tonnes_per_hectare: f64) -> Result<(), &'static str> {
    if !tonnes_per_hectare.is_finite() || tonnes_per_hectare < 0.0 {
        return Err("Yield cannot be negative");
    }
    Ok(())
}

/// Validate a production year
pub fn validate_year(year: i32) -> Result<(), &'static str> {
    if !(1900..=2200).contains(&year) {
        return Err("Year out of supported range");
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate a parcel identifier. Identifiers are opaque: only emptiness
/// is rejected, never the format.
pub fn validate_parcel_id(parcel_id: &str) -> Result<(), &'static str> {
    if parcel_id.trim().is_empty() {
        return Err("Parcel identifier cannot be empty");
    }
    Ok(())
}

/// Validate WGS84 coordinates
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), &'static str> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err("Latitude must be between -90 and 90");
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err("Longitude must be between -180 and 180");
    }
    Ok(())
}
