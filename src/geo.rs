//! Geographic Location Module
//!
//! Observer coordinates and the range checks shared by every validated input.

use crate::error::{PvError, Result};

// ===================== CONSTANTS =====================

/// Lowest supported site altitude in meters (Dead Sea shore)
pub const MIN_ALTITUDE_M: f64 = -500.0;

/// Highest supported site altitude in meters (ISA troposphere limit)
pub const MAX_ALTITUDE_M: f64 = 11_000.0;

// ===================== VALIDATION =====================

/// Check that `value` is finite and inside `[min, max]`.
///
/// # Errors
/// Returns `PvError::InvalidInput` naming the offending parameter.
pub fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(PvError::invalid(name, value, "must be a finite number"));
    }
    if !(min..=max).contains(&value) {
        return Err(PvError::invalid(name, value, format!("must be between {} and {}", min, max)));
    }
    Ok(value)
}

pub fn validate_latitude(lat: f64) -> Result<f64> {
    check_range("latitude", lat, -90.0, 90.0)
}

pub fn validate_longitude(lon: f64) -> Result<f64> {
    check_range("longitude", lon, -180.0, 180.0)
}

pub fn validate_altitude(alt: f64) -> Result<f64> {
    check_range("altitude", alt, MIN_ALTITUDE_M, MAX_ALTITUDE_M)
}

// ===================== LOCATION =====================

/// Observer position on the WGS84 ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    /// Latitude in degrees, north positive
    pub latitude: f64,
    /// Longitude in degrees, east positive
    pub longitude: f64,
    /// Altitude above mean sea level in meters
    pub altitude: f64,
}

impl Location {
    /// Build a sea-level location.
    ///
    /// # Errors
    /// Fails when latitude or longitude is outside the geographic range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        Ok(Self {
            latitude: validate_latitude(latitude)?,
            longitude: validate_longitude(longitude)?,
            altitude: 0.0,
        })
    }

    pub fn with_altitude(mut self, altitude: f64) -> Result<Self> {
        self.altitude = validate_altitude(altitude)?;
        Ok(self)
    }
}

// ===================== TESTS =====================
