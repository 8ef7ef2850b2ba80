//! Clear-Sky Irradiance Model
//!
//! Ineichen-Perez clear-sky irradiance driven by the Linke turbidity factor.
//!
//! DNI uses the Ineichen beam formula. Global irradiance uses the Ineichen
//! form without the empirical `exp(0.01 * AM^1.8)` horizon term, which makes
//! GHI rise again for zenith angles beyond ~88°. Relative air mass is floored
//! at 1.0 because the Kasten-Young fit dips just below 1 near the zenith.
//! Together this keeps DNI, DHI and GHI non-increasing in the zenith angle,
//! and DHI is defined as the remainder so that `GHI = DNI * cos(Z) + DHI`.
//!
//! References:
//! - Ineichen, P. and Perez, R. (2002). "A new airmass independent formulation
//!   for the Linke turbidity coefficient"
//! - Kasten, F. and Young, A. T. (1989). "Revised optical air mass tables and
//!   approximation formula"
//! - Spencer, J. W. (1971). "Fourier series representation of the position of
//!   the sun"

use std::f64::consts::PI;

use crate::geo::{MAX_ALTITUDE_M, MIN_ALTITUDE_M};
use crate::solar::SolarPosition;

// ===================== CONSTANTS =====================

/// Solar constant (Total Solar Irradiance) in W/m²
/// Latest value from SORCE/TIM measurements
pub const SOLAR_CONSTANT: f64 = 1361.0;

/// Default Linke turbidity factor
/// Typical values: 2-3 for very clear, 4-6 for industrial areas
pub const DEFAULT_LINKE_TURBIDITY: f64 = 3.5;

// ===================== RESULT =====================

/// Clear-sky irradiance components on a horizontal surface, W/m².
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClearSkyIrradiance {
    /// Global Horizontal Irradiance
    pub ghi: f64,
    /// Direct Normal Irradiance
    pub dni: f64,
    /// Diffuse Horizontal Irradiance
    pub dhi: f64,
}

impl ClearSkyIrradiance {
    pub const NIGHT: Self = Self { ghi: 0.0, dni: 0.0, dhi: 0.0 };
}

// ===================== ATMOSPHERE =====================

/// Atmosphere above the site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Atmosphere {
    /// Site altitude in meters
    pub altitude_m: f64,
    /// Linke turbidity factor (1 = clean dry atmosphere)
    pub linke_turbidity: f64,
}

impl Default for Atmosphere {
    fn default() -> Self {
        Self { altitude_m: 0.0, linke_turbidity: DEFAULT_LINKE_TURBIDITY }
    }
}

/// Calculate absolute air mass (pressure-corrected)
///
/// Kasten-Young (1989) relative air mass floored at 1.0, scaled by the
/// International Standard Atmosphere pressure ratio. Returns infinity when
/// the sun is at or below the horizon.
pub fn air_mass(zenith_deg: f64, altitude_m: f64) -> f64 {
    if zenith_deg >= 90.0 {
        return f64::INFINITY;
    }

    let zenith_rad = zenith_deg.to_radians();
    let am_relative =
        (1.0 / (zenith_rad.cos() + 0.50572 * (96.07995 - zenith_deg).powf(-1.6364))).max(1.0);

    // P/P0 = (1 - 2.25577e-5 * h)^5.25588, valid in the troposphere
    let pressure_ratio =
        if altitude_m.abs() < 1e-5 { 1.0 } else { (1.0 - 2.25577e-5 * altitude_m).powf(5.25588) };

    am_relative * pressure_ratio
}

/// Calculate extraterrestrial irradiance corrected for Earth-Sun distance
///
/// Uses Spencer (1971) formula for orbital eccentricity correction
///
/// # Arguments
/// * `day_of_year` - Day of year (1-366)
///
/// # Returns
/// Extraterrestrial irradiance in W/m²
pub fn extraterrestrial_irradiance(day_of_year: u32) -> f64 {
    let b = 2.0 * PI * (f64::from(day_of_year) - 1.0) / 365.0;

    let eccentricity_correction = 1.000110
        + 0.034221 * b.cos()
        + 0.001280 * b.sin()
        + 0.000719 * (2.0 * b).cos()
        + 0.000077 * (2.0 * b).sin();

    SOLAR_CONSTANT * eccentricity_correction
}

// ===================== CLEAR SKY =====================

/// Clear-sky irradiance for a solar position.
///
/// # Arguments
/// * `position` - Apparent solar position
/// * `day_of_year` - Day of year (1-366) of the instant, in UTC
/// * `atmosphere` - Site altitude and turbidity
///
/// # Returns
/// All-zero irradiance when the sun is at or below the horizon
pub fn clear_sky(
    position: &SolarPosition,
    day_of_year: u32,
    atmosphere: &Atmosphere,
) -> ClearSkyIrradiance {
    if !position.is_sun_up() {
        return ClearSkyIrradiance::NIGHT;
    }

    let am = air_mass(position.zenith, atmosphere.altitude_m);
    if !am.is_finite() || am <= 0.0 {
        return ClearSkyIrradiance::NIGHT;
    }

    let i0 = extraterrestrial_irradiance(day_of_year);
    let cos_zenith = position.zenith.to_radians().cos().max(0.0);

    // Coefficients are only fitted inside the ISA troposphere
    let alt = atmosphere.altitude_m.clamp(MIN_ALTITUDE_M, MAX_ALTITUDE_M);
    let tl = atmosphere.linke_turbidity.max(1.0);

    // Altitude correction coefficients (Ineichen 2002)
    let fh1 = (-alt / 8000.0).exp();
    let fh2 = (-alt / 1250.0).exp();
    let cg1 = 5.09e-5 * alt + 0.868;
    let cg2 = 3.92e-5 * alt + 0.0387;

    let b = 0.664 + 0.163 / fh1;
    let dni = (b * i0 * (-0.09 * am * (tl - 1.0)).exp()).clamp(0.0, i0);

    let ghi_model = (cg1 * i0 * cos_zenith * (-cg2 * am * (fh1 + fh2 * (tl - 1.0))).exp()).max(0.0);

    // The beam can never deliver more than the global total
    let direct_horizontal = dni * cos_zenith;
    let ghi = ghi_model.max(direct_horizontal);
    let dhi = (ghi - direct_horizontal).max(0.0);

    ClearSkyIrradiance { ghi, dni, dhi }
}

// ===================== TESTS =====================
