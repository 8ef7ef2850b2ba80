//! Solar Position Calculation Module
//!
//! Closed-form NOAA solar position (after Meeus, "Astronomical Algorithms").
//! Apparent zenith includes the NOAA atmospheric refraction correction; the
//! result agrees with NREL SPA to a few hundredths of a degree between 1900
//! and 2100, which is far below the sensitivity of the irradiance model.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Offset, TimeZone, Timelike, Utc};

use crate::error::Result;
use crate::geo::{Location, validate_latitude, validate_longitude};

// ===================== CONSTANTS =====================

/// Julian day of the Unix epoch (1970-01-01T00:00:00Z)
const JD_UNIX_EPOCH: f64 = 2_440_587.5;

/// Julian day of the J2000.0 epoch
const JD_J2000: f64 = 2_451_545.0;

const DAYS_PER_JULIAN_CENTURY: f64 = 36_525.0;

// ===================== TYPES =====================

/// Sun position seen from a location at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarPosition {
    /// Apparent (refraction-corrected) zenith angle in degrees, 0 = overhead
    pub zenith: f64,
    /// Azimuth in degrees clockwise from north
    pub azimuth: f64,
    /// Solar declination in degrees
    pub declination: f64,
    /// Hour angle in degrees, negative before solar noon
    pub hour_angle: f64,
}

impl SolarPosition {
    pub fn elevation_angle(&self) -> f64 {
        90.0 - self.zenith
    }

    /// True when the apparent sun disc centre is above the horizon.
    pub fn is_sun_up(&self) -> bool {
        self.zenith < 90.0
    }
}

// ===================== TIME SCALES =====================

/// Julian day (UT) of an instant, including the sub-second part.
fn julian_day(instant: DateTime<Utc>) -> f64 {
    let seconds = instant.timestamp() as f64 + f64::from(instant.timestamp_subsec_nanos()) * 1e-9;
    seconds / 86_400.0 + JD_UNIX_EPOCH
}

fn julian_century(jd: f64) -> f64 {
    (jd - JD_J2000) / DAYS_PER_JULIAN_CENTURY
}

// ===================== SUN ORBIT =====================

/// Geometric mean longitude of the sun in degrees, 0..360
fn mean_longitude(t: f64) -> f64 {
    (280.46646 + t * (36000.76983 + t * 0.0003032)).rem_euclid(360.0)
}

/// Geometric mean anomaly of the sun in degrees
fn mean_anomaly(t: f64) -> f64 {
    357.52911 + t * (35999.05029 - t * 0.0001537)
}

fn orbit_eccentricity(t: f64) -> f64 {
    0.016708634 - t * (0.000042037 + t * 0.0000001267)
}

/// Equation of the centre in degrees
fn equation_of_center(t: f64) -> f64 {
    let m = mean_anomaly(t).to_radians();
    m.sin() * (1.914602 - t * (0.004817 + 0.000014 * t))
        + (2.0 * m).sin() * (0.019993 - 0.000101 * t)
        + (3.0 * m).sin() * 0.000289
}

/// Longitude of the ascending node of the lunar orbit, used for nutation terms
fn omega(t: f64) -> f64 {
    125.04 - 1934.136 * t
}

/// Apparent ecliptic longitude in degrees (nutation and aberration applied)
fn apparent_longitude(t: f64) -> f64 {
    let true_longitude = mean_longitude(t) + equation_of_center(t);
    true_longitude - 0.00569 - 0.00478 * omega(t).to_radians().sin()
}

/// Obliquity of the ecliptic corrected for nutation, degrees
fn obliquity(t: f64) -> f64 {
    let seconds = 21.448 - t * (46.815 + t * (0.00059 - t * 0.001813));
    let mean = 23.0 + (26.0 + seconds / 60.0) / 60.0;
    mean + 0.00256 * omega(t).to_radians().cos()
}

/// Solar declination in degrees
fn declination(t: f64) -> f64 {
    let eps = obliquity(t).to_radians();
    let lambda = apparent_longitude(t).to_radians();
    (eps.sin() * lambda.sin()).asin().to_degrees()
}

/// Apparent minus mean solar time, in minutes
fn equation_of_time(t: f64) -> f64 {
    let eps = obliquity(t).to_radians();
    let l0 = mean_longitude(t).to_radians();
    let e = orbit_eccentricity(t);
    let m = mean_anomaly(t).to_radians();
    let y = (eps / 2.0).tan().powi(2);

    let eot = y * (2.0 * l0).sin() - 2.0 * e * m.sin() + 4.0 * e * y * m.sin() * (2.0 * l0).cos()
        - 0.5 * y * y * (4.0 * l0).sin()
        - 1.25 * e * e * (2.0 * m).sin();
    4.0 * eot.to_degrees()
}

// ===================== REFRACTION =====================

/// Atmospheric refraction in degrees for a geometric elevation (NOAA fit).
///
/// Standard atmosphere; the correction vanishes above 85° elevation.
pub fn refraction_correction(elevation_deg: f64) -> f64 {
    if elevation_deg > 85.0 {
        return 0.0;
    }
    let te = elevation_deg.to_radians().tan();
    let arcsec = if elevation_deg > 5.0 {
        58.1 / te - 0.07 / te.powi(3) + 0.000086 / te.powi(5)
    } else if elevation_deg > -0.575 {
        let e = elevation_deg;
        1735.0 + e * (-518.2 + e * (103.4 + e * (-12.79 + e * 0.711)))
    } else {
        -20.772 / te
    };
    arcsec / 3600.0
}

// ===================== POSITION =====================

/// Compute the apparent sun position for a location at a UTC instant.
///
/// # Arguments
/// * `location` - Observer location
/// * `instant` - Absolute time of the observation
///
/// # Errors
/// Returns `PvError::InvalidInput` if the location carries coordinates
/// outside the geographic range.
pub fn position(location: &Location, instant: DateTime<Utc>) -> Result<SolarPosition> {
    let lat = validate_latitude(location.latitude)?;
    let lon = validate_longitude(location.longitude)?;

    let t = julian_century(julian_day(instant));
    let decl = declination(t);
    let eot = equation_of_time(t);

    let utc_minutes = f64::from(instant.num_seconds_from_midnight()) / 60.0
        + f64::from(instant.nanosecond() % 1_000_000_000) * 1e-9 / 60.0;
    let true_solar_time = (utc_minutes + eot + 4.0 * lon).rem_euclid(1440.0);
    let hour_angle = true_solar_time / 4.0 - 180.0;

    let phi = lat.to_radians();
    let delta = decl.to_radians();
    let h = hour_angle.to_radians();

    let cos_zenith = phi.sin() * delta.sin() + phi.cos() * delta.cos() * h.cos();
    let geometric_zenith = cos_zenith.clamp(-1.0, 1.0).acos().to_degrees();

    // Measured from north, clockwise; atan2 keeps the poles well defined.
    let azimuth = (h.sin().atan2(h.cos() * phi.sin() - delta.tan() * phi.cos()).to_degrees()
        + 180.0)
        .rem_euclid(360.0);

    let zenith = geometric_zenith - refraction_correction(90.0 - geometric_zenith);

    Ok(SolarPosition { zenith, azimuth, declination: decl, hour_angle })
}

/// UTC instant of apparent solar noon (hour angle zero) on a UTC calendar date.
///
/// The equation of time is re-evaluated at each estimate; three passes
/// converge well below one second.
pub fn solar_noon(location: &Location, date: NaiveDate) -> DateTime<Utc> {
    let midnight = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
    let offset = |minutes: f64| midnight + Duration::milliseconds((minutes * 60_000.0).round() as i64);

    let mut minutes = 720.0 - 4.0 * location.longitude;
    for _ in 0..3 {
        let t = julian_century(julian_day(offset(minutes)));
        minutes = 720.0 - 4.0 * location.longitude - equation_of_time(t);
    }
    offset(minutes)
}

/// Apparent solar noon on the local calendar day of `instant`, in its zone.
///
/// The local date is mapped to the UTC date holding local midday, so zones
/// far from their meridian (UTC+13 in Samoa) still land on the same day.
pub fn solar_noon_on_local_day<T: TimeZone>(location: &Location, instant: &DateTime<T>) -> DateTime<T> {
    let utc_offset = Duration::seconds(i64::from(instant.offset().fix().local_minus_utc()));
    let local_midday = instant.date_naive().and_time(NaiveTime::MIN) + Duration::hours(12);
    let utc_date = (local_midday - utc_offset).date();
    solar_noon(location, utc_date).with_timezone(&instant.timezone())
}

// ===================== TESTS =====================
