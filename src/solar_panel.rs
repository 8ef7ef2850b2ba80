//! Solar Panel Output Calculations
//!
//! Plane-of-array transposition (isotropic sky) and capacity-scaled DC power
//! for a fixed array, plus the per-instant pipeline tying position, clear-sky
//! irradiance, transposition and power together.
//!
//! No cell temperature derating is modeled: output at 1000 W/m² equals the
//! nameplate capacity times the derating factor regardless of temperature.

use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;

use crate::clearsky::{self, Atmosphere, ClearSkyIrradiance};
use crate::error::{PvError, Result};
use crate::geo::{self, Location, check_range};
use crate::solar::{self, SolarPosition};

// ===================== CONSTANTS =====================

/// Default ground albedo (typical grass/soil)
pub const DEFAULT_ALBEDO: f64 = 0.2;

/// Irradiance at Standard Test Conditions in W/m²
pub const STC_IRRADIANCE: f64 = 1000.0;

// ===================== CONFIGURATION =====================

/// Mounting orientation of a fixed array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelGeometry {
    /// Tilt from horizontal in degrees (0 = flat, 90 = vertical)
    pub tilt_deg: f64,
    /// Facing direction in degrees clockwise from north (180 = south)
    pub azimuth_deg: f64,
}

impl PanelGeometry {
    pub fn new(tilt_deg: f64, azimuth_deg: f64) -> Result<Self> {
        Ok(Self {
            tilt_deg: validate_tilt(tilt_deg)?,
            azimuth_deg: validate_azimuth(azimuth_deg)?,
        })
    }
}

/// Electrical rating of the array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemSpec {
    /// Nameplate DC capacity in kW
    pub capacity_kw: f64,
    /// Lumped loss factor applied to the STC-scaled output (1.0 = lossless)
    pub derate: f64,
}

impl SystemSpec {
    pub fn new(capacity_kw: f64) -> Result<Self> {
        Ok(Self { capacity_kw: validate_capacity(capacity_kw)?, derate: 1.0 })
    }

    pub fn with_derate(mut self, derate: f64) -> Result<Self> {
        self.derate = validate_derate(derate)?;
        Ok(self)
    }
}

/// Everything the pipeline needs to evaluate one site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PvSystem {
    pub location: Location,
    pub geometry: PanelGeometry,
    pub spec: SystemSpec,
    pub atmosphere: Atmosphere,
    /// Ground reflectance (0.0 - 1.0)
    pub albedo: f64,
}

impl PvSystem {
    pub fn new(location: Location, geometry: PanelGeometry, spec: SystemSpec) -> Self {
        Self {
            location,
            geometry,
            spec,
            atmosphere: Atmosphere { altitude_m: location.altitude, ..Atmosphere::default() },
            albedo: DEFAULT_ALBEDO,
        }
    }

    pub fn with_linke_turbidity(mut self, linke_turbidity: f64) -> Result<Self> {
        self.atmosphere.linke_turbidity = validate_turbidity(linke_turbidity)?;
        Ok(self)
    }

    pub fn with_albedo(mut self, albedo: f64) -> Result<Self> {
        self.albedo = validate_albedo(albedo)?;
        Ok(self)
    }

    /// Re-check every parameter, so that a hand-assembled system fails
    /// before any sample is computed.
    pub fn validate(&self) -> Result<()> {
        geo::validate_latitude(self.location.latitude)?;
        geo::validate_longitude(self.location.longitude)?;
        geo::validate_altitude(self.location.altitude)?;
        validate_tilt(self.geometry.tilt_deg)?;
        validate_azimuth(self.geometry.azimuth_deg)?;
        validate_capacity(self.spec.capacity_kw)?;
        validate_derate(self.spec.derate)?;
        validate_turbidity(self.atmosphere.linke_turbidity)?;
        validate_albedo(self.albedo)?;
        Ok(())
    }
}

// ===================== VALIDATION =====================

pub fn validate_tilt(tilt: f64) -> Result<f64> {
    check_range("panel tilt", tilt, 0.0, 90.0)
}

pub fn validate_azimuth(azimuth: f64) -> Result<f64> {
    check_range("panel azimuth", azimuth, 0.0, 360.0)
}

pub fn validate_capacity(capacity_kw: f64) -> Result<f64> {
    if !capacity_kw.is_finite() || capacity_kw <= 0.0 {
        return Err(PvError::invalid("system capacity", capacity_kw, "must be a positive number of kW"));
    }
    Ok(capacity_kw)
}

pub fn validate_derate(derate: f64) -> Result<f64> {
    if !derate.is_finite() || derate <= 0.0 || derate > 1.0 {
        return Err(PvError::invalid("derate", derate, "must be in (0, 1]"));
    }
    Ok(derate)
}

pub fn validate_turbidity(linke_turbidity: f64) -> Result<f64> {
    check_range("Linke turbidity", linke_turbidity, 1.0, 10.0)
}

pub fn validate_albedo(albedo: f64) -> Result<f64> {
    check_range("albedo", albedo, 0.0, 1.0)
}

// ===================== GEOMETRY =====================

/// Calculate angle of incidence between sun rays and panel normal
///
/// # Arguments
/// * `position` - Sun position (zenith 0 = overhead, azimuth clockwise from north)
/// * `geometry` - Panel tilt and facing direction
///
/// # Returns
/// Angle of incidence in degrees (0 = sun perpendicular to panel)
pub fn angle_of_incidence(position: &SolarPosition, geometry: &PanelGeometry) -> f64 {
    let zenith = position.zenith.to_radians();
    let tilt = geometry.tilt_deg.to_radians();
    let delta_az = (position.azimuth - geometry.azimuth_deg).to_radians();

    let cos_aoi = zenith.cos() * tilt.cos() + zenith.sin() * tilt.sin() * delta_az.cos();
    cos_aoi.clamp(-1.0, 1.0).acos().to_degrees()
}

// ===================== PLANE OF ARRAY IRRADIANCE =====================

/// Irradiance on the tilted plane, W/m².
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaneOfArray {
    /// Total plane-of-array irradiance
    pub poa: f64,
    /// Direct beam component
    pub beam: f64,
    /// Isotropic sky diffuse component
    pub sky_diffuse: f64,
    /// Ground reflected component
    pub ground_reflected: f64,
    /// Angle of incidence in degrees
    pub aoi_deg: f64,
}

/// Transpose horizontal clear-sky irradiance onto the panel plane.
///
/// Beam arriving from behind the panel contributes nothing. Sky diffuse
/// uses the isotropic view factor `(1 + cos β) / 2`, ground reflection
/// `(1 - cos β) / 2`.
pub fn plane_of_array(
    irradiance: &ClearSkyIrradiance,
    position: &SolarPosition,
    geometry: &PanelGeometry,
    albedo: f64,
) -> PlaneOfArray {
    let aoi_deg = angle_of_incidence(position, geometry);
    let cos_aoi = aoi_deg.to_radians().cos();
    let cos_tilt = geometry.tilt_deg.to_radians().cos();

    let beam = if cos_aoi > 0.0 && position.is_sun_up() { irradiance.dni * cos_aoi } else { 0.0 };
    let sky_diffuse = irradiance.dhi * (1.0 + cos_tilt) / 2.0;
    let ground_reflected = irradiance.ghi * albedo * (1.0 - cos_tilt) / 2.0;

    let poa = (beam + sky_diffuse + ground_reflected).max(0.0);

    PlaneOfArray { poa, beam, sky_diffuse, ground_reflected, aoi_deg }
}

// ===================== POWER OUTPUT =====================

/// DC power in kW for a plane-of-array irradiance.
///
/// Scales nameplate capacity linearly with irradiance relative to STC.
/// Sub-threshold values are returned as computed.
pub fn dc_power(poa: f64, spec: &SystemSpec) -> f64 {
    (spec.capacity_kw * (poa / STC_IRRADIANCE) * spec.derate).max(0.0)
}

/// Compact per-instant result handed to the formatters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerEstimate {
    pub timestamp: DateTime<Tz>,
    pub dc_power_kw: f64,
    pub poa_irradiance: f64,
    pub ghi: f64,
}

/// Full breakdown of one pipeline evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarPanelOutput {
    pub timestamp: DateTime<Tz>,
    pub position: SolarPosition,
    pub irradiance: ClearSkyIrradiance,
    pub plane: PlaneOfArray,
    /// Absolute air mass, infinite at night
    pub air_mass: f64,
    pub dc_power_kw: f64,
}

impl SolarPanelOutput {
    pub fn estimate(&self) -> PowerEstimate {
        PowerEstimate {
            timestamp: self.timestamp,
            dc_power_kw: self.dc_power_kw,
            poa_irradiance: self.plane.poa,
            ghi: self.irradiance.ghi,
        }
    }
}

/// Run the full pipeline for one instant.
///
/// # Errors
/// Fails only when the system carries out-of-range parameters.
pub fn calculate_output(system: &PvSystem, instant: DateTime<Tz>) -> Result<SolarPanelOutput> {
    let utc: DateTime<Utc> = instant.with_timezone(&Utc);

    let position = solar::position(&system.location, utc)?;
    let irradiance = clearsky::clear_sky(&position, utc.ordinal(), &system.atmosphere);
    let plane = plane_of_array(&irradiance, &position, &system.geometry, system.albedo);
    let dc_power_kw = dc_power(plane.poa, &system.spec);

    Ok(SolarPanelOutput {
        timestamp: instant,
        position,
        irradiance,
        plane,
        air_mass: clearsky::air_mass(position.zenith, system.atmosphere.altitude_m),
        dc_power_kw,
    })
}

/// Run the pipeline and keep only the compact estimate.
pub fn estimate(system: &PvSystem, instant: DateTime<Tz>) -> Result<PowerEstimate> {
    calculate_output(system, instant).map(|output| output.estimate())
}

// ===================== FORMATTING HELPERS =====================

/// Format energy for display
pub fn format_energy(kwh: f64) -> String {
    if kwh >= 1.0 { format!("{:.2} kWh", kwh) } else { format!("{:.1} Wh", kwh * 1000.0) }
}

/// Format irradiance for display
pub fn format_irradiance(w_per_m2: f64) -> String {
    format!("{:.0} W/m²", w_per_m2)
}

// ===================== TESTS =====================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone, Timelike};
    use chrono_tz::Europe::Sofia;

    fn sun(zenith: f64, azimuth: f64) -> SolarPosition {
        SolarPosition { zenith, azimuth, declination: 0.0, hour_angle: 0.0 }
    }

    fn sofia_system(capacity_kw: f64) -> PvSystem {
        PvSystem::new(
            Location::new(42.804, 23.378).unwrap(),
            PanelGeometry::new(22.0, 162.0).unwrap(),
            SystemSpec::new(capacity_kw).unwrap(),
        )
    }

    fn sofia_noon(date: NaiveDate) -> DateTime<Tz> {
        let loc = Location::new(42.804, 23.378).unwrap();
        solar::solar_noon(&loc, date).with_timezone(&Sofia)
    }

    #[test]
    fn test_angle_of_incidence() {
        // Sun directly overhead, flat panel: AOI = 0
        let flat = PanelGeometry::new(0.0, 180.0).unwrap();
        assert!(angle_of_incidence(&sun(0.0, 180.0), &flat).abs() < 0.1);

        // Sun at 45° zenith from south, panel tilted 45° facing south: AOI = 0
        let south_45 = PanelGeometry::new(45.0, 180.0).unwrap();
        assert!(angle_of_incidence(&sun(45.0, 180.0), &south_45).abs() < 0.1);

        // cos(AOI) = cos(45°)*cos(45°) + sin(45°)*sin(45°)*cos(90°) = 0.5 → AOI = 60°
        let aoi = angle_of_incidence(&sun(45.0, 90.0), &south_45);
        assert!((aoi - 60.0).abs() < 1e-6, "AOI was {}, expected 60°", aoi);

        // Sun behind panel (north), panel facing south: AOI >= 90°
        let behind = angle_of_incidence(&sun(45.0, 0.0), &south_45);
        assert!(behind >= 90.0 - 1e-9, "AOI was {}, expected >= 90°", behind);
    }

    #[test]
    fn test_poa_flat_panel_equals_ghi() {
        let flat = PanelGeometry::new(0.0, 180.0).unwrap();
        let position = sun(30.0, 150.0);
        let irr = clearsky::clear_sky(&position, 172, &Atmosphere::default());
        let plane = plane_of_array(&irr, &position, &flat, 0.2);

        assert!((plane.poa - irr.ghi).abs() < 1e-9, "POA {} vs GHI {}", plane.poa, irr.ghi);
        assert_eq!(plane.ground_reflected, 0.0);
    }

    #[test]
    fn test_poa_components() {
        let irr = ClearSkyIrradiance { ghi: 800.0, dni: 800.0, dhi: 100.0 };
        let vertical_south = PanelGeometry::new(90.0, 180.0).unwrap();
        let plane = plane_of_array(&irr, &sun(60.0, 180.0), &vertical_south, 0.25);

        // cos(AOI) = sin(60°) for a vertical wall facing the sun
        assert!((plane.beam - 800.0 * 60f64.to_radians().sin()).abs() < 1e-6);
        assert!((plane.sky_diffuse - 50.0).abs() < 1e-9);
        assert!((plane.ground_reflected - 100.0).abs() < 1e-9);
        let total = plane.beam + plane.sky_diffuse + plane.ground_reflected;
        assert!((plane.poa - total).abs() < 1e-12);
    }

    #[test]
    fn test_poa_sun_behind_panel_has_no_beam() {
        let irr = ClearSkyIrradiance { ghi: 500.0, dni: 700.0, dhi: 80.0 };
        let steep_south = PanelGeometry::new(80.0, 180.0).unwrap();
        let plane = plane_of_array(&irr, &sun(40.0, 10.0), &steep_south, 0.2);

        assert_eq!(plane.beam, 0.0);
        assert!(plane.poa > 0.0, "Diffuse light still reaches the panel");
    }

    #[test]
    fn test_dc_power_scaling() {
        let spec = SystemSpec::new(9.2).unwrap();
        assert!((dc_power(1000.0, &spec) - 9.2).abs() < 1e-12);
        assert!((dc_power(500.0, &spec) - 4.6).abs() < 1e-12);
        assert_eq!(dc_power(0.0, &spec), 0.0);
        assert_eq!(dc_power(-5.0, &spec), 0.0);

        let derated = spec.with_derate(0.86).unwrap();
        assert!((dc_power(1000.0, &derated) - 9.2 * 0.86).abs() < 1e-12);
    }

    #[test]
    fn test_dc_power_keeps_sub_threshold_values() {
        let spec = SystemSpec::new(1.0).unwrap();
        let p = dc_power(0.5, &spec);
        assert!(p > 0.0 && p < 0.001, "Sub-threshold output {} must not be floored", p);
    }

    #[test]
    fn test_doubling_capacity_doubles_power() {
        let date = NaiveDate::from_ymd_opt(2025, 5, 10).unwrap();
        for offset_h in [-4, -2, 0, 1, 3] {
            let t = sofia_noon(date) + Duration::hours(offset_h);
            let single = estimate(&sofia_system(9.2), t).unwrap();
            let double = estimate(&sofia_system(18.4), t).unwrap();
            assert_eq!(double.dc_power_kw, 2.0 * single.dc_power_kw);
            assert_eq!(double.poa_irradiance, single.poa_irradiance);
        }
    }

    #[test]
    fn test_pipeline_is_idempotent() {
        let system = sofia_system(9.2);
        let t = Sofia.with_ymd_and_hms(2025, 8, 3, 10, 47, 13).unwrap();
        let a = calculate_output(&system, t).unwrap();
        let b = calculate_output(&system, t).unwrap();
        assert_eq!(a.dc_power_kw.to_bits(), b.dc_power_kw.to_bits());
        assert_eq!(a.plane.poa.to_bits(), b.plane.poa.to_bits());
        assert_eq!(a.irradiance.ghi.to_bits(), b.irradiance.ghi.to_bits());
    }

    #[test]
    fn test_sofia_summer_noon_near_capacity() {
        let system = sofia_system(9.2);
        let noon = sofia_noon(NaiveDate::from_ymd_opt(2025, 6, 21).unwrap());
        let at_noon = estimate(&system, noon).unwrap();

        assert!(at_noon.dc_power_kw < 9.2, "Noon output {} exceeds nameplate", at_noon.dc_power_kw);
        assert!(at_noon.dc_power_kw > 8.0, "Noon output {} too low", at_noon.dc_power_kw);

        for hours in [-3, 3] {
            let other = estimate(&system, noon + Duration::hours(hours)).unwrap();
            assert!(
                at_noon.dc_power_kw > other.dc_power_kw,
                "Noon {} kW should beat {:+}h {} kW",
                at_noon.dc_power_kw,
                hours,
                other.dc_power_kw
            );
        }
    }

    #[test]
    fn test_sofia_one_hour_after_sunset_is_zero() {
        let system = sofia_system(9.2);
        let noon = sofia_noon(NaiveDate::from_ymd_opt(2025, 6, 21).unwrap());

        let mut t = noon;
        while calculate_output(&system, t).unwrap().position.is_sun_up() {
            t += Duration::minutes(1);
        }
        assert!(
            (20..=21).contains(&t.hour()),
            "Sofia solstice sunset should be ~21:00 local, got {}",
            t
        );

        let output = calculate_output(&system, t + Duration::hours(1)).unwrap();
        assert_eq!(output.dc_power_kw, 0.0);
        assert_eq!(output.plane.poa, 0.0);
        assert_eq!(output.irradiance, ClearSkyIrradiance::NIGHT);
        assert!(output.air_mass.is_infinite());
    }

    #[test]
    fn test_night_floor() {
        let system = sofia_system(9.2);
        let midnight = Sofia.with_ymd_and_hms(2025, 1, 15, 0, 30, 0).unwrap();
        let e = estimate(&system, midnight).unwrap();
        assert_eq!(e.dc_power_kw, 0.0);
        assert_eq!(e.poa_irradiance, 0.0);
        assert_eq!(e.ghi, 0.0);
    }

    #[test]
    fn test_validation_errors() {
        assert!(PanelGeometry::new(-1.0, 180.0).is_err());
        assert!(PanelGeometry::new(91.0, 180.0).is_err());
        assert!(PanelGeometry::new(30.0, 360.5).is_err());
        assert!(SystemSpec::new(0.0).is_err());
        assert!(SystemSpec::new(-3.0).is_err());
        assert!(SystemSpec::new(5.0).unwrap().with_derate(1.2).is_err());
        assert!(sofia_system(1.0).with_albedo(1.5).is_err());
        assert!(sofia_system(1.0).with_linke_turbidity(0.5).is_err());

        let mut broken = sofia_system(1.0);
        broken.geometry.tilt_deg = 120.0;
        assert!(matches!(
            broken.validate(),
            Err(PvError::InvalidInput { name: "panel tilt", .. })
        ));
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_energy(42.0), "42.00 kWh");
        assert_eq!(format_energy(0.5), "500.0 Wh");
        assert_eq!(format_irradiance(978.4), "978 W/m²");
    }
}
