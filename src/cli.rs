//! Command-Line Interface Module
//!
//! Handles argument parsing and validation for pvclearsky.

use clap::{ArgGroup, Parser};
use serde::Deserialize;

use crate::error::Result as PvResult;
use crate::geo;
use crate::output::OutputFormat;
use crate::sampling::Resolution;
use crate::solar_panel;

// ===================== CLI =====================

/// Theoretical clear-sky DC output of a fixed PV array
#[derive(Parser, Debug)]
#[command(author, version, about)]
#[command(group(ArgGroup::new("when").args(["now", "time", "timeframe"]).multiple(false)))]
pub struct Args {
    /// Site latitude in decimal degrees (-90 to 90)
    #[arg(long, allow_hyphen_values = true, value_parser = parse_latitude,
          required_unless_present = "show_build_info", env = "PVCLEARSKY_LATITUDE")]
    pub latitude: Option<f64>,
    /// Site longitude in decimal degrees (-180 to 180)
    #[arg(long, allow_hyphen_values = true, value_parser = parse_longitude,
          required_unless_present = "show_build_info", env = "PVCLEARSKY_LONGITUDE")]
    pub longitude: Option<f64>,
    /// Nameplate DC capacity in kW
    #[arg(long, value_parser = parse_capacity,
          required_unless_present = "show_build_info", env = "PVCLEARSKY_SYSTEM_CAPACITY")]
    pub system_capacity: Option<f64>,
    /// Panel tilt in degrees (0 = flat/horizontal, 90 = vertical)
    #[arg(long, value_parser = parse_tilt,
          required_unless_present = "show_build_info", env = "PVCLEARSKY_PANEL_TILT")]
    pub panel_tilt: Option<f64>,
    /// Panel azimuth in degrees clockwise from north (180 = south)
    #[arg(long, value_parser = parse_azimuth,
          required_unless_present = "show_build_info", env = "PVCLEARSKY_PANEL_AZIMUTH")]
    pub panel_azimuth: Option<f64>,

    /// Time zone to use ("system", "location", "UTC", or IANA time zone name)
    #[arg(long, default_value = "system", env = "PVCLEARSKY_TIMEZONE")]
    pub timezone: String,
    /// Short name added as a label to prometheus output
    #[arg(long, env = "PVCLEARSKY_SHORTNAME")]
    pub shortname: Option<String>,

    /// Estimate for the current time
    #[arg(long, required_unless_present_any = ["time", "timeframe", "show_build_info"])]
    pub now: bool,
    /// Estimate for a specific time ("YYYY-MM-DD HH:MM" or "now")
    #[arg(long, required_unless_present_any = ["now", "timeframe", "show_build_info"])]
    pub time: Option<String>,
    /// Estimate over whole days ("YYYY-MM-DD:YYYY-MM-DD", natural dates like "today" allowed)
    #[arg(long, required_unless_present_any = ["now", "time", "show_build_info"])]
    pub timeframe: Option<String>,
    /// Sampling step for --timeframe
    #[arg(long, value_enum, default_value = "1H", conflicts_with_all = ["now", "time"])]
    pub resolution: Resolution,

    /// Output format
    #[arg(long, value_enum, default_value = "table", env = "PVCLEARSKY_FORMAT")]
    pub format: OutputFormat,

    // ===================== ATMOSPHERE & LOSSES =====================
    /// Site altitude above mean sea level in meters (-500 to 11000)
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true, value_parser = parse_altitude,
          env = "PVCLEARSKY_ALTITUDE")]
    pub altitude: f64,
    /// Linke turbidity factor for the clear-sky model (2-7 typical, 3.5 = average rural)
    #[arg(long, default_value_t = 3.5, value_parser = parse_turbidity, env = "PVCLEARSKY_LINKE_TURBIDITY")]
    pub linke_turbidity: f64,
    /// Ground albedo for reflected radiation (0.0-1.0, 0.2 = grass, 0.8 = snow)
    #[arg(long, default_value_t = 0.2, value_parser = parse_albedo, env = "PVCLEARSKY_ALBEDO")]
    pub albedo: f64,
    /// Lumped system loss factor applied to DC output (0 < derate <= 1)
    #[arg(long, default_value_t = 1.0, value_parser = parse_derate, env = "PVCLEARSKY_DERATE")]
    pub derate: f64,

    /// Log resolved configuration and sampling details to stderr
    #[arg(short, long)]
    pub verbose: bool,
    /// Show build info from Cargo.lock at time of building
    #[arg(long)]
    pub show_build_info: bool,
}

// Define the structure to match what we serialized in build.rs
#[derive(Debug, Deserialize)]
pub struct DepInfo {
    pub name: String,
    pub version: String,
    pub checksum: Option<String>,
    pub source: Option<String>,
}

// ===================== CLI VALUE PARSERS =====================

fn validated(s: &str, validate: fn(f64) -> PvResult<f64>) -> Result<f64, String> {
    let v: f64 = s.trim().parse().map_err(|_| format!("Invalid number: {}", s))?;
    validate(v).map_err(|e| e.to_string())
}

fn parse_latitude(s: &str) -> Result<f64, String> {
    validated(s, geo::validate_latitude)
}

fn parse_longitude(s: &str) -> Result<f64, String> {
    validated(s, geo::validate_longitude)
}

fn parse_altitude(s: &str) -> Result<f64, String> {
    validated(s, geo::validate_altitude)
}

fn parse_capacity(s: &str) -> Result<f64, String> {
    validated(s, solar_panel::validate_capacity)
}

fn parse_tilt(s: &str) -> Result<f64, String> {
    validated(s, solar_panel::validate_tilt)
}

fn parse_azimuth(s: &str) -> Result<f64, String> {
    validated(s, solar_panel::validate_azimuth)
}

fn parse_turbidity(s: &str) -> Result<f64, String> {
    validated(s, solar_panel::validate_turbidity)
}

fn parse_albedo(s: &str) -> Result<f64, String> {
    validated(s, solar_panel::validate_albedo)
}

fn parse_derate(s: &str) -> Result<f64, String> {
    validated(s, solar_panel::validate_derate)
}

// ===================== TESTS =====================
