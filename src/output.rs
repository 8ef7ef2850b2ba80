//! Output Formatting Module
//!
//! Renders pipeline results as a plain-text table, JSON or a Prometheus
//! exposition line. Every renderer returns the text; printing is left to
//! `main`.

use clap::ValueEnum;
use serde::Serialize;

use crate::error::{PvError, Result};
use crate::sampling::Series;
use crate::solar;
use crate::solar_panel::{self, PowerEstimate, PvSystem, SolarPanelOutput};
use crate::time::format_timestamp;

/// Printed instead of a series when no sample produced power
pub const NO_PRODUCTION_MESSAGE: &str = "No significant production values in the specified timeframe.";

/// Prometheus metric name
pub const METRIC_NAME: &str = "theoretical_pv_kw";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Prometheus,
}

/// What is being rendered.
#[derive(Debug, Clone, Copy)]
pub enum Report<'a> {
    Instant(&'a SolarPanelOutput),
    Series(&'a Series),
}

/// Render a report in the requested format.
///
/// An empty series renders as [`NO_PRODUCTION_MESSAGE`] in every format.
pub fn render(
    report: Report<'_>,
    format: OutputFormat,
    system: &PvSystem,
    shortname: Option<&str>,
) -> Result<String> {
    if let Report::Series(series) = report
        && series.samples.is_empty()
    {
        return Ok(NO_PRODUCTION_MESSAGE.to_string());
    }

    match (format, report) {
        (OutputFormat::Table, Report::Instant(output)) => Ok(format_instant_table(output, system)),
        (OutputFormat::Table, Report::Series(series)) => Ok(format_series_table(series)),
        (OutputFormat::Json, Report::Instant(output)) => to_json(&JsonEstimate::from(&output.estimate())),
        (OutputFormat::Json, Report::Series(series)) => {
            let rows: Vec<JsonEstimate> = series.samples.iter().map(JsonEstimate::from).collect();
            to_json(&rows)
        }
        (OutputFormat::Prometheus, Report::Instant(output)) => {
            Ok(format_prometheus(output.dc_power_kw, system, shortname))
        }
        (OutputFormat::Prometheus, Report::Series(series)) => {
            // Only the latest sample is exported
            let latest = series.samples.last().map_or(0.0, |s| s.dc_power_kw);
            Ok(format_prometheus(latest, system, shortname))
        }
    }
}

// ===================== TABLE OUTPUT =====================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Align {
    Left,
    Right,
}

/// Plain table: columns two spaces apart, dashed rules.
///
/// With headers the rule sits under the header row and every column is at
/// least two characters wider than its header; without headers the rows
/// are framed by a rule above and below.
fn simple_table(headers: Option<&[&str]>, rows: &[Vec<String>], align: &[Align]) -> String {
    let columns = align.len();
    let mut widths = vec![0usize; columns];
    if let Some(headers) = headers {
        for (w, h) in widths.iter_mut().zip(headers) {
            *w = h.chars().count() + 2;
        }
    }
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .zip(align)
            .map(|((cell, &w), a)| match a {
                Align::Left => format!("{:<w$}", cell),
                Align::Right => format!("{:>w$}", cell),
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };
    let rule = widths.iter().map(|&w| "-".repeat(w)).collect::<Vec<_>>().join("  ");

    let mut out = Vec::with_capacity(rows.len() + 2);
    match headers {
        Some(headers) => {
            let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
            out.push(line(&header_cells));
            out.push(rule);
            out.extend(rows.iter().map(|r| line(r)));
        }
        None => {
            out.push(rule.clone());
            out.extend(rows.iter().map(|r| line(r)));
            out.push(rule);
        }
    }
    out.join("\n")
}

fn key_value_table(rows: &[(&str, String)]) -> String {
    let rows: Vec<Vec<String>> = rows.iter().map(|(k, v)| vec![k.to_string(), v.clone()]).collect();
    simple_table(None, &rows, &[Align::Left, Align::Left])
}

/// Single instant: the estimate followed by the computation breakdown.
pub fn format_instant_table(output: &SolarPanelOutput, system: &PvSystem) -> String {
    let summary = key_value_table(&[
        ("Time", format_timestamp(&output.timestamp)),
        ("DC Power", format!("{:.2} kW", output.dc_power_kw)),
        ("POA Irradiance", format!("{:.2} W/m²", output.plane.poa)),
        ("GHI", format!("{:.2} W/m²", output.irradiance.ghi)),
    ]);

    let noon = solar::solar_noon_on_local_day(&system.location, &output.timestamp);
    let air_mass = if output.air_mass.is_finite() {
        format!("{:.3}", output.air_mass)
    } else {
        "-".to_string()
    };

    let details = key_value_table(&[
        ("Solar Zenith", format!("{:.2}°", output.position.zenith)),
        ("Solar Azimuth", format!("{:.2}°", output.position.azimuth)),
        ("Solar Elevation", format!("{:.2}°", output.position.elevation_angle())),
        ("Declination", format!("{:.2}°", output.position.declination)),
        ("Hour Angle", format!("{:.2}°", output.position.hour_angle)),
        ("Solar Noon", format_timestamp(&noon)),
        ("Air Mass", air_mass),
        ("Angle of Incidence", format!("{:.1}°", output.plane.aoi_deg)),
        ("DNI", solar_panel::format_irradiance(output.irradiance.dni)),
        ("DHI", solar_panel::format_irradiance(output.irradiance.dhi)),
        ("POA Beam", solar_panel::format_irradiance(output.plane.beam)),
        ("POA Sky Diffuse", solar_panel::format_irradiance(output.plane.sky_diffuse)),
        ("POA Ground", solar_panel::format_irradiance(output.plane.ground_reflected)),
    ]);

    format!("{}\n\n{}", summary, details)
}

/// Timeframe: one row per sample, then the energy total.
pub fn format_series_table(series: &Series) -> String {
    let rows: Vec<Vec<String>> = series
        .samples
        .iter()
        .map(|s| {
            vec![
                format_timestamp(&s.timestamp),
                format!("{:.2}", s.dc_power_kw),
                format!("{:.2}", s.poa_irradiance),
                format!("{:.2}", s.ghi),
            ]
        })
        .collect();

    let table = simple_table(
        Some(&["Time", "DC Power (kW)", "POA Irr (W/m²)", "GHI (W/m²)"][..]),
        &rows,
        &[Align::Left, Align::Right, Align::Right, Align::Right],
    );

    format!("{}\n\nEstimated energy: {}", table, solar_panel::format_energy(series.energy_kwh))
}

// ===================== JSON OUTPUT =====================

#[derive(Debug, Serialize)]
struct JsonEstimate {
    timestamp: String,
    dc_power_kw: f64,
    poa_irradiance: f64,
    ghi: f64,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

impl From<&PowerEstimate> for JsonEstimate {
    fn from(e: &PowerEstimate) -> Self {
        Self {
            timestamp: format_timestamp(&e.timestamp),
            dc_power_kw: round2(e.dc_power_kw),
            poa_irradiance: round2(e.poa_irradiance),
            ghi: round2(e.ghi),
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| PvError::Output(e.to_string()))
}

// ===================== PROMETHEUS OUTPUT =====================

/// Escape a label value for the text exposition format.
fn escape_label(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

/// One gauge line labelled with the site configuration.
pub fn format_prometheus(dc_power_kw: f64, system: &PvSystem, shortname: Option<&str>) -> String {
    let mut labels = vec![
        format!("latitude=\"{:?}\"", system.location.latitude),
        format!("longitude=\"{:?}\"", system.location.longitude),
        format!("capacity=\"{:?}\"", system.spec.capacity_kw),
        format!("tilt=\"{:?}\"", system.geometry.tilt_deg),
        format!("azimuth=\"{:?}\"", system.geometry.azimuth_deg),
    ];
    if let Some(name) = shortname.filter(|n| !n.is_empty()) {
        labels.push(format!("shortname=\"{}\"", escape_label(name)));
    }

    format!("{}{{{}}} {:.2}", METRIC_NAME, labels.join(","), dc_power_kw)
}

// ===================== TESTS =====================
