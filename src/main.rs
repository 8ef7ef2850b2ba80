use chrono::Utc;
use clap::Parser;
use std::process::ExitCode;
use tracing::{Level, debug};
use tracing_subscriber::FmtSubscriber;

mod clearsky;
mod cli;
mod error;
mod geo;
mod output;
mod sampling;
mod solar;
mod solar_panel;
mod time;

use cli::{Args, DepInfo};
use error::{PvError, Result};
use geo::Location;
use output::Report;
use solar_panel::{PanelGeometry, PvSystem, SystemSpec};

// ===================== MAIN =====================

fn main() -> ExitCode {
    let args = Args::parse();
    setup_logging(args.verbose);

    let result = if args.show_build_info { build_info() } else { run(&args) };

    match result {
        Ok(text) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn build_info() -> Result<String> {
    const DEP_INFO_RAW: &str = include_str!(env!("PVCLEARSKY_DEPS_INFO_PATH"));
    let deps: Vec<DepInfo> =
        serde_json::from_str(DEP_INFO_RAW).map_err(|e| PvError::Output(e.to_string()))?;

    let mut lines = vec![
        format!("Built from Git commit: {}\n", env!("PVCLEARSKY_GIT_HASH")),
        format!("Found {} dependencies.", deps.len()),
    ];
    for dep in deps {
        lines.push(format!("- {} v{}", dep.name, dep.version));
        if let Some(sum) = dep.checksum {
            lines.push(format!("    Checksum: {}", sum));
        }
        if let Some(src) = dep.source {
            lines.push(format!("    Source:   {}", src));
        }
    }
    Ok(lines.join("\n"))
}

// ===================== CONFIGURATION =====================

fn required(name: &'static str, value: Option<f64>) -> Result<f64> {
    value.ok_or_else(|| PvError::InvalidInput {
        name,
        value: "none".to_string(),
        reason: "is required".to_string(),
    })
}

/// Assemble the validated site description from command-line arguments.
fn build_system(args: &Args) -> Result<PvSystem> {
    let location = Location::new(
        required("latitude", args.latitude)?,
        required("longitude", args.longitude)?,
    )?
    .with_altitude(args.altitude)?;
    let geometry = PanelGeometry::new(
        required("panel tilt", args.panel_tilt)?,
        required("panel azimuth", args.panel_azimuth)?,
    )?;
    let spec = SystemSpec::new(required("system capacity", args.system_capacity)?)?
        .with_derate(args.derate)?;

    PvSystem::new(location, geometry, spec)
        .with_linke_turbidity(args.linke_turbidity)?
        .with_albedo(args.albedo)
}

// ===================== RUN =====================

/// Resolve configuration, evaluate the pipeline and render the result.
fn run(args: &Args) -> Result<String> {
    let system = build_system(args)?;
    let tz = time::resolve_tz_setting(&args.timezone, &system.location)?;
    let now = Utc::now().with_timezone(&tz);

    debug!(
        "Site {:.4}, {:.4} @ {} m, tilt {}° azimuth {}°, {} kW (derate {}), TL {}, albedo {}, tz {}",
        system.location.latitude,
        system.location.longitude,
        system.location.altitude,
        system.geometry.tilt_deg,
        system.geometry.azimuth_deg,
        system.spec.capacity_kw,
        system.spec.derate,
        system.atmosphere.linke_turbidity,
        system.albedo,
        tz
    );

    let shortname = args.shortname.as_deref();

    if let Some(range) = args.timeframe.as_deref() {
        let timeframe = time::parse_timeframe(range, tz, now)?;
        let series = sampling::sample_timeframe(&system, &timeframe, args.resolution)?;
        debug!("Keeping {} of {} samples", series.samples.len(), series.evaluated);
        return output::render(Report::Series(&series), args.format, &system, shortname);
    }

    let instant = match args.time.as_deref() {
        Some(s) => time::parse_instant(s, tz, now)?,
        None => now,
    };
    system.validate()?;
    let result = solar_panel::calculate_output(&system, instant)?;
    debug!("Evaluated {}: {:.4} kW", time::format_timestamp(&instant), result.dc_power_kw);

    output::render(Report::Instant(&result), args.format, &system, shortname)
}

// ===================== TESTS =====================

#[cfg(test)]
mod tests {
    use super::*;

    const SITE: [(&str, &str); 6] = [
        ("--latitude", "42.804"),
        ("--longitude", "23.378"),
        ("--system-capacity", "9.2"),
        ("--panel-tilt", "22"),
        ("--panel-azimuth", "162"),
        ("--timezone", "Europe/Sofia"),
    ];

    /// Sofia site flags, with `overrides` replacing matching flags, then `extra`.
    fn args_with(overrides: &[(&str, &str)], extra: &[&str]) -> Args {
        let mut argv = vec!["pvclearsky"];
        for (flag, value) in SITE {
            let value = overrides.iter().find(|(f, _)| *f == flag).map_or(value, |(_, v)| *v);
            argv.extend([flag, value]);
        }
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    fn args(extra: &[&str]) -> Args {
        args_with(&[], extra)
    }

    #[test]
    fn test_run_single_instant_prometheus() {
        let out = run(&args(&[
            "--time",
            "2025-06-21 13:26",
            "--format",
            "prometheus",
            "--shortname",
            "sofia",
        ]))
        .unwrap();
        assert!(out.starts_with("theoretical_pv_kw{latitude=\"42.804\""), "{}", out);
        assert!(out.contains("shortname=\"sofia\""), "{}", out);
        let value: f64 = out.rsplit(' ').next().unwrap().parse().unwrap();
        assert!(value > 8.0 && value < 9.2, "Noon output {} out of range", value);
    }

    #[test]
    fn test_run_timeframe_json() {
        let out = run(&args(&[
            "--timeframe",
            "2025-06-21:2025-06-21",
            "--resolution",
            "30min",
            "--format",
            "json",
        ]))
        .unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        let rows = v.as_array().unwrap();
        assert!(rows.len() > 20 && rows.len() < 36, "{} producing half-hours", rows.len());
        assert!(rows.iter().all(|r| r["timestamp"].as_str().unwrap().ends_with("EEST")));
    }

    #[test]
    fn test_run_timeframe_table_has_energy_footer() {
        let out = run(&args(&["--timeframe", "2025-06-21:2025-06-21"])).unwrap();
        assert!(out.starts_with("Time "), "{}", out);
        assert!(out.lines().last().unwrap().starts_with("Estimated energy: "), "{}", out);
    }

    #[test]
    fn test_run_polar_night_prints_message() {
        let out = run(&args_with(&[("--latitude", "89.9")], &["--timeframe", "2025-12-21:2025-12-21"]));
        assert_eq!(out.unwrap(), output::NO_PRODUCTION_MESSAGE);
    }

    #[test]
    fn test_run_rejects_bad_time_and_zone() {
        let err = run(&args(&["--time", "2025-03-30 03:30"])).unwrap_err();
        assert!(matches!(err, PvError::InvalidTime(_)));

        let err = run(&args(&["--timeframe", "2025-06-22:2025-06-21"])).unwrap_err();
        assert!(matches!(err, PvError::InvalidTime(_)));

        let err = run(&args_with(&[("--timezone", "Nowhere/Special")], &["--now"])).unwrap_err();
        assert!(matches!(err, PvError::UnknownTimezone(_)));
    }

    #[test]
    #[should_panic(expected = "setting default subscriber failed")]
    fn test_second_logging_setup_panics() {
        // Only this test installs the global subscriber
        setup_logging(false);
        setup_logging(true);
    }

    #[test]
    fn test_build_system_applies_options() {
        let system = build_system(&args(&[
            "--now",
            "--altitude",
            "550",
            "--derate",
            "0.9",
            "--albedo",
            "0.3",
        ]))
        .unwrap();
        assert_eq!(system.location.altitude, 550.0);
        assert_eq!(system.atmosphere.altitude_m, 550.0);
        assert_eq!(system.spec.derate, 0.9);
        assert_eq!(system.albedo, 0.3);
    }
}
