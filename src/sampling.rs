//! Timeframe sampling
//!
//! Walks a local time range at a fixed resolution, evaluates the pipeline
//! for every instant in parallel and keeps the samples that produce power.

use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use clap::ValueEnum;
use rayon::prelude::*;
use tracing::debug;

use crate::error::{PvError, Result};
use crate::solar_panel::{self, PowerEstimate, PvSystem};

/// Samples at or below this output (kW) are treated as no production.
pub const NEGLIGIBLE_KW: f64 = 0.001;

/// Upper bound on instants per run (about two years at one-minute steps)
pub const MAX_SAMPLES: usize = 1_100_000;

/// Supported sampling granularities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Resolution {
    #[value(name = "1min")]
    OneMinute,
    #[value(name = "10min")]
    TenMinutes,
    #[value(name = "20min")]
    TwentyMinutes,
    #[value(name = "30min")]
    ThirtyMinutes,
    #[value(name = "1H")]
    OneHour,
}

impl Resolution {
    pub fn step(self) -> Duration {
        match self {
            Resolution::OneMinute => Duration::minutes(1),
            Resolution::TenMinutes => Duration::minutes(10),
            Resolution::TwentyMinutes => Duration::minutes(20),
            Resolution::ThirtyMinutes => Duration::minutes(30),
            Resolution::OneHour => Duration::hours(1),
        }
    }
}

/// Inclusive range of absolute instants, displayed in the zone they carry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeframe {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

/// Result of sampling a timeframe.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    /// Samples above the negligible threshold, ascending by timestamp
    pub samples: Vec<PowerEstimate>,
    /// Energy over the whole range in kWh (trapezoidal, unfiltered samples)
    pub energy_kwh: f64,
    /// Number of instants evaluated before filtering
    pub evaluated: usize,
}

/// Number of instants `sample_instants` yields, computed without allocating.
pub fn sample_count(timeframe: &Timeframe, step: Duration) -> usize {
    let span = (timeframe.end - timeframe.start).num_seconds();
    let step = step.num_seconds();
    if span < 0 || step <= 0 {
        return 0;
    }
    usize::try_from(span / step + 1).unwrap_or(usize::MAX)
}

/// Every instant from `start` to `end` inclusive, `step` apart in absolute time.
///
/// Stepping in absolute time means a DST change shifts the wall-clock
/// labels rather than producing duplicate or missing samples.
pub fn sample_instants(timeframe: &Timeframe, step: Duration) -> Vec<DateTime<Tz>> {
    let mut instants = Vec::new();
    if step <= Duration::zero() {
        return instants;
    }
    let mut t = timeframe.start;
    while t <= timeframe.end {
        instants.push(t);
        t += step;
    }
    instants
}

/// Trapezoidal integral of power over time, kWh.
fn integrate_energy(estimates: &[PowerEstimate]) -> f64 {
    estimates
        .windows(2)
        .map(|w| {
            let hours = (w[1].timestamp - w[0].timestamp).num_seconds() as f64 / 3600.0;
            (w[0].dc_power_kw + w[1].dc_power_kw) / 2.0 * hours
        })
        .sum()
}

/// Evaluate the pipeline across a timeframe.
///
/// # Errors
/// Fails before computing anything if the system is invalid or the
/// timeframe ends before it starts.
pub fn sample_timeframe(
    system: &PvSystem,
    timeframe: &Timeframe,
    resolution: Resolution,
) -> Result<Series> {
    system.validate()?;
    if timeframe.end < timeframe.start {
        return Err(PvError::InvalidTime(format!(
            "timeframe ends ({}) before it starts ({})",
            timeframe.end, timeframe.start
        )));
    }

    let count = sample_count(timeframe, resolution.step());
    if count > MAX_SAMPLES {
        return Err(PvError::InvalidTime(format!(
            "timeframe needs {} samples at {:?} resolution (limit {}); use a coarser resolution \
             or a shorter range",
            count, resolution, MAX_SAMPLES
        )));
    }

    let instants = sample_instants(timeframe, resolution.step());
    debug!("Evaluating {} instants at {:?} resolution", instants.len(), resolution);

    // Indexed collect keeps the input order
    let estimates = instants
        .par_iter()
        .map(|&t| solar_panel::estimate(system, t))
        .collect::<Result<Vec<_>>>()?;

    let energy_kwh = integrate_energy(&estimates);
    let evaluated = estimates.len();
    let samples: Vec<PowerEstimate> =
        estimates.into_iter().filter(|e| e.dc_power_kw > NEGLIGIBLE_KW).collect();

    debug!(
        "{} of {} samples above {} kW, {:.3} kWh total",
        samples.len(),
        evaluated,
        NEGLIGIBLE_KW,
        energy_kwh
    );

    Ok(Series { samples, energy_kwh, evaluated })
}

// ===================== TESTS =====================
