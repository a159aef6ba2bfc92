//! Derived shift metrics.
//!
//! Everything here is pure: the caller passes in the shift, its related
//! records, the alert thresholds and the current time.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::config::ThresholdConfig;
use crate::entities::{mean, MassBalance, Person, Process, TemperatureChannel};
use crate::sample::DataSource;
use crate::shift::{Shift, ShiftStatus};

/// Records fetched alongside a shift.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShiftContext {
    /// Active staff.
    pub personnel: Vec<Person>,
    /// Lots in progress.
    pub processes: Vec<Process>,
    /// Recent mass-balance readings, newest first.
    pub mass_balances: Vec<MassBalance>,
    /// Where the data came from.
    pub source: DataSource,
}

/// Wall-clock time since a shift started, in whole minutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ElapsedTime {
    minutes: i64,
}

impl ElapsedTime {
    /// Elapsed time from `start` to `until`, floored to minutes and never negative.
    #[must_use]
    pub fn between(start: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            minutes: (until - start).num_minutes().max(0),
        }
    }

    /// Total minutes.
    #[must_use]
    pub fn total_minutes(self) -> i64 {
        self.minutes
    }
}

impl fmt::Display for ElapsedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h {}m", self.minutes / 60, self.minutes % 60)
    }
}

impl Serialize for ElapsedTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// An operational warning about a shift.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alert {
    /// Temperature above the configured maximum.
    HighTemperature {
        /// Offending temperature.
        celsius: f64,
    },
    /// Temperature below the configured minimum.
    LowTemperature {
        /// Offending temperature.
        celsius: f64,
    },
    /// The shift is suspended.
    Suspended,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HighTemperature { celsius } => {
                write!(f, "high temperature: {}°C", round1(*celsius))
            }
            Self::LowTemperature { celsius } => {
                write!(f, "low temperature: {}°C", round1(*celsius))
            }
            Self::Suspended => write!(f, "shift suspended, review"),
        }
    }
}

/// Metrics computed for one shift.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShiftMetrics {
    /// Biochar output over biomass input, in percent.
    pub yield_percent: f64,
    /// Average process temperature, if any reading exists.
    pub average_temperature: Option<f64>,
    /// Time since the shift started.
    pub elapsed: ElapsedTime,
    /// Blend of temperature score and yield. Not capped at 100.
    pub efficiency: f64,
    /// Inferred status.
    pub status: ShiftStatus,
    /// Warnings, in a fixed order: temperature first, then status.
    pub alerts: Vec<Alert>,
    /// Energy meter difference.
    pub energy_consumed: Option<f64>,
    /// Gas meter difference.
    pub gas_consumed: Option<f64>,
    /// Biochar produced in kg.
    pub biochar_kg: Option<f64>,
    /// Biomass fed in kg.
    pub biomass_kg: Option<f64>,
}

/// A shift with its related records and metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShiftView {
    /// The shift.
    pub shift: Shift,
    /// Related records.
    #[serde(flatten)]
    pub context: ShiftContext,
    /// Derived metrics.
    pub metrics: ShiftMetrics,
}

/// Build the view of a shift.
#[must_use]
pub fn compute_shift_view(
    shift: Shift,
    context: ShiftContext,
    thresholds: &ThresholdConfig,
    now: DateTime<Utc>,
) -> ShiftView {
    let metrics = compute_metrics(&shift, &context.mass_balances, thresholds, now);
    ShiftView {
        shift,
        context,
        metrics,
    }
}

/// Metrics of one shift. `mass_balances` may hold unrelated readings; only
/// the ones the shift links to are used.
#[must_use]
pub fn compute_metrics(
    shift: &Shift,
    mass_balances: &[MassBalance],
    thresholds: &ThresholdConfig,
    now: DateTime<Utc>,
) -> ShiftMetrics {
    let linked = linked_balances(shift, mass_balances);

    let biochar_kg = shift.output_mass_kg().or_else(|| {
        let weights: Vec<f64> = linked.iter().filter_map(|mb| mb.biochar_kg).collect();
        (!weights.is_empty()).then(|| weights.iter().sum())
    });
    let biomass_kg = shift.input_mass_kg(now);
    let yield_pct = yield_percent(biochar_kg, biomass_kg);
    let average_temperature = average_temperature(shift, &linked);
    let status = shift.status();

    ShiftMetrics {
        yield_percent: yield_pct,
        average_temperature,
        elapsed: elapsed(shift, now),
        efficiency: efficiency(
            average_temperature.unwrap_or(0.0),
            yield_pct,
            thresholds.optimal_temperature,
        ),
        status,
        alerts: alerts(average_temperature, status, thresholds),
        energy_consumed: shift.energy.consumed(),
        gas_consumed: shift.gas.consumed(),
        biochar_kg,
        biomass_kg,
    }
}

fn linked_balances<'a>(shift: &Shift, mass_balances: &'a [MassBalance]) -> Vec<&'a MassBalance> {
    mass_balances
        .iter()
        .filter(|mb| shift.links.mass_balances.contains(&mb.id))
        .collect()
}

/// `output / input * 100` when input is positive, else 0. Never negative.
#[must_use]
pub fn yield_percent(output_kg: Option<f64>, input_kg: Option<f64>) -> f64 {
    match (output_kg, input_kg) {
        (Some(output), Some(input)) if input > 0.0 => (output / input * 100.0).max(0.0),
        _ => 0.0,
    }
}

/// Average temperature of a shift.
///
/// Per-batch readings win; then the furnace readings of linked mass
/// balances; then the mean of start and end; then the start alone.
fn average_temperature(shift: &Shift, linked: &[&MassBalance]) -> Option<f64> {
    if let Some(avg) = mean(&shift.batch_temperatures) {
        return Some(avg);
    }
    let furnace: Vec<f64> = linked
        .iter()
        .filter_map(|mb| mb.temperature(TemperatureChannel::H1))
        .collect();
    if let Some(avg) = mean(&furnace) {
        return Some(avg);
    }
    match (shift.temperature_start, shift.temperature_end) {
        (Some(start), Some(end)) => Some((start + end) / 2.0),
        (start, _) => start,
    }
}

fn elapsed(shift: &Shift, now: DateTime<Utc>) -> ElapsedTime {
    match shift.start {
        Some(start) => ElapsedTime::between(start, shift.end.unwrap_or(now)),
        None => ElapsedTime::default(),
    }
}

/// Blend a temperature score with the yield.
///
/// The temperature score is `100 - |optimum - T| / optimum * 100`, floored at
/// zero. The yield is not capped, so neither is the result.
#[must_use]
pub fn efficiency(temperature: f64, yield_pct: f64, optimum: f64) -> f64 {
    let temperature_score = if optimum > 0.0 {
        (100.0 - (optimum - temperature).abs() / optimum * 100.0).max(0.0)
    } else {
        0.0
    };
    (temperature_score + yield_pct.max(0.0)) / 2.0
}

/// Alerts for a temperature and status.
#[must_use]
pub fn alerts(
    temperature: Option<f64>,
    status: ShiftStatus,
    thresholds: &ThresholdConfig,
) -> Vec<Alert> {
    let mut out = Vec::new();
    if let Some(celsius) = temperature {
        if celsius > thresholds.max_temperature {
            out.push(Alert::HighTemperature { celsius });
        }
        if celsius < thresholds.min_temperature {
            out.push(Alert::LowTemperature { celsius });
        }
    }
    if status == ShiftStatus::Suspended {
        out.push(Alert::Suspended);
    }
    out
}

/// Totals over a set of shifts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShiftStatistics {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub suspended: usize,
    pub unknown: usize,
    /// Mean of the per-shift average temperatures that are known.
    pub average_temperature: Option<f64>,
    pub total_biomass_kg: f64,
    pub total_biochar_kg: f64,
}

/// Aggregate a set of shifts.
#[must_use]
pub fn shift_statistics(shifts: &[Shift], now: DateTime<Utc>) -> ShiftStatistics {
    let mut stats = ShiftStatistics {
        total: shifts.len(),
        ..ShiftStatistics::default()
    };
    let mut temperatures = Vec::new();

    for shift in shifts {
        match shift.status() {
            ShiftStatus::Active => stats.active += 1,
            ShiftStatus::Completed => stats.completed += 1,
            ShiftStatus::Suspended => stats.suspended += 1,
            ShiftStatus::Unknown => stats.unknown += 1,
        }
        if let Some(t) = average_temperature(shift, &[]) {
            temperatures.push(t);
        }
        stats.total_biomass_kg += shift.input_mass_kg(now).unwrap_or(0.0);
        stats.total_biochar_kg += shift.output_mass_kg().unwrap_or(0.0);
    }

    stats.average_temperature = mean(&temperatures);
    stats
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
