//! Wait-time series per lane and strategy.
//!
//! The [`MetricsAggregator`] owns one append-only series per
//! `(Lane, Strategy)` key. Samples are never removed or rewritten; means,
//! running averages, and the run summary are views computed on demand.

use std::collections::BTreeMap;

use cadence_types::{Lane, Strategy, WaitTimeSample};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Append-only store of wait-time series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsAggregator {
    series: BTreeMap<(Lane, Strategy), Vec<WaitTimeSample>>,
}

impl MetricsAggregator {
    /// An empty aggregator.
    pub const fn new() -> Self {
        Self {
            series: BTreeMap::new(),
        }
    }

    /// Append a sample to the `(lane, strategy)` series.
    pub fn record(&mut self, lane: Lane, strategy: Strategy, timestep: u64, value: f64) {
        self.series
            .entry((lane, strategy))
            .or_default()
            .push(WaitTimeSample::new(timestep, value));
    }

    /// The samples of one series in recording order. Empty if nothing was
    /// recorded for the key.
    pub fn export(&self, lane: Lane, strategy: Strategy) -> &[WaitTimeSample] {
        self.series
            .get(&(lane, strategy))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Keys that have at least one sample.
    pub fn keys(&self) -> impl Iterator<Item = (Lane, Strategy)> + '_ {
        self.series.keys().copied()
    }

    /// Total number of samples across all series.
    pub fn total_samples(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }

    /// Whether no sample has been recorded.
    pub fn is_empty(&self) -> bool {
        self.series.values().all(Vec::is_empty)
    }

    /// Mean of one series, or `None` if it is empty.
    pub fn mean(&self, lane: Lane, strategy: Strategy) -> Option<f64> {
        mean_of(self.export(lane, strategy))
    }

    /// Cumulative mean of one series: the i-th entry is the mean of the
    /// first i + 1 samples, at the i-th sample's timestep.
    pub fn running_average(&self, lane: Lane, strategy: Strategy) -> Vec<WaitTimeSample> {
        let mut total = 0.0;
        let mut count = 0.0;
        self.export(lane, strategy)
            .iter()
            .map(|sample| {
                total += sample.value;
                count += 1.0;
                WaitTimeSample::new(sample.timestep, total / count)
            })
            .collect()
    }

    /// Append every series of `other` to the matching series here.
    ///
    /// Used to merge sessions that ran on separate threads.
    pub fn absorb(&mut self, other: Self) {
        for (key, samples) in other.series {
            self.series.entry(key).or_default().extend(samples);
        }
    }

    /// Per-lane comparison of the fixed and fuzzy series.
    pub fn summary(&self) -> RunSummary {
        let lanes = Lane::ALL
            .into_iter()
            .map(|lane| {
                let fixed = SeriesStats::of(self.export(lane, Strategy::Fixed));
                let fuzzy = SeriesStats::of(self.export(lane, Strategy::Fuzzy));
                let relative_change = relative_change(fixed.mean, fuzzy.mean);
                LaneSummary {
                    lane,
                    fixed,
                    fuzzy,
                    relative_change,
                }
            })
            .collect();

        RunSummary {
            generated_at: Utc::now(),
            lanes,
            overall: Strategy::ALL
                .into_iter()
                .map(|strategy| {
                    let samples: Vec<WaitTimeSample> = Lane::ALL
                        .into_iter()
                        .flat_map(|lane| self.export(lane, strategy).iter().copied())
                        .collect();
                    (strategy, SeriesStats::of(&samples))
                })
                .collect(),
        }
    }
}

fn mean_of(samples: &[WaitTimeSample]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let total: f64 = samples.iter().map(|s| s.value).sum();
    // Sample counts stay far below 2^52; exact as f64.
    #[allow(clippy::cast_precision_loss)]
    let count = samples.len() as f64;
    Some(total / count)
}

/// `(fuzzy - fixed) / fixed`; negative means the fuzzy controller waited less.
fn relative_change(fixed: Option<f64>, fuzzy: Option<f64>) -> Option<f64> {
    match (fixed, fuzzy) {
        (Some(fixed), Some(fuzzy)) if fixed > 0.0 => Some((fuzzy - fixed) / fixed),
        _ => None,
    }
}

/// Descriptive statistics of one series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesStats {
    /// Number of samples.
    pub samples: usize,
    /// Mean wait per vehicle in seconds.
    pub mean: Option<f64>,
    /// Largest sample in seconds.
    pub max: Option<f64>,
}

impl SeriesStats {
    fn of(samples: &[WaitTimeSample]) -> Self {
        Self {
            samples: samples.len(),
            mean: mean_of(samples),
            max: samples.iter().map(|s| s.value).reduce(f64::max),
        }
    }
}

/// Fixed vs fuzzy statistics for one lane.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaneSummary {
    /// The lane.
    pub lane: Lane,
    /// Fixed-time baseline.
    pub fixed: SeriesStats,
    /// Fuzzy adaptive control.
    pub fuzzy: SeriesStats,
    /// Relative change of the fuzzy mean against the fixed mean.
    pub relative_change: Option<f64>,
}

/// Comparison of both strategies over a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// When the summary was computed.
    pub generated_at: DateTime<Utc>,
    /// Per-lane comparison in lane order.
    pub lanes: Vec<LaneSummary>,
    /// Statistics over all lanes, per strategy.
    pub overall: BTreeMap<Strategy, SeriesStats>,
}
