//! Writing results to disk.
//!
//! Each `(lane, strategy)` series becomes one CSV file with a
//! `timestep,waitingtime-<lane>` header and one row per sample in recording
//! order. The run summary is written next to them as JSON.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use cadence_types::{Lane, Strategy, WaitTimeSample};
use tracing::info;

use crate::demand::Demand;
use crate::metrics::{MetricsAggregator, RunSummary};

/// File name of the run summary inside the statistics directory.
pub const SUMMARY_FILE: &str = "summary.json";

/// Errors that can occur while writing output files.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// A file or directory could not be written.
    #[error("failed to write {path}: {source}")]
    Io {
        /// The file or directory being written.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The summary could not be serialized.
    #[error("failed to serialize summary: {source}")]
    Json {
        /// The underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// CSV file name of one series, e.g. `waitingtime-lane2-fuzzy.csv`.
pub fn series_file_name(lane: Lane, strategy: Strategy) -> String {
    format!("waitingtime-{lane}-{strategy}.csv")
}

/// Write one series as CSV.
///
/// # Errors
///
/// Propagates write failures.
pub fn write_series_csv<W: Write>(
    out: &mut W,
    lane: Lane,
    samples: &[WaitTimeSample],
) -> io::Result<()> {
    writeln!(out, "timestep,waitingtime-{lane}")?;
    for sample in samples {
        writeln!(out, "{},{}", sample.timestep, sample.value)?;
    }
    Ok(())
}

/// Write every lane's series for both strategies into `dir`, creating it if
/// needed. Series without samples still get a header-only file.
///
/// # Errors
///
/// Returns [`ExportError::Io`] naming the file that failed.
pub fn write_statistics(
    metrics: &MetricsAggregator,
    dir: &Path,
) -> Result<Vec<PathBuf>, ExportError> {
    fs::create_dir_all(dir).map_err(io_error(dir))?;
    let mut written = Vec::new();
    for strategy in Strategy::ALL {
        for lane in Lane::ALL {
            let path = dir.join(series_file_name(lane, strategy));
            let samples = metrics.export(lane, strategy);
            let file = File::create(&path).map_err(io_error(&path))?;
            let mut out = BufWriter::new(file);
            write_series_csv(&mut out, lane, samples)
                .and_then(|()| out.flush())
                .map_err(io_error(&path))?;
            info!(path = %path.display(), samples = samples.len(), "Series written");
            written.push(path);
        }
    }
    Ok(written)
}

/// Write the run summary as pretty-printed JSON into `dir`.
///
/// # Errors
///
/// Returns [`ExportError::Io`] or [`ExportError::Json`].
pub fn write_summary(summary: &RunSummary, dir: &Path) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir).map_err(io_error(dir))?;
    let path = dir.join(SUMMARY_FILE);
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(&path, json).map_err(io_error(&path))?;
    info!(path = %path.display(), "Summary written");
    Ok(path)
}

/// Write the route file for `demand` at `path`, creating parent
/// directories if needed.
///
/// # Errors
///
/// Returns [`ExportError::Io`] naming the file that failed.
pub fn write_route_file(demand: &Demand, path: &Path) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    let file = File::create(path).map_err(io_error(path))?;
    let mut out = BufWriter::new(file);
    demand
        .write_routes(&mut out)
        .and_then(|()| out.flush())
        .map_err(io_error(path))?;
    info!(path = %path.display(), vehicles = demand.len(), "Route file written");
    Ok(())
}
