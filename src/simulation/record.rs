use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::ExportError;

/// CSV header, in column order
pub const CSV_HEADER: &str = "step,total_entropy,total_temperature,bh_events_total,bh_events_this_step,entanglement_pairs,causality_strength";

/// Aggregate summary of one completed step.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StepRecord {
    /// 1-based step index since construction or the last reset
    pub step: u64,
    pub total_entropy: f64,
    pub total_temperature: f64,
    pub bh_events_total: u64,
    pub bh_events_this_step: usize,
    pub entanglement_pairs: usize,
    pub causality_strength: f64,
}

impl StepRecord {
    fn csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{}",
            self.step,
            self.total_entropy,
            self.total_temperature,
            self.bh_events_total,
            self.bh_events_this_step,
            self.entanglement_pairs,
            self.causality_strength
        )
    }
}

/// Write `records` to `path` as CSV and return the number of rows written.
///
/// Fails with [`ExportError::NoData`] before touching the filesystem when
/// there is nothing to write.
pub fn write_csv(records: &[StepRecord], path: &Path) -> Result<usize, ExportError> {
    if records.is_empty() {
        return Err(ExportError::NoData);
    }

    let io_err = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{}", CSV_HEADER).map_err(io_err)?;
    for record in records {
        writeln!(writer, "{}", record.csv_row()).map_err(io_err)?;
    }
    writer.flush().map_err(io_err)?;

    Ok(records.len())
}
