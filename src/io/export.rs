//! CSV export for stored readings.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::telemetry::Reading;

/// Column header for CSV telemetry export.
const HEADER: &str = "timestamp,solar_kw,wind_kw,total_kw,consumption_kw,\
                      battery_soc_percent,fault,net_power_kw";

/// Exports readings to a CSV file at the given path.
///
/// Writes a header row followed by one data row per reading, in the order
/// given. Produces deterministic output for identical inputs.
///
/// # Arguments
///
/// * `readings` - Readings to export
/// * `path` - Output file path
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(readings: &[Reading], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(readings, buf)
}

/// Writes readings as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(readings: &[Reading], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for r in readings {
        wtr.write_record(&[
            r.timestamp.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            format!("{:.4}", r.generation.solar_kw),
            format!("{:.4}", r.generation.wind_kw),
            format!("{:.4}", r.generation.total_kw),
            format!("{:.4}", r.consumption_kw),
            format!("{:.4}", r.battery_soc_percent),
            r.grid_status.fault.tag().to_string(),
            format!("{:.4}", r.grid_status.net_power_kw),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
