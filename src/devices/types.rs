//! Shared helpers for the physical device models.

use chrono::{NaiveDateTime, Timelike};

/// Half-wave sine profile peaking at `peak_hour` with magnitude `peak`.
///
/// The wave is positive for the twelve hours centred on `peak_hour` and
/// clipped to zero for the remaining twelve, so it models a daylight bump
/// (or a usage bump) without ever going negative.
///
/// # Arguments
///
/// * `peak` - Value reached at `peak_hour`
/// * `peak_hour` - Hour of day (0.0–24.0) at which the profile peaks
/// * `hour` - Hour of day to evaluate
///
/// # Examples
///
/// ```
/// use microgrid_sim::devices::types::clipped_sine;
///
/// assert!((clipped_sine(1000.0, 13.0, 13.0) - 1000.0).abs() < 1e-9);
/// assert_eq!(clipped_sine(1000.0, 13.0, 2.0), 0.0);
/// ```
pub fn clipped_sine(peak: f64, peak_hour: f64, hour: f64) -> f64 {
    let phase = (hour - (peak_hour - 6.0)) * std::f64::consts::PI / 12.0;
    (peak * phase.sin()).max(0.0)
}

/// Fractional hour of day (e.g. 13:30 → 13.5) for a wall-clock timestamp.
pub fn hour_of_day(at: &NaiveDateTime) -> f64 {
    f64::from(at.hour())
        + f64::from(at.minute()) / 60.0
        + f64::from(at.second()) / 3600.0
}
