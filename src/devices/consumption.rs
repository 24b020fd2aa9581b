use crate::devices::types::clipped_sine;

/// A household demand profile with a morning and an evening peak.
///
/// Demand is the superposition of two clipped sine bumps on top of a
/// constant baseline, so it never drops below `base_kw`.
///
/// # Examples
///
/// ```
/// use microgrid_sim::devices::LoadProfile;
///
/// let load = LoadProfile::new(3.5, 8.0, 4.0, 19.0, 0.5);
/// assert!(load.demand_kw(19.0) > load.demand_kw(3.0));
/// assert!(load.demand_kw(3.0) >= 0.5);
/// ```
#[derive(Debug, Clone)]
pub struct LoadProfile {
    /// Height of the morning bump (kW).
    pub morning_peak_kw: f64,

    /// Hour of the morning peak.
    pub morning_peak_hour: f64,

    /// Height of the evening bump (kW).
    pub evening_peak_kw: f64,

    /// Hour of the evening peak.
    pub evening_peak_hour: f64,

    /// Constant always-on load (kW).
    pub base_kw: f64,
}

impl LoadProfile {
    /// Creates a new load profile. Negative magnitudes are clamped to zero.
    pub fn new(
        morning_peak_kw: f64,
        morning_peak_hour: f64,
        evening_peak_kw: f64,
        evening_peak_hour: f64,
        base_kw: f64,
    ) -> Self {
        Self {
            morning_peak_kw: morning_peak_kw.max(0.0),
            morning_peak_hour,
            evening_peak_kw: evening_peak_kw.max(0.0),
            evening_peak_hour,
            base_kw: base_kw.max(0.0),
        }
    }

    /// Demand in kW at the given fractional hour of day.
    pub fn demand_kw(&self, hour: f64) -> f64 {
        clipped_sine(self.morning_peak_kw, self.morning_peak_hour, hour)
            + clipped_sine(self.evening_peak_kw, self.evening_peak_hour, hour)
            + self.base_kw
    }
}
