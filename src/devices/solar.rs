use crate::devices::types::clipped_sine;

/// Share of irradiance removed by full cloud cover.
const MAX_CLOUD_ATTENUATION: f64 = 0.75;

/// A fixed photovoltaic array driven by a clipped-sine irradiance model.
///
/// Irradiance follows a half sine peaking at `peak_hour` with
/// `peak_irradiance_w_m2`, is attenuated by cloud cover, and is converted to
/// electrical power through the panel area and efficiency.
///
/// # Examples
///
/// ```
/// use microgrid_sim::devices::SolarArray;
///
/// let array = SolarArray::new(25.0, 0.20, 1000.0, 13.0);
/// // Clear sky at the peak hour: 1000 W/m² × 25 m² × 0.20 = 5 kW
/// assert!((array.power_kw(0.0, 13.0, 1.0) - 5.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct SolarArray {
    /// Panel area in square metres.
    pub area_m2: f64,

    /// Base panel conversion efficiency (0..1).
    pub efficiency: f64,

    /// Clear-sky irradiance at the peak hour (W/m²).
    pub peak_irradiance_w_m2: f64,

    /// Hour of day at which irradiance peaks.
    pub peak_hour: f64,
}

impl SolarArray {
    /// Creates a new solar array.
    ///
    /// Negative area, efficiency or irradiance are clamped to zero.
    pub fn new(area_m2: f64, efficiency: f64, peak_irradiance_w_m2: f64, peak_hour: f64) -> Self {
        Self {
            area_m2: area_m2.max(0.0),
            efficiency: efficiency.max(0.0),
            peak_irradiance_w_m2: peak_irradiance_w_m2.max(0.0),
            peak_hour,
        }
    }

    /// Clear-sky irradiance (W/m²) at `hour`; zero before sunrise and after sunset.
    pub fn irradiance_w_m2(&self, hour: f64) -> f64 {
        clipped_sine(self.peak_irradiance_w_m2, self.peak_hour, hour)
    }

    /// Electrical output in kW.
    ///
    /// # Arguments
    ///
    /// * `cloud_cover_percent` - Cloud cover, clamped to 0–100
    /// * `hour` - Fractional hour of day
    /// * `efficiency_modifier` - Fault multiplier (1.0 when healthy)
    pub fn power_kw(&self, cloud_cover_percent: f64, hour: f64, efficiency_modifier: f64) -> f64 {
        let effective_irradiance = self.irradiance_w_m2(hour) * cloud_factor(cloud_cover_percent);
        let watts = effective_irradiance * self.area_m2 * self.efficiency * efficiency_modifier;
        (watts / 1000.0).max(0.0)
    }
}

/// Irradiance multiplier for the given cloud cover.
///
/// Full cover leaves a quarter of the clear-sky irradiance; it never drops
/// to zero.
pub fn cloud_factor(cloud_cover_percent: f64) -> f64 {
    1.0 - MAX_CLOUD_ATTENUATION * (cloud_cover_percent.clamp(0.0, 100.0) / 100.0)
}
