/// A small horizontal-axis wind turbine following the cubic power law.
///
/// `P = 0.5 · Cp · ρ · A · v³`, with `A` the swept area of the rotor.
#[derive(Debug, Clone)]
pub struct WindTurbine {
    /// Rotor blade radius in metres.
    pub blade_radius_m: f64,

    /// Air density in kg/m³.
    pub air_density_kg_m3: f64,

    /// Power coefficient `Cp` (fraction of wind power captured).
    pub power_coefficient: f64,
}

impl WindTurbine {
    /// Creates a new turbine. Negative parameters are clamped to zero.
    pub fn new(blade_radius_m: f64, air_density_kg_m3: f64, power_coefficient: f64) -> Self {
        Self {
            blade_radius_m: blade_radius_m.max(0.0),
            air_density_kg_m3: air_density_kg_m3.max(0.0),
            power_coefficient: power_coefficient.max(0.0),
        }
    }

    /// Area swept by the blades in m².
    pub fn swept_area_m2(&self) -> f64 {
        std::f64::consts::PI * self.blade_radius_m * self.blade_radius_m
    }

    /// Electrical output in kW for the given wind speed (m/s).
    ///
    /// Negative speeds are treated as calm air.
    pub fn power_kw(&self, wind_speed_ms: f64) -> f64 {
        let v = wind_speed_ms.max(0.0);
        let watts =
            0.5 * self.power_coefficient * self.air_density_kg_m3 * self.swept_area_m2() * v.powi(3);
        watts / 1000.0
    }
}
