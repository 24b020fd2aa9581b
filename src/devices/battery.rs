/// A stationary battery with inverter charge/discharge limits.
///
/// The battery itself is stateless: state of charge lives in
/// [`SimulatorState`](crate::sim::state::SimulatorState) and is threaded
/// through [`Battery::update_soc`] each tick.
///
/// # Power Flow Convention
/// - Surplus (generation > consumption): charges, rate-limited by `max_charge_kw`
/// - Deficit (consumption > generation): discharges, rate-limited by `max_discharge_kw`
#[derive(Debug, Clone)]
pub struct Battery {
    /// Battery capacity in kilowatt-hours.
    pub capacity_kwh: f64,

    /// Maximum charge power in kilowatts (positive value).
    pub max_charge_kw: f64,

    /// Maximum discharge power in kilowatts (positive value).
    pub max_discharge_kw: f64,
}

impl Battery {
    /// Creates a new battery.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero/negative or a power limit is negative.
    pub fn new(capacity_kwh: f64, max_charge_kw: f64, max_discharge_kw: f64) -> Self {
        assert!(capacity_kwh > 0.0);
        assert!(max_charge_kw >= 0.0 && max_discharge_kw >= 0.0);

        Self {
            capacity_kwh,
            max_charge_kw,
            max_discharge_kw,
        }
    }

    /// Returns the state of charge after one interval. See [`update_battery_soc`].
    pub fn update_soc(
        &self,
        generation_kw: f64,
        consumption_kw: f64,
        current_soc_percent: f64,
        interval_hours: f64,
    ) -> f64 {
        update_battery_soc(
            generation_kw,
            consumption_kw,
            current_soc_percent,
            interval_hours,
            self.capacity_kwh,
            self.max_charge_kw,
            self.max_discharge_kw,
        )
    }
}

/// Computes the new state of charge (percent) after one interval.
///
/// A surplus charges the battery with `min(surplus, max_charge_kw)` for the
/// interval; a deficit discharges it with `min(|deficit|, max_discharge_kw)`.
/// The result is always clamped to `[0, 100]`.
///
/// # Arguments
///
/// * `generation_kw` - Total generation over the interval
/// * `consumption_kw` - Total consumption over the interval
/// * `current_soc_percent` - State of charge before the interval
/// * `interval_hours` - Nominal interval length in hours
/// * `capacity_kwh` - Usable battery capacity
/// * `max_charge_kw` - Inverter charge limit
/// * `max_discharge_kw` - Inverter discharge limit
pub fn update_battery_soc(
    generation_kw: f64,
    consumption_kw: f64,
    current_soc_percent: f64,
    interval_hours: f64,
    capacity_kwh: f64,
    max_charge_kw: f64,
    max_discharge_kw: f64,
) -> f64 {
    let net_kw = generation_kw - consumption_kw;
    let soc = if net_kw > 0.0 {
        let added_kwh = net_kw.min(max_charge_kw) * interval_hours;
        current_soc_percent + added_kwh / capacity_kwh * 100.0
    } else {
        let removed_kwh = net_kw.abs().min(max_discharge_kw) * interval_hours;
        current_soc_percent - removed_kwh / capacity_kwh * 100.0
    };
    soc.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIVE_SECONDS_H: f64 = 5.0 / 3600.0;

    fn battery() -> Battery {
        Battery::new(15.0, 4.0, 5.0)
    }

    #[test]
    #[should_panic]
    fn test_invalid_capacity() {
        Battery::new(0.0, 4.0, 5.0);
    }

    #[test]
    fn test_charge_power_limit() {
        // 10 kW surplus is limited to 4 kW for 1 h: 4/15 of capacity
        let soc = battery().update_soc(12.0, 2.0, 50.0, 1.0);
        assert!((soc - (50.0 + 4.0 / 15.0 * 100.0)).abs() < 1e-9);
    }

    #[test]
    fn test_discharge_power_limit() {
        // 8 kW deficit is limited to 5 kW for 1 h
        let soc = battery().update_soc(0.0, 8.0, 50.0, 1.0);
        assert!((soc - (50.0 - 5.0 / 15.0 * 100.0)).abs() < 1e-9);
    }

    #[test]
    fn test_small_surplus_is_not_rate_limited() {
        let soc = battery().update_soc(3.0, 2.0, 50.0, 1.5);
        assert!((soc - (50.0 + 1.5 / 15.0 * 100.0)).abs() < 1e-9);
    }

    #[test]
    fn test_balanced_grid_keeps_soc() {
        assert_eq!(battery().update_soc(2.5, 2.5, 42.0, FIVE_SECONDS_H), 42.0);
    }

    #[test]
    fn test_full_battery_stays_at_100() {
        assert_eq!(battery().update_soc(9.0, 1.0, 100.0, 1.0), 100.0);
        assert_eq!(battery().update_soc(9.0, 1.0, 99.99, 1.0), 100.0);
    }

    #[test]
    fn test_empty_battery_stays_at_0() {
        assert_eq!(battery().update_soc(0.0, 9.0, 0.0, 1.0), 0.0);
        assert_eq!(battery().update_soc(0.0, 9.0, 0.01, 1.0), 0.0);
    }

    #[test]
    fn test_pathological_inputs_stay_clamped() {
        let b = Battery::new(0.001, 1e9, 1e9);
        let cases = [
            (1e12, 0.0, 50.0, 1e6),
            (0.0, 1e12, 50.0, 1e6),
            (1e12, 0.0, 250.0, 1.0),
            (0.0, 1e12, -75.0, 1.0),
            (-5.0, 0.0, 50.0, 10.0),
        ];
        for (generation, consumption, soc, hours) in cases {
            let next = b.update_soc(generation, consumption, soc, hours);
            assert!((0.0..=100.0).contains(&next), "{next} for {generation}/{consumption}");
        }
    }

    #[test]
    fn test_free_function_matches_method() {
        let b = battery();
        let via_method = b.update_soc(6.0, 1.0, 33.0, FIVE_SECONDS_H);
        let via_fn = update_battery_soc(6.0, 1.0, 33.0, FIVE_SECONDS_H, 15.0, 4.0, 5.0);
        assert_eq!(via_method, via_fn);
    }
}
