//! Telemetry generator that drives the physical model one tick at a time.

use chrono::NaiveDateTime;

use crate::config::MicrogridConfig;
use crate::devices::types::hour_of_day;
use crate::devices::{Battery, LoadProfile, SolarArray, WindTurbine};
use crate::telemetry::Reading;
use crate::weather::Weather;

use super::fault::FaultInjector;
use super::state::SimulatorState;

/// Telemetry generator owning the device models and the fault injector.
///
/// Holds typed device fields since the device set is fixed. State of charge
/// and fault status live in [`SimulatorState`], which the caller threads
/// through [`Generator::tick`].
pub struct Generator {
    solar: SolarArray,
    wind: WindTurbine,
    load: LoadProfile,
    battery: Battery,
    faults: FaultInjector,
    interval_hours: f64,
}

impl Generator {
    /// Creates a new generator.
    ///
    /// # Arguments
    ///
    /// * `solar` - Solar array model
    /// * `wind` - Wind turbine model
    /// * `load` - Household demand profile
    /// * `battery` - Battery storage model
    /// * `faults` - Panel fault injector
    /// * `interval_hours` - Nominal tick length used for energy integration
    pub fn new(
        solar: SolarArray,
        wind: WindTurbine,
        load: LoadProfile,
        battery: Battery,
        faults: FaultInjector,
        interval_hours: f64,
    ) -> Self {
        Self {
            solar,
            wind,
            load,
            battery,
            faults,
            interval_hours,
        }
    }

    /// Builds a generator from configuration.
    ///
    /// The fault injector is seeded from `simulation.seed`.
    pub fn from_config(cfg: &MicrogridConfig) -> Self {
        let sol = &cfg.solar;
        let w = &cfg.wind;
        let c = &cfg.consumption;
        let bat = &cfg.battery;
        let f = &cfg.faults;

        Self::new(
            SolarArray::new(sol.area_m2, sol.efficiency, sol.peak_irradiance_w_m2, sol.peak_hour),
            WindTurbine::new(w.blade_radius_m, w.air_density_kg_m3, w.power_coefficient),
            LoadProfile::new(
                c.morning_peak_kw,
                c.morning_peak_hour,
                c.evening_peak_kw,
                c.evening_peak_hour,
                c.base_kw,
            ),
            Battery::new(bat.capacity_kwh, bat.max_charge_kw, bat.max_discharge_kw),
            FaultInjector::new(
                f.degrade_probability,
                f.recover_probability,
                f.degraded_modifier,
                cfg.simulation.seed,
            ),
            cfg.simulation.interval_hours(),
        )
    }

    /// Executes one tick and returns the next state with its reading.
    ///
    /// # Arguments
    ///
    /// * `state` - State before the tick
    /// * `weather` - Conditions held constant for the run
    /// * `at` - Timestamp stamped on the reading; its hour drives the models
    ///
    /// # Returns
    ///
    /// The post-tick state and the assembled `Reading`. Solar output uses
    /// the efficiency modifier in force at the start of the tick; the
    /// reading reports the fault status after injection.
    pub fn tick(
        &mut self,
        state: SimulatorState,
        weather: &Weather,
        at: NaiveDateTime,
    ) -> (SimulatorState, Reading) {
        let hour = hour_of_day(&at);

        // 1. Physical model
        let solar_kw = self.solar.power_kw(
            weather.cloud_cover_percent,
            hour,
            state.solar_efficiency_modifier,
        );
        let wind_kw = self.wind.power_kw(weather.wind_speed_ms);
        let consumption_kw = self.load.demand_kw(hour);

        // 2. Storage
        let battery_soc = self.battery.update_soc(
            solar_kw + wind_kw,
            consumption_kw,
            state.battery_soc,
            self.interval_hours,
        );

        // 3. Faults
        let next = self.faults.inject(SimulatorState {
            battery_soc,
            ..state
        });

        let reading = Reading::new(
            at,
            solar_kw,
            wind_kw,
            consumption_kw,
            next.battery_soc,
            next.current_fault.clone(),
        );
        (next, reading)
    }

    /// Nominal tick length in hours.
    pub fn interval_hours(&self) -> f64 {
        self.interval_hours
    }
}
