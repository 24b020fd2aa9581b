//! TOML-based microgrid configuration, presets, and environment secrets.

use std::env;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level configuration parsed from TOML.
///
/// All fields have defaults matching the baseline microgrid. Load from
/// TOML with [`MicrogridConfig::from_toml_file`] or use
/// [`MicrogridConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MicrogridConfig {
    /// Simulation timing and global parameters.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Solar array parameters.
    #[serde(default)]
    pub solar: SolarConfig,
    /// Wind turbine parameters.
    #[serde(default)]
    pub wind: WindConfig,
    /// Household demand profile.
    #[serde(default)]
    pub consumption: ConsumptionConfig,
    /// Battery storage parameters.
    #[serde(default)]
    pub battery: BatteryConfig,
    /// Fault injector probabilities.
    #[serde(default)]
    pub faults: FaultConfig,
    /// Alert thresholds and polling cadence.
    #[serde(default)]
    pub rules: RulesConfig,
    /// Efficiency estimator parameters.
    #[serde(default)]
    pub efficiency: EfficiencyConfig,
    /// Forecaster parameters.
    #[serde(default)]
    pub forecast: ForecastConfig,
    /// Performance report parameters.
    #[serde(default)]
    pub report: ReportConfig,
    /// Pub/sub broker connection.
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Weather API location and timeout.
    #[serde(default)]
    pub weather: WeatherConfig,
}

/// Simulation timing and global parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Nominal tick length in seconds; also the energy integration interval.
    pub tick_secs: u64,
    /// Master random seed.
    pub seed: u64,
    /// State of charge at simulator start (percent).
    pub initial_soc_percent: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_secs: 5,
            seed: 42,
            initial_soc_percent: 70.0,
        }
    }
}

impl SimulationConfig {
    /// Tick length in hours, the interval used in every energy integration.
    pub fn interval_hours(&self) -> f64 {
        self.tick_secs as f64 / 3600.0
    }
}

/// Solar array parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolarConfig {
    /// Panel area (m²).
    pub area_m2: f64,
    /// Base panel efficiency (0.0–1.0).
    pub efficiency: f64,
    /// Clear-sky irradiance at the peak hour (W/m²).
    pub peak_irradiance_w_m2: f64,
    /// Hour of peak irradiance.
    pub peak_hour: f64,
}

impl Default for SolarConfig {
    fn default() -> Self {
        Self {
            area_m2: 25.0,
            efficiency: 0.20,
            peak_irradiance_w_m2: 1000.0,
            peak_hour: 13.0,
        }
    }
}

/// Wind turbine parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindConfig {
    /// Blade radius (m).
    pub blade_radius_m: f64,
    /// Air density (kg/m³).
    pub air_density_kg_m3: f64,
    /// Power coefficient (0.0–0.593).
    pub power_coefficient: f64,
}

impl Default for WindConfig {
    fn default() -> Self {
        Self {
            blade_radius_m: 1.5,
            air_density_kg_m3: 1.225,
            power_coefficient: 0.4,
        }
    }
}

/// Household demand profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsumptionConfig {
    /// Morning bump height (kW).
    pub morning_peak_kw: f64,
    /// Morning peak hour.
    pub morning_peak_hour: f64,
    /// Evening bump height (kW).
    pub evening_peak_kw: f64,
    /// Evening peak hour.
    pub evening_peak_hour: f64,
    /// Always-on baseline (kW).
    pub base_kw: f64,
}

impl Default for ConsumptionConfig {
    fn default() -> Self {
        Self {
            morning_peak_kw: 3.5,
            morning_peak_hour: 8.0,
            evening_peak_kw: 4.0,
            evening_peak_hour: 19.0,
            base_kw: 0.5,
        }
    }
}

/// Battery storage parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryConfig {
    /// Total energy capacity (kWh).
    pub capacity_kwh: f64,
    /// Maximum charging power (kW).
    pub max_charge_kw: f64,
    /// Maximum discharging power (kW).
    pub max_discharge_kw: f64,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            capacity_kwh: 15.0,
            max_charge_kw: 4.0,
            max_discharge_kw: 5.0,
        }
    }
}

/// Fault injector parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FaultConfig {
    /// Per-tick probability of entering the degraded state.
    pub degrade_probability: f64,
    /// Per-tick probability of recovering, rolled after the degrade check.
    pub recover_probability: f64,
    /// Solar efficiency multiplier while degraded.
    pub degraded_modifier: f64,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            degrade_probability: 0.05,
            recover_probability: 0.02,
            degraded_modifier: 0.70,
        }
    }
}

/// Alert thresholds and polling cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RulesConfig {
    /// Low-battery alert fires strictly below this SoC (percent).
    pub low_battery_soc_percent: f64,
    /// Battery counts as full at or above this SoC (percent).
    pub full_soc_percent: f64,
    /// Battery counts as empty at or below this SoC (percent).
    pub empty_soc_percent: f64,
    /// First daytime hour (inclusive) for the panel-fault rule.
    pub daylight_start_hour: u32,
    /// Last daytime hour (exclusive) for the panel-fault rule.
    pub daylight_end_hour: u32,
    /// Daytime solar output below this is treated as a panel fault (kW).
    pub panel_fault_solar_kw: f64,
    /// Rate alerts fire when a window holds more events than this.
    pub rate_alert_threshold: usize,
    /// Streaming-mode poll interval (seconds).
    pub poll_interval_secs: u64,
    /// Batch-mode trailing window (minutes).
    pub batch_window_minutes: i64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            low_battery_soc_percent: 20.0,
            full_soc_percent: 95.0,
            empty_soc_percent: 0.5,
            daylight_start_hour: 7,
            daylight_end_hour: 18,
            panel_fault_solar_kw: 0.1,
            rate_alert_threshold: 2,
            poll_interval_secs: 10,
            batch_window_minutes: 15,
        }
    }
}

/// Efficiency estimator parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EfficiencyConfig {
    /// Fraction of wasted energy assumed recoverable in the optimized case.
    pub recovery_factor: f64,
    /// Minimum number of valid readings before a proof is written.
    pub min_readings: usize,
}

impl Default for EfficiencyConfig {
    fn default() -> Self {
        Self {
            recovery_factor: 0.80,
            min_readings: 1,
        }
    }
}

/// Forecaster parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForecastConfig {
    /// Days of history used for training.
    pub training_days: i64,
    /// Minimum number of readings before a forecast is attempted.
    pub min_readings: usize,
    /// Held-out share of the data used for the accuracy estimate.
    pub test_fraction: f64,
    /// Seed for the train/test shuffle.
    pub seed: u64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            training_days: 7,
            min_readings: 50,
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

/// Performance report parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    /// Minimum number of readings for a meaningful report.
    pub min_readings: usize,
    /// Recommend more storage when waste exceeds this share of generation.
    pub waste_recommendation_fraction: f64,
    /// Recommend more capacity when underflow events exceed this count.
    pub shortage_recommendation_events: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            min_readings: 100,
            waste_recommendation_fraction: 0.1,
            shortage_recommendation_events: 50,
        }
    }
}

/// Pub/sub broker connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerConfig {
    /// Broker host name.
    pub host: String,
    /// Broker TCP port.
    pub port: u16,
    /// Topic carrying JSON readings.
    pub topic: String,
    /// Client id prefix; each process appends its role.
    pub client_id: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "test.mosquitto.org".to_string(),
            port: 1883,
            topic: "smartgrid/data".to_string(),
            client_id: "microgrid-sim".to_string(),
        }
    }
}

/// Weather API location and timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeatherConfig {
    /// Site latitude.
    pub latitude: f64,
    /// Site longitude.
    pub longitude: f64,
    /// Outbound request timeout (seconds).
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            latitude: 17.385,
            longitude: 78.4867,
            timeout_secs: 10,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"battery.capacity_kwh"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub(crate) fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl MicrogridConfig {
    /// Returns the baseline microgrid.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Returns the high-solar preset: a larger array feeding a bigger battery.
    pub fn high_solar() -> Self {
        Self {
            solar: SolarConfig {
                area_m2: 60.0,
                efficiency: 0.22,
                ..SolarConfig::default()
            },
            battery: BatteryConfig {
                capacity_kwh: 30.0,
                max_charge_kw: 8.0,
                max_discharge_kw: 8.0,
            },
            ..Self::default()
        }
    }

    /// Returns the small-battery preset: tight storage that overflows and
    /// runs empty often, useful for exercising the alert rules.
    pub fn small_battery() -> Self {
        Self {
            simulation: SimulationConfig {
                initial_soc_percent: 25.0,
                ..SimulationConfig::default()
            },
            battery: BatteryConfig {
                capacity_kwh: 2.0,
                max_charge_kw: 2.0,
                max_discharge_kw: 2.0,
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "high_solar", "small_battery"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "high_solar" => Ok(Self::high_solar()),
            "small_battery" => Ok(Self::small_battery()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors: Vec<ConfigError> = self
            .float_fields()
            .into_iter()
            .filter(|(_, v)| !v.is_finite())
            .map(|(field, _)| ConfigError::new(field, "must be a finite number"))
            .collect();

        if self.simulation.tick_secs == 0 || self.simulation.tick_secs > MAX_TICK_SECS {
            errors.push(ConfigError::new(
                "simulation.tick_secs",
                format!("must be in [1, {MAX_TICK_SECS}]"),
            ));
        }
        if !(0.0..=100.0).contains(&self.simulation.initial_soc_percent) {
            errors.push(ConfigError::new(
                "simulation.initial_soc_percent",
                "must be in [0, 100]",
            ));
        }

        let sol = &self.solar;
        if sol.area_m2 < 0.0 {
            errors.push(ConfigError::new("solar.area_m2", "must be >= 0"));
        }
        if !(0.0..=1.0).contains(&sol.efficiency) {
            errors.push(ConfigError::new("solar.efficiency", "must be in [0.0, 1.0]"));
        }
        if !(0.0..24.0).contains(&sol.peak_hour) {
            errors.push(ConfigError::new("solar.peak_hour", "must be in [0, 24)"));
        }

        if self.wind.blade_radius_m < 0.0 {
            errors.push(ConfigError::new("wind.blade_radius_m", "must be >= 0"));
        }

        let bat = &self.battery;
        if bat.capacity_kwh <= 0.0 {
            errors.push(ConfigError::new("battery.capacity_kwh", "must be > 0"));
        }
        if bat.max_charge_kw < 0.0 {
            errors.push(ConfigError::new("battery.max_charge_kw", "must be >= 0"));
        }
        if bat.max_discharge_kw < 0.0 {
            errors.push(ConfigError::new("battery.max_discharge_kw", "must be >= 0"));
        }

        let f = &self.faults;
        for (field, p) in [
            ("faults.degrade_probability", f.degrade_probability),
            ("faults.recover_probability", f.recover_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                errors.push(ConfigError::new(field, "must be in [0.0, 1.0]"));
            }
        }
        if f.degraded_modifier < 0.0 {
            errors.push(ConfigError::new("faults.degraded_modifier", "must be >= 0"));
        }

        let r = &self.rules;
        if r.empty_soc_percent >= r.full_soc_percent {
            errors.push(ConfigError::new(
                "rules.empty_soc_percent",
                "must be < rules.full_soc_percent",
            ));
        }
        if r.daylight_start_hour >= r.daylight_end_hour || r.daylight_end_hour > 24 {
            errors.push(ConfigError::new(
                "rules.daylight_start_hour",
                "must be < rules.daylight_end_hour <= 24",
            ));
        }
        if r.poll_interval_secs == 0 {
            errors.push(ConfigError::new("rules.poll_interval_secs", "must be > 0"));
        }
        if !(1..=MAX_BATCH_WINDOW_MINUTES).contains(&r.batch_window_minutes) {
            errors.push(ConfigError::new(
                "rules.batch_window_minutes",
                format!("must be in [1, {MAX_BATCH_WINDOW_MINUTES}]"),
            ));
        }

        if !(0.0..=1.0).contains(&self.efficiency.recovery_factor) {
            errors.push(ConfigError::new(
                "efficiency.recovery_factor",
                "must be in [0.0, 1.0]",
            ));
        }

        let fc = &self.forecast;
        if !(1..=MAX_TRAINING_DAYS).contains(&fc.training_days) {
            errors.push(ConfigError::new(
                "forecast.training_days",
                format!("must be in [1, {MAX_TRAINING_DAYS}]"),
            ));
        }
        if !(fc.test_fraction > 0.0 && fc.test_fraction < 1.0) {
            errors.push(ConfigError::new("forecast.test_fraction", "must be in (0.0, 1.0)"));
        }
        if fc.min_readings < 2 {
            errors.push(ConfigError::new("forecast.min_readings", "must be >= 2"));
        }

        if self.broker.topic.is_empty() {
            errors.push(ConfigError::new("broker.topic", "must not be empty"));
        }

        errors
    }

    fn float_fields(&self) -> [(&'static str, f64); 28] {
        let (sim, sol, wind, load) = (&self.simulation, &self.solar, &self.wind, &self.consumption);
        let (bat, f, r) = (&self.battery, &self.faults, &self.rules);
        [
            ("simulation.initial_soc_percent", sim.initial_soc_percent),
            ("solar.area_m2", sol.area_m2),
            ("solar.efficiency", sol.efficiency),
            ("solar.peak_irradiance_w_m2", sol.peak_irradiance_w_m2),
            ("solar.peak_hour", sol.peak_hour),
            ("wind.blade_radius_m", wind.blade_radius_m),
            ("wind.air_density_kg_m3", wind.air_density_kg_m3),
            ("wind.power_coefficient", wind.power_coefficient),
            ("consumption.morning_peak_kw", load.morning_peak_kw),
            ("consumption.morning_peak_hour", load.morning_peak_hour),
            ("consumption.evening_peak_kw", load.evening_peak_kw),
            ("consumption.evening_peak_hour", load.evening_peak_hour),
            ("consumption.base_kw", load.base_kw),
            ("battery.capacity_kwh", bat.capacity_kwh),
            ("battery.max_charge_kw", bat.max_charge_kw),
            ("battery.max_discharge_kw", bat.max_discharge_kw),
            ("faults.degrade_probability", f.degrade_probability),
            ("faults.recover_probability", f.recover_probability),
            ("faults.degraded_modifier", f.degraded_modifier),
            ("rules.low_battery_soc_percent", r.low_battery_soc_percent),
            ("rules.full_soc_percent", r.full_soc_percent),
            ("rules.empty_soc_percent", r.empty_soc_percent),
            ("rules.panel_fault_solar_kw", r.panel_fault_solar_kw),
            ("efficiency.recovery_factor", self.efficiency.recovery_factor),
            ("forecast.test_fraction", self.forecast.test_fraction),
            ("report.waste_recommendation_fraction", self.report.waste_recommendation_fraction),
            ("weather.latitude", self.weather.latitude),
            ("weather.longitude", self.weather.longitude),
        ]
    }
}

/// Longest accepted tick: one day.
pub const MAX_TICK_SECS: u64 = 86_400;
/// Longest accepted batch window: one year.
pub const MAX_BATCH_WINDOW_MINUTES: i64 = 525_600;
/// Longest accepted forecast training window: ten years.
pub const MAX_TRAINING_DAYS: i64 = 3_650;

/// Environment variable holding the store endpoint URL.
pub const DATABASE_URL_VAR: &str = "FIREBASE_DATABASE_URL";
/// Environment variable holding the store credential blob.
pub const CREDENTIALS_VAR: &str = "FIREBASE_SERVICE_ACCOUNT_JSON_STRING";
/// Environment variable holding the optional weather API key.
pub const WEATHER_KEY_VAR: &str = "OPENWEATHER_API_KEY";

/// Connection details for the hosted store, read from the environment.
#[derive(Debug, Clone)]
pub struct StoreCredentials {
    /// Base URL of the realtime database.
    pub database_url: String,
    /// Token passed as the `auth` query parameter.
    pub auth_token: String,
}

impl StoreCredentials {
    /// Reads the store URL and credential blob from the environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if either variable is missing or the
    /// credential blob carries no usable token.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = required_var(DATABASE_URL_VAR)?;
        let blob = required_var(CREDENTIALS_VAR)?;
        Self::from_parts(&database_url, &blob)
    }

    /// Builds credentials from a URL and a credential blob.
    ///
    /// The blob is either a bare token or a JSON object with a
    /// `database_secret` or `token` string field.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the blob is JSON without a token field.
    pub fn from_parts(database_url: &str, blob: &str) -> Result<Self, ConfigError> {
        let blob = blob.trim();
        let auth_token = match serde_json::from_str::<serde_json::Value>(blob) {
            Ok(serde_json::Value::Object(fields)) => ["database_secret", "token"]
                .iter()
                .find_map(|k| fields.get(*k).and_then(|v| v.as_str()))
                .map(str::to_string)
                .ok_or_else(|| {
                    ConfigError::new(
                        CREDENTIALS_VAR,
                        "credential JSON has no \"database_secret\" or \"token\" field",
                    )
                })?,
            _ => blob.to_string(),
        };

        Ok(Self {
            database_url: database_url.trim_end_matches('/').to_string(),
            auth_token,
        })
    }
}

/// Optional weather API key from the environment.
pub fn weather_api_key() -> Option<String> {
    env::var(WEATHER_KEY_VAR).ok().filter(|k| !k.trim().is_empty())
}

fn required_var(name: &str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::new(name, "is not set (check the environment or .env file)")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_preset_valid() {
        let cfg = MicrogridConfig::baseline();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "baseline should be valid: {errors:?}");
    }

    #[test]
    fn from_preset_unknown() {
        let err = MicrogridConfig::from_preset("nonexistent");
        assert!(err.is_err());
        let e = err.unwrap_err();
        assert!(e.message.contains("unknown preset"));
    }

    #[test]
    fn all_presets_are_valid() {
        for name in MicrogridConfig::PRESETS {
            let cfg = MicrogridConfig::from_preset(name);
            assert!(cfg.is_ok(), "preset \"{name}\" should load");
            let errors = cfg.as_ref().map(|c| c.validate()).unwrap_or_default();
            assert!(
                errors.is_empty(),
                "preset \"{name}\" should be valid: {errors:?}"
            );
        }
    }

    #[test]
    fn interval_is_nominal_tick() {
        let cfg = MicrogridConfig::baseline();
        assert!((cfg.simulation.interval_hours() - 5.0 / 3600.0).abs() < 1e-15);
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[simulation]
tick_secs = 10
seed = 7
initial_soc_percent = 50.0

[solar]
area_m2 = 40.0
efficiency = 0.21
peak_irradiance_w_m2 = 950.0
peak_hour = 12.5

[battery]
capacity_kwh = 20.0
max_charge_kw = 6.0
max_discharge_kw = 6.0

[rules]
full_soc_percent = 99.5
rate_alert_threshold = 5

[broker]
host = "localhost"
port = 1884
topic = "site-a/data"
client_id = "site-a"
"#;
        let cfg = MicrogridConfig::from_toml_str(toml);
        assert!(cfg.is_ok(), "valid TOML should parse: {:?}", cfg.err());
        let cfg = cfg.ok();
        assert_eq!(cfg.as_ref().map(|c| c.simulation.tick_secs), Some(10));
        assert_eq!(cfg.as_ref().map(|c| c.rules.full_soc_percent), Some(99.5));
        assert_eq!(cfg.as_ref().map(|c| c.rules.empty_soc_percent), Some(0.5));
        assert_eq!(cfg.as_ref().map(|c| &*c.broker.topic), Some("site-a/data"));
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[rules]
bogus_threshold = 3
"#;
        assert!(MicrogridConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let cfg = MicrogridConfig::from_toml_str("[simulation]\nseed = 99\n");
        assert!(cfg.is_ok());
        let cfg = cfg.ok();
        assert_eq!(cfg.as_ref().map(|c| c.simulation.seed), Some(99));
        assert_eq!(cfg.as_ref().map(|c| c.simulation.tick_secs), Some(5));
        assert_eq!(cfg.as_ref().map(|c| c.battery.capacity_kwh), Some(15.0));
    }

    #[test]
    fn validation_catches_zero_tick() {
        let mut cfg = MicrogridConfig::baseline();
        cfg.simulation.tick_secs = 0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "simulation.tick_secs"));
    }

    #[test]
    fn validation_catches_inverted_soc_thresholds() {
        let mut cfg = MicrogridConfig::baseline();
        cfg.rules.empty_soc_percent = 96.0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "rules.empty_soc_percent"));
    }

    #[test]
    fn validation_catches_bad_probability() {
        let mut cfg = MicrogridConfig::baseline();
        cfg.faults.recover_probability = 1.5;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "faults.recover_probability"));
    }

    #[test]
    fn validation_rejects_non_finite_floats() {
        let mut cfg = MicrogridConfig::baseline();
        cfg.battery.capacity_kwh = f64::NAN;
        cfg.consumption.base_kw = f64::INFINITY;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "battery.capacity_kwh"));
        assert!(errors.iter().any(|e| e.field == "consumption.base_kw"));
    }

    #[test]
    fn validation_bounds_time_spans() {
        let mut cfg = MicrogridConfig::baseline();
        cfg.simulation.tick_secs = u64::MAX;
        cfg.rules.batch_window_minutes = i64::MAX / 2;
        cfg.forecast.training_days = MAX_TRAINING_DAYS + 1;
        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"simulation.tick_secs".to_string()));
        assert!(fields.contains(&"rules.batch_window_minutes".to_string()));
        assert!(fields.contains(&"forecast.training_days".to_string()));

        let mut cfg = MicrogridConfig::baseline();
        cfg.simulation.tick_secs = MAX_TICK_SECS;
        cfg.rules.batch_window_minutes = MAX_BATCH_WINDOW_MINUTES;
        cfg.forecast.training_days = MAX_TRAINING_DAYS;
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn credentials_accept_bare_token() {
        let creds = StoreCredentials::from_parts("https://db.example.com/", "  abc123 ").unwrap();
        assert_eq!(creds.database_url, "https://db.example.com");
        assert_eq!(creds.auth_token, "abc123");
    }

    #[test]
    fn credentials_read_token_from_json_blob() {
        let blob = r#"{"type": "service_account", "database_secret": "s3cret"}"#;
        let creds = StoreCredentials::from_parts("https://db.example.com", blob).unwrap();
        assert_eq!(creds.auth_token, "s3cret");
    }

    #[test]
    fn credentials_reject_json_without_token() {
        let blob = r#"{"type": "service_account", "project_id": "grid"}"#;
        let err = StoreCredentials::from_parts("https://db.example.com", blob).unwrap_err();
        assert_eq!(err.field, CREDENTIALS_VAR);
    }
}
