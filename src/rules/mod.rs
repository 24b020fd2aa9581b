//! Event detector: threshold predicates over readings and the alerts they raise.
//!
//! The same [`RuleSet`] backs both consumption modes: [`stream`] evaluates
//! the newest reading on a poll loop, [`batch`] counts events across a
//! trailing window and raises rate alerts.

use std::fmt;

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::config::RulesConfig;
use crate::telemetry::Reading;

pub mod batch;
pub mod stream;

/// Kind of condition an alert reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertType {
    LowBattery,
    EnergyOverflow,
    PanelFault,
    HighOverflowRate,
    PotentialShortage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        })
    }
}

/// An immutable, append-only alert record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// When the detector raised the alert.
    pub timestamp: NaiveDateTime,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub message: String,
    pub severity: Severity,
}

impl Alert {
    pub fn new(
        timestamp: NaiveDateTime,
        alert_type: AlertType,
        message: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            timestamp,
            alert_type,
            message: message.into(),
            severity,
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {:?}: {}", self.severity, self.alert_type, self.message)
    }
}

/// Threshold predicates shared by the streaming and batch detectors.
///
/// Every predicate is evaluated independently; several may hold for the
/// same reading.
#[derive(Debug, Clone)]
pub struct RuleSet {
    low_battery_soc_percent: f64,
    full_soc_percent: f64,
    empty_soc_percent: f64,
    daylight_start_hour: u32,
    daylight_end_hour: u32,
    panel_fault_solar_kw: f64,
}

impl RuleSet {
    pub fn new(cfg: &RulesConfig) -> Self {
        Self {
            low_battery_soc_percent: cfg.low_battery_soc_percent,
            full_soc_percent: cfg.full_soc_percent,
            empty_soc_percent: cfg.empty_soc_percent,
            daylight_start_hour: cfg.daylight_start_hour,
            daylight_end_hour: cfg.daylight_end_hour,
            panel_fault_solar_kw: cfg.panel_fault_solar_kw,
        }
    }

    /// SoC strictly below the low-battery threshold.
    pub fn is_low_battery(&self, r: &Reading) -> bool {
        r.battery_soc_percent < self.low_battery_soc_percent
    }

    /// Battery full and generation still exceeding consumption.
    pub fn is_overflow(&self, r: &Reading) -> bool {
        self.overflows(r.generation.total_kw, r.consumption_kw, r.battery_soc_percent)
    }

    /// Battery empty and consumption exceeding generation.
    pub fn is_underflow(&self, r: &Reading) -> bool {
        self.underflows(r.generation.total_kw, r.consumption_kw, r.battery_soc_percent)
    }

    /// [`RuleSet::is_overflow`] on bare values.
    pub fn overflows(&self, total_kw: f64, consumption_kw: f64, soc_percent: f64) -> bool {
        soc_percent >= self.full_soc_percent && total_kw > consumption_kw
    }

    /// [`RuleSet::is_underflow`] on bare values.
    pub fn underflows(&self, total_kw: f64, consumption_kw: f64, soc_percent: f64) -> bool {
        consumption_kw > total_kw && soc_percent <= self.empty_soc_percent
    }

    /// Near-zero solar output during daylight hours.
    pub fn is_panel_fault(&self, r: &Reading) -> bool {
        let hour = r.timestamp.hour();
        let daytime = (self.daylight_start_hour..self.daylight_end_hour).contains(&hour);
        daytime && r.generation.solar_kw < self.panel_fault_solar_kw
    }

    /// SoC at or above which the battery counts as full.
    pub fn full_soc_percent(&self) -> f64 {
        self.full_soc_percent
    }

    /// Evaluates the per-reading rules.
    ///
    /// # Arguments
    ///
    /// * `reading` - Reading to classify
    /// * `detected_at` - Timestamp stamped on the resulting alerts
    ///
    /// # Returns
    ///
    /// Zero or more alerts in rule order: low battery, overflow, panel fault.
    pub fn evaluate(&self, reading: &Reading, detected_at: NaiveDateTime) -> Vec<Alert> {
        let mut alerts = Vec::new();

        if self.is_low_battery(reading) {
            alerts.push(Alert::new(
                detected_at,
                AlertType::LowBattery,
                format!(
                    "Battery SOC is critically low at {:.2}%.",
                    reading.battery_soc_percent
                ),
                Severity::Critical,
            ));
        }
        if self.is_overflow(reading) {
            alerts.push(Alert::new(
                detected_at,
                AlertType::EnergyOverflow,
                "Battery is full but generation exceeds consumption. Potential energy waste.",
                Severity::Warning,
            ));
        }
        if self.is_panel_fault(reading) {
            alerts.push(Alert::new(
                detected_at,
                AlertType::PanelFault,
                "Solar generation is near zero during daytime. Maintenance may be required.",
                Severity::Warning,
            ));
        }

        alerts
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new(&RulesConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Fault;
    use chrono::NaiveDate;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(h, 0, 0))
            .unwrap()
    }

    fn reading(h: u32, solar: f64, wind: f64, load: f64, soc: f64) -> Reading {
        Reading::new(at(h), solar, wind, load, soc, Fault::None)
    }

    #[test]
    fn low_battery_only() {
        let rules = RuleSet::default();
        let alerts = rules.evaluate(&reading(12, 5.0, 0.0, 3.0, 15.0), at(12));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::LowBattery);
        assert_eq!(alerts[0].severity, Severity::Critical);
    }

    #[test]
    fn low_battery_threshold_is_strict() {
        let rules = RuleSet::default();
        assert!(!rules.is_low_battery(&reading(12, 5.0, 0.0, 3.0, 20.0)));
        assert!(rules.is_low_battery(&reading(12, 5.0, 0.0, 3.0, 19.99)));
    }

    #[test]
    fn overflow_needs_full_battery_and_surplus() {
        let rules = RuleSet::default();
        assert!(rules.is_overflow(&reading(12, 5.0, 0.0, 3.0, 95.0)));
        assert!(!rules.is_overflow(&reading(12, 5.0, 0.0, 3.0, 94.9)));
        assert!(!rules.is_overflow(&reading(12, 2.0, 0.0, 3.0, 100.0)));
    }

    #[test]
    fn underflow_needs_empty_battery_and_deficit() {
        let rules = RuleSet::default();
        assert!(rules.is_underflow(&reading(22, 0.0, 0.0, 1.0, 0.5)));
        assert!(!rules.is_underflow(&reading(22, 0.0, 0.0, 1.0, 0.6)));
        assert!(!rules.is_underflow(&reading(22, 2.0, 0.0, 1.0, 0.0)));
    }

    #[test]
    fn panel_fault_only_in_daylight() {
        let rules = RuleSet::default();
        assert!(rules.is_panel_fault(&reading(7, 0.05, 3.0, 1.0, 50.0)));
        assert!(rules.is_panel_fault(&reading(17, 0.0, 3.0, 1.0, 50.0)));
        assert!(!rules.is_panel_fault(&reading(18, 0.0, 3.0, 1.0, 50.0)));
        assert!(!rules.is_panel_fault(&reading(6, 0.0, 3.0, 1.0, 50.0)));
        assert!(!rules.is_panel_fault(&reading(12, 0.1, 3.0, 1.0, 50.0)));
    }

    #[test]
    fn rules_fire_independently() {
        let rules = RuleSet::default();
        // Daylight, no solar, wind surplus, full battery
        let alerts = rules.evaluate(&reading(10, 0.0, 6.0, 1.0, 99.0), at(10));
        let kinds: Vec<AlertType> = alerts.iter().map(|a| a.alert_type).collect();
        assert_eq!(kinds, vec![AlertType::EnergyOverflow, AlertType::PanelFault]);
    }

    #[test]
    fn thresholds_come_from_config() {
        let cfg = RulesConfig {
            full_soc_percent: 99.5,
            ..RulesConfig::default()
        };
        let rules = RuleSet::new(&cfg);
        assert!(!rules.is_overflow(&reading(12, 5.0, 0.0, 3.0, 99.0)));
        assert!(rules.is_overflow(&reading(12, 5.0, 0.0, 3.0, 99.5)));
    }

    #[test]
    fn alert_wire_format() {
        let alert = Alert::new(at(9), AlertType::LowBattery, "low", Severity::Critical);
        let value = serde_json::to_value(&alert).unwrap();
        assert_eq!(value["type"], "LowBattery");
        assert_eq!(value["severity"], "CRITICAL");
        assert_eq!(value["timestamp"], "2024-06-01T09:00:00");
        let back: Alert = serde_json::from_value(value).unwrap();
        assert_eq!(back, alert);
    }
}
