//! Reading wire format shared by the simulator, the ingest bridge and the jobs.
//!
//! Field names are the external contract: every process and the hosted store
//! agree on them, so they must not be renamed.

use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

/// Tag carried in `grid_status.fault` when the grid is healthy.
pub const NO_FAULT_TAG: &str = "None";
/// Tag carried in `grid_status.fault` while the solar array is degraded.
pub const PANEL_DEGRADED_TAG: &str = "Solar panel efficiency degraded";

/// Fault condition reported with each reading.
///
/// Serialized as a plain string tag; tags this crate does not know are
/// preserved verbatim in [`Fault::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Fault {
    /// No active fault.
    #[default]
    None,
    /// Solar array running at reduced efficiency.
    PanelDegraded,
    /// A tag produced by another source.
    Other(String),
}

impl Fault {
    /// Wire tag for this fault.
    pub fn tag(&self) -> &str {
        match self {
            Fault::None => NO_FAULT_TAG,
            Fault::PanelDegraded => PANEL_DEGRADED_TAG,
            Fault::Other(tag) => tag,
        }
    }

    /// Returns `true` unless the fault is [`Fault::None`].
    pub fn is_active(&self) -> bool {
        !matches!(self, Fault::None)
    }
}

impl From<String> for Fault {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            NO_FAULT_TAG => Fault::None,
            PANEL_DEGRADED_TAG => Fault::PanelDegraded,
            _ => Fault::Other(tag),
        }
    }
}

impl From<Fault> for String {
    fn from(fault: Fault) -> Self {
        fault.tag().to_string()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Generation breakdown for one reading (kW).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub solar_kw: f64,
    pub wind_kw: f64,
    /// Always `solar_kw + wind_kw`.
    pub total_kw: f64,
}

/// Grid condition for one reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridStatus {
    pub fault: Fault,
    /// `generation.total_kw - consumption_kw`.
    pub net_power_kw: f64,
}

/// One telemetry record: a simulation tick or an ingested message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Wall-clock instant; unique and strictly increasing per source.
    ///
    /// Written without an offset. Incoming stamps that carry one are
    /// converted to UTC, see [`parse_timestamp`].
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: NaiveDateTime,
    pub generation: Generation,
    pub consumption_kw: f64,
    /// State of charge, always within `[0, 100]`.
    pub battery_soc_percent: f64,
    pub grid_status: GridStatus,
}

impl Reading {
    /// Builds a reading, deriving `total_kw` and `net_power_kw`.
    ///
    /// Negative powers are floored at zero and the state of charge is
    /// clamped to `[0, 100]`.
    pub fn new(
        timestamp: NaiveDateTime,
        solar_kw: f64,
        wind_kw: f64,
        consumption_kw: f64,
        battery_soc_percent: f64,
        fault: Fault,
    ) -> Self {
        let solar_kw = solar_kw.max(0.0);
        let wind_kw = wind_kw.max(0.0);
        let consumption_kw = consumption_kw.max(0.0);
        let total_kw = solar_kw + wind_kw;

        Self {
            timestamp,
            generation: Generation {
                solar_kw,
                wind_kw,
                total_kw,
            },
            consumption_kw,
            battery_soc_percent: battery_soc_percent.clamp(0.0, 100.0),
            grid_status: GridStatus {
                fault,
                net_power_kw: total_kw - consumption_kw,
            },
        }
    }

    /// Encodes the reading in the JSON wire format.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Decodes a reading from its JSON wire format.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json::Error` if the payload is not a valid reading.
    pub fn from_json(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | solar={:.3} kW  wind={:.3} kW  load={:.3} kW  net={:>7.3} kW | SoC={:.2}% fault={}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.generation.solar_kw,
            self.generation.wind_kw,
            self.consumption_kw,
            self.grid_status.net_power_kw,
            self.battery_soc_percent,
            self.grid_status.fault,
        )
    }
}

/// Parses a reading timestamp.
///
/// Naive ISO 8601 stamps (`2024-06-03T12:00:00.250000`) are taken as-is.
/// RFC 3339 stamps with an offset (`...Z`, `...+05:30`) are converted to
/// UTC and the offset dropped.
///
/// # Errors
///
/// Returns a `chrono::ParseError` if the text is neither form.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    raw.parse::<NaiveDateTime>()
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|t| t.naive_utc()))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

/// Readings decoded from a batch of raw store records.
#[derive(Debug, Clone, Default)]
pub struct DecodedReadings {
    /// Valid readings ordered by timestamp.
    pub readings: Vec<Reading>,
    /// Number of records that did not match the wire format.
    pub skipped: usize,
}

/// Decodes raw store records, skipping malformed ones.
///
/// The result is sorted by timestamp so callers can rely on chronological
/// order regardless of the store's key order.
pub fn decode_readings<'a>(records: impl IntoIterator<Item = &'a Value>) -> DecodedReadings {
    let mut decoded = DecodedReadings::default();
    for record in records {
        match Reading::deserialize(record) {
            Ok(reading) => decoded.readings.push(reading),
            Err(err) => {
                debug!(%err, "skipping malformed reading");
                decoded.skipped += 1;
            }
        }
    }
    decoded.readings.sort_by_key(|r| r.timestamp);
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(h, m, s))
            .unwrap()
    }

    #[test]
    fn total_is_sum_of_components() {
        let r = Reading::new(at(12, 0, 0), 3.25, 1.5, 2.0, 55.0, Fault::None);
        assert_eq!(r.generation.total_kw, r.generation.solar_kw + r.generation.wind_kw);
        assert_eq!(r.grid_status.net_power_kw, r.generation.total_kw - r.consumption_kw);
    }

    #[test]
    fn soc_is_clamped() {
        assert_eq!(Reading::new(at(1, 0, 0), 0.0, 0.0, 1.0, 140.0, Fault::None).battery_soc_percent, 100.0);
        assert_eq!(Reading::new(at(1, 0, 0), 0.0, 0.0, 1.0, -3.0, Fault::None).battery_soc_percent, 0.0);
    }

    #[test]
    fn wire_format_field_names() {
        let r = Reading::new(at(9, 30, 5), 1.0, 2.0, 0.5, 80.0, Fault::PanelDegraded);
        let value = serde_json::to_value(&r).unwrap();
        assert_eq!(value["timestamp"], "2024-06-01T09:30:05");
        assert_eq!(value["generation"]["solar_kw"], 1.0);
        assert_eq!(value["generation"]["wind_kw"], 2.0);
        assert_eq!(value["generation"]["total_kw"], 3.0);
        assert_eq!(value["consumption_kw"], 0.5);
        assert_eq!(value["battery_soc_percent"], 80.0);
        assert_eq!(value["grid_status"]["fault"], PANEL_DEGRADED_TAG);
        assert_eq!(value["grid_status"]["net_power_kw"], 2.5);
    }

    #[test]
    fn json_round_trip_is_field_for_field_equal() {
        let ts = at(17, 45, 12) + chrono::Duration::microseconds(123_456);
        let r = Reading::new(ts, 0.123456789, 4.987654321, 3.3333333, 71.12345, Fault::None);
        let payload = r.to_json().unwrap();
        let back = Reading::from_json(payload.as_bytes()).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn parses_external_payload_with_extra_fields() {
        let payload = json!({
            "source": "virtual_grid_sensor",
            "generation": {"solar_kw": 0.5, "wind_kw": 1.2, "total_kw": 1.7},
            "battery_soc_percent": 70.04,
            "consumption_kw": 0.9,
            "grid_status": {"fault": "None", "net_power_kw": 0.8},
            "timestamp": "2024-06-01T13:00:00.250000"
        });
        let r = Reading::deserialize(&payload).unwrap();
        assert_eq!(r.grid_status.fault, Fault::None);
        assert_eq!(r.generation.total_kw, 1.7);
    }

    #[test]
    fn offset_timestamps_are_normalised_to_utc() {
        let record = |ts: &str| {
            json!({
                "timestamp": ts,
                "generation": {"solar_kw": 1.0, "wind_kw": 0.0, "total_kw": 1.0},
                "consumption_kw": 0.5,
                "battery_soc_percent": 60.0,
                "grid_status": {"fault": "None", "net_power_kw": 0.5}
            })
        };
        let records = [
            record("2024-06-01T12:00:00Z"),
            record("2024-06-01T12:00:05+00:00"),
            record("2024-06-01T17:30:10+05:30"),
        ];
        let decoded = decode_readings(records.iter());
        assert_eq!(decoded.skipped, 0);
        let stamps: Vec<NaiveDateTime> = decoded.readings.iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![at(12, 0, 0), at(12, 0, 5), at(12, 0, 10)]);

        // Re-encoded without the offset
        let value = serde_json::to_value(&decoded.readings[0]).unwrap();
        assert_eq!(value["timestamp"], "2024-06-01T12:00:00");
    }

    #[test]
    fn garbage_timestamp_is_rejected() {
        assert!(parse_timestamp("yesterday").is_err());
        assert!(parse_timestamp("2024-06-01T12:00:00.5").is_ok());
    }

    #[test]
    fn unknown_fault_tags_are_preserved() {
        let fault = Fault::from("Inverter trip".to_string());
        assert_eq!(fault, Fault::Other("Inverter trip".to_string()));
        assert!(fault.is_active());
        assert_eq!(String::from(fault), "Inverter trip");
    }

    #[test]
    fn decode_skips_malformed_and_sorts() {
        let late = serde_json::to_value(Reading::new(at(10, 0, 5), 1.0, 0.0, 1.0, 50.0, Fault::None)).unwrap();
        let early = serde_json::to_value(Reading::new(at(10, 0, 0), 1.0, 0.0, 1.0, 50.0, Fault::None)).unwrap();
        let broken = json!({"timestamp": "2024-06-01T10:00:02", "consumption_kw": 1.0});
        let records = [late, broken, early];

        let decoded = decode_readings(records.iter());
        assert_eq!(decoded.skipped, 1);
        assert_eq!(decoded.readings.len(), 2);
        assert!(decoded.readings[0].timestamp < decoded.readings[1].timestamp);
    }
}
