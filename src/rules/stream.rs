//! Streaming mode: evaluate the newest stored reading on each poll.

use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::{debug, info};

use super::{Alert, RuleSet};
use crate::store::{self, Store, StoreError};
use crate::telemetry::Reading;

/// Result of one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The store holds no readings yet.
    NoData,
    /// The newest reading was already processed.
    Duplicate(NaiveDateTime),
    /// A new reading was evaluated and its alerts appended to the store.
    Processed {
        timestamp: NaiveDateTime,
        alerts: Vec<Alert>,
    },
}

/// Sleep-poll detector over the newest stored reading.
///
/// The dedup key is the reading's `timestamp`: a timestamp equal to the
/// last processed one is skipped. Two distinct readings sharing a
/// timestamp, or a source whose clock steps backwards onto an already seen
/// value, are silently dropped.
#[derive(Debug, Clone)]
pub struct StreamingDetector {
    rules: RuleSet,
    last_seen: Option<NaiveDateTime>,
}

impl StreamingDetector {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            last_seen: None,
        }
    }

    /// Timestamp of the last processed reading.
    pub fn last_seen(&self) -> Option<NaiveDateTime> {
        self.last_seen
    }

    /// Fetches the newest reading, evaluates it once, and appends alerts.
    ///
    /// # Arguments
    ///
    /// * `store` - Store holding `live_data` and receiving `alerts`
    /// * `now` - Detection time stamped on new alerts
    ///
    /// # Errors
    ///
    /// Returns a `StoreError` if the store is unreachable or the newest
    /// record is not a valid reading. The caller logs it and polls again.
    pub fn poll_once(
        &mut self,
        store: &dyn Store,
        now: NaiveDateTime,
    ) -> Result<PollOutcome, StoreError> {
        let latest = store.query_last(store::LIVE_DATA, store::TIMESTAMP_FIELD, 1)?;
        let Some(record) = latest.values().next_back() else {
            debug!("waiting for data");
            return Ok(PollOutcome::NoData);
        };
        let reading = Reading::deserialize(record)?;

        if self.last_seen == Some(reading.timestamp) {
            return Ok(PollOutcome::Duplicate(reading.timestamp));
        }
        self.last_seen = Some(reading.timestamp);
        info!(timestamp = %reading.timestamp, "processing reading");

        let alerts = self.rules.evaluate(&reading, now);
        for alert in &alerts {
            store::append_record(store, store::ALERTS, alert)?;
            info!(severity = %alert.severity, "alert created: {}", alert.message);
        }

        Ok(PollOutcome::Processed {
            timestamp: reading.timestamp,
            alerts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::AlertType;
    use crate::store::MemoryStore;
    use crate::telemetry::Fault;
    use chrono::NaiveDate;
    use serde_json::json;

    fn at(h: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(h, 0, s))
            .unwrap()
    }

    fn push(store: &MemoryStore, r: &Reading) {
        store::append_record(store, store::LIVE_DATA, r).unwrap();
    }

    #[test]
    fn empty_store_is_no_data() {
        let store = MemoryStore::new();
        let mut det = StreamingDetector::new(RuleSet::default());
        assert_eq!(det.poll_once(&store, at(12, 0)).unwrap(), PollOutcome::NoData);
    }

    #[test]
    fn same_timestamp_is_processed_once() {
        let store = MemoryStore::new();
        push(&store, &Reading::new(at(12, 0), 5.0, 0.0, 3.0, 15.0, Fault::None));
        let mut det = StreamingDetector::new(RuleSet::default());

        let first = det.poll_once(&store, at(12, 1)).unwrap();
        assert!(matches!(first, PollOutcome::Processed { ref alerts, .. } if alerts.len() == 1));
        let second = det.poll_once(&store, at(12, 2)).unwrap();
        assert_eq!(second, PollOutcome::Duplicate(at(12, 0)));
        assert_eq!(store.len(store::ALERTS), 1);
    }

    #[test]
    fn only_newest_reading_is_evaluated() {
        let store = MemoryStore::new();
        push(&store, &Reading::new(at(12, 5), 5.0, 0.0, 3.0, 60.0, Fault::None));
        push(&store, &Reading::new(at(12, 0), 5.0, 0.0, 3.0, 10.0, Fault::None));
        let mut det = StreamingDetector::new(RuleSet::default());

        let outcome = det.poll_once(&store, at(12, 6)).unwrap();
        assert_eq!(
            outcome,
            PollOutcome::Processed {
                timestamp: at(12, 5),
                alerts: vec![],
            }
        );
    }

    #[test]
    fn alerts_are_appended_with_detection_time() {
        let store = MemoryStore::new();
        push(&store, &Reading::new(at(12, 0), 0.0, 6.0, 1.0, 99.0, Fault::None));
        let mut det = StreamingDetector::new(RuleSet::default());
        det.poll_once(&store, at(12, 30)).unwrap();

        let stored = store.get(store::ALERTS).unwrap().unwrap();
        let alerts: Vec<Alert> = stored
            .as_object()
            .unwrap()
            .values()
            .map(|v| serde_json::from_value(v.clone()).unwrap())
            .collect();
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().all(|a| a.timestamp == at(12, 30)));
        assert!(alerts.iter().any(|a| a.alert_type == AlertType::PanelFault));
    }

    #[test]
    fn malformed_newest_record_is_an_error_not_a_panic() {
        let store = MemoryStore::new();
        store
            .append(store::LIVE_DATA, &json!({"timestamp": "2024-06-01T12:00:00"}))
            .unwrap();
        let mut det = StreamingDetector::new(RuleSet::default());
        assert!(det.poll_once(&store, at(12, 1)).is_err());
        assert_eq!(det.last_seen(), None);
    }
}
