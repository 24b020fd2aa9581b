//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};

use microgrid_sim::store::{self, MemoryStore};
use microgrid_sim::telemetry::{Fault, Reading};

/// Monday 2024-06-03, 12:00 local.
pub fn noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 3)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .expect("valid fixture date")
}

/// Healthy reading `offset_secs` after [`noon`].
pub fn reading(offset_secs: i64, solar_kw: f64, wind_kw: f64, consumption_kw: f64, soc: f64) -> Reading {
    Reading::new(
        noon() + Duration::seconds(offset_secs),
        solar_kw,
        wind_kw,
        consumption_kw,
        soc,
        Fault::None,
    )
}

/// Store holding `readings` in `live_data`, in the given order.
pub fn store_with(readings: &[Reading]) -> MemoryStore {
    let store = MemoryStore::new();
    for r in readings {
        store::append_record(&store, store::LIVE_DATA, r).expect("memory append");
    }
    store
}

/// `n` readings, one per 5 s tick, with a full battery and surplus generation.
pub fn overflowing(n: i64) -> Vec<Reading> {
    (0..n).map(|i| reading(5 * i, 4.0, 1.0, 2.0, 98.0)).collect()
}
