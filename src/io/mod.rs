/// CSV export of stored readings.
pub mod export;
