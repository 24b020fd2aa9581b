//! Microgrid telemetry simulator, rules engine, and analytics jobs.

pub mod analytics;
#[cfg(feature = "api")]
pub mod api;
pub mod cli;
pub mod config;
/// Physical generation, load, and storage models.
pub mod devices;
pub mod error;
pub mod forecast;
pub mod io;
pub mod jobs;
pub mod logging;
pub mod report;
pub mod rules;
pub mod shutdown;
/// Fault injection, tick clock, and the telemetry generator.
pub mod sim;
pub mod store;
pub mod telemetry;
pub mod transport;
pub mod weather;
