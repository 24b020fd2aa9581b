//! Physical models of the microgrid's generation, load and storage.
//!
//! Every model is pure given its inputs: weather and time of day are passed
//! in explicitly so scenarios can be replayed deterministically.

/// Stationary battery storage model.
pub mod battery;
/// Household demand profile.
pub mod consumption;
/// Solar photovoltaic generation model.
pub mod solar;
pub mod types;
/// Wind turbine generation model.
pub mod wind;

// Re-export the main types for convenience
pub use battery::{Battery, update_battery_soc};
pub use consumption::LoadProfile;
pub use solar::SolarArray;
pub use wind::WindTurbine;
