use crate::telemetry::Fault;

/// Process-local state threaded through every generator tick.
///
/// Never persisted. Each tick consumes the previous state and returns the
/// next one, so the simulator loop is the only owner.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorState {
    /// Battery state of charge (percent).
    pub battery_soc: f64,
    /// Fault currently reported with readings.
    pub current_fault: Fault,
    /// Multiplier applied to the solar array's base efficiency.
    pub solar_efficiency_modifier: f64,
}

impl SimulatorState {
    /// Healthy state with the given state of charge.
    pub fn new(battery_soc: f64) -> Self {
        Self {
            battery_soc: battery_soc.clamp(0.0, 100.0),
            current_fault: Fault::None,
            solar_efficiency_modifier: 1.0,
        }
    }
}

impl Default for SimulatorState {
    fn default() -> Self {
        Self::new(70.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_is_healthy() {
        let s = SimulatorState::new(42.0);
        assert_eq!(s.battery_soc, 42.0);
        assert_eq!(s.current_fault, Fault::None);
        assert_eq!(s.solar_efficiency_modifier, 1.0);
    }

    #[test]
    fn initial_soc_is_clamped() {
        assert_eq!(SimulatorState::new(130.0).battery_soc, 100.0);
        assert_eq!(SimulatorState::new(-1.0).battery_soc, 0.0);
    }
}
