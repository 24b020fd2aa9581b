//! Stochastic panel-degradation fault injector.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use super::state::SimulatorState;
use crate::telemetry::Fault;

/// Toggles the solar array between healthy and degraded once per tick.
///
/// Two independent Bernoulli checks run every tick in a fixed order:
/// first the degrade check, then the recover check. A tick that rolls both
/// ends recovered. Neither check looks at the current state, so a degraded
/// array can be degraded again.
///
/// # Examples
///
/// ```
/// use microgrid_sim::sim::fault::FaultInjector;
/// use microgrid_sim::sim::state::SimulatorState;
///
/// // Never degrades, never recovers.
/// let mut injector = FaultInjector::new(0.0, 0.0, 0.7, 1);
/// let next = injector.inject(SimulatorState::new(50.0));
/// assert_eq!(next.solar_efficiency_modifier, 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct FaultInjector {
    degrade_probability: f64,
    recover_probability: f64,
    degraded_modifier: f64,
    rng: StdRng,
}

impl FaultInjector {
    /// Creates a new injector.
    ///
    /// # Arguments
    ///
    /// * `degrade_probability` - Per-tick chance of entering the degraded mode
    /// * `recover_probability` - Per-tick chance of returning to full efficiency
    /// * `degraded_modifier` - Solar efficiency multiplier while degraded
    /// * `seed` - Random seed for reproducibility
    ///
    /// # Panics
    ///
    /// Panics if either probability is outside `[0, 1]`.
    pub fn new(
        degrade_probability: f64,
        recover_probability: f64,
        degraded_modifier: f64,
        seed: u64,
    ) -> Self {
        assert!((0.0..=1.0).contains(&degrade_probability));
        assert!((0.0..=1.0).contains(&recover_probability));

        Self {
            degrade_probability,
            recover_probability,
            degraded_modifier,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Rolls both checks and returns the next state.
    pub fn inject(&mut self, state: SimulatorState) -> SimulatorState {
        let degrade = self.rng.random::<f64>() < self.degrade_probability;
        let recover = self.rng.random::<f64>() < self.recover_probability;
        let was_active = state.current_fault.is_active();

        let next = self.transition(state, degrade, recover);
        match (was_active, next.current_fault.is_active()) {
            (false, true) => info!(fault = %next.current_fault, "fault injected"),
            (true, false) => info!("fault cleared"),
            _ => {}
        }
        next
    }

    /// Applies already-rolled outcomes; degrade first, then recover.
    pub fn transition(
        &self,
        mut state: SimulatorState,
        degrade: bool,
        recover: bool,
    ) -> SimulatorState {
        if degrade {
            state.solar_efficiency_modifier = self.degraded_modifier;
            state.current_fault = Fault::PanelDegraded;
        }
        if recover {
            state.solar_efficiency_modifier = 1.0;
            state.current_fault = Fault::None;
        }
        state
    }
}
