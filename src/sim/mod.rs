/// Nominal tick clock and monotonic wall-clock stamping.
pub mod clock;
pub mod engine;
/// Panel-degradation fault injector.
pub mod fault;
pub mod state;

pub use engine::Generator;
pub use state::SimulatorState;
