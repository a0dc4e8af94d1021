use thiserror::Error;

// ---------------------------------------------------------------------------
// Boundary errors
// ---------------------------------------------------------------------------

/// Errors reported at the ingestion/mutation boundary.
///
/// The control loop itself is total: `step` always returns a force buffer.
/// Only configuration and geometry mutators can fail, and a failed mutator
/// leaves the core unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GncError {
    #[error("non-finite value in {0}")]
    NonFinite(&'static str),

    #[error("mass must be positive, got {0}")]
    InvalidMass(f64),

    #[error("box dimensions must all be positive, got ({0}, {1}, {2})")]
    InvalidDimensions(f64, f64, f64),

    #[error("expected {expected} thrusters, got {got}")]
    ThrusterCount { expected: usize, got: usize },

    #[error("thruster group {0} is empty")]
    EmptyGroup(&'static str),

    #[error("thruster index {0} out of range")]
    ThrusterIndex(usize),

    #[error("capacity for thruster {index} must be non-negative, got {value}")]
    NegativeCapacity { index: usize, value: f64 },

    #[error("update rate {0} Hz outside supported range 5..=120")]
    InvalidUpdateRate(f64),
}
