//! # Flow Errors
//!
//! Only contract breaches reach the caller as errors. Capacity and routing
//! outcomes (overflow, dead letters, defaults) are alternate outputs instead.

/// Errors reported by flow components.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("Component closed")]
    ActorClosed,
    #[error("Component dropped response channel")]
    ActorDropped,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Floor already registered: {0}")]
    DuplicateFloor(String),
    #[error("Floor not registered: {0}")]
    UnknownFloor(String),
}
