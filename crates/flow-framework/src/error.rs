//! # Framework Errors
//!
//! Errors raised by the substrate itself. Components built on top of the
//! substrate wrap these in their own error types.

/// Errors that can occur within the actor substrate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameworkError {
    #[error("Unit closed")]
    UnitClosed,
    #[error("Unit dropped response channel")]
    ActorDropped,
}
