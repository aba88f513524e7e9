//! # Flow Sample
//!
//! A job pipeline assembled from the `actor-flow` components, exposed as a
//! library for integration testing. See [`lifecycle::PipelineSystem`].

pub mod error;
pub mod job;
pub mod lifecycle;
pub mod worker;
