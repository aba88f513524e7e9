//! # Actor Flow
//!
//! Composable flow-control and routing primitives for pipelines built on the
//! [`flow_framework`] actor substrate.
//!
//! ## Components
//!
//! | Module | Component | Purpose |
//! |--------|-----------|---------|
//! | [`backpressure`] | [`BackpressureQueue`] | bound unacknowledged in-flight messages |
//! | [`router`] | [`ChannelRouter`] | dynamic publish/subscribe with `sink_all` and `sink_dead` |
//! | [`balancer`] | [`Balancer`] | round robin, least loaded, weighted random |
//! | [`dispatch`] | multiplexers, switches, towers | keyed and predicate routing |
//!
//! ## One shape for every component
//!
//! ```rust,ignore
//! let (component, handle) = Component::new(config);
//! tokio::spawn(component.run());
//! upstream.connect(handle.input());
//! handle.output().connect(&downstream);
//! ```
//!
//! The component value owns all mutable state and the receiving end of a
//! private command channel. Every port the handle exposes, every registration
//! call and every stats query is a command on that channel, so the component's
//! task is its single mutual-exclusion domain. Nothing in this crate takes a
//! lock on the message path, and no call blocks: `send` hands off and returns.
//!
//! ## Outcomes, not exceptions
//!
//! Overflow, dead letters and unmatched messages are delivered to dedicated
//! outputs so downstream units can react in-band. Only contract breaches are
//! errors: invalid configuration and duplicate or unknown table-tower floors
//! come back as [`FlowError`], and an acknowledgment with nothing outstanding
//! panics the queue's task.
//!
//! ## Shutdown
//!
//! A component's `run` future completes once its handle, its inputs and every
//! output edge pointing at those inputs have been dropped.

pub mod backpressure;
pub mod balancer;
pub mod dispatch;
pub mod error;
pub mod inspect;
mod request;
pub mod router;

pub use backpressure::{BackpressureQueue, QueueConfig, QueueHandle, QueueStats};
pub use balancer::{Balancer, BalancerHandle, MarkovBalancer, RoundRobin, WeightBalancer};
pub use dispatch::{Envelope, LookupTower, Multiplexer, TableTower};
pub use error::FlowError;
pub use inspect::Inspect;
pub use router::{ChannelRouter, RouterHandle, RouterMode};
