//! # Pipeline Lifecycle
//!
//! Components are simple on their own; wiring them is where the care goes.
//! [`PipelineSystem`] creates every component, spawns its task, connects the
//! ports and tears it all down again.
//!
//! ## Topology
//!
//! ```text
//! Scheduler ──► BackpressureQueue ──► RoundRobin ──► worker 0..N
//!                     ▲                                   │
//!                     └────────────── ack ────────────────┤
//!                                                         ▼
//!                      results ◄── ChannelRouter ("worker-i" keys) ──► sink_all
//! ```
//!
//! Each worker output has two edges: the queue's acknowledgment input and the
//! router. A result therefore releases a permit and is published in one emit.
//!
//! ## Shutdown
//!
//! Components stop when nothing can reach their inputs any more. The ack edge
//! closes a loop (queue → balancer → workers → queue), so
//! [`PipelineSystem::shutdown`] first stops the scheduler, then cuts the queue's
//! data output before dropping the handles and awaiting every task:
//!
//! 1. Abort periodic production.
//! 2. Disconnect the queue from the balancer.
//! 3. Drop handles; the balancer, workers, queue and router drain and exit.
//! 4. Await each task, surfacing panics as [`SampleError::TaskFailed`].
//!
//! [`SampleError::TaskFailed`]: crate::error::SampleError::TaskFailed
//!
//! ## Configuration
//!
//! [`PipelineConfig`] derives `serde` so an embedding application can load it;
//! every field has a default. Log verbosity comes from `RUST_LOG`.

pub mod pipeline;

pub use pipeline::*;
