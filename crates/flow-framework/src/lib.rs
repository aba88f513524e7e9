//! # Flow Framework
//!
//! The actor substrate the flow-control primitives are built on: just enough
//! of an actor runtime to express message-driven units on top of Tokio.
//!
//! ## Concepts
//!
//! - **Unit**: a Tokio task that processes one message to completion before the
//!   next. Distinct units run truly concurrently on the worker pool.
//! - **[`Input<T>`]**: a non-blocking message sink with identity. `send` hands the
//!   message off and returns.
//! - **[`Output<T>`]**: a message source whose fan-out to inputs can be changed at
//!   any time with `connect`/`disconnect`.
//! - **[`Connector<I, O>`]**: the (Input, Output) pair a unit or component exposes.
//! - **[`Scheduler`]**: an explicit timer handle for delayed and periodic sends.
//!
//! ```rust
//! use flow_framework::{spawn_unit, Output};
//! use flow_framework::mock::Probe;
//!
//! #[tokio::main]
//! async fn main() {
//!     // A unit that splits words.
//!     let words = spawn_unit("words", |line: String, out: &Output<String>| {
//!         for word in line.split_whitespace() {
//!             out.emit(word.to_string());
//!         }
//!     });
//!     let mut probe = Probe::attached(words.output());
//!
//!     words.input().send("hello flow".into()).unwrap();
//!     assert_eq!(probe.take(2).await, vec!["hello", "flow"]);
//! }
//! ```
//!
//! ## Concurrency Model
//!
//! Units never share state through this crate; the only shared structure is an
//! output's edge list, guarded by a `parking_lot::Mutex` and never held while
//! delivering. Components that combine several ports (see the `actor-flow`
//! crate) funnel all of them into one owning task, which is their single
//! mutual-exclusion domain.
//!
//! ## Testing
//!
//! See the [`mock`] module for [`Probe`](mock::Probe), a recording consumer.

pub mod error;
pub mod mock;
pub mod port;
pub mod scheduler;
pub mod tracing;
pub mod unit;

pub use error::FrameworkError;
pub use port::{Input, Output, PortId};
pub use scheduler::{Scheduler, SchedulerTask};
pub use unit::{spawn_unit, Connector};
