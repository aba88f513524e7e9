//! # Keyed Dispatch
//!
//! Combinators that route by an extracted key or by ordered predicates.
//!
//! - [`Multiplexer`] / [`Demultiplexer`]: many named inputs into one stream of
//!   [`Envelope`]s, and back out to per-key outputs.
//! - [`TableSwitch`] / [`LookupSwitch`]: one input to one of several outputs,
//!   chosen by O(1) key lookup or by the first matching predicate.
//! - [`TableTower`] / [`LookupTower`]: the same routing into sub-pipelines
//!   ("floors") whose outputs are funneled back into one tower output. Floors
//!   can be added and removed while the tower runs.
//!
//! Anything that matches no route goes to a dead-letter or default output;
//! routing misses are never errors.
//!
//! The two towers differ on registration checks: the table
//! tower rejects a duplicate key on add and an unknown key on remove, the
//! lookup tower accepts every add and ignores removals of unknown floors.

mod envelope;
mod mux;
mod switch;
mod tower;

pub use envelope::Envelope;
pub use mux::{Demultiplexer, DemultiplexerHandle, Multiplexer, MultiplexerHandle};
pub use switch::{
    LookupRoutes, LookupSwitch, RouteTable, Switch, SwitchHandle, TableRoutes, TableSwitch,
};
pub use tower::{FloorId, LookupTower, LookupTowerHandle, TableTower, TableTowerHandle};

use serde::Serialize;

/// A boxed message predicate, evaluated in registration order.
pub type Predicate<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// Boxes a closure as a [`Predicate`].
pub fn predicate<T, F>(f: F) -> Predicate<T>
where
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    Box::new(f)
}

/// Counter snapshot shared by every dispatch component.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DispatchStats {
    /// Messages that matched a route.
    pub routed: u64,
    /// Messages sent to the dead-letter or default output.
    pub defaulted: u64,
    /// Routes currently registered (keys, predicates or floors).
    pub routes: usize,
}
