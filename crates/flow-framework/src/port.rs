//! # Ports
//!
//! Units talk to each other through two kinds of port:
//!
//! - [`Input<T>`]: a message sink. `send` hands the message to the receiving
//!   unit's queue and returns immediately.
//! - [`Output<T>`]: a message source with a mutable fan-out. Every message
//!   emitted on an output is delivered to each connected input.
//!
//! Ports have identity. Two inputs that feed the same unit are still distinct
//! endpoints unless they are clones of each other, which lets registries
//! (router subscriptions, publisher tables) deduplicate by [`PortId`].

use crate::error::FrameworkError;
use parking_lot::Mutex;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

static NEXT_PORT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an [`Input`] or [`Output`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(u64);

impl PortId {
    pub fn next() -> Self {
        Self(NEXT_PORT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port-{}", self.0)
    }
}

type Deliver<T> = Arc<dyn Fn(T) -> Result<(), FrameworkError> + Send + Sync>;

/// A non-blocking message sink.
///
/// Cloning an input yields the *same* endpoint (same [`PortId`]); use
/// [`Input::map`] or [`Input::from_fn`] to build a new one.
pub struct Input<T> {
    id: PortId,
    deliver: Deliver<T>,
}

impl<T: Send + 'static> Input<T> {
    /// An input feeding an unbounded channel.
    pub fn from_sender(sender: mpsc::UnboundedSender<T>) -> Self {
        Self::from_fn(move |msg| sender.send(msg).map_err(|_| FrameworkError::UnitClosed))
    }

    /// An input backed by an arbitrary hand-off function.
    ///
    /// The function must not block; it is called on the sender's thread.
    pub fn from_fn<F>(deliver: F) -> Self
    where
        F: Fn(T) -> Result<(), FrameworkError> + Send + Sync + 'static,
    {
        Self {
            id: PortId::next(),
            deliver: Arc::new(deliver),
        }
    }

    /// Builds a new input that converts `S` into `T` before handing it here.
    pub fn map<S, F>(&self, f: F) -> Input<S>
    where
        S: Send + 'static,
        F: Fn(S) -> T + Send + Sync + 'static,
    {
        let target = self.clone();
        Input::from_fn(move |msg| target.send(f(msg)))
    }

    /// Hands `msg` to the receiving unit without waiting for it to be processed.
    pub fn send(&self, msg: T) -> Result<(), FrameworkError> {
        (self.deliver)(msg)
    }
}

impl<T> Input<T> {
    pub fn id(&self) -> PortId {
        self.id
    }
}

impl<T> Clone for Input<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            deliver: Arc::clone(&self.deliver),
        }
    }
}

impl<T> PartialEq for Input<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Input<T> {}

impl<T> Hash for Input<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for Input<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Input").field("id", &self.id).finish()
    }
}

/// A message source with a mutable set of connected inputs.
///
/// Clones share the same edge set, so a unit can keep one clone for emitting
/// while the wiring code keeps another for `connect`/`disconnect`.
pub struct Output<T> {
    id: PortId,
    edges: Arc<Mutex<Vec<Input<T>>>>,
}

impl<T> Output<T> {
    pub fn new() -> Self {
        Self {
            id: PortId::next(),
            edges: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn id(&self) -> PortId {
        self.id
    }

    /// Adds an edge to `input`. Returns `false` if it was already connected.
    pub fn connect(&self, input: &Input<T>) -> bool {
        let mut edges = self.edges.lock();
        if edges.iter().any(|edge| edge.id == input.id) {
            return false;
        }
        edges.push(input.clone());
        true
    }

    /// Removes the edge to `input`. Returns `false` if it was not connected.
    pub fn disconnect(&self, input: &Input<T>) -> bool {
        let mut edges = self.edges.lock();
        let before = edges.len();
        edges.retain(|edge| edge.id != input.id);
        edges.len() != before
    }

    pub fn is_connected(&self, input: &Input<T>) -> bool {
        self.edges.lock().iter().any(|edge| edge.id == input.id)
    }

    pub fn edge_count(&self) -> usize {
        self.edges.lock().len()
    }
}

impl<T: Clone + Send + 'static> Output<T> {
    /// Delivers `msg` to every connected input and returns how many accepted it.
    ///
    /// Edges whose unit has shut down are dropped from the fan-out.
    pub fn emit(&self, msg: T) -> usize {
        // Snapshot so that sends happen outside the lock.
        let edges: Vec<Input<T>> = self.edges.lock().clone();
        let Some((last, rest)) = edges.split_last() else {
            trace!(output = %self.id, "Emit with no edges");
            return 0;
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for edge in rest {
            match edge.send(msg.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => closed.push(edge.id),
            }
        }
        match last.send(msg) {
            Ok(()) => delivered += 1,
            Err(_) => closed.push(last.id),
        }

        if !closed.is_empty() {
            debug!(output = %self.id, closed = closed.len(), "Pruning closed edges");
            self.edges.lock().retain(|edge| !closed.contains(&edge.id));
        }
        delivered
    }
}

impl<T> Default for Output<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Output<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            edges: Arc::clone(&self.edges),
        }
    }
}

impl<T> PartialEq for Output<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Output<T> {}

impl<T> Hash for Output<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for Output<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("id", &self.id)
            .field("edges", &self.edge_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_identity_and_maps_do_not() {
        let (tx, _rx) = mpsc::unbounded_channel::<u32>();
        let input = Input::from_sender(tx);
        let same = input.clone();
        let mapped = input.map(|s: String| s.len() as u32);
        assert_eq!(input, same);
        assert_ne!(input.id(), mapped.id());
    }

    #[test]
    fn emit_fans_out_and_prunes_closed_edges() {
        let (tx_a, mut rx_a) = mpsc::unbounded_channel::<u32>();
        let (tx_b, rx_b) = mpsc::unbounded_channel::<u32>();
        let a = Input::from_sender(tx_a);
        let b = Input::from_sender(tx_b);

        let output = Output::new();
        assert!(output.connect(&a));
        assert!(!output.connect(&a));
        assert!(output.connect(&b));

        assert_eq!(output.emit(7), 2);
        assert_eq!(rx_a.try_recv(), Ok(7));

        drop(rx_b);
        assert_eq!(output.emit(8), 1);
        assert_eq!(output.edge_count(), 1);
        assert!(output.disconnect(&a));
        assert!(!output.disconnect(&a));
        assert_eq!(output.emit(9), 0);
    }
}
