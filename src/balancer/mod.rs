//! # Load Balancers
//!
//! One input, a fixed number of outputs, and a strategy that picks exactly one
//! output per message. The balancer never duplicates a message; only
//! [`MarkovBalancer`] may decline to route one, which is counted as
//! `unrouted` in the stats.
//!
//! | Strategy | Rule |
//! |----------|------|
//! | [`RoundRobin`] | rotate through `0..N` |
//! | [`WeightBalancer`] | lowest cumulative cost, ties to lowest index |
//! | [`MarkovBalancer`] | first threshold above a seeded uniform draw |
//!
//! ```rust
//! use actor_flow::balancer::{Balancer, RoundRobin};
//! use flow_framework::mock::Probe;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (balancer, handle) = Balancer::new(RoundRobin::new(2).unwrap());
//!     tokio::spawn(balancer.run());
//!
//!     let mut even = Probe::attached(handle.output(0).unwrap());
//!     let mut odd = Probe::attached(handle.output(1).unwrap());
//!     for n in 0..4u32 {
//!         handle.input().send(n).unwrap();
//!     }
//!     assert_eq!(even.take(2).await, vec![0, 2]);
//!     assert_eq!(odd.take(2).await, vec![1, 3]);
//! }
//! ```

mod least_loaded;
mod round_robin;
mod weighted_random;

pub use least_loaded::WeightBalancer;
pub use round_robin::RoundRobin;
pub use weighted_random::MarkovBalancer;

use crate::error::FlowError;
use crate::inspect::Inspect;
use crate::request::{request, Response};
use async_trait::async_trait;
use flow_framework::{FrameworkError, Input, Output};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

/// Picks the destination for each message.
pub trait SelectionStrategy<T>: Send + 'static {
    fn name(&self) -> &'static str;

    /// Number of destinations; fixed for the strategy's lifetime.
    fn arity(&self) -> usize;

    /// `Some(i)` routes to output `i`; `None` leaves the message unrouted.
    fn select(&mut self, msg: &T) -> Option<usize>;

    /// Per-destination cumulative cost, for strategies that track one.
    fn costs(&self) -> Vec<u64> {
        Vec::new()
    }
}

pub(crate) fn check_arity(arity: usize) -> Result<(), FlowError> {
    if arity == 0 {
        return Err(FlowError::InvalidConfig(
            "a balancer needs at least one destination".into(),
        ));
    }
    Ok(())
}

/// Counter snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalancerStats {
    pub strategy: &'static str,
    /// Messages routed to each destination.
    pub routed: Vec<u64>,
    pub unrouted: u64,
    pub costs: Vec<u64>,
}

enum BalancerCommand<T> {
    Data(T),
    Stats { respond_to: Response<BalancerStats> },
}

/// The balancer's owning task.
pub struct Balancer<T, S> {
    receiver: mpsc::UnboundedReceiver<BalancerCommand<T>>,
    strategy: S,
    outputs: Vec<Output<T>>,
    routed: Vec<u64>,
    unrouted: u64,
}

impl<T, S> Balancer<T, S>
where
    T: Clone + Send + 'static,
    S: SelectionStrategy<T>,
{
    pub fn new(strategy: S) -> (Self, BalancerHandle<T>) {
        let arity = strategy.arity();
        let (sender, receiver) = mpsc::unbounded_channel();
        let outputs: Vec<Output<T>> = (0..arity).map(|_| Output::new()).collect();

        let data_sender = sender.clone();
        let input = Input::from_fn(move |msg| {
            data_sender
                .send(BalancerCommand::Data(msg))
                .map_err(|_| FrameworkError::UnitClosed)
        });

        let balancer = Self {
            receiver,
            strategy,
            outputs: outputs.clone(),
            routed: vec![0; arity],
            unrouted: 0,
        };
        let handle = BalancerHandle {
            sender,
            input,
            outputs,
        };
        (balancer, handle)
    }

    pub async fn run(mut self) {
        let strategy = self.strategy.name();
        info!(strategy, arity = self.outputs.len(), "Balancer started");

        while let Some(command) = self.receiver.recv().await {
            match command {
                BalancerCommand::Data(msg) => self.route(msg),
                BalancerCommand::Stats { respond_to } => {
                    let _ = respond_to.send(self.snapshot());
                }
            }
        }

        info!(strategy, routed = ?self.routed, unrouted = self.unrouted, "Balancer shutdown");
    }

    fn route(&mut self, msg: T) {
        match self.strategy.select(&msg) {
            Some(index) if index < self.outputs.len() => {
                trace!(index, "Routed");
                self.routed[index] += 1;
                self.outputs[index].emit(msg);
            }
            Some(index) => {
                // A strategy returning an index past its own arity is a bug in the strategy.
                debug!(index, arity = self.outputs.len(), "Strategy chose a missing output");
                self.unrouted += 1;
            }
            None => {
                debug!("No destination selected, message unrouted");
                self.unrouted += 1;
            }
        }
    }

    fn snapshot(&self) -> BalancerStats {
        BalancerStats {
            strategy: self.strategy.name(),
            routed: self.routed.clone(),
            unrouted: self.unrouted,
            costs: self.strategy.costs(),
        }
    }
}

/// Cloneable access to a running balancer's ports.
pub struct BalancerHandle<T> {
    sender: mpsc::UnboundedSender<BalancerCommand<T>>,
    input: Input<T>,
    outputs: Vec<Output<T>>,
}

impl<T> BalancerHandle<T> {
    pub fn input(&self) -> &Input<T> {
        &self.input
    }

    /// Output `index`, or `None` past the balancer's arity.
    pub fn output(&self, index: usize) -> Option<&Output<T>> {
        self.outputs.get(index)
    }

    pub fn outputs(&self) -> &[Output<T>] {
        &self.outputs
    }

    pub fn arity(&self) -> usize {
        self.outputs.len()
    }
}

impl<T> Clone for BalancerHandle<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            input: self.input.clone(),
            outputs: self.outputs.clone(),
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Inspect for BalancerHandle<T> {
    type Stats = BalancerStats;

    fn label(&self) -> &'static str {
        "balancer"
    }

    async fn stats(&self) -> Result<BalancerStats, FlowError> {
        request(&self.sender, |respond_to| BalancerCommand::Stats { respond_to }).await
    }
}
