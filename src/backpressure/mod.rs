//! # Backpressure Queue
//!
//! A credit-based queue that bounds the number of messages in flight, meaning
//! emitted on `data_out` but not yet acknowledged.
//!
//! ```text
//!            +---------------------------------+
//! data_in -->| backlog (capacity C) -> permits |--> data_out
//!            |                                 |--> overflow_out
//! acks   --->|                                 |
//!            +---------------------------------+
//! ```
//!
//! - A message that finds the backlog full goes straight to `overflow_out`.
//! - Otherwise it joins the backlog and the queue dispatches while
//!   `outstanding < permits`.
//! - Each acknowledgment returns one permit and triggers another dispatch.
//!
//! Data and acknowledgments usually come from different units. Both feed the
//! queue's single command channel, so enqueue-then-dispatch and
//! ack-then-dispatch are atomic with respect to each other.
//!
//! More acknowledgments than dispatched messages is a wiring bug: the queue
//! logs it and panics instead of clamping the counter.
//!
//! ```rust
//! use actor_flow::backpressure::{BackpressureQueue, QueueConfig};
//! use flow_framework::mock::Probe;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (queue, handle) = BackpressureQueue::<u32>::new(QueueConfig::default().with_permits(2));
//!     tokio::spawn(queue.run());
//!
//!     let mut out = Probe::attached(handle.data_out());
//!     let acks = handle.ack_input::<()>();
//!     for n in 0..4 {
//!         handle.data_in().send(n).unwrap();
//!     }
//!     assert_eq!(out.take(2).await, vec![0, 1]);
//!
//!     acks.send(()).unwrap();
//!     assert_eq!(out.take(1).await, vec![2]);
//! }
//! ```

mod backlog;
mod ledger;

pub use backlog::{Backlog, PriorityBacklog};
pub use ledger::{Admission, FlowLedger, UnbalancedAcknowledgment};

use crate::error::FlowError;
use crate::inspect::Inspect;
use crate::request::{request, Response};
use async_trait::async_trait;
use flow_framework::{Input, Output};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

/// Construction-time parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum backlog length; `None` means unbounded.
    pub backlog_capacity: Option<usize>,
    /// Maximum number of unacknowledged messages.
    pub permits: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backlog_capacity: None,
            permits: 1,
        }
    }
}

impl QueueConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.backlog_capacity = Some(capacity);
        self
    }

    pub fn with_permits(mut self, permits: usize) -> Self {
        self.permits = permits;
        self
    }
}

/// Counter snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct QueueStats {
    pub outstanding: usize,
    pub permits: usize,
    pub backlog_len: usize,
    pub backlog_capacity: Option<usize>,
    pub accepted: u64,
    pub dispatched: u64,
    pub acknowledged: u64,
    pub overflowed: u64,
}

enum QueueCommand<T> {
    Data(T),
    Ack,
    Stats { respond_to: Response<QueueStats> },
}

/// The queue's owning task. Create with [`BackpressureQueue::new`], then spawn
/// [`BackpressureQueue::run`].
pub struct BackpressureQueue<T, B = VecDeque<T>> {
    receiver: mpsc::UnboundedReceiver<QueueCommand<T>>,
    ledger: FlowLedger<T, B>,
    data_out: Output<T>,
    overflow_out: Output<T>,
}

impl<T: Clone + Send + 'static> BackpressureQueue<T> {
    /// A FIFO queue.
    pub fn new(config: QueueConfig) -> (Self, QueueHandle<T>) {
        Self::with_backlog(config, VecDeque::new())
    }
}

impl<T, B> BackpressureQueue<T, B>
where
    T: Clone + Send + 'static,
    B: Backlog<T>,
{
    /// A queue over a caller-supplied backing store.
    pub fn with_backlog(config: QueueConfig, backlog: B) -> (Self, QueueHandle<T>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let data_out = Output::new();
        let overflow_out = Output::new();

        let data_sender = sender.clone();
        let data_in = Input::from_fn(move |msg| {
            data_sender
                .send(QueueCommand::Data(msg))
                .map_err(|_| flow_framework::FrameworkError::UnitClosed)
        });

        let queue = Self {
            receiver,
            ledger: FlowLedger::new(backlog, config.backlog_capacity, config.permits),
            data_out: data_out.clone(),
            overflow_out: overflow_out.clone(),
        };
        let handle = QueueHandle {
            sender,
            data_in,
            data_out,
            overflow_out,
        };
        (queue, handle)
    }

    /// Processes data, acknowledgments and queries until every sender is gone.
    ///
    /// # Panics
    ///
    /// Panics on an [`UnbalancedAcknowledgment`].
    pub async fn run(mut self) {
        let initial = self.ledger.stats();
        info!(
            permits = initial.permits,
            capacity = ?initial.backlog_capacity,
            "Backpressure queue started"
        );

        while let Some(command) = self.receiver.recv().await {
            match command {
                QueueCommand::Data(msg) => match self.ledger.admit(msg) {
                    Admission::Queued => self.dispatch(),
                    Admission::Overflow(msg) => {
                        debug!("Backlog full, overflowing message");
                        self.overflow_out.emit(msg);
                    }
                },
                QueueCommand::Ack => {
                    if let Err(e) = self.ledger.acknowledge() {
                        error!(error = %e, "Acknowledgment without outstanding message");
                        panic!("{e}");
                    }
                    trace!(outstanding = self.ledger.outstanding(), "Ack");
                    self.dispatch();
                }
                QueueCommand::Stats { respond_to } => {
                    let _ = respond_to.send(self.ledger.stats());
                }
            }
        }

        let stats = self.ledger.stats();
        info!(
            dispatched = stats.dispatched,
            acknowledged = stats.acknowledged,
            overflowed = stats.overflowed,
            backlog = stats.backlog_len,
            "Backpressure queue shutdown"
        );
    }

    fn dispatch(&mut self) {
        while let Some(msg) = self.ledger.next_dispatch() {
            self.data_out.emit(msg);
        }
    }
}

/// Cloneable access to a running queue's ports.
pub struct QueueHandle<T> {
    sender: mpsc::UnboundedSender<QueueCommand<T>>,
    data_in: Input<T>,
    data_out: Output<T>,
    overflow_out: Output<T>,
}

impl<T: Send + 'static> QueueHandle<T> {
    pub fn data_in(&self) -> &Input<T> {
        &self.data_in
    }

    pub fn data_out(&self) -> &Output<T> {
        &self.data_out
    }

    pub fn overflow_out(&self) -> &Output<T> {
        &self.overflow_out
    }

    /// A fresh acknowledgment input. Only arrivals count; the token is dropped.
    pub fn ack_input<R: Send + 'static>(&self) -> Input<R> {
        let sender = self.sender.clone();
        Input::from_fn(move |_token: R| {
            sender
                .send(QueueCommand::Ack)
                .map_err(|_| flow_framework::FrameworkError::UnitClosed)
        })
    }
}

impl<T> Clone for QueueHandle<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            data_in: self.data_in.clone(),
            data_out: self.data_out.clone(),
            overflow_out: self.overflow_out.clone(),
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Inspect for QueueHandle<T> {
    type Stats = QueueStats;

    fn label(&self) -> &'static str {
        "backpressure-queue"
    }

    async fn stats(&self) -> Result<QueueStats, FlowError> {
        request(&self.sender, |respond_to| QueueCommand::Stats { respond_to }).await
    }
}
