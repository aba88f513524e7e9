//! # Mock Consumers & Testing Guide
//!
//! A [`Probe<T>`] is an in-memory consumer: it exposes an [`Input<T>`] like any
//! unit would, but instead of processing messages it records them so a test
//! can assert on what arrived and in which order.
//!
//! ## Observing an output
//!
//! ```rust
//! use flow_framework::mock::Probe;
//! use flow_framework::Connector;
//!
//! #[tokio::main]
//! async fn main() {
//!     let doubler = Connector::map("doubler", |n: u32| n * 2);
//!     let mut probe = Probe::attached(doubler.output());
//!
//!     doubler.input().send(21).unwrap();
//!     assert_eq!(probe.recv().await, Some(42));
//! }
//! ```
//!
//! ## Deterministic draining
//!
//! Component actors emit synchronously while handling a command, so once a
//! request/response call to the component (such as `stats()`) has returned,
//! every message caused by earlier commands is already sitting in the probe.
//! [`Probe::drain`] then collects them without waiting.
//!
//! Messages that travel through extra units (mediators, floors) arrive
//! asynchronously; use [`Probe::recv`] or [`Probe::take`] for those.

use crate::port::{Input, Output};
use std::time::Duration;
use tokio::sync::mpsc;

/// How long [`Probe::recv`] waits before giving up.
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// A recording consumer for tests.
pub struct Probe<T> {
    input: Input<T>,
    receiver: mpsc::UnboundedReceiver<T>,
    timeout: Duration,
}

impl<T: Send + 'static> Probe<T> {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            input: Input::from_sender(sender),
            receiver,
            timeout: DEFAULT_RECV_TIMEOUT,
        }
    }

    /// A probe already connected to `output`.
    pub fn attached(output: &Output<T>) -> Self {
        let probe = Self::new();
        output.connect(&probe.input);
        probe
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn input(&self) -> Input<T> {
        self.input.clone()
    }

    /// Waits for the next message, or `None` after the probe's timeout.
    pub async fn recv(&mut self) -> Option<T> {
        tokio::time::timeout(self.timeout, self.receiver.recv())
            .await
            .ok()
            .flatten()
    }

    /// Waits for exactly `n` messages.
    ///
    /// # Panics
    ///
    /// Panics if fewer than `n` arrive before the timeout.
    pub async fn take(&mut self, n: usize) -> Vec<T> {
        let mut received = Vec::with_capacity(n);
        while received.len() < n {
            match self.recv().await {
                Some(msg) => received.push(msg),
                None => panic!("Probe expected {n} messages, got {}", received.len()),
            }
        }
        received
    }

    /// Everything that has already arrived, without waiting.
    pub fn drain(&mut self) -> Vec<T> {
        let mut received = Vec::new();
        while let Ok(msg) = self.receiver.try_recv() {
            received.push(msg);
        }
        received
    }

    /// Asserts that nothing arrives within `window`.
    ///
    /// # Panics
    ///
    /// Panics if a message arrives.
    pub async fn expect_silence(&mut self, window: Duration) {
        if let Ok(Some(_)) = tokio::time::timeout(window, self.receiver.recv()).await {
            panic!("Probe expected silence but received a message");
        }
    }
}

impl<T: Send + 'static> Default for Probe<T> {
    fn default() -> Self {
        Self::new()
    }
}
