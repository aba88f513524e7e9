//! # Units and Connectors
//!
//! A *unit* is the substrate's schedulable piece of logic: a Tokio task that
//! owns the receiving end of an unbounded channel and runs a processing function
//! on each message in turn. A unit never starts message N+1 before message N's
//! step has returned, but different units run concurrently on the worker pool.
//!
//! [`spawn_unit`] returns a [`Connector`], the uniform (Input, Output) pair every
//! component exposes for composition.

use crate::port::{Input, Output};
use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, Instrument};

/// A bound (Input, Output) pair.
pub struct Connector<I, O> {
    input: Input<I>,
    output: Output<O>,
}

impl<I, O> Connector<I, O> {
    pub fn new(input: Input<I>, output: Output<O>) -> Self {
        Self { input, output }
    }

    pub fn input(&self) -> &Input<I> {
        &self.input
    }

    pub fn output(&self) -> &Output<O> {
        &self.output
    }

    pub fn into_parts(self) -> (Input<I>, Output<O>) {
        (self.input, self.output)
    }
}

impl<I, O> fmt::Debug for Connector<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("input", &self.input.id())
            .field("output", &self.output.id())
            .finish()
    }
}

impl<I, O> Clone for Connector<I, O> {
    fn clone(&self) -> Self {
        Self {
            input: self.input.clone(),
            output: self.output.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Connector<T, T> {
    /// A unit that re-emits every message unchanged.
    pub fn identity(name: &'static str) -> Self {
        spawn_unit(name, |msg, output: &Output<T>| {
            output.emit(msg);
        })
    }
}

impl<I: Send + 'static, O: Clone + Send + 'static> Connector<I, O> {
    /// A unit that emits `f(msg)` for every message.
    pub fn map<F>(name: &'static str, f: F) -> Self
    where
        F: Fn(I) -> O + Send + 'static,
    {
        spawn_unit(name, move |msg, output: &Output<O>| {
            output.emit(f(msg));
        })
    }
}

/// Creates a unit from a processing function and starts it on the current runtime.
///
/// The handler is given each message together with the unit's [`Output`]; it may
/// emit any number of messages. The unit stops once every clone of its input
/// has been dropped.
///
/// # Panics
///
/// Panics if called outside a Tokio runtime.
pub fn spawn_unit<I, O, F>(name: &'static str, mut handler: F) -> Connector<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
    F: FnMut(I, &Output<O>) + Send + 'static,
{
    let (sender, mut receiver) = mpsc::unbounded_channel::<I>();
    let input = Input::from_sender(sender);
    let output = Output::new();

    let unit_output = output.clone();
    let span = tracing::debug_span!("unit", unit = name, input = %input.id());
    tokio::spawn(
        async move {
            debug!("Unit started");
            let mut processed: u64 = 0;
            while let Some(msg) = receiver.recv().await {
                handler(msg, &unit_output);
                processed += 1;
            }
            debug!(processed, "Unit stopped");
        }
        .instrument(span),
    );

    Connector::new(input, output)
}
