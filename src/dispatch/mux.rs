use super::{DispatchStats, Envelope};
use crate::error::FlowError;
use crate::inspect::Inspect;
use crate::request::{request, Response};
use async_trait::async_trait;
use flow_framework::{FrameworkError, Input, Output};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use tokio::sync::mpsc;
use tracing::{debug, info};

enum MuxCommand<K, T> {
    Data(Envelope<K, T>),
    InputOpened,
    Stats { respond_to: Response<DispatchStats> },
}

/// Funnels any number of named inputs into one stream of envelopes.
pub struct Multiplexer<K, T> {
    receiver: mpsc::UnboundedReceiver<MuxCommand<K, T>>,
    output: Output<Envelope<K, T>>,
    inputs_opened: usize,
    forwarded: u64,
}

impl<K, T> Multiplexer<K, T>
where
    K: Clone + Send + 'static,
    T: Clone + Send + 'static,
{
    pub fn new() -> (Self, MultiplexerHandle<K, T>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let output = Output::new();
        let mux = Self {
            receiver,
            output: output.clone(),
            inputs_opened: 0,
            forwarded: 0,
        };
        (mux, MultiplexerHandle { sender, output })
    }

    pub async fn run(mut self) {
        info!("Multiplexer started");
        while let Some(command) = self.receiver.recv().await {
            match command {
                MuxCommand::Data(envelope) => {
                    self.forwarded += 1;
                    self.output.emit(envelope);
                }
                MuxCommand::InputOpened => self.inputs_opened += 1,
                MuxCommand::Stats { respond_to } => {
                    let _ = respond_to.send(DispatchStats {
                        routed: self.forwarded,
                        defaulted: 0,
                        routes: self.inputs_opened,
                    });
                }
            }
        }
        info!(forwarded = self.forwarded, "Multiplexer shutdown");
    }
}

pub struct MultiplexerHandle<K, T> {
    sender: mpsc::UnboundedSender<MuxCommand<K, T>>,
    output: Output<Envelope<K, T>>,
}

impl<K, T> MultiplexerHandle<K, T>
where
    K: Clone + Send + Sync + 'static,
    T: Send + 'static,
{
    /// A new input whose messages are tagged with `key`.
    ///
    /// Calling this twice with the same key yields two distinct endpoints that
    /// feed the same tag; each counts as a route in the stats.
    pub fn input(&self, key: K) -> Input<T> {
        if self.sender.send(MuxCommand::InputOpened).is_err() {
            debug!("Input opened on a stopped multiplexer");
        }
        let sender = self.sender.clone();
        Input::from_fn(move |message| {
            sender
                .send(MuxCommand::Data(Envelope::new(key.clone(), message)))
                .map_err(|_| FrameworkError::UnitClosed)
        })
    }

    pub fn output(&self) -> &Output<Envelope<K, T>> {
        &self.output
    }
}

impl<K, T> Clone for MultiplexerHandle<K, T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            output: self.output.clone(),
        }
    }
}

#[async_trait]
impl<K: Send + Sync + 'static, T: Send + 'static> Inspect for MultiplexerHandle<K, T> {
    type Stats = DispatchStats;

    fn label(&self) -> &'static str {
        "multiplexer"
    }

    async fn stats(&self) -> Result<DispatchStats, FlowError> {
        request(&self.sender, |respond_to| MuxCommand::Stats { respond_to }).await
    }
}

enum DemuxCommand<K, T> {
    Data(Envelope<K, T>),
    Output {
        key: K,
        respond_to: Response<Output<T>>,
    },
    Stats {
        respond_to: Response<DispatchStats>,
    },
}

/// Splits a stream of envelopes into per-key outputs.
///
/// Outputs are created on first reference through
/// [`DemultiplexerHandle::output`]. Envelopes whose key has no output yet go
/// to the dead-letter output unchanged.
pub struct Demultiplexer<K, T> {
    receiver: mpsc::UnboundedReceiver<DemuxCommand<K, T>>,
    outputs: HashMap<K, Output<T>>,
    dead_letter: Output<Envelope<K, T>>,
    stats: DispatchStats,
}

impl<K, T> Demultiplexer<K, T>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
    T: Clone + Send + 'static,
{
    pub fn new() -> (Self, DemultiplexerHandle<K, T>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let dead_letter = Output::new();

        let data_sender = sender.clone();
        let input = Input::from_fn(move |envelope| {
            data_sender
                .send(DemuxCommand::Data(envelope))
                .map_err(|_| FrameworkError::UnitClosed)
        });

        let demux = Self {
            receiver,
            outputs: HashMap::new(),
            dead_letter: dead_letter.clone(),
            stats: DispatchStats::default(),
        };
        let handle = DemultiplexerHandle {
            sender,
            input,
            dead_letter,
        };
        (demux, handle)
    }

    pub async fn run(mut self) {
        info!("Demultiplexer started");
        while let Some(command) = self.receiver.recv().await {
            match command {
                DemuxCommand::Data(envelope) => match self.outputs.get(&envelope.key) {
                    Some(output) => {
                        self.stats.routed += 1;
                        output.emit(envelope.message);
                    }
                    None => {
                        self.stats.defaulted += 1;
                        debug!(key = ?envelope.key, "No output for key, dead-lettering");
                        self.dead_letter.emit(envelope);
                    }
                },
                DemuxCommand::Output { key, respond_to } => {
                    let output = self
                        .outputs
                        .entry(key)
                        .or_insert_with_key(|key| {
                            debug!(?key, "Creating output");
                            Output::new()
                        })
                        .clone();
                    let _ = respond_to.send(output);
                }
                DemuxCommand::Stats { respond_to } => {
                    let _ = respond_to.send(DispatchStats {
                        routes: self.outputs.len(),
                        ..self.stats.clone()
                    });
                }
            }
        }
        info!(
            routed = self.stats.routed,
            dead_lettered = self.stats.defaulted,
            "Demultiplexer shutdown"
        );
    }
}

pub struct DemultiplexerHandle<K, T> {
    sender: mpsc::UnboundedSender<DemuxCommand<K, T>>,
    input: Input<Envelope<K, T>>,
    dead_letter: Output<Envelope<K, T>>,
}

impl<K, T> DemultiplexerHandle<K, T>
where
    K: Send + 'static,
    T: Send + 'static,
{
    pub fn input(&self) -> &Input<Envelope<K, T>> {
        &self.input
    }

    /// The output for `key`, created on first reference.
    pub async fn output(&self, key: K) -> Result<Output<T>, FlowError> {
        request(&self.sender, |respond_to| DemuxCommand::Output {
            key,
            respond_to,
        })
        .await
    }

    pub fn dead_letter(&self) -> &Output<Envelope<K, T>> {
        &self.dead_letter
    }
}

impl<K, T> Clone for DemultiplexerHandle<K, T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            input: self.input.clone(),
            dead_letter: self.dead_letter.clone(),
        }
    }
}

#[async_trait]
impl<K: Send + Sync + 'static, T: Send + 'static> Inspect for DemultiplexerHandle<K, T> {
    type Stats = DispatchStats;

    fn label(&self) -> &'static str {
        "demultiplexer"
    }

    async fn stats(&self) -> Result<DispatchStats, FlowError> {
        request(&self.sender, |respond_to| DemuxCommand::Stats { respond_to }).await
    }
}
