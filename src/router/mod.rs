//! # Publish/Subscribe Router
//!
//! A dynamic many-to-many channel registry. Producers publish an [`Output`]
//! under a key, consumers subscribe an [`Input`] under a key, and every message
//! sent on a key reaches every input subscribed to it at that moment.
//!
//! Two side outputs are always active:
//!
//! - **`sink_all`** gets exactly one copy of every message, whatever its key.
//! - **`sink_dead`** gets a message if and only if nobody was subscribed to its
//!   key when it was delivered.
//!
//! ## Mutation discipline
//!
//! Registration changes and deliveries are commands on the router's one channel.
//! A delivery therefore always sees a complete subscription set, never one that
//! is half-way through an update.
//!
//! ## Direct vs mediated publishers
//!
//! In [`RouterMode::Direct`] a published output is connected straight to a
//! keyed router input. In [`RouterMode::Mediated`] the router interposes one
//! private forwarding unit per (key, source) pair, so the producer's thread only
//! ever hands off to the mediator. Duplicate publications collapse onto the
//! existing link in both modes.
//!
//! `publish` and `unpublish` resolve only after the router has rewired the
//! source; subscription changes and sends are fire-and-forget and take effect
//! in command order.

mod registry;

use crate::error::FlowError;
use crate::inspect::Inspect;
use crate::request::{notify, request, Response};
use async_trait::async_trait;
use flow_framework::{Connector, FrameworkError, Input, Output};
use registry::{Link, Publication, Registry};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// How publishers are attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RouterMode {
    #[default]
    Direct,
    Mediated,
}

/// Counter snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RouterStats {
    /// Messages sent through the router.
    pub sent: u64,
    /// Individual hand-offs to subscribers.
    pub delivered: u64,
    pub dead_lettered: u64,
    /// Keys with at least one subscriber.
    pub keys: usize,
    pub subscriptions: usize,
    pub publications: usize,
}

enum RouterCommand<K, T> {
    Publish {
        key: K,
        source: Output<T>,
        sink: Input<T>,
        respond_to: Response<()>,
    },
    Unpublish {
        key: K,
        source: Output<T>,
        respond_to: Response<()>,
    },
    Subscribe { key: K, input: Input<T> },
    Unsubscribe { key: K, input: Input<T> },
    Send { key: K, message: T },
    Stats { respond_to: Response<RouterStats> },
}

/// The router's owning task.
pub struct ChannelRouter<K, T> {
    receiver: mpsc::UnboundedReceiver<RouterCommand<K, T>>,
    mode: RouterMode,
    registry: Registry<K, T>,
    sink_all: Output<T>,
    sink_dead: Output<T>,
    stats: RouterStats,
}

impl<K, T> ChannelRouter<K, T>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
    T: Clone + Send + 'static,
{
    pub fn new() -> (Self, RouterHandle<K, T>) {
        Self::with_mode(RouterMode::Direct)
    }

    /// A router that puts a forwarding unit between each publisher and itself.
    pub fn mediated() -> (Self, RouterHandle<K, T>) {
        Self::with_mode(RouterMode::Mediated)
    }

    pub fn with_mode(mode: RouterMode) -> (Self, RouterHandle<K, T>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let sink_all = Output::new();
        let sink_dead = Output::new();
        let router = Self {
            receiver,
            mode,
            registry: Registry::new(),
            sink_all: sink_all.clone(),
            sink_dead: sink_dead.clone(),
            stats: RouterStats::default(),
        };
        let handle = RouterHandle {
            sender,
            sink_all,
            sink_dead,
        };
        (router, handle)
    }

    pub async fn run(mut self) {
        info!(mode = ?self.mode, "Router started");

        while let Some(command) = self.receiver.recv().await {
            match command {
                RouterCommand::Publish {
                    key,
                    source,
                    sink,
                    respond_to,
                } => {
                    self.publish(key, source, sink);
                    let _ = respond_to.send(());
                }
                RouterCommand::Unpublish {
                    key,
                    source,
                    respond_to,
                } => {
                    self.unpublish(key, source);
                    let _ = respond_to.send(());
                }
                RouterCommand::Subscribe { key, input } => {
                    let added = self.registry.subscribe(key.clone(), input);
                    debug!(?key, added, "Subscribe");
                }
                RouterCommand::Unsubscribe { key, input } => {
                    let removed = self.registry.unsubscribe(&key, &input);
                    debug!(?key, removed, "Unsubscribe");
                }
                RouterCommand::Send { key, message } => self.deliver(key, message),
                RouterCommand::Stats { respond_to } => {
                    let _ = respond_to.send(self.snapshot());
                }
            }
        }

        info!(
            sent = self.stats.sent,
            dead_lettered = self.stats.dead_lettered,
            "Router shutdown"
        );
    }

    fn publish(&mut self, key: K, source: Output<T>, sink: Input<T>) {
        if self.registry.is_published(&key, source.id()) {
            debug!(?key, source = %source.id(), "Duplicate publish ignored");
            return;
        }

        let link = match self.mode {
            RouterMode::Direct => {
                source.connect(&sink);
                Link::Direct { sink }
            }
            RouterMode::Mediated => {
                let mediator = Connector::identity("router-mediator");
                mediator.output().connect(&sink);
                source.connect(mediator.input());
                Link::Mediated { mediator }
            }
        };
        debug!(?key, source = %source.id(), "Publish");
        self.registry
            .insert_publication(key, Publication { source, link });
    }

    fn unpublish(&mut self, key: K, source: Output<T>) {
        match self.registry.remove_publication(&key, source.id()) {
            Some(publication) => {
                publication.detach();
                debug!(?key, source = %source.id(), "Unpublish");
            }
            None => debug!(?key, source = %source.id(), "Unpublish of unknown source ignored"),
        }
    }

    fn deliver(&mut self, key: K, message: T) {
        self.stats.sent += 1;

        let subscribers = self.registry.subscribers(&key);
        if subscribers.is_empty() {
            self.stats.dead_lettered += 1;
            debug!(?key, "No subscribers, dead-lettering");
            self.sink_dead.emit(message.clone());
        } else {
            for input in subscribers {
                match input.send(message.clone()) {
                    Ok(()) => self.stats.delivered += 1,
                    Err(_) => warn!(?key, input = %input.id(), "Subscriber closed"),
                }
            }
        }

        self.sink_all.emit(message);
    }

    fn snapshot(&self) -> RouterStats {
        RouterStats {
            keys: self.registry.key_count(),
            subscriptions: self.registry.subscription_count(),
            publications: self.registry.publication_count(),
            ..self.stats.clone()
        }
    }
}

/// Cloneable access to a running router.
///
/// Subscription calls and sends are fire-and-forget; publication calls wait
/// for the router. All of them only fail if the router task has stopped.
pub struct RouterHandle<K, T> {
    sender: mpsc::UnboundedSender<RouterCommand<K, T>>,
    sink_all: Output<T>,
    sink_dead: Output<T>,
}

impl<K, T> RouterHandle<K, T>
where
    K: Clone + Send + Sync + 'static,
    T: Send + 'static,
{
    /// Routes everything `source` emits to `key`. Idempotent.
    ///
    /// Resolves once `source` is wired, so anything it emits afterwards is
    /// delivered. A publication does not keep the router alive on its own.
    pub async fn publish(&self, source: &Output<T>, key: K) -> Result<(), FlowError> {
        let sink = self.publication_sink(key.clone());
        request(&self.sender, |respond_to| RouterCommand::Publish {
            key,
            source: source.clone(),
            sink,
            respond_to,
        })
        .await
    }

    /// Stops routing `source` to `key`. Idempotent.
    ///
    /// Resolves once `source` is unwired. In mediated mode, messages already
    /// handed to the mediator are still delivered.
    pub async fn unpublish(&self, source: &Output<T>, key: K) -> Result<(), FlowError> {
        request(&self.sender, |respond_to| RouterCommand::Unpublish {
            key,
            source: source.clone(),
            respond_to,
        })
        .await
    }

    /// Delivers messages sent on `key` to `input`. Idempotent.
    pub fn subscribe(&self, input: &Input<T>, key: K) -> Result<(), FlowError> {
        notify(
            &self.sender,
            RouterCommand::Subscribe {
                key,
                input: input.clone(),
            },
        )
    }

    /// Idempotent.
    pub fn unsubscribe(&self, input: &Input<T>, key: K) -> Result<(), FlowError> {
        notify(
            &self.sender,
            RouterCommand::Unsubscribe {
                key,
                input: input.clone(),
            },
        )
    }

    pub fn send(&self, key: K, message: T) -> Result<(), FlowError> {
        notify(&self.sender, RouterCommand::Send { key, message })
    }

    /// A new input that sends everything it receives on `key`.
    pub fn keyed_input(&self, key: K) -> Input<T> {
        let sender = self.sender.clone();
        Input::from_fn(move |message| {
            sender
                .send(RouterCommand::Send {
                    key: key.clone(),
                    message,
                })
                .map_err(|_| FrameworkError::UnitClosed)
        })
    }

    pub fn sink_all(&self) -> &Output<T> {
        &self.sink_all
    }

    fn publication_sink(&self, key: K) -> Input<T> {
        let sender = self.sender.downgrade();
        Input::from_fn(move |message| {
            let sender = sender.upgrade().ok_or(FrameworkError::UnitClosed)?;
            sender
                .send(RouterCommand::Send {
                    key: key.clone(),
                    message,
                })
                .map_err(|_| FrameworkError::UnitClosed)
        })
    }

    pub fn sink_dead(&self) -> &Output<T> {
        &self.sink_dead
    }
}

impl<K, T> Clone for RouterHandle<K, T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            sink_all: self.sink_all.clone(),
            sink_dead: self.sink_dead.clone(),
        }
    }
}

#[async_trait]
impl<K, T> Inspect for RouterHandle<K, T>
where
    K: Send + Sync + 'static,
    T: Send + 'static,
{
    type Stats = RouterStats;

    fn label(&self) -> &'static str {
        "channel-router"
    }

    async fn stats(&self) -> Result<RouterStats, FlowError> {
        request(&self.sender, |respond_to| RouterCommand::Stats { respond_to }).await
    }
}
