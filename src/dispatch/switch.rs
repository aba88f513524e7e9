use super::{DispatchStats, Predicate};
use crate::error::FlowError;
use crate::inspect::Inspect;
use crate::request::{request, Response};
use async_trait::async_trait;
use flow_framework::{FrameworkError, Input, Output};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Maps a message to the index of the output that should receive it.
pub trait RouteTable<T>: Send + 'static {
    fn route(&self, msg: &T) -> Option<usize>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Constant-time routing on an extracted key.
pub struct TableRoutes<K, T> {
    key_fn: Box<dyn Fn(&T) -> K + Send + Sync>,
    index: HashMap<K, usize>,
}

impl<K, T> RouteTable<T> for TableRoutes<K, T>
where
    K: Eq + Hash + Send + Sync + 'static,
    T: 'static,
{
    fn route(&self, msg: &T) -> Option<usize> {
        self.index.get(&(self.key_fn)(msg)).copied()
    }

    fn len(&self) -> usize {
        self.index.len()
    }
}

/// Ordered predicates; the first match wins.
pub struct LookupRoutes<T> {
    predicates: Vec<Predicate<T>>,
}

impl<T: 'static> RouteTable<T> for LookupRoutes<T> {
    fn route(&self, msg: &T) -> Option<usize> {
        self.predicates.iter().position(|matches| matches(msg))
    }

    fn len(&self) -> usize {
        self.predicates.len()
    }
}

enum SwitchCommand<T> {
    Data(T),
    Stats { respond_to: Response<DispatchStats> },
}

/// A single-input switch over a fixed set of outputs plus a default.
pub struct Switch<T, R> {
    receiver: mpsc::UnboundedReceiver<SwitchCommand<T>>,
    routes: R,
    outputs: Vec<Output<T>>,
    default: Output<T>,
    stats: DispatchStats,
}

/// Builds a [`Switch`] that looks up `key_fn(msg)` among `keys`.
pub struct TableSwitch;

impl TableSwitch {
    /// Fails with [`FlowError::InvalidConfig`] if `keys` repeats a key.
    #[allow(clippy::type_complexity)]
    pub fn new<K, T, F>(
        key_fn: F,
        keys: impl IntoIterator<Item = K>,
    ) -> Result<(Switch<T, TableRoutes<K, T>>, SwitchHandle<K, T>), FlowError>
    where
        K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
        T: Clone + Send + 'static,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        let mut index = HashMap::new();
        for key in keys {
            let next = index.len();
            if index.contains_key(&key) {
                return Err(FlowError::InvalidConfig(format!(
                    "duplicate switch key {key:?}"
                )));
            }
            index.insert(key, next);
        }
        let routes = TableRoutes {
            key_fn: Box::new(key_fn),
            index: index.clone(),
        };
        Ok(Switch::with_routes(routes, index))
    }
}

/// Builds a [`Switch`] over ordered predicates. Output `i` belongs to predicate `i`.
pub struct LookupSwitch;

impl LookupSwitch {
    #[allow(clippy::type_complexity)]
    pub fn new<T>(
        predicates: Vec<Predicate<T>>,
    ) -> (Switch<T, LookupRoutes<T>>, SwitchHandle<usize, T>)
    where
        T: Clone + Send + 'static,
    {
        let index = (0..predicates.len()).map(|i| (i, i)).collect();
        Switch::with_routes(LookupRoutes { predicates }, index)
    }
}

impl<T, R> Switch<T, R>
where
    T: Clone + Send + 'static,
    R: RouteTable<T>,
{
    fn with_routes<K>(routes: R, index: HashMap<K, usize>) -> (Self, SwitchHandle<K, T>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let outputs: Vec<Output<T>> = (0..routes.len()).map(|_| Output::new()).collect();
        let default = Output::new();

        let data_sender = sender.clone();
        let input = Input::from_fn(move |msg| {
            data_sender
                .send(SwitchCommand::Data(msg))
                .map_err(|_| FrameworkError::UnitClosed)
        });

        let switch = Self {
            receiver,
            routes,
            outputs: outputs.clone(),
            default: default.clone(),
            stats: DispatchStats::default(),
        };
        let handle = SwitchHandle {
            sender,
            input,
            index: Arc::new(index),
            outputs,
            default,
        };
        (switch, handle)
    }

    pub async fn run(mut self) {
        info!(routes = self.outputs.len(), "Switch started");
        while let Some(command) = self.receiver.recv().await {
            match command {
                SwitchCommand::Data(msg) => match self.routes.route(&msg) {
                    Some(index) => {
                        self.stats.routed += 1;
                        self.outputs[index].emit(msg);
                    }
                    None => {
                        self.stats.defaulted += 1;
                        debug!("No route matched, sending to default");
                        self.default.emit(msg);
                    }
                },
                SwitchCommand::Stats { respond_to } => {
                    let _ = respond_to.send(DispatchStats {
                        routes: self.routes.len(),
                        ..self.stats.clone()
                    });
                }
            }
        }
        info!(
            routed = self.stats.routed,
            defaulted = self.stats.defaulted,
            "Switch shutdown"
        );
    }
}

/// Cloneable access to a running switch.
///
/// Table switches are addressed by key; lookup switches by predicate position.
pub struct SwitchHandle<K, T> {
    sender: mpsc::UnboundedSender<SwitchCommand<T>>,
    input: Input<T>,
    index: Arc<HashMap<K, usize>>,
    outputs: Vec<Output<T>>,
    default: Output<T>,
}

impl<K: Eq + Hash, T> SwitchHandle<K, T> {
    pub fn input(&self) -> &Input<T> {
        &self.input
    }

    pub fn output(&self, key: &K) -> Option<&Output<T>> {
        self.index.get(key).and_then(|&i| self.outputs.get(i))
    }

    pub fn default_output(&self) -> &Output<T> {
        &self.default
    }
}

impl<K, T> Clone for SwitchHandle<K, T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            input: self.input.clone(),
            index: Arc::clone(&self.index),
            outputs: self.outputs.clone(),
            default: self.default.clone(),
        }
    }
}

#[async_trait]
impl<K: Send + Sync + 'static, T: Send + 'static> Inspect for SwitchHandle<K, T> {
    type Stats = DispatchStats;

    fn label(&self) -> &'static str {
        "switch"
    }

    async fn stats(&self) -> Result<DispatchStats, FlowError> {
        request(&self.sender, |respond_to| SwitchCommand::Stats { respond_to }).await
    }
}
