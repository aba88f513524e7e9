use super::{DispatchStats, Predicate};
use crate::error::FlowError;
use crate::inspect::Inspect;
use crate::request::{notify, request, Response};
use async_trait::async_trait;
use flow_framework::{Connector, FrameworkError, Input, Output};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::hash::Hash;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Identity of a floor registered in a [`LookupTower`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FloorId(u64);

impl fmt::Display for FloorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "floor-{}", self.0)
    }
}

/// The tower-wide output every floor feeds, plus the bookkeeping to wire and
/// unwire floors without cutting off one that is registered twice.
struct Funnel<U> {
    unit: Connector<U, U>,
}

impl<U: Clone + Send + 'static> Funnel<U> {
    fn new() -> Self {
        Self {
            unit: Connector::identity("tower-funnel"),
        }
    }

    fn output(&self) -> Output<U> {
        self.unit.output().clone()
    }

    fn attach<T>(&self, floor: &Connector<T, U>) {
        floor.output().connect(self.unit.input());
    }

    /// Disconnects `floor` unless `still_registered` says another registration uses it.
    fn detach<T>(&self, floor: &Connector<T, U>, still_registered: bool) {
        if !still_registered {
            floor.output().disconnect(self.unit.input());
        }
    }
}

enum TableTowerCommand<K, T, U> {
    Route(T),
    AddFloor {
        key: K,
        floor: Connector<T, U>,
        respond_to: Response<Result<(), FlowError>>,
    },
    RemoveFloor {
        key: K,
        respond_to: Response<Result<Connector<T, U>, FlowError>>,
    },
    Stats {
        respond_to: Response<DispatchStats>,
    },
}

/// Routes by extracted key into floors, in constant time.
///
/// Adding a key that already has a floor and removing a key that has none are
/// reported as errors.
pub struct TableTower<K, T, U> {
    receiver: mpsc::UnboundedReceiver<TableTowerCommand<K, T, U>>,
    key_fn: Box<dyn Fn(&T) -> K + Send + Sync>,
    floors: HashMap<K, Connector<T, U>>,
    funnel: Funnel<U>,
    default: Output<T>,
    stats: DispatchStats,
}

impl<K, T, U> TableTower<K, T, U>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
    T: Clone + Send + 'static,
    U: Clone + Send + 'static,
{
    /// Must be called inside a Tokio runtime; the tower output is a unit.
    pub fn new<F>(key_fn: F) -> (Self, TableTowerHandle<K, T, U>)
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let funnel = Funnel::new();
        let default = Output::new();

        let route_sender = sender.clone();
        let input = Input::from_fn(move |msg| {
            route_sender
                .send(TableTowerCommand::Route(msg))
                .map_err(|_| FrameworkError::UnitClosed)
        });

        let handle = TableTowerHandle {
            sender,
            input,
            output: funnel.output(),
            default: default.clone(),
        };
        let tower = Self {
            receiver,
            key_fn: Box::new(key_fn),
            floors: HashMap::new(),
            funnel,
            default,
            stats: DispatchStats::default(),
        };
        (tower, handle)
    }

    pub async fn run(mut self) {
        info!("Table tower started");
        while let Some(command) = self.receiver.recv().await {
            match command {
                TableTowerCommand::Route(msg) => {
                    let key = (self.key_fn)(&msg);
                    match self.floors.get(&key) {
                        Some(floor) => {
                            self.stats.routed += 1;
                            if floor.input().send(msg).is_err() {
                                debug!(?key, "Floor closed, message dropped");
                            }
                        }
                        None => {
                            self.stats.defaulted += 1;
                            debug!(?key, "No floor for key, sending to default");
                            self.default.emit(msg);
                        }
                    }
                }
                TableTowerCommand::AddFloor {
                    key,
                    floor,
                    respond_to,
                } => {
                    let _ = respond_to.send(self.add_floor(key, floor));
                }
                TableTowerCommand::RemoveFloor { key, respond_to } => {
                    let _ = respond_to.send(self.remove_floor(key));
                }
                TableTowerCommand::Stats { respond_to } => {
                    let _ = respond_to.send(DispatchStats {
                        routes: self.floors.len(),
                        ..self.stats.clone()
                    });
                }
            }
        }
        info!(
            routed = self.stats.routed,
            defaulted = self.stats.defaulted,
            floors = self.floors.len(),
            "Table tower shutdown"
        );
    }

    fn add_floor(&mut self, key: K, floor: Connector<T, U>) -> Result<(), FlowError> {
        if self.floors.contains_key(&key) {
            return Err(FlowError::DuplicateFloor(format!("{key:?}")));
        }
        self.funnel.attach(&floor);
        debug!(?key, "Floor added");
        self.floors.insert(key, floor);
        Ok(())
    }

    fn remove_floor(&mut self, key: K) -> Result<Connector<T, U>, FlowError> {
        let floor = self
            .floors
            .remove(&key)
            .ok_or_else(|| FlowError::UnknownFloor(format!("{key:?}")))?;
        let shared = self
            .floors
            .values()
            .any(|other| other.output() == floor.output());
        self.funnel.detach(&floor, shared);
        debug!(?key, "Floor removed");
        Ok(floor)
    }
}

pub struct TableTowerHandle<K, T, U> {
    sender: mpsc::UnboundedSender<TableTowerCommand<K, T, U>>,
    input: Input<T>,
    output: Output<U>,
    default: Output<T>,
}

impl<K, T, U> TableTowerHandle<K, T, U>
where
    K: Send + 'static,
    T: Send + 'static,
    U: Send + 'static,
{
    pub fn input(&self) -> &Input<T> {
        &self.input
    }

    /// Everything every floor produces.
    pub fn output(&self) -> &Output<U> {
        &self.output
    }

    pub fn default_output(&self) -> &Output<T> {
        &self.default
    }

    /// Registers `floor` under `key`; fails with [`FlowError::DuplicateFloor`]
    /// if the key is taken.
    pub async fn add_floor(&self, key: K, floor: Connector<T, U>) -> Result<(), FlowError> {
        request(&self.sender, |respond_to| TableTowerCommand::AddFloor {
            key,
            floor,
            respond_to,
        })
        .await?
    }

    /// Unregisters and returns the floor under `key`; fails with
    /// [`FlowError::UnknownFloor`] if there is none.
    pub async fn remove_floor(&self, key: K) -> Result<Connector<T, U>, FlowError> {
        request(&self.sender, |respond_to| TableTowerCommand::RemoveFloor {
            key,
            respond_to,
        })
        .await?
    }
}

impl<K, T, U> Clone for TableTowerHandle<K, T, U> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            input: self.input.clone(),
            output: self.output.clone(),
            default: self.default.clone(),
        }
    }
}

#[async_trait]
impl<K, T, U> Inspect for TableTowerHandle<K, T, U>
where
    K: Send + Sync + 'static,
    T: Send + 'static,
    U: Send + 'static,
{
    type Stats = DispatchStats;

    fn label(&self) -> &'static str {
        "table-tower"
    }

    async fn stats(&self) -> Result<DispatchStats, FlowError> {
        request(&self.sender, |respond_to| TableTowerCommand::Stats { respond_to }).await
    }
}

struct LookupFloor<T, U> {
    id: FloorId,
    predicate: Predicate<T>,
    floor: Connector<T, U>,
}

enum LookupTowerCommand<T, U> {
    Route(T),
    AddFloor {
        predicate: Predicate<T>,
        floor: Connector<T, U>,
        respond_to: Response<FloorId>,
    },
    RemoveFloor {
        id: FloorId,
    },
    Stats {
        respond_to: Response<DispatchStats>,
    },
}

/// Routes into floors by ordered predicates; the first match wins.
///
/// Floors are appended without duplicate checks, and removing an unknown
/// floor is a no-op.
pub struct LookupTower<T, U> {
    receiver: mpsc::UnboundedReceiver<LookupTowerCommand<T, U>>,
    floors: Vec<LookupFloor<T, U>>,
    next_id: u64,
    funnel: Funnel<U>,
    default: Output<T>,
    stats: DispatchStats,
}

impl<T, U> LookupTower<T, U>
where
    T: Clone + Send + 'static,
    U: Clone + Send + 'static,
{
    /// Must be called inside a Tokio runtime; the tower output is a unit.
    pub fn new() -> (Self, LookupTowerHandle<T, U>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let funnel = Funnel::new();
        let default = Output::new();

        let route_sender = sender.clone();
        let input = Input::from_fn(move |msg| {
            route_sender
                .send(LookupTowerCommand::Route(msg))
                .map_err(|_| FrameworkError::UnitClosed)
        });

        let handle = LookupTowerHandle {
            sender,
            input,
            output: funnel.output(),
            default: default.clone(),
        };
        let tower = Self {
            receiver,
            floors: Vec::new(),
            next_id: 1,
            funnel,
            default,
            stats: DispatchStats::default(),
        };
        (tower, handle)
    }

    pub async fn run(mut self) {
        info!("Lookup tower started");
        while let Some(command) = self.receiver.recv().await {
            match command {
                LookupTowerCommand::Route(msg) => self.route(msg),
                LookupTowerCommand::AddFloor {
                    predicate,
                    floor,
                    respond_to,
                } => {
                    let id = FloorId(self.next_id);
                    self.next_id += 1;
                    self.funnel.attach(&floor);
                    self.floors.push(LookupFloor {
                        id,
                        predicate,
                        floor,
                    });
                    debug!(%id, floors = self.floors.len(), "Floor added");
                    let _ = respond_to.send(id);
                }
                LookupTowerCommand::RemoveFloor { id } => self.remove_floor(id),
                LookupTowerCommand::Stats { respond_to } => {
                    let _ = respond_to.send(DispatchStats {
                        routes: self.floors.len(),
                        ..self.stats.clone()
                    });
                }
            }
        }
        info!(
            routed = self.stats.routed,
            defaulted = self.stats.defaulted,
            floors = self.floors.len(),
            "Lookup tower shutdown"
        );
    }

    fn route(&mut self, msg: T) {
        match self.floors.iter().find(|entry| (entry.predicate)(&msg)) {
            Some(entry) => {
                self.stats.routed += 1;
                if entry.floor.input().send(msg).is_err() {
                    debug!(id = %entry.id, "Floor closed, message dropped");
                }
            }
            None => {
                self.stats.defaulted += 1;
                debug!("No floor matched, sending to default");
                self.default.emit(msg);
            }
        }
    }

    fn remove_floor(&mut self, id: FloorId) {
        let Some(position) = self.floors.iter().position(|entry| entry.id == id) else {
            debug!(%id, "Removal of unknown floor ignored");
            return;
        };
        let removed = self.floors.remove(position);
        let shared = self
            .floors
            .iter()
            .any(|entry| entry.floor.output() == removed.floor.output());
        self.funnel.detach(&removed.floor, shared);
        debug!(%id, floors = self.floors.len(), "Floor removed");
    }
}

pub struct LookupTowerHandle<T, U> {
    sender: mpsc::UnboundedSender<LookupTowerCommand<T, U>>,
    input: Input<T>,
    output: Output<U>,
    default: Output<T>,
}

impl<T, U> LookupTowerHandle<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    pub fn input(&self) -> &Input<T> {
        &self.input
    }

    /// Everything every floor produces.
    pub fn output(&self) -> &Output<U> {
        &self.output
    }

    pub fn default_output(&self) -> &Output<T> {
        &self.default
    }

    /// Appends a floor after every existing one.
    pub async fn add_floor(
        &self,
        predicate: Predicate<T>,
        floor: Connector<T, U>,
    ) -> Result<FloorId, FlowError> {
        request(&self.sender, |respond_to| LookupTowerCommand::AddFloor {
            predicate,
            floor,
            respond_to,
        })
        .await
    }

    /// Removes floor `id` if it is registered; unknown ids are ignored.
    pub fn remove_floor(&self, id: FloorId) -> Result<(), FlowError> {
        notify(&self.sender, LookupTowerCommand::RemoveFloor { id })
    }
}

impl<T, U> Clone for LookupTowerHandle<T, U> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            input: self.input.clone(),
            output: self.output.clone(),
            default: self.default.clone(),
        }
    }
}

#[async_trait]
impl<T: Send + 'static, U: Send + 'static> Inspect for LookupTowerHandle<T, U> {
    type Stats = DispatchStats;

    fn label(&self) -> &'static str {
        "lookup-tower"
    }

    async fn stats(&self) -> Result<DispatchStats, FlowError> {
        request(&self.sender, |respond_to| LookupTowerCommand::Stats { respond_to }).await
    }
}
