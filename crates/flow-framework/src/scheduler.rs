//! # Scheduler
//!
//! Delayed and periodic sends. The scheduler is an explicit resource handle:
//! the caller starts it, passes it to whatever needs timers, and owns its
//! shutdown. There is no process-wide timer.

use crate::error::FrameworkError;
use crate::port::Input;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

type Job = Box<dyn FnOnce(&mut JoinSet<()>) + Send>;

enum SchedulerRequest {
    Schedule(Job),
    Pending { respond_to: oneshot::Sender<usize> },
    Stop,
}

/// Handle to a running timer actor.
///
/// Cloning is cheap; all clones talk to the same actor. Pending timers are
/// aborted by [`Scheduler::shutdown`].
#[derive(Clone)]
pub struct Scheduler {
    sender: mpsc::UnboundedSender<SchedulerRequest>,
}

/// Join handle for the scheduler's task, returned by [`Scheduler::start`].
pub struct SchedulerTask {
    handle: JoinHandle<()>,
}

impl SchedulerTask {
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Scheduler task failed");
        }
    }
}

impl Scheduler {
    /// Starts the timer actor on the current runtime.
    pub fn start() -> (Self, SchedulerTask) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(receiver));
        (Self { sender }, SchedulerTask { handle })
    }

    /// Sends `msg` to `input` once `delay` has elapsed.
    pub fn send_after<T: Send + 'static>(
        &self,
        input: &Input<T>,
        msg: T,
        delay: Duration,
    ) -> Result<(), FrameworkError> {
        let input = input.clone();
        self.schedule(Box::new(move |timers| {
            timers.spawn(async move {
                tokio::time::sleep(delay).await;
                if input.send(msg).is_err() {
                    debug!(input = %input.id(), "Delayed send target closed");
                }
            });
        }))
    }

    /// Sends `make()` to `input` every `period`, starting one period from now.
    ///
    /// The timer stops on its own once the target input is closed.
    pub fn send_every<T, F>(
        &self,
        input: &Input<T>,
        period: Duration,
        mut make: F,
    ) -> Result<(), FrameworkError>
    where
        T: Send + 'static,
        F: FnMut() -> T + Send + 'static,
    {
        let input = input.clone();
        self.schedule(Box::new(move |timers| {
            timers.spawn(async move {
                let mut ticker = tokio::time::interval(period);
                // First tick completes immediately.
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    if input.send(make()).is_err() {
                        debug!(input = %input.id(), "Periodic send target closed");
                        break;
                    }
                }
            });
        }))
    }

    /// Number of timers that have not fired (or, for periodic timers, not stopped).
    pub async fn pending(&self) -> Result<usize, FrameworkError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(SchedulerRequest::Pending { respond_to })
            .map_err(|_| FrameworkError::UnitClosed)?;
        response.await.map_err(|_| FrameworkError::ActorDropped)
    }

    /// Aborts every pending timer and stops the actor.
    pub async fn shutdown(self, task: SchedulerTask) {
        let _ = self.sender.send(SchedulerRequest::Stop);
        task.join().await;
    }

    fn schedule(&self, job: Job) -> Result<(), FrameworkError> {
        self.sender
            .send(SchedulerRequest::Schedule(job))
            .map_err(|_| FrameworkError::UnitClosed)
    }
}

async fn run(mut receiver: mpsc::UnboundedReceiver<SchedulerRequest>) {
    info!("Scheduler started");
    let mut timers = JoinSet::new();
    let mut fired: u64 = 0;

    loop {
        tokio::select! {
            request = receiver.recv() => match request {
                Some(SchedulerRequest::Schedule(job)) => job(&mut timers),
                Some(SchedulerRequest::Pending { respond_to }) => {
                    let _ = respond_to.send(timers.len());
                }
                Some(SchedulerRequest::Stop) | None => break,
            },
            Some(_) = timers.join_next(), if !timers.is_empty() => fired += 1,
        }
    }

    let aborted = timers.len();
    timers.shutdown().await;
    info!(fired, aborted, "Scheduler shutdown");
}
