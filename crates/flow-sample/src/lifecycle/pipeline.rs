use crate::error::SampleError;
use crate::job::{Job, JobResult};
use crate::worker::spawn_worker;
use actor_flow::backpressure::QueueStats;
use actor_flow::balancer::BalancerStats;
use actor_flow::router::RouterStats;
use actor_flow::{
    Balancer, BalancerHandle, BackpressureQueue, ChannelRouter, Inspect, QueueConfig, QueueHandle,
    RoundRobin, RouterHandle,
};
use flow_framework::{Connector, Input, Output, Scheduler, SchedulerTask};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub workers: usize,
    pub queue: QueueConfig,
    /// Mixing rounds given to every produced job.
    pub rounds: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            queue: QueueConfig::default().with_capacity(16).with_permits(4),
            rounds: 1_000,
        }
    }
}

/// Snapshot of every component's counters.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    pub queue: QueueStats,
    pub balancer: BalancerStats,
    pub router: RouterStats,
}

/// The running job pipeline.
///
/// # Example
///
/// ```ignore
/// let system = PipelineSystem::new(PipelineConfig::default()).await?;
/// system.subscribe_results(&collector)?;
/// system.submit(Job::new(1, 100))?;
/// system.shutdown().await?;
/// ```
pub struct PipelineSystem {
    config: PipelineConfig,
    queue: QueueHandle<Job>,
    balancer: BalancerHandle<Job>,
    router: RouterHandle<String, JobResult>,
    workers: Vec<Connector<Job, JobResult>>,
    scheduler: Scheduler,
    scheduler_task: SchedulerTask,
    handles: Vec<JoinHandle<()>>,
}

impl PipelineSystem {
    /// Creates, spawns and wires every component.
    ///
    /// Returns once the router has registered every worker as a publisher, so
    /// jobs submitted afterwards are always published.
    pub async fn new(config: PipelineConfig) -> Result<Self, SampleError> {
        if config.workers == 0 {
            return Err(SampleError::InvalidConfig(
                "at least one worker is required".into(),
            ));
        }
        info!(
            workers = config.workers,
            permits = config.queue.permits,
            capacity = ?config.queue.backlog_capacity,
            "Starting pipeline"
        );

        let (queue, queue_handle) = BackpressureQueue::new(config.queue);
        let (balancer, balancer_handle) = Balancer::new(RoundRobin::new(config.workers)?);
        let (router, router_handle) = ChannelRouter::new();
        let handles = vec![
            tokio::spawn(queue.run()),
            tokio::spawn(balancer.run()),
            tokio::spawn(router.run()),
        ];

        queue_handle.data_out().connect(balancer_handle.input());

        let mut workers = Vec::with_capacity(config.workers);
        for (index, output) in balancer_handle.outputs().iter().enumerate() {
            let worker = spawn_worker(index);
            output.connect(worker.input());
            worker.output().connect(&queue_handle.ack_input());
            router_handle
                .publish(worker.output(), JobResult::key_for(index))
                .await?;
            workers.push(worker);
        }

        let (scheduler, scheduler_task) = Scheduler::start();

        Ok(Self {
            config,
            queue: queue_handle,
            balancer: balancer_handle,
            router: router_handle,
            workers,
            scheduler,
            scheduler_task,
            handles,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn submit(&self, job: Job) -> Result<(), SampleError> {
        self.queue.data_in().send(job)?;
        Ok(())
    }

    /// Produces a job every `period`, numbering from `first_id`.
    pub fn produce_every(&self, period: Duration, first_id: u64) -> Result<(), SampleError> {
        let rounds = self.config.rounds;
        let mut next = first_id;
        self.scheduler
            .send_every(self.queue.data_in(), period, move || {
                let job = Job::new(next, rounds);
                next += 1;
                job
            })?;
        Ok(())
    }

    /// Subscribes `input` to the results of every worker.
    pub fn subscribe_results(&self, input: &Input<JobResult>) -> Result<(), SampleError> {
        for index in 0..self.workers.len() {
            self.router.subscribe(input, JobResult::key_for(index))?;
        }
        Ok(())
    }

    /// Every published result, regardless of subscribers.
    pub fn audit(&self) -> &Output<JobResult> {
        self.router.sink_all()
    }

    /// Jobs refused because the backlog was full.
    pub fn overflow(&self) -> &Output<Job> {
        self.queue.overflow_out()
    }

    pub async fn stats(&self) -> Result<PipelineStats, SampleError> {
        Ok(PipelineStats {
            queue: self.queue.stats().await?,
            balancer: self.balancer.stats().await?,
            router: self.router.stats().await?,
        })
    }

    pub async fn log_stats(&self) -> Result<(), SampleError> {
        self.queue.log_stats().await?;
        self.balancer.log_stats().await?;
        self.router.log_stats().await?;
        Ok(())
    }

    /// Stops production, unwinds the ack loop and awaits every component task.
    pub async fn shutdown(self) -> Result<(), SampleError> {
        info!("Shutting down pipeline...");

        self.scheduler.shutdown(self.scheduler_task).await;
        self.queue.data_out().disconnect(self.balancer.input());

        drop(self.workers);
        drop(self.balancer);
        drop(self.queue);
        drop(self.router);

        let mut first_failure = None;
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Component task failed");
                first_failure.get_or_insert(e);
            }
        }
        match first_failure {
            Some(e) => Err(SampleError::TaskFailed(e)),
            None => {
                info!("Pipeline shutdown complete");
                Ok(())
            }
        }
    }
}
