//! # Flow Sample
//!
//! Runs the job pipeline for a few seconds with periodic production, prints
//! every result as it is published, then shuts down.
//!
//! ```bash
//! RUST_LOG=info cargo run -p flow-sample
//! RUST_LOG=debug cargo run -p flow-sample   # per-job and per-unit detail
//! ```

use flow_framework::tracing::setup_tracing;
use flow_framework::{spawn_unit, Output};
use flow_sample::error::SampleError;
use flow_sample::job::{Job, JobResult};
use flow_sample::lifecycle::{PipelineConfig, PipelineSystem};
use std::time::Duration;
use tracing::{info, warn, Instrument};

#[tokio::main]
async fn main() -> Result<(), SampleError> {
    setup_tracing();

    let config = PipelineConfig::default();
    info!(?config, "Starting sample pipeline");
    let system = PipelineSystem::new(config).await?;

    let printer = spawn_unit("printer", |result: JobResult, _: &Output<()>| {
        info!(
            job = result.job,
            worker = result.worker,
            checksum = result.checksum,
            "Result"
        );
    });
    system.subscribe_results(printer.input())?;

    let overflow = spawn_unit("overflow", |job: Job, _: &Output<()>| {
        warn!(job = job.id, "Job refused, backlog full");
    });
    system.overflow().connect(overflow.input());

    let span = tracing::info_span!("production");
    async {
        for id in 1..=5 {
            system.submit(Job::new(id, system.config().rounds))?;
        }
        system.produce_every(Duration::from_millis(20), 6)?;
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok::<_, SampleError>(())
    }
    .instrument(span)
    .await?;

    system.log_stats().await?;
    system.shutdown().await?;

    info!("Sample completed successfully");
    Ok(())
}
