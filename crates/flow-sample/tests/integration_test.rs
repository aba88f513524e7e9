use flow_framework::mock::Probe;
use flow_sample::error::SampleError;
use flow_sample::job::{Job, JobResult};
use flow_sample::lifecycle::{PipelineConfig, PipelineSystem};
use std::time::Duration;

fn config(workers: usize) -> PipelineConfig {
    PipelineConfig {
        workers,
        rounds: 10,
        ..PipelineConfig::default()
    }
}

#[tokio::test]
async fn submitted_jobs_are_processed_acknowledged_and_published() {
    flow_framework::tracing::try_setup_tracing();
    let system = PipelineSystem::new(config(2)).await.unwrap();
    let mut results = Probe::new();
    system.subscribe_results(&results.input()).unwrap();
    let mut audit = Probe::attached(system.audit());

    for id in 1..=6 {
        system.submit(Job::new(id, 10)).unwrap();
    }

    let mut received = results.take(6).await;
    received.sort_by_key(|result| result.job);
    assert_eq!(
        received.iter().map(|r| r.job).collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5, 6]
    );
    // Round robin over two workers: odd jobs to worker 0, even to worker 1.
    assert!(received.iter().all(|r| r.worker == ((r.job - 1) % 2) as usize));
    assert_eq!(audit.take(6).await.len(), 6);

    let stats = system.stats().await.unwrap();
    assert_eq!(stats.queue.accepted, 6);
    assert_eq!(stats.queue.acknowledged, 6);
    assert_eq!(stats.queue.outstanding, 0);
    assert_eq!(stats.balancer.routed, vec![3, 3]);
    assert_eq!(stats.router.publications, 2);
    assert_eq!(stats.router.dead_lettered, 0);

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn results_are_keyed_by_worker() {
    let system = PipelineSystem::new(config(3)).await.unwrap();
    let mut audit = Probe::attached(system.audit());

    for id in 1..=3 {
        system.submit(Job::new(id, 1)).unwrap();
    }
    let published: Vec<JobResult> = audit.take(3).await;
    let mut workers: Vec<_> = published.iter().map(|r| r.worker).collect();
    workers.sort_unstable();
    assert_eq!(workers, vec![0, 1, 2]);
    assert_eq!(JobResult::key_for(2), "worker-2");

    system.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn scheduled_production_feeds_the_pipeline() {
    let system = PipelineSystem::new(config(2)).await.unwrap();
    let mut results = Probe::new();
    system.subscribe_results(&results.input()).unwrap();

    system
        .produce_every(Duration::from_millis(10), 100)
        .unwrap();
    let mut ids: Vec<u64> = results.take(4).await.iter().map(|r| r.job).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![100, 101, 102, 103]);

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn zero_workers_are_rejected() {
    let result = PipelineSystem::new(config(0)).await;
    assert!(matches!(result, Err(SampleError::InvalidConfig(_))));
}

#[tokio::test]
async fn shutdown_completes_with_subscribers_attached() {
    let system = PipelineSystem::new(config(2)).await.unwrap();
    let results = Probe::new();
    system.subscribe_results(&results.input()).unwrap();
    system.produce_every(Duration::from_millis(5), 1).unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    let finished = tokio::time::timeout(Duration::from_secs(2), system.shutdown()).await;
    assert!(matches!(finished, Ok(Ok(()))));
}
