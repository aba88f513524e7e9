use crate::job::{Job, JobResult};
use flow_framework::{spawn_unit, Connector, Output};
use tracing::debug;

/// Spawns worker `index`. Every result it emits doubles as the queue
/// acknowledgment for the job.
pub fn spawn_worker(index: usize) -> Connector<Job, JobResult> {
    spawn_unit("worker", move |job: Job, output: &Output<JobResult>| {
        let checksum = mix(job);
        debug!(worker = index, job = job.id, checksum, "Job processed");
        output.emit(JobResult {
            job: job.id,
            worker: index,
            checksum,
        });
    })
}

fn mix(job: Job) -> u64 {
    (0..job.rounds).fold(job.id ^ 0x9e37_79b9_7f4a_7c15, |acc, round| {
        acc.rotate_left(5).wrapping_mul(31).wrapping_add(u64::from(round))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mix_depends_on_job_and_rounds() {
        assert_eq!(mix(Job::new(1, 4)), mix(Job::new(1, 4)));
        assert_ne!(mix(Job::new(1, 4)), mix(Job::new(2, 4)));
        assert_ne!(mix(Job::new(1, 4)), mix(Job::new(1, 5)));
    }
}
