use serde::{Deserialize, Serialize};

/// A unit of work entering the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: u64,
    /// Rounds of mixing the worker performs.
    pub rounds: u32,
}

impl Job {
    pub fn new(id: u64, rounds: u32) -> Self {
        Self { id, rounds }
    }
}

/// What a worker publishes once a job is done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub job: u64,
    pub worker: usize,
    pub checksum: u64,
}

impl JobResult {
    /// Router key under which worker `index` publishes.
    pub fn key_for(index: usize) -> String {
        format!("worker-{index}")
    }
}
