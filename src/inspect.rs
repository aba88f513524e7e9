//! # Inspect Trait
//!
//! Every component handle can report a snapshot of its counters. The snapshot
//! is answered by the component's own task, so it is ordered after every
//! command the caller issued before asking.

use crate::error::FlowError;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Debug;

#[async_trait]
pub trait Inspect: Send + Sync {
    /// The component's counter snapshot.
    type Stats: Serialize + Debug + Send;

    /// Short component label used in logs.
    fn label(&self) -> &'static str;

    /// Fetch the current snapshot.
    async fn stats(&self) -> Result<Self::Stats, FlowError>;

    /// Fetch the snapshot and log it at info level.
    #[tracing::instrument(skip(self))]
    async fn log_stats(&self) -> Result<Self::Stats, FlowError> {
        let stats = self.stats().await?;
        tracing::info!(component = self.label(), ?stats, "Component stats");
        Ok(stats)
    }
}
