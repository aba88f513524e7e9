use actor_flow::FlowError;
use flow_framework::FrameworkError;

#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Flow(#[from] FlowError),
    #[error(transparent)]
    Framework(#[from] FrameworkError),
    #[error("Component task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}
