//! Request/response plumbing shared by every component handle.

use crate::error::FlowError;
use tokio::sync::{mpsc, oneshot};

/// One-shot reply channel carried inside a command.
pub type Response<T> = oneshot::Sender<T>;

/// Sends a command built around a fresh reply channel and waits for the answer.
pub(crate) async fn request<C, T>(
    sender: &mpsc::UnboundedSender<C>,
    build: impl FnOnce(Response<T>) -> C,
) -> Result<T, FlowError> {
    let (respond_to, response) = oneshot::channel();
    sender
        .send(build(respond_to))
        .map_err(|_| FlowError::ActorClosed)?;
    response.await.map_err(|_| FlowError::ActorDropped)
}

/// Fire-and-forget command.
pub(crate) fn notify<C>(sender: &mpsc::UnboundedSender<C>, command: C) -> Result<(), FlowError> {
    sender.send(command).map_err(|_| FlowError::ActorClosed)
}
