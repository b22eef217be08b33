use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::RemoteError;
use crate::ids::{AssistantId, MessageId, RunId, ThreadId};
use crate::messages::Role;

/// Observed state of a remote run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Completed,
    Failed { reason: String },
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// A message as stored in a remote thread.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
}

/// The run-based conversational assistant protocol.
///
/// Threads are server-side, append-only message logs. A run asks the
/// assistant to respond to the thread as it stands; its status is polled
/// until terminal. Any backend exposing this shape is substitutable.
#[async_trait]
pub trait AssistantService: Send + Sync {
    fn name(&self) -> &str;

    async fn create_thread(&self) -> Result<ThreadId, RemoteError>;

    async fn append_message(
        &self,
        thread: &ThreadId,
        role: Role,
        content: &str,
    ) -> Result<MessageId, RemoteError>;

    async fn start_run(
        &self,
        thread: &ThreadId,
        assistant: &AssistantId,
    ) -> Result<RunId, RemoteError>;

    async fn run_status(&self, thread: &ThreadId, run: &RunId) -> Result<RunStatus, RemoteError>;

    /// Messages of the thread, newest first, at most `limit` of them.
    async fn list_messages(
        &self,
        thread: &ThreadId,
        limit: u32,
    ) -> Result<Vec<ThreadMessage>, RemoteError>;
}
