use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use innerally_core::assistant::{AssistantService, RunStatus, ThreadMessage};
use innerally_core::errors::RemoteError;
use innerally_core::ids::{AssistantId, MessageId, RunId, ThreadId};
use innerally_core::messages::Role;

pub const DEFAULT_REPLY: &str = "I'm here with you. Tell me more about how you're feeling.";

/// Protocol operation, used to target failure injection and count calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    CreateThread,
    AppendMessage,
    StartRun,
    RunStatus,
    ListMessages,
}

/// One recorded protocol call, in arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    CreateThread,
    AppendMessage {
        thread: ThreadId,
        role: Role,
        content: String,
    },
    StartRun {
        thread: ThreadId,
        assistant: AssistantId,
    },
    RunStatus {
        thread: ThreadId,
        run: RunId,
    },
    ListMessages {
        thread: ThreadId,
        limit: u32,
    },
}

impl Call {
    pub fn op(&self) -> Op {
        match self {
            Self::CreateThread => Op::CreateThread,
            Self::AppendMessage { .. } => Op::AppendMessage,
            Self::StartRun { .. } => Op::StartRun,
            Self::RunStatus { .. } => Op::RunStatus,
            Self::ListMessages { .. } => Op::ListMessages,
        }
    }
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    next_id: u64,
    /// Oldest first.
    threads: HashMap<String, Vec<ThreadMessage>>,
    /// run id -> thread id
    runs: HashMap<String, String>,
    completed: HashSet<String>,
    statuses: VecDeque<RunStatus>,
    /// `None` entries let one call through.
    failures: HashMap<Op, VecDeque<Option<RemoteError>>>,
}

impl State {
    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}_{}", self.next_id)
    }

    fn injected(&mut self, op: Op) -> Option<RemoteError> {
        self.failures.get_mut(&op).and_then(VecDeque::pop_front).flatten()
    }
}

/// In-process assistant service for deterministic tests.
///
/// Threads are stored in memory. Run statuses play back from a script and
/// fall back to `fallback_status` once exhausted. The first time a run is
/// reported completed, the scripted reply is appended to its thread as an
/// assistant message.
pub struct ScriptedAssistant {
    state: Mutex<State>,
    reply: Option<String>,
    fallback_status: RunStatus,
    status_delay: Option<Duration>,
}

impl Default for ScriptedAssistant {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedAssistant {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            reply: Some(DEFAULT_REPLY.to_string()),
            fallback_status: RunStatus::Completed,
            status_delay: None,
        }
    }

    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }

    /// Completed runs leave the thread untouched.
    pub fn without_reply(mut self) -> Self {
        self.reply = None;
        self
    }

    /// Statuses returned by successive `run_status` calls.
    pub fn with_statuses(self, statuses: impl IntoIterator<Item = RunStatus>) -> Self {
        self.state.lock().statuses.extend(statuses);
        self
    }

    /// Runs never leave the pending state.
    pub fn stay_pending(mut self) -> Self {
        self.fallback_status = RunStatus::Pending;
        self
    }

    /// Each `run_status` call sleeps on the tokio clock first.
    pub fn with_status_delay(mut self, delay: Duration) -> Self {
        self.status_delay = Some(delay);
        self
    }

    pub fn failing(self, op: Op, error: RemoteError) -> Self {
        self.fail_next(op, error);
        self
    }

    /// Queue an error for the next call of `op`. Multiple queued errors are
    /// returned in order before calls succeed again.
    pub fn fail_next(&self, op: Op, error: RemoteError) {
        self.state
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(Some(error));
    }

    /// Let the next call of `op` succeed ahead of any error queued after it.
    pub fn pass_next(&self, op: Op) {
        self.state.lock().failures.entry(op).or_default().push_back(None);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, op: Op) -> usize {
        self.state.lock().calls.iter().filter(|c| c.op() == op).count()
    }

    pub fn thread_count(&self) -> usize {
        self.state.lock().threads.len()
    }

    /// Messages stored on a thread, oldest first.
    pub fn thread_messages(&self, thread: &ThreadId) -> Vec<ThreadMessage> {
        self.state
            .lock()
            .threads
            .get(thread.as_str())
            .cloned()
            .unwrap_or_default()
    }
}

fn missing_thread(thread: &ThreadId) -> RemoteError {
    RemoteError::NotFound(format!("no thread {thread}"))
}

#[async_trait]
impl AssistantService for ScriptedAssistant {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn create_thread(&self) -> Result<ThreadId, RemoteError> {
        let mut state = self.state.lock();
        state.calls.push(Call::CreateThread);
        if let Some(err) = state.injected(Op::CreateThread) {
            return Err(err);
        }
        let id = state.next("thread");
        state.threads.insert(id.clone(), Vec::new());
        Ok(ThreadId::from_raw(id))
    }

    async fn append_message(
        &self,
        thread: &ThreadId,
        role: Role,
        content: &str,
    ) -> Result<MessageId, RemoteError> {
        let mut state = self.state.lock();
        state.calls.push(Call::AppendMessage {
            thread: thread.clone(),
            role,
            content: content.to_string(),
        });
        if let Some(err) = state.injected(Op::AppendMessage) {
            return Err(err);
        }
        if !state.threads.contains_key(thread.as_str()) {
            return Err(missing_thread(thread));
        }
        let id = state.next("msg");
        let message = ThreadMessage {
            id: MessageId::from_raw(id.clone()),
            role,
            content: content.to_string(),
        };
        if let Some(messages) = state.threads.get_mut(thread.as_str()) {
            messages.push(message);
        }
        Ok(MessageId::from_raw(id))
    }

    async fn start_run(
        &self,
        thread: &ThreadId,
        assistant: &AssistantId,
    ) -> Result<RunId, RemoteError> {
        let mut state = self.state.lock();
        state.calls.push(Call::StartRun {
            thread: thread.clone(),
            assistant: assistant.clone(),
        });
        if let Some(err) = state.injected(Op::StartRun) {
            return Err(err);
        }
        if !state.threads.contains_key(thread.as_str()) {
            return Err(missing_thread(thread));
        }
        let id = state.next("run");
        state.runs.insert(id.clone(), thread.as_str().to_string());
        Ok(RunId::from_raw(id))
    }

    async fn run_status(&self, thread: &ThreadId, run: &RunId) -> Result<RunStatus, RemoteError> {
        if let Some(delay) = self.status_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        state.calls.push(Call::RunStatus {
            thread: thread.clone(),
            run: run.clone(),
        });
        if let Some(err) = state.injected(Op::RunStatus) {
            return Err(err);
        }
        if state.runs.get(run.as_str()).map(String::as_str) != Some(thread.as_str()) {
            return Err(RemoteError::NotFound(format!("no run {run} on {thread}")));
        }

        let status = state
            .statuses
            .pop_front()
            .unwrap_or_else(|| self.fallback_status.clone());

        if status == RunStatus::Completed && state.completed.insert(run.as_str().to_string()) {
            if let Some(reply) = &self.reply {
                let id = state.next("msg");
                if let Some(messages) = state.threads.get_mut(thread.as_str()) {
                    messages.push(ThreadMessage {
                        id: MessageId::from_raw(id),
                        role: Role::Assistant,
                        content: reply.clone(),
                    });
                }
            }
        }
        Ok(status)
    }

    async fn list_messages(
        &self,
        thread: &ThreadId,
        limit: u32,
    ) -> Result<Vec<ThreadMessage>, RemoteError> {
        let mut state = self.state.lock();
        state.calls.push(Call::ListMessages {
            thread: thread.clone(),
            limit,
        });
        if let Some(err) = state.injected(Op::ListMessages) {
            return Err(err);
        }
        let messages = state
            .threads
            .get(thread.as_str())
            .ok_or_else(|| missing_thread(thread))?;
        Ok(messages
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
