use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn, Span};

use innerally_core::assistant::AssistantService;
use innerally_core::ids::{AssistantId, SessionId, ThreadId};
use innerally_core::messages::{ChatMessage, Role};
use innerally_core::validation::ValidationError;

use crate::error::TurnError;
use crate::poll::{self, PollPolicy};
use crate::profile::ProfileProvider;

/// Observable lifecycle of a [`ConversationSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No remote thread yet.
    Uninitialized,
    /// Thread exists; turns may be submitted.
    Active,
    /// Ended or cancelled; every further turn fails with `SessionEnded`.
    Ended,
}

/// One logical conversation: the remote thread and the local message log.
///
/// Lives for one UI session and is never persisted. Turns take `&mut self`,
/// so only one turn can be in flight at a time. Dropping the session cancels
/// its token, which aborts any poll still holding a clone of it.
#[derive(Debug)]
pub struct ConversationSession {
    id: SessionId,
    thread_id: Option<ThreadId>,
    messages: Vec<ChatMessage>,
    context_injected: bool,
    cancel: CancellationToken,
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationSession {
    pub fn new() -> Self {
        Self::with_cancel(CancellationToken::new())
    }

    /// A session that also ends when `cancel` fires. Pass a child token to
    /// tie several successive sessions to one outer shutdown signal.
    pub fn with_cancel(cancel: CancellationToken) -> Self {
        Self {
            id: SessionId::new(),
            thread_id: None,
            messages: Vec::new(),
            context_injected: false,
            cancel,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn thread_id(&self) -> Option<&ThreadId> {
        self.thread_id.as_ref()
    }

    /// Local log, oldest first. Holds only user messages the remote thread
    /// accepted and the replies fetched for them.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn context_injected(&self) -> bool {
        self.context_injected
    }

    pub fn state(&self) -> SessionState {
        if self.cancel.is_cancelled() {
            SessionState::Ended
        } else if self.thread_id.is_some() {
            SessionState::Active
        } else {
            SessionState::Uninitialized
        }
    }

    /// A handle that ends the session from elsewhere (e.g. a Ctrl-C handler)
    /// and interrupts the turn in flight.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Tear the session down. The remote thread is abandoned, not deleted.
    pub fn end(&mut self) {
        self.cancel.cancel();
    }
}

impl Drop for ConversationSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Runs conversation turns against a remote assistant service.
pub struct ConversationEngine {
    service: Arc<dyn AssistantService>,
    profile: ProfileProvider,
    assistant_id: AssistantId,
    poll: PollPolicy,
}

/// Newest messages fetched when looking for the reply.
const REPLY_FETCH_LIMIT: u32 = 1;

impl ConversationEngine {
    pub fn new(
        service: Arc<dyn AssistantService>,
        profile: ProfileProvider,
        assistant_id: AssistantId,
        poll: PollPolicy,
    ) -> Self {
        Self {
            service,
            profile,
            assistant_id,
            poll,
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    /// Submit one user message and wait for the assistant's reply.
    ///
    /// On success the user message and the reply have both been appended to
    /// the session log. On failure the session stays usable (see
    /// [`TurnError::requires_new_session`]) and no reply is recorded.
    #[instrument(
        skip(self, session, text),
        fields(session_id = %session.id, thread_id = tracing::field::Empty)
    )]
    pub async fn run_turn(
        &self,
        session: &mut ConversationSession,
        text: &str,
    ) -> Result<ChatMessage, TurnError> {
        if session.cancel.is_cancelled() {
            return Err(TurnError::SessionEnded);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyChatMessage.into());
        }

        let started = Instant::now();
        let cancel = session.cancel.clone();

        // 1. Obtain the thread
        let thread = match &session.thread_id {
            Some(thread) => thread.clone(),
            None => {
                let thread = guarded(&cancel, self.service.create_thread())
                    .await?
                    .map_err(TurnError::SessionCreationFailed)?;
                info!(thread_id = %thread, "conversation thread created");
                session.thread_id = Some(thread.clone());
                thread
            }
        };
        Span::current().record("thread_id", tracing::field::display(&thread));

        // 2. Inject profile context ahead of the first user message
        if !session.context_injected {
            if let Some(context) = self.profile.context_message()? {
                guarded(
                    &cancel,
                    self.service.append_message(&thread, Role::User, &context),
                )
                .await?
                .map_err(TurnError::MessageSubmissionFailed)?;
                info!("profile context injected");
            }
            session.context_injected = true;
        }

        // 3. Append the user message
        guarded(&cancel, self.service.append_message(&thread, Role::User, text))
            .await?
            .map_err(TurnError::MessageSubmissionFailed)?;
        session.messages.push(ChatMessage::user(text));

        // 4. Start the run
        let run = guarded(
            &cancel,
            self.service.start_run(&thread, &self.assistant_id),
        )
        .await?
        .map_err(TurnError::MessageSubmissionFailed)?;

        // 5. Poll until the run ends
        let checks = match poll::wait_for_completion(
            self.service.as_ref(),
            &thread,
            &run,
            self.poll,
            &cancel,
        )
        .await
        {
            Ok(checks) => checks,
            Err(e) => {
                warn!(run_id = %run, error_kind = e.error_kind(), error = %e, "turn failed");
                return Err(e);
            }
        };

        // 6. Fetch the newest message as the reply
        let newest = guarded(
            &cancel,
            self.service.list_messages(&thread, REPLY_FETCH_LIMIT),
        )
        .await?
        .map_err(|e| TurnError::ReplyFetchFailed(e.to_string()))?;
        let reply = newest
            .into_iter()
            .next()
            .filter(|m| !m.content.trim().is_empty())
            .ok_or_else(|| TurnError::ReplyFetchFailed("thread has no reply text".into()))?;

        let reply = ChatMessage::assistant(reply.content);
        session.messages.push(reply.clone());

        info!(
            run_id = %run,
            checks,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "turn completed"
        );
        Ok(reply)
    }
}

/// Race a remote call against the session's cancellation.
async fn guarded<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = T>,
) -> Result<T, TurnError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TurnError::Cancelled),
        value = call => Ok(value),
    }
}
