use std::time::Duration;

use innerally_core::errors::RemoteError;
use innerally_core::validation::ValidationError;
use innerally_store::StoreError;

/// Why a conversation turn produced no reply.
///
/// Every variant leaves the session usable for another turn except
/// `SessionEnded`.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("could not start a conversation: {0}")]
    SessionCreationFailed(RemoteError),

    #[error("could not submit message: {0}")]
    MessageSubmissionFailed(RemoteError),

    #[error("assistant run failed: {reason}")]
    RunFailed { reason: String },

    #[error("could not check run status: {0}")]
    PollFailed(RemoteError),

    #[error("assistant did not finish within {0:?}")]
    PollingTimedOut(Duration),

    #[error("could not fetch reply: {0}")]
    ReplyFetchFailed(String),

    #[error("turn cancelled")]
    Cancelled,

    #[error("session has ended")]
    SessionEnded,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("profile unavailable: {0}")]
    Profile(#[from] StoreError),
}

impl TurnError {
    /// True when no thread could be obtained or the session is gone; the
    /// caller should start over with a fresh session.
    pub fn requires_new_session(&self) -> bool {
        matches!(self, Self::SessionCreationFailed(_) | Self::SessionEnded)
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::SessionCreationFailed(_) => "session_creation_failed",
            Self::MessageSubmissionFailed(_) => "message_submission_failed",
            Self::RunFailed { .. } => "run_failed",
            Self::PollFailed(_) => "poll_failed",
            Self::PollingTimedOut(_) => "polling_timed_out",
            Self::ReplyFetchFailed(_) => "reply_fetch_failed",
            Self::Cancelled => "cancelled",
            Self::SessionEnded => "session_ended",
            Self::Validation(_) => "validation",
            Self::Profile(_) => "profile",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_creation_and_end_require_new_session() {
        assert!(TurnError::SessionCreationFailed(RemoteError::Overloaded).requires_new_session());
        assert!(TurnError::SessionEnded.requires_new_session());
        assert!(!TurnError::RunFailed { reason: "x".into() }.requires_new_session());
        assert!(!TurnError::PollingTimedOut(Duration::from_secs(1)).requires_new_session());
        assert!(!TurnError::Cancelled.requires_new_session());
    }

    #[test]
    fn run_failed_message_carries_reason() {
        let err = TurnError::RunFailed {
            reason: "rate limit exceeded".into(),
        };
        assert_eq!(err.to_string(), "assistant run failed: rate limit exceeded");
        assert_eq!(err.error_kind(), "run_failed");
    }
}
