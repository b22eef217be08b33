pub mod conversation;
pub mod error;
pub mod poll;
pub mod profile;

pub use conversation::{ConversationEngine, ConversationSession, SessionState};
pub use error::TurnError;
pub use poll::PollPolicy;
pub use profile::ProfileProvider;
