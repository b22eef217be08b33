pub mod assistant;
pub mod config;
pub mod errors;
pub mod ids;
pub mod labels;
pub mod messages;
pub mod security;
pub mod validation;

pub use assistant::{AssistantService, RunStatus, ThreadMessage};
pub use errors::RemoteError;
