pub mod client;
pub mod mock;
pub mod reliable;
pub mod wire;

pub use client::OpenAiAssistantClient;
pub use mock::ScriptedAssistant;
pub use reliable::{ReliableAssistant, ReliableConfig};
