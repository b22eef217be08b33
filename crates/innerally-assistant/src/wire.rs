//! JSON bodies of the hosted Assistants v2 API and their mapping onto the
//! protocol types.

use serde::{Deserialize, Serialize};

use innerally_core::assistant::{RunStatus, ThreadMessage};
use innerally_core::errors::RemoteError;
use innerally_core::ids::MessageId;
use innerally_core::messages::Role;

#[derive(Debug, Serialize)]
pub struct CreateMessageBody<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CreateRunBody<'a> {
    pub assistant_id: &'a str,
}

/// Any object response where only the id matters.
#[derive(Debug, Deserialize)]
pub struct ObjectRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct RunObject {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub last_error: Option<RunError>,
}

#[derive(Debug, Deserialize)]
pub struct RunError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageList {
    pub data: Vec<MessageObject>,
}

#[derive(Debug, Deserialize)]
pub struct MessageObject {
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: TextValue },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct TextValue {
    pub value: String,
}

impl RunObject {
    /// `failed` carries the server's reason. `cancelled`, `expired` and
    /// `incomplete` are terminal too and are reported as failures so a
    /// poll never spins on a run that can no longer complete.
    pub fn to_status(&self) -> RunStatus {
        match self.status.as_str() {
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed {
                reason: self
                    .last_error
                    .as_ref()
                    .and_then(|e| e.message.clone().or_else(|| e.code.clone()))
                    .unwrap_or_else(|| "Unknown error".to_string()),
            },
            "cancelled" | "expired" | "incomplete" => RunStatus::Failed {
                reason: format!("run {}", self.status),
            },
            _ => RunStatus::Pending,
        }
    }
}

impl MessageObject {
    /// Text parts are concatenated; non-text parts (images, files) are skipped.
    pub fn into_thread_message(self) -> Result<ThreadMessage, RemoteError> {
        let role = self
            .role
            .parse::<Role>()
            .map_err(RemoteError::MalformedResponse)?;
        let content = self
            .content
            .into_iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.value),
                ContentPart::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        Ok(ThreadMessage {
            id: MessageId::from_raw(self.id),
            role,
            content,
        })
    }
}
