use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use innerally_core::assistant::{AssistantService, RunStatus, ThreadMessage};
use innerally_core::errors::RemoteError;
use innerally_core::ids::{AssistantId, MessageId, RunId, ThreadId};
use innerally_core::messages::Role;
use innerally_core::security::ApiKey;

use crate::wire::{CreateMessageBody, CreateRunBody, MessageList, ObjectRef, RunObject};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const BETA_HEADER: &str = "assistants=v2";

/// Client for the hosted thread/run assistant API.
pub struct OpenAiAssistantClient {
    client: Client,
    api_key: ApiKey,
    base_url: String,
}

impl std::fmt::Debug for OpenAiAssistantClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAssistantClient")
            .field("api_key", &self.api_key)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiAssistantClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built (TLS backend failure).
    pub fn new(api_key: ApiKey, base_url: &str) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RemoteError::NetworkError(format!("client init: {e}")))?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        req.bearer_auth(self.api_key.expose())
            .header("OpenAI-Beta", BETA_HEADER)
            .header("accept", "application/json")
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, RemoteError> {
        let resp = self
            .authorized(req)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = resp.text().await.unwrap_or_default();
            return Err(match RemoteError::from_status(status.as_u16(), body) {
                RemoteError::RateLimited { .. } => RemoteError::RateLimited { retry_after },
                other => other,
            });
        }

        let body = resp.text().await.map_err(map_transport_error)?;
        serde_json::from_str(&body).map_err(|e| RemoteError::MalformedResponse(e.to_string()))
    }
}

fn map_transport_error(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Timeout(REQUEST_TIMEOUT)
    } else {
        RemoteError::NetworkError(e.to_string())
    }
}

#[async_trait]
impl AssistantService for OpenAiAssistantClient {
    fn name(&self) -> &str {
        "openai-assistants"
    }

    #[instrument(skip(self))]
    async fn create_thread(&self) -> Result<ThreadId, RemoteError> {
        let req = self.client.post(self.url("threads")).json(&serde_json::json!({}));
        let thread: ObjectRef = self.send(req).await?;
        debug!(thread_id = %thread.id, "thread created");
        Ok(ThreadId::from_raw(thread.id))
    }

    #[instrument(skip(self, content), fields(thread_id = %thread, role = %role))]
    async fn append_message(
        &self,
        thread: &ThreadId,
        role: Role,
        content: &str,
    ) -> Result<MessageId, RemoteError> {
        let req = self
            .client
            .post(self.url(&format!("threads/{thread}/messages")))
            .json(&CreateMessageBody {
                role: role.as_str(),
                content,
            });
        let message: ObjectRef = self.send(req).await?;
        Ok(MessageId::from_raw(message.id))
    }

    #[instrument(skip(self), fields(thread_id = %thread, assistant_id = %assistant))]
    async fn start_run(
        &self,
        thread: &ThreadId,
        assistant: &AssistantId,
    ) -> Result<RunId, RemoteError> {
        let req = self
            .client
            .post(self.url(&format!("threads/{thread}/runs")))
            .json(&CreateRunBody {
                assistant_id: assistant.as_str(),
            });
        let run: RunObject = self.send(req).await?;
        Ok(RunId::from_raw(run.id))
    }

    #[instrument(skip(self), fields(thread_id = %thread, run_id = %run))]
    async fn run_status(&self, thread: &ThreadId, run: &RunId) -> Result<RunStatus, RemoteError> {
        let req = self
            .client
            .get(self.url(&format!("threads/{thread}/runs/{run}")));
        let run: RunObject = self.send(req).await?;
        Ok(run.to_status())
    }

    #[instrument(skip(self), fields(thread_id = %thread))]
    async fn list_messages(
        &self,
        thread: &ThreadId,
        limit: u32,
    ) -> Result<Vec<ThreadMessage>, RemoteError> {
        let req = self
            .client
            .get(self.url(&format!("threads/{thread}/messages")))
            .query(&[("order", "desc".to_string()), ("limit", limit.to_string())]);
        let list: MessageList = self.send(req).await?;
        list.data
            .into_iter()
            .map(|m| m.into_thread_message())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{bearer_token, body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base: &str) -> OpenAiAssistantClient {
        OpenAiAssistantClient::new(ApiKey::new("sk-test"), base).unwrap()
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let c = client("https://api.openai.com/v1/");
        assert_eq!(c.base_url(), "https://api.openai.com/v1");
        assert_eq!(c.url("threads"), "https://api.openai.com/v1/threads");
        assert_eq!(c.url("/threads/t1/runs"), "https://api.openai.com/v1/threads/t1/runs");
    }

    #[test]
    fn debug_redacts_key() {
        let rendered = format!("{:?}", client("https://example.test/v1"));
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.contains("sk-test"));
    }

    #[test]
    fn provider_name() {
        assert_eq!(client("https://example.test").name(), "openai-assistants");
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        // Port 1 on loopback refuses connections.
        let c = client("http://127.0.0.1:1/v1");
        let err = c.create_thread().await.unwrap_err();
        assert!(err.is_retryable(), "got: {err:?}");
    }

    // ── HTTP layer (mock server) ─────────────────────────────────────

    async fn server() -> (MockServer, OpenAiAssistantClient) {
        let server = MockServer::start().await;
        let c = client(&format!("{}/v1/", server.uri()));
        (server, c)
    }

    fn thread() -> ThreadId {
        ThreadId::from_raw("thread_abc")
    }

    #[tokio::test]
    async fn create_thread_sends_auth_and_beta_headers() {
        let (server, c) = server().await;
        Mock::given(method("POST"))
            .and(path("/v1/threads"))
            .and(bearer_token("sk-test"))
            .and(header("OpenAI-Beta", "assistants=v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "thread_abc",
                "object": "thread"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let created = c.create_thread().await.unwrap();
        assert_eq!(created.as_str(), "thread_abc");
    }

    #[tokio::test]
    async fn append_message_posts_role_and_content() {
        let (server, c) = server().await;
        Mock::given(method("POST"))
            .and(path("/v1/threads/thread_abc/messages"))
            .and(body_json(serde_json::json!({
                "role": "user",
                "content": "I feel stressed"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg_1",
                "object": "thread.message"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let id = c
            .append_message(&thread(), Role::User, "I feel stressed")
            .await
            .unwrap();
        assert_eq!(id.as_str(), "msg_1");
    }

    #[tokio::test]
    async fn start_run_posts_assistant_id() {
        let (server, c) = server().await;
        Mock::given(method("POST"))
            .and(path("/v1/threads/thread_abc/runs"))
            .and(body_json(serde_json::json!({ "assistant_id": "asst_1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "run_1",
                "status": "queued"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let run = c
            .start_run(&thread(), &AssistantId::from_raw("asst_1"))
            .await
            .unwrap();
        assert_eq!(run.as_str(), "run_1");
    }

    #[tokio::test]
    async fn run_status_reads_failure_reason() {
        let (server, c) = server().await;
        Mock::given(method("GET"))
            .and(path("/v1/threads/thread_abc/runs/run_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "run_1",
                "status": "failed",
                "last_error": { "code": "server_error", "message": "Something went wrong" }
            })))
            .mount(&server)
            .await;

        let status = c.run_status(&thread(), &RunId::from_raw("run_1")).await.unwrap();
        assert_eq!(
            status,
            RunStatus::Failed {
                reason: "Something went wrong".into()
            }
        );
    }

    #[tokio::test]
    async fn list_messages_asks_for_newest_first() {
        let (server, c) = server().await;
        Mock::given(method("GET"))
            .and(path("/v1/threads/thread_abc/messages"))
            .and(query_param("order", "desc"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "object": "list",
                "data": [{
                    "id": "msg_9",
                    "role": "assistant",
                    "content": [{ "type": "text", "text": { "value": "I'm here.", "annotations": [] } }]
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let messages = c.list_messages(&thread(), 1).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::Assistant);
        assert_eq!(messages[0].content, "I'm here.");
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let (server, c) = server().await;
        Mock::given(method("POST"))
            .and(path("/v1/threads"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", "7")
                    .set_body_string("slow down"),
            )
            .mount(&server)
            .await;

        let err = c.create_thread().await.unwrap_err();
        assert_eq!(err.suggested_delay(), Some(Duration::from_secs(7)));
        assert!(matches!(err, RemoteError::RateLimited { .. }));
        assert!(err.is_rejected_before_processing());
    }

    #[tokio::test]
    async fn unavailable_is_overloaded() {
        let (server, c) = server().await;
        Mock::given(method("POST"))
            .and(path("/v1/threads/thread_abc/runs"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let err = c
            .start_run(&thread(), &AssistantId::from_raw("asst_1"))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Overloaded));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn unauthorized_is_fatal() {
        let (server, c) = server().await;
        Mock::given(method("POST"))
            .and(path("/v1/threads"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Incorrect API key"))
            .mount(&server)
            .await;

        let err = c.create_thread().await.unwrap_err();
        assert!(matches!(err, RemoteError::AuthenticationFailed(ref body) if body.contains("Incorrect")));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn undecodable_body_is_malformed() {
        let (server, c) = server().await;
        Mock::given(method("GET"))
            .and(path("/v1/threads/thread_abc/runs/run_1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&server)
            .await;

        let err = c
            .run_status(&thread(), &RunId::from_raw("run_1"))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::MalformedResponse(_)));
    }
}
