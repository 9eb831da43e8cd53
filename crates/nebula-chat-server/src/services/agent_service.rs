use crate::config::AgentConfig;
use crate::models::chat::{ChatMessage, Role};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::conversation::SessionStore;
use super::nebula_adapter::NebulaAdapter;
use crate::utils::text::preview;

pub const NEBULA_TOOL_NAME: &str = "nebula_chat";
pub const AGENT_ERROR_PREFIX: &str = "Error communicating with agent model";

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent model returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Agent request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Agent model returned no choices")]
    EmptyChoices,

    #[error("Agent stopped after {0} tool rounds without a final answer")]
    IterationLimit(usize),
}

/// OpenAI-style chat message, including tool traffic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl AgentMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn system(content: &str) -> Self {
        Self::text("system", content)
    }

    pub fn user(content: &str) -> Self {
        Self::text("user", content)
    }

    pub fn tool(call_id: String, output: String) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(output),
            tool_calls: None,
            tool_call_id: Some(call_id),
        }
    }
}

impl From<&ChatMessage> for AgentMessage {
    fn from(message: &ChatMessage) -> Self {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        Self::text(role, &message.content)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object, as produced by the model
    #[serde(default)]
    pub arguments: String,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [AgentMessage],
    tools: &'a [Value],
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AgentMessage,
}

#[derive(Debug, Deserialize)]
struct NebulaToolArgs {
    message: String,
}

fn nebula_tool_definition() -> Value {
    json!({
        "type": "function",
        "function": {
            "name": NEBULA_TOOL_NAME,
            "description": "Ask the Nebula conversational AI a question. Nebula remembers earlier questions in this conversation.",
            "parameters": {
                "type": "object",
                "properties": {
                    "message": {
                        "type": "string",
                        "description": "The question or message to send to Nebula"
                    }
                },
                "required": ["message"]
            }
        }
    })
}

/// Tool-calling agent: a persona-prompted chat model that can consult
/// Nebula through the `nebula_chat` tool.
pub struct AgentService {
    client: Client,
    config: AgentConfig,
    nebula: Arc<NebulaAdapter>,
    store: SessionStore,
    tools: Vec<Value>,
}

impl AgentService {
    pub fn new(
        config: AgentConfig,
        nebula: Arc<NebulaAdapter>,
        store: SessionStore,
    ) -> Result<Self, AgentError> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        info!(
            "AgentService initialized (model: {}, max iterations: {})",
            config.model, config.max_iterations
        );

        Ok(Self {
            client: builder.build()?,
            config,
            nebula,
            store,
            tools: vec![nebula_tool_definition()],
        })
    }

    /// Reply text; failures are rendered into the text like the Nebula adapter does
    pub async fn respond(&self, message: &str, session_id: &str) -> String {
        match self.try_respond(message, session_id).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Agent failed (session: {}): {}", session_id, e);
                format!("{}: {}", AGENT_ERROR_PREFIX, e)
            }
        }
    }

    pub async fn try_respond(&self, message: &str, session_id: &str) -> Result<String, AgentError> {
        info!(
            "Agent handling message: {}... (session: {})",
            preview(message, 30),
            session_id
        );

        let session = self.store.session(session_id);
        let mut transcript = session.lock().await;

        let mut messages = Vec::with_capacity(transcript.len() + 4);
        messages.push(AgentMessage::system(&self.config.system_prompt));
        messages.extend(transcript.messages().iter().map(AgentMessage::from));
        messages.push(AgentMessage::user(message));

        for round in 1..=self.config.max_iterations {
            let reply = self.complete(&messages).await?;
            let tool_calls = reply.tool_calls.clone().unwrap_or_default();

            if tool_calls.is_empty() {
                let text = reply.content.unwrap_or_default();
                transcript.push_exchange(message, &text);
                info!("Agent answered after {} round(s): {}...", round, preview(&text, 50));
                return Ok(text);
            }

            debug!("Agent round {} requested {} tool call(s)", round, tool_calls.len());
            messages.push(reply);
            for call in tool_calls {
                let output = self.run_tool(&call, session_id).await;
                messages.push(AgentMessage::tool(call.id, output));
            }
        }

        Err(AgentError::IterationLimit(self.config.max_iterations))
    }

    /// Number of agent sessions seen so far
    pub fn session_count(&self) -> usize {
        self.store.len()
    }

    /// Tool output for the model. Bad calls are reported back as text so the
    /// model can correct itself.
    async fn run_tool(&self, call: &ToolCall, session_id: &str) -> String {
        if call.function.name != NEBULA_TOOL_NAME {
            warn!("Agent requested unknown tool: {}", call.function.name);
            return format!("Unknown tool: {}", call.function.name);
        }

        match serde_json::from_str::<NebulaToolArgs>(&call.function.arguments) {
            Ok(args) => self.nebula.generate_response(&args.message, session_id).await,
            Err(e) => {
                warn!("Invalid arguments for {}: {}", NEBULA_TOOL_NAME, e);
                format!("Invalid arguments for {}: {}", NEBULA_TOOL_NAME, e)
            }
        }
    }

    async fn complete(&self, messages: &[AgentMessage]) -> Result<AgentMessage, AgentError> {
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            tools: &self.tools,
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url.trim_end_matches('/')))
            .json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or(AgentError::EmptyChoices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::nebula_client::{MockChatBackend, NebulaReply};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn agent_config(server: &MockServer) -> AgentConfig {
        AgentConfig {
            enabled: true,
            base_url: server.uri(),
            api_key: Some("sk-test".to_string()),
            model: "gpt-4o-mini".to_string(),
            system_prompt: "You are Carl Jung.".to_string(),
            max_iterations: 3,
            timeout_seconds: Some(5),
        }
    }

    fn nebula_answering(answer: &'static str) -> Arc<NebulaAdapter> {
        let mut backend = MockChatBackend::new();
        backend.expect_chat().returning(move |_| {
            Ok(NebulaReply {
                message: Some(answer.to_string()),
                response: None,
            })
        });
        Arc::new(NebulaAdapter::new(Box::new(backend), SessionStore::default()))
    }

    fn final_answer(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": text}}]
        }))
    }

    fn tool_call(arguments: &str) -> ResponseTemplate {
        named_tool_call(NEBULA_TOOL_NAME, arguments)
    }

    fn named_tool_call(name: &str, arguments: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": name, "arguments": arguments}
                }]
            }}]
        }))
    }

    #[tokio::test]
    async fn test_direct_answer_is_recorded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(final_answer("The shadow is the unknown side."))
            .expect(1)
            .mount(&server)
            .await;

        let store = SessionStore::default();
        let agent =
            AgentService::new(agent_config(&server), nebula_answering("unused"), store.clone())
                .unwrap();

        let reply = agent.respond("What is the shadow?", "s1").await;
        assert_eq!(reply, "The shadow is the unknown side.");
        assert_eq!(
            store.snapshot("s1").await,
            vec![
                ChatMessage::user("What is the shadow?"),
                ChatMessage::assistant("The shadow is the unknown side."),
            ]
        );
    }

    #[tokio::test]
    async fn test_tool_call_routes_through_nebula() {
        let server = MockServer::start().await;

        // Second round: the tool output is in the conversation
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "messages": [
                    {"role": "system"},
                    {"role": "user"},
                    {"role": "assistant"},
                    {"role": "tool", "tool_call_id": "call_1", "content": "Archetypes are..."}
                ]
            })))
            .respond_with(final_answer("Jung: archetypes are universal images."))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(tool_call(r#"{"message": "What are archetypes?"}"#))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let nebula = nebula_answering("Archetypes are...");
        let agent =
            AgentService::new(agent_config(&server), nebula.clone(), SessionStore::default())
                .unwrap();

        let reply = agent.respond("What are the archetypes?", "s1").await;
        assert_eq!(reply, "Jung: archetypes are universal images.");
        assert_eq!(
            nebula.history("s1").await,
            vec![
                ChatMessage::user("What are archetypes?"),
                ChatMessage::assistant("Archetypes are..."),
            ]
        );
    }

    #[tokio::test]
    async fn test_endless_tool_calls_hit_iteration_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(tool_call(r#"{"message": "again"}"#))
            .expect(3)
            .mount(&server)
            .await;

        let store = SessionStore::default();
        let agent = AgentService::new(agent_config(&server), nebula_answering("..."), store.clone())
            .unwrap();

        let err = agent.try_respond("loop", "s1").await.unwrap_err();
        assert!(matches!(err, AgentError::IterationLimit(3)));
        assert!(store.snapshot("s1").await.is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_becomes_reply_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let agent = AgentService::new(
            agent_config(&server),
            nebula_answering("..."),
            SessionStore::default(),
        )
        .unwrap();

        let reply = agent.respond("hi", "s1").await;
        assert!(reply.starts_with(AGENT_ERROR_PREFIX));
        assert!(reply.contains("upstream down"));
    }

    /// Adapter whose backend must never be reached
    fn nebula_unreachable() -> Arc<NebulaAdapter> {
        let mut backend = MockChatBackend::new();
        backend.expect_chat().times(0);
        Arc::new(NebulaAdapter::new(Box::new(backend), SessionStore::default()))
    }

    /// Mount a tool-call first round followed by a final answer
    async fn mount_tool_round(server: &MockServer, first: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "messages": [
                    {"role": "system"},
                    {"role": "user"},
                    {"role": "assistant"},
                    {"role": "tool", "tool_call_id": "call_1"}
                ]
            })))
            .respond_with(final_answer("done"))
            .expect(1)
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(first)
            .up_to_n_times(1)
            .mount(server)
            .await;
    }

    /// Content of the tool message sent in the last model round
    async fn last_tool_output(server: &MockServer) -> String {
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        let body: Value = requests[1].body_json().unwrap();
        body["messages"][3]["content"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_malformed_tool_arguments_are_reported_to_model() {
        let server = MockServer::start().await;
        mount_tool_round(&server, tool_call("{not json")).await;

        let nebula = nebula_unreachable();
        let agent =
            AgentService::new(agent_config(&server), nebula.clone(), SessionStore::default())
                .unwrap();

        let reply = agent.respond("What are archetypes?", "s1").await;
        assert_eq!(reply, "done");

        let output = last_tool_output(&server).await;
        assert!(output.starts_with(&format!("Invalid arguments for {}:", NEBULA_TOOL_NAME)));
        assert!(nebula.history("s1").await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_to_model() {
        let server = MockServer::start().await;
        mount_tool_round(
            &server,
            named_tool_call("other_tool", r#"{"message": "What are archetypes?"}"#),
        )
        .await;

        let nebula = nebula_unreachable();
        let agent =
            AgentService::new(agent_config(&server), nebula.clone(), SessionStore::default())
                .unwrap();

        let reply = agent.respond("What are archetypes?", "s1").await;
        assert_eq!(reply, "done");
        assert_eq!(last_tool_output(&server).await, "Unknown tool: other_tool");
        assert_eq!(nebula.session_count(), 0);
    }

    #[test]
    fn test_history_maps_to_agent_roles() {
        let message = AgentMessage::from(&ChatMessage::assistant("earlier"));
        assert_eq!(message.role, "assistant");
        assert_eq!(message.content.as_deref(), Some("earlier"));
        assert!(message.tool_calls.is_none());
    }
}
