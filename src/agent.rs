use crate::ai_sdk::{
    conversation_contents, events_from_response, system_instruction, FunctionDeclaration,
    GenerateContentRequest, GenerateContentResponse, ToolDeclarations,
};
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::event::{Content, Event, FunctionCall, Part};
use crate::extract::{extract_response, History};
use crate::session::{Session, SessionLog};
use crate::tools::{get_tools, ToolContext, ToolDefinition};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{error, info, warn};

const MAX_TOOL_ROUNDS: usize = 8;

const INSTRUCTION: &str = "You are a helpful voice assistant. \
Keep your responses concise and conversational, suitable for being spoken aloud. \
Avoid markdown, lists and URLs unless the user asks for them. \
Try to use no more than a couple of short sentences.";

const SEARCH_HINT: &str = "Use the web_search tool for current events or facts you are unsure of, \
and summarize what you find clearly.";

const DATABASE_HINT: &str = "Use the execute_sql_query tool to answer questions about RNA families \
from the Rfam database. Only SELECT statements are allowed.";

/// Handle for a single invocation. Build one per message and drop it afterwards.
pub struct Agent {
    client: Client,
    config: AgentConfig,
    tools: Vec<ToolDefinition>,
}

impl Agent {
    pub fn new(client: Client, config: AgentConfig) -> Self {
        let tools = get_tools(config.tools);
        Self {
            client,
            config,
            tools,
        }
    }

    fn instruction(&self) -> String {
        let mut instruction = INSTRUCTION.to_string();
        for tool in &self.tools {
            let hint = match tool.name {
                "web_search" => SEARCH_HINT,
                "execute_sql_query" => DATABASE_HINT,
                _ => continue,
            };
            instruction.push(' ');
            instruction.push_str(hint);
        }
        instruction
    }

    pub(crate) async fn run_inference(
        &self,
        contents: Vec<Content>,
    ) -> Result<GenerateContentResponse, AgentError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(AgentError::MissingApiKey)?;

        let declarations: Vec<FunctionDeclaration> = self
            .tools
            .iter()
            .map(|t| FunctionDeclaration {
                name: t.name.to_string(),
                description: t.description.to_string(),
                parameters: t.input_schema.clone(),
            })
            .collect();

        let request = GenerateContentRequest {
            system_instruction: system_instruction(&self.instruction()),
            contents,
            tools: if declarations.is_empty() {
                Vec::new()
            } else {
                vec![ToolDeclarations {
                    function_declarations: declarations,
                }]
            },
        };

        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(AgentError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        Ok(response.json().await?)
    }

    pub(crate) async fn execute_tool(&self, call: &FunctionCall) -> Part {
        let output = match self.tools.iter().find(|t| t.name == call.name) {
            Some(tool) => {
                info!(tool = tool.name, "executing tool");
                (tool.handler)(self.tool_context(), call.args.clone()).await
            }
            None => {
                warn!(tool = %call.name, "model requested an unknown tool");
                format!("Error: tool '{}' not found", call.name)
            }
        };

        Part::function_response(call.name.clone(), json!({ "result": output }))
    }

    fn tool_context(&self) -> ToolContext {
        ToolContext {
            http: self.client.clone(),
            search_url: self.config.search_url.clone(),
            database_url: self.config.database_url.clone(),
        }
    }

    /// Runs one invocation and returns its events, starting with the user message.
    ///
    /// The events reach `log` only once the invocation completes. A failed or
    /// dropped invocation leaves the log as it was, so no function call is
    /// ever persisted without its response.
    pub async fn invoke(
        &self,
        log: &mut SessionLog<'_>,
        message: &str,
    ) -> Result<Vec<Event>, AgentError> {
        if self.config.api_key.is_none() {
            return Err(AgentError::MissingApiKey);
        }

        let mut pending = vec![Event::user_message(message)];

        for _ in 0..MAX_TOOL_ROUNDS {
            let contents = conversation_contents(log.events().iter().chain(&pending));
            let response = self.run_inference(contents).await?;
            let events = events_from_response(response);

            let calls: Vec<FunctionCall> = events
                .iter()
                .filter_map(|event| event.tool_calls.clone())
                .flatten()
                .collect();
            pending.extend(events);

            if calls.is_empty() {
                log.extend(pending.iter().cloned());
                return Ok(pending);
            }

            let mut results = Vec::with_capacity(calls.len());
            for call in &calls {
                results.push(self.execute_tool(call).await);
            }
            pending.push(Event::tool_response(results));
        }

        warn!(rounds = MAX_TOOL_ROUNDS, "tool round limit reached");
        pending.push(Event::failure(format!(
            "stopped after {} rounds of tool calls",
            MAX_TOOL_ROUNDS
        )));
        log.extend(pending.iter().cloned());
        Ok(pending)
    }
}

/// Handles one chat message for a session and always produces a speakable reply.
///
/// Invocations on the same session run one at a time. Failures become an
/// `"Error: "` reply instead of propagating.
pub async fn process_message(
    agent: Agent,
    session: &Session,
    message: &str,
    timeout: Duration,
) -> String {
    let session_id = &session.key().session_id;
    info!(session_id = %session_id, "processing message");

    let mut log = session.lock().await;
    let result = match tokio::time::timeout(timeout, agent.invoke(&mut log, message)).await {
        Ok(result) => result,
        Err(_) => Err(AgentError::Timeout(timeout)),
    };

    match result {
        Ok(events) => extract_response(&events, &log),
        Err(e) => {
            error!(session_id = %session_id, error = %e, "error running agent");
            format!("Error: {}", e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::NO_RESPONSE;
    use crate::session::SessionStore;
    use crate::tools::EnabledTools;
    use serde_json::Value;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GENERATE_PATH: &str = "/models/test-model:generateContent";

    fn config(base_url: String) -> AgentConfig {
        AgentConfig {
            api_key: Some("test-key".to_string()),
            model: "test-model".to_string(),
            base_url,
            search_url: String::new(),
            database_url: "mysql://unused".to_string(),
            tools: EnabledTools {
                search: false,
                database: true,
            },
        }
    }

    fn text_reply(text: &str) -> Value {
        json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP"
            }]
        })
    }

    async fn ask(config: AgentConfig, session: &Session, message: &str) -> String {
        let agent = Agent::new(Client::new(), config);
        process_message(agent, session, message, Duration::from_secs(5)).await
    }

    #[tokio::test]
    async fn plain_answer_is_returned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_string_contains("What is 2+2?"))
            .and(body_string_contains("functionDeclarations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("4")))
            .expect(1)
            .mount(&server)
            .await;

        let store = SessionStore::new();
        let session = store.get_or_create("web_user", "s1").await;
        let reply = ask(config(server.uri()), &session, "What is 2+2?").await;

        assert_eq!(reply, "4");
        assert_eq!(session.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn tool_calls_are_executed_and_fed_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(body_string_contains("functionResponse"))
            .and(body_string_contains("Only SELECT queries are allowed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_reply(
                "I can only read from that database.",
            )))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{
                        "functionCall": {
                            "name": "execute_sql_query",
                            "args": {"query": "DELETE FROM family"}
                        }
                    }]}
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = SessionStore::new();
        let session = store.get_or_create("web_user", "s1").await;
        let reply = ask(config(server.uri()), &session, "Delete all families").await;

        assert_eq!(reply, "I can only read from that database.");
        let log = session.lock().await;
        let events = log.events();
        assert_eq!(events.len(), 4);
        assert!(events[1].has_tool_calls());
        assert!(events[2].is_tool_traffic());
    }

    #[tokio::test]
    async fn earlier_turns_are_sent_as_context() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("first question"))
            .and(body_string_contains("second question"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("second answer")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("first answer")))
            .expect(1)
            .mount(&server)
            .await;

        let store = SessionStore::new();
        let session = store.get_or_create("web_user", "s1").await;
        let cfg = config(server.uri());

        assert_eq!(ask(cfg.clone(), &session, "first question").await, "first answer");
        assert_eq!(ask(cfg, &session, "second question").await, "second answer");
    }

    #[tokio::test]
    async fn upstream_failure_becomes_error_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
            .mount(&server)
            .await;

        let store = SessionStore::new();
        let session = store.get_or_create("web_user", "s1").await;
        let reply = ask(config(server.uri()), &session, "hello").await;

        assert_eq!(reply, "Error: model API error: 500 - internal");
    }

    #[tokio::test]
    async fn missing_api_key_becomes_error_reply() {
        let mut cfg = config("http://127.0.0.1:1".to_string());
        cfg.api_key = None;

        let store = SessionStore::new();
        let session = store.get_or_create("web_user", "s1").await;
        let reply = ask(cfg, &session, "hello").await;

        assert_eq!(reply, "Error: GOOGLE_API_KEY is not set");
        assert_eq!(session.lock().await.len(), 0);
    }

    #[tokio::test]
    async fn hung_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(text_reply("late"))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let store = SessionStore::new();
        let session = store.get_or_create("web_user", "s1").await;
        let agent = Agent::new(Client::new(), config(server.uri()));
        let reply = process_message(agent, &session, "hello", Duration::from_millis(50)).await;

        assert_eq!(reply, "Error: agent did not respond within 50ms");
    }

    #[tokio::test]
    async fn tool_call_followed_by_blocked_reply_yields_sentinel() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("functionResponse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": {"blockReason": "SAFETY"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"role": "model", "parts": [{
                    "functionCall": {"name": "lookup_weather", "args": {}}
                }]}}]
            })))
            .mount(&server)
            .await;

        let store = SessionStore::new();
        let session = store.get_or_create("web_user", "s1").await;
        let reply = ask(config(server.uri()), &session, "weather?").await;

        assert_eq!(reply, NO_RESPONSE);
    }

    #[tokio::test]
    async fn text_and_call_in_one_turn_are_sent_back_together() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(body_string_contains("functionResponse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_reply(
                " I can only read from that database.",
            )))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [
                        {"text": "Let me try that."},
                        {"functionCall": {
                            "name": "execute_sql_query",
                            "args": {"query": "DELETE FROM family"}
                        }}
                    ]}
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = SessionStore::new();
        let session = store.get_or_create("web_user", "s1").await;
        let reply = ask(config(server.uri()), &session, "Delete all families").await;

        assert_eq!(
            reply,
            "Let me try that. I can only read from that database."
        );
        assert_eq!(session.lock().await.len(), 5);

        let requests = server.received_requests().await.unwrap();
        let second: Value = requests[1].body_json().unwrap();
        assert_eq!(
            second["contents"],
            json!([
                {"role": "user", "parts": [{"text": "Delete all families"}]},
                {"role": "model", "parts": [
                    {"text": "Let me try that."},
                    {"functionCall": {
                        "name": "execute_sql_query",
                        "args": {"query": "DELETE FROM family"}
                    }}
                ]},
                {"role": "user", "parts": [{"functionResponse": {
                    "name": "execute_sql_query",
                    "response": {"result": "Error: Only SELECT queries are allowed."}
                }}]}
            ])
        );
    }

    #[tokio::test]
    async fn timeout_during_tool_call_leaves_session_usable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"RelatedTopics": []}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(body_string_contains("say hello"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("hello")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"role": "model", "parts": [{
                    "functionCall": {"name": "web_search", "args": {"query": "tide times"}}
                }]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut cfg = config(server.uri());
        cfg.search_url = format!("{}/search", server.uri());
        cfg.tools.search = true;

        let store = SessionStore::new();
        let session = store.get_or_create("web_user", "s1").await;

        let agent = Agent::new(Client::new(), cfg.clone());
        let reply =
            process_message(agent, &session, "tide times", Duration::from_millis(300)).await;
        assert_eq!(reply, "Error: agent did not respond within 300ms");
        assert_eq!(session.lock().await.len(), 0);

        assert_eq!(ask(cfg, &session, "say hello").await, "hello");
        let requests = server.received_requests().await.unwrap();
        let last: Value = requests.last().unwrap().body_json().unwrap();
        assert_eq!(
            last["contents"],
            json!([{"role": "user", "parts": [{"text": "say hello"}]}])
        );
    }

    #[test]
    fn instruction_mentions_enabled_tools_only() {
        let agent = Agent::new(Client::new(), config(String::new()));
        let instruction = agent.instruction();

        assert!(instruction.contains("execute_sql_query"));
        assert!(!instruction.contains("web_search"));
    }
}
