//! OpenAI-compatible chat runtime with streaming and function calling.
//!
//! Each turn is a loop of rounds against `POST {base_url}/chat/completions`
//! with `stream: true`:
//!
//! 1. Content deltas are appended to the answer and surfaced as snapshots.
//! 2. Tool-call deltas are accumulated by their `index`.
//! 3. If the round ends with tool calls, every call runs through the
//!    [`ToolRegistry`], the results are appended as `tool` messages and a
//!    new round starts.
//!
//! Text from earlier rounds is kept, so snapshots only ever grow. The number
//! of tool rounds per turn is capped by `[agent].max_tool_rounds`.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::{
    render_instructions, Agent, AgentIdentity, AgentRun, Message, Role, ToolCall, TurnOutput,
    DEFAULT_INSTRUCTIONS,
};
use crate::config::{AgentConfig, Config};
use crate::traits::ToolRegistry;

const PROVIDER: &str = "openai";

type EventStream =
    Pin<Box<dyn Stream<Item = Result<Event, EventStreamError<reqwest::Error>>> + Send>>;

/// Connection settings for the chat endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub base_url: String,
    /// `None` when the configured environment variable is unset; turns then
    /// fail with a clear error while search keeps working.
    pub api_key: Option<String>,
    pub api_key_env: String,
    pub model: String,
    pub max_tool_rounds: usize,
    pub timeout: Duration,
}

impl OpenAiSettings {
    /// Read settings from `[agent]`, taking the key from the environment.
    pub fn from_config(agent: &AgentConfig) -> Self {
        Self {
            base_url: agent.base_url.trim_end_matches('/').to_string(),
            api_key: std::env::var(&agent.api_key_env)
                .ok()
                .filter(|key| !key.trim().is_empty()),
            api_key_env: agent.api_key_env.clone(),
            model: agent.model.clone(),
            max_tool_rounds: agent.max_tool_rounds,
            timeout: Duration::from_secs(agent.timeout_secs),
        }
    }
}

struct Inner {
    client: reqwest::Client,
    settings: OpenAiSettings,
    identity: AgentIdentity,
    tools: Arc<ToolRegistry>,
}

/// [`Agent`] backed by an OpenAI-compatible chat completions API.
#[derive(Clone)]
pub struct OpenAiAgent {
    inner: Arc<Inner>,
}

impl OpenAiAgent {
    pub fn new(
        settings: OpenAiSettings,
        name: impl Into<String>,
        instructions: impl Into<String>,
        tools: Arc<ToolRegistry>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let identity = AgentIdentity {
            name: name.into(),
            instructions: instructions.into(),
            provider: PROVIDER.to_string(),
            model: settings.model.clone(),
            tools: tools.names(),
        };

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                settings,
                identity,
                tools,
            }),
        })
    }

    /// Agent described by `[agent]`, with the system prompt rendered for
    /// `[repo]`.
    pub fn from_config(config: &Config, tools: Arc<ToolRegistry>) -> Result<Self> {
        let template = config
            .agent
            .instructions
            .as_deref()
            .unwrap_or(DEFAULT_INSTRUCTIONS);
        Self::new(
            OpenAiSettings::from_config(&config.agent),
            config.agent.name.clone(),
            render_instructions(template, &config.repo),
            tools,
        )
    }
}

#[async_trait]
impl Agent for OpenAiAgent {
    fn identity(&self) -> &AgentIdentity {
        &self.inner.identity
    }

    async fn run_stream(&self, prompt: &str) -> Result<Box<dyn AgentRun>> {
        if self.inner.settings.api_key.is_none() {
            bail!(
                "{} is not set; the agent needs an API key to answer",
                self.inner.settings.api_key_env
            );
        }

        Ok(Box::new(OpenAiRun {
            inner: self.inner.clone(),
            messages: vec![
                Message::system(self.inner.identity.instructions.clone()),
                Message::user(prompt),
            ],
            events: None,
            text: String::new(),
            round: RoundState::default(),
            tool_rounds: 0,
            done: false,
        }))
    }
}

#[derive(Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

/// What one streamed response has produced so far.
#[derive(Default)]
struct RoundState {
    text: String,
    calls: BTreeMap<usize, PartialCall>,
}

struct OpenAiRun {
    inner: Arc<Inner>,
    /// Full conversation, system prompt first.
    messages: Vec<Message>,
    events: Option<EventStream>,
    /// Answer text across all rounds.
    text: String,
    round: RoundState,
    tool_rounds: usize,
    done: bool,
}

async fn start_round(inner: &Inner, messages: &[Message]) -> Result<EventStream> {
    let settings = &inner.settings;
    let tools: Vec<WireTool> = inner
        .tools
        .tools()
        .iter()
        .map(|t| WireTool {
            r#type: "function",
            function: WireFunction {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            },
        })
        .collect();

    let body = ChatRequest {
        model: &settings.model,
        messages: messages.iter().map(WireMessage::from).collect(),
        stream: true,
        tools,
    };

    let url = format!("{}/chat/completions", settings.base_url);
    tracing::debug!(%url, messages = messages.len(), "starting chat round");

    let mut request = inner.client.post(&url).json(&body);
    if let Some(key) = &settings.api_key {
        request = request.bearer_auth(key);
    }
    let resp = request.send().await.context("chat completion request failed")?;

    let status = resp.status();
    if !status.is_success() {
        let detail = resp.text().await.unwrap_or_default();
        bail!(
            "chat completion returned HTTP {}: {}",
            status.as_u16(),
            detail.trim()
        );
    }

    Ok(Box::pin(resp.bytes_stream().eventsource()))
}

/// Tool failures are reported back to the model, not raised.
async fn run_tool(inner: &Inner, call: &ToolCall) -> String {
    tracing::info!(tool = %call.name, arguments = %call.arguments, "tool call");

    let params = if call.arguments.trim().is_empty() {
        Ok(Value::Object(Default::default()))
    } else {
        serde_json::from_str::<Value>(&call.arguments)
    };

    let result = match params {
        Ok(params) => inner
            .tools
            .call(&call.name, params)
            .await
            .map_err(|e| e.to_string()),
        Err(e) => Err(format!("invalid arguments: {e}")),
    };

    match result {
        Ok(value) => value.to_string(),
        Err(message) => {
            tracing::warn!(tool = %call.name, "tool call failed: {}", message);
            serde_json::json!({ "error": message }).to_string()
        }
    }
}

impl OpenAiRun {
    /// Apply one SSE payload. Returns `true` when the answer text grew.
    fn apply_chunk(&mut self, data: &str) -> Result<bool> {
        let chunk: StreamChunk =
            serde_json::from_str(data).with_context(|| format!("bad stream chunk: {data}"))?;

        let mut grew = false;
        for choice in chunk.choices {
            if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                if self.round.text.is_empty() && !self.text.is_empty() {
                    self.text.push_str("\n\n");
                }
                self.round.text.push_str(&content);
                self.text.push_str(&content);
                grew = true;
            }

            for delta in choice.delta.tool_calls.unwrap_or_default() {
                let call = self.round.calls.entry(delta.index).or_default();
                if let Some(id) = delta.id {
                    call.id = id;
                }
                if let Some(function) = delta.function {
                    if let Some(name) = function.name {
                        call.name.push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        call.arguments.push_str(&arguments);
                    }
                }
            }
        }
        Ok(grew)
    }

    /// Close the current round. Returns `true` when another round is needed.
    async fn end_round(&mut self) -> Result<bool> {
        let round = std::mem::take(&mut self.round);
        let calls: Vec<ToolCall> = round
            .calls
            .into_values()
            .map(|c| ToolCall {
                id: c.id,
                name: c.name,
                arguments: c.arguments,
            })
            .collect();

        if calls.is_empty() {
            self.messages.push(Message::assistant(round.text));
            return Ok(false);
        }

        if self.tool_rounds >= self.inner.settings.max_tool_rounds {
            bail!(
                "agent exceeded {} tool rounds without answering",
                self.inner.settings.max_tool_rounds
            );
        }
        self.tool_rounds += 1;

        self.messages
            .push(Message::assistant_with_calls(round.text, calls.clone()));

        let inner = self.inner.clone();
        for call in calls {
            let output = run_tool(&inner, &call).await;
            self.messages.push(Message::tool_result(call.id, output));
        }
        Ok(true)
    }

    fn fail(&mut self, err: anyhow::Error) -> Option<Result<String>> {
        self.done = true;
        self.events = None;
        Some(Err(err))
    }
}

#[async_trait]
impl AgentRun for OpenAiRun {
    async fn next_snapshot(&mut self) -> Option<Result<String>> {
        loop {
            if self.done {
                return None;
            }

            if self.events.is_none() {
                match start_round(&self.inner, &self.messages).await {
                    Ok(events) => self.events = Some(events),
                    Err(err) => return self.fail(err),
                }
            }

            let item = match self.events.as_mut() {
                Some(events) => events.next().await,
                None => None,
            };

            match item {
                Some(Ok(event)) if event.data.trim() != "[DONE]" => {
                    match self.apply_chunk(&event.data) {
                        Ok(true) => return Some(Ok(self.text.clone())),
                        Ok(false) => continue,
                        Err(err) => return self.fail(err),
                    }
                }
                Some(Err(err)) => return self.fail(anyhow!("chat stream error: {err}")),
                _ => {
                    self.events = None;
                    match self.end_round().await {
                        Ok(true) => continue,
                        Ok(false) => {
                            self.done = true;
                            return None;
                        }
                        Err(err) => return self.fail(err),
                    }
                }
            }
        }
    }

    fn finish(self: Box<Self>) -> TurnOutput {
        TurnOutput::new(
            self.messages
                .into_iter()
                .filter(|m| m.role != Role::System)
                .collect(),
        )
    }
}

// ============ Wire format ============

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

impl<'a> From<&'a Message> for WireMessage<'a> {
    fn from(msg: &'a Message) -> Self {
        Self {
            role: msg.role,
            content: msg.content.as_deref(),
            tool_calls: msg
                .tool_calls
                .iter()
                .map(|c| WireToolCall {
                    id: &c.id,
                    r#type: "function",
                    function: WireFunctionCall {
                        name: &c.name,
                        arguments: &c.arguments,
                    },
                })
                .collect(),
            tool_call_id: msg.tool_call_id.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct WireToolCall<'a> {
    id: &'a str,
    r#type: &'static str,
    function: WireFunctionCall<'a>,
}

#[derive(Serialize)]
struct WireFunctionCall<'a> {
    name: &'a str,
    arguments: &'a str,
}

#[derive(Serialize)]
struct WireTool {
    r#type: &'static str,
    function: WireFunction,
}

#[derive(Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionDelta>,
}

#[derive(Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}
