//! Agent runtime interface.
//!
//! An [`Agent`] answers one prompt at a time. Each call to
//! [`Agent::run_stream`] returns an [`AgentRun`] that yields successive
//! *snapshots*: the full text of the answer so far, never a delta. When the
//! run is exhausted, [`AgentRun::finish`] hands back the structured message
//! history for that turn, ready to be logged.
//!
//! The streaming layer ([`crate::stream`]) turns snapshots into deltas; the
//! concrete runtime lives in [`crate::openai`].

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::RepoConfig;

/// Default system prompt. `{owner}`, `{name}` and `{branch}` are filled in
/// by [`render_instructions`].
pub const DEFAULT_INSTRUCTIONS: &str = "\
You are a helpful assistant for the course FAQ of the {owner}/{name} repository.

Always use the search tool to look up relevant material before answering.
Base your answer on the search results; if they do not contain anything \
relevant, say so and then give general guidance.

When you use a document, cite it as a markdown link to its file on GitHub:
[short title](https://github.com/{owner}/{name}/blob/{branch}/<filename>)
where <filename> is the `filename` field of the search result.";

/// Who answered a turn, recorded with every interaction log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIdentity {
    pub name: String,
    pub instructions: String,
    pub provider: String,
    pub model: String,
    /// Names of the tools the agent may call.
    pub tools: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments as produced by the model.
    pub arguments: String,
}

/// One message of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// An assistant message that requests tool calls. Empty text is stored
    /// as no content.
    pub fn assistant_with_calls(content: String, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: (!content.is_empty()).then_some(content),
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// Result of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnOutput {
    /// Every message exchanged during the turn, user prompt first.
    pub messages: Vec<Message>,
    /// Where the prompt came from (`"web"`, `"cli"`, ...). `None` means the
    /// default label.
    pub source: Option<String>,
}

impl TurnOutput {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            source: None,
        }
    }

    /// Label the output with `source` unless the run already set one.
    pub fn tagged(mut self, source: Option<String>) -> Self {
        if self.source.is_none() {
            self.source = source;
        }
        self
    }
}

/// A conversational runtime with access to the search tool.
#[async_trait]
pub trait Agent: Send + Sync {
    fn identity(&self) -> &AgentIdentity;

    /// Start answering `prompt`.
    async fn run_stream(&self, prompt: &str) -> Result<Box<dyn AgentRun>>;
}

/// One in-flight answer.
#[async_trait]
pub trait AgentRun: Send {
    /// The next snapshot of the answer, or `None` once the run is complete.
    ///
    /// Snapshots only ever grow: each one extends the previous one.
    async fn next_snapshot(&mut self) -> Option<Result<String>>;

    /// Consume the run and return the messages it produced.
    ///
    /// Only meaningful once [`next_snapshot`](AgentRun::next_snapshot) has
    /// returned `None`.
    fn finish(self: Box<Self>) -> TurnOutput;
}

/// Fill the repository placeholders of a system prompt template.
pub fn render_instructions(template: &str, repo: &RepoConfig) -> String {
    template
        .replace("{owner}", &repo.owner)
        .replace("{name}", &repo.name)
        .replace("{branch}", &repo.branch)
}
