//! Interaction logging.
//!
//! Every completed turn is written as one pretty-printed JSON file:
//!
//! ```text
//! logs/faq_agent_20250101_120000_a1b2c3.json
//! ```
//!
//! The file holds the agent identity, the full message list and the
//! source label of the turn. Logging never fails a turn: use
//! [`log_interaction`], which reports failures through `tracing` and
//! carries on.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::agent::{AgentIdentity, Message};

/// Source label used when the caller does not supply one.
pub const DEFAULT_SOURCE: &str = "user";

/// One logged turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub agent_name: String,
    pub system_prompt: String,
    pub provider: String,
    pub model: String,
    pub tools: Vec<String>,
    pub messages: Vec<Message>,
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

impl InteractionRecord {
    pub fn new(identity: &AgentIdentity, messages: &[Message], source: &str) -> Self {
        Self {
            agent_name: identity.name.clone(),
            system_prompt: identity.instructions.clone(),
            provider: identity.provider.clone(),
            model: identity.model.clone(),
            tools: identity.tools.clone(),
            messages: messages.to_vec(),
            source: source.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Sink for finished turns.
pub trait InteractionLogger: Send + Sync {
    fn log(&self, identity: &AgentIdentity, messages: &[Message], source: &str) -> Result<()>;
}

/// Writes each record to its own file under a directory.
#[derive(Debug, Clone)]
pub struct FileLogger {
    dir: PathBuf,
}

impl FileLogger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `record` and return the path of the new file.
    pub fn write(&self, record: &InteractionRecord) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create log directory: {}", self.dir.display()))?;

        let path = self.dir.join(log_file_name(record));
        let json = serde_json::to_string_pretty(record)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write interaction log: {}", path.display()))?;

        tracing::debug!(path = %path.display(), "interaction logged");
        Ok(path)
    }
}

impl InteractionLogger for FileLogger {
    fn log(&self, identity: &AgentIdentity, messages: &[Message], source: &str) -> Result<()> {
        self.write(&InteractionRecord::new(identity, messages, source))?;
        Ok(())
    }
}

/// `{agent_name}_{YYYYmmdd_HHMMSS}_{6 hex}.json`
fn log_file_name(record: &InteractionRecord) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}.json",
        record.agent_name,
        record.timestamp.format("%Y%m%d_%H%M%S"),
        &suffix[..6]
    )
}

/// Log a finished turn, swallowing any failure. Returns whether the record
/// was written.
pub fn log_interaction(
    logger: &dyn InteractionLogger,
    identity: &AgentIdentity,
    messages: &[Message],
    source: &str,
) -> bool {
    match logger.log(identity, messages, source) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(agent = %identity.name, "failed to log interaction: {:#}", err);
            false
        }
    }
}
