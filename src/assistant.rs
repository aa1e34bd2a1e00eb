//! Warm-up and the long-lived assistant shared by every request.
//!
//! An [`Assistant`] owns the search slot, the tool registry, the agent and
//! the interaction logger. It can be constructed before the index exists
//! (the HTTP server does this so it can bind right away); queries then fail
//! with "not ready" until [`Assistant::warm_up`] has installed the index.

use std::sync::Arc;

use anyhow::{Context, Result};
use faq_harness_core::search::{SearchSlot, SearchTool};

use crate::agent::Agent;
use crate::config::Config;
use crate::ingest::index_data;
use crate::logs::{FileLogger, InteractionLogger};
use crate::openai::OpenAiAgent;
use crate::stream::{stream_turn, TurnStream};
use crate::traits::ToolRegistry;

pub struct Assistant {
    config: Config,
    slot: SearchSlot,
    tools: Arc<ToolRegistry>,
    agent: Arc<dyn Agent>,
    logger: Arc<dyn InteractionLogger>,
}

impl Assistant {
    /// Wire everything up without building the index.
    pub fn new(config: Config) -> Result<Self> {
        let slot = SearchSlot::new();
        let tools = Arc::new(ToolRegistry::with_builtins(slot.clone()));
        let agent = OpenAiAgent::from_config(&config, tools.clone())?;
        let logger = FileLogger::new(config.logs_dir());

        Ok(Self {
            config,
            slot,
            tools,
            agent: Arc::new(agent),
            logger: Arc::new(logger),
        })
    }

    pub fn with_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.agent = agent;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn InteractionLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Run ingestion once and install the search tool.
    pub async fn warm_up(&self) -> Result<()> {
        tracing::info!(repo = %self.config.repo.slug(), "warming up");
        let index = index_data(&self.config).await?;
        let documents = index.len();

        let tool = SearchTool::with_limit(Arc::new(index), self.config.search.num_results)
            .with_boosts(self.config.search.boosts.clone());
        self.slot
            .install(tool)
            .context("Search index was already built")?;

        tracing::info!(documents, "search index ready");
        Ok(())
    }

    /// Install a prebuilt search tool instead of running ingestion.
    pub fn install(&self, tool: SearchTool) -> Result<()> {
        self.slot.install(tool)?;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.slot.is_ready()
    }

    /// Number of indexed documents (or chunks), `None` before warm-up.
    pub fn documents(&self) -> Option<usize> {
        self.slot.get().ok().map(|tool| tool.index().len())
    }

    pub fn search_tool(&self) -> Result<&SearchTool> {
        Ok(self.slot.get()?)
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Answer `prompt` as a stream of deltas. `source` labels the log
    /// record (`"user"` when absent).
    pub fn ask(&self, prompt: impl Into<String>, source: Option<String>) -> TurnStream {
        stream_turn(
            self.agent.clone(),
            self.logger.clone(),
            prompt.into(),
            source,
        )
    }
}

/// Build a ready-to-use assistant: ingestion, index, tools, agent, logger.
pub async fn warm_up(config: Config) -> Result<Assistant> {
    let assistant = Assistant::new(config)?;
    assistant.warm_up().await?;
    Ok(assistant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::fake::ScriptedAgent;
    use crate::logs::memory::MemoryLogger;
    use std::io::Write;

    fn archive(dir: &std::path::Path) -> std::path::PathBuf {
        let path = dir.join("faq-main.zip");
        let mut writer = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
        let options = zip::write::SimpleFileOptions::default();
        for (name, body) in [
            ("faq-main/data-engineering/gcp.md", "Create a GCP service account key."),
            ("faq-main/data-engineering/docker.md", "Docker compose networking."),
        ] {
            writer.start_file(name, options).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    #[tokio::test]
    async fn warm_up_installs_search() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::minimal();
        config.repo.archive_path = Some(archive(tmp.path()));
        config.logs.dir = tmp.path().join("logs");

        let assistant = Assistant::new(config).unwrap();
        assert!(!assistant.is_ready());
        assert!(assistant.search_tool().is_err());

        assistant.warm_up().await.unwrap();
        assert_eq!(assistant.documents(), Some(2));
        let hits = assistant.search_tool().unwrap().search("service account");
        assert_eq!(hits[0].document.filename(), "data-engineering/gcp.md");

        assert!(assistant.warm_up().await.is_err());
    }

    #[tokio::test]
    async fn ask_streams_and_logs() {
        let logger = Arc::new(MemoryLogger::default());
        let assistant = Assistant::new(Config::minimal())
            .unwrap()
            .with_agent(Arc::new(ScriptedAgent::new(&["Use", "Use GCP."])))
            .with_logger(logger.clone());

        let summary = assistant.ask("how?", None).finish().await.unwrap();
        assert_eq!(summary.text, "Use GCP.");
        assert_eq!(logger.count(), 1);
    }
}
