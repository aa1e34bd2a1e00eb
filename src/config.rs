//! TOML configuration parsing and validation.
//!
//! Every section except `[repo]` is optional and falls back to the
//! defaults below. See `config/faq.example.toml` for a full example.

use anyhow::{bail, Context, Result};
use faq_harness_core::builder::BuildOptions;
use faq_harness_core::chunk::{ChunkingParams, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_STEP};
use faq_harness_core::index::IndexOptions;
use faq_harness_core::search::DEFAULT_NUM_RESULTS;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variable that overrides `[logs].dir`.
pub const LOGS_DIR_ENV: &str = "LOGS_DIRECTORY";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub repo: RepoConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub logs: LogsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RepoConfig {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// URL template with `{owner}`, `{name}` and `{branch}` placeholders.
    #[serde(default = "default_archive_url")]
    pub archive_url: String,
    /// Read the archive from disk instead of downloading it.
    #[serde(default)]
    pub archive_path: Option<PathBuf>,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
}

fn default_branch() -> String {
    "main".to_string()
}
fn default_archive_url() -> String {
    "https://codeload.github.com/{owner}/{name}/zip/refs/heads/{branch}".to_string()
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.mdx".to_string()]
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            name: String::new(),
            branch: default_branch(),
            archive_url: default_archive_url(),
            archive_path: None,
            include_globs: default_include_globs(),
        }
    }
}

impl RepoConfig {
    /// `"owner/name"`, used in prompts and log lines.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FilterConfig {
    /// Keep only documents whose filename contains this substring.
    #[serde(default)]
    pub filename_contains: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_chunk_size")]
    pub size: usize,
    #[serde(default = "default_chunk_step")]
    pub step: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_step() -> usize {
    DEFAULT_CHUNK_STEP
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            size: DEFAULT_CHUNK_SIZE,
            step: DEFAULT_CHUNK_STEP,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_text_fields")]
    pub text_fields: Vec<String>,
    #[serde(default)]
    pub keyword_fields: Vec<String>,
}

fn default_text_fields() -> Vec<String> {
    vec!["content".to_string(), "filename".to_string()]
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            text_fields: default_text_fields(),
            keyword_fields: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_num_results")]
    pub num_results: usize,
    /// Text field → score multiplier, e.g. `{ filename = 2.0 }`.
    #[serde(default)]
    pub boosts: HashMap<String, f64>,
}

fn default_num_results() -> usize {
    DEFAULT_NUM_RESULTS
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            num_results: DEFAULT_NUM_RESULTS,
            boosts: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    #[serde(default = "default_agent_name")]
    pub name: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// System prompt template; `{owner}`, `{name}`, `{branch}` are filled in.
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_agent_name() -> String {
    "faq_agent".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_max_tool_rounds() -> usize {
    8
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            instructions: None,
            max_tool_rounds: default_max_tool_rounds(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogsConfig {
    #[serde(default = "default_logs_dir")]
    pub dir: PathBuf,
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            dir: default_logs_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:7331".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Config {
    /// Defaults for every section, pointing at the DataTalksClub FAQ.
    pub fn minimal() -> Self {
        Self {
            repo: RepoConfig {
                owner: "DataTalksClub".to_string(),
                name: "faq".to_string(),
                ..RepoConfig::default()
            },
            filter: FilterConfig::default(),
            chunking: ChunkingConfig::default(),
            index: IndexConfig::default(),
            search: SearchConfig::default(),
            agent: AgentConfig::default(),
            logs: LogsConfig::default(),
            server: ServerConfig::default(),
        }
    }

    /// Index builder options derived from `[index]` and `[chunking]`.
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            index: IndexOptions {
                text_fields: self.index.text_fields.clone(),
                keyword_fields: self.index.keyword_fields.clone(),
            },
            chunking: self
                .chunking
                .enabled
                .then(|| ChunkingParams::new(self.chunking.size, self.chunking.step)),
        }
    }

    /// Log directory, honoring the `LOGS_DIRECTORY` override.
    pub fn logs_dir(&self) -> PathBuf {
        std::env::var_os(LOGS_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.logs.dir.clone())
    }

    pub fn validate(&self) -> Result<()> {
        if self.repo.archive_path.is_none()
            && (self.repo.owner.trim().is_empty() || self.repo.name.trim().is_empty())
        {
            bail!("repo.owner and repo.name must be set unless repo.archive_path is given");
        }

        if self.repo.include_globs.is_empty() {
            bail!("repo.include_globs must not be empty");
        }

        if self.chunking.size == 0 || self.chunking.step == 0 {
            bail!("chunking.size and chunking.step must be > 0");
        }

        if self.index.text_fields.is_empty() {
            bail!("index.text_fields must not be empty");
        }

        if self.search.num_results < 1 {
            bail!("search.num_results must be >= 1");
        }

        for (field, weight) in &self.search.boosts {
            if !self.index.text_fields.contains(field) {
                bail!("search.boosts.{} is not one of index.text_fields", field);
            }
            if !weight.is_finite() || *weight < 0.0 {
                bail!("search.boosts.{} must be a non-negative number", field);
            }
        }

        if self.agent.max_tool_rounds < 1 {
            bail!("agent.max_tool_rounds must be >= 1");
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_repo_section_uses_defaults() {
        let config: Config = toml::from_str("[repo]\nowner = \"o\"\nname = \"n\"\n").unwrap();
        config.validate().unwrap();
        assert_eq!(config.repo.branch, "main");
        assert_eq!(config.repo.include_globs, vec!["**/*.md", "**/*.mdx"]);
        assert_eq!(config.search.num_results, 5);
        assert_eq!(config.chunking.size, 2000);
        assert_eq!(config.chunking.step, 1000);
        assert!(config.build_options().chunking.is_none());
    }

    #[test]
    fn chunking_enabled_flows_into_build_options() {
        let config: Config = toml::from_str(
            "[repo]\nowner = \"o\"\nname = \"n\"\n[chunking]\nenabled = true\nsize = 300\nstep = 100\n",
        )
        .unwrap();
        assert_eq!(
            config.build_options().chunking,
            Some(ChunkingParams::new(300, 100))
        );
    }

    #[test]
    fn zero_step_rejected() {
        let config: Config =
            toml::from_str("[repo]\nowner = \"o\"\nname = \"n\"\n[chunking]\nstep = 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn archive_path_replaces_owner_and_name() {
        let config: Config = toml::from_str("[repo]\narchive_path = \"faq.zip\"\n").unwrap();
        config.validate().unwrap();

        let config: Config = toml::from_str("[repo]\nbranch = \"dev\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn boosts_must_name_text_fields() {
        let config: Config = toml::from_str(
            "[repo]\nowner = \"o\"\nname = \"n\"\n[search]\nboosts = { filename = 2.0 }\n",
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.search.boosts["filename"], 2.0);

        let config: Config = toml::from_str(
            "[repo]\nowner = \"o\"\nname = \"n\"\n[search]\nboosts = { question = 2.0 }\n",
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("search.boosts.question"));

        let config: Config = toml::from_str(
            "[repo]\nowner = \"o\"\nname = \"n\"\n[search]\nboosts = { content = -1.0 }\n",
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_config_reports_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
