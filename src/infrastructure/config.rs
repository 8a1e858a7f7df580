//! Application configuration

use std::env;

use anyhow::{Context, Result};

use crate::application::services::{GenerationSettings, SessionConfig};
use crate::domain::entities::DEFAULT_TIME_FORMAT;

/// Document store selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// `memory` or `sqlite`
    pub backend: String,
    /// Database file for the `sqlite` backend
    pub sqlite_path: String,
}

/// Application configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Ollama API base URL (OpenAI-compatible)
    pub ollama_base_url: String,
    /// Default model for generation requests
    pub ollama_model: String,
    /// Bearer token for hosted OpenAI-compatible servers
    pub ollama_api_key: Option<String>,
    pub ollama_timeout_secs: u64,

    pub store: StoreConfig,

    pub story_id: Option<String>,
    pub story_title: String,
    pub story_author: String,
    pub chapter: u32,
    pub time_format: String,

    pub generation: GenerationSettings,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let defaults = GenerationSettings::default();

        Ok(Self {
            ollama_base_url: var("OLLAMA_BASE_URL", "http://localhost:11434/v1"),
            ollama_model: var("OLLAMA_MODEL", "qwen3:8b"),
            ollama_api_key: lookup("OLLAMA_API_KEY").filter(|k| !k.trim().is_empty()),
            ollama_timeout_secs: var("OLLAMA_TIMEOUT_SECS", "120")
                .parse()
                .context("OLLAMA_TIMEOUT_SECS must be a number of seconds")?,

            store: StoreConfig {
                backend: var("STORYKEEP_STORE_BACKEND", "sqlite"),
                sqlite_path: var("STORYKEEP_SQLITE_PATH", "./data/storykeep.db"),
            },

            story_id: lookup("STORYKEEP_STORY_ID").filter(|s| !s.trim().is_empty()),
            story_title: var("STORYKEEP_TITLE", "Untitled Story"),
            story_author: var("STORYKEEP_AUTHOR", "Anonymous"),
            chapter: var("STORYKEEP_CHAPTER", "1")
                .parse()
                .context("STORYKEEP_CHAPTER must be a positive chapter number")?,
            time_format: var("STORYKEEP_TIME_FORMAT", DEFAULT_TIME_FORMAT),

            generation: GenerationSettings {
                temperature: parsed_or(&lookup, "STORYKEEP_TEMPERATURE", defaults.temperature),
                top_p: parsed_or(&lookup, "STORYKEEP_TOP_P", defaults.top_p),
                max_tokens: lookup("STORYKEEP_MAX_TOKENS")
                    .and_then(|v| v.parse().ok())
                    .or(defaults.max_tokens),
                max_parse_attempts: parsed_or(
                    &lookup,
                    "STORYKEEP_MAX_PARSE_ATTEMPTS",
                    defaults.max_parse_attempts,
                ),
            },
        })
    }

    /// Session settings for the configured story and chapter
    pub fn session_config(&self) -> SessionConfig {
        let config = SessionConfig::new(&self.story_title, &self.story_author, self.chapter)
            .with_time_format(&self.time_format)
            .with_generation(self.generation.clone());
        match &self.story_id {
            Some(id) => config.with_story_id(id),
            None => config,
        }
    }
}

fn parsed_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}
