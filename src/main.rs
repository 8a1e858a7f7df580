//! Storykeep - renders the configured story's manuscript from its document store
//!
//! Authoring happens through the library; this binary opens a session on the
//! configured story and chapter, reports timeline warnings and prints the
//! manuscript through that chapter to stdout.

use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storykeep::application::services::StorySession;
use storykeep::infrastructure::config::AppConfig;
use storykeep::infrastructure::ollama::OllamaClient;
use storykeep::infrastructure::persistence::DocumentStoreFactory;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storykeep=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting Storykeep");

    // Load configuration
    let config = AppConfig::from_env()?;
    tracing::info!("Configuration loaded");
    tracing::info!("  Store: {} ({})", config.store.backend, config.store.sqlite_path);
    tracing::info!("  Ollama: {} [{}]", config.ollama_base_url, config.ollama_model);

    let factory = DocumentStoreFactory::new(config.store.clone()).await?;
    let store = factory.create_store().await?;

    let llm = OllamaClient::new(
        &config.ollama_base_url,
        &config.ollama_model,
        Duration::from_secs(config.ollama_timeout_secs),
    )?
    .with_api_key(config.ollama_api_key.clone());

    let session = StorySession::open(config.session_config(), store, llm).await?;

    for warning in session.timeline_warnings().await? {
        tracing::warn!("{}", warning);
    }

    let analytics = session.analytics().await?;
    tracing::info!(
        story = %analytics.story_id,
        chapter = analytics.chapter,
        elements = analytics.element_count,
        characters = analytics.character_count,
        "Story loaded"
    );

    print!("{}", session.render_manuscript(&[]).await?);
    Ok(())
}
