//! Document store factory - builds the configured backend
//!
//! `memory` keeps documents for the life of the process; `sqlite` keeps them
//! in a file so later sessions can rehydrate the story.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;

use crate::application::ports::outbound::{DocumentKey, DocumentStorePort, PersistenceError, Scope};
use crate::domain::value_objects::StoryId;
use crate::infrastructure::config::StoreConfig;
use crate::infrastructure::persistence::{InMemoryDocumentStore, SqliteDocumentStore};

/// Runtime-selected document store backend
#[derive(Clone)]
pub enum DocumentStoreBackend {
    Memory(InMemoryDocumentStore),
    Sqlite(SqliteDocumentStore),
}

impl DocumentStoreBackend {
    pub fn name(&self) -> &'static str {
        match self {
            DocumentStoreBackend::Memory(_) => "memory",
            DocumentStoreBackend::Sqlite(_) => "sqlite",
        }
    }
}

#[async_trait]
impl DocumentStorePort for DocumentStoreBackend {
    async fn upsert(
        &self,
        collection: &str,
        key: &DocumentKey,
        document: Value,
    ) -> Result<(), PersistenceError> {
        match self {
            DocumentStoreBackend::Memory(s) => s.upsert(collection, key, document).await,
            DocumentStoreBackend::Sqlite(s) => s.upsert(collection, key, document).await,
        }
    }

    async fn fetch(
        &self,
        collection: &str,
        key: &DocumentKey,
    ) -> Result<Option<Value>, PersistenceError> {
        match self {
            DocumentStoreBackend::Memory(s) => s.fetch(collection, key).await,
            DocumentStoreBackend::Sqlite(s) => s.fetch(collection, key).await,
        }
    }

    async fn list(
        &self,
        collection: &str,
        story: &StoryId,
        scope: Scope,
    ) -> Result<Vec<Value>, PersistenceError> {
        match self {
            DocumentStoreBackend::Memory(s) => s.list(collection, story, scope).await,
            DocumentStoreBackend::Sqlite(s) => s.list(collection, story, scope).await,
        }
    }
}

pub struct DocumentStoreFactory {
    config: StoreConfig,
    sqlite_pool: Option<SqlitePool>,
}

impl DocumentStoreFactory {
    pub async fn new(config: StoreConfig) -> Result<Self> {
        let sqlite_pool = if config.backend == "sqlite" {
            // Ensure data directory exists
            if let Some(parent) = std::path::Path::new(&config.sqlite_path).parent() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create story database directory")?;
            }

            let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", config.sqlite_path))
                .await
                .context("Failed to connect to SQLite story database")?;
            tracing::info!("Connected to SQLite story database: {}", config.sqlite_path);
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            config,
            sqlite_pool,
        })
    }

    pub async fn create_store(&self) -> Result<Arc<DocumentStoreBackend>> {
        match self.config.backend.as_str() {
            "memory" => Ok(Arc::new(DocumentStoreBackend::Memory(
                InMemoryDocumentStore::new(),
            ))),
            "sqlite" => {
                let pool = self
                    .sqlite_pool
                    .as_ref()
                    .context("SQLite pool not initialized")?;
                let store = SqliteDocumentStore::new(pool.clone())
                    .await
                    .context("Failed to prepare documents table")?;
                Ok(Arc::new(DocumentStoreBackend::Sqlite(store)))
            }
            backend => anyhow::bail!("Unsupported store backend: {}", backend),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_backend_is_rejected() {
        let factory = DocumentStoreFactory::new(StoreConfig {
            backend: "postgres".to_string(),
            sqlite_path: String::new(),
        })
        .await
        .unwrap();
        assert!(factory.create_store().await.is_err());
    }

    #[tokio::test]
    async fn test_sqlite_backend_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("story.db");
        let factory = DocumentStoreFactory::new(StoreConfig {
            backend: "sqlite".to_string(),
            sqlite_path: path.to_string_lossy().into_owned(),
        })
        .await
        .unwrap();

        let store = factory.create_store().await.unwrap();
        assert_eq!(store.name(), "sqlite");
        let key = DocumentKey::global(StoryId::parse("harbor").unwrap(), "story");
        store
            .upsert("metadata", &key, serde_json::json!({"title": "Harbor"}))
            .await
            .unwrap();
        assert!(path.exists());
    }
}
