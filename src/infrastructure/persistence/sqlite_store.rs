//! SQLite document store
//!
//! One `documents` table keyed by `(collection, key)`. Bodies are stored as
//! JSON text; listing a `(story, scope)` matches the rendered key prefix.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;

use crate::application::ports::outbound::{DocumentKey, DocumentStorePort, PersistenceError, Scope};
use crate::domain::value_objects::StoryId;

#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub async fn new(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                key TEXT NOT NULL,
                body TEXT NOT NULL,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (collection, key)
            )
        "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DocumentStorePort for SqliteDocumentStore {
    async fn upsert(
        &self,
        collection: &str,
        key: &DocumentKey,
        document: Value,
    ) -> Result<(), PersistenceError> {
        let body = serde_json::to_string(&document)
            .map_err(|e| PersistenceError::Serialization(e.to_string()))?;
        sqlx::query(
            r#"
            INSERT INTO documents (collection, key, body, updated_at)
            VALUES (?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT (collection, key)
            DO UPDATE SET body = excluded.body, updated_at = CURRENT_TIMESTAMP
        "#,
        )
        .bind(collection)
        .bind(key.to_string())
        .bind(body)
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn fetch(
        &self,
        collection: &str,
        key: &DocumentKey,
    ) -> Result<Option<Value>, PersistenceError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT body FROM documents WHERE collection = ? AND key = ?")
                .bind(collection)
                .bind(key.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;

        row.map(|(body,)| {
            serde_json::from_str(&body).map_err(|e| PersistenceError::Serialization(e.to_string()))
        })
        .transpose()
    }

    async fn list(
        &self,
        collection: &str,
        story: &StoryId,
        scope: Scope,
    ) -> Result<Vec<Value>, PersistenceError> {
        let prefix = DocumentKey::prefix(story, scope);
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT body FROM documents
            WHERE collection = ? AND substr(key, 1, ?) = ?
            ORDER BY key
        "#,
        )
        .bind(collection)
        .bind(prefix.len() as i64)
        .bind(&prefix)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;

        rows.into_iter()
            .map(|(body,)| {
                serde_json::from_str(&body)
                    .map_err(|e| PersistenceError::Serialization(e.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteDocumentStore {
        // One connection so every query sees the same in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteDocumentStore::new(pool).await.unwrap()
    }

    #[tokio::test]
    async fn test_upsert_replaces_body() {
        let store = store().await;
        let key = DocumentKey::global(StoryId::parse("harbor").unwrap(), "jessie");
        store.upsert("characters", &key, json!({"v": 1})).await.unwrap();
        store.upsert("characters", &key, json!({"v": 2})).await.unwrap();

        assert_eq!(
            store.fetch("characters", &key).await.unwrap(),
            Some(json!({"v": 2}))
        );
        assert!(store.fetch("metadata", &key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_matches_prefix_only() {
        let store = store().await;
        let story = StoryId::parse("harbor").unwrap();
        let other = StoryId::parse("harbor-two").unwrap();
        for (story, scope, id) in [
            (&story, Scope::Chapter(1), "b"),
            (&story, Scope::Chapter(1), "a"),
            (&story, Scope::Chapter(2), "c"),
            (&other, Scope::Chapter(1), "d"),
        ] {
            let key = DocumentKey::new(story.clone(), scope, id);
            store.upsert("story_elements", &key, json!(id)).await.unwrap();
        }

        let listed = store
            .list("story_elements", &story, Scope::Chapter(1))
            .await
            .unwrap();
        assert_eq!(listed, vec![json!("a"), json!("b")]);
    }
}
