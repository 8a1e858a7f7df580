//! Story metadata - title, author and bookkeeping timestamps

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::StoryId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryMetadata {
    pub story_id: StoryId,
    pub title: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl StoryMetadata {
    pub fn new(story_id: StoryId, title: impl Into<String>, author: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            story_id,
            title: title.into(),
            author: author.into(),
            created_at: now,
            last_modified: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }
}
