//! StoryElement entity - an immutable fragment of prose in the ledger
//!
//! Each element carries the narrative time, location and cast that were in
//! effect when it was written. Elements are never edited; re-running a chapter
//! opens a new revision whose elements supersede the old ones on render, along
//! with every later chapter's.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{CharacterId, StoryElementId, StoryId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryElement {
    pub id: StoryElementId,
    pub story_id: StoryId,
    pub chapter: u32,
    /// Authoring pass over the chapter this element belongs to
    pub revision: u32,
    /// Position within `(chapter, revision)`
    pub sequence: u32,
    /// Story-wide rewind epoch in effect when written
    #[serde(default)]
    pub epoch: u64,
    /// Narrative time at authoring
    pub time: DateTime<Utc>,
    pub location: String,
    pub content: String,
    /// Cast active when the element was written
    pub characters: BTreeSet<CharacterId>,
    /// Wall-clock time of recording, metadata only
    pub recorded_at: DateTime<Utc>,
}

impl StoryElement {
    pub fn new(
        story_id: StoryId,
        chapter: u32,
        revision: u32,
        sequence: u32,
        time: DateTime<Utc>,
        location: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: StoryElementId::new(),
            story_id,
            chapter,
            revision,
            sequence,
            epoch: 0,
            time,
            location: location.into(),
            content: content.into(),
            characters: BTreeSet::new(),
            recorded_at: Utc::now(),
        }
    }

    pub fn with_characters(mut self, characters: impl IntoIterator<Item = CharacterId>) -> Self {
        self.characters = characters.into_iter().collect();
        self
    }

    pub fn with_epoch(mut self, epoch: u64) -> Self {
        self.epoch = epoch;
        self
    }

    /// Stable document id; sorts by revision then sequence
    pub fn document_id(&self) -> String {
        format!("r{:04}-{:06}-{}", self.revision, self.sequence, self.id)
    }
}
