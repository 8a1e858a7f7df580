//! ChapterRewind entity - the record that a chapter was re-run
//!
//! Re-running chapter N discards the drafts of N and every later chapter.
//! Nothing is deleted: each rewind gets the next story-wide epoch, elements
//! remember the epoch they were written in, and an element is superseded
//! once a later-epoch rewind covers its chapter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::StoryElement;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRewind {
    /// First chapter whose earlier drafts are discarded
    pub chapter: u32,
    /// Revision of `chapter` that replaces them
    pub revision: u32,
    pub epoch: u64,
    pub recorded_at: DateTime<Utc>,
}

impl ChapterRewind {
    pub fn new(chapter: u32, revision: u32, epoch: u64) -> Self {
        Self {
            chapter,
            revision,
            epoch,
            recorded_at: Utc::now(),
        }
    }

    /// Stable document id; sorts by epoch
    pub fn document_id(&self) -> String {
        format!("epoch-{:010}", self.epoch)
    }

    pub fn supersedes(&self, element: &StoryElement) -> bool {
        element.chapter >= self.chapter && element.epoch < self.epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::StoryId;

    fn element(chapter: u32, epoch: u64) -> StoryElement {
        StoryElement::new(StoryId::parse("harbor").unwrap(), chapter, 1, 0, Utc::now(), "Dock", "x")
            .with_epoch(epoch)
    }

    #[test]
    fn test_rewind_covers_its_chapter_and_later_ones() {
        let rewind = ChapterRewind::new(2, 2, 5);
        assert!(!rewind.supersedes(&element(1, 1)));
        assert!(rewind.supersedes(&element(2, 1)));
        assert!(rewind.supersedes(&element(3, 4)));
        assert!(!rewind.supersedes(&element(3, 5)));
        assert!(!rewind.supersedes(&element(4, 6)));
    }

    #[test]
    fn test_document_ids_sort_by_epoch() {
        assert!(ChapterRewind::new(9, 1, 9).document_id() < ChapterRewind::new(1, 3, 10).document_id());
    }
}
