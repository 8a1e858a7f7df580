//! Ledger Service - append-only story elements and chapter rendering
//!
//! Elements are grouped by `(chapter, revision)`. Opening a chapter starts a
//! new revision, which is committed by its first write: a `ChapterRewind` is
//! recorded and every earlier draft of that chapter and of all later chapters
//! stops rendering. Nothing is deleted. Until the commit, renders keep
//! showing the previous revision.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::application::ports::outbound::Scope;
use crate::application::services::persistence_gateway::{collections, PersistenceGateway};
use crate::domain::entities::{format_instant, ChapterRewind, StoryElement, StoryMetadata};
use crate::domain::errors::StoryResult;
use crate::domain::value_objects::CharacterId;

#[derive(Debug, Clone)]
struct ChapterCursor {
    revision: u32,
    next_sequence: u32,
    /// Set once the revision has been committed
    rewind: Option<ChapterRewind>,
}

impl ChapterCursor {
    fn fresh(revision: u32) -> Self {
        Self {
            revision,
            next_sequence: 0,
            rewind: None,
        }
    }
}

pub struct LedgerService {
    gateway: PersistenceGateway,
    time_format: String,
    cursors: Mutex<BTreeMap<u32, ChapterCursor>>,
}

impl LedgerService {
    pub fn new(gateway: PersistenceGateway, time_format: impl Into<String>) -> Self {
        Self {
            gateway,
            time_format: time_format.into(),
            cursors: Mutex::new(BTreeMap::new()),
        }
    }

    /// Start a new revision of the chapter and return its number
    #[instrument(skip(self))]
    pub async fn open_chapter(&self, chapter: u32) -> StoryResult<u32> {
        let mut cursors = self.cursors.lock().await;
        let revision = self.next_revision(chapter).await?;
        cursors.insert(chapter, ChapterCursor::fresh(revision));
        info!(chapter, revision, "Opened chapter revision");
        Ok(revision)
    }

    /// Commit the chapter's open revision, superseding earlier drafts from it onward
    ///
    /// Idempotent within a session; returns the rewind that committed it.
    #[instrument(skip(self))]
    pub async fn commit_revision(&self, chapter: u32) -> StoryResult<ChapterRewind> {
        let mut cursors = self.cursors.lock().await;
        Ok(self.committed_cursor(&mut cursors, chapter).await?.1)
    }

    /// Record one element under the chapter's open revision
    #[instrument(skip(self, content, characters))]
    pub async fn append(
        &self,
        content: &str,
        chapter: u32,
        time: DateTime<Utc>,
        location: &str,
        characters: impl IntoIterator<Item = CharacterId>,
    ) -> StoryResult<StoryElement> {
        let mut cursors = self.cursors.lock().await;
        let (cursor, rewind) = self.committed_cursor(&mut cursors, chapter).await?;

        let element = StoryElement::new(
            self.gateway.story().clone(),
            chapter,
            cursor.revision,
            cursor.next_sequence,
            time,
            location,
            content,
        )
        .with_epoch(rewind.epoch)
        .with_characters(characters);

        self.gateway
            .upsert(
                collections::STORY_ELEMENTS,
                Scope::Chapter(chapter),
                &element.document_id(),
                &element,
            )
            .await?;
        if let Some(open) = cursors.get_mut(&chapter) {
            open.next_sequence = cursor.next_sequence + 1;
        }

        debug!(
            element_id = %element.id,
            revision = element.revision,
            sequence = element.sequence,
            "Appended story element"
        );
        Ok(element)
    }

    /// Latest live revision's elements in append order
    #[instrument(skip(self))]
    pub async fn elements(&self, chapter: u32) -> StoryResult<Vec<StoryElement>> {
        let rewinds = self.rewinds().await?;
        let live: Vec<StoryElement> = self
            .all_elements(chapter)
            .await?
            .into_iter()
            .filter(|e| !rewinds.iter().any(|r| r.supersedes(e)))
            .collect();
        let latest = live.iter().map(|e| e.revision).max();
        Ok(live
            .into_iter()
            .filter(|e| Some(e.revision) == latest)
            .collect())
    }

    /// Every committed rewind, in epoch order
    pub async fn rewinds(&self) -> StoryResult<Vec<ChapterRewind>> {
        let mut rewinds: Vec<ChapterRewind> = self
            .gateway
            .list(collections::REWINDS, Scope::Global)
            .await?;
        rewinds.sort_by_key(|r| r.epoch);
        Ok(rewinds)
    }

    /// Every revision's elements, ordered by revision then sequence
    pub async fn all_elements(&self, chapter: u32) -> StoryResult<Vec<StoryElement>> {
        let mut elements: Vec<StoryElement> = self
            .gateway
            .list(collections::STORY_ELEMENTS, Scope::Chapter(chapter))
            .await?;
        elements.sort_by_key(|e| (e.revision, e.sequence));
        Ok(elements)
    }

    /// Markdown for one chapter: heading, a scene per location run, timed lines
    #[instrument(skip(self))]
    pub async fn render(&self, chapter: u32) -> StoryResult<String> {
        let elements = self.elements(chapter).await?;
        Ok(render_elements(chapter, &elements, &self.time_format))
    }

    /// Chapters rendered in ascending order, optionally under a title block
    #[instrument(skip(self, chapters, metadata))]
    pub async fn render_manuscript(
        &self,
        chapters: &[u32],
        metadata: Option<&StoryMetadata>,
    ) -> StoryResult<String> {
        let mut ordered = chapters.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut sections = Vec::with_capacity(ordered.len() + 1);
        if let Some(metadata) = metadata {
            sections.push(format!("# {}\n\nby {}", metadata.title, metadata.author));
        }
        for chapter in ordered {
            sections.push(self.render(chapter).await?.trim_end().to_string());
        }
        let mut manuscript = sections.join("\n\n");
        manuscript.push('\n');
        Ok(manuscript)
    }

    /// Elements whose time precedes the element before them
    #[instrument(skip(self))]
    pub async fn timeline_warnings(&self, chapter: u32) -> StoryResult<Vec<String>> {
        let elements = self.elements(chapter).await?;
        Ok(elements
            .windows(2)
            .filter(|pair| pair[1].time < pair[0].time)
            .map(|pair| {
                format!(
                    "Chapter {}: element '{}' occurs before previous element '{}'",
                    chapter,
                    excerpt(&pair[1].content),
                    excerpt(&pair[0].content)
                )
            })
            .collect())
    }

    /// The chapter's cursor, committing its revision with a new rewind first if needed
    async fn committed_cursor(
        &self,
        cursors: &mut BTreeMap<u32, ChapterCursor>,
        chapter: u32,
    ) -> StoryResult<(ChapterCursor, ChapterRewind)> {
        let mut cursor = match cursors.get(&chapter) {
            Some(cursor) => cursor.clone(),
            None => ChapterCursor::fresh(self.next_revision(chapter).await?),
        };
        let rewind = match cursor.rewind.clone() {
            Some(rewind) => rewind,
            None => {
                let epoch = self.rewinds().await?.last().map_or(0, |r| r.epoch) + 1;
                let rewind = ChapterRewind::new(chapter, cursor.revision, epoch);
                self.gateway
                    .upsert(collections::REWINDS, Scope::Global, &rewind.document_id(), &rewind)
                    .await?;
                info!(chapter, revision = cursor.revision, epoch, "Committed chapter revision");
                cursor.rewind = Some(rewind.clone());
                rewind
            }
        };
        cursors.insert(chapter, cursor.clone());
        Ok((cursor, rewind))
    }

    async fn next_revision(&self, chapter: u32) -> StoryResult<u32> {
        let existing = self.all_elements(chapter).await?;
        Ok(existing.iter().map(|e| e.revision).max().unwrap_or(0) + 1)
    }
}

fn render_elements(chapter: u32, elements: &[StoryElement], time_format: &str) -> String {
    let mut output = format!("# Chapter {}\n", chapter);
    let mut location: Option<&str> = None;
    for element in elements {
        if location != Some(element.location.as_str()) {
            location = Some(element.location.as_str());
            output.push_str(&format!("\n## {}\n", element.location));
        }
        output.push_str(&format!(
            "\n[{}] {}\n",
            format_instant(&element.time, time_format),
            element.content.trim_end()
        ));
    }
    output
}

fn excerpt(content: &str) -> String {
    const LIMIT: usize = 60;
    let line = content.lines().next().unwrap_or_default().trim();
    if line.chars().count() > LIMIT {
        format!("{}...", line.chars().take(LIMIT).collect::<String>())
    } else {
        line.to_string()
    }
}
