//! Story Session - one authoring session over one chapter of a story
//!
//! Owns the timeline cursor and wires the character, registry and ledger
//! services to a single persistence gateway. Every mutating call persists
//! before returning, so a later session on the same store picks up exactly
//! where this one left off.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument};

use crate::application::ports::outbound::{DocumentStorePort, LlmPort, Scope};
use crate::application::services::brand_service::BrandService;
use crate::application::services::character_service::{
    CharacterService, CreateCharacterRequest, RelationshipSelector,
};
use crate::application::services::generation_service::{GenerationService, GenerationSettings};
use crate::application::services::ledger_service::LedgerService;
use crate::application::services::name_registry_service::NameRegistryService;
use crate::application::services::persistence_gateway::{collections, PersistenceGateway};
use crate::domain::entities::{
    Brand, Character, StoryElement, StoryMetadata, TimelineCursor, DEFAULT_TIME_FORMAT,
};
use crate::domain::errors::{StoryError, StoryResult};
use crate::domain::value_objects::{AttributeValue, CharacterId, PronounForm, StoryId};

const METADATA_DOCUMENT: &str = "story";

/// Everything needed to open a session, validated once by `StorySession::open`
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Slug; derived from the title when absent
    pub story_id: Option<String>,
    pub title: String,
    pub author: String,
    /// 1-based
    pub chapter: u32,
    pub time_format: String,
    pub generation: GenerationSettings,
}

impl SessionConfig {
    pub fn new(title: impl Into<String>, author: impl Into<String>, chapter: u32) -> Self {
        Self {
            story_id: None,
            title: title.into(),
            author: author.into(),
            chapter,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            generation: GenerationSettings::default(),
        }
    }

    pub fn with_story_id(mut self, story_id: impl Into<String>) -> Self {
        self.story_id = Some(story_id.into());
        self
    }

    pub fn with_time_format(mut self, time_format: impl Into<String>) -> Self {
        self.time_format = time_format.into();
        self
    }

    pub fn with_generation(mut self, generation: GenerationSettings) -> Self {
        self.generation = generation;
        self
    }

    /// Check every field and return the story id the session will use
    pub fn validate(&self) -> StoryResult<StoryId> {
        if self.chapter == 0 {
            return Err(StoryError::Configuration(
                "chapter numbers start at 1".to_string(),
            ));
        }
        if self.title.trim().is_empty() {
            return Err(StoryError::Configuration("title must not be empty".to_string()));
        }
        if self.author.trim().is_empty() {
            return Err(StoryError::Configuration("author must not be empty".to_string()));
        }
        if self.time_format.trim().is_empty() {
            return Err(StoryError::Configuration(
                "time format must not be empty".to_string(),
            ));
        }
        self.generation.validate()?;
        match &self.story_id {
            Some(raw) => StoryId::parse(raw),
            None => StoryId::from_title(&self.title),
        }
    }
}

/// Counts for the open chapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionAnalytics {
    pub story_id: StoryId,
    pub chapter: u32,
    pub revision: u32,
    pub element_count: usize,
    pub character_count: usize,
    pub introduced_count: usize,
    pub active_count: usize,
}

/// Everything an author needs to keep the story consistent, as one document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryReference {
    pub story_id: StoryId,
    pub title: String,
    pub author: String,
    pub exported_at: DateTime<Utc>,
    pub characters: Vec<Character>,
    pub brands: Vec<Brand>,
}

pub struct StorySession<L: LlmPort> {
    config: SessionConfig,
    gateway: PersistenceGateway,
    revision: u32,
    metadata: RwLock<StoryMetadata>,
    cursor: RwLock<TimelineCursor>,
    registry: Arc<NameRegistryService>,
    characters: CharacterService<L>,
    ledger: LedgerService,
    brands: BrandService,
    /// Whether this session's revision has superseded earlier drafts yet
    revision_committed: Mutex<bool>,
}

impl<L: LlmPort> StorySession<L> {
    /// Load or create the story, load its registry and open a new chapter revision
    #[instrument(skip(config, store, llm), fields(title = %config.title, chapter = config.chapter))]
    pub async fn open(
        config: SessionConfig,
        store: Arc<dyn DocumentStorePort>,
        llm: L,
    ) -> StoryResult<Self> {
        let story_id = config.validate()?;
        let gateway = PersistenceGateway::new(store, story_id.clone());

        let metadata = match gateway
            .fetch::<StoryMetadata>(collections::METADATA, Scope::Global, METADATA_DOCUMENT)
            .await?
        {
            Some(existing) => existing,
            None => {
                let created = StoryMetadata::new(story_id.clone(), &config.title, &config.author);
                gateway
                    .upsert(collections::METADATA, Scope::Global, METADATA_DOCUMENT, &created)
                    .await?;
                info!(story = %story_id, "Created story");
                created
            }
        };

        let registry = Arc::new(NameRegistryService::load(gateway.clone()).await?);
        let generation = Arc::new(GenerationService::new(llm, config.generation.clone()));
        let characters =
            CharacterService::new(gateway.clone(), registry.clone(), generation, config.chapter);
        let ledger = LedgerService::new(gateway.clone(), config.time_format.clone());
        let revision = ledger.open_chapter(config.chapter).await?;
        let brands = BrandService::load(gateway.clone()).await?;

        info!(story = %story_id, revision, "Story session opened");
        Ok(Self {
            config,
            gateway,
            revision,
            metadata: RwLock::new(metadata),
            cursor: RwLock::new(TimelineCursor::new()),
            registry,
            characters,
            ledger,
            brands,
            revision_committed: Mutex::new(false),
        })
    }

    pub fn story_id(&self) -> &StoryId {
        self.gateway.story()
    }

    pub fn chapter(&self) -> u32 {
        self.config.chapter
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn registry(&self) -> &NameRegistryService {
        &self.registry
    }

    pub async fn metadata(&self) -> StoryMetadata {
        self.metadata.read().await.clone()
    }

    // Timeline

    pub async fn set_time(&self, instant: DateTime<Utc>) {
        self.cursor.write().await.set(instant);
    }

    pub async fn advance_time(&self, phrase: &str) -> StoryResult<DateTime<Utc>> {
        self.cursor.write().await.advance(phrase)
    }

    pub async fn advance_by(&self, duration: Duration) -> StoryResult<DateTime<Utc>> {
        self.cursor.write().await.advance_by(duration)
    }

    pub async fn set_location(&self, label: impl Into<String>) {
        self.cursor.write().await.set_location(label);
    }

    pub async fn current_time(&self) -> Option<DateTime<Utc>> {
        self.cursor.read().await.current_time()
    }

    pub async fn current_location(&self) -> Option<String> {
        self.cursor.read().await.current_location().map(str::to_string)
    }

    /// Current time in the session's format, or `pattern` when given
    pub async fn format_time(&self, pattern: Option<&str>) -> StoryResult<String> {
        let pattern = pattern.unwrap_or(&self.config.time_format);
        self.cursor.read().await.format(pattern)
    }

    // Characters

    pub async fn create_character(&self, request: CreateCharacterRequest) -> StoryResult<Character> {
        self.characters.create(request).await
    }

    pub async fn character(&self, id: &CharacterId) -> StoryResult<Character> {
        self.characters.get(id).await
    }

    pub async fn characters(&self) -> StoryResult<Vec<Character>> {
        self.characters.list().await
    }

    pub async fn resolve_attribute(
        &self,
        id: &CharacterId,
        key: &str,
    ) -> StoryResult<AttributeValue> {
        self.characters.resolve_attribute(id, key).await
    }

    pub async fn resolve_relationship(
        &self,
        id: &CharacterId,
        relation: &str,
        pool: &[CharacterId],
        selector: RelationshipSelector,
    ) -> StoryResult<CharacterId> {
        self.characters
            .resolve_relationship(id, relation, pool, selector)
            .await
    }

    pub async fn introduced_candidates(
        &self,
        exclude: Option<&CharacterId>,
    ) -> StoryResult<Vec<CharacterId>> {
        self.characters.introduced_candidates(exclude).await
    }

    pub async fn relate(
        &self,
        from: &CharacterId,
        to: &CharacterId,
        relation: &str,
        reciprocal: Option<&str>,
        description: Option<String>,
    ) -> StoryResult<()> {
        self.characters
            .relate(from, to, relation, reciprocal, description)
            .await
    }

    /// Introduce a character; commits this session's revision first
    pub async fn enter(&self, id: &CharacterId) -> StoryResult<()> {
        self.commit_revision().await?;
        self.characters.enter(id).await
    }

    pub async fn exit(&self, id: &CharacterId) -> bool {
        self.characters.exit(id).await
    }

    pub async fn active(&self) -> BTreeSet<CharacterId> {
        self.characters.active().await
    }

    pub async fn pronoun(&self, id: &CharacterId, form: PronounForm) -> StoryResult<String> {
        self.characters.pronoun(id, form).await
    }

    pub async fn display_name(&self, id: &CharacterId) -> StoryResult<String> {
        self.characters.display_name(id).await
    }

    // Brands

    /// Story name standing in for a real brand
    pub async fn brand(&self, real_name: &str) -> StoryResult<String> {
        Ok(self.brands.substitute(real_name).await?.story_name)
    }

    pub async fn assign_brand(&self, real_name: &str, story_name: &str) -> StoryResult<Brand> {
        self.brands.assign(real_name, story_name).await
    }

    pub async fn brands(&self) -> Vec<Brand> {
        self.brands.brands().await
    }

    /// Characters and brand substitutions, ready to serialize
    pub async fn export_reference(&self) -> StoryResult<StoryReference> {
        let metadata = self.metadata().await;
        Ok(StoryReference {
            story_id: metadata.story_id,
            title: metadata.title,
            author: metadata.author,
            exported_at: Utc::now(),
            characters: self.characters.list().await?,
            brands: self.brands.brands().await,
        })
    }

    // Ledger

    /// Append prose under the current time, location and cast
    #[instrument(skip(self, content))]
    pub async fn write(&self, content: &str) -> StoryResult<StoryElement> {
        let (time, location) = {
            let cursor = self.cursor.read().await;
            let time = cursor.current_time().ok_or_else(|| {
                StoryError::UninitializedTimeline("set a time before writing".to_string())
            })?;
            let location = cursor.current_location().map(str::to_string).ok_or_else(|| {
                StoryError::UninitializedLocation("set a location before writing".to_string())
            })?;
            (time, location)
        };
        self.touch_metadata().await?;
        self.commit_revision().await?;
        let cast = self.characters.active().await;
        self.ledger
            .append(content, self.config.chapter, time, &location, cast)
            .await
    }

    pub async fn elements(&self) -> StoryResult<Vec<StoryElement>> {
        self.ledger.elements(self.config.chapter).await
    }

    pub async fn render_chapter(&self) -> StoryResult<String> {
        self.ledger.render(self.config.chapter).await
    }

    /// Chapters in ascending order; every chapter through the current one when empty
    pub async fn render_manuscript(&self, chapters: &[u32]) -> StoryResult<String> {
        let chapters: Vec<u32> = if chapters.is_empty() {
            (1..=self.config.chapter).collect()
        } else {
            chapters.to_vec()
        };
        let metadata = self.metadata().await;
        self.ledger
            .render_manuscript(&chapters, Some(&metadata))
            .await
    }

    pub async fn timeline_warnings(&self) -> StoryResult<Vec<String>> {
        self.ledger.timeline_warnings(self.config.chapter).await
    }

    pub async fn analytics(&self) -> StoryResult<SessionAnalytics> {
        let characters = self.characters.list().await?;
        let elements = self.ledger.elements(self.config.chapter).await?;
        Ok(SessionAnalytics {
            story_id: self.story_id().clone(),
            chapter: self.config.chapter,
            revision: self.revision,
            element_count: elements.len(),
            character_count: characters.len(),
            introduced_count: characters
                .iter()
                .filter(|c| c.chapter_introduced.is_some())
                .count(),
            active_count: self.characters.active().await.len(),
        })
    }

    /// Supersede the drafts of this chapter and later ones, once per session
    ///
    /// Introductions recorded in the discarded chapters are forgotten, so a
    /// character first met in a dropped draft is introduced afresh.
    async fn commit_revision(&self) -> StoryResult<()> {
        let mut committed = self.revision_committed.lock().await;
        if *committed {
            return Ok(());
        }
        let rewind = self.ledger.commit_revision(self.config.chapter).await?;
        self.characters.forget_introductions(rewind.chapter).await?;
        *committed = true;
        Ok(())
    }

    async fn touch_metadata(&self) -> StoryResult<()> {
        let mut metadata = self.metadata.write().await;
        let mut next = metadata.clone();
        next.touch();
        self.gateway
            .upsert(collections::METADATA, Scope::Global, METADATA_DOCUMENT, &next)
            .await?;
        *metadata = next;
        Ok(())
    }
}
