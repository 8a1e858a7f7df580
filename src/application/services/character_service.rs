//! Character Service - creation and fill-on-read resolution of characters
//!
//! Characters live in a working set for the session and are persisted on
//! every change. Deferred fields are resolved at most once:
//!
//! - name components (`first`, `middle`, `last`) always come from the name registry
//! - `prefix` and `suffix` are author-supplied only
//! - `age` and `occupation` of structured-random characters are seeded draws
//! - everything else is one text-generation call
//!
//! Resolution of one `(character, key)` is single-flight: concurrent callers
//! wait on a per-key lock and then read the cached value. A failed resolution
//! leaves the field `Unset` and persists nothing.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::application::ports::outbound::{LlmPort, Scope};
use crate::application::services::generation_service::{
    Candidate, FieldRequest, GenerationService,
};
use crate::application::services::name_registry_service::NameRegistryService;
use crate::application::services::persistence_gateway::{collections, PersistenceGateway};
use crate::domain::entities::{AttributeFilter, Character, CharacterName, GenerationStrategy};
use crate::domain::errors::{StoryError, StoryResult};
use crate::domain::value_objects::{
    seeded_rng, AttributeValue, CharacterId, NameKind, PronounCategory, PronounForm, PronounSet,
    PronounSpec, Resolution, AGE_RANGE, MAX_MIDDLE_NAMES, OCCUPATIONS,
};

/// Request to create a character
#[derive(Debug, Clone, Default)]
pub struct CreateCharacterRequest {
    /// Reusing an existing id returns the stored character unchanged
    pub id: Option<CharacterId>,
    pub prefix: Option<String>,
    pub first: Option<String>,
    pub middle: Option<Vec<String>>,
    pub last: Option<String>,
    pub suffix: Option<String>,
    pub pronouns: Option<PronounSpec>,
    pub attributes: BTreeMap<String, AttributeValue>,
    /// Keys to leave unresolved until first read; may include name components
    pub deferred: Vec<String>,
    pub strategy: GenerationStrategy,
    /// Natural-language description for `LanguageModel` creation
    pub prompt: Option<String>,
}

impl CreateCharacterRequest {
    pub fn new(strategy: GenerationStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<CharacterId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_first(mut self, first: impl Into<String>) -> Self {
        self.first = Some(first.into());
        self
    }

    pub fn with_middle(mut self, middle: Vec<String>) -> Self {
        self.middle = Some(middle);
        self
    }

    pub fn with_last(mut self, last: impl Into<String>) -> Self {
        self.last = Some(last.into());
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn with_pronouns(mut self, pronouns: impl Into<PronounSpec>) -> Self {
        self.pronouns = Some(pronouns.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_deferred(mut self, key: impl Into<String>) -> Self {
        self.deferred.push(key.into());
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    fn is_deferred(&self, key: &str) -> bool {
        self.deferred.iter().any(|k| k == key)
    }

    fn supplies(&self, kind: NameKind) -> bool {
        match kind {
            NameKind::First => self.first.is_some(),
            NameKind::Middle => self.middle.is_some(),
            NameKind::Last => self.last.is_some(),
        }
    }
}

/// How a relationship target is chosen from the candidate pool
#[derive(Debug, Clone, PartialEq)]
pub enum RelationshipSelector {
    /// Seeded choice among candidates matching the filter
    Rule(AttributeFilter),
    /// The text-generation service picks one candidate
    Generated { guidance: Option<String> },
}

#[derive(Clone)]
enum ResolvedField {
    Component(NameKind, Vec<String>),
    Value(AttributeValue),
}

type FlightKey = (CharacterId, String);

/// Registry slots a first or last name may move through before a full-name
/// collision is reported
const MAX_NAME_REDRAWS: u32 = 8;

pub struct CharacterService<L: LlmPort> {
    gateway: PersistenceGateway,
    registry: Arc<NameRegistryService>,
    generation: Arc<GenerationService<L>>,
    chapter: u32,
    characters: RwLock<BTreeMap<CharacterId, Character>>,
    active: RwLock<BTreeSet<CharacterId>>,
    in_flight: Mutex<HashMap<FlightKey, Arc<Mutex<()>>>>,
}

impl<L: LlmPort> CharacterService<L> {
    pub fn new(
        gateway: PersistenceGateway,
        registry: Arc<NameRegistryService>,
        generation: Arc<GenerationService<L>>,
        chapter: u32,
    ) -> Self {
        Self {
            gateway,
            registry,
            generation,
            chapter,
            characters: RwLock::new(BTreeMap::new()),
            active: RwLock::new(BTreeSet::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    #[instrument(skip(self, request), fields(strategy = ?request.strategy))]
    pub async fn create(&self, request: CreateCharacterRequest) -> StoryResult<Character> {
        let id = request.id.clone().unwrap_or_default();
        if let Some(existing) = self.lookup(&id).await? {
            let conflicts = request_conflicts(&request, &existing);
            if conflicts.is_empty() {
                debug!(character_id = %id, "Character already exists, returning stored copy");
            } else {
                warn!(
                    character_id = %id,
                    fields = ?conflicts,
                    "Create request differs from the stored character; keeping the stored copy"
                );
            }
            return Ok(existing);
        }

        let mut name = CharacterName {
            prefix: request.prefix.clone(),
            first: request.first.clone().into(),
            middle: request.middle.clone().into(),
            last: request.last.clone().into(),
            suffix: request.suffix.clone(),
        };
        self.claim_explicit(&id, &name).await?;

        let mut pronouns = request.pronouns.clone().map(PronounSpec::into_set);
        let mut generated: BTreeMap<String, AttributeValue> = BTreeMap::new();

        if request.strategy == GenerationStrategy::LanguageModel {
            if let Some(prompt) = request.prompt.as_deref() {
                let fields = Self::creation_fields(&request, &name, pronouns.is_none());
                if !fields.is_empty() {
                    let facts = Self::request_facts(&request);
                    let filled = self
                        .generation
                        .fill_fields(&format!("character {}", id), &facts, prompt, &fields)
                        .await?;
                    self.apply_generated_names(&id, &mut name, &filled).await?;
                    if pronouns.is_none() {
                        pronouns = filled
                            .get("pronouns")
                            .and_then(|v| v.as_str())
                            .and_then(|s| s.parse::<PronounCategory>().ok())
                            .map(PronounSet::resolve);
                    }
                    for (key, value) in &filled {
                        if NameKind::from_key(key).is_none() && key != "pronouns" {
                            if let Some(value) = AttributeValue::from_json(value) {
                                generated.insert(key.clone(), value);
                            }
                        }
                    }
                }
            }
        }

        self.fill_name_gaps(&id, &mut name, &request).await?;
        let redrawable = [NameKind::Middle, NameKind::Last, NameKind::First]
            .into_iter()
            .find(|kind| !request.supplies(*kind));
        self.claim_unique_name(&id, &mut name, redrawable).await?;

        let pronouns = pronouns.unwrap_or_else(|| self.seeded_pronouns(&id));
        let mut character = Character::new(
            id.clone(),
            self.gateway.story().clone(),
            pronouns,
            request.strategy,
        )
        .with_name(name);
        for key in &request.deferred {
            if NameKind::from_key(key).is_none() {
                character = character.with_deferred(key.clone());
            }
        }
        for (key, value) in generated {
            character = character.with_attribute(key, value);
        }
        for (key, value) in request.attributes {
            character = character.with_attribute(key, value);
        }

        self.persist(&character).await?;
        self.characters
            .write()
            .await
            .insert(id.clone(), character.clone());

        info!(
            character_id = %id,
            pronouns = %character.pronouns,
            "Created character: {}",
            character.name.display()
        );
        Ok(character)
    }

    /// Working set first, then the store
    #[instrument(skip(self))]
    pub async fn get(&self, id: &CharacterId) -> StoryResult<Character> {
        self.lookup(id)
            .await?
            .ok_or_else(|| StoryError::not_found("character", id))
    }

    /// Every character persisted for the story, merged with the working set
    #[instrument(skip(self))]
    pub async fn list(&self) -> StoryResult<Vec<Character>> {
        let stored: Vec<Character> = self
            .gateway
            .list(collections::CHARACTERS, Scope::Global)
            .await?;
        let mut set = self.characters.write().await;
        for character in stored {
            set.entry(character.id.clone()).or_insert(character);
        }
        Ok(set.values().cloned().collect())
    }

    #[instrument(skip(self), fields(character_id = %id))]
    pub async fn resolve_attribute(
        &self,
        id: &CharacterId,
        key: &str,
    ) -> StoryResult<AttributeValue> {
        let character = self.get(id).await?;
        if let Some(value) = Self::cached_value(&character, key)? {
            return Ok(value);
        }

        let lock = self.flight_lock(id, key).await;
        let _guard = lock.lock().await;

        // Another resolver may have finished while we waited
        let character = self.get(id).await?;
        if let Some(value) = Self::cached_value(&character, key)? {
            return Ok(value);
        }

        let was_declared = character.attributes.contains_key(key);
        self.mark(id, |c| begin_field(c, key)).await;

        let resolved = match self.compute(&character, key).await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(key, error = %e, "Attribute resolution failed");
                self.mark(id, |c| abandon_field(c, key, was_declared)).await;
                return Err(e);
            }
        };

        let mut preview = character.clone();
        settle_field(&mut preview, key, resolved.clone());
        let kind = NameKind::from_key(key);
        if let Err(e) = self.claim_unique_name(id, &mut preview.name, kind).await {
            self.mark(id, |c| abandon_field(c, key, was_declared)).await;
            return Err(e);
        }
        let resolved = match kind {
            Some(kind) => ResolvedField::Component(kind, preview.name.component(kind)),
            None => resolved,
        };

        let outcome = self
            .update(id, |c| Ok(settle_field(c, key, resolved.clone())))
            .await;
        match outcome {
            Ok(value) => {
                info!(key, value = %value, "Resolved attribute");
                Ok(value)
            }
            Err(e) => {
                self.mark(id, |c| abandon_field(c, key, was_declared)).await;
                Err(e)
            }
        }
    }

    #[instrument(skip(self, pool, selector), fields(character_id = %id, pool_size = pool.len()))]
    pub async fn resolve_relationship(
        &self,
        id: &CharacterId,
        relation: &str,
        pool: &[CharacterId],
        selector: RelationshipSelector,
    ) -> StoryResult<CharacterId> {
        let character = self.get(id).await?;
        if let Some(target) = character.relationship(relation).and_then(<[_]>::first) {
            return Ok(target.clone());
        }

        let lock = self.flight_lock(id, &format!("relationship:{}", relation)).await;
        let _guard = lock.lock().await;

        let character = self.get(id).await?;
        if let Some(target) = character.relationship(relation).and_then(<[_]>::first) {
            return Ok(target.clone());
        }

        let mut candidates = Vec::new();
        let unique: BTreeSet<&CharacterId> = pool.iter().filter(|c| *c != id).collect();
        for candidate in unique {
            candidates.push(self.get(candidate).await?);
        }
        let no_match = || {
            StoryError::not_found("relationship candidate", format!("{} of {}", relation, id))
        };
        if candidates.is_empty() {
            return Err(no_match());
        }

        let was_declared = character.relationships.contains_key(relation);
        self.mark(id, |c| begin_relationship(c, relation)).await;

        let chosen = match selector {
            RelationshipSelector::Rule(filter) => {
                let matches: Vec<&Character> =
                    candidates.iter().filter(|c| c.matches(&filter)).collect();
                if matches.is_empty() {
                    Err(no_match())
                } else {
                    let story = self.gateway.story().as_str();
                    let mut rng = seeded_rng(&[story, id.as_str(), "relationship", relation]);
                    let index = rng.gen_range(0..matches.len());
                    Ok(matches[index].id.clone())
                }
            }
            RelationshipSelector::Generated { guidance } => {
                let offered: Vec<Candidate> = candidates
                    .iter()
                    .map(|c| Candidate {
                        id: c.id.clone(),
                        summary: summarize(c),
                    })
                    .collect();
                self.generation
                    .choose_candidate(
                        &format!("relationship '{}' of {}", relation, id),
                        &character.known_facts(),
                        relation,
                        guidance.as_deref(),
                        &offered,
                    )
                    .await
            }
        };

        let chosen = match chosen {
            Ok(chosen) => chosen,
            Err(e) => {
                self.mark(id, |c| abandon_relationship(c, relation, was_declared))
                    .await;
                return Err(e);
            }
        };

        let outcome = self
            .update(id, |c| {
                let entry = c.relationships.entry(relation.to_string()).or_default();
                let targets = entry.targets.settle(vec![chosen.clone()]);
                targets.first().cloned().ok_or_else(no_match)
            })
            .await;
        match outcome {
            Ok(target) => {
                info!(relation, target = %target, "Resolved relationship");
                Ok(target)
            }
            Err(e) => {
                self.mark(id, |c| abandon_relationship(c, relation, was_declared))
                    .await;
                Err(e)
            }
        }
    }

    /// Ids of every introduced character, in id order
    #[instrument(skip(self))]
    pub async fn introduced_candidates(
        &self,
        exclude: Option<&CharacterId>,
    ) -> StoryResult<Vec<CharacterId>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|c| c.chapter_introduced.is_some())
            .filter(|c| Some(&c.id) != exclude)
            .map(|c| c.id)
            .collect())
    }

    /// Record an explicit relationship, optionally with its reciprocal
    #[instrument(skip(self, description))]
    pub async fn relate(
        &self,
        from: &CharacterId,
        to: &CharacterId,
        relation: &str,
        reciprocal: Option<&str>,
        description: Option<String>,
    ) -> StoryResult<()> {
        self.get(to).await?;
        let forward = description.clone();
        self.update(from, |c| {
            c.add_relationship_target(relation, to.clone(), forward);
            Ok(())
        })
        .await?;
        if let Some(reciprocal) = reciprocal {
            self.update(to, |c| {
                c.add_relationship_target(reciprocal, from.clone(), description);
                Ok(())
            })
            .await?;
        }
        Ok(())
    }

    /// Add to the active cast, recording the chapter of introduction once
    #[instrument(skip(self))]
    pub async fn enter(&self, id: &CharacterId) -> StoryResult<()> {
        let character = self.get(id).await?;
        if character.chapter_introduced.is_none() {
            let chapter = self.chapter;
            self.update(id, |c| {
                c.mark_introduced(chapter);
                Ok(())
            })
            .await?;
            info!(character_id = %id, chapter, "Character introduced");
        }
        self.active.write().await.insert(id.clone());
        Ok(())
    }

    /// Clear introductions recorded in `chapter` or later; returns the affected ids
    #[instrument(skip(self))]
    pub async fn forget_introductions(&self, chapter: u32) -> StoryResult<Vec<CharacterId>> {
        let mut forgotten = Vec::new();
        for character in self.list().await? {
            if character.chapter_introduced.is_some_and(|c| c >= chapter) {
                self.update(&character.id, |c| {
                    c.chapter_introduced = None;
                    Ok(())
                })
                .await?;
                forgotten.push(character.id);
            }
        }
        if !forgotten.is_empty() {
            info!(chapter, count = forgotten.len(), "Forgot introductions from discarded drafts");
        }
        Ok(forgotten)
    }

    /// Remove from the active cast; false if the character was not active
    pub async fn exit(&self, id: &CharacterId) -> bool {
        self.active.write().await.remove(id)
    }

    pub async fn active(&self) -> BTreeSet<CharacterId> {
        self.active.read().await.clone()
    }

    pub async fn pronoun(&self, id: &CharacterId, form: PronounForm) -> StoryResult<String> {
        Ok(self.get(id).await?.pronouns.form(form).to_string())
    }

    /// Resolved name parts, or the id when none are known yet
    pub async fn display_name(&self, id: &CharacterId) -> StoryResult<String> {
        let name = self.get(id).await?.name.display();
        Ok(if name.is_empty() { id.to_string() } else { name })
    }

    async fn lookup(&self, id: &CharacterId) -> StoryResult<Option<Character>> {
        if let Some(character) = self.characters.read().await.get(id) {
            return Ok(Some(character.clone()));
        }
        let stored: Option<Character> = self
            .gateway
            .fetch(collections::CHARACTERS, Scope::Global, id.as_str())
            .await?;
        Ok(match stored {
            Some(character) => {
                let mut set = self.characters.write().await;
                Some(set.entry(id.clone()).or_insert(character).clone())
            }
            None => None,
        })
    }

    fn cached_value(character: &Character, key: &str) -> StoryResult<Option<AttributeValue>> {
        if let Some(kind) = NameKind::from_key(key) {
            let resolved = match kind {
                NameKind::First => character.name.first.value().cloned(),
                NameKind::Middle => character.name.middle.value().map(|m| m.join(" ")),
                NameKind::Last => character.name.last.value().cloned(),
            };
            return Ok(resolved.map(AttributeValue::Text));
        }
        match key {
            "prefix" | "suffix" => {
                let supplied = if key == "prefix" {
                    &character.name.prefix
                } else {
                    &character.name.suffix
                };
                supplied
                    .clone()
                    .map(|v| Some(AttributeValue::Text(v)))
                    .ok_or_else(|| {
                        StoryError::Configuration(format!(
                            "{} of {} is author-supplied only and was never given",
                            key, character.id
                        ))
                    })
            }
            "pronouns" => Ok(Some(AttributeValue::Text(character.pronouns.to_string()))),
            _ => Ok(character.attribute(key).cloned()),
        }
    }

    async fn compute(&self, character: &Character, key: &str) -> StoryResult<ResolvedField> {
        if let Some(kind) = NameKind::from_key(key) {
            let parts = match kind {
                NameKind::Middle => self.reserve_middle(&character.id).await?,
                _ => vec![self.registry.reserve(kind, &character.id, 0).await?],
            };
            return Ok(ResolvedField::Component(kind, parts));
        }

        let story = self.gateway.story().as_str();
        match (character.strategy, key) {
            (GenerationStrategy::StructuredRandom, "age") => {
                let mut rng = seeded_rng(&[story, character.id.as_str(), "attribute", key]);
                Ok(ResolvedField::Value(AttributeValue::Integer(
                    rng.gen_range(AGE_RANGE.0..=AGE_RANGE.1),
                )))
            }
            (GenerationStrategy::StructuredRandom, "occupation") => {
                let mut rng = seeded_rng(&[story, character.id.as_str(), "attribute", key]);
                let occupation = OCCUPATIONS
                    .choose(&mut rng)
                    .ok_or_else(|| StoryError::Exhaustion {
                        kind: "occupation".to_string(),
                        issued: 0,
                    })?;
                Ok(ResolvedField::Value(AttributeValue::Text(
                    occupation.to_string(),
                )))
            }
            _ => self
                .generation
                .fill_attribute(
                    &format!("attribute '{}' of {}", key, character.id),
                    &character.known_facts(),
                    key,
                )
                .await
                .map(ResolvedField::Value),
        }
    }

    async fn claim_explicit(&self, id: &CharacterId, name: &CharacterName) -> StoryResult<()> {
        for kind in NameKind::ALL {
            for (slot, value) in name.component(kind).iter().enumerate() {
                self.registry.claim(kind, value, id, slot as u32).await?;
            }
        }
        Ok(())
    }

    fn creation_fields(
        request: &CreateCharacterRequest,
        name: &CharacterName,
        wants_pronouns: bool,
    ) -> Vec<FieldRequest> {
        let mut fields = Vec::new();
        if !name.first.is_resolved() && !request.is_deferred("first") {
            fields.push(FieldRequest::new("first", "a single-word given name"));
        }
        if !name.middle.is_resolved() && !request.is_deferred("middle") {
            fields.push(FieldRequest::new(
                "middle",
                "a JSON array of zero to two single-word middle names",
            ));
        }
        if !name.last.is_resolved() && !request.is_deferred("last") {
            fields.push(FieldRequest::new("last", "a single-word family name"));
        }
        if wants_pronouns {
            fields.push(FieldRequest::new("pronouns", "one of: he, she, they"));
        }
        for key in &request.deferred {
            let structural = NameKind::from_key(key).is_some() || key == "prefix" || key == "suffix";
            if !structural && !request.attributes.contains_key(key) {
                fields.push(FieldRequest::new(key.clone(), format!("the character's {}", key)));
            }
        }
        fields
    }

    fn request_facts(request: &CreateCharacterRequest) -> Vec<(String, String)> {
        let mut facts = Vec::new();
        for (label, value) in [
            ("prefix", &request.prefix),
            ("first name", &request.first),
            ("last name", &request.last),
            ("suffix", &request.suffix),
        ] {
            if let Some(value) = value {
                facts.push((label.to_string(), value.clone()));
            }
        }
        if let Some(middle) = &request.middle {
            facts.push(("middle names".to_string(), middle.join(" ")));
        }
        for (key, value) in &request.attributes {
            facts.push((key.clone(), value.to_string()));
        }
        facts
    }

    /// Keep generated components the registry accepts; the rest are drawn later
    async fn apply_generated_names(
        &self,
        id: &CharacterId,
        name: &mut CharacterName,
        filled: &BTreeMap<String, serde_json::Value>,
    ) -> StoryResult<()> {
        for (kind, field) in [(NameKind::First, &mut name.first), (NameKind::Last, &mut name.last)] {
            if field.is_resolved() {
                continue;
            }
            let candidate = filled
                .get(kind.as_str())
                .and_then(|v| v.as_str())
                .and_then(single_token);
            if let Some(value) = candidate {
                if self.registry.claim(kind, &value, id, 0).await? {
                    *field = Resolution::Resolved(value);
                } else {
                    debug!(kind = %kind, value = %value, "Generated name already issued, drawing instead");
                }
            }
        }

        if !name.middle.is_resolved() {
            let tokens: Option<Vec<String>> = match filled.get("middle") {
                Some(serde_json::Value::Array(items)) => items
                    .iter()
                    .map(|v| v.as_str().and_then(single_token))
                    .collect(),
                Some(serde_json::Value::String(s)) => {
                    Some(s.split_whitespace().map(str::to_string).collect())
                }
                _ => None,
            };
            if let Some(tokens) = tokens {
                let mut middle = Vec::new();
                for (slot, token) in tokens.into_iter().take(MAX_MIDDLE_NAMES).enumerate() {
                    let slot = slot as u32;
                    if self.registry.claim(NameKind::Middle, &token, id, slot).await? {
                        middle.push(token);
                    } else {
                        middle.push(self.registry.reserve(NameKind::Middle, id, slot).await?);
                    }
                }
                name.middle = Resolution::Resolved(middle);
            }
        }
        Ok(())
    }

    async fn fill_name_gaps(
        &self,
        id: &CharacterId,
        name: &mut CharacterName,
        request: &CreateCharacterRequest,
    ) -> StoryResult<()> {
        if !name.first.is_resolved() && !request.is_deferred("first") {
            name.first = Resolution::Resolved(self.registry.reserve(NameKind::First, id, 0).await?);
        }
        if !name.middle.is_resolved() && !request.is_deferred("middle") {
            name.middle = Resolution::Resolved(self.reserve_middle(id).await?);
        }
        if !name.last.is_resolved() && !request.is_deferred("last") {
            name.last = Resolution::Resolved(self.registry.reserve(NameKind::Last, id, 0).await?);
        }
        Ok(())
    }

    /// Claim the full name, redrawing the `redrawable` component while another character owns it
    ///
    /// A redrawn middle name list grows by one reserved slot; a redrawn first
    /// or last name moves to the next registry slot and the replaced value
    /// stays issued to this character. Without a redrawable component the
    /// collision is the author's and surfaces as a configuration error.
    async fn claim_unique_name(
        &self,
        id: &CharacterId,
        name: &mut CharacterName,
        redrawable: Option<NameKind>,
    ) -> StoryResult<()> {
        let mut redraws: u32 = 0;
        while let Some((first, middle, last)) = name.full_tuple() {
            let collision = match self
                .registry
                .claim_full_name(&first, &middle, &last, id)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e @ StoryError::Configuration(_)) => e,
                Err(e) => return Err(e),
            };
            redraws += 1;
            match redrawable {
                Some(NameKind::Middle) if middle.len() < MAX_MIDDLE_NAMES => {
                    let slot = middle.len() as u32;
                    let mut middle = middle;
                    middle.push(self.registry.reserve(NameKind::Middle, id, slot).await?);
                    name.middle = Resolution::Resolved(middle);
                }
                Some(kind @ (NameKind::First | NameKind::Last)) if redraws <= MAX_NAME_REDRAWS => {
                    let value = self.registry.reserve(kind, id, redraws).await?;
                    let field = if kind == NameKind::First {
                        &mut name.first
                    } else {
                        &mut name.last
                    };
                    *field = Resolution::Resolved(value);
                }
                _ => return Err(collision),
            }
            debug!(character_id = %id, redraws, "Full name taken, redrew a component");
        }
        Ok(())
    }

    async fn reserve_middle(&self, id: &CharacterId) -> StoryResult<Vec<String>> {
        let count = {
            let mut rng = seeded_rng(&[self.gateway.story().as_str(), id.as_str(), "middle_count"]);
            rng.gen_range(0..=MAX_MIDDLE_NAMES)
        };
        let mut middle = Vec::with_capacity(count);
        for slot in 0..count {
            middle.push(
                self.registry
                    .reserve(NameKind::Middle, id, slot as u32)
                    .await?,
            );
        }
        Ok(middle)
    }

    fn seeded_pronouns(&self, id: &CharacterId) -> PronounSet {
        let mut rng = seeded_rng(&[self.gateway.story().as_str(), id.as_str(), "pronouns"]);
        let category = PronounCategory::ALL[rng.gen_range(0..PronounCategory::ALL.len())];
        PronounSet::resolve(category)
    }

    async fn flight_lock(&self, id: &CharacterId, key: &str) -> Arc<Mutex<()>> {
        self.in_flight
            .lock()
            .await
            .entry((id.clone(), key.to_string()))
            .or_default()
            .clone()
    }

    /// In-memory only state change on the working-set entry
    async fn mark(&self, id: &CharacterId, change: impl FnOnce(&mut Character)) {
        if let Some(character) = self.characters.write().await.get_mut(id) {
            change(character);
        }
    }

    /// Apply a change to a copy, persist it, then publish it to the working set
    async fn update<R>(
        &self,
        id: &CharacterId,
        change: impl FnOnce(&mut Character) -> StoryResult<R>,
    ) -> StoryResult<R> {
        self.get(id).await?;
        let mut set = self.characters.write().await;
        let current = set
            .get(id)
            .cloned()
            .ok_or_else(|| StoryError::not_found("character", id))?;
        let mut next = current;
        let result = change(&mut next)?;
        next.touch();
        self.persist(&next).await?;
        set.insert(id.clone(), next);
        Ok(result)
    }

    async fn persist(&self, character: &Character) -> StoryResult<()> {
        self.gateway
            .upsert(
                collections::CHARACTERS,
                Scope::Global,
                character.id.as_str(),
                character,
            )
            .await
    }
}

fn begin_field(character: &mut Character, key: &str) {
    match NameKind::from_key(key) {
        Some(NameKind::First) => character.name.first.begin(),
        Some(NameKind::Middle) => character.name.middle.begin(),
        Some(NameKind::Last) => character.name.last.begin(),
        None => character
            .attributes
            .entry(key.to_string())
            .or_default()
            .begin(),
    }
}

fn abandon_field(character: &mut Character, key: &str, was_declared: bool) {
    match NameKind::from_key(key) {
        Some(NameKind::First) => character.name.first.abandon(),
        Some(NameKind::Middle) => character.name.middle.abandon(),
        Some(NameKind::Last) => character.name.last.abandon(),
        None => {
            let resolving = character
                .attributes
                .get(key)
                .is_some_and(Resolution::is_resolving);
            if resolving && !was_declared {
                character.attributes.remove(key);
            } else if let Some(state) = character.attributes.get_mut(key) {
                state.abandon();
            }
        }
    }
}

fn settle_field(character: &mut Character, key: &str, resolved: ResolvedField) -> AttributeValue {
    match resolved {
        ResolvedField::Component(NameKind::First, parts) => {
            AttributeValue::Text(character.name.first.settle(parts.join(" ")).clone())
        }
        ResolvedField::Component(NameKind::Middle, parts) => {
            AttributeValue::Text(character.name.middle.settle(parts).join(" "))
        }
        ResolvedField::Component(NameKind::Last, parts) => {
            AttributeValue::Text(character.name.last.settle(parts.join(" ")).clone())
        }
        ResolvedField::Value(value) => character
            .attributes
            .entry(key.to_string())
            .or_default()
            .settle(value)
            .clone(),
    }
}

fn begin_relationship(character: &mut Character, relation: &str) {
    character
        .relationships
        .entry(relation.to_string())
        .or_default()
        .targets
        .begin();
}

fn abandon_relationship(character: &mut Character, relation: &str, was_declared: bool) {
    if was_declared {
        if let Some(entry) = character.relationships.get_mut(relation) {
            entry.targets.abandon();
        }
    } else if character
        .relationships
        .get(relation)
        .is_some_and(|r| r.targets.is_resolving())
    {
        character.relationships.remove(relation);
    }
}

/// Fields an existing-id create request sets differently from the stored character
fn request_conflicts(request: &CreateCharacterRequest, stored: &Character) -> Vec<String> {
    let mut conflicts = Vec::new();
    let name = &stored.name;
    let differs = |asked: &Option<String>, kept: Option<&String>| {
        asked.as_ref().is_some_and(|asked| Some(asked) != kept)
    };
    if differs(&request.prefix, name.prefix.as_ref()) {
        conflicts.push("prefix".to_string());
    }
    if differs(&request.first, name.first.value()) {
        conflicts.push("first".to_string());
    }
    if request
        .middle
        .as_ref()
        .is_some_and(|asked| Some(asked) != name.middle.value())
    {
        conflicts.push("middle".to_string());
    }
    if differs(&request.last, name.last.value()) {
        conflicts.push("last".to_string());
    }
    if differs(&request.suffix, name.suffix.as_ref()) {
        conflicts.push("suffix".to_string());
    }
    if request
        .pronouns
        .clone()
        .is_some_and(|asked| asked.into_set() != stored.pronouns)
    {
        conflicts.push("pronouns".to_string());
    }
    if request.strategy != stored.strategy {
        conflicts.push("strategy".to_string());
    }
    for (key, value) in &request.attributes {
        if stored.attribute(key) != Some(value) {
            conflicts.push(key.clone());
        }
    }
    conflicts
}

fn single_token(raw: &str) -> Option<String> {
    let token = raw.trim();
    let valid = !token.is_empty() && !token.contains(char::is_whitespace);
    valid.then(|| token.to_string())
}

fn summarize(character: &Character) -> String {
    character
        .known_facts()
        .into_iter()
        .map(|(label, value)| format!("{}: {}", label, value))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::outbound::{LlmRequest, LlmResponse};
    use crate::application::services::generation_service::GenerationSettings;
    use crate::domain::value_objects::StoryId;
    use crate::infrastructure::persistence::InMemoryDocumentStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    type Reply = Box<dyn Fn(&LlmRequest) -> Result<String, std::io::Error> + Send + Sync>;

    /// Answers through a closure and counts calls
    struct MockLlm {
        reply: Reply,
        calls: Arc<AtomicUsize>,
    }

    impl MockLlm {
        fn new(
            reply: impl Fn(&LlmRequest) -> Result<String, std::io::Error> + Send + Sync + 'static,
        ) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    reply: Box::new(reply),
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    #[async_trait::async_trait]
    impl LlmPort for MockLlm {
        type Error = std::io::Error;

        async fn generate(&self, request: LlmRequest) -> Result<LlmResponse, Self::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(LlmResponse {
                content: (self.reply)(&request)?,
                model: "mock".to_string(),
                tokens_used: 0,
            })
        }
    }

    async fn service_with(
        store: &InMemoryDocumentStore,
        llm: MockLlm,
    ) -> CharacterService<MockLlm> {
        let gateway = PersistenceGateway::new(
            Arc::new(store.clone()),
            StoryId::parse("harbor").unwrap(),
        );
        let registry = Arc::new(NameRegistryService::load(gateway.clone()).await.unwrap());
        let generation = Arc::new(GenerationService::new(llm, GenerationSettings::default()));
        CharacterService::new(gateway, registry, generation, 1)
    }

    fn silent() -> MockLlm {
        MockLlm::new(|_| Err(std::io::Error::new(std::io::ErrorKind::Other, "offline"))).0
    }

    #[tokio::test]
    async fn test_structured_random_creation_fills_names_without_generation() {
        let store = InMemoryDocumentStore::new();
        let (llm, calls) = MockLlm::new(|_| Ok(String::new()));
        let service = service_with(&store, llm).await;

        let character = service
            .create(CreateCharacterRequest::default().with_id("jessie").with_first("Jessie"))
            .await
            .unwrap();

        assert_eq!(character.name.first.value().unwrap(), "Jessie");
        assert!(character.name.last.is_resolved());
        assert!(character.name.middle.value().unwrap().len() <= MAX_MIDDLE_NAMES);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_create_with_existing_id_returns_stored_character() {
        let store = InMemoryDocumentStore::new();
        let service = service_with(&store, silent()).await;
        let first = service
            .create(CreateCharacterRequest::default().with_id("jessie").with_first("Jessie"))
            .await
            .unwrap();

        let fresh_session = service_with(&store, silent()).await;
        let again = fresh_session
            .create(CreateCharacterRequest::default().with_id("jessie").with_first("Other"))
            .await
            .unwrap();
        assert_eq!(again, first);
    }

    #[test]
    fn test_request_conflicts_lists_disagreeing_fields() {
        let stored = Character::new(
            CharacterId::from("jessie"),
            StoryId::parse("harbor").unwrap(),
            PronounSet::resolve(PronounCategory::Female),
            GenerationStrategy::StructuredRandom,
        )
        .with_name(CharacterName {
            first: Resolution::Resolved("Jessie".into()),
            ..CharacterName::default()
        })
        .with_attribute("occupation", "nurse".into());

        let same = CreateCharacterRequest::default()
            .with_id("jessie")
            .with_first("Jessie")
            .with_attribute("occupation", "nurse");
        assert!(request_conflicts(&same, &stored).is_empty());

        let different = CreateCharacterRequest::default()
            .with_id("jessie")
            .with_first("Other")
            .with_pronouns(PronounCategory::Female)
            .with_attribute("age", 40i64);
        assert_eq!(request_conflicts(&different, &stored), vec!["first", "age"]);
    }

    #[tokio::test]
    async fn test_suffixed_namesakes_get_distinct_full_names() {
        let store = InMemoryDocumentStore::new();
        let service = service_with(&store, silent()).await;

        let mut tuples = BTreeSet::new();
        for (i, suffix) in ["Sr.", "Jr.", "III", "IV", "V", "VI"].into_iter().enumerate() {
            let character = service
                .create(
                    CreateCharacterRequest::default()
                        .with_id(format!("john-{}", i))
                        .with_first("John")
                        .with_last("Smith")
                        .with_suffix(suffix),
                )
                .await
                .unwrap();
            assert_eq!(character.name.suffix.as_deref(), Some(suffix));
            assert!(tuples.insert(character.name.full_tuple().unwrap()));
        }
    }

    #[tokio::test]
    async fn test_taken_full_name_grows_a_drawn_middle_name() {
        let store = InMemoryDocumentStore::new();
        let service = service_with(&store, silent()).await;
        service
            .create(
                CreateCharacterRequest::default()
                    .with_id("senior")
                    .with_first("John")
                    .with_middle(vec![])
                    .with_last("Smith"),
            )
            .await
            .unwrap();

        let junior = CharacterId::from("junior");
        let mut name = CharacterName {
            first: Resolution::Resolved("John".into()),
            middle: Resolution::Resolved(vec![]),
            last: Resolution::Resolved("Smith".into()),
            ..CharacterName::default()
        };
        service
            .claim_unique_name(&junior, &mut name, Some(NameKind::Middle))
            .await
            .unwrap();
        let middle = name.middle.value().unwrap();
        assert_eq!(middle.len(), 1);
        let registry = service.registry.snapshot().await;
        assert_eq!(
            registry.owner_of(NameKind::Middle, &middle[0]).unwrap().character,
            junior
        );
    }

    #[tokio::test]
    async fn test_deferred_middle_name_avoids_a_taken_full_name() {
        let store = InMemoryDocumentStore::new();
        let service = service_with(&store, silent()).await;
        let senior = service
            .create(
                CreateCharacterRequest::default()
                    .with_id("senior")
                    .with_first("John")
                    .with_middle(vec![])
                    .with_last("Smith")
                    .with_suffix("Sr."),
            )
            .await
            .unwrap();
        let junior = CharacterId::from("junior");
        service
            .create(
                CreateCharacterRequest::default()
                    .with_id(junior.clone())
                    .with_first("John")
                    .with_last("Smith")
                    .with_suffix("Jr.")
                    .with_deferred("middle"),
            )
            .await
            .unwrap();

        let middle = service.resolve_attribute(&junior, "middle").await.unwrap();
        assert_eq!(service.resolve_attribute(&junior, "middle").await.unwrap(), middle);
        let resolved = service.get(&junior).await.unwrap();
        assert!(resolved.name.middle.is_resolved());
        assert_ne!(resolved.name.full_tuple(), senior.name.full_tuple());
    }

    #[tokio::test]
    async fn test_author_supplied_namesakes_are_configuration_error() {
        let store = InMemoryDocumentStore::new();
        let service = service_with(&store, silent()).await;
        let request = |id: &str| {
            CreateCharacterRequest::default()
                .with_id(id)
                .with_first("John")
                .with_middle(vec!["Henry".to_string()])
                .with_last("Smith")
        };
        service.create(request("a")).await.unwrap();
        let err = service.create(request("b")).await.unwrap_err();
        assert!(matches!(err, StoryError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_generated_last_names_are_unique() {
        let store = InMemoryDocumentStore::new();
        let service = service_with(&store, silent()).await;
        let mut seen = BTreeSet::new();
        for i in 0..20 {
            let character = service
                .create(CreateCharacterRequest::default().with_id(format!("c{}", i)))
                .await
                .unwrap();
            assert!(seen.insert(character.name.last.value().unwrap().clone()));
        }
    }

    #[tokio::test]
    async fn test_deferred_last_name_resolves_once_through_registry() {
        let store = InMemoryDocumentStore::new();
        let (llm, calls) = MockLlm::new(|_| Ok("{\"last\": \"Wrong\"}".to_string()));
        let service = service_with(&store, llm).await;
        let id = CharacterId::from("jessie");
        service
            .create(
                CreateCharacterRequest::default()
                    .with_id(id.clone())
                    .with_first("Jessie")
                    .with_deferred("last"),
            )
            .await
            .unwrap();

        let last = service.resolve_attribute(&id, "last").await.unwrap();
        let again = service.resolve_attribute(&id, "last").await.unwrap();
        assert_eq!(last, again);
        assert_ne!(last, AttributeValue::Text("Wrong".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_prefix_is_author_supplied_only() {
        let store = InMemoryDocumentStore::new();
        let service = service_with(&store, silent()).await;
        let id = CharacterId::from("jessie");
        service
            .create(CreateCharacterRequest::default().with_id(id.clone()))
            .await
            .unwrap();
        let err = service.resolve_attribute(&id, "prefix").await.unwrap_err();
        assert!(matches!(err, StoryError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_structured_age_is_seeded_and_in_range() {
        let store = InMemoryDocumentStore::new();
        let service = service_with(&store, silent()).await;
        let id = CharacterId::from("jessie");
        service
            .create(CreateCharacterRequest::default().with_id(id.clone()).with_deferred("age"))
            .await
            .unwrap();
        let age = service
            .resolve_attribute(&id, "age")
            .await
            .unwrap()
            .as_integer()
            .unwrap();
        assert!((AGE_RANGE.0..=AGE_RANGE.1).contains(&age));

        let other_store = InMemoryDocumentStore::new();
        let replay = service_with(&other_store, silent()).await;
        replay
            .create(CreateCharacterRequest::default().with_id(id.clone()).with_deferred("age"))
            .await
            .unwrap();
        assert_eq!(
            replay.resolve_attribute(&id, "age").await.unwrap(),
            AttributeValue::Integer(age)
        );
    }

    #[tokio::test]
    async fn test_concurrent_resolution_is_single_flight() {
        let store = InMemoryDocumentStore::new();
        let (llm, calls) = MockLlm::new(|_| Ok("{\"favorite_food\": \"figs\"}".to_string()));
        let service = service_with(&store, llm).await;
        let id = CharacterId::from("jessie");
        service
            .create(
                CreateCharacterRequest::new(GenerationStrategy::LanguageModel)
                    .with_id(id.clone())
                    .with_deferred("favorite_food"),
            )
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            service.resolve_attribute(&id, "favorite_food"),
            service.resolve_attribute(&id, "favorite_food")
        );
        assert_eq!(a.unwrap(), AttributeValue::Text("figs".into()));
        assert_eq!(b.unwrap(), AttributeValue::Text("figs".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_resolution_reverts_to_unset() {
        let store = InMemoryDocumentStore::new();
        let (llm, calls) = MockLlm::new(|_| Ok("{".to_string()));
        let service = service_with(&store, llm).await;
        let id = CharacterId::from("jessie");
        service
            .create(
                CreateCharacterRequest::new(GenerationStrategy::LanguageModel)
                    .with_id(id.clone())
                    .with_deferred("favorite_food"),
            )
            .await
            .unwrap();

        let err = service
            .resolve_attribute(&id, "favorite_food")
            .await
            .unwrap_err();
        assert!(matches!(err, StoryError::GenerationParse { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let character = service.get(&id).await.unwrap();
        assert_eq!(character.attributes["favorite_food"], Resolution::Unset);

        // An undeclared key leaves no trace after failing
        service.resolve_attribute(&id, "hobby").await.unwrap_err();
        assert!(!service.get(&id).await.unwrap().attributes.contains_key("hobby"));
    }

    #[tokio::test]
    async fn test_language_model_creation_uses_prompt_fields() {
        let store = InMemoryDocumentStore::new();
        let (llm, calls) = MockLlm::new(|request| {
            assert!(request.messages[0].content.contains("retired sea captain"));
            Ok(r#"{"first": "Quillon", "middle": [], "last": "Vantreece", "pronouns": "he", "mood": "wistful"}"#.to_string())
        });
        let service = service_with(&store, llm).await;
        let character = service
            .create(
                CreateCharacterRequest::new(GenerationStrategy::LanguageModel)
                    .with_id("captain")
                    .with_deferred("mood")
                    .with_prompt("a retired sea captain"),
            )
            .await
            .unwrap();

        assert_eq!(character.name.display(), "Quillon Vantreece");
        assert_eq!(character.pronouns, PronounSet::resolve(PronounCategory::Male));
        assert_eq!(
            character.attribute("mood"),
            Some(&AttributeValue::Text("wistful".into()))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_generated_name_collision_falls_back_to_registry() {
        let store = InMemoryDocumentStore::new();
        let (llm, _) = MockLlm::new(|_| Ok(r#"{"first": "Quillon", "middle": [], "last": "Vantreece"}"#.to_string()));
        let service = service_with(&store, llm).await;
        service
            .create(CreateCharacterRequest::default().with_id("other-author").with_last("Vantreece"))
            .await
            .unwrap();

        let character = service
            .create(
                CreateCharacterRequest::new(GenerationStrategy::LanguageModel)
                    .with_id("captain")
                    .with_pronouns(PronounCategory::Male)
                    .with_prompt("a retired sea captain"),
            )
            .await
            .unwrap();
        assert_eq!(character.name.first.value().unwrap(), "Quillon");
        assert_ne!(character.name.last.value().unwrap(), "Vantreece");
    }

    #[tokio::test]
    async fn test_rule_relationship_is_cached() {
        let store = InMemoryDocumentStore::new();
        let service = service_with(&store, silent()).await;
        for (id, occupation) in [("jessie", "nurse"), ("mara", "baker"), ("tobias", "nurse")] {
            service
                .create(
                    CreateCharacterRequest::default()
                        .with_id(id)
                        .with_attribute("occupation", occupation),
                )
                .await
                .unwrap();
        }
        let pool = vec![
            CharacterId::from("jessie"),
            CharacterId::from("mara"),
            CharacterId::from("tobias"),
        ];
        let filter = AttributeFilter::Equals("occupation".into(), "nurse".into());
        let chosen = service
            .resolve_relationship(
                &CharacterId::from("jessie"),
                "colleague",
                &pool,
                RelationshipSelector::Rule(filter),
            )
            .await
            .unwrap();
        assert_eq!(chosen, CharacterId::from("tobias"));

        let again = service
            .resolve_relationship(
                &CharacterId::from("jessie"),
                "colleague",
                &pool,
                RelationshipSelector::Rule(AttributeFilter::Any),
            )
            .await
            .unwrap();
        assert_eq!(again, chosen);
    }

    #[tokio::test]
    async fn test_relationship_with_empty_pool_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let service = service_with(&store, silent()).await;
        let id = CharacterId::from("jessie");
        service
            .create(CreateCharacterRequest::default().with_id(id.clone()))
            .await
            .unwrap();
        let err = service
            .resolve_relationship(&id, "sibling", &[id.clone()], RelationshipSelector::Rule(AttributeFilter::Any))
            .await
            .unwrap_err();
        assert!(matches!(err, StoryError::NotFound { .. }));
        assert!(service.get(&id).await.unwrap().relationships.is_empty());
    }

    #[tokio::test]
    async fn test_generated_relationship_choice() {
        let store = InMemoryDocumentStore::new();
        let (llm, _) = MockLlm::new(|request| {
            assert!(request.messages[0].content.contains("Candidates:"));
            Ok("{\"id\": \"mara\"}".to_string())
        });
        let service = service_with(&store, llm).await;
        for id in ["jessie", "mara", "tobias"] {
            service
                .create(CreateCharacterRequest::default().with_id(id))
                .await
                .unwrap();
        }
        let pool = vec![CharacterId::from("mara"), CharacterId::from("tobias")];
        let chosen = service
            .resolve_relationship(
                &CharacterId::from("jessie"),
                "rival",
                &pool,
                RelationshipSelector::Generated { guidance: None },
            )
            .await
            .unwrap();
        assert_eq!(chosen, CharacterId::from("mara"));
    }

    #[tokio::test]
    async fn test_enter_sets_introduction_once() {
        let store = InMemoryDocumentStore::new();
        let service = service_with(&store, silent()).await;
        let id = CharacterId::from("jessie");
        service
            .create(CreateCharacterRequest::default().with_id(id.clone()))
            .await
            .unwrap();
        assert!(service.introduced_candidates(None).await.unwrap().is_empty());

        service.enter(&id).await.unwrap();
        service.enter(&id).await.unwrap();
        assert_eq!(service.get(&id).await.unwrap().chapter_introduced, Some(1));
        assert_eq!(service.introduced_candidates(None).await.unwrap(), vec![id.clone()]);
        assert!(service.introduced_candidates(Some(&id)).await.unwrap().is_empty());

        assert!(service.exit(&id).await);
        assert!(service.active().await.is_empty());
    }

    #[tokio::test]
    async fn test_relate_records_reciprocal() {
        let store = InMemoryDocumentStore::new();
        let service = service_with(&store, silent()).await;
        for id in ["jessie", "mara"] {
            service
                .create(CreateCharacterRequest::default().with_id(id))
                .await
                .unwrap();
        }
        let jessie = CharacterId::from("jessie");
        let mara = CharacterId::from("mara");
        service
            .relate(&jessie, &mara, "mentor", Some("mentee"), Some("since the academy".into()))
            .await
            .unwrap();
        assert_eq!(
            service.get(&jessie).await.unwrap().relationship("mentor").unwrap(),
            &[mara.clone()]
        );
        assert_eq!(
            service.get(&mara).await.unwrap().relationship("mentee").unwrap(),
            &[jessie]
        );
    }

    #[tokio::test]
    async fn test_unknown_character_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let service = service_with(&store, silent()).await;
        let err = service
            .resolve_attribute(&CharacterId::from("ghost"), "age")
            .await
            .unwrap_err();
        assert!(matches!(err, StoryError::NotFound { .. }));
    }
}
