//! Character entity - identity, name components and lazily resolved attributes

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{
    AttributeValue, CharacterId, NameKind, PronounSet, Resolution, StoryId,
};

/// How deferred fields are filled, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStrategy {
    /// Seeded draws from static corpora, no generation calls
    #[default]
    StructuredRandom,
    /// Open fields are filled by the text-generation service
    LanguageModel,
}

/// Ordered name components
///
/// `prefix` and `suffix` are only ever author-supplied. The other three are
/// resolved through the name registry when absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CharacterName {
    pub prefix: Option<String>,
    pub first: Resolution<String>,
    pub middle: Resolution<Vec<String>>,
    pub last: Resolution<String>,
    pub suffix: Option<String>,
}

impl CharacterName {
    /// `(first, middle, last)` once every generated component is known
    pub fn full_tuple(&self) -> Option<(String, Vec<String>, String)> {
        Some((
            self.first.value()?.clone(),
            self.middle.value()?.clone(),
            self.last.value()?.clone(),
        ))
    }

    pub fn is_complete(&self) -> bool {
        self.full_tuple().is_some()
    }

    /// Resolved components for one kind, flattened
    pub fn component(&self, kind: NameKind) -> Vec<String> {
        match kind {
            NameKind::First => self.first.value().cloned().into_iter().collect(),
            NameKind::Middle => self.middle.value().cloned().unwrap_or_default(),
            NameKind::Last => self.last.value().cloned().into_iter().collect(),
        }
    }

    /// Every resolved part in order, skipping unresolved ones
    pub fn display(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(prefix) = &self.prefix {
            parts.push(prefix);
        }
        if let Some(first) = self.first.value() {
            parts.push(first);
        }
        if let Some(middle) = self.middle.value() {
            parts.extend(middle.iter().map(String::as_str));
        }
        if let Some(last) = self.last.value() {
            parts.push(last);
        }
        if let Some(suffix) = &self.suffix {
            parts.push(suffix);
        }
        parts.join(" ")
    }
}

/// A named relation to other characters
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Relationship {
    pub targets: Resolution<Vec<CharacterId>>,
    pub description: Option<String>,
}

/// Predicate used by rule-based relationship selection
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeFilter {
    /// Every candidate matches
    Any,
    /// The attribute is resolved, whatever its value
    Has(String),
    /// The attribute is resolved to exactly this value
    Equals(String, AttributeValue),
}

/// A character in a story
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub story_id: StoryId,
    pub name: CharacterName,
    pub pronouns: PronounSet,
    pub strategy: GenerationStrategy,
    /// Resolved values, plus declared-but-deferred keys held as `Unset`
    #[serde(default)]
    pub attributes: BTreeMap<String, Resolution<AttributeValue>>,
    #[serde(default)]
    pub relationships: BTreeMap<String, Relationship>,
    /// Set once, the first time the character enters a scene
    pub chapter_introduced: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Character {
    pub fn new(
        id: CharacterId,
        story_id: StoryId,
        pronouns: PronounSet,
        strategy: GenerationStrategy,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            story_id,
            name: CharacterName::default(),
            pronouns,
            strategy,
            attributes: BTreeMap::new(),
            relationships: BTreeMap::new(),
            chapter_introduced: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_name(mut self, name: CharacterName) -> Self {
        self.name = name;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes
            .insert(key.into(), Resolution::Resolved(value));
        self
    }

    /// Declare a key to be filled on first read
    pub fn with_deferred(mut self, key: impl Into<String>) -> Self {
        self.attributes.entry(key.into()).or_default();
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key).and_then(Resolution::value)
    }

    /// Keys declared but not yet resolved
    pub fn pending_attributes(&self) -> Vec<String> {
        self.attributes
            .iter()
            .filter(|(_, state)| !state.is_resolved())
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn relationship(&self, relation: &str) -> Option<&[CharacterId]> {
        self.relationships
            .get(relation)
            .and_then(|r| r.targets.value())
            .map(Vec::as_slice)
    }

    /// Record an explicit target, keeping any existing ones
    pub fn add_relationship_target(
        &mut self,
        relation: impl Into<String>,
        target: CharacterId,
        description: Option<String>,
    ) {
        let entry = self.relationships.entry(relation.into()).or_default();
        let mut targets = entry.targets.value().cloned().unwrap_or_default();
        if !targets.contains(&target) {
            targets.push(target);
        }
        entry.targets = Resolution::Resolved(targets);
        if description.is_some() {
            entry.description = description;
        }
        self.touch();
    }

    /// Returns true if this call set the chapter of introduction
    pub fn mark_introduced(&mut self, chapter: u32) -> bool {
        if self.chapter_introduced.is_some() {
            return false;
        }
        self.chapter_introduced = Some(chapter);
        self.touch();
        true
    }

    pub fn matches(&self, filter: &AttributeFilter) -> bool {
        match filter {
            AttributeFilter::Any => true,
            AttributeFilter::Has(key) => self.known_value(key).is_some(),
            AttributeFilter::Equals(key, expected) => {
                self.known_value(key).as_ref() == Some(expected)
            }
        }
    }

    /// Resolved value for a key, including name components and pronouns
    pub fn known_value(&self, key: &str) -> Option<AttributeValue> {
        if let Some(kind) = NameKind::from_key(key) {
            let parts = self.name.component(kind);
            let resolved = match kind {
                NameKind::Middle => self.name.middle.is_resolved(),
                _ => !parts.is_empty(),
            };
            return resolved.then(|| AttributeValue::Text(parts.join(" ")));
        }
        match key {
            "prefix" => self.name.prefix.clone().map(AttributeValue::Text),
            "suffix" => self.name.suffix.clone().map(AttributeValue::Text),
            "pronouns" => Some(AttributeValue::Text(self.pronouns.to_string())),
            _ => self.attribute(key).cloned(),
        }
    }

    /// Everything already known, as `(label, value)` pairs for prompt context
    pub fn known_facts(&self) -> Vec<(String, String)> {
        let mut facts = Vec::new();
        let name = self.name.display();
        if !name.is_empty() {
            facts.push(("name".to_string(), name));
        }
        facts.push(("pronouns".to_string(), self.pronouns.to_string()));
        for (key, state) in &self.attributes {
            if let Some(value) = state.value() {
                facts.push((key.clone(), value.to_string()));
            }
        }
        for (relation, relationship) in &self.relationships {
            if let Some(targets) = relationship.targets.value() {
                let ids: Vec<&str> = targets.iter().map(CharacterId::as_str).collect();
                facts.push((relation.clone(), ids.join(", ")));
            }
        }
        facts
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::PronounCategory;

    fn jessie() -> Character {
        Character::new(
            CharacterId::from("jessie"),
            StoryId::parse("harbor").unwrap(),
            PronounSet::resolve(PronounCategory::Female),
            GenerationStrategy::StructuredRandom,
        )
    }

    #[test]
    fn test_display_skips_unresolved_parts() {
        let mut character = jessie();
        character.name.first = Resolution::Resolved("Jessie".to_string());
        character.name.prefix = Some("Dr.".to_string());
        assert_eq!(character.name.display(), "Dr. Jessie");
        assert!(!character.name.is_complete());

        character.name.middle = Resolution::Resolved(vec![]);
        character.name.last = Resolution::Resolved("Okafor".to_string());
        assert_eq!(character.name.display(), "Dr. Jessie Okafor");
        assert!(character.name.is_complete());
    }

    #[test]
    fn test_mark_introduced_only_once() {
        let mut character = jessie();
        assert!(character.mark_introduced(2));
        assert!(!character.mark_introduced(5));
        assert_eq!(character.chapter_introduced, Some(2));
    }

    #[test]
    fn test_deferred_and_explicit_attributes() {
        let character = jessie()
            .with_attribute("occupation", "ferry pilot".into())
            .with_deferred("favorite_food");
        assert_eq!(
            character.attribute("occupation"),
            Some(&AttributeValue::Text("ferry pilot".to_string()))
        );
        assert_eq!(character.attribute("favorite_food"), None);
        assert_eq!(character.pending_attributes(), vec!["favorite_food".to_string()]);
    }

    #[test]
    fn test_filters() {
        let character = jessie().with_attribute("occupation", "nurse".into());
        assert!(character.matches(&AttributeFilter::Any));
        assert!(character.matches(&AttributeFilter::Has("occupation".into())));
        assert!(!character.matches(&AttributeFilter::Has("age".into())));
        assert!(character.matches(&AttributeFilter::Equals(
            "occupation".into(),
            "nurse".into()
        )));
    }

    #[test]
    fn test_relationship_targets_accumulate() {
        let mut character = jessie();
        character.add_relationship_target("sibling", CharacterId::from("mara"), None);
        character.add_relationship_target("sibling", CharacterId::from("mara"), None);
        character.add_relationship_target(
            "sibling",
            CharacterId::from("tobias"),
            Some("younger brother".to_string()),
        );
        assert_eq!(
            character.relationship("sibling").unwrap(),
            &[CharacterId::from("mara"), CharacterId::from("tobias")]
        );
    }

    #[test]
    fn test_document_round_trip_preserves_cache_status() {
        let mut character = jessie().with_deferred("age");
        character.name.first = Resolution::Resolved("Jessie".to_string());
        let json = serde_json::to_value(&character).unwrap();
        let back: Character = serde_json::from_value(json).unwrap();
        assert_eq!(back, character);
        assert_eq!(back.name.last, Resolution::Unset);
    }
}
