//! Generation Service - filling open character fields with a language model
//!
//! Responses are free text. This service asks for a JSON object, but accepts
//! anything it can map onto the requested fields:
//!
//! - the outermost `{...}` object in the reply
//! - `key: value` lines
//! - for a single field, a bare one-line answer
//!
//! Unmappable replies are retried with the same prompt up to
//! `max_parse_attempts` times before surfacing `GenerationParse`.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument, warn};

use crate::application::ports::outbound::{ChatMessage, LlmPort, LlmRequest};
use crate::domain::errors::{StoryError, StoryResult};
use crate::domain::value_objects::{AttributeValue, CharacterId};

static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

static THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));

static KEY_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*[-*]?\s*"?([A-Za-z][A-Za-z0-9_ ]*?)"?\s*[:=]\s*(.+?)\s*,?\s*$"#)
        .expect("valid regex")
});

/// Sampling and retry parameters for generation calls
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: Option<u32>,
    /// Total attempts per request when the reply cannot be parsed
    pub max_parse_attempts: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: Some(512),
            max_parse_attempts: 3,
        }
    }
}

impl GenerationSettings {
    pub fn validate(&self) -> StoryResult<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(StoryError::Configuration(format!(
                "temperature must be within 0.0..=2.0, got {}",
                self.temperature
            )));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(StoryError::Configuration(format!(
                "top_p must be within (0.0, 1.0], got {}",
                self.top_p
            )));
        }
        if self.max_tokens == Some(0) {
            return Err(StoryError::Configuration(
                "max_tokens must be positive".to_string(),
            ));
        }
        if self.max_parse_attempts == 0 {
            return Err(StoryError::Configuration(
                "max_parse_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// One field the model is asked to fill
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRequest {
    pub key: String,
    pub hint: String,
}

impl FieldRequest {
    pub fn new(key: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            hint: hint.into(),
        }
    }
}

/// A character offered to the model as a relationship target
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: CharacterId,
    pub summary: String,
}

pub struct GenerationService<L: LlmPort> {
    llm: L,
    settings: GenerationSettings,
}

impl<L: LlmPort> GenerationService<L> {
    pub fn new(llm: L, settings: GenerationSettings) -> Self {
        Self { llm, settings }
    }

    /// Fill several fields in one request; returns only the fields it could map
    #[instrument(skip(self, facts, fields), fields(field_count = fields.len()))]
    pub async fn fill_fields(
        &self,
        subject: &str,
        facts: &[(String, String)],
        prompt: &str,
        fields: &[FieldRequest],
    ) -> StoryResult<BTreeMap<String, serde_json::Value>> {
        let mut message = String::new();
        message.push_str(&format!("Character description: {}\n\n", prompt.trim()));
        push_facts(&mut message, facts);
        message.push_str("Fill in these fields:\n");
        for field in fields {
            message.push_str(&format!("- {}: {}\n", field.key, field.hint));
        }
        message.push_str(
            "\nRespond with a single JSON object whose keys are exactly the field names above.",
        );

        let keys: Vec<&str> = fields.iter().map(|f| f.key.as_str()).collect();
        self.generate_parsed(subject, self.request(message), |content| {
            let mapped = map_fields(content, &keys);
            if mapped.is_empty() {
                Err(format!("none of the fields {:?} found in reply", keys))
            } else {
                Ok(mapped)
            }
        })
        .await
    }

    /// Ask for one attribute value given what is already known
    #[instrument(skip(self, facts))]
    pub async fn fill_attribute(
        &self,
        subject: &str,
        facts: &[(String, String)],
        key: &str,
    ) -> StoryResult<AttributeValue> {
        let mut message = String::new();
        push_facts(&mut message, facts);
        message.push_str(&format!(
            "Invent a plausible value for this character's \"{}\", consistent with the facts above.\n",
            key
        ));
        message.push_str(&format!(
            "Respond with a JSON object of the form {{\"{}\": <value>}}.",
            key
        ));

        self.generate_parsed(subject, self.request(message), |content| {
            parse_single_value(content, key)
                .ok_or_else(|| format!("no value for {:?} found in reply", key))
        })
        .await
    }

    /// Ask the model to pick one candidate id for a relation
    #[instrument(skip(self, facts, candidates), fields(candidate_count = candidates.len()))]
    pub async fn choose_candidate(
        &self,
        subject: &str,
        facts: &[(String, String)],
        relation: &str,
        guidance: Option<&str>,
        candidates: &[Candidate],
    ) -> StoryResult<CharacterId> {
        let mut message = String::new();
        push_facts(&mut message, facts);
        message.push_str(&format!(
            "Choose which character is this character's \"{}\".\n",
            relation
        ));
        if let Some(guidance) = guidance {
            message.push_str(&format!("Guidance: {}\n", guidance));
        }
        message.push_str("Candidates:\n");
        for candidate in candidates {
            message.push_str(&format!("- {}: {}\n", candidate.id, candidate.summary));
        }
        message.push_str("\nRespond with a JSON object of the form {\"id\": \"<candidate id>\"}.");

        self.generate_parsed(subject, self.request(message), |content| {
            pick_candidate(content, candidates)
                .ok_or_else(|| "reply did not name exactly one candidate".to_string())
        })
        .await
    }

    fn request(&self, message: String) -> LlmRequest {
        LlmRequest::new(vec![ChatMessage::user(message)])
            .with_system_prompt(SYSTEM_PROMPT)
            .with_temperature(self.settings.temperature)
            .with_top_p(self.settings.top_p)
            .with_max_tokens(self.settings.max_tokens)
    }

    async fn generate_parsed<T>(
        &self,
        subject: &str,
        request: LlmRequest,
        parse: impl Fn(&str) -> Result<T, String>,
    ) -> StoryResult<T> {
        let attempts = self.settings.max_parse_attempts.max(1);
        let mut last_reason = String::new();
        for attempt in 1..=attempts {
            let response = self
                .llm
                .generate(request.clone())
                .await
                .map_err(|e| StoryError::Generation {
                    target: subject.to_string(),
                    message: e.to_string(),
                })?;
            debug!(
                attempt,
                model = %response.model,
                tokens = response.tokens_used,
                "Generation reply received"
            );
            match parse(&strip_reasoning(&response.content)) {
                Ok(value) => return Ok(value),
                Err(reason) => {
                    warn!(attempt, resolving = %subject, reason = %reason, "Unparseable generation reply");
                    last_reason = reason;
                }
            }
        }
        Err(StoryError::parse(
            subject,
            format!("{} (after {} attempts)", last_reason, attempts),
        ))
    }
}

const SYSTEM_PROMPT: &str = "You help a novelist keep characters consistent. \
Answer only with the requested JSON. Keep names to single words.";

fn push_facts(message: &mut String, facts: &[(String, String)]) {
    if facts.is_empty() {
        return;
    }
    message.push_str("Known facts:\n");
    for (label, value) in facts {
        message.push_str(&format!("- {}: {}\n", label, value));
    }
    message.push('\n');
}

/// Remove `<think>...</think>` blocks some models emit before answering
fn strip_reasoning(content: &str) -> String {
    THINK_BLOCK.replace_all(content, "").trim().to_string()
}

/// The outermost JSON object in a reply, if it parses
pub fn extract_json_object(content: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
    let found = JSON_OBJECT.find(content)?;
    match serde_json::from_str::<serde_json::Value>(found.as_str()) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// `key: value` lines, keys normalised to snake_case
pub fn extract_key_values(content: &str) -> BTreeMap<String, String> {
    KEY_VALUE
        .captures_iter(content)
        .map(|caps| {
            let key = normalize_key(&caps[1]);
            let value = caps[2].trim().trim_matches('"').trim().to_string();
            (key, value)
        })
        .filter(|(_, value)| !value.is_empty())
        .collect()
}

fn normalize_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

fn map_fields(content: &str, keys: &[&str]) -> BTreeMap<String, serde_json::Value> {
    let mut mapped = BTreeMap::new();
    if let Some(object) = extract_json_object(content) {
        let normalized: BTreeMap<String, &serde_json::Value> = object
            .iter()
            .map(|(k, v)| (normalize_key(k), v))
            .collect();
        for key in keys {
            if let Some(value) = normalized.get(*key) {
                if !value.is_null() {
                    mapped.insert(key.to_string(), (*value).clone());
                }
            }
        }
        if !mapped.is_empty() {
            return mapped;
        }
    }
    let lines = extract_key_values(content);
    for key in keys {
        if let Some(value) = lines.get(*key) {
            mapped.insert(key.to_string(), serde_json::Value::String(value.clone()));
        }
    }
    mapped
}

fn parse_single_value(content: &str, key: &str) -> Option<AttributeValue> {
    let normalized_key = normalize_key(key);
    if let Some(object) = extract_json_object(content) {
        let value = object
            .iter()
            .find(|(k, _)| normalize_key(k) == normalized_key)
            .or_else(|| object.iter().find(|(k, _)| k.as_str() == "value"))
            .or_else(|| (object.len() == 1).then(|| object.iter().next()).flatten())
            .map(|(_, v)| v);
        if let Some(value) = value.and_then(AttributeValue::from_json) {
            return Some(value);
        }
    }
    if let Some(value) = extract_key_values(content).get(&normalized_key) {
        return AttributeValue::from_free_text(value);
    }
    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    match lines.as_slice() {
        [only] if !only.contains('{') => AttributeValue::from_free_text(only),
        _ => None,
    }
}

fn pick_candidate(content: &str, candidates: &[Candidate]) -> Option<CharacterId> {
    if let Some(object) = extract_json_object(content) {
        let named = ["id", "character", "choice"]
            .iter()
            .find_map(|k| object.get(*k))
            .and_then(|v| v.as_str())
            .map(str::trim);
        if let Some(named) = named {
            return candidates
                .iter()
                .find(|c| c.id.as_str() == named)
                .map(|c| c.id.clone());
        }
    }
    let trimmed = content.trim().trim_matches('"');
    if let Some(exact) = candidates.iter().find(|c| c.id.as_str() == trimmed) {
        return Some(exact.id.clone());
    }
    let words = word_tokens(content);
    let mentioned: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| mentions(&words, c.id.as_str()))
        .collect();
    match mentioned.as_slice() {
        [one] => Some(one.id.clone()),
        _ => None,
    }
}

/// Words of `text`; hyphens and underscores stay inside a word
fn word_tokens(text: &str) -> Vec<&str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-'))
        .filter(|word| !word.is_empty())
        .collect()
}

/// Whether the id appears as whole words in an already tokenized reply
fn mentions(words: &[&str], id: &str) -> bool {
    let id_words = word_tokens(id);
    !id_words.is_empty() && words.windows(id_words.len()).any(|w| w == id_words.as_slice())
}
