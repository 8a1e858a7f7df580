//! Brand registry - fictional stand-ins for real brand names
//!
//! A real name maps to one story name for the life of the story, and no two
//! real names share a story name. Draws are seeded from
//! `(story, "brand", real name, attempt)`, so the same story substitutes the
//! same brands in any process.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::errors::StoryError;
use crate::domain::value_objects::{seeded_rng, StoryId, BRAND_PREFIXES, BRAND_SUFFIXES};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brand {
    pub real_name: String,
    pub story_name: String,
    /// True when the author chose the story name
    #[serde(default)]
    pub assigned: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandRegistry {
    pub story_id: StoryId,
    /// Real name -> substitution
    #[serde(default)]
    brands: BTreeMap<String, Brand>,
}

impl BrandRegistry {
    pub fn new(story_id: StoryId) -> Self {
        Self {
            story_id,
            brands: BTreeMap::new(),
        }
    }

    /// The story name for `real_name`, drawing one on first use
    pub fn substitute(&mut self, real_name: &str) -> Result<Brand, StoryError> {
        let real_name = real_key(real_name)?;
        if let Some(existing) = self.brands.get(real_name) {
            return Ok(existing.clone());
        }

        let combinations = BRAND_PREFIXES.len() * BRAND_SUFFIXES.len();
        let story = self.story_id.as_str().to_string();
        let mut last_index = 0;
        for attempt in 0..combinations {
            let attempt_label = attempt.to_string();
            let mut rng = seeded_rng(&[&story, "brand", real_name, &attempt_label]);
            let index = rng.gen_range(0..combinations);
            last_index = index;
            let candidate = combination(index);
            if !self.is_taken(&candidate) {
                return Ok(self.insert(real_name, candidate, false));
            }
        }

        for step in 1..=combinations {
            let candidate = combination((last_index + step) % combinations);
            if !self.is_taken(&candidate) {
                return Ok(self.insert(real_name, candidate, false));
            }
        }

        Err(StoryError::Exhaustion {
            kind: "brand".to_string(),
            issued: self.brands.len(),
        })
    }

    /// Pin an author-chosen story name; fails if either side is already mapped elsewhere
    pub fn assign(&mut self, real_name: &str, story_name: &str) -> Result<Brand, StoryError> {
        let real_name = real_key(real_name)?;
        let story_name = validate_brand_name(story_name)?;
        if let Some(existing) = self.brands.get(real_name) {
            if existing.story_name == story_name {
                return Ok(existing.clone());
            }
            return Err(StoryError::Configuration(format!(
                "{:?} already stands in for {:?}",
                existing.story_name, real_name
            )));
        }
        if self.is_taken(story_name) {
            return Err(StoryError::Configuration(format!(
                "brand name {:?} is already in use",
                story_name
            )));
        }
        Ok(self.insert(real_name, story_name.to_string(), true))
    }

    pub fn get(&self, real_name: &str) -> Option<&Brand> {
        self.brands.get(real_name.trim())
    }

    /// Every substitution, ordered by real name
    pub fn brands(&self) -> Vec<Brand> {
        self.brands.values().cloned().collect()
    }

    fn is_taken(&self, story_name: &str) -> bool {
        self.brands
            .values()
            .any(|b| b.story_name.eq_ignore_ascii_case(story_name))
    }

    fn insert(&mut self, real_name: &str, story_name: String, assigned: bool) -> Brand {
        let brand = Brand {
            real_name: real_name.to_string(),
            story_name,
            assigned,
            created_at: Utc::now(),
        };
        self.brands.insert(real_name.to_string(), brand.clone());
        brand
    }
}

fn real_key(raw: &str) -> Result<&str, StoryError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(StoryError::Configuration(
            "real brand name must not be empty".to_string(),
        ));
    }
    Ok(name)
}

fn combination(index: usize) -> String {
    format!(
        "{}{}",
        BRAND_PREFIXES[index / BRAND_SUFFIXES.len()],
        BRAND_SUFFIXES[index % BRAND_SUFFIXES.len()]
    )
}

/// Story names: 3 to 30 characters, starting with a letter, letters, digits and spaces only
pub fn validate_brand_name(raw: &str) -> Result<&str, StoryError> {
    let name = raw.trim();
    let length = name.chars().count();
    let problem = if length < 3 {
        Some("is too short")
    } else if length > 30 {
        Some("is too long")
    } else if !name.chars().next().is_some_and(char::is_alphabetic) {
        Some("must start with a letter")
    } else if !name.chars().all(|c| c.is_alphanumeric() || c == ' ') {
        Some("may only contain letters, digits and spaces")
    } else {
        None
    };
    match problem {
        Some(problem) => Err(StoryError::Configuration(format!(
            "brand name {:?} {}",
            raw, problem
        ))),
        None => Ok(name),
    }
}
