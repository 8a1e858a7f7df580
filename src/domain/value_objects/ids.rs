//! Strongly-typed identifiers for domain entities

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::StoryError;

macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

define_id!(StoryElementId);

/// Character identifier, unique within a story
///
/// Authors may pick readable ids ("jessie"); otherwise a UUID is assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(String);

impl CharacterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CharacterId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CharacterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CharacterId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for CharacterId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Story namespace used to scope every persisted key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryId(String);

impl StoryId {
    /// Accepts lowercase ascii letters, digits and single dashes
    pub fn parse(raw: &str) -> Result<Self, StoryError> {
        let valid = !raw.is_empty()
            && !raw.starts_with('-')
            && !raw.ends_with('-')
            && !raw.contains("--")
            && raw
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(StoryError::Configuration(format!(
                "story id {:?} must be a lowercase slug",
                raw
            )))
        }
    }

    /// Derive a slug from a free-form title
    pub fn from_title(title: &str) -> Result<Self, StoryError> {
        let mut slug = String::with_capacity(title.len());
        for c in title.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        }
        while slug.ends_with('-') {
            slug.pop();
        }
        Self::parse(&slug)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_story_id_from_title() {
        let id = StoryId::from_title("The Long Night: Part 2!").unwrap();
        assert_eq!(id.as_str(), "the-long-night-part-2");
    }

    #[test]
    fn test_story_id_rejects_non_slugs() {
        assert!(StoryId::parse("Has Spaces").is_err());
        assert!(StoryId::parse("").is_err());
        assert!(StoryId::parse("double--dash").is_err());
        assert!(StoryId::from_title("!!!").is_err());
        assert!(StoryId::parse("ok-slug-1").is_ok());
    }

    #[test]
    fn test_character_id_serializes_as_plain_string() {
        let id = CharacterId::from("jessie");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"jessie\"");
    }
}
