//! Domain layer - Core story state with no I/O
//!
//! This layer contains:
//! - Entities: Character, NameRegistry, TimelineCursor, StoryElement, StoryMetadata
//! - Value Objects: ids, pronouns, name corpora, durations, resolution state
//! - Errors: the StoryError taxonomy every layer reports through

pub mod entities;
pub mod errors;
pub mod value_objects;
