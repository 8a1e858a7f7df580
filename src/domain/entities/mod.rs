//! Domain entities - Core business objects with identity

mod brand_registry;
mod chapter_rewind;
mod character;
mod name_registry;
mod story_element;
mod story_metadata;
mod timeline_cursor;

pub use brand_registry::{validate_brand_name, Brand, BrandRegistry};
pub use chapter_rewind::ChapterRewind;
pub use character::{
    AttributeFilter, Character, CharacterName, GenerationStrategy, Relationship,
};
pub use name_registry::{NameRegistry, OwnerSlot};
pub use story_element::StoryElement;
pub use story_metadata::StoryMetadata;
pub use timeline_cursor::{format_instant, TimelineCursor, DEFAULT_TIME_FORMAT};
