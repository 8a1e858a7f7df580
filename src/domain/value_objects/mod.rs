//! Value objects - Immutable objects defined by their attributes

mod attribute;
mod ids;
mod name_corpus;
mod pronouns;
mod resolution;
mod seed;
mod story_duration;

pub use attribute::AttributeValue;
pub use ids::*;
pub use name_corpus::{
    NameKind, AGE_RANGE, BRAND_PREFIXES, BRAND_SUFFIXES, FIRST_NAMES, LAST_NAMES,
    MAX_MIDDLE_NAMES, MIDDLE_NAMES, OCCUPATIONS,
};
pub use pronouns::{PronounCategory, PronounForm, PronounSet, PronounSpec};
pub use resolution::Resolution;
pub use seed::{seeded_rng, stable_seed};
pub use story_duration::StoryDuration;
