//! Application services - Use case implementations
//!
//! Each service works on one story through a `PersistenceGateway`, accepting
//! port implementations for the document store and the language model and
//! returning domain entities. `StorySession` composes them for one chapter.

pub mod brand_service;
pub mod character_service;
pub mod generation_service;
pub mod ledger_service;
pub mod name_registry_service;
pub mod persistence_gateway;
pub mod story_session;

pub use brand_service::BrandService;

// Re-export character service types
pub use character_service::{CharacterService, CreateCharacterRequest, RelationshipSelector};

// Re-export generation service types
pub use generation_service::{Candidate, FieldRequest, GenerationService, GenerationSettings};

pub use ledger_service::LedgerService;
pub use name_registry_service::NameRegistryService;
pub use persistence_gateway::{collections, PersistenceGateway};

// Re-export session types
pub use story_session::{SessionAnalytics, SessionConfig, StoryReference, StorySession};
