//! Infrastructure layer - External adapters and implementations
//!
//! This layer contains:
//! - Persistence: in-memory and SQLite document stores
//! - Ollama: LLM integration for filling character fields
//! - Config: Application configuration

pub mod config;
pub mod ollama;
pub mod persistence;
