//! Outbound ports - Interfaces that the application requires from external systems

mod document_store_port;
mod llm_port;

pub use document_store_port::{DocumentKey, DocumentStorePort, PersistenceError, Scope};
pub use llm_port::{ChatMessage, LlmPort, LlmRequest, LlmResponse, MessageRole};
