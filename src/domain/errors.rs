//! Story errors - the failure taxonomy shared by every component
//!
//! Each variant names what was being resolved when it failed so the author
//! can tell which character, field or element to look at. Nothing here is
//! retried automatically except generation parsing, and that retry lives in
//! the generation service.

use thiserror::Error;

/// Every failure the engine can surface to a caller
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoryError {
    /// Bad static input (unknown pronoun category, invalid session config, ...)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The text-generation response could not be mapped onto the requested fields
    #[error("could not parse generated {target}: {reason}")]
    GenerationParse { target: String, reason: String },

    /// The text-generation service could not be reached or returned an error
    #[error("text generation failed for {target}: {message}")]
    Generation { target: String, message: String },

    /// A duration phrase did not match any known form
    #[error("unrecognized duration: {0:?}")]
    DurationParse(String),

    /// A duration parsed but was not strictly positive
    #[error("duration must be positive, got {0:?}")]
    InvalidDuration(String),

    /// Every value in a name corpus has already been issued
    #[error("name corpus exhausted for {kind} names ({issued} issued)")]
    Exhaustion { kind: String, issued: usize },

    /// An entity lookup came back empty
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The backing document store could not complete the operation
    #[error("persistence unavailable while {operation}: {message}")]
    PersistenceUnavailable { operation: String, message: String },

    /// The timeline cursor has no current time yet
    #[error("timeline not initialized: {0}")]
    UninitializedTimeline(String),

    /// The timeline cursor has no current location yet
    #[error("location not initialized: {0}")]
    UninitializedLocation(String),
}

impl StoryError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn parse(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::GenerationParse {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Whether a retry with the same input could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::GenerationParse { .. })
    }
}

pub type StoryResult<T> = Result<T, StoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_identify_their_target() {
        let err = StoryError::not_found("character", "jessie");
        assert_eq!(err.to_string(), "character not found: jessie");

        let err = StoryError::parse("attribute 'age' of jessie", "no JSON object");
        assert!(err.to_string().contains("attribute 'age' of jessie"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_only_parse_errors_are_retryable() {
        assert!(!StoryError::Configuration("x".into()).is_retryable());
        assert!(!StoryError::DurationParse("soon".into()).is_retryable());
        assert!(!StoryError::Exhaustion {
            kind: "last".into(),
            issued: 3
        }
        .is_retryable());
    }
}
