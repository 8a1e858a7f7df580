//! Timeline cursor - the narrative "now" and "here" of an authoring session
//!
//! The cursor only moves forward through `advance`; `set` may jump anywhere.
//! It is never persisted on its own; each story element snapshots it.

use chrono::{DateTime, Duration, Utc};

use crate::domain::errors::StoryError;
use crate::domain::value_objects::StoryDuration;

/// Clock format used when rendering element times
pub const DEFAULT_TIME_FORMAT: &str = "%I:%M %p";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimelineCursor {
    current_time: Option<DateTime<Utc>>,
    current_location: Option<String>,
}

impl TimelineCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, instant: DateTime<Utc>) {
        self.current_time = Some(instant);
    }

    pub fn set_location(&mut self, label: impl Into<String>) {
        self.current_location = Some(label.into());
    }

    /// Move forward by a natural-language phrase; the cursor is untouched on error
    pub fn advance(&mut self, phrase: &str) -> Result<DateTime<Utc>, StoryError> {
        let current = self.require_time(phrase)?;
        let duration = StoryDuration::parse(phrase)?;
        if !duration.is_positive() {
            return Err(StoryError::InvalidDuration(phrase.to_string()));
        }
        self.step(current, duration.as_duration(), phrase)
    }

    pub fn advance_by(&mut self, duration: Duration) -> Result<DateTime<Utc>, StoryError> {
        let label = format!("{}s", duration.num_seconds());
        let current = self.require_time(&label)?;
        if duration <= Duration::zero() {
            return Err(StoryError::InvalidDuration(label));
        }
        self.step(current, duration, &label)
    }

    pub fn current_time(&self) -> Option<DateTime<Utc>> {
        self.current_time
    }

    pub fn current_location(&self) -> Option<&str> {
        self.current_location.as_deref()
    }

    /// Render the current time with a strftime pattern
    pub fn format(&self, pattern: &str) -> Result<String, StoryError> {
        let current = self.require_time("format")?;
        Ok(format_instant(&current, pattern))
    }

    fn require_time(&self, context: &str) -> Result<DateTime<Utc>, StoryError> {
        self.current_time.ok_or_else(|| {
            StoryError::UninitializedTimeline(format!(
                "set a time before using {:?}",
                context
            ))
        })
    }

    fn step(
        &mut self,
        current: DateTime<Utc>,
        duration: Duration,
        label: &str,
    ) -> Result<DateTime<Utc>, StoryError> {
        let next = current
            .checked_add_signed(duration)
            .ok_or_else(|| StoryError::InvalidDuration(label.to_string()))?;
        self.current_time = Some(next);
        Ok(next)
    }
}

/// strftime rendering that never panics on a malformed pattern
pub fn format_instant(instant: &DateTime<Utc>, pattern: &str) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    if write!(out, "{}", instant.format(pattern)).is_err() {
        out.clear();
        let _ = write!(out, "{}", instant.format(DEFAULT_TIME_FORMAT));
    }
    out
}
