//! Storykeep - consistent character and timeline state for long-form narrative authoring
//!
//! The engine keeps:
//! - Character identity data that is generated once and never contradicts itself
//! - A narrative clock and location that only move forward
//! - An append-only ledger of prose tagged with the state it was written under
//! - Persistence of all of it so later chapters rehydrate earlier ones

pub mod application;
pub mod domain;
pub mod infrastructure;
