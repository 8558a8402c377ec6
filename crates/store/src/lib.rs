//! Durable record for Scrivener: versioned entities, the outline log, and
//! the project directory that holds them.

pub mod entities;
pub mod library;
pub mod outline;
mod persist;

pub use entities::{Entity, EntityBatch, EntityStore, EntityView};
pub use library::Library;
pub use outline::{OutlineLog, OutlineRecord, OutlineSummary};
