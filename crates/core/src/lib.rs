//! # Scrivener Core
//!
//! Domain types, traits, and error definitions for Scrivener.
//! This crate has **no I/O**. It defines the domain model that the store,
//! provider, and workflow crates implement against.
//!
//! - [`patch`]: the line-addressed patch engine
//! - [`stamp`]: minute-resolution timestamps and the string-or-list wire shape
//! - [`provider`]: the text-generation collaborator trait
//! - [`error`]: bounded-context error enums

pub mod error;
pub mod patch;
pub mod provider;
pub mod stamp;

// Re-export key types at crate root for ergonomics
pub use error::{ProviderError, StoreError, WorkflowError};
pub use patch::{ChangeEntry, ChangeKind, EditInstruction, EditOp, MergeResult};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use stamp::{OneOrMany, Stamp};
