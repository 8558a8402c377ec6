//! Generation provider implementations for Scrivener.
//!
//! All providers implement the `scrivener_core::Provider` trait.

pub mod openai_compat;
pub mod scripted;

pub use openai_compat::OpenAiCompatProvider;
pub use scripted::ScriptedProvider;
