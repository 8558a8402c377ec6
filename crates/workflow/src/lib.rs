//! Revision workflow for Scrivener.
//!
//! One unit of work goes through three phases. The first input is routed to
//! a writing task and produces a draft. Every later input either revises
//! that draft through line-patch instructions or, on an accept or cancel
//! sentinel, commits it into the [`Library`](scrivener_store::Library).
//!
//! The caller owns the [`WorkflowState`] and passes it into each
//! [`RevisionWorkflow::turn`]; there is no hidden per-session state.

pub mod extract;
pub mod intent;
pub mod prompt;
pub mod revision;
pub mod sentinel;
pub mod state;

pub use intent::{ChapterSource, Intent};
pub use revision::{Commit, RevisionWorkflow, TurnOutcome, WorkflowSettings};
pub use sentinel::Sentinels;
pub use state::{ChapterPlan, Phase, Task, TaskKind, WorkflowState};
