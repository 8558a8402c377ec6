//! Per-unit-of-work state, owned by the caller and passed into every turn.

use crate::intent::ChapterSource;

/// Coarse phase of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing generated yet; the next input is routed to a task.
    Drafting,
    /// A draft exists; feedback revises it until accepted or cancelled.
    Revising,
    /// Terminal. Start a fresh [`WorkflowState`] for the next request.
    Finalized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Synopsis,
    Characters,
    Outline,
    Chapter,
}

impl TaskKind {
    /// What the draft is, as told to the model.
    pub fn describe(self) -> &'static str {
        match self {
            TaskKind::Synopsis => "novel synopsis",
            TaskKind::Characters => "character design",
            TaskKind::Outline => "chapter outline",
            TaskKind::Chapter => "novel chapter",
        }
    }
}

/// What is being written, with whatever the commit will need later.
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    Synopsis,
    Characters,
    Outline,
    Chapter(ChapterPlan),
}

impl Task {
    pub fn kind(&self) -> TaskKind {
        match self {
            Task::Synopsis => TaskKind::Synopsis,
            Task::Characters => TaskKind::Characters,
            Task::Outline => TaskKind::Outline,
            Task::Chapter(_) => TaskKind::Chapter,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChapterPlan {
    pub source: ChapterSource,
    /// The outline the chapter expands.
    pub outline: String,
    /// Entities the outline refers to.
    pub entity_names: Vec<String>,
}

#[derive(Debug, Clone, Default)]
enum Stage {
    #[default]
    Drafting,
    Revising {
        task: Task,
        draft: String,
    },
    Finalized,
}

/// The single live draft of one unit of work.
#[derive(Debug, Clone, Default)]
pub struct WorkflowState {
    stage: Stage,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        match self.stage {
            Stage::Drafting => Phase::Drafting,
            Stage::Revising { .. } => Phase::Revising,
            Stage::Finalized => Phase::Finalized,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.phase() == Phase::Finalized
    }

    pub fn task(&self) -> Option<&Task> {
        match &self.stage {
            Stage::Revising { task, .. } => Some(task),
            _ => None,
        }
    }

    /// The cached draft. `None` outside of `Revising`.
    pub fn draft(&self) -> Option<&str> {
        match &self.stage {
            Stage::Revising { draft, .. } => Some(draft),
            _ => None,
        }
    }

    pub(crate) fn begin(&mut self, task: Task, draft: String) {
        self.stage = Stage::Revising { task, draft };
    }

    pub(crate) fn replace_draft(&mut self, text: String) {
        if let Stage::Revising { draft, .. } = &mut self.stage {
            *draft = text;
        }
    }

    /// Enter `Finalized`, dropping the task and draft.
    pub(crate) fn finish(&mut self) {
        self.stage = Stage::Finalized;
    }
}
