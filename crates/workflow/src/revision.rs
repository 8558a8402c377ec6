//! The revision state machine.
//!
//! ```text
//! Drafting --(routed request)--> Revising --(feedback)--> Revising
//!     |                             |
//!     +--(cancel)--+   +--(accept | cancel)
//!                  v   v
//!                Finalized   (commit into the library, draft dropped)
//! ```
//!
//! Feedback that is neither an accept nor a cancel sentinel always means
//! "keep revising". Each revision asks the model for line-patch
//! instructions against the numbered draft and merges them.

use scrivener_config::AppConfig;
use scrivener_core::patch::{merge, numbered_view, parse_instructions};
use scrivener_core::{
    ChangeKind, MergeResult, Provider, ProviderError, ProviderRequest, Stamp, WorkflowError,
};
use scrivener_store::{EntityBatch, Library};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::extract::batch_from_reply;
use crate::intent::{ChapterSource, Intent};
use crate::prompt::{self, DraftContext};
use crate::sentinel::Sentinels;
use crate::state::{ChapterPlan, Phase, Task, WorkflowState};

/// Generation and routing knobs.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub model: String,
    /// Temperature for drafts and revisions. Routing and extraction use 0.
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// How many recent outlines are given as context.
    pub outline_window: usize,
    pub sentinels: Sentinels,
}

impl WorkflowSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            outline_window: 3,
            sentinels: Sentinels::default(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: Some(config.max_tokens),
            outline_window: config.library.outline_window,
            sentinels: Sentinels::new(
                &config.revision.accept_sentinels,
                &config.revision.cancel_sentinels,
            ),
        }
    }
}

/// What a turn did.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// A fresh draft was generated; the state is now `Revising`.
    Drafted { draft: String },
    /// Feedback was merged into the draft.
    Revised { merge: MergeResult },
    /// The draft was committed and the state is `Finalized`.
    Finalized { commit: Commit, cancelled: bool },
    /// The request matched no task. Nothing changed; ask again.
    Unroutable { reply: String },
    /// The task cannot run against this library yet. Nothing changed.
    Refused { intent: Intent, reason: String },
}

/// What finalizing wrote to the library.
#[derive(Debug, Clone, PartialEq)]
pub enum Commit {
    Nothing,
    Synopsis,
    Entities {
        recorded: usize,
    },
    Outline {
        id: u64,
        recorded: usize,
    },
    Chapter {
        path: Option<PathBuf>,
        outline_id: Option<u64>,
    },
}

pub struct RevisionWorkflow {
    provider: Arc<dyn Provider>,
    library: Library,
    settings: WorkflowSettings,
}

impl RevisionWorkflow {
    pub fn new(provider: Arc<dyn Provider>, library: Library, settings: WorkflowSettings) -> Self {
        Self {
            provider,
            library,
            settings,
        }
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut Library {
        &mut self.library
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Feed one user input into the unit of work held by `state`.
    ///
    /// On error the state is left as it was, so the same input can be
    /// retried.
    pub async fn turn(
        &mut self,
        state: &mut WorkflowState,
        input: &str,
    ) -> Result<TurnOutcome, WorkflowError> {
        if state.is_finalized() {
            return Err(WorkflowError::Finalized);
        }

        if self.settings.sentinels.cancels(input) {
            info!("Cancel requested");
            return self.finalize(state, true).await;
        }

        match state.phase() {
            Phase::Drafting => self.start(state, input).await,
            Phase::Revising if self.settings.sentinels.accepts(input) => {
                info!("Draft accepted");
                self.finalize(state, false).await
            }
            Phase::Revising => self.revise(state, input).await,
            Phase::Finalized => Err(WorkflowError::Finalized),
        }
    }

    async fn start(
        &mut self,
        state: &mut WorkflowState,
        request: &str,
    ) -> Result<TurnOutcome, WorkflowError> {
        let reply = self.ask(prompt::classify(request), 0.0).await?;
        let intent = Intent::parse_reply(&reply);
        info!(%intent, "Request classified");

        let refuse = |reason: &str| -> Result<TurnOutcome, WorkflowError> {
            warn!(%intent, reason, "Task refused");
            Ok(TurnOutcome::Refused {
                intent,
                reason: reason.to_string(),
            })
        };

        let task = match intent {
            Intent::Unroutable => {
                warn!(reply = %reply.trim(), "Request could not be routed");
                return Ok(TurnOutcome::Unroutable { reply });
            }
            Intent::WriteSynopsis => {
                if self.library.has_synopsis() {
                    return refuse(
                        "a synopsis already exists; rewriting it would invalidate existing work, use a fresh library",
                    );
                }
                Task::Synopsis
            }
            Intent::DesignCharacters => {
                if !self.library.has_synopsis() {
                    return refuse("designing characters needs a synopsis first");
                }
                Task::Characters
            }
            Intent::WriteOutline => Task::Outline,
            Intent::WriteChapter(source) => match self.plan_chapter(source, request).await? {
                Some(plan) => Task::Chapter(plan),
                None => return refuse("there is no stored outline to expand"),
            },
        };

        let prompt = self.draft_prompt(&task, request);
        let draft = self.ask(prompt, self.settings.temperature).await?;
        info!(task = ?task.kind(), lines = draft.lines().count(), "Draft generated");

        state.begin(task, draft.clone());
        Ok(TurnOutcome::Drafted { draft })
    }

    async fn plan_chapter(
        &self,
        source: ChapterSource,
        request: &str,
    ) -> Result<Option<ChapterPlan>, WorkflowError> {
        match source {
            ChapterSource::FromLatestOutline => {
                let Some(latest) = self.library.outline().latest() else {
                    return Ok(None);
                };
                Ok(Some(ChapterPlan {
                    source,
                    outline: format!("{}\n{}", latest.title, latest.summary),
                    entity_names: latest.linked_entities.clone(),
                }))
            }
            ChapterSource::FromInput => {
                let batch = self.extract(request, Stamp::now()).await?;
                Ok(Some(ChapterPlan {
                    source,
                    outline: request.to_string(),
                    entity_names: distinct(&batch.names),
                }))
            }
        }
    }

    fn draft_prompt(&self, task: &Task, request: &str) -> String {
        let synopsis = Some(self.library.synopsis());
        let entities = self.library.entities();
        match task {
            Task::Synopsis => prompt::first_draft(
                task.kind(),
                &DraftContext {
                    request,
                    ..Default::default()
                },
            ),
            Task::Characters | Task::Outline => {
                let (recent, _) = self.library.outline().get_recent(self.settings.outline_window);
                let known = entities.search(None);
                prompt::first_draft(
                    task.kind(),
                    &DraftContext {
                        synopsis,
                        recent_outlines: &recent,
                        entities: &known,
                        chapter_outline: None,
                        request,
                    },
                )
            }
            Task::Chapter(plan) => {
                let names: HashSet<String> = plan.entity_names.iter().cloned().collect();
                let linked = entities.search(Some(&names));
                prompt::first_draft(
                    task.kind(),
                    &DraftContext {
                        synopsis,
                        recent_outlines: &[],
                        entities: &linked,
                        chapter_outline: Some(&plan.outline),
                        request,
                    },
                )
            }
        }
    }

    async fn revise(
        &mut self,
        state: &mut WorkflowState,
        feedback: &str,
    ) -> Result<TurnOutcome, WorkflowError> {
        let (kind, lines) = match (state.task(), state.draft()) {
            (Some(task), Some(draft)) => (
                task.kind(),
                draft.lines().map(str::to_string).collect::<Vec<_>>(),
            ),
            _ => return self.start(state, feedback).await,
        };

        let prompt = prompt::revision(kind, &numbered_view(&lines), feedback);
        let reply = self.ask(prompt, self.settings.temperature).await?;

        let instructions = parse_instructions(&reply);
        if instructions.is_empty() {
            warn!("Revision reply held no edit instructions, draft unchanged");
        }
        let result = merge(&lines, instructions);
        info!(
            added = result.count(ChangeKind::Added),
            modified = result.count(ChangeKind::Modified),
            deleted = result.count(ChangeKind::Deleted),
            "Draft revised"
        );

        state.replace_draft(result.text());
        Ok(TurnOutcome::Revised { merge: result })
    }

    async fn finalize(
        &mut self,
        state: &mut WorkflowState,
        cancelled: bool,
    ) -> Result<TurnOutcome, WorkflowError> {
        let commit = match (state.task(), state.draft()) {
            (Some(task), Some(draft)) => self.commit(task, draft).await?,
            _ => {
                info!("Nothing to commit");
                Commit::Nothing
            }
        };
        state.finish();
        Ok(TurnOutcome::Finalized { commit, cancelled })
    }

    /// Write the accepted draft into the library. Entities go in before the
    /// outline record so a rejected batch leaves no half-committed outline.
    async fn commit(&mut self, task: &Task, draft: &str) -> Result<Commit, WorkflowError> {
        let stamp = Stamp::now();
        let commit = match task {
            Task::Synopsis => {
                self.library.save_synopsis(draft);
                Commit::Synopsis
            }
            Task::Characters => {
                let batch = self.extract(draft, stamp).await?;
                let recorded = batch.len();
                self.library.entities_mut().insert_batch(batch)?;
                Commit::Entities { recorded }
            }
            Task::Outline => {
                let batch = self.extract(draft, stamp.clone()).await?;
                let names = distinct(&batch.names);
                let recorded = batch.len();
                self.library.entities_mut().insert_batch(batch)?;
                let id = self
                    .library
                    .outline_mut()
                    .append(&title_of(draft), draft, names, stamp);
                Commit::Outline { id, recorded }
            }
            Task::Chapter(plan) => {
                let outline_id = (plan.source == ChapterSource::FromInput).then(|| {
                    self.library.outline_mut().append(
                        &title_of(&plan.outline),
                        &plan.outline,
                        plan.entity_names.clone(),
                        stamp.clone(),
                    )
                });
                let path = self.library.save_chapter(draft, &stamp);
                Commit::Chapter { path, outline_id }
            }
        };
        info!(?commit, "Committed");
        Ok(commit)
    }

    async fn extract(&self, text: &str, stamp: Stamp) -> Result<EntityBatch, ProviderError> {
        let reply = self.ask(prompt::extract_entities(text), 0.0).await?;
        let batch = batch_from_reply(&reply, stamp);
        debug!(entities = batch.len(), "Entities extracted");
        Ok(batch)
    }

    async fn ask(&self, prompt: String, temperature: f32) -> Result<String, ProviderError> {
        let mut request =
            ProviderRequest::new(self.settings.model.clone(), prompt).with_temperature(temperature);
        if let Some(max_tokens) = self.settings.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        debug!(provider = self.provider.name(), model = %request.model, "Asking provider");
        let response = self.provider.complete(request).await?;
        Ok(response.content)
    }
}

/// First non-empty line, without markdown heading marks.
fn title_of(text: &str) -> String {
    text.lines()
        .map(|l| l.trim().trim_start_matches('#').trim())
        .find(|l| !l.is_empty())
        .unwrap_or("Untitled")
        .to_string()
}

fn distinct(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .filter(|n| seen.insert(n.as_str()))
        .cloned()
        .collect()
}
