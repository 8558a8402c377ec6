//! `scrivener write`: interactive draft-and-revise session.
//!
//! Each request runs as one unit of work: the first input is routed to a
//! task and drafted, later inputs revise the draft until it is accepted or
//! cancelled. A finished unit of work is replaced by a fresh one.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use scrivener_config::AppConfig;
use scrivener_core::Provider;
use scrivener_providers::OpenAiCompatProvider;
use scrivener_workflow::{Commit, RevisionWorkflow, TurnOutcome, WorkflowSettings, WorkflowState};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use super::{load_config, open_library};
use crate::ui::Style;

pub async fn run(dir: Option<PathBuf>, style: Style) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;

    let Some(api_key) = config.api_key.clone() else {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    SCRIVENER_API_KEY=sk-...");
        eprintln!("    OPENAI_API_KEY=sk-...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_path().display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    };

    let library = open_library(dir, &config)?;
    let provider = Arc::new(OpenAiCompatProvider::new("openai", &config.api_url, api_key));
    let settings = WorkflowSettings::from_config(&config);

    if !endpoint_reachable(provider.as_ref()).await {
        eprintln!("  ⚠️  {} did not answer a health check; requests may fail.", provider.base_url());
    }

    println!();
    println!("  Scrivener: Interactive Session");
    println!("  ==============================");
    println!();
    println!("  Library:   {}", library.dir().display());
    println!("  Model:     {}", config.model);
    println!("  Endpoint:  {}", provider.base_url());
    println!(
        "  Stored:    {} entities, {} outlines, synopsis {}",
        library.entities().len(),
        library.outline().len(),
        if library.has_synopsis() { "present" } else { "missing" }
    );
    println!();
    println!(
        "  Describe what to write. Reply with feedback to revise, {:?} to accept,",
        config.revision.accept_sentinels
    );
    println!(
        "  {:?} to save and stop. Ctrl+D exits.",
        config.revision.cancel_sentinels
    );
    println!();

    info!(library = %library.dir().display(), model = %config.model, "Writing session started");
    let mut workflow = RevisionWorkflow::new(provider, library, settings);
    let mut state = WorkflowState::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    prompt(&state)?;
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            prompt(&state)?;
            continue;
        }

        eprint!("  ...");
        let outcome = workflow.turn(&mut state, input).await;
        eprint!("\r     \r");

        match outcome {
            Ok(outcome) => report(&outcome, style),
            Err(e) => eprintln!("  [Error] {e}"),
        }

        if state.is_finalized() {
            state = WorkflowState::new();
        }
        prompt(&state)?;
    }

    println!();
    println!("  Goodbye! 👋");
    println!();
    Ok(())
}

/// Ask the provider whether it is up. Failures are logged, never fatal.
async fn endpoint_reachable(provider: &dyn Provider) -> bool {
    match provider.health_check().await {
        Ok(true) => true,
        Ok(false) => {
            warn!(provider = provider.name(), "Provider health check failed");
            false
        }
        Err(e) => {
            warn!(provider = provider.name(), error = %e, "Provider unreachable");
            false
        }
    }
}

fn prompt(state: &WorkflowState) -> std::io::Result<()> {
    match state.task() {
        Some(task) => print!("  Feedback ({}) > ", task.kind().describe()),
        None => print!("  Request > "),
    }
    std::io::stdout().flush()
}

fn report(outcome: &TurnOutcome, style: Style) {
    println!();
    match outcome {
        TurnOutcome::Drafted { draft } => {
            println!("{}", style.heading("  Draft"));
            for line in draft.lines() {
                println!("  {line}");
            }
        }
        TurnOutcome::Revised { merge } => {
            println!("{}", style.heading("  Changes"));
            for line in style.changelog(merge).lines() {
                println!("  {line}");
            }
            println!("  {}", style.summary(merge));
        }
        TurnOutcome::Finalized { commit, cancelled } => {
            let verb = if *cancelled { "Stopped" } else { "Accepted" };
            println!("✅ {verb}: {}", describe(commit));
        }
        TurnOutcome::Unroutable { reply } => {
            println!("⚠️  Could not tell what to write (model said {:?}). Try rephrasing.", reply.trim());
        }
        TurnOutcome::Refused { intent, reason } => {
            println!("⚠️  Cannot {intent}: {reason}");
        }
    }
    println!();
}

fn describe(commit: &Commit) -> String {
    match commit {
        Commit::Nothing => "nothing to save".into(),
        Commit::Synopsis => "synopsis saved".into(),
        Commit::Entities { recorded } => format!("{recorded} entities recorded"),
        Commit::Outline { id, recorded } => {
            format!("outline #{id} saved, {recorded} entities recorded")
        }
        Commit::Chapter { path, outline_id } => {
            let mut text = match path {
                Some(path) => format!("chapter saved to {}", path.display()),
                None => "chapter could not be saved".into(),
            };
            if let Some(id) = outline_id {
                text.push_str(&format!(", outline #{id} recorded"));
            }
            text
        }
    }
}
