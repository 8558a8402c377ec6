//! `scrivener entities|outline|rollback|forget`: inspect and repair a library.

use std::collections::HashSet;
use std::path::PathBuf;

use scrivener_core::Stamp;

use super::{load_config, open_library};

pub async fn entities(
    dir: Option<PathBuf>,
    names: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let library = open_library(dir, &config)?;

    let filter: HashSet<String> = names.into_iter().collect();
    let views = library
        .entities()
        .search((!filter.is_empty()).then_some(&filter));

    if views.is_empty() {
        println!("  No entities found.");
        return Ok(());
    }

    println!("📚 Entities ({})", views.len());
    println!("=============");
    for view in views {
        if view.tags.is_empty() {
            println!("  {}: {}", view.name, view.summary);
        } else {
            println!("  {} [{}]: {}", view.name, view.tags.join(", "), view.summary);
        }
    }
    Ok(())
}

pub async fn outline(dir: Option<PathBuf>, count: usize) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let library = open_library(dir, &config)?;

    let (summaries, linked) = library.outline().get_recent(count);
    if summaries.is_empty() {
        println!("  No outlines yet.");
        return Ok(());
    }

    println!("🗂️  Recent outlines");
    println!("==================");
    for (summary, entities) in summaries.iter().zip(&linked) {
        println!("\n  #{} {}", summary.id, summary.title);
        for line in summary.summary.lines() {
            println!("    {line}");
        }
        if !entities.is_empty() {
            println!("    Entities: {}", entities.join(", "));
        }
    }
    println!();
    Ok(())
}

pub async fn rollback(dir: Option<PathBuf>, stamp: &str) -> Result<(), Box<dyn std::error::Error>> {
    let cutoff = Stamp::parse(stamp)?;
    let config = load_config()?;
    let mut library = open_library(dir, &config)?;

    let dropped = library.entities_mut().rollback(&cutoff);
    if dropped == 0 {
        println!("  Nothing stamped after {cutoff}.");
    } else {
        println!("✅ Dropped {dropped} entity fact(s) stamped after {cutoff}");
    }
    Ok(())
}

pub async fn forget(dir: Option<PathBuf>, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let mut library = open_library(dir, &config)?;

    if library.entities_mut().delete(name)? {
        println!("✅ Forgot {name}");
    } else {
        println!("⚠️  No entity named {name}");
    }
    Ok(())
}
