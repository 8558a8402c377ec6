//! `scrivener patch`: apply edit instructions to a file without a model.

use std::path::Path;

use scrivener_core::patch;

use crate::ui::Style;

pub async fn run(
    file: &Path,
    instructions: &Path,
    write: bool,
    style: Style,
) -> Result<(), Box<dyn std::error::Error>> {
    let original = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let edits = std::fs::read_to_string(instructions)
        .map_err(|e| format!("Failed to read {}: {e}", instructions.display()))?;

    let merge = patch::apply(&original, &edits);

    eprintln!("{}", style.heading("Changelog"));
    eprintln!("{}", style.changelog(&merge));
    eprintln!("{}", style.summary(&merge));

    let mut merged = merge.text();
    if original.ends_with('\n') {
        merged.push('\n');
    }

    if write {
        std::fs::write(file, merged)?;
        eprintln!("✅ Wrote {}", file.display());
    } else {
        print!("{merged}");
    }
    Ok(())
}
