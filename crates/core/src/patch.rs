//! Line-addressed patch engine.
//!
//! A draft is revised by a block of edit instructions, one per line:
//!
//! ```text
//! <line>.mod.<replacement>
//! <line>.add.<inserted line>
//! <line>.del.
//! ```
//!
//! Line numbers are 1-based and always refer to the *original* draft, never
//! to the result of earlier instructions. Lines that do not follow the
//! grammar are dropped while parsing: the instruction text comes from a
//! language model and routinely carries commentary around the edits.
//!
//! [`merge`] walks the original lines and the sorted instructions with two
//! cursors in a single pass. It never fails.

use std::cmp::Ordering;
use std::fmt;

/// What an instruction does to its target line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    /// Replace the target line.
    Modify(String),
    /// Insert a new line before the target line.
    Insert(String),
    /// Remove the target line.
    Delete,
}

/// A single edit addressed to a 1-based line of the original draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditInstruction {
    pub line: usize,
    pub op: EditOp,
}

impl EditInstruction {
    pub fn modify(line: usize, content: impl Into<String>) -> Self {
        Self {
            line,
            op: EditOp::Modify(content.into()),
        }
    }

    pub fn insert(line: usize, content: impl Into<String>) -> Self {
        Self {
            line,
            op: EditOp::Insert(content.into()),
        }
    }

    pub fn delete(line: usize) -> Self {
        Self {
            line,
            op: EditOp::Delete,
        }
    }

    /// Parse one `<line>.<op>.<content>` instruction.
    ///
    /// Returns `None` for anything off-grammar: a non-numeric line field,
    /// fewer than three dot-separated segments, or an unknown op. Content
    /// may itself contain dots; only the first two separate fields.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let mut parts = raw.splitn(3, '.');
        let number = parts.next()?.trim();
        let op = parts.next()?.trim();
        let content = parts.next()?.trim();

        if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let line = number.parse::<usize>().ok()?;

        let op = match op {
            "mod" => EditOp::Modify(content.to_string()),
            "add" => EditOp::Insert(content.to_string()),
            "del" => EditOp::Delete,
            _ => return None,
        };

        Some(Self { line, op })
    }
}

/// Parse every well-formed instruction in a block of text, in encounter order.
pub fn parse_instructions(text: &str) -> Vec<EditInstruction> {
    text.lines().filter_map(EditInstruction::parse).collect()
}

/// How a changelog entry relates to the original draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Original,
    Added,
    Modified,
    Deleted,
}

impl ChangeKind {
    pub fn label(self) -> &'static str {
        match self {
            ChangeKind::Original => "org",
            ChangeKind::Added => "add",
            ChangeKind::Modified => "mod",
            ChangeKind::Deleted => "del",
        }
    }
}

/// One annotated line of the changelog.
///
/// `applied` is false for entries that were recorded for audit but had no
/// effect on the merged output: deletions past the end of the draft, and
/// `mod`/`del` instructions addressed to a line the walk had already passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEntry {
    pub line: usize,
    pub kind: ChangeKind,
    pub text: String,
    pub applied: bool,
}

impl ChangeEntry {
    fn applied(line: usize, kind: ChangeKind, text: impl Into<String>) -> Self {
        Self {
            line,
            kind,
            text: text.into(),
            applied: true,
        }
    }

    fn skipped(line: usize, kind: ChangeKind, text: impl Into<String>) -> Self {
        Self {
            line,
            kind,
            text: text.into(),
            applied: false,
        }
    }
}

impl fmt::Display for ChangeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {}", self.line, self.kind.label(), self.text)?;
        if !self.applied {
            f.write_str(" (skipped)")?;
        }
        Ok(())
    }
}

/// The merged draft and the changelog describing how it was produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeResult {
    pub merged: Vec<String>,
    pub changelog: Vec<ChangeEntry>,
}

impl MergeResult {
    /// The merged lines joined with `\n`.
    pub fn text(&self) -> String {
        self.merged.join("\n")
    }

    /// The changelog rendered one entry per line.
    pub fn changelog_text(&self) -> String {
        self.changelog
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Number of changelog entries of the given kind.
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changelog.iter().filter(|e| e.kind == kind).count()
    }

    fn keep(&mut self, line: usize, text: &str) {
        self.merged.push(text.to_string());
        self.changelog
            .push(ChangeEntry::applied(line, ChangeKind::Original, text));
    }
}

/// Merge `instructions` into `original`.
///
/// Instructions are stably sorted by line number, so two instructions on the
/// same line apply in the order they were given: the first lands on the line,
/// the second finds the walk already past it.
pub fn merge<S: AsRef<str>>(original: &[S], mut instructions: Vec<EditInstruction>) -> MergeResult {
    instructions.sort_by_key(|i| i.line);

    let mut result = MergeResult::default();
    let mut orig = 0;
    let mut next = 0;

    loop {
        if next >= instructions.len() {
            for (offset, line) in original[orig..].iter().enumerate() {
                result.keep(orig + offset + 1, line.as_ref());
            }
            break;
        }

        if orig >= original.len() {
            for ins in &instructions[next..] {
                match &ins.op {
                    EditOp::Insert(content) => {
                        result.merged.push(content.clone());
                        result
                            .changelog
                            .push(ChangeEntry::applied(ins.line, ChangeKind::Added, content));
                    }
                    EditOp::Delete => {
                        result
                            .changelog
                            .push(ChangeEntry::skipped(ins.line, ChangeKind::Deleted, ""));
                    }
                    // Nothing left to replace.
                    EditOp::Modify(_) => {}
                }
            }
            break;
        }

        let position = orig + 1;
        let current = original[orig].as_ref();
        let ins = &instructions[next];

        match ins.line.cmp(&position) {
            Ordering::Greater => {
                result.keep(position, current);
                orig += 1;
            }
            Ordering::Equal => {
                match &ins.op {
                    EditOp::Modify(content) => {
                        result.merged.push(content.clone());
                        result
                            .changelog
                            .push(ChangeEntry::applied(position, ChangeKind::Original, current));
                        result
                            .changelog
                            .push(ChangeEntry::applied(ins.line, ChangeKind::Modified, content));
                    }
                    EditOp::Insert(content) => {
                        result.merged.push(content.clone());
                        result
                            .changelog
                            .push(ChangeEntry::applied(ins.line, ChangeKind::Added, content));
                        result.keep(position, current);
                    }
                    EditOp::Delete => {
                        result
                            .changelog
                            .push(ChangeEntry::applied(ins.line, ChangeKind::Deleted, current));
                    }
                }
                orig += 1;
                next += 1;
            }
            Ordering::Less => {
                // The walk is already past this line. Inserts still land here;
                // anything else is logged without touching the output.
                match &ins.op {
                    EditOp::Insert(content) => {
                        result.merged.push(content.clone());
                        result
                            .changelog
                            .push(ChangeEntry::applied(ins.line, ChangeKind::Added, content));
                    }
                    EditOp::Modify(content) => {
                        result
                            .changelog
                            .push(ChangeEntry::skipped(ins.line, ChangeKind::Modified, content));
                    }
                    EditOp::Delete => {
                        let passed = ins
                            .line
                            .checked_sub(1)
                            .and_then(|i| original.get(i))
                            .map(|l| l.as_ref())
                            .unwrap_or_default();
                        result
                            .changelog
                            .push(ChangeEntry::skipped(ins.line, ChangeKind::Deleted, passed));
                    }
                }
                next += 1;
            }
        }
    }

    result
}

/// Parse `instruction_text` and merge it into the lines of `original`.
pub fn apply(original: &str, instruction_text: &str) -> MergeResult {
    let lines: Vec<&str> = original.lines().collect();
    merge(&lines, parse_instructions(instruction_text))
}

/// Render a draft as `<0-based index>.<line>` rows joined by newlines.
///
/// This is the context view handed to the model when asking for revisions.
pub fn numbered_view<S: AsRef<str>>(lines: &[S]) -> String {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{i}.{}", line.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(result: &MergeResult) -> Vec<ChangeKind> {
        result.changelog.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn empty_instructions_are_identity() {
        let original = ["A", "B", "C"];
        let result = merge(&original, vec![]);
        assert_eq!(result.merged, vec!["A", "B", "C"]);
        assert_eq!(kinds(&result), vec![ChangeKind::Original; 3]);
        assert_eq!(result.changelog[2].line, 3);
    }

    #[test]
    fn insert_lands_before_anchor() {
        let result = merge(&["A", "B"], vec![EditInstruction::insert(1, "X")]);
        assert_eq!(result.merged, vec!["X", "A", "B"]);
        assert_eq!(
            kinds(&result),
            vec![ChangeKind::Added, ChangeKind::Original, ChangeKind::Original]
        );
    }

    #[test]
    fn modify_preserves_length() {
        let result = merge(&["A", "B", "C"], vec![EditInstruction::modify(2, "B2")]);
        assert_eq!(result.merged, vec!["A", "B2", "C"]);
        assert_eq!(result.changelog[1].to_string(), "2:org B");
        assert_eq!(result.changelog[2].to_string(), "2:mod B2");
        assert_eq!(result.count(ChangeKind::Modified), 1);
    }

    #[test]
    fn delete_drops_exactly_one_line() {
        let result = merge(&["A", "B", "C"], vec![EditInstruction::delete(2)]);
        assert_eq!(result.merged, vec!["A", "C"]);
        assert_eq!(result.changelog[1].to_string(), "2:del B");
    }

    #[test]
    fn instructions_are_sorted_before_merging() {
        let result = merge(
            &["A", "B", "C"],
            vec![EditInstruction::insert(3, "Z"), EditInstruction::modify(1, "Y")],
        );
        assert_eq!(result.merged, vec!["Y", "B", "Z", "C"]);
    }

    #[test]
    fn duplicate_target_first_wins_second_is_stale() {
        let result = merge(
            &["A", "B", "C"],
            vec![EditInstruction::modify(2, "X"), EditInstruction::delete(2)],
        );
        assert_eq!(result.merged, vec!["A", "X", "C"]);
        let stale = result
            .changelog
            .iter()
            .find(|e| e.kind == ChangeKind::Deleted)
            .unwrap();
        assert!(!stale.applied);
        assert_eq!(stale.to_string(), "2:del B (skipped)");
    }

    #[test]
    fn duplicate_inserts_both_land_in_order() {
        let result = merge(
            &["A", "B", "C"],
            vec![EditInstruction::insert(2, "X"), EditInstruction::insert(2, "Y")],
        );
        // The second insert is stale but inserts are always honoured.
        assert_eq!(result.merged, vec!["A", "X", "B", "Y", "C"]);
    }

    #[test]
    fn stale_modify_is_logged_not_applied() {
        let result = merge(
            &["A", "B"],
            vec![EditInstruction::delete(1), EditInstruction::modify(1, "late")],
        );
        assert_eq!(result.merged, vec!["B"]);
        let late = &result.changelog[1];
        assert_eq!(late.kind, ChangeKind::Modified);
        assert!(!late.applied);
    }

    #[test]
    fn past_end_add_appends_and_del_is_audited() {
        let result = merge(
            &["A"],
            vec![
                EditInstruction::insert(5, "tail"),
                EditInstruction::delete(7),
                EditInstruction::modify(9, "ignored"),
            ],
        );
        assert_eq!(result.merged, vec!["A", "tail"]);
        assert_eq!(
            kinds(&result),
            vec![ChangeKind::Original, ChangeKind::Added, ChangeKind::Deleted]
        );
        assert!(!result.changelog[2].applied);
    }

    #[test]
    fn merge_into_empty_draft() {
        let result = merge::<&str>(&[], vec![EditInstruction::insert(1, "first")]);
        assert_eq!(result.merged, vec!["first"]);
    }

    #[test]
    fn line_zero_insert_goes_first() {
        let result = merge(&["A", "B"], vec![EditInstruction::insert(0, "pre")]);
        assert_eq!(result.merged, vec!["pre", "A", "B"]);
    }

    #[test]
    fn parse_accepts_the_three_ops() {
        assert_eq!(
            EditInstruction::parse("3.mod.New text"),
            Some(EditInstruction::modify(3, "New text"))
        );
        assert_eq!(
            EditInstruction::parse(" 2.add.Inserted "),
            Some(EditInstruction::insert(2, "Inserted"))
        );
        assert_eq!(EditInstruction::parse("5.del."), Some(EditInstruction::delete(5)));
    }

    #[test]
    fn parse_keeps_dots_in_content() {
        let ins = EditInstruction::parse("1.mod.He paused. Then he spoke.").unwrap();
        assert_eq!(ins.op, EditOp::Modify("He paused. Then he spoke.".into()));
    }

    #[test]
    fn parse_drops_off_grammar_lines() {
        assert_eq!(EditInstruction::parse(""), None);
        assert_eq!(EditInstruction::parse("Here are the edits:"), None);
        assert_eq!(EditInstruction::parse("5.del"), None);
        assert_eq!(EditInstruction::parse("x.mod.text"), None);
        assert_eq!(EditInstruction::parse("-1.add.text"), None);
        assert_eq!(EditInstruction::parse("2.replace.text"), None);
        assert_eq!(EditInstruction::parse("99999999999999999999999.add.x"), None);
    }

    #[test]
    fn parse_instructions_filters_commentary() {
        let text = "Sure, here are the changes:\n1.mod.Opening\n\n3.del.\nHope this helps.";
        let parsed = parse_instructions(text);
        assert_eq!(
            parsed,
            vec![EditInstruction::modify(1, "Opening"), EditInstruction::delete(3)]
        );
    }

    #[test]
    fn apply_parses_and_merges() {
        let result = apply("one\ntwo\nthree", "2.mod.TWO\n3.add.two and a half");
        assert_eq!(result.text(), "one\nTWO\ntwo and a half\nthree");
        assert_eq!(
            result.changelog_text(),
            "1:org one\n2:org two\n2:mod TWO\n3:add two and a half\n3:org three"
        );
    }

    #[test]
    fn numbered_view_is_zero_based() {
        assert_eq!(numbered_view(&["a", "b"]), "0.a\n1.b");
        assert_eq!(numbered_view::<&str>(&[]), "");
    }
}
