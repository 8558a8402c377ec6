//! Prompt assembly.
//!
//! A first draft is built from optional context blocks (synopsis, recent
//! outlines, known entities, the chapter outline) followed by the user's
//! request and the task instructions. A revision prompt carries the numbered
//! draft, the feedback, and the edit-instruction protocol.

use scrivener_store::{EntityView, OutlineSummary};

use crate::state::TaskKind;

const SYNOPSIS_TASK: &str = "\
# Task
Write the master synopsis of a novel with the care of a professional author.

Take the genre, intended length and any partial synopsis from the user request
and follow them strictly; infer whatever is missing.

Cover:
1. The world: era, places, social rules.
2. Escalating conflicts that drive the story, planned per major arc, with
   seeded mysteries, interleaved plot lines and foreshadowing that pays off.
3. The main characters: personality, motivation, contradictions, arcs,
   allegiances and how their relationships change.
4. Three to five themes and how the plot and characters carry them.
5. A final consistency check of timeline and setting.

Output plain text only. Do not assign events to specific chapters. Do not add
questions or suggestions.
";

const CHARACTERS_TASK: &str = "\
# Task
Design a character from the user request. Main characters need depth, a clear
narrative role and a believable arc; minor characters may be simpler.

Cover:
1. Full name, aliases, age, sex, appearance that fits the personality, era.
2. Core traits, outward manner versus inner nature, moral stance, habits.
3. Archetype, relationships to the core cast, the conflicts they trigger.
4. Arc from initial state through turning points to the final state, and
   what the character symbolizes.

Output plain text only.
";

const OUTLINE_TASK: &str = "\
# Task
Write the outline of the next chapter, strictly following the user request.

Include the chapter title on the first line, then 1-2 key plot beats, 1-2
scenes worth describing in detail, and how the main characters act and
relate. Tell it in story order. Keep it to what fits in about 5000 words.
Do not contradict the synopsis, continue naturally from the previous
outlines, and do not reveal later chapters.
";

const CHAPTER_TASK: &str = "\
# Task
Expand the chapter outline into a full chapter.

1. Follow the user request on length and style.
2. Follow the plot of the chapter outline.
3. Do not contradict the known entities.
4. Describe places, looks and atmosphere in detail; keep dialogue natural and
   true to each character.
5. Default length 2000-4000 words.

Output plain text only, nothing but the chapter.
";

const SYNOPSIS_CONSTRAINT: &str = "\
# Synopsis
Everything you write must stay consistent with this synopsis: its timeline,
geography, social rules, characters and their relationships, main plot,
foreshadowing and themes.
";

const OUTLINES_CONSTRAINT: &str = "\
# Previous chapter outlines
Continue from these: keep plot threads, character development, emotional
lines, props and timeline consistent.
";

const ENTITIES_CONSTRAINT: &str = "\
# Known entities
Characters keep their personality, abilities and history; places, organizations
and items keep their properties. Do not contradict them.
";

/// Edit-instruction protocol appended to every revision prompt.
const REVISION_PROTOCOL: &str = "\
# Task
The draft above is a {kind}. Revise it as the user asks.

Each draft line is shown as `<index>.<text>` with the index counting from 0.
Do not rewrite the draft. Reply only with edit instructions, one per line,
addressing lines by number counting from 1 (the line shown as `0.` is line 1):

  <line>.mod.<replacement text>     replace that line
  <line>.add.<new text>             insert a new line before that line
  <line>.del.                       delete that line

Use a line number one past the last line to append at the end.
";

/// Classification prompt: the reply must be a single code.
const CLASSIFY: &str = "\
# Task
Decide which action best matches the user input.

0. Write the novel's synopsis: the user gives a premise, genre or asks for the
   overall framework.
1. Design a character: the user describes or asks for a character.
2. Write a chapter outline: the user asks to continue the story with a new
   chapter plan.
3. Write a chapter from the outline in the input: the input contains the
   chapter outline to expand.
4. Write a chapter from the stored outline: the user asks for a chapter but
   gives no outline.
5. Anything else.

# User input
{text}

Reply with the number only.
";

const EXTRACT: &str = r#"# Task
Identify the named entities in the text and summarize each in one sentence.

Entity types:
- persons: character names (resolve nicknames to one canonical name)
- locations: named places that matter to the story
- organizations: named groups or institutions
- items: named or significant objects (not everyday things)

# Text
{text}

Reply with JSON only, exactly this shape:
{"entities": {"persons": [{"name": "...", "summary": "..."}], "locations": [], "organizations": [], "items": []}, "text_summary": "one sentence"}
"#;

/// Context for a first draft. Empty fields are left out of the prompt.
#[derive(Debug, Default)]
pub struct DraftContext<'a> {
    pub synopsis: Option<&'a str>,
    pub recent_outlines: &'a [OutlineSummary],
    pub entities: &'a [EntityView],
    pub chapter_outline: Option<&'a str>,
    pub request: &'a str,
}

pub fn first_draft(kind: TaskKind, ctx: &DraftContext<'_>) -> String {
    let mut prompt = String::new();

    if let Some(synopsis) = ctx.synopsis.filter(|s| !s.trim().is_empty()) {
        section(&mut prompt, SYNOPSIS_CONSTRAINT, synopsis);
    }

    if !ctx.recent_outlines.is_empty() {
        let body = ctx
            .recent_outlines
            .iter()
            .map(|o| format!("{}. {}\n{}", o.id, o.title, o.summary))
            .collect::<Vec<_>>()
            .join("\n\n");
        section(&mut prompt, OUTLINES_CONSTRAINT, &body);
    }

    if !ctx.entities.is_empty() {
        section(&mut prompt, ENTITIES_CONSTRAINT, &render_entities(ctx.entities));
    }

    if let Some(outline) = ctx.chapter_outline {
        section(&mut prompt, "# Chapter outline\n", outline);
    }

    if !ctx.request.trim().is_empty() {
        section(&mut prompt, "# User request\n", ctx.request);
    }

    prompt.push_str(match kind {
        TaskKind::Synopsis => SYNOPSIS_TASK,
        TaskKind::Characters => CHARACTERS_TASK,
        TaskKind::Outline => OUTLINE_TASK,
        TaskKind::Chapter => CHAPTER_TASK,
    });
    prompt
}

/// Ask for edit instructions against the numbered view of the draft.
pub fn revision(kind: TaskKind, numbered_draft: &str, feedback: &str) -> String {
    let mut prompt = String::new();
    section(&mut prompt, "# Draft\n", numbered_draft);
    section(&mut prompt, "# User request\n", feedback);
    prompt.push_str(&REVISION_PROTOCOL.replace("{kind}", kind.describe()));
    prompt
}

pub fn classify(text: &str) -> String {
    CLASSIFY.replace("{text}", text)
}

pub fn extract_entities(text: &str) -> String {
    EXTRACT.replace("{text}", text)
}

fn render_entities(entities: &[EntityView]) -> String {
    entities
        .iter()
        .map(|e| {
            if e.tags.is_empty() {
                format!("- {}: {}", e.name, e.summary)
            } else {
                format!("- {} ({}): {}", e.name, e.tags.join(", "), e.summary)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn section(prompt: &mut String, header: &str, body: &str) {
    prompt.push_str(header);
    prompt.push('\n');
    prompt.push_str(body.trim_end());
    prompt.push_str("\n\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synopsis_prompt_has_only_request_and_task() {
        let prompt = first_draft(
            TaskKind::Synopsis,
            &DraftContext {
                request: "A wuxia novel, 300k words",
                ..Default::default()
            },
        );
        assert!(prompt.starts_with("# User request"));
        assert!(prompt.contains("A wuxia novel"));
        assert!(prompt.contains("master synopsis"));
        assert!(!prompt.contains("# Synopsis"));
    }

    #[test]
    fn context_blocks_come_before_the_request() {
        let outlines = vec![OutlineSummary {
            id: 2,
            title: "The Duel".into(),
            summary: "Zhang fights Li.".into(),
        }];
        let entities = vec![EntityView {
            name: "张三".into(),
            summary: "a swordsman".into(),
            tags: vec!["person".into()],
        }];
        let prompt = first_draft(
            TaskKind::Outline,
            &DraftContext {
                synopsis: Some("The synopsis text."),
                recent_outlines: &outlines,
                entities: &entities,
                chapter_outline: None,
                request: "next chapter",
            },
        );
        let pos = |needle: &str| prompt.find(needle).unwrap();
        assert!(pos("The synopsis text.") < pos("2. The Duel"));
        assert!(pos("2. The Duel") < pos("- 张三 (person): a swordsman"));
        assert!(pos("a swordsman") < pos("next chapter"));
        assert!(pos("next chapter") < pos("outline of the next chapter"));
    }

    #[test]
    fn blank_synopsis_is_skipped() {
        let prompt = first_draft(
            TaskKind::Chapter,
            &DraftContext {
                synopsis: Some("  \n"),
                chapter_outline: Some("Zhang leaves home."),
                request: "write it",
                ..Default::default()
            },
        );
        assert!(!prompt.contains("# Synopsis"));
        assert!(prompt.contains("# Chapter outline\n\nZhang leaves home."));
    }

    #[test]
    fn revision_prompt_carries_draft_and_protocol() {
        let prompt = revision(TaskKind::Chapter, "0.first\n1.second", "make it darker");
        assert!(prompt.contains("0.first\n1.second"));
        assert!(prompt.contains("make it darker"));
        assert!(prompt.contains("<line>.mod."));
        assert!(prompt.contains("novel chapter"));
    }

    #[test]
    fn classify_and_extract_embed_the_text() {
        assert!(classify("write chapter five").contains("write chapter five"));
        assert!(extract_entities("Zhang met Li.").contains("Zhang met Li."));
    }
}
