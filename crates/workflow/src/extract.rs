//! Entity extraction replies.
//!
//! The model is asked for a JSON object but tends to wrap it in prose or a
//! code fence. [`extract_json_object`] digs the object out; anything it
//! cannot recover becomes an empty batch and a warning.

use scrivener_core::Stamp;
use scrivener_store::EntityBatch;
use serde::Deserialize;
use tracing::warn;

/// Extraction reply shape.
#[derive(Debug, Default, Deserialize)]
pub struct Extraction {
    #[serde(default)]
    pub entities: ExtractedEntities,
    #[serde(default)]
    pub text_summary: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExtractedEntities {
    #[serde(default)]
    pub persons: Vec<ExtractedEntity>,
    #[serde(default)]
    pub locations: Vec<ExtractedEntity>,
    #[serde(default)]
    pub organizations: Vec<ExtractedEntity>,
    #[serde(default)]
    pub items: Vec<ExtractedEntity>,
}

#[derive(Debug, Deserialize)]
pub struct ExtractedEntity {
    pub name: String,
    #[serde(default)]
    pub summary: String,
}

impl Extraction {
    /// Parse a model reply. Accepts both `{"entities": {...}}` and a bare
    /// `{"persons": [...], ...}` object.
    pub fn from_reply(reply: &str) -> Option<Self> {
        let value = extract_json_object(reply)?;
        let result = if value.get("entities").is_some() {
            serde_json::from_value::<Extraction>(value)
        } else {
            serde_json::from_value::<ExtractedEntities>(value).map(|entities| Extraction {
                entities,
                text_summary: None,
            })
        };
        match result {
            Ok(extraction) => Some(extraction),
            Err(e) => {
                warn!(error = %e, "Extraction reply has an unexpected shape");
                None
            }
        }
    }

    /// Flatten into a batch, tagging each row with its category.
    pub fn into_batch(self, stamp: Stamp) -> EntityBatch {
        let ExtractedEntities {
            persons,
            locations,
            organizations,
            items,
        } = self.entities;

        let mut batch = EntityBatch::new();
        for (tag, group) in [
            ("person", persons),
            ("location", locations),
            ("organization", organizations),
            ("item", items),
        ] {
            for entity in group {
                let name = entity.name.trim();
                if name.is_empty() {
                    continue;
                }
                batch.push(name, entity.summary.trim(), tag);
            }
        }
        batch.stamped(stamp)
    }
}

/// Turn a model reply into an entity batch. Never fails: an unreadable reply
/// gives an empty batch.
pub fn batch_from_reply(reply: &str, stamp: Stamp) -> EntityBatch {
    match Extraction::from_reply(reply) {
        Some(extraction) => extraction.into_batch(stamp),
        None => {
            warn!(reply_chars = reply.chars().count(), "No entities could be extracted");
            EntityBatch::new()
        }
    }
}

/// Find a JSON object in `text`.
///
/// Tries, in order: the whole text, the body of a fenced code block, the
/// first balanced `{...}` span, and that span with single quotes swapped for
/// double quotes.
pub fn extract_json_object(text: &str) -> Option<serde_json::Value> {
    if let Some(v) = parse_object(text) {
        return Some(v);
    }

    let body = fenced_block(text).unwrap_or(text);
    if let Some(v) = parse_object(body) {
        return Some(v);
    }

    let span = balanced_span(body)?;
    parse_object(span).or_else(|| parse_object(&span.replace('\'', "\"")))
}

fn parse_object(text: &str) -> Option<serde_json::Value> {
    serde_json::from_str::<serde_json::Value>(text.trim())
        .ok()
        .filter(|v| v.is_object())
}

/// Body of the first ```` ``` ```` or `'''` fenced block, language tag skipped.
fn fenced_block(text: &str) -> Option<&str> {
    for fence in ["```", "'''"] {
        let Some(start) = text.find(fence) else {
            continue;
        };
        let rest = &text[start + fence.len()..];
        // Skip a language tag like `json` up to the end of the line.
        let rest = match rest.find('\n') {
            Some(nl) if rest[..nl].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
                &rest[nl + 1..]
            }
            _ => rest.trim_start_matches("json"),
        };
        if let Some(end) = rest.find(fence) {
            return Some(&rest[..end]);
        }
    }
    None
}

/// The first `{` and its matching `}`, skipping braces inside strings.
fn balanced_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
