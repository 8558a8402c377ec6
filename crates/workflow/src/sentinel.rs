//! Accept and cancel sentinels in user feedback.
//!
//! Matching is case-insensitive. An ASCII-alphanumeric sentinel such as
//! `ok` must stand alone (`"ok, ship it"` matches, `"look again"` does not);
//! any other sentinel such as `退出` matches as a plain substring.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentinels {
    accept: Vec<String>,
    cancel: Vec<String>,
}

impl Sentinels {
    pub fn new<I, S>(accept: I, cancel: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let norm = |items: I| {
            items
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect::<Vec<String>>()
        };
        Self {
            accept: norm(accept),
            cancel: norm(cancel),
        }
    }

    pub fn accepts(&self, feedback: &str) -> bool {
        let text = feedback.to_lowercase();
        self.accept.iter().any(|s| contains_sentinel(&text, s))
    }

    pub fn cancels(&self, feedback: &str) -> bool {
        let text = feedback.to_lowercase();
        self.cancel.iter().any(|s| contains_sentinel(&text, s))
    }
}

impl Default for Sentinels {
    fn default() -> Self {
        Self::new(vec!["ok"], vec!["quit", "退出"])
    }
}

fn contains_sentinel(text: &str, sentinel: &str) -> bool {
    if !sentinel.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return text.contains(sentinel);
    }

    text.match_indices(sentinel).any(|(start, m)| {
        let before = text[..start].chars().next_back();
        let after = text[start + m.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_alphanumeric())
            && !after.is_some_and(|c| c.is_ascii_alphanumeric())
    })
}
