//! Routing a free-text request to one writing task.
//!
//! The classifier reply is expected to carry a single code 0-5. Anything
//! else, including code 5 ("something else"), is [`Intent::Unroutable`].

use std::fmt;

/// Where a chapter's outline comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterSource {
    /// The request itself carries the chapter outline.
    FromInput,
    /// Expand the most recent outline in the log.
    FromLatestOutline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    WriteSynopsis,
    DesignCharacters,
    WriteOutline,
    WriteChapter(ChapterSource),
    Unroutable,
}

impl Intent {
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Intent::WriteSynopsis,
            1 => Intent::DesignCharacters,
            2 => Intent::WriteOutline,
            3 => Intent::WriteChapter(ChapterSource::FromInput),
            4 => Intent::WriteChapter(ChapterSource::FromLatestOutline),
            _ => Intent::Unroutable,
        }
    }

    /// Read the first run of ASCII digits in a classifier reply.
    pub fn parse_reply(reply: &str) -> Self {
        let digits: String = reply
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits
            .parse::<u32>()
            .map(Self::from_code)
            .unwrap_or(Intent::Unroutable)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Intent::WriteSynopsis => "write synopsis",
            Intent::DesignCharacters => "design characters",
            Intent::WriteOutline => "write outline",
            Intent::WriteChapter(ChapterSource::FromInput) => "write chapter from the given outline",
            Intent::WriteChapter(ChapterSource::FromLatestOutline) => {
                "write chapter from the latest outline"
            }
            Intent::Unroutable => "unroutable",
        };
        f.write_str(s)
    }
}
