use std::sync::LazyLock;

use regex::{Captures, Regex};

// Capture runs from the heading to the first blank line, the next "Word:"
// heading, a "Targeted Degrees" marker, or end of text, whichever comes
// first. The whole pattern is case-insensitive, heading terminator included.
static COMP_SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)Compensation\s*(?:and|&)?\s*Benefits?:?\s*(.*?)(?:\n\n|\n[A-Z][a-z]+:|Targeted Degrees|$)")
        .unwrap()
});

/// A posting's text split into the isolated compensation section (when one
/// was found) and the full text. Cascade rules search one or both.
pub struct CompText<'a> {
    full: &'a str,
    section: Option<&'a str>,
}

/// Isolate the "Compensation and Benefits" section of a posting, if present.
pub fn split(full: &str) -> CompText<'_> {
    let section = COMP_SECTION_RE
        .captures(full)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str());
    CompText { full, section }
}

impl<'a> CompText<'a> {
    pub fn full(&self) -> &'a str {
        self.full
    }

    /// The compensation section when found, otherwise the full text.
    pub fn primary(&self) -> &'a str {
        self.section.unwrap_or(self.full)
    }

    pub fn has_section(&self) -> bool {
        self.section.is_some()
    }

    /// Search the primary text, retrying on the full text when a section was
    /// isolated. Used by rules that should not miss a range stated outside
    /// the compensation section.
    pub fn try_captures(&self, re: &Regex) -> Option<Captures<'a>> {
        re.captures(self.primary()).or_else(|| {
            if self.section.is_some() {
                re.captures(self.full)
            } else {
                None
            }
        })
    }
}

// ── Tests ──
