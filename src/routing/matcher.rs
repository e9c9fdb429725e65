//! Route pattern matching.
//!
//! # Responsibilities
//! - Test message names and connection paths against sub-handler patterns
//!
//! # Design Decisions
//! - Matching is an unanchored search: a pattern matches if it occurs
//!   anywhere in the input. `"auth"` therefore also matches `"reauth_user"`.
//! - `Pattern::exact` builds an anchored pattern for callers that want a
//!   whole-string match without writing `^...$` themselves
//! - Patterns are compiled once at tree construction time

use std::fmt;

use regex::Regex;

/// A compiled sub-handler pattern.
#[derive(Clone)]
pub struct Pattern {
    regex: Regex,
}

impl Pattern {
    /// Compile a regular expression. Matching is unanchored.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    /// Pattern matching `text` literally, anywhere in the input.
    pub fn literal(text: &str) -> Result<Self, regex::Error> {
        Self::new(&regex::escape(text))
    }

    /// Pattern matching exactly `text` and nothing else. Fails only when the
    /// compiled pattern exceeds the regex size limit.
    pub fn exact(text: &str) -> Result<Self, regex::Error> {
        Self::new(&format!("^{}$", regex::escape(text)))
    }

    /// Returns true if the pattern occurs anywhere in `input`.
    pub fn matches(&self, input: &str) -> bool {
        self.regex.is_match(input)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.regex.as_str()).finish()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.regex.as_str())
    }
}
